//! User entity.
//!
//! # Responsibility
//! - Model an account record that is both auditable and soft-deletable.
//!
//! # Invariants
//! - `user_name` is non-empty and unique among visible users.
//! - `is_deleted` is the source of truth for tombstone state.

use crate::model::entity::{
    AuditFields, Auditable, Capabilities, Entity, FieldValue, SoftDeletable, ValidationError,
    ID_FIELD, SOFT_DELETE_FIELD,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<Uuid>,
    pub user_name: String,
    pub email: String,
    /// Soft delete tombstone; hidden records keep their row.
    pub is_deleted: bool,
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl User {
    /// Creates an active, unsaved user.
    pub fn new(user_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            user_name: user_name.into(),
            email: email.into(),
            is_deleted: false,
            audit: AuditFields::default(),
        }
    }
}

impl Entity for User {
    type Key = Uuid;

    const ENTITY_NAME: &'static str = "User";
    const UNIQUE_FIELDS: &'static [&'static str] = &["user_name"];

    fn id(&self) -> Option<&Uuid> {
        self.id.as_ref()
    }

    fn assign_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        let value: FieldValue = match name {
            ID_FIELD => self.id.map(|id| id.to_string()).into(),
            "user_name" => self.user_name.as_str().into(),
            "email" => self.email.as_str().into(),
            SOFT_DELETE_FIELD => self.is_deleted.into(),
            "created_by" => self.audit.created_by.clone().into(),
            "created_at_ms" => self.audit.created_at_ms.into(),
            "modified_by" => self.audit.modified_by.clone().into(),
            "modified_at_ms" => self.audit.modified_at_ms.into(),
            _ => return None,
        };
        Some(value)
    }

    fn capabilities() -> Capabilities {
        Capabilities {
            auditable: true,
            soft_deletable: true,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.user_name.trim().is_empty() {
            return Err(ValidationError::new("user_name", "must not be blank"));
        }
        Ok(())
    }

    fn as_soft_deletable_mut(&mut self) -> Option<&mut dyn SoftDeletable> {
        Some(self)
    }

    fn as_auditable(&self) -> Option<&dyn Auditable> {
        Some(self)
    }

    fn as_auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        Some(self)
    }
}

impl SoftDeletable for User {
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn mark_deleted(&mut self) {
        self.is_deleted = true;
    }

    fn restore(&mut self) {
        self.is_deleted = false;
    }
}

impl Auditable for User {
    fn audit_fields(&self) -> &AuditFields {
        &self.audit
    }

    fn audit_fields_mut(&mut self) -> &mut AuditFields {
        &mut self.audit
    }
}

#[cfg(test)]
mod tests {
    use super::User;
    use crate::model::entity::{Entity, FieldValue, SoftDeletable};

    #[test]
    fn new_user_is_active_and_unsaved() {
        let user = User::new("raf", "raf@example.com");
        assert!(user.id.is_none());
        assert!(!user.is_deleted());
        assert_eq!(user.field("is_deleted"), Some(FieldValue::Bool(false)));
    }

    #[test]
    fn blank_user_name_fails_storage_validation() {
        let user = User::new("  ", "raf@example.com");
        let err = user.validate().unwrap_err();
        assert_eq!(err.field, "user_name");
    }

    #[test]
    fn unknown_field_is_none() {
        let user = User::new("raf", "raf@example.com");
        assert_eq!(user.field("password_hash"), None);
    }
}
