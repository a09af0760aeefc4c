//! Entity capability contracts.
//!
//! # Responsibility
//! - Define the identity, audit and soft-delete capabilities an entity may
//!   carry.
//! - Expose static capability metadata so registration needs no instance.
//!
//! # Invariants
//! - `Entity::id()` is `None` only before the first successful create.
//! - `capabilities().soft_deletable` is true iff `as_soft_deletable_mut`
//!   returns `Some`; the same holds for `auditable` and the `as_auditable*`
//!   accessors.
//! - The soft-delete flag is always exposed under [`SOFT_DELETE_FIELD`].

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;
use uuid::Uuid;

/// Field name every soft-deletable entity exposes its tombstone flag under.
pub const SOFT_DELETE_FIELD: &str = "is_deleted";

/// Field name every entity exposes its identifier under.
pub const ID_FIELD: &str = "id";

/// Scalar value of one entity field, as seen by predicates and stores.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<V: Into<FieldValue>> From<Option<V>> for FieldValue {
    fn from(value: Option<V>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Identifier type usable as an entity key.
///
/// Stores allocate keys through [`EntityKey::allocate`] when a caller creates
/// an entity without one.
pub trait EntityKey: Clone + Debug + Display + Eq + Hash + Send + Sync + 'static {
    /// Allocates a fresh, never-reused key.
    fn allocate() -> Self;
    /// Converts the key into its stored scalar form.
    fn to_field(&self) -> FieldValue;
    /// Parses a key back from its stored scalar form.
    fn from_field(value: &FieldValue) -> Option<Self>;
}

impl EntityKey for Uuid {
    fn allocate() -> Self {
        Uuid::new_v4()
    }

    fn to_field(&self) -> FieldValue {
        FieldValue::Text(self.to_string())
    }

    fn from_field(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(text) => Uuid::parse_str(text).ok(),
            _ => None,
        }
    }
}

impl EntityKey for String {
    fn allocate() -> Self {
        Uuid::new_v4().to_string()
    }

    fn to_field(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }

    fn from_field(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(text) => Some(text.clone()),
            _ => None,
        }
    }
}

/// Static capability set of one entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Entity carries created/modified audit fields.
    pub auditable: bool,
    /// Entity carries the `is_deleted` tombstone flag.
    pub soft_deletable: bool,
}

/// Storage-level or domain-level validation failure for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}`: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}

/// Created/modified stamps carried by auditable entities.
///
/// Timestamps are Unix epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFields {
    pub created_by: Option<String>,
    pub created_at_ms: Option<i64>,
    pub modified_by: Option<String>,
    pub modified_at_ms: Option<i64>,
}

impl AuditFields {
    /// Stamps both created and modified fields for a new record.
    pub fn stamp_created(&mut self, actor: &str, at_ms: i64) {
        self.created_by = Some(actor.to_string());
        self.created_at_ms = Some(at_ms);
        self.modified_by = Some(actor.to_string());
        self.modified_at_ms = Some(at_ms);
    }

    /// Stamps modified fields, leaving creation stamps untouched.
    pub fn stamp_modified(&mut self, actor: &str, at_ms: i64) {
        self.modified_by = Some(actor.to_string());
        self.modified_at_ms = Some(at_ms);
    }
}

/// Soft-delete capability.
pub trait SoftDeletable {
    fn is_deleted(&self) -> bool;
    fn mark_deleted(&mut self);
    fn restore(&mut self);
}

/// Audit-field capability.
pub trait Auditable {
    fn audit_fields(&self) -> &AuditFields;
    fn audit_fields_mut(&mut self) -> &mut AuditFields;
}

/// Base contract for every persisted domain object.
///
/// Capabilities beyond identity are opt-in through [`Entity::capabilities`]
/// and the matching `as_*_mut` accessors.
pub trait Entity: Clone + Debug + Serialize + Send + Sync + 'static {
    type Key: EntityKey;

    /// Stable type name used by audit records and filter registration.
    const ENTITY_NAME: &'static str;

    /// Fields that must be unique among visible records at create time.
    const UNIQUE_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> Option<&Self::Key>;

    fn assign_id(&mut self, id: Self::Key);

    /// Returns one field value by name, `None` for unknown names.
    fn field(&self, name: &str) -> Option<FieldValue>;

    fn capabilities() -> Capabilities {
        Capabilities::default()
    }

    /// Storage-level constraints checked by repositories before writes.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    fn as_soft_deletable_mut(&mut self) -> Option<&mut dyn SoftDeletable> {
        None
    }

    fn as_auditable(&self) -> Option<&dyn Auditable> {
        None
    }

    fn as_auditable_mut(&mut self) -> Option<&mut dyn Auditable> {
        None
    }
}

/// Returns the current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::{AuditFields, EntityKey, FieldValue};
    use uuid::Uuid;

    #[test]
    fn uuid_key_roundtrips_through_text_field() {
        let id = Uuid::allocate();
        let field = id.to_field();
        assert_eq!(Uuid::from_field(&field), Some(id));
        assert_eq!(Uuid::from_field(&FieldValue::Integer(3)), None);
    }

    #[test]
    fn optional_values_map_to_null() {
        let missing: Option<i64> = None;
        assert_eq!(FieldValue::from(missing), FieldValue::Null);
        assert_eq!(FieldValue::from(Some("x")), FieldValue::Text("x".to_string()));
    }

    #[test]
    fn stamp_modified_keeps_creation_stamps() {
        let mut fields = AuditFields::default();
        fields.stamp_created("Raf", 10);
        fields.stamp_modified("Ana", 20);
        assert_eq!(fields.created_by.as_deref(), Some("Raf"));
        assert_eq!(fields.created_at_ms, Some(10));
        assert_eq!(fields.modified_by.as_deref(), Some("Ana"));
        assert_eq!(fields.modified_at_ms, Some(20));
    }
}
