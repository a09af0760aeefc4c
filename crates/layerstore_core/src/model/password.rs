//! Password entity.
//!
//! A minimal keyed record with no audit or soft-delete capability.

use crate::model::entity::{Entity, FieldValue, ValidationError, ID_FIELD};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Password {
    /// `None` until the store allocates an identifier.
    pub id: Option<Uuid>,
    pub word: String,
}

impl Password {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            id: None,
            word: word.into(),
        }
    }
}

impl Entity for Password {
    type Key = Uuid;

    const ENTITY_NAME: &'static str = "Password";

    fn id(&self) -> Option<&Uuid> {
        self.id.as_ref()
    }

    fn assign_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            ID_FIELD => Some(self.id.map(|id| id.to_string()).into()),
            "word" => Some(self.word.as_str().into()),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.word.is_empty() {
            return Err(ValidationError::new("word", "must not be empty"));
        }
        Ok(())
    }
}
