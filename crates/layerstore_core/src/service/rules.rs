//! Domain validation rules applied by services above storage constraints.

use crate::model::entity::ValidationError;
use crate::model::user::User;
use crate::service::contract::Operation;
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

/// Domain rule set for one entity type.
pub trait ServiceRules<T>: Send + Sync {
    /// Checks `entity` before a create or update is delegated.
    fn validate(&self, entity: &T, operation: Operation) -> Result<(), ValidationError>;
}

/// Accepts every entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRules;

impl<T> ServiceRules<T> for NoRules {
    fn validate(&self, _entity: &T, _operation: Operation) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Rules for [`User`]: the email must look like an address.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserRules;

impl ServiceRules<User> for UserRules {
    fn validate(&self, entity: &User, _operation: Operation) -> Result<(), ValidationError> {
        if !EMAIL_RE.is_match(entity.email.trim()) {
            return Err(ValidationError::new("email", "must be an address like name@host.tld"));
        }
        Ok(())
    }
}
