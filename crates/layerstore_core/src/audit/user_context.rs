//! Current-actor collaborator consulted by the audit decorator.

use std::sync::Arc;

/// Read-only view of the acting user, resolved per call.
pub trait UserContext: Send + Sync {
    fn current_user(&self) -> String;
}

/// Fixed actor, for services and jobs that act as one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticUserContext {
    user: String,
}

impl StaticUserContext {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

impl UserContext for StaticUserContext {
    fn current_user(&self) -> String {
        self.user.clone()
    }
}

impl<U: UserContext + ?Sized> UserContext for Arc<U> {
    fn current_user(&self) -> String {
        (**self).current_user()
    }
}
