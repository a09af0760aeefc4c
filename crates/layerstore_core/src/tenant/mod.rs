//! Per-request tenant resolution.
//!
//! # Responsibility
//! - Resolve the tenant identifier of an incoming request exactly once.
//! - Persist it to a request-scoped store before downstream work runs.
//!
//! # Invariants
//! - A stored tenant id is never blank and never carries surrounding
//!   whitespace.
//! - An unresolvable request never reaches the downstream handler.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod middleware;
pub mod resolver;
pub mod store;

pub use middleware::TenantMiddleware;
pub use resolver::{
    HeaderTenantResolver, HostTenantResolver, RequestParts, StaticTenantResolver, TenantResolver,
};
pub use store::{RequestTenantStore, TenantStore};

pub type TenantResult<T> = Result<T, TenantError>;

/// Tenant resolution or persistence failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantError {
    /// Request carried no usable tenant id; the request must be aborted.
    Unresolved,
    /// Resolver itself failed.
    Resolution(String),
    /// Tenant store rejected the operation.
    Store(String),
}

impl Display for TenantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unresolved => write!(f, "tenant could not be resolved for this request"),
            Self::Resolution(message) => write!(f, "tenant resolution failed: {message}"),
            Self::Store(message) => write!(f, "tenant store failure: {message}"),
        }
    }
}

impl Error for TenantError {}

/// Non-blank, trimmed tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    /// Trims `raw`; blank input is [`TenantError::Unresolved`].
    pub fn parse(raw: &str) -> TenantResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TenantError::Unresolved);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for TenantId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{TenantError, TenantId};

    #[test]
    fn parse_trims_and_rejects_blank() {
        assert_eq!(TenantId::parse("  acme \t").unwrap().as_str(), "acme");
        assert_eq!(TenantId::parse(" \n ").unwrap_err(), TenantError::Unresolved);
        assert_eq!(TenantId::parse("").unwrap_err(), TenantError::Unresolved);
    }
}
