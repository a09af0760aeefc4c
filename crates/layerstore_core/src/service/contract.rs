//! Object service contracts.
//!
//! # Responsibility
//! - Define the business-facing CRUD contract (sync and async) that
//!   decorators wrap.
//! - Define the service error taxonomy and its mapping from repository errors.
//!
//! # Invariants
//! - Services never swallow errors; decorators forward them unchanged.
//! - Infrastructure failures keep their original cause as `source()`.

use crate::audit::sink::SinkError;
use crate::model::entity::{Entity, ValidationError};
use crate::repo::contract::RepoError;
use crate::repo::paging::{Page, Paging};
use crate::repo::predicate::Predicate;
use crate::uow::UnitOfWorkError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Mutating operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service-level error.
#[derive(Debug)]
pub enum ServiceError {
    /// Invalid input detected before mutation.
    Validation(ValidationError),
    NotFound {
        entity: &'static str,
        id: String,
    },
    /// Uniqueness violation at create.
    AlreadyExists {
        entity: &'static str,
        key: String,
    },
    /// Unexpected infrastructure failure; wraps the repository cause.
    Service(RepoError),
    /// Mutation succeeded but its audit event could not be dispatched.
    AuditDispatch(SinkError),
    /// Transaction boundary around the call failed.
    UnitOfWork(UnitOfWorkError),
}

impl ServiceError {
    /// Whether a caller may retry the call unchanged.
    ///
    /// Only transient infrastructure failures qualify; corrupt persisted
    /// data fails the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Service(RepoError::Db(_) | RepoError::Bridge(_)) | Self::UnitOfWork(_)
        )
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::AlreadyExists { entity, key } => write!(f, "{entity} already exists: {key}"),
            Self::Service(err) => write!(f, "service failure: {err}"),
            Self::AuditDispatch(err) => write!(f, "audit dispatch failed: {err}"),
            Self::UnitOfWork(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::AuditDispatch(err) => Some(err),
            Self::UnitOfWork(err) => Some(err),
            Self::NotFound { .. } | Self::AlreadyExists { .. } => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<UnitOfWorkError> for ServiceError {
    fn from(value: UnitOfWorkError) -> Self {
        match value {
            UnitOfWorkError::AuditDispatch(err) => Self::AuditDispatch(err),
            other => Self::UnitOfWork(other),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Conflict { entity, id } => Self::AlreadyExists {
                entity,
                key: format!("id={id}"),
            },
            RepoError::InvalidQuery(message) => {
                Self::Validation(ValidationError::new("query", message))
            }
            other => Self::Service(other),
        }
    }
}

/// Business-facing synchronous CRUD contract.
pub trait ObjectService<T: Entity> {
    fn create(&self, entity: T) -> ServiceResult<T>;
    fn retrieve(&self, id: &T::Key) -> ServiceResult<Option<T>>;
    fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> ServiceResult<Page<T>>;
    /// Persists `entity` and returns the stored state.
    fn update(&self, entity: T) -> ServiceResult<T>;
    fn delete(&self, id: &T::Key) -> ServiceResult<()>;
}

/// Business-facing asynchronous CRUD contract.
#[async_trait]
pub trait AsyncObjectService<T: Entity>: Send + Sync {
    async fn create(&self, entity: T) -> ServiceResult<T>;
    async fn retrieve(&self, id: &T::Key) -> ServiceResult<Option<T>>;
    async fn retrieve_page(&self, predicate: &Predicate, paging: Paging)
        -> ServiceResult<Page<T>>;
    async fn update(&self, entity: T) -> ServiceResult<T>;
    async fn delete(&self, id: &T::Key) -> ServiceResult<()>;
}

impl<T: Entity, S: ObjectService<T> + ?Sized> ObjectService<T> for &S {
    fn create(&self, entity: T) -> ServiceResult<T> {
        (**self).create(entity)
    }

    fn retrieve(&self, id: &T::Key) -> ServiceResult<Option<T>> {
        (**self).retrieve(id)
    }

    fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> ServiceResult<Page<T>> {
        (**self).retrieve_page(predicate, paging)
    }

    fn update(&self, entity: T) -> ServiceResult<T> {
        (**self).update(entity)
    }

    fn delete(&self, id: &T::Key) -> ServiceResult<()> {
        (**self).delete(id)
    }
}

impl<T: Entity, S: ObjectService<T> + ?Sized> ObjectService<T> for Arc<S> {
    fn create(&self, entity: T) -> ServiceResult<T> {
        (**self).create(entity)
    }

    fn retrieve(&self, id: &T::Key) -> ServiceResult<Option<T>> {
        (**self).retrieve(id)
    }

    fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> ServiceResult<Page<T>> {
        (**self).retrieve_page(predicate, paging)
    }

    fn update(&self, entity: T) -> ServiceResult<T> {
        (**self).update(entity)
    }

    fn delete(&self, id: &T::Key) -> ServiceResult<()> {
        (**self).delete(id)
    }
}

#[async_trait]
impl<T: Entity, S: AsyncObjectService<T> + ?Sized> AsyncObjectService<T> for Arc<S> {
    async fn create(&self, entity: T) -> ServiceResult<T> {
        (**self).create(entity).await
    }

    async fn retrieve(&self, id: &T::Key) -> ServiceResult<Option<T>> {
        (**self).retrieve(id).await
    }

    async fn retrieve_page(&self, predicate: &Predicate, paging: Paging)
        -> ServiceResult<Page<T>> {
        (**self).retrieve_page(predicate, paging).await
    }

    async fn update(&self, entity: T) -> ServiceResult<T> {
        (**self).update(entity).await
    }

    async fn delete(&self, id: &T::Key) -> ServiceResult<()> {
        (**self).delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceError;
    use crate::audit::sink::SinkError;
    use crate::db::DbError;
    use crate::model::entity::ValidationError;
    use crate::repo::contract::RepoError;
    use crate::uow::UnitOfWorkError;

    #[test]
    fn repository_errors_map_to_service_taxonomy() {
        let err = ServiceError::from(RepoError::Validation(ValidationError::new("word", "empty")));
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = ServiceError::from(RepoError::NotFound {
            entity: "User",
            id: "u1".to_string(),
        });
        assert!(matches!(err, ServiceError::NotFound { entity: "User", .. }));

        let err = ServiceError::from(RepoError::Conflict {
            entity: "User",
            id: "u1".to_string(),
        });
        assert!(matches!(err, ServiceError::AlreadyExists { .. }));

        let err = ServiceError::from(RepoError::InvalidData("bad row".to_string()));
        assert!(matches!(err, ServiceError::Service(_)));
        assert!(!err.is_retryable());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn bad_queries_are_caller_errors() {
        let err = ServiceError::from(RepoError::InvalidQuery("unknown field `nope`".to_string()));
        match &err {
            ServiceError::Validation(validation) => {
                assert_eq!(validation.field, "query");
                assert!(validation.message.contains("nope"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_failures_are_retryable() {
        let err = ServiceError::from(RepoError::Db(DbError::Sqlite(
            rusqlite::Error::QueryReturnedNoRows,
        )));
        assert!(err.is_retryable());

        let err = ServiceError::from(UnitOfWorkError::InvalidState("commit refused"));
        assert!(err.is_retryable());
    }

    #[test]
    fn post_commit_dispatch_failure_maps_to_audit_dispatch() {
        let err = ServiceError::from(UnitOfWorkError::AuditDispatch(SinkError::Closed));
        assert!(matches!(err, ServiceError::AuditDispatch(SinkError::Closed)));
        assert!(!err.is_retryable());
    }
}
