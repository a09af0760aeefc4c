//! Repository capability contracts.
//!
//! # Responsibility
//! - Define independently composable CRUD capabilities (read, paged read,
//!   write) in sync and async forms.
//! - Define the repository error taxonomy shared by every store.
//!
//! # Invariants
//! - Reads never return records hidden by the entity's standing filter.
//! - `update`/`delete` of an unknown or hidden id return `NotFound`.
//! - No implicit transaction spans two calls.

use crate::bridge::BridgeError;
use crate::db::DbError;
use crate::model::entity::{Entity, ValidationError};
use crate::repo::paging::{Page, Paging};
use crate::repo::predicate::Predicate;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Storage-level constraint failed before any mutation.
    Validation(ValidationError),
    NotFound {
        entity: &'static str,
        id: String,
    },
    /// Identifier already taken in the store.
    Conflict {
        entity: &'static str,
        id: String,
    },
    Db(DbError),
    /// Persisted state could not be mapped back into an entity.
    InvalidData(String),
    /// Caller query could not be rendered for this store.
    InvalidQuery(String),
    /// Bridged async store did not complete.
    Bridge(BridgeError),
}

impl RepoError {
    pub fn not_found<T: Entity>(id: &T::Key) -> Self {
        Self::NotFound {
            entity: T::ENTITY_NAME,
            id: id.to_string(),
        }
    }

    pub fn conflict<T: Entity>(id: &T::Key) -> Self {
        Self::Conflict {
            entity: T::ENTITY_NAME,
            id: id.to_string(),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict { entity, id } => write!(f, "{entity} already stored: {id}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::InvalidQuery(message) => write!(f, "invalid query: {message}"),
            Self::Bridge(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Bridge(err) => Some(err),
            Self::NotFound { .. }
            | Self::Conflict { .. }
            | Self::InvalidData(_)
            | Self::InvalidQuery(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<BridgeError> for RepoError {
    fn from(value: BridgeError) -> Self {
        Self::Bridge(value)
    }
}

/// Single-record read capability.
pub trait ReadRepository<T: Entity> {
    /// Returns `None` when the id is unknown or hidden by the standing filter.
    fn retrieve(&self, id: &T::Key) -> RepoResult<Option<T>>;
}

/// Predicate/page read capability.
pub trait PagedRepository<T: Entity> {
    /// Returns one page in insertion order; `page_size == 0` is always empty.
    fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> RepoResult<Page<T>>;
}

/// Mutation capability.
pub trait WriteRepository<T: Entity> {
    /// Persists a new record, allocating an id when none is set.
    fn create(&self, entity: T) -> RepoResult<T>;
    fn update(&self, entity: &T) -> RepoResult<()>;
    /// Soft or hard delete, per the entity's registered delete policy.
    fn delete(&self, id: &T::Key) -> RepoResult<()>;
}

/// Full CRUD bound, implemented for every type carrying all capabilities.
pub trait Repository<T: Entity>:
    ReadRepository<T> + PagedRepository<T> + WriteRepository<T>
{
}

impl<T, R> Repository<T> for R
where
    T: Entity,
    R: ReadRepository<T> + PagedRepository<T> + WriteRepository<T>,
{
}

impl<T: Entity, R: ReadRepository<T> + ?Sized> ReadRepository<T> for &R {
    fn retrieve(&self, id: &T::Key) -> RepoResult<Option<T>> {
        (**self).retrieve(id)
    }
}

impl<T: Entity, R: ReadRepository<T> + ?Sized> ReadRepository<T> for Arc<R> {
    fn retrieve(&self, id: &T::Key) -> RepoResult<Option<T>> {
        (**self).retrieve(id)
    }
}

impl<T: Entity, R: PagedRepository<T> + ?Sized> PagedRepository<T> for &R {
    fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> RepoResult<Page<T>> {
        (**self).retrieve_page(predicate, paging)
    }
}

impl<T: Entity, R: PagedRepository<T> + ?Sized> PagedRepository<T> for Arc<R> {
    fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> RepoResult<Page<T>> {
        (**self).retrieve_page(predicate, paging)
    }
}

impl<T: Entity, R: WriteRepository<T> + ?Sized> WriteRepository<T> for &R {
    fn create(&self, entity: T) -> RepoResult<T> {
        (**self).create(entity)
    }

    fn update(&self, entity: &T) -> RepoResult<()> {
        (**self).update(entity)
    }

    fn delete(&self, id: &T::Key) -> RepoResult<()> {
        (**self).delete(id)
    }
}

impl<T: Entity, R: WriteRepository<T> + ?Sized> WriteRepository<T> for Arc<R> {
    fn create(&self, entity: T) -> RepoResult<T> {
        (**self).create(entity)
    }

    fn update(&self, entity: &T) -> RepoResult<()> {
        (**self).update(entity)
    }

    fn delete(&self, id: &T::Key) -> RepoResult<()> {
        (**self).delete(id)
    }
}

/// Async single-record read capability.
#[async_trait]
pub trait AsyncReadRepository<T: Entity>: Send + Sync {
    async fn retrieve(&self, id: &T::Key) -> RepoResult<Option<T>>;
}

/// Async predicate/page read capability.
#[async_trait]
pub trait AsyncPagedRepository<T: Entity>: Send + Sync {
    async fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> RepoResult<Page<T>>;
}

/// Async mutation capability.
#[async_trait]
pub trait AsyncWriteRepository<T: Entity>: Send + Sync {
    async fn create(&self, entity: T) -> RepoResult<T>;
    async fn update(&self, entity: &T) -> RepoResult<()>;
    async fn delete(&self, id: &T::Key) -> RepoResult<()>;
}

/// Full async CRUD bound.
pub trait AsyncRepository<T: Entity>:
    AsyncReadRepository<T> + AsyncPagedRepository<T> + AsyncWriteRepository<T>
{
}

impl<T, R> AsyncRepository<T> for R
where
    T: Entity,
    R: AsyncReadRepository<T> + AsyncPagedRepository<T> + AsyncWriteRepository<T>,
{
}

#[async_trait]
impl<T: Entity, R: AsyncReadRepository<T> + ?Sized> AsyncReadRepository<T> for Arc<R> {
    async fn retrieve(&self, id: &T::Key) -> RepoResult<Option<T>> {
        (**self).retrieve(id).await
    }
}

#[async_trait]
impl<T: Entity, R: AsyncPagedRepository<T> + ?Sized> AsyncPagedRepository<T> for Arc<R> {
    async fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> RepoResult<Page<T>> {
        (**self).retrieve_page(predicate, paging).await
    }
}

#[async_trait]
impl<T: Entity, R: AsyncWriteRepository<T> + ?Sized> AsyncWriteRepository<T> for Arc<R> {
    async fn create(&self, entity: T) -> RepoResult<T> {
        (**self).create(entity).await
    }

    async fn update(&self, entity: &T) -> RepoResult<()> {
        (**self).update(entity).await
    }

    async fn delete(&self, id: &T::Key) -> RepoResult<()> {
        (**self).delete(id).await
    }
}
