//! Sync adapter over async repositories.
//!
//! # Invariants
//! - Every call crosses the boundary through [`SyncAsyncBridge::run`], so a
//!   caller on a single-threaded runtime never waits on its own scheduler.
//! - Errors of the wrapped store are returned unchanged.

use crate::bridge::SyncAsyncBridge;
use crate::model::entity::Entity;
use crate::repo::contract::{
    AsyncPagedRepository, AsyncReadRepository, AsyncWriteRepository, PagedRepository,
    ReadRepository, RepoResult, WriteRepository,
};
use crate::repo::paging::{Page, Paging};
use crate::repo::predicate::Predicate;
use std::sync::Arc;

/// Exposes an async store through the synchronous repository contract.
pub struct BridgedRepository<R> {
    inner: Arc<R>,
    bridge: Arc<SyncAsyncBridge>,
}

impl<R> Clone for BridgedRepository<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            bridge: Arc::clone(&self.bridge),
        }
    }
}

impl<R> BridgedRepository<R> {
    pub fn new(inner: Arc<R>, bridge: Arc<SyncAsyncBridge>) -> Self {
        Self { inner, bridge }
    }

    pub fn inner(&self) -> &Arc<R> {
        &self.inner
    }
}

impl<T, R> ReadRepository<T> for BridgedRepository<R>
where
    T: Entity,
    R: AsyncReadRepository<T> + 'static,
{
    fn retrieve(&self, id: &T::Key) -> RepoResult<Option<T>> {
        let inner = Arc::clone(&self.inner);
        let id = id.clone();
        self.bridge.run(async move { inner.retrieve(&id).await })
    }
}

impl<T, R> PagedRepository<T> for BridgedRepository<R>
where
    T: Entity,
    R: AsyncPagedRepository<T> + 'static,
{
    fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> RepoResult<Page<T>> {
        let inner = Arc::clone(&self.inner);
        let predicate = predicate.clone();
        self.bridge
            .run(async move { inner.retrieve_page(&predicate, paging).await })
    }
}

impl<T, R> WriteRepository<T> for BridgedRepository<R>
where
    T: Entity,
    R: AsyncWriteRepository<T> + 'static,
{
    fn create(&self, entity: T) -> RepoResult<T> {
        let inner = Arc::clone(&self.inner);
        self.bridge.run(async move { inner.create(entity).await })
    }

    fn update(&self, entity: &T) -> RepoResult<()> {
        let inner = Arc::clone(&self.inner);
        let entity = entity.clone();
        self.bridge.run(async move { inner.update(&entity).await })
    }

    fn delete(&self, id: &T::Key) -> RepoResult<()> {
        let inner = Arc::clone(&self.inner);
        let id = id.clone();
        self.bridge.run(async move { inner.delete(&id).await })
    }
}
