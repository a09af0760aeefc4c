//! Async in-memory repository.
//!
//! # Responsibility
//! - Provide an async-native store for tests, demos and ephemeral data.
//! - Expose raw inspection outside the standard contract.
//!
//! # Invariants
//! - Reads apply the registry's standing filter exactly like SQLite reads.
//! - Records are kept in insertion order; pages follow that order.
//! - Stored records are clones; callers never share state with the store.

use crate::filter::{DeletePolicy, FilterRegistry};
use crate::model::entity::{Entity, EntityKey, ValidationError, ID_FIELD};
use crate::repo::contract::{
    AsyncPagedRepository, AsyncReadRepository, AsyncWriteRepository, RepoError, RepoResult,
};
use crate::repo::paging::{Page, Paging};
use crate::repo::predicate::Predicate;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

struct MemoryState<T: Entity> {
    next_seq: u64,
    rows: BTreeMap<u64, T>,
    index: HashMap<T::Key, u64>,
}

impl<T: Entity> Default for MemoryState<T> {
    fn default() -> Self {
        Self {
            next_seq: 0,
            rows: BTreeMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Entity> MemoryState<T> {
    fn visible(&self, id: &T::Key, filters: &FilterRegistry) -> Option<(u64, &T)> {
        let seq = *self.index.get(id)?;
        let entity = self.rows.get(&seq)?;
        let standing = filters.scope::<T>(&Predicate::all());
        standing.matches(entity).then_some((seq, entity))
    }
}

/// In-memory store for one entity type.
pub struct MemoryRepository<T: Entity> {
    filters: Arc<FilterRegistry>,
    state: RwLock<MemoryState<T>>,
}

impl<T: Entity> MemoryRepository<T> {
    pub fn new(filters: Arc<FilterRegistry>) -> Self {
        Self {
            filters,
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// Every stored record, including hidden ones, in insertion order.
    ///
    /// Inspection hook; not part of the repository contract.
    pub async fn raw_records(&self) -> Vec<T> {
        self.state.read().await.rows.values().cloned().collect()
    }

    /// One stored record by id, ignoring standing filters.
    pub async fn raw_record(&self, id: &T::Key) -> Option<T> {
        let state = self.state.read().await;
        let seq = state.index.get(id)?;
        state.rows.get(seq).cloned()
    }
}

#[async_trait]
impl<T: Entity> AsyncReadRepository<T> for MemoryRepository<T> {
    async fn retrieve(&self, id: &T::Key) -> RepoResult<Option<T>> {
        let state = self.state.read().await;
        Ok(state
            .visible(id, &self.filters)
            .map(|(_, entity)| entity.clone()))
    }
}

#[async_trait]
impl<T: Entity> AsyncPagedRepository<T> for MemoryRepository<T> {
    async fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> RepoResult<Page<T>> {
        if paging.is_empty_request() {
            return Ok(Page::empty(paging));
        }
        let skip = usize::try_from(paging.offset()).map_err(|_| {
            RepoError::InvalidQuery(format!("page offset too large: {}", paging.offset()))
        })?;

        let scoped = self.filters.scope::<T>(predicate);
        let state = self.state.read().await;
        let items = state
            .rows
            .values()
            .filter(|entity| scoped.matches(*entity))
            .skip(skip)
            .take(paging.page_size as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, paging))
    }
}

#[async_trait]
impl<T: Entity> AsyncWriteRepository<T> for MemoryRepository<T> {
    async fn create(&self, mut entity: T) -> RepoResult<T> {
        entity.validate()?;
        let id = match entity.id() {
            Some(id) => id.clone(),
            None => {
                let id = T::Key::allocate();
                entity.assign_id(id.clone());
                id
            }
        };

        let mut state = self.state.write().await;
        if state.index.contains_key(&id) {
            return Err(RepoError::conflict::<T>(&id));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.index.insert(id, seq);
        state.rows.insert(seq, entity.clone());
        Ok(entity)
    }

    async fn update(&self, entity: &T) -> RepoResult<()> {
        entity.validate()?;
        let id = entity
            .id()
            .ok_or_else(|| ValidationError::new(ID_FIELD, "required for update"))?;

        let mut state = self.state.write().await;
        let seq = state
            .visible(id, &self.filters)
            .map(|(seq, _)| seq)
            .ok_or_else(|| RepoError::not_found::<T>(id))?;
        state.rows.insert(seq, entity.clone());
        Ok(())
    }

    async fn delete(&self, id: &T::Key) -> RepoResult<()> {
        let mut state = self.state.write().await;
        let (seq, current) = state
            .visible(id, &self.filters)
            .map(|(seq, entity)| (seq, entity.clone()))
            .ok_or_else(|| RepoError::not_found::<T>(id))?;

        if self.filters.delete_policy::<T>() == DeletePolicy::Soft {
            let mut tombstoned = current;
            if let Some(flag) = tombstoned.as_soft_deletable_mut() {
                flag.mark_deleted();
                state.rows.insert(seq, tombstoned);
                return Ok(());
            }
        }

        state.rows.remove(&seq);
        state.index.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryRepository;
    use crate::filter::{DeletePolicy, FilterRegistry};
    use crate::model::user::User;
    use crate::repo::contract::{AsyncPagedRepository, AsyncReadRepository, AsyncWriteRepository};
    use crate::repo::paging::Paging;
    use crate::repo::predicate::Predicate;

    fn users() -> MemoryRepository<User> {
        MemoryRepository::new(
            FilterRegistry::builder(DeletePolicy::Soft)
                .register::<User>()
                .build(),
        )
    }

    #[tokio::test]
    async fn soft_delete_hides_record_but_keeps_it() {
        let repo = users();
        let created = repo.create(User::new("raf", "raf@example.com")).await.unwrap();
        let id = created.id.unwrap();

        repo.delete(&id).await.unwrap();

        assert!(repo.retrieve(&id).await.unwrap().is_none());
        let raw = repo.raw_record(&id).await.unwrap();
        assert!(raw.is_deleted);
    }

    #[tokio::test]
    async fn pages_follow_insertion_order() {
        let repo = users();
        for name in ["a", "b", "c", "d"] {
            repo.create(User::new(name, "x@example.com")).await.unwrap();
        }

        let page = repo
            .retrieve_page(&Predicate::all(), Paging::new(1, 2))
            .await
            .unwrap();
        let names: Vec<_> = page.items.iter().map(|user| user.user_name.as_str()).collect();
        assert_eq!(names, vec!["c", "d"]);
    }
}
