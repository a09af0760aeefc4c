//! Repository-backed object services.
//!
//! # Responsibility
//! - Implement the service contract over any repository.
//! - Apply domain rules and uniqueness checks before delegating writes.
//!
//! # Invariants
//! - Services never bypass repository validation/persistence contracts.
//! - Uniqueness is checked against visible records only.
//! - No decoration logic lives here; cross-cutting behavior wraps services.

use crate::model::entity::{Entity, FieldValue, ValidationError, ID_FIELD};
use crate::repo::contract::{AsyncRepository, Repository};
use crate::repo::paging::{Page, Paging};
use crate::repo::predicate::Predicate;
use crate::service::contract::{
    AsyncObjectService, ObjectService, Operation, ServiceError, ServiceResult,
};
use crate::service::rules::{NoRules, ServiceRules};
use async_trait::async_trait;
use std::marker::PhantomData;

/// Synchronous service over a [`Repository`].
pub struct RepositoryService<T, R, V = NoRules> {
    repo: R,
    rules: V,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, R: Repository<T>> RepositoryService<T, R, NoRules> {
    pub fn new(repo: R) -> Self {
        Self::with_rules(repo, NoRules)
    }
}

impl<T: Entity, R, V: ServiceRules<T>> RepositoryService<T, R, V> {
    pub fn with_rules(repo: R, rules: V) -> Self {
        Self {
            repo,
            rules,
            _entity: PhantomData,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }
}

impl<T, R, V> ObjectService<T> for RepositoryService<T, R, V>
where
    T: Entity,
    R: Repository<T>,
    V: ServiceRules<T>,
{
    fn create(&self, entity: T) -> ServiceResult<T> {
        self.rules.validate(&entity, Operation::Create)?;
        for (field, value) in unique_probes(&entity) {
            let taken = self
                .repo
                .retrieve_page(&Predicate::field_eq(field, value.clone()), Paging::new(0, 1))?;
            if !taken.is_empty() {
                return Err(already_exists::<T>(field, &value));
            }
        }
        Ok(self.repo.create(entity)?)
    }

    fn retrieve(&self, id: &T::Key) -> ServiceResult<Option<T>> {
        Ok(self.repo.retrieve(id)?)
    }

    fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> ServiceResult<Page<T>> {
        Ok(self.repo.retrieve_page(predicate, paging)?)
    }

    fn update(&self, entity: T) -> ServiceResult<T> {
        require_id(&entity)?;
        self.rules.validate(&entity, Operation::Update)?;
        self.repo.update(&entity)?;
        Ok(entity)
    }

    fn delete(&self, id: &T::Key) -> ServiceResult<()> {
        Ok(self.repo.delete(id)?)
    }
}

/// Asynchronous service over an [`AsyncRepository`].
pub struct AsyncRepositoryService<T, R, V = NoRules> {
    repo: R,
    rules: V,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, R: AsyncRepository<T>> AsyncRepositoryService<T, R, NoRules> {
    pub fn new(repo: R) -> Self {
        Self::with_rules(repo, NoRules)
    }
}

impl<T: Entity, R, V: ServiceRules<T>> AsyncRepositoryService<T, R, V> {
    pub fn with_rules(repo: R, rules: V) -> Self {
        Self {
            repo,
            rules,
            _entity: PhantomData,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }
}

#[async_trait]
impl<T, R, V> AsyncObjectService<T> for AsyncRepositoryService<T, R, V>
where
    T: Entity,
    R: AsyncRepository<T>,
    V: ServiceRules<T>,
{
    async fn create(&self, entity: T) -> ServiceResult<T> {
        self.rules.validate(&entity, Operation::Create)?;
        for (field, value) in unique_probes(&entity) {
            let taken = self
                .repo
                .retrieve_page(&Predicate::field_eq(field, value.clone()), Paging::new(0, 1))
                .await?;
            if !taken.is_empty() {
                return Err(already_exists::<T>(field, &value));
            }
        }
        Ok(self.repo.create(entity).await?)
    }

    async fn retrieve(&self, id: &T::Key) -> ServiceResult<Option<T>> {
        Ok(self.repo.retrieve(id).await?)
    }

    async fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> ServiceResult<Page<T>> {
        Ok(self.repo.retrieve_page(predicate, paging).await?)
    }

    async fn update(&self, entity: T) -> ServiceResult<T> {
        require_id(&entity)?;
        self.rules.validate(&entity, Operation::Update)?;
        self.repo.update(&entity).await?;
        Ok(entity)
    }

    async fn delete(&self, id: &T::Key) -> ServiceResult<()> {
        Ok(self.repo.delete(id).await?)
    }
}

fn unique_probes<T: Entity>(entity: &T) -> Vec<(&'static str, FieldValue)> {
    T::UNIQUE_FIELDS
        .iter()
        .filter_map(|field| entity.field(field).map(|value| (*field, value)))
        .filter(|(_, value)| *value != FieldValue::Null)
        .collect()
}

fn already_exists<T: Entity>(field: &str, value: &FieldValue) -> ServiceError {
    ServiceError::AlreadyExists {
        entity: T::ENTITY_NAME,
        key: format!("{field}={value}"),
    }
}

fn require_id<T: Entity>(entity: &T) -> Result<(), ValidationError> {
    if entity.id().is_none() {
        return Err(ValidationError::new(ID_FIELD, "required for update"));
    }
    Ok(())
}
