//! Request-scoped tenant storage.

use crate::tenant::{TenantId, TenantResult};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

/// Holder of the current request's tenant.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Current tenant, if one was saved.
    fn tenant(&self) -> Option<TenantId>;

    fn save(&self, tenant: &TenantId) -> TenantResult<()>;
    async fn save_async(&self, tenant: TenantId) -> TenantResult<()>;

    fn exists(&self) -> TenantResult<bool>;
    async fn exists_async(&self) -> TenantResult<bool>;

    fn retrieve(&self) -> TenantResult<Option<TenantId>>;
    async fn retrieve_async(&self) -> TenantResult<Option<TenantId>>;

    fn delete(&self) -> TenantResult<()>;
    async fn delete_async(&self) -> TenantResult<()>;
}

/// In-memory store living as long as one request.
#[derive(Debug, Default)]
pub struct RequestTenantStore {
    slot: Mutex<Option<TenantId>>,
}

impl RequestTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Option<TenantId> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write(&self, value: Option<TenantId>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

#[async_trait]
impl TenantStore for RequestTenantStore {
    fn tenant(&self) -> Option<TenantId> {
        self.read()
    }

    fn save(&self, tenant: &TenantId) -> TenantResult<()> {
        self.write(Some(tenant.clone()));
        Ok(())
    }

    async fn save_async(&self, tenant: TenantId) -> TenantResult<()> {
        self.write(Some(tenant));
        Ok(())
    }

    fn exists(&self) -> TenantResult<bool> {
        Ok(self.read().is_some())
    }

    async fn exists_async(&self) -> TenantResult<bool> {
        self.exists()
    }

    fn retrieve(&self) -> TenantResult<Option<TenantId>> {
        Ok(self.read())
    }

    async fn retrieve_async(&self) -> TenantResult<Option<TenantId>> {
        self.retrieve()
    }

    fn delete(&self) -> TenantResult<()> {
        self.write(None);
        Ok(())
    }

    async fn delete_async(&self) -> TenantResult<()> {
        self.delete()
    }
}

#[cfg(test)]
mod tests {
    use super::{RequestTenantStore, TenantStore};
    use crate::tenant::TenantId;

    #[test]
    fn save_then_delete_clears_the_slot() {
        let store = RequestTenantStore::new();
        assert!(!store.exists().unwrap());
        store.save(&TenantId::parse("acme").unwrap()).unwrap();
        assert_eq!(store.tenant().unwrap().as_str(), "acme");
        store.delete().unwrap();
        assert_eq!(store.retrieve().unwrap(), None);
    }
}
