//! Tenant middleware.
//!
//! # Invariants
//! - The resolver is consulted exactly once per request.
//! - The trimmed tenant is saved before `next` runs; on any resolution or
//!   store failure `next` is never called.

use crate::tenant::resolver::{RequestParts, TenantResolver};
use crate::tenant::store::TenantStore;
use crate::tenant::{TenantError, TenantId, TenantResult};
use log::{debug, warn};
use std::future::Future;

/// Resolves and stores the tenant, then hands the request downstream.
#[derive(Debug, Clone)]
pub struct TenantMiddleware<R> {
    resolver: R,
}

impl<R: TenantResolver> TenantMiddleware<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Synchronous pipeline step.
    ///
    /// # Errors
    /// - [`TenantError::Unresolved`] when the request has no usable tenant.
    /// - Store failures, converted into `E`.
    /// - Whatever `next` returns.
    pub fn process<S, N, O, E>(&self, request: RequestParts, store: &S, next: N) -> Result<O, E>
    where
        S: TenantStore + ?Sized,
        N: FnOnce(RequestParts) -> Result<O, E>,
        E: From<TenantError>,
    {
        let tenant = self.resolve(&request)?;
        store.save(&tenant).map_err(|err| log_store_failure(&request, err))?;
        debug!(
            "event=tenant_resolved module=tenant status=ok path={}",
            request.path()
        );
        next(request)
    }

    /// Asynchronous pipeline step; same contract as [`Self::process`].
    pub async fn process_async<S, N, Fut, O, E>(
        &self,
        request: RequestParts,
        store: &S,
        next: N,
    ) -> Result<O, E>
    where
        S: TenantStore + ?Sized,
        N: FnOnce(RequestParts) -> Fut,
        Fut: Future<Output = Result<O, E>>,
        E: From<TenantError>,
    {
        let tenant = self.resolve(&request)?;
        store
            .save_async(tenant)
            .await
            .map_err(|err| log_store_failure(&request, err))?;
        debug!(
            "event=tenant_resolved module=tenant status=ok path={}",
            request.path()
        );
        next(request).await
    }

    fn resolve(&self, request: &RequestParts) -> TenantResult<TenantId> {
        let resolved = self
            .resolver
            .resolve(request)
            .and_then(|raw| TenantId::parse(raw.as_deref().unwrap_or_default()));
        if let Err(err) = &resolved {
            warn!(
                "event=tenant_resolved module=tenant status=error path={} error={err}",
                request.path()
            );
        }
        resolved
    }
}

fn log_store_failure(request: &RequestParts, err: TenantError) -> TenantError {
    warn!(
        "event=tenant_store module=tenant status=error path={} error={err}",
        request.path()
    );
    err
}
