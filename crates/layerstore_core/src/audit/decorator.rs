//! Audit decorator over object services.
//!
//! # Responsibility
//! - Stamp audit fields and emit one [`AuditEvent`] per successful
//!   create/update/delete of the wrapped service.
//!
//! # Invariants
//! - Failed wrapped calls emit nothing and return the wrapped error unchanged.
//! - The before-state of update/delete is read before delegating.
//! - Reads pass through untouched.
//! - Dispatch failure never reverses the mutation.

use crate::audit::event::AuditEvent;
use crate::audit::sink::{AuditSink, SinkError};
use crate::audit::user_context::UserContext;
use crate::config::SyncAuditDispatch;
use crate::model::entity::{now_epoch_ms, Entity};
use crate::repo::contract::{AsyncReadRepository, ReadRepository};
use crate::repo::paging::{Page, Paging};
use crate::repo::predicate::Predicate;
use crate::service::contract::{
    AsyncObjectService, ObjectService, Operation, ServiceError, ServiceResult,
};
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;

/// Emits audit events around a wrapped service.
///
/// `before_reader` is the repository the wrapped service writes to; it is
/// consulted for the pre-mutation state of updates and deletes.
///
/// Inside a unit of work, pass an [`AuditOutbox`](crate::audit::outbox::AuditOutbox)
/// as the sink so events are released only after commit.
pub struct AuditDecorator<S, R, U> {
    inner: S,
    before_reader: R,
    users: U,
    sink: Arc<dyn AuditSink>,
    sync_dispatch: SyncAuditDispatch,
}

impl<S, R, U: UserContext> AuditDecorator<S, R, U> {
    pub fn new(inner: S, before_reader: R, users: U, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            inner,
            before_reader,
            users,
            sink,
            sync_dispatch: SyncAuditDispatch::default(),
        }
    }

    /// Sets how sink failures surface on the synchronous contract.
    pub fn with_sync_dispatch(mut self, sync_dispatch: SyncAuditDispatch) -> Self {
        self.sync_dispatch = sync_dispatch;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn emit_sync<T: Entity>(
        &self,
        actor: String,
        operation: Operation,
        id: Option<&T::Key>,
        before: Option<&T>,
        after: Option<&T>,
    ) -> ServiceResult<()> {
        let dispatched = AuditEvent::capture::<T>(actor, operation, id, before, after)
            .and_then(|event| event.to_record())
            .and_then(|record| self.sink.submit(&record));
        match dispatched {
            Ok(receipt) => {
                debug!(
                    "event=audit_emit module=audit status=ok operation={operation} target_type={} receipt={receipt}",
                    T::ENTITY_NAME
                );
                Ok(())
            }
            Err(err) => self.on_sync_failure::<T>(operation, err),
        }
    }

    fn on_sync_failure<T: Entity>(&self, operation: Operation, err: SinkError) -> ServiceResult<()> {
        match self.sync_dispatch {
            SyncAuditDispatch::BestEffort => {
                warn!(
                    "event=audit_emit module=audit status=dropped operation={operation} target_type={} error={err}",
                    T::ENTITY_NAME
                );
                Ok(())
            }
            SyncAuditDispatch::Required => {
                warn!(
                    "event=audit_emit module=audit status=error operation={operation} target_type={} error={err}",
                    T::ENTITY_NAME
                );
                Err(ServiceError::AuditDispatch(err))
            }
        }
    }

    async fn emit_async<T: Entity>(
        &self,
        actor: String,
        operation: Operation,
        id: Option<&T::Key>,
        before: Option<&T>,
        after: Option<&T>,
    ) -> ServiceResult<()> {
        let record = AuditEvent::capture::<T>(actor, operation, id, before, after)
            .and_then(|event| event.to_record())
            .map_err(ServiceError::AuditDispatch)?;
        match self.sink.submit_async(record).await {
            Ok(receipt) => {
                debug!(
                    "event=audit_emit module=audit status=ok operation={operation} target_type={} receipt={receipt}",
                    T::ENTITY_NAME
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=audit_emit module=audit status=error operation={operation} target_type={} error={err}",
                    T::ENTITY_NAME
                );
                Err(ServiceError::AuditDispatch(err))
            }
        }
    }
}

fn stamp_created<T: Entity>(entity: &mut T, actor: &str) {
    if let Some(auditable) = entity.as_auditable_mut() {
        auditable.audit_fields_mut().stamp_created(actor, now_epoch_ms());
    }
}

/// Carries creation stamps over from the stored state, then stamps the
/// modification.
fn stamp_modified<T: Entity>(entity: &mut T, before: Option<&T>, actor: &str) {
    let created = before
        .and_then(|stored| stored.as_auditable())
        .map(|stored| stored.audit_fields().clone());
    if let Some(auditable) = entity.as_auditable_mut() {
        let fields = auditable.audit_fields_mut();
        if let Some(created) = created {
            fields.created_by = created.created_by;
            fields.created_at_ms = created.created_at_ms;
        }
        fields.stamp_modified(actor, now_epoch_ms());
    }
}

impl<T, S, R, U> ObjectService<T> for AuditDecorator<S, R, U>
where
    T: Entity,
    S: ObjectService<T>,
    R: ReadRepository<T>,
    U: UserContext,
{
    fn create(&self, mut entity: T) -> ServiceResult<T> {
        let actor = self.users.current_user();
        stamp_created(&mut entity, &actor);
        let created = self.inner.create(entity)?;
        self.emit_sync(actor, Operation::Create, created.id(), None, Some(&created))?;
        Ok(created)
    }

    fn retrieve(&self, id: &T::Key) -> ServiceResult<Option<T>> {
        self.inner.retrieve(id)
    }

    fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> ServiceResult<Page<T>> {
        self.inner.retrieve_page(predicate, paging)
    }

    fn update(&self, mut entity: T) -> ServiceResult<T> {
        let actor = self.users.current_user();
        let before = match entity.id() {
            Some(id) => self.before_reader.retrieve(id)?,
            None => None,
        };
        stamp_modified(&mut entity, before.as_ref(), &actor);
        let updated = self.inner.update(entity)?;
        self.emit_sync(
            actor,
            Operation::Update,
            updated.id(),
            before.as_ref(),
            Some(&updated),
        )?;
        Ok(updated)
    }

    fn delete(&self, id: &T::Key) -> ServiceResult<()> {
        let actor = self.users.current_user();
        let before = self.before_reader.retrieve(id)?;
        self.inner.delete(id)?;
        self.emit_sync(actor, Operation::Delete, Some(id), before.as_ref(), None)
    }
}

#[async_trait]
impl<T, S, R, U> AsyncObjectService<T> for AuditDecorator<S, R, U>
where
    T: Entity,
    S: AsyncObjectService<T>,
    R: AsyncReadRepository<T>,
    U: UserContext,
{
    async fn create(&self, mut entity: T) -> ServiceResult<T> {
        let actor = self.users.current_user();
        stamp_created(&mut entity, &actor);
        let created = self.inner.create(entity).await?;
        self.emit_async(actor, Operation::Create, created.id(), None, Some(&created))
            .await?;
        Ok(created)
    }

    async fn retrieve(&self, id: &T::Key) -> ServiceResult<Option<T>> {
        self.inner.retrieve(id).await
    }

    async fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> ServiceResult<Page<T>> {
        self.inner.retrieve_page(predicate, paging).await
    }

    async fn update(&self, mut entity: T) -> ServiceResult<T> {
        let actor = self.users.current_user();
        let before = match entity.id() {
            Some(id) => self.before_reader.retrieve(id).await?,
            None => None,
        };
        stamp_modified(&mut entity, before.as_ref(), &actor);
        let updated = self.inner.update(entity).await?;
        self.emit_async(
            actor,
            Operation::Update,
            updated.id(),
            before.as_ref(),
            Some(&updated),
        )
        .await?;
        Ok(updated)
    }

    async fn delete(&self, id: &T::Key) -> ServiceResult<()> {
        let actor = self.users.current_user();
        let before = self.before_reader.retrieve(id).await?;
        self.inner.delete(id).await?;
        self.emit_async(actor, Operation::Delete, Some(id), before.as_ref(), None)
            .await
    }
}
