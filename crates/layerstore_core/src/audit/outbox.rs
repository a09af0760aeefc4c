//! Commit-gated audit dispatch.
//!
//! # Responsibility
//! - Hold audit records produced inside a unit of work until it commits.
//! - Forward held records to the real sink after a successful commit, and
//!   drop them on rollback or a failed commit.
//!
//! # Invariants
//! - No record reaches the target sink before its unit of work committed.
//! - A dispatch failure after commit never rolls the mutation back.
//! - One outbox serves one unit-of-work chain at a time.

use crate::audit::sink::{AuditReceipt, AuditSink, SinkError, SinkResult};
use crate::config::SyncAuditDispatch;
use crate::uow::{UnitOfWork, UnitOfWorkError, UnitOfWorkResult};
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::{Arc, Mutex, PoisonError};

/// Buffering sink in front of a target sink.
///
/// Hand it to an [`AuditDecorator`](crate::audit::decorator::AuditDecorator)
/// and wrap the transaction in an [`OutboxUnitOfWork`] sharing the same
/// outbox.
pub struct AuditOutbox {
    target: Arc<dyn AuditSink>,
    pending: Mutex<Vec<String>>,
}

impl AuditOutbox {
    pub fn new(target: Arc<dyn AuditSink>) -> Self {
        Self {
            target,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Drops every held record and returns how many were dropped.
    pub fn discard(&self) -> usize {
        let mut pending = self.lock();
        let dropped = pending.len();
        pending.clear();
        dropped
    }

    /// Submits held records to the target in submission order.
    ///
    /// Every record is attempted once; the first failure is returned after
    /// the rest were tried.
    pub fn flush(&self) -> SinkResult<usize> {
        let records = std::mem::take(&mut *self.lock());
        let mut delivered = 0;
        let mut first_error: Option<SinkError> = None;
        for record in &records {
            match self.target.submit(record) {
                Ok(_) => delivered += 1,
                Err(err) => {
                    warn!("event=audit_flush module=audit status=error error={err}");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(delivered),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hold(&self, record: String) -> AuditReceipt {
        self.lock().push(record);
        AuditReceipt::allocate()
    }
}

#[async_trait]
impl AuditSink for AuditOutbox {
    fn submit(&self, record: &str) -> SinkResult<AuditReceipt> {
        Ok(self.hold(record.to_string()))
    }

    async fn submit_async(&self, record: String) -> SinkResult<AuditReceipt> {
        Ok(self.hold(record))
    }
}

/// Unit of work that releases an [`AuditOutbox`] on commit.
///
/// Commit failures discard held records. A flush failure after commit is
/// logged under `BestEffort` and surfaces as
/// [`UnitOfWorkError::AuditDispatch`] under `Required`; the commit stands
/// either way.
pub struct OutboxUnitOfWork<U> {
    unit: U,
    outbox: Arc<AuditOutbox>,
    dispatch: SyncAuditDispatch,
}

impl<U: UnitOfWork> OutboxUnitOfWork<U> {
    pub fn new(unit: U, outbox: Arc<AuditOutbox>) -> Self {
        Self {
            unit,
            outbox,
            dispatch: SyncAuditDispatch::default(),
        }
    }

    pub fn with_dispatch(mut self, dispatch: SyncAuditDispatch) -> Self {
        self.dispatch = dispatch;
        self
    }
}

impl<U: UnitOfWork> UnitOfWork for OutboxUnitOfWork<U> {
    fn begin(&mut self) -> UnitOfWorkResult<()> {
        let stale = self.outbox.discard();
        if stale > 0 {
            warn!("event=audit_outbox module=audit status=discarded cause=stale count={stale}");
        }
        self.unit.begin()
    }

    fn commit(&mut self) -> UnitOfWorkResult<()> {
        if let Err(err) = self.unit.commit() {
            let dropped = self.outbox.discard();
            debug!("event=audit_outbox module=audit status=discarded cause=commit_failed count={dropped}");
            return Err(err);
        }
        match self.outbox.flush() {
            Ok(delivered) => {
                debug!("event=audit_outbox module=audit status=flushed count={delivered}");
                Ok(())
            }
            Err(err) => match self.dispatch {
                SyncAuditDispatch::BestEffort => {
                    warn!("event=audit_outbox module=audit status=dropped error={err}");
                    Ok(())
                }
                SyncAuditDispatch::Required => Err(UnitOfWorkError::AuditDispatch(err)),
            },
        }
    }

    fn rollback(&mut self) -> UnitOfWorkResult<()> {
        let dropped = self.outbox.discard();
        debug!("event=audit_outbox module=audit status=discarded cause=rollback count={dropped}");
        self.unit.rollback()
    }
}

#[cfg(test)]
mod tests {
    use super::AuditOutbox;
    use crate::audit::sink::{AuditSink, MemoryAuditSink};
    use std::sync::Arc;

    #[test]
    fn held_records_reach_the_target_only_on_flush() {
        let target = Arc::new(MemoryAuditSink::new());
        let outbox = AuditOutbox::new(target.clone());
        outbox.submit("{\"n\":1}").unwrap();
        outbox.submit("{\"n\":2}").unwrap();
        assert_eq!(outbox.pending(), 2);
        assert!(target.is_empty());

        assert_eq!(outbox.flush().unwrap(), 2);
        assert_eq!(target.records(), vec!["{\"n\":1}", "{\"n\":2}"]);
        assert_eq!(outbox.pending(), 0);
    }

    #[test]
    fn discard_drops_held_records() {
        let target = Arc::new(MemoryAuditSink::new());
        let outbox = AuditOutbox::new(target.clone());
        outbox.submit("{}").unwrap();
        assert_eq!(outbox.discard(), 1);
        assert_eq!(outbox.flush().unwrap(), 0);
        assert!(target.is_empty());
    }
}
