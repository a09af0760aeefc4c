//! Audit sinks.
//!
//! # Responsibility
//! - Accept serialized audit records (one JSON document per event).
//! - Offer in-memory, channel and SQLite-backed destinations.
//!
//! # Invariants
//! - A sink either accepts a record whole and returns a receipt, or rejects it
//!   with a [`SinkError`]; partial writes are never acknowledged.
//! - Sinks never inspect record contents beyond storing them.

use crate::audit::event::AuditEvent;
use crate::bridge::{BridgeError, SyncAsyncBridge};
use crate::db::DbError;
use crate::model::entity::now_epoch_ms;
use async_trait::async_trait;
use log::debug;
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use uuid::Uuid;

pub type SinkResult<T> = Result<T, SinkError>;

/// Audit dispatch failure.
#[derive(Debug)]
pub enum SinkError {
    Serialize(serde_json::Error),
    /// Sink refused the record.
    Rejected(String),
    /// Receiving side is gone.
    Closed,
    /// Bounded buffer is full.
    Full,
    Storage(DbError),
    Bridge(BridgeError),
}

impl Display for SinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialize(err) => write!(f, "failed to serialize audit record: {err}"),
            Self::Rejected(reason) => write!(f, "audit record rejected: {reason}"),
            Self::Closed => write!(f, "audit sink is closed"),
            Self::Full => write!(f, "audit sink buffer is full"),
            Self::Storage(err) => write!(f, "audit storage failure: {err}"),
            Self::Bridge(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SinkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialize(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Bridge(err) => Some(err),
            Self::Rejected(_) | Self::Closed | Self::Full => None,
        }
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

impl From<rusqlite::Error> for SinkError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}

impl From<BridgeError> for SinkError {
    fn from(value: BridgeError) -> Self {
        Self::Bridge(value)
    }
}

/// Acknowledgement of one accepted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuditReceipt(String);

impl AuditReceipt {
    pub(crate) fn allocate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AuditReceipt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Destination for serialized audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    fn submit(&self, record: &str) -> SinkResult<AuditReceipt>;

    async fn submit_async(&self, record: String) -> SinkResult<AuditReceipt>;
}

/// Keeps records in process memory, in submission order.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<String>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Parses every stored record; unparsable records are skipped.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.records()
            .iter()
            .filter_map(|record| AuditEvent::from_record(record).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, record: &str) -> AuditReceipt {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.to_string());
        AuditReceipt::allocate()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    fn submit(&self, record: &str) -> SinkResult<AuditReceipt> {
        Ok(self.push(record))
    }

    async fn submit_async(&self, record: String) -> SinkResult<AuditReceipt> {
        Ok(self.push(&record))
    }
}

/// Forwards records over a bounded channel to a background consumer.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    sender: Sender<String>,
}

impl ChannelAuditSink {
    /// Creates the sink together with the consumer's receiving end.
    pub fn new(capacity: usize) -> (Self, Receiver<String>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl AuditSink for ChannelAuditSink {
    fn submit(&self, record: &str) -> SinkResult<AuditReceipt> {
        self.sender
            .try_send(record.to_string())
            .map_err(|err| match err {
                TrySendError::Full(_) => SinkError::Full,
                TrySendError::Closed(_) => SinkError::Closed,
            })?;
        Ok(AuditReceipt::allocate())
    }

    async fn submit_async(&self, record: String) -> SinkResult<AuditReceipt> {
        self.sender
            .send(record)
            .await
            .map_err(|_| SinkError::Closed)?;
        Ok(AuditReceipt::allocate())
    }
}

/// Appends records to the `audit_events` table.
///
/// The async path moves the blocking insert onto the bridge pool.
pub struct SqliteAuditSink {
    conn: Arc<Mutex<Connection>>,
    bridge: Arc<SyncAsyncBridge>,
}

impl SqliteAuditSink {
    /// `conn` must already be migrated (see [`crate::db::open_db`]).
    pub fn new(conn: Connection, bridge: Arc<SyncAsyncBridge>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            bridge,
        }
    }

    /// Returns stored records in insertion order.
    pub fn records(&self) -> SinkResult<Vec<String>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn.prepare("SELECT record FROM audit_events ORDER BY seq ASC;")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

fn insert_record(conn: &Mutex<Connection>, record: &str) -> SinkResult<AuditReceipt> {
    let receipt = AuditReceipt::allocate();
    let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
    conn.execute(
        "INSERT INTO audit_events (receipt, record, received_at_ms) VALUES (?1, ?2, ?3);",
        params![receipt.as_str(), record, now_epoch_ms()],
    )?;
    debug!(
        "event=audit_store module=audit status=ok receipt={}",
        receipt.as_str()
    );
    Ok(receipt)
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    fn submit(&self, record: &str) -> SinkResult<AuditReceipt> {
        insert_record(&self.conn, record)
    }

    async fn submit_async(&self, record: String) -> SinkResult<AuditReceipt> {
        let conn = Arc::clone(&self.conn);
        self.bridge
            .offload(move || insert_record(&conn, &record))
            .await?
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditSink, ChannelAuditSink, MemoryAuditSink, SinkError};

    #[test]
    fn memory_sink_keeps_submission_order() {
        let sink = MemoryAuditSink::new();
        sink.submit("{\"n\":1}").unwrap();
        sink.submit("{\"n\":2}").unwrap();
        assert_eq!(sink.records(), vec!["{\"n\":1}", "{\"n\":2}"]);
    }

    #[test]
    fn channel_sink_reports_full_and_closed() {
        let (sink, receiver) = ChannelAuditSink::new(1);
        sink.submit("a").unwrap();
        assert!(matches!(sink.submit("b"), Err(SinkError::Full)));
        drop(receiver);
        assert!(matches!(sink.submit("c"), Err(SinkError::Closed)));
    }

    #[tokio::test]
    async fn channel_sink_delivers_async_records() {
        let (sink, mut receiver) = ChannelAuditSink::new(4);
        sink.submit_async("x".to_string()).await.unwrap();
        assert_eq!(receiver.recv().await.as_deref(), Some("x"));
    }
}
