//! Immutable audit event.

use crate::audit::sink::SinkError;
use crate::model::entity::{now_epoch_ms, Entity};
use crate::service::contract::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot of one successful mutation.
///
/// Fields are private: an event cannot change after capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    actor: String,
    operation: Operation,
    target_type: String,
    target_id: String,
    before: Option<Value>,
    after: Option<Value>,
    timestamp_ms: i64,
}

impl AuditEvent {
    /// Captures an event for entity type `T`, stamped with the current time.
    pub fn capture<T: Entity>(
        actor: impl Into<String>,
        operation: Operation,
        target_id: Option<&T::Key>,
        before: Option<&T>,
        after: Option<&T>,
    ) -> Result<Self, SinkError> {
        Ok(Self {
            actor: actor.into(),
            operation,
            target_type: T::ENTITY_NAME.to_string(),
            target_id: target_id.map(ToString::to_string).unwrap_or_default(),
            before: before.map(serde_json::to_value).transpose()?,
            after: after.map(serde_json::to_value).transpose()?,
            timestamp_ms: now_epoch_ms(),
        })
    }

    /// Parses an event back from its sink record.
    pub fn from_record(record: &str) -> Result<Self, SinkError> {
        Ok(serde_json::from_str(record)?)
    }

    /// Serializes the event into the record handed to sinks.
    pub fn to_record(&self) -> Result<String, SinkError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn before(&self) -> Option<&Value> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&Value> {
        self.after.as_ref()
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}
