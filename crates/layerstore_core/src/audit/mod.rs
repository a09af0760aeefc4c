//! Audit trail: immutable events, sinks, and the service decorator.
//!
//! # Responsibility
//! - Capture one immutable event per successful mutating service call.
//! - Dispatch serialized events to pluggable sinks.
//! - Hold events raised inside a transaction until it commits.
//!
//! # Invariants
//! - Events are built only after the wrapped mutation succeeded.
//! - Sink failures never reverse an already-applied mutation.

pub mod decorator;
pub mod event;
pub mod outbox;
pub mod sink;
pub mod user_context;
