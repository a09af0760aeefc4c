//! Repository layer: capability contracts and bundled stores.
//!
//! # Responsibility
//! - Define composable CRUD capabilities in sync and async forms.
//! - Provide SQLite, in-memory and bridged stores behind those contracts.
//!
//! # Invariants
//! - Every store scopes reads and writes through the shared
//!   [`crate::filter::FilterRegistry`].
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to transport errors.

pub mod bridged;
pub mod contract;
pub mod memory;
pub mod paging;
pub mod predicate;
pub mod sqlite;
