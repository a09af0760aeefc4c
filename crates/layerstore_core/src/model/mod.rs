//! Domain model contracts and bundled entities.
//!
//! # Responsibility
//! - Define the capability traits every persisted object builds on.
//! - Provide the bundled `Password` and `User` entities.
//!
//! # Invariants
//! - Every entity is identified by a stable key once created.
//! - Soft-deletable entities are tombstoned, never silently dropped, under the
//!   soft delete policy.

pub mod entity;
pub mod password;
pub mod user;
