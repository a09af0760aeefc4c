//! Business-facing object services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level CRUD.
//! - Provide the contract cross-cutting decorators wrap.

pub mod contract;
pub mod repository_service;
pub mod rules;
