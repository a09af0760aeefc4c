//! Store-agnostic persistence core.
//!
//! CRUD contracts over pluggable stores, plus composable cross-cutting
//! layers: audit, unit of work, soft delete, sync/async bridging and tenant
//! resolution. Layers are wired at construction time by wrapping one
//! component in another.

pub mod audit;
pub mod bridge;
pub mod config;
pub mod db;
pub mod filter;
pub mod locale;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod tenant;
pub mod uow;

pub use audit::decorator::AuditDecorator;
pub use audit::event::AuditEvent;
pub use audit::outbox::{AuditOutbox, OutboxUnitOfWork};
pub use audit::sink::{
    AuditReceipt, AuditSink, ChannelAuditSink, MemoryAuditSink, SinkError, SqliteAuditSink,
};
pub use audit::user_context::{StaticUserContext, UserContext};
pub use bridge::{BridgeError, SyncAsyncBridge};
pub use config::{CoreConfig, SyncAuditDispatch};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use filter::{DeletePolicy, FilterRegistry};
pub use locale::Locale;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{Entity, EntityKey, FieldValue, ValidationError};
pub use model::password::Password;
pub use model::user::User;
pub use repo::bridged::BridgedRepository;
pub use repo::contract::{
    AsyncReadRepository, AsyncRepository, ReadRepository, RepoError, RepoResult, Repository,
};
pub use repo::memory::MemoryRepository;
pub use repo::paging::{Page, Paging};
pub use repo::predicate::{Comparison, Predicate};
pub use repo::sqlite::{SqlEntity, SqliteRepository};
pub use service::contract::{
    AsyncObjectService, ObjectService, Operation, ServiceError, ServiceResult,
};
pub use service::repository_service::{AsyncRepositoryService, RepositoryService};
pub use tenant::{TenantError, TenantId, TenantMiddleware};
pub use uow::{
    CommandHandler, ServiceCommand, ServiceCommandHandler, SqliteUnitOfWork, UnitOfWork,
    UnitOfWorkDecorator, UnitOfWorkError,
};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
