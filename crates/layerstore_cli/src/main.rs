//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `layerstore_core` linkage and layer wiring end to end.
//! - Keep output deterministic apart from generated ids.
//!
//! Reads an optional JSON configuration document from the first argument.

use layerstore_core::audit::decorator::AuditDecorator;
use layerstore_core::audit::outbox::{AuditOutbox, OutboxUnitOfWork};
use layerstore_core::audit::sink::MemoryAuditSink;
use layerstore_core::audit::user_context::StaticUserContext;
use layerstore_core::repo::paging::Paging;
use layerstore_core::repo::predicate::Predicate;
use layerstore_core::service::rules::UserRules;
use layerstore_core::{
    logging, open_db_in_memory, CommandHandler, CoreConfig, FilterRegistry, ObjectService,
    RepositoryService, ServiceCommand, ServiceCommandHandler, SqliteRepository, SqliteUnitOfWork,
    UnitOfWorkDecorator, User,
};
use log::info;
use std::error::Error;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => CoreConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => CoreConfig::default(),
    };
    logging::init_from_config(&config.logging)?;

    println!("layerstore_core ping={}", layerstore_core::ping());
    println!("layerstore_core version={}", layerstore_core::core_version());

    let conn = open_db_in_memory()?;
    let filters = FilterRegistry::builder(config.delete_policy)
        .register::<User>()
        .build();
    let sink = Arc::new(MemoryAuditSink::new());
    let outbox = Arc::new(AuditOutbox::new(sink.clone()));

    let audited = AuditDecorator::new(
        RepositoryService::with_rules(SqliteRepository::<User>::new(&conn, Arc::clone(&filters)), UserRules),
        SqliteRepository::<User>::new(&conn, Arc::clone(&filters)),
        StaticUserContext::new("layerstore-cli"),
        outbox.clone(),
    );
    let commands = UnitOfWorkDecorator::new(ServiceCommandHandler::new(&audited), || {
        OutboxUnitOfWork::new(SqliteUnitOfWork::new(&conn), Arc::clone(&outbox))
            .with_dispatch(config.audit.sync_dispatch)
    });

    let stored = commands
        .handle(ServiceCommand::Create(User::new("smoke", "smoke@example.com")))?
        .ok_or("create returned no entity")?;
    let id = stored.id.ok_or("create returned no id")?;
    println!("created user id={id}");

    commands.handle(ServiceCommand::Delete(id))?;
    let visible = audited.retrieve_page(&Predicate::all(), Paging::new(0, 10))?;
    println!("visible users after delete={}", visible.len());
    println!("audit events={}", sink.len());

    info!("event=cli_smoke module=cli status=ok audit_events={}", sink.len());
    Ok(())
}
