use async_trait::async_trait;
use layerstore_core::audit::decorator::AuditDecorator;
use layerstore_core::audit::event::AuditEvent;
use layerstore_core::audit::sink::{
    AuditReceipt, AuditSink, MemoryAuditSink, SinkError, SinkResult, SqliteAuditSink,
};
use layerstore_core::audit::user_context::StaticUserContext;
use layerstore_core::bridge::SyncAsyncBridge;
use layerstore_core::config::{BridgeConfig, SyncAuditDispatch};
use layerstore_core::db::open_db_in_memory;
use layerstore_core::filter::{DeletePolicy, FilterRegistry};
use layerstore_core::model::password::Password;
use layerstore_core::model::user::User;
use layerstore_core::repo::memory::MemoryRepository;
use layerstore_core::repo::paging::{Page, Paging};
use layerstore_core::repo::predicate::Predicate;
use layerstore_core::repo::sqlite::SqliteRepository;
use layerstore_core::service::contract::{
    AsyncObjectService, ObjectService, Operation, ServiceError, ServiceResult,
};
use layerstore_core::service::repository_service::{AsyncRepositoryService, RepositoryService};
use std::sync::Arc;
use uuid::Uuid;

/// Returns whatever it is given, allocating an id on create.
struct EchoService;

impl ObjectService<Password> for EchoService {
    fn create(&self, mut entity: Password) -> ServiceResult<Password> {
        entity.id.get_or_insert_with(Uuid::new_v4);
        Ok(entity)
    }

    fn retrieve(&self, _id: &Uuid) -> ServiceResult<Option<Password>> {
        Ok(None)
    }

    fn retrieve_page(&self, _predicate: &Predicate, paging: Paging) -> ServiceResult<Page<Password>> {
        Ok(Page::empty(paging))
    }

    fn update(&self, entity: Password) -> ServiceResult<Password> {
        Ok(entity)
    }

    fn delete(&self, _id: &Uuid) -> ServiceResult<()> {
        Ok(())
    }
}

/// Fails every mutation with a validation error.
struct RefusingService;

impl ObjectService<Password> for RefusingService {
    fn create(&self, _entity: Password) -> ServiceResult<Password> {
        Err(layerstore_core::ValidationError::new("word", "refused").into())
    }

    fn retrieve(&self, _id: &Uuid) -> ServiceResult<Option<Password>> {
        Ok(None)
    }

    fn retrieve_page(&self, _predicate: &Predicate, paging: Paging) -> ServiceResult<Page<Password>> {
        Ok(Page::empty(paging))
    }

    fn update(&self, _entity: Password) -> ServiceResult<Password> {
        Err(layerstore_core::ValidationError::new("word", "refused").into())
    }

    fn delete(&self, id: &Uuid) -> ServiceResult<()> {
        Err(ServiceError::NotFound {
            entity: "Password",
            id: id.to_string(),
        })
    }
}

struct FailingSink;

#[async_trait]
impl AuditSink for FailingSink {
    fn submit(&self, _record: &str) -> SinkResult<AuditReceipt> {
        Err(SinkError::Rejected("sink offline".to_string()))
    }

    async fn submit_async(&self, _record: String) -> SinkResult<AuditReceipt> {
        Err(SinkError::Closed)
    }
}

fn registry() -> Arc<FilterRegistry> {
    FilterRegistry::builder(DeletePolicy::Soft)
        .register::<User>()
        .build()
}

#[test]
fn successful_create_emits_exactly_one_event() {
    let conn = open_db_in_memory().unwrap();
    let reader = SqliteRepository::<Password>::new(&conn, registry());
    let sink = Arc::new(MemoryAuditSink::new());
    let service = AuditDecorator::new(
        EchoService,
        reader,
        StaticUserContext::new("Raf"),
        sink.clone(),
    );

    let created = service.create(Password::new("abc")).unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.actor(), "Raf");
    assert_eq!(event.operation(), Operation::Create);
    assert_eq!(event.target_type(), "Password");
    assert_eq!(event.target_id(), created.id.unwrap().to_string());
    assert!(event.before().is_none());
    assert_eq!(event.after().unwrap()["word"], "abc");
}

#[test]
fn failed_mutations_emit_nothing_and_keep_the_error() {
    let conn = open_db_in_memory().unwrap();
    let reader = SqliteRepository::<Password>::new(&conn, registry());
    let sink = Arc::new(MemoryAuditSink::new());
    let service = AuditDecorator::new(
        RefusingService,
        reader,
        StaticUserContext::new("Raf"),
        sink.clone(),
    );

    let err = service.create(Password::new("abc")).unwrap_err();
    assert!(matches!(err, ServiceError::Validation(ref v) if v.message == "refused"));
    let err = service.delete(&Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    assert!(sink.is_empty());
}

#[test]
fn reads_pass_through_without_events() {
    let conn = open_db_in_memory().unwrap();
    let reader = SqliteRepository::<Password>::new(&conn, registry());
    let sink = Arc::new(MemoryAuditSink::new());
    let service = AuditDecorator::new(EchoService, reader, StaticUserContext::new("Raf"), sink.clone());

    assert_eq!(service.retrieve(&Uuid::new_v4()).unwrap(), None);
    service
        .retrieve_page(&Predicate::all(), Paging::new(0, 5))
        .unwrap();
    assert!(sink.is_empty());
}

#[test]
fn update_and_delete_capture_the_before_state() {
    let conn = open_db_in_memory().unwrap();
    let sink = Arc::new(MemoryAuditSink::new());
    let service = AuditDecorator::new(
        RepositoryService::new(SqliteRepository::<User>::new(&conn, registry())),
        SqliteRepository::<User>::new(&conn, registry()),
        StaticUserContext::new("Raf"),
        sink.clone(),
    );

    let created = service.create(User::new("raf", "raf@example.com")).unwrap();
    assert_eq!(created.audit.created_by.as_deref(), Some("Raf"));
    let id = created.id.unwrap();

    let mut changed = created.clone();
    changed.email = "new@example.com".to_string();
    changed.audit = Default::default();
    let updated = service.update(changed).unwrap();
    assert_eq!(updated.audit.created_by.as_deref(), Some("Raf"));
    assert_eq!(updated.audit.created_at_ms, created.audit.created_at_ms);
    assert_eq!(updated.audit.modified_by.as_deref(), Some("Raf"));

    service.delete(&id).unwrap();

    let events = sink.events();
    let operations: Vec<_> = events.iter().map(AuditEvent::operation).collect();
    assert_eq!(
        operations,
        vec![Operation::Create, Operation::Update, Operation::Delete]
    );
    assert_eq!(events[1].before().unwrap()["email"], "raf@example.com");
    assert_eq!(events[1].after().unwrap()["email"], "new@example.com");
    assert_eq!(events[2].before().unwrap()["email"], "new@example.com");
    assert!(events[2].after().is_none());
    assert_eq!(events[2].target_id(), id.to_string());
}

#[test]
fn best_effort_dispatch_keeps_the_mutation_result() {
    let conn = open_db_in_memory().unwrap();
    let service = AuditDecorator::new(
        RepositoryService::new(SqliteRepository::<Password>::new(&conn, registry())),
        SqliteRepository::<Password>::new(&conn, registry()),
        StaticUserContext::new("Raf"),
        Arc::new(FailingSink),
    );

    let created = service.create(Password::new("abc")).unwrap();
    assert!(service.retrieve(created.id.as_ref().unwrap()).unwrap().is_some());
}

#[test]
fn required_dispatch_surfaces_sink_failure_without_undoing_the_write() {
    let conn = open_db_in_memory().unwrap();
    let service = AuditDecorator::new(
        RepositoryService::new(SqliteRepository::<Password>::new(&conn, registry())),
        SqliteRepository::<Password>::new(&conn, registry()),
        StaticUserContext::new("Raf"),
        Arc::new(FailingSink),
    )
    .with_sync_dispatch(SyncAuditDispatch::Required);

    let err = service.create(Password::new("abc")).unwrap_err();
    assert!(matches!(err, ServiceError::AuditDispatch(SinkError::Rejected(_))));

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM passwords;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn sqlite_sink_appends_records() {
    let conn = open_db_in_memory().unwrap();
    let bridge = Arc::new(SyncAsyncBridge::new(&BridgeConfig::default()).unwrap());
    let sink = Arc::new(SqliteAuditSink::new(open_db_in_memory().unwrap(), bridge));
    let service = AuditDecorator::new(
        EchoService,
        SqliteRepository::<Password>::new(&conn, registry()),
        StaticUserContext::new("Raf"),
        sink.clone(),
    );

    service.create(Password::new("one")).unwrap();
    service.create(Password::new("two")).unwrap();

    let records = sink.records().unwrap();
    assert_eq!(records.len(), 2);
    let first = AuditEvent::from_record(&records[0]).unwrap();
    assert_eq!(first.after().unwrap()["word"], "one");
}

#[tokio::test]
async fn async_contract_awaits_dispatch() {
    let store = Arc::new(MemoryRepository::<User>::new(registry()));
    let sink = Arc::new(MemoryAuditSink::new());
    let service = AuditDecorator::new(
        AsyncRepositoryService::new(Arc::clone(&store)),
        Arc::clone(&store),
        StaticUserContext::new("Raf"),
        sink.clone(),
    );

    let created = service
        .create(User::new("raf", "raf@example.com"))
        .await
        .unwrap();
    // Dispatch completed before the call returned.
    assert_eq!(sink.len(), 1);

    service.delete(created.id.as_ref().unwrap()).await.unwrap();
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].operation(), Operation::Delete);
    assert_eq!(events[1].before().unwrap()["user_name"], "raf");
}

#[tokio::test]
async fn async_sink_failure_is_surfaced() {
    let store = Arc::new(MemoryRepository::<User>::new(registry()));
    let service = AuditDecorator::new(
        AsyncRepositoryService::new(Arc::clone(&store)),
        Arc::clone(&store),
        StaticUserContext::new("Raf"),
        Arc::new(FailingSink),
    );

    let err = service
        .create(User::new("raf", "raf@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AuditDispatch(SinkError::Closed)));
    assert_eq!(store.raw_records().await.len(), 1);
}
