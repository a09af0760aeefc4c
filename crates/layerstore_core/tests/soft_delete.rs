use layerstore_core::bridge::SyncAsyncBridge;
use layerstore_core::config::BridgeConfig;
use layerstore_core::db::open_db_in_memory;
use layerstore_core::filter::{DeletePolicy, FilterRegistry};
use layerstore_core::model::password::Password;
use layerstore_core::model::user::User;
use layerstore_core::repo::bridged::BridgedRepository;
use layerstore_core::repo::contract::{
    PagedRepository, ReadRepository, RepoError, WriteRepository,
};
use layerstore_core::repo::memory::MemoryRepository;
use layerstore_core::repo::paging::Paging;
use layerstore_core::repo::predicate::{Comparison, Predicate};
use layerstore_core::repo::sqlite::SqliteRepository;
use rusqlite::Connection;
use std::sync::Arc;

fn soft_registry() -> Arc<FilterRegistry> {
    FilterRegistry::builder(DeletePolicy::Soft)
        .register::<User>()
        .build()
}

fn raw_flag(conn: &Connection, id: &str) -> Option<i64> {
    conn.query_row(
        "SELECT is_deleted FROM users WHERE id = ?1;",
        [id],
        |row| row.get(0),
    )
    .ok()
}

#[test]
fn soft_delete_sets_flag_and_hides_record() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRepository::<User>::new(&conn, soft_registry());
    let created = repo.create(User::new("raf", "raf@example.com")).unwrap();
    let id = created.id.unwrap();

    repo.delete(&id).unwrap();

    assert_eq!(raw_flag(&conn, &id.to_string()), Some(1));
    assert_eq!(repo.retrieve(&id).unwrap(), None);
    let page = repo
        .retrieve_page(&Predicate::all(), Paging::new(0, 10))
        .unwrap();
    assert!(page.is_empty());
}

#[test]
fn tombstoned_rows_are_invisible_to_update_and_delete() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO users (id, user_name, email, is_deleted)
         VALUES ('5f0c3c1e-7f43-4c7f-9a34-2f5b1e0d8a11', 'ghost', 'g@example.com', 1);",
        [],
    )
    .unwrap();
    let repo = SqliteRepository::<User>::new(&conn, soft_registry());
    let id = uuid::Uuid::parse_str("5f0c3c1e-7f43-4c7f-9a34-2f5b1e0d8a11").unwrap();

    assert_eq!(repo.retrieve(&id).unwrap(), None);

    let mut revived = User::new("ghost", "g@example.com");
    revived.id = Some(id);
    assert!(matches!(
        repo.update(&revived).unwrap_err(),
        RepoError::NotFound { .. }
    ));
    assert!(matches!(
        repo.delete(&id).unwrap_err(),
        RepoError::NotFound { .. }
    ));
}

#[test]
fn caller_predicate_cannot_reach_deleted_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteRepository::<User>::new(&conn, soft_registry());
    let kept = repo.create(User::new("kept", "k@example.com")).unwrap();
    let gone = repo.create(User::new("gone", "g@example.com")).unwrap();
    repo.delete(gone.id.as_ref().unwrap()).unwrap();

    let asking_for_deleted = repo
        .retrieve_page(&Predicate::field_eq("is_deleted", true), Paging::new(0, 10))
        .unwrap();
    assert!(asking_for_deleted.is_empty());

    let by_name = repo
        .retrieve_page(
            &Predicate::compare("user_name", Comparison::Ne, "nobody"),
            Paging::new(0, 10),
        )
        .unwrap();
    assert_eq!(by_name.into_items(), vec![kept]);
}

#[test]
fn hard_policy_removes_the_row() {
    let conn = open_db_in_memory().unwrap();
    let registry = FilterRegistry::builder(DeletePolicy::Hard)
        .register::<User>()
        .build();
    let repo = SqliteRepository::<User>::new(&conn, registry);
    let created = repo.create(User::new("raf", "raf@example.com")).unwrap();
    let id = created.id.unwrap();

    repo.delete(&id).unwrap();

    assert_eq!(raw_flag(&conn, &id.to_string()), None);
}

#[test]
fn types_without_the_capability_are_hard_deleted() {
    let conn = open_db_in_memory().unwrap();
    let registry = FilterRegistry::builder(DeletePolicy::Soft)
        .register::<Password>()
        .build();
    let repo = SqliteRepository::<Password>::new(&conn, registry);
    let created = repo.create(Password::new("abc")).unwrap();

    repo.delete(created.id.as_ref().unwrap()).unwrap();

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM passwords;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn unregistered_types_see_every_row() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO users (id, user_name, email, is_deleted)
         VALUES ('0b9a2a5e-4c1d-4a43-8d52-7c1e6f3a9b20', 'ghost', 'g@example.com', 1);",
        [],
    )
    .unwrap();
    let repo = SqliteRepository::<User>::new(&conn, FilterRegistry::empty());

    let page = repo
        .retrieve_page(&Predicate::all(), Paging::new(0, 10))
        .unwrap();
    assert_eq!(page.len(), 1);
    assert!(page.items[0].is_deleted);
}

#[test]
fn bridged_memory_store_applies_the_same_filter() {
    let bridge = Arc::new(SyncAsyncBridge::new(&BridgeConfig::default()).unwrap());
    let store = Arc::new(MemoryRepository::<User>::new(soft_registry()));
    let repo = BridgedRepository::new(Arc::clone(&store), bridge);

    let created = repo.create(User::new("raf", "raf@example.com")).unwrap();
    let id = created.id.unwrap();
    repo.delete(&id).unwrap();

    assert_eq!(repo.retrieve(&id).unwrap(), None);
    let raw = futures::executor::block_on(store.raw_record(&id)).unwrap();
    assert!(raw.is_deleted);
}
