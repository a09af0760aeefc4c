//! Transactional command execution.
//!
//! # Responsibility
//! - Run one command handler inside one unit of work.
//! - Bundle a SQLite unit of work and a service command adapter.
//!
//! # Invariants
//! - `begin` runs before the handler; a failed begin skips the handler.
//! - Exactly one of `commit`/`rollback` runs per handled command.
//! - A handler error is returned unchanged after rollback; a handler panic is
//!   resumed with its original payload after rollback.
//! - A unit of work is never shared across commands.
//! - A failed commit is returned without calling `rollback`.

use crate::audit::sink::SinkError;
use crate::model::entity::Entity;
use crate::service::contract::{ObjectService, ServiceError};
use log::{debug, error};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

pub type UnitOfWorkResult<T> = Result<T, UnitOfWorkError>;

/// Transaction boundary failure.
#[derive(Debug)]
pub enum UnitOfWorkError {
    Sqlite(rusqlite::Error),
    /// Call out of order, e.g. commit before begin.
    InvalidState(&'static str),
    /// Committed, but held audit records could not be dispatched.
    AuditDispatch(SinkError),
}

impl Display for UnitOfWorkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "transaction failure: {err}"),
            Self::InvalidState(message) => write!(f, "invalid unit of work state: {message}"),
            Self::AuditDispatch(err) => write!(f, "committed, audit dispatch failed: {err}"),
        }
    }
}

impl Error for UnitOfWorkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::AuditDispatch(err) => Some(err),
            Self::InvalidState(_) => None,
        }
    }
}

impl From<rusqlite::Error> for UnitOfWorkError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// One transactional boundary.
pub trait UnitOfWork {
    fn begin(&mut self) -> UnitOfWorkResult<()>;
    fn commit(&mut self) -> UnitOfWorkResult<()>;
    fn rollback(&mut self) -> UnitOfWorkResult<()>;
}

/// Handles one command kind.
pub trait CommandHandler<C> {
    type Output;
    type Error;

    fn handle(&self, command: C) -> Result<Self::Output, Self::Error>;
}

/// Wraps a handler so every command runs in a fresh unit of work.
///
/// `factory` is called once per command.
pub struct UnitOfWorkDecorator<H, F> {
    handler: H,
    factory: F,
}

impl<H, F> UnitOfWorkDecorator<H, F> {
    pub fn new(handler: H, factory: F) -> Self {
        Self { handler, factory }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<C, H, F, U> CommandHandler<C> for UnitOfWorkDecorator<H, F>
where
    H: CommandHandler<C>,
    H::Error: From<UnitOfWorkError>,
    F: Fn() -> U,
    U: UnitOfWork,
{
    type Output = H::Output;
    type Error = H::Error;

    fn handle(&self, command: C) -> Result<Self::Output, Self::Error> {
        let started_at = Instant::now();
        let mut unit = (self.factory)();
        unit.begin()?;

        match panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle(command))) {
            Ok(Ok(output)) => {
                unit.commit()?;
                debug!(
                    "event=uow_complete module=uow status=committed duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(output)
            }
            Ok(Err(err)) => {
                rollback_logged(&mut unit, "handler_error");
                Err(err)
            }
            Err(payload) => {
                rollback_logged(&mut unit, "handler_panic");
                panic::resume_unwind(payload)
            }
        }
    }
}

fn rollback_logged<U: UnitOfWork>(unit: &mut U, cause: &str) {
    match unit.rollback() {
        Ok(()) => debug!("event=uow_complete module=uow status=rolled_back cause={cause}"),
        Err(err) => error!(
            "event=uow_rollback module=uow status=error cause={cause} error={err}"
        ),
    }
}

/// Unit of work over a borrowed SQLite connection.
///
/// Uses `BEGIN IMMEDIATE` so the write lock is taken up front. A transaction
/// still open on drop is rolled back.
pub struct SqliteUnitOfWork<'conn> {
    conn: &'conn Connection,
    active: bool,
}

impl<'conn> SqliteUnitOfWork<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl UnitOfWork for SqliteUnitOfWork<'_> {
    fn begin(&mut self) -> UnitOfWorkResult<()> {
        if self.active {
            return Err(UnitOfWorkError::InvalidState("begin called twice"));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        self.active = true;
        Ok(())
    }

    fn commit(&mut self) -> UnitOfWorkResult<()> {
        if !self.active {
            return Err(UnitOfWorkError::InvalidState("commit without begin"));
        }
        self.conn.execute_batch("COMMIT;")?;
        self.active = false;
        Ok(())
    }

    fn rollback(&mut self) -> UnitOfWorkResult<()> {
        if !self.active {
            return Err(UnitOfWorkError::InvalidState("rollback without begin"));
        }
        self.active = false;
        self.conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }
}

impl Drop for SqliteUnitOfWork<'_> {
    fn drop(&mut self) {
        if self.active {
            if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
                error!("event=uow_drop module=uow status=error error={err}");
            }
        }
    }
}

/// Mutating service call expressed as a command.
#[derive(Debug, Clone)]
pub enum ServiceCommand<T: Entity> {
    Create(T),
    Update(T),
    Delete(T::Key),
}

/// Dispatches [`ServiceCommand`]s to an object service.
///
/// Output is the stored entity, or `None` for deletes.
pub struct ServiceCommandHandler<T, S> {
    service: S,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, S: ObjectService<T>> ServiceCommandHandler<T, S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity, S: ObjectService<T>> CommandHandler<ServiceCommand<T>>
    for ServiceCommandHandler<T, S>
{
    type Output = Option<T>;
    type Error = ServiceError;

    fn handle(&self, command: ServiceCommand<T>) -> Result<Option<T>, ServiceError> {
        match command {
            ServiceCommand::Create(entity) => self.service.create(entity).map(Some),
            ServiceCommand::Update(entity) => self.service.update(entity).map(Some),
            ServiceCommand::Delete(id) => self.service.delete(&id).map(|()| None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SqliteUnitOfWork, UnitOfWork, UnitOfWorkError};
    use crate::db::open_db_in_memory;

    #[test]
    fn sqlite_unit_rejects_out_of_order_calls() {
        let conn = open_db_in_memory().unwrap();
        let mut unit = SqliteUnitOfWork::new(&conn);
        assert!(matches!(unit.commit(), Err(UnitOfWorkError::InvalidState(_))));
        unit.begin().unwrap();
        assert!(matches!(unit.begin(), Err(UnitOfWorkError::InvalidState(_))));
        unit.rollback().unwrap();
        assert!(!unit.is_active());
    }

    #[test]
    fn dropping_an_open_unit_rolls_back() {
        let conn = open_db_in_memory().unwrap();
        {
            let mut unit = SqliteUnitOfWork::new(&conn);
            unit.begin().unwrap();
            conn.execute("INSERT INTO passwords (id, word) VALUES ('p1', 'abc');", [])
                .unwrap();
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM passwords;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
