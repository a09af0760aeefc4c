//! Generic SQLite repository.
//!
//! # Responsibility
//! - Provide the CRUD capabilities for any entity with a table mapping.
//! - Render declarative predicates into parameterized SQL.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `Entity::validate()` before SQL mutations.
//! - Every statement touching rows is scoped by the registry's standing
//!   filter for the entity type.
//! - Predicate fields are checked against the entity's column list; values are
//!   always bound, never interpolated.
//! - Pages are ordered by insertion (`rowid`).

use crate::filter::{DeletePolicy, FilterRegistry};
use crate::model::entity::{Entity, EntityKey, FieldValue, ValidationError, ID_FIELD};
use crate::model::password::Password;
use crate::model::user::User;
use crate::repo::contract::{
    PagedRepository, ReadRepository, RepoError, RepoResult, WriteRepository,
};
use crate::repo::paging::{Page, Paging};
use crate::repo::predicate::{Comparison, Predicate};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, Row};
use std::marker::PhantomData;
use std::sync::Arc;

/// Table mapping for entities stored by [`SqliteRepository`].
///
/// The key lives in an `id` column; `COLUMNS` lists the data columns in bind
/// order and must match the names `Entity::field` answers to.
pub trait SqlEntity: Entity {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> RepoResult<Self>;
}

/// SQLite-backed repository for one entity type.
pub struct SqliteRepository<'conn, T> {
    conn: &'conn Connection,
    filters: Arc<FilterRegistry>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for SqliteRepository<'_, T> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn,
            filters: Arc::clone(&self.filters),
            _entity: PhantomData,
        }
    }
}

impl<'conn, T: SqlEntity> SqliteRepository<'conn, T> {
    pub fn new(conn: &'conn Connection, filters: Arc<FilterRegistry>) -> Self {
        Self {
            conn,
            filters,
            _entity: PhantomData,
        }
    }

    fn select(&self, predicate: &Predicate, tail: &str, extra: Vec<Value>) -> RepoResult<Vec<T>> {
        let scoped = self.filters.scope::<T>(predicate);
        let (where_sql, mut binds) = render_where::<T>(&scoped)?;
        binds.extend(extra);

        let sql = format!(
            "SELECT id, {} FROM {}{where_sql}{tail};",
            T::COLUMNS.join(", "),
            T::TABLE
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(T::from_row(row)?);
        }
        Ok(entities)
    }

    /// Rewrites every data column of a visible row. Returns changed rows.
    fn write_row(&self, entity: &T, id: &T::Key) -> RepoResult<usize> {
        let assignments = T::COLUMNS
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let scoped = self.filters.scope::<T>(&id_predicate::<T>(id));
        let (where_sql, where_binds) = render_where::<T>(&scoped)?;

        let mut binds = column_values(entity);
        binds.extend(where_binds);
        let changed = self.conn.execute(
            &format!("UPDATE {} SET {assignments}{where_sql};", T::TABLE),
            params_from_iter(binds),
        )?;
        Ok(changed)
    }

    fn remove(&self, id: &T::Key) -> RepoResult<()> {
        let scoped = self.filters.scope::<T>(&id_predicate::<T>(id));
        let (where_sql, binds) = render_where::<T>(&scoped)?;
        let changed = self.conn.execute(
            &format!("DELETE FROM {}{where_sql};", T::TABLE),
            params_from_iter(binds),
        )?;
        if changed == 0 {
            return Err(RepoError::not_found::<T>(id));
        }
        Ok(())
    }
}

impl<T: SqlEntity> ReadRepository<T> for SqliteRepository<'_, T> {
    fn retrieve(&self, id: &T::Key) -> RepoResult<Option<T>> {
        let mut found = self.select(&id_predicate::<T>(id), " LIMIT 1", Vec::new())?;
        Ok(found.pop())
    }
}

impl<T: SqlEntity> PagedRepository<T> for SqliteRepository<'_, T> {
    fn retrieve_page(&self, predicate: &Predicate, paging: Paging) -> RepoResult<Page<T>> {
        if paging.is_empty_request() {
            return Ok(Page::empty(paging));
        }
        let offset = i64::try_from(paging.offset())
            .map_err(|_| RepoError::InvalidQuery(format!("page offset too large: {}", paging.offset())))?;
        let items = self.select(
            predicate,
            " ORDER BY rowid ASC LIMIT ? OFFSET ?",
            vec![
                Value::Integer(i64::from(paging.page_size)),
                Value::Integer(offset),
            ],
        )?;
        Ok(Page::new(items, paging))
    }
}

impl<T: SqlEntity> WriteRepository<T> for SqliteRepository<'_, T> {
    fn create(&self, mut entity: T) -> RepoResult<T> {
        entity.validate()?;
        let id = match entity.id() {
            Some(id) => id.clone(),
            None => {
                let id = T::Key::allocate();
                entity.assign_id(id.clone());
                id
            }
        };

        let placeholders = vec!["?"; T::COLUMNS.len() + 1].join(", ");
        let mut binds = vec![to_sql_value(&id.to_field())];
        binds.extend(column_values(&entity));

        let result = self.conn.execute(
            &format!(
                "INSERT INTO {} (id, {}) VALUES ({placeholders});",
                T::TABLE,
                T::COLUMNS.join(", ")
            ),
            params_from_iter(binds),
        );
        match result {
            Ok(_) => Ok(entity),
            Err(err) if is_key_conflict(&err) => Err(RepoError::conflict::<T>(&id)),
            Err(err) => Err(err.into()),
        }
    }

    fn update(&self, entity: &T) -> RepoResult<()> {
        entity.validate()?;
        let id = entity
            .id()
            .ok_or_else(|| ValidationError::new(ID_FIELD, "required for update"))?;
        if self.write_row(entity, id)? == 0 {
            return Err(RepoError::not_found::<T>(id));
        }
        Ok(())
    }

    fn delete(&self, id: &T::Key) -> RepoResult<()> {
        if self.filters.delete_policy::<T>() == DeletePolicy::Hard {
            return self.remove(id);
        }

        let mut entity = self
            .retrieve(id)?
            .ok_or_else(|| RepoError::not_found::<T>(id))?;
        match entity.as_soft_deletable_mut() {
            Some(flag) => flag.mark_deleted(),
            None => return self.remove(id),
        }
        if self.write_row(&entity, id)? == 0 {
            return Err(RepoError::not_found::<T>(id));
        }
        Ok(())
    }
}

fn id_predicate<T: Entity>(id: &T::Key) -> Predicate {
    Predicate::field_eq(ID_FIELD, id.to_field())
}

fn column_values<T: SqlEntity>(entity: &T) -> Vec<Value> {
    T::COLUMNS
        .iter()
        .map(|column| to_sql_value(&entity.field(column).unwrap_or(FieldValue::Null)))
        .collect()
}

fn known_column<T: SqlEntity>(field: &str) -> RepoResult<&'static str> {
    if field == ID_FIELD {
        return Ok(ID_FIELD);
    }
    T::COLUMNS
        .iter()
        .copied()
        .find(|column| *column == field)
        .ok_or_else(|| {
            RepoError::InvalidQuery(format!("unknown field `{field}` for {}", T::ENTITY_NAME))
        })
}

/// Renders a conjunction as ` WHERE a IS ? AND ...`; empty predicates render
/// to an empty string.
fn render_where<T: SqlEntity>(predicate: &Predicate) -> RepoResult<(String, Vec<Value>)> {
    if predicate.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut parts = Vec::with_capacity(predicate.clauses().len());
    let mut binds = Vec::with_capacity(predicate.clauses().len());
    for clause in predicate.clauses() {
        let column = known_column::<T>(&clause.field)?;
        let fragment = match clause.comparison {
            Comparison::Eq => format!("{column} IS ?"),
            Comparison::Ne => format!("{column} IS NOT ?"),
            Comparison::Lt => format!("{column} < ?"),
            Comparison::Le => format!("{column} <= ?"),
            Comparison::Gt => format!("{column} > ?"),
            Comparison::Ge => format!("{column} >= ?"),
            Comparison::Contains => {
                if !matches!(clause.value, FieldValue::Text(_)) {
                    return Err(RepoError::InvalidQuery(format!(
                        "`contains` on `{column}` needs a text value"
                    )));
                }
                format!("instr({column}, ?) > 0")
            }
        };
        parts.push(fragment);
        binds.push(to_sql_value(&clause.value));
    }

    Ok((format!(" WHERE {}", parts.join(" AND ")), binds))
}

fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(flag) => Value::Integer(i64::from(*flag)),
        FieldValue::Integer(number) => Value::Integer(*number),
        FieldValue::Text(text) => Value::Text(text.clone()),
    }
}

fn is_key_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}

fn read_key<K: EntityKey>(row: &Row<'_>, table: &str) -> RepoResult<K> {
    let raw = match row.get_ref(ID_FIELD)? {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(number) => FieldValue::Integer(number),
        ValueRef::Text(bytes) => FieldValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Real(_) | ValueRef::Blob(_) => {
            return Err(RepoError::InvalidData(format!(
                "unsupported key storage class in {table}.id"
            )));
        }
    };
    K::from_field(&raw)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid key `{raw}` in {table}.id")))
}

fn read_flag(row: &Row<'_>, table: &str, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {table}.{column}"
        ))),
    }
}

impl SqlEntity for Password {
    const TABLE: &'static str = "passwords";
    const COLUMNS: &'static [&'static str] = &["word"];

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: Some(read_key(row, Self::TABLE)?),
            word: row.get("word")?,
        })
    }
}

impl SqlEntity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "user_name",
        "email",
        "is_deleted",
        "created_by",
        "created_at_ms",
        "modified_by",
        "modified_at_ms",
    ];

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let mut user = User::new(row.get::<_, String>("user_name")?, row.get::<_, String>("email")?);
        user.id = Some(read_key(row, Self::TABLE)?);
        user.is_deleted = read_flag(row, Self::TABLE, "is_deleted")?;
        user.audit.created_by = row.get("created_by")?;
        user.audit.created_at_ms = row.get("created_at_ms")?;
        user.audit.modified_by = row.get("modified_by")?;
        user.audit.modified_at_ms = row.get("modified_at_ms")?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::render_where;
    use crate::model::user::User;
    use crate::repo::contract::RepoError;
    use crate::repo::predicate::{Comparison, Predicate};
    use rusqlite::types::Value;

    #[test]
    fn renders_conjunction_with_bound_values() {
        let predicate = Predicate::field_eq("user_name", "raf").and_compare(
            "is_deleted",
            Comparison::Eq,
            false,
        );
        let (sql, binds) = render_where::<User>(&predicate).unwrap();
        assert_eq!(sql, " WHERE user_name IS ? AND is_deleted IS ?");
        assert_eq!(binds, vec![Value::Text("raf".to_string()), Value::Integer(0)]);
    }

    #[test]
    fn rejects_fields_outside_column_list() {
        let predicate = Predicate::field_eq("1=1; DROP TABLE users; --", "x");
        let err = render_where::<User>(&predicate).unwrap_err();
        assert!(matches!(err, RepoError::InvalidQuery(_)));
    }

    #[test]
    fn empty_predicate_renders_no_where_clause() {
        let (sql, binds) = render_where::<User>(&Predicate::all()).unwrap();
        assert!(sql.is_empty());
        assert!(binds.is_empty());
    }
}
