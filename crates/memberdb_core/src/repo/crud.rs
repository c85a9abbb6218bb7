//! Shared CRUD paths and repository errors.
//!
//! # Responsibility
//! - Save (insert or update with audit stamping), load, count and delete any
//!   [`Entity`].
//! - Verify that a connection carries the expected schema before a repository
//!   is handed out.
//!
//! # Invariants
//! - Writes call `Entity::validate()` before touching the store.
//! - `created_date` is written once on insert and kept on every later save.
//! - Every saved or loaded entity is managed by the caller's unit of work.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::entity::{
    now_epoch_ms, uuid_value, Entity, EntityId, ValidationError, CREATED_DATE_COLUMN, ID_COLUMN,
};
use crate::query::unit_of_work::{load_by_id, UnitOfWork};
use crate::query::{ParseError, QueryError};
use rusqlite::{params_from_iter, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence, query and readiness failures.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    Query(QueryError),
    NotFound {
        entity: &'static str,
        id: EntityId,
    },
    /// Connection was not opened through `db::open_*` (migrations missing).
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Query(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, connection has {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "repository requires column `{column}` in table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Query(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<QueryError> for RepoError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<ParseError> for RepoError {
    fn from(value: ParseError) -> Self {
        Self::Query(QueryError::Parse(value))
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Inserts `entity` or updates the stored row with the same id.
///
/// Stamps `last_modified_date` on every call; `created_date` is taken from
/// the stored row when one exists.
pub(crate) fn save<E: Entity>(
    conn: &Connection,
    uow: &UnitOfWork,
    entity: &mut E,
) -> RepoResult<()> {
    entity.validate()?;

    let now = now_epoch_ms();
    let audit = entity.audit_mut();
    if audit.created_date.is_none() {
        audit.created_date = Some(now);
    }
    audit.last_modified_date = Some(now);

    let columns: Vec<&str> = E::FIELDS.iter().map(|field| field.column).collect();
    let markers: Vec<String> = (1..=columns.len()).map(|n| format!("?{n}")).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|column| **column != ID_COLUMN && **column != CREATED_DATE_COLUMN)
        .map(|column| format!("{column} = excluded.{column}"))
        .collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})
         ON CONFLICT({ID_COLUMN}) DO UPDATE SET {}
         RETURNING {CREATED_DATE_COLUMN};",
        E::TABLE,
        columns.join(", "),
        markers.join(", "),
        updates.join(", ")
    );

    let created: Option<i64> =
        conn.query_row(&sql, params_from_iter(entity.column_values()), |row| {
            row.get(0)
        })?;
    entity.audit_mut().created_date = created;

    uow.attach(entity);
    Ok(())
}

/// Managed copy first, then the store.
pub(crate) fn find_by_id<E: Entity>(
    conn: &Connection,
    uow: &UnitOfWork,
    id: EntityId,
) -> RepoResult<Option<E>> {
    if let Some(managed) = uow.get::<E>(id) {
        return Ok(Some(managed));
    }
    let loaded = load_by_id::<E>(conn, id)?;
    Ok(loaded.map(|entity| uow.merge_loaded(entity)))
}

pub(crate) fn find_all<E: Entity>(conn: &Connection, uow: &UnitOfWork) -> RepoResult<Vec<E>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} ORDER BY {CREATED_DATE_COLUMN}, {ID_COLUMN};",
        E::select_list(),
        E::TABLE
    ))?;
    let mut rows = stmt.query([])?;

    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(uow.merge_loaded(E::map_row(row)?));
    }
    Ok(entities)
}

pub(crate) fn count<E: Entity>(conn: &Connection) -> RepoResult<u64> {
    let total: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {};", E::TABLE), [], |row| {
        row.get(0)
    })?;
    Ok(u64::try_from(total).unwrap_or(0))
}

pub(crate) fn delete<E: Entity>(conn: &Connection, uow: &UnitOfWork, id: EntityId) -> RepoResult<()> {
    let deleted = conn.execute(
        &format!("DELETE FROM {} WHERE {ID_COLUMN} = ?1;", E::TABLE),
        [uuid_value(id)],
    )?;
    if deleted == 0 {
        return Err(RepoError::NotFound {
            entity: E::NAME,
            id,
        });
    }

    uow.invalidate::<E>(id);
    Ok(())
}

/// Deletes every row of `E`; returns the number of deleted rows.
pub(crate) fn delete_all<E: Entity>(conn: &Connection, uow: &UnitOfWork) -> RepoResult<usize> {
    let deleted = conn.execute(&format!("DELETE FROM {};", E::TABLE), [])?;
    uow.invalidate_where::<E>(|_| true);
    Ok(deleted)
}

/// Rejects connections that were not migrated to the current schema.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    table: &'static str,
    columns: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, table)? {
        return Err(RepoError::MissingRequiredTable(table));
    }
    for &column in columns {
        if !table_has_column(conn, table, column)? {
            return Err(RepoError::MissingRequiredColumn { table, column });
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
