//! Entity metadata shared by the query engine and the CRUD repositories.

use crate::query::row::RowMapper;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub type EntityId = Uuid;

pub const ID_COLUMN: &str = "id";
pub const CREATED_DATE_COLUMN: &str = "created_date";

/// Maps one entity property (as named in query methods) to its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub property: &'static str,
    pub column: &'static str,
}

impl FieldDef {
    pub const fn new(property: &'static str, column: &'static str) -> Self {
        Self { property, column }
    }
}

/// Creation / modification timestamps in epoch milliseconds.
///
/// Both are `None` until the entity is saved for the first time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTimes {
    pub created_date: Option<i64>,
    pub last_modified_date: Option<i64>,
}

/// Write-path validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    BlankUsername,
    NegativeAge(i32),
    BlankTeamName,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankUsername => write!(f, "member username must not be blank"),
            Self::NegativeAge(age) => write!(f, "member age must not be negative, got {age}"),
            Self::BlankTeamName => write!(f, "team name must not be blank"),
        }
    }
}

impl Error for ValidationError {}

/// A persistent record type the repositories and the query executor can
/// load, store and derive queries for.
pub trait Entity: RowMapper + Clone + 'static {
    /// Entity name used in diagnostics and cache keys.
    const NAME: &'static str;
    const TABLE: &'static str;
    /// Property table. The first entry is the primary key.
    const FIELDS: &'static [FieldDef];

    fn id(&self) -> EntityId;
    fn audit(&self) -> &AuditTimes;
    fn audit_mut(&mut self) -> &mut AuditTimes;
    fn validate(&self) -> Result<(), ValidationError>;

    /// Column values in `FIELDS` order.
    fn column_values(&self) -> Vec<Value>;

    fn field(property: &str) -> Option<&'static FieldDef> {
        Self::FIELDS.iter().find(|field| field.property == property)
    }

    /// Comma separated column list in `FIELDS` order.
    fn select_list() -> String {
        Self::FIELDS
            .iter()
            .map(|field| field.column)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub(crate) fn uuid_value(id: EntityId) -> Value {
    Value::Text(id.to_string())
}

pub(crate) fn optional_uuid_value(id: Option<EntityId>) -> Value {
    id.map_or(Value::Null, uuid_value)
}

pub(crate) fn optional_i64_value(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
