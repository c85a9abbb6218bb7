//! Row-to-value mapping.

use crate::query::{MappingError, QueryResult};
use rusqlite::types::Value;
use rusqlite::{Row, RowIndex};
use std::fmt::Display;
use uuid::Uuid;

/// Builds a value from one result row.
pub trait RowMapper: Sized {
    fn map_row(row: &Row<'_>) -> QueryResult<Self>;
}

/// Scalar results read the first column.
impl RowMapper for String {
    fn map_row(row: &Row<'_>) -> QueryResult<Self> {
        Ok(row.get(0)?)
    }
}

impl RowMapper for i64 {
    fn map_row(row: &Row<'_>) -> QueryResult<Self> {
        Ok(row.get(0)?)
    }
}

impl RowMapper for i32 {
    fn map_row(row: &Row<'_>) -> QueryResult<Self> {
        Ok(row.get(0)?)
    }
}

impl RowMapper for Value {
    fn map_row(row: &Row<'_>) -> QueryResult<Self> {
        Ok(row.get(0)?)
    }
}

/// Fails with [`MappingError::ColumnCount`] unless the row has `expected`
/// columns.
pub fn expect_columns(row: &Row<'_>, expected: usize) -> Result<(), MappingError> {
    let actual = row.as_ref().column_count();
    if actual != expected {
        return Err(MappingError::ColumnCount { expected, actual });
    }
    Ok(())
}

/// Reads a UUID stored as text.
pub fn parse_uuid_column<I>(row: &Row<'_>, index: I) -> QueryResult<Uuid>
where
    I: RowIndex + Display + Copy,
{
    let text: String = row.get(index)?;
    parse_uuid_text(&text, index)
}

/// Reads a nullable UUID stored as text.
pub fn parse_optional_uuid_column<I>(row: &Row<'_>, index: I) -> QueryResult<Option<Uuid>>
where
    I: RowIndex + Display + Copy,
{
    match row.get::<_, Option<String>>(index)? {
        Some(text) => parse_uuid_text(&text, index).map(Some),
        None => Ok(None),
    }
}

fn parse_uuid_text(text: &str, column: impl Display) -> QueryResult<Uuid> {
    Uuid::parse_str(text).map_err(|_| {
        MappingError::InvalidValue {
            column: column.to_string(),
            message: format!("`{text}` is not a uuid"),
        }
        .into()
    })
}

/// Unwraps a positional text value for a closed projection.
pub fn text_value(value: Option<Value>, column: &str) -> Result<String, MappingError> {
    match value {
        Some(Value::Text(text)) => Ok(text),
        Some(other) => Err(MappingError::InvalidValue {
            column: column.to_string(),
            message: format!("expected text, got {:?}", other.data_type()),
        }),
        None => Err(MappingError::InvalidValue {
            column: column.to_string(),
            message: "missing value".to_string(),
        }),
    }
}
