//! Read-only projections of `Member`.
//!
//! - [`MemberDto`] and [`UsernameOnlyDto`] are closed projections: owned
//!   values built positionally from query columns.
//! - [`UsernameOnly`] is an open projection: a read-through view over a fully
//!   loaded member.

use crate::model::member::{Member, MemberId};
use crate::query::projection::{ClosedProjection, OpenProjection};
use crate::query::row::{expect_columns, parse_uuid_column, text_value, RowMapper};
use crate::query::{MappingError, QueryResult};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Member with the name of its team, built from a join query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDto {
    pub id: MemberId,
    pub username: String,
    pub team_name: Option<String>,
}

impl MemberDto {
    pub fn new(id: MemberId, username: impl Into<String>, team_name: Option<String>) -> Self {
        Self {
            id,
            username: username.into(),
            team_name,
        }
    }

    /// Projects a loaded member; the team name is supplied by the caller.
    pub fn from_member(member: &Member, team_name: Option<String>) -> Self {
        Self::new(member.id(), member.username.clone(), team_name)
    }
}

/// Columns: `(id, username, team_name)`, bound by position.
impl RowMapper for MemberDto {
    fn map_row(row: &Row<'_>) -> QueryResult<Self> {
        expect_columns(row, 3)?;
        Ok(Self {
            id: parse_uuid_column(row, 0)?,
            username: row.get(1)?,
            team_name: row.get(2)?,
        })
    }
}

/// Closed projection holding only the username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameOnlyDto {
    username: String,
}

impl UsernameOnlyDto {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl ClosedProjection for UsernameOnlyDto {
    const PROPERTIES: &'static [&'static str] = &["username"];

    fn from_values(values: Vec<Value>) -> Result<Self, MappingError> {
        let mut values = values.into_iter();
        let username = text_value(values.next(), "username")?;
        Ok(Self { username })
    }
}

/// Open projection: accessors read through to the wrapped member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameOnly {
    target: Member,
}

impl UsernameOnly {
    pub fn username(&self) -> &str {
        &self.target.username
    }

    /// Computed accessor, `"<username> <age>"`.
    pub fn summary(&self) -> String {
        format!("{} {}", self.target.username, self.target.age)
    }

    pub fn into_target(self) -> Member {
        self.target
    }
}

impl OpenProjection for UsernameOnly {
    type Source = Member;

    fn from_entity(source: Member) -> Self {
        Self { target: source }
    }
}

#[cfg(test)]
mod tests {
    use super::{UsernameOnly, UsernameOnlyDto};
    use crate::model::member::Member;
    use crate::query::projection::{ClosedProjection, OpenProjection};
    use crate::query::MappingError;
    use rusqlite::types::Value;

    #[test]
    fn closed_projection_binds_username_positionally() {
        let dto = UsernameOnlyDto::from_values(vec![Value::Text("AAA".to_string())]).unwrap();
        assert_eq!(dto.username(), "AAA");
    }

    #[test]
    fn closed_projection_rejects_wrong_value_type() {
        let err = UsernameOnlyDto::from_values(vec![Value::Integer(3)]).unwrap_err();
        assert!(matches!(err, MappingError::InvalidValue { ref column, .. } if column == "username"));
    }

    #[test]
    fn open_projection_reads_through_to_member() {
        let view = UsernameOnly::from_entity(Member::with_age("AAA", 10));
        assert_eq!(view.username(), "AAA");
        assert_eq!(view.summary(), "AAA 10");
        assert_eq!(view.into_target().age, 10);
    }
}
