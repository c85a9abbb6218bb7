//! Member entity.
//!
//! # Invariants
//! - `id` is generated once in the constructor and never reassigned.
//! - `team_id` is a lookup reference only; it does not keep a team alive.

use crate::model::entity::{
    optional_i64_value, optional_uuid_value, uuid_value, AuditTimes, Entity, EntityId, FieldDef,
    ValidationError,
};
use crate::model::team::{Team, TeamId};
use crate::query::row::{parse_optional_uuid_column, parse_uuid_column, RowMapper};
use crate::query::QueryResult;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type MemberId = EntityId;

const MEMBER_FIELDS: &[FieldDef] = &[
    FieldDef::new("id", "id"),
    FieldDef::new("username", "username"),
    FieldDef::new("age", "age"),
    FieldDef::new("team", "team_id"),
    FieldDef::new("createdDate", "created_date"),
    FieldDef::new("lastModifiedDate", "last_modified_date"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    id: MemberId,
    pub username: String,
    pub age: i32,
    pub team_id: Option<TeamId>,
    #[serde(flatten)]
    pub audit: AuditTimes,
}

impl Member {
    /// Creates a member aged 0 without a team.
    pub fn new(username: impl Into<String>) -> Self {
        Self::with_age(username, 0)
    }

    pub fn with_age(username: impl Into<String>, age: i32) -> Self {
        Self::with_id(Uuid::new_v4(), username, age)
    }

    /// Creates a member that joins `team` immediately.
    pub fn with_team(username: impl Into<String>, age: i32, team: &Team) -> Self {
        let mut member = Self::with_age(username, age);
        member.change_team(team);
        member
    }

    /// Creates a member with a caller-provided id (imports, fixtures).
    pub fn with_id(id: MemberId, username: impl Into<String>, age: i32) -> Self {
        Self {
            id,
            username: username.into(),
            age,
            team_id: None,
            audit: AuditTimes::default(),
        }
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn change_team(&mut self, team: &Team) {
        self.team_id = Some(team.id());
    }

    pub fn leave_team(&mut self) {
        self.team_id = None;
    }
}

impl Display for Member {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Member(id={}, username={}, age={})",
            self.id, self.username, self.age
        )
    }
}

impl RowMapper for Member {
    fn map_row(row: &Row<'_>) -> QueryResult<Self> {
        Ok(Self {
            id: parse_uuid_column(row, "id")?,
            username: row.get("username")?,
            age: row.get("age")?,
            team_id: parse_optional_uuid_column(row, "team_id")?,
            audit: AuditTimes {
                created_date: row.get("created_date")?,
                last_modified_date: row.get("last_modified_date")?,
            },
        })
    }
}

impl Entity for Member {
    const NAME: &'static str = "Member";
    const TABLE: &'static str = "members";
    const FIELDS: &'static [FieldDef] = MEMBER_FIELDS;

    fn id(&self) -> EntityId {
        self.id
    }

    fn audit(&self) -> &AuditTimes {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut AuditTimes {
        &mut self.audit
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::BlankUsername);
        }
        if self.age < 0 {
            return Err(ValidationError::NegativeAge(self.age));
        }
        Ok(())
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            uuid_value(self.id),
            Value::Text(self.username.clone()),
            Value::Integer(i64::from(self.age)),
            optional_uuid_value(self.team_id),
            optional_i64_value(self.audit.created_date),
            optional_i64_value(self.audit.last_modified_date),
        ]
    }
}
