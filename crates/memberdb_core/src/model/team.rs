//! Team entity.
//!
//! A team is the inverse side of `Member::team_id`. Its members are looked up
//! through `TeamRepository::members_of`, never owned.

use crate::model::entity::{
    optional_i64_value, uuid_value, AuditTimes, Entity, EntityId, FieldDef, ValidationError,
};
use crate::query::row::{parse_uuid_column, RowMapper};
use crate::query::QueryResult;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TeamId = EntityId;

const TEAM_FIELDS: &[FieldDef] = &[
    FieldDef::new("id", "id"),
    FieldDef::new("name", "name"),
    FieldDef::new("createdDate", "created_date"),
    FieldDef::new("lastModifiedDate", "last_modified_date"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    id: TeamId,
    pub name: String,
    #[serde(flatten)]
    pub audit: AuditTimes,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    pub fn with_id(id: TeamId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            audit: AuditTimes::default(),
        }
    }

    pub fn id(&self) -> TeamId {
        self.id
    }
}

impl RowMapper for Team {
    fn map_row(row: &Row<'_>) -> QueryResult<Self> {
        Ok(Self {
            id: parse_uuid_column(row, "id")?,
            name: row.get("name")?,
            audit: AuditTimes {
                created_date: row.get("created_date")?,
                last_modified_date: row.get("last_modified_date")?,
            },
        })
    }
}

impl Entity for Team {
    const NAME: &'static str = "Team";
    const TABLE: &'static str = "teams";
    const FIELDS: &'static [FieldDef] = TEAM_FIELDS;

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
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankTeamName);
        }
        Ok(())
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            uuid_value(self.id),
            Value::Text(self.name.clone()),
            optional_i64_value(self.audit.created_date),
            optional_i64_value(self.audit.last_modified_date),
        ]
    }
}
