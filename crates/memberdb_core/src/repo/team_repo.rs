//! Team repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Deleting a team detaches its members (`team_id = NULL`); members are
//!   never deleted with it.
//! - Managed members of a deleted team are dropped from the unit of work so
//!   the next read sees the detached row.

use crate::model::entity::uuid_value;
use crate::model::member::Member;
use crate::model::team::{Team, TeamId};
use crate::query::descriptor::{global_cache, Cardinality, QueryDescriptor};
use crate::query::executor::QueryExecutor;
use crate::query::paging::Sort;
use crate::query::unit_of_work::UnitOfWork;
use crate::repo::crud::{self, ensure_connection_ready, RepoError, RepoResult};
use crate::repo::member_repo::{members_of_team, MemberQueries};
use log::info;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::sync::Arc;

const TEAM_COLUMNS: &[&str] = &["id", "name", "created_date", "last_modified_date"];

/// Repository interface for team persistence.
pub trait TeamRepository {
    fn save(&self, team: &mut Team) -> RepoResult<()>;
    fn find_by_id(&self, id: TeamId) -> RepoResult<Option<Team>>;
    fn find_all(&self) -> RepoResult<Vec<Team>>;
    fn find_by_name(&self, name: &str) -> RepoResult<Vec<Team>>;
    fn count(&self) -> RepoResult<u64>;
    /// Deletes the team and returns how many members were detached.
    fn delete(&self, id: TeamId) -> RepoResult<usize>;
    /// Members referencing the team, ordered by username.
    fn members_of(&self, id: TeamId) -> RepoResult<Vec<Member>>;
}

/// SQLite-backed team repository bound to one unit of work.
pub struct SqliteTeamRepository<'conn> {
    conn: &'conn Connection,
    uow: &'conn UnitOfWork,
    by_name: Arc<QueryDescriptor>,
    member_queries: &'static MemberQueries,
}

impl<'conn> SqliteTeamRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, uow: &'conn UnitOfWork) -> RepoResult<Self> {
        ensure_connection_ready(conn, "teams", TEAM_COLUMNS)?;
        ensure_connection_ready(conn, "members", &["team_id"])?;

        let by_name = global_cache().get_or_parse::<Team>("findByName", Cardinality::List)?;
        let member_queries = MemberQueries::get()?;
        Ok(Self {
            conn,
            uow,
            by_name,
            member_queries,
        })
    }
}

impl TeamRepository for SqliteTeamRepository<'_> {
    fn save(&self, team: &mut Team) -> RepoResult<()> {
        crud::save(self.conn, self.uow, team)
    }

    fn find_by_id(&self, id: TeamId) -> RepoResult<Option<Team>> {
        crud::find_by_id(self.conn, self.uow, id)
    }

    fn find_all(&self) -> RepoResult<Vec<Team>> {
        crud::find_all(self.conn, self.uow)
    }

    fn find_by_name(&self, name: &str) -> RepoResult<Vec<Team>> {
        Ok(QueryExecutor::new(self.conn, self.uow).find_list(
            &self.by_name,
            &[Value::Text(name.to_string())],
            &Sort::unsorted(),
        )?)
    }

    fn count(&self) -> RepoResult<u64> {
        crud::count::<Team>(self.conn)
    }

    fn delete(&self, id: TeamId) -> RepoResult<usize> {
        let detached = self.conn.execute(
            "UPDATE members SET team_id = NULL WHERE team_id = ?1;",
            [uuid_value(id)],
        )?;
        let deleted = self
            .conn
            .execute("DELETE FROM teams WHERE id = ?1;", [uuid_value(id)])?;
        if deleted == 0 {
            return Err(RepoError::NotFound {
                entity: "Team",
                id,
            });
        }

        self.uow.invalidate::<Team>(id);
        self.uow
            .invalidate_where::<Member>(|member| member.team_id == Some(id));
        info!("event=team_delete module=repo status=ok team_id={id} detached={detached}");
        Ok(detached)
    }

    fn members_of(&self, id: TeamId) -> RepoResult<Vec<Member>> {
        members_of_team(self.conn, self.uow, self.member_queries, id)
    }
}
