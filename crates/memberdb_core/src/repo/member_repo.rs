//! Member repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Expose member CRUD plus the derived, explicit and bulk queries used by
//!   callers.
//! - Parse every derived query once per process, on first construction.
//!
//! # Invariants
//! - A malformed method name fails repository construction, never a call.
//! - Bulk updates skip audit stamping and leave managed members stale unless
//!   the query clears the unit of work.

use crate::model::entity::{uuid_value, EntityId};
use crate::model::member::{Member, MemberId};
use crate::model::projection::{MemberDto, UsernameOnly, UsernameOnlyDto};
use crate::model::team::TeamId;
use crate::query::annotated::{AnnotatedQuery, ModifyingQuery, QueryParams};
use crate::query::descriptor::{global_cache, Cardinality, QueryDescriptor};
use crate::query::executor::QueryExecutor;
use crate::query::paging::{Page, PageRequest, Slice, Sort};
use crate::query::unit_of_work::UnitOfWork;
use crate::query::ParseError;
use crate::repo::crud::{self, ensure_connection_ready, RepoResult};
use once_cell::sync::OnceCell;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::sync::Arc;

const MEMBER_COLUMNS: &[&str] = &[
    "id",
    "username",
    "age",
    "team_id",
    "created_date",
    "last_modified_date",
];

pub const FIND_BY_USERNAME: AnnotatedQuery = AnnotatedQuery::new(
    "Member.findByUsername",
    "SELECT id, username, age, team_id, created_date, last_modified_date
     FROM members
     WHERE username = :username",
);

pub const FIND_USER: AnnotatedQuery = AnnotatedQuery::new(
    "Member.findUser",
    "SELECT id, username, age, team_id, created_date, last_modified_date
     FROM members
     WHERE username = :username AND age = :age",
);

pub const FIND_USERNAME_LIST: AnnotatedQuery = AnnotatedQuery::new(
    "Member.findUsernameList",
    "SELECT username FROM members ORDER BY username",
);

pub const FIND_MEMBER_DTO: AnnotatedQuery = AnnotatedQuery::new(
    "Member.findMemberDto",
    "SELECT m.id, m.username, t.name
     FROM members m
     JOIN teams t ON t.id = m.team_id
     ORDER BY m.username",
);

pub const FIND_BY_NAMES: AnnotatedQuery = AnnotatedQuery::new(
    "Member.findByNames",
    "SELECT id, username, age, team_id, created_date, last_modified_date
     FROM members
     WHERE username IN (:names)",
);

pub const BULK_AGE_PLUS: ModifyingQuery = ModifyingQuery::new(
    "Member.bulkAgePlus",
    "UPDATE members SET age = age + 1 WHERE age >= :age",
);

pub const BULK_AGE_PLUS_CLEARING: ModifyingQuery = ModifyingQuery::new(
    "Member.bulkAgePlusClearing",
    "UPDATE members SET age = age + 1 WHERE age >= :age",
)
.clear_automatically(true);

/// Derived queries of [`MemberRepository`], parsed once per process.
pub(crate) struct MemberQueries {
    by_username_and_age_greater_than: Arc<QueryDescriptor>,
    top3_hello: Arc<QueryDescriptor>,
    list_by_username: Arc<QueryDescriptor>,
    member_by_username: Arc<QueryDescriptor>,
    optional_by_username: Arc<QueryDescriptor>,
    by_age: Arc<QueryDescriptor>,
    slice_by_age: Arc<QueryDescriptor>,
    count_by_age: Arc<QueryDescriptor>,
    exists_by_username: Arc<QueryDescriptor>,
    by_team: Arc<QueryDescriptor>,
    projections_by_username: Arc<QueryDescriptor>,
}

static MEMBER_QUERIES: OnceCell<MemberQueries> = OnceCell::new();

impl MemberQueries {
    pub(crate) fn get() -> Result<&'static Self, ParseError> {
        MEMBER_QUERIES.get_or_try_init(Self::build)
    }

    fn build() -> Result<Self, ParseError> {
        let member =
            |method: &str, cardinality| global_cache().get_or_parse::<Member>(method, cardinality);

        Ok(Self {
            by_username_and_age_greater_than: member(
                "findByUsernameAndAgeGreaterThan",
                Cardinality::List,
            )?,
            top3_hello: member("findTop3HelloBy", Cardinality::List)?,
            list_by_username: member("findListByUsername", Cardinality::List)?,
            member_by_username: member("findMemberByUsername", Cardinality::Single)?,
            optional_by_username: member("findOptionalByUsername", Cardinality::OptionalSingle)?,
            by_age: member("findByAge", Cardinality::Page)?,
            slice_by_age: member("findSliceByAge", Cardinality::Slice)?,
            count_by_age: member("countByAge", Cardinality::Count)?,
            exists_by_username: member("existsByUsername", Cardinality::Exists)?,
            by_team: member("findByTeamOrderByUsernameAsc", Cardinality::List)?,
            projections_by_username: member("findProjectionsByUsername", Cardinality::List)?,
        })
    }

    pub(crate) fn by_team(&self) -> &QueryDescriptor {
        &self.by_team
    }
}

/// Repository interface for member persistence and queries.
pub trait MemberRepository {
    /// Inserts or updates; stamps audit times and manages the member.
    fn save(&self, member: &mut Member) -> RepoResult<()>;
    fn find_by_id(&self, id: MemberId) -> RepoResult<Option<Member>>;
    fn find_all(&self) -> RepoResult<Vec<Member>>;
    fn count(&self) -> RepoResult<u64>;
    fn delete(&self, id: MemberId) -> RepoResult<()>;
    fn delete_all(&self) -> RepoResult<usize>;

    fn find_by_username_and_age_greater_than(
        &self,
        username: &str,
        age: i32,
    ) -> RepoResult<Vec<Member>>;
    /// First three members in table order.
    fn find_top3(&self) -> RepoResult<Vec<Member>>;
    fn find_list_by_username(&self, username: &str) -> RepoResult<Vec<Member>>;
    fn find_member_by_username(&self, username: &str) -> RepoResult<Option<Member>>;
    fn find_optional_by_username(&self, username: &str) -> RepoResult<Option<Member>>;
    fn find_by_age(&self, age: i32, request: &PageRequest) -> RepoResult<Page<Member>>;
    fn find_slice_by_age(&self, age: i32, request: &PageRequest) -> RepoResult<Slice<Member>>;
    fn count_by_age(&self, age: i32) -> RepoResult<u64>;
    fn exists_by_username(&self, username: &str) -> RepoResult<bool>;
    fn find_by_team(&self, team_id: TeamId) -> RepoResult<Vec<Member>>;
    fn find_projections_by_username(&self, username: &str) -> RepoResult<Vec<UsernameOnlyDto>>;
    fn find_username_only_by_username(&self, username: &str) -> RepoResult<Vec<UsernameOnly>>;

    /// Named query.
    fn find_by_username(&self, username: &str) -> RepoResult<Vec<Member>>;
    fn find_user(&self, username: &str, age: i32) -> RepoResult<Vec<Member>>;
    fn find_username_list(&self) -> RepoResult<Vec<String>>;
    /// Members that belong to a team, with the team name.
    fn find_member_dto(&self) -> RepoResult<Vec<MemberDto>>;
    fn find_by_names(&self, names: &[String]) -> RepoResult<Vec<Member>>;

    /// Adds one year to every member aged `age` or older. Returns the number
    /// of updated rows; managed members keep their previous age.
    fn bulk_age_plus(&self, age: i32) -> RepoResult<usize>;
    /// Same update, then clears the unit of work.
    fn bulk_age_plus_clearing(&self, age: i32) -> RepoResult<usize>;
}

/// SQLite-backed member repository bound to one unit of work.
pub struct SqliteMemberRepository<'conn> {
    conn: &'conn Connection,
    uow: &'conn UnitOfWork,
    queries: &'static MemberQueries,
}

impl<'conn> SqliteMemberRepository<'conn> {
    /// Checks the schema and resolves the member descriptors.
    pub fn try_new(conn: &'conn Connection, uow: &'conn UnitOfWork) -> RepoResult<Self> {
        ensure_connection_ready(conn, "members", MEMBER_COLUMNS)?;
        let queries = MemberQueries::get()?;
        Ok(Self { conn, uow, queries })
    }

    pub fn unit_of_work(&self) -> &'conn UnitOfWork {
        self.uow
    }

    fn executor(&self) -> QueryExecutor<'conn> {
        QueryExecutor::new(self.conn, self.uow)
    }
}

impl MemberRepository for SqliteMemberRepository<'_> {
    fn save(&self, member: &mut Member) -> RepoResult<()> {
        crud::save(self.conn, self.uow, member)
    }

    fn find_by_id(&self, id: MemberId) -> RepoResult<Option<Member>> {
        crud::find_by_id(self.conn, self.uow, id)
    }

    fn find_all(&self) -> RepoResult<Vec<Member>> {
        crud::find_all(self.conn, self.uow)
    }

    fn count(&self) -> RepoResult<u64> {
        crud::count::<Member>(self.conn)
    }

    fn delete(&self, id: MemberId) -> RepoResult<()> {
        crud::delete::<Member>(self.conn, self.uow, id)
    }

    fn delete_all(&self) -> RepoResult<usize> {
        crud::delete_all::<Member>(self.conn, self.uow)
    }

    fn find_by_username_and_age_greater_than(
        &self,
        username: &str,
        age: i32,
    ) -> RepoResult<Vec<Member>> {
        Ok(self.executor().find_list(
            &self.queries.by_username_and_age_greater_than,
            &[text(username), int(age)],
            &Sort::unsorted(),
        )?)
    }

    fn find_top3(&self) -> RepoResult<Vec<Member>> {
        Ok(self
            .executor()
            .find_list(&self.queries.top3_hello, &[], &Sort::unsorted())?)
    }

    fn find_list_by_username(&self, username: &str) -> RepoResult<Vec<Member>> {
        Ok(self.executor().find_list(
            &self.queries.list_by_username,
            &[text(username)],
            &Sort::unsorted(),
        )?)
    }

    fn find_member_by_username(&self, username: &str) -> RepoResult<Option<Member>> {
        Ok(self
            .executor()
            .find_one(&self.queries.member_by_username, &[text(username)])?)
    }

    fn find_optional_by_username(&self, username: &str) -> RepoResult<Option<Member>> {
        Ok(self
            .executor()
            .find_one(&self.queries.optional_by_username, &[text(username)])?)
    }

    fn find_by_age(&self, age: i32, request: &PageRequest) -> RepoResult<Page<Member>> {
        Ok(self
            .executor()
            .find_page(&self.queries.by_age, &[int(age)], request)?)
    }

    fn find_slice_by_age(&self, age: i32, request: &PageRequest) -> RepoResult<Slice<Member>> {
        Ok(self
            .executor()
            .find_slice(&self.queries.slice_by_age, &[int(age)], request)?)
    }

    fn count_by_age(&self, age: i32) -> RepoResult<u64> {
        Ok(self
            .executor()
            .count(&self.queries.count_by_age, &[int(age)])?)
    }

    fn exists_by_username(&self, username: &str) -> RepoResult<bool> {
        Ok(self
            .executor()
            .exists(&self.queries.exists_by_username, &[text(username)])?)
    }

    fn find_by_team(&self, team_id: TeamId) -> RepoResult<Vec<Member>> {
        members_of_team(self.conn, self.uow, self.queries, team_id)
    }

    fn find_projections_by_username(&self, username: &str) -> RepoResult<Vec<UsernameOnlyDto>> {
        Ok(self.executor().find_closed::<Member, UsernameOnlyDto>(
            &self.queries.projections_by_username,
            &[text(username)],
            &Sort::unsorted(),
        )?)
    }

    fn find_username_only_by_username(&self, username: &str) -> RepoResult<Vec<UsernameOnly>> {
        Ok(self.executor().find_open::<UsernameOnly>(
            &self.queries.projections_by_username,
            &[text(username)],
            &Sort::unsorted(),
        )?)
    }

    fn find_by_username(&self, username: &str) -> RepoResult<Vec<Member>> {
        let params = QueryParams::named().bind("username", username);
        Ok(self.executor().query_entities(&FIND_BY_USERNAME, &params)?)
    }

    fn find_user(&self, username: &str, age: i32) -> RepoResult<Vec<Member>> {
        let params = QueryParams::named()
            .bind("username", username)
            .bind("age", age);
        Ok(self.executor().query_entities(&FIND_USER, &params)?)
    }

    fn find_username_list(&self) -> RepoResult<Vec<String>> {
        Ok(self
            .executor()
            .query_rows(&FIND_USERNAME_LIST, &QueryParams::none())?)
    }

    fn find_member_dto(&self) -> RepoResult<Vec<MemberDto>> {
        Ok(self
            .executor()
            .query_rows(&FIND_MEMBER_DTO, &QueryParams::none())?)
    }

    fn find_by_names(&self, names: &[String]) -> RepoResult<Vec<Member>> {
        let params = QueryParams::named().bind("names", names);
        Ok(self.executor().query_entities(&FIND_BY_NAMES, &params)?)
    }

    fn bulk_age_plus(&self, age: i32) -> RepoResult<usize> {
        let params = QueryParams::named().bind("age", age);
        Ok(self.executor().execute_modifying(&BULK_AGE_PLUS, &params)?)
    }

    fn bulk_age_plus_clearing(&self, age: i32) -> RepoResult<usize> {
        let params = QueryParams::named().bind("age", age);
        Ok(self
            .executor()
            .execute_modifying(&BULK_AGE_PLUS_CLEARING, &params)?)
    }
}

/// Members referencing `team_id`, ordered by username.
pub(crate) fn members_of_team(
    conn: &Connection,
    uow: &UnitOfWork,
    queries: &MemberQueries,
    team_id: EntityId,
) -> RepoResult<Vec<Member>> {
    Ok(QueryExecutor::new(conn, uow).find_list(
        queries.by_team(),
        &[uuid_value(team_id)],
        &Sort::unsorted(),
    )?)
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn int(value: i32) -> Value {
    Value::Integer(i64::from(value))
}
