//! Core of memberdb: entities, derived queries and repositories over SQLite.
//! Query methods are declared by name, parsed once and executed through a
//! per-transaction unit of work.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;

pub use config::{ConfigError, CoreConfig, DatabaseLocation};
pub use db::{open_db, open_db_in_memory, open_with_config, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use model::entity::{AuditTimes, Entity, EntityId, FieldDef, ValidationError};
pub use model::member::{Member, MemberId};
pub use model::projection::{MemberDto, UsernameOnly, UsernameOnlyDto};
pub use model::team::{Team, TeamId};
pub use query::descriptor::{global_cache, Cardinality, DescriptorCache, QueryDescriptor};
pub use query::executor::QueryExecutor;
pub use query::paging::{Direction, Order, Page, PageRequest, Slice, Sort};
pub use query::unit_of_work::UnitOfWork;
pub use query::{MappingError, ParseError, QueryError, QueryResult};
pub use repo::crud::{RepoError, RepoResult};
pub use repo::member_repo::{MemberRepository, SqliteMemberRepository};
pub use repo::team_repo::{SqliteTeamRepository, TeamRepository};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
