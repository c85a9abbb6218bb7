use memberdb_core::db::open_db_in_memory;
use memberdb_core::query::executor::QueryExecutor;
use memberdb_core::query::projection::ClosedProjection;
use memberdb_core::{
    global_cache, Cardinality, MappingError, Member, MemberRepository, QueryError, Sort,
    SqliteMemberRepository, SqliteTeamRepository, Team, TeamRepository, UnitOfWork,
    UsernameOnlyDto,
};
use rusqlite::types::Value;

#[test]
fn closed_projection_selects_only_username() {
    let conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();
    repo.save(&mut Member::with_age("m1", 0)).unwrap();
    repo.save(&mut Member::with_age("m2", 0)).unwrap();

    let result = repo.find_projections_by_username("m1").unwrap();
    assert_eq!(result, [UsernameOnlyDto::new("m1")]);
}

#[test]
fn distinct_closed_projection_collapses_duplicates() {
    let conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();
    repo.save(&mut Member::with_age("AAA", 10)).unwrap();
    repo.save(&mut Member::with_age("AAA", 20)).unwrap();

    let executor = QueryExecutor::new(&conn, &uow);
    let aaa = [Value::Text("AAA".into())];
    let distinct = global_cache()
        .get_or_parse::<Member>("findDistinctByUsername", Cardinality::List)
        .unwrap();
    let result = executor
        .find_closed::<Member, UsernameOnlyDto>(&distinct, &aaa, &Sort::unsorted())
        .unwrap();
    assert_eq!(result, [UsernameOnlyDto::new("AAA")]);

    let plain = global_cache()
        .get_or_parse::<Member>("findProjectionsByUsername", Cardinality::List)
        .unwrap();
    let result = executor
        .find_closed::<Member, UsernameOnlyDto>(&plain, &aaa, &Sort::unsorted())
        .unwrap();
    assert_eq!(result.len(), 2);
}

#[test]
fn open_projection_reads_through_the_entity() {
    let conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();
    repo.save(&mut Member::with_age("m1", 0)).unwrap();

    let views = repo.find_username_only_by_username("m1").unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].username(), "m1");
    assert_eq!(views[0].summary(), "m1 0");
    assert_eq!(views[0].clone().into_target().age, 0);
}

#[test]
fn join_dto_carries_team_name() {
    let conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::new();
    let teams = SqliteTeamRepository::try_new(&conn, &uow).unwrap();
    let members = SqliteMemberRepository::try_new(&conn, &uow).unwrap();

    let mut team = Team::new("teamA");
    teams.save(&mut team).unwrap();
    let mut member = Member::with_team("AAA", 10, &team);
    members.save(&mut member).unwrap();
    members.save(&mut Member::with_age("solo", 20)).unwrap();

    let dtos = members.find_member_dto().unwrap();
    assert_eq!(dtos.len(), 1);
    assert_eq!(dtos[0].id, member.id());
    assert_eq!(dtos[0].username, "AAA");
    assert_eq!(dtos[0].team_name.as_deref(), Some("teamA"));
}

struct NicknameOnly;

impl ClosedProjection for NicknameOnly {
    const PROPERTIES: &'static [&'static str] = &["nickname"];

    fn from_values(_values: Vec<Value>) -> Result<Self, MappingError> {
        Ok(Self)
    }
}

#[test]
fn closed_projection_with_unknown_property_is_a_mapping_error() {
    let conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::new();
    let executor = QueryExecutor::new(&conn, &uow);
    let descriptor = global_cache()
        .get_or_parse::<Member>("findProjectionsByUsername", Cardinality::List)
        .unwrap();

    let err = executor
        .find_closed::<Member, NicknameOnly>(
            &descriptor,
            &[Value::Text("m1".into())],
            &Sort::unsorted(),
        )
        .err()
        .unwrap();
    assert!(matches!(
        err,
        QueryError::Mapping(MappingError::UnknownProperty {
            entity: "Member",
            ..
        })
    ));
}
