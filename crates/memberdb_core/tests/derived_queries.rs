use memberdb_core::db::open_db_in_memory;
use memberdb_core::{
    global_cache, Cardinality, Member, MemberRepository, ParseError, QueryError, QueryExecutor,
    RepoError, Sort, SqliteMemberRepository, SqliteTeamRepository, Team, TeamRepository,
    UnitOfWork,
};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::sync::Arc;

fn seed(conn: &Connection, members: &[(&str, i32)]) {
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(conn, &uow).unwrap();
    for (username, age) in members {
        repo.save(&mut Member::with_age(*username, *age)).unwrap();
    }
}

#[test]
fn find_by_username_and_age_greater_than() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, &[("AAA", 10), ("AAA", 20)]);
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();

    let result = repo
        .find_by_username_and_age_greater_than("AAA", 15)
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].username, "AAA");
    assert_eq!(result[0].age, 20);
}

#[test]
fn greater_than_excludes_equal_values() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, &[("AAA", 10), ("AAA", 20)]);
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();

    assert!(repo
        .find_by_username_and_age_greater_than("AAA", 20)
        .unwrap()
        .is_empty());
}

#[test]
fn top3_returns_at_most_three_rows() {
    let conn = open_db_in_memory().unwrap();
    seed(
        &conn,
        &[("m1", 1), ("m2", 2), ("m3", 3), ("m4", 4), ("m5", 5)],
    );
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();

    assert_eq!(repo.find_top3().unwrap().len(), 3);
}

#[test]
fn return_type_variants_share_one_predicate() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, &[("AAA", 10), ("BBB", 20)]);
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();

    let list = repo.find_list_by_username("AAA").unwrap();
    assert_eq!(list.len(), 1);

    let single = repo.find_member_by_username("AAA").unwrap().unwrap();
    assert_eq!(single.age, 10);

    let optional = repo.find_optional_by_username("AAA").unwrap();
    assert_eq!(optional, Some(single));
}

#[test]
fn no_match_is_empty_list_or_none() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, &[("AAA", 10)]);
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();

    assert!(repo.find_list_by_username("nobody").unwrap().is_empty());
    assert!(repo.find_member_by_username("nobody").unwrap().is_none());
    assert!(repo.find_optional_by_username("nobody").unwrap().is_none());
}

#[test]
fn single_result_with_duplicates_is_non_unique() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, &[("AAA", 10), ("AAA", 20)]);
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();

    let err = repo.find_optional_by_username("AAA").unwrap_err();
    assert!(matches!(
        err,
        RepoError::Query(QueryError::NonUniqueResult { ref method })
            if method == "findOptionalByUsername"
    ));

    let err = repo.find_member_by_username("AAA").unwrap_err();
    assert!(matches!(
        err,
        RepoError::Query(QueryError::NonUniqueResult { .. })
    ));
}

#[test]
fn count_and_exists() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn, &[("AAA", 10), ("BBB", 10), ("CCC", 20)]);
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();

    assert_eq!(repo.count_by_age(10).unwrap(), 2);
    assert_eq!(repo.count_by_age(99).unwrap(), 0);
    assert!(repo.exists_by_username("CCC").unwrap());
    assert!(!repo.exists_by_username("DDD").unwrap());
}

#[test]
fn descriptors_are_parsed_once_per_signature() {
    let first = global_cache()
        .get_or_parse::<Member>("findByUsernameAndAgeGreaterThan", Cardinality::List)
        .unwrap();
    let second = global_cache()
        .get_or_parse::<Member>("findByUsernameAndAgeGreaterThan", Cardinality::List)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn malformed_method_names_fail_to_parse() {
    let err = global_cache()
        .get_or_parse::<Member>("findByNickname", Cardinality::List)
        .unwrap_err();
    assert!(matches!(
        err,
        ParseError::UnknownProperty { ref property, .. } if property == "nickname"
    ));

    let err = global_cache()
        .get_or_parse::<Member>("findByUsernameAnd", Cardinality::List)
        .unwrap_err();
    assert!(matches!(err, ParseError::EmptyPredicate { .. }));

    let err = global_cache()
        .get_or_parse::<Member>("countByAge", Cardinality::List)
        .unwrap_err();
    assert!(matches!(err, ParseError::PrefixConflict { .. }));
}

#[test]
fn null_equality_matches_members_without_a_team() {
    let conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::new();
    let teams = SqliteTeamRepository::try_new(&conn, &uow).unwrap();
    let members = SqliteMemberRepository::try_new(&conn, &uow).unwrap();
    let mut team = Team::new("teamA");
    teams.save(&mut team).unwrap();
    members
        .save(&mut Member::with_team("member1", 10, &team))
        .unwrap();
    members.save(&mut Member::with_age("solo", 20)).unwrap();

    let executor = QueryExecutor::new(&conn, &uow);
    let by_team = global_cache()
        .get_or_parse::<Member>("findByTeam", Cardinality::List)
        .unwrap();
    let found = executor
        .find_list::<Member>(&by_team, &[Value::Null], &Sort::unsorted())
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].username, "solo");

    let count = global_cache()
        .get_or_parse::<Member>("countByTeamAndAgeGreaterThan", Cardinality::Count)
        .unwrap();
    assert_eq!(
        executor
            .count(&count, &[Value::Null, Value::Integer(15)])
            .unwrap(),
        1
    );
}

#[test]
fn property_case_and_nested_paths_are_reported() {
    let err = global_cache()
        .get_or_parse::<Member>("findByusername", Cardinality::List)
        .unwrap_err();
    assert!(matches!(
        err,
        ParseError::LowercaseProperty { ref property, .. } if property == "username"
    ));

    let err = global_cache()
        .get_or_parse::<Member>("findByTeamName", Cardinality::List)
        .unwrap_err();
    assert!(matches!(
        err,
        ParseError::NestedProperty { ref path, .. } if path == "team.name"
    ));
}
