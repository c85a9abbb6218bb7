use memberdb_core::db::open_db_in_memory;
use memberdb_core::query::annotated::{AnnotatedQuery, Param, QueryParams};
use memberdb_core::{
    Member, MemberRepository, QueryError, QueryExecutor, SqliteMemberRepository, UnitOfWork,
};
use rusqlite::Connection;

fn seed(conn: &Connection) {
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(conn, &uow).unwrap();
    repo.save(&mut Member::with_age("AAA", 10)).unwrap();
    repo.save(&mut Member::with_age("BBB", 20)).unwrap();
}

#[test]
fn named_query_by_username() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();

    let result = repo.find_by_username("AAA").unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].age, 10);
}

#[test]
fn explicit_query_with_two_named_parameters() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();

    let result = repo.find_user("AAA", 10).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].username, "AAA");
    assert!(repo.find_user("AAA", 20).unwrap().is_empty());
}

#[test]
fn scalar_projection_lists_usernames() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();

    assert_eq!(repo.find_username_list().unwrap(), ["AAA", "BBB"]);
}

#[test]
fn collection_parameter_binds_in_clause() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let uow = UnitOfWork::new();
    let repo = SqliteMemberRepository::try_new(&conn, &uow).unwrap();

    let names = vec!["AAA".to_string(), "BBB".to_string(), "CCC".to_string()];
    assert_eq!(repo.find_by_names(&names).unwrap().len(), 2);
    assert!(repo.find_by_names(&[]).unwrap().is_empty());
}

#[test]
fn executor_rejects_missing_and_unused_parameters() {
    let conn = open_db_in_memory().unwrap();
    let uow = UnitOfWork::new();
    let executor = QueryExecutor::new(&conn, &uow);
    let query = AnnotatedQuery::new(
        "Member.ageOf",
        "SELECT age FROM members WHERE username = :username",
    );

    let err = executor
        .query_rows::<i32>(&query, &QueryParams::named())
        .unwrap_err();
    assert!(matches!(err, QueryError::MissingParameter(ref name) if name == "username"));

    let params = QueryParams::named()
        .bind("username", "AAA")
        .bind("age", 10);
    let err = executor.query_rows::<i32>(&query, &params).unwrap_err();
    assert!(matches!(err, QueryError::UnusedParameter(ref name) if name == "age"));
}

#[test]
fn positional_parameters_run_against_the_store() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let uow = UnitOfWork::new();
    let executor = QueryExecutor::new(&conn, &uow);
    let query = AnnotatedQuery::new(
        "Member.olderThan",
        "SELECT username FROM members WHERE age > ?1 ORDER BY username",
    );

    let params = QueryParams::positional(vec![Param::from(15)]);
    let names = executor.query_rows::<String>(&query, &params).unwrap();
    assert_eq!(names, ["BBB"]);
}

#[test]
fn named_values_bind_on_default_params() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let uow = UnitOfWork::new();
    let executor = QueryExecutor::new(&conn, &uow);
    let query = AnnotatedQuery::new(
        "Member.ageOf",
        "SELECT age FROM members WHERE username = :username",
    );

    let params = QueryParams::default().bind("username", "BBB");
    assert_eq!(executor.query_rows::<i32>(&query, &params).unwrap(), [20]);
}
