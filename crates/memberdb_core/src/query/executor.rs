//! Query execution and result mapping.
//!
//! # Responsibility
//! - Bind positional values to descriptor slots, or named/positional values
//!   to explicit queries.
//! - Map rows to the declared shape: entity, list, page, slice, count,
//!   exists, closed or open projection.
//! - Route loaded entities through the caller's [`UnitOfWork`].
//!
//! # Invariants
//! - Single results: zero rows is `None`, more than one row is
//!   [`QueryError::NonUniqueResult`].
//! - Bulk modifications bypass the unit of work; it is cleared only when the
//!   query asks for it.

use crate::model::entity::Entity;
use crate::query::annotated::{prepare, AnnotatedQuery, ModifyingQuery, QueryParams};
use crate::query::descriptor::{Cardinality, QueryDescriptor};
use crate::query::paging::{page_from_window, slice_from_window, Page, PageRequest, Slice, Sort};
use crate::query::projection::{ClosedProjection, OpenProjection};
use crate::query::row::{expect_columns, RowMapper};
use crate::query::unit_of_work::UnitOfWork;
use crate::query::{MappingError, QueryError, QueryResult};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};

/// Row window appended as `LIMIT ? OFFSET ?`.
#[derive(Debug, Clone, Copy)]
struct Window {
    limit: u64,
    offset: u64,
}

impl Window {
    fn first(limit: u64) -> Self {
        Self { limit, offset: 0 }
    }
}

/// Runs descriptors and explicit queries on one connection (or transaction)
/// with one unit of work.
pub struct QueryExecutor<'a> {
    conn: &'a Connection,
    uow: &'a UnitOfWork,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(conn: &'a Connection, uow: &'a UnitOfWork) -> Self {
        Self { conn, uow }
    }

    pub fn unit_of_work(&self) -> &'a UnitOfWork {
        self.uow
    }

    /// Single or optional-single result.
    pub fn find_one<E: Entity>(
        &self,
        descriptor: &QueryDescriptor,
        params: &[Value],
    ) -> QueryResult<Option<E>> {
        check_shape(descriptor, Cardinality::Single)?;
        let lookahead = descriptor.limit.map_or(2, |limit| limit.min(2));
        let mut found = self.fetch_entities::<E>(
            descriptor,
            params,
            &Sort::unsorted(),
            Some(Window::first(u64::from(lookahead))),
        )?;

        if found.len() > 1 {
            return Err(QueryError::NonUniqueResult {
                method: descriptor.method.clone(),
            });
        }
        Ok(found.pop())
    }

    /// List result; empty when nothing matches.
    pub fn find_list<E: Entity>(
        &self,
        descriptor: &QueryDescriptor,
        params: &[Value],
        sort: &Sort,
    ) -> QueryResult<Vec<E>> {
        check_shape(descriptor, Cardinality::List)?;
        let window = descriptor
            .limit
            .map(|limit| Window::first(u64::from(limit)));
        self.fetch_entities::<E>(descriptor, params, sort, window)
    }

    pub fn count(&self, descriptor: &QueryDescriptor, params: &[Value]) -> QueryResult<u64> {
        check_shape(descriptor, Cardinality::Count)?;
        self.count_matching(descriptor, params)
    }

    pub fn exists(&self, descriptor: &QueryDescriptor, params: &[Value]) -> QueryResult<bool> {
        check_shape(descriptor, Cardinality::Exists)?;
        let (where_sql, values) = bind(descriptor, params)?;
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {}{where_sql})",
            descriptor.table
        );
        let exists: bool = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        debug!(
            "event=query_execute module=query method={} cardinality=exists result={exists}",
            descriptor.method
        );
        Ok(exists)
    }

    /// Content window plus total count.
    pub fn find_page<E: Entity>(
        &self,
        descriptor: &QueryDescriptor,
        params: &[Value],
        request: &PageRequest,
    ) -> QueryResult<Page<E>> {
        check_shape(descriptor, Cardinality::Page)?;
        let window = Window {
            limit: u64::from(request.size()),
            offset: request.offset(),
        };
        let content = self.fetch_entities::<E>(descriptor, params, request.sort(), Some(window))?;
        page_from_window(content, request, || {
            self.count_matching(descriptor, params)
        })
    }

    /// Content window fetched with one lookahead row; no count query.
    pub fn find_slice<E: Entity>(
        &self,
        descriptor: &QueryDescriptor,
        params: &[Value],
        request: &PageRequest,
    ) -> QueryResult<Slice<E>> {
        check_shape(descriptor, Cardinality::Slice)?;
        let window = Window {
            limit: u64::from(request.size()) + 1,
            offset: request.offset(),
        };
        let rows = self.fetch_entities::<E>(descriptor, params, request.sort(), Some(window))?;
        Ok(slice_from_window(rows, request))
    }

    /// List of closed projections; selects only the projected columns.
    pub fn find_closed<E: Entity, P: ClosedProjection>(
        &self,
        descriptor: &QueryDescriptor,
        params: &[Value],
        sort: &Sort,
    ) -> QueryResult<Vec<P>> {
        check_shape(descriptor, Cardinality::List)?;
        check_entity::<E>(descriptor)?;

        let columns = P::PROPERTIES
            .iter()
            .map(|property| {
                E::field(property)
                    .map(|field| field.column)
                    .ok_or_else(|| MappingError::UnknownProperty {
                        entity: E::NAME,
                        property: (*property).to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let width = columns.len();
        let window = descriptor
            .limit
            .map(|limit| Window::first(u64::from(limit)));
        let (sql, values) = select_sql::<E>(descriptor, &columns.join(", "), params, sort, window)?;

        self.fetch(&descriptor.method, &sql, values, |row| {
            expect_columns(row, width)?;
            let values = (0..width)
                .map(|index| row.get::<_, Value>(index))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(P::from_values(values)?)
        })
    }

    /// List of open projections wrapping fully loaded entities.
    pub fn find_open<P: OpenProjection>(
        &self,
        descriptor: &QueryDescriptor,
        params: &[Value],
        sort: &Sort,
    ) -> QueryResult<Vec<P>> {
        let entities = self.find_list::<P::Source>(descriptor, params, sort)?;
        Ok(entities.into_iter().map(P::from_entity).collect())
    }

    /// Explicit query mapped row by row (scalars, DTOs).
    pub fn query_rows<T: RowMapper>(
        &self,
        query: &AnnotatedQuery,
        params: &QueryParams,
    ) -> QueryResult<Vec<T>> {
        let (sql, values) = prepare(query.sql, params)?;
        self.fetch(query.name, &sql, values, T::map_row)
    }

    /// Explicit query returning entities; rows pass through the unit of work.
    pub fn query_entities<E: Entity>(
        &self,
        query: &AnnotatedQuery,
        params: &QueryParams,
    ) -> QueryResult<Vec<E>> {
        let (sql, values) = prepare(query.sql, params)?;
        self.fetch(query.name, &sql, values, |row| {
            Ok(self.uow.merge_loaded(E::map_row(row)?))
        })
    }

    /// Runs a bulk update/delete and returns the affected row count.
    ///
    /// Entities already in the unit of work keep their old values unless
    /// `clear_automatically` is set.
    pub fn execute_modifying(
        &self,
        query: &ModifyingQuery,
        params: &QueryParams,
    ) -> QueryResult<usize> {
        let (sql, values) = prepare(query.sql, params)?;
        let affected = self.conn.execute(&sql, params_from_iter(values))?;

        if query.clear_automatically {
            self.uow.clear();
        }
        info!(
            "event=bulk_modify module=query status=ok query={} affected={affected} uow_cleared={}",
            query.name, query.clear_automatically
        );
        Ok(affected)
    }

    fn fetch_entities<E: Entity>(
        &self,
        descriptor: &QueryDescriptor,
        params: &[Value],
        sort: &Sort,
        window: Option<Window>,
    ) -> QueryResult<Vec<E>> {
        check_entity::<E>(descriptor)?;
        let (sql, values) = select_sql::<E>(descriptor, &E::select_list(), params, sort, window)?;
        self.fetch(&descriptor.method, &sql, values, |row| {
            Ok(self.uow.merge_loaded(E::map_row(row)?))
        })
    }

    fn count_matching(&self, descriptor: &QueryDescriptor, params: &[Value]) -> QueryResult<u64> {
        let (where_sql, values) = bind(descriptor, params)?;
        let sql = if descriptor.distinct {
            format!(
                "SELECT COUNT(*) FROM (SELECT DISTINCT * FROM {}{where_sql})",
                descriptor.table
            )
        } else {
            format!("SELECT COUNT(*) FROM {}{where_sql}", descriptor.table)
        };
        let total: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        debug!(
            "event=query_execute module=query method={} cardinality=count result={total}",
            descriptor.method
        );
        Ok(u64::try_from(total).unwrap_or(0))
    }

    fn fetch<T>(
        &self,
        method: &str,
        sql: &str,
        values: Vec<Value>,
        mut map: impl FnMut(&Row<'_>) -> QueryResult<T>,
    ) -> QueryResult<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut mapped = Vec::new();
        while let Some(row) = rows.next()? {
            mapped.push(map(row)?);
        }

        debug!(
            "event=query_execute module=query method={method} rows={}",
            mapped.len()
        );
        Ok(mapped)
    }
}

fn check_shape(descriptor: &QueryDescriptor, requested: Cardinality) -> QueryResult<()> {
    let declared = descriptor.cardinality;
    let compatible = declared == requested || (declared.is_single() && requested.is_single());
    if compatible {
        Ok(())
    } else {
        Err(QueryError::CardinalityMismatch {
            method: descriptor.method.clone(),
            declared,
            requested,
        })
    }
}

fn check_entity<E: Entity>(descriptor: &QueryDescriptor) -> Result<(), MappingError> {
    if descriptor.entity == E::NAME {
        Ok(())
    } else {
        Err(MappingError::SourceMismatch {
            expected: E::NAME,
            actual: descriptor.entity,
        })
    }
}

/// Checks the value count and renders the WHERE clause with its values.
fn bind(descriptor: &QueryDescriptor, params: &[Value]) -> QueryResult<(String, Vec<Value>)> {
    if params.len() != descriptor.param_count() {
        return Err(QueryError::ParameterCount {
            method: descriptor.method.clone(),
            expected: descriptor.param_count(),
            actual: params.len(),
        });
    }
    Ok(descriptor.where_clause(params))
}

/// Static `OrderBy` keys first, then the caller's sort keys.
fn order_sql<E: Entity>(descriptor: &QueryDescriptor, sort: &Sort) -> QueryResult<String> {
    let mut keys: Vec<String> = descriptor
        .order
        .iter()
        .map(|order| format!("{} {}", order.column, order.direction.sql()))
        .collect();

    for order in sort.orders() {
        let field = E::field(&order.property).ok_or_else(|| QueryError::UnknownSortProperty {
            entity: E::NAME,
            property: order.property.clone(),
        })?;
        keys.push(format!("{} {}", field.column, order.direction.sql()));
    }

    if keys.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" ORDER BY {}", keys.join(", ")))
    }
}

fn select_sql<E: Entity>(
    descriptor: &QueryDescriptor,
    columns: &str,
    params: &[Value],
    sort: &Sort,
    window: Option<Window>,
) -> QueryResult<(String, Vec<Value>)> {
    let (where_sql, mut values) = bind(descriptor, params)?;
    let distinct = if descriptor.distinct { "DISTINCT " } else { "" };
    let mut sql = format!(
        "SELECT {distinct}{columns} FROM {}{where_sql}{}",
        descriptor.table,
        order_sql::<E>(descriptor, sort)?
    );

    if let Some(window) = window {
        sql.push_str(&format!(
            " LIMIT ?{} OFFSET ?{}",
            values.len() + 1,
            values.len() + 2
        ));
        values.push(Value::Integer(to_sql_int(window.limit)));
        values.push(Value::Integer(to_sql_int(window.offset)));
    }

    Ok((sql, values))
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::QueryExecutor;
    use crate::db::open_db_in_memory;
    use crate::model::member::Member;
    use crate::model::team::Team;
    use crate::query::descriptor::{Cardinality, DescriptorCache};
    use crate::query::paging::{Direction, Sort};
    use crate::query::unit_of_work::UnitOfWork;
    use crate::query::{MappingError, QueryError};
    use rusqlite::types::Value;
    use rusqlite::{params, Connection};

    fn insert(conn: &Connection, username: &str, age: i32) {
        let member = Member::with_age(username, age);
        conn.execute(
            "INSERT INTO members (id, username, age) VALUES (?1, ?2, ?3)",
            params![member.id().to_string(), username, age],
        )
        .unwrap();
    }

    #[test]
    fn parameter_count_must_match_slots() {
        let conn = open_db_in_memory().unwrap();
        let uow = UnitOfWork::new();
        let executor = QueryExecutor::new(&conn, &uow);
        let cache = DescriptorCache::new();
        let descriptor = cache
            .get_or_parse::<Member>("findByUsernameAndAgeGreaterThan", Cardinality::List)
            .unwrap();

        let err = executor
            .find_list::<Member>(&descriptor, &[Value::Text("AAA".into())], &Sort::unsorted())
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::ParameterCount {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn executing_with_the_wrong_shape_fails() {
        let conn = open_db_in_memory().unwrap();
        let uow = UnitOfWork::new();
        let executor = QueryExecutor::new(&conn, &uow);
        let cache = DescriptorCache::new();
        let descriptor = cache
            .get_or_parse::<Member>("findByAge", Cardinality::List)
            .unwrap();

        let err = executor
            .find_one::<Member>(&descriptor, &[Value::Integer(10)])
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::CardinalityMismatch {
                declared: Cardinality::List,
                requested: Cardinality::Single,
                ..
            }
        ));
    }

    #[test]
    fn descriptor_for_another_entity_is_rejected() {
        let conn = open_db_in_memory().unwrap();
        let uow = UnitOfWork::new();
        let executor = QueryExecutor::new(&conn, &uow);
        let cache = DescriptorCache::new();
        let descriptor = cache
            .get_or_parse::<Team>("findByName", Cardinality::List)
            .unwrap();

        let err = executor
            .find_list::<Member>(&descriptor, &[Value::Text("teamA".into())], &Sort::unsorted())
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Mapping(MappingError::SourceMismatch {
                expected: "Member",
                actual: "Team"
            })
        ));
    }

    #[test]
    fn unknown_sort_property_is_rejected() {
        let conn = open_db_in_memory().unwrap();
        let uow = UnitOfWork::new();
        let executor = QueryExecutor::new(&conn, &uow);
        let cache = DescriptorCache::new();
        let descriptor = cache
            .get_or_parse::<Member>("findByAge", Cardinality::List)
            .unwrap();

        let err = executor
            .find_list::<Member>(
                &descriptor,
                &[Value::Integer(10)],
                &Sort::by(Direction::Asc, "nickname"),
            )
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownSortProperty { .. }));
    }

    #[test]
    fn or_predicates_and_static_order_are_applied() {
        let conn = open_db_in_memory().unwrap();
        insert(&conn, "young", 5);
        insert(&conn, "middle", 30);
        insert(&conn, "old", 70);
        let uow = UnitOfWork::new();
        let executor = QueryExecutor::new(&conn, &uow);
        let cache = DescriptorCache::new();
        let descriptor = cache
            .get_or_parse::<Member>(
                "findByAgeLessThanOrAgeGreaterThanOrderByAgeDesc",
                Cardinality::List,
            )
            .unwrap();

        let found = executor
            .find_list::<Member>(
                &descriptor,
                &[Value::Integer(10), Value::Integer(60)],
                &Sort::unsorted(),
            )
            .unwrap();
        let names: Vec<_> = found.iter().map(|m| m.username.as_str()).collect();
        assert_eq!(names, ["old", "young"]);
    }

    #[test]
    fn exists_and_count_use_the_same_predicate() {
        let conn = open_db_in_memory().unwrap();
        insert(&conn, "AAA", 10);
        insert(&conn, "AAA", 20);
        let uow = UnitOfWork::new();
        let executor = QueryExecutor::new(&conn, &uow);
        let cache = DescriptorCache::new();

        let count = cache
            .get_or_parse::<Member>("countByUsername", Cardinality::Count)
            .unwrap();
        let exists = cache
            .get_or_parse::<Member>("existsByUsername", Cardinality::Exists)
            .unwrap();

        let aaa = [Value::Text("AAA".into())];
        let ccc = [Value::Text("CCC".into())];
        assert_eq!(executor.count(&count, &aaa).unwrap(), 2);
        assert!(executor.exists(&exists, &aaa).unwrap());
        assert!(!executor.exists(&exists, &ccc).unwrap());
    }
}
