//! Query descriptors and the per-signature descriptor cache.
//!
//! # Invariants
//! - A descriptor is immutable once built and shared through `Arc`.
//! - The cache tolerates two threads parsing the same signature at once;
//!   the first inserted descriptor wins and both results are identical.

use crate::model::entity::Entity;
use crate::query::method_name::parse_method_name;
use crate::query::paging::Direction;
use crate::query::ParseError;
use log::{debug, trace};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rusqlite::types::Value;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Declared result shape of a query method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// At most one entity; `None` when nothing matches.
    Single,
    /// Same contract as `Single`, declared with an optional return.
    OptionalSingle,
    List,
    Page,
    Slice,
    Count,
    Exists,
}

impl Cardinality {
    pub fn is_single(self) -> bool {
        matches!(self, Self::Single | Self::OptionalSingle)
    }
}

impl Display for Cardinality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::OptionalSingle => "optional-single",
            Self::List => "list",
            Self::Page => "page",
            Self::Slice => "slice",
            Self::Count => "count",
            Self::Exists => "exists",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
}

impl Operator {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::GreaterThan => ">",
            Self::GreaterThanEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanEqual => "<=",
        }
    }
}

/// How a predicate joins the predicates before it. `And` binds tighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub property: &'static str,
    pub column: &'static str,
    pub operator: Operator,
    /// Zero-based position of the bound value.
    pub param_index: usize,
    /// Ignored for the first predicate.
    pub combinator: Combinator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticOrder {
    pub property: &'static str,
    pub column: &'static str,
    pub direction: Direction,
}

/// Structured form of one query method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub method: String,
    pub entity: &'static str,
    pub table: &'static str,
    pub predicates: Vec<Predicate>,
    pub cardinality: Cardinality,
    /// `Distinct` subject: duplicate result rows are collapsed.
    pub distinct: bool,
    pub limit: Option<u32>,
    pub order: Vec<StaticOrder>,
}

impl QueryDescriptor {
    pub fn param_count(&self) -> usize {
        self.predicates.len()
    }

    /// `WHERE ...` clause (or an empty string) with sequential `?N` markers,
    /// plus the values those markers bind.
    ///
    /// `params` holds one value per predicate. An equality predicate bound to
    /// NULL renders as `IS NULL` and binds nothing.
    pub fn where_clause(&self, params: &[Value]) -> (String, Vec<Value>) {
        let mut values = Vec::new();
        if self.predicates.is_empty() {
            return (String::new(), values);
        }

        let mut sql = String::from(" WHERE ");
        for (position, predicate) in self.predicates.iter().enumerate() {
            if position > 0 {
                sql.push_str(match predicate.combinator {
                    Combinator::And => " AND ",
                    Combinator::Or => " OR ",
                });
            }

            let value = params
                .get(predicate.param_index)
                .cloned()
                .unwrap_or(Value::Null);
            if value == Value::Null && predicate.operator == Operator::Equal {
                sql.push_str(&format!("{} IS NULL", predicate.column));
                continue;
            }
            values.push(value);
            sql.push_str(&format!(
                "{} {} ?{}",
                predicate.column,
                predicate.operator.sql(),
                values.len()
            ));
        }
        (sql, values)
    }
}

/// Cache key: entity, method name and declared shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub entity: &'static str,
    pub method: String,
    pub cardinality: Cardinality,
}

static GLOBAL_CACHE: Lazy<DescriptorCache> = Lazy::new(DescriptorCache::new);

/// Process-wide cache used by the built-in repositories.
pub fn global_cache() -> &'static DescriptorCache {
    &GLOBAL_CACHE
}

/// Signature to descriptor cache, safe for concurrent readers.
#[derive(Default)]
pub struct DescriptorCache {
    entries: RwLock<HashMap<MethodSignature, Arc<QueryDescriptor>>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached descriptor for `method`, parsing it on first use.
    pub fn get_or_parse<E: Entity>(
        &self,
        method: &str,
        cardinality: Cardinality,
    ) -> Result<Arc<QueryDescriptor>, ParseError> {
        let signature = MethodSignature {
            entity: E::NAME,
            method: method.to_string(),
            cardinality,
        };

        if let Some(found) = self.entries.read().get(&signature) {
            trace!(
                "event=query_cache_hit module=query entity={} method={method}",
                E::NAME
            );
            return Ok(Arc::clone(found));
        }

        // Parse outside the lock; a racing insert for the same key is kept.
        let parsed = Arc::new(parse_method_name::<E>(method, cardinality)?);
        debug!(
            "event=query_parse module=query status=ok entity={} method={method} cardinality={cardinality} predicates={}",
            E::NAME,
            parsed.predicates.len()
        );

        let mut entries = self.entries.write();
        Ok(Arc::clone(entries.entry(signature).or_insert(parsed)))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
