//! Declarative query engine.
//!
//! # Responsibility
//! - Derive query descriptors from method names (`method_name`) and cache
//!   them per signature (`descriptor`).
//! - Execute descriptors and explicit queries against SQLite and map rows to
//!   entities, projections, counts and pages (`executor`, `paging`).
//! - Track entities loaded in one transaction (`unit_of_work`).
//!
//! # Invariants
//! - Not-found is never an error for single results; more than one row is.
//! - Driver errors are carried unchanged in [`QueryError::Store`].

pub mod annotated;
pub mod descriptor;
pub mod executor;
pub mod method_name;
pub mod paging;
pub mod projection;
pub mod row;
pub mod unit_of_work;

use descriptor::Cardinality;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type QueryResult<T> = Result<T, QueryError>;

/// Method-name grammar violations, reported when a descriptor is first built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnknownPrefix {
        method: String,
    },
    MissingBy {
        method: String,
    },
    UnknownProperty {
        method: String,
        entity: &'static str,
        property: String,
    },
    UnknownOperator {
        method: String,
        property: &'static str,
        operator: String,
    },
    /// Property segment starting with a lowercase letter, e.g. `findByusername`.
    LowercaseProperty {
        method: String,
        property: String,
    },
    /// Path through a related entity, e.g. `findByTeamName`.
    NestedProperty {
        method: String,
        path: String,
    },
    EmptyPredicate {
        method: String,
    },
    InvalidLimit {
        method: String,
        limit: String,
    },
    UnsupportedLimit {
        method: String,
        cardinality: Cardinality,
    },
    PrefixConflict {
        method: String,
        prefix: &'static str,
        cardinality: Cardinality,
    },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownPrefix { method } => write!(
                f,
                "`{method}` must start with find|read|get|query|count|exists"
            ),
            Self::MissingBy { method } => write!(f, "`{method}` has no `By` clause"),
            Self::UnknownProperty {
                method,
                entity,
                property,
            } => write!(f, "`{method}`: no property `{property}` on {entity}"),
            Self::UnknownOperator {
                method,
                property,
                operator,
            } => write!(
                f,
                "`{method}`: unsupported operator `{operator}` after property `{property}`"
            ),
            Self::LowercaseProperty { method, property } => write!(
                f,
                "`{method}`: property `{property}` must start with an uppercase letter"
            ),
            Self::NestedProperty { method, path } => {
                write!(f, "`{method}`: nested property path `{path}` is not supported")
            }
            Self::EmptyPredicate { method } => {
                write!(f, "`{method}` has an empty predicate around And/Or")
            }
            Self::InvalidLimit { method, limit } => {
                write!(f, "`{method}`: result limit `{limit}` must be at least 1")
            }
            Self::UnsupportedLimit {
                method,
                cardinality,
            } => write!(
                f,
                "`{method}`: Top/First cannot be combined with {cardinality} results"
            ),
            Self::PrefixConflict {
                method,
                prefix,
                cardinality,
            } => write!(
                f,
                "`{method}`: prefix `{prefix}` cannot declare {cardinality} results"
            ),
        }
    }
}

impl Error for ParseError {}

/// Row or projection construction failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    UnknownProperty {
        entity: &'static str,
        property: String,
    },
    ColumnCount {
        expected: usize,
        actual: usize,
    },
    InvalidValue {
        column: String,
        message: String,
    },
    SourceMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownProperty { entity, property } => {
                write!(f, "projection property `{property}` does not exist on {entity}")
            }
            Self::ColumnCount { expected, actual } => write!(
                f,
                "projection expects {expected} columns but the query returned {actual}"
            ),
            Self::InvalidValue { column, message } => {
                write!(f, "invalid value in column `{column}`: {message}")
            }
            Self::SourceMismatch { expected, actual } => write!(
                f,
                "projection reads {expected} but the query targets {actual}"
            ),
        }
    }
}

impl Error for MappingError {}

/// Error returned by query execution.
#[derive(Debug)]
pub enum QueryError {
    Parse(ParseError),
    Mapping(MappingError),
    NonUniqueResult {
        method: String,
    },
    ParameterCount {
        method: String,
        expected: usize,
        actual: usize,
    },
    MissingParameter(String),
    UnusedParameter(String),
    CardinalityMismatch {
        method: String,
        declared: Cardinality,
        requested: Cardinality,
    },
    UnknownSortProperty {
        entity: &'static str,
        property: String,
    },
    InvalidPageRequest(String),
    Store(rusqlite::Error),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
            Self::Mapping(err) => write!(f, "{err}"),
            Self::NonUniqueResult { method } => {
                write!(f, "`{method}` did not return a unique result")
            }
            Self::ParameterCount {
                method,
                expected,
                actual,
            } => write!(
                f,
                "`{method}` expects {expected} parameters, {actual} were bound"
            ),
            Self::MissingParameter(name) => write!(f, "no value bound for parameter `{name}`"),
            Self::UnusedParameter(name) => {
                write!(f, "parameter `{name}` is not referenced by the query")
            }
            Self::CardinalityMismatch {
                method,
                declared,
                requested,
            } => write!(
                f,
                "`{method}` is declared as {declared} but was executed as {requested}"
            ),
            Self::UnknownSortProperty { entity, property } => {
                write!(f, "cannot sort {entity} by unknown property `{property}`")
            }
            Self::InvalidPageRequest(message) => write!(f, "invalid page request: {message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Mapping(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseError> for QueryError {
    fn from(value: ParseError) -> Self {
        Self::Parse(value)
    }
}

impl From<MappingError> for QueryError {
    fn from(value: MappingError) -> Self {
        Self::Mapping(value)
    }
}

impl From<rusqlite::Error> for QueryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value)
    }
}
