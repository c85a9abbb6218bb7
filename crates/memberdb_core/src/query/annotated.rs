//! Explicit queries declared with SQL text instead of a derived method name.
//!
//! Placeholders are either named (`:username`) or positional (`?1`). A list
//! parameter expands to `?, ?, ...`, so `IN (:names)` binds a collection; an
//! empty list expands to `NULL` and matches nothing. Placeholders inside SQL
//! string literals are not recognized, keep literal text free of `:word`.

use crate::query::{QueryError, QueryResult};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rusqlite::types::Value;
use std::collections::BTreeSet;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)|\?([0-9]+)").expect("valid placeholder regex")
});

/// A read query with explicit SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotatedQuery {
    pub name: &'static str,
    pub sql: &'static str,
}

impl AnnotatedQuery {
    pub const fn new(name: &'static str, sql: &'static str) -> Self {
        Self { name, sql }
    }
}

/// An update/delete statement executed directly against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifyingQuery {
    pub name: &'static str,
    pub sql: &'static str,
    /// Clear the unit of work after execution.
    pub clear_automatically: bool,
}

impl ModifyingQuery {
    pub const fn new(name: &'static str, sql: &'static str) -> Self {
        Self {
            name,
            sql,
            clear_automatically: false,
        }
    }

    pub const fn clear_automatically(mut self, clear: bool) -> Self {
        self.clear_automatically = clear;
        self
    }
}

/// One bound value, or a collection for `IN (...)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Value(Value),
    List(Vec<Value>),
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Value(Value::Text(value.to_string()))
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Value(Value::Text(value))
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Self::Value(Value::Integer(i64::from(value)))
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Value(Value::Integer(value))
    }
}

impl From<&[String]> for Param {
    fn from(values: &[String]) -> Self {
        Self::List(values.iter().cloned().map(Value::Text).collect())
    }
}

/// Values for an explicit query.
///
/// Named values answer `:name` placeholders and positional values answer
/// `?N`. Every bound value must be referenced by the SQL.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryParams {
    named: Vec<(String, Param)>,
    positional: Vec<Param>,
}

impl QueryParams {
    /// No values.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn named() -> Self {
        Self::default()
    }

    /// Values for `?1`, `?2`, ... in order.
    pub fn positional(values: Vec<Param>) -> Self {
        Self {
            named: Vec::new(),
            positional: values,
        }
    }

    /// Adds the value for `:name`.
    pub fn bind(mut self, name: &str, param: impl Into<Param>) -> Self {
        self.named.push((name.to_string(), param.into()));
        self
    }

    /// Adds the value for the next `?N`.
    pub fn push(mut self, param: impl Into<Param>) -> Self {
        self.positional.push(param.into());
        self
    }

    fn lookup(&self, placeholder: &Placeholder<'_>) -> Option<&Param> {
        match placeholder {
            Placeholder::Named(name) => self
                .named
                .iter()
                .find(|(bound, _)| bound == name)
                .map(|(_, param)| param),
            Placeholder::Position(position) => position
                .checked_sub(1)
                .and_then(|index| self.positional.get(index)),
        }
    }

    fn bound_keys(&self) -> Vec<String> {
        self.named
            .iter()
            .map(|(name, _)| name.clone())
            .chain((1..=self.positional.len()).map(|n| format!("?{n}")))
            .collect()
    }
}

enum Placeholder<'a> {
    Named(&'a str),
    Position(usize),
}

impl Placeholder<'_> {
    fn key(&self) -> String {
        match self {
            Self::Named(name) => (*name).to_string(),
            Self::Position(position) => format!("?{position}"),
        }
    }
}

/// Rewrites placeholders to sequential `?N` markers and returns the values
/// in marker order.
pub fn prepare(sql: &str, params: &QueryParams) -> QueryResult<(String, Vec<Value>)> {
    let mut values = Vec::new();
    let mut used = BTreeSet::new();
    let mut missing = None;

    let rewritten = PLACEHOLDER_RE.replace_all(sql, |caps: &Captures<'_>| {
        let placeholder = match (caps.get(1), caps.get(2)) {
            (Some(name), _) => Placeholder::Named(name.as_str()),
            (None, Some(position)) => {
                Placeholder::Position(position.as_str().parse().unwrap_or(0))
            }
            (None, None) => return String::new(),
        };

        let Some(param) = params.lookup(&placeholder) else {
            if missing.is_none() {
                missing = Some(placeholder.key());
            }
            return String::new();
        };
        used.insert(placeholder.key());

        match param {
            Param::Value(value) => {
                values.push(value.clone());
                format!("?{}", values.len())
            }
            Param::List(items) if items.is_empty() => "NULL".to_string(),
            Param::List(items) => items
                .iter()
                .map(|item| {
                    values.push(item.clone());
                    format!("?{}", values.len())
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    });

    if let Some(name) = missing {
        return Err(QueryError::MissingParameter(name));
    }
    if let Some(unused) = params
        .bound_keys()
        .into_iter()
        .find(|key| !used.contains(key))
    {
        return Err(QueryError::UnusedParameter(unused));
    }

    Ok((rewritten.into_owned(), values))
}
