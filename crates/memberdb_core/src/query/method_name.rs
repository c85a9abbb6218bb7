//! Method-name query derivation.
//!
//! ```text
//! method     := prefix [subject] "By" [predicates] ["OrderBy" orders]
//! prefix     := find | read | get | query | count | exists
//! subject    := ["Distinct"] [("Top" | "First") digits?] text
//! predicates := predicate (("And" | "Or") predicate)*
//! predicate  := Property [GreaterThan | GreaterThanEqual | LessThan
//!                         | LessThanEqual | Equals | Is]
//! orders     := (Property [Asc | Desc])+
//! ```
//!
//! Subject text other than `Distinct` and the limit is ignored, so
//! `findTop3HelloBy` reads the first three rows of the table.

use crate::model::entity::{Entity, FieldDef};
use crate::query::descriptor::{
    Cardinality, Combinator, Operator, Predicate, QueryDescriptor, StaticOrder,
};
use crate::query::paging::Direction;
use crate::query::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;

static PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(find|read|get|query|count|exists)").expect("valid method prefix regex")
});
static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(find|read|get|query|count|exists)(\w*?)By(\w*)$").expect("valid method regex")
});
static LIMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:Distinct)?(?:Top|First)(\d*)").expect("valid limit regex"));

const ORDER_BY: &str = "OrderBy";

/// Leading words of operator keywords this grammar does not support. Any
/// other word after a property is read as a nested property path.
const OPERATOR_WORDS: &[&str] = &[
    "Is", "Not", "Null", "Equals", "Greater", "Less", "Between", "Like", "In", "Containing",
    "Contains", "Starting", "Starts", "Ending", "Ends", "Before", "After", "True", "False",
    "Ignore", "Empty", "Exists", "Regex", "Matches", "Within", "Near",
];

/// Longest keyword first so `GreaterThanEqual` wins over `GreaterThan`.
const OPERATOR_KEYWORDS: &[(&str, Operator)] = &[
    ("GreaterThanEqual", Operator::GreaterThanEqual),
    ("LessThanEqual", Operator::LessThanEqual),
    ("GreaterThan", Operator::GreaterThan),
    ("LessThan", Operator::LessThan),
    ("Equals", Operator::Equal),
    ("Is", Operator::Equal),
    ("", Operator::Equal),
];

/// Parses `method` against the properties of `E`.
pub fn parse_method_name<E: Entity>(
    method: &str,
    cardinality: Cardinality,
) -> Result<QueryDescriptor, ParseError> {
    let Some(prefix_match) = PREFIX_RE.captures(method) else {
        return Err(ParseError::UnknownPrefix {
            method: method.to_string(),
        });
    };
    let prefix = match &prefix_match[1] {
        "count" => "count",
        "exists" => "exists",
        _ => "find",
    };
    check_prefix(method, prefix, cardinality)?;

    let Some(parts) = METHOD_RE.captures(method) else {
        return Err(ParseError::MissingBy {
            method: method.to_string(),
        });
    };
    let subject = parts.get(2).map_or("", |m| m.as_str());
    let tail = parts.get(3).map_or("", |m| m.as_str());

    let distinct = subject.starts_with("Distinct");
    let limit = parse_limit(method, subject)?;
    if limit.is_some() && !matches!(cardinality, Cardinality::List) && !cardinality.is_single() {
        return Err(ParseError::UnsupportedLimit {
            method: method.to_string(),
            cardinality,
        });
    }

    let (criteria, orders) = match tail.find(ORDER_BY) {
        Some(at) => (&tail[..at], Some(&tail[at + ORDER_BY.len()..])),
        None => (tail, None),
    };

    let predicates = parse_predicates::<E>(method, criteria)?;
    let order = match orders {
        Some(orders) => parse_orders::<E>(method, orders)?,
        None => Vec::new(),
    };

    Ok(QueryDescriptor {
        method: method.to_string(),
        entity: E::NAME,
        table: E::TABLE,
        predicates,
        cardinality,
        distinct,
        limit,
        order,
    })
}

fn check_prefix(
    method: &str,
    prefix: &'static str,
    cardinality: Cardinality,
) -> Result<(), ParseError> {
    let allowed = match prefix {
        "count" => cardinality == Cardinality::Count,
        "exists" => cardinality == Cardinality::Exists,
        _ => !matches!(cardinality, Cardinality::Count | Cardinality::Exists),
    };
    if allowed {
        Ok(())
    } else {
        Err(ParseError::PrefixConflict {
            method: method.to_string(),
            prefix,
            cardinality,
        })
    }
}

fn parse_limit(method: &str, subject: &str) -> Result<Option<u32>, ParseError> {
    let Some(captures) = LIMIT_RE.captures(subject) else {
        return Ok(None);
    };
    let digits = captures.get(1).map_or("", |m| m.as_str());
    if digits.is_empty() {
        return Ok(Some(1));
    }

    match digits.parse::<u32>() {
        Ok(limit) if limit > 0 => Ok(Some(limit)),
        _ => Err(ParseError::InvalidLimit {
            method: method.to_string(),
            limit: digits.to_string(),
        }),
    }
}

fn parse_predicates<E: Entity>(method: &str, criteria: &str) -> Result<Vec<Predicate>, ParseError> {
    if criteria.is_empty() {
        return Ok(Vec::new());
    }
    if criteria.ends_with("And") || criteria.ends_with("Or") {
        return Err(empty_predicate(method));
    }

    let mut predicates = Vec::new();
    for (or_position, or_group) in split_keyword(criteria, "Or").into_iter().enumerate() {
        for (and_position, part) in split_keyword(or_group, "And").into_iter().enumerate() {
            if part.is_empty() {
                return Err(empty_predicate(method));
            }

            let combinator = if and_position == 0 && or_position > 0 {
                Combinator::Or
            } else {
                Combinator::And
            };
            let (field, rest) = match_property::<E>(method, part)?;
            let operator = parse_operator(method, field, rest)?;

            predicates.push(Predicate {
                property: field.property,
                column: field.column,
                operator,
                param_index: predicates.len(),
                combinator,
            });
        }
    }

    Ok(predicates)
}

fn parse_operator(method: &str, field: &FieldDef, rest: &str) -> Result<Operator, ParseError> {
    OPERATOR_KEYWORDS
        .iter()
        .find(|(keyword, _)| *keyword == rest)
        .map(|(_, operator)| *operator)
        .ok_or_else(|| {
            let word = leading_word(rest);
            if OPERATOR_WORDS.contains(&word) {
                ParseError::UnknownOperator {
                    method: method.to_string(),
                    property: field.property,
                    operator: rest.to_string(),
                }
            } else {
                ParseError::NestedProperty {
                    method: method.to_string(),
                    path: format!("{}.{}", field.property, decapitalize(word)),
                }
            }
        })
}

fn parse_orders<E: Entity>(method: &str, orders: &str) -> Result<Vec<StaticOrder>, ParseError> {
    if orders.is_empty() {
        return Err(empty_predicate(method));
    }

    let mut parsed = Vec::new();
    let mut remaining = orders;
    while !remaining.is_empty() {
        let (field, rest) = match_property::<E>(method, remaining)?;
        let (direction, rest) = if let Some(rest) = rest.strip_prefix("Desc") {
            (Direction::Desc, rest)
        } else if let Some(rest) = rest.strip_prefix("Asc") {
            (Direction::Asc, rest)
        } else {
            (Direction::Asc, rest)
        };

        parsed.push(StaticOrder {
            property: field.property,
            column: field.column,
            direction,
        });
        remaining = rest;
    }

    Ok(parsed)
}

/// Matches the longest entity property that prefixes `part`.
fn match_property<'a, E: Entity>(
    method: &str,
    part: &'a str,
) -> Result<(&'static FieldDef, &'a str), ParseError> {
    if part.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(ParseError::LowercaseProperty {
            method: method.to_string(),
            property: leading_word(part).to_string(),
        });
    }

    E::FIELDS
        .iter()
        .filter_map(|field| {
            let capitalized = capitalize(field.property);
            part.strip_prefix(capitalized.as_str())
                .map(|rest| (field, capitalized.len(), rest))
        })
        .max_by_key(|(_, matched, _)| *matched)
        .map(|(field, _, rest)| (field, rest))
        .ok_or_else(|| ParseError::UnknownProperty {
            method: method.to_string(),
            entity: E::NAME,
            property: decapitalize(leading_word(part)),
        })
}

/// Splits on `keyword` when it is followed by an uppercase letter.
fn split_keyword<'a>(input: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut search_from = 0;

    while let Some(found) = input[search_from..].find(keyword) {
        let at = search_from + found;
        let after = at + keyword.len();
        let next_is_upper = input[after..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase());

        if next_is_upper {
            parts.push(&input[start..at]);
            start = after;
        }
        search_from = after;
    }

    parts.push(&input[start..]);
    parts
}

/// `AgeGreaterThan` -> `Age`.
fn leading_word(part: &str) -> &str {
    let end = part
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_ascii_uppercase())
        .map_or(part.len(), |(index, _)| index);
    &part[..end]
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn decapitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn empty_predicate(method: &str) -> ParseError {
    ParseError::EmptyPredicate {
        method: method.to_string(),
    }
}
