//! ORDER BY compilation.

use crate::error::{JsonLiteError, JsonLiteResult};
use crate::query::expr::Query;
use crate::query::path::{PathSegment, normalize, render_segments};
use crate::query::sql::json_extract;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One sort key as given by the caller.
///
/// Text and the first key of a segment list may carry a `-` (descending) or
/// `+` (ascending) prefix: `"-born"`, `"-$.born"`, `path!["-addr", 0]`.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderSpec {
    Text(String),
    Segments(Vec<PathSegment>),
    Query(Query),
}

impl From<&str> for OrderSpec {
    fn from(text: &str) -> Self {
        OrderSpec::Text(text.to_string())
    }
}

impl From<String> for OrderSpec {
    fn from(text: String) -> Self {
        OrderSpec::Text(text)
    }
}

impl From<Vec<PathSegment>> for OrderSpec {
    fn from(segments: Vec<PathSegment>) -> Self {
        OrderSpec::Segments(segments)
    }
}

impl From<Query> for OrderSpec {
    fn from(query: Query) -> Self {
        OrderSpec::Query(query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub path: String,
    pub direction: Direction,
}

impl OrderTerm {
    pub fn new(path: impl Into<String>, direction: Direction) -> Self {
        Self {
            path: path.into(),
            direction,
        }
    }
}

/// Resolve sort keys into (canonical path, direction) pairs, caller order
/// preserved.
pub fn compile_order(specs: &[OrderSpec]) -> JsonLiteResult<Vec<OrderTerm>> {
    specs.iter().map(compile_spec).collect()
}

fn compile_spec(spec: &OrderSpec) -> JsonLiteResult<OrderTerm> {
    match spec {
        OrderSpec::Text(text) => {
            let (direction, rest) = strip_direction(text);
            Ok(OrderTerm::new(normalize(rest)?, direction.unwrap_or_default()))
        }
        OrderSpec::Segments(segments) => compile_segments(segments.clone(), Direction::Asc),
        OrderSpec::Query(query) => {
            if query.is_set() {
                return Err(JsonLiteError::AssignedPath(
                    "cannot order by a compared query; `Q::new().field(\"key\")` \
                     is acceptable but `Q::new().field(\"key\").eq(val)` is not"
                        .to_string(),
                ));
            }
            compile_segments(
                query.segments().to_vec(),
                query.direction().unwrap_or_default(),
            )
        }
    }
}

fn compile_segments(
    mut segments: Vec<PathSegment>,
    default: Direction,
) -> JsonLiteResult<OrderTerm> {
    let mut direction = default;
    match segments.first_mut() {
        None => {
            return Err(JsonLiteError::InvalidInput(
                "cannot order by an empty path".to_string(),
            ));
        }
        Some(PathSegment::Key(key)) => {
            let (prefix, rest) = strip_direction(key);
            if let Some(prefix) = prefix {
                let stripped = rest.to_string();
                direction = prefix;
                *key = stripped;
            }
        }
        Some(PathSegment::Index(_)) => {}
    }
    Ok(OrderTerm::new(render_segments(&segments), direction))
}

fn strip_direction(text: &str) -> (Option<Direction>, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (Some(Direction::Desc), rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (Some(Direction::Asc), rest)
    } else {
        (None, text)
    }
}

/// `ORDER BY JSON_EXTRACT(<table>.data, '<path>') ASC, ...`, or nothing.
pub fn order_by_clause(table: &str, terms: &[OrderTerm]) -> String {
    if terms.is_empty() {
        return String::new();
    }
    let column = format!("{}.data", table);
    let keys: Vec<String> = terms
        .iter()
        .map(|term| format!("{} {}", json_extract(&column, &term.path), term.direction))
        .collect();
    format!("ORDER BY {}", keys.join(", "))
}
