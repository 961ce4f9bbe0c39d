//! Path codec: logical JSON paths to SQLite's canonical path text and back.
//!
//! Keys are rendered double-quoted (`$."key"`), indices as subscripts
//! (`$."key"[1]`). Integers always subscript the element reached so far, so
//! `("key", 1, 2)` is `$."key"[1][2]`: index 2 of index 1 of `key`. Leading
//! integers subscript the document root (`$[0]."a"`).
//!
//! A canonical string handed in by the caller is trusted as-is. `"key"` and
//! `"$.key"` address the same field but normalize to different text
//! (`$."key"` vs `$.key`), and SQLite only uses an index whose expression
//! text matches the query exactly.

use crate::error::{JsonLiteError, JsonLiteResult};
use crate::query::expr::Query;
use serde_json::Value;
use std::fmt;
use std::fmt::Write as _;

/// Root sigil of a canonical path.
pub const ROOT: &str = "$";

/// One step of a logical path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(i64),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<&String> for PathSegment {
    fn from(key: &String) -> Self {
        PathSegment::Key(key.clone())
    }
}

impl From<i64> for PathSegment {
    fn from(index: i64) -> Self {
        PathSegment::Index(index)
    }
}

impl From<i32> for PathSegment {
    fn from(index: i32) -> Self {
        PathSegment::Index(i64::from(index))
    }
}

impl TryFrom<&Value> for PathSegment {
    type Error = JsonLiteError;

    fn try_from(value: &Value) -> JsonLiteResult<Self> {
        match value {
            Value::String(key) => Ok(PathSegment::Key(key.clone())),
            Value::Number(n) => n.as_i64().map(PathSegment::Index).ok_or_else(|| {
                JsonLiteError::UnsupportedKeyType(format!("non-integer index {}", n))
            }),
            other => Err(JsonLiteError::UnsupportedKeyType(format!(
                "path segments must be strings or integers, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Build a `Vec<PathSegment>` from mixed keys and indices.
///
/// ```ignore
/// let p = path!["addresses", 0, "city"];
/// ```
#[macro_export]
macro_rules! path {
    () => {
        ::std::vec::Vec::<$crate::query::PathSegment>::new()
    };
    ($($seg:expr),+ $(,)?) => {
        vec![$($crate::query::PathSegment::from($seg)),+]
    };
}

/// Every shape a caller may use to name a path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathInput {
    /// Canonical text when it starts with `$`, otherwise a single bare key.
    Text(String),
    Segments(Vec<PathSegment>),
    Query(Query),
}

impl From<&str> for PathInput {
    fn from(text: &str) -> Self {
        PathInput::Text(text.to_string())
    }
}

impl From<String> for PathInput {
    fn from(text: String) -> Self {
        PathInput::Text(text)
    }
}

impl From<&String> for PathInput {
    fn from(text: &String) -> Self {
        PathInput::Text(text.clone())
    }
}

impl From<i64> for PathInput {
    fn from(index: i64) -> Self {
        PathInput::Segments(vec![PathSegment::Index(index)])
    }
}

impl From<PathSegment> for PathInput {
    fn from(segment: PathSegment) -> Self {
        PathInput::Segments(vec![segment])
    }
}

impl From<Vec<PathSegment>> for PathInput {
    fn from(segments: Vec<PathSegment>) -> Self {
        PathInput::Segments(segments)
    }
}

impl From<&[PathSegment]> for PathInput {
    fn from(segments: &[PathSegment]) -> Self {
        PathInput::Segments(segments.to_vec())
    }
}

impl From<Query> for PathInput {
    fn from(query: Query) -> Self {
        PathInput::Query(query)
    }
}

impl From<&Query> for PathInput {
    fn from(query: &Query) -> Self {
        PathInput::Query(query.clone())
    }
}

impl TryFrom<&Value> for PathInput {
    type Error = JsonLiteError;

    fn try_from(value: &Value) -> JsonLiteResult<Self> {
        match value {
            Value::String(text) => Ok(PathInput::Text(text.clone())),
            Value::Array(items) => items
                .iter()
                .map(PathSegment::try_from)
                .collect::<JsonLiteResult<Vec<_>>>()
                .map(PathInput::Segments),
            Value::Number(_) => PathSegment::try_from(value).map(PathInput::from),
            other => Err(JsonLiteError::UnsupportedKeyType(format!(
                "unsupported path {}",
                other
            ))),
        }
    }
}

/// Turn any path shape into canonical path text.
pub fn normalize(input: impl Into<PathInput>) -> JsonLiteResult<String> {
    match input.into() {
        PathInput::Text(text) => Ok(normalize_text(&text)),
        PathInput::Segments(segments) => Ok(render_segments(&segments)),
        PathInput::Query(query) => {
            if query.is_set() {
                return Err(JsonLiteError::AssignedPath(
                    "cannot use a compared query as a path; \
                     `Q::new().field(\"key\")` is a path but \
                     `Q::new().field(\"key\").eq(val)` is not"
                        .to_string(),
                ));
            }
            Ok(render_segments(query.segments()))
        }
    }
}

fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        ROOT.to_string()
    } else if text.starts_with(ROOT) {
        text.to_string()
    } else {
        format!("{}.\"{}\"", ROOT, text)
    }
}

/// Render logical segments as canonical path text. No escaping is applied to
/// keys.
pub fn render_segments(segments: &[PathSegment]) -> String {
    let mut out = String::from(ROOT);
    for segment in segments {
        match segment {
            PathSegment::Key(key) => {
                out.push_str(".\"");
                out.push_str(key);
                out.push('"');
            }
            PathSegment::Index(index) => {
                let _ = write!(out, "[{}]", index);
            }
        }
    }
    out
}

/// Inverse of [`normalize`]: logical segments of any path shape.
pub fn split(input: impl Into<PathInput>) -> JsonLiteResult<Vec<PathSegment>> {
    let canonical = normalize(input)?;
    split_canonical(&canonical)
}

/// Tokenize canonical path text. Dots inside double-quoted keys do not split.
pub fn split_canonical(path: &str) -> JsonLiteResult<Vec<PathSegment>> {
    let mut rest = path
        .strip_prefix(ROOT)
        .ok_or_else(|| invalid_path(path, "must start with '$'"))?;
    let mut segments = Vec::new();

    while !rest.is_empty() {
        if let Some(after_dot) = rest.strip_prefix('.') {
            if let Some(quoted) = after_dot.strip_prefix('"') {
                let end = quoted
                    .find('"')
                    .ok_or_else(|| invalid_path(path, "unterminated quoted key"))?;
                segments.push(PathSegment::Key(quoted[..end].to_string()));
                rest = &quoted[end + 1..];
            } else {
                let end = after_dot.find(['.', '[']).unwrap_or(after_dot.len());
                if end == 0 {
                    return Err(invalid_path(path, "empty key"));
                }
                segments.push(PathSegment::Key(after_dot[..end].to_string()));
                rest = &after_dot[end..];
            }
        } else if let Some(after_bracket) = rest.strip_prefix('[') {
            let end = after_bracket
                .find(']')
                .ok_or_else(|| invalid_path(path, "unterminated subscript"))?;
            let index = after_bracket[..end]
                .trim()
                .parse::<i64>()
                .map_err(|_| invalid_path(path, "subscript is not an integer"))?;
            segments.push(PathSegment::Index(index));
            rest = &after_bracket[end + 1..];
        } else {
            return Err(invalid_path(path, "expected '.' or '['"));
        }
    }

    Ok(segments)
}

fn invalid_path(path: &str, reason: &str) -> JsonLiteError {
    JsonLiteError::InvalidInput(format!("bad JSON path {:?}: {}", path, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize("key").unwrap(), "$.\"key\"");
        assert_eq!(normalize("$.key.subkey[3]").unwrap(), "$.key.subkey[3]");
        assert_eq!(normalize("").unwrap(), "$");
    }

    #[test]
    fn test_normalize_segments() {
        let cases: Vec<(Vec<PathSegment>, &str)> = vec![
            (path!["key"], "$.\"key\""),
            (path!["key", 1], "$.\"key\"[1]"),
            (path!["key", 1, 2], "$.\"key\"[1][2]"),
            (path!["key", 1, 2, "subkey"], "$.\"key\"[1][2].\"subkey\""),
            (path!["key", 1, 2, "subkey", 3], "$.\"key\"[1][2].\"subkey\"[3]"),
            (path!["key", "subkey", 30], "$.\"key\".\"subkey\"[30]"),
            (path![1], "$[1]"),
            (path![1, 2, "a"], "$[1][2].\"a\""),
            (path![-4], "$[-4]"),
            (path![], "$"),
        ];
        for (segments, expected) in cases {
            assert_eq!(normalize(segments).unwrap(), expected);
        }
        assert_eq!(normalize(1i64).unwrap(), "$[1]");
    }

    #[test]
    fn test_normalize_query() {
        let q = Query::new().field("key").field("sub").item(1);
        assert_eq!(normalize(&q).unwrap(), "$.\"key\".\"sub\"[1]");

        let assigned = Query::new().field("key").eq("val").unwrap();
        assert!(matches!(
            normalize(assigned),
            Err(JsonLiteError::AssignedPath(_))
        ));
    }

    #[test]
    fn test_path_input_from_json() {
        let input = PathInput::try_from(&json!(["a", 1, "b"])).unwrap();
        assert_eq!(normalize(input).unwrap(), "$.\"a\"[1].\"b\"");

        assert!(matches!(
            PathInput::try_from(&json!(["a", 1.5])),
            Err(JsonLiteError::UnsupportedKeyType(_))
        ));
        assert!(matches!(
            PathInput::try_from(&json!(["a", true])),
            Err(JsonLiteError::UnsupportedKeyType(_))
        ));
        assert!(matches!(
            PathInput::try_from(&json!({"a": 1})),
            Err(JsonLiteError::UnsupportedKeyType(_))
        ));
    }

    #[test]
    fn test_split() {
        assert_eq!(split("a").unwrap(), path!["a"]);
        assert_eq!(split(Query::new().field("a")).unwrap(), path!["a"]);
        assert_eq!(split("$.a.b").unwrap(), path!["a", "b"]);
        assert_eq!(split("$.\"a\".\"b\"").unwrap(), path!["a", "b"]);
        assert_eq!(split("$.a[1]").unwrap(), path!["a", 1]);
        assert_eq!(split("$.\"a\"[1]").unwrap(), path!["a", 1]);
        assert_eq!(split(Query::new().item(1)).unwrap(), path![1]);
        assert_eq!(split(Query::new().item(1).field("a")).unwrap(), path![1, "a"]);
        assert_eq!(split("$").unwrap(), path![]);
        assert_eq!(split("$.\"a.b\".c").unwrap(), path!["a.b", "c"]);
    }

    #[test]
    fn test_split_long_chain() {
        let q = Query::new()
            .field("a")
            .item(1)
            .field("b")
            .item(2)
            .field("c")
            .items([3, 4])
            .item(5)
            .items(path!["six", 7])
            .field("eight")
            .item(9);
        assert_eq!(
            split(q).unwrap(),
            path!["a", 1, "b", 2, "c", 3, 4, 5, "six", 7, "eight", 9]
        );
    }

    #[test]
    fn test_round_trip() {
        let paths = vec![
            path!["first"],
            path!["a", "b", "c"],
            path![0],
            path![0, 1, "x"],
            path!["list", -1],
            path!["with space", "dots.inside", 2],
            path![],
        ];
        for p in paths {
            assert_eq!(split(p.clone()).unwrap(), p);
        }
    }

    #[test]
    fn test_split_rejects_malformed() {
        assert!(split_canonical("key").is_err());
        assert!(split_canonical("$.\"open").is_err());
        assert!(split_canonical("$[x]").is_err());
        assert!(split_canonical("$[1").is_err());
        assert!(split_canonical("$..a").is_err());
    }
}
