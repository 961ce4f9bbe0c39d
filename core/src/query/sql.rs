//! SQL text fragments shared by the compilers and the index DDL.

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// Document column of the primary table.
pub const DATA_COLUMN: &str = "data";

/// Quote text as an SQLite string literal.
///
/// Index definitions cannot carry bound parameters, so JSON paths are always
/// embedded through this function.
pub fn sqlite_quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Quote an identifier (index or table name) with double quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `JSON_EXTRACT(<column>, '<path>')`
pub fn json_extract(column: &str, path: &str) -> String {
    format!("JSON_EXTRACT({}, {})", column, sqlite_quote(path))
}

/// Render a JSON value as an SQL literal. Display only, never executed.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => i64::from(*b).to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => sqlite_quote(s),
        other => sqlite_quote(&other.to_string()),
    }
}

/// Convert a JSON value into the engine value it is bound as.
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(if *b { 1 } else { 0 }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null)
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        // Arrays and objects compare against JSON_EXTRACT's minified text
        other => SqlValue::Text(other.to_string()),
    }
}

/// Convert an engine value read back from SQL into JSON.
pub fn from_sql_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
    }
}
