//! Expression indexes over JSON paths

use crate::error::JsonLiteResult;
use crate::query::sql::{DATA_COLUMN, json_extract, quote_identifier};
use md5::{Digest, Md5};
use regex::Regex;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static EXTRACT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"JSON_EXTRACT\(data,\s?'((?:[^']|'')*)'\s?\)").expect("valid index pattern")
});

/// An index over one or more canonical paths of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub table_name: String,
    pub paths: Vec<String>,
    pub is_unique: bool,
}

impl Index {
    pub fn new(table_name: &str, paths: Vec<String>, is_unique: bool) -> Self {
        Self {
            name: index_name(table_name, &paths, is_unique),
            table_name: table_name.to_string(),
            paths,
            is_unique,
        }
    }

    /// `CREATE [UNIQUE] INDEX IF NOT EXISTS ...`. Paths are embedded as
    /// literals since index definitions cannot take parameters.
    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self
            .paths
            .iter()
            .map(|path| json_extract(DATA_COLUMN, path))
            .collect();
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {}( {} )",
            if self.is_unique { "UNIQUE " } else { "" },
            self.name,
            self.table_name,
            columns.join(", ")
        )
    }
}

/// `ix_<table>_<md5 of paths joined by '='>[:8]`, plus `_UNIQUE`.
///
/// Paths are hashed in the order given because column order is part of the
/// index: `("a", "b")` and `("b", "a")` are different indexes.
pub fn index_name(table: &str, paths: &[String], unique: bool) -> String {
    let digest = Md5::digest(paths.join("=").as_bytes());
    let hash = hex::encode(digest);
    let mut name = format!("ix_{}_{}", table, &hash[..8]);
    if unique {
        name.push_str("_UNIQUE");
    }
    name
}

pub fn drop_sql(name: &str) -> String {
    format!("DROP INDEX IF EXISTS {}", quote_identifier(name))
}

/// Canonical paths referenced by an index definition, in column order.
pub fn parse_index_paths(sql: &str) -> Vec<String> {
    EXTRACT_PATTERN
        .captures_iter(sql)
        .map(|cap| cap[1].replace("''", "'"))
        .collect()
}

/// Indexes on `table` built from JSON path expressions, keyed by name.
/// Anything else (hand-written indexes, autoindexes) is skipped.
pub fn list_indexes(conn: &Connection, table: &str) -> JsonLiteResult<BTreeMap<String, Vec<String>>> {
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_schema \
         WHERE type = 'index' AND tbl_name = ? \
         ORDER BY rootpage",
    )?;
    let rows = stmt.query_map([table], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
    })?;

    let mut indexes = BTreeMap::new();
    for row in rows {
        let (name, sql) = row?;
        let Some(sql) = sql else { continue };
        let paths = parse_index_paths(&sql);
        if !paths.is_empty() {
            indexes.insert(name, paths);
        }
    }
    Ok(indexes)
}
