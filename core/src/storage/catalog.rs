//! Document table and metadata table lifecycle

use crate::Config;
use crate::error::JsonLiteResult;
use crate::storage::engine::enable_wal;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Placeholder for metadata that was never written.
pub const MISSING: &str = "**MISSING**";

/// Creation stamp and library version recorded at first initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct About {
    pub created: String,
    pub version: String,
}

pub fn metadata_table(table: &str) -> String {
    format!("{}_kv", table)
}

pub fn version_tag() -> String {
    format!("jsonlite-{}", env!("CARGO_PKG_VERSION"))
}

fn table_exists(conn: &Connection, name: &str) -> JsonLiteResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_schema WHERE type = 'table' AND name = ?",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Create the document and metadata tables if needed.
///
/// Returns `false` when the store already existed; its metadata is left
/// untouched.
pub fn initialize(conn: &Connection, table: &str, config: &Config) -> JsonLiteResult<bool> {
    let kv = metadata_table(table);
    if table_exists(conn, table)? && table_exists(conn, &kv)? {
        let about = about(conn, table)?;
        tracing::debug!(
            "Store exists: created = {}, version = {}",
            about.created,
            about.version
        );
        return Ok(false);
    }

    tracing::debug!("Creating table {} and {}", table, kv);
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table}(
            rowid INTEGER PRIMARY KEY AUTOINCREMENT,
            data TEXT
        );
        CREATE TABLE IF NOT EXISTS {kv}(
            key TEXT PRIMARY KEY,
            val TEXT
        );"
    ))?;

    if !config.disable_metadata {
        let created = chrono::Local::now().to_rfc3339();
        let insert = format!("INSERT OR IGNORE INTO {} VALUES (?, ?)", kv);
        tx.execute(&insert, ["created", created.as_str()])?;
        tx.execute(&insert, ["version", version_tag().as_str()])?;
    }
    tx.commit()?;

    if config.wal_mode {
        enable_wal(conn);
    }

    Ok(true)
}

/// Read the metadata rows. Absent rows read as [`MISSING`].
pub fn about(conn: &Connection, table: &str) -> JsonLiteResult<About> {
    let sql = format!("SELECT val FROM {} WHERE key = ?", metadata_table(table));
    let mut stmt = conn.prepare(&sql)?;
    let mut lookup = |key: &str| -> JsonLiteResult<String> {
        let val: Option<Option<String>> = stmt.query_row([key], |row| row.get(0)).optional()?;
        Ok(val.flatten().unwrap_or_else(|| MISSING.to_string()))
    };

    Ok(About {
        created: lookup("created")?,
        version: lookup("version")?,
    })
}
