//! Connection setup for the embedded engine

use crate::Config;
use crate::error::{JsonLiteError, JsonLiteResult};
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Where a database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

impl DbLocation {
    pub fn file(path: impl AsRef<Path>) -> Self {
        DbLocation::File(path.as_ref().to_path_buf())
    }
}

impl fmt::Display for DbLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbLocation::File(path) => write!(f, "{}", path.display()),
            DbLocation::Memory => f.write_str(":memory:"),
        }
    }
}

/// Open a connection and install the functions and hooks the document layer
/// relies on.
pub fn open_connection(location: &DbLocation, config: &Config) -> JsonLiteResult<Connection> {
    let mut conn = match location {
        DbLocation::Memory => Connection::open_in_memory()?,
        DbLocation::File(path) if config.read_only => Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?,
        DbLocation::File(path) => Connection::open(path)?,
    };
    tracing::debug!("Opened {} (read_only: {})", location, config.read_only);

    if config.sql_debug {
        conn.trace(Some(trace_sql));
    }

    if !config.disable_regex {
        register_regexp(&conn)?;
    }

    Ok(conn)
}

fn trace_sql(sql: &str) {
    tracing::debug!(target: "jsonlite::sql", "{}", sql);
}

/// Register `REGEXP` so `x REGEXP pattern` works in SQL.
///
/// SQLite calls `regexp(pattern, subject)`. The pattern is compiled once per
/// statement and cached as auxiliary data.
pub fn register_regexp(conn: &Connection) -> JsonLiteResult<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let regex: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> Result<_, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let subject = match ctx.get_raw(1) {
                ValueRef::Null => return Ok(false),
                ValueRef::Integer(i) => i.to_string(),
                ValueRef::Real(f) => f.to_string(),
                ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                    String::from_utf8_lossy(bytes).into_owned()
                }
            };
            Ok(regex.is_match(&subject))
        },
    )?;
    Ok(())
}

/// Keep ASCII alphanumerics and `_`. The name is spliced into SQL text.
pub fn sanitize_table_name(table: &str) -> JsonLiteResult<String> {
    let clean: String = table
        .chars()
        .filter(|c| *c == '_' || c.is_ascii_alphanumeric())
        .collect();
    if clean.is_empty() {
        return Err(JsonLiteError::InvalidInput(format!(
            "table name {:?} has no usable characters",
            table
        )));
    }
    Ok(clean)
}

/// Switch to write-ahead logging. Failure is logged, never raised.
pub fn enable_wal(conn: &Connection) {
    match conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
        row.get::<_, String>(0)
    }) {
        Ok(mode) => tracing::debug!("journal_mode = {}", mode),
        Err(e) => tracing::warn!("Could not enable WAL: {}", e),
    }
}
