//! jsonlite - JSON document store on SQLite
//!
//! Documents are kept as JSON text in an SQLite table and queried through
//! `JSON_EXTRACT` expressions. Paths, predicates and orderings are built
//! with the [`query`] module and run through [`JsonLiteDb`].

pub mod error;
pub mod executor;
pub mod query;
pub mod storage;

pub use error::{JsonLiteError, JsonLiteResult};
pub use executor::{
    AggregateFunction, CheckpointMode, Document, Documents, Duplicates, JsonLiteDb,
    QueryResult, RawDocument, Stats,
};
pub use query::{Direction, Filter, OrderSpec, PathInput, PathSegment, Q, Query};
pub use storage::{About, DbLocation, TransactionScope};

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Document table. Sanitized to ASCII alphanumerics and `_`.
    pub table: String,
    /// Switch to WAL journaling when the store is created.
    pub wal_mode: bool,
    /// Skip the `created`/`version` rows of the metadata table.
    pub disable_metadata: bool,
    /// Do not register `REGEXP`.
    pub disable_regex: bool,
    /// Log every statement on the `jsonlite::sql` target.
    pub sql_debug: bool,
    pub read_only: bool,
}

impl Config {
    pub const DEFAULT_TABLE: &'static str = "items";

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_wal_mode(mut self, wal_mode: bool) -> Self {
        self.wal_mode = wal_mode;
        self
    }

    pub fn with_disable_metadata(mut self, disable: bool) -> Self {
        self.disable_metadata = disable;
        self
    }

    pub fn with_disable_regex(mut self, disable: bool) -> Self {
        self.disable_regex = disable;
        self
    }

    pub fn with_sql_debug(mut self, sql_debug: bool) -> Self {
        self.sql_debug = sql_debug;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table: Self::DEFAULT_TABLE.to_string(),
            wal_mode: true,
            disable_metadata: false,
            disable_regex: false,
            sql_debug: false,
            read_only: false,
        }
    }
}
