//! The document access layer.

use crate::Config;
use crate::error::{JsonLiteError, JsonLiteResult};
use crate::executor::options::{AggregateFunction, CheckpointMode, Duplicates};
use crate::executor::result::{Document, QueryResult, RawDocument};
use crate::query::sql::{from_sql_value, json_extract};
use crate::query::{
    Filter, OrderSpec, PathInput, PathSegment, compile_order, normalize, order_by_clause,
    render_segments, split,
};
use crate::storage::catalog::{self, About};
use crate::storage::index::{self, Index};
use crate::storage::{
    DbLocation, TransactionDepth, TransactionScope, open_connection, sanitize_table_name,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Storage figures for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub dbpath: String,
    pub table: String,
    pub rows: usize,
    pub page_size: i64,
    pub page_count: i64,
    pub freelist_count: i64,
    pub bytes: i64,
    pub indexes: BTreeMap<String, Vec<String>>,
}

/// JSON documents in one table of an SQLite database.
///
/// Each document is a row `(rowid, data)` where `data` is the JSON text.
/// All operations are synchronous and take `&self`; writes run inside a
/// [`TransactionScope`], so several of them can be grouped by holding an
/// outer scope from [`transaction`](Self::transaction).
pub struct JsonLiteDb {
    conn: Connection,
    table: String,
    location: DbLocation,
    config: Config,
    depth: TransactionDepth,
}

impl JsonLiteDb {
    pub fn open(path: impl AsRef<Path>, config: Config) -> JsonLiteResult<Self> {
        Self::connect(DbLocation::file(path), config)
    }

    pub fn memory(config: Config) -> JsonLiteResult<Self> {
        Self::connect(DbLocation::Memory, config)
    }

    /// Open an existing file read-only. Missing files are an engine error.
    pub fn read_only(path: impl AsRef<Path>, config: Config) -> JsonLiteResult<Self> {
        Self::connect(DbLocation::file(path), config.with_read_only(true))
    }

    pub fn connect(location: DbLocation, config: Config) -> JsonLiteResult<Self> {
        let table = sanitize_table_name(&config.table)?;
        let conn = open_connection(&location, &config)?;
        if !config.read_only {
            catalog::initialize(&conn, &table, &config)?;
        }
        tracing::debug!("Using table {} in {}", table, location);

        Ok(Self {
            conn,
            table,
            location,
            config,
            depth: TransactionDepth::new(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Underlying connection, for statements this layer does not cover.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Open a (possibly nested) transaction scope.
    pub fn transaction(&self) -> JsonLiteResult<TransactionScope<'_>> {
        TransactionScope::begin(&self.conn, &self.depth)
    }

    pub fn close(self) -> JsonLiteResult<()> {
        tracing::debug!("Closing {}", self.location);
        self.conn.close().map_err(|(_, e)| JsonLiteError::Engine(e))
    }

    // Inserts

    /// Insert one document. Returns the number of rows written.
    pub fn insert<T: Serialize + ?Sized>(
        &self,
        item: &T,
        duplicates: Duplicates,
    ) -> JsonLiteResult<usize> {
        self.insert_many(std::iter::once(item), duplicates)
    }

    pub fn insert_many<I, T>(&self, items: I, duplicates: Duplicates) -> JsonLiteResult<usize>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        let texts = items
            .into_iter()
            .map(|item| serde_json::to_string(&item).map_err(JsonLiteError::from));
        self.insert_texts(texts, duplicates)
    }

    /// Insert JSON text as-is. The engine's `JSON()` rejects malformed text.
    pub fn insert_raw<I, S>(&self, texts: I, duplicates: Duplicates) -> JsonLiteResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert_texts(texts.into_iter().map(|s| Ok(s.into())), duplicates)
    }

    fn insert_texts(
        &self,
        texts: impl Iterator<Item = JsonLiteResult<String>>,
        duplicates: Duplicates,
    ) -> JsonLiteResult<usize> {
        let sql = format!(
            "INSERT {}INTO {} (data) VALUES (JSON(?))",
            duplicates.conflict_clause(),
            self.table
        );
        let scope = self.transaction()?;
        let mut written = 0;
        {
            let mut stmt = self.conn.prepare_cached(&sql)?;
            for text in texts {
                written += stmt.execute([text?])?;
            }
        }
        scope.commit()?;
        Ok(written)
    }

    // Queries

    fn select_sql(&self, columns: &str, filter: &Filter) -> JsonLiteResult<(String, Vec<SqlValue>)> {
        let compiled = filter.compile()?;
        let order = order_by_clause(&self.table, &filter.compile_order()?);
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {}",
            columns, self.table, compiled.sql
        );
        if !order.is_empty() {
            sql.push(' ');
            sql.push_str(&order);
        }
        if let Some(limit) = filter.get_limit() {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        let values = compiled.bindings.values().into_iter().cloned().collect();
        Ok((sql, values))
    }

    fn prepare_documents(
        &self,
        sql: &str,
        values: Vec<SqlValue>,
    ) -> JsonLiteResult<QueryResult<'_>> {
        Ok(QueryResult::new(self.conn.prepare(sql)?, values))
    }

    /// Documents matching `filter`, honouring its order and limit.
    ///
    /// The statement is prepared here and runs when the result is iterated,
    /// so rows are read and decoded one at a time.
    pub fn query(&self, filter: &Filter) -> JsonLiteResult<QueryResult<'_>> {
        let (sql, values) = self.select_sql("rowid, data", filter)?;
        self.prepare_documents(&sql, values)
    }

    /// First match, or `None`.
    pub fn query_one(&self, filter: &Filter) -> JsonLiteResult<Option<Document>> {
        let filter = filter.clone().limit(1);
        self.query(&filter)?.first()
    }

    /// Number of matches. A limit caps the count.
    pub fn count(&self, filter: &Filter) -> JsonLiteResult<usize> {
        let compiled = filter.compile()?;
        let sql = match filter.get_limit() {
            Some(limit) => format!(
                "SELECT COUNT(*) FROM (SELECT rowid FROM {} WHERE {} LIMIT {})",
                self.table, compiled.sql, limit
            ),
            None => format!(
                "SELECT COUNT(rowid) FROM {} WHERE {}",
                self.table, compiled.sql
            ),
        };
        let count: i64 = self.conn.query_row(
            &sql,
            params_from_iter(compiled.bindings.values()),
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn len(&self) -> JsonLiteResult<usize> {
        self.count(&Filter::new())
    }

    pub fn is_empty(&self) -> JsonLiteResult<bool> {
        Ok(self.len()? == 0)
    }

    fn path_exists_parts(path: impl Into<PathInput>) -> JsonLiteResult<(String, SqlValue)> {
        let segments = split(path)?;
        Ok(match segments.split_last() {
            None => (render_segments(&[]), SqlValue::Text(String::new())),
            Some((child, parent)) => {
                let child = match child {
                    PathSegment::Key(key) => SqlValue::Text(key.clone()),
                    PathSegment::Index(index) => SqlValue::Integer(*index),
                };
                (render_segments(parent), child)
            }
        })
    }

    /// Documents in which `path` is present, including where it holds null.
    ///
    /// Unlike `Q::new().field("k").ne(Value::Null)` this finds keys whose
    /// value is JSON null.
    pub fn query_by_path_exists(
        &self,
        path: impl Into<PathInput>,
        order: &[OrderSpec],
    ) -> JsonLiteResult<QueryResult<'_>> {
        let (parent, child) = Self::path_exists_parts(path)?;
        let order = order_by_clause(&self.table, &compile_order(order)?);
        // DISTINCT over rowid too, so identical documents stay separate rows
        let sql = format!(
            "SELECT DISTINCT {t}.rowid, {t}.data FROM {t}, JSON_EACH({t}.data, ?) AS each \
             WHERE each.key = ? {order}",
            t = self.table,
            order = order
        );
        self.prepare_documents(sql.trim_end(), vec![SqlValue::Text(parent), child])
    }

    pub fn count_by_path_exists(&self, path: impl Into<PathInput>) -> JsonLiteResult<usize> {
        let (parent, child) = Self::path_exists_parts(path)?;
        let sql = format!(
            "SELECT COUNT(*) FROM (SELECT DISTINCT {t}.rowid FROM {t}, JSON_EACH({t}.data, ?) AS each \
             WHERE each.key = ?)",
            t = self.table
        );
        let count: i64 = self.conn.query_row(&sql, (parent, child), |row| row.get(0))?;
        Ok(count as usize)
    }

    /// `AVG`, `SUM`, ... of the value at `path` across all documents.
    pub fn aggregate(
        &self,
        path: impl Into<PathInput>,
        function: AggregateFunction,
    ) -> JsonLiteResult<Value> {
        let path = normalize(path)?;
        let column = format!("{}.data", self.table);
        let sql = format!(
            "SELECT {}({}) AS val FROM {}",
            function.as_sql(),
            json_extract(&column, &path),
            self.table
        );
        let value: SqlValue = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(from_sql_value(value))
    }

    /// `EXPLAIN QUERY PLAN` details, e.g. to check that an index is used.
    pub fn explain_query(&self, filter: &Filter) -> JsonLiteResult<Vec<String>> {
        let (sql, values) = self.select_sql("data", filter)?;
        let mut stmt = self.conn.prepare(&format!("EXPLAIN QUERY PLAN {}", sql))?;
        let details = stmt
            .query_map(params_from_iter(values), |row| row.get::<_, String>("detail"))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(details)
    }

    // Point access

    pub fn get_raw_by_rowid(&self, rowid: i64) -> JsonLiteResult<Option<RawDocument>> {
        let sql = format!("SELECT rowid, data FROM {} WHERE rowid = ?", self.table);
        Ok(self.conn.query_row(&sql, [rowid], RawDocument::from_row).optional()?)
    }

    /// `None` when no row has this id. A row holding JSON null is
    /// `Some` with a null value.
    pub fn get_by_rowid(&self, rowid: i64) -> JsonLiteResult<Option<Document>> {
        self.get_raw_by_rowid(rowid)?
            .map(RawDocument::decode)
            .transpose()
    }

    /// Like [`get_by_rowid`](Self::get_by_rowid) but a missing row is an error.
    pub fn get(&self, rowid: i64) -> JsonLiteResult<Document> {
        self.get_by_rowid(rowid)?
            .ok_or(JsonLiteError::RowNotFound(rowid))
    }

    /// Every document in rowid order.
    pub fn items(&self) -> JsonLiteResult<QueryResult<'_>> {
        let sql = format!("SELECT rowid, data FROM {} ORDER BY rowid", self.table);
        self.prepare_documents(&sql, Vec::new())
    }

    // Removal

    /// Delete documents matching `filter`. An empty filter deletes everything.
    pub fn remove(&self, filter: &Filter) -> JsonLiteResult<usize> {
        let compiled = filter.compile()?;
        let sql = format!("DELETE FROM {} WHERE {}", self.table, compiled.sql);
        let scope = self.transaction()?;
        let removed = self
            .conn
            .execute(&sql, params_from_iter(compiled.bindings.values()))?;
        scope.commit()?;
        Ok(removed)
    }

    pub fn purge(&self) -> JsonLiteResult<usize> {
        tracing::debug!("Purging {}", self.table);
        self.remove(&Filter::new())
    }

    pub fn remove_by_rowid(&self, rowids: &[i64]) -> JsonLiteResult<usize> {
        let sql = format!("DELETE FROM {} WHERE rowid = ?", self.table);
        let scope = self.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = self.conn.prepare_cached(&sql)?;
            for rowid in rowids {
                removed += stmt.execute([rowid])?;
            }
        }
        scope.commit()?;
        Ok(removed)
    }

    /// Delete one row, failing if it does not exist.
    pub fn delete(&self, rowid: i64) -> JsonLiteResult<()> {
        let sql = format!("SELECT 1 FROM {} WHERE rowid = ? LIMIT 1", self.table);
        let exists: Option<i64> = self
            .conn
            .query_row(&sql, [rowid], |row| row.get(0))
            .optional()?;
        if exists.is_none() {
            return Err(JsonLiteError::RowNotFound(rowid));
        }
        self.remove_by_rowid(&[rowid])?;
        Ok(())
    }

    // Updates

    /// Write a fetched (and possibly modified) document back to its row.
    pub fn update(&self, doc: &Document, duplicates: Duplicates) -> JsonLiteResult<usize> {
        self.update_by_rowid(doc.rowid, &doc.value, duplicates)
    }

    pub fn update_by_rowid<T: Serialize + ?Sized>(
        &self,
        rowid: i64,
        item: &T,
        duplicates: Duplicates,
    ) -> JsonLiteResult<usize> {
        let text = serde_json::to_string(item)?;
        let sql = format!(
            "UPDATE {}{} SET data = JSON(?) WHERE rowid = ?",
            duplicates.conflict_clause(),
            self.table
        );
        let scope = self.transaction()?;
        let updated = self.conn.execute(&sql, (text, rowid))?;
        scope.commit()?;
        Ok(updated)
    }

    /// Apply an RFC 7396 merge patch to every match: object members set to
    /// null are removed, others are overlaid.
    pub fn patch(&self, patch: &Value, filter: &Filter) -> JsonLiteResult<usize> {
        let compiled = filter.compile()?;
        let sql = format!(
            "UPDATE {} SET data = JSON_PATCH(data, JSON(?)) WHERE {}",
            self.table, compiled.sql
        );
        let mut values = vec![SqlValue::Text(serde_json::to_string(patch)?)];
        values.extend(compiled.bindings.values().into_iter().cloned());

        let scope = self.transaction()?;
        let patched = self.conn.execute(&sql, params_from_iter(values))?;
        scope.commit()?;
        Ok(patched)
    }

    // Introspection

    /// Children of `start` (root for `"$"`) with the number of documents
    /// holding each, most common first.
    pub fn path_counts(
        &self,
        start: impl Into<PathInput>,
    ) -> JsonLiteResult<Vec<(PathSegment, usize)>> {
        let start = normalize(start)?;
        let sql = format!(
            "SELECT each.key, COUNT(each.key) AS count \
             FROM {t}, JSON_EACH({t}.data, ?) AS each \
             GROUP BY each.key ORDER BY -count",
            t = self.table
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([start], |row| {
                Ok((row.get::<_, SqlValue>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, count)| {
                let segment = match key {
                    SqlValue::Text(key) => PathSegment::Key(key),
                    SqlValue::Integer(index) => PathSegment::Index(index),
                    _ => return None,
                };
                Some((segment, count as usize))
            })
            .collect())
    }

    pub fn keys(&self, start: impl Into<PathInput>) -> JsonLiteResult<Vec<PathSegment>> {
        Ok(self
            .path_counts(start)?
            .into_iter()
            .map(|(segment, _)| segment)
            .collect())
    }

    // Indexes

    fn build_index<I, P>(&self, paths: I, unique: bool) -> JsonLiteResult<Index>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathInput>,
    {
        let paths = paths
            .into_iter()
            .map(normalize)
            .collect::<JsonLiteResult<Vec<_>>>()?;
        if paths.is_empty() {
            return Err(JsonLiteError::InvalidInput(
                "an index needs at least one path".to_string(),
            ));
        }
        Ok(Index::new(&self.table, paths, unique))
    }

    /// Create an index over the given paths and return its name.
    ///
    /// Queries only use the index when their path text matches exactly:
    /// an index on `"key"` (`$."key"`) does not serve `"$.key"`.
    pub fn create_index<I, P>(&self, paths: I, unique: bool) -> JsonLiteResult<String>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathInput>,
    {
        let index = self.build_index(paths, unique)?;
        let scope = self.transaction()?;
        self.conn.execute_batch(&index.create_sql())?;
        scope.commit()?;
        tracing::debug!("Created index {} on {:?}", index.name, index.paths);
        Ok(index.name)
    }

    /// Drop the index [`create_index`](Self::create_index) would have made
    /// for these paths. The `unique` flag is part of the name.
    pub fn drop_index<I, P>(&self, paths: I, unique: bool) -> JsonLiteResult<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathInput>,
    {
        let index = self.build_index(paths, unique)?;
        self.drop_index_by_name(&index.name)
    }

    pub fn drop_index_by_name(&self, name: &str) -> JsonLiteResult<()> {
        let scope = self.transaction()?;
        self.conn.execute_batch(&index::drop_sql(name))?;
        scope.commit()?;
        tracing::debug!("Dropped index {}", name);
        Ok(())
    }

    /// Path indexes on this table: name to canonical paths.
    pub fn indexes(&self) -> JsonLiteResult<BTreeMap<String, Vec<String>>> {
        index::list_indexes(&self.conn, &self.table)
    }

    // Metadata and maintenance

    pub fn about(&self) -> JsonLiteResult<About> {
        catalog::about(&self.conn, &self.table)
    }

    pub fn stats(&self) -> JsonLiteResult<Stats> {
        let pragma = |name: &str| -> JsonLiteResult<i64> {
            Ok(self
                .conn
                .query_row(&format!("PRAGMA {}", name), [], |row| row.get(0))?)
        };
        let page_size = pragma("page_size")?;
        let page_count = pragma("page_count")?;
        let freelist_count = pragma("freelist_count")?;

        Ok(Stats {
            dbpath: self.location.to_string(),
            table: self.table.clone(),
            rows: self.len()?,
            page_size,
            page_count,
            freelist_count,
            bytes: page_size * page_count,
            indexes: self.indexes()?,
        })
    }

    /// Run a WAL checkpoint. Engine errors are logged, not returned.
    pub fn wal_checkpoint(&self, mode: Option<CheckpointMode>) {
        let sql = match mode {
            Some(mode) => format!("PRAGMA wal_checkpoint({})", mode.as_sql()),
            None => "PRAGMA wal_checkpoint".to_string(),
        };
        let res: rusqlite::Result<(i64, i64, i64)> = self
            .conn
            .query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)));
        match res {
            Ok((busy, log, checkpointed)) => tracing::debug!(
                "WAL checkpoint: busy = {}, log = {}, checkpointed = {}",
                busy,
                log,
                checkpointed
            ),
            Err(e) => tracing::warn!("WAL checkpoint error: {}", e),
        }
    }
}

impl fmt::Display for JsonLiteDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonLiteDb({:?}", self.location.to_string())?;
        if self.table != Config::DEFAULT_TABLE {
            write!(f, ", table={:?}", self.table)?;
        }
        f.write_str(")")
    }
}

impl fmt::Debug for JsonLiteDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLiteDb")
            .field("location", &self.location)
            .field("table", &self.table)
            .field("config", &self.config)
            .finish()
    }
}
