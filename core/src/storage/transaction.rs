//! Reference-counted transaction scopes
//!
//! Every write in the document layer runs inside a [`TransactionScope`].
//! Scopes nest: only the outermost one issues `BEGIN` and `COMMIT`, so an
//! internal operation never commits a transaction the caller opened around it.

use crate::error::{JsonLiteError, JsonLiteResult};
use rusqlite::Connection;
use std::cell::Cell;

/// Nesting depth shared by all scopes of one connection.
#[derive(Debug, Default)]
pub struct TransactionDepth(Cell<usize>);

impl TransactionDepth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }

    fn enter(&self) -> usize {
        let depth = self.0.get() + 1;
        self.0.set(depth);
        depth
    }

    fn leave(&self) -> usize {
        let depth = self.0.get().saturating_sub(1);
        self.0.set(depth);
        depth
    }
}

/// Guard over one level of nesting.
///
/// Dropping the outermost scope without calling [`commit`](Self::commit)
/// rolls the transaction back. Dropping an inner scope only unwinds the
/// depth; the outermost scope decides.
#[must_use = "a scope dropped without commit() rolls back"]
pub struct TransactionScope<'a> {
    conn: &'a Connection,
    depth: &'a TransactionDepth,
    finished: bool,
}

impl<'a> TransactionScope<'a> {
    pub fn begin(conn: &'a Connection, depth: &'a TransactionDepth) -> JsonLiteResult<Self> {
        if depth.get() == 0 {
            conn.execute_batch("BEGIN")?;
            tracing::debug!("Transaction started");
        }
        depth.enter();
        Ok(Self {
            conn,
            depth,
            finished: false,
        })
    }

    pub fn is_outermost(&self) -> bool {
        self.depth.get() == 1
    }

    pub fn connection(&self) -> &'a Connection {
        self.conn
    }

    pub fn commit(mut self) -> JsonLiteResult<()> {
        if self.is_outermost() {
            // On failure the drop below rolls back
            self.conn.execute_batch("COMMIT")?;
            tracing::debug!("Transaction committed");
        }
        self.depth.leave();
        self.finished = true;
        Ok(())
    }

    /// Roll back the transaction.
    ///
    /// Only the outermost scope can roll back. On an inner scope nothing is
    /// undone: the scope is closed and `Disallowed` is returned, leaving the
    /// outer scope to commit or roll back the inner writes with its own.
    pub fn rollback(mut self) -> JsonLiteResult<()> {
        self.finished = true;
        if self.depth.leave() == 0 {
            self.conn.execute_batch("ROLLBACK")?;
            tracing::debug!("Transaction rolled back");
            return Ok(());
        }
        tracing::warn!("Rollback requested on an inner transaction scope; nothing was undone");
        Err(JsonLiteError::Disallowed(
            "only the outermost transaction scope can roll back".to_string(),
        ))
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if self.depth.leave() == 0 {
            match self.conn.execute_batch("ROLLBACK") {
                Ok(()) => tracing::debug!("Transaction rolled back"),
                Err(e) => tracing::warn!("Rollback failed: {}", e),
            }
        }
    }
}
