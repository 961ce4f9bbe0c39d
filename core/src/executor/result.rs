use crate::error::JsonLiteResult;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Row, Rows, Statement, params_from_iter};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::ops::{Deref, DerefMut};

/// A stored document tagged with its row identifier.
///
/// Serializes as the bare JSON value, so a fetched document can be written
/// back without picking up its rowid.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub rowid: i64,
    pub value: Value,
}

impl Document {
    pub fn new(rowid: i64, value: Value) -> Self {
        Self { rowid, value }
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Decode into a typed record.
    pub fn deserialize<T: DeserializeOwned>(&self) -> JsonLiteResult<T> {
        Ok(T::deserialize(&self.value)?)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl Deref for Document {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.value
    }
}

impl DerefMut for Document {
    fn deref_mut(&mut self) -> &mut Value {
        &mut self.value
    }
}

impl PartialEq<Value> for Document {
    fn eq(&self, other: &Value) -> bool {
        &self.value == other
    }
}

/// A row as stored: the JSON text is not decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub rowid: i64,
    pub data: String,
}

impl RawDocument {
    /// Read `(rowid, data)` from a result row. A NULL `data` reads as `null`.
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            rowid: row.get(0)?,
            data: row
                .get::<_, Option<String>>(1)?
                .unwrap_or_else(|| "null".to_string()),
        })
    }

    pub fn decode(self) -> JsonLiteResult<Document> {
        let value = serde_json::from_str(&self.data)?;
        Ok(Document::new(self.rowid, value))
    }
}

/// A prepared query over `(rowid, data)` rows.
///
/// Nothing is read until [`iter`](Self::iter) runs the statement. Each call
/// runs it again from the start.
#[derive(Debug)]
pub struct QueryResult<'db> {
    stmt: Statement<'db>,
    params: Vec<SqlValue>,
}

impl<'db> QueryResult<'db> {
    pub(crate) fn new(stmt: Statement<'db>, params: Vec<SqlValue>) -> Self {
        Self { stmt, params }
    }

    /// Run the statement and step through its rows.
    pub fn iter(&mut self) -> JsonLiteResult<Documents<'_>> {
        let rows = self.stmt.query(params_from_iter(self.params.iter()))?;
        Ok(Documents { rows })
    }

    pub fn first(mut self) -> JsonLiteResult<Option<Document>> {
        self.iter()?.next().transpose()
    }

    /// Decode every row.
    pub fn all(mut self) -> JsonLiteResult<Vec<Document>> {
        self.iter()?.collect()
    }

    /// Decode every row, dropping the rowids.
    pub fn values(mut self) -> JsonLiteResult<Vec<Value>> {
        self.iter()?
            .map(|doc| doc.map(Document::into_value))
            .collect()
    }

    /// Every row without decoding.
    pub fn raw(mut self) -> JsonLiteResult<Vec<RawDocument>> {
        self.iter()?.raw().collect()
    }
}

/// Single-pass cursor over a running query.
///
/// Rows are stepped as they are pulled. A row the engine cannot produce, or
/// one whose JSON does not decode, fails its own item; an engine error ends
/// the cursor.
pub struct Documents<'stmt> {
    rows: Rows<'stmt>,
}

impl Documents<'_> {
    pub fn next_raw(&mut self) -> Option<JsonLiteResult<RawDocument>> {
        self.rows
            .next()
            .transpose()
            .map(|row| Ok(RawDocument::from_row(row?)?))
    }

    /// Remaining rows without decoding.
    pub fn raw(mut self) -> impl Iterator<Item = JsonLiteResult<RawDocument>> {
        std::iter::from_fn(move || self.next_raw())
    }

    pub fn fetch_one(&mut self) -> Option<JsonLiteResult<Document>> {
        self.next()
    }

    pub fn fetch_many(&mut self, size: usize) -> JsonLiteResult<Vec<Document>> {
        self.by_ref().take(size).collect()
    }
}

impl Iterator for Documents<'_> {
    type Item = JsonLiteResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_raw().map(|raw| raw.and_then(RawDocument::decode))
    }
}
