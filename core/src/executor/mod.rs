//! Document access layer over a single table

mod database;
mod io;
mod options;
mod result;

pub use database::{JsonLiteDb, Stats};
pub use io::clean_line;
pub use options::{AggregateFunction, CheckpointMode, Duplicates};
pub use result::{Document, Documents, QueryResult, RawDocument};

#[cfg(test)]
mod tests;
