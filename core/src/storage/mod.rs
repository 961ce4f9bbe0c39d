//! Engine binding: connections, table lifecycle, indexes and transactions

pub mod catalog;
pub mod engine;
pub mod index;
pub mod transaction;

pub use catalog::{About, MISSING};
pub use engine::{DbLocation, open_connection, sanitize_table_name};
pub use index::{Index, index_name, list_indexes};
pub use transaction::{TransactionDepth, TransactionScope};
