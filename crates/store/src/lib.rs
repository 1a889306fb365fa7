//! SQLite persistence for extracted entries.
//!
//! Entries are keyed by URL: storing an entry that was stored before replaces
//! it. The full entry is kept as JSON next to a few indexed columns, so the
//! database can be queried without deserializing every document.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::repo::Repository;
