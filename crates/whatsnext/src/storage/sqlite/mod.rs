//! SQLite storage backend.
//!
//! Uses `rusqlite` for the synchronous work and `tokio-rusqlite` to run it
//! off the async executor. One file, WAL journaling, a single writer at the
//! application layer, any number of readers.

mod conversions;
mod error;
mod repository;
mod schema;

pub use repository::SqliteEventStore;
