//! Storage backend implementations.
//!
//! The durable store contract lives in `whatsnext_core::storage`; this
//! module provides the SQLite implementation the application runs on.

pub mod sqlite;

pub use sqlite::SqliteEventStore;
