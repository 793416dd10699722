//! SQLite error classification.
//!
//! Maps `tokio_rusqlite::Error` and `rusqlite::Error` into the store error
//! taxonomy. Lock contention surfaces as `Transient` so callers can retry;
//! everything else is classified by the operation it failed in.

use whatsnext_core::storage::StoreError;

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.code == rusqlite::ErrorCode::DatabaseBusy
                || sqlite_err.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

fn inner(err: &tokio_rusqlite::Error) -> Option<&rusqlite::Error> {
    match err {
        tokio_rusqlite::Error::Rusqlite(rusqlite_err) => Some(rusqlite_err),
        _ => None,
    }
}

/// Classification for `initialize`/`open` failures.
pub fn map_init_error(err: tokio_rusqlite::Error) -> StoreError {
    match inner(&err) {
        Some(rusqlite_err) if is_busy(rusqlite_err) => StoreError::Transient(err.to_string()),
        _ => StoreError::Init(err.to_string()),
    }
}

/// Classification for write-path failures (stores, cleanup, metadata).
pub fn map_write_error(err: tokio_rusqlite::Error) -> StoreError {
    match inner(&err) {
        Some(rusqlite_err) if is_busy(rusqlite_err) => StoreError::Transient(err.to_string()),
        _ => StoreError::Write(err.to_string()),
    }
}

/// Classification for read-path failures.
pub fn map_query_error(err: tokio_rusqlite::Error) -> StoreError {
    match inner(&err) {
        Some(rusqlite_err) if is_busy(rusqlite_err) => StoreError::Transient(err.to_string()),
        _ => StoreError::Query(err.to_string()),
    }
}
