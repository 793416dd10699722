use thiserror::Error;

/// Errors returned by the durable event store.
///
/// Every backend failure is classified into one of these variants; nothing
/// below the trait boundary surfaces as a panic or an unclassified error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Database file unreachable or unreadable. Fatal for the caller.
    #[error("store initialization failed: {0}")]
    Init(String),
    /// Constraint violation, disk full, or schema mismatch. Not retryable.
    #[error("store write failed: {0}")]
    Write(String),
    /// Lock contention or busy timeout. Retryable within a bounded budget;
    /// surfaced only once the budget is exhausted.
    #[error("transient store contention: {0}")]
    Transient(String),
    /// Malformed parameters or a read failure. Readers degrade to empty.
    #[error("store query failed: {0}")]
    Query(String),
}

impl StoreError {
    /// True for errors worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            StoreError::Init("no such directory".to_string()).to_string(),
            "store initialization failed: no such directory"
        );
        assert_eq!(
            StoreError::Transient("database is locked".to_string()).to_string(),
            "transient store contention: database is locked"
        );
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(StoreError::Transient("busy".to_string()).is_transient());
        assert!(!StoreError::Write("constraint".to_string()).is_transient());
        assert!(!StoreError::Init("io".to_string()).is_transient());
        assert!(!StoreError::Query("bad param".to_string()).is_transient());
    }
}
