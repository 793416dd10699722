mod error;
mod traits;
mod types;

pub use error::{Result, StoreError};
pub use traits::EventStore;
pub use types::{CacheMetadata, DateCount, StoreInfo, TimeWindow, TimeWindowError};

/// Names of the persisted freshness-metadata keys. Absent means "never".
pub mod metadata_keys {
    pub const LAST_UPDATE: &str = "last_update";
    pub const LAST_SUCCESSFUL_FETCH: &str = "last_successful_fetch";
    pub const CONSECUTIVE_FAILURES: &str = "consecutive_failures";
    pub const LAST_ERROR: &str = "last_error";
    pub const LAST_ERROR_TIME: &str = "last_error_time";
}
