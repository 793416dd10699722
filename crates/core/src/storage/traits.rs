use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::event::{Event, RawEvent};

use super::{CacheMetadata, Result, StoreInfo, TimeWindow};

/// Durable store for cached events, raw payloads, and freshness metadata.
///
/// The application crate provides the SQLite implementation; tests may
/// substitute doubles. All mutation is funneled through this trait, and the
/// cache manager is the only writer.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Creates the schema if absent and applies pending migrations.
    /// Idempotent.
    async fn initialize(&self) -> Result<()>;

    /// Upserts events by `source_id` in one transaction. An empty batch is
    /// a successful no-op.
    async fn store_events(&self, events: &[Event]) -> Result<()>;

    /// Inserts raw payload rows in one transaction. Multiple rows may share
    /// a `source_id`; each `raw_id` is unique.
    async fn store_raw_events(&self, raws: &[RawEvent]) -> Result<()>;

    /// Stores events and their raw payloads in a single transaction, events
    /// first, so raw rows always reference an existing event.
    async fn store_batch(&self, events: &[Event], raws: &[RawEvent]) -> Result<()>;

    /// Events overlapping the window, cancelled rows excluded, ordered
    /// ascending by start instant.
    async fn get_events_in_range(&self, window: TimeWindow) -> Result<Vec<Event>>;

    /// Looks up a single raw row by its id.
    async fn get_raw_by_id(&self, raw_id: &str) -> Result<Option<RawEvent>>;

    /// Deletes events ending before the cutoff; returns the removed count.
    async fn cleanup_events(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Deletes raw rows cached before the cutoff; returns the removed count.
    async fn cleanup_raw_events(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn clear_events(&self) -> Result<()>;

    async fn clear_raw_events(&self) -> Result<()>;

    /// Snapshot of all freshness-metadata keys plus the event count.
    async fn get_metadata(&self) -> Result<CacheMetadata>;

    /// Upserts each key/value pair in a single transaction. Last writer
    /// wins per key.
    async fn update_metadata(&self, entries: &[(String, String)]) -> Result<()>;

    /// Database diagnostics: file size, recent per-date counts, journal
    /// mode, schema version.
    async fn describe(&self) -> Result<StoreInfo>;
}
