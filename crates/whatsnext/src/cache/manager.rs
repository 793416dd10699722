//! The cache manager owns write ordering and freshness bookkeeping.
//!
//! Exactly one ingest pipeline writes; renderers read through
//! [`CacheManager::events_in_window`], which degrades to an empty list so a
//! view model can always be produced.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};

use whatsnext_core::clock::Clock;
use whatsnext_core::event::{Event, ParsedEvent, RawEvent, RawPayload};
use whatsnext_core::storage::{
    metadata_keys, CacheMetadata, EventStore, Result, StoreError, TimeWindow,
};

/// Bounded retry budget for transient store contention.
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: std::time::Duration = std::time::Duration::from_millis(10);

/// One upstream event plus its optional raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestRecord {
    pub event: ParsedEvent,
    pub raw: Option<RawPayload>,
}

impl IngestRecord {
    pub fn new(event: ParsedEvent) -> Self {
        Self { event, raw: None }
    }

    pub fn with_raw(mut self, raw: RawPayload) -> Self {
        self.raw = Some(raw);
        self
    }
}

/// What an ingest call accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    pub stored: usize,
    pub raw_stored: usize,
    /// Records dropped for failing validation (for example reversed times).
    pub skipped: usize,
}

/// Row counts removed by a cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub events_removed: u64,
    pub raw_removed: u64,
}

/// Orchestrates writes, TTL-based staleness, and retention cleanup over a
/// durable store.
pub struct CacheManager<S> {
    store: S,
    clock: Clock,
    ttl: Duration,
    retention: Duration,
}

impl<S: EventStore> CacheManager<S> {
    pub fn new(store: S, clock: Clock, ttl: Duration, retention: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            retention,
        }
    }

    /// Direct access to the underlying store, for diagnostics.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stores a batch of upstream records and their raw payloads.
    ///
    /// Every row in the batch carries the same `cached_at`, taken once from
    /// the clock. Events and raws land in a single transaction, events
    /// first. On success the freshness keys advance and the failure counter
    /// resets; on failure the counter increments and
    /// `last_successful_fetch` is left untouched.
    pub async fn ingest(&self, batch: Vec<IngestRecord>) -> Result<IngestOutcome> {
        let now = self.clock.now();

        let mut events: Vec<Event> = Vec::with_capacity(batch.len());
        let mut raws: Vec<RawEvent> = Vec::new();
        let mut skipped = 0usize;

        for record in batch {
            let source_id = record.event.source_id.clone();
            let event = match Event::from_parsed(record.event, now) {
                Ok(event) => event,
                Err(error) => {
                    tracing::warn!(%source_id, %error, "skipping invalid upstream record");
                    skipped += 1;
                    continue;
                }
            };
            if let Some(payload) = record.raw {
                raws.push(RawEvent::for_event(&event, payload, now));
            }
            events.push(event);
        }

        let outcome = IngestOutcome {
            stored: events.len(),
            raw_stored: raws.len(),
            skipped,
        };

        match with_retry(|| self.store.store_batch(&events, &raws)).await {
            Ok(()) => {
                let now_text = now.to_rfc3339();
                let entries = vec![
                    (metadata_keys::LAST_UPDATE.to_string(), now_text.clone()),
                    (metadata_keys::LAST_SUCCESSFUL_FETCH.to_string(), now_text),
                    (metadata_keys::CONSECUTIVE_FAILURES.to_string(), "0".to_string()),
                ];
                if let Err(error) = with_retry(|| self.store.update_metadata(&entries)).await {
                    tracing::warn!(%error, "batch stored but freshness metadata update failed");
                }
                tracing::info!(
                    stored = outcome.stored,
                    raw_stored = outcome.raw_stored,
                    skipped = outcome.skipped,
                    "ingest batch stored"
                );
                Ok(outcome)
            }
            Err(error) => {
                tracing::error!(%error, "failed to store ingest batch");
                self.record_failure(&error, now).await;
                Err(error)
            }
        }
    }

    /// Events overlapping the window, cancelled filtered out, sorted by
    /// start. Read failures surface as an empty list; renderers tolerate
    /// empty.
    pub async fn events_in_window(&self, window: TimeWindow) -> Vec<Event> {
        match with_retry(|| self.store.get_events_in_range(window)).await {
            Ok(events) => events,
            Err(error) => {
                tracing::warn!(%error, "range query failed, returning no events");
                Vec::new()
            }
        }
    }

    /// True when the cache has never fetched or the TTL has lapsed since
    /// the last successful fetch. Unreadable metadata counts as stale.
    pub async fn is_stale(&self) -> bool {
        match self.store.get_metadata().await {
            Ok(metadata) => metadata.is_expired(self.clock.now(), self.ttl),
            Err(error) => {
                tracing::warn!(%error, "could not read freshness metadata, treating cache as stale");
                true
            }
        }
    }

    /// Current freshness snapshot.
    pub async fn metadata(&self) -> Result<CacheMetadata> {
        self.store.get_metadata().await
    }

    /// Removes events and raw payloads past the retention window.
    pub async fn cleanup(&self) -> Result<CleanupStats> {
        let cutoff = self.clock.now() - self.retention;
        let events_removed = with_retry(|| self.store.cleanup_events(cutoff)).await?;
        let raw_removed = with_retry(|| self.store.cleanup_raw_events(cutoff)).await?;
        Ok(CleanupStats {
            events_removed,
            raw_removed,
        })
    }

    async fn record_failure(&self, error: &StoreError, now: DateTime<Utc>) {
        let failures = match self.store.get_metadata().await {
            Ok(metadata) => metadata.consecutive_failures + 1,
            Err(read_error) => {
                tracing::warn!(%read_error, "could not read failure count, restarting at 1");
                1
            }
        };
        let entries = vec![
            (metadata_keys::CONSECUTIVE_FAILURES.to_string(), failures.to_string()),
            (metadata_keys::LAST_ERROR.to_string(), error.to_string()),
            (metadata_keys::LAST_ERROR_TIME.to_string(), now.to_rfc3339()),
        ];
        if let Err(write_error) = self.store.update_metadata(&entries).await {
            tracing::warn!(%write_error, "could not record ingest failure in metadata");
        }
    }
}

/// Runs a store call with the transient-error retry budget: up to
/// [`RETRY_ATTEMPTS`] attempts, exponential backoff from
/// [`RETRY_BASE_DELAY`]. Non-transient errors return immediately.
async fn with_retry<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(error) if error.is_transient() && attempt < RETRY_ATTEMPTS => {
                tracing::debug!(attempt, ?delay, %error, "retrying transient store error");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::FixedOffset;

    use whatsnext_core::config::{SelectionSettings, SettingsHandle};
    use whatsnext_core::storage::StoreInfo;
    use whatsnext_core::view::{StatusInput, ViewModelBuilder};

    use crate::storage::SqliteEventStore;

    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn offset(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn record(source_id: &str, subject: &str, start: &str, end: &str) -> IngestRecord {
        IngestRecord::new(
            ParsedEvent::new(source_id, offset(start), offset(end)).with_subject(subject),
        )
    }

    /// Store double with scriptable batch results. Unscripted calls
    /// succeed and append.
    #[derive(Default)]
    struct MockStore {
        events: Mutex<Vec<Event>>,
        metadata: Mutex<HashMap<String, String>>,
        batch_results: Mutex<VecDeque<Result<()>>>,
        batch_calls: Mutex<u32>,
        range_results: Mutex<VecDeque<Result<Vec<Event>>>>,
        cleanup_cutoffs: Mutex<Vec<DateTime<Utc>>>,
    }

    impl MockStore {
        fn script_batch(&self, results: Vec<Result<()>>) {
            *self.batch_results.lock().unwrap() = results.into();
        }

        fn script_range(&self, results: Vec<Result<Vec<Event>>>) {
            *self.range_results.lock().unwrap() = results.into();
        }

        fn batch_calls(&self) -> u32 {
            *self.batch_calls.lock().unwrap()
        }

        fn metadata_value(&self, key: &str) -> Option<String> {
            self.metadata.lock().unwrap().get(key).cloned()
        }
    }

    #[async_trait]
    impl EventStore for MockStore {
        async fn initialize(&self) -> Result<()> {
            Ok(())
        }

        async fn store_events(&self, events: &[Event]) -> Result<()> {
            self.events.lock().unwrap().extend_from_slice(events);
            Ok(())
        }

        async fn store_raw_events(&self, _raws: &[RawEvent]) -> Result<()> {
            Ok(())
        }

        async fn store_batch(&self, events: &[Event], _raws: &[RawEvent]) -> Result<()> {
            *self.batch_calls.lock().unwrap() += 1;
            if let Some(result) = self.batch_results.lock().unwrap().pop_front() {
                result?;
            }
            self.events.lock().unwrap().extend_from_slice(events);
            Ok(())
        }

        async fn get_events_in_range(&self, _window: TimeWindow) -> Result<Vec<Event>> {
            if let Some(result) = self.range_results.lock().unwrap().pop_front() {
                return result;
            }
            Ok(self.events.lock().unwrap().clone())
        }

        async fn get_raw_by_id(&self, _raw_id: &str) -> Result<Option<RawEvent>> {
            Ok(None)
        }

        async fn cleanup_events(&self, cutoff: DateTime<Utc>) -> Result<u64> {
            self.cleanup_cutoffs.lock().unwrap().push(cutoff);
            Ok(2)
        }

        async fn cleanup_raw_events(&self, cutoff: DateTime<Utc>) -> Result<u64> {
            self.cleanup_cutoffs.lock().unwrap().push(cutoff);
            Ok(3)
        }

        async fn clear_events(&self) -> Result<()> {
            self.events.lock().unwrap().clear();
            Ok(())
        }

        async fn clear_raw_events(&self) -> Result<()> {
            Ok(())
        }

        async fn get_metadata(&self) -> Result<CacheMetadata> {
            let map = self.metadata.lock().unwrap();
            Ok(CacheMetadata {
                total_events: self.events.lock().unwrap().len() as i64,
                last_update: map.get(metadata_keys::LAST_UPDATE).cloned(),
                last_successful_fetch: map.get(metadata_keys::LAST_SUCCESSFUL_FETCH).cloned(),
                consecutive_failures: map
                    .get(metadata_keys::CONSECUTIVE_FAILURES)
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0),
                last_error: map.get(metadata_keys::LAST_ERROR).cloned(),
                last_error_time: map.get(metadata_keys::LAST_ERROR_TIME).cloned(),
            })
        }

        async fn update_metadata(&self, entries: &[(String, String)]) -> Result<()> {
            let mut map = self.metadata.lock().unwrap();
            for (key, value) in entries {
                map.insert(key.clone(), value.clone());
            }
            Ok(())
        }

        async fn describe(&self) -> Result<StoreInfo> {
            Ok(StoreInfo::default())
        }
    }

    fn manager_at(now: &str, store: MockStore) -> CacheManager<MockStore> {
        CacheManager::new(
            store,
            Clock::frozen(utc(now)),
            Duration::seconds(3600),
            Duration::days(7),
        )
    }

    #[tokio::test]
    async fn test_ingest_success_advances_freshness() {
        let manager = manager_at("2025-07-14T12:00:00Z", MockStore::default());
        let batch = vec![
            record("a", "One", "2025-07-14T13:00:00Z", "2025-07-14T14:00:00Z")
                .with_raw(RawPayload::new("BEGIN:VEVENT\nEND:VEVENT")),
            record("b", "Two", "2025-07-14T15:00:00Z", "2025-07-14T16:00:00Z"),
        ];

        let outcome = manager.ingest(batch).await.unwrap();

        assert_eq!(outcome, IngestOutcome { stored: 2, raw_stored: 1, skipped: 0 });
        let store = manager.store();
        let now_text = utc("2025-07-14T12:00:00Z").to_rfc3339();
        assert_eq!(store.metadata_value(metadata_keys::LAST_UPDATE), Some(now_text.clone()));
        assert_eq!(
            store.metadata_value(metadata_keys::LAST_SUCCESSFUL_FETCH),
            Some(now_text.clone())
        );
        assert_eq!(
            store.metadata_value(metadata_keys::CONSECUTIVE_FAILURES),
            Some("0".to_string())
        );
        // Every stored row carries the batch's cached_at.
        assert!(store.events.lock().unwrap().iter().all(|e| e.cached_at == now_text));
    }

    #[tokio::test]
    async fn test_ingest_skips_invalid_records() {
        let manager = manager_at("2025-07-14T12:00:00Z", MockStore::default());
        let batch = vec![
            record("good", "Fine", "2025-07-14T13:00:00Z", "2025-07-14T14:00:00Z"),
            // Reversed times fail validation.
            record("bad", "Broken", "2025-07-14T15:00:00Z", "2025-07-14T14:00:00Z"),
        ];

        let outcome = manager.ingest(batch).await.unwrap();

        assert_eq!(outcome, IngestOutcome { stored: 1, raw_stored: 0, skipped: 1 });
    }

    #[tokio::test]
    async fn test_ingest_failure_records_error_and_counts() {
        let store = MockStore::default();
        store.script_batch(vec![Err(StoreError::Write("disk full".to_string()))]);
        let manager = manager_at("2025-07-14T12:00:00Z", store);

        let err = manager
            .ingest(vec![record("a", "One", "2025-07-14T13:00:00Z", "2025-07-14T14:00:00Z")])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Write(_)));
        let store = manager.store();
        assert_eq!(
            store.metadata_value(metadata_keys::CONSECUTIVE_FAILURES),
            Some("1".to_string())
        );
        assert!(store
            .metadata_value(metadata_keys::LAST_ERROR)
            .unwrap()
            .contains("disk full"));
        assert!(store.metadata_value(metadata_keys::LAST_ERROR_TIME).is_some());
        assert_eq!(store.metadata_value(metadata_keys::LAST_SUCCESSFUL_FETCH), None);

        // A second failure keeps counting.
        store.script_batch(vec![Err(StoreError::Write("disk full".to_string()))]);
        let _ = manager
            .ingest(vec![record("b", "Two", "2025-07-14T15:00:00Z", "2025-07-14T16:00:00Z")])
            .await;
        assert_eq!(
            manager.store().metadata_value(metadata_keys::CONSECUTIVE_FAILURES),
            Some("2".to_string())
        );
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let store = MockStore::default();
        store.script_batch(vec![
            Err(StoreError::Transient("busy".to_string())),
            Err(StoreError::Transient("busy".to_string())),
            Ok(()),
        ]);
        let manager = manager_at("2025-07-14T12:00:00Z", store);

        let outcome = manager
            .ingest(vec![record("a", "One", "2025-07-14T13:00:00Z", "2025-07-14T14:00:00Z")])
            .await
            .unwrap();

        assert_eq!(outcome.stored, 1);
        assert_eq!(manager.store().batch_calls(), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausts_to_transient() {
        let store = MockStore::default();
        store.script_batch(vec![
            Err(StoreError::Transient("busy".to_string())),
            Err(StoreError::Transient("busy".to_string())),
            Err(StoreError::Transient("busy".to_string())),
        ]);
        let manager = manager_at("2025-07-14T12:00:00Z", store);

        let err = manager
            .ingest(vec![record("a", "One", "2025-07-14T13:00:00Z", "2025-07-14T14:00:00Z")])
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(manager.store().batch_calls(), 3);
    }

    #[tokio::test]
    async fn test_non_transient_errors_fail_fast() {
        let store = MockStore::default();
        store.script_batch(vec![Err(StoreError::Write("constraint".to_string()))]);
        let manager = manager_at("2025-07-14T12:00:00Z", store);

        let _ = manager
            .ingest(vec![record("a", "One", "2025-07-14T13:00:00Z", "2025-07-14T14:00:00Z")])
            .await;

        assert_eq!(manager.store().batch_calls(), 1);
    }

    #[tokio::test]
    async fn test_events_in_window_degrades_to_empty() {
        let store = MockStore::default();
        store.script_range(vec![Err(StoreError::Query("bad parameter".to_string()))]);
        let manager = manager_at("2025-07-14T12:00:00Z", store);
        let window =
            TimeWindow::new(utc("2025-07-14T00:00:00Z"), utc("2025-07-15T00:00:00Z")).unwrap();

        assert!(manager.events_in_window(window).await.is_empty());

        manager
            .ingest(vec![record("a", "One", "2025-07-14T13:00:00Z", "2025-07-14T14:00:00Z")])
            .await
            .unwrap();
        assert_eq!(manager.events_in_window(window).await.len(), 1);
    }

    #[tokio::test]
    async fn test_is_stale_follows_ttl() {
        let manager = manager_at("2025-07-14T12:00:00Z", MockStore::default());

        // Never fetched.
        assert!(manager.is_stale().await);

        manager
            .store()
            .update_metadata(&[(
                metadata_keys::LAST_SUCCESSFUL_FETCH.to_string(),
                utc("2025-07-14T11:30:00Z").to_rfc3339(),
            )])
            .await
            .unwrap();
        assert!(!manager.is_stale().await);

        manager
            .store()
            .update_metadata(&[(
                metadata_keys::LAST_SUCCESSFUL_FETCH.to_string(),
                utc("2025-07-14T10:00:00Z").to_rfc3339(),
            )])
            .await
            .unwrap();
        assert!(manager.is_stale().await);
    }

    #[tokio::test]
    async fn test_cleanup_uses_retention_cutoff() {
        let manager = manager_at("2025-07-14T12:00:00Z", MockStore::default());

        let stats = manager.cleanup().await.unwrap();

        assert_eq!(stats, CleanupStats { events_removed: 2, raw_removed: 3 });
        let cutoffs = manager.store().cleanup_cutoffs.lock().unwrap().clone();
        assert_eq!(cutoffs, vec![utc("2025-07-07T12:00:00Z"), utc("2025-07-07T12:00:00Z")]);
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent_on_source_id() {
        let store = SqliteEventStore::open_in_memory().await.unwrap();
        let clock = Clock::frozen(utc("2025-07-14T12:00:00Z"));
        let manager =
            CacheManager::new(store, clock, Duration::seconds(3600), Duration::days(7));
        let window =
            TimeWindow::new(utc("2025-07-14T00:00:00Z"), utc("2025-07-15T00:00:00Z")).unwrap();

        let batch = || vec![record("a", "Meeting", "2025-07-14T13:00:00Z", "2025-07-14T14:00:00Z")];
        manager.ingest(batch()).await.unwrap();
        manager.ingest(batch()).await.unwrap();

        let events = manager.events_in_window(window).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source_id, "a");
    }

    #[tokio::test]
    async fn test_end_to_end_whats_next_flow() {
        let store = SqliteEventStore::open_in_memory().await.unwrap();
        let clock = Clock::frozen(utc("2025-07-14T12:00:00Z"));
        let manager = CacheManager::new(store, clock.clone(), Duration::seconds(3600), Duration::days(7));

        manager
            .ingest(vec![
                record("a", "Current", "2025-07-14T11:00:00Z", "2025-07-14T13:00:00Z")
                    .with_raw(RawPayload::new("BEGIN:VEVENT\nSUMMARY:Current\nEND:VEVENT")),
                record("b", "Upcoming", "2025-07-14T12:30:00Z", "2025-07-14T13:30:00Z"),
            ])
            .await
            .unwrap();

        assert!(!manager.is_stale().await);

        let window =
            TimeWindow::new(utc("2025-07-14T00:00:00Z"), utc("2025-07-15T00:00:00Z")).unwrap();
        let events = manager.events_in_window(window).await;
        assert_eq!(events.len(), 2);

        let builder = ViewModelBuilder::new(clock, SettingsHandle::new(SelectionSettings::default()));
        let view = builder.build(&events, StatusInput::default());

        assert!(view.current_events.is_empty());
        assert_eq!(view.next_events[0].subject, "Upcoming");

        let metadata = manager.metadata().await.unwrap();
        assert_eq!(metadata.total_events, 2);
        assert_eq!(metadata.consecutive_failures, 0);
    }
}
