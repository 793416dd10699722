//! SQLite implementation of the `EventStore` contract.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;

use whatsnext_core::event::{Event, RawEvent};
use whatsnext_core::storage::{
    metadata_keys, CacheMetadata, DateCount, EventStore, Result, StoreError, StoreInfo, TimeWindow,
};

use super::conversions::{row_to_event, row_to_raw_event};
use super::error::{map_init_error, map_query_error, map_write_error};
use super::schema;

/// Helper to wrap rusqlite errors for tokio_rusqlite closures.
fn wrap_err(e: rusqlite::Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Rusqlite(e)
}

/// Single-file durable store for cached events and raw payloads.
///
/// One connection, one writer at the application layer; WAL journaling
/// keeps readers concurrent with it.
pub struct SqliteEventStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteEventStore {
    /// Opens (creating if necessary) the database at `path` and initializes
    /// the schema. The parent directory is created when missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Init(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let conn = Connection::open(&path).await.map_err(map_init_error)?;
        let store = Self {
            conn,
            path: Some(path.clone()),
        };
        store.initialize().await?;

        tracing::info!(path = %path.display(), "event store opened");
        Ok(store)
    }

    /// In-memory store for tests; data is lost when the connection drops.
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(map_init_error)?;
        let store = Self { conn, path: None };
        store.initialize().await?;
        Ok(store)
    }
}

fn insert_events(
    tx: &rusqlite::Transaction<'_>,
    events: &[Event],
) -> std::result::Result<(), tokio_rusqlite::Error> {
    let mut stmt = tx.prepare(schema::UPSERT_EVENT).map_err(wrap_err)?;
    for event in events {
        stmt.execute(rusqlite::params![
            event.event_id,
            event.source_id,
            event.subject,
            event.body_preview,
            event.start_instant,
            event.end_instant,
            event.start_zone,
            event.end_zone,
            event.all_day,
            event.show_as,
            event.cancelled,
            event.organizer,
            event.location_name,
            event.location_address,
            event.online,
            event.online_meeting_url,
            event.web_link,
            event.recurring,
            event.series_master_id,
            event.recurrence_instance_id,
            event.is_instance,
            event.cached_at,
            event.last_modified,
        ])
        .map_err(wrap_err)?;
    }
    Ok(())
}

fn insert_raw_events(
    tx: &rusqlite::Transaction<'_>,
    raws: &[RawEvent],
) -> std::result::Result<(), tokio_rusqlite::Error> {
    let mut stmt = tx.prepare(schema::INSERT_RAW_EVENT).map_err(wrap_err)?;
    for raw in raws {
        stmt.execute(rusqlite::params![
            raw.raw_id,
            raw.source_id,
            raw.subject,
            raw.start_instant,
            raw.end_instant,
            raw.start_zone,
            raw.end_zone,
            raw.all_day,
            raw.show_as,
            raw.cancelled,
            raw.organizer,
            raw.location_name,
            raw.location_address,
            raw.online,
            raw.online_meeting_url,
            raw.web_link,
            raw.recurring,
            raw.series_master_id,
            raw.recurrence_instance_id,
            raw.is_instance,
            raw.last_modified,
            raw.source_url,
            raw.raw_bytes,
            raw.content_hash,
            raw.content_size_bytes as i64,
            raw.cached_at,
        ])
        .map_err(wrap_err)?;
    }
    Ok(())
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn initialize(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(schema::PRAGMAS).map_err(wrap_err)?;

                let applied: i64 = conn
                    .query_row("PRAGMA user_version", [], |row| row.get(0))
                    .map_err(wrap_err)?;
                for (version, migration) in
                    schema::MIGRATIONS.iter().enumerate().skip(applied as usize)
                {
                    let tx = conn.transaction().map_err(wrap_err)?;
                    tx.execute_batch(migration).map_err(wrap_err)?;
                    tx.pragma_update(None, "user_version", (version + 1) as i64)
                        .map_err(wrap_err)?;
                    tx.commit().map_err(wrap_err)?;
                }
                Ok(())
            })
            .await
            .map_err(map_init_error)
    }

    async fn store_events(&self, events: &[Event]) -> Result<()> {
        if events.is_empty() {
            tracing::debug!("no events to store");
            return Ok(());
        }
        let events = events.to_vec();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                insert_events(&tx, &events)?;
                tx.commit().map_err(wrap_err)?;
                Ok(events.len())
            })
            .await
            .map(|count| tracing::debug!(count, "stored events"))
            .map_err(map_write_error)
    }

    async fn store_raw_events(&self, raws: &[RawEvent]) -> Result<()> {
        if raws.is_empty() {
            return Ok(());
        }
        let raws = raws.to_vec();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                insert_raw_events(&tx, &raws)?;
                tx.commit().map_err(wrap_err)?;
                Ok(raws.len())
            })
            .await
            .map(|count| tracing::debug!(count, "stored raw events"))
            .map_err(map_write_error)
    }

    async fn store_batch(&self, events: &[Event], raws: &[RawEvent]) -> Result<()> {
        if events.is_empty() && raws.is_empty() {
            return Ok(());
        }
        let events = events.to_vec();
        let raws = raws.to_vec();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                // Events first so raw rows always reference an existing
                // parent within the same transaction.
                insert_events(&tx, &events)?;
                insert_raw_events(&tx, &raws)?;
                tx.commit().map_err(wrap_err)?;
                Ok((events.len(), raws.len()))
            })
            .await
            .map(|(events, raws)| tracing::debug!(events, raws, "stored ingest batch"))
            .map_err(map_write_error)
    }

    async fn get_events_in_range(&self, window: TimeWindow) -> Result<Vec<Event>> {
        let end = window.end.to_rfc3339();
        let start = window.start.to_rfc3339();

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(schema::SELECT_EVENTS_IN_RANGE)
                    .map_err(wrap_err)?;
                let rows = stmt.query_map([&end, &start], row_to_event).map_err(wrap_err)?;

                let mut events = Vec::new();
                for row in rows {
                    events.push(row.map_err(wrap_err)?);
                }
                Ok(events)
            })
            .await
            .map_err(map_query_error)
    }

    async fn get_raw_by_id(&self, raw_id: &str) -> Result<Option<RawEvent>> {
        let raw_id = raw_id.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(schema::SELECT_RAW_BY_ID).map_err(wrap_err)?;
                match stmt.query_row([&raw_id], row_to_raw_event) {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(wrap_err(e)),
                }
            })
            .await
            .map_err(map_query_error)
    }

    async fn cleanup_events(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff_text = cutoff.to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(schema::DELETE_EVENTS_ENDING_BEFORE, [&cutoff_text])
                    .map_err(wrap_err)
            })
            .await
            .map(|removed| {
                tracing::info!(removed, %cutoff, "cleaned up expired events");
                removed as u64
            })
            .map_err(map_write_error)
    }

    async fn cleanup_raw_events(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff_text = cutoff.to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(schema::DELETE_RAW_CACHED_BEFORE, [&cutoff_text])
                    .map_err(wrap_err)
            })
            .await
            .map(|removed| {
                tracing::info!(removed, %cutoff, "cleaned up expired raw events");
                removed as u64
            })
            .map_err(map_write_error)
    }

    async fn clear_events(&self) -> Result<()> {
        self.conn
            .call(|conn| conn.execute(schema::DELETE_ALL_EVENTS, []).map_err(wrap_err))
            .await
            .map(|removed| tracing::info!(removed, "cleared events table"))
            .map_err(map_write_error)
    }

    async fn clear_raw_events(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute(schema::DELETE_ALL_RAW_EVENTS, [])
                    .map_err(wrap_err)
            })
            .await
            .map(|removed| tracing::info!(removed, "cleared raw events table"))
            .map_err(map_write_error)
    }

    async fn get_metadata(&self) -> Result<CacheMetadata> {
        self.conn
            .call(|conn| {
                let total_events: i64 = conn
                    .query_row(schema::COUNT_EVENTS, [], |row| row.get(0))
                    .map_err(wrap_err)?;

                let mut stmt = conn.prepare(schema::SELECT_METADATA).map_err(wrap_err)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })
                    .map_err(wrap_err)?;

                let mut metadata = CacheMetadata {
                    total_events,
                    ..CacheMetadata::default()
                };
                for row in rows {
                    let (key, value) = row.map_err(wrap_err)?;
                    match key.as_str() {
                        metadata_keys::LAST_UPDATE => metadata.last_update = Some(value),
                        metadata_keys::LAST_SUCCESSFUL_FETCH => {
                            metadata.last_successful_fetch = Some(value)
                        }
                        metadata_keys::CONSECUTIVE_FAILURES => {
                            metadata.consecutive_failures = value.parse().unwrap_or(0)
                        }
                        metadata_keys::LAST_ERROR => metadata.last_error = Some(value),
                        metadata_keys::LAST_ERROR_TIME => metadata.last_error_time = Some(value),
                        _ => {}
                    }
                }
                Ok(metadata)
            })
            .await
            .map_err(map_query_error)
    }

    async fn update_metadata(&self, entries: &[(String, String)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let entries = entries.to_vec();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                {
                    let mut stmt = tx.prepare(schema::UPSERT_METADATA).map_err(wrap_err)?;
                    for (key, value) in &entries {
                        stmt.execute([key, value]).map_err(wrap_err)?;
                    }
                }
                tx.commit().map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(map_write_error)
    }

    async fn describe(&self) -> Result<StoreInfo> {
        let file_size_bytes = self
            .path
            .as_ref()
            .and_then(|path| std::fs::metadata(path).ok())
            .map(|metadata| metadata.len());

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(schema::EVENTS_BY_DATE).map_err(wrap_err)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
                    })
                    .map_err(wrap_err)?;

                let mut events_by_date = Vec::new();
                for row in rows {
                    let (date, count) = row.map_err(wrap_err)?;
                    if let Some(date) = date {
                        events_by_date.push(DateCount { date, count });
                    }
                }

                let journal_mode: String = conn
                    .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                    .map_err(wrap_err)?;
                let user_version: i64 = conn
                    .query_row("PRAGMA user_version", [], |row| row.get(0))
                    .map_err(wrap_err)?;

                Ok(StoreInfo {
                    file_size_bytes,
                    events_by_date,
                    journal_mode,
                    user_version,
                })
            })
            .await
            .map_err(map_query_error)
    }
}
