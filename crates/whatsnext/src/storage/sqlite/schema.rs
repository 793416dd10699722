//! SQLite schema, migrations, and SQL statement constants.
//!
//! Pure data, no I/O. The repository applies `MIGRATIONS` in order and
//! records progress in `PRAGMA user_version`; migrations are linear and
//! forward-only.

/// Connection pragmas applied on every initialize.
///
/// WAL keeps readers concurrent with the single writer and reduces flash
/// wear on the small boards the displays run on; NORMAL flushes on commit
/// rather than per-write.
pub const PRAGMAS: &str = r#"
PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;
PRAGMA foreign_keys=ON;
"#;

/// Initial schema.
const CREATE_SCHEMA_V1: &str = r#"
-- Parsed calendar events, one row per source_id
CREATE TABLE IF NOT EXISTS events (
    event_id TEXT PRIMARY KEY,
    source_id TEXT UNIQUE NOT NULL,
    subject TEXT NOT NULL,
    body_preview TEXT,
    start_instant TEXT NOT NULL,
    end_instant TEXT NOT NULL,
    start_zone TEXT NOT NULL,
    end_zone TEXT NOT NULL,
    all_day INTEGER NOT NULL DEFAULT 0,
    show_as TEXT NOT NULL DEFAULT 'busy',
    cancelled INTEGER NOT NULL DEFAULT 0,
    organizer INTEGER NOT NULL DEFAULT 0,
    location_name TEXT,
    location_address TEXT,
    online INTEGER NOT NULL DEFAULT 0,
    online_meeting_url TEXT,
    web_link TEXT,
    recurring INTEGER NOT NULL DEFAULT 0,
    series_master_id TEXT,
    recurrence_instance_id TEXT,
    is_instance INTEGER NOT NULL DEFAULT 0,
    cached_at TEXT NOT NULL,
    last_modified TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- Raw feed payloads, preserved per ingest (duplicates allowed by design)
CREATE TABLE IF NOT EXISTS raw_events (
    raw_id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    subject TEXT NOT NULL,
    start_instant TEXT NOT NULL,
    end_instant TEXT NOT NULL,
    start_zone TEXT NOT NULL,
    end_zone TEXT NOT NULL,
    all_day INTEGER NOT NULL DEFAULT 0,
    show_as TEXT NOT NULL DEFAULT 'busy',
    cancelled INTEGER NOT NULL DEFAULT 0,
    organizer INTEGER NOT NULL DEFAULT 0,
    location_name TEXT,
    location_address TEXT,
    online INTEGER NOT NULL DEFAULT 0,
    online_meeting_url TEXT,
    web_link TEXT,
    recurring INTEGER NOT NULL DEFAULT 0,
    series_master_id TEXT,
    recurrence_instance_id TEXT,
    is_instance INTEGER NOT NULL DEFAULT 0,
    last_modified TEXT,
    source_url TEXT,
    raw_bytes TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    content_size_bytes INTEGER NOT NULL,
    cached_at TEXT NOT NULL,
    FOREIGN KEY (source_id) REFERENCES events(source_id) ON DELETE CASCADE
);

-- Cache freshness and health metadata
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- Indexes for range scans and id lookups
CREATE INDEX IF NOT EXISTS idx_events_window ON events(start_instant, end_instant);
CREATE INDEX IF NOT EXISTS idx_events_source_id ON events(source_id);
CREATE INDEX IF NOT EXISTS idx_raw_events_source_id ON raw_events(source_id);
CREATE INDEX IF NOT EXISTS idx_raw_events_cached_at ON raw_events(cached_at);

-- Keep updated_at current on any row mutation
CREATE TRIGGER IF NOT EXISTS update_events_timestamp
AFTER UPDATE ON events
BEGIN
    UPDATE events SET updated_at = CURRENT_TIMESTAMP
    WHERE event_id = NEW.event_id;
END;
"#;

/// Ordered migrations; `user_version` records how many have been applied.
pub const MIGRATIONS: &[&str] = &[CREATE_SCHEMA_V1];

/// Upsert keyed on `source_id`.
///
/// Updating in place (rather than INSERT OR REPLACE) keeps raw-event
/// foreign keys valid across re-ingests. The WHERE clause drops a
/// replacement carrying an older `cached_at` than the stored row.
pub const UPSERT_EVENT: &str = r#"
INSERT INTO events (
    event_id, source_id, subject, body_preview,
    start_instant, end_instant, start_zone, end_zone,
    all_day, show_as, cancelled, organizer,
    location_name, location_address, online, online_meeting_url, web_link,
    recurring, series_master_id, recurrence_instance_id, is_instance,
    cached_at, last_modified
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
ON CONFLICT(source_id) DO UPDATE SET
    event_id = excluded.event_id,
    subject = excluded.subject,
    body_preview = excluded.body_preview,
    start_instant = excluded.start_instant,
    end_instant = excluded.end_instant,
    start_zone = excluded.start_zone,
    end_zone = excluded.end_zone,
    all_day = excluded.all_day,
    show_as = excluded.show_as,
    cancelled = excluded.cancelled,
    organizer = excluded.organizer,
    location_name = excluded.location_name,
    location_address = excluded.location_address,
    online = excluded.online,
    online_meeting_url = excluded.online_meeting_url,
    web_link = excluded.web_link,
    recurring = excluded.recurring,
    series_master_id = excluded.series_master_id,
    recurrence_instance_id = excluded.recurrence_instance_id,
    is_instance = excluded.is_instance,
    cached_at = excluded.cached_at,
    last_modified = excluded.last_modified
WHERE excluded.cached_at >= events.cached_at
"#;

pub const INSERT_RAW_EVENT: &str = r#"
INSERT INTO raw_events (
    raw_id, source_id, subject,
    start_instant, end_instant, start_zone, end_zone,
    all_day, show_as, cancelled, organizer,
    location_name, location_address, online, online_meeting_url, web_link,
    recurring, series_master_id, recurrence_instance_id, is_instance,
    last_modified, source_url, raw_bytes, content_hash, content_size_bytes, cached_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)
"#;

/// Overlap scan: starts at or before the window end AND ends at or after
/// the window start. `datetime()` normalizes offset-preserving text so
/// mixed offsets compare as instants; the stored text is returned intact.
pub const SELECT_EVENTS_IN_RANGE: &str = r#"
SELECT event_id, source_id, subject, body_preview,
       start_instant, end_instant, start_zone, end_zone,
       all_day, show_as, cancelled, organizer,
       location_name, location_address, online, online_meeting_url, web_link,
       recurring, series_master_id, recurrence_instance_id, is_instance,
       cached_at, last_modified
FROM events
WHERE datetime(start_instant) <= datetime(?1)
  AND datetime(end_instant) >= datetime(?2)
  AND cancelled = 0
ORDER BY datetime(start_instant) ASC, source_id ASC
"#;

pub const SELECT_RAW_BY_ID: &str = r#"
SELECT raw_id, source_id, subject,
       start_instant, end_instant, start_zone, end_zone,
       all_day, show_as, cancelled, organizer,
       location_name, location_address, online, online_meeting_url, web_link,
       recurring, series_master_id, recurrence_instance_id, is_instance,
       last_modified, source_url, raw_bytes, content_hash, content_size_bytes, cached_at
FROM raw_events
WHERE raw_id = ?1
"#;

pub const DELETE_EVENTS_ENDING_BEFORE: &str = r#"
DELETE FROM events
WHERE datetime(end_instant) < datetime(?1)
"#;

pub const DELETE_RAW_CACHED_BEFORE: &str = r#"
DELETE FROM raw_events
WHERE datetime(cached_at) < datetime(?1)
"#;

pub const DELETE_ALL_EVENTS: &str = "DELETE FROM events";

pub const DELETE_ALL_RAW_EVENTS: &str = "DELETE FROM raw_events";

pub const COUNT_EVENTS: &str = "SELECT COUNT(*) FROM events";

pub const SELECT_METADATA: &str = "SELECT key, value FROM metadata";

pub const UPSERT_METADATA: &str = r#"
INSERT OR REPLACE INTO metadata (key, value, updated_at)
VALUES (?1, ?2, CURRENT_TIMESTAMP)
"#;

/// Per-date event counts for the last seven dates with events.
pub const EVENTS_BY_DATE: &str = r#"
SELECT DATE(start_instant) AS event_date, COUNT(*) AS count
FROM events
GROUP BY DATE(start_instant)
ORDER BY event_date DESC
LIMIT 7
"#;
