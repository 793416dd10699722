//! SQLite row conversion functions.
//!
//! Pure functions mapping rows back to domain values; testable without a
//! database. Column order follows the SELECT constants in `schema.rs`.

use rusqlite::Row;

use whatsnext_core::event::{resolve_zone, Event, RawEvent};

/// Convert a row to an [`Event`].
///
/// Expected columns: event_id, source_id, subject, body_preview,
/// start_instant, end_instant, start_zone, end_zone, all_day, show_as,
/// cancelled, organizer, location_name, location_address, online,
/// online_meeting_url, web_link, recurring, series_master_id,
/// recurrence_instance_id, is_instance, cached_at, last_modified.
pub fn row_to_event(row: &Row) -> rusqlite::Result<Event> {
    let start_zone: String = row.get(6)?;
    let end_zone: String = row.get(7)?;
    // The tag is derived, not stored; re-derive it so a loaded row agrees
    // with a freshly constructed one.
    let zone_unresolved = resolve_zone(&start_zone).is_none() || resolve_zone(&end_zone).is_none();

    Ok(Event {
        event_id: row.get(0)?,
        source_id: row.get(1)?,
        subject: row.get(2)?,
        body_preview: row.get(3)?,
        start_instant: row.get(4)?,
        end_instant: row.get(5)?,
        start_zone,
        end_zone,
        all_day: row.get(8)?,
        show_as: row.get(9)?,
        cancelled: row.get(10)?,
        organizer: row.get(11)?,
        location_name: row.get(12)?,
        location_address: row.get(13)?,
        online: row.get(14)?,
        online_meeting_url: row.get(15)?,
        web_link: row.get(16)?,
        recurring: row.get(17)?,
        series_master_id: row.get(18)?,
        recurrence_instance_id: row.get(19)?,
        is_instance: row.get(20)?,
        zone_unresolved,
        cached_at: row.get(21)?,
        last_modified: row.get(22)?,
    })
}

/// Convert a row to a [`RawEvent`].
///
/// Expected columns: raw_id, source_id, subject, start_instant,
/// end_instant, start_zone, end_zone, all_day, show_as, cancelled,
/// organizer, location_name, location_address, online, online_meeting_url,
/// web_link, recurring, series_master_id, recurrence_instance_id,
/// is_instance, last_modified, source_url, raw_bytes, content_hash,
/// content_size_bytes, cached_at.
pub fn row_to_raw_event(row: &Row) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        raw_id: row.get(0)?,
        source_id: row.get(1)?,
        subject: row.get(2)?,
        start_instant: row.get(3)?,
        end_instant: row.get(4)?,
        start_zone: row.get(5)?,
        end_zone: row.get(6)?,
        all_day: row.get(7)?,
        show_as: row.get(8)?,
        cancelled: row.get(9)?,
        organizer: row.get(10)?,
        location_name: row.get(11)?,
        location_address: row.get(12)?,
        online: row.get(13)?,
        online_meeting_url: row.get(14)?,
        web_link: row.get(15)?,
        recurring: row.get(16)?,
        series_master_id: row.get(17)?,
        recurrence_instance_id: row.get(18)?,
        is_instance: row.get(19)?,
        last_modified: row.get(20)?,
        source_url: row.get(21)?,
        raw_bytes: row.get(22)?,
        content_hash: row.get(23)?,
        content_size_bytes: row.get::<_, i64>(24)? as u64,
        cached_at: row.get(25)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    // Conversions are exercised against a scratch table so the column
    // positions stay honest without pulling in the full schema.

    #[test]
    fn test_row_to_event_rederives_zone_tag() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (
                 event_id TEXT, source_id TEXT, subject TEXT, body_preview TEXT,
                 start_instant TEXT, end_instant TEXT, start_zone TEXT, end_zone TEXT,
                 all_day INTEGER, show_as TEXT, cancelled INTEGER, organizer INTEGER,
                 location_name TEXT, location_address TEXT, online INTEGER,
                 online_meeting_url TEXT, web_link TEXT, recurring INTEGER,
                 series_master_id TEXT, recurrence_instance_id TEXT, is_instance INTEGER,
                 cached_at TEXT, last_modified TEXT
             );
             INSERT INTO t VALUES (
                 'evt_a', 'a', 'Standup', NULL,
                 '2025-07-14T12:00:00+00:00', '2025-07-14T12:30:00+00:00',
                 'Not/A_Zone', 'UTC',
                 0, 'busy', 0, 0,
                 NULL, NULL, 0,
                 NULL, NULL, 0,
                 NULL, NULL, 0,
                 '2025-07-14T10:00:00+00:00', NULL
             );",
        )
        .unwrap();

        let event = conn
            .query_row("SELECT * FROM t", [], row_to_event)
            .unwrap();

        assert_eq!(event.event_id, "evt_a");
        assert_eq!(event.subject, "Standup");
        assert!(event.zone_unresolved);
        assert!(!event.cancelled);
    }

    #[test]
    fn test_row_to_raw_event_reads_size_as_integer() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (
                 raw_id TEXT, source_id TEXT, subject TEXT,
                 start_instant TEXT, end_instant TEXT, start_zone TEXT, end_zone TEXT,
                 all_day INTEGER, show_as TEXT, cancelled INTEGER, organizer INTEGER,
                 location_name TEXT, location_address TEXT, online INTEGER,
                 online_meeting_url TEXT, web_link TEXT, recurring INTEGER,
                 series_master_id TEXT, recurrence_instance_id TEXT, is_instance INTEGER,
                 last_modified TEXT, source_url TEXT, raw_bytes TEXT,
                 content_hash TEXT, content_size_bytes INTEGER, cached_at TEXT
             );
             INSERT INTO t VALUES (
                 'raw_a_00000000', 'a', 'Standup',
                 '2025-07-14T12:00:00+00:00', '2025-07-14T12:30:00+00:00', 'UTC', 'UTC',
                 0, 'busy', 0, 0,
                 NULL, NULL, 0,
                 NULL, NULL, 0,
                 NULL, '2025-07-14T12:00:00Z', 1,
                 NULL, NULL, 'BEGIN:VEVENT',
                 'deadbeef', 12, '2025-07-14T10:00:00+00:00'
             );",
        )
        .unwrap();

        let raw = conn
            .query_row("SELECT * FROM t", [], row_to_raw_event)
            .unwrap();

        assert_eq!(raw.raw_id, "raw_a_00000000");
        assert_eq!(raw.content_size_bytes, 12);
        assert!(raw.is_instance);
        assert_eq!(
            raw.recurrence_instance_id.as_deref(),
            Some("2025-07-14T12:00:00Z")
        );
    }
}
