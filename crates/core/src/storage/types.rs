use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::parse_instant;

/// Errors that can occur when constructing a time window.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeWindowError {
    #[error("invalid time window: start must not be after end")]
    InvalidWindow,
}

/// A time window for range scans over cached events.
///
/// An event overlaps the window when it starts at or before the window end
/// and ends at or after the window start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a window, validating that start <= end.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeWindowError> {
        if start > end {
            return Err(TimeWindowError::InvalidWindow);
        }
        Ok(Self { start, end })
    }

    /// The local calendar day containing `instant` in the given zone.
    pub fn day_of(instant: DateTime<Utc>, zone: Tz) -> Self {
        let local_day = instant.with_timezone(&zone).date_naive();
        let start_local = zone
            .from_local_datetime(&local_day.and_hms_opt(0, 0, 0).expect("midnight is valid"))
            .earliest()
            .unwrap_or_else(|| zone.from_utc_datetime(&local_day.and_hms_opt(0, 0, 0).expect("midnight is valid")));
        let start = start_local.with_timezone(&Utc);
        Self {
            start,
            end: start + Duration::days(1),
        }
    }
}

/// Snapshot of cache freshness metadata.
///
/// Keys that have never been written surface as `None`; consumers treat
/// absent as "never".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Rows currently in the events table.
    pub total_events: i64,
    pub last_update: Option<String>,
    pub last_successful_fetch: Option<String>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_error_time: Option<String>,
}

impl CacheMetadata {
    pub fn last_update_dt(&self) -> Option<DateTime<Utc>> {
        self.last_update
            .as_deref()
            .and_then(|text| parse_instant(text, None).ok())
    }

    pub fn last_successful_fetch_dt(&self) -> Option<DateTime<Utc>> {
        self.last_successful_fetch
            .as_deref()
            .and_then(|text| parse_instant(text, None).ok())
    }

    /// True when the cache is past its TTL, or has never fetched.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.last_successful_fetch_dt() {
            Some(fetched) => now > fetched + ttl,
            None => true,
        }
    }

    /// Whole minutes since the last update, when one is recorded.
    pub fn minutes_since_update(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_update_dt().map(|t| (now - t).num_minutes())
    }
}

/// Event count for one calendar date, from [`StoreInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCount {
    pub date: String,
    pub count: i64,
}

/// Store diagnostics returned by `describe()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    /// Database file size; absent for in-memory stores.
    pub file_size_bytes: Option<u64>,
    /// Per-date event counts for the most recent dates, newest first.
    pub events_by_date: Vec<DateCount>,
    pub journal_mode: String,
    pub user_version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_valid_window_construction() {
        let window =
            TimeWindow::new(utc("2025-07-14T00:00:00Z"), utc("2025-07-15T00:00:00Z")).unwrap();

        assert_eq!(window.start, utc("2025-07-14T00:00:00Z"));
        assert_eq!(window.end, utc("2025-07-15T00:00:00Z"));
    }

    #[test]
    fn test_degenerate_window_is_valid() {
        let instant = utc("2025-07-14T12:00:00Z");
        assert!(TimeWindow::new(instant, instant).is_ok());
    }

    #[test]
    fn test_reversed_window_is_rejected() {
        let result = TimeWindow::new(utc("2025-07-15T00:00:00Z"), utc("2025-07-14T00:00:00Z"));
        assert_eq!(result, Err(TimeWindowError::InvalidWindow));
    }

    #[test]
    fn test_day_of_in_zone() {
        let pacific: Tz = "America/Los_Angeles".parse().unwrap();
        // 03:00 UTC on July 15 is still July 14 in Pacific time.
        let window = TimeWindow::day_of(utc("2025-07-15T03:00:00Z"), pacific);

        // Pacific midnight July 14 is 07:00 UTC (PDT).
        assert_eq!(window.start, utc("2025-07-14T07:00:00Z"));
        assert_eq!(window.end, utc("2025-07-15T07:00:00Z"));
    }

    #[test]
    fn test_expired_when_never_fetched() {
        let metadata = CacheMetadata::default();
        assert!(metadata.is_expired(utc("2025-07-14T12:00:00Z"), Duration::seconds(3600)));
    }

    #[test]
    fn test_expired_follows_ttl() {
        let metadata = CacheMetadata {
            last_successful_fetch: Some("2025-07-14T11:00:00+00:00".to_string()),
            ..CacheMetadata::default()
        };
        let ttl = Duration::seconds(3600);

        assert!(!metadata.is_expired(utc("2025-07-14T11:30:00Z"), ttl));
        // Exactly at the boundary the cache is still fresh.
        assert!(!metadata.is_expired(utc("2025-07-14T12:00:00Z"), ttl));
        assert!(metadata.is_expired(utc("2025-07-14T12:00:01Z"), ttl));
    }

    #[test]
    fn test_minutes_since_update() {
        let metadata = CacheMetadata {
            last_update: Some("2025-07-14T11:00:00+00:00".to_string()),
            ..CacheMetadata::default()
        };

        assert_eq!(
            metadata.minutes_since_update(utc("2025-07-14T11:45:00Z")),
            Some(45)
        );
        assert_eq!(
            CacheMetadata::default().minutes_since_update(utc("2025-07-14T11:45:00Z")),
            None
        );
    }
}
