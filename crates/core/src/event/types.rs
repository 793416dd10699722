use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::error::EventError;
use super::time::{parse_instant, resolve_zone};

/// Longest display subject derived from a body preview.
const DERIVED_SUBJECT_MAX_CHARS: usize = 120;

/// A validated upstream record accepted at the ingest boundary.
///
/// The feed parser produces these; everything downstream works with the
/// concrete [`Event`] built from one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEvent {
    pub source_id: String,
    /// Explicit primary key. Derived from `source_id` when absent.
    pub event_id: Option<String>,
    pub subject: Option<String>,
    pub body_preview: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub start_zone: String,
    pub end_zone: String,
    pub all_day: bool,
    pub show_as: String,
    pub cancelled: bool,
    pub organizer: bool,
    pub location_name: Option<String>,
    pub location_address: Option<String>,
    pub online: bool,
    pub online_meeting_url: Option<String>,
    pub web_link: Option<String>,
    pub recurring: bool,
    pub series_master_id: Option<String>,
    /// Original-occurrence timestamp identifying this instance of a series.
    pub recurrence_instance_id: Option<String>,
    /// True for a materialized instance, false for the master pattern.
    pub is_instance: bool,
    pub last_modified: Option<DateTime<FixedOffset>>,
}

impl ParsedEvent {
    /// Creates a minimal record; descriptive fields are filled via the
    /// `with_*` builders.
    pub fn new(
        source_id: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            event_id: None,
            subject: None,
            body_preview: None,
            start,
            end,
            start_zone: "UTC".to_string(),
            end_zone: "UTC".to_string(),
            all_day: false,
            show_as: "busy".to_string(),
            cancelled: false,
            organizer: false,
            location_name: None,
            location_address: None,
            online: false,
            online_meeting_url: None,
            web_link: None,
            recurring: false,
            series_master_id: None,
            recurrence_instance_id: None,
            is_instance: false,
            last_modified: None,
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_body_preview(mut self, body_preview: impl Into<String>) -> Self {
        self.body_preview = Some(body_preview.into());
        self
    }

    /// Sets the IANA zone names the feed reported for start and end.
    pub fn with_zones(mut self, start_zone: impl Into<String>, end_zone: impl Into<String>) -> Self {
        self.start_zone = start_zone.into();
        self.end_zone = end_zone.into();
        self
    }

    pub fn with_location(mut self, name: impl Into<String>) -> Self {
        self.location_name = Some(name.into());
        self
    }

    pub fn with_location_address(mut self, address: impl Into<String>) -> Self {
        self.location_address = Some(address.into());
        self
    }

    /// Marks the event as an online meeting with a join link.
    pub fn with_online_meeting(mut self, url: impl Into<String>) -> Self {
        self.online = true;
        self.online_meeting_url = Some(url.into());
        self
    }

    pub fn with_web_link(mut self, url: impl Into<String>) -> Self {
        self.web_link = Some(url.into());
        self
    }

    /// Links this record to a recurring series master.
    pub fn with_series_master(mut self, series_master_id: impl Into<String>) -> Self {
        self.recurring = true;
        self.series_master_id = Some(series_master_id.into());
        self
    }

    /// Marks this record as a materialized instance of its series,
    /// identified by the original-occurrence timestamp.
    pub fn with_recurrence_instance(mut self, recurrence_instance_id: impl Into<String>) -> Self {
        self.recurrence_instance_id = Some(recurrence_instance_id.into());
        self.is_instance = true;
        self
    }

    pub fn with_show_as(mut self, show_as: impl Into<String>) -> Self {
        self.show_as = show_as.into();
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<FixedOffset>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    pub fn all_day(mut self, all_day: bool) -> Self {
        self.all_day = all_day;
        self
    }

    pub fn cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn organizer(mut self, organizer: bool) -> Self {
        self.organizer = organizer;
        self
    }

    pub fn recurring(mut self, recurring: bool) -> Self {
        self.recurring = recurring;
        self
    }
}

/// A calendar event as persisted in the local cache.
///
/// Immutable after construction; replacement happens only through upstream
/// re-ingest. Timestamps are kept as the ISO-8601 text the feed delivered,
/// offset included, so a round-trip through the store is byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub source_id: String,
    /// Never null. Empty when neither the feed subject nor the body preview
    /// yields a display subject.
    pub subject: String,
    pub body_preview: Option<String>,
    pub start_instant: String,
    pub end_instant: String,
    pub start_zone: String,
    pub end_zone: String,
    pub all_day: bool,
    pub show_as: String,
    pub cancelled: bool,
    pub organizer: bool,
    pub location_name: Option<String>,
    pub location_address: Option<String>,
    pub online: bool,
    pub online_meeting_url: Option<String>,
    pub web_link: Option<String>,
    pub recurring: bool,
    pub series_master_id: Option<String>,
    pub recurrence_instance_id: Option<String>,
    pub is_instance: bool,
    /// Set when `start_zone` or `end_zone` did not resolve against the tz
    /// database. Comparisons for such events fall back to UTC. Re-derived
    /// when rows are loaded; not a stored column.
    pub zone_unresolved: bool,
    pub cached_at: String,
    pub last_modified: Option<String>,
}

impl Event {
    /// Builds a cache row from a validated upstream record.
    ///
    /// Validates time ordering, resolves zones (tagging instead of
    /// rejecting), and derives the display subject exactly once. Readers
    /// never re-derive.
    pub fn from_parsed(record: ParsedEvent, cached_at: DateTime<Utc>) -> Result<Self, EventError> {
        if record.end < record.start {
            return Err(EventError::TimeOrder {
                start: record.start.to_rfc3339(),
                end: record.end.to_rfc3339(),
            });
        }

        let zone_unresolved = resolve_zone(&record.start_zone).is_none()
            || resolve_zone(&record.end_zone).is_none();
        let subject = derive_subject(record.subject.as_deref(), record.body_preview.as_deref());
        let event_id = record
            .event_id
            .unwrap_or_else(|| format!("evt_{}", record.source_id));

        Ok(Self {
            event_id,
            source_id: record.source_id,
            subject,
            body_preview: record.body_preview,
            start_instant: record.start.to_rfc3339(),
            end_instant: record.end.to_rfc3339(),
            start_zone: record.start_zone,
            end_zone: record.end_zone,
            all_day: record.all_day,
            show_as: record.show_as,
            cancelled: record.cancelled,
            organizer: record.organizer,
            location_name: record.location_name,
            location_address: record.location_address,
            online: record.online,
            online_meeting_url: record.online_meeting_url,
            web_link: record.web_link,
            recurring: record.recurring,
            series_master_id: record.series_master_id,
            recurrence_instance_id: record.recurrence_instance_id,
            is_instance: record.is_instance,
            zone_unresolved,
            cached_at: cached_at.to_rfc3339(),
            last_modified: record.last_modified.map(|t| t.to_rfc3339()),
        })
    }

    /// Start as an absolute instant. Naive text is interpreted in `assume`
    /// when given, else in this event's own zone, else UTC.
    pub fn start_dt(&self, assume: Option<Tz>) -> Result<DateTime<Utc>, EventError> {
        parse_instant(
            &self.start_instant,
            assume.or_else(|| resolve_zone(&self.start_zone)),
        )
    }

    /// End as an absolute instant; same normalization as [`Self::start_dt`].
    pub fn end_dt(&self, assume: Option<Tz>) -> Result<DateTime<Utc>, EventError> {
        parse_instant(
            &self.end_instant,
            assume.or_else(|| resolve_zone(&self.end_zone)),
        )
    }

    pub fn cached_dt(&self) -> Result<DateTime<Utc>, EventError> {
        parse_instant(&self.cached_at, None)
    }

    /// True when the event is in progress: start ≤ now < end.
    pub fn is_current(&self, now: DateTime<Utc>, assume: Option<Tz>) -> bool {
        match (self.start_dt(assume), self.end_dt(assume)) {
            (Ok(start), Ok(end)) => start <= now && now < end,
            _ => false,
        }
    }

    /// True when the event has not started: start > now.
    pub fn is_upcoming(&self, now: DateTime<Utc>, assume: Option<Tz>) -> bool {
        self.start_dt(assume).is_ok_and(|start| start > now)
    }

    /// Whole minutes until the event starts, or `None` once it has.
    pub fn time_until_start(&self, now: DateTime<Utc>, assume: Option<Tz>) -> Option<i64> {
        let start = self.start_dt(assume).ok()?;
        if start > now {
            Some((start - now).num_minutes().max(0))
        } else {
            None
        }
    }

    /// Event length in whole minutes, when both instants parse.
    pub fn duration_minutes(&self, assume: Option<Tz>) -> Option<i64> {
        let start = self.start_dt(assume).ok()?;
        let end = self.end_dt(assume).ok()?;
        Some((end - start).num_minutes())
    }
}

/// The raw feed payload that accompanies one parsed event at ingest time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPayload {
    /// Exact bytes of the source record, e.g. a single VEVENT block.
    pub content: String,
    pub source_url: Option<String>,
}

impl RawPayload {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_url: None,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

/// Original source bytes for one calendar record, persisted alongside the
/// parsed form for debugging and replay.
///
/// Ids carry a random suffix so repeated ingests of the same record are
/// preservable side by side; the content hash is available for downstream
/// deduplication but the store never deduplicates on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// `raw_<source_id>_<8 hex>`.
    pub raw_id: String,
    pub source_id: String,
    pub subject: String,
    pub start_instant: String,
    pub end_instant: String,
    pub start_zone: String,
    pub end_zone: String,
    pub all_day: bool,
    pub show_as: String,
    pub cancelled: bool,
    pub organizer: bool,
    pub location_name: Option<String>,
    pub location_address: Option<String>,
    pub online: bool,
    pub online_meeting_url: Option<String>,
    pub web_link: Option<String>,
    pub recurring: bool,
    pub series_master_id: Option<String>,
    pub recurrence_instance_id: Option<String>,
    pub is_instance: bool,
    pub last_modified: Option<String>,
    pub source_url: Option<String>,
    /// Complete raw source text, UTF-8.
    pub raw_bytes: String,
    /// SHA-256 hex over `raw_bytes`.
    pub content_hash: String,
    pub content_size_bytes: u64,
    pub cached_at: String,
}

impl RawEvent {
    /// Creates a raw row from source bytes and a minimal identity.
    ///
    /// Computes the content hash and size and mints a fresh unique id.
    pub fn from_bytes(
        source_id: impl Into<String>,
        content: impl Into<String>,
        cached_at: DateTime<Utc>,
    ) -> Self {
        let source_id = source_id.into();
        let content = content.into();
        Self {
            raw_id: mint_raw_id(&source_id),
            source_id,
            subject: String::new(),
            start_instant: String::new(),
            end_instant: String::new(),
            start_zone: "UTC".to_string(),
            end_zone: "UTC".to_string(),
            all_day: false,
            show_as: "busy".to_string(),
            cancelled: false,
            organizer: false,
            location_name: None,
            location_address: None,
            online: false,
            online_meeting_url: None,
            web_link: None,
            recurring: false,
            series_master_id: None,
            recurrence_instance_id: None,
            is_instance: false,
            last_modified: None,
            source_url: None,
            content_hash: content_hash_hex(&content),
            content_size_bytes: content.len() as u64,
            raw_bytes: content,
            cached_at: cached_at.to_rfc3339(),
        }
    }

    /// Creates a raw row carrying the parsed event's descriptive fields.
    pub fn for_event(event: &Event, payload: RawPayload, cached_at: DateTime<Utc>) -> Self {
        let mut raw = Self::from_bytes(event.source_id.clone(), payload.content, cached_at);
        raw.subject = event.subject.clone();
        raw.start_instant = event.start_instant.clone();
        raw.end_instant = event.end_instant.clone();
        raw.start_zone = event.start_zone.clone();
        raw.end_zone = event.end_zone.clone();
        raw.all_day = event.all_day;
        raw.show_as = event.show_as.clone();
        raw.cancelled = event.cancelled;
        raw.organizer = event.organizer;
        raw.location_name = event.location_name.clone();
        raw.location_address = event.location_address.clone();
        raw.online = event.online;
        raw.online_meeting_url = event.online_meeting_url.clone();
        raw.web_link = event.web_link.clone();
        raw.recurring = event.recurring;
        raw.series_master_id = event.series_master_id.clone();
        raw.recurrence_instance_id = event.recurrence_instance_id.clone();
        raw.is_instance = event.is_instance;
        raw.last_modified = event.last_modified.clone();
        raw.source_url = payload.source_url;
        raw
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn cached_dt(&self) -> Result<DateTime<Utc>, EventError> {
        parse_instant(&self.cached_at, None)
    }
}

/// Picks the display subject: the feed subject when non-empty, otherwise the
/// first non-empty line of the body preview truncated to 120 characters,
/// otherwise empty.
fn derive_subject(subject: Option<&str>, body_preview: Option<&str>) -> String {
    if let Some(subject) = subject {
        if !subject.trim().is_empty() {
            return subject.to_string();
        }
    }
    if let Some(body) = body_preview {
        for line in body.lines() {
            let line = line.trim();
            if !line.is_empty() {
                return line.chars().take(DERIVED_SUBJECT_MAX_CHARS).collect();
            }
        }
    }
    String::new()
}

fn content_hash_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn mint_raw_id(source_id: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("raw_{}_{}", source_id, &suffix[..8])
}
