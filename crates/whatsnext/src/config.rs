//! Application configuration loaded from environment variables.

use std::collections::HashSet;
use std::env;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use whatsnext_core::clock::Clock;
use whatsnext_core::config::{ConfigError, SelectionSettings, ViewShape};

/// Runtime configuration. Invalid values fail startup; absent values take
/// the documented defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite cache file (default: "whatsnext.db")
    pub database_path: String,
    /// Days after which ended events are eligible for cleanup (default: 7)
    pub retention_days: u32,
    /// Staleness TTL in seconds (default: 3600)
    pub cache_ttl_seconds: u64,
    /// Zone for naive-datetime normalization and display formatting
    /// (default: UTC)
    pub server_zone: Tz,
    /// Source ids never shown on any surface
    pub hidden_event_ids: HashSet<String>,
    /// Freezes every time read at this instant, for deterministic runs
    pub clock_override: Option<DateTime<Utc>>,
    pub view_shape: ViewShape,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `WHATSNEXT_DB` - SQLite database path (default: "whatsnext.db")
    /// - `RETENTION_DAYS` - cleanup window in days (default: 7)
    /// - `CACHE_TTL_SECONDS` - staleness TTL (default: 3600)
    /// - `SERVER_ZONE` - IANA zone name (default: "UTC")
    /// - `HIDDEN_EVENT_IDS` - comma-separated source ids to hide
    /// - `CLOCK_OVERRIDE` - RFC 3339 instant that freezes time
    /// - `VIEW_SHAPE` - "consolidated" or "split" (default: consolidated)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let cache_ttl_seconds = match get("CACHE_TTL_SECONDS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|ttl| *ttl > 0)
                .ok_or(ConfigError::InvalidTtl)?,
            None => 3600,
        };

        let retention_days = match get("RETENTION_DAYS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|days| *days > 0)
                .ok_or(ConfigError::InvalidRetention)?,
            None => 7,
        };

        let server_zone = match get("SERVER_ZONE") {
            Some(raw) => raw
                .parse::<Tz>()
                .map_err(|_| ConfigError::UnknownZone(raw.clone()))?,
            None => Tz::UTC,
        };

        let view_shape = match get("VIEW_SHAPE") {
            Some(raw) => raw.parse()?,
            None => ViewShape::default(),
        };

        let clock_override = match get("CLOCK_OVERRIDE") {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|_| ConfigError::InvalidClockOverride(raw.clone()))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(Self {
            database_path: get("WHATSNEXT_DB").unwrap_or_else(|| "whatsnext.db".to_string()),
            retention_days,
            cache_ttl_seconds,
            server_zone,
            hidden_event_ids: get("HIDDEN_EVENT_IDS")
                .map(|raw| parse_hidden_ids(&raw))
                .unwrap_or_default(),
            clock_override,
            view_shape,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::seconds(self.cache_ttl_seconds as i64)
    }

    pub fn retention(&self) -> Duration {
        Duration::days(self.retention_days as i64)
    }

    /// Settings snapshot handed to the selection engine and builder.
    pub fn selection_settings(&self) -> SelectionSettings {
        SelectionSettings {
            hidden_event_ids: self.hidden_event_ids.clone(),
            server_zone: self.server_zone,
            view_shape: self.view_shape,
        }
    }

    /// The process clock: frozen when an override is configured.
    pub fn clock(&self) -> Clock {
        match self.clock_override {
            Some(instant) => Clock::frozen(instant),
            None => Clock::new(),
        }
    }
}

fn parse_hidden_ids(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
