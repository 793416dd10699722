//! Selection-time settings and configuration validation errors.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when validating configuration at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache TTL must be greater than zero seconds")]
    InvalidTtl,
    #[error("retention must be at least one day")]
    InvalidRetention,
    #[error("unknown server timezone: {0}")]
    UnknownZone(String),
    #[error("unknown view shape: {0} (expected 'consolidated' or 'split')")]
    UnknownShape(String),
    #[error("invalid clock override: {0}")]
    InvalidClockOverride(String),
}

/// How the view model buckets upcoming events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewShape {
    /// One list: every upcoming event lands in `next_events`.
    #[default]
    Consolidated,
    /// Two lists: the first three upcoming events in `next_events`, the
    /// remainder in `later_events`.
    Split,
}

impl FromStr for ViewShape {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "consolidated" => Ok(ViewShape::Consolidated),
            "split" => Ok(ViewShape::Split),
            _ => Err(ConfigError::UnknownShape(s.to_string())),
        }
    }
}

/// Settings the selection engine and view-model builder read on every call.
#[derive(Debug, Clone)]
pub struct SelectionSettings {
    /// Source ids that are never shown.
    pub hidden_event_ids: HashSet<String>,
    /// Zone used for naive-datetime normalization and display formatting.
    pub server_zone: Tz,
    pub view_shape: ViewShape,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            hidden_event_ids: HashSet::new(),
            server_zone: Tz::UTC,
            view_shape: ViewShape::default(),
        }
    }
}

/// Shared, read-through handle over [`SelectionSettings`].
///
/// The hidden set is consulted at selection time rather than cached, so an
/// update through any clone of the handle takes effect on the next render
/// cycle without a restart.
#[derive(Clone, Debug, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<SelectionSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: SelectionSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Returns a copy of the current settings.
    pub fn snapshot(&self) -> SelectionSettings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies an in-place update visible to every holder of the handle.
    pub fn update(&self, apply: impl FnOnce(&mut SelectionSettings)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut guard);
    }

    /// Replaces the hidden-event set.
    pub fn set_hidden_events(&self, hidden: HashSet<String>) {
        self.update(|settings| settings.hidden_event_ids = hidden);
    }
}
