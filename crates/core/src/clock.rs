//! Time source abstraction with an explicit override for deterministic tests.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

/// Shared time source.
///
/// Every time read on the selection and view-model paths goes through a
/// `Clock` handle. Cloning the handle shares the underlying override, so a
/// single handle installed at startup makes `set_override` take effect for
/// every component holding a clone.
#[derive(Clone, Debug, Default)]
pub struct Clock {
    override_instant: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl Clock {
    /// Creates a clock that follows real UTC time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock frozen at the given instant.
    pub fn frozen(instant: DateTime<Utc>) -> Self {
        let clock = Self::new();
        clock.set_override(Some(instant));
        clock
    }

    /// Returns the current instant in UTC, or the override when one is set.
    pub fn now(&self) -> DateTime<Utc> {
        self.override_instant
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or_else(Utc::now)
    }

    /// Installs or clears the override. `None` returns to real time.
    pub fn set_override(&self, instant: Option<DateTime<Utc>>) {
        *self
            .override_instant
            .write()
            .unwrap_or_else(PoisonError::into_inner) = instant;
    }

    /// Returns the active override, if any.
    pub fn override_instant(&self) -> Option<DateTime<Utc>> {
        *self
            .override_instant
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
