//! The shared view model both renderers consume.
//!
//! A `ViewModel` is an immutable snapshot: renderers receive it by value,
//! never a live handle to the cache, and re-rendering means building a new
//! one. The builder is deterministic over (events, now, settings, status),
//! so the web and e-paper surfaces independently compute identical models
//! and therefore show the same featured event at the same instant.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::{SelectionSettings, SettingsHandle, ViewShape};
use crate::event::Event;
use crate::selection::{Selection, SelectionEngine};

/// How many upcoming events the split shape keeps in `next_events`.
const SPLIT_NEXT_LIMIT: usize = 3;

/// Placeholder location some feeds attach to every online meeting; carries
/// no information worth a line on a small display.
const ONLINE_MEETING_PLACEHOLDER: &str = "Microsoft Teams Meeting";

/// One event prepared for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventView {
    pub source_id: String,
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    pub is_current: bool,
    pub is_upcoming: bool,
    pub time_until_minutes: Option<i64>,
    pub duration_minutes: i64,
    pub formatted_time_range: String,
}

impl EventView {
    /// Prepares an event for display; `None` when its timestamps cannot be
    /// interpreted (the selection engine already drops those, this is the
    /// last line of defense).
    fn from_event(event: &Event, now: DateTime<Utc>, zone: Tz) -> Option<Self> {
        let start = event.start_dt(Some(zone)).ok()?;
        let end = event.end_dt(Some(zone)).ok()?;

        let location = event
            .location_name
            .clone()
            .filter(|name| !name.contains(ONLINE_MEETING_PLACEHOLDER));

        Some(Self {
            source_id: event.source_id.clone(),
            subject: event.subject.clone(),
            start,
            end,
            location,
            is_current: start <= now && now < end,
            is_upcoming: start > now,
            time_until_minutes: (start > now).then(|| (start - now).num_minutes()),
            duration_minutes: (end - start).num_minutes(),
            formatted_time_range: format_time_range(start, end, zone),
        })
    }
}

/// Display status supplied by the embedding application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInput {
    pub is_cached: bool,
    pub connection_status: Option<String>,
    pub relative_description: Option<String>,
    pub interactive_mode: bool,
    pub selected_date: Option<String>,
}

/// Status block carried on every view model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub last_update: DateTime<Utc>,
    pub is_cached: bool,
    pub connection_status: Option<String>,
    pub relative_description: Option<String>,
    pub interactive_mode: bool,
    pub selected_date: Option<String>,
}

/// Snapshot handed to renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewModel {
    /// The reference instant every field was computed against.
    pub now: DateTime<Utc>,
    pub display_date: String,
    /// Empty whenever an upcoming event exists; at most one event.
    pub current_events: Vec<EventView>,
    pub next_events: Vec<EventView>,
    /// Populated only in the split shape.
    pub later_events: Vec<EventView>,
    pub status_info: StatusInfo,
}

impl ViewModel {
    /// Materializes a view model from a selection pass.
    ///
    /// Pure: equal inputs produce equal models, which is what keeps two
    /// independently written renderers showing the same thing.
    pub fn from_selection(
        selection: &Selection,
        settings: &SelectionSettings,
        status: StatusInput,
    ) -> Self {
        let now = selection.reference();
        let zone = settings.server_zone;

        let current_events: Vec<EventView> = selection
            .current_selected()
            .iter()
            .filter_map(|event| EventView::from_event(event, now, zone))
            .collect();

        let mut upcoming: Vec<EventView> = selection
            .upcoming()
            .iter()
            .filter_map(|event| EventView::from_event(event, now, zone))
            .collect();

        let (next_events, later_events) = match settings.view_shape {
            ViewShape::Consolidated => (upcoming, Vec::new()),
            ViewShape::Split => {
                let later = upcoming.split_off(SPLIT_NEXT_LIMIT.min(upcoming.len()));
                (upcoming, later)
            }
        };

        let display_date = status
            .selected_date
            .clone()
            .unwrap_or_else(|| now.with_timezone(&zone).format("%A, %B %d").to_string());

        Self {
            now,
            display_date,
            current_events,
            next_events,
            later_events,
            status_info: StatusInfo {
                last_update: now,
                is_cached: status.is_cached,
                connection_status: status.connection_status,
                relative_description: status.relative_description,
                interactive_mode: status.interactive_mode,
                selected_date: status.selected_date,
            },
        }
    }

    pub fn has_events(&self) -> bool {
        !self.current_events.is_empty()
            || !self.next_events.is_empty()
            || !self.later_events.is_empty()
    }

    pub fn next_event(&self) -> Option<&EventView> {
        self.next_events.first()
    }

    pub fn current_event(&self) -> Option<&EventView> {
        self.current_events.first()
    }

    /// Minutes until the next upcoming event, when one exists.
    pub fn time_until_next_event(&self) -> Option<i64> {
        self.next_event().and_then(|event| event.time_until_minutes)
    }

    /// Minutes left in the current event, clamped at zero.
    pub fn time_remaining_current_event(&self) -> Option<i64> {
        self.current_event()
            .map(|event| (event.end - self.now).num_minutes().max(0))
    }
}

/// Builds view models from cached events using injected clock and settings
/// handles.
#[derive(Clone, Debug)]
pub struct ViewModelBuilder {
    engine: SelectionEngine,
    settings: SettingsHandle,
}

impl ViewModelBuilder {
    pub fn new(clock: Clock, settings: SettingsHandle) -> Self {
        Self {
            engine: SelectionEngine::new(clock, settings.clone()),
            settings,
        }
    }

    /// Builds a snapshot at the clock's current instant.
    pub fn build(&self, events: &[Event], status: StatusInput) -> ViewModel {
        let selection = self.engine.select(events);
        ViewModel::from_selection(&selection, &self.settings.snapshot(), status)
    }

    /// Builds a snapshot at an explicit reference instant.
    pub fn build_at(&self, events: &[Event], now: DateTime<Utc>, status: StatusInput) -> ViewModel {
        let selection = self.engine.select_at(events, now);
        ViewModel::from_selection(&selection, &self.settings.snapshot(), status)
    }
}

fn format_time_range(start: DateTime<Utc>, end: DateTime<Utc>, zone: Tz) -> String {
    format!(
        "{} - {}",
        start.with_timezone(&zone).format("%I:%M %p"),
        end.with_timezone(&zone).format("%I:%M %p")
    )
}
