//! Meeting selection: decides the one event both display surfaces feature.
//!
//! The priority rule lives here and only here. When an upcoming meeting
//! exists it is featured even while another meeting is in progress, because
//! a glanceable display mid-meeting should already announce what comes
//! next. Renderers consume the result through the view model and never
//! re-select.

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::config::SettingsHandle;
use crate::event::Event;

/// Outcome of one selection pass.
///
/// `current` and `upcoming` hold every classified event in start order;
/// the accessors encode the priority rule on top of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    reference: DateTime<Utc>,
    current: Vec<Event>,
    upcoming: Vec<Event>,
}

impl Selection {
    /// The instant every comparison in this pass used.
    pub fn reference(&self) -> DateTime<Utc> {
        self.reference
    }

    /// Events in progress at the reference instant, in start order.
    pub fn current(&self) -> &[Event] {
        &self.current
    }

    /// Events that have not started, ascending by start with `source_id`
    /// breaking ties.
    pub fn upcoming(&self) -> &[Event] {
        &self.upcoming
    }

    /// The single event a display must feature: the first upcoming event,
    /// or the first current event when nothing is upcoming.
    pub fn featured(&self) -> Option<&Event> {
        self.upcoming.first().or_else(|| self.current.first())
    }

    /// The current bucket a view model exposes: empty whenever an upcoming
    /// event exists, at most one event otherwise.
    pub fn current_selected(&self) -> &[Event] {
        if self.upcoming.is_empty() && !self.current.is_empty() {
            &self.current[..1]
        } else {
            &[]
        }
    }

    /// Upcoming events after the featured one.
    pub fn later(&self) -> &[Event] {
        if self.upcoming.len() > 1 {
            &self.upcoming[1..]
        } else {
            &[]
        }
    }
}

/// Groups events into current and upcoming buckets around a reference
/// instant read from the injected clock.
#[derive(Clone, Debug)]
pub struct SelectionEngine {
    clock: Clock,
    settings: SettingsHandle,
}

impl SelectionEngine {
    pub fn new(clock: Clock, settings: SettingsHandle) -> Self {
        Self { clock, settings }
    }

    /// Selection at the clock's current instant (or its override).
    pub fn select(&self, events: &[Event]) -> Selection {
        self.select_at(events, self.clock.now())
    }

    /// Selection with an explicit reference instant.
    ///
    /// Deterministic: equal `(events, now, hidden set)` produce equal
    /// output. Events whose timestamps cannot be interpreted are dropped
    /// from this pass only.
    pub fn select_at(&self, events: &[Event], now: DateTime<Utc>) -> Selection {
        let settings = self.settings.snapshot();
        let zone = settings.server_zone;

        let mut current: Vec<(DateTime<Utc>, Event)> = Vec::new();
        let mut upcoming: Vec<(DateTime<Utc>, Event)> = Vec::new();

        for event in events {
            if settings.hidden_event_ids.contains(&event.source_id) {
                tracing::debug!(source_id = %event.source_id, "skipping hidden event");
                continue;
            }

            let (start, end) = match (event.start_dt(Some(zone)), event.end_dt(Some(zone))) {
                (Ok(start), Ok(end)) => (start, end),
                (Err(error), _) | (_, Err(error)) => {
                    tracing::warn!(
                        source_id = %event.source_id,
                        %error,
                        "dropping event with unusable timestamps"
                    );
                    continue;
                }
            };

            if start <= now && now < end {
                current.push((start, event.clone()));
            } else if start > now {
                upcoming.push((start, event.clone()));
            }
        }

        sort_by_start(&mut current);
        sort_by_start(&mut upcoming);

        Selection {
            reference: now,
            current: current.into_iter().map(|(_, event)| event).collect(),
            upcoming: upcoming.into_iter().map(|(_, event)| event).collect(),
        }
    }
}

fn sort_by_start(events: &mut [(DateTime<Utc>, Event)]) {
    events.sort_by(|(a_start, a), (b_start, b)| {
        a_start
            .cmp(b_start)
            .then_with(|| a.source_id.cmp(&b.source_id))
    });
}
