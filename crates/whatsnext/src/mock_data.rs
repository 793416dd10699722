//! Demo seed data for exercising the display pipeline without a live feed.

use chrono::{DateTime, Duration, Utc};

use whatsnext_core::event::{ParsedEvent, RawPayload};

use crate::cache::IngestRecord;

/// A plausible working day around `now`: a meeting in progress, one about
/// to start, a couple later, and a cancelled row that must never render.
pub fn demo_records(now: DateTime<Utc>) -> Vec<IngestRecord> {
    let at = |minutes: i64| (now + Duration::minutes(minutes)).fixed_offset();

    vec![
        IngestRecord::new(
            ParsedEvent::new("demo-standup", at(-30), at(15))
                .with_subject("Team standup")
                .with_online_meeting("https://meet.example/standup")
                .with_location("Microsoft Teams Meeting")
                .with_series_master("demo-standup-series")
                .with_recurrence_instance((now - Duration::minutes(30)).to_rfc3339()),
        )
        .with_raw(RawPayload::new(
            "BEGIN:VEVENT\nUID:demo-standup\nSUMMARY:Team standup\nEND:VEVENT",
        )),
        IngestRecord::new(
            ParsedEvent::new("demo-design", at(30), at(90))
                .with_subject("Design review")
                .with_location("Conference Room 2")
                .with_body_preview("Walk through the new panel layouts."),
        ),
        IngestRecord::new(
            ParsedEvent::new("demo-1on1", at(120), at(150))
                .with_subject("1:1")
                .organizer(true),
        ),
        IngestRecord::new(
            ParsedEvent::new("demo-cancelled", at(60), at(75))
                .with_subject("Vendor sync")
                .cancelled(true),
        ),
        IngestRecord::new(
            ParsedEvent::new("demo-focus", at(240), at(300))
                .with_subject("Focus block")
                .with_show_as("free"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_records_shape() {
        let now = DateTime::parse_from_rfc3339("2025-07-14T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let records = demo_records(now);

        assert_eq!(records.len(), 5);
        assert!(records[0].raw.is_some());
        assert!(records.iter().any(|r| r.event.cancelled));
        assert!(records.iter().all(|r| r.event.start <= r.event.end));
    }
}
