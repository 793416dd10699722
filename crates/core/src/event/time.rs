//! Instant parsing for offset-preserving ISO-8601 text.
//!
//! Cached timestamps are stored exactly as the feed delivered them. Text
//! carrying an offset (or a trailing `Z`) resolves to an absolute instant
//! directly; naive text is interpreted in a caller-supplied zone, falling
//! back to UTC when no zone is available.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::error::EventError;

/// Resolves an IANA zone name against the bundled tz database.
pub fn resolve_zone(name: &str) -> Option<Tz> {
    name.parse().ok()
}

/// Parses an ISO-8601 instant, interpreting naive values in `assume`.
///
/// When `assume` is `None`, naive values are taken as UTC.
pub fn parse_instant(text: &str, assume: Option<Tz>) -> Result<DateTime<Utc>, EventError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|_| EventError::InvalidInstant(text.to_string()))?;

    match assume {
        Some(zone) => zone
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| EventError::NonexistentLocalTime(text.to_string())),
        None => Ok(Utc.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_resolve_zone() {
        assert!(resolve_zone("America/Los_Angeles").is_some());
        assert!(resolve_zone("UTC").is_some());
        assert!(resolve_zone("Not/A_Zone").is_none());
        assert!(resolve_zone("").is_none());
    }

    #[test]
    fn test_parse_utc_suffix() {
        let parsed = parse_instant("2025-07-14T12:00:00Z", None).unwrap();
        assert_eq!(parsed, utc("2025-07-14T12:00:00Z"));
    }

    #[test]
    fn test_parse_preserved_offset() {
        let parsed = parse_instant("2025-07-14T14:00:00+02:00", None).unwrap();
        assert_eq!(parsed, utc("2025-07-14T12:00:00Z"));
    }

    #[test]
    fn test_parse_naive_assumes_utc_without_zone() {
        let parsed = parse_instant("2025-07-14T12:00:00", None).unwrap();
        assert_eq!(parsed, utc("2025-07-14T12:00:00Z"));
    }

    #[test]
    fn test_parse_naive_with_zone() {
        let pacific = resolve_zone("America/Los_Angeles").unwrap();
        // PDT is UTC-7 in July.
        let parsed = parse_instant("2025-07-14T05:00:00", Some(pacific)).unwrap();
        assert_eq!(parsed, utc("2025-07-14T12:00:00Z"));
    }

    #[test]
    fn test_parse_naive_with_fractional_seconds() {
        let parsed = parse_instant("2025-07-14T12:00:00.500", None).unwrap();
        assert_eq!(parsed, utc("2025-07-14T12:00:00.5Z"));
    }

    #[test]
    fn test_parse_garbage_is_rejected() {
        let err = parse_instant("next tuesday", None).unwrap_err();
        assert_eq!(err, EventError::InvalidInstant("next tuesday".to_string()));
    }
}
