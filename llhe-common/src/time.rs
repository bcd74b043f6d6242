//! Timestamp utilities
//!
//! Timestamps are stored as RFC 3339 text with microsecond precision and a
//! `Z` suffix, so lexical order in SQL matches chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for a TEXT column
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp read from a TEXT column
pub fn from_db(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

/// Parse a client-supplied RFC 3339 timestamp
pub fn parse_client(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidInput(format!("'{}' is not a valid RFC 3339 timestamp", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_db_format_round_trips() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let text = to_db(&ts);
        assert_eq!(text, "2024-03-01T12:30:00.000000Z");
        assert_eq!(from_db(&text).unwrap(), ts);
    }

    #[test]
    fn test_db_format_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(to_db(&early) < to_db(&late));
    }

    #[test]
    fn test_parse_client_accepts_offsets() {
        let ts = parse_client("2024-06-01T10:00:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_client_rejects_garbage() {
        let err = parse_client("last tuesday").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
    }
}
