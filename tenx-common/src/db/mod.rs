//! Database initialization, schema and column helpers
//!
//! UUIDs and timestamps are stored as TEXT. Timestamps always use the same
//! fixed-width UTC RFC 3339 form so that `ORDER BY created_at` sorts
//! chronologically.

pub mod init;
pub mod migrations;

pub use init::*;
pub use migrations::*;

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Format a timestamp for storage
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time, formatted for storage
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parse a stored timestamp column
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp '{}': {}", value, e)))
}

/// Parse a stored UUID column
pub fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid stored id '{}': {}", value, e)))
}

/// Parse a nullable stored UUID column
pub fn parse_optional_uuid(value: Option<String>) -> Result<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_sort_lexicographically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);
        assert!(format_timestamp(early) < format_timestamp(late));
        assert_eq!(format_timestamp(early), "2024-01-02T03:04:05.000000Z");
    }

    #[test]
    fn test_timestamp_parse_round_trip() {
        let now = Utc::now();
        let parsed = parse_timestamp(&format_timestamp(now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_bad_uuid_is_internal_error() {
        assert!(matches!(parse_uuid("nope"), Err(Error::Internal(_))));
        assert_eq!(parse_optional_uuid(None).unwrap(), None);
    }
}
