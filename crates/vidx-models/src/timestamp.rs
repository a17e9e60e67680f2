//! RFC 3339 timestamp helpers.
//!
//! Upstream and the document store both speak RFC 3339. Everything inside the
//! workspace is normalized to `DateTime<Utc>`.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{ModelError, ModelResult};

/// Parse an RFC 3339 timestamp (`Z` suffix or numeric offset) into UTC.
///
/// # Examples
/// ```
/// use vidx_models::timestamp::parse_rfc3339_utc;
/// let ts = parse_rfc3339_utc("2024-05-01T12:00:00+02:00").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2024-05-01T10:00:00+00:00");
/// ```
pub fn parse_rfc3339_utc(value: &str) -> ModelResult<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ModelError::InvalidTimestamp(value.to_string()));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ModelError::InvalidTimestamp(value.to_string()))
}

/// Format a timestamp with second precision and a `Z` suffix.
///
/// Sub-second precision is truncated, which is what the upstream
/// `publishedAfter` filter expects.
///
/// # Examples
/// ```
/// use vidx_models::timestamp::{format_rfc3339_seconds, parse_rfc3339_utc};
/// let ts = parse_rfc3339_utc("2024-05-01T10:00:00.750Z").unwrap();
/// assert_eq!(format_rfc3339_seconds(ts), "2024-05-01T10:00:00Z");
/// ```
pub fn format_rfc3339_seconds(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_zulu() {
        let ts = parse_rfc3339_utc("2024-01-15T08:30:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_offset_normalizes_to_utc() {
        let ts = parse_rfc3339_utc("2024-01-15T08:30:00-05:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 15, 13, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_rfc3339_utc("yesterday"),
            Err(ModelError::InvalidTimestamp(_))
        ));
        assert!(parse_rfc3339_utc("   ").is_err());
        // Missing timezone is not accepted
        assert!(parse_rfc3339_utc("2024-01-15T08:30:00").is_err());
    }

    #[test]
    fn test_format_truncates_subseconds() {
        let ts = parse_rfc3339_utc("2024-01-15T08:30:00.999Z").unwrap();
        assert_eq!(format_rfc3339_seconds(ts), "2024-01-15T08:30:00Z");
    }
}
