//! Millisecond-precision UTC instants used for sync windows and fingerprints

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A point in time, stored as unix milliseconds and exchanged as RFC 3339
///
/// Millisecond precision is what the database stores, so an instant that
/// round-trips through its string form always compares equal to itself. This
/// is what lets a delta response's `nextSince` be replayed verbatim as the
/// next request's `since`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncInstant(i64);

impl SyncInstant {
    /// The unix epoch, used as `since` on a first sync
    pub const EPOCH: Self = Self(0);

    /// Current server time
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Build an instant from unix milliseconds
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Unix milliseconds
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// RFC 3339 with millisecond precision and a `Z` suffix
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.0).map_or_else(
            || self.0.to_string(),
            |dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
    }
}

impl fmt::Display for SyncInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

/// Error returned when a string is not a recognizable timestamp
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{0}` is not an ISO 8601 timestamp")]
pub struct InstantParseError(String);

impl FromStr for SyncInstant {
    type Err = InstantParseError;

    /// Accepts RFC 3339 (`2026-01-02T03:04:05.678Z`, any offset), an offset-less
    /// date-time taken as UTC, or a bare `YYYY-MM-DD` date at UTC midnight.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self(dt.timestamp_millis()));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
            return Ok(Self(naive.and_utc().timestamp_millis()));
        }
        if let Some(midnight) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        {
            return Ok(Self(midnight.and_utc().timestamp_millis()));
        }
        Err(InstantParseError(trimmed.to_string()))
    }
}

impl Serialize for SyncInstant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SyncInstant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats_with_millis_and_z() {
        let instant = SyncInstant::from_millis(1_700_000_000_123);
        assert_eq!(instant.to_string(), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn test_string_form_round_trips() {
        let instant = SyncInstant::from_millis(1_700_000_000_123);
        let parsed: SyncInstant = instant.to_string().parse().unwrap();
        assert_eq!(parsed, instant);
    }

    #[test]
    fn test_parse_normalizes_offsets() {
        let utc: SyncInstant = "2024-05-01T12:00:00Z".parse().unwrap();
        let offset: SyncInstant = "2024-05-01T09:00:00-03:00".parse().unwrap();
        assert_eq!(utc, offset);
    }

    #[test]
    fn test_parse_truncates_to_millis() {
        let parsed: SyncInstant = "2024-05-01T12:00:00.123456Z".parse().unwrap();
        assert_eq!(parsed.to_string(), "2024-05-01T12:00:00.123Z");
    }

    #[test]
    fn test_parse_accepts_naive_and_date_only() {
        let naive: SyncInstant = "2024-05-01T12:00:00".parse().unwrap();
        let utc: SyncInstant = "2024-05-01T12:00:00Z".parse().unwrap();
        assert_eq!(naive, utc);

        let date: SyncInstant = "2024-05-01".parse().unwrap();
        assert_eq!(date.to_string(), "2024-05-01T00:00:00.000Z");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = "yesterday".parse::<SyncInstant>().unwrap_err();
        assert!(err.to_string().contains("yesterday"));
        assert!("".parse::<SyncInstant>().is_err());
    }

    #[test]
    fn test_epoch_is_zero() {
        assert_eq!(SyncInstant::EPOCH.as_millis(), 0);
        assert_eq!(SyncInstant::EPOCH.to_string(), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_serde_uses_string_form() {
        let instant = SyncInstant::from_millis(86_400_000);
        let json = serde_json::to_string(&instant).unwrap();
        assert_eq!(json, "\"1970-01-02T00:00:00.000Z\"");
        let back: SyncInstant = serde_json::from_str(&json).unwrap();
        assert_eq!(back, instant);
    }
}
