// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format vendor epoch seconds as RFC3339. Out-of-range values clamp to the epoch.
pub fn epoch_to_rfc3339(timestamp: i64) -> String {
    format_utc_rfc3339(DateTime::from_timestamp(timestamp, 0).unwrap_or_default())
}

/// Parse an ISO-8601 date (`2024-03-01`) or date-time (`2024-03-01T08:00:00Z`)
/// into epoch seconds. Bare dates are midnight UTC.
pub fn parse_iso_to_epoch(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_to_rfc3339() {
        assert_eq!(epoch_to_rfc3339(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(epoch_to_rfc3339(1_700_000_000), "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn test_parse_iso_to_epoch() {
        assert_eq!(parse_iso_to_epoch("2024-01-01"), Some(1_704_067_200));
        assert_eq!(parse_iso_to_epoch("2024-01-01T00:00:00Z"), Some(1_704_067_200));
        assert_eq!(
            parse_iso_to_epoch("2024-01-01T01:00:00+01:00"),
            Some(1_704_067_200)
        );
        assert_eq!(parse_iso_to_epoch("yesterday"), None);
    }
}
