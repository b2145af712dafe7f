//! The trailing time window uploads must fall into to be counted.

use crate::error::ParseError;
use jiff::{SignedDuration, Timestamp};
use std::fmt;

/// Length of the upload window, and the divisor of the daily average.
pub const WINDOW_DAYS: i64 = 365;

/// A rolling window of [`WINDOW_DAYS`] × 24 hours ending at the run's start instant.
///
/// Both ends are inclusive: a video published exactly `365 * 24h` before the run is counted.
/// Videos with a publish time after the end (clock skew, scheduled premieres) are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadWindow {
    start: Timestamp,
    end: Timestamp,
}

impl UploadWindow {
    pub fn ending_at(end: Timestamp) -> Self {
        Self {
            start: end - SignedDuration::from_hours(24 * WINDOW_DAYS),
            end,
        }
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn contains(&self, at: Timestamp) -> bool {
        self.start <= at && at <= self.end
    }

    /// Whether `at` lies before the window, i.e. everything older can be skipped too.
    pub fn is_before(&self, at: Timestamp) -> bool {
        at < self.start
    }
}

impl fmt::Display for UploadWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

/// Parses an RFC 3339 timestamp as returned by the Data API (`2024-01-01T12:00:00Z`).
pub fn parse_timestamp(value: &str) -> Result<Timestamp, ParseError> {
    value.parse().map_err(|source| ParseError::Timestamp {
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[test]
    fn window_spans_365_days() {
        let window = UploadWindow::ending_at(ts("2025-01-01T00:00:00Z"));
        // 2024 is a leap year, so 365 days back is Jan 2nd
        assert_eq!(window.start(), ts("2024-01-02T00:00:00Z"));
        assert_eq!(window.end(), ts("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn boundary_instant_is_included() {
        let window = UploadWindow::ending_at(ts("2025-06-15T10:30:00Z"));
        let boundary = window.start();
        assert!(window.contains(boundary));
        assert!(!window.is_before(boundary));

        let just_outside = boundary - SignedDuration::from_secs(1);
        assert!(!window.contains(just_outside));
        assert!(window.is_before(just_outside));

        assert!(window.contains(window.end()));
        assert!(!window.contains(window.end() + SignedDuration::from_secs(1)));
    }

    #[test]
    fn parses_api_timestamps() {
        assert_eq!(
            parse_timestamp("2024-03-01T17:00:05Z").unwrap(),
            ts("2024-03-01T17:00:05Z")
        );
        assert_eq!(
            parse_timestamp("2024-03-01T17:00:05.123+01:00").unwrap(),
            ts("2024-03-01T16:00:05.123Z")
        );
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(ParseError::Timestamp { .. })
        ));
    }
}
