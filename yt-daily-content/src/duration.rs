//! Video durations in the ISO 8601 encoding used by the Data API.

use crate::error::ParseError;
use jiff::SpanRelativeTo;
use jiff::fmt::temporal::SpanParser;

/// Accepts only the ISO 8601 encoding, not jiff's friendly `1h 2m` format.
static ISO_8601: SpanParser = SpanParser::new();

/// Parses a duration such as `PT1H2M3S` or `P1DT2H` into whole seconds.
///
/// Days (and weeks) count as exactly 24 hours, which is what YouTube means by them. Years and
/// months have no fixed length and are rejected, as are negative durations. Fractional seconds
/// are truncated.
pub fn parse_duration(value: &str) -> Result<u64, ParseError> {
    let invalid = |source| ParseError::Duration {
        value: value.to_string(),
        source,
    };

    let span = ISO_8601
        .parse_span(value)
        .map_err(|e| invalid(Some(e)))?;
    let duration = span
        .to_duration(SpanRelativeTo::days_are_24_hours())
        .map_err(|e| invalid(Some(e)))?;
    u64::try_from(duration.as_secs()).map_err(|_| invalid(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hours_minutes_seconds() {
        // 1 hour 2 minutes 3 seconds
        assert_eq!(parse_duration("PT1H2M3S").unwrap(), 3723);
        assert_eq!(parse_duration("PT15M33S").unwrap(), 933);
        assert_eq!(parse_duration("PT45S").unwrap(), 45);
        assert_eq!(parse_duration("PT2H").unwrap(), 7200);
    }

    #[test]
    fn days_and_weeks() {
        assert_eq!(parse_duration("P1DT2H3M4S").unwrap(), 93784);
        assert_eq!(parse_duration("P1W").unwrap(), 7 * 86400);
    }

    #[test]
    fn live_and_upcoming_are_zero() {
        assert_eq!(parse_duration("P0D").unwrap(), 0);
        assert_eq!(parse_duration("PT0S").unwrap(), 0);
    }

    #[test]
    fn fractional_seconds_truncate() {
        assert_eq!(parse_duration("PT1.9S").unwrap(), 1);
    }

    #[test]
    fn rejects_non_iso_and_calendar_units() {
        for bad in ["", "soon", "PT", "P1M", "P1Y", "-PT5S", "1h 2m", "2 hours", "1:02:03"] {
            assert!(
                matches!(parse_duration(bad), Err(ParseError::Duration { .. })),
                "{bad:?} should not parse"
            );
        }
    }
}
