//! Timestamp parsing, formatting and CF-style time units.
//!
//! Internally every timestamp is epoch seconds held in an `f64`, matching the
//! numeric time axes served by array endpoints.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{DatasetError, Result};

/// Parse an ISO 8601 timestamp into epoch seconds.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS` (optionally with a trailing `Z`
/// or a space separator) and date-only values, which mean midnight UTC.
pub fn parse_iso8601(s: &str) -> Result<f64> {
    parse_datetime(s)
        .map(epoch_seconds)
        .ok_or_else(|| DatasetError::invalid_range(format!("unparsable time '{}'", s)))
}

/// Format epoch seconds as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_iso8601(seconds: f64) -> String {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    match Utc.timestamp_opt(whole as i64, nanos.min(999_999_999)).single() {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => format!("{}", seconds),
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let normalized = s.trim_end_matches('Z').trim_end_matches(" UTC").replace(' ', "T");
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

fn epoch_seconds(dt: DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_millis()) / 1_000.0
}

/// Linear mapping from raw time-axis values to epoch seconds, parsed from a
/// `"<unit> since <epoch>"` units attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    pub seconds_per_unit: f64,
    pub base_seconds: f64,
}

impl Default for TimeUnits {
    fn default() -> Self {
        Self::EPOCH_SECONDS
    }
}

impl TimeUnits {
    /// Raw values already are epoch seconds.
    pub const EPOCH_SECONDS: TimeUnits = TimeUnits {
        seconds_per_unit: 1.0,
        base_seconds: 0.0,
    };

    /// Parse a units string such as `days since 1970-01-01T00:00:00Z`.
    pub fn parse(units: &str) -> Result<Self> {
        let lower = units.trim().to_ascii_lowercase();
        let (unit, base) = lower
            .split_once(" since ")
            .ok_or_else(|| DatasetError::corrupt(format!("time units '{}' lack 'since'", units)))?;

        let seconds_per_unit = match unit.trim() {
            "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
            "min" | "mins" | "minute" | "minutes" => 60.0,
            "h" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
            "d" | "day" | "days" => 86_400.0,
            other => {
                return Err(DatasetError::corrupt(format!(
                    "unsupported time unit '{}'",
                    other
                )))
            }
        };

        let base_seconds = parse_datetime(&base.to_ascii_uppercase())
            .map(epoch_seconds)
            .ok_or_else(|| DatasetError::corrupt(format!("unparsable time base in '{}'", units)))?;

        Ok(Self {
            seconds_per_unit,
            base_seconds,
        })
    }

    /// Convert one raw axis value to epoch seconds.
    pub fn to_epoch_seconds(&self, raw: f64) -> f64 {
        if self.seconds_per_unit == 1.0 && self.base_seconds == 0.0 {
            raw
        } else {
            self.base_seconds + raw * self.seconds_per_unit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso8601_variants() {
        let expected = 1_155_038_400.0; // 2006-08-08T12:00:00Z
        assert_eq!(parse_iso8601("2006-08-08T12:00:00Z").unwrap(), expected);
        assert_eq!(parse_iso8601("2006-08-08T12:00:00").unwrap(), expected);
        assert_eq!(parse_iso8601("2006-08-08 12:00:00").unwrap(), expected);
        assert_eq!(parse_iso8601("2006-08-08T12:00:00+00:00").unwrap(), expected);
        assert_eq!(parse_iso8601("2006-08-08").unwrap(), expected - 43_200.0);
    }

    #[test]
    fn test_parse_iso8601_rejects_garbage() {
        let err = parse_iso8601("last tuesday").unwrap_err();
        assert!(matches!(err, DatasetError::InvalidRange(_)));
    }

    #[test]
    fn test_format_iso8601() {
        assert_eq!(format_iso8601(1_155_038_400.0), "2006-08-08T12:00:00Z");
        assert_eq!(format_iso8601(0.0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_time_units() {
        let days = TimeUnits::parse("days since 1970-01-01T00:00:00Z").unwrap();
        assert_eq!(days.to_epoch_seconds(1.5), 129_600.0);

        let hours = TimeUnits::parse("hours since 2006-08-08 00:00:00").unwrap();
        assert_eq!(hours.to_epoch_seconds(12.0), 1_155_038_400.0);

        let secs = TimeUnits::parse("seconds since 1970-1-1").unwrap();
        assert_eq!(secs, TimeUnits::EPOCH_SECONDS);

        assert!(TimeUnits::parse("fortnights since 1970-01-01").is_err());
        assert!(TimeUnits::parse("seconds").is_err());
    }
}
