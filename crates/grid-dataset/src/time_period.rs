//! Known aggregation cadences ("time periods") and their catalog tokens.

use serde::Serialize;

/// One aggregation cadence an archive may publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimePeriod {
    /// Trailing catalog path segment, e.g. `8day`.
    pub token: &'static str,
    /// User-facing label, e.g. `8 day`. Unique per dataset.
    pub label: &'static str,
    /// Longer description for metadata.
    pub title: &'static str,
    /// Composite window length. 0 marks single scans.
    pub nominal_hours: u32,
}

const HOURS_PER_DAY: u32 = 24;

/// Every cadence this crate knows how to index.
pub const TIME_PERIODS: &[TimePeriod] = &[
    TimePeriod { token: "pass", label: "pass", title: "Single Pass", nominal_hours: 0 },
    TimePeriod { token: "hday", label: "1 observation", title: "Single Observation", nominal_hours: 0 },
    TimePeriod { token: "25hour", label: "25 hour", title: "25 Hour Composite", nominal_hours: 25 },
    TimePeriod { token: "33hour", label: "33 hour", title: "33 Hour Composite", nominal_hours: 33 },
    TimePeriod { token: "1day", label: "1 day", title: "1 Day Composite", nominal_hours: HOURS_PER_DAY },
    TimePeriod { token: "3day", label: "3 day", title: "3 Day Composite", nominal_hours: 3 * HOURS_PER_DAY },
    TimePeriod { token: "4day", label: "4 day", title: "4 Day Composite", nominal_hours: 4 * HOURS_PER_DAY },
    TimePeriod { token: "5day", label: "5 day", title: "5 Day Composite", nominal_hours: 5 * HOURS_PER_DAY },
    TimePeriod { token: "7day", label: "7 day", title: "7 Day Composite", nominal_hours: 7 * HOURS_PER_DAY },
    TimePeriod { token: "8day", label: "8 day", title: "8 Day Composite", nominal_hours: 8 * HOURS_PER_DAY },
    TimePeriod { token: "10day", label: "10 day", title: "10 Day Composite", nominal_hours: 10 * HOURS_PER_DAY },
    TimePeriod { token: "14day", label: "14 day", title: "14 Day Composite", nominal_hours: 14 * HOURS_PER_DAY },
    TimePeriod { token: "mday", label: "1 month", title: "Monthly Composite", nominal_hours: 30 * HOURS_PER_DAY },
    TimePeriod { token: "3month", label: "3 month", title: "3 Month Composite", nominal_hours: 90 * HOURS_PER_DAY },
    TimePeriod { token: "1year", label: "1 year", title: "Annual Composite", nominal_hours: 365 * HOURS_PER_DAY },
];

impl TimePeriod {
    /// Look up a cadence by catalog token.
    pub fn from_token(token: &str) -> Option<&'static TimePeriod> {
        TIME_PERIODS.iter().find(|p| p.token == token)
    }

    /// Look up a cadence by label.
    pub fn from_label(label: &str) -> Option<&'static TimePeriod> {
        TIME_PERIODS.iter().find(|p| p.label == label)
    }

    /// Apply the composite-window override for archives that file 24/25/33
    /// hour composites under the single-scan directory.
    ///
    /// Only single-scan periods are affected; the dataset id suffix decides.
    pub fn disambiguate(&'static self, dataset_id: &str) -> &'static TimePeriod {
        if self.nominal_hours != 0 {
            return self;
        }
        let token = if dataset_id.ends_with("24h") || dataset_id.ends_with("25h") {
            "25hour"
        } else if dataset_id.ends_with("33h") {
            "33hour"
        } else {
            return self;
        };
        Self::from_token(token).unwrap_or(self)
    }

    /// Spacing beyond which consecutive samples are treated as a gap.
    pub fn expected_gap_seconds(&self) -> f64 {
        let hours = self.nominal_hours;
        if hours == 0 || hours % HOURS_PER_DAY != 0 {
            3_600.0
        } else if hours < 30 * HOURS_PER_DAY {
            86_400.0
        } else {
            32.0 * 86_400.0
        }
    }

    /// True for whole-day composite windows.
    pub fn is_whole_days(&self) -> bool {
        self.nominal_hours > 0 && self.nominal_hours % HOURS_PER_DAY == 0
    }
}

/// Resolve a configured allow-list of tokens against the built-in table.
///
/// `None` means every known period. Unknown tokens are reported back.
pub fn known_periods(
    tokens: Option<&[String]>,
) -> Result<Vec<&'static TimePeriod>, String> {
    match tokens {
        None => Ok(TIME_PERIODS.iter().collect()),
        Some(tokens) => tokens
            .iter()
            .map(|t| {
                TimePeriod::from_token(t.trim())
                    .ok_or_else(|| format!("unknown time period token '{}'", t))
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_and_labels_are_unique() {
        for (i, a) in TIME_PERIODS.iter().enumerate() {
            for b in &TIME_PERIODS[i + 1..] {
                assert_ne!(a.token, b.token);
                assert_ne!(a.label, b.label);
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(TimePeriod::from_token("8day").unwrap().nominal_hours, 192);
        assert_eq!(TimePeriod::from_label("1 month").unwrap().token, "mday");
        assert!(TimePeriod::from_token("2day").is_none());
    }

    #[test]
    fn test_disambiguate_suffixes() {
        let hday = TimePeriod::from_token("hday").unwrap();
        assert_eq!(hday.disambiguate("TGAssta25h").token, "25hour");
        assert_eq!(hday.disambiguate("TGAssta24h").token, "25hour");
        assert_eq!(hday.disambiguate("TGAssta33h").token, "33hour");
        assert_eq!(hday.disambiguate("TMBchla").token, "hday");

        let one_day = TimePeriod::from_token("1day").unwrap();
        assert_eq!(one_day.disambiguate("TGAssta25h").token, "1day");
    }

    #[test]
    fn test_expected_gap_seconds() {
        let gap = |token: &str| TimePeriod::from_token(token).unwrap().expected_gap_seconds();
        assert_eq!(gap("hday"), 3_600.0);
        assert_eq!(gap("25hour"), 3_600.0);
        assert_eq!(gap("33hour"), 3_600.0);
        assert_eq!(gap("1day"), 86_400.0);
        assert_eq!(gap("14day"), 86_400.0);
        assert_eq!(gap("mday"), 32.0 * 86_400.0);
        assert_eq!(gap("1year"), 32.0 * 86_400.0);
    }

    #[test]
    fn test_known_periods_filter() {
        assert_eq!(known_periods(None).unwrap().len(), TIME_PERIODS.len());
        let tokens = vec!["1day".to_string(), " 8day".to_string()];
        let periods = known_periods(Some(&tokens)).unwrap();
        assert_eq!(periods[1].label, "8 day");
        assert!(known_periods(Some(&["nope".to_string()])).is_err());
    }
}
