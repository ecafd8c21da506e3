//! Per-endpoint table of centered timestamps and their server axis indices.

use serde::{Deserialize, Serialize};

use crate::search;

const SECONDS_PER_HOUR: f64 = 3_600.0;
const HOURS_PER_DAY: u32 = 24;

/// How an endpoint's raw time axis relates to its composite windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeConvention {
    /// Raw values already mark the middle of each window.
    Centered,
    /// Raw values mark the end of each window.
    ///
    /// `midnight_correction` adds one second to whole-day windows before
    /// centering, for archives that stamp composites at 23:59:59.
    EndTime { midnight_correction: bool },
}

impl TimeConvention {
    /// Map a raw epoch-seconds value to the window's centered timestamp.
    pub fn center(&self, raw: f64, nominal_hours: u32) -> f64 {
        match *self {
            Self::Centered => raw,
            Self::EndTime { .. } if nominal_hours == 0 => raw,
            Self::EndTime { midnight_correction } => {
                let corrected = if midnight_correction && nominal_hours % HOURS_PER_DAY == 0 {
                    raw + 1.0
                } else {
                    raw
                };
                corrected - half_window(nominal_hours)
            }
        }
    }

    /// Inverse of [`TimeConvention::center`].
    pub fn uncenter(&self, centered: f64, nominal_hours: u32) -> f64 {
        match *self {
            Self::Centered => centered,
            Self::EndTime { .. } if nominal_hours == 0 => centered,
            Self::EndTime { midnight_correction } => {
                let end = centered + half_window(nominal_hours);
                if midnight_correction && nominal_hours % HOURS_PER_DAY == 0 {
                    end - 1.0
                } else {
                    end
                }
            }
        }
    }
}

fn half_window(nominal_hours: u32) -> f64 {
    f64::from(nominal_hours) * SECONDS_PER_HOUR / 2.0
}

/// Ascending `(timestamp, server axis index)` pairs for one endpoint.
///
/// Timestamps are strictly increasing and axis indices form a strictly
/// increasing subsequence of the raw axis positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalIndex {
    times: Vec<f64>,
    axis_indices: Vec<usize>,
}

impl TemporalIndex {
    /// Build from raw axis values (already in epoch seconds).
    ///
    /// Non-finite values and values that do not advance past the previous
    /// kept timestamp (duplicate scans, out-of-order entries) are dropped.
    pub fn build(raw_seconds: &[f64], nominal_hours: u32, convention: TimeConvention) -> Self {
        let mut times = Vec::with_capacity(raw_seconds.len());
        let mut axis_indices = Vec::with_capacity(raw_seconds.len());
        let mut dropped = 0usize;

        for (axis_index, &raw) in raw_seconds.iter().enumerate() {
            if !raw.is_finite() {
                dropped += 1;
                continue;
            }
            let centered = convention.center(raw, nominal_hours);
            if times.last().map_or(false, |&last| centered <= last) {
                dropped += 1;
                continue;
            }
            times.push(centered);
            axis_indices.push(axis_index);
        }

        if dropped > 0 {
            tracing::debug!(
                dropped,
                kept = times.len(),
                "Dropped duplicate or unordered time axis entries"
            );
        }

        Self {
            times,
            axis_indices,
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Centered timestamps, ascending.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn timestamp(&self, position: usize) -> Option<f64> {
        self.times.get(position).copied()
    }

    /// Raw server axis index behind `position`.
    pub fn axis_index(&self, position: usize) -> Option<usize> {
        self.axis_indices.get(position).copied()
    }

    /// See [`search::binary_search`].
    pub fn binary_search(&self, value: f64) -> isize {
        search::binary_search(&self.times, value)
    }

    /// See [`search::first_ge`]; `len()` means no match.
    pub fn first_ge(&self, value: f64) -> usize {
        search::first_ge(&self.times, value)
    }

    /// See [`search::last_le`]; `-1` means no match.
    pub fn last_le(&self, value: f64) -> isize {
        search::last_le(&self.times, value)
    }

    /// See [`search::closest`].
    pub fn closest(&self, value: f64) -> Option<usize> {
        search::closest(&self.times, value)
    }

    /// Position of an exact timestamp.
    pub fn position_of(&self, timestamp: f64) -> Option<usize> {
        let found = self.binary_search(timestamp);
        (found >= 0).then_some(found as usize)
    }

    /// Inclusive positions covering `[min, max]`.
    ///
    /// A window that falls strictly between two stored timestamps resolves to
    /// the single timestamp closest to `min`. A window entirely before the
    /// first or after the last timestamp resolves to nothing.
    pub fn resolve_window(&self, min: f64, max: f64) -> Option<(usize, usize)> {
        if self.is_empty() || min > max {
            return None;
        }
        let first = self.first_ge(min);
        let last = self.last_le(max);
        if (first as isize) <= last {
            return Some((first, last as usize));
        }
        if first > 0 && first < self.len() {
            let nearest = self.closest(min)?;
            return Some((nearest, nearest));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: f64 = 86_400.0;
    const END_TIME: TimeConvention = TimeConvention::EndTime {
        midnight_correction: true,
    };

    #[test]
    fn test_center_whole_days_with_correction() {
        // 3-day composite ending 2006-08-09T23:59:59 centers on 2006-08-08T12:00:00
        let raw = 1_155_167_999.0;
        assert_eq!(END_TIME.center(raw, 72), 1_155_038_400.0);
    }

    #[test]
    fn test_center_without_correction() {
        let plain = TimeConvention::EndTime {
            midnight_correction: false,
        };
        assert_eq!(plain.center(10.0 * DAY, 24), 9.5 * DAY);
        // 25 hour windows never get the one second nudge
        assert_eq!(END_TIME.center(100_000.0, 25), 100_000.0 - 45_000.0);
        // single scans are left alone
        assert_eq!(END_TIME.center(123.0, 0), 123.0);
        assert_eq!(TimeConvention::Centered.center(123.0, 72), 123.0);
    }

    #[test]
    fn test_center_round_trip_is_exact() {
        let conventions = [
            TimeConvention::Centered,
            END_TIME,
            TimeConvention::EndTime {
                midnight_correction: false,
            },
        ];
        let raws = [0.0, 1.0, 1_155_167_999.0, 4_102_444_799.0, -86_401.0];
        for convention in conventions {
            for period in crate::time_period::TIME_PERIODS {
                for raw in raws {
                    let centered = convention.center(raw, period.nominal_hours);
                    let back = convention.uncenter(centered, period.nominal_hours);
                    assert_eq!(back.to_bits(), raw.to_bits(), "{:?} {}", convention, period.token);
                }
            }
        }
    }

    #[test]
    fn test_build_drops_duplicates() {
        let raw = [DAY, 2.0 * DAY, 2.0 * DAY, f64::NAN, 1.5 * DAY, 4.0 * DAY];
        let index = TemporalIndex::build(&raw, 0, TimeConvention::Centered);
        assert_eq!(index.times(), &[DAY, 2.0 * DAY, 4.0 * DAY]);
        assert_eq!(index.axis_index(0), Some(0));
        assert_eq!(index.axis_index(1), Some(1));
        assert_eq!(index.axis_index(2), Some(5));
        assert_eq!(index.axis_index(3), None);
    }

    #[test]
    fn test_position_of_is_exact() {
        let index = TemporalIndex::build(&[DAY, 2.0 * DAY], 0, TimeConvention::Centered);
        assert_eq!(index.position_of(2.0 * DAY), Some(1));
        assert_eq!(index.position_of(2.0 * DAY + 1.0), None);
    }

    #[test]
    fn test_resolve_window() {
        let raw: Vec<f64> = (1..=5).map(|d| d as f64 * 10.0).collect();
        let index = TemporalIndex::build(&raw, 0, TimeConvention::Centered);

        assert_eq!(index.resolve_window(10.0, 30.0), Some((0, 2)));
        assert_eq!(index.resolve_window(15.0, 45.0), Some((1, 3)));
        assert_eq!(index.resolve_window(0.0, 100.0), Some((0, 4)));
        // between two samples: nearest to min
        assert_eq!(index.resolve_window(22.0, 26.0), Some((1, 1)));
        assert_eq!(index.resolve_window(27.0, 29.0), Some((2, 2)));
        // entirely outside
        assert_eq!(index.resolve_window(0.0, 5.0), None);
        assert_eq!(index.resolve_window(55.0, 60.0), None);
        assert_eq!(index.resolve_window(30.0, 20.0), None);
    }
}
