//! Search primitives over ascending `f64` sequences.
//!
//! These back both the temporal index and nearest-cell lookups on the
//! latitude/longitude axes. All of them assume the input is sorted
//! ascending; ties (equal neighbours) are allowed.

/// Binary search for `value`.
///
/// Returns the index of a match (any of several equal entries), or
/// `-(insertion_point) - 1` when absent, so the insertion point is always
/// recoverable as `-(result) - 1`. NaN is never found and inserts at the end.
pub fn binary_search(values: &[f64], value: f64) -> isize {
    if value.is_nan() {
        return -(values.len() as isize) - 1;
    }
    let mut low = 0usize;
    let mut high = values.len();
    while low < high {
        let mid = low + (high - low) / 2;
        let probe = values[mid];
        if probe < value {
            low = mid + 1;
        } else if probe == value {
            return mid as isize;
        } else {
            high = mid;
        }
    }
    -(low as isize) - 1
}

/// Smallest index whose value is `>= value`, or `values.len()` when every
/// value is smaller.
pub fn first_ge(values: &[f64], value: f64) -> usize {
    let found = binary_search(values, value);
    if found < 0 {
        return (-found - 1) as usize;
    }
    let mut index = found as usize;
    while index > 0 && values[index - 1] == value {
        index -= 1;
    }
    index
}

/// Largest index whose value is `<= value`, or `-1` when every value is
/// larger (or `value` is NaN).
pub fn last_le(values: &[f64], value: f64) -> isize {
    if value.is_nan() {
        return -1;
    }
    let found = binary_search(values, value);
    if found < 0 {
        return -found - 2;
    }
    let mut index = found as usize;
    while index + 1 < values.len() && values[index + 1] == value {
        index += 1;
    }
    index as isize
}

/// Index of the value numerically closest to `value`.
///
/// Exact matches resolve to the lowest equal index. Between two neighbours
/// the nearer one wins and ties go to the lower index. `None` for an empty
/// slice or a NaN `value`.
pub fn closest(values: &[f64], value: f64) -> Option<usize> {
    if values.is_empty() || value.is_nan() {
        return None;
    }
    let found = binary_search(values, value);
    if found >= 0 {
        return Some(first_ge(values, value));
    }
    let insertion = (-found - 1) as usize;
    if insertion == 0 {
        return Some(0);
    }
    if insertion >= values.len() {
        return Some(values.len() - 1);
    }
    let below = value - values[insertion - 1];
    let above = values[insertion] - value;
    if below <= above {
        Some(first_ge(values, values[insertion - 1]))
    } else {
        Some(insertion)
    }
}

/// `true` if `values` is non-decreasing.
pub fn is_ascending(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    const AXIS: [f64; 6] = [1.0, 3.0, 3.0, 3.0, 7.0, 10.0];

    #[test]
    fn test_binary_search_encoding() {
        let values = [1.0, 3.0, 7.0];
        assert_eq!(binary_search(&values, 3.0), 1);
        assert_eq!(binary_search(&values, 0.0), -1);
        assert_eq!(binary_search(&values, 5.0), -3);
        assert_eq!(binary_search(&values, 9.0), -4);
        assert_eq!(binary_search(&[], 1.0), -1);

        let insertion = -binary_search(&values, 5.0) - 1;
        assert_eq!(insertion, 2);
    }

    #[test]
    fn test_first_ge_walks_left_on_ties() {
        assert_eq!(first_ge(&AXIS, 3.0), 1);
        assert_eq!(first_ge(&AXIS, 2.0), 1);
        assert_eq!(first_ge(&AXIS, 0.0), 0);
        assert_eq!(first_ge(&AXIS, 11.0), AXIS.len());
    }

    #[test]
    fn test_last_le_walks_right_on_ties() {
        assert_eq!(last_le(&AXIS, 3.0), 3);
        assert_eq!(last_le(&AXIS, 5.0), 3);
        assert_eq!(last_le(&AXIS, 0.5), -1);
        assert_eq!(last_le(&AXIS, 100.0), 5);
    }

    #[test]
    fn test_first_ge_last_le_relationship() {
        for i in 0..=24 {
            let v = i as f64 * 0.5;
            let ge = first_ge(&AXIS, v) as isize;
            let le = last_le(&AXIS, v);
            assert!(ge <= le + 1, "v={}", v);
            if ge == le + 1 {
                assert!(binary_search(&AXIS, v) < 0, "v={} should fall between samples", v);
            }
        }
    }

    #[test]
    fn test_closest_ties_go_low() {
        let values = [0.0, 2.0, 4.0];
        assert_eq!(closest(&values, 1.0), Some(0));
        assert_eq!(closest(&values, 1.1), Some(1));
        assert_eq!(closest(&values, 3.0), Some(1));
        assert_eq!(closest(&values, -5.0), Some(0));
        assert_eq!(closest(&values, 50.0), Some(2));
        assert_eq!(closest(&[], 1.0), None);
    }

    #[test]
    fn test_closest_is_idempotent() {
        for i in -4..=24 {
            let v = i as f64 * 0.5;
            let c = closest(&AXIS, v).unwrap();
            assert_eq!(closest(&AXIS, AXIS[c]), Some(c), "v={}", v);
        }
    }

    #[test]
    fn test_nan_never_matches() {
        assert!(binary_search(&AXIS, f64::NAN) < 0);
        assert_eq!(first_ge(&AXIS, f64::NAN), AXIS.len());
        assert_eq!(last_le(&AXIS, f64::NAN), -1);
        assert_eq!(closest(&AXIS, f64::NAN), None);
    }

    #[test]
    fn test_is_ascending() {
        assert!(is_ascending(&AXIS));
        assert!(is_ascending(&[]));
        assert!(!is_ascending(&[2.0, 1.0]));
    }
}
