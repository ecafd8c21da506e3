//! Grid extraction with longitude reconciliation across the dateline.
//!
//! # Algorithm
//!
//! ```text
//! request (minX..maxX, minY..maxY, nWide x nHigh)
//!      │
//!      ├─► exact timestamp -> raw time index (else NotFound)
//!      │
//!      ├─► whole x-range fits the lon axis shifted by 0, +360 or -360?
//!      │         │
//!      │         ├─► yes: one shift for every column
//!      │         │
//!      │         └─► no: full-circle axis? shift each column on its own,
//!      │                 otherwise OutOfRange
//!      │
//!      ├─► nearest axis index per column / row
//!      │
//!      ├─► split columns where the axis index wraps (the seam)
//!      │
//!      └─► one strided range read per segment, stitched in caller order
//! ```

use std::ops::Range;
use std::time::Duration;

use serde::Serialize;
use tracing::instrument;

use crate::endpoint::TimePeriodEndpoint;
use crate::error::{DatasetError, Result};
use crate::search;
use crate::time::format_iso8601;
use crate::transport::{bounded, ArrayTransport, IndexRange, RangeResponse};

/// Shifts tried, in order, to bring a longitude into the axis frame.
pub const LONGITUDE_SHIFTS: [f64; 3] = [0.0, 360.0, -360.0];

const FULL_CIRCLE: f64 = 360.0;

/// A rectangular grid request in the caller's coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridRequest {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub n_wide: usize,
    pub n_high: usize,
}

impl GridRequest {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64, n_wide: usize, n_high: usize) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            n_wide,
            n_high,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let bounds = [self.min_x, self.max_x, self.min_y, self.max_y];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(DatasetError::invalid_range("bounding box must be finite"));
        }
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(DatasetError::invalid_range(format!(
                "inverted bounding box x {}..{} y {}..{}",
                self.min_x, self.max_x, self.min_y, self.max_y
            )));
        }
        if self.n_wide == 0 || self.n_high == 0 {
            return Err(DatasetError::invalid_range("sample counts must be >= 1"));
        }
        Ok(())
    }
}

/// Extracted grid.
///
/// `data` is row-major: row 0 is the first (southernmost) latitude and
/// columns follow `longitude`, which is expressed in the caller's frame.
/// Missing values are NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridResult {
    pub timestamp: f64,
    pub longitude: Vec<f64>,
    pub latitude: Vec<f64>,
    pub data: Vec<f64>,
}

impl GridResult {
    pub fn width(&self) -> usize {
        self.longitude.len()
    }

    pub fn height(&self) -> usize {
        self.latitude.len()
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width() || row >= self.height() {
            return None;
        }
        self.data.get(row * self.width() + col).copied()
    }
}

/// Half the mean axis spacing; requests this close to an edge still fit.
fn axis_tolerance(axis: &[f64]) -> f64 {
    match (axis.first(), axis.last()) {
        (Some(first), Some(last)) if axis.len() > 1 => (last - first) / (axis.len() - 1) as f64 / 2.0,
        _ => 0.0,
    }
}

fn reconcile_within(axis: &[f64], min_x: f64, max_x: f64, tolerance: f64) -> Option<f64> {
    let (first, last) = (*axis.first()?, *axis.last()?);
    LONGITUDE_SHIFTS
        .into_iter()
        .find(|shift| min_x + shift >= first - tolerance && max_x + shift <= last + tolerance)
}

/// Shift that brings all of `[min_x, max_x]` inside the axis, if any.
/// Edges may overhang by half a cell.
pub fn reconcile_range(axis: &[f64], min_x: f64, max_x: f64) -> Option<f64> {
    reconcile_within(axis, min_x, max_x, axis_tolerance(axis))
}

/// Shift that brings `x` inside the axis, if any. Edges may overhang by half
/// a cell.
pub fn reconcile_point(axis: &[f64], x: f64) -> Option<f64> {
    reconcile_range(axis, x, x)
}

/// Shift that puts `x` within `[axis[0], axis[n-1]]` exactly, if any.
pub fn reconcile_point_exact(axis: &[f64], x: f64) -> Option<f64> {
    reconcile_within(axis, x, x, 0.0)
}

/// True if the axis plus one cell spans the whole circle.
pub fn covers_full_circle(axis: &[f64]) -> bool {
    match (axis.first(), axis.last()) {
        (Some(first), Some(last)) => last - first + 2.0 * axis_tolerance(axis) >= FULL_CIRCLE - 1e-9,
        _ => false,
    }
}

/// `n` evenly spaced samples from `min` to `max`; the midpoint when `n == 1`.
pub fn sample_positions(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![(min + max) / 2.0],
        _ => {
            let step = (max - min) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { max } else { min + step * i as f64 })
                .collect()
        }
    }
}

/// Axis index and applied shift for one output column.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Column {
    index: usize,
    shift: f64,
}

fn plan_columns(axis: &[f64], request: &GridRequest) -> Result<Vec<Column>> {
    let targets = sample_positions(request.min_x, request.max_x, request.n_wide);
    let nearest = |x: f64| search::closest(axis, x).unwrap_or(0);

    if let Some(shift) = reconcile_range(axis, request.min_x, request.max_x) {
        return Ok(targets
            .into_iter()
            .map(|x| Column {
                index: nearest(x + shift),
                shift,
            })
            .collect());
    }

    let out_of_range = || {
        DatasetError::out_of_range(format!(
            "longitude {}..{} does not fit axis {}..{}",
            request.min_x,
            request.max_x,
            axis.first().copied().unwrap_or(f64::NAN),
            axis.last().copied().unwrap_or(f64::NAN)
        ))
    };
    if !covers_full_circle(axis) {
        return Err(out_of_range());
    }

    targets
        .into_iter()
        .map(|x| {
            let shift = reconcile_point(axis, x).ok_or_else(out_of_range)?;
            Ok(Column {
                index: nearest(x + shift),
                shift,
            })
        })
        .collect()
}

fn plan_rows(axis: &[f64], request: &GridRequest) -> Result<Vec<usize>> {
    let (first, last) = match (axis.first(), axis.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(DatasetError::out_of_range("empty latitude axis")),
    };
    let tolerance = axis_tolerance(axis);
    if request.max_y < first - tolerance || request.min_y > last + tolerance {
        return Err(DatasetError::out_of_range(format!(
            "latitude {}..{} does not overlap axis {}..{}",
            request.min_y, request.max_y, first, last
        )));
    }
    Ok(sample_positions(request.min_y, request.max_y, request.n_high)
        .into_iter()
        .map(|y| search::closest(axis, y).unwrap_or(0))
        .collect())
}

/// Split output columns into runs whose axis indices do not wrap.
fn seam_segments(columns: &[Column]) -> Vec<Range<usize>> {
    let mut segments = Vec::new();
    let mut start = 0;
    for i in 1..columns.len() {
        if columns[i].index < columns[i - 1].index {
            segments.push(start..i);
            start = i;
        }
    }
    if !columns.is_empty() {
        segments.push(start..columns.len());
    }
    segments
}

/// Smallest range covering `indices`, strided when they are evenly spaced.
fn covering_range(indices: impl IntoIterator<Item = usize>) -> Option<IndexRange> {
    let mut unique: Vec<usize> = indices.into_iter().collect();
    unique.sort_unstable();
    unique.dedup();
    let (&start, &stop) = (unique.first()?, unique.last()?);
    let stride = match unique.as_slice() {
        [a, b, ..] if unique.windows(2).all(|w| w[1] - w[0] == b - a) => b - a,
        _ => 1,
    };
    Some(IndexRange::new(start, stride, stop))
}

/// Offset of `coords` in a row-major array of the given `counts`.
pub(crate) fn row_major_offset(counts: &[usize], coords: &[usize]) -> usize {
    counts
        .iter()
        .zip(coords)
        .fold(0, |offset, (&count, &coord)| offset * count + coord)
}

/// Extracts 2-D grids from period endpoints.
pub struct GridExtractor<'a> {
    transport: &'a dyn ArrayTransport,
    timeout: Duration,
}

impl<'a> GridExtractor<'a> {
    pub fn new(transport: &'a dyn ArrayTransport, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Extract the grid at an exact centered `timestamp`.
    #[instrument(skip(self, endpoint), fields(period = endpoint.label()))]
    pub async fn extract(
        &self,
        endpoint: &TimePeriodEndpoint,
        timestamp: f64,
        request: &GridRequest,
    ) -> Result<GridResult> {
        request.validate()?;

        let time_index = endpoint
            .temporal_index
            .position_of(timestamp)
            .and_then(|position| endpoint.temporal_index.axis_index(position))
            .ok_or_else(|| {
                DatasetError::not_found(format!(
                    "time {} is not available for period '{}'",
                    format_iso8601(timestamp),
                    endpoint.label()
                ))
            })?;

        let columns = plan_columns(&endpoint.longitude, request)?;
        let rows = plan_rows(&endpoint.latitude, request)?;
        let lat_range = covering_range(rows.iter().copied())
            .ok_or_else(|| DatasetError::invalid_range("no latitude samples"))?;

        let segments = seam_segments(&columns);
        if segments.len() > 1 {
            tracing::debug!(segments = segments.len(), "Request crosses the longitude seam");
        }

        let reads = segments.iter().map(|segment| {
            let lon_range = covering_range(columns[segment.clone()].iter().map(|c| c.index))
                .unwrap_or_else(|| IndexRange::single(0));
            let ranges = endpoint.order.ranges(
                IndexRange::single(time_index),
                IndexRange::single(0),
                lat_range,
                lon_range,
            );
            async move {
                let response = bounded(
                    endpoint.query_url(),
                    "read grid",
                    self.timeout,
                    self.transport.read_range(&endpoint.handle, &ranges),
                )
                .await?;
                check_shape(&response, &ranges)?;
                Ok::<_, DatasetError>((ranges, response))
            }
        });
        let responses = futures::future::try_join_all(reads).await?;

        let width = columns.len();
        let mut data = vec![f64::NAN; width * rows.len()];
        let order = endpoint.order;
        for (segment, (ranges, response)) in segments.iter().zip(&responses) {
            let values = response.data.to_f64_masked(endpoint.missing_value);
            let counts: Vec<usize> = ranges.iter().map(IndexRange::count).collect();
            let (lat_range, lon_range) = (ranges[order.latitude], ranges[order.longitude]);

            for col in segment.clone() {
                let lon_position = (columns[col].index - lon_range.start) / lon_range.stride;
                for (row, &lat_index) in rows.iter().enumerate() {
                    let mut coords = [0usize; 4];
                    coords[order.latitude] = (lat_index - lat_range.start) / lat_range.stride;
                    coords[order.longitude] = lon_position;
                    data[row * width + col] = values[row_major_offset(&counts, &coords)];
                }
            }
        }

        Ok(GridResult {
            timestamp,
            longitude: columns
                .iter()
                .map(|c| endpoint.longitude[c.index] - c.shift)
                .collect(),
            latitude: rows.iter().map(|&r| endpoint.latitude[r]).collect(),
            data,
        })
    }
}

fn check_shape(response: &RangeResponse, ranges: &[IndexRange]) -> Result<()> {
    let expected: usize = ranges.iter().map(IndexRange::count).product();
    if response.data.len() != expected {
        return Err(DatasetError::corrupt(format!(
            "expected {} values for {}, got {}",
            expected,
            ranges.iter().map(ToString::to_string).collect::<String>(),
            response.data.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(first: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| first + step * i as f64).collect()
    }

    #[test]
    fn test_reconcile_range_shifts() {
        let lon = axis(0.0, 5.0, 72); // 0..355
        assert_eq!(reconcile_range(&lon, 315.0, 315.0), Some(0.0));
        assert_eq!(reconcile_range(&lon, -45.0, -45.0), Some(360.0));
        assert_eq!(reconcile_range(&lon, 400.0, 410.0), Some(-360.0));
        assert_eq!(reconcile_range(&lon, -45.0, 135.0), None);

        let pacific = axis(-180.0, 1.0, 360); // -180..179
        assert_eq!(reconcile_range(&pacific, 200.0, 210.0), Some(-360.0));
    }

    #[test]
    fn test_reconcile_is_total_only_for_full_circle() {
        let full = axis(0.0, 5.0, 72);
        assert!(covers_full_circle(&full));
        for i in -720..1080 {
            let x = i as f64 * 0.5;
            if (-180.0..540.0).contains(&x) {
                assert!(reconcile_point(&full, x).is_some(), "x={}", x);
            }
        }

        let regional = axis(120.0, 0.025, 8001); // 120..320
        assert!(!covers_full_circle(&regional));
        assert_eq!(reconcile_point(&regional, 315.0), Some(0.0));
        assert_eq!(reconcile_point(&regional, -45.0), Some(360.0));
        assert_eq!(reconcile_point(&regional, 0.0), None);
        assert_eq!(reconcile_point(&regional, 100.0), None);
    }

    #[test]
    fn test_reconcile_point_exact_has_no_overhang() {
        let lon = axis(0.0, 5.0, 72); // 0..355
        assert_eq!(reconcile_point(&lon, 357.0), Some(0.0));
        assert_eq!(reconcile_point_exact(&lon, 357.0), None);
        assert_eq!(reconcile_point_exact(&lon, 355.0), Some(0.0));
        assert_eq!(reconcile_point_exact(&lon, -5.0), Some(360.0));
        assert_eq!(reconcile_point_exact(&lon, -3.0), None);
        assert_eq!(reconcile_point_exact(&lon, f64::NAN), None);
        assert_eq!(reconcile_point_exact(&lon, f64::INFINITY), None);
    }

    #[test]
    fn test_sample_positions() {
        assert_eq!(sample_positions(0.0, 10.0, 3), vec![0.0, 5.0, 10.0]);
        assert_eq!(sample_positions(315.0, 315.0, 1), vec![315.0]);
        assert_eq!(sample_positions(-45.0, 135.0, 37)[36], 135.0);
        assert!(sample_positions(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_plan_columns_across_seam() {
        let lon = axis(0.0, 5.0, 72);
        let request = GridRequest::new(-45.0, 135.0, 0.0, 0.0, 37, 1);
        let columns = plan_columns(&lon, &request).unwrap();

        assert_eq!(columns[0], Column { index: 63, shift: 360.0 });
        assert_eq!(columns[8], Column { index: 71, shift: 360.0 });
        assert_eq!(columns[9], Column { index: 0, shift: 0.0 });
        assert_eq!(columns[36], Column { index: 27, shift: 0.0 });

        let segments = seam_segments(&columns);
        assert_eq!(segments, vec![0..9, 9..37]);
    }

    #[test]
    fn test_plan_columns_regional_axis_rejects() {
        let lon = axis(120.0, 1.0, 201);
        let request = GridRequest::new(-100.0, 100.0, 0.0, 0.0, 3, 1);
        let err = plan_columns(&lon, &request).unwrap_err();
        assert!(matches!(err, DatasetError::OutOfRange(_)));
    }

    #[test]
    fn test_plan_rows_clamps_and_rejects() {
        let lat = axis(-40.0, 10.0, 9); // -40..40
        let request = GridRequest::new(0.0, 0.0, -60.0, 60.0, 1, 3);
        assert_eq!(plan_rows(&lat, &request).unwrap(), vec![0, 4, 8]);

        let request = GridRequest::new(0.0, 0.0, 50.0, 60.0, 1, 2);
        assert!(matches!(
            plan_rows(&lat, &request),
            Err(DatasetError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_covering_range_stride() {
        assert_eq!(covering_range([0, 2, 4, 6]), Some(IndexRange::new(0, 2, 6)));
        assert_eq!(covering_range([4, 4, 4]), Some(IndexRange::single(4)));
        assert_eq!(covering_range([0, 1, 3]), Some(IndexRange::new(0, 1, 3)));
        assert_eq!(covering_range(Vec::new()), None);
    }

    #[test]
    fn test_row_major_offset() {
        let counts = [1, 1, 3, 4];
        assert_eq!(row_major_offset(&counts, &[0, 0, 0, 0]), 0);
        assert_eq!(row_major_offset(&counts, &[0, 0, 1, 0]), 4);
        assert_eq!(row_major_offset(&counts, &[0, 0, 2, 3]), 11);
    }

    #[test]
    fn test_request_validation() {
        assert!(GridRequest::new(0.0, 1.0, 0.0, 1.0, 1, 1).validate().is_ok());
        assert!(GridRequest::new(1.0, 0.0, 0.0, 1.0, 1, 1).validate().is_err());
        assert!(GridRequest::new(0.0, 1.0, 0.0, 1.0, 0, 1).validate().is_err());
        assert!(GridRequest::new(f64::NAN, 1.0, 0.0, 1.0, 1, 1).validate().is_err());
    }
}
