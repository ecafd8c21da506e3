//! Point time series with centered times and gap markers.

use std::time::Duration;

use serde::Serialize;
use tracing::instrument;

use crate::attributes::Attributes;
use crate::config::DatasetConfig;
use crate::endpoint::TimePeriodEndpoint;
use crate::error::{DatasetError, Result};
use crate::extract::reconcile_point_exact;
use crate::metadata::DatasetMetadata;
use crate::search;
use crate::time::{format_iso8601, parse_iso8601};
use crate::transport::{bounded, ArrayTransport, IndexRange, RangeResponse};

/// Global attributes that only describe the gridded source.
pub const GRID_ONLY_GLOBAL_ATTRIBUTES: &[&str] = &[
    "cols",
    "composite",
    "cwhdf_version",
    "et_affine",
    "gctp_datum",
    "gctp_parm",
    "gctp_sys",
    "gctp_zone",
    "geospatial_lat_resolution",
    "geospatial_lon_resolution",
    "pass_date",
    "polygon_latitude",
    "polygon_longitude",
    "processing_level",
    "geographic",
    "projection_type",
    "rows",
    "start_time",
];

const GRID_ONLY_AXIS_ATTRIBUTES: &[&str] = &["coordsys", "point_spacing"];

const GRID_ONLY_DATA_ATTRIBUTES: &[&str] = &[
    "_coordinateSystem",
    "coordsys",
    "numberOfObservations",
    "percentCoverage",
];

const COORDINATE_TOLERANCE: f64 = 1e-6;

/// One output record. `value` is NaN for missing data and gap markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesRow {
    pub longitude: f64,
    pub latitude: f64,
    pub depth: f64,
    /// Centered epoch seconds.
    pub time: f64,
    pub id: String,
    pub value: f64,
}

/// Per-column and global attributes of a time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesMetadata {
    pub global: Attributes,
    pub longitude: Attributes,
    pub latitude: Attributes,
    pub depth: Attributes,
    pub time: Attributes,
    pub data: Attributes,
}

/// A point time series with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    /// Name of the data column (the dataset id).
    pub data_column: String,
    pub rows: Vec<TimeSeriesRow>,
    pub metadata: SeriesMetadata,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Resolved grid cell for a point request.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    lon_index: usize,
    lat_index: usize,
    shift: f64,
}

/// Builds point time series from period endpoints.
pub struct TimeSeriesAssembler<'a> {
    transport: &'a dyn ArrayTransport,
    timeout: Duration,
}

impl<'a> TimeSeriesAssembler<'a> {
    pub fn new(transport: &'a dyn ArrayTransport, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Rows for the cell nearest `(x, y)` between `min_time` and `max_time`.
    ///
    /// An unresolvable point or a window without samples yields no rows;
    /// only unparsable or inverted time bounds are an error.
    #[instrument(skip(self, endpoint), fields(period = endpoint.label()))]
    pub async fn assemble(
        &self,
        endpoint: &TimePeriodEndpoint,
        dataset_id: &str,
        x: f64,
        y: f64,
        min_time: &str,
        max_time: &str,
    ) -> Result<Vec<TimeSeriesRow>> {
        let min_time = parse_iso8601(min_time)?;
        let max_time = parse_iso8601(max_time)?;
        if min_time > max_time {
            return Err(DatasetError::invalid_range(format!(
                "min time {} is after max time {}",
                format_iso8601(min_time),
                format_iso8601(max_time)
            )));
        }

        let Some(cell) = resolve_cell(endpoint, x, y) else {
            tracing::debug!(x, y, "Point is outside the endpoint axes");
            return Ok(Vec::new());
        };

        let index = &endpoint.temporal_index;
        let Some((first, last)) = index.resolve_window(min_time, max_time) else {
            tracing::debug!(
                min = %format_iso8601(min_time),
                max = %format_iso8601(max_time),
                "No samples in time window"
            );
            return Ok(Vec::new());
        };
        let (Some(first_axis), Some(last_axis)) = (index.axis_index(first), index.axis_index(last)) else {
            return Ok(Vec::new());
        };

        let ranges = endpoint.order.ranges(
            IndexRange::new(first_axis, 1, last_axis),
            IndexRange::single(0),
            IndexRange::single(cell.lat_index),
            IndexRange::single(cell.lon_index),
        );
        let response = bounded(
            endpoint.query_url(),
            "read time series",
            self.timeout,
            self.transport.read_range(&endpoint.handle, &ranges),
        )
        .await?;

        let longitude = endpoint.longitude[cell.lon_index];
        let latitude = endpoint.latitude[cell.lat_index];
        verify_echo(endpoint, &response, ranges[endpoint.order.time].count(), longitude, latitude)?;

        let values = response.data.to_f64_masked(endpoint.missing_value);
        let raw_times = &response.axes[endpoint.order.time];
        let samples = raw_times
            .iter()
            .zip(values)
            .map(|(&raw, value)| (endpoint.centered_time(raw), value));

        let rows = build_rows(
            samples,
            endpoint.period.expected_gap_seconds(),
            longitude - cell.shift,
            latitude,
            dataset_id,
        );

        tracing::debug!(rows = rows.len(), "Assembled time series");
        Ok(rows)
    }
}

/// Nearest cell to `(x, y)`; `None` unless both lie within the axis ends.
fn resolve_cell(endpoint: &TimePeriodEndpoint, x: f64, y: f64) -> Option<Cell> {
    let shift = reconcile_point_exact(&endpoint.longitude, x)?;
    let lat = &endpoint.latitude;
    let (&first, &last) = (lat.first()?, lat.last()?);
    if !(first..=last).contains(&y) {
        return None;
    }
    Some(Cell {
        lon_index: search::closest(&endpoint.longitude, x + shift)?,
        lat_index: search::closest(lat, y)?,
        shift,
    })
}

fn verify_echo(
    endpoint: &TimePeriodEndpoint,
    response: &RangeResponse,
    expected: usize,
    longitude: f64,
    latitude: f64,
) -> Result<()> {
    let order = endpoint.order;
    if response.data.len() != expected {
        return Err(DatasetError::corrupt(format!(
            "expected {} values, got {}",
            expected,
            response.data.len()
        )));
    }
    if response.axes.len() != endpoint.handle.dimensions.len() {
        return Err(DatasetError::corrupt(format!(
            "expected {} coordinate vectors, got {}",
            endpoint.handle.dimensions.len(),
            response.axes.len()
        )));
    }
    if response.axes[order.time].len() != expected {
        return Err(DatasetError::corrupt(format!(
            "expected {} times, got {}",
            expected,
            response.axes[order.time].len()
        )));
    }
    for (name, echoed, resolved) in [
        ("longitude", &response.axes[order.longitude], longitude),
        ("latitude", &response.axes[order.latitude], latitude),
    ] {
        match echoed.as_slice() {
            [value] if (value - resolved).abs() <= COORDINATE_TOLERANCE => {}
            other => {
                return Err(DatasetError::corrupt(format!(
                    "{} echoed as {:?}, expected [{}]",
                    name, other, resolved
                )))
            }
        }
    }
    Ok(())
}

/// Turn `(centered time, value)` samples into rows, inserting a NaN marker
/// one expected gap before any sample that follows its predecessor by more
/// than `expected_gap` seconds. Samples without a finite time, or that do
/// not advance in time, are dropped.
pub fn build_rows(
    samples: impl IntoIterator<Item = (f64, f64)>,
    expected_gap: f64,
    longitude: f64,
    latitude: f64,
    id: &str,
) -> Vec<TimeSeriesRow> {
    let row = |time: f64, value: f64| TimeSeriesRow {
        longitude,
        latitude,
        depth: 0.0,
        time,
        id: id.to_string(),
        value,
    };

    let mut rows = Vec::new();
    let mut previous: Option<f64> = None;
    for (time, value) in samples {
        if !time.is_finite() {
            continue;
        }
        if let Some(previous) = previous {
            if time <= previous {
                continue;
            }
            if time - previous > expected_gap {
                rows.push(row(time - expected_gap, f64::NAN));
            }
        }
        rows.push(row(time, value));
        previous = Some(time);
    }
    rows
}

/// Metadata for a time series drawn from `shared`, with grid-only attributes
/// removed and point/coverage attributes set.
pub fn series_metadata(
    shared: &DatasetMetadata,
    endpoint: &TimePeriodEndpoint,
    config: &DatasetConfig,
    rows: &[TimeSeriesRow],
) -> SeriesMetadata {
    let mut global = shared.global.clone();
    global.remove_all(GRID_ONLY_GLOBAL_ATTRIBUTES);
    global.set("cdm_data_type", "Station");
    global.set("title", shared.title.clone());
    if !shared.summary.is_empty() {
        global.set("summary", shared.summary.clone());
    }
    if let Some(courtesy) = &shared.courtesy {
        global.set("acknowledgement", courtesy.clone());
    }
    let provenance = [
        ("creator_name", &config.creator_name),
        ("creator_email", &config.creator_email),
        ("creator_url", &config.creator_url),
        ("project", &config.project),
    ];
    for (name, value) in provenance {
        if let Some(value) = value {
            global.set(name, value.clone());
        }
    }

    let mut longitude = shared.longitude.clone();
    longitude.remove_all(GRID_ONLY_AXIS_ATTRIBUTES);
    let mut latitude = shared.latitude.clone();
    latitude.remove_all(GRID_ONLY_AXIS_ATTRIBUTES);

    let mut time = shared.time.clone();
    let long_name = if endpoint.period.nominal_hours > 0 {
        format!("Centered Time of {} Composites", endpoint.period.label)
    } else {
        "Centered Time".to_string()
    };
    time.set("long_name", long_name);

    let mut data = shared.data.clone();
    data.remove_all(GRID_ONLY_DATA_ATTRIBUTES);
    data.set("long_name", shared.title.clone());
    data.set("units", shared.units.clone());

    if let (Some(first), Some(last)) = (rows.first(), rows.last()) {
        global.set("geospatial_lon_min", first.longitude);
        global.set("geospatial_lon_max", first.longitude);
        global.set("geospatial_lat_min", first.latitude);
        global.set("geospatial_lat_max", first.latitude);
        global.set("time_coverage_start", format_iso8601(first.time));
        global.set("time_coverage_end", format_iso8601(last.time));
        longitude.set("actual_range", vec![first.longitude, first.longitude]);
        latitude.set("actual_range", vec![first.latitude, first.latitude]);
        time.set("actual_range", vec![first.time, last.time]);
    }

    SeriesMetadata {
        global,
        longitude,
        latitude,
        depth: shared.depth.clone(),
        time,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAP: f64 = 86_400.0;

    #[test]
    fn test_gap_marker_between_distant_samples() {
        let t0 = 1_155_038_400.0;
        let rows = build_rows([(t0, 1.0), (t0 + 3.0 * GAP, 2.0)], GAP, -45.0, 30.0, "TMBchla");

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].value, 1.0);
        assert_eq!(rows[1].time, t0 + 2.0 * GAP);
        assert!(rows[1].value.is_nan());
        assert_eq!(rows[2].value, 2.0);
        assert!(rows.iter().all(|r| r.depth == 0.0 && r.id == "TMBchla"));
    }

    #[test]
    fn test_no_marker_at_expected_spacing() {
        let rows = build_rows([(0.0, 1.0), (GAP, 2.0), (2.0 * GAP, f64::NAN)], GAP, 0.0, 0.0, "x");
        assert_eq!(rows.len(), 3);
        assert!(rows[2].value.is_nan());
    }

    #[test]
    fn test_build_rows_drops_repeated_times() {
        let rows = build_rows(
            [(10.0, 1.0), (10.0, 9.0), (f64::NAN, 9.0), (5.0, 9.0), (11.0, 2.0)],
            GAP,
            0.0,
            0.0,
            "x",
        );
        let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_build_rows_empty() {
        assert!(build_rows(Vec::new(), GAP, 0.0, 0.0, "x").is_empty());
    }
}
