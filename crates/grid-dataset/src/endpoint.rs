//! A remote grid endpoint for one aggregation period.

use std::time::Duration;

use tracing::instrument;

use crate::error::{DatasetError, Result};
use crate::search;
use crate::temporal_index::{TemporalIndex, TimeConvention};
use crate::time::{format_iso8601, TimeUnits};
use crate::time_period::TimePeriod;
use crate::transport::{bounded, ArrayTransport, DimensionOrder, GridHandle};

const END_TIME_LONG_NAME: &str = "End Time";

/// A successfully opened period endpoint. Immutable once discovered.
#[derive(Debug, Clone)]
pub struct TimePeriodEndpoint {
    pub period: &'static TimePeriod,
    pub handle: GridHandle,
    pub order: DimensionOrder,
    /// Ascending longitude axis in the server's frame.
    pub longitude: Vec<f64>,
    /// Ascending latitude axis.
    pub latitude: Vec<f64>,
    pub missing_value: Option<f64>,
    pub convention: TimeConvention,
    pub time_units: TimeUnits,
    pub temporal_index: TemporalIndex,
}

impl TimePeriodEndpoint {
    pub fn label(&self) -> &'static str {
        self.period.label
    }

    /// Address handed to the transport.
    pub fn query_url(&self) -> &str {
        &self.handle.url
    }

    /// Convert a raw time axis value to its centered epoch-seconds timestamp.
    pub fn centered_time(&self, raw: f64) -> f64 {
        self.convention
            .center(self.time_units.to_epoch_seconds(raw), self.period.nominal_hours)
    }

    /// Centered timestamps formatted as ISO 8601.
    pub fn available_times(&self) -> Vec<String> {
        self.temporal_index
            .times()
            .iter()
            .map(|&t| format_iso8601(t))
            .collect()
    }

    /// Open and index an endpoint.
    ///
    /// Returns `Ok(None)` when the endpoint has no usable timestamps.
    #[instrument(skip(transport, period, end_time), fields(period = %period.token))]
    pub async fn open(
        transport: &dyn ArrayTransport,
        url: &str,
        period: &'static TimePeriod,
        end_time: TimeConvention,
        timeout: Duration,
    ) -> Result<Option<Self>> {
        let handle = bounded(url, "open", timeout, transport.open_endpoint(url)).await?;
        let order = DimensionOrder::resolve(&handle)?;

        let (longitude, latitude, raw_times) = futures::try_join!(
            bounded(url, "read lon axis", timeout, transport.read_axis(&handle, order.longitude)),
            bounded(url, "read lat axis", timeout, transport.read_axis(&handle, order.latitude)),
            bounded(url, "read time axis", timeout, transport.read_axis(&handle, order.time)),
        )?;

        for (name, axis) in [("longitude", &longitude), ("latitude", &latitude)] {
            if axis.is_empty() || !search::is_ascending(axis) {
                return Err(DatasetError::corrupt(format!(
                    "{} axis of {} is empty or not ascending",
                    name, url
                )));
            }
        }

        let time_attributes = &handle.dimensions[order.time].attributes;
        let time_units = match time_attributes.get_str("units") {
            Some(units) => TimeUnits::parse(units)?,
            None => TimeUnits::EPOCH_SECONDS,
        };
        let convention = match time_attributes.get_str("long_name") {
            Some(name) if name.trim() == END_TIME_LONG_NAME => end_time,
            _ => TimeConvention::Centered,
        };

        let missing_value = handle
            .variable_attributes
            .get_f64("missing_value")
            .or_else(|| handle.variable_attributes.get_f64("_FillValue"));

        let raw_seconds: Vec<f64> = raw_times
            .iter()
            .map(|&raw| time_units.to_epoch_seconds(raw))
            .collect();
        let temporal_index = TemporalIndex::build(&raw_seconds, period.nominal_hours, convention);

        if temporal_index.is_empty() {
            tracing::debug!(url = %url, "Endpoint has no usable times");
            return Ok(None);
        }

        tracing::debug!(
            url = %url,
            n_times = temporal_index.len(),
            n_lon = longitude.len(),
            n_lat = latitude.len(),
            "Indexed endpoint"
        );

        Ok(Some(Self {
            period,
            handle,
            order,
            longitude,
            latitude,
            missing_value,
            convention,
            time_units,
            temporal_index,
        }))
    }
}
