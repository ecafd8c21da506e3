//! Dataset facade: discovery at open, then read-only grid and time-series
//! queries.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::catalog::CatalogSource;
use crate::config::DatasetConfig;
use crate::endpoint::TimePeriodEndpoint;
use crate::error::{DatasetError, Result};
use crate::extract::{GridExtractor, GridRequest, GridResult};
use crate::metadata::DatasetMetadata;
use crate::resolver::{CatalogResolver, DiscoveryContext, DiscoveryReport};
use crate::time::parse_iso8601;
use crate::time_period::known_periods;
use crate::timeseries::{series_metadata, TimeSeries, TimeSeriesAssembler};
use crate::transport::{bounded, ArrayTransport};

/// A catalog-backed gridded dataset.
///
/// Discovery runs to completion inside [`GridDataset::open`]; afterwards the
/// dataset is immutable and can be shared across tasks.
pub struct GridDataset {
    config: DatasetConfig,
    transport: Arc<dyn ArrayTransport>,
    endpoints: Vec<TimePeriodEndpoint>,
    metadata: Option<DatasetMetadata>,
    report: DiscoveryReport,
}

impl GridDataset {
    /// Load the catalog and resolve its period endpoints.
    #[instrument(skip_all, fields(dataset = %config.id))]
    pub async fn open(
        config: DatasetConfig,
        catalog: &dyn CatalogSource,
        transport: Arc<dyn ArrayTransport>,
    ) -> Result<Self> {
        config.validate().map_err(DatasetError::configuration)?;
        let known = known_periods(config.period_tokens.as_deref()).map_err(DatasetError::configuration)?;

        let document = bounded(
            &config.catalog_url,
            "load catalog",
            config.request_timeout(),
            catalog.load(&config.catalog_url),
        )
        .await?;

        let context = DiscoveryContext::new(
            config.id.clone(),
            config.end_time_convention(),
            config.request_timeout(),
        );
        let discovery = CatalogResolver::new(transport.as_ref(), config.discovery_concurrency)
            .resolve(&config.catalog_url, &document, &known, context)
            .await?;

        if discovery.endpoints.is_empty() {
            warn!(catalog = %config.catalog_url, "No queryable period endpoints found");
        } else {
            info!(
                periods = ?discovery.endpoints.iter().map(|e| e.label()).collect::<Vec<_>>(),
                "Dataset ready"
            );
        }

        Ok(Self {
            config,
            transport,
            endpoints: discovery.endpoints,
            metadata: discovery.metadata,
            report: discovery.report,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Labels of the queryable periods, in discovery order.
    pub fn active_periods(&self) -> Vec<&'static str> {
        self.endpoints.iter().map(TimePeriodEndpoint::label).collect()
    }

    pub fn metadata(&self) -> Option<&DatasetMetadata> {
        self.metadata.as_ref()
    }

    pub fn discovery_report(&self) -> &DiscoveryReport {
        &self.report
    }

    /// Endpoint for a period label.
    pub fn endpoint(&self, period_label: &str) -> Result<&TimePeriodEndpoint> {
        self.endpoints
            .iter()
            .find(|e| e.label() == period_label)
            .ok_or_else(|| {
                DatasetError::not_found(format!(
                    "period '{}' is not active for dataset '{}'",
                    period_label, self.config.id
                ))
            })
    }

    /// Centered timestamps of a period as ISO 8601 strings.
    pub fn available_times(&self, period_label: &str) -> Result<Vec<String>> {
        Ok(self.endpoint(period_label)?.available_times())
    }

    /// Grid for an exact available timestamp.
    pub async fn make_grid(
        &self,
        period_label: &str,
        timestamp: &str,
        request: &GridRequest,
    ) -> Result<GridResult> {
        let endpoint = self.endpoint(period_label)?;
        let timestamp = parse_iso8601(timestamp)?;
        GridExtractor::new(self.transport.as_ref(), self.config.request_timeout())
            .extract(endpoint, timestamp, request)
            .await
    }

    /// Time series at the cell nearest `(x, y)`.
    pub async fn get_time_series(
        &self,
        x: f64,
        y: f64,
        min_time: &str,
        max_time: &str,
        period_label: &str,
    ) -> Result<TimeSeries> {
        let endpoint = self.endpoint(period_label)?;
        let shared = self.metadata.as_ref().ok_or_else(|| {
            DatasetError::not_found(format!("dataset '{}' has no metadata", self.config.id))
        })?;

        let rows = TimeSeriesAssembler::new(self.transport.as_ref(), self.config.request_timeout())
            .assemble(endpoint, &self.config.id, x, y, min_time, max_time)
            .await?;
        let metadata = series_metadata(shared, endpoint, &self.config, &rows);

        Ok(TimeSeries {
            data_column: self.config.id.clone(),
            rows,
            metadata,
        })
    }
}
