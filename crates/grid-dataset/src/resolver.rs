//! Catalog discovery: turns catalog entries into queryable period endpoints.
//!
//! Every entry is resolved independently. A failing entry becomes a
//! [`Diagnostic`]; only a catalog without an array-service descriptor stops
//! discovery.

use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

use crate::catalog::{endpoint_url, CatalogDocument, DatasetCatalogEntry};
use crate::endpoint::TimePeriodEndpoint;
use crate::error::{DatasetError, Result};
use crate::metadata::DatasetMetadata;
use crate::temporal_index::TimeConvention;
use crate::time_period::TimePeriod;
use crate::transport::{bounded, ArrayTransport};

/// State shared by the entries of one discovery pass.
///
/// Descriptive metadata is fetched by the first entry that succeeds and
/// reused by the rest.
pub struct DiscoveryContext {
    pub dataset_id: String,
    pub end_time: TimeConvention,
    pub timeout: Duration,
    metadata: OnceCell<DatasetMetadata>,
}

impl DiscoveryContext {
    pub fn new(dataset_id: impl Into<String>, end_time: TimeConvention, timeout: Duration) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            end_time,
            timeout,
            metadata: OnceCell::new(),
        }
    }

    /// Shared metadata, fetching it through `endpoint` on first use.
    async fn metadata_from(
        &self,
        transport: &dyn ArrayTransport,
        endpoint: &TimePeriodEndpoint,
    ) -> Result<&DatasetMetadata> {
        self.metadata
            .get_or_try_init(|| async {
                let url = endpoint.query_url();
                let metadata = bounded(
                    url,
                    "read metadata",
                    self.timeout,
                    transport.read_metadata(&endpoint.handle),
                )
                .await?;
                tracing::debug!(url = %url, "Captured shared dataset metadata");
                Ok::<_, DatasetError>(DatasetMetadata::from_endpoint(
                    &endpoint.handle,
                    &endpoint.order,
                    &metadata,
                ))
            })
            .await
    }

    pub fn into_metadata(self) -> Option<DatasetMetadata> {
        self.metadata.into_inner()
    }
}

/// Why a catalog entry did not become an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticReason {
    /// Trailing path segment is not an accepted period token.
    UnknownPeriod(String),
    /// The endpoint opened but had no usable timestamps.
    NoTimes,
    /// Another endpoint already claimed this period label.
    DuplicateLabel(&'static str),
    /// Opening or indexing the endpoint failed.
    Failed(DatasetError),
}

/// One rejected or failed catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub url_path: String,
    pub reason: DiagnosticReason,
    pub elapsed: Duration,
}

/// Timing and outcome summary of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryReport {
    pub entries: usize,
    /// Timestamps indexed across all accepted endpoints.
    pub n_times: usize,
    pub elapsed: Duration,
    /// Time spent on entries that failed.
    pub failed_elapsed: Duration,
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of discovery: endpoints in catalog order plus shared metadata.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub endpoints: Vec<TimePeriodEndpoint>,
    pub metadata: Option<DatasetMetadata>,
    pub report: DiscoveryReport,
}

enum EntryOutcome {
    Accepted(TimePeriodEndpoint),
    Rejected(DiagnosticReason),
}

/// Resolves a catalog into period endpoints.
pub struct CatalogResolver<'a> {
    transport: &'a dyn ArrayTransport,
    concurrency: usize,
}

impl<'a> CatalogResolver<'a> {
    pub fn new(transport: &'a dyn ArrayTransport, concurrency: usize) -> Self {
        Self {
            transport,
            concurrency: concurrency.max(1),
        }
    }

    /// Resolve every entry of `document`.
    ///
    /// Fails only when the catalog lacks the array-service descriptor.
    #[instrument(skip_all, fields(dataset = %context.dataset_id))]
    pub async fn resolve(
        &self,
        catalog_url: &str,
        document: &CatalogDocument,
        known_periods: &[&'static TimePeriod],
        context: DiscoveryContext,
    ) -> Result<Discovery> {
        let started = Instant::now();
        let service_base = document.array_service_base_path()?;
        let entries = document.list_dataset_entries();

        let outcomes: Vec<(&DatasetCatalogEntry, Duration, EntryOutcome)> = stream::iter(entries)
            .map(|entry| {
                let context = &context;
                async move {
                    let entry_started = Instant::now();
                    let outcome = self
                        .resolve_entry(catalog_url, service_base, entry, known_periods, context)
                        .await;
                    (entry, entry_started.elapsed(), outcome)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut discovery = outcomes
            .into_iter()
            .fold(Discovery::default(), |mut acc, (entry, elapsed, outcome)| {
                let reason = match outcome {
                    EntryOutcome::Accepted(endpoint) => {
                        if acc.endpoints.iter().any(|e| e.label() == endpoint.label()) {
                            warn!(
                                url_path = %entry.url_path,
                                period = endpoint.label(),
                                elapsed_ms = elapsed.as_millis() as u64,
                                "Period already served by an earlier entry, skipping"
                            );
                            DiagnosticReason::DuplicateLabel(endpoint.label())
                        } else {
                            acc.report.n_times += endpoint.temporal_index.len();
                            acc.endpoints.push(endpoint);
                            return acc;
                        }
                    }
                    EntryOutcome::Rejected(reason) => reason,
                };
                if matches!(reason, DiagnosticReason::Failed(_)) {
                    acc.report.failed_elapsed += elapsed;
                }
                acc.report.diagnostics.push(Diagnostic {
                    url_path: entry.url_path.clone(),
                    reason,
                    elapsed,
                });
                acc
            });

        discovery.metadata = context.into_metadata();
        discovery.report.entries = entries.len();
        discovery.report.elapsed = started.elapsed();

        info!(
            entries = discovery.report.entries,
            active = discovery.endpoints.len(),
            rejected = discovery.report.diagnostics.len(),
            n_times = discovery.report.n_times,
            elapsed_ms = discovery.report.elapsed.as_millis() as u64,
            failed_ms = discovery.report.failed_elapsed.as_millis() as u64,
            "Catalog discovery complete"
        );

        Ok(discovery)
    }

    async fn resolve_entry(
        &self,
        catalog_url: &str,
        service_base: &str,
        entry: &DatasetCatalogEntry,
        known_periods: &[&'static TimePeriod],
        context: &DiscoveryContext,
    ) -> EntryOutcome {
        let token = entry.period_token();
        let Some(period) = known_periods.iter().copied().find(|p| p.token == token) else {
            warn!(url_path = %entry.url_path, token, "Unrecognized time period, skipping entry");
            return EntryOutcome::Rejected(DiagnosticReason::UnknownPeriod(token.to_string()));
        };
        let period = period.disambiguate(&context.dataset_id);

        let started = Instant::now();
        match self
            .open_entry(catalog_url, service_base, entry, period, context)
            .await
        {
            Ok(Some(endpoint)) => {
                info!(
                    period = period.label,
                    url = %endpoint.query_url(),
                    n_times = endpoint.temporal_index.len(),
                    "Registered period endpoint"
                );
                EntryOutcome::Accepted(endpoint)
            }
            Ok(None) => {
                warn!(
                    url_path = %entry.url_path,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Endpoint has no time values, skipping entry"
                );
                EntryOutcome::Rejected(DiagnosticReason::NoTimes)
            }
            Err(e) => {
                warn!(
                    url_path = %entry.url_path,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Catalog entry failed"
                );
                EntryOutcome::Rejected(DiagnosticReason::Failed(e))
            }
        }
    }

    async fn open_entry(
        &self,
        catalog_url: &str,
        service_base: &str,
        entry: &DatasetCatalogEntry,
        period: &'static TimePeriod,
        context: &DiscoveryContext,
    ) -> Result<Option<TimePeriodEndpoint>> {
        let url = endpoint_url(catalog_url, service_base, &entry.url_path)?;
        let endpoint = TimePeriodEndpoint::open(
            self.transport,
            &url,
            period,
            context.end_time,
            context.timeout,
        )
        .await?;

        match endpoint {
            Some(endpoint) => {
                context.metadata_from(self.transport, &endpoint).await?;
                Ok(Some(endpoint))
            }
            None => Ok(None),
        }
    }
}
