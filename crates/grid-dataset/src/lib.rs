//! Catalog-driven gridded dataset layer.
//!
//! Turns a THREDDS-style catalog of per-period array endpoints (1 day,
//! 8 day, monthly, ...) into two queries: a 2-D grid at one time and a
//! point time series between two times.
//!
//! # Architecture
//!
//! ```text
//! GridDataset::open(config)
//!      │
//!      ├─► CatalogSource::load -> CatalogDocument
//!      │
//!      └─► CatalogResolver (entries resolved concurrently)
//!               │
//!               ├─► period token -> TimePeriod (24h/25h/33h override)
//!               ├─► ArrayTransport: open, axes, time axis
//!               ├─► TemporalIndex (centered times -> raw axis index)
//!               └─► DiscoveryContext: shared metadata fetched once
//!
//! make_grid(period, time, bbox, n)     get_time_series(x, y, t0, t1, period)
//!      │                                     │
//!      ▼                                     ▼
//! GridExtractor                         TimeSeriesAssembler
//!  (±360 reconciliation, seam split)     (nearest cell, gap markers)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_dataset::{DatasetConfig, GridDataset, GridRequest};
//!
//! let config = DatasetConfig::new("TMBchla", "https://host/thredds/catalog.xml");
//! let dataset = GridDataset::open(config, &catalog, transport).await?;
//!
//! let grid = dataset
//!     .make_grid("8 day", "2006-08-08T12:00:00Z", &GridRequest::new(-45.0, 135.0, -30.0, 30.0, 37, 13))
//!     .await?;
//! let series = dataset
//!     .get_time_series(-45.0, 30.0, "2006-08-01", "2006-08-31", "1 day")
//!     .await?;
//! ```

pub mod attributes;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod endpoint;
pub mod error;
pub mod extract;
pub mod metadata;
pub mod resolver;
pub mod search;
pub mod temporal_index;
pub mod testdata;
pub mod time;
pub mod time_period;
pub mod timeseries;
pub mod transport;

// Re-export commonly used types at crate root
pub use attributes::{AttributeValue, Attributes};
pub use catalog::{endpoint_url, CatalogDocument, CatalogSource, DatasetCatalogEntry};
pub use config::DatasetConfig;
pub use dataset::GridDataset;
pub use endpoint::TimePeriodEndpoint;
pub use error::{DatasetError, Result};
pub use extract::{GridExtractor, GridRequest, GridResult};
pub use metadata::DatasetMetadata;
pub use resolver::{CatalogResolver, Diagnostic, DiagnosticReason, Discovery, DiscoveryContext, DiscoveryReport};
pub use temporal_index::{TemporalIndex, TimeConvention};
pub use time::{format_iso8601, parse_iso8601, TimeUnits};
pub use time_period::{TimePeriod, TIME_PERIODS};
pub use timeseries::{SeriesMetadata, TimeSeries, TimeSeriesAssembler, TimeSeriesRow};
pub use transport::{
    ArrayTransport, AxisRole, DimensionOrder, EndpointMetadata, GridDimension, GridHandle,
    IndexRange, RangeResponse, TypedArray,
};
