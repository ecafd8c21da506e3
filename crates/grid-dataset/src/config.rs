//! Configuration for a catalog-backed grid dataset.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::temporal_index::TimeConvention;
use crate::time_period::known_periods;

/// Configuration for one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Internal dataset name, e.g. `TMBchla`. Its suffix can select the
    /// 25 or 33 hour period for single-scan directories.
    pub id: String,

    /// Catalog document URL.
    pub catalog_url: String,

    /// Upper bound on every remote call, in seconds.
    pub request_timeout_secs: u64,

    /// Catalog entries resolved concurrently during discovery.
    pub discovery_concurrency: usize,

    /// Apply the one second end-time correction to whole-day composites.
    pub midnight_correction: bool,

    /// Allow-list of period tokens; `None` accepts every known token.
    pub period_tokens: Option<Vec<String>>,

    /// Provenance added to time-series metadata.
    pub creator_name: Option<String>,
    pub creator_email: Option<String>,
    pub creator_url: Option<String>,
    pub project: Option<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            catalog_url: String::new(),
            request_timeout_secs: 30,
            discovery_concurrency: 4,
            midnight_correction: true,
            period_tokens: None,
            creator_name: None,
            creator_email: None,
            creator_url: None,
            project: None,
        }
    }
}

impl DatasetConfig {
    pub fn new(id: impl Into<String>, catalog_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            catalog_url: catalog_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GRID_DATASET_ID") {
            config.id = val;
        }

        if let Ok(val) = std::env::var("THREDDS_CATALOG_URL") {
            config.catalog_url = val;
        }

        if let Ok(val) = std::env::var("REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.request_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("DISCOVERY_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                config.discovery_concurrency = n;
            }
        }

        if let Ok(val) = std::env::var("MIDNIGHT_CORRECTION") {
            config.midnight_correction = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("PERIOD_TOKENS") {
            let tokens: Vec<String> = val
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if !tokens.is_empty() {
                config.period_tokens = Some(tokens);
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id must not be empty".to_string());
        }

        if !self.catalog_url.contains("://") {
            return Err(format!("catalog_url '{}' is not an absolute url", self.catalog_url));
        }

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be > 0".to_string());
        }

        if self.discovery_concurrency == 0 {
            return Err("discovery_concurrency must be > 0".to_string());
        }

        known_periods(self.period_tokens.as_deref())?;

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Convention applied to time axes labelled as end times.
    pub fn end_time_convention(&self) -> TimeConvention {
        TimeConvention::EndTime {
            midnight_correction: self.midnight_correction,
        }
    }
}
