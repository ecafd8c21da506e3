//! Query tool configuration.
//!
//! A YAML file lists the datasets the tool can open:
//!
//! ```yaml
//! datasets:
//!   - id: MOchla
//!     catalog_url: https://host/thredds/catalog/satellite/MO/chla/catalog.xml
//!     period_tokens: [hday, 1day, 8day, mday]
//!   - id: TMBchla
//!     catalog_url: https://host/thredds/catalog/satellite/MB/chla/catalog.xml
//!     request_timeout_secs: 60
//! ```
//!
//! Without a file, a single dataset is read from the environment.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use grid_dataset::DatasetConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
}

impl QueryConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: QueryConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Single dataset from `GRID_DATASET_ID`, `THREDDS_CATALOG_URL`, ...
    pub fn from_env() -> Result<Self> {
        let config = QueryConfig {
            datasets: vec![DatasetConfig::from_env()],
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.datasets.is_empty() {
            bail!("no datasets configured");
        }
        for dataset in &self.datasets {
            dataset
                .validate()
                .map_err(|e| anyhow!("dataset '{}': {}", dataset.id, e))?;
        }
        for (i, dataset) in self.datasets.iter().enumerate() {
            if self.datasets[..i].iter().any(|d| d.id == dataset.id) {
                bail!("dataset '{}' is configured twice", dataset.id);
            }
        }
        Ok(())
    }

    /// Dataset by id; the only dataset when `id` is omitted.
    pub fn dataset(&self, id: Option<&str>) -> Result<&DatasetConfig> {
        match id {
            Some(id) => self
                .datasets
                .iter()
                .find(|d| d.id == id)
                .ok_or_else(|| anyhow!("unknown dataset '{}'", id)),
            None if self.datasets.len() == 1 => Ok(&self.datasets[0]),
            None => bail!(
                "{} datasets configured, choose one with --dataset",
                self.datasets.len()
            ),
        }
    }
}
