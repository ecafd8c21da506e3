//! THREDDS catalog documents fetched over HTTP.

use async_trait::async_trait;
use grid_dataset::{CatalogDocument, CatalogSource};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::{OpendapError, OpendapResult};

/// [`CatalogSource`] reading `catalog.xml` documents from a THREDDS server.
#[derive(Clone)]
pub struct ThreddsCatalog {
    client: Client,
}

impl ThreddsCatalog {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, catalog_url: &str) -> OpendapResult<String> {
        let response = self.client.get(catalog_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OpendapError::Status {
                url: catalog_url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl CatalogSource for ThreddsCatalog {
    #[instrument(skip(self))]
    async fn load(&self, catalog_url: &str) -> grid_dataset::Result<CatalogDocument> {
        let xml = self
            .fetch(catalog_url)
            .await
            .map_err(|e| e.into_dataset_error(catalog_url))?;
        let document = CatalogDocument::parse(&xml)?;
        debug!(
            entries = document.list_dataset_entries().len(),
            "Loaded catalog"
        );
        Ok(document)
    }
}
