//! HTTP transport for DAP2 endpoints.
//!
//! Endpoint structure (`.dds`) and attributes (`.das`) are fetched once per
//! URL and cached; axis and hyperslab reads go through `.ascii?` queries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grid_dataset::{
    ArrayTransport, DatasetError, EndpointMetadata, GridDimension, GridHandle, IndexRange,
    RangeResponse,
};
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::ascii::AsciiResponse;
use crate::das::Das;
use crate::dds::{ArrayDeclaration, Dds};
use crate::error::{OpendapError, OpendapResult};

/// Structure and attributes of one endpoint.
#[derive(Debug, Clone)]
struct EndpointDescription {
    grid: ArrayDeclaration,
    das: Das,
}

/// DAP2 client implementing [`ArrayTransport`].
pub struct OpendapClient {
    client: Client,
    descriptions: RwLock<HashMap<String, Arc<EndpointDescription>>>,
}

impl OpendapClient {
    pub fn new(request_timeout: Duration) -> OpendapResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout.min(Duration::from_secs(30)))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            descriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Underlying HTTP client, for sharing with a catalog source.
    pub fn http_client(&self) -> Client {
        self.client.clone()
    }

    /// GET a URL and return its body, failing on non-success status.
    pub async fn fetch_text(&self, url: &str) -> OpendapResult<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OpendapError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn describe(&self, url: &str) -> OpendapResult<Arc<EndpointDescription>> {
        if let Some(description) = self.descriptions.read().await.get(url) {
            return Ok(description.clone());
        }

        let dds_url = format!("{}.dds", url);
        let das_url = format!("{}.das", url);
        let (dds, das) = tokio::try_join!(self.fetch_text(&dds_url), self.fetch_text(&das_url))?;
        let grid = Dds::parse(&dds)?.grid_variable()?.clone();
        let das = Das::parse(&das)?;
        debug!(url = %url, variable = %grid.name, dims = grid.dimensions.len(), "Described endpoint");

        let description = Arc::new(EndpointDescription { grid, das });
        self.descriptions
            .write()
            .await
            .insert(url.to_string(), description.clone());
        Ok(description)
    }

    async fn query(&self, url: &str, projection: &str) -> OpendapResult<AsciiResponse> {
        let encoded = projection.replace('[', "%5B").replace(']', "%5D");
        let body = self.fetch_text(&format!("{}.ascii?{}", url, encoded)).await?;
        AsciiResponse::parse(&body)
    }
}

/// Projection expression for a hyperslab, e.g. `sst[0:1:0][10:2:20]`.
pub fn hyperslab(variable: &str, ranges: &[IndexRange]) -> String {
    let mut projection = variable.to_string();
    for range in ranges {
        projection.push_str(&range.to_string());
    }
    projection
}

#[async_trait]
impl ArrayTransport for OpendapClient {
    #[instrument(skip(self))]
    async fn open_endpoint(&self, url: &str) -> grid_dataset::Result<GridHandle> {
        let description = self
            .describe(url)
            .await
            .map_err(|e| e.into_dataset_error(url))?;

        let dimensions = description
            .grid
            .dimensions
            .iter()
            .map(|(name, size)| GridDimension {
                name: name.clone(),
                size: *size,
                attributes: description.das.variable(name),
            })
            .collect();

        Ok(GridHandle {
            url: url.to_string(),
            variable: description.grid.name.clone(),
            dimensions,
            variable_attributes: description.das.variable(&description.grid.name),
        })
    }

    #[instrument(skip(self, handle), fields(url = %handle.url))]
    async fn read_axis(&self, handle: &GridHandle, dimension: usize) -> grid_dataset::Result<Vec<f64>> {
        let name = &handle
            .dimensions
            .get(dimension)
            .ok_or_else(|| DatasetError::corrupt(format!("no dimension {} at {}", dimension, handle.url)))?
            .name;

        let response = self
            .query(&handle.url, name)
            .await
            .map_err(|e| e.into_dataset_error(&handle.url))?;
        let section = response
            .require(name)
            .map_err(|e| e.into_dataset_error(&handle.url))?;
        Ok(section.values.clone())
    }

    async fn read_metadata(&self, handle: &GridHandle) -> grid_dataset::Result<EndpointMetadata> {
        let description = self
            .describe(&handle.url)
            .await
            .map_err(|e| e.into_dataset_error(&handle.url))?;
        Ok(description.das.to_endpoint_metadata())
    }

    #[instrument(skip(self, handle, ranges), fields(url = %handle.url))]
    async fn read_range(
        &self,
        handle: &GridHandle,
        ranges: &[IndexRange],
    ) -> grid_dataset::Result<RangeResponse> {
        if ranges.len() != handle.dimensions.len() {
            return Err(DatasetError::invalid_range(format!(
                "{} ranges for {} dimensions",
                ranges.len(),
                handle.dimensions.len()
            )));
        }
        let description = self
            .describe(&handle.url)
            .await
            .map_err(|e| e.into_dataset_error(&handle.url))?;

        let projection = hyperslab(&handle.variable, ranges);
        debug!(projection = %projection, "Reading hyperslab");
        let response = self
            .query(&handle.url, &projection)
            .await
            .map_err(|e| e.into_dataset_error(&handle.url))?;

        let collect = || -> OpendapResult<RangeResponse> {
            let data = response.require(&handle.variable)?;
            let axes = handle
                .dimensions
                .iter()
                .map(|d| response.require(&d.name).map(|s| s.values.clone()))
                .collect::<OpendapResult<Vec<_>>>()?;
            Ok(RangeResponse {
                data: description.grid.dtype.to_typed_array(data.values.clone()),
                axes,
            })
        };
        collect().map_err(|e| e.into_dataset_error(&handle.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hyperslab() {
        let ranges = [
            IndexRange::single(2),
            IndexRange::single(0),
            IndexRange::new(10, 2, 20),
            IndexRange::new(0, 1, 5),
        ];
        assert_eq!(hyperslab("sst", &ranges), "sst[2:1:2][0:1:0][10:2:20][0:1:5]");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let client = OpendapClient::new(Duration::from_millis(500)).unwrap();
        let err = client
            .open_endpoint("http://127.0.0.1:9/thredds/dodsC/satellite/MO/chla/1day")
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::EndpointUnavailable { .. }));
    }
}
