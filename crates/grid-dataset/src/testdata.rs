//! In-memory collaborators for tests and local experiments.
//!
//! [`MemoryTransport`] serves [`MemoryGrid`]s keyed by endpoint URL and can be
//! told to fail, hang or echo wrong coordinates for individual URLs.
//! [`MemoryCatalog`] serves a fixed catalog document.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::attributes::Attributes;
use crate::catalog::{CatalogDocument, CatalogSource};
use crate::error::{DatasetError, Result};
use crate::extract::row_major_offset;
use crate::transport::{
    ArrayTransport, EndpointMetadata, GridDimension, GridHandle, IndexRange, RangeResponse,
    TypedArray,
};

/// Epoch seconds of 2006-08-08T12:00:00Z.
pub const AUG_8_2006_NOON: f64 = 1_155_038_400.0;

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Regular axis of `n` values starting at `first`.
pub fn regular_axis(first: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| first + step * i as f64).collect()
}

/// A catalog document with an OPeNDAP service and one dataset per path.
pub fn thredds_catalog(service_base: Option<&str>, url_paths: &[&str]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<catalog name=\"test\">\n");
    if let Some(base) = service_base {
        xml.push_str("  <service name=\"all\" serviceType=\"Compound\" base=\"\">\n");
        xml.push_str(&format!(
            "    <service name=\"ncdods\" serviceType=\"OPENDAP\" base=\"{}\"/>\n",
            base
        ));
        xml.push_str("  </service>\n");
    }
    xml.push_str("  <dataset name=\"test data\">\n");
    for path in url_paths {
        xml.push_str(&format!("    <dataset name=\"{}\" urlPath=\"{}\"/>\n", path, path));
    }
    xml.push_str("  </dataset>\n</catalog>\n");
    xml
}

/// A 4-D grid `(time, altitude, lat, lon)` held in memory.
#[derive(Debug, Clone)]
pub struct MemoryGrid {
    pub variable: String,
    pub times: Vec<f64>,
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    /// Row-major `[time][altitude][lat][lon]`.
    pub values: Vec<f32>,
    pub time_attributes: Attributes,
    pub variable_attributes: Attributes,
    pub global: Attributes,
}

impl MemoryGrid {
    /// Grid whose value at `(t, lat, lon)` comes from `value`.
    pub fn new(
        times: Vec<f64>,
        latitude: Vec<f64>,
        longitude: Vec<f64>,
        value: impl Fn(usize, usize, usize) -> f32,
    ) -> Self {
        let mut values = Vec::with_capacity(times.len() * latitude.len() * longitude.len());
        for t in 0..times.len() {
            for y in 0..latitude.len() {
                for x in 0..longitude.len() {
                    values.push(value(t, y, x));
                }
            }
        }

        let mut global = Attributes::new();
        global.set("title", "Chlorophyll-a, Aqua MODIS");
        global.set("summary", "Chlorophyll-a concentration. The units of the data are mg m-3.");
        global.set("creator_name", "NOAA CoastWatch");
        global.set("rows", latitude.len() as i64);
        global.set("cols", longitude.len() as i64);
        global.set("composite", "true");

        let mut variable_attributes = Attributes::new();
        variable_attributes.set("long_name", "Chlorophyll-a");
        variable_attributes.set("units", "mg m-3");
        variable_attributes.set("numberOfObservations", 12i64);

        Self {
            variable: "chlorophyll".to_string(),
            times,
            latitude,
            longitude,
            values,
            time_attributes: Attributes::new(),
            variable_attributes,
            global,
        }
    }

    /// Mark the time axis as composite end times.
    pub fn end_times(mut self) -> Self {
        self.time_attributes.set("long_name", "End Time");
        self
    }

    pub fn with_time_units(mut self, units: &str) -> Self {
        self.time_attributes.set("units", units);
        self
    }

    pub fn with_missing_value(mut self, missing: f64) -> Self {
        self.variable_attributes.set("missing_value", missing);
        self
    }

    fn dimension_sizes(&self) -> [usize; 4] {
        [self.times.len(), 1, self.latitude.len(), self.longitude.len()]
    }

    fn axis(&self, dimension: usize) -> Vec<f64> {
        match dimension {
            0 => self.times.clone(),
            1 => vec![0.0],
            2 => self.latitude.clone(),
            _ => self.longitude.clone(),
        }
    }

    fn handle(&self, url: &str) -> GridHandle {
        let dimension = |name: &str, size: usize, attributes: Attributes| GridDimension {
            name: name.to_string(),
            size,
            attributes,
        };
        let [n_time, n_alt, n_lat, n_lon] = self.dimension_sizes();
        GridHandle {
            url: url.to_string(),
            variable: self.variable.clone(),
            dimensions: vec![
                dimension("time", n_time, self.time_attributes.clone()),
                dimension("altitude", n_alt, Attributes::new()),
                dimension("lat", n_lat, Attributes::new()),
                dimension("lon", n_lon, Attributes::new()),
            ],
            variable_attributes: self.variable_attributes.clone(),
        }
    }
}

/// Scripted misbehaviour for one endpoint URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Every call fails as unreachable.
    Unreachable,
    /// Every call waits forever.
    Hang,
    /// Range reads echo a longitude one degree off.
    WrongEcho,
}

/// [`ArrayTransport`] over in-memory grids.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    grids: HashMap<String, MemoryGrid>,
    failures: HashMap<String, Failure>,
    metadata_reads: AtomicUsize,
    range_reads: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grid(mut self, url: impl Into<String>, grid: MemoryGrid) -> Self {
        self.grids.insert(url.into(), grid);
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>, failure: Failure) -> Self {
        self.failures.insert(url.into(), failure);
        self
    }

    /// Number of `read_metadata` calls served.
    pub fn metadata_reads(&self) -> usize {
        self.metadata_reads.load(Ordering::SeqCst)
    }

    /// Number of `read_range` calls served.
    pub fn range_reads(&self) -> usize {
        self.range_reads.load(Ordering::SeqCst)
    }

    async fn grid(&self, url: &str) -> Result<&MemoryGrid> {
        match self.failures.get(url) {
            Some(Failure::Unreachable) => {
                return Err(DatasetError::unavailable(url, "connection refused"))
            }
            Some(Failure::Hang) => futures::future::pending::<()>().await,
            _ => {}
        }
        self.grids
            .get(url)
            .ok_or_else(|| DatasetError::unavailable(url, "404 not found"))
    }
}

#[async_trait]
impl ArrayTransport for MemoryTransport {
    async fn open_endpoint(&self, url: &str) -> Result<GridHandle> {
        Ok(self.grid(url).await?.handle(url))
    }

    async fn read_axis(&self, handle: &GridHandle, dimension: usize) -> Result<Vec<f64>> {
        Ok(self.grid(&handle.url).await?.axis(dimension))
    }

    async fn read_metadata(&self, handle: &GridHandle) -> Result<EndpointMetadata> {
        let grid = self.grid(&handle.url).await?;
        self.metadata_reads.fetch_add(1, Ordering::SeqCst);

        let mut variables = HashMap::new();
        variables.insert(grid.variable.clone(), grid.variable_attributes.clone());
        variables.insert("time".to_string(), grid.time_attributes.clone());
        let mut lon = Attributes::new();
        lon.set("units", "degrees_east");
        lon.set("point_spacing", "even");
        variables.insert("lon".to_string(), lon);
        let mut lat = Attributes::new();
        lat.set("units", "degrees_north");
        lat.set("coordsys", "geographic");
        variables.insert("lat".to_string(), lat);

        Ok(EndpointMetadata {
            global: grid.global.clone(),
            variables,
        })
    }

    async fn read_range(&self, handle: &GridHandle, ranges: &[IndexRange]) -> Result<RangeResponse> {
        let grid = self.grid(&handle.url).await?;
        self.range_reads.fetch_add(1, Ordering::SeqCst);

        let sizes = grid.dimension_sizes();
        if ranges.len() != sizes.len() {
            return Err(DatasetError::corrupt(format!("expected 4 ranges, got {}", ranges.len())));
        }
        for (range, &size) in ranges.iter().zip(&sizes) {
            if range.stop >= size {
                return Err(DatasetError::unavailable(
                    &handle.url,
                    format!("range {} exceeds dimension size {}", range, size),
                ));
            }
        }

        let counts: Vec<usize> = ranges.iter().map(IndexRange::count).collect();
        let total: usize = counts.iter().product();
        let mut data = Vec::with_capacity(total);
        let mut source = [0usize; 4];
        for flat in 0..total {
            let mut rest = flat;
            for d in (0..4).rev() {
                source[d] = ranges[d].index_at(rest % counts[d]);
                rest /= counts[d];
            }
            data.push(grid.values[row_major_offset(&sizes, &source)]);
        }

        let mut axes: Vec<Vec<f64>> = (0..4)
            .map(|d| {
                let axis = grid.axis(d);
                (0..counts[d]).map(|i| axis[ranges[d].index_at(i)]).collect()
            })
            .collect();
        if self.failures.get(&handle.url) == Some(&Failure::WrongEcho) {
            for lon in &mut axes[3] {
                *lon += 1.0;
            }
        }

        Ok(RangeResponse {
            data: TypedArray::Float32(data),
            axes,
        })
    }
}

/// [`CatalogSource`] serving one fixed document.
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    xml: String,
}

impl MemoryCatalog {
    pub fn new(xml: impl Into<String>) -> Self {
        Self { xml: xml.into() }
    }
}

#[async_trait]
impl CatalogSource for MemoryCatalog {
    async fn load(&self, _catalog_url: &str) -> Result<CatalogDocument> {
        CatalogDocument::parse(&self.xml)
    }
}
