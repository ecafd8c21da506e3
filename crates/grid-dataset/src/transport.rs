//! Array-service collaborator interface.
//!
//! An [`ArrayTransport`] opens a remote grid endpoint, reads its coordinate
//! axes and metadata, and answers strided index-range queries. Wire formats
//! live behind this trait.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use num_traits::{NumCast, ToPrimitive};

use crate::attributes::Attributes;
use crate::error::{DatasetError, Result};

/// Inclusive, strided index range along one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRange {
    pub start: usize,
    pub stride: usize,
    pub stop: usize,
}

impl IndexRange {
    pub fn new(start: usize, stride: usize, stop: usize) -> Self {
        Self {
            start,
            stride: stride.max(1),
            stop: stop.max(start),
        }
    }

    /// A single index.
    pub fn single(index: usize) -> Self {
        Self::new(index, 1, index)
    }

    /// Number of indices selected.
    pub fn count(&self) -> usize {
        (self.stop - self.start) / self.stride + 1
    }

    /// Index selected at `position` within this range.
    pub fn index_at(&self, position: usize) -> usize {
        self.start + position * self.stride
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}:{}]", self.start, self.stride, self.stop)
    }
}

/// Grid values in their native element type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    Float64(Vec<f64>),
    Float32(Vec<f32>),
    Int32(Vec<i32>),
    Int16(Vec<i16>),
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
}

impl TypedArray {
    pub fn len(&self) -> usize {
        match self {
            Self::Float64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int8(v) => v.len(),
            Self::UInt8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen to `f64`, turning the missing-value sentinel into NaN.
    ///
    /// The sentinel is compared in the array's native type so that, for
    /// example, an `f32` fill value matches exactly.
    pub fn to_f64_masked(&self, missing_value: Option<f64>) -> Vec<f64> {
        match self {
            Self::Float64(v) => mask(v, missing_value),
            Self::Float32(v) => mask(v, missing_value),
            Self::Int32(v) => mask(v, missing_value),
            Self::Int16(v) => mask(v, missing_value),
            Self::Int8(v) => mask(v, missing_value),
            Self::UInt8(v) => mask(v, missing_value),
        }
    }
}

fn mask<T>(values: &[T], missing_value: Option<f64>) -> Vec<f64>
where
    T: Copy + PartialEq + NumCast + ToPrimitive,
{
    let sentinel: Option<T> = missing_value.and_then(|m| <T as NumCast>::from(m));
    values
        .iter()
        .map(|&v| {
            if Some(v) == sentinel {
                f64::NAN
            } else {
                v.to_f64().unwrap_or(f64::NAN)
            }
        })
        .collect()
}

/// One dimension of an endpoint's grid variable, in server order.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDimension {
    pub name: String,
    pub size: usize,
    /// Attributes of the coordinate variable sharing this dimension's name.
    pub attributes: Attributes,
}

/// Structural description of an opened endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct GridHandle {
    pub url: String,
    /// Name of the single grid variable served by the endpoint.
    pub variable: String,
    pub dimensions: Vec<GridDimension>,
    pub variable_attributes: Attributes,
}

/// Full descriptive metadata of an endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointMetadata {
    pub global: Attributes,
    /// Per-variable attributes keyed by variable name.
    pub variables: HashMap<String, Attributes>,
}

impl EndpointMetadata {
    pub fn variable(&self, name: &str) -> Attributes {
        self.variables.get(name).cloned().unwrap_or_default()
    }
}

/// Answer to a range query: the grid values (row-major over the requested
/// dimensions, in server order) plus the coordinate values echoed back for
/// each dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeResponse {
    pub data: TypedArray,
    pub axes: Vec<Vec<f64>>,
}

/// Remote array service.
#[async_trait]
pub trait ArrayTransport: Send + Sync {
    /// Open an endpoint; fails with `EndpointUnavailable` if unreachable.
    async fn open_endpoint(&self, url: &str) -> Result<GridHandle>;

    /// Read every value of one coordinate axis (by dimension position).
    async fn read_axis(&self, handle: &GridHandle, dimension: usize) -> Result<Vec<f64>>;

    /// Read global and per-variable attributes.
    async fn read_metadata(&self, handle: &GridHandle) -> Result<EndpointMetadata>;

    /// Read a strided hyperslab; `ranges` has one entry per dimension.
    async fn read_range(&self, handle: &GridHandle, ranges: &[IndexRange]) -> Result<RangeResponse>;
}

/// Run one remote call under a time bound; expiry counts as the endpoint
/// being unavailable.
pub async fn bounded<T, F>(url: &str, operation: &str, after: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(DatasetError::timed_out(url, operation, after)),
    }
}

/// Semantic role of a grid dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRole {
    Time,
    Depth,
    Latitude,
    Longitude,
}

impl AxisRole {
    /// Classify a dimension from its coordinate attributes, falling back to
    /// its name.
    pub fn classify(dimension: &GridDimension) -> Option<AxisRole> {
        let attrs = &dimension.attributes;
        if let Some(axis) = attrs.get_str("axis") {
            match axis.trim().to_ascii_uppercase().as_str() {
                "T" => return Some(Self::Time),
                "Z" => return Some(Self::Depth),
                "Y" => return Some(Self::Latitude),
                "X" => return Some(Self::Longitude),
                _ => {}
            }
        }
        if let Some(kind) = attrs.get_str("_CoordinateAxisType") {
            match kind.trim() {
                "Time" => return Some(Self::Time),
                "Height" | "GeoZ" | "Pressure" => return Some(Self::Depth),
                "Lat" => return Some(Self::Latitude),
                "Lon" => return Some(Self::Longitude),
                _ => {}
            }
        }
        match dimension.name.to_ascii_lowercase().as_str() {
            "time" | "t" => Some(Self::Time),
            "altitude" | "depth" | "lev" | "level" | "z" | "height" => Some(Self::Depth),
            "lat" | "latitude" | "y" => Some(Self::Latitude),
            "lon" | "longitude" | "x" => Some(Self::Longitude),
            _ => None,
        }
    }
}

/// Server dimension position of each axis role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionOrder {
    pub time: usize,
    pub depth: usize,
    pub latitude: usize,
    pub longitude: usize,
}

impl DimensionOrder {
    /// Map every role to a dimension; all four must resolve exactly once.
    pub fn resolve(handle: &GridHandle) -> Result<Self> {
        if handle.dimensions.len() != 4 {
            return Err(DatasetError::unavailable(
                &handle.url,
                format!(
                    "grid '{}' has {} dimensions, expected time, depth, lat and lon",
                    handle.variable,
                    handle.dimensions.len()
                ),
            ));
        }

        let (mut time, mut depth, mut latitude, mut longitude) = (None, None, None, None);
        for (position, dimension) in handle.dimensions.iter().enumerate() {
            let slot = match AxisRole::classify(dimension) {
                Some(AxisRole::Time) => &mut time,
                Some(AxisRole::Depth) => &mut depth,
                Some(AxisRole::Latitude) => &mut latitude,
                Some(AxisRole::Longitude) => &mut longitude,
                None => continue,
            };
            if slot.replace(position).is_some() {
                return Err(DatasetError::unavailable(
                    &handle.url,
                    format!("dimension '{}' duplicates an axis role", dimension.name),
                ));
            }
        }

        match (time, depth, latitude, longitude) {
            (Some(time), Some(depth), Some(latitude), Some(longitude)) => Ok(Self {
                time,
                depth,
                latitude,
                longitude,
            }),
            _ => Err(DatasetError::unavailable(
                &handle.url,
                format!(
                    "grid '{}' lacks one of the time, depth, lat and lon dimensions",
                    handle.variable
                ),
            )),
        }
    }

    /// Assemble per-dimension ranges in server order.
    pub fn ranges(
        &self,
        time: IndexRange,
        depth: IndexRange,
        latitude: IndexRange,
        longitude: IndexRange,
    ) -> [IndexRange; 4] {
        let mut ranges = [IndexRange::single(0); 4];
        ranges[self.time] = time;
        ranges[self.depth] = depth;
        ranges[self.latitude] = latitude;
        ranges[self.longitude] = longitude;
        ranges
    }
}
