//! Descriptive metadata shared by every period endpoint of a dataset.

use serde::Serialize;

use crate::attributes::Attributes;
use crate::transport::{DimensionOrder, EndpointMetadata, GridHandle};

/// Units shown when the source declares none.
pub const UNKNOWN_UNITS: &str = "(unknown units)";

const UNITS_SENTENCES: [&str; 2] = [" The units of the data are ", " Units are "];

/// Title, units and provenance captured once during discovery, plus the raw
/// attribute sets they were derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetMetadata {
    pub title: String,
    pub summary: String,
    pub units: String,
    pub courtesy: Option<String>,
    pub keywords: Option<String>,
    pub references: Option<String>,
    /// `(min, max)` hint for the data values.
    pub value_range: Option<(f64, f64)>,

    pub global: Attributes,
    pub longitude: Attributes,
    pub latitude: Attributes,
    pub depth: Attributes,
    pub time: Attributes,
    pub data: Attributes,
}

impl DatasetMetadata {
    /// Derive from the full metadata of one opened endpoint.
    pub fn from_endpoint(
        handle: &GridHandle,
        order: &DimensionOrder,
        metadata: &EndpointMetadata,
    ) -> Self {
        let global = metadata.global.clone();
        let dimension_attributes = |position: usize| {
            handle
                .dimensions
                .get(position)
                .map(|d| metadata.variables.get(&d.name).cloned().unwrap_or_else(|| d.attributes.clone()))
                .unwrap_or_default()
        };

        let mut data = metadata
            .variables
            .get(&handle.variable)
            .cloned()
            .unwrap_or_else(|| handle.variable_attributes.clone());

        let mut time = dimension_attributes(order.time);
        time.set("long_name", "Centered Time");

        let title = global
            .get_str("title")
            .or_else(|| data.get_str("long_name"))
            .unwrap_or(handle.variable.as_str())
            .trim()
            .to_string();

        let summary = strip_units_sentence(global.get_str("summary").unwrap_or_default());

        let units = data
            .get_str("units")
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(UNKNOWN_UNITS)
            .to_string();
        data.set("units", units.clone());

        let courtesy = global
            .get_str("contributor_name")
            .or_else(|| global.get_str("creator_name"))
            .map(str::to_string);

        let value_range = value_range(&data);

        Self {
            title,
            summary,
            units,
            courtesy,
            keywords: global.get_str("keywords").map(str::to_string),
            references: global.get_str("references").map(str::to_string),
            value_range,
            longitude: dimension_attributes(order.longitude),
            latitude: dimension_attributes(order.latitude),
            depth: dimension_attributes(order.depth),
            time,
            data,
            global,
        }
    }
}

fn value_range(data: &Attributes) -> Option<(f64, f64)> {
    if let Some(range) = data.get("actual_range").map(|v| v.to_f64_vec()) {
        if let [min, max] = range[..] {
            return Some((min, max));
        }
    }
    match (data.get_f64("valid_min"), data.get_f64("valid_max")) {
        (Some(min), Some(max)) => Some((min, max)),
        _ => None,
    }
}

/// Drop a trailing "The units of the data are ..." style sentence.
pub fn strip_units_sentence(summary: &str) -> String {
    let mut summary = summary.trim().to_string();
    for marker in UNITS_SENTENCES {
        if let Some(start) = summary.find(marker) {
            let rest = &summary[start + marker.len()..];
            let end = match rest.find(". ") {
                Some(po) => start + marker.len() + po + 1,
                None => summary.len(),
            };
            summary.replace_range(start..end, "");
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::GridDimension;
    use std::collections::HashMap;

    fn handle() -> GridHandle {
        let dim = |name: &str| GridDimension {
            name: name.to_string(),
            size: 1,
            attributes: Attributes::new(),
        };
        GridHandle {
            url: "http://host/thredds/dodsC/sst/8day".to_string(),
            variable: "sst".to_string(),
            dimensions: vec![dim("time"), dim("altitude"), dim("lat"), dim("lon")],
            variable_attributes: Attributes::new(),
        }
    }

    #[test]
    fn test_strip_units_sentence() {
        assert_eq!(
            strip_units_sentence("SST from AVHRR. The units of the data are degree_C. More text."),
            "SST from AVHRR. More text."
        );
        assert_eq!(
            strip_units_sentence("Chlorophyll a. Units are mg m-3."),
            "Chlorophyll a."
        );
        assert_eq!(strip_units_sentence("Plain."), "Plain.");
    }

    #[test]
    fn test_from_endpoint() {
        let mut global = Attributes::new();
        global.set("title", "SST, NOAA POES AVHRR");
        global.set("summary", "Sea surface temperature. Units are degree_C.");
        global.set("creator_name", "NOAA CoastWatch");

        let mut sst = Attributes::new();
        sst.set("actual_range", vec![-2.0, 35.0]);
        let mut time = Attributes::new();
        time.set("long_name", "End Time");

        let mut variables = HashMap::new();
        variables.insert("sst".to_string(), sst);
        variables.insert("time".to_string(), time);
        let metadata = EndpointMetadata { global, variables };

        let order = DimensionOrder { time: 0, depth: 1, latitude: 2, longitude: 3 };
        let meta = DatasetMetadata::from_endpoint(&handle(), &order, &metadata);

        assert_eq!(meta.title, "SST, NOAA POES AVHRR");
        assert_eq!(meta.summary, "Sea surface temperature.");
        assert_eq!(meta.units, UNKNOWN_UNITS);
        assert_eq!(meta.data.get_str("units"), Some(UNKNOWN_UNITS));
        assert_eq!(meta.courtesy.as_deref(), Some("NOAA CoastWatch"));
        assert_eq!(meta.value_range, Some((-2.0, 35.0)));
        assert_eq!(meta.time.get_str("long_name"), Some("Centered Time"));
        assert!(meta.longitude.is_empty());
    }
}
