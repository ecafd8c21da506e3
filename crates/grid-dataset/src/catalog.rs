//! THREDDS-style catalog documents.
//!
//! A catalog names the array (OPeNDAP) service base path and lists dataset
//! entries whose `urlPath` ends in a time-period token, e.g.
//!
//! ```text
//! <catalog>
//!   <service name="all" serviceType="Compound" base="">
//!     <service name="ncdods" serviceType="OPENDAP" base="/thredds/dodsC/"/>
//!   </service>
//!   <dataset name="Chlorophyll, 8 day" urlPath="satellite/MO/k490/8day"/>
//! </catalog>
//! ```

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{DatasetError, Result};

const ARRAY_SERVICE_TYPE: &str = "OPENDAP";

/// One dataset row discovered in a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetCatalogEntry {
    /// Server-relative path, e.g. `satellite/MO/k490/8day`.
    pub url_path: String,
    pub name: Option<String>,
}

impl DatasetCatalogEntry {
    pub fn new(url_path: impl Into<String>) -> Self {
        Self {
            url_path: url_path.into(),
            name: None,
        }
    }

    /// Trailing path segment identifying the aggregation period.
    pub fn period_token(&self) -> &str {
        let path = self.url_path.as_str();
        match path.rfind('/').or_else(|| path.rfind('\\')) {
            Some(po) => &path[po + 1..],
            None => path,
        }
    }
}

/// A parsed catalog document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDocument {
    service_base: Option<String>,
    entries: Vec<DatasetCatalogEntry>,
}

impl CatalogDocument {
    pub fn new(service_base: Option<String>, entries: Vec<DatasetCatalogEntry>) -> Self {
        Self {
            service_base,
            entries,
        }
    }

    /// Parse catalog XML.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut document = CatalogDocument::default();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"service" => {
                        let service_type = attribute(&e, b"serviceType")?;
                        let base = attribute(&e, b"base")?;
                        let is_array_service = service_type
                            .map_or(false, |t| t.eq_ignore_ascii_case(ARRAY_SERVICE_TYPE));
                        if is_array_service && document.service_base.is_none() {
                            document.service_base = base;
                        }
                    }
                    b"dataset" => {
                        if let Some(url_path) = attribute(&e, b"urlPath")? {
                            document.entries.push(DatasetCatalogEntry {
                                url_path,
                                name: attribute(&e, b"name")?,
                            });
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(DatasetError::configuration(format!(
                        "malformed catalog at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        Ok(document)
    }

    /// Dataset entries in document order.
    pub fn list_dataset_entries(&self) -> &[DatasetCatalogEntry] {
        &self.entries
    }

    /// Base path of the array service; missing is a configuration error.
    pub fn array_service_base_path(&self) -> Result<&str> {
        self.service_base.as_deref().ok_or_else(|| {
            DatasetError::configuration(format!(
                "catalog has no {} service with a base attribute",
                ARRAY_SERVICE_TYPE
            ))
        })
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| DatasetError::configuration(format!("bad catalog attribute: {}", e)))?;
        if attr.key.local_name().as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| DatasetError::configuration(format!("bad catalog attribute: {}", e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Build an endpoint address from the catalog location, the service base
/// path and an entry's `urlPath`.
///
/// A relative service base is resolved against the catalog's origin
/// (scheme and authority); an absolute one is used as-is.
pub fn endpoint_url(catalog_url: &str, service_base: &str, url_path: &str) -> Result<String> {
    let base = if service_base.contains("://") {
        service_base.to_string()
    } else {
        let origin = origin(catalog_url).ok_or_else(|| {
            DatasetError::configuration(format!("catalog url '{}' has no origin", catalog_url))
        })?;
        format!("{}/{}", origin, service_base.trim_start_matches('/'))
    };

    match (base.ends_with('/'), url_path.starts_with('/')) {
        (true, true) => Ok(format!("{}{}", base, &url_path[1..])),
        (false, false) => Ok(format!("{}/{}", base, url_path)),
        _ => Ok(format!("{}{}", base, url_path)),
    }
}

fn origin(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")? + 3;
    let path_start = url[scheme_end..]
        .find('/')
        .map_or(url.len(), |po| scheme_end + po);
    (path_start > scheme_end).then(|| &url[..path_start])
}

/// Source of catalog documents.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch and parse the catalog at `catalog_url`.
    async fn load(&self, catalog_url: &str) -> Result<CatalogDocument>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns="http://www.unidata.ucar.edu/namespaces/thredds/InvCatalog/v1.0" name="k490">
  <service name="all" serviceType="Compound" base="">
    <service name="wcs" serviceType="WCS" base="/thredds/wcs/"/>
    <service name="ncdods" serviceType="OPENDAP" base="/thredds/dodsC/"/>
  </service>
  <dataset name="Diffuse Attenuation K490">
    <dataset name="Single Scans" ID="k490hday" urlPath="satellite/MO/k490/hday"/>
    <dataset name="8 day &amp; more" urlPath="satellite/MO/k490/8day">
      <serviceName>all</serviceName>
    </dataset>
  </dataset>
</catalog>"#;

    #[test]
    fn test_parse_catalog() {
        let doc = CatalogDocument::parse(CATALOG).unwrap();
        assert_eq!(doc.array_service_base_path().unwrap(), "/thredds/dodsC/");

        let entries = doc.list_dataset_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url_path, "satellite/MO/k490/hday");
        assert_eq!(entries[0].period_token(), "hday");
        assert_eq!(entries[1].name.as_deref(), Some("8 day & more"));
        assert_eq!(entries[1].period_token(), "8day");
    }

    #[test]
    fn test_missing_service_is_configuration_error() {
        let doc = CatalogDocument::parse(r#"<catalog><dataset urlPath="a/1day"/></catalog>"#).unwrap();
        assert_eq!(doc.list_dataset_entries().len(), 1);
        assert!(matches!(
            doc.array_service_base_path(),
            Err(DatasetError::Configuration(_))
        ));
    }

    #[test]
    fn test_malformed_catalog() {
        let err = CatalogDocument::parse("<catalog><dataset urlPath=\"x\"></catalog>").unwrap_err();
        assert!(matches!(err, DatasetError::Configuration(_)));
    }

    #[test]
    fn test_period_token() {
        assert_eq!(DatasetCatalogEntry::new("a\\b\\3day").period_token(), "3day");
        assert_eq!(DatasetCatalogEntry::new("mday").period_token(), "mday");
    }

    #[test]
    fn test_endpoint_url() {
        let url = endpoint_url(
            "https://oceanwatch.example.gov/thredds/Satellite/aggregsatMO/k490/catalog.xml",
            "/thredds/dodsC/",
            "satellite/MO/k490/hday",
        )
        .unwrap();
        assert_eq!(url, "https://oceanwatch.example.gov/thredds/dodsC/satellite/MO/k490/hday");

        let url = endpoint_url("http://host:8080/catalog.xml", "http://other/dods", "a/1day").unwrap();
        assert_eq!(url, "http://other/dods/a/1day");

        assert!(endpoint_url("catalog.xml", "/dods/", "a").is_err());
    }
}
