//! OPeNDAP (DAP2) access for grid datasets.
//!
//! Implements the `grid-dataset` collaborator traits over HTTP:
//!
//! ```text
//! ThreddsCatalog ──► catalog.xml ──► CatalogDocument
//!
//! OpendapClient
//!   open_endpoint ──► <url>.dds + <url>.das   (cached per url)
//!   read_axis     ──► <url>.ascii?lat
//!   read_range    ──► <url>.ascii?sst[0:1:0][0:1:0][10:2:20][5:1:9]
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use grid_dataset::{DatasetConfig, GridDataset};
//! use opendap_client::{OpendapClient, ThreddsCatalog};
//!
//! let client = OpendapClient::new(Duration::from_secs(30))?;
//! let catalog = ThreddsCatalog::new(client.http_client());
//! let config = DatasetConfig::new("MOchla", "https://host/thredds/catalog/satellite/MO/chla/catalog.xml");
//! let dataset = GridDataset::open(config, &catalog, Arc::new(client)).await?;
//! ```

pub mod ascii;
pub mod catalog;
pub mod client;
pub mod das;
pub mod dds;
pub mod error;
mod lexer;

pub use ascii::{AsciiResponse, AsciiSection};
pub use catalog::ThreddsCatalog;
pub use client::{hyperslab, OpendapClient};
pub use das::Das;
pub use dds::{ArrayDeclaration, DapType, Dds};
pub use error::{OpendapError, OpendapResult};
