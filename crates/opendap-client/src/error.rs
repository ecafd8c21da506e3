//! Error types for OPeNDAP access.

use grid_dataset::DatasetError;
use thiserror::Error;

/// Result type for OPeNDAP operations.
pub type OpendapResult<T> = Result<T, OpendapError>;

/// Errors raised while talking to an OPeNDAP server.
#[derive(Error, Debug)]
pub enum OpendapError {
    /// Transport-level HTTP failure (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("server returned status {status} for {url}")]
    Status { url: String, status: u16 },

    /// Response body could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// Response parsed but lacks a required variable or section
    #[error("missing required data: {0}")]
    MissingData(String),
}

impl OpendapError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn missing(msg: impl Into<String>) -> Self {
        Self::MissingData(msg.into())
    }

    /// Map onto the dataset error taxonomy for the endpoint at `url`.
    pub fn into_dataset_error(self, url: &str) -> DatasetError {
        match self {
            Self::Http(e) => DatasetError::unavailable(url, e.to_string()),
            Self::Status { status, .. } => {
                DatasetError::unavailable(url, format!("server returned status {}", status))
            }
            Self::Parse(msg) | Self::MissingData(msg) => {
                DatasetError::corrupt(format!("{}: {}", url, msg))
            }
        }
    }
}
