//! Error types for dataset discovery and queries.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while resolving a catalog or answering a query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// The catalog is unusable (e.g. no array-service descriptor). Aborts discovery.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A remote endpoint could not be reached or timed out.
    #[error("endpoint unavailable: {url}: {message}")]
    EndpointUnavailable { url: String, message: String },

    /// Unknown period label or a timestamp missing from the temporal index.
    #[error("not found: {0}")]
    NotFound(String),

    /// The spatial request cannot be reconciled with the endpoint's axes.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// The transport returned data inconsistent with what was requested.
    #[error("corrupt response: {0}")]
    CorruptResponse(String),

    /// Query bounds could not be parsed or are inconsistent.
    #[error("invalid range: {0}")]
    InvalidRange(String),
}

impl DatasetError {
    /// Create a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an EndpointUnavailable error.
    pub fn unavailable(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::EndpointUnavailable {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create an EndpointUnavailable error for a call that hit its time bound.
    pub fn timed_out(url: impl Into<String>, operation: &str, after: Duration) -> Self {
        Self::EndpointUnavailable {
            url: url.into(),
            message: format!("{} timed out after {}ms", operation, after.as_millis()),
        }
    }

    /// Create a NotFound error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an OutOfRange error.
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    /// Create a CorruptResponse error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptResponse(msg.into())
    }

    /// Create an InvalidRange error.
    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRange(msg.into())
    }
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
