//! Error types for reference grid construction and caching.

use thiserror::Error;

/// Errors that can occur while building, merging or caching a [`GeoGrid`](crate::GeoGrid).
#[derive(Error, Debug)]
pub enum GeoGridError {
    /// Static reference data is malformed or missing.
    #[error("invalid reference data: {0}")]
    GeoData(String),

    /// Two grids do not share an identical header.
    #[error("domain mismatch on '{field}': {left} != {right}")]
    DomainMismatch {
        field: &'static str,
        left: String,
        right: String,
    },

    /// The grid (or the requested extent) has no cells.
    #[error("empty domain: {0}")]
    EmptyDomain(String),

    /// An ancillary cache file could not be decoded or encoded.
    #[error("ancillary cache error at {path}: {message}")]
    Cache { path: String, message: String },

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeoGridError {
    /// Create a GeoData error.
    pub fn geo_data(msg: impl Into<String>) -> Self {
        Self::GeoData(msg.into())
    }

    /// Create an EmptyDomain error.
    pub fn empty_domain(msg: impl Into<String>) -> Self {
        Self::EmptyDomain(msg.into())
    }

    /// Create a DomainMismatch error for a single header field.
    pub fn domain_mismatch(
        field: &'static str,
        left: impl ToString,
        right: impl ToString,
    ) -> Self {
        Self::DomainMismatch {
            field,
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    /// Create a Cache error.
    pub fn cache(path: impl AsRef<std::path::Path>, msg: impl Into<String>) -> Self {
        Self::Cache {
            path: path.as_ref().display().to_string(),
            message: msg.into(),
        }
    }
}

/// Result type for reference grid operations.
pub type Result<T> = std::result::Result<T, GeoGridError>;
