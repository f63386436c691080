//! Error types for regridding.

use geo_grid::GeoGridError;
use thiserror::Error;

/// Errors that can occur while indexing, interpolating or filtering.
#[derive(Error, Debug)]
pub enum RegridError {
    /// Reference grid construction, merge or cache failure.
    #[error(transparent)]
    Grid(#[from] GeoGridError),

    /// The target grid or the source sample set has no elements.
    #[error("empty domain: {0}")]
    EmptyDomain(String),

    /// Every source sample was filtered out before interpolation.
    #[error("no valid samples: {0}")]
    NoValidSamples(String),

    /// Invalid or missing configuration (radius, method, timeout).
    #[error("configuration error: {0}")]
    Config(String),

    /// Parallel arrays disagree in length.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A precomputed index does not fit the values it is applied to.
    #[error("interpolation index mismatch: {0}")]
    IndexMismatch(String),

    /// The external gridding command exited unsuccessfully.
    #[error("command '{command}' failed with {status}: {stderr}")]
    ExternalProcess {
        command: String,
        status: String,
        stderr: String,
    },

    /// The external gridding command exceeded its wait budget and was killed.
    #[error("command '{command}' killed after {seconds}s")]
    ProcessTimeout { command: String, seconds: u64 },

    /// A lookup-table entry maps onto a range rather than a scalar.
    #[error("range remap for flag '{0}' is not supported")]
    UnsupportedRangeRemap(String),

    /// Malformed attribute or conventions content.
    #[error("invalid attribute: {0}")]
    Attribute(String),

    /// A YAML document or binary index could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegridError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Create an Attribute error.
    pub fn attribute(msg: impl Into<String>) -> Self {
        Self::Attribute(msg.into())
    }

    /// Create an IndexMismatch error.
    pub fn index_mismatch(msg: impl Into<String>) -> Self {
        Self::IndexMismatch(msg.into())
    }

    /// True for the degenerate-input variants a time-step loop can skip over.
    pub fn is_degenerate_input(&self) -> bool {
        matches!(
            self,
            Self::EmptyDomain(_) | Self::NoValidSamples(_) | Self::Grid(GeoGridError::EmptyDomain(_))
        )
    }
}

impl From<serde_yaml::Error> for RegridError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for regridding operations.
pub type Result<T> = std::result::Result<T, RegridError>;
