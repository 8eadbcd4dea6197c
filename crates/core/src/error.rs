//! Error types for Staklim

use thiserror::Error;

/// Main error type for Staklim operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required input was never configured (no station table, unknown
    /// value column, empty region query).
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("insufficient stations: {required} required, {available} available")]
    InsufficientStations { required: usize, available: usize },

    /// Verification has no meaningful score. Never coerced to a number.
    #[error("degenerate verification: {0}")]
    DegenerateVerification(String),

    /// A cached entry did not belong to the key it was looked up under.
    /// This is a programming defect, not a recoverable condition.
    #[error("spatial cache key mismatch: expected {expected}, found {found}")]
    CacheKeyMismatch { expected: String, found: String },

    #[error("degenerate bounding box: ({min_x}, {min_y}, {max_x}, {max_y})")]
    DegenerateBounds {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },

    #[error("no administrative unit matches {0}")]
    RegionNotFound(String),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::Configuration`].
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// True for the conditions a caller may recover from by retrying with
    /// different input (e.g. the unclipped station set).
    pub fn is_insufficient_stations(&self) -> bool {
        matches!(self, Error::InsufficientStations { .. })
    }
}

/// Result type alias for Staklim operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_insufficient_stations() {
        let e = Error::InsufficientStations { required: 6, available: 2 };
        assert_eq!(e.to_string(), "insufficient stations: 6 required, 2 available");
        assert!(e.is_insufficient_stations());
    }

    #[test]
    fn test_config_shorthand() {
        let e = Error::config("forecast table not set");
        assert!(matches!(e, Error::Configuration(_)));
        assert!(!e.is_insufficient_stations());
    }
}
