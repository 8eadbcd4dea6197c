//! # Staklim Core
//!
//! Core types shared by the Staklim station-to-grid mapping library.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid holding an interpolated field
//! - `GeoTransform`: affine transformation for georeferencing
//! - `StationTable`: station observations (lon, lat, numeric columns)
//! - `RegionSet`: administrative polygons used for clipping and counting
//! - Run configuration and the error taxonomy
//! - Algorithm trait for consistent API

pub mod config;
pub mod error;
pub mod raster;
pub mod station;
pub mod vector;

pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use station::{LocatedStations, StationInput, StationObservation, StationTable};
pub use vector::{AdminUnit, BoundingBox, RegionSet};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{FieldKind, InterpolationConfig, ProductKind, RunConfig, Timescale};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::station::{LocatedStations, StationInput, StationTable};
    pub use crate::vector::{AdminUnit, BoundingBox, RegionSet};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in Staklim.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
