//! # Staklim Algorithms
//!
//! Station-to-grid mapping for Staklim.
//!
//! ## Modules
//!
//! - **interpolation**: output grid, spatial cache, IDW, grid resampling
//! - **region**: boundary clipping, per-region counts, basemap selection
//! - **classification**: ordinal rainfall categories
//! - **verification**: forecast/analysis matching, contingency tables, skill scores
//! - **pipeline**: `MapEngine`, which ties the above together

pub mod classification;
pub mod interpolation;
mod maybe_rayon;
pub mod pipeline;
pub mod region;
pub mod verification;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{categorize_ch, categorize_index, RawValue};
    pub use crate::interpolation::{
        idw, nearest_station, resample, GridTemplate, Idw, IdwParams, Resample, SourceGrid, SpatialCache,
        SpatialCacheEntry,
    };
    pub use crate::pipeline::{
        InterpolatedField, InterpolationPath, InterpolationResult, MapEngine, StationSlot, StationStore,
        VerificationReport,
    };
    pub use crate::region::{
        clip_points, clip_raster, count_by_region, count_by_value, select_basemap, AdminLevel, Basemap,
        CategoryBinTable, RegionCache, RegionCount, RegionCounts,
    };
    pub use crate::verification::{
        calculate_metrics, match_stations, ContingencyTable, Margin, VerificationMetrics, VerificationScheme,
    };
    pub use staklim_core::prelude::*;
}
