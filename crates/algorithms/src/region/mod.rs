//! Administrative regions
//!
//! - **bins**: category bin tables per mapped field
//! - **clip**: restrict stations and rasters to a region
//! - **aggregate**: join stations to units and count per category
//! - **basemap**: select units by name, memoized in a [`RegionCache`]

pub mod aggregate;
pub mod basemap;
pub mod bins;
pub mod clip;

pub use aggregate::{
    assign_units, count_by_region, count_by_value, count_points, count_values_by_region, AdminLevel,
    RegionCount, RegionCounts,
};
pub use basemap::{format_title, select_basemap, Basemap, RegionCache};
pub use bins::{CategoryBin, CategoryBinTable};
pub use clip::{clip_points, clip_points_or_fallback, clip_raster, ClippedStations};
