//! Station-to-grid interpolation
//!
//! - Grid: the fixed-resolution output lattice over a bounding box
//! - KdTree: nearest-neighbour index over station coordinates
//! - SpatialCache: memoized (grid, index, k-nearest table) per input
//! - IDW: inverse distance weighting for continuous fields
//! - Resample: nearest/linear/cubic from a regular source grid, and the
//!   nearest-station path used for discrete fields

pub mod cache;
pub mod grid;
mod idw;
pub mod kdtree;
mod resample;

pub use cache::{SpatialCache, SpatialCacheEntry, SpatialKey};
pub use grid::GridTemplate;
pub use idw::{idw, Idw, IdwParams};
pub use kdtree::{KdTree, Neighbor};
pub use resample::{nearest_station, resample, Resample, SourceGrid};

use std::collections::BTreeSet;

/// Number of distinct finite values, compared bit-for-bit.
pub fn distinct_count(values: &[f64]) -> usize {
    values
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| normalize_zero(*v).to_bits())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Sorted distinct finite values.
pub fn distinct_values(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).map(normalize_zero).collect();
    out.sort_by(f64::total_cmp);
    out.dedup();
    out
}

#[inline]
fn normalize_zero(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// A field with at most `threshold` distinct values is treated as
/// categorical and must not be blended by IDW.
pub fn is_discrete(values: &[f64], threshold: usize) -> bool {
    distinct_count(values) <= threshold
}
