//! Inverse Distance Weighting (IDW) interpolation
//!
//! Estimates every grid node as a weighted average of its k nearest
//! stations, taken from a [`SpatialCacheEntry`]:
//!
//! ```text
//! z = Σ(wj * zj) / Σ(wj)
//! where wj = 1 / (dj^p + ε)
//! ```
//!
//! ε keeps the weight finite when a node coincides with a station; that
//! station's weight then dwarfs all others and the node takes its value.
//!
//! Reference:
//! Shepard, D. (1968). A two-dimensional interpolation function for
//! irregularly-spaced data. ACM National Conference.

use std::sync::Arc;

use staklim_core::config::InterpolationConfig;
use staklim_core::raster::Raster;
use staklim_core::{Algorithm, Error, Result};

use super::cache::SpatialCacheEntry;
use crate::maybe_rayon::*;

/// Parameters for IDW interpolation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdwParams {
    /// Power parameter (default: 2.0).
    /// Higher values give more weight to nearby stations.
    pub power: f64,
    /// Added to `d^power` (default: 1e-10)
    pub epsilon: f64,
}

impl Default for IdwParams {
    fn default() -> Self {
        Self {
            power: 2.0,
            epsilon: 1e-10,
        }
    }
}

impl From<&InterpolationConfig> for IdwParams {
    fn from(cfg: &InterpolationConfig) -> Self {
        Self {
            power: cfg.power,
            epsilon: cfg.epsilon,
        }
    }
}

/// IDW as an [`Algorithm`]: input is a cache entry and the station
/// values aligned with the coordinates it was built from.
#[derive(Debug, Clone, Default)]
pub struct Idw;

impl Algorithm for Idw {
    type Input = (Arc<SpatialCacheEntry>, Vec<f64>);
    type Output = Raster<f64>;
    type Params = IdwParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "IDW"
    }

    fn description(&self) -> &'static str {
        "Inverse distance weighting over the k nearest stations"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (entry, values) = input;
        idw(&entry, &values, params)
    }
}

/// Interpolate station `values` onto the entry's grid.
///
/// `values[i]` belongs to station `i` of the coordinate arrays the entry
/// was built from. Every node is computed independently, so the result is
/// the same with or without the `parallel` feature.
pub fn idw(entry: &SpatialCacheEntry, values: &[f64], params: IdwParams) -> Result<Raster<f64>> {
    if values.len() != entry.station_count() {
        return Err(Error::SizeMismatch {
            er: entry.station_count(),
            ec: 1,
            ar: values.len(),
            ac: 1,
        });
    }
    if !(params.power.is_finite() && params.power >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "power",
            value: params.power.to_string(),
            reason: "must be a non-negative finite number".into(),
        });
    }
    if params.epsilon.is_nan() || params.epsilon <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "epsilon",
            value: params.epsilon.to_string(),
            reason: "must be positive".into(),
        });
    }

    let grid = entry.grid();
    let distances = entry.distances();
    let indices = entry.indices();
    let (rows, cols) = grid.shape();
    let k = entry.neighbors();
    let IdwParams { power, epsilon } = params;

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let node = row * cols + col;
                let mut sum_w = 0.0;
                let mut sum_wz = 0.0;

                for j in 0..k {
                    let d = distances[[node, j]];
                    let w = 1.0 / (d.powf(power) + epsilon);
                    sum_w += w;
                    sum_wz += w * values[indices[[node, j]]];
                }

                if sum_w > 0.0 {
                    *out = sum_wz / sum_w;
                }
            }

            row_data
        })
        .collect();

    grid.raster_from_vec(data)
}
