//! Grid resampling
//!
//! For station sets that already sit on a regular lon/lat lattice (model
//! output exported point by point). The lattice is rebuilt from the unique
//! station coordinates, empty lattice cells take the value of their
//! nearest filled cell, and the result is resampled onto the output grid
//! with nearest, bilinear or cubic (Catmull-Rom) interpolation. Output
//! nodes outside the source extent are NaN.
//!
//! [`nearest_station`] is the categorical path: every node takes the value
//! of its nearest station, so no value outside the input set can appear.

use std::sync::Arc;

use ndarray::Array2;
use staklim_core::config::ResampleMethod;
use staklim_core::raster::Raster;
use staklim_core::{Algorithm, Error, Result};
use tracing::debug;

use super::cache::SpatialCacheEntry;
use super::grid::GridTemplate;
use super::kdtree::KdTree;
use crate::maybe_rayon::*;

/// Values scattered onto the regular lattice implied by the stations.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceGrid {
    /// Unique longitudes, ascending
    x: Vec<f64>,
    /// Unique latitudes, ascending
    y: Vec<f64>,
    /// `(y.len(), x.len())`, row 0 = southernmost latitude
    values: Array2<f64>,
    filled: usize,
}

fn unique_sorted(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    out.sort_by(f64::total_cmp);
    out.dedup();
    out
}

impl SourceGrid {
    /// Rebuild the lattice and scatter `values` onto it. Cells without a
    /// finite observation are filled from the nearest observed cell.
    pub fn from_stations(lons: &[f64], lats: &[f64], values: &[f64]) -> Result<Self> {
        if lons.len() != lats.len() || lons.len() != values.len() {
            return Err(Error::SizeMismatch {
                er: lons.len(),
                ec: 3,
                ar: lats.len().min(values.len()),
                ac: 3,
            });
        }

        let x = unique_sorted(lons);
        let y = unique_sorted(lats);
        let mut grid = Array2::from_elem((y.len(), x.len()), f64::NAN);

        for ((&lon, &lat), &v) in lons.iter().zip(lats).zip(values) {
            if !(lon.is_finite() && lat.is_finite() && v.is_finite()) {
                continue;
            }
            if let (Ok(col), Ok(row)) = (
                x.binary_search_by(|a| a.total_cmp(&lon)),
                y.binary_search_by(|a| a.total_cmp(&lat)),
            ) {
                grid[[row, col]] = v;
            }
        }

        let filled = fill_gaps(&mut grid)?;
        debug!(cols = x.len(), rows = y.len(), filled, "source grid rebuilt");

        Ok(Self { x, y, values: grid, filled })
    }

    pub fn x_axis(&self) -> &[f64] {
        &self.x
    }

    pub fn y_axis(&self) -> &[f64] {
        &self.y
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of cells that were gap-filled.
    pub fn filled(&self) -> usize {
        self.filled
    }

    fn contains(&self, px: f64, py: f64) -> bool {
        match (self.x.first(), self.x.last(), self.y.first(), self.y.last()) {
            (Some(&x0), Some(&x1), Some(&y0), Some(&y1)) => px >= x0 && px <= x1 && py >= y0 && py <= y1,
            _ => false,
        }
    }

    fn at(&self, row: isize, col: isize) -> f64 {
        let r = row.clamp(0, self.y.len() as isize - 1) as usize;
        let c = col.clamp(0, self.x.len() as isize - 1) as usize;
        self.values[[r, c]]
    }

    fn sample(&self, px: f64, py: f64, method: ResampleMethod) -> f64 {
        if !self.contains(px, py) {
            return f64::NAN;
        }
        let (i, tx) = bracket(&self.x, px);
        let (j, ty) = bracket(&self.y, py);
        let (i, j) = (i as isize, j as isize);

        match method {
            ResampleMethod::Nearest => {
                let c = if tx <= 0.5 { i } else { i + 1 };
                let r = if ty <= 0.5 { j } else { j + 1 };
                self.at(r, c)
            }
            ResampleMethod::Linear => {
                let lower = lerp(self.at(j, i), self.at(j, i + 1), tx);
                let upper = lerp(self.at(j + 1, i), self.at(j + 1, i + 1), tx);
                lerp(lower, upper, ty)
            }
            ResampleMethod::Cubic => {
                let mut rows = [0.0; 4];
                for (k, r) in (j - 1..=j + 2).enumerate() {
                    rows[k] = catmull_rom(
                        [self.at(r, i - 1), self.at(r, i), self.at(r, i + 1), self.at(r, i + 2)],
                        tx,
                    );
                }
                catmull_rom(rows, ty)
            }
        }
    }
}

/// Replace NaN cells with the value of the nearest non-NaN cell in index
/// space. Returns the number of filled cells.
fn fill_gaps(grid: &mut Array2<f64>) -> Result<usize> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut vals = Vec::new();
    let mut gaps = Vec::new();

    for ((row, col), &v) in grid.indexed_iter() {
        if v.is_nan() {
            gaps.push((row, col));
        } else {
            xs.push(col as f64);
            ys.push(row as f64);
            vals.push(v);
        }
    }

    if vals.is_empty() {
        return Err(Error::InsufficientStations { required: 1, available: 0 });
    }
    if gaps.is_empty() {
        return Ok(0);
    }

    let tree = KdTree::build(&xs, &ys);
    for &(row, col) in &gaps {
        if let Some(nb) = tree.nearest(col as f64, row as f64) {
            grid[[row, col]] = vals[nb.index];
        }
    }
    Ok(gaps.len())
}

/// Interval `i` with `axis[i] <= p <= axis[i + 1]` and the fraction of
/// the way through it. Axis has at least two entries.
fn bracket(axis: &[f64], p: f64) -> (usize, f64) {
    let last = axis.len() - 2;
    let i = axis.partition_point(|&a| a <= p).saturating_sub(1).min(last);
    let span = axis[i + 1] - axis[i];
    (i, ((p - axis[i]) / span).clamp(0.0, 1.0))
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[inline]
fn catmull_rom(p: [f64; 4], t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * (2.0 * p[1]
        + (p[2] - p[0]) * t
        + (2.0 * p[0] - 5.0 * p[1] + 4.0 * p[2] - p[3]) * t2
        + (3.0 * p[1] - p[0] - 3.0 * p[2] + p[3]) * t3)
}

/// Resample a source lattice onto `target`.
pub fn resample(source: &SourceGrid, target: &GridTemplate, method: ResampleMethod) -> Result<Raster<f64>> {
    if source.x.len() < 2 || source.y.len() < 2 {
        return Err(Error::Algorithm(format!(
            "source grid must have at least two nodes per axis, got {}x{}",
            source.x.len(),
            source.y.len()
        )));
    }

    let (rows, cols) = target.shape();
    let xs = target.x_axis();
    let ys = target.y_axis();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let py = ys[row];
            (0..cols)
                .map(|col| source.sample(xs[col], py, method))
                .collect::<Vec<_>>()
        })
        .collect();

    target.raster_from_vec(data)
}

/// Give every grid node the value of its nearest station.
///
/// Uses the first column of the entry's k-nearest table, so no station
/// search is repeated.
pub fn nearest_station(entry: &SpatialCacheEntry, values: &[f64]) -> Result<Raster<f64>> {
    if values.len() != entry.station_count() {
        return Err(Error::SizeMismatch {
            er: entry.station_count(),
            ec: 1,
            ar: values.len(),
            ac: 1,
        });
    }

    let indices = entry.indices();
    let data: Vec<f64> = (0..entry.grid().len())
        .into_par_iter()
        .map(|node| values[indices[[node, 0]]])
        .collect();

    entry.grid().raster_from_vec(data)
}

/// Grid resampling as an [`Algorithm`].
#[derive(Debug, Clone, Default)]
pub struct Resample;

impl Algorithm for Resample {
    type Input = (SourceGrid, Arc<GridTemplate>);
    type Output = Raster<f64>;
    type Params = ResampleMethod;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Grid Resample"
    }

    fn description(&self) -> &'static str {
        "Nearest, bilinear or cubic resampling from a regular source lattice"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (source, target) = input;
        resample(&source, &target, params)
    }
}
