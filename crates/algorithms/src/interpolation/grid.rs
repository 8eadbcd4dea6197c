//! Output grid construction
//!
//! A [`GridTemplate`] is the regular lon/lat lattice every interpolator
//! writes into. It covers a region's bounding box at a fixed cell size and
//! may overshoot the high edges by less than one cell.

use ndarray::Array1;
use staklim_core::config::OUTPUT_CELL_SIZE;
use staklim_core::raster::{GeoTransform, Raster};
use staklim_core::{BoundingBox, Error, Result};

/// Regular lattice over a bounding box. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct GridTemplate {
    bounds: BoundingBox,
    cell_size: f64,
    /// Longitudes of the lattice nodes, west to east
    x: Array1<f64>,
    /// Latitudes of the lattice nodes, south to north
    y: Array1<f64>,
}

impl GridTemplate {
    /// Build the production grid (cell size [`OUTPUT_CELL_SIZE`]).
    pub fn build(bounds: BoundingBox) -> Result<Self> {
        Self::with_cell_size(bounds, OUTPUT_CELL_SIZE)
    }

    /// Build a grid with a custom cell size.
    ///
    /// `ncols = ceil((max_x - min_x) / cell)` and the x axis holds the
    /// `ncols + 1` nodes `min_x, min_x + cell, …, min_x + ncols * cell`
    /// (likewise for y). Fails fast on a zero-area box.
    pub fn with_cell_size(bounds: BoundingBox, cell_size: f64) -> Result<Self> {
        if bounds.is_degenerate() {
            return Err(Error::DegenerateBounds {
                min_x: bounds.min_x,
                min_y: bounds.min_y,
                max_x: bounds.max_x,
                max_y: bounds.max_y,
            });
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::InvalidParameter {
                name: "cell_size",
                value: cell_size.to_string(),
                reason: "must be a positive finite number".into(),
            });
        }

        let ncols = (bounds.width() / cell_size).ceil() as usize;
        let nrows = (bounds.height() / cell_size).ceil() as usize;

        let x = Array1::linspace(bounds.min_x, bounds.min_x + ncols as f64 * cell_size, ncols + 1);
        let y = Array1::linspace(bounds.min_y, bounds.min_y + nrows as f64 * cell_size, nrows + 1);

        Ok(Self { bounds, cell_size, x, y })
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn x_axis(&self) -> &Array1<f64> {
        &self.x
    }

    pub fn y_axis(&self) -> &Array1<f64> {
        &self.y
    }

    /// Lattice shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }

    /// Number of lattice nodes
    pub fn len(&self) -> usize {
        self.x.len() * self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinates of node `idx` in row-major order.
    #[inline]
    pub fn node(&self, idx: usize) -> (f64, f64) {
        let cols = self.x.len();
        (self.x[idx % cols], self.y[idx / cols])
    }

    /// Transform placing raster cell centers on the lattice nodes.
    pub fn transform(&self) -> GeoTransform {
        GeoTransform::lattice(self.bounds.min_x, self.bounds.min_y, self.cell_size)
    }

    /// Wrap row-major node values into a raster with NaN as no-data.
    pub fn raster_from_vec(&self, data: Vec<f64>) -> Result<Raster<f64>> {
        let (rows, cols) = self.shape();
        let mut raster = Raster::from_vec(data, rows, cols)?;
        raster.set_transform(self.transform());
        raster.set_nodata(Some(f64::NAN));
        Ok(raster)
    }
}
