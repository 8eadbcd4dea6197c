//! Affine geotransformation for lon/lat lattices

use serde::{Deserialize, Serialize};

/// Axis-aligned transform between lattice indices (col, row) and lon/lat.
///
/// ```text
/// x = origin_x + (col + 0.5) * pixel_width
/// y = origin_y + (row + 0.5) * pixel_height
/// ```
///
/// Interpolation grids are built south-up: row 0 is the southern edge of
/// the bounding box and `pixel_height` is positive. A north-up raster
/// (negative `pixel_height`) is still handled by every method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the lattice corner
    pub origin_x: f64,
    /// Y coordinate of the lattice corner
    pub origin_y: f64,
    /// Cell size in X direction
    pub pixel_width: f64,
    /// Cell size in Y direction (positive for south-up grids)
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Transform whose cell centers land exactly on the lattice nodes
    /// `(min_x + col * cell, min_y + row * cell)`.
    pub fn lattice(min_x: f64, min_y: f64, cell: f64) -> Self {
        Self::new(min_x - cell / 2.0, min_y - cell / 2.0, cell, cell)
    }

    /// Convert pixel coordinates to geographic coordinates (cell center)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}
