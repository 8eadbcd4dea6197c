//! Administrative boundary types
//!
//! A [`RegionSet`] is an ordered list of administrative units (regency
//! polygons tagged with their province). Order matters: when a point sits
//! exactly on a shared boundary it is assigned to the first unit that
//! touches it.

use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Axis-aligned bounding box `(min_x, min_y, max_x, max_y)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Box covering every coordinate, or `None` when there are none.
    pub fn from_coords<'a>(coords: impl IntoIterator<Item = &'a Coord<f64>>) -> Option<Self> {
        coords.into_iter().fold(None, |acc, c| {
            Some(match acc {
                None => Self::new(c.x, c.y, c.x, c.y),
                Some(b) => b.include(c.x, c.y),
            })
        })
    }

    fn include(self, x: f64, y: f64) -> Self {
        Self {
            min_x: self.min_x.min(x),
            min_y: self.min_y.min(y),
            max_x: self.max_x.max(x),
            max_y: self.max_y.max(y),
        }
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        self.include(other.min_x, other.min_y)
            .include(other.max_x, other.max_y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Zero-area or non-finite boxes cannot carry a grid.
    pub fn is_degenerate(&self) -> bool {
        let finite = [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Grow the box by `d` on every side.
    pub fn expand(&self, d: f64) -> BoundingBox {
        BoundingBox::new(self.min_x - d, self.min_y - d, self.max_x + d, self.max_y + d)
    }

    /// Bit patterns of the four bounds, usable as an exact hash key.
    pub fn key_bits(&self) -> [u64; 4] {
        [
            self.min_x.to_bits(),
            self.min_y.to_bits(),
            self.max_x.to_bits(),
            self.max_y.to_bits(),
        ]
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (self.min_x, self.min_y),
                (self.max_x, self.min_y),
                (self.max_x, self.max_y),
                (self.min_x, self.max_y),
                (self.min_x, self.min_y),
            ]),
            vec![],
        )
    }
}

/// One administrative unit (kabupaten/kota) with its province.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminUnit {
    pub province: String,
    pub regency: String,
    pub geometry: MultiPolygon<f64>,
}

impl AdminUnit {
    pub fn new(
        province: impl Into<String>,
        regency: impl Into<String>,
        geometry: impl Into<MultiPolygon<f64>>,
    ) -> Self {
        Self {
            province: province.into(),
            regency: regency.into(),
            geometry: geometry.into(),
        }
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_coords(
            self.geometry
                .0
                .iter()
                .flat_map(|p| p.exterior().0.iter()),
        )
    }
}

/// Ordered collection of administrative units
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionSet {
    units: Vec<AdminUnit>,
}

impl RegionSet {
    pub fn new(units: Vec<AdminUnit>) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &[AdminUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AdminUnit> {
        self.units.iter()
    }

    /// Total bounds of all units. Recomputed on every call so it always
    /// reflects the current unit list.
    pub fn bounds(&self) -> Result<BoundingBox> {
        self.units
            .iter()
            .filter_map(AdminUnit::bounds)
            .reduce(|a, b| a.union(&b))
            .ok_or_else(|| Error::config("region set has no geometry"))
    }
}

impl FromIterator<AdminUnit> for RegionSet {
    fn from_iter<I: IntoIterator<Item = AdminUnit>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for RegionSet {
    type Item = AdminUnit;
    type IntoIter = std::vec::IntoIter<AdminUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.into_iter()
    }
}
