//! Station observation tables
//!
//! A station table is the shape every upstream loader produces: one row
//! per station with longitude, latitude and any number of named numeric
//! columns. Missing or non-numeric cells are stored as NaN.
//!
//! Coordinates are rounded to [`COORD_DECIMALS`] places on construction so
//! that repeated loads of the same file yield byte-identical coordinate
//! arrays (the spatial cache keys on those bytes).

use std::collections::BTreeMap;

use geo_types::Point;

use crate::error::{Error, Result};

/// Decimal places kept for station coordinates
pub const COORD_DECIMALS: i32 = 2;

/// Round a coordinate to [`COORD_DECIMALS`] places, halves to even.
#[inline]
pub fn round_coord(v: f64) -> f64 {
    let scale = 10f64.powi(COORD_DECIMALS);
    (v * scale).round_ties_even() / scale
}

/// A single station reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationObservation {
    pub lon: f64,
    pub lat: f64,
    pub value: f64,
}

impl StationObservation {
    pub fn new(lon: f64, lat: f64, value: f64) -> Self {
        Self { lon, lat, value }
    }
}

/// Column-oriented station table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationTable {
    lon: Vec<f64>,
    lat: Vec<f64>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl StationTable {
    /// Create a table from coordinate columns. Coordinates are rounded.
    pub fn new(lon: Vec<f64>, lat: Vec<f64>) -> Result<Self> {
        if lon.len() != lat.len() {
            return Err(Error::SizeMismatch {
                er: lon.len(),
                ec: 1,
                ar: lat.len(),
                ac: 1,
            });
        }
        Ok(Self {
            lon: lon.into_iter().map(round_coord).collect(),
            lat: lat.into_iter().map(round_coord).collect(),
            columns: BTreeMap::new(),
        })
    }

    /// Build a single-column table from observations.
    pub fn from_observations(obs: &[StationObservation], column: &str) -> Result<Self> {
        let lon = obs.iter().map(|o| o.lon).collect();
        let lat = obs.iter().map(|o| o.lat).collect();
        let values = obs.iter().map(|o| o.value).collect();
        Self::new(lon, lat)?.with_column(column, values)
    }

    /// Builder form of [`StationTable::insert_column`].
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    /// Add or replace a value column. Length must match the table.
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(Error::SizeMismatch {
                er: self.len(),
                ec: 1,
                ar: values.len(),
                ac: 1,
            });
        }
        self.columns.insert(name.into(), values);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lon.is_empty()
    }

    pub fn lons(&self) -> &[f64] {
        &self.lon
    }

    pub fn lats(&self) -> &[f64] {
        &self.lat
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Values of a named column.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::config(format!("station table has no column '{name}'")))
    }

    /// Return the first of `candidates` that exists as a column.
    pub fn first_column<'a>(&self, candidates: &[&'a str]) -> Result<&'a str> {
        candidates
            .iter()
            .copied()
            .find(|c| self.has_column(c))
            .ok_or_else(|| Error::config(format!("none of {candidates:?} found in station table")))
    }

    /// Subset of rows, in the given order.
    pub fn select(&self, rows: &[usize]) -> StationTable {
        let pick = |v: &[f64]| rows.iter().map(|&i| v[i]).collect::<Vec<_>>();
        StationTable {
            lon: pick(&self.lon),
            lat: pick(&self.lat),
            columns: self
                .columns
                .iter()
                .map(|(k, v)| (k.clone(), pick(v)))
                .collect(),
        }
    }
}

/// A station table whose rows carry point geometries.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedStations {
    table: StationTable,
    points: Vec<Point<f64>>,
}

impl LocatedStations {
    pub fn table(&self) -> &StationTable {
        &self.table
    }

    pub fn points(&self) -> &[Point<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Subset of rows, geometries included.
    pub fn select(&self, rows: &[usize]) -> LocatedStations {
        LocatedStations {
            table: self.table.select(rows),
            points: rows.iter().map(|&i| self.points[i]).collect(),
        }
    }

    pub fn into_table(self) -> StationTable {
        self.table
    }
}

impl From<StationTable> for LocatedStations {
    fn from(table: StationTable) -> Self {
        let points = table
            .lon
            .iter()
            .zip(&table.lat)
            .map(|(&x, &y)| Point::new(x, y))
            .collect();
        Self { table, points }
    }
}

/// Station data as handed over by a loader: either a plain table or one
/// that already carries geometries (e.g. a previously clipped set).
#[derive(Debug, Clone)]
pub enum StationInput {
    Table(StationTable),
    Located(LocatedStations),
}

impl StationInput {
    /// Resolve to located stations once, at ingestion.
    pub fn resolve(self) -> LocatedStations {
        match self {
            StationInput::Table(t) => t.into(),
            StationInput::Located(l) => l,
        }
    }
}

impl From<StationTable> for StationInput {
    fn from(table: StationTable) -> Self {
        StationInput::Table(table)
    }
}

impl From<LocatedStations> for StationInput {
    fn from(located: LocatedStations) -> Self {
        StationInput::Located(located)
    }
}
