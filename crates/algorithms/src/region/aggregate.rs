//! Per-region category counts
//!
//! Stations are joined to the administrative unit that contains them and
//! their values are histogrammed per province and per regency.

use std::collections::BTreeMap;

use geo::{BoundingRect, Contains, Intersects, Point};
use staklim_core::{LocatedStations, RegionSet, Result};

use super::bins::CategoryBinTable;

/// Category counts for one group of stations, plus their total.
///
/// The category counts always sum to `total`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionCount {
    counts: Vec<(String, usize)>,
    total: usize,
}

impl RegionCount {
    pub fn total(&self) -> usize {
        self.total
    }

    /// Count for one category label, `None` for an unknown label.
    pub fn get(&self, label: &str) -> Option<usize> {
        self.counts.iter().find(|(l, _)| l == label).map(|(_, c)| *c)
    }

    /// `(label, count)` pairs in bin order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(l, c)| (l.as_str(), *c))
    }

    pub fn category_sum(&self) -> usize {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    /// Flat map including the `total` key, as handed to the rendering
    /// and reporting layers.
    pub fn to_map(&self) -> BTreeMap<String, usize> {
        let mut map: BTreeMap<String, usize> = self.counts.iter().cloned().collect();
        map.insert("total".to_string(), self.total);
        map
    }
}

/// Histogram `values` against `bins`. NaN values are not counted and do
/// not contribute to the total.
pub fn count_points(values: &[f64], bins: &CategoryBinTable) -> RegionCount {
    let mut counts = vec![0usize; bins.len()];
    for &v in values {
        if let Some(i) = bins.bin_of(v) {
            counts[i] += 1;
        }
    }
    let total = counts.iter().sum();
    RegionCount {
        counts: bins.labels().map(String::from).zip(counts).collect(),
        total,
    }
}

/// Count each distinct value as its own class, ascending. Used for
/// integer class fields such as consecutive dry day classes.
pub fn count_by_value(values: &[f64]) -> RegionCount {
    let mut classes: BTreeMap<u64, (f64, usize)> = BTreeMap::new();
    for &v in values.iter().filter(|v| v.is_finite()) {
        let v = if v == 0.0 { 0.0 } else { v };
        classes.entry(order_key(v)).or_insert((v, 0)).1 += 1;
    }
    let counts: Vec<(String, usize)> = classes.into_values().map(|(v, c)| (v.to_string(), c)).collect();
    let total = counts.iter().map(|(_, c)| c).sum();
    RegionCount { counts, total }
}

/// Monotone map from finite f64 to u64, so a BTreeMap sorts numerically.
fn order_key(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

/// Administrative level counts are grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminLevel {
    Province,
    Regency,
}

/// Index of the unit each point belongs to.
///
/// A point strictly inside a unit belongs to the first such unit. A point
/// on a boundary belongs to the first unit (in region order) whose
/// boundary it touches, so shared edges are never double counted.
pub fn assign_units(points: &[Point<f64>], region: &RegionSet) -> Vec<Option<usize>> {
    let rects: Vec<_> = region.iter().map(|u| u.geometry.bounding_rect()).collect();

    points
        .iter()
        .map(|p| {
            let candidates: Vec<usize> = rects
                .iter()
                .enumerate()
                .filter(|(_, r)| r.is_some_and(|r| r.intersects(&p.0)))
                .map(|(i, _)| i)
                .collect();
            let units = region.units();
            candidates
                .iter()
                .copied()
                .find(|&i| units[i].geometry.contains(&p.0))
                .or_else(|| {
                    candidates
                        .iter()
                        .copied()
                        .find(|&i| units[i].geometry.intersects(&p.0))
                })
        })
        .collect()
}

/// Counts grouped by province and by regency name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionCounts {
    pub by_province: BTreeMap<String, RegionCount>,
    pub by_regency: BTreeMap<String, RegionCount>,
}

impl RegionCounts {
    pub fn level(&self, level: AdminLevel) -> &BTreeMap<String, RegionCount> {
        match level {
            AdminLevel::Province => &self.by_province,
            AdminLevel::Regency => &self.by_regency,
        }
    }
}

fn group_values(
    stations: &LocatedStations,
    column: &str,
    region: &RegionSet,
) -> Result<[BTreeMap<String, Vec<f64>>; 2]> {
    let values = stations.table().column(column)?;
    let assigned = assign_units(stations.points(), region);
    let units = region.units();

    let mut province: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut regency: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (&v, unit) in values.iter().zip(&assigned) {
        let Some(i) = *unit else { continue };
        province.entry(units[i].province.clone()).or_default().push(v);
        regency.entry(units[i].regency.clone()).or_default().push(v);
    }
    Ok([province, regency])
}

fn count_groups(
    stations: &LocatedStations,
    column: &str,
    region: &RegionSet,
    count: impl Fn(&[f64]) -> RegionCount,
) -> Result<RegionCounts> {
    let [province, regency] = group_values(stations, column, region)?;
    Ok(RegionCounts {
        by_province: province.into_iter().map(|(k, v)| (k, count(&v))).collect(),
        by_regency: regency.into_iter().map(|(k, v)| (k, count(&v))).collect(),
    })
}

/// Join stations to units and histogram `column` per province and
/// regency. Stations outside every unit are not counted.
pub fn count_by_region(
    stations: &LocatedStations,
    column: &str,
    region: &RegionSet,
    bins: &CategoryBinTable,
) -> Result<RegionCounts> {
    count_groups(stations, column, region, |v| count_points(v, bins))
}

/// [`count_by_value`] per province and regency.
pub fn count_values_by_region(
    stations: &LocatedStations,
    column: &str,
    region: &RegionSet,
) -> Result<RegionCounts> {
    count_groups(stations, column, region, count_by_value)
}
