//! Map production pipeline
//!
//! [`MapEngine`] owns everything that outlives a single map: the full
//! boundary table, the spatial and region caches, and the forecast and
//! analysis station slots. One engine serves many requests; the caches
//! are shared between them and must be cleared by the caller whenever
//! the station source changes identity.
//!
//! ```text
//! stations ─ clip ─ drop NaN ─┬─ discrete ─ nearest station ─┐
//!                             ├─ gridded ── resample ────────┼─ clip raster ─ levels
//!                             └─ otherwise ─ IDW ────────────┘
//!                        └──────────── count per province / regency
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use staklim_core::config::{ProductKind, ResampleMethod, RunConfig};
use staklim_core::{Error, LocatedStations, Raster, RegionSet, Result, StationInput, StationTable};
use tracing::{debug, info, warn};

use crate::interpolation::{
    distinct_values, idw, is_discrete, nearest_station, resample, IdwParams, SourceGrid, SpatialCache,
};
use crate::region::{
    clip_points_or_fallback, clip_raster, count_by_region, count_values_by_region, Basemap, CategoryBinTable,
    ClippedStations, RegionCache, RegionCounts,
};
use crate::verification::{
    calculate_metrics, category_pairs, match_stations, ContingencyTable, MatchedStations, VerificationMetrics,
    VerificationScheme,
};

/// Number of levels generated for a continuous field without a level list
pub const DEFAULT_LEVEL_COUNT: usize = 10;

// ─── Station store ──────────────────────────────────────────────────────

/// Named station source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationSlot {
    Forecast,
    Analysis,
}

impl fmt::Display for StationSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationSlot::Forecast => write!(f, "forecast"),
            StationSlot::Analysis => write!(f, "analysis"),
        }
    }
}

/// Loaded forecast and analysis tables, kept until [`StationStore::clear`].
#[derive(Debug, Default)]
pub struct StationStore {
    forecast: Mutex<Option<Arc<StationTable>>>,
    analysis: Mutex<Option<Arc<StationTable>>>,
}

impl StationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, slot: StationSlot) -> Result<MutexGuard<'_, Option<Arc<StationTable>>>> {
        let lock = match slot {
            StationSlot::Forecast => &self.forecast,
            StationSlot::Analysis => &self.analysis,
        };
        lock.lock()
            .map_err(|_| Error::Other(format!("{slot} station slot lock poisoned")))
    }

    /// Store a table, replacing whatever the slot held.
    pub fn set(&self, slot: StationSlot, table: StationTable) -> Result<()> {
        debug!(%slot, stations = table.len(), "station table stored");
        *self.slot(slot)? = Some(Arc::new(table));
        Ok(())
    }

    /// The stored table, or [`Error::Configuration`] when the slot is empty.
    pub fn get(&self, slot: StationSlot) -> Result<Arc<StationTable>> {
        self.slot(slot)?
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| Error::config(format!("no {slot} station source configured")))
    }

    pub fn contains(&self, slot: StationSlot) -> bool {
        self.slot(slot).map(|s| s.is_some()).unwrap_or(false)
    }

    pub fn clear(&self) -> Result<()> {
        *self.slot(StationSlot::Forecast)? = None;
        *self.slot(StationSlot::Analysis)? = None;
        debug!("station store cleared");
        Ok(())
    }
}

// ─── Results ────────────────────────────────────────────────────────────

/// How a field was put on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationPath {
    /// Inverse distance weighting over the k nearest stations
    Idw,
    /// Value of the single nearest station (discrete fields)
    NearestStation,
    /// Resampling of station values that already lie on a regular grid
    Resample(ResampleMethod),
}

/// Gridded field clipped to its region
#[derive(Debug, Clone)]
pub struct InterpolatedField {
    /// Cells outside the region are NaN
    pub raster: Raster<f64>,
    /// At most `discrete_threshold` distinct input values
    pub discrete: bool,
    pub path: InterpolationPath,
}

/// Output of one [`MapEngine::interpolate`] call
#[derive(Debug, Clone)]
pub struct InterpolationResult {
    pub field: InterpolatedField,
    /// Station counts per province and per regency
    pub counts: RegionCounts,
    /// Levels the field is drawn with
    pub levels: Vec<f64>,
    /// Stations that entered the interpolation
    pub stations_used: usize,
    /// No station lay inside the region and the unclipped set was used
    pub fell_back: bool,
}

/// Output of a verification run
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub scheme: VerificationScheme,
    /// Matched stations after clipping to the region
    pub matched: MatchedStations,
    pub table: ContingencyTable,
    pub metrics: VerificationMetrics,
    pub fell_back: bool,
}

// ─── Engine ─────────────────────────────────────────────────────────────

/// Orchestrates interpolation, counting and verification.
#[derive(Debug)]
pub struct MapEngine {
    boundaries: RegionSet,
    config: RunConfig,
    spatial: SpatialCache,
    regions: RegionCache,
    stations: StationStore,
}

impl MapEngine {
    /// Engine over the full administrative boundary table.
    pub fn new(boundaries: RegionSet, config: RunConfig) -> Self {
        let spatial = SpatialCache::with_cell_size(config.interpolation.cell_size);
        Self {
            boundaries,
            config,
            spatial,
            regions: RegionCache::new(),
            stations: StationStore::new(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn boundaries(&self) -> &RegionSet {
        &self.boundaries
    }

    pub fn spatial_cache(&self) -> &SpatialCache {
        &self.spatial
    }

    pub fn region_cache(&self) -> &RegionCache {
        &self.regions
    }

    pub fn stations(&self) -> &StationStore {
        &self.stations
    }

    /// Level list of the configured product, if it has one.
    pub fn preset_levels(&self) -> Option<Vec<f64>> {
        self.config.preset_levels()
    }

    /// Basemap of the configured region query.
    pub fn basemap(&self) -> Result<Arc<Basemap>> {
        self.regions.get_or_select(&self.boundaries, &self.config.region)
    }

    /// Interpolate `value_column` onto the grid over `region`, clip the
    /// result and count stations per province and regency.
    ///
    /// Without `levels`, continuous fields get [`DEFAULT_LEVEL_COUNT`]
    /// evenly spaced levels between the clipped field's extremes and
    /// discrete fields get their distinct values.
    pub fn interpolate(
        &self,
        stations: impl Into<StationInput>,
        value_column: &str,
        region: &RegionSet,
        levels: Option<&[f64]>,
    ) -> Result<InterpolationResult> {
        let clipped = self.clip_stations(stations.into().resolve(), region)?;
        self.interpolate_clipped(&clipped, value_column, region, levels)
    }

    /// [`MapEngine::interpolate`] over several columns of one table.
    ///
    /// Stations are clipped once; columns with the same valid stations
    /// share one spatial cache entry.
    pub fn interpolate_many(
        &self,
        stations: impl Into<StationInput>,
        value_columns: &[&str],
        region: &RegionSet,
        levels: Option<&[f64]>,
    ) -> Result<Vec<(String, InterpolationResult)>> {
        let clipped = self.clip_stations(stations.into().resolve(), region)?;
        value_columns
            .iter()
            .map(|&column| {
                self.interpolate_clipped(&clipped, column, region, levels)
                    .map(|r| (column.to_string(), r))
            })
            .collect()
    }

    /// Per-region histogram of the distinct values of `value_column`.
    pub fn count_by_value(
        &self,
        stations: impl Into<StationInput>,
        value_column: &str,
        region: &RegionSet,
    ) -> Result<RegionCounts> {
        let clipped = self.clip_stations(stations.into().resolve(), region)?;
        count_values_by_region(&clipped.stations, value_column, region)
    }

    /// Match, clip to `region` (when given) and score two station tables.
    pub fn verify(
        &self,
        forecast: &StationTable,
        analysis: &StationTable,
        region: Option<&RegionSet>,
        scheme: VerificationScheme,
    ) -> Result<VerificationReport> {
        let start = Instant::now();
        let matched = match_stations(forecast, analysis)?;

        let (matched, fell_back) = match region {
            Some(region) => {
                let clipped = self.clip_stations(LocatedStations::from(matched.into_table()), region)?;
                (MatchedStations::from(clipped.stations.into_table()), clipped.fell_back)
            }
            None => (matched, false),
        };

        let (f, o) = category_pairs(matched.table(), scheme)?;
        let table = ContingencyTable::from_pairs(&f, &o, &scheme.categories())?;
        let metrics = calculate_metrics(&table)?;

        info!(
            ?scheme,
            stations = matched.len(),
            accuracy = metrics.accuracy,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "verification complete"
        );
        Ok(VerificationReport {
            scheme,
            matched,
            table,
            metrics,
            fell_back,
        })
    }

    /// [`MapEngine::verify`] on the stored forecast and analysis tables,
    /// clipped to the configured basemap when a region is configured.
    pub fn verify_stored(&self, scheme: VerificationScheme) -> Result<VerificationReport> {
        let forecast = self.stations.get(StationSlot::Forecast)?;
        let analysis = self.stations.get(StationSlot::Analysis)?;
        if self.config.region.names.is_empty() {
            return self.verify(&forecast, &analysis, None, scheme);
        }
        let basemap = self.basemap()?;
        self.verify(&forecast, &analysis, Some(&basemap.main), scheme)
    }

    pub fn clear_spatial_cache(&self) -> Result<()> {
        self.spatial.clear()
    }

    pub fn clear_region_cache(&self) -> Result<()> {
        self.regions.clear()
    }

    pub fn clear_data_cache(&self) -> Result<()> {
        self.stations.clear()
    }

    fn clip_stations(&self, stations: LocatedStations, region: &RegionSet) -> Result<ClippedStations> {
        if stations.is_empty() {
            return Err(Error::InsufficientStations {
                required: 1,
                available: 0,
            });
        }
        clip_points_or_fallback(&stations, region, self.config.interpolation.strict_clip)
    }

    fn interpolate_clipped(
        &self,
        clipped: &ClippedStations,
        value_column: &str,
        region: &RegionSet,
        levels: Option<&[f64]>,
    ) -> Result<InterpolationResult> {
        let start = Instant::now();
        let cfg = &self.config.interpolation;

        let stations = finite_rows(&clipped.stations, value_column)?;
        if stations.is_empty() {
            return Err(Error::InsufficientStations {
                required: 1,
                available: 0,
            });
        }

        let table = stations.table();
        let values = table.column(value_column)?;
        let bounds = region.bounds()?;
        let discrete = is_discrete(values, cfg.discrete_threshold);

        let (raster, path) = match cfg.resample_method {
            Some(method) => {
                let method = if discrete { ResampleMethod::Nearest } else { method };
                let source = SourceGrid::from_stations(table.lons(), table.lats(), values)?;
                let target = self.spatial.grid(&bounds)?;
                (resample(&source, &target, method)?, InterpolationPath::Resample(method))
            }
            None if discrete => {
                let entry = self.spatial.get_spatial(&bounds, table.lons(), table.lats(), 1)?;
                (nearest_station(&entry, values)?, InterpolationPath::NearestStation)
            }
            None => {
                let entry = self
                    .spatial
                    .get_spatial(&bounds, table.lons(), table.lats(), cfg.neighbors)?;
                (idw(&entry, values, IdwParams::from(cfg))?, InterpolationPath::Idw)
            }
        };
        debug!(column = value_column, ?path, discrete, "interpolation path");

        let raster = clip_raster(&raster, region)?;
        let levels = match levels {
            Some(levels) => levels.to_vec(),
            None => default_levels(&raster, values, discrete),
        };

        let counts = if self.config.product == ProductKind::DryDays {
            count_values_by_region(&stations, value_column, region)?
        } else {
            let edges = bin_edges(&levels);
            let bins = CategoryBinTable::for_field(self.config.field, self.config.timescale, Some(edges.as_slice()))?;
            count_by_region(&stations, value_column, region, &bins)?
        };

        info!(
            column = value_column,
            stations = stations.len(),
            rows = raster.rows(),
            cols = raster.cols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "interpolation complete"
        );

        Ok(InterpolationResult {
            field: InterpolatedField { raster, discrete, path },
            counts,
            levels,
            stations_used: stations.len(),
            fell_back: clipped.fell_back,
        })
    }
}

/// Rows of `stations` whose `column` value is finite.
fn finite_rows(stations: &LocatedStations, column: &str) -> Result<LocatedStations> {
    let values = stations.table().column(column)?;
    let rows: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, _)| i)
        .collect();

    let dropped = values.len() - rows.len();
    if dropped == 0 {
        return Ok(stations.clone());
    }
    warn!(column, dropped, "stations with non-finite values dropped");
    Ok(stations.select(&rows))
}

/// Levels for a field drawn without a caller-supplied list.
fn default_levels(raster: &Raster<f64>, values: &[f64], discrete: bool) -> Vec<f64> {
    if discrete {
        return distinct_values(values);
    }

    let stats = raster.statistics();
    let (min, max) = match (stats.min, stats.max) {
        (Some(min), Some(max)) => (min, max),
        _ => values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    };
    linspace(min, max, DEFAULT_LEVEL_COUNT)
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Sorted, deduplicated finite levels usable as bin edges.
fn bin_edges(levels: &[f64]) -> Vec<f64> {
    let mut edges: Vec<f64> = levels.iter().copied().filter(|v| v.is_finite()).collect();
    edges.sort_by(f64::total_cmp);
    edges.dedup();
    edges
}
