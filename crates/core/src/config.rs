//! Run configuration
//!
//! Every struct here deserializes with serde and has a `Default` matching
//! the production settings, so an embedding application can load a
//! partial config file and let the rest fall back.

use serde::{Deserialize, Serialize};

/// Output cell size of interpolation grids, in degrees
pub const OUTPUT_CELL_SIZE: f64 = 0.0021648361216;

/// Default number of nearest stations per grid cell
pub const DEFAULT_NEIGHBORS: usize = 6;

/// Fields with at most this many distinct values are treated as discrete
pub const DISCRETE_THRESHOLD: usize = 10;

/// Semantic field being mapped. Selects the count bin table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Curah Hujan, rainfall amount in mm
    #[default]
    RainfallAmount,
    /// Sifat Hujan, rainfall as percentage of normal
    RainfallCharacter,
    /// Binary forecast/observation match
    VerificationMatch,
    /// Anything else; counted against caller-supplied levels
    Other,
}

/// Interpolation timescale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Timescale {
    /// Bulanan
    #[default]
    Monthly,
    /// Ten-day period
    Dasarian,
}

/// Map product being produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// Prakiraan
    #[default]
    Forecast,
    /// Analisis
    Analysis,
    /// Verifikasi
    Verification,
    /// Probabilistik
    Probabilistic,
    /// Climatological normal
    Normal,
    /// Forecast minus analysis
    Bias,
    /// Hari Tanpa Hujan (consecutive dry days)
    DryDays,
}

/// Resampling method for data already on a regular grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResampleMethod {
    #[default]
    Nearest,
    Linear,
    Cubic,
}

/// Interpolation tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// IDW power exponent
    pub power: f64,
    /// Nearest stations per grid cell (k)
    pub neighbors: usize,
    /// Added to `d^power` so a coincident station never divides by zero
    pub epsilon: f64,
    /// Output grid cell size in degrees
    pub cell_size: f64,
    /// Distinct-value count at or below which a field is discrete
    pub discrete_threshold: usize,
    /// `Some` when the source data lies on a regular grid and should be
    /// resampled instead of IDW-interpolated
    pub resample_method: Option<ResampleMethod>,
    /// Fail instead of falling back to the unclipped stations when no
    /// station lies inside the region
    pub strict_clip: bool,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            power: 2.0,
            neighbors: DEFAULT_NEIGHBORS,
            epsilon: 1e-10,
            cell_size: OUTPUT_CELL_SIZE,
            discrete_threshold: DISCRETE_THRESHOLD,
            resample_method: None,
            strict_clip: false,
        }
    }
}

/// Which administrative units to map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionQuery {
    /// Province or regency names
    pub names: Vec<String>,
    /// Also collect neighbouring units for the overlay layer
    pub include_others: bool,
    /// Search distance for neighbouring units, in degrees
    pub others_buffer_deg: f64,
}

impl RegionQuery {
    /// Parse a comma separated list such as `"Papua Barat, Papua Barat Daya"`.
    pub fn parse(names: &str) -> Self {
        Self {
            names: names
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            ..Self::default()
        }
    }
}

impl Default for RegionQuery {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            include_others: true,
            others_buffer_deg: 2.0,
        }
    }
}

/// Complete configuration of one mapping run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub product: ProductKind,
    pub field: FieldKind,
    pub timescale: Timescale,
    pub region: RegionQuery,
    pub interpolation: InterpolationConfig,
}

impl RunConfig {
    /// Levels used when the caller does not supply any.
    pub fn preset_levels(&self) -> Option<Vec<f64>> {
        preset_levels(self.product, self.field, self.timescale)
    }
}

/// Level lists used by the standard products.
pub fn preset_levels(product: ProductKind, field: FieldKind, timescale: Timescale) -> Option<Vec<f64>> {
    let levels: &[f64] = match (product, field) {
        (ProductKind::DryDays, _) => return None,
        (ProductKind::Probabilistic, _) => {
            return Some((0..=10).map(|i| f64::from(i) * 10.0).collect());
        }
        (ProductKind::Bias, _) => &[
            -1000.0, -500.0, -400.0, -300.0, -200.0, -100.0, -50.0, -25.0, 0.0, 25.0, 50.0,
            100.0, 200.0, 300.0, 400.0, 500.0, 1000.0,
        ],
        (ProductKind::Verification, _) | (_, FieldKind::VerificationMatch) => &[0.0, 1.0],
        (_, FieldKind::RainfallCharacter) => &[0.0, 30.0, 50.0, 85.0, 115.0, 150.0, 200.0, 500.0],
        (_, FieldKind::RainfallAmount) | (_, FieldKind::Other) => match timescale {
            Timescale::Monthly => &[0.0, 20.0, 50.0, 100.0, 150.0, 200.0, 300.0, 400.0, 500.0, 1000.0],
            Timescale::Dasarian => &[0.0, 10.0, 20.0, 50.0, 75.0, 100.0, 150.0, 200.0, 300.0, 1000.0],
        },
    };
    Some(levels.to_vec())
}
