//! Forecast/analysis station matching
//!
//! Joins a forecast table and an analysis table on station coordinates
//! and derives per-station agreement columns. The joined table is an
//! ordinary [`StationTable`], so its derived columns can be mapped like
//! any other field (binary agreement map, bias map).

use std::collections::HashMap;

use staklim_core::{Error, Result, StationTable};
use tracing::debug;

use crate::classification::{categorize_ch, categorize_index, CH_CATEGORIES, INDEX_CATEGORIES};

/// Forecast value column names, in order of preference
pub const FORECAST_COLUMNS: [&str; 2] = ["CH", "VAL"];
/// Analysis value column
pub const ANALYSIS_COLUMN: &str = "CH";

/// Columns of a matched table
pub mod columns {
    pub const FORECAST: &str = "forecast";
    pub const ANALYSIS: &str = "analysis";
    pub const CATEGORY_FORECAST: &str = "ch_category_forecast";
    pub const CATEGORY_ANALYSIS: &str = "ch_category_analysis";
    pub const INDEX_FORECAST: &str = "index_forecast";
    pub const INDEX_ANALYSIS: &str = "index_analysis";
    /// 1 when the 4-class categories agree
    pub const EXACT_MATCH: &str = "exact_match";
    /// 1 when the 9-step indices agree
    pub const EXACT_INDEX: &str = "exact_index";
    /// 1 when the indices differ by at most one step
    pub const RELAXED_INDEX: &str = "relaxed_index";
    /// Forecast minus analysis
    pub const BIAS: &str = "bias";
}

/// Which categorization a verification run scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationScheme {
    /// [`categorize_ch`], categories 1..=4
    Qualitative,
    /// [`categorize_index`], categories 1..=9
    Quantitative,
}

impl VerificationScheme {
    /// Full category list; contingency tables always span all of it.
    pub fn categories(self) -> Vec<u8> {
        let n = match self {
            VerificationScheme::Qualitative => CH_CATEGORIES,
            VerificationScheme::Quantitative => INDEX_CATEGORIES,
        };
        (1..=n).collect()
    }

    /// Binary agreement column mapped for this scheme.
    pub fn match_column(self) -> &'static str {
        match self {
            VerificationScheme::Qualitative => columns::EXACT_MATCH,
            VerificationScheme::Quantitative => columns::EXACT_INDEX,
        }
    }

    fn category_columns(self) -> (&'static str, &'static str) {
        match self {
            VerificationScheme::Qualitative => (columns::CATEGORY_FORECAST, columns::CATEGORY_ANALYSIS),
            VerificationScheme::Quantitative => (columns::INDEX_FORECAST, columns::INDEX_ANALYSIS),
        }
    }
}

/// Inner join of forecast and analysis stations on (lon, lat)
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedStations {
    table: StationTable,
}

impl MatchedStations {
    pub fn table(&self) -> &StationTable {
        &self.table
    }

    pub fn into_table(self) -> StationTable {
        self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// `(forecast, observed)` category series of `scheme`.
    pub fn category_pairs(&self, scheme: VerificationScheme) -> Result<(Vec<u8>, Vec<u8>)> {
        category_pairs(&self.table, scheme)
    }
}

impl From<StationTable> for MatchedStations {
    /// Wrap a table that already carries the matched columns, such as a
    /// clipped subset of an earlier match.
    fn from(table: StationTable) -> Self {
        Self { table }
    }
}

/// Category series of `scheme` from any table carrying the matched
/// columns (for example a clipped subset of a matched table).
pub fn category_pairs(table: &StationTable, scheme: VerificationScheme) -> Result<(Vec<u8>, Vec<u8>)> {
    let (fc, ac) = scheme.category_columns();
    let to_u8 = |v: &[f64]| v.iter().map(|&x| x as u8).collect::<Vec<_>>();
    Ok((to_u8(table.column(fc)?), to_u8(table.column(ac)?)))
}

fn coord_key(lon: f64, lat: f64) -> (u64, u64) {
    let norm = |v: f64| if v == 0.0 { 0.0f64 } else { v };
    (norm(lon).to_bits(), norm(lat).to_bits())
}

/// Join forecast and analysis tables on their (already rounded)
/// coordinates.
///
/// The forecast value is `CH`, else `VAL`; the analysis value is `CH`.
/// Either missing is [`Error::Configuration`]. Duplicate coordinates
/// produce one row per forecast/analysis pair, forecast order first.
pub fn match_stations(forecast: &StationTable, analysis: &StationTable) -> Result<MatchedStations> {
    let f_col = forecast.first_column(&FORECAST_COLUMNS)?;
    let f_vals = forecast.column(f_col)?;
    let a_vals = analysis.column(ANALYSIS_COLUMN)?;

    let mut by_coord: HashMap<(u64, u64), Vec<usize>> = HashMap::new();
    for (j, (&lon, &lat)) in analysis.lons().iter().zip(analysis.lats()).enumerate() {
        by_coord.entry(coord_key(lon, lat)).or_default().push(j);
    }

    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for (i, (&lon, &lat)) in forecast.lons().iter().zip(forecast.lats()).enumerate() {
        if let Some(js) = by_coord.get(&coord_key(lon, lat)) {
            pairs.extend(js.iter().map(|&j| (i, j)));
        }
    }

    let lon = pairs.iter().map(|&(i, _)| forecast.lons()[i]).collect();
    let lat = pairs.iter().map(|&(i, _)| forecast.lats()[i]).collect();
    let fv: Vec<f64> = pairs.iter().map(|&(i, _)| f_vals[i]).collect();
    let av: Vec<f64> = pairs.iter().map(|&(_, j)| a_vals[j]).collect();

    let cat = |v: &[f64], f: fn(f64) -> u8| v.iter().map(|&x| f64::from(f(x))).collect::<Vec<_>>();
    let ch_f = cat(&fv, |x| categorize_ch(x));
    let ch_a = cat(&av, |x| categorize_ch(x));
    let ix_f = cat(&fv, |x| categorize_index(x));
    let ix_a = cat(&av, |x| categorize_index(x));

    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    let exact_match = ch_f.iter().zip(&ch_a).map(|(a, b)| flag(a == b)).collect();
    let exact_index = ix_f.iter().zip(&ix_a).map(|(a, b)| flag(a == b)).collect();
    let relaxed_index = ix_f.iter().zip(&ix_a).map(|(a, b)| flag((a - b).abs() <= 1.0)).collect();
    let bias = fv.iter().zip(&av).map(|(f, a)| f - a).collect();

    debug!(
        forecast = forecast.len(),
        analysis = analysis.len(),
        matched = pairs.len(),
        value_column = f_col,
        "stations matched"
    );

    let table = StationTable::new(lon, lat)?
        .with_column(columns::FORECAST, fv)?
        .with_column(columns::ANALYSIS, av)?
        .with_column(columns::CATEGORY_FORECAST, ch_f)?
        .with_column(columns::CATEGORY_ANALYSIS, ch_a)?
        .with_column(columns::INDEX_FORECAST, ix_f)?
        .with_column(columns::INDEX_ANALYSIS, ix_a)?
        .with_column(columns::EXACT_MATCH, exact_match)?
        .with_column(columns::EXACT_INDEX, exact_index)?
        .with_column(columns::RELAXED_INDEX, relaxed_index)?
        .with_column(columns::BIAS, bias)?;

    if table.is_empty() {
        return Err(Error::DegenerateVerification(
            "forecast and analysis share no station coordinates".into(),
        ));
    }
    Ok(MatchedStations { table })
}
