//! Ordinal rainfall categories
//!
//! Two fixed schemes feed verification: a coarse 4-class scheme for
//! rainfall amount and a finer 9-class index.
//!
//! Invalid input (missing, NaN, non-numeric, negative) maps to category 1.
//! Bounds are inclusive integers with unit gaps between them (0–100,
//! 101–300, ...); a fractional value inside a gap such as 100.5 matches no
//! range and gets the top category. Verification baselines were produced
//! with exactly these rules, so they are kept as they are.

/// A raw cell from a station table, before any numeric cleaning.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Missing,
    Number(f64),
    Text(String),
}

impl RawValue {
    /// The value as a usable number, or `None` for anything that must
    /// take the fallback category.
    pub fn valid_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(v) if v.is_finite() && *v >= 0.0 => Some(*v),
            RawValue::Number(v) if *v == f64::INFINITY => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Number(v as f64)
    }
}

impl From<Option<f64>> for RawValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(RawValue::Missing, RawValue::Number)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

/// Category returned for invalid input
pub const FALLBACK_CATEGORY: u8 = 1;

const CH_RANGES: [(f64, f64); 4] = [(0.0, 100.0), (101.0, 300.0), (301.0, 500.0), (501.0, f64::INFINITY)];

const INDEX_RANGES: [(f64, f64); 9] = [
    (0.0, 20.0),
    (21.0, 50.0),
    (51.0, 100.0),
    (101.0, 150.0),
    (151.0, 200.0),
    (201.0, 300.0),
    (301.0, 400.0),
    (401.0, 500.0),
    (501.0, f64::INFINITY),
];

fn categorize(value: RawValue, ranges: &[(f64, f64)]) -> u8 {
    let Some(v) = value.valid_number() else {
        return FALLBACK_CATEGORY;
    };
    ranges
        .iter()
        .position(|&(lo, hi)| lo <= v && v <= hi)
        .unwrap_or(ranges.len() - 1) as u8
        + 1
}

/// Rainfall amount (mm) to category 1..=4.
pub fn categorize_ch(value: impl Into<RawValue>) -> u8 {
    categorize(value.into(), &CH_RANGES)
}

/// Rainfall amount (mm) to index 1..=9.
pub fn categorize_index(value: impl Into<RawValue>) -> u8 {
    categorize(value.into(), &INDEX_RANGES)
}

/// Number of categories of each scheme
pub const CH_CATEGORIES: u8 = CH_RANGES.len() as u8;
pub const INDEX_CATEGORIES: u8 = INDEX_RANGES.len() as u8;
