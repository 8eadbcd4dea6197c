//! Category bin tables
//!
//! Which bins a count uses depends on what is being mapped: rainfall
//! amount has different thresholds per timescale, rainfall character is
//! a percentage of normal, verification maps are binary.

use staklim_core::config::{FieldKind, Timescale};
use staklim_core::{Error, Result};

/// One labelled value range
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryBin {
    pub label: String,
    /// Minimum value (inclusive)
    pub lower: f64,
    /// Maximum value (exclusive, except for the last bin)
    pub upper: f64,
}

impl CategoryBin {
    pub fn new(label: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            label: label.into(),
            lower,
            upper,
        }
    }
}

/// Ordered, contiguous bins.
///
/// Every finite value falls in exactly one bin: the first bin extends
/// down to -∞ and the last one up to +∞ (inclusive), and consecutive bins
/// share their boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryBinTable {
    bins: Vec<CategoryBin>,
}

const AMOUNT_LABELS: [&str; 4] = ["Rendah", "Menengah", "Tinggi", "Sangat Tinggi"];

impl CategoryBinTable {
    /// Build from interior edges and labels: `edges[i]` is the lower
    /// bound of bin `i`. Needs `labels.len() == edges.len()`, strictly
    /// increasing finite edges, and at least one bin.
    pub fn from_edges(edges: &[f64], labels: &[String]) -> Result<Self> {
        if edges.is_empty() || edges.len() != labels.len() {
            return Err(Error::InvalidParameter {
                name: "edges",
                value: format!("{edges:?}"),
                reason: format!("need one edge per label ({} labels)", labels.len()),
            });
        }
        if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidParameter {
                name: "edges",
                value: format!("{edges:?}"),
                reason: "must be finite and strictly increasing".into(),
            });
        }

        let bins = edges
            .iter()
            .enumerate()
            .map(|(i, &lower)| {
                let upper = edges.get(i + 1).copied().unwrap_or(f64::INFINITY);
                CategoryBin::new(labels[i].clone(), lower, upper)
            })
            .collect();
        Ok(Self { bins })
    }

    fn fixed(edges: &[f64], labels: &[&str]) -> Self {
        let bins = edges
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(i, (&lower, &label))| {
                let upper = edges.get(i + 1).copied().unwrap_or(f64::INFINITY);
                CategoryBin::new(label, lower, upper)
            })
            .collect();
        Self { bins }
    }

    /// Rainfall amount in mm.
    pub fn rainfall_amount(timescale: Timescale) -> Self {
        match timescale {
            Timescale::Monthly => Self::fixed(&[0.0, 100.0, 300.0, 500.0], &AMOUNT_LABELS),
            Timescale::Dasarian => Self::fixed(&[0.0, 50.0, 150.0, 300.0], &AMOUNT_LABELS),
        }
    }

    /// Rainfall as percentage of normal.
    pub fn rainfall_character() -> Self {
        Self::fixed(&[0.0, 85.0, 115.0], &["Bawah Normal", "Normal", "Atas Normal"])
    }

    /// Binary forecast/observation agreement.
    pub fn verification_match() -> Self {
        Self::fixed(&[0.0, 1.0], &["Tidak Sesuai", "Sesuai"])
    }

    /// Bins from a caller-supplied level list, labelled `"lo-hi"` with a
    /// final `">=last"` bin.
    pub fn from_levels(levels: &[f64]) -> Result<Self> {
        let labels: Vec<String> = levels
            .windows(2)
            .map(|w| format!("{}-{}", w[0], w[1]))
            .chain(levels.last().map(|last| format!(">={last}")))
            .collect();
        Self::from_edges(levels, &labels)
    }

    /// Table for a semantic field. `Other` needs `levels`.
    pub fn for_field(field: FieldKind, timescale: Timescale, levels: Option<&[f64]>) -> Result<Self> {
        match field {
            FieldKind::RainfallAmount => Ok(Self::rainfall_amount(timescale)),
            FieldKind::RainfallCharacter => Ok(Self::rainfall_character()),
            FieldKind::VerificationMatch => Ok(Self::verification_match()),
            FieldKind::Other => match levels {
                Some(levels) => Self::from_levels(levels),
                None => Err(Error::config("counting an unclassified field needs a level list")),
            },
        }
    }

    pub fn bins(&self) -> &[CategoryBin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.bins.iter().map(|b| b.label.as_str())
    }

    /// Index of the bin holding `value`, `None` for NaN.
    pub fn bin_of(&self, value: f64) -> Option<usize> {
        if value.is_nan() || self.bins.is_empty() {
            return None;
        }
        // First bin whose upper edge lies above the value; the open ends
        // catch everything below the first edge and from the last edge up.
        let idx = self.bins.partition_point(|b| b.upper <= value);
        Some(idx.min(self.bins.len() - 1))
    }
}
