//! Forecast/observation contingency tables
//!
//! Rows are forecast categories, columns observed categories. The table
//! always spans the full category list of its scheme, whether or not a
//! category occurs, and exposes the `All` margins as row/column totals.

use ndarray::Array2;
use staklim_core::{Error, Result};
use tracing::debug;

/// Row or column selector including the margin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Margin {
    Category(u8),
    All,
}

/// Square count matrix over a fixed category list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContingencyTable {
    categories: Vec<u8>,
    counts: Array2<usize>,
}

impl ContingencyTable {
    /// Empty table over `categories`.
    pub fn new(categories: &[u8]) -> Self {
        let n = categories.len();
        Self {
            categories: categories.to_vec(),
            counts: Array2::zeros((n, n)),
        }
    }

    /// Cross-tabulate aligned series. Pairs with a category outside the
    /// list are not counted.
    pub fn from_pairs(forecast: &[u8], observed: &[u8], categories: &[u8]) -> Result<Self> {
        if forecast.len() != observed.len() {
            return Err(Error::SizeMismatch {
                er: forecast.len(),
                ec: 1,
                ar: observed.len(),
                ac: 1,
            });
        }

        let mut table = Self::new(categories);
        let mut skipped = 0usize;
        for (&f, &o) in forecast.iter().zip(observed) {
            match (table.position(f), table.position(o)) {
                (Some(i), Some(j)) => table.counts[[i, j]] += 1,
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!(skipped, "pairs outside the category list");
        }
        Ok(table)
    }

    fn position(&self, category: u8) -> Option<usize> {
        self.categories.iter().position(|&c| c == category)
    }

    pub fn categories(&self) -> &[u8] {
        &self.categories
    }

    /// Counts without margins, `(forecast, observed)`.
    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn row_total(&self, i: usize) -> usize {
        self.counts.row(i).sum()
    }

    pub fn col_total(&self, j: usize) -> usize {
        self.counts.column(j).sum()
    }

    /// Grand total (the `All`/`All` cell).
    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    /// Sum of the diagonal: stations whose forecast category was right.
    pub fn hits(&self) -> usize {
        self.counts.diag().sum()
    }

    /// Cell lookup by label, margins included. Unknown categories read 0.
    pub fn get(&self, forecast: Margin, observed: Margin) -> usize {
        match (forecast, observed) {
            (Margin::All, Margin::All) => self.total(),
            (Margin::Category(f), Margin::All) => self.position(f).map_or(0, |i| self.row_total(i)),
            (Margin::All, Margin::Category(o)) => self.position(o).map_or(0, |j| self.col_total(j)),
            (Margin::Category(f), Margin::Category(o)) => match (self.position(f), self.position(o)) {
                (Some(i), Some(j)) => self.counts[[i, j]],
                _ => 0,
            },
        }
    }

    /// `(n + 1) x (n + 1)` matrix with the `All` row and column last.
    pub fn with_margins(&self) -> Array2<usize> {
        let n = self.categories.len();
        let mut out = Array2::zeros((n + 1, n + 1));
        out.slice_mut(ndarray::s![..n, ..n]).assign(&self.counts);
        for i in 0..n {
            out[[i, n]] = self.row_total(i);
            out[[n, i]] = self.col_total(i);
        }
        out[[n, n]] = self.total();
        out
    }
}
