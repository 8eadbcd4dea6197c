//! Skill scores from a contingency table
//!
//! - accuracy: fraction of stations on the diagonal
//! - HSS: Heidke skill score, computed as Cohen's kappa between the two
//!   category series
//! - PSS: Peirce skill score,
//!   `(Σ p(i,i) − Σ p(i,All)·p(All,i)) / (1 − Σ p(All,i)²)`
//!
//! A score whose denominator vanishes is reported as `None` rather than
//! as ±∞ or NaN.
//!
//! Reference:
//! Wilks, D.S. (2011). Statistical Methods in the Atmospheric Sciences,
//! 3rd ed., §8.2.

use staklim_core::{Algorithm, Error, Result};
use tracing::warn;

use super::contingency::ContingencyTable;

/// Denominators smaller than this are treated as zero
const DEGENERATE_EPS: f64 = 1e-12;

/// Verification scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationMetrics {
    /// In `[0, 1]`
    pub accuracy: f64,
    /// `None` when expected agreement is 1
    pub hss: Option<f64>,
    /// `None` when every observation is in one category
    pub pss: Option<f64>,
}

impl VerificationMetrics {
    pub fn require_hss(&self) -> Result<f64> {
        self.hss
            .ok_or_else(|| Error::DegenerateVerification("HSS undefined: expected agreement is 1".into()))
    }

    pub fn require_pss(&self) -> Result<f64> {
        self.pss.ok_or_else(|| {
            Error::DegenerateVerification("PSS undefined: all observations fall in one category".into())
        })
    }
}

/// Compute accuracy, HSS and PSS.
///
/// An all-zero table is [`Error::DegenerateVerification`]: there is
/// nothing to score, which is different from a forecast that was wrong.
pub fn calculate_metrics(table: &ContingencyTable) -> Result<VerificationMetrics> {
    let total = table.total();
    if total == 0 {
        return Err(Error::DegenerateVerification(
            "contingency table is empty: no matched stations".into(),
        ));
    }

    let n = total as f64;
    let k = table.categories().len();
    let hits = table.hits() as f64 / n;

    let mut pixoi = 0.0;
    let mut oi2 = 0.0;
    for i in 0..k {
        let forecast_p = table.row_total(i) as f64 / n;
        let observed_p = table.col_total(i) as f64 / n;
        pixoi += forecast_p * observed_p;
        oi2 += observed_p * observed_p;
    }

    let accuracy = hits;

    // Cohen's kappa: observed agreement vs agreement expected from margins
    let hss = if (1.0 - pixoi).abs() < DEGENERATE_EPS {
        warn!("HSS undefined: forecast and observation both constant and equal");
        None
    } else {
        Some((hits - pixoi) / (1.0 - pixoi))
    };

    let pss = if (1.0 - oi2).abs() < DEGENERATE_EPS {
        warn!("PSS undefined: all observations in one category");
        None
    } else {
        Some((hits - pixoi) / (1.0 - oi2))
    };

    Ok(VerificationMetrics { accuracy, hss, pss })
}

/// Scoring as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct VerificationScorer;

impl Algorithm for VerificationScorer {
    type Input = ContingencyTable;
    type Output = VerificationMetrics;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Verification Scorer"
    }

    fn description(&self) -> &'static str {
        "Accuracy, Heidke and Peirce skill scores from a contingency table"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        calculate_metrics(&input)
    }
}
