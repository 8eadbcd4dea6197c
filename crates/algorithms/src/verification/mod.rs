//! Forecast verification
//!
//! - **matching**: join forecast and analysis stations, derive agreement
//!   and bias columns
//! - **contingency**: forecast x observed category counts with margins
//! - **metrics**: accuracy, Heidke (HSS) and Peirce (PSS) skill scores

mod contingency;
mod matching;
mod metrics;

pub use contingency::{ContingencyTable, Margin};
pub use matching::{
    category_pairs, columns, match_stations, MatchedStations, VerificationScheme, ANALYSIS_COLUMN,
    FORECAST_COLUMNS,
};
pub use metrics::{calculate_metrics, VerificationMetrics, VerificationScorer};
