//! Categorical binning of station values
//!
//! - **categorize_ch**: rainfall amount to 4 ordinal categories
//! - **categorize_index**: rainfall amount to a 9-step index

mod categorize;

pub use categorize::{
    categorize_ch, categorize_index, RawValue, CH_CATEGORIES, FALLBACK_CATEGORY, INDEX_CATEGORIES,
};
