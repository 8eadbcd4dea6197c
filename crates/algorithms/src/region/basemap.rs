//! Region selection
//!
//! Picks the administrative units to map from the full boundary table,
//! by province name first and regency name second, and collects the
//! neighbouring units drawn as context around the selection.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use staklim_core::config::RegionQuery;
use staklim_core::{AdminUnit, Error, RegionSet, Result};
use strsim::normalized_levenshtein;
use tracing::{debug, warn};

use super::aggregate::AdminLevel;

/// Units selected for one map
#[derive(Debug, Clone, PartialEq)]
pub struct Basemap {
    /// Units that are interpolated, clipped and counted
    pub main: RegionSet,
    /// Nearby units drawn for context; `None` when disabled or empty
    pub others: Option<RegionSet>,
    /// Display title, e.g. "Provinsi Papua Barat DAN Papua Barat Daya"
    pub title: String,
    /// Level the query names matched at
    pub level: AdminLevel,
    /// Canonical names the query resolved to, in query order
    pub matched: Vec<String>,
}

const NAME_PREFIXES: [&str; 2] = ["Kota", "Kabupaten"];

/// Minimum normalized Levenshtein similarity for a fuzzy name match
const FUZZY_CUTOFF: f64 = 0.8;

/// Lowercase, punctuation to spaces, whitespace collapsed.
fn normalize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Best-scoring name at or above [`FUZZY_CUTOFF`]; ties keep the first name.
fn fuzzy_match(query: &str, names: &BTreeSet<&str>) -> Option<String> {
    let query = normalize(query);
    if query.is_empty() {
        return None;
    }
    let mut best: Option<(&str, f64)> = None;
    for &name in names {
        let score = normalized_levenshtein(&query, &normalize(name));
        if score >= FUZZY_CUTOFF && best.map_or(true, |(_, s)| score > s) {
            best = Some((name, score));
        }
    }
    best.map(|(name, score)| {
        debug!(query = %query, name, score, "fuzzy region name match");
        name.to_string()
    })
}

/// Resolve a user-typed name against the known names.
///
/// Tried in order: exact, exact with a "Kota"/"Kabupaten" prefix, fuzzy on
/// the bare name, then fuzzy with each prefix in turn.
fn match_name(query: &str, names: &BTreeSet<&str>) -> Option<String> {
    let prefixed: Vec<String> = NAME_PREFIXES
        .iter()
        .filter(|p| !query.starts_with(*p))
        .map(|p| format!("{p} {query}"))
        .collect();

    if names.contains(query) {
        return Some(query.to_string());
    }
    if let Some(hit) = prefixed.iter().find(|q| names.contains(q.as_str())) {
        return Some(hit.clone());
    }

    std::iter::once(query)
        .chain(prefixed.iter().map(String::as_str))
        .find_map(|q| fuzzy_match(q, names))
}

fn level_name(unit: &AdminUnit, level: AdminLevel) -> &str {
    match level {
        AdminLevel::Province => &unit.province,
        AdminLevel::Regency => &unit.regency,
    }
}

/// `"{prefix} A"`, `"{prefix} A DAN B"`, `"{prefix} A, B, DAN C"`.
pub fn format_title(level: AdminLevel, names: &[String]) -> String {
    let prefix = match level {
        AdminLevel::Province => "Provinsi",
        AdminLevel::Regency => "Kabupaten",
    };
    match names {
        [] => prefix.to_string(),
        [one] => format!("{prefix} {one}"),
        [a, b] => format!("{prefix} {a} DAN {b}"),
        [head @ .., last] => format!("{prefix} {}, DAN {last}", head.join(", ")),
    }
}

/// Select the units named by `query` from `boundaries`.
///
/// Province names are tried first; regency names only when no province
/// matched. Fails with [`Error::RegionNotFound`] when nothing matches.
pub fn select_basemap(boundaries: &RegionSet, query: &RegionQuery) -> Result<Basemap> {
    if query.names.is_empty() {
        return Err(Error::config("region query has no names"));
    }

    for level in [AdminLevel::Province, AdminLevel::Regency] {
        let names: BTreeSet<&str> = boundaries.iter().map(|u| level_name(u, level)).collect();

        let mut matched: Vec<String> = Vec::new();
        for q in &query.names {
            if let Some(m) = match_name(q.trim(), &names) {
                if !matched.contains(&m) {
                    matched.push(m);
                }
            }
        }
        if matched.is_empty() {
            continue;
        }
        if matched.len() < query.names.len() {
            warn!(?level, query = ?query.names, ?matched, "some region names matched nothing");
        }

        let main: RegionSet = boundaries
            .iter()
            .filter(|u| matched.iter().any(|m| m == level_name(u, level)))
            .cloned()
            .collect();

        let others = if query.include_others {
            let reach = main.bounds()?.expand(query.others_buffer_deg);
            let nearby: RegionSet = boundaries
                .iter()
                .filter(|u| !matched.iter().any(|m| m == level_name(u, level)))
                .filter(|u| u.bounds().is_some_and(|b| b.intersects(&reach)))
                .cloned()
                .collect();
            (!nearby.is_empty()).then_some(nearby)
        } else {
            None
        };

        debug!(
            ?level,
            units = main.len(),
            others = others.as_ref().map_or(0, RegionSet::len),
            "basemap selected"
        );
        return Ok(Basemap {
            title: format_title(level, &matched),
            main,
            others,
            level,
            matched,
        });
    }

    Err(Error::RegionNotFound(query.names.join(", ")))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegionKey {
    names: Vec<String>,
    include_others: bool,
    buffer_bits: u64,
}

impl From<&RegionQuery> for RegionKey {
    fn from(q: &RegionQuery) -> Self {
        Self {
            names: q.names.iter().map(|n| n.trim().to_string()).collect(),
            include_others: q.include_others,
            buffer_bits: q.others_buffer_deg.to_bits(),
        }
    }
}

/// Memoized basemap selection, keyed by the query.
#[derive(Debug, Default)]
pub struct RegionCache {
    entries: Mutex<HashMap<RegionKey, Arc<Basemap>>>,
}

impl RegionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<RegionKey, Arc<Basemap>>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Other("region cache lock poisoned".into()))
    }

    /// Cached [`select_basemap`].
    pub fn get_or_select(&self, boundaries: &RegionSet, query: &RegionQuery) -> Result<Arc<Basemap>> {
        let key = RegionKey::from(query);
        if let Some(hit) = self.entries()?.get(&key) {
            return Ok(Arc::clone(hit));
        }
        let basemap = Arc::new(select_basemap(boundaries, query)?);
        let mut entries = self.entries()?;
        Ok(Arc::clone(entries.entry(key).or_insert(basemap)))
    }

    pub fn clear(&self) -> Result<()> {
        self.entries()?.clear();
        debug!("region cache cleared");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
