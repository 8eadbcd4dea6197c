//! Spatial cache
//!
//! Memoizes everything about an interpolation that depends only on where
//! the stations are and which region is mapped: the output grid, the
//! k-d tree over the stations and the k-nearest table for every grid
//! node. Entries are keyed by the exact bit content of the bounds and of
//! the coordinate arrays, never by approximate equality.
//!
//! The cache is an ordinary value owned by whoever orchestrates a run
//! (see [`crate::pipeline::MapEngine`]). Each key owns a write-once slot.
//! Entries are built outside every lock and published whole, so readers
//! see a finished entry or nothing. Two threads missing the same key may
//! both compute; the first to publish wins and both return its entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use ndarray::Array2;
use staklim_core::config::OUTPUT_CELL_SIZE;
use staklim_core::{BoundingBox, Error, Result};
use tracing::debug;

use super::grid::GridTemplate;
use super::kdtree::KdTree;
use crate::maybe_rayon::*;

/// Exact identity of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpatialKey {
    bounds: [u64; 4],
    lon_bytes: Vec<u8>,
    lat_bytes: Vec<u8>,
    neighbors: usize,
}

impl SpatialKey {
    pub fn new(bounds: &BoundingBox, lons: &[f64], lats: &[f64], neighbors: usize) -> Self {
        Self {
            bounds: bounds.key_bits(),
            lon_bytes: raw_bytes(lons),
            lat_bytes: raw_bytes(lats),
            neighbors,
        }
    }

    /// Short human-readable form for logs and error messages.
    pub fn summary(&self) -> String {
        summarize(self.bounds, self.lon_bytes.len() / 8, self.neighbors)
    }
}

fn summarize(bounds: [u64; 4], stations: usize, k: usize) -> String {
    let b = bounds.map(f64::from_bits);
    format!("bounds=({}, {}, {}, {}) stations={stations} k={k}", b[0], b[1], b[2], b[3])
}

fn raw_bytes(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Grid, station index and k-nearest table for one key.
#[derive(Debug)]
pub struct SpatialCacheEntry {
    key: SpatialKey,
    grid: Arc<GridTemplate>,
    index: KdTree,
    station_count: usize,
    /// `(grid nodes, k)` distances in degrees, ascending per row
    distances: Array2<f64>,
    /// `(grid nodes, k)` station indices matching `distances`
    indices: Array2<usize>,
}

impl SpatialCacheEntry {
    pub fn key(&self) -> &SpatialKey {
        &self.key
    }

    pub fn grid(&self) -> &GridTemplate {
        &self.grid
    }

    pub fn index(&self) -> &KdTree {
        &self.index
    }

    /// Number of stations the entry was built for.
    pub fn station_count(&self) -> usize {
        self.station_count
    }

    pub fn neighbors(&self) -> usize {
        self.indices.ncols()
    }

    pub fn distances(&self) -> &Array2<f64> {
        &self.distances
    }

    pub fn indices(&self) -> &Array2<usize> {
        &self.indices
    }

    fn summary(&self) -> String {
        summarize(self.grid.bounds().key_bits(), self.station_count, self.neighbors())
    }
}

/// Fails with [`Error::CacheKeyMismatch`] when the entry was not built for
/// the grid, station count and `k` that `key` describes.
fn check_entry(entry: &SpatialCacheEntry, key: &SpatialKey) -> Result<()> {
    let consistent = entry.grid.bounds().key_bits() == key.bounds
        && entry.station_count * 8 == key.lon_bytes.len()
        && entry.neighbors() == key.neighbors;
    if consistent {
        Ok(())
    } else {
        Err(Error::CacheKeyMismatch {
            expected: key.summary(),
            found: entry.summary(),
        })
    }
}

type Slot = Arc<OnceLock<Arc<SpatialCacheEntry>>>;

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| Error::Other("spatial cache lock poisoned".into()))
}

/// Get-or-compute store of [`SpatialCacheEntry`] values.
#[derive(Debug)]
pub struct SpatialCache {
    cell_size: f64,
    slots: Mutex<HashMap<SpatialKey, Slot>>,
    grids: Mutex<HashMap<[u64; 4], Arc<GridTemplate>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Default for SpatialCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialCache {
    /// Cache producing grids at the production cell size.
    pub fn new() -> Self {
        Self::with_cell_size(OUTPUT_CELL_SIZE)
    }

    pub fn with_cell_size(cell_size: f64) -> Self {
        Self {
            cell_size,
            slots: Mutex::new(HashMap::new()),
            grids: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Grid for `bounds`, built once per distinct bounding box.
    pub fn grid(&self, bounds: &BoundingBox) -> Result<Arc<GridTemplate>> {
        let key = bounds.key_bits();
        if let Some(grid) = lock(&self.grids)?.get(&key) {
            return Ok(Arc::clone(grid));
        }

        let grid = Arc::new(GridTemplate::with_cell_size(*bounds, self.cell_size)?);
        let (rows, cols) = grid.shape();
        debug!(rows, cols, cell_size = self.cell_size, "built output grid");

        let mut grids = lock(&self.grids)?;
        Ok(Arc::clone(grids.entry(key).or_insert(grid)))
    }

    /// Return the entry for `(bounds, lons, lats, k)`, computing it on a miss.
    ///
    /// `k` must lie in `1..=n` where `n` is the number of stations with
    /// finite coordinates; otherwise [`Error::InsufficientStations`].
    pub fn get_spatial(
        &self,
        bounds: &BoundingBox,
        lons: &[f64],
        lats: &[f64],
        k: usize,
    ) -> Result<Arc<SpatialCacheEntry>> {
        if lons.len() != lats.len() {
            return Err(Error::SizeMismatch {
                er: lons.len(),
                ec: 1,
                ar: lats.len(),
                ac: 1,
            });
        }
        let available = lons
            .iter()
            .zip(lats)
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .count();
        if k == 0 || k > available {
            return Err(Error::InsufficientStations { required: k.max(1), available });
        }

        let key = SpatialKey::new(bounds, lons, lats, k);
        let slot = {
            let mut slots = lock(&self.slots)?;
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        if let Some(entry) = slot.get() {
            check_entry(entry, &key)?;
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key.summary(), "spatial cache hit");
            return Ok(Arc::clone(entry));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key.summary(), "spatial cache miss");
        let entry = match self.compute(key.clone(), bounds, lons, lats, k) {
            Ok(entry) => entry,
            Err(e) => {
                self.discard_empty(&key, &slot)?;
                return Err(e);
            }
        };
        let published = slot.get_or_init(|| Arc::new(entry));
        check_entry(published, &key)?;
        Ok(Arc::clone(published))
    }

    /// Remove `slot` from the map if it is still the slot for `key` and
    /// nothing was published into it.
    fn discard_empty(&self, key: &SpatialKey, slot: &Slot) -> Result<()> {
        let mut slots = lock(&self.slots)?;
        let unused = slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && current.get().is_none());
        if unused {
            slots.remove(key);
        }
        Ok(())
    }

    fn compute(
        &self,
        key: SpatialKey,
        bounds: &BoundingBox,
        lons: &[f64],
        lats: &[f64],
        k: usize,
    ) -> Result<SpatialCacheEntry> {
        let grid = self.grid(bounds)?;
        let index = KdTree::build(lons, lats);
        let n_nodes = grid.len();

        let rows: Vec<Vec<(f64, usize)>> = (0..n_nodes)
            .into_par_iter()
            .map(|i| {
                let (x, y) = grid.node(i);
                index
                    .k_nearest(x, y, k)
                    .into_iter()
                    .map(|nb| (nb.distance, nb.index))
                    .collect()
            })
            .collect();

        let mut distances = Array2::<f64>::zeros((n_nodes, k));
        let mut indices = Array2::<usize>::zeros((n_nodes, k));
        for (i, row) in rows.iter().enumerate() {
            if row.len() != k {
                return Err(Error::InsufficientStations { required: k, available: row.len() });
            }
            for (j, &(d, idx)) in row.iter().enumerate() {
                distances[[i, j]] = d;
                indices[[i, j]] = idx;
            }
        }

        debug!(nodes = n_nodes, k, stations = index.len(), "k-nearest table built");

        Ok(SpatialCacheEntry {
            key,
            grid,
            index,
            station_count: lons.len(),
            distances,
            indices,
        })
    }

    /// Drop every entry and grid. In-flight computations finish into
    /// detached slots and are not visible afterwards.
    pub fn clear(&self) -> Result<()> {
        let dropped = {
            let mut slots = lock(&self.slots)?;
            let n = slots.len();
            slots.clear();
            n
        };
        lock(&self.grids)?.clear();
        debug!(entries = dropped, "spatial cache cleared");
        Ok(())
    }

    /// Number of published entries.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| {
                slots.values().filter(|s| s.get().is_some()).count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since construction.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn bounds() -> BoundingBox {
        BoundingBox::new(0.0, 0.0, 1.0, 1.0)
    }

    fn cache() -> SpatialCache {
        SpatialCache::with_cell_size(0.25)
    }

    #[test]
    fn test_miss_then_hit() {
        let c = cache();
        let lons = vec![0.1, 0.9, 0.5];
        let lats = vec![0.1, 0.2, 0.8];

        let a = c.get_spatial(&bounds(), &lons, &lats, 2).unwrap();
        let b = c.get_spatial(&bounds(), &lons, &lats, 2).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(c.stats(), (1, 1));
        assert_eq!(c.len(), 1);
        assert_eq!(a.indices().dim(), (25, 2));
    }

    #[test]
    fn test_identical_content_different_arrays() {
        let c = cache();
        let lons_a = vec![0.1, 0.9, 0.5];
        let lats_a = vec![0.1, 0.2, 0.8];
        let lons_b = lons_a.clone();
        let lats_b = lats_a.clone();

        let a = c.get_spatial(&bounds(), &lons_a, &lats_a, 3).unwrap();
        let b = c.get_spatial(&bounds(), &lons_b, &lats_b, 3).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let fresh = cache().get_spatial(&bounds(), &lons_b, &lats_b, 3).unwrap();
        assert_eq!(a.distances(), fresh.distances());
        assert_eq!(a.indices(), fresh.indices());
    }

    #[test]
    fn test_reordered_stations_are_a_different_key() {
        let c = cache();
        let a = c.get_spatial(&bounds(), &[0.1, 0.9], &[0.1, 0.2], 1).unwrap();
        let b = c.get_spatial(&bounds(), &[0.9, 0.1], &[0.2, 0.1], 1).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_different_bounds_miss() {
        let c = cache();
        let lons = [0.1, 0.9];
        let lats = [0.1, 0.2];
        c.get_spatial(&bounds(), &lons, &lats, 1).unwrap();
        c.get_spatial(&BoundingBox::new(0.0, 0.0, 2.0, 1.0), &lons, &lats, 1).unwrap();
        assert_eq!(c.stats(), (0, 2));
    }

    #[test]
    fn test_k_out_of_range() {
        let c = cache();
        let err = c.get_spatial(&bounds(), &[0.1, 0.2], &[0.1, 0.2], 3).unwrap_err();
        assert!(matches!(err, Error::InsufficientStations { required: 3, available: 2 }));
        assert!(c.get_spatial(&bounds(), &[0.1], &[0.1], 0).unwrap_err().is_insufficient_stations());
        assert!(c.get_spatial(&bounds(), &[], &[], 1).is_err());
    }

    #[test]
    fn test_degenerate_bounds() {
        let c = cache();
        let flat = BoundingBox::new(0.0, 0.0, 0.0, 1.0);
        assert!(matches!(
            c.get_spatial(&flat, &[0.0], &[0.5], 1),
            Err(Error::DegenerateBounds { .. })
        ));
    }

    #[test]
    fn test_failed_compute_leaves_no_slot() {
        let c = cache();
        let flat = BoundingBox::new(0.0, 0.0, 0.0, 1.0);
        for _ in 0..3 {
            assert!(c.get_spatial(&flat, &[0.0], &[0.5], 1).is_err());
        }
        assert_eq!(c.slot_count(), 0);
        assert!(c.is_empty());
        assert_eq!(c.stats(), (0, 3));

        c.get_spatial(&bounds(), &[0.0], &[0.5], 1).unwrap();
        assert_eq!(c.slot_count(), 1);
    }

    #[test]
    fn test_entry_checked_against_request() {
        let c = cache();
        let (lons, lats) = ([0.1, 0.9, 0.5], [0.1, 0.2, 0.8]);
        let e = c.get_spatial(&bounds(), &lons, &lats, 2).unwrap();
        assert_eq!(e.key(), &SpatialKey::new(&bounds(), &lons, &lats, 2));
        assert!(check_entry(&e, e.key()).is_ok());

        let other_k = SpatialKey::new(&bounds(), &lons, &lats, 3);
        let other_bounds = SpatialKey::new(&BoundingBox::new(0.0, 0.0, 2.0, 1.0), &lons, &lats, 2);
        let fewer = SpatialKey::new(&bounds(), &lons[..2], &lats[..2], 2);
        for key in [other_k, other_bounds, fewer] {
            assert!(matches!(check_entry(&e, &key), Err(Error::CacheKeyMismatch { .. })));
        }
    }

    #[test]
    fn test_clear_forces_recompute() {
        let c = cache();
        let lons = [0.1, 0.9];
        let lats = [0.1, 0.2];
        let a = c.get_spatial(&bounds(), &lons, &lats, 1).unwrap();
        c.clear().unwrap();
        assert!(c.is_empty());
        let b = c.get_spatial(&bounds(), &lons, &lats, 1).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.indices(), b.indices());
        assert_eq!(c.stats(), (0, 2));
    }

    #[test]
    fn test_neighbor_table_sorted() {
        let c = cache();
        let e = c
            .get_spatial(&bounds(), &[0.0, 1.0, 0.0, 1.0], &[0.0, 0.0, 1.0, 1.0], 4)
            .unwrap();
        for row in e.distances().rows() {
            for w in row.as_slice().unwrap().windows(2) {
                assert!(w[0] <= w[1]);
            }
        }
        // Node (0, 0) sits on station 0
        assert_eq!(e.indices()[[0, 0]], 0);
        assert_eq!(e.distances()[[0, 0]], 0.0);
    }

    #[test]
    fn test_concurrent_get_and_clear() {
        let c = Arc::new(cache());
        let lons = vec![0.1, 0.9, 0.5, 0.3];
        let lats = vec![0.1, 0.2, 0.8, 0.6];
        let reference = cache().get_spatial(&bounds(), &lons, &lats, 3).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let c = Arc::clone(&c);
                let (lons, lats) = (lons.clone(), lats.clone());
                thread::spawn(move || {
                    if i % 3 == 0 {
                        c.clear().unwrap();
                    }
                    c.get_spatial(&bounds(), &lons, &lats, 3).unwrap()
                })
            })
            .collect();

        for h in handles {
            let e = h.join().unwrap();
            assert_eq!(e.indices(), reference.indices());
            assert_eq!(e.distances(), reference.distances());
        }
    }
}
