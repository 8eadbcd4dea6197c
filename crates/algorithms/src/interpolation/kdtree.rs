//! 2D k-d tree over station coordinates
//!
//! Nearest and k-nearest queries for the spatial cache and the
//! gap-filling step of grid resampling. Distances are Euclidean in
//! degrees, matching what the interpolators weight by.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A neighbour found by a query: index into the indexed coordinate
/// arrays and its Euclidean distance from the query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

#[derive(Debug)]
struct KdNode {
    /// Index into the coordinate arrays
    point: usize,
    /// 0 = split on x, 1 = split on y
    axis: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// Immutable nearest-neighbour index over `(x, y)` coordinates.
#[derive(Debug)]
pub struct KdTree {
    xs: Vec<f64>,
    ys: Vec<f64>,
    nodes: Vec<KdNode>,
}

/// Heap entry ordered by squared distance, ties broken by index so the
/// query result is fully deterministic.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    dist_sq: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.index.cmp(&other.index))
    }
}

impl KdTree {
    /// Build a tree from parallel coordinate slices.
    ///
    /// Construction is O(n log² n) using median splits. Non-finite
    /// coordinates are skipped; their indices are never returned.
    pub fn build(xs: &[f64], ys: &[f64]) -> Self {
        debug_assert_eq!(xs.len(), ys.len());
        let n = xs.len().min(ys.len());
        let mut order: Vec<usize> = (0..n)
            .filter(|&i| xs[i].is_finite() && ys[i].is_finite())
            .collect();
        let mut nodes = Vec::with_capacity(order.len());
        let mut tree = Self {
            xs: xs[..n].to_vec(),
            ys: ys[..n].to_vec(),
            nodes: Vec::new(),
        };
        if !order.is_empty() {
            tree.build_recursive(&mut order, 0, &mut nodes);
        }
        tree.nodes = nodes;
        tree
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    fn coord(&self, i: usize, axis: u8) -> f64 {
        if axis == 0 {
            self.xs[i]
        } else {
            self.ys[i]
        }
    }

    fn build_recursive(&self, order: &mut [usize], depth: usize, nodes: &mut Vec<KdNode>) -> usize {
        let axis = (depth % 2) as u8;
        order.sort_by(|&a, &b| {
            self.coord(a, axis)
                .total_cmp(&self.coord(b, axis))
                .then(a.cmp(&b))
        });

        let median = order.len() / 2;
        let node_idx = nodes.len();
        nodes.push(KdNode {
            point: order[median],
            axis,
            left: None,
            right: None,
        });

        let (lower, rest) = order.split_at_mut(median);
        let upper = &mut rest[1..];
        if !lower.is_empty() {
            let left = self.build_recursive(lower, depth + 1, nodes);
            nodes[node_idx].left = Some(left);
        }
        if !upper.is_empty() {
            let right = self.build_recursive(upper, depth + 1, nodes);
            nodes[node_idx].right = Some(right);
        }
        node_idx
    }

    /// Closest point to `(qx, qy)`, or `None` for an empty tree.
    pub fn nearest(&self, qx: f64, qy: f64) -> Option<Neighbor> {
        self.k_nearest(qx, qy, 1).into_iter().next()
    }

    /// The `k` closest points, sorted by ascending distance.
    ///
    /// Returns fewer than `k` results only when the tree holds fewer
    /// than `k` points.
    pub fn k_nearest(&self, qx: f64, qy: f64, k: usize) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.knn_recursive(0, qx, qy, k, &mut heap);

        heap.into_sorted_vec()
            .into_iter()
            .map(|c| Neighbor {
                index: c.index,
                distance: c.dist_sq.sqrt(),
            })
            .collect()
    }

    fn knn_recursive(&self, node_idx: usize, qx: f64, qy: f64, k: usize, heap: &mut BinaryHeap<Candidate>) {
        let node = &self.nodes[node_idx];
        let dx = qx - self.xs[node.point];
        let dy = qy - self.ys[node.point];
        let candidate = Candidate {
            dist_sq: dx * dx + dy * dy,
            index: node.point,
        };

        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }

        let diff = if node.axis == 0 { dx } else { dy };
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = near {
            self.knn_recursive(child, qx, qy, k, heap);
        }

        let must_cross = heap.len() < k || heap.peek().is_some_and(|worst| diff * diff <= worst.dist_sq);
        if must_cross {
            if let Some(child) = far {
                self.knn_recursive(child, qx, qy, k, heap);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Vec<f64>, Vec<f64>) {
        (
            vec![2.0, 5.0, 9.0, 4.0, 8.0, 7.0, 1.0, 6.0],
            vec![3.0, 4.0, 6.0, 7.0, 1.0, 2.0, 8.0, 5.0],
        )
    }

    fn brute_force(xs: &[f64], ys: &[f64], qx: f64, qy: f64) -> Vec<(f64, usize)> {
        let mut d: Vec<(f64, usize)> = xs
            .iter()
            .zip(ys)
            .enumerate()
            .map(|(i, (x, y))| (((x - qx).powi(2) + (y - qy).powi(2)).sqrt(), i))
            .collect();
        d.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        d
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(&[], &[]);
        assert!(tree.is_empty());
        assert!(tree.nearest(0.0, 0.0).is_none());
        assert!(tree.k_nearest(0.0, 0.0, 3).is_empty());
    }

    #[test]
    fn test_nearest_exact_hit() {
        let (xs, ys) = sample();
        let tree = KdTree::build(&xs, &ys);
        let hit = tree.nearest(5.0, 4.0).unwrap();
        assert_eq!(hit.index, 1);
        assert_eq!(hit.distance, 0.0);
    }

    #[test]
    fn test_k_nearest_matches_brute_force() {
        let (xs, ys) = sample();
        let tree = KdTree::build(&xs, &ys);

        for qx in 0..10 {
            for qy in 0..10 {
                let (qx, qy) = (qx as f64 + 0.3, qy as f64 + 0.7);
                let got = tree.k_nearest(qx, qy, 4);
                let want = brute_force(&xs, &ys, qx, qy);
                assert_eq!(got.len(), 4);
                for (g, w) in got.iter().zip(&want) {
                    assert!((g.distance - w.0).abs() < 1e-12, "({qx}, {qy})");
                }
                for pair in got.windows(2) {
                    assert!(pair[0].distance <= pair[1].distance);
                }
            }
        }
    }

    #[test]
    fn test_k_larger_than_tree() {
        let (xs, ys) = sample();
        let tree = KdTree::build(&xs, &ys);
        assert_eq!(tree.k_nearest(5.0, 5.0, 100).len(), xs.len());
    }

    #[test]
    fn test_non_finite_points_skipped() {
        let tree = KdTree::build(&[0.0, f64::NAN, 3.0], &[0.0, 1.0, 3.0]);
        assert_eq!(tree.len(), 2);
        let all = tree.k_nearest(1.0, 1.0, 5);
        assert!(all.iter().all(|n| n.index != 1));
    }

    #[test]
    fn test_duplicate_points_deterministic() {
        let xs = vec![1.0, 1.0, 1.0, 2.0];
        let ys = vec![1.0, 1.0, 1.0, 2.0];
        let tree = KdTree::build(&xs, &ys);
        let a = tree.k_nearest(1.0, 1.0, 2);
        let b = tree.k_nearest(1.0, 1.0, 2);
        assert_eq!(a, b);
        assert_eq!(a[0].index, 0);
        assert_eq!(a[1].index, 1);
    }

    #[test]
    fn test_large_dataset() {
        let xs: Vec<f64> = (0..1000).map(|i| ((i * 7 + 13) % 100) as f64).collect();
        let ys: Vec<f64> = (0..1000).map(|i| ((i * 11 + 37) % 100) as f64).collect();
        let tree = KdTree::build(&xs, &ys);
        assert_eq!(tree.len(), 1000);

        let got = tree.nearest(50.5, 49.5).unwrap();
        let want = brute_force(&xs, &ys, 50.5, 49.5)[0];
        assert!((got.distance - want.0).abs() < 1e-12);
    }
}
