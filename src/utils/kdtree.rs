use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::{Array2, ArrayView1, ArrayView2};

/// Exact nearest-neighbour search over a fixed set of points.
pub trait SpatialIndex: Sync + Sized {
    /// Build an index over the rows of `points`.
    fn build(points: ArrayView2<f64>) -> Self;

    /// Row indices of the `k` nearest points to `query`, closest first.
    /// Returns fewer than `k` indices only when the index holds fewer points.
    fn query(&self, query: ArrayView1<f64>, k: usize) -> Vec<usize>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

const LEAF_SIZE: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Neighbor {
    dist: f64,
    index: usize,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equal distances resolve to the lower row index.
impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then(self.index.cmp(&other.index))
    }
}

#[derive(Debug)]
enum Node {
    Leaf { start: usize, end: usize },
    Split { dim: usize, value: f64, left: usize, right: usize },
}

/// Euclidean k-d tree with bucketed leaves.
#[derive(Debug)]
pub struct KdTree {
    points: Array2<f64>,
    order: Vec<usize>,
    nodes: Vec<Node>,
}

impl KdTree {
    fn build_node(&mut self, start: usize, end: usize) -> usize {
        if end - start <= LEAF_SIZE {
            self.nodes.push(Node::Leaf { start, end });
            return self.nodes.len() - 1;
        }

        // Split on the dimension with the widest spread
        let mut dim = 0;
        let mut widest = f64::NEG_INFINITY;
        for d in 0..self.points.ncols() {
            let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
            for &i in &self.order[start..end] {
                let v = self.points[[i, d]];
                lo = lo.min(v);
                hi = hi.max(v);
            }
            if hi - lo > widest {
                widest = hi - lo;
                dim = d;
            }
        }
        if widest <= 0.0 {
            // All points coincide; nothing to split on.
            self.nodes.push(Node::Leaf { start, end });
            return self.nodes.len() - 1;
        }

        let mid = start + (end - start) / 2;
        let points = &self.points;
        self.order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            points[[a, dim]].total_cmp(&points[[b, dim]])
        });
        let value = self.points[[self.order[mid], dim]];

        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf { start, end });
        let left = self.build_node(start, mid);
        let right = self.build_node(mid, end);
        self.nodes[slot] = Node::Split { dim, value, left, right };
        slot
    }

    fn search(&self, node: usize, query: ArrayView1<f64>, k: usize, heap: &mut BinaryHeap<Neighbor>) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &i in &self.order[start..end] {
                    let dist = self
                        .points
                        .row(i)
                        .iter()
                        .zip(query.iter())
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum::<f64>();
                    let candidate = Neighbor { dist, index: i };
                    if heap.len() < k {
                        heap.push(candidate);
                    } else if heap.peek().map_or(false, |worst| candidate < *worst) {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
            Node::Split { dim, value, left, right } => {
                let diff = query[dim] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                self.search(near, query, k, heap);

                let gap = diff * diff;
                let visit_far = heap.len() < k || heap.peek().map_or(true, |worst| gap <= worst.dist);
                if visit_far {
                    self.search(far, query, k, heap);
                }
            }
        }
    }
}

impl SpatialIndex for KdTree {
    fn build(points: ArrayView2<f64>) -> Self {
        let n = points.nrows();
        let mut tree = KdTree {
            points: points.to_owned(),
            order: (0..n).collect(),
            nodes: Vec::new(),
        };
        if n > 0 {
            tree.build_node(0, n);
        }
        tree
    }

    fn query(&self, query: ArrayView1<f64>, k: usize) -> Vec<usize> {
        if k == 0 || self.nodes.is_empty() {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.search(0, query, k, &mut heap);
        heap.into_sorted_vec().into_iter().map(|n| n.index).collect()
    }

    fn len(&self) -> usize {
        self.points.nrows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn brute_force(points: &Array2<f64>, q: &[f64], k: usize) -> Vec<usize> {
        let mut all: Vec<Neighbor> = points
            .outer_iter()
            .enumerate()
            .map(|(index, row)| Neighbor {
                dist: row.iter().zip(q).map(|(a, b)| (a - b) * (a - b)).sum(),
                index,
            })
            .collect();
        all.sort();
        all.into_iter().take(k).map(|n| n.index).collect()
    }

    #[test]
    fn matches_brute_force_search() {
        let mut rng = StdRng::seed_from_u64(7);
        let points = Array2::from_shape_fn((300, 4), |_| rng.gen_range(-5.0..5.0));
        let tree = KdTree::build(points.view());

        for _ in 0..25 {
            let q: Vec<f64> = (0..4).map(|_| rng.gen_range(-6.0..6.0)).collect();
            let got = tree.query(ndarray::ArrayView1::from(&q[..]), 10);
            assert_eq!(got, brute_force(&points, &q, 10));
        }
    }

    #[test]
    fn ties_resolve_to_lower_index() {
        let points = array![[1.0], [-1.0], [1.0], [-1.0], [5.0]];
        let tree = KdTree::build(points.view());
        assert_eq!(tree.query(array![0.0].view(), 3), vec![0, 1, 2]);
    }

    #[test]
    fn k_larger_than_index_returns_everything() {
        let points = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        let tree = KdTree::build(points.view());
        assert_eq!(tree.query(array![2.1, 2.1].view(), 10), vec![2, 1, 0]);
        assert_eq!(tree.len(), 3);
        assert!(tree.query(array![0.0, 0.0].view(), 0).is_empty());
    }

    #[test]
    fn duplicate_points_do_not_recurse_forever() {
        let points = Array2::from_elem((100, 2), 3.0);
        let tree = KdTree::build(points.view());
        assert_eq!(tree.query(array![3.0, 3.0].view(), 4), vec![0, 1, 2, 3]);
    }
}
