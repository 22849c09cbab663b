//! Local region estimation by repeated random-subspace k-NN voting.
//!
//! Each iteration draws a feature subspace, indexes the training set in
//! that subspace and records the `region_size` nearest training points of
//! every query point. A training point belongs to a query's local region
//! when it was retrieved in more than `threshold * iterations` rounds.

use std::collections::BTreeMap;

use ndarray::{ArrayView2, Axis};
use rand::Rng;
use rayon::prelude::*;
use tracing::trace;

use crate::config::LscpConfig;
use crate::utils::kdtree::SpatialIndex;
use crate::utils::subspace::{sample_subspace, subspace_bounds};

/// Neighbour occurrence counts for one query point, keyed by training row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTable {
    counts: BTreeMap<usize, usize>,
}

impl VoteTable {
    fn record(&mut self, neighbors: &[usize]) {
        for &i in neighbors {
            *self.counts.entry(i).or_insert(0) += 1;
        }
    }

    /// Times training row `index` was retrieved.
    pub fn count(&self, index: usize) -> usize {
        self.counts.get(&index).copied().unwrap_or(0)
    }

    /// Sum of all recorded votes.
    pub fn total_votes(&self) -> usize {
        self.counts.values().sum()
    }

    /// Every training row retrieved at least once, ascending.
    pub fn candidates(&self) -> impl Iterator<Item = usize> + '_ {
        self.counts.keys().copied()
    }

    /// Training rows whose count is strictly greater than `cutoff`, ascending.
    pub fn region(&self, cutoff: f64) -> Vec<usize> {
        self.counts
            .iter()
            .filter(|&(_, &c)| c as f64 > cutoff)
            .map(|(&i, _)| i)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalRegionEstimator {
    region_size: usize,
    iterations: usize,
    min_features: f64,
    max_features: f64,
    threshold: f64,
}

impl LocalRegionEstimator {
    pub fn new(region_size: usize, iterations: usize, min_features: f64, max_features: f64, threshold: f64) -> Self {
        LocalRegionEstimator {
            region_size,
            iterations,
            min_features,
            max_features,
            threshold,
        }
    }

    pub fn from_config(config: &LscpConfig) -> Self {
        Self::new(
            config.local_region_size,
            config.local_region_iterations,
            config.local_min_features,
            config.local_max_features,
            config.local_region_threshold,
        )
    }

    /// Minimum number of votes a training row must exceed.
    pub fn cutoff(&self) -> f64 {
        self.threshold * self.iterations as f64
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn region_size(&self) -> usize {
        self.region_size
    }

    /// Raw vote tables, one per query row, before thresholding.
    ///
    /// One index of type `I` is built per iteration and shared read-only by
    /// all query rows, which are searched in parallel on the current rayon
    /// pool. Subspaces are drawn sequentially from `rng`.
    pub fn vote<I, R>(&self, train: ArrayView2<f64>, query: ArrayView2<f64>, rng: &mut R) -> Vec<VoteTable>
    where
        I: SpatialIndex,
        R: Rng + ?Sized,
    {
        let n_features = train.ncols();
        let (min_count, max_count) = subspace_bounds(n_features, self.min_features, self.max_features);
        let k = self.region_size.min(train.nrows());

        let mut tables = vec![VoteTable::default(); query.nrows()];
        for iteration in 0..self.iterations {
            let features = sample_subspace(&mut *rng, n_features, min_count, max_count);
            trace!(iteration, ?features, "local region subspace");

            let index = I::build(train.select(Axis(1), &features).view());
            let projected = query.select(Axis(1), &features);

            tables.par_iter_mut().enumerate().for_each(|(i, table)| {
                table.record(&index.query(projected.row(i), k));
            });
        }
        tables
    }

    /// Local region of every query row: training indices that survived the vote.
    /// A region may be empty.
    pub fn estimate<I, R>(&self, train: ArrayView2<f64>, query: ArrayView2<f64>, rng: &mut R) -> Vec<Vec<usize>>
    where
        I: SpatialIndex,
        R: Rng + ?Sized,
    {
        let cutoff = self.cutoff();
        self.vote::<I, R>(train, query, rng)
            .iter()
            .map(|table| table.region(cutoff))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::kdtree::KdTree;
    use ndarray::{array, Array2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_clusters() -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(21);
        Array2::from_shape_fn((40, 3), |(i, _)| {
            let centre = if i < 20 { 0.0 } else { 10.0 };
            centre + rng.gen_range(-1.0..1.0)
        })
    }

    #[test]
    fn region_stays_in_the_query_cluster() {
        let train = two_clusters();
        let query = array![[0.0, 0.0, 0.0], [10.0, 10.0, 10.0]];
        let estimator = LocalRegionEstimator::new(10, 20, 0.5, 1.0, 0.5);
        let mut rng = StdRng::seed_from_u64(4);

        let regions = estimator.estimate::<KdTree, _>(train.view(), query.view(), &mut rng);
        assert_eq!(regions.len(), 2);
        assert!(!regions[0].is_empty() && !regions[1].is_empty());
        assert!(regions[0].iter().all(|&i| i < 20));
        assert!(regions[1].iter().all(|&i| i >= 20));
    }

    #[test]
    fn votes_are_bounded_and_region_is_subset() {
        let train = two_clusters();
        let query = train.slice(ndarray::s![..5, ..]).to_owned();
        let estimator = LocalRegionEstimator::new(7, 12, 0.5, 1.0, 0.5);
        let mut rng = StdRng::seed_from_u64(8);

        let tables = estimator.vote::<KdTree, _>(train.view(), query.view(), &mut rng);
        for table in &tables {
            assert_eq!(table.total_votes(), 12 * 7);
            let region = table.region(estimator.cutoff());
            assert!(region.len() <= 12 * 7);
            let candidates: Vec<usize> = table.candidates().collect();
            assert!(region.iter().all(|i| candidates.contains(i)));
            assert!(region.iter().all(|&i| table.count(i) > 6));
        }
    }

    #[test]
    fn unreachable_threshold_gives_empty_regions() {
        let train = two_clusters();
        let estimator = LocalRegionEstimator::new(5, 4, 0.5, 1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(0);
        let regions = estimator.estimate::<KdTree, _>(train.view(), train.view(), &mut rng);
        assert!(regions.iter().all(|r| r.is_empty()));
    }

    #[test]
    fn region_size_is_capped_by_training_rows() {
        let train = array![[0.0], [1.0], [2.0]];
        let estimator = LocalRegionEstimator::new(50, 3, 0.5, 1.0, 0.5);
        let mut rng = StdRng::seed_from_u64(0);
        let tables = estimator.vote::<KdTree, _>(train.view(), array![[0.5]].view(), &mut rng);
        assert_eq!(tables[0].total_votes(), 9);
        assert_eq!(tables[0].region(estimator.cutoff()), vec![0, 1, 2]);
    }

    #[test]
    fn same_seed_same_regions() {
        let train = two_clusters();
        let estimator = LocalRegionEstimator::new(6, 10, 0.5, 1.0, 0.5);
        let a = estimator.estimate::<KdTree, _>(train.view(), train.view(), &mut StdRng::seed_from_u64(2));
        let b = estimator.estimate::<KdTree, _>(train.view(), train.view(), &mut StdRng::seed_from_u64(2));
        assert_eq!(a, b);
    }
}
