use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use crate::error::{LscpError, Result};
use crate::models::base_model::{check_features, Detector};
use crate::utils::kdtree::{KdTree, SpatialIndex};
use crate::utils::stats::check_array;

/// How the distances to the `k` neighbours become one score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KnnMethod {
    /// Distance to the k-th neighbour.
    #[default]
    Largest,
    Mean,
    Median,
}

/// Distance-based detector: far from its neighbours means anomalous.
pub struct Knn {
    n_neighbors: usize,
    method: KnnMethod,
    train: Option<Array2<f64>>,
    tree: Option<KdTree>,
    training_scores: Option<Array1<f64>>,
}

impl Knn {
    pub fn new(n_neighbors: usize, method: KnnMethod) -> Self {
        Knn {
            n_neighbors: n_neighbors.max(1),
            method,
            train: None,
            tree: None,
            training_scores: None,
        }
    }

    fn aggregate(&self, mut dists: Vec<f64>) -> f64 {
        if dists.is_empty() {
            return 0.0;
        }
        match self.method {
            KnnMethod::Largest => dists.iter().cloned().fold(0.0, f64::max),
            KnnMethod::Mean => dists.iter().sum::<f64>() / dists.len() as f64,
            KnnMethod::Median => {
                dists.sort_by(|a, b| a.total_cmp(b));
                let mid = dists.len() / 2;
                if dists.len() % 2 == 0 {
                    0.5 * (dists[mid - 1] + dists[mid])
                } else {
                    dists[mid]
                }
            }
        }
    }

    /// Score one point, skipping training row `exclude` if given.
    fn score_row(&self, train: &Array2<f64>, tree: &KdTree, x: ArrayView1<f64>, exclude: Option<usize>) -> f64 {
        let k = self.n_neighbors + usize::from(exclude.is_some());
        let dists = tree
            .query(x, k)
            .into_iter()
            .filter(|&i| Some(i) != exclude)
            .take(self.n_neighbors)
            .map(|i| euclidean(train.row(i), x))
            .collect();
        self.aggregate(dists)
    }
}

impl Default for Knn {
    fn default() -> Self {
        Knn::new(5, KnnMethod::Largest)
    }
}

fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

impl Detector for Knn {
    fn name(&self) -> &str {
        "KNN"
    }

    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        check_array(x)?;
        let train = x.to_owned();
        let tree = KdTree::build(x);

        // Training points are scored against the others, not themselves.
        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.score_row(&train, &tree, x.row(i), Some(i)))
            .collect();

        self.training_scores = Some(Array1::from(scores));
        self.train = Some(train);
        self.tree = Some(tree);
        Ok(())
    }

    fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let (train, tree) = match (&self.train, &self.tree) {
            (Some(train), Some(tree)) => (train, tree),
            _ => return Err(LscpError::NotFitted("KNN")),
        };
        check_features(train.ncols(), x)?;
        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.score_row(train, tree, x.row(i), None))
            .collect();
        Ok(Array1::from(scores))
    }

    fn training_scores(&self) -> Option<&Array1<f64>> {
        self.training_scores.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line() -> Array2<f64> {
        array![[0.0], [1.0], [2.0], [3.0], [10.0]]
    }

    #[test]
    fn training_scores_exclude_self() {
        let mut model = Knn::new(1, KnnMethod::Largest);
        let scores = model.fit_scores(line().view()).unwrap();
        assert_eq!(scores.to_vec(), vec![1.0, 1.0, 1.0, 1.0, 7.0]);
    }

    #[test]
    fn aggregation_methods() {
        let x = line();
        let q = array![[4.0]];

        let mut largest = Knn::new(3, KnnMethod::Largest);
        largest.fit(x.view()).unwrap();
        assert_eq!(largest.decision_function(q.view()).unwrap()[0], 3.0);

        let mut mean = Knn::new(3, KnnMethod::Mean);
        mean.fit(x.view()).unwrap();
        assert_eq!(mean.decision_function(q.view()).unwrap()[0], 2.0);

        let mut median = Knn::new(2, KnnMethod::Median);
        median.fit(x.view()).unwrap();
        assert_eq!(median.decision_function(q.view()).unwrap()[0], 1.5);
    }

    #[test]
    fn mismatched_features_error() {
        let mut model = Knn::default();
        model.fit(line().view()).unwrap();
        assert!(matches!(
            model.decision_function(array![[1.0, 2.0]].view()),
            Err(LscpError::ShapeMismatch { expected: 1, actual: 2 })
        ));
    }
}
