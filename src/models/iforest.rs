use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::prelude::*;
use rand::seq::index;
use rayon::prelude::*;

use crate::error::{LscpError, Result};
use crate::models::base_model::{check_features, Detector};
use crate::utils::stats::check_array;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

struct Node {
    split_feature: Option<usize>,
    split_value: f64,
    size: usize,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn leaf(size: usize) -> Self {
        Node {
            split_feature: None,
            split_value: 0.0,
            size,
            left: None,
            right: None,
        }
    }
}

/// Isolation Forest: outliers are isolated by fewer random splits.
pub struct IForest {
    n_estimators: usize,
    max_samples: usize,
    seed: u64,
    trees: Vec<Node>,
    sample_size: usize,
    n_features: usize,
    training_scores: Option<Array1<f64>>,
}

impl IForest {
    pub fn new(n_estimators: usize, max_samples: usize, random_state: Option<u64>) -> Self {
        IForest {
            n_estimators: n_estimators.max(1),
            max_samples: max_samples.max(2),
            seed: random_state.unwrap_or_else(rand::random),
            trees: Vec::new(),
            sample_size: 0,
            n_features: 0,
            training_scores: None,
        }
    }

    fn build_tree(
        x: ArrayView2<f64>,
        rows: &mut [usize],
        height: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> Node {
        let size = rows.len();
        if size <= 1 || height >= height_limit {
            return Node::leaf(size);
        }

        let split_feature = rng.gen_range(0..x.ncols());
        let (min_val, max_val) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
            let v = x[[r, split_feature]];
            (lo.min(v), hi.max(v))
        });
        if max_val - min_val < 1e-10 {
            return Node::leaf(size);
        }
        let split_value = rng.gen::<f64>() * (max_val - min_val) + min_val;

        // Partition rows in place: left of `mid` goes below the split.
        let mut mid = 0;
        for i in 0..size {
            if x[[rows[i], split_feature]] < split_value {
                rows.swap(i, mid);
                mid += 1;
            }
        }
        if mid == 0 || mid == size {
            return Node::leaf(size);
        }

        let (left_rows, right_rows) = rows.split_at_mut(mid);
        Node {
            split_feature: Some(split_feature),
            split_value,
            size,
            left: Some(Box::new(Self::build_tree(x, left_rows, height + 1, height_limit, rng))),
            right: Some(Box::new(Self::build_tree(x, right_rows, height + 1, height_limit, rng))),
        }
    }

    fn path_length(node: &Node, x: ArrayView1<f64>, height: usize) -> f64 {
        match (node.split_feature, &node.left, &node.right) {
            (Some(feature), Some(left), Some(right)) => {
                if x[feature] < node.split_value {
                    Self::path_length(left, x, height + 1)
                } else {
                    Self::path_length(right, x, height + 1)
                }
            }
            _ => height as f64 + average_path_length(node.size),
        }
    }

    fn score_row(&self, x: ArrayView1<f64>) -> f64 {
        let total: f64 = self.trees.iter().map(|t| Self::path_length(t, x, 0)).sum();
        let avg = total / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size);
        if norm > 0.0 {
            2.0f64.powf(-avg / norm)
        } else {
            1.0
        }
    }
}

impl Default for IForest {
    fn default() -> Self {
        IForest::new(100, 256, None)
    }
}

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

impl Detector for IForest {
    fn name(&self) -> &str {
        "IForest"
    }

    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        check_array(x)?;
        let n = x.nrows();
        self.n_features = x.ncols();
        self.sample_size = self.max_samples.min(n);
        let height_limit = (self.sample_size as f64).log2().ceil().max(1.0) as usize;

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.trees = (0..self.n_estimators)
            .map(|_| {
                let mut rows = index::sample(&mut rng, n, self.sample_size).into_vec();
                Self::build_tree(x, &mut rows, 0, height_limit, &mut rng)
            })
            .collect();

        self.training_scores = Some(self.decision_function(x)?);
        Ok(())
    }

    fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(LscpError::NotFitted("IForest"));
        }
        check_features(self.n_features, x)?;
        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.score_row(x.row(i)))
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
    use ndarray::{array, Array2};

    fn cluster_with_outlier() -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(1);
        let mut x = Array2::from_shape_fn((120, 2), |_| rng.gen_range(-1.0..1.0));
        x.row_mut(119).assign(&array![9.0, -9.0]);
        x
    }

    #[test]
    fn isolates_the_far_point() {
        let x = cluster_with_outlier();
        let mut model = IForest::new(100, 256, Some(3));
        let scores = model.fit_scores(x.view()).unwrap();

        let (argmax, _) = scores
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, &s)| if s > acc.1 { (i, s) } else { acc });
        assert_eq!(argmax, 119);
        assert!(scores.iter().all(|s| s.is_finite() && *s > 0.0 && *s <= 1.0));
    }

    #[test]
    fn seeded_fit_is_reproducible() {
        let x = cluster_with_outlier();
        let mut a = IForest::new(20, 32, Some(9));
        let mut b = IForest::new(20, 32, Some(9));
        assert_eq!(a.fit_scores(x.view()).unwrap(), b.fit_scores(x.view()).unwrap());
    }

    #[test]
    fn rejects_unfitted_and_mismatched_input() {
        let model = IForest::default();
        assert!(matches!(
            model.decision_function(array![[0.0, 0.0]].view()),
            Err(LscpError::NotFitted(_))
        ));

        let mut model = IForest::new(5, 16, Some(0));
        model.fit(cluster_with_outlier().view()).unwrap();
        assert!(matches!(
            model.decision_function(array![[0.0, 0.0, 0.0]].view()),
            Err(LscpError::ShapeMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn path_length_normaliser() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(64));
    }
}
