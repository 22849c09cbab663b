//! Locally Selective Combination in Parallel outlier ensembles (LSCP).
//!
//! A set of base detectors is fit on the training data and a pseudo ground
//! truth is formed by taking, for every training point, the maximum of the
//! standardized detector scores. Each query point is then scored by:
//!
//! 1. finding its local region with random-subspace k-NN voting,
//! 2. correlating every detector's local training scores with the local
//!    pseudo ground truth,
//! 3. selecting the detectors in the densest bin of a histogram over those
//!    correlations,
//! 4. averaging the selected detectors' standardized scores for the point.
//!
//! # Example
//!
//! ```
//! use lscp_rust::{Detector, IForest, Knn, KnnMethod, Lscp, LscpConfig};
//! use ndarray::Array2;
//!
//! let x = Array2::from_shape_fn((60, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64 / 10.0);
//! let detectors: Vec<Box<dyn Detector>> = vec![
//!     Box::new(Knn::new(5, KnnMethod::Largest)),
//!     Box::new(IForest::new(50, 64, Some(1))),
//! ];
//! let config = LscpConfig::default().local_region_size(30).random_state(42);
//! let mut model = Lscp::new(detectors, config).unwrap();
//! model.fit(x.view()).unwrap();
//!
//! let scores = model.decision_function(x.view()).unwrap();
//! assert_eq!(scores.len(), 60);
//! assert!(scores.iter().all(|s| s.is_finite()));
//! ```

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::config::{ConfigWarning, LscpConfig};
use crate::ensemble::{CompetencySelector, LocalRegionEstimator, UNDEFINED_CORRELATION};
use crate::error::{LscpError, Result};
use crate::models::base_model::{check_scores, Detector};
use crate::utils::kdtree::KdTree;
use crate::utils::stats::{check_array, pearson, percentile, standardize};

struct FittedState {
    train: Array2<f64>,
    train_scores: Array2<f64>,
    decision_scores: Array1<f64>,
    threshold: f64,
    labels: Array1<u8>,
}

/// LSCP ensemble over heterogeneous base detectors.
pub struct Lscp {
    detectors: Vec<Box<dyn Detector>>,
    config: LscpConfig,
    warnings: Vec<ConfigWarning>,
    seed: u64,
    estimator: LocalRegionEstimator,
    selector: CompetencySelector,
    pool: ThreadPool,
    fitted: Option<FittedState>,
}

impl Lscp {
    /// Validates `config` against the ensemble and prepares the worker pool.
    ///
    /// Fails with [`LscpError::TooFewDetectors`] for fewer than two
    /// detectors. Parameters that were auto-corrected are listed in
    /// [`Lscp::warnings`].
    pub fn new(detectors: Vec<Box<dyn Detector>>, config: LscpConfig) -> Result<Self> {
        let (config, warnings) = config.validate(detectors.len())?;
        let seed = config.random_state.unwrap_or_else(rand::random);
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.n_jobs.unwrap_or_else(num_cpus::get))
            .build()?;

        Ok(Lscp {
            estimator: LocalRegionEstimator::from_config(&config),
            selector: CompetencySelector::new(config.n_bins),
            detectors,
            config,
            warnings,
            seed,
            pool,
            fitted: None,
        })
    }

    /// Fit every base detector on `x`, then score `x` itself to set the
    /// decision threshold and training labels.
    ///
    /// Any previous fit is discarded first: if this call fails the model
    /// is left unfitted.
    pub fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        self.fitted = None;
        check_array(x)?;
        let (n, m) = (x.nrows(), self.detectors.len());

        let detectors = &mut self.detectors;
        let columns = self.pool.install(|| {
            detectors
                .par_iter_mut()
                .map(|d| d.fit_scores(x))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut train_scores = Array2::zeros((n, m));
        for (k, column) in columns.iter().enumerate() {
            train_scores.column_mut(k).assign(column);
        }

        let decision_scores = self.score_batch(x, train_scores.view(), x)?;
        let threshold = percentile(&decision_scores.to_vec(), 100.0 * (1.0 - self.config.contamination));
        let labels = decision_scores.mapv(|s| u8::from(s > threshold));

        info!(
            samples = n,
            features = x.ncols(),
            detectors = m,
            threshold,
            outliers = labels.iter().filter(|&&l| l == 1).count(),
            "LSCP fitted"
        );

        self.fitted = Some(FittedState {
            train: x.to_owned(),
            train_scores,
            decision_scores,
            threshold,
            labels,
        });
        Ok(())
    }

    /// Outlier score of every row of `x`; higher is more anomalous.
    pub fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted()?;
        check_array(x)?;
        if x.ncols() != fitted.train.ncols() {
            return Err(LscpError::ShapeMismatch {
                expected: fitted.train.ncols(),
                actual: x.ncols(),
            });
        }
        self.score_batch(fitted.train.view(), fitted.train_scores.view(), x)
    }

    /// Binary labels for `x`: 1 where the score exceeds the fitted threshold.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<u8>> {
        let threshold = self.fitted()?.threshold;
        Ok(self.decision_function(x)?.mapv(|s| u8::from(s > threshold)))
    }

    /// Two-column probabilities `[inlier, outlier]` for `x`, from min-max
    /// scaling the scores against the training decision scores.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted()?;
        let scores = self.decision_function(x)?;

        let (lo, hi) = fitted
            .decision_scores
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
        let range = if hi > lo { hi - lo } else { 1.0 };

        let mut proba = Array2::zeros((scores.len(), 2));
        for (i, &s) in scores.iter().enumerate() {
            let p = ((s - lo) / range).clamp(0.0, 1.0);
            proba[[i, 0]] = 1.0 - p;
            proba[[i, 1]] = p;
        }
        Ok(proba)
    }

    /// Fit on `x` and return its training labels.
    pub fn fit_predict(&mut self, x: ArrayView2<f64>) -> Result<Array1<u8>> {
        self.fit(x)?;
        Ok(self.fitted()?.labels.clone())
    }

    /// Scores of the training set computed during `fit`.
    pub fn decision_scores(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.decision_scores)
    }

    pub fn threshold(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.threshold)
    }

    pub fn labels(&self) -> Option<&Array1<u8>> {
        self.fitted.as_ref().map(|f| &f.labels)
    }

    /// Raw training scores, one column per detector.
    pub fn train_scores(&self) -> Option<&Array2<f64>> {
        self.fitted.as_ref().map(|f| &f.train_scores)
    }

    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    pub fn config(&self) -> &LscpConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    pub fn detector(&self, index: usize) -> Option<&dyn Detector> {
        self.detectors.get(index).map(|d| d.as_ref())
    }

    pub fn detectors(&self) -> impl Iterator<Item = &dyn Detector> + '_ {
        self.detectors.iter().map(|d| d.as_ref())
    }

    fn fitted(&self) -> Result<&FittedState> {
        self.fitted.as_ref().ok_or(LscpError::NotFitted("LSCP"))
    }

    /// Every detector's scores for `x`, one column per detector.
    fn detector_scores(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let columns = self.pool.install(|| {
            self.detectors
                .par_iter()
                .map(|d| {
                    let scores = d.decision_function(x)?;
                    check_scores(d.name(), &scores, x.nrows())?;
                    Ok(scores)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut out = Array2::zeros((x.nrows(), columns.len()));
        for (k, column) in columns.iter().enumerate() {
            out.column_mut(k).assign(column);
        }
        Ok(out)
    }

    /// Per-point pipeline shared by `fit` and `decision_function`.
    ///
    /// Standardized scores and the pseudo ground truth are rebuilt on every
    /// call, and the subspace sampler restarts from the stored seed, so
    /// identical input always yields identical output.
    fn score_batch(
        &self,
        train: ArrayView2<f64>,
        train_scores: ArrayView2<f64>,
        query: ArrayView2<f64>,
    ) -> Result<Array1<f64>> {
        let test_scores = self.detector_scores(query)?;
        let (train_norm, test_norm) = standardize(train_scores, test_scores.view());
        let pseudo_truth = pseudo_ground_truth(train_norm.view());

        let mut rng = StdRng::seed_from_u64(self.seed);
        let (scores, regions) = self.pool.install(|| {
            let regions = self.estimator.estimate::<KdTree, _>(train, query, &mut rng);
            let scores: Vec<f64> = regions
                .par_iter()
                .enumerate()
                .map(|(i, region)| {
                    let correlations = local_correlations(region, pseudo_truth.view(), train_norm.view());
                    let selected = self.selector.select(&correlations);
                    mean_of(test_norm.row(i), &selected)
                })
                .collect();
            (scores, regions)
        });

        let empty = regions.iter().filter(|r| r.len() < 2).count();
        let mean_size = regions.iter().map(Vec::len).sum::<usize>() as f64 / regions.len().max(1) as f64;
        debug!(
            queries = query.nrows(),
            degenerate_regions = empty,
            mean_region_size = mean_size,
            "LSCP batch scored"
        );

        Ok(Array1::from(scores))
    }
}

/// Row-wise maximum of the standardized training scores.
fn pseudo_ground_truth(train_norm: ArrayView2<f64>) -> Array1<f64> {
    train_norm.map_axis(Axis(1), |row| row.fold(f64::NEG_INFINITY, |a, &b| a.max(b)))
}

/// Pearson correlation, inside `region`, between the pseudo ground truth
/// and each detector's standardized training scores. Undefined values
/// become [`UNDEFINED_CORRELATION`].
fn local_correlations(region: &[usize], pseudo_truth: ArrayView1<f64>, train_norm: ArrayView2<f64>) -> Vec<f64> {
    let local_truth: Vec<f64> = region.iter().map(|&i| pseudo_truth[i]).collect();
    train_norm
        .axis_iter(Axis(1))
        .map(|column| {
            let local: Vec<f64> = region.iter().map(|&i| column[i]).collect();
            pearson(&local_truth, &local).map_or(UNDEFINED_CORRELATION, |c| c.coefficient)
        })
        .collect()
}

fn mean_of(row: ArrayView1<f64>, selected: &[usize]) -> f64 {
    if selected.is_empty() {
        return row.mean().unwrap_or(0.0);
    }
    selected.iter().map(|&k| row[k]).sum::<f64>() / selected.len() as f64
}
