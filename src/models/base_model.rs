use ndarray::{Array1, ArrayView2};

use crate::error::{LscpError, Result};

/// A batch outlier detector that can sit inside an LSCP ensemble.
///
/// Higher scores mean more anomalous.
pub trait Detector: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Train on `x` and remember the resulting training-set scores.
    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()>;

    /// Score every row of `x`.
    fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Scores of the training set from the last `fit`.
    fn training_scores(&self) -> Option<&Array1<f64>>;

    /// Default: fit, then hand back the training scores.
    fn fit_scores(&mut self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.fit(x)?;
        let scores = self
            .training_scores()
            .cloned()
            .ok_or_else(|| LscpError::Detector {
                detector: self.name().to_string(),
                message: "no training scores after fit".to_string(),
            })?;
        check_scores(self.name(), &scores, x.nrows())?;
        Ok(scores)
    }
}

/// Feature-count guard shared by the built-in detectors.
pub(crate) fn check_features(expected: usize, x: ArrayView2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(LscpError::ShapeMismatch {
            expected,
            actual: x.ncols(),
        });
    }
    Ok(())
}

/// One finite score per sample.
pub(crate) fn check_scores(detector: &str, scores: &Array1<f64>, n_samples: usize) -> Result<()> {
    if scores.len() != n_samples {
        return Err(LscpError::ScoreLength {
            detector: detector.to_string(),
            expected: n_samples,
            actual: scores.len(),
        });
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(LscpError::NonFinite);
    }
    Ok(())
}
