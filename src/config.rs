use std::fmt;

use tracing::warn;

use crate::error::{LscpError, Result};

/// Recommended bounds for `local_region_size`; values outside still run.
pub const LOCAL_REGION_MIN: usize = 30;
pub const LOCAL_REGION_MAX: usize = 200;

/// Parameters of an LSCP ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct LscpConfig {
    /// Neighbours retrieved per subspace iteration. Default: 30.
    pub local_region_size: usize,
    /// Largest fraction of features in a random subspace. Default: 1.0.
    pub local_max_features: f64,
    /// Smallest fraction of features in a random subspace. Default: 0.5.
    pub local_min_features: f64,
    /// Number of subspace voting rounds. Default: 20.
    pub local_region_iterations: usize,
    /// A training point joins the local region when its vote count is
    /// strictly greater than this fraction of the iterations. Default: 0.5.
    pub local_region_threshold: f64,
    /// Histogram bins over detector correlations. Default: 10.
    pub n_bins: usize,
    /// Expected outlier proportion, used for the decision threshold. Default: 0.1.
    pub contamination: f64,
    /// Seed for subspace sampling. `None` draws one at construction.
    pub random_state: Option<u64>,
    /// Worker threads. `None` uses every available core.
    pub n_jobs: Option<usize>,
}

impl Default for LscpConfig {
    fn default() -> Self {
        Self {
            local_region_size: 30,
            local_max_features: 1.0,
            local_min_features: 0.5,
            local_region_iterations: 20,
            local_region_threshold: 0.5,
            n_bins: 10,
            contamination: 0.1,
            random_state: None,
            n_jobs: None,
        }
    }
}

impl LscpConfig {
    pub fn local_region_size(mut self, size: usize) -> Self {
        self.local_region_size = size;
        self
    }

    pub fn local_max_features(mut self, frac: f64) -> Self {
        self.local_max_features = frac;
        self
    }

    pub fn local_min_features(mut self, frac: f64) -> Self {
        self.local_min_features = frac;
        self
    }

    pub fn local_region_iterations(mut self, iterations: usize) -> Self {
        self.local_region_iterations = iterations;
        self
    }

    pub fn local_region_threshold(mut self, frac: f64) -> Self {
        self.local_region_threshold = frac;
        self
    }

    pub fn n_bins(mut self, n_bins: usize) -> Self {
        self.n_bins = n_bins;
        self
    }

    pub fn contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    /// Checks every parameter against an ensemble of `n_detectors`.
    ///
    /// Hard violations are errors. Recoverable ones are corrected in the
    /// returned config and reported both as `tracing` warnings and in the
    /// returned list.
    pub fn validate(mut self, n_detectors: usize) -> Result<(Self, Vec<ConfigWarning>)> {
        if n_detectors < 2 {
            return Err(LscpError::TooFewDetectors(n_detectors));
        }
        if self.local_region_size == 0 {
            return Err(invalid("local_region_size", "must be at least 1"));
        }
        if self.local_region_iterations == 0 {
            return Err(invalid("local_region_iterations", "must be at least 1"));
        }
        if self.n_bins == 0 {
            return Err(invalid("n_bins", "must be at least 1"));
        }
        if !(self.local_max_features > 0.0) {
            return Err(invalid("local_max_features", "must be greater than 0"));
        }
        if !(self.local_min_features > 0.0 && self.local_min_features <= 1.0) {
            return Err(invalid("local_min_features", "must lie in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.local_region_threshold) {
            return Err(invalid("local_region_threshold", "must lie in [0, 1]"));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(invalid("contamination", "must lie in (0, 0.5]"));
        }
        if self.n_jobs == Some(0) {
            return Err(invalid("n_jobs", "must be at least 1"));
        }

        let mut warnings = Vec::new();

        if self.local_max_features > 1.0 {
            warnings.push(ConfigWarning::LocalMaxFeaturesClamped {
                requested: self.local_max_features,
            });
            self.local_max_features = 1.0;
        }
        if self.n_bins > n_detectors {
            warnings.push(ConfigWarning::BinsClamped {
                requested: self.n_bins,
                detectors: n_detectors,
            });
            self.n_bins = n_detectors;
        }
        if !(LOCAL_REGION_MIN..=LOCAL_REGION_MAX).contains(&self.local_region_size) {
            warnings.push(ConfigWarning::LocalRegionSizeOutsideRange {
                size: self.local_region_size,
            });
        }

        for w in &warnings {
            warn!(warning = %w, "LSCP parameter adjusted");
        }

        Ok((self, warnings))
    }
}

fn invalid(name: &'static str, reason: &str) -> LscpError {
    LscpError::InvalidParameter {
        name,
        reason: reason.to_string(),
    }
}

/// Non-fatal parameter diagnostics produced during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    LocalMaxFeaturesClamped { requested: f64 },
    BinsClamped { requested: usize, detectors: usize },
    LocalRegionSizeOutsideRange { size: usize },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::LocalMaxFeaturesClamped { requested } => {
                write!(f, "local_max_features {requested} greater than 1.0, reducing to 1.0")
            }
            ConfigWarning::BinsClamped { requested, detectors } => write!(
                f,
                "n_bins {requested} greater than number of detectors, reducing n_bins to {detectors}"
            ),
            ConfigWarning::LocalRegionSizeOutsideRange { size } => write!(
                f,
                "local_region_size {size} is outside recommended range [{LOCAL_REGION_MIN}, {LOCAL_REGION_MAX}]"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        let (cfg, warnings) = LscpConfig::default().validate(12).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(cfg, LscpConfig::default());
    }

    #[test]
    fn too_few_detectors_is_an_error() {
        assert!(matches!(
            LscpConfig::default().validate(1),
            Err(LscpError::TooFewDetectors(1))
        ));
        assert!(matches!(
            LscpConfig::default().validate(0),
            Err(LscpError::TooFewDetectors(0))
        ));
    }

    #[test]
    fn recoverable_values_are_clamped_with_warnings() {
        let (cfg, warnings) = LscpConfig::default()
            .local_max_features(1.7)
            .n_bins(10)
            .local_region_size(10)
            .validate(3)
            .unwrap();

        assert_eq!(cfg.local_max_features, 1.0);
        assert_eq!(cfg.n_bins, 3);
        assert_eq!(cfg.local_region_size, 10);
        assert_eq!(
            warnings,
            vec![
                ConfigWarning::LocalMaxFeaturesClamped { requested: 1.7 },
                ConfigWarning::BinsClamped { requested: 10, detectors: 3 },
                ConfigWarning::LocalRegionSizeOutsideRange { size: 10 },
            ]
        );
        assert!(warnings[1].to_string().contains("reducing n_bins to 3"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            LscpConfig::default().local_region_size(0),
            LscpConfig::default().local_region_iterations(0),
            LscpConfig::default().n_bins(0),
            LscpConfig::default().local_max_features(0.0),
            LscpConfig::default().local_min_features(1.5),
            LscpConfig::default().local_region_threshold(1.2),
            LscpConfig::default().contamination(0.7),
            LscpConfig::default().contamination(0.0),
            LscpConfig::default().n_jobs(0),
        ];
        for cfg in cases {
            assert!(matches!(
                cfg.clone().validate(4),
                Err(LscpError::InvalidParameter { .. })
            ), "{cfg:?} should be rejected");
        }
    }
}
