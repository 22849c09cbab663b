use thiserror::Error;

/// Errors raised while configuring, fitting or scoring an ensemble.
#[derive(Debug, Error)]
pub enum LscpError {
    #[error("LSCP needs at least 2 base detectors, got {0}")]
    TooFewDetectors(usize),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("feature count mismatch: model was fit with {expected} features, input has {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("input matrix has no samples or no features")]
    EmptyInput,

    #[error("input matrix or detector scores contain NaN or infinite values")]
    NonFinite,

    #[error("{0} has not been fitted")]
    NotFitted(&'static str),

    #[error("detector `{detector}` returned {actual} scores for {expected} samples")]
    ScoreLength {
        detector: String,
        expected: usize,
        actual: usize,
    },

    #[error("detector `{detector}` failed: {message}")]
    Detector { detector: String, message: String },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, LscpError>;
