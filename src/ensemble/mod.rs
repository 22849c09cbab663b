//! The two per-query stages of LSCP: finding a local region and picking
//! the detectors that are competent inside it.

pub mod competency;
pub mod local_region;

pub use competency::{CompetencySelector, Histogram, UNDEFINED_CORRELATION};
pub use local_region::{LocalRegionEstimator, VoteTable};
