//! Locally Selective Combination in Parallel outlier ensembles (LSCP).
//!
//! [`Lscp`] combines heterogeneous base detectors by picking, for every
//! query point, the detectors that agree best with a pseudo ground truth
//! inside the point's local region, and averaging their scores.
//! Built-in base detectors: [`IForest`], [`Loda`] and [`Knn`]; anything
//! implementing [`Detector`] can join the ensemble.
//!
//! With the `python` feature the crate also builds a Python extension
//! module exposing `LSCP`, `IForest`, `LODA` and `KNN`.

pub mod config;
pub mod ensemble;
pub mod error;
pub mod models;
pub mod utils;

#[cfg(feature = "python")]
mod python;

pub use config::{ConfigWarning, LscpConfig};
pub use error::{LscpError, Result};
pub use models::base_model::Detector;
pub use models::iforest::IForest;
pub use models::knn::{Knn, KnnMethod};
pub use models::loda::Loda;
pub use models::lscp::Lscp;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// A Python module implemented in Rust.
#[cfg(feature = "python")]
#[pymodule]
fn lscp_rust(_py: Python, m: &PyModule) -> PyResult<()> {
    // Ensemble:
    m.add_class::<python::PyLscp>()?;

    // Base detectors:
    m.add_class::<python::PyIForest>()?;
    m.add_class::<python::PyLoda>()?;
    m.add_class::<python::PyKnn>()?;
    Ok(())
}
