use ndarray::{Array1, Array2, ArrayView2};
use numpy::{IntoPyArray, PyArray1, PyArray2};
use pyo3::exceptions::{PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyAny;

use crate::config::LscpConfig;
use crate::error::{LscpError, Result};
use crate::models::base_model::Detector;
use crate::models::iforest::IForest;
use crate::models::knn::{Knn, KnnMethod};
use crate::models::loda::Loda;
use crate::models::lscp::Lscp;

impl From<LscpError> for PyErr {
    fn from(err: LscpError) -> PyErr {
        match &err {
            LscpError::Detector { .. } | LscpError::ThreadPool(_) => PyRuntimeError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

// Accepts float64 arrays directly and casts the other common numeric dtypes.
fn as_f64_matrix(x: &PyAny) -> PyResult<Array2<f64>> {
    if let Ok(arr) = x.extract::<&PyArray2<f64>>() {
        Ok(arr.to_owned_array())
    } else if let Ok(arr) = x.extract::<&PyArray2<f32>>() {
        Ok(arr.cast::<f64>(false)?.to_owned_array())
    } else if let Ok(arr) = x.extract::<&PyArray2<i64>>() {
        Ok(arr.cast::<f64>(false)?.to_owned_array())
    } else if let Ok(arr) = x.extract::<&PyArray2<i32>>() {
        Ok(arr.cast::<f64>(false)?.to_owned_array())
    } else {
        Err(PyTypeError::new_err(
            "expected a 2-D numpy array of f64 or a compatible dtype (f32, i64, i32)",
        ))
    }
}

/// Any Python object following the `fit` / `decision_function` /
/// `decision_scores_` convention, usable as a base detector.
struct PyDetector {
    obj: PyObject,
    name: String,
    training_scores: Option<Array1<f64>>,
}

impl PyDetector {
    fn new(py: Python<'_>, obj: PyObject) -> PyResult<Self> {
        let any = obj.as_ref(py);
        let name = any.get_type().name()?.to_string();
        for method in ["fit", "decision_function"] {
            if !any.hasattr(method)? {
                return Err(PyTypeError::new_err(format!(
                    "estimator {name} has no `{method}` method"
                )));
            }
        }
        Ok(PyDetector {
            obj,
            name,
            training_scores: None,
        })
    }

    fn failure(&self, err: PyErr) -> LscpError {
        LscpError::Detector {
            detector: self.name.clone(),
            message: err.to_string(),
        }
    }
}

impl Detector for PyDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        let scores = Python::with_gil(|py| -> PyResult<Vec<f64>> {
            let arr = x.to_owned().into_pyarray(py);
            self.obj.call_method1(py, "fit", (arr,))?;
            self.obj.getattr(py, "decision_scores_")?.extract(py)
        })
        .map_err(|e| self.failure(e))?;
        self.training_scores = Some(Array1::from(scores));
        Ok(())
    }

    fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        Python::with_gil(|py| -> PyResult<Vec<f64>> {
            let arr = x.to_owned().into_pyarray(py);
            self.obj.call_method1(py, "decision_function", (arr,))?.extract(py)
        })
        .map(Array1::from)
        .map_err(|e| self.failure(e))
    }

    fn training_scores(&self) -> Option<&Array1<f64>> {
        self.training_scores.as_ref()
    }
}

fn scores_to_py(py: Python<'_>, scores: Option<&Array1<f64>>) -> PyResult<Py<PyArray1<f64>>> {
    scores
        .map(|s| s.clone().into_pyarray(py).to_owned())
        .ok_or_else(|| PyErr::from(LscpError::NotFitted("estimator")))
}

/// Python-exposed LSCP ensemble
#[pyclass(name = "LSCP")]
pub struct PyLscp {
    inner: Lscp,
}

#[pymethods]
impl PyLscp {
    #[new]
    #[pyo3(signature = (
        estimator_list,
        local_region_size = 30,
        local_max_features = 1.0,
        n_bins = 10,
        random_state = None,
        contamination = 0.1,
        n_jobs = None
    ))]
    fn new(
        py: Python<'_>,
        estimator_list: Vec<PyObject>,
        local_region_size: usize,
        local_max_features: f64,
        n_bins: usize,
        random_state: Option<u64>,
        contamination: f64,
        n_jobs: Option<usize>,
    ) -> PyResult<Self> {
        let detectors = estimator_list
            .into_iter()
            .map(|obj| PyDetector::new(py, obj).map(|d| Box::new(d) as Box<dyn Detector>))
            .collect::<PyResult<Vec<_>>>()?;

        let mut config = LscpConfig::default()
            .local_region_size(local_region_size)
            .local_max_features(local_max_features)
            .n_bins(n_bins)
            .contamination(contamination);
        config.random_state = random_state;
        config.n_jobs = n_jobs;

        Ok(PyLscp {
            inner: Lscp::new(detectors, config)?,
        })
    }

    fn fit(&mut self, py: Python<'_>, x: &PyAny) -> PyResult<()> {
        let x = as_f64_matrix(x)?;
        let inner = &mut self.inner;
        py.allow_threads(|| inner.fit(x.view()))?;
        Ok(())
    }

    fn decision_function(&self, py: Python<'_>, x: &PyAny) -> PyResult<Py<PyArray1<f64>>> {
        let x = as_f64_matrix(x)?;
        let inner = &self.inner;
        let scores = py.allow_threads(|| inner.decision_function(x.view()))?;
        Ok(scores.into_pyarray(py).to_owned())
    }

    fn predict(&self, py: Python<'_>, x: &PyAny) -> PyResult<Py<PyArray1<u8>>> {
        let x = as_f64_matrix(x)?;
        let inner = &self.inner;
        let labels = py.allow_threads(|| inner.predict(x.view()))?;
        Ok(labels.into_pyarray(py).to_owned())
    }

    fn predict_proba(&self, py: Python<'_>, x: &PyAny) -> PyResult<Py<PyArray2<f64>>> {
        let x = as_f64_matrix(x)?;
        let inner = &self.inner;
        let proba = py.allow_threads(|| inner.predict_proba(x.view()))?;
        Ok(proba.into_pyarray(py).to_owned())
    }

    #[getter]
    fn decision_scores_(&self, py: Python<'_>) -> PyResult<Py<PyArray1<f64>>> {
        scores_to_py(py, self.inner.decision_scores())
    }

    #[getter]
    fn threshold_(&self) -> PyResult<f64> {
        self.inner
            .threshold()
            .ok_or_else(|| PyErr::from(LscpError::NotFitted("LSCP")))
    }

    #[getter]
    fn labels_(&self, py: Python<'_>) -> PyResult<Py<PyArray1<u8>>> {
        self.inner
            .labels()
            .map(|l| l.clone().into_pyarray(py).to_owned())
            .ok_or_else(|| PyErr::from(LscpError::NotFitted("LSCP")))
    }

    #[getter]
    fn warnings_(&self) -> Vec<String> {
        self.inner.warnings().iter().map(ToString::to_string).collect()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }
}

/// Python-exposed Isolation Forest
#[pyclass(name = "IForest")]
pub struct PyIForest {
    inner: IForest,
}

#[pymethods]
impl PyIForest {
    #[new]
    #[pyo3(signature = (n_estimators = 100, max_samples = 256, random_state = None))]
    fn new(n_estimators: usize, max_samples: usize, random_state: Option<u64>) -> Self {
        PyIForest {
            inner: IForest::new(n_estimators, max_samples, random_state),
        }
    }

    fn fit(&mut self, py: Python<'_>, x: &PyAny) -> PyResult<()> {
        let x = as_f64_matrix(x)?;
        let inner = &mut self.inner;
        py.allow_threads(|| inner.fit(x.view()))?;
        Ok(())
    }

    fn decision_function(&self, py: Python<'_>, x: &PyAny) -> PyResult<Py<PyArray1<f64>>> {
        let x = as_f64_matrix(x)?;
        let inner = &self.inner;
        let scores = py.allow_threads(|| inner.decision_function(x.view()))?;
        Ok(scores.into_pyarray(py).to_owned())
    }

    #[getter]
    fn decision_scores_(&self, py: Python<'_>) -> PyResult<Py<PyArray1<f64>>> {
        scores_to_py(py, self.inner.training_scores())
    }
}

/// Python-exposed LODA
#[pyclass(name = "LODA")]
pub struct PyLoda {
    inner: Loda,
}

#[pymethods]
impl PyLoda {
    #[new]
    #[pyo3(signature = (num_bins = 10, num_random_cuts = 100, random_state = None))]
    fn new(num_bins: usize, num_random_cuts: usize, random_state: Option<u64>) -> Self {
        PyLoda {
            inner: Loda::new(num_bins, num_random_cuts, random_state),
        }
    }

    fn fit(&mut self, py: Python<'_>, x: &PyAny) -> PyResult<()> {
        let x = as_f64_matrix(x)?;
        let inner = &mut self.inner;
        py.allow_threads(|| inner.fit(x.view()))?;
        Ok(())
    }

    fn decision_function(&self, py: Python<'_>, x: &PyAny) -> PyResult<Py<PyArray1<f64>>> {
        let x = as_f64_matrix(x)?;
        let inner = &self.inner;
        let scores = py.allow_threads(|| inner.decision_function(x.view()))?;
        Ok(scores.into_pyarray(py).to_owned())
    }

    #[getter]
    fn decision_scores_(&self, py: Python<'_>) -> PyResult<Py<PyArray1<f64>>> {
        scores_to_py(py, self.inner.training_scores())
    }
}

/// Python-exposed k-NN detector
#[pyclass(name = "KNN")]
pub struct PyKnn {
    inner: Knn,
}

#[pymethods]
impl PyKnn {
    #[new]
    #[pyo3(signature = (n_neighbors = 5, method = "largest"))]
    fn new(n_neighbors: usize, method: &str) -> PyResult<Self> {
        let method = match method {
            "largest" => KnnMethod::Largest,
            "mean" => KnnMethod::Mean,
            "median" => KnnMethod::Median,
            other => {
                return Err(PyValueError::new_err(format!(
                    "unknown method `{other}`, expected largest, mean or median"
                )))
            }
        };
        Ok(PyKnn {
            inner: Knn::new(n_neighbors, method),
        })
    }

    fn fit(&mut self, py: Python<'_>, x: &PyAny) -> PyResult<()> {
        let x = as_f64_matrix(x)?;
        let inner = &mut self.inner;
        py.allow_threads(|| inner.fit(x.view()))?;
        Ok(())
    }

    fn decision_function(&self, py: Python<'_>, x: &PyAny) -> PyResult<Py<PyArray1<f64>>> {
        let x = as_f64_matrix(x)?;
        let inner = &self.inner;
        let scores = py.allow_threads(|| inner.decision_function(x.view()))?;
        Ok(scores.into_pyarray(py).to_owned())
    }

    #[getter]
    fn decision_scores_(&self, py: Python<'_>) -> PyResult<Py<PyArray1<f64>>> {
        scores_to_py(py, self.inner.training_scores())
    }
}
