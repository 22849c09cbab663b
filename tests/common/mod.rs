#![allow(dead_code)]

use lscp_rust::{Detector, IForest, Knn, KnnMethod, Loda};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Approximately normal sample (Irwin-Hall with 12 terms).
fn standard_normal(rng: &mut StdRng) -> f64 {
    (0..12).map(|_| rng.gen::<f64>()).sum::<f64>() - 6.0
}

/// `n` points around `centre` with per-feature spread `sd`.
pub fn gaussian_cluster(rng: &mut StdRng, n: usize, centre: &[f64], sd: f64) -> Array2<f64> {
    Array2::from_shape_fn((n, centre.len()), |(_, j)| centre[j] + sd * standard_normal(rng))
}

/// Inliers around the origin followed by outliers spread over a wide box.
/// Labels are `true` for outliers.
pub fn benchmark(n_inliers: usize, n_outliers: usize, d: usize, seed: u64) -> (Array2<f64>, Vec<bool>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let inliers = gaussian_cluster(&mut rng, n_inliers, &vec![0.0; d], 1.0);
    let outliers = Array2::from_shape_fn((n_outliers, d), |_| {
        let magnitude = rng.gen_range(5.0..9.0);
        if rng.gen::<bool>() {
            magnitude
        } else {
            -magnitude
        }
    });

    let x = ndarray::concatenate(ndarray::Axis(0), &[inliers.view(), outliers.view()])
        .expect("matching feature counts");
    let labels = (0..n_inliers + n_outliers).map(|i| i >= n_inliers).collect();
    (x, labels)
}

pub fn centroid(x: &Array2<f64>) -> Array1<f64> {
    x.mean_axis(ndarray::Axis(0)).expect("non-empty matrix")
}

pub fn two_detectors(seed: u64) -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(Knn::new(5, KnnMethod::Largest)),
        Box::new(IForest::new(100, 256, Some(seed))),
    ]
}

pub fn mixed_ensemble(seed: u64) -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(Knn::new(5, KnnMethod::Largest)),
        Box::new(Knn::new(10, KnnMethod::Mean)),
        Box::new(Knn::new(15, KnnMethod::Median)),
        Box::new(IForest::new(100, 128, Some(seed))),
        Box::new(IForest::new(50, 64, Some(seed + 1))),
        Box::new(Loda::new(10, 50, Some(seed + 2))),
    ]
}
