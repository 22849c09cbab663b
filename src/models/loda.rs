use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::{LscpError, Result};
use crate::models::base_model::{check_features, Detector};
use crate::utils::stats::check_array;

const DENSITY_FLOOR: f64 = 1e-12;

struct Histogram {
    low: f64,
    width: f64,
    density: Vec<f64>,
}

impl Histogram {
    fn fit(values: &[f64], num_bins: usize) -> Self {
        let (mut low, mut high) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if high - low <= 0.0 {
            low -= 0.5;
            high += 0.5;
        }
        let width = (high - low) / num_bins as f64;

        let mut counts = vec![0.0; num_bins];
        for &v in values {
            let b = (((v - low) / width) as usize).min(num_bins - 1);
            counts[b] += 1.0;
        }
        let n = values.len() as f64;
        let density = counts
            .into_iter()
            .map(|c| (c / n).max(DENSITY_FLOOR))
            .collect();

        Histogram { low, width, density }
    }

    // Values outside the fitted range fall to the density floor.
    fn probability(&self, v: f64) -> f64 {
        let pos = (v - self.low) / self.width;
        let num_bins = self.density.len();
        if pos < 0.0 || pos > num_bins as f64 {
            return DENSITY_FLOOR;
        }
        self.density[(pos as usize).min(num_bins - 1)]
    }
}

/// Lightweight on-line detector of anomalies, batch form: an average of
/// one-dimensional histograms over sparse random projections.
pub struct Loda {
    num_bins: usize,
    num_random_cuts: usize,
    seed: u64,
    num_features: usize,
    projections: Vec<Vec<f64>>,
    histograms: Vec<Histogram>,
    training_scores: Option<Array1<f64>>,
}

impl Loda {
    pub fn new(num_bins: usize, num_random_cuts: usize, random_state: Option<u64>) -> Self {
        Loda {
            num_bins: num_bins.max(1),
            num_random_cuts: num_random_cuts.max(1),
            seed: random_state.unwrap_or_else(rand::random),
            num_features: 0,
            projections: Vec::new(),
            histograms: Vec::new(),
            training_scores: None,
        }
    }

    fn project(projection: &[f64], x: ArrayView1<f64>) -> f64 {
        projection.iter().zip(x.iter()).map(|(w, v)| w * v).sum()
    }

    fn score_row(&self, x: ArrayView1<f64>) -> f64 {
        let total: f64 = self
            .projections
            .iter()
            .zip(&self.histograms)
            .map(|(p, h)| -h.probability(Self::project(p, x)).ln())
            .sum();
        total / self.num_random_cuts as f64
    }
}

impl Default for Loda {
    fn default() -> Self {
        Loda::new(10, 100, None)
    }
}

impl Detector for Loda {
    fn name(&self) -> &str {
        "LODA"
    }

    fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        check_array(x)?;
        self.num_features = x.ncols();
        let mut rng = StdRng::seed_from_u64(self.seed);

        // sqrt(d) non-zero components per projection
        let n_nonzero = ((self.num_features as f64).sqrt().round() as usize).max(1);
        let n_zero = self.num_features - n_nonzero.min(self.num_features);

        self.projections = Vec::with_capacity(self.num_random_cuts);
        self.histograms = Vec::with_capacity(self.num_random_cuts);
        let mut indices: Vec<usize> = (0..self.num_features).collect();

        for _ in 0..self.num_random_cuts {
            let mut projection: Vec<f64> = (0..self.num_features)
                .map(|_| rng.gen_range(-1.0..1.0))
                .collect();
            indices.shuffle(&mut rng);
            for &idx in indices.iter().take(n_zero) {
                projection[idx] = 0.0;
            }

            let projected: Vec<f64> = x.outer_iter().map(|row| Self::project(&projection, row)).collect();
            self.histograms.push(Histogram::fit(&projected, self.num_bins));
            self.projections.push(projection);
        }

        self.training_scores = Some(self.decision_function(x)?);
        Ok(())
    }

    fn decision_function(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if self.projections.is_empty() {
            return Err(LscpError::NotFitted("LODA"));
        }
        check_features(self.num_features, x)?;
        Ok(x.outer_iter().map(|row| self.score_row(row)).collect())
    }

    fn training_scores(&self) -> Option<&Array1<f64>> {
        self.training_scores.as_ref()
    }
}
