use ndarray::{Array1, Array2, ArrayView2, Axis};
use statrs::function::beta::beta_reg;

use crate::error::{LscpError, Result};

/// Rejects matrices the ensemble cannot work with: no rows, no columns,
/// or any NaN/infinite entry.
pub fn check_array(x: ArrayView2<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(LscpError::EmptyInput);
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(LscpError::NonFinite);
    }
    Ok(())
}

/// Per-column mean and population standard deviation of `x`.
///
/// A column with zero spread gets a deviation of 1.0 so that it is only
/// centred when standardized.
pub fn column_moments(x: ArrayView2<f64>) -> (Array1<f64>, Array1<f64>) {
    let n = x.nrows().max(1) as f64;
    let mean = x.sum_axis(Axis(0)) / n;
    let mut std = Array1::zeros(x.ncols());
    for (j, col) in x.axis_iter(Axis(1)).enumerate() {
        let mu = mean[j];
        let var = col.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / n;
        let sd = var.sqrt();
        std[j] = if sd > 0.0 && sd.is_finite() { sd } else { 1.0 };
    }
    (mean, std)
}

/// Rescales `train` and `test` column-wise to zero mean and unit variance,
/// using the statistics of `train` for both.
pub fn standardize(train: ArrayView2<f64>, test: ArrayView2<f64>) -> (Array2<f64>, Array2<f64>) {
    let (mean, std) = column_moments(train);
    let apply = |m: ArrayView2<f64>| {
        let mut out = m.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            row -= &mean;
            row /= &std;
        }
        out
    };
    (apply(train), apply(test))
}

/// Pearson product-moment correlation and its two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub coefficient: f64,
    pub p_value: f64,
}

/// Pearson correlation of two equally long samples.
///
/// Returns `None` when the coefficient is undefined: fewer than two
/// points, mismatched lengths, or zero variance in either sample.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<Correlation> {
    let n = a.len();
    if n < 2 || n != b.len() {
        return None;
    }
    let nf = n as f64;
    let mean_a = a.iter().sum::<f64>() / nf;
    let mean_b = b.iter().sum::<f64>() / nf;

    let mut sab = 0.0;
    let mut saa = 0.0;
    let mut sbb = 0.0;
    for (x, y) in a.iter().zip(b) {
        let da = x - mean_a;
        let db = y - mean_b;
        sab += da * db;
        saa += da * da;
        sbb += db * db;
    }
    if saa <= 0.0 || sbb <= 0.0 {
        return None;
    }

    let r = sab / (saa.sqrt() * sbb.sqrt());
    if !r.is_finite() {
        return None;
    }
    let r = r.clamp(-1.0, 1.0);

    Some(Correlation {
        coefficient: r,
        p_value: correlation_p_value(r, n),
    })
}

fn correlation_p_value(r: f64, n: usize) -> f64 {
    if n <= 2 {
        return 1.0;
    }
    let df = (n - 2) as f64;
    let r2 = r * r;
    if r2 >= 1.0 {
        return 0.0;
    }
    // Two-sided Student t tail: I_{df/(df+t^2)}(df/2, 1/2).
    let t2 = df * r2 / (1.0 - r2);
    beta_reg(0.5 * df, 0.5, df / (df + t2)).clamp(0.0, 1.0)
}

/// Percentile `q` (0..=100) of `values` with linear interpolation between
/// the two nearest ranks. Empty input yields NaN.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
