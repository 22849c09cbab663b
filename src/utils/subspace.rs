use rand::seq::index;
use rand::Rng;

/// Inclusive bounds on the number of features drawn for one subspace,
/// derived from fractions of the total feature count.
pub fn subspace_bounds(n_features: usize, min_frac: f64, max_frac: f64) -> (usize, usize) {
    let upper = ((n_features as f64 * max_frac).ceil() as usize).clamp(1, n_features.max(1));
    let lower = ((n_features as f64 * min_frac).ceil() as usize).clamp(1, upper);
    (lower, upper)
}

/// Draws a sorted set of distinct feature indices from `0..n_features`.
/// The set size is uniform over `min_count..=max_count`.
pub fn sample_subspace<R: Rng + ?Sized>(
    rng: &mut R,
    n_features: usize,
    min_count: usize,
    max_count: usize,
) -> Vec<usize> {
    let max_count = max_count.min(n_features);
    let min_count = min_count.min(max_count);
    let size = rng.gen_range(min_count..=max_count);

    let mut features = index::sample(rng, n_features, size).into_vec();
    features.sort_unstable();
    features
}
