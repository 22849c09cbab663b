//! Histogram-based selection of competent detectors.

use tracing::warn;

/// Stand-in for a correlation that could not be computed (local region
/// with fewer than two points, or a constant score vector). It is the
/// lowest value a Pearson coefficient can take.
pub const UNDEFINED_CORRELATION: f64 = -1.0;

/// Number of densest bins whose detectors are selected.
const N_SELECTED: usize = 1;

/// Equal-width histogram with `counts.len() + 1` edges. Every bin is
/// half-open except the last, which is closed on the right.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub counts: Vec<usize>,
    pub edges: Vec<f64>,
}

impl Histogram {
    /// Bins `values` over `[min, max]`. When all values are equal the
    /// range becomes `[v - 0.5, v + 0.5]`.
    pub fn new(values: &[f64], n_bins: usize) -> Self {
        let n_bins = n_bins.max(1);
        let (mut first, mut last) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if values.is_empty() {
            first = 0.0;
            last = 1.0;
        }
        if first == last {
            first -= 0.5;
            last += 0.5;
        }

        let step = (last - first) / n_bins as f64;
        let mut edges: Vec<f64> = (0..n_bins).map(|i| first + i as f64 * step).collect();
        edges.push(last);

        let norm = n_bins as f64 / (last - first);
        let mut counts = vec![0; n_bins];
        for &v in values {
            let mut b = (((v - first) * norm) as usize).min(n_bins - 1);
            // The scaled position can round across an edge; settle on the
            // bin whose edges actually bracket the value.
            if b > 0 && v < edges[b] {
                b -= 1;
            } else if b + 1 < n_bins && v >= edges[b + 1] {
                b += 1;
            }
            counts[b] += 1;
        }

        Histogram { counts, edges }
    }

    /// Indices of the `n` fullest bins, fullest first; equal counts keep
    /// scan order.
    pub fn top_bins(&self, n: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.counts.len()).collect();
        order.sort_by(|&a, &b| self.counts[b].cmp(&self.counts[a]));
        order.truncate(n);
        order
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompetencySelector {
    n_bins: usize,
}

impl CompetencySelector {
    pub fn new(n_bins: usize) -> Self {
        CompetencySelector { n_bins: n_bins.max(1) }
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Detectors whose correlation falls in the densest histogram bin.
    ///
    /// Membership is tested against `[edge_low, edge_high]` with both ends
    /// inclusive, so a score lying exactly on the upper edge of the chosen
    /// bin is selected even though the histogram counted it in the next
    /// bin. Non-finite scores are treated as [`UNDEFINED_CORRELATION`].
    /// The result is never empty for a non-empty input.
    pub fn select(&self, correlations: &[f64]) -> Vec<usize> {
        if correlations.is_empty() {
            return Vec::new();
        }

        let mut n_bins = self.n_bins;
        if n_bins > correlations.len() {
            warn!(
                n_bins,
                detectors = correlations.len(),
                "more histogram bins than detectors, reducing n_bins to the detector count"
            );
            n_bins = correlations.len();
        }

        let scores: Vec<f64> = correlations
            .iter()
            .map(|&c| if c.is_finite() { c } else { UNDEFINED_CORRELATION })
            .collect();
        let hist = Histogram::new(&scores, n_bins);

        let mut candidates = Vec::new();
        for bin in hist.top_bins(N_SELECTED) {
            let (low, high) = (hist.edges[bin], hist.edges[bin + 1]);
            candidates.extend(
                scores
                    .iter()
                    .enumerate()
                    .filter(|&(_, &s)| s >= low && s <= high)
                    .map(|(i, _)| i),
            );
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_matches_equal_width_semantics() {
        let h = Histogram::new(&[0.0, 0.25, 0.5, 0.75, 1.0], 4);
        assert_eq!(h.edges, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        // last bin is closed on the right
        assert_eq!(h.counts, vec![1, 1, 1, 2]);
    }

    #[test]
    fn constant_values_widen_the_range() {
        let h = Histogram::new(&[0.3, 0.3, 0.3], 3);
        assert!((h.edges[0] - (-0.2)).abs() < 1e-12);
        assert!((h.edges[3] - 0.8).abs() < 1e-12);
        assert_eq!(h.counts, vec![0, 3, 0]);
    }

    #[test]
    fn top_bins_prefers_first_on_ties() {
        let h = Histogram {
            counts: vec![1, 3, 0, 3],
            edges: vec![0.0, 1.0, 2.0, 3.0, 4.0],
        };
        assert_eq!(h.top_bins(1), vec![1]);
        assert_eq!(h.top_bins(2), vec![1, 3]);
    }

    #[test]
    fn selects_the_densest_cluster() {
        let selector = CompetencySelector::new(3);
        let picked = selector.select(&[0.9, 0.85, 0.88, -0.4, 0.1]);
        assert_eq!(picked, vec![0, 1, 2]);
    }

    #[test]
    fn single_bin_selects_everything() {
        let selector = CompetencySelector::new(1);
        assert_eq!(selector.select(&[-0.3, 0.2, 0.99, 0.5]), vec![0, 1, 2, 3]);
    }

    #[test]
    fn shared_edge_value_is_included_in_lower_bin() {
        // Bins [0, 0.5) and [0.5, 1]; counts tie at 2 so the first wins.
        // 0.5 was counted in the second bin but sits on the first bin's
        // inclusive upper edge.
        let selector = CompetencySelector::new(2);
        assert_eq!(selector.select(&[0.0, 0.1, 0.5, 1.0]), vec![0, 1, 2]);
    }

    #[test]
    fn undefined_correlations_collapse_to_sentinel() {
        let selector = CompetencySelector::new(2);
        assert_eq!(selector.select(&[f64::NAN, f64::NAN, f64::NAN]), vec![0, 1, 2]);

        // A lone defined detector is outvoted by the undefined majority.
        let picked = selector.select(&[f64::NAN, 0.8, f64::NAN]);
        assert_eq!(picked, vec![0, 2]);
    }

    #[test]
    fn bins_are_clamped_to_detector_count() {
        let selector = CompetencySelector::new(10);
        let picked = selector.select(&[0.1, 0.9]);
        assert!(!picked.is_empty());
        assert_eq!(selector.n_bins(), 10);
    }

    #[test]
    fn empty_input_selects_nothing() {
        assert!(CompetencySelector::new(4).select(&[]).is_empty());
    }
}
