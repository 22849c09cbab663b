//! Scoring metrics for labelled benchmarks. Labels are `true` for outliers.

/// Area under the ROC curve via the rank-sum statistic, averaging ranks
/// over tied scores. Returns 0.5 when only one class is present.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> f64 {
    let n = labels.len().min(scores.len());
    let n_pos = labels[..n].iter().filter(|&&l| l).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks i+1 ..= j+1 share their average
        let avg_rank = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            if labels[idx] {
                rank_sum += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    (rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64)
}

/// Precision among the `n` highest scores, where `n` is the number of
/// true outliers.
pub fn precision_at_n(labels: &[bool], scores: &[f64]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l).count();
    if n_pos == 0 {
        return 0.0;
    }
    let mut order: Vec<usize> = (0..scores.len().min(labels.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    let hits = order.iter().take(n_pos).filter(|&&i| labels[i]).count();
    hits as f64 / n_pos as f64
}

/// Precision, recall and F1 when every score above `threshold` is
/// flagged as an outlier.
pub fn threshold_metrics(labels: &[bool], scores: &[f64], threshold: f64) -> (f64, f64, f64) {
    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut fn_count = 0.0;

    for (&label, &score) in labels.iter().zip(scores) {
        let predicted = score > threshold;
        match (label, predicted) {
            (true, true) => tp += 1.0,
            (false, true) => fp += 1.0,
            (true, false) => fn_count += 1.0,
            (false, false) => {}
        }
    }

    let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
    let recall = if tp + fn_count > 0.0 { tp / (tp + fn_count) } else { 0.0 };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    (precision, recall, f1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auc_perfect_inverse_and_ties() {
        let labels = [false, false, true, true];
        assert_eq!(roc_auc(&labels, &[0.1, 0.2, 0.8, 0.9]), 1.0);
        assert_eq!(roc_auc(&labels, &[0.9, 0.8, 0.2, 0.1]), 0.0);
        assert_eq!(roc_auc(&labels, &[0.5, 0.5, 0.5, 0.5]), 0.5);
        assert_eq!(roc_auc(&[true, true], &[0.1, 0.2]), 0.5);
    }

    #[test]
    fn auc_partial_ordering() {
        // one of four positive/negative pairs is misordered
        let labels = [false, true, false, true];
        assert_eq!(roc_auc(&labels, &[0.1, 0.3, 0.4, 0.9]), 0.75);
    }

    #[test]
    fn precision_at_n_counts_top_hits() {
        let labels = [false, true, false, true, false];
        assert_eq!(precision_at_n(&labels, &[0.0, 0.9, 0.1, 0.8, 0.2]), 1.0);
        assert_eq!(precision_at_n(&labels, &[0.0, 0.9, 0.95, 0.1, 0.2]), 0.5);
        assert_eq!(precision_at_n(&[false, false], &[0.1, 0.2]), 0.0);
    }

    #[test]
    fn threshold_metrics_counts() {
        let labels = [true, true, false, false];
        let (p, r, f1) = threshold_metrics(&labels, &[0.9, 0.2, 0.8, 0.1], 0.5);
        assert_eq!(p, 0.5);
        assert_eq!(r, 0.5);
        assert_eq!(f1, 0.5);
        assert_eq!(threshold_metrics(&labels, &[0.0; 4], 0.5), (0.0, 0.0, 0.0));
    }
}
