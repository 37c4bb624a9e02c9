//! Evaluation metrics for the phishing classifier.
//!
//! Threshold metrics come from a confusion matrix. ROC AUC is computed from
//! the raw scores with the rank-sum formulation, averaging ranks over ties.

use serde::Serialize;

/// Metrics for one evaluation run.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub fpr: f64,
    /// `None` when only one class is present.
    pub roc_auc: Option<f64>,
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_count: usize,
}

/// Compute metrics from phishing scores and ground truth.
///
/// A score strictly above `threshold` counts as a phishing prediction.
pub fn evaluate_scores(scores: &[f64], labels: &[bool], threshold: f64) -> EvaluationMetrics {
    assert_eq!(
        scores.len(),
        labels.len(),
        "scores and labels must have same length"
    );

    let (mut tp, mut fp, mut tn, mut fn_count) = (0usize, 0usize, 0usize, 0usize);
    for (&score, &phishing) in scores.iter().zip(labels) {
        match (score > threshold, phishing) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_count += 1,
        }
    }

    let ratio = |num: usize, den: usize| {
        if den > 0 {
            num as f64 / den as f64
        } else {
            0.0
        }
    };

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_count);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    EvaluationMetrics {
        accuracy: ratio(tp + tn, scores.len()),
        precision,
        recall,
        f1,
        fpr: ratio(fp, fp + tn),
        roc_auc: roc_auc(scores, labels),
        tp,
        fp,
        tn,
        fn_count,
    }
}

/// Area under the ROC curve, or `None` if either class is absent.
///
/// Equals the probability that a random phishing URL outscores a random
/// benign one, with ties counting half.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
    let positives = labels.iter().filter(|&&l| l).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // 1-based ranks, tied groups share their average rank.
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            if labels[idx] {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((rank_sum_pos - p * (p + 1.0) / 2.0) / (p * n))
}

impl std::fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auc = self
            .roc_auc
            .map_or_else(|| "n/a".to_string(), |a| format!("{a:.4}"));
        write!(
            f,
            "auc={auc} acc={:.4} prec={:.4} rec={:.4} f1={:.4} fpr={:.4} (tp={} fp={} tn={} fn={})",
            self.accuracy,
            self.precision,
            self.recall,
            self.f1,
            self.fpr,
            self.tp,
            self.fp,
            self.tn,
            self.fn_count,
        )
    }
}
