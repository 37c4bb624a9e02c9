//! Offline utilities around the PhishGuard model.
//!
//! - [`dataset`]: labelled `URL,label` CSV loading
//! - [`metrics`]: accuracy, precision/recall, ROC AUC
//! - [`run_evaluation`]: score a dataset in batches and compute metrics

pub mod dataset;
pub mod metrics;

use phishguard_model::PhishDetector;

use crate::dataset::LabelledUrl;
use crate::metrics::{evaluate_scores, EvaluationMetrics};

/// Score every row with `detector` and compare against the labels.
pub fn run_evaluation(
    detector: &PhishDetector,
    rows: &[LabelledUrl],
    batch_size: usize,
    threshold: f64,
) -> phishguard_core::Result<EvaluationMetrics> {
    let batch_size = batch_size.max(1);
    let mut scores = Vec::with_capacity(rows.len());
    for (i, chunk) in rows.chunks(batch_size).enumerate() {
        let urls: Vec<&str> = chunk.iter().map(|r| r.url.as_str()).collect();
        scores.extend(detector.classify_batch(&urls)?);
        tracing::debug!(batch = i, scored = scores.len(), "Scored batch");
    }
    let labels: Vec<bool> = rows.iter().map(|r| r.phishing).collect();
    Ok(evaluate_scores(&scores, &labels, threshold))
}
