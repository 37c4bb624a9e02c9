//! Prediction latency tracking with percentile statistics.
//!
//! [`InferenceStatsTracker`] keeps a sliding window of recent successful
//! prediction durations plus lifetime success/failure counters. The health
//! endpoint reports a [`LatencySummary`] built from it.
//!
//! This state is observability only. It never influences a score.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Percentile statistics over the current window.
#[derive(Debug, Clone)]
pub struct InferenceStats {
    /// Number of samples in the window.
    pub count: usize,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
}

/// JSON-friendly view for `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct LatencySummary {
    /// Predictions served since start.
    pub served: u64,
    /// Predictions that failed since start.
    pub failed: u64,
    /// Samples currently in the latency window.
    pub window: usize,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub mean_ms: Option<f64>,
}

/// Thread-safe tracker for prediction latency.
pub struct InferenceStatsTracker {
    window: Mutex<VecDeque<Duration>>,
    max_samples: usize,
    served: AtomicU64,
    failed: AtomicU64,
}

impl InferenceStatsTracker {
    /// Create a tracker retaining the last `max_samples` durations.
    ///
    /// A window of zero is treated as one.
    #[must_use]
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            window: Mutex::new(VecDeque::with_capacity(max_samples)),
            max_samples,
            served: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Record a successful prediction. Evicts the oldest sample when full.
    pub fn record_success(&self, duration: Duration) {
        self.served.fetch_add(1, Ordering::Relaxed);
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        if window.len() >= self.max_samples {
            window.pop_front();
        }
        window.push_back(duration);
    }

    /// Record a failed prediction. Failures do not enter the latency window.
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Lifetime count of successful predictions.
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    /// Lifetime count of failed predictions.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Percentile statistics over the window, or `None` when it is empty.
    #[must_use]
    pub fn stats(&self) -> Option<InferenceStats> {
        let mut sorted: Vec<Duration> = {
            let window = self.window.lock().unwrap_or_else(|e| e.into_inner());
            if window.is_empty() {
                return None;
            }
            window.iter().copied().collect()
        };
        sorted.sort();

        let count = sorted.len();
        let total: Duration = sorted.iter().sum();

        Some(InferenceStats {
            count,
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
            min: sorted[0],
            max: sorted[count - 1],
            mean: total / count as u32,
        })
    }

    /// Summary for the health endpoint.
    pub fn summary(&self) -> LatencySummary {
        let stats = self.stats();
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        LatencySummary {
            served: self.served(),
            failed: self.failed(),
            window: stats.as_ref().map_or(0, |s| s.count),
            p50_ms: stats.as_ref().map(|s| ms(s.p50)),
            p95_ms: stats.as_ref().map(|s| ms(s.p95)),
            p99_ms: stats.as_ref().map(|s| ms(s.p99)),
            mean_ms: stats.as_ref().map(|s| ms(s.mean)),
        }
    }
}

/// Nearest-rank percentile of a sorted, non-empty slice.
fn percentile(sorted: &[Duration], pct: f64) -> Duration {
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
