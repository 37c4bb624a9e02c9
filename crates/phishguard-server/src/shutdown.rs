//! Stopping the inference server.
//!
//! SIGTERM or SIGINT cancels one token. axum watches that token, stops
//! accepting connections and lets open `/predict` calls finish. Each call
//! holds a [`PredictionGuard`] while its blocking inference runs, which is
//! what `/health` reports as `in_flight`. `main` races the server against
//! [`ShutdownCoordinator::drain_deadline`] so a stuck prediction cannot hold
//! the process open past `shutdown.timeout_seconds`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Shutdown token plus the count of predictions still running.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    in_flight: Arc<AtomicUsize>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            token: CancellationToken::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    /// Token handed to `axum::serve(..).with_graceful_shutdown`.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Drives the `/health` status field.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Count one prediction until the returned guard drops.
    pub fn track_prediction(&self) -> PredictionGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        PredictionGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Completes `shutdown.timeout_seconds` after shutdown starts, and never
    /// before.
    pub async fn drain_deadline(&self) {
        self.token.cancelled().await;
        tokio::time::sleep(self.timeout).await;
        warn!(
            remaining = self.in_flight_count(),
            timeout_seconds = self.timeout.as_secs(),
            "Drain deadline reached, abandoning unfinished predictions"
        );
    }
}

/// Held by a `/predict` call for the duration of its inference.
pub struct PredictionGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for PredictionGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wait for an OS stop signal (or a programmatic trigger), then cancel the
/// token so the server begins draining.
pub async fn shutdown_signal(coordinator: ShutdownCoordinator) {
    let token = coordinator.token();
    tokio::select! {
        reason = wait_for_stop_signal() => info!(signal = reason, "Stopping PhishGuard server"),
        _ = token.cancelled() => info!("Shutdown requested"),
    }
    coordinator.trigger();
}

#[cfg(unix)]
async fn wait_for_stop_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        },
        _ => {
            warn!("Could not install signal handlers, only programmatic shutdown will work");
            std::future::pending().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_stop_signal() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "Ctrl-C",
        Err(e) => {
            warn!(error = %e, "Could not listen for Ctrl-C, only programmatic shutdown will work");
            std::future::pending().await
        }
    }
}
