//! PhishGuard inference server library.
//!
//! Exposes state construction and the router so that `main` and the
//! integration tests build the service the same way.

pub mod config;
pub mod inference_stats;
pub mod logging;
pub mod service;
pub mod shutdown;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use phishguard_core::ServiceConfig;
use phishguard_model::{select_device, DevicePreference, PhishDetector};

pub use inference_stats::InferenceStatsTracker;
pub use service::{health_handler, home_handler, predict_handler, AppState};
pub use shutdown::{shutdown_signal, ShutdownCoordinator};

/// Load the model described by `config` and wrap it in [`AppState`].
///
/// Any failure here is fatal: the server must not start without a model.
pub fn build_app_state(config: ServiceConfig) -> anyhow::Result<Arc<AppState>> {
    let preference: DevicePreference = config.model.device.parse()?;
    let device = select_device(preference);
    let detector = PhishDetector::load(&config.model, &device)
        .map_err(|e| anyhow::anyhow!("Failed to load phishing model: {e}"))?;
    Ok(Arc::new(AppState::new(config, detector)))
}

/// Build the axum [`Router`] with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}
