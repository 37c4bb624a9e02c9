//! Request handlers for the inference service.
//!
//! `POST /predict` is the only endpoint with behaviour that matters. It reads
//! the body, pulls out the `url` string, scores it on the blocking pool and
//! answers `{"phishing": p}`. Every failure is answered with
//! `500 {"error": message}`. Nothing escapes the handler, so one bad request
//! cannot take the process down.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use phishguard_core::{PhishGuardError, ServiceConfig};
use phishguard_model::{device_label, PhishDetector};
use serde::Serialize;
use tracing::{debug, error, trace, warn};

use crate::inference_stats::InferenceStatsTracker;
use crate::shutdown::ShutdownCoordinator;

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state threaded through axum handlers via [`State`].
pub struct AppState {
    /// Service configuration.
    pub config: ServiceConfig,
    /// Loaded once at startup, read-only afterwards.
    pub detector: Arc<PhishDetector>,
    /// Prediction latency and outcome counters.
    pub stats: InferenceStatsTracker,
    /// Shutdown broadcast and in-flight tracking.
    pub shutdown: ShutdownCoordinator,
}

impl AppState {
    /// Assemble state around an already-loaded detector.
    pub fn new(config: ServiceConfig, detector: PhishDetector) -> Self {
        let stats = InferenceStatsTracker::new(config.stats.window_size);
        let shutdown = ShutdownCoordinator::new(config.shutdown.timeout_seconds);
        Self {
            config,
            detector: Arc::new(detector),
            stats,
            shutdown,
        }
    }
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Successful prediction.
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    /// Phishing probability in `[0, 1]`.
    pub phishing: f64,
}

/// Failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Every failure maps to 500 so clients see a single error status.
fn error_response(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Input extraction
// ---------------------------------------------------------------------------

/// Pull the `url` string out of a JSON request body.
///
/// The body is parsed as JSON regardless of its content type.
pub fn extract_url(body: &[u8]) -> Result<String, PhishGuardError> {
    let value: serde_json::Value = serde_json::from_slice(body)?;
    let object = value.as_object().ok_or_else(|| {
        PhishGuardError::InvalidInput("request body must be a JSON object".to_string())
    })?;
    match object.get("url") {
        Some(serde_json::Value::String(url)) => Ok(url.clone()),
        Some(_) => Err(PhishGuardError::InvalidInput(
            "'url' must be a string".to_string(),
        )),
        None => Err(PhishGuardError::InvalidInput(
            "missing 'url' field".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /predict`
pub async fn predict_handler(State(state): State<Arc<AppState>>, body: Body) -> Response {
    let limit = usize::try_from(state.config.max_request_size_bytes).unwrap_or(usize::MAX);
    let body_bytes = match axum::body::to_bytes(body, limit).await {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "Failed to read prediction request body");
            state.stats.record_failure();
            let err = PhishGuardError::InvalidInput(format!("failed to read request body: {e}"));
            return error_response(err.to_string());
        }
    };

    let url = match extract_url(&body_bytes) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Rejected prediction request");
            state.stats.record_failure();
            return error_response(e.to_string());
        }
    };
    trace!(%url, "Scoring URL");

    let _guard = state.shutdown.track_prediction();
    let detector = Arc::clone(&state.detector);
    let start = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || detector.classify(&url)).await;
    let elapsed = start.elapsed();

    match outcome {
        Ok(Ok(score)) => {
            state.stats.record_success(elapsed);
            debug!(
                score,
                latency_us = elapsed.as_micros() as u64,
                "Prediction served"
            );
            (StatusCode::OK, Json(PredictResponse { phishing: score })).into_response()
        }
        Ok(Err(e)) => {
            state.stats.record_failure();
            if e.is_client_error() {
                warn!(error = %e, "Prediction rejected");
            } else {
                error!(error = %e, "Prediction failed");
            }
            error_response(e.to_string())
        }
        Err(join_err) => {
            state.stats.record_failure();
            error!(error = %join_err, "Inference task aborted");
            error_response(format!("Inference task failed: {join_err}"))
        }
    }
}

/// `GET /`
pub async fn home_handler() -> Html<&'static str> {
    Html(HOME_PAGE)
}

const HOME_PAGE: &str = concat!(
    "<h1>PhishGuard API</h1>",
    "<p>POST <code>/predict</code> with JSON:</p>",
    "<pre>{\"url\": \"https://example.com\"}</pre>",
    "<p>Response: <code>{\"phishing\": 0.03}</code>, the probability that the URL is phishing.</p>",
    "<hr>",
    "<h2>Test quickly</h2>",
    "<b>cURL:</b><br>",
    "<pre>curl -X POST http://127.0.0.1:8000/predict -H \"Content-Type: application/json\" ",
    "-d '{\"url\":\"https://paypal-secure-login.ru\"}'</pre>",
    "<p>Service status: <code>GET /health</code></p>",
);

/// `GET /health`
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    let model = state.detector.model();
    let dims = model.dims();
    let body = serde_json::json!({
        "status": if state.shutdown.is_shutting_down() { "shutting_down" } else { "healthy" },
        "model": {
            "source": state.detector.source().to_string(),
            "device": device_label(model.device()),
            "vocab_size": model.vocab_size(),
            "max_len": dims.max_len,
            "d_model": dims.d_model,
            "heads": dims.num_heads,
            "layers": dims.num_layers,
        },
        "inference": state.stats.summary(),
        "in_flight": state.shutdown.in_flight_count(),
    });
    (StatusCode::OK, Json(body)).into_response()
}
