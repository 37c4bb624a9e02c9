//! PhishGuard inference server.
//!
//! Loads the phishing model once, then serves `POST /predict` until SIGTERM
//! or SIGINT. Startup fails, before the listener is bound, if the model
//! cannot be loaded.

use phishguard_server::config::resolve_config;
use phishguard_server::logging::init_tracing;
use phishguard_server::{build_app_state, build_router, shutdown_signal};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = resolve_config()?;
    init_tracing(&config.logging)?;

    info!(
        listen_addr = %config.listen_addr,
        weights = config.model.weights_path.as_deref().unwrap_or("<none>"),
        "Starting PhishGuard inference server"
    );

    let listen_addr = config.listen_addr.clone();
    let state = build_app_state(config)?;
    info!(source = %state.detector.source(), "Model ready");

    let coordinator = state.shutdown.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!(%listen_addr, "Server listening");

    tokio::spawn(shutdown_signal(coordinator.clone()));
    let token = coordinator.token();
    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
    };

    tokio::select! {
        result = server => result?,
        _ = coordinator.drain_deadline() => {}
    }

    info!("Server stopped");
    Ok(())
}
