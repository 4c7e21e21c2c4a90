//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::broker::Broker;

use super::{
    handler::{health_check, new_client, poll, post_message},
    signal::shutdown_signal,
    state::AppState,
};

/// Build the application router. Split out of [`run_server`] so tests can
/// serve it on an ephemeral port.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", get(new_client))
        .route("/chat/{id}", get(poll).post(post_message))
        .route("/api/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the long-poll chat server.
///
/// # Arguments
///
/// * `host` - The host address to bind to (e.g., "127.0.0.1")
/// * `port` - The port number to bind to (e.g., 8124)
/// * `broker` - The broker holding all connection and message state
pub async fn run_server(
    host: String,
    port: u16,
    broker: Arc<Broker>,
) -> Result<(), Box<dyn std::error::Error>> {
    let sweeper = broker.spawn_sweeper();
    let app = build_router(Arc::new(AppState {
        broker: broker.clone(),
    }));

    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!(
        "long-poll chat server listening on {}",
        listener.local_addr()?
    );
    tracing::info!("Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Server shutdown complete");

    Ok(())
}
