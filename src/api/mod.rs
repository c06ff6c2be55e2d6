//! REST API and WebSocket server
//!
//! ## Endpoints
//!
//! - `GET /history?limit=N` - Most recent readings, newest first
//! - `POST /manual-report` - Submit a reading by hand
//! - `POST /advisory` - Diagnosis or answer for the latest reading
//! - `GET /advisory/history` - Advisory audit trail
//! - `GET /health` - Health check
//! - `GET /stats` - Ingestion statistics
//! - `WS /stream` - Live reading push

pub mod error;
pub mod routes;
pub mod state;
pub mod types;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::HttpConfig;

/// Build the router with every route and layer
pub fn router(state: ApiState, config: &HttpConfig) -> Router {
    let mut app = Router::new()
        .route("/history", get(routes::history::get_history))
        .route("/manual-report", post(routes::manual::submit_report))
        .route("/advisory", post(routes::advisory::request_advisory))
        .route("/advisory/history", get(routes::advisory::advisory_history))
        .route("/health", get(routes::health::health_check))
        .route("/stats", get(routes::stats::get_stats))
        .route("/stream", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// Binds immediately and serves in a background task until `shutdown`
/// resolves, then drains in-flight requests. Returns the bound address and
/// the task, which finishes once the server has stopped.
pub async fn spawn_api_server(
    config: &HttpConfig,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state, config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("API server error: {}", e);
        }
        info!("API server stopped");
    });

    Ok((addr, task))
}
