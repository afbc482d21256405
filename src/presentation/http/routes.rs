//! Route Configuration
//!
//! Configures all HTTP routes for the service.

use axum::{middleware, response::IntoResponse, routing::get, Router};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::auth_middleware;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // WebSocket endpoint; the caller must authenticate before upgrading
        .route("/ws", get(ws_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}
