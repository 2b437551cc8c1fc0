//! HTTP server.
//!
//! Provides endpoints for:
//! - Run commands (`/api/v1/agent/{start,pause,resume,stop}`)
//! - Run status and step log (`/api/v1/agent/status`, `/api/v1/agent/results`)
//! - Live event stream (`/ws/agent-stream`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod handlers;
pub mod responses;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    // Browser frontends are served from other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Command routes
        .route("/api/v1/agent/start", post(handlers::start_agent))
        .route("/api/v1/agent/pause", post(handlers::pause_agent))
        .route("/api/v1/agent/resume", post(handlers::resume_agent))
        .route("/api/v1/agent/stop", post(handlers::stop_agent))
        .route("/api/v1/agent/status", get(handlers::agent_status))
        .route("/api/v1/agent/results", get(handlers::agent_results))
        // Live stream
        .route("/ws/agent-stream", get(handlers::agent_stream))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
