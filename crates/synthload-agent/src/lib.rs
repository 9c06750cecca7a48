//! SynthLoad agent: hosts the generators behind the HTTP control API.

pub mod handlers;
pub mod state;
pub mod system;

pub use state::AgentState;

use std::sync::Arc;

use axum::extract::Request;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info_span;
use uuid::Uuid;

/// Builds the agent control router.
pub fn build_router(state: Arc<AgentState>) -> Router {
    Router::new()
        .route("/api/start", post(handlers::start_run))
        .route("/api/stop", post(handlers::stop_run))
        .route("/api/stats", get(handlers::stats))
        .route("/api/health", get(handlers::health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = Uuid::new_v4();
                info_span!(
                    "agent_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
}
