//! SynthLoad controller: agent registry, health supervision and
//! fleet-wide start/stop/stats fan-out.

pub mod api;
pub mod client;
pub mod registry;
pub mod supervisor;

pub use api::ControllerState;
pub use client::AgentClient;
pub use registry::{AgentRecord, AgentRegistry};
pub use supervisor::HealthSupervisor;

use axum::extract::Request;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info_span;
use uuid::Uuid;

/// Builds the controller router.
pub fn build_router(state: ControllerState) -> Router {
    Router::new()
        .route("/api/agents", get(api::list_agents))
        .route("/api/agents/add", post(api::add_agent))
        .route("/api/agents/remove", post(api::remove_agent))
        .route("/api/agents/start", post(api::start_agent))
        .route("/api/agents/stop", post(api::stop_agent))
        .route("/api/agents/stats", get(api::agent_stats))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = Uuid::new_v4();
                info_span!(
                    "controller_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
}
