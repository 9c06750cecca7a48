//! Handlers for the agent control API.
//!
//! `POST /api/start` validates, replaces any live run and starts the
//! enabled axes. `POST /api/stop` cancels and drains. `GET /api/stats`
//! snapshots, `GET /api/health` answers liveness. Validation failures are
//! plain-text 400s; wrong methods get 405 from the method router.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use synthload_core::config::AgentConfig;
use synthload_core::stats::{CpuStatsSnapshot, MemoryStatsSnapshot, RateStatsSnapshot};

use crate::state::{ActiveRun, AgentState};
use crate::system::SystemSnapshot;

/// Aggregate response of `GET /api/stats`: one entry per live generator
/// plus process figures.
#[derive(Debug, Serialize)]
pub struct AggregatedStats {
    pub agent_status: &'static str,
    pub uptime_secs: u64,
    pub system: SystemSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuStatsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryStatsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<RateStatsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websocket: Option<RateStatsSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grpc: Option<RateStatsSnapshot>,
}

pub async fn start_run(State(state): State<Arc<AgentState>>, body: Bytes) -> impl IntoResponse {
    // Hand-rolled decode so malformed bodies and bad enum values both
    // come back as 400 with the serde reason, not 422.
    let config: AgentConfig = match serde_json::from_slice(&body) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "rejecting start request: invalid JSON");
            return (StatusCode::BAD_REQUEST, format!("invalid JSON: {err}")).into_response();
        }
    };

    if let Err(err) = config.validate() {
        warn!(error = %err, "rejecting start request: validation failed");
        return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
    }

    let mut slot = state.run_slot().lock().await;

    // A new start always replaces the previous run.
    if let Some(previous) = slot.take() {
        previous.stop().await;
    }

    let enabled = config.enabled_axes();
    let (run, warnings) = ActiveRun::start(&config, state.log_sink()).await;

    if enabled > 0 && run.started_axes() == 0 {
        run.stop().await;
        warn!(?warnings, "every enabled axis failed to start");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("no generator started: {}", warnings.join("; ")),
        )
            .into_response();
    }

    *slot = Some(run);
    info!(enabled, warning_count = warnings.len(), "run started");

    if warnings.is_empty() {
        Json(json!({"status": "started"})).into_response()
    } else {
        Json(json!({"status": "started", "warnings": warnings})).into_response()
    }
}

pub async fn stop_run(State(state): State<Arc<AgentState>>) -> impl IntoResponse {
    state.stop_run().await;
    Json(json!({"status": "stopped"}))
}

pub async fn stats(State(state): State<Arc<AgentState>>) -> impl IntoResponse {
    let slot = state.run_slot().lock().await;
    let run = slot.as_ref();

    Json(AggregatedStats {
        agent_status: "healthy",
        uptime_secs: state.uptime_secs(),
        system: SystemSnapshot::capture(),
        cpu: run
            .and_then(|r| r.cpu.as_ref())
            .map(|g| g.stats().snapshot()),
        memory: run
            .and_then(|r| r.memory.as_ref())
            .map(|g| g.stats().snapshot()),
        http: run
            .and_then(|r| r.http.as_ref())
            .map(|g| g.stats().snapshot()),
        websocket: run
            .and_then(|r| r.websocket.as_ref())
            .map(|g| g.stats().snapshot()),
        grpc: run
            .and_then(|r| r.grpc.as_ref())
            .map(|g| g.stats().snapshot()),
    })
}

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy"}))
}
