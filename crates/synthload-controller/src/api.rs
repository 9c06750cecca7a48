//! Controller HTTP API.
//!
//! Registry management plus fan-out of start/stop/stats to individual
//! agents. Agent responses pass through verbatim; an unreachable agent
//! maps to 502 and an unknown id to 404.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use synthload_core::config::AgentConfig;
use synthload_core::error::LoadError;

use crate::client::AgentClient;
use crate::registry::AgentRegistry;

/// Shared state behind the controller API.
#[derive(Clone)]
pub struct ControllerState {
    pub registry: Arc<AgentRegistry>,
    pub client: Arc<AgentClient>,
}

#[derive(Debug, Deserialize)]
struct AddAgentRequest {
    agent_id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct AgentIdRequest {
    agent_id: String,
}

#[derive(Debug, Deserialize)]
struct StartAgentRequest {
    agent_id: String,
    config: AgentConfig,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    agent_id: String,
}

fn decode<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|err| {
        warn!(error = %err, "rejecting request: invalid JSON");
        (StatusCode::BAD_REQUEST, format!("invalid JSON: {err}")).into_response()
    })
}

fn error_response(err: LoadError) -> Response {
    let status = match &err {
        LoadError::AgentNotFound { .. } => StatusCode::NOT_FOUND,
        LoadError::AgentUnreachable { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string()).into_response()
}

pub async fn list_agents(State(state): State<ControllerState>) -> impl IntoResponse {
    Json(state.registry.list().await)
}

pub async fn add_agent(State(state): State<ControllerState>, body: Bytes) -> Response {
    let request: AddAgentRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    if request.agent_id.is_empty() || request.url.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "agent_id and url are required".to_string(),
        )
            .into_response();
    }

    state.registry.add(request.agent_id, request.url).await;
    Json(json!({"status": "added"})).into_response()
}

pub async fn remove_agent(State(state): State<ControllerState>, body: Bytes) -> Response {
    let request: AgentIdRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    state.registry.remove(&request.agent_id).await;
    Json(json!({"status": "removed"})).into_response()
}

pub async fn start_agent(State(state): State<ControllerState>, body: Bytes) -> Response {
    let request: StartAgentRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    if let Err(err) = request.config.validate() {
        return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
    }

    let url = match state.registry.url_of(&request.agent_id).await {
        Ok(url) => url,
        Err(err) => return error_response(err),
    };

    match state
        .client
        .start_load(&request.agent_id, &url, &request.config)
        .await
    {
        Ok(agent_response) => Json(agent_response).into_response(),
        Err(err) => error_response(err),
    }
}

pub async fn stop_agent(State(state): State<ControllerState>, body: Bytes) -> Response {
    let request: AgentIdRequest = match decode(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let url = match state.registry.url_of(&request.agent_id).await {
        Ok(url) => url,
        Err(err) => return error_response(err),
    };

    match state.client.stop_load(&request.agent_id, &url).await {
        Ok(agent_response) => Json(agent_response).into_response(),
        Err(err) => error_response(err),
    }
}

pub async fn agent_stats(
    State(state): State<ControllerState>,
    Query(query): Query<StatsQuery>,
) -> Response {
    let url = match state.registry.url_of(&query.agent_id).await {
        Ok(url) => url,
        Err(err) => return error_response(err),
    };

    match state.client.fetch_stats(&query.agent_id, &url).await {
        Ok(stats) => Json(json!({"agent_id": query.agent_id, "stats": stats})).into_response(),
        Err(err) => error_response(err),
    }
}
