//! HTTP client for controller-to-agent RPCs.
//!
//! Thin wrapper over one shared reqwest client. Transport failures and
//! unexpected statuses surface as `AgentUnreachable` with the agent id;
//! the registry is never mutated here.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use synthload_core::config::AgentConfig;
use synthload_core::error::{LoadError, LoadResult};

pub struct AgentClient {
    http: reqwest::Client,
}

impl AgentClient {
    /// `timeout` bounds every RPC, health probes included.
    pub fn new(timeout: Duration) -> LoadResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::start_failed("controller", e.to_string()))?;
        Ok(Self { http })
    }

    /// `POST <agent>/api/start` with the run configuration.
    pub async fn start_load(&self, id: &str, base_url: &str, config: &AgentConfig) -> LoadResult<Value> {
        let response = self
            .http
            .post(format!("{base_url}/api/start"))
            .json(config)
            .send()
            .await
            .map_err(|e| LoadError::agent_unreachable(id, e.to_string()))?;

        Self::expect_ok(id, response).await
    }

    /// `POST <agent>/api/stop`.
    pub async fn stop_load(&self, id: &str, base_url: &str) -> LoadResult<Value> {
        let response = self
            .http
            .post(format!("{base_url}/api/stop"))
            .send()
            .await
            .map_err(|e| LoadError::agent_unreachable(id, e.to_string()))?;

        Self::expect_ok(id, response).await
    }

    /// `GET <agent>/api/stats`.
    pub async fn fetch_stats(&self, id: &str, base_url: &str) -> LoadResult<Value> {
        let response = self
            .http
            .get(format!("{base_url}/api/stats"))
            .send()
            .await
            .map_err(|e| LoadError::agent_unreachable(id, e.to_string()))?;

        Self::expect_ok(id, response).await
    }

    /// `GET <agent>/api/health`; true when the agent answered 200.
    pub async fn probe_health(&self, id: &str, base_url: &str) -> bool {
        match self.http.get(format!("{base_url}/api/health")).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                debug!(agent = %id, error = %err, "health probe failed");
                false
            }
        }
    }

    async fn expect_ok(id: &str, response: reqwest::Response) -> LoadResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoadError::agent_unreachable(
                id,
                format!("agent returned status {status}: {body}"),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| LoadError::agent_unreachable(id, e.to_string()))
    }
}
