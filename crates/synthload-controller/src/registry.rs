//! Agent registry with JSON persistence.
//!
//! The registry maps agent ids to their base URL and last observed
//! health. Every mutation persists the whole map to
//! `<config_dir>/agents.json` via a temp-file rename, so a crash never
//! leaves a half-written file. Persist failures are logged and the
//! in-memory mutation stands.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use synthload_core::error::{LoadError, LoadResult};

const REGISTRY_FILE: &str = "agents.json";

/// One registered agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRecord {
    pub url: String,
    pub last_seen: DateTime<Utc>,
    pub is_healthy: bool,
}

/// Wire/file shape: `{"agents": {"<id>": {...}}}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    agents: HashMap<String, AgentRecord>,
}

pub struct AgentRegistry {
    agents: RwLock<HashMap<String, AgentRecord>>,
    config_dir: PathBuf,
}

impl AgentRegistry {
    /// Empty registry persisting under `config_dir`.
    #[must_use]
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    /// Opens the registry under `config_dir`, reloading a persisted file
    /// when one exists. A missing file is an empty registry. Reloaded
    /// agents start unhealthy until the next probe cycle proves
    /// otherwise.
    pub fn load(config_dir: impl AsRef<Path>) -> LoadResult<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();
        let path = config_dir.join(REGISTRY_FILE);

        let mut agents = HashMap::new();
        if path.exists() {
            let data = std::fs::read(&path)?;
            let file: RegistryFile = serde_json::from_slice(&data)?;
            agents = file.agents;
            for record in agents.values_mut() {
                record.is_healthy = false;
            }
            info!(count = agents.len(), path = %path.display(), "reloaded agent registry");
        }

        Ok(Self {
            agents: RwLock::new(agents),
            config_dir,
        })
    }

    /// Registers (or overwrites) an agent and persists.
    pub async fn add(&self, id: impl Into<String>, url: impl Into<String>) {
        let id = id.into();
        let url = url.into();
        info!(agent = %id, %url, "adding agent");

        self.agents.write().await.insert(
            id,
            AgentRecord {
                url,
                last_seen: Utc::now(),
                is_healthy: false,
            },
        );
        self.persist().await;
    }

    /// Deregisters an agent and persists.
    pub async fn remove(&self, id: &str) {
        info!(agent = %id, "removing agent");
        self.agents.write().await.remove(id);
        self.persist().await;
    }

    /// Record for one agent.
    pub async fn get(&self, id: &str) -> Option<AgentRecord> {
        self.agents.read().await.get(id).cloned()
    }

    /// Base URL for one agent, or `AgentNotFound`.
    pub async fn url_of(&self, id: &str) -> LoadResult<String> {
        self.agents
            .read()
            .await
            .get(id)
            .map(|record| record.url.clone())
            .ok_or_else(|| LoadError::agent_not_found(id))
    }

    /// Copy of the whole registry.
    pub async fn list(&self) -> HashMap<String, AgentRecord> {
        self.agents.read().await.clone()
    }

    /// Write guard over the map, used by the health supervisor to keep
    /// one probe cycle atomic with respect to add/remove.
    pub(crate) async fn write_guard(
        &self,
    ) -> tokio::sync::RwLockWriteGuard<'_, HashMap<String, AgentRecord>> {
        self.agents.write().await
    }

    /// Persists the current map; failures are logged, never propagated.
    pub(crate) async fn persist(&self) {
        let snapshot = RegistryFile {
            agents: self.agents.read().await.clone(),
        };
        if let Err(err) = self.write_file(&snapshot) {
            warn!(error = %err, "failed to persist agent registry");
        }
    }

    fn write_file(&self, snapshot: &RegistryFile) -> LoadResult<()> {
        std::fs::create_dir_all(&self.config_dir)
            .map_err(|e| LoadError::persist(e.to_string()))?;

        let path = self.config_dir.join(REGISTRY_FILE);
        let data = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| LoadError::persist(e.to_string()))?;

        // Write-then-rename keeps the registry file whole under crashes.
        let tmp = self.config_dir.join(format!("{REGISTRY_FILE}.tmp"));
        std::fs::write(&tmp, data).map_err(|e| LoadError::persist(e.to_string()))?;
        std::fs::rename(&tmp, &path).map_err(|e| LoadError::persist(e.to_string()))?;
        Ok(())
    }
}
