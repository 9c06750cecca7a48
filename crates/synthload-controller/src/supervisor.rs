//! Background health supervision of the agent fleet.
//!
//! Each cycle takes the registry write guard, probes every agent in
//! turn, updates `is_healthy` and `last_seen`, then persists. The serial
//! probe keeps the cycle simple; `Add`/`Remove` callers wait at most one
//! cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::AgentClient;
use crate::registry::AgentRegistry;

pub struct HealthSupervisor {
    registry: Arc<AgentRegistry>,
    client: Arc<AgentClient>,
    period: Duration,
}

impl HealthSupervisor {
    #[must_use]
    pub fn new(registry: Arc<AgentRegistry>, client: Arc<AgentClient>, period: Duration) -> Self {
        Self {
            registry,
            client,
            period,
        }
    }

    /// Runs probe cycles on the fixed period until cancelled.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            // The interval's immediate first tick gives a prompt initial
            // probe after startup.
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => self.run_cycle().await,
                }
            }
            info!("health supervisor stopped");
        })
    }

    /// One full probe pass over the registry.
    pub async fn run_cycle(&self) {
        {
            let mut agents = self.registry.write_guard().await;
            debug!(count = agents.len(), "health cycle starting");

            for (id, record) in agents.iter_mut() {
                let healthy = self.client.probe_health(id, &record.url).await;
                if healthy != record.is_healthy {
                    info!(agent = %id, healthy, "agent health changed");
                }
                record.is_healthy = healthy;
                record.last_seen = Utc::now();
            }
        }
        self.registry.persist().await;
    }
}
