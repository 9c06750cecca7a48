//! Agent run lifecycle.
//!
//! At most one run is live per agent. `ActiveRun` owns the run-scoped
//! cancellation token and every generator started for it; dropping a run
//! without stopping it is prevented by the start/stop handlers always
//! going through [`AgentState`].

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use synthload_core::config::AgentConfig;
use synthload_generators::{
    CpuGenerator, FakeLogGenerator, GrpcGenerator, HttpGenerator, LogSink, MemoryGenerator,
    StdoutSink, WebSocketGenerator,
};

/// Shared state behind the agent's HTTP API.
pub struct AgentState {
    run: Mutex<Option<ActiveRun>>,
    started_at: Instant,
    log_sink: Arc<dyn LogSink>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::with_log_sink(Arc::new(StdoutSink))
    }
}

impl AgentState {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Overrides the fake-log destination; tests use a buffer sink.
    #[must_use]
    pub fn with_log_sink(log_sink: Arc<dyn LogSink>) -> Self {
        Self {
            run: Mutex::new(None),
            started_at: Instant::now(),
            log_sink,
        }
    }

    /// Seconds since the agent process came up.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub(crate) fn run_slot(&self) -> &Mutex<Option<ActiveRun>> {
        &self.run
    }

    pub(crate) fn log_sink(&self) -> Arc<dyn LogSink> {
        Arc::clone(&self.log_sink)
    }

    /// Stops and clears any live run. Used by the stop handler and by
    /// process shutdown.
    pub async fn stop_run(&self) {
        let run = self.run.lock().await.take();
        if let Some(run) = run {
            run.stop().await;
        }
    }
}

/// One live generator set plus its shared cancellation signal.
pub struct ActiveRun {
    cancel: CancellationToken,
    pub(crate) cpu: Option<CpuGenerator>,
    pub(crate) memory: Option<MemoryGenerator>,
    pub(crate) http: Option<HttpGenerator>,
    pub(crate) websocket: Option<WebSocketGenerator>,
    pub(crate) grpc: Option<GrpcGenerator>,
    fake_logs: Option<FakeLogGenerator>,
}

impl ActiveRun {
    /// Instantiates and starts every enabled axis. Per-axis start
    /// failures land in the returned warning list; the axes that did
    /// start keep running.
    pub async fn start(config: &AgentConfig, log_sink: Arc<dyn LogSink>) -> (Self, Vec<String>) {
        let cancel = CancellationToken::new();
        let mut warnings = Vec::new();

        let mut run = Self {
            cancel: cancel.clone(),
            cpu: None,
            memory: None,
            http: None,
            websocket: None,
            grpc: None,
            fake_logs: None,
        };

        if config.cpu.enabled {
            let mut generator = CpuGenerator::new(config.cpu.clone());
            generator.start(&cancel);
            run.cpu = Some(generator);
        }

        if config.memory.enabled {
            let mut generator = MemoryGenerator::new(config.memory.clone());
            generator.start(&cancel);
            run.memory = Some(generator);
        }

        if config.http.enabled {
            let mut generator = HttpGenerator::new(config.http.clone());
            match generator.start(&cancel) {
                Ok(()) => run.http = Some(generator),
                Err(err) => {
                    error!(error = %err, "HTTP generator failed to start");
                    warnings.push(format!("http: {err}"));
                }
            }
        }

        if config.websocket.enabled {
            let mut generator = WebSocketGenerator::new(config.websocket.clone());
            generator.start(&cancel);
            run.websocket = Some(generator);
        }

        if config.grpc.enabled {
            let mut generator = GrpcGenerator::new(config.grpc.clone());
            match generator.start(&cancel).await {
                Ok(()) => run.grpc = Some(generator),
                Err(err) => {
                    error!(error = %err, "gRPC generator failed to start");
                    warnings.push(format!("grpc: {err}"));
                }
            }
        }

        if config.fake_logs_enabled {
            let mut generator = FakeLogGenerator::new(config.fake_logs_type, log_sink);
            generator.start(&cancel);
            run.fake_logs = Some(generator);
        }

        (run, warnings)
    }

    /// How many axes actually came up.
    #[must_use]
    pub fn started_axes(&self) -> usize {
        [
            self.cpu.is_some(),
            self.memory.is_some(),
            self.http.is_some(),
            self.websocket.is_some(),
            self.grpc.is_some(),
            self.fake_logs.is_some(),
        ]
        .iter()
        .filter(|&&started| started)
        .count()
    }

    /// Fires the shared cancellation once, then drains every generator.
    pub async fn stop(mut self) {
        info!("stopping run");
        self.cancel.cancel();

        if let Some(mut generator) = self.cpu.take() {
            generator.stop().await;
        }
        if let Some(mut generator) = self.memory.take() {
            generator.stop().await;
        }
        if let Some(mut generator) = self.http.take() {
            generator.stop().await;
        }
        if let Some(mut generator) = self.websocket.take() {
            generator.stop().await;
        }
        if let Some(mut generator) = self.grpc.take() {
            generator.stop().await;
        }
        if let Some(mut generator) = self.fake_logs.take() {
            generator.stop().await;
        }
    }
}
