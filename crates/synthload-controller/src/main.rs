use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use synthload_controller::{
    build_router, AgentClient, AgentRegistry, ControllerState, HealthSupervisor,
};
use synthload_core::runtime::RuntimeConfig;

#[tokio::main]
async fn main() {
    let config = match RuntimeConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration error: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    let config_dir = config.controller.config_dir.clone();
    let registry = Arc::new(AgentRegistry::load(&config_dir).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "could not reload registry; starting empty");
        AgentRegistry::new(&config_dir)
    }));

    let client = match AgentClient::new(Duration::from_secs(config.controller.probe_timeout_secs)) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            tracing::error!(error = %err, "failed to build agent client");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let supervisor = HealthSupervisor::new(
        Arc::clone(&registry),
        Arc::clone(&client),
        Duration::from_secs(config.controller.health_interval_secs),
    );
    let supervisor_handle = supervisor.spawn(cancel.clone());

    let state = ControllerState { registry, client };
    let app = build_router(state);

    let addr = format!("{}:{}", config.controller.host, config.controller.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "failed to bind controller listener");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "controller listening");

    let shutdown = cancel.clone();
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });

    if let Err(err) = serve.await {
        tracing::error!(error = %err, "controller server error");
    }

    cancel.cancel();
    let _ = supervisor_handle.await;
    tracing::info!("controller stopped");
}

fn init_tracing(config: &RuntimeConfig) {
    let level = match config.logging.level.as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt().with_max_level(level);
    if config.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
