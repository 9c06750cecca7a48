use std::sync::Arc;

use synthload_agent::{build_router, AgentState};
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

    let state = AgentState::new();
    let app = build_router(Arc::clone(&state));

    let addr = format!("{}:{}", config.agent.host, config.agent.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "failed to bind agent listener");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "agent listening");

    let shutdown_state = Arc::clone(&state);
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    });

    if let Err(err) = serve.await {
        tracing::error!(error = %err, "agent server error");
    }

    // Drain any live run before the process exits.
    shutdown_state.stop_run().await;
    tracing::info!("agent stopped");
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
