//! End-to-end tests for the agent control API.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use synthload_agent::{build_router, AgentState};

/// Initialize tracing for tests (call once)
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("synthload_agent=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn app() -> axum::Router {
    build_router(AgentState::new())
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::String(
        String::from_utf8_lossy(&bytes).into_owned(),
    ));
    (status, value)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    init_tracing();
    let app = app();

    let (status, body) = get_json(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn wrong_method_yields_405() {
    init_tracing();
    let app = app();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/start")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn malformed_json_is_a_400() {
    init_tracing();
    let app = app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/start")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn out_of_range_cpu_load_is_a_400_with_reason() {
    init_tracing();
    let app = app();

    let (status, body) = post_json(
        &app,
        "/api/start",
        json!({"cpu": {"enabled": true, "load": 150.0, "pattern": "sine", "drift": 0.0}}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.as_str().unwrap().contains("between 0 and 100"));
}

#[tokio::test]
async fn unknown_pattern_is_a_400() {
    init_tracing();
    let app = app();

    let (status, _body) = post_json(
        &app,
        "/api/start",
        json!({"cpu": {"enabled": true, "load": 50.0, "pattern": "triangle", "drift": 0.0}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cpu_run_lifecycle_shows_up_in_stats() {
    init_tracing();
    let app = app();

    let (status, body) = post_json(
        &app,
        "/api/start",
        json!({"cpu": {"enabled": true, "load": 10.0, "pattern": "sine", "drift": 0.0}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "started");
    assert!(body.get("warnings").is_none());

    tokio::time::sleep(Duration::from_millis(300)).await;

    let (status, stats) = get_json(&app, "/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["agent_status"], "healthy");
    assert!(stats["system"]["cpu_cores"].as_u64().unwrap() >= 1);

    let cpu = &stats["cpu"];
    assert!(cpu.is_object(), "cpu stats missing: {stats}");
    // Drift is zero, so the wave sits exactly on the base load.
    assert_eq!(cpu["current_load"].as_f64().unwrap(), 10.0);
    assert!(cpu["total_samples"].as_u64().unwrap() >= 1);

    let (status, body) = post_json(&app, "/api/stop", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "stopped"}));

    let (_, stats) = get_json(&app, "/api/stats").await;
    assert!(stats.get("cpu").is_none(), "cpu survived stop: {stats}");

    // Stop stays idempotent.
    let (status, body) = post_json(&app, "/api/stop", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "stopped"}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_grpc_axis_becomes_a_warning_when_others_start() {
    init_tracing();
    let app = app();

    // Nothing listens on port 9; the gRPC dial fails while memory runs.
    let (status, body) = post_json(
        &app,
        "/api/start",
        json!({
            "memory": {"enabled": true, "target": 4, "pattern": "constant"},
            "grpc": {"enabled": true, "address": "127.0.0.1:9", "rps": 10,
                     "method": "health_check", "pattern": "constant"}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "started");
    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().starts_with("grpc:"));

    let (_, body) = post_json(&app, "/api/stop", json!({})).await;
    assert_eq!(body, json!({"status": "stopped"}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn start_fails_when_every_enabled_axis_fails() {
    init_tracing();
    let app = app();

    let (status, _body) = post_json(
        &app,
        "/api/start",
        json!({
            "grpc": {"enabled": true, "address": "127.0.0.1:9", "rps": 10,
                     "method": "health_check", "pattern": "constant"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn restart_replaces_the_previous_run() {
    init_tracing();
    let app = app();

    let (status, _) = post_json(
        &app,
        "/api/start",
        json!({"memory": {"enabled": true, "target": 2, "pattern": "constant"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Second start swaps the run for an http-only one.
    let (status, _) = post_json(
        &app,
        "/api/start",
        json!({"fakeLogsEnabled": false, "memory": {"enabled": false},
               "cpu": {"enabled": false}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, stats) = get_json(&app, "/api/stats").await;
    assert!(stats.get("memory").is_none());
}
