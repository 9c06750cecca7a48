//! gRPC generator tests against an in-process health server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic_health::ServingStatus;

use synthload_core::config::{GrpcConfig, GrpcMethodKind, RatePatternKind};
use synthload_core::error::LoadError;
use synthload_generators::GrpcGenerator;

async fn spawn_health_server() -> SocketAddr {
    let (mut reporter, service) = tonic_health::server::health_reporter();
    reporter
        .set_service_status("", ServingStatus::Serving)
        .await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    addr
}

fn grpc_config(addr: SocketAddr, rps: u64, method: GrpcMethodKind) -> GrpcConfig {
    GrpcConfig {
        enabled: true,
        address: addr.to_string(),
        rps,
        method,
        pattern: RatePatternKind::Constant,
        secure: false,
        service: String::new(),
        metadata: HashMap::new(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn health_checks_succeed_with_only_ok_statuses() {
    let addr = spawn_health_server().await;
    let mut generator = GrpcGenerator::new(grpc_config(addr, 50, GrpcMethodKind::HealthCheck));

    let cancel = CancellationToken::new();
    generator.start(&cancel).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    generator.stop().await;

    let snap = generator.stats().snapshot();
    assert!(snap.total > 0);
    assert_eq!(snap.failed, 0);
    assert_eq!(snap.success_rate, 100.0);
    assert_eq!(snap.status_codes.len(), 1);
    assert_eq!(snap.status_codes.get("Ok"), Some(&snap.success));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn client_stream_mode_counts_one_unit_per_token() {
    let addr = spawn_health_server().await;
    let mut generator = GrpcGenerator::new(grpc_config(addr, 20, GrpcMethodKind::ClientStream));

    let cancel = CancellationToken::new();
    generator.start(&cancel).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    generator.stop().await;

    let snap = generator.stats().snapshot();
    assert!(snap.total > 0);
    assert_eq!(snap.failed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bidi_stream_mode_completes_against_watch() {
    let addr = spawn_health_server().await;
    let mut generator = GrpcGenerator::new(grpc_config(addr, 20, GrpcMethodKind::BidiStream));

    let cancel = CancellationToken::new();
    generator.start(&cancel).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    generator.stop().await;

    let snap = generator.stats().snapshot();
    assert!(snap.total > 0);
    assert_eq!(snap.status_codes.get("Ok"), Some(&snap.success));
}

#[tokio::test]
async fn dial_failure_fails_the_start() {
    // Nothing listens on this port.
    let mut generator = GrpcGenerator::new(grpc_config(
        "127.0.0.1:9".parse().unwrap(),
        50,
        GrpcMethodKind::HealthCheck,
    ));

    let cancel = CancellationToken::new();
    let err = generator.start(&cancel).await.unwrap_err();
    match err {
        LoadError::StartFailed { axis, .. } => assert_eq!(axis, "grpc"),
        other => panic!("unexpected error: {other}"),
    }

    // A failed start leaves the generator stoppable and restartable.
    generator.stop().await;
}
