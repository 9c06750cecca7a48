//! WebSocket generator tests against a local echo server.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;

use synthload_core::config::{RatePatternKind, WebSocketConfig};
use synthload_generators::WebSocketGenerator;

async fn spawn_echo_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(message)) = source.next().await {
                    if message.is_text() || message.is_binary() {
                        if sink.send(message).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });
    addr
}

fn ws_config(addr: SocketAddr, cps: u64) -> WebSocketConfig {
    WebSocketConfig {
        enabled: true,
        url: format!("ws://{addr}/ws"),
        cps,
        pattern: RatePatternKind::Constant,
        message_interval: 1,
        message_size: 64,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn connections_open_exchange_messages_and_close_on_stop() {
    let addr = spawn_echo_server().await;
    let mut generator = WebSocketGenerator::new(ws_config(addr, 5));

    let cancel = CancellationToken::new();
    generator.start(&cancel);
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let stats = generator.stats();
    assert!(stats.total() > 0, "no connection attempts");
    assert_eq!(stats.failed(), 0);
    assert!(stats.active_connections() > 0, "no live connections");

    let snap = stats.snapshot();
    assert!(snap.messages_sent >= 1, "writer loop never fired");
    // Echo server reflects every sent frame.
    assert!(snap.messages_received <= snap.messages_sent);

    generator.stop().await;
    assert_eq!(stats.active_connections(), 0, "connections survived stop");

    // Idempotent stop.
    generator.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dial_errors_count_as_failed_connections() {
    // Nothing listens on this port.
    let config = WebSocketConfig {
        enabled: true,
        url: "ws://127.0.0.1:9/ws".to_string(),
        cps: 10,
        pattern: RatePatternKind::Constant,
        message_interval: 1,
        message_size: 16,
    };
    let mut generator = WebSocketGenerator::new(config);

    let cancel = CancellationToken::new();
    generator.start(&cancel);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    generator.stop().await;

    let snap = generator.stats().snapshot();
    assert!(snap.total > 0);
    assert_eq!(snap.failed, snap.total);
    assert_eq!(snap.active_connections, 0);
}
