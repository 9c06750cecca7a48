//! WebSocket connection-churn generator.
//!
//! Tokens authorize connection attempts. Each successful handshake gets
//! its own connection task: a select loop that reads inbound frames,
//! writes a fixed payload on the configured interval, and ends when the
//! sampled connection lifetime (or the run) expires. Handshake outcome is
//! what feeds the success/failure counters; active connections are
//! tracked as a gauge.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::time::{interval, timeout, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use synthload_core::config::{RatePatternKind, WebSocketConfig};
use synthload_core::metrics;
use synthload_core::pacer::{Pacer, PacerConfig, Token};
use synthload_core::stats::RateStats;

use crate::{worker_count, STOP_GRACE};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct WebSocketGenerator {
    config: WebSocketConfig,
    stats: Arc<RateStats>,
    cancel: Option<CancellationToken>,
    tracker: TaskTracker,
}

impl WebSocketGenerator {
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self {
            config,
            stats: RateStats::new(),
            cancel: None,
            tracker: TaskTracker::new(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> Arc<RateStats> {
        Arc::clone(&self.stats)
    }

    /// Starts the pacer, rate sampler and dialer pool. A second start
    /// while running is a no-op.
    pub fn start(&mut self, parent: &CancellationToken) {
        if self.cancel.is_some() {
            return;
        }
        let cancel = parent.child_token();
        let cps = self.config.cps;

        info!(
            url = %self.config.url,
            cps,
            pattern = ?self.config.pattern,
            "starting WebSocket generator"
        );

        let pacer = Pacer::new(PacerConfig {
            target: cps,
            shape: self.config.pattern,
            queue_capacity: (cps * 2) as usize,
        });
        let queue = pacer.queue();
        let _pacer_task = pacer.spawn(cancel.clone());
        let _sampler_task = Arc::clone(&self.stats).spawn_rate_sampler(cancel.clone());

        self.tracker = TaskTracker::new();
        for _ in 0..worker_count(cps, 10) {
            let queue = queue.clone();
            let config = self.config.clone();
            let stats = Arc::clone(&self.stats);
            let token = cancel.clone();
            let tracker = self.tracker.clone();

            self.tracker.spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        received = queue.recv() => match received {
                            Ok(Token) => {
                                dial(&config, &stats, &token, &tracker).await;
                            }
                            Err(_) => break,
                        },
                    }
                }
            });
        }
        self.tracker.close();

        self.cancel = Some(cancel);
    }

    /// Stops the generator; open connections observe the cancellation and
    /// close within [`STOP_GRACE`].
    pub async fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };
        cancel.cancel();

        if tokio::time::timeout(STOP_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            warn!("WebSocket tasks did not drain in time; abandoning open connections");
        }
        info!("WebSocket generator stopped");
    }
}

async fn dial(
    config: &WebSocketConfig,
    stats: &Arc<RateStats>,
    cancel: &CancellationToken,
    tracker: &TaskTracker,
) {
    let started = Instant::now();
    metrics::WS_CONNECTIONS.inc();

    let connected = match timeout(HANDSHAKE_TIMEOUT, connect_async(config.url.as_str())).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(err)) => {
            debug!(error = %err, "WebSocket connection failed");
            stats.record_failure(started.elapsed());
            return;
        }
        Err(_) => {
            debug!("WebSocket handshake timed out");
            stats.record_failure(started.elapsed());
            return;
        }
    };

    stats.record_success(started.elapsed());
    stats.connection_opened();
    metrics::WS_ACTIVE.inc();

    let config = config.clone();
    let stats = Arc::clone(stats);
    let cancel = cancel.clone();
    tracker.spawn(async move {
        run_connection(connected, &config, &stats, &cancel).await;
        stats.connection_closed();
        metrics::WS_ACTIVE.dec();
    });
}

async fn run_connection(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    config: &WebSocketConfig,
    stats: &RateStats,
    cancel: &CancellationToken,
) {
    let (mut sink, mut source) = stream.split();

    let payload: String = (0..config.message_size)
        .map(|i| (b'A' + (i % 26) as u8) as char)
        .collect();

    let lifetime = connection_lifetime(config.pattern, &mut SmallRng::from_entropy());
    let expiry = tokio::time::sleep(lifetime);
    tokio::pin!(expiry);

    let mut write_ticker = interval(Duration::from_secs(config.message_interval));
    write_ticker.tick().await; // the first tick is immediate; skip it

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = &mut expiry => break,
            inbound = timeout(READ_IDLE_TIMEOUT, source.next()) => match inbound {
                Ok(Some(Ok(_frame))) => stats_received(stats),
                // Peer closed, protocol error or idle past the read
                // window all end the connection.
                _ => break,
            },
            _ = write_ticker.tick() => {
                match timeout(WRITE_TIMEOUT, sink.send(Message::Text(payload.clone()))).await {
                    Ok(Ok(())) => {
                        stats.message_sent();
                        metrics::WS_MESSAGES_SENT.inc();
                    }
                    Ok(Err(err)) => {
                        debug!(error = %err, "WebSocket write failed");
                        break;
                    }
                    Err(_) => {
                        debug!("WebSocket write timed out");
                        break;
                    }
                }
            }
        }
    }

    let _ = timeout(Duration::from_secs(1), sink.close()).await;
}

fn stats_received(stats: &RateStats) {
    stats.message_received();
    metrics::WS_MESSAGES_RECEIVED.inc();
}

/// How long a dialed connection lives, sampled from the shape kind.
fn connection_lifetime(pattern: RatePatternKind, rng: &mut SmallRng) -> Duration {
    let secs = match pattern {
        RatePatternKind::Constant => rng.gen_range(30..60),
        RatePatternKind::Spike => rng.gen_range(5..15),
        RatePatternKind::Cycle => rng.gen_range(20..60),
        RatePatternKind::Ramp => rng.gen_range(45..75),
        RatePatternKind::Random => rng.gen_range(10..70),
    };
    Duration::from_secs(secs)
}
