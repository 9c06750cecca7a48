//! gRPC load generator.
//!
//! Calls the standard grpc.health.v1 service through a pool of long-lived
//! channels dialed eagerly at start; a dial failure aborts the start and
//! drops any channels already opened. Workers borrow a channel by
//! `worker_id % pool_size`. Every call carries the configured metadata
//! and a 10 s deadline; the terminal status code lands in a histogram
//! keyed by its symbol.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Code, Request, Status};
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use tracing::{debug, info, warn};

use synthload_core::config::{GrpcConfig, GrpcMethodKind};
use synthload_core::error::{LoadError, LoadResult};
use synthload_core::metrics;
use synthload_core::pacer::{Pacer, PacerConfig, Token};
use synthload_core::stats::RateStats;

use crate::{worker_count, STOP_GRACE};

const DIAL_TIMEOUT: Duration = Duration::from_secs(30);
const CALL_DEADLINE: Duration = Duration::from_secs(10);

/// Messages consumed from a Watch stream in server-stream mode.
const SERVER_STREAM_MESSAGES: usize = 3;

/// Sequential Check calls emulating a client stream.
const CLIENT_STREAM_CALLS: usize = 3;

pub struct GrpcGenerator {
    config: GrpcConfig,
    stats: Arc<RateStats>,
    cancel: Option<CancellationToken>,
    tracker: TaskTracker,
}

impl GrpcGenerator {
    #[must_use]
    pub fn new(config: GrpcConfig) -> Self {
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

    /// Channels dialed at start for the configured rate.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        (self.config.rps / 200).clamp(5, 20) as usize
    }

    /// Dials the channel pool and starts the pacer, rate sampler and
    /// workers. A dial failure is returned as `StartFailed` after the
    /// channels opened so far are dropped. A second start while running
    /// is a no-op.
    pub async fn start(&mut self, parent: &CancellationToken) -> LoadResult<()> {
        if self.cancel.is_some() {
            return Ok(());
        }

        let pool = Arc::new(self.dial_pool().await?);
        let metadata = build_metadata(&self.config.metadata);

        let cancel = parent.child_token();
        let rps = self.config.rps;

        info!(
            address = %self.config.address,
            rps,
            method = ?self.config.method,
            pool = pool.len(),
            "starting gRPC generator"
        );

        let pacer = Pacer::new(PacerConfig {
            target: rps,
            shape: self.config.pattern,
            queue_capacity: (rps * 4) as usize,
        });
        let queue = pacer.queue();
        let _pacer_task = pacer.spawn(cancel.clone());
        let _sampler_task = Arc::clone(&self.stats).spawn_rate_sampler(cancel.clone());

        self.tracker = TaskTracker::new();
        for worker_id in 0..worker_count(rps, 50) {
            let queue = queue.clone();
            let pool = Arc::clone(&pool);
            let metadata = metadata.clone();
            let service = self.config.service.clone();
            let method = self.config.method;
            let stats = Arc::clone(&self.stats);
            let token = cancel.clone();

            self.tracker.spawn(async move {
                let channel = pool[worker_id % pool.len()].clone();
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        received = queue.recv() => match received {
                            Ok(Token) => {
                                perform_call(&channel, &service, &metadata, method, &stats).await;
                            }
                            Err(_) => break,
                        },
                    }
                }
            });
        }
        self.tracker.close();

        self.cancel = Some(cancel);
        Ok(())
    }

    /// Stops the generator; the channel pool drops with the last worker.
    pub async fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };
        cancel.cancel();

        if tokio::time::timeout(STOP_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            warn!("gRPC workers did not drain in time; abandoning in-flight calls");
        }
        info!("gRPC generator stopped");
    }

    async fn dial_pool(&self) -> LoadResult<Vec<Channel>> {
        let scheme = if self.config.secure { "https" } else { "http" };
        let uri = format!("{scheme}://{}", self.config.address);

        let mut pool = Vec::with_capacity(self.pool_size());
        for _ in 0..self.pool_size() {
            let mut endpoint = Endpoint::from_shared(uri.clone())
                .map_err(|e| LoadError::start_failed("grpc", e.to_string()))?
                .connect_timeout(DIAL_TIMEOUT);
            if self.config.secure {
                endpoint = endpoint
                    .tls_config(ClientTlsConfig::new().with_native_roots())
                    .map_err(|e| LoadError::start_failed("grpc", e.to_string()))?;
            }

            match endpoint.connect().await {
                Ok(channel) => pool.push(channel),
                Err(err) => {
                    // Channels dialed so far close when `pool` drops here.
                    return Err(LoadError::start_failed("grpc", err.to_string()));
                }
            }
        }
        Ok(pool)
    }
}

fn build_metadata(entries: &HashMap<String, String>) -> MetadataMap {
    let mut metadata = MetadataMap::new();
    for (key, value) in entries {
        match (
            key.parse::<MetadataKey<tonic::metadata::Ascii>>(),
            value.parse::<MetadataValue<tonic::metadata::Ascii>>(),
        ) {
            (Ok(key), Ok(value)) => {
                metadata.insert(key, value);
            }
            _ => warn!(key, "skipping invalid gRPC metadata entry"),
        }
    }
    metadata
}

async fn perform_call(
    channel: &Channel,
    service: &str,
    metadata: &MetadataMap,
    method: GrpcMethodKind,
    stats: &RateStats,
) {
    let started = Instant::now();
    metrics::GRPC_REQUESTS.inc();

    let outcome = timeout(CALL_DEADLINE, issue(channel, service, metadata, method)).await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(Ok(())) => {
            stats.record_success_with_code(elapsed, code_symbol(Code::Ok));
            metrics::GRPC_STATUS_CODES
                .with_label_values(&[code_symbol(Code::Ok)])
                .inc();
        }
        Ok(Err(status)) => {
            debug!(code = ?status.code(), "gRPC call failed");
            stats.record_failure_with_code(elapsed, code_symbol(status.code()));
            metrics::GRPC_STATUS_CODES
                .with_label_values(&[code_symbol(status.code())])
                .inc();
        }
        Err(_) => {
            debug!("gRPC call exceeded its deadline");
            stats.record_failure_with_code(elapsed, code_symbol(Code::DeadlineExceeded));
            metrics::GRPC_STATUS_CODES
                .with_label_values(&[code_symbol(Code::DeadlineExceeded)])
                .inc();
        }
    }
}

async fn issue(
    channel: &Channel,
    service: &str,
    metadata: &MetadataMap,
    method: GrpcMethodKind,
) -> Result<(), Status> {
    let mut client = HealthClient::new(channel.clone());

    let make_request = || {
        let mut request = Request::new(HealthCheckRequest {
            service: service.to_string(),
        });
        *request.metadata_mut() = metadata.clone();
        request
    };

    match method {
        GrpcMethodKind::HealthCheck | GrpcMethodKind::Unary => {
            client.check(make_request()).await?;
        }
        GrpcMethodKind::ServerStream => {
            let mut stream = client.watch(make_request()).await?.into_inner();
            for _ in 0..SERVER_STREAM_MESSAGES {
                // A short or broken stream after a successful start is
                // still a completed call.
                match stream.message().await {
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => break,
                }
            }
        }
        GrpcMethodKind::ClientStream => {
            for _ in 0..CLIENT_STREAM_CALLS {
                client.check(make_request()).await?;
            }
        }
        GrpcMethodKind::BidiStream => {
            let mut stream = client.watch(make_request()).await?.into_inner();
            stream.message().await?;
        }
    }
    Ok(())
}

/// Histogram key for a status code: the enum symbol (`Ok`, `Unavailable`,
/// `DeadlineExceeded`, ...).
fn code_symbol(code: Code) -> &'static str {
    match code {
        Code::Ok => "Ok",
        Code::Cancelled => "Cancelled",
        Code::Unknown => "Unknown",
        Code::InvalidArgument => "InvalidArgument",
        Code::DeadlineExceeded => "DeadlineExceeded",
        Code::NotFound => "NotFound",
        Code::AlreadyExists => "AlreadyExists",
        Code::PermissionDenied => "PermissionDenied",
        Code::ResourceExhausted => "ResourceExhausted",
        Code::FailedPrecondition => "FailedPrecondition",
        Code::Aborted => "Aborted",
        Code::OutOfRange => "OutOfRange",
        Code::Unimplemented => "Unimplemented",
        Code::Internal => "Internal",
        Code::Unavailable => "Unavailable",
        Code::DataLoss => "DataLoss",
        Code::Unauthenticated => "Unauthenticated",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthload_core::config::RatePatternKind;

    #[test]
    fn pool_size_clamps_to_its_band() {
        let config = |rps| GrpcConfig {
            enabled: true,
            address: "127.0.0.1:50051".to_string(),
            rps,
            method: GrpcMethodKind::HealthCheck,
            pattern: RatePatternKind::Constant,
            secure: false,
            service: String::new(),
            metadata: HashMap::new(),
        };

        assert_eq!(GrpcGenerator::new(config(10)).pool_size(), 5);
        assert_eq!(GrpcGenerator::new(config(2_000)).pool_size(), 10);
        assert_eq!(GrpcGenerator::new(config(100_000)).pool_size(), 20);
    }

    #[test]
    fn invalid_metadata_entries_are_skipped() {
        let mut entries = HashMap::new();
        entries.insert("x-run-id".to_string(), "7".to_string());
        entries.insert("bad key!".to_string(), "value".to_string());

        let metadata = build_metadata(&entries);
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata.get("x-run-id").unwrap(), "7");
    }
}
