//! HTTP load generator.
//!
//! A pacer feeds a bounded token queue; a fixed pool of workers drains
//! it, one request per token, through a shared connection-pooled client.
//! Status in [200, 400) after the body fully drained counts as success;
//! everything else, transport errors included, counts as failure and is
//! logged at debug only.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use synthload_core::config::HttpConfig;
use synthload_core::error::{LoadError, LoadResult};
use synthload_core::metrics;
use synthload_core::pacer::{Pacer, PacerConfig, Token};
use synthload_core::stats::RateStats;

use crate::{worker_count, STOP_GRACE};

const DEFAULT_USER_AGENT: &str = concat!("synthload/", env!("CARGO_PKG_VERSION"));

pub struct HttpGenerator {
    config: HttpConfig,
    stats: Arc<RateStats>,
    cancel: Option<CancellationToken>,
    tracker: TaskTracker,
}

impl HttpGenerator {
    #[must_use]
    pub fn new(config: HttpConfig) -> Self {
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

    /// Starts the pacer, rate sampler and worker pool. A second start
    /// while running is a no-op.
    pub fn start(&mut self, parent: &CancellationToken) -> LoadResult<()> {
        if self.cancel.is_some() {
            return Ok(());
        }

        let client = build_client(&self.config)?;
        let headers = build_headers(&self.config)?;
        let method: Method = self
            .config
            .method
            .as_str()
            .parse()
            .map_err(|_| LoadError::start_failed("http", "unsupported method"))?;

        let cancel = parent.child_token();
        let rps = self.config.rps;

        info!(
            url = %self.config.url,
            rps,
            pattern = ?self.config.pattern,
            "starting HTTP generator"
        );

        let pacer = Pacer::new(PacerConfig {
            target: rps,
            shape: self.config.pattern,
            queue_capacity: (rps * 2) as usize,
        });
        let queue = pacer.queue();
        let _pacer_task = pacer.spawn(cancel.clone());
        let _sampler_task = Arc::clone(&self.stats).spawn_rate_sampler(cancel.clone());

        self.tracker = TaskTracker::new();
        for _ in 0..worker_count(rps, 100) {
            let queue = queue.clone();
            let client = client.clone();
            let method = method.clone();
            let headers = headers.clone();
            let url = self.config.url.clone();
            let body = self.config.body.clone();
            let stats = Arc::clone(&self.stats);
            let token = cancel.clone();

            self.tracker.spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        received = queue.recv() => match received {
                            Ok(Token) => {
                                perform_request(&client, &method, &url, &headers, &body, &stats)
                                    .await;
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

    /// Stops the generator, waiting up to [`STOP_GRACE`] for in-flight
    /// requests before abandoning them.
    pub async fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };
        cancel.cancel();

        if tokio::time::timeout(STOP_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            warn!("HTTP workers did not drain in time; abandoning in-flight requests");
        }
        info!("HTTP generator stopped");
    }
}

fn build_client(config: &HttpConfig) -> LoadResult<Client> {
    let per_host = if config.rps > 1_000 { 50 } else { 10 };
    Client::builder()
        .timeout(config.timeout())
        .pool_max_idle_per_host(per_host)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| LoadError::start_failed("http", e.to_string()))
}

fn build_headers(config: &HttpConfig) -> LoadResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (key, value) in &config.headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| LoadError::start_failed("http", format!("invalid header name `{key}`")))?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            LoadError::start_failed("http", format!("invalid value for header `{key}`"))
        })?;
        headers.insert(name, value);
    }
    if !headers.contains_key(USER_AGENT) {
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    }
    Ok(headers)
}

async fn perform_request(
    client: &Client,
    method: &Method,
    url: &str,
    headers: &HeaderMap,
    body: &str,
    stats: &RateStats,
) {
    let started = Instant::now();

    let mut request = client.request(method.clone(), url).headers(headers.clone());
    if !body.is_empty() {
        request = request.body(body.to_string());
    }

    metrics::HTTP_REQUESTS.inc();

    match request.send().await {
        Ok(response) => {
            let status = response.status();
            // Elapsed time covers the drained body, not just the head.
            let body_ok = response.bytes().await.is_ok();
            let elapsed = started.elapsed();

            if body_ok && status.as_u16() >= 200 && status.as_u16() < 400 {
                stats.record_success_with_code(elapsed, status.as_str());
                metrics::HTTP_SUCCESS.inc();
            } else {
                debug!(%status, "request failed");
                stats.record_failure_with_code(elapsed, status.as_str());
                metrics::HTTP_FAILED.inc();
            }
        }
        Err(err) => {
            debug!(error = %err, "request failed");
            stats.record_failure(started.elapsed());
            metrics::HTTP_FAILED.inc();
        }
    }

    metrics::HTTP_CURRENT_RPS.set(stats.current_rate() as i64);
}
