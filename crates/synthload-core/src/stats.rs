//! Per-generator statistics.
//!
//! Monotonic counters are plain atomics; compound state (response-time
//! aggregates, the status-code histogram) sits behind one read-write
//! lock. Readers take the read side and never hold it across I/O.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Sentinel initial minimum; the first real observation always wins.
/// Consumers must ignore the minimum while `total == 0`.
pub const MIN_SENTINEL: Duration = Duration::from_secs(3600);

/// How many CPU load samples the rolling history retains.
const CPU_HISTORY_LIMIT: usize = 1_000;

#[derive(Debug)]
struct ResponseTimes {
    total: Duration,
    min: Duration,
    max: Duration,
    status_codes: HashMap<String, u64>,
}

impl Default for ResponseTimes {
    fn default() -> Self {
        Self {
            total: Duration::ZERO,
            min: MIN_SENTINEL,
            max: Duration::ZERO,
            status_codes: HashMap::new(),
        }
    }
}

/// Counters for one rate-paced generator (HTTP, WebSocket or gRPC).
///
/// For WebSocket the "request" counters count connection attempts.
#[derive(Debug)]
pub struct RateStats {
    started_at: DateTime<Utc>,
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    active: AtomicI64,
    current_rate: AtomicU64,
    timings: RwLock<ResponseTimes>,
}

impl Default for RateStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            active: AtomicI64::new(0),
            current_rate: AtomicU64::new(0),
            timings: RwLock::new(ResponseTimes::default()),
        }
    }
}

impl RateStats {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records a completed unit of work.
    pub fn record_success(&self, elapsed: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.success.fetch_add(1, Ordering::Relaxed);

        let mut timings = self.timings.write();
        timings.total += elapsed;
        if elapsed < timings.min {
            timings.min = elapsed;
        }
        if elapsed > timings.max {
            timings.max = elapsed;
        }
    }

    /// Records a success and tallies `code` in the histogram.
    pub fn record_success_with_code(&self, elapsed: Duration, code: &str) {
        self.record_success(elapsed);
        *self.timings.write().status_codes.entry(code.to_string()).or_insert(0) += 1;
    }

    /// Records a failed unit of work. Failures feed the time sum (and
    /// thus the average) but not the min/max extremes.
    pub fn record_failure(&self, elapsed: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.timings.write().total += elapsed;
    }

    /// Records a failure and tallies `code` in the histogram.
    pub fn record_failure_with_code(&self, elapsed: Duration, code: &str) {
        self.record_failure(elapsed);
        *self.timings.write().status_codes.entry(code.to_string()).or_insert(0) += 1;
    }

    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_opened(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn success(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn active_connections(&self) -> i64 {
        self.active.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_rate(&self) -> u64 {
        self.current_rate.load(Ordering::Relaxed)
    }

    /// Success percentage in [0, 100]; 0 while nothing completed.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.success() as f64 / total as f64 * 100.0
    }

    /// Mean response time; zero while nothing completed.
    #[must_use]
    pub fn average_response_time(&self) -> Duration {
        let total = self.total();
        if total == 0 {
            return Duration::ZERO;
        }
        self.timings.read().total / total as u32
    }

    /// Consistent point-in-time view for serialization.
    #[must_use]
    pub fn snapshot(&self) -> RateStatsSnapshot {
        let total = self.total();
        let timings = self.timings.read();

        let min_response_time_ms = if total > 0 && timings.min < MIN_SENTINEL {
            Some(duration_ms(timings.min))
        } else {
            None
        };

        RateStatsSnapshot {
            total,
            success: self.success(),
            failed: self.failed(),
            current_rate: self.current_rate(),
            success_rate: self.success_rate(),
            active_connections: self.active_connections(),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            avg_response_time_ms: if total > 0 {
                duration_ms(timings.total / total as u32)
            } else {
                0.0
            },
            min_response_time_ms,
            max_response_time_ms: duration_ms(timings.max),
            status_codes: timings.status_codes.clone(),
            started_at: self.started_at,
        }
    }

    /// Refreshes `current_rate` once per second from the total counter
    /// until cancelled.
    pub fn spawn_rate_sampler(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let stats = self;
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            ticker.tick().await; // immediate first tick
            let mut previous = stats.total();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = stats.total();
                        stats.current_rate.store(now - previous, Ordering::Relaxed);
                        previous = now;
                    }
                }
            }
        })
    }
}

/// Serializable view of [`RateStats`].
#[derive(Debug, Clone, Serialize)]
pub struct RateStatsSnapshot {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub current_rate: u64,
    pub success_rate: f64,
    pub active_connections: i64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub avg_response_time_ms: f64,
    /// Absent until at least one observation landed.
    pub min_response_time_ms: Option<f64>,
    pub max_response_time_ms: f64,
    pub status_codes: HashMap<String, u64>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug)]
struct CpuInner {
    current: f64,
    average: f64,
    samples: u64,
    history: VecDeque<f64>,
    last_update: DateTime<Utc>,
}

/// Counters for the CPU generator: running average plus a bounded sample
/// history.
#[derive(Debug)]
pub struct CpuStats {
    started_at: DateTime<Utc>,
    inner: RwLock<CpuInner>,
}

impl Default for CpuStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            inner: RwLock::new(CpuInner {
                current: 0.0,
                average: 0.0,
                samples: 0,
                history: VecDeque::with_capacity(CPU_HISTORY_LIMIT),
                last_update: Utc::now(),
            }),
        }
    }
}

impl CpuStats {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_sample(&self, load: f64) {
        let mut inner = self.inner.write();
        inner.current = load;
        inner.samples += 1;
        inner.average =
            (inner.average * (inner.samples - 1) as f64 + load) / inner.samples as f64;
        inner.last_update = Utc::now();

        if inner.history.len() >= CPU_HISTORY_LIMIT {
            inner.history.pop_front();
        }
        inner.history.push_back(load);
    }

    #[must_use]
    pub fn current_load(&self) -> f64 {
        self.inner.read().current
    }

    #[must_use]
    pub fn snapshot(&self) -> CpuStatsSnapshot {
        let inner = self.inner.read();
        CpuStatsSnapshot {
            current_load: inner.current,
            average_load: inner.average,
            total_samples: inner.samples,
            last_update: inner.last_update,
            started_at: self.started_at,
        }
    }
}

/// Serializable view of [`CpuStats`].
#[derive(Debug, Clone, Serialize)]
pub struct CpuStatsSnapshot {
    pub current_load: f64,
    pub average_load: f64,
    pub total_samples: u64,
    pub last_update: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
}

/// Counters for the memory generator. All fields are atomics; the block
/// sequence itself lives behind the generator's own lock.
#[derive(Debug)]
pub struct MemoryStats {
    started_at: DateTime<Utc>,
    allocated_mb: AtomicU64,
    total_allocated: AtomicU64,
    total_released: AtomicU64,
    allocation_ops: AtomicU64,
}

impl Default for MemoryStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            allocated_mb: AtomicU64::new(0),
            total_allocated: AtomicU64::new(0),
            total_released: AtomicU64::new(0),
            allocation_ops: AtomicU64::new(0),
        }
    }
}

impl MemoryStats {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_allocation(&self, bytes: u64) {
        self.total_allocated.fetch_add(bytes, Ordering::Relaxed);
        self.allocation_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release(&self, bytes: u64) {
        self.total_released.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn set_allocated_mb(&self, mb: u64) {
        self.allocated_mb.store(mb, Ordering::Relaxed);
    }

    #[must_use]
    pub fn allocated_mb(&self) -> u64 {
        self.allocated_mb.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> MemoryStatsSnapshot {
        MemoryStatsSnapshot {
            allocated_mb: self.allocated_mb(),
            total_allocated_bytes: self.total_allocated.load(Ordering::Relaxed),
            total_released_bytes: self.total_released.load(Ordering::Relaxed),
            allocation_ops: self.allocation_ops.load(Ordering::Relaxed),
            started_at: self.started_at,
        }
    }
}

/// Serializable view of [`MemoryStats`].
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStatsSnapshot {
    pub allocated_mb: u64,
    pub total_allocated_bytes: u64,
    pub total_released_bytes: u64,
    pub allocation_ops: u64,
    pub started_at: DateTime<Utc>,
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000.0
}
