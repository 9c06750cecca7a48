//! CPU load generator.
//!
//! Spawns one spin worker per `cores * load / 100` (minimum one), each
//! running a one-second duty cycle: busy-spin for the pattern's share of
//! the second, sleep the remainder. Workers are dedicated OS threads so
//! the spin never starves the async runtime.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use synthload_core::config::CpuConfig;
use synthload_core::metrics;
use synthload_core::patterns::CpuWave;
use synthload_core::stats::CpuStats;

const DUTY_CYCLE: Duration = Duration::from_secs(1);

pub struct CpuGenerator {
    config: CpuConfig,
    stats: Arc<CpuStats>,
    cancel: Option<CancellationToken>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl CpuGenerator {
    #[must_use]
    pub fn new(config: CpuConfig) -> Self {
        Self {
            config,
            stats: CpuStats::new(),
            cancel: None,
            workers: Vec::new(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> Arc<CpuStats> {
        Arc::clone(&self.stats)
    }

    /// Number of spin workers for the configured target.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        ((cores as f64 * self.config.load / 100.0).ceil() as usize).max(1)
    }

    /// Starts the spin workers. A second start while running is a no-op.
    pub fn start(&mut self, parent: &CancellationToken) {
        if self.cancel.is_some() {
            return;
        }
        let cancel = parent.child_token();

        let workers = self.worker_count();
        info!(
            load = self.config.load,
            pattern = ?self.config.pattern,
            workers,
            "starting CPU generator"
        );

        if self.config.load - self.config.drift < 0.0 {
            warn!(
                load = self.config.load,
                drift = self.config.drift,
                "pattern can drive load below zero; clamping to 0"
            );
        }

        for id in 0..workers {
            let config = self.config.clone();
            let stats = Arc::clone(&self.stats);
            let token = cancel.clone();
            self.workers.push(thread::spawn(move || {
                spin_worker(id, &config, &stats, &token);
            }));
        }

        self.cancel = Some(cancel);
    }

    /// Stops the workers and joins them. Each duty cycle observes the
    /// token at least once a second, so the join is short.
    pub async fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };
        cancel.cancel();

        let workers = std::mem::take(&mut self.workers);
        let _ = tokio::task::spawn_blocking(move || {
            for handle in workers {
                let _ = handle.join();
            }
        })
        .await;

        info!("CPU generator stopped");
    }
}

fn spin_worker(id: usize, config: &CpuConfig, stats: &CpuStats, cancel: &CancellationToken) {
    debug!(worker = id, "CPU worker started");

    let mut wave = CpuWave::new(config.pattern);
    let mut rng = SmallRng::from_entropy();
    let started = Instant::now();
    let mut scratch = id as u64 + 1;

    while !cancel.is_cancelled() {
        let load = wave.load_at(started.elapsed(), config.load, config.drift, &mut rng);

        stats.record_sample(load);
        metrics::CPU_CURRENT_LOAD.set(load);
        metrics::CPU_AVERAGE_LOAD.set(stats.snapshot().average_load);
        metrics::CPU_SAMPLES.inc();

        let busy = DUTY_CYCLE.mul_f64(load / 100.0);
        let cycle_start = Instant::now();
        while cycle_start.elapsed() < busy {
            for _ in 0..1_000 {
                scratch = scratch.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                std::hint::black_box((scratch as f64).sqrt());
            }
            if cancel.is_cancelled() {
                break;
            }
        }

        let rest = DUTY_CYCLE.saturating_sub(cycle_start.elapsed());
        if !rest.is_zero() {
            thread::sleep(rest);
        }
    }

    debug!(worker = id, "CPU worker stopped");
}
