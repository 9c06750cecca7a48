//! Memory ballast generator.
//!
//! Holds a growable sequence of 1 MiB blocks behind a mutex. A timer
//! task runs one pattern step per tick (default every 2 s), allocating or
//! truncating from the tail. New blocks are filled with random bytes so
//! page deduplication and compression cannot shrink the footprint.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use synthload_core::config::{MemoryConfig, MemoryPatternKind};
use synthload_core::metrics;
use synthload_core::stats::MemoryStats;

/// Size of one ballast block.
pub const BLOCK_BYTES: usize = 1 << 20;

/// Default pause between pattern steps.
pub const STEP_INTERVAL: Duration = Duration::from_secs(2);

type Blocks = Vec<Box<[u8]>>;

pub struct MemoryGenerator {
    config: MemoryConfig,
    step_interval: Duration,
    stats: Arc<MemoryStats>,
    blocks: Arc<Mutex<Blocks>>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl MemoryGenerator {
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self::with_interval(config, STEP_INTERVAL)
    }

    #[must_use]
    pub fn with_interval(config: MemoryConfig, step_interval: Duration) -> Self {
        Self {
            config,
            step_interval,
            stats: MemoryStats::new(),
            blocks: Arc::new(Mutex::new(Vec::new())),
            cancel: None,
            task: None,
        }
    }

    #[must_use]
    pub fn stats(&self) -> Arc<MemoryStats> {
        Arc::clone(&self.stats)
    }

    /// Starts the pattern ticker. A second start while running is a no-op.
    pub fn start(&mut self, parent: &CancellationToken) {
        if self.cancel.is_some() {
            return;
        }
        let cancel = parent.child_token();

        info!(
            target_mb = self.config.target,
            pattern = ?self.config.pattern,
            "starting memory generator"
        );
        metrics::MEMORY_TARGET_MB.set(self.config.target as i64);

        let config = self.config.clone();
        let step_interval = self.step_interval;
        let stats = Arc::clone(&self.stats);
        let blocks = Arc::clone(&self.blocks);
        let token = cancel.clone();

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(step_interval);
            let mut rng = SmallRng::from_entropy();
            let started = Instant::now();

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let mut blocks = blocks.lock();
                        pattern_step(
                            &config,
                            started.elapsed(),
                            &mut blocks,
                            &stats,
                            &mut rng,
                        );
                    }
                }
            }
        }));
        self.cancel = Some(cancel);
    }

    /// Stops the ticker and releases every block.
    pub async fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };
        cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }

        let released = {
            let mut blocks = self.blocks.lock();
            let bytes = blocks.len() * BLOCK_BYTES;
            blocks.clear();
            blocks.shrink_to_fit();
            bytes
        };
        self.stats.record_release(released as u64);
        self.stats.set_allocated_mb(0);
        metrics::MEMORY_ALLOCATED_MB.set(0);

        info!(released_mb = released / BLOCK_BYTES, "memory generator stopped");
    }
}

/// One tick of the configured pattern, run under the block lock.
fn pattern_step(
    config: &MemoryConfig,
    elapsed: Duration,
    blocks: &mut Blocks,
    stats: &MemoryStats,
    rng: &mut SmallRng,
) {
    let target = config.target;
    match config.pattern {
        MemoryPatternKind::Constant => converge(blocks, stats, target, rng),
        MemoryPatternKind::Leak => {
            allocate(blocks, stats, rng.gen_range(1..=5), rng);
            // An imperfect leak: occasionally a quarter of the hoard gets
            // freed anyway.
            if rng.gen_bool(0.1) && blocks.len() > 10 {
                release(blocks, stats, blocks.len() / 4);
            }
        }
        MemoryPatternKind::Spike => {
            if rng.gen_bool(0.2) {
                let spike_target = target * rng.gen_range(2..=3);
                let current = blocks.len() as u64;
                if current < spike_target {
                    allocate(blocks, stats, spike_target - current, rng);
                }
            } else {
                converge(blocks, stats, target, rng);
            }
        }
        MemoryPatternKind::Cycle => {
            let phase = (elapsed.as_secs() / 30) % 4;
            let phase_target = match phase {
                0 => target / 4,
                1 => target,
                2 => target / 2,
                _ => target / 8,
            };
            converge(blocks, stats, phase_target, rng);
        }
        MemoryPatternKind::Random => match rng.gen_range(0..3) {
            0 => allocate(blocks, stats, rng.gen_range(1..=20), rng),
            1 => {
                if !blocks.is_empty() {
                    let upper = blocks.len() / 2 + 1;
                    release(blocks, stats, rng.gen_range(0..upper));
                }
            }
            _ => {}
        },
    }

    stats.set_allocated_mb(blocks.len() as u64);
    metrics::MEMORY_ALLOCATED_MB.set(blocks.len() as i64);
}

fn converge(blocks: &mut Blocks, stats: &MemoryStats, target: u64, rng: &mut SmallRng) {
    let current = blocks.len() as u64;
    if current < target {
        allocate(blocks, stats, target - current, rng);
    } else if current > target {
        release(blocks, stats, (current - target) as usize);
    }
}

fn allocate(blocks: &mut Blocks, stats: &MemoryStats, count: u64, rng: &mut SmallRng) {
    for _ in 0..count {
        let mut block = vec![0u8; BLOCK_BYTES].into_boxed_slice();
        rng.fill(&mut block[..]);
        blocks.push(block);
        stats.record_allocation(BLOCK_BYTES as u64);
        metrics::MEMORY_ALLOCATED_BYTES.inc_by(BLOCK_BYTES as u64);
    }
    debug!(count, total_mb = blocks.len(), "allocated ballast");
}

fn release(blocks: &mut Blocks, stats: &MemoryStats, count: usize) {
    let count = count.min(blocks.len());
    if count == 0 {
        return;
    }
    blocks.truncate(blocks.len() - count);
    stats.record_release((count * BLOCK_BYTES) as u64);
    metrics::MEMORY_RELEASED_BYTES.inc_by((count * BLOCK_BYTES) as u64);
    debug!(count, total_mb = blocks.len(), "released ballast");
}
