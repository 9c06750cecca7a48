//! Pacing scheduler for the rate-driven generators.
//!
//! The pacer translates a shape-driven instantaneous rate into discrete
//! work tokens on a bounded queue. The contract: over any wall-second
//! window at most `R_inst(t)` tokens are emitted, and the queue is lossy
//! when workers fall behind. A full queue drops new tokens instead of
//! blocking the scheduler.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::RatePatternKind;
use crate::patterns::RateShape;

/// One unit of authorized work: a single request or connection attempt.
#[derive(Debug, Clone, Copy)]
pub struct Token;

/// Pacer parameters for one generator.
#[derive(Debug, Clone)]
pub struct PacerConfig {
    /// Configured target rate in tokens per second.
    pub target: u64,
    /// Shape applied on top of the target.
    pub shape: RatePatternKind,
    /// Capacity of the token queue.
    pub queue_capacity: usize,
}

/// Scheduler tick period for a given target rate. High-rate generators
/// tick faster so per-tick batches stay small.
#[must_use]
pub fn tick_period(target: u64) -> Duration {
    if target > 10_000 {
        Duration::from_millis(20)
    } else if target > 5_000 {
        Duration::from_millis(50)
    } else {
        Duration::from_millis(100)
    }
}

/// Token source for one generator: owns the bounded queue and the
/// scheduling loop that fills it.
pub struct Pacer {
    config: PacerConfig,
    tx: async_channel::Sender<Token>,
    rx: async_channel::Receiver<Token>,
}

impl Pacer {
    #[must_use]
    pub fn new(config: PacerConfig) -> Self {
        let (tx, rx) = async_channel::bounded(config.queue_capacity.max(1));
        Self { config, tx, rx }
    }

    /// Queue handle for workers. Clones share the same queue; the channel
    /// closes when the pacer task ends, which unblocks every worker.
    #[must_use]
    pub fn queue(&self) -> async_channel::Receiver<Token> {
        self.rx.clone()
    }

    /// Runs the scheduling loop until the token is cancelled.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let Pacer { config, tx, rx: _ } = self;

            let tick = tick_period(config.target);
            let ticks_per_second = (Duration::from_secs(1).as_millis() / tick.as_millis()) as u64;
            let shape = RateShape::new(config.shape);
            let mut rng = SmallRng::from_entropy();

            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let start = Instant::now();
            let mut second_bucket = 0u64;
            let mut emitted_this_second = 0u64;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let elapsed = start.elapsed();

                        let second = elapsed.as_secs();
                        if second != second_bucket {
                            second_bucket = second;
                            emitted_this_second = 0;
                        }

                        let rate = shape.rate_at(elapsed, config.target, &mut rng);
                        let per_tick = rate.div_ceil(ticks_per_second.max(1));
                        let budget = per_tick.min(rate.saturating_sub(emitted_this_second));

                        for _ in 0..budget {
                            // Full queue means workers are saturated;
                            // the excess is dropped, not deferred.
                            if tx.try_send(Token).is_err() {
                                break;
                            }
                            emitted_this_second += 1;
                        }
                    }
                }
            }

            debug!(target = config.target, "pacer stopped");
        })
    }
}
