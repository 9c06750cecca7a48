//! The six load generators hosted by a SynthLoad agent.
//!
//! CPU, memory, HTTP, WebSocket and gRPC each drive one load axis; the
//! fake-log generator feeds log pipelines. Rate-paced generators share
//! the pacer/worker-pool skeleton from `synthload_core`; every generator
//! observes the run-scoped cancellation token and drains within
//! [`STOP_GRACE`] on stop.

use std::time::Duration;

pub mod cpu;
pub mod fake_logs;
pub mod grpc;
pub mod http;
pub mod memory;
pub mod websocket;

pub use cpu::CpuGenerator;
pub use fake_logs::{FakeLogGenerator, LogSink, StdoutSink};
pub use grpc::GrpcGenerator;
pub use http::HttpGenerator;
pub use memory::MemoryGenerator;
pub use websocket::WebSocketGenerator;

/// Upper bound on how long a generator's stop path waits for in-flight
/// work before abandoning it.
pub const STOP_GRACE: Duration = Duration::from_secs(10);

/// Worker-pool sizing shared by the rate-paced generators: one worker
/// per `scale` units of target rate, clamped to [10, 100].
#[must_use]
pub(crate) fn worker_count(target: u64, scale: u64) -> usize {
    (target / scale).clamp(10, 100) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_clamps_both_ends() {
        assert_eq!(worker_count(1, 100), 10);
        assert_eq!(worker_count(5_000, 100), 50);
        assert_eq!(worker_count(100_000, 100), 100);
        assert_eq!(worker_count(500, 50), 10);
        assert_eq!(worker_count(5_000, 50), 100);
    }
}
