//! Core building blocks for the SynthLoad load generator: configuration,
//! pattern evaluators, the pacing scheduler and the statistics aggregator.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pacer;
pub mod patterns;
pub mod runtime;
pub mod stats;

pub use config::{
    AgentConfig, CpuConfig, CpuPatternKind, FakeLogKind, GrpcConfig, GrpcMethodKind, HttpConfig,
    HttpMethod, MemoryConfig, MemoryPatternKind, RatePatternKind, WebSocketConfig,
};
pub use error::{LoadError, LoadResult};
pub use pacer::{tick_period, Pacer, PacerConfig, Token};
pub use patterns::{CpuWave, RateShape};
pub use stats::{
    CpuStats, CpuStatsSnapshot, MemoryStats, MemoryStatsSnapshot, RateStats, RateStatsSnapshot,
};
