//! Central metric definitions for every generator.
//!
//! Gauges and counters are registered lazily on first access using
//! once_cell::Lazy. The exposition endpoint is owned by the embedding
//! process; generators only push values through these statics.

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_int_counter, register_int_counter_vec, register_int_gauge, Gauge,
    IntCounter, IntCounterVec, IntGauge,
};

// ===== CPU =====

/// Current CPU load percentage being generated
pub static CPU_CURRENT_LOAD: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "synthload_cpu_current_load",
        "Current CPU load percentage"
    )
    .expect("Failed to register CPU load gauge")
});

/// Running average CPU load percentage
pub static CPU_AVERAGE_LOAD: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "synthload_cpu_average_load",
        "Average CPU load percentage"
    )
    .expect("Failed to register CPU average gauge")
});

/// Total number of CPU load samples collected
pub static CPU_SAMPLES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "synthload_cpu_samples_total",
        "Total number of CPU load samples collected"
    )
    .expect("Failed to register CPU samples counter")
});

// ===== Memory =====

/// Currently allocated ballast in MiB
pub static MEMORY_ALLOCATED_MB: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "synthload_memory_allocated_mb",
        "Currently allocated memory in MB"
    )
    .expect("Failed to register memory allocated gauge")
});

/// Configured memory target in MiB
pub static MEMORY_TARGET_MB: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "synthload_memory_target_mb",
        "Target memory allocation in MB"
    )
    .expect("Failed to register memory target gauge")
});

/// Cumulative bytes allocated by the memory generator
pub static MEMORY_ALLOCATED_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "synthload_memory_total_allocated_bytes",
        "Total memory allocated during the run"
    )
    .expect("Failed to register memory allocated counter")
});

/// Cumulative bytes released by the memory generator
pub static MEMORY_RELEASED_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "synthload_memory_total_released_bytes",
        "Total memory released during the run"
    )
    .expect("Failed to register memory released counter")
});

// ===== HTTP =====

/// Total HTTP requests attempted
pub static HTTP_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "synthload_http_requests_total",
        "Total number of HTTP requests sent"
    )
    .expect("Failed to register HTTP requests counter")
});

/// HTTP requests that completed with a success status
pub static HTTP_SUCCESS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "synthload_http_requests_success_total",
        "Total number of successful HTTP requests"
    )
    .expect("Failed to register HTTP success counter")
});

/// HTTP requests that failed at transport or status level
pub static HTTP_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "synthload_http_requests_failed_total",
        "Total number of failed HTTP requests"
    )
    .expect("Failed to register HTTP failed counter")
});

/// Observed HTTP requests per second
pub static HTTP_CURRENT_RPS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "synthload_http_requests_per_second",
        "Current HTTP requests per second"
    )
    .expect("Failed to register HTTP rps gauge")
});

// ===== WebSocket =====

/// Total WebSocket connections attempted
pub static WS_CONNECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "synthload_websocket_connections_total",
        "Total number of WebSocket connections attempted"
    )
    .expect("Failed to register WS connections counter")
});

/// WebSocket connections currently open
pub static WS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "synthload_websocket_active_connections",
        "Current number of active WebSocket connections"
    )
    .expect("Failed to register WS active gauge")
});

/// Messages written across all WebSocket connections
pub static WS_MESSAGES_SENT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "synthload_websocket_messages_sent_total",
        "Total number of WebSocket messages sent"
    )
    .expect("Failed to register WS sent counter")
});

/// Messages read across all WebSocket connections
pub static WS_MESSAGES_RECEIVED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "synthload_websocket_messages_received_total",
        "Total number of WebSocket messages received"
    )
    .expect("Failed to register WS received counter")
});

// ===== gRPC =====

/// Total gRPC calls attempted
pub static GRPC_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "synthload_grpc_requests_total",
        "Total number of gRPC requests sent"
    )
    .expect("Failed to register gRPC requests counter")
});

/// gRPC calls by terminal status code symbol
pub static GRPC_STATUS_CODES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "synthload_grpc_status_codes_total",
        "Total number of gRPC requests by status code",
        &["code"]
    )
    .expect("Failed to register gRPC status counter")
});
