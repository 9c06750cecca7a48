//! Load-run configuration shared between the agent API and the generators.
//!
//! `AgentConfig` is the JSON body of `POST /api/start`; the same shape is
//! nested in the controller's `/api/agents/start` request. Validation
//! mirrors the agent API contract: any violated rule becomes a
//! [`LoadError::ConfigInvalid`] with a human-readable reason.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};

/// Full per-run configuration for one agent: one section per load axis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub cpu: CpuConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub websocket: WebSocketConfig,

    #[serde(default)]
    pub grpc: GrpcConfig,

    #[serde(default, rename = "fakeLogsEnabled")]
    pub fake_logs_enabled: bool,

    #[serde(default, rename = "fakeLogsType")]
    pub fake_logs_type: FakeLogKind,
}

impl AgentConfig {
    /// Validates every enabled section, returning the first violation.
    pub fn validate(&self) -> LoadResult<()> {
        if self.cpu.enabled {
            if !(0.0..=100.0).contains(&self.cpu.load) {
                return Err(LoadError::config_invalid(
                    "CPU load must be between 0 and 100",
                ));
            }
            if self.cpu.drift < 0.0 {
                return Err(LoadError::config_invalid(
                    "CPU drift amplitude must be non-negative",
                ));
            }
        }

        if self.memory.enabled && self.memory.target == 0 {
            return Err(LoadError::config_invalid("memory target must be positive"));
        }

        if self.http.enabled {
            if self.http.url.is_empty() {
                return Err(LoadError::config_invalid("HTTP URL cannot be empty"));
            }
            if self.http.rps == 0 {
                return Err(LoadError::config_invalid("HTTP RPS must be positive"));
            }
        }

        if self.websocket.enabled {
            if self.websocket.url.is_empty() {
                return Err(LoadError::config_invalid("WebSocket URL cannot be empty"));
            }
            if self.websocket.cps == 0 {
                return Err(LoadError::config_invalid("WebSocket CPS must be positive"));
            }
            if self.websocket.message_interval == 0 {
                return Err(LoadError::config_invalid(
                    "WebSocket message interval must be positive",
                ));
            }
            if self.websocket.message_size == 0 {
                return Err(LoadError::config_invalid(
                    "WebSocket message size must be positive",
                ));
            }
        }

        if self.grpc.enabled {
            if self.grpc.address.is_empty() {
                return Err(LoadError::config_invalid("gRPC address cannot be empty"));
            }
            if self.grpc.rps == 0 {
                return Err(LoadError::config_invalid("gRPC RPS must be positive"));
            }
        }

        Ok(())
    }

    /// Number of enabled load axes (fake logs included).
    #[must_use]
    pub fn enabled_axes(&self) -> usize {
        [
            self.cpu.enabled,
            self.memory.enabled,
            self.http.enabled,
            self.websocket.enabled,
            self.grpc.enabled,
            self.fake_logs_enabled,
        ]
        .iter()
        .filter(|&&e| e)
        .count()
    }
}

/// CPU axis: duty-cycle spin workers driven by a waveform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpuConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Target busy percentage in [0, 100].
    #[serde(default = "default_cpu_load")]
    pub load: f64,

    #[serde(default)]
    pub pattern: CpuPatternKind,

    /// Drift amplitude in percentage points around `load`.
    #[serde(default = "default_cpu_drift")]
    pub drift: f64,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            load: default_cpu_load(),
            pattern: CpuPatternKind::default(),
            drift: default_cpu_drift(),
        }
    }
}

/// Memory axis: resident-set ballast in 1 MiB blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Target footprint in MiB.
    #[serde(default = "default_memory_target")]
    pub target: u64,

    #[serde(default)]
    pub pattern: MemoryPatternKind,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target: default_memory_target(),
            pattern: MemoryPatternKind::default(),
        }
    }
}

/// HTTP axis: rate-paced requests against one URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub url: String,

    #[serde(default = "default_http_rps")]
    pub rps: u64,

    #[serde(default)]
    pub method: HttpMethod,

    #[serde(default)]
    pub pattern: RatePatternKind,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub body: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            rps: default_http_rps(),
            method: HttpMethod::default(),
            pattern: RatePatternKind::default(),
            headers: HashMap::new(),
            body: String::new(),
        }
    }
}

impl HttpConfig {
    /// Per-request timeout. Fixed by the agent contract, not configurable
    /// over the wire.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }
}

/// WebSocket axis: rate-paced connection churn with a message loop per
/// connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebSocketConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub url: String,

    /// New connections per second.
    #[serde(default = "default_ws_cps")]
    pub cps: u64,

    #[serde(default)]
    pub pattern: RatePatternKind,

    /// Seconds between outbound messages on each connection.
    #[serde(default = "default_ws_message_interval", rename = "messageInterval")]
    pub message_interval: u64,

    /// Outbound payload size in bytes.
    #[serde(default = "default_ws_message_size", rename = "messageSize")]
    pub message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            cps: default_ws_cps(),
            pattern: RatePatternKind::default(),
            message_interval: default_ws_message_interval(),
            message_size: default_ws_message_size(),
        }
    }
}

/// gRPC axis: rate-paced calls to the standard health-check service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GrpcConfig {
    #[serde(default)]
    pub enabled: bool,

    /// `host:port` of the target server.
    #[serde(default)]
    pub address: String,

    #[serde(default = "default_grpc_rps")]
    pub rps: u64,

    #[serde(default)]
    pub method: GrpcMethodKind,

    #[serde(default)]
    pub pattern: RatePatternKind,

    /// Dial with TLS when set.
    #[serde(default)]
    pub secure: bool,

    /// Service name passed in health-check requests. Empty checks overall
    /// server health.
    #[serde(default)]
    pub service: String,

    /// Metadata attached to every call.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: String::new(),
            rps: default_grpc_rps(),
            method: GrpcMethodKind::default(),
            pattern: RatePatternKind::default(),
            secure: false,
            service: String::new(),
            metadata: HashMap::new(),
        }
    }
}

/// Waveforms for the CPU axis.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CpuPatternKind {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Random,
}

/// Allocation behaviors for the memory axis.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPatternKind {
    #[default]
    Constant,
    Leak,
    Spike,
    Cycle,
    Random,
}

/// Rate shapes shared by the HTTP, WebSocket and gRPC axes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RatePatternKind {
    #[default]
    Constant,
    Spike,
    Cycle,
    Ramp,
    Random,
}

/// HTTP request methods accepted by the agent API.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    /// The method name on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

/// Call shapes over the gRPC health service.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GrpcMethodKind {
    #[default]
    HealthCheck,
    Unary,
    ServerStream,
    ClientStream,
    BidiStream,
}

/// Template families for the fake-log generator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FakeLogKind {
    #[default]
    Java,
    Web,
    Microservice,
    Database,
    Ecommerce,
    Generic,
}

fn default_cpu_load() -> f64 {
    50.0
}

fn default_cpu_drift() -> f64 {
    20.0
}

fn default_memory_target() -> u64 {
    100
}

fn default_http_rps() -> u64 {
    10
}

fn default_ws_cps() -> u64 {
    10
}

fn default_ws_message_interval() -> u64 {
    5
}

fn default_ws_message_size() -> usize {
    1024
}

fn default_grpc_rps() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_http(url: &str, rps: u64) -> AgentConfig {
        AgentConfig {
            http: HttpConfig {
                enabled: true,
                url: url.to_string(),
                rps,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn default_config_is_valid_and_idle() {
        let cfg = AgentConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.enabled_axes(), 0);
    }

    #[test]
    fn cpu_load_out_of_range_is_rejected() {
        let cfg = AgentConfig {
            cpu: CpuConfig {
                enabled: true,
                load: 150.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("between 0 and 100"));
    }

    #[test]
    fn http_requires_url_and_rate() {
        assert!(enabled_http("", 10).validate().is_err());
        assert!(enabled_http("http://127.0.0.1:1/ok", 0).validate().is_err());
        assert!(enabled_http("http://127.0.0.1:1/ok", 10).validate().is_ok());
    }

    #[test]
    fn websocket_message_parameters_are_checked() {
        let mut cfg = AgentConfig {
            websocket: WebSocketConfig {
                enabled: true,
                url: "ws://127.0.0.1:1/ws".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());

        cfg.websocket.message_interval = 0;
        assert!(cfg.validate().is_err());

        cfg.websocket.message_interval = 1;
        cfg.websocket.message_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn pattern_names_use_wire_spelling() {
        let json = serde_json::to_value(CpuPatternKind::Sawtooth).unwrap();
        assert_eq!(json, serde_json::json!("sawtooth"));

        let json = serde_json::to_value(GrpcMethodKind::ServerStream).unwrap();
        assert_eq!(json, serde_json::json!("server_stream"));

        let method: HttpMethod = serde_json::from_value(serde_json::json!("DELETE")).unwrap();
        assert_eq!(method, HttpMethod::Delete);
    }

    #[test]
    fn unknown_pattern_is_a_deserialize_error() {
        let body = serde_json::json!({
            "cpu": {"enabled": true, "load": 50.0, "pattern": "triangle", "drift": 5.0}
        });
        assert!(serde_json::from_value::<AgentConfig>(body).is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let body = serde_json::json!({
            "cpu": {"enabled": true, "load": 42.5, "pattern": "square", "drift": 10.0},
            "memory": {"enabled": true, "target": 256, "pattern": "leak"},
            "http": {
                "enabled": true,
                "url": "http://10.0.0.1:8080/ok",
                "rps": 500,
                "method": "POST",
                "pattern": "cycle",
                "headers": {"x-run": "7"},
                "body": "{\"k\":1}"
            },
            "websocket": {
                "enabled": true,
                "url": "ws://10.0.0.1:8081/ws",
                "cps": 20,
                "pattern": "ramp",
                "messageInterval": 2,
                "messageSize": 512
            },
            "grpc": {
                "enabled": true,
                "address": "10.0.0.1:9090",
                "rps": 50,
                "method": "bidi_stream",
                "pattern": "random",
                "secure": false,
                "service": "svc",
                "metadata": {}
            },
            "fakeLogsEnabled": true,
            "fakeLogsType": "microservice"
        });

        let cfg: AgentConfig = serde_json::from_value(body.clone()).unwrap();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.enabled_axes(), 6);

        let back = serde_json::to_value(&cfg).unwrap();
        assert_eq!(back, body);
    }
}
