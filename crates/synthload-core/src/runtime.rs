//! Process-level configuration for the agent and controller binaries.
//!
//! Sources, in precedence order:
//! 1. Environment variables with the `SYNTHLOAD` prefix
//!    (e.g. `SYNTHLOAD_AGENT__PORT=9101`)
//! 2. `./config/synthload.{toml,yaml,json}`
//! 3. Hardcoded defaults

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Root runtime configuration shared by both binaries.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub agent: AgentRuntimeConfig,

    #[serde(default)]
    pub controller: ControllerRuntimeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bind address of the agent control API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentRuntimeConfig {
    pub host: String,
    pub port: u16,
}

/// Controller bind address, registry location and health supervision
/// cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerRuntimeConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding `agents.json`; created if absent.
    pub config_dir: String,
    pub health_interval_secs: u64,
    pub probe_timeout_secs: u64,
}

/// Log level and output format.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `"plain"` or `"json"`.
    pub format: String,
}

impl Default for AgentRuntimeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9101,
        }
    }
}

impl Default for ControllerRuntimeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9100,
            config_dir: "config".to_string(),
            health_interval_secs: 30,
            probe_timeout_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            agent: AgentRuntimeConfig::default(),
            controller: ControllerRuntimeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from defaults, an optional config file and
    /// environment overrides, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("agent.host", "0.0.0.0")?
            .set_default("agent.port", 9101)?
            .set_default("controller.host", "0.0.0.0")?
            .set_default("controller.port", 9100)?
            .set_default("controller.config_dir", "config")?
            .set_default("controller.health_interval_secs", 30)?
            .set_default("controller.probe_timeout_secs", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "plain")?
            .add_source(File::with_name("./config/synthload").required(false))
            .add_source(
                Environment::with_prefix("SYNTHLOAD")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: RuntimeConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.port < 1024 {
            return Err(ConfigError::Message(
                "agent.port must be >= 1024".to_string(),
            ));
        }
        if self.controller.port < 1024 {
            return Err(ConfigError::Message(
                "controller.port must be >= 1024".to_string(),
            ));
        }
        if self.controller.health_interval_secs == 0 {
            return Err(ConfigError::Message(
                "controller.health_interval_secs must be > 0".to_string(),
            ));
        }
        if self.controller.probe_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "controller.probe_timeout_secs must be > 0".to_string(),
            ));
        }
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::Message(format!(
                    "logging.level `{other}` is not one of trace/debug/info/warn/error"
                )));
            }
        }
        if self.logging.format != "plain" && self.logging.format != "json" {
            return Err(ConfigError::Message(
                "logging.format must be `plain` or `json`".to_string(),
            ));
        }
        Ok(())
    }
}
