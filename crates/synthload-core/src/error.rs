use thiserror::Error;

/// Canonical error type for lifecycle and control-plane operations.
///
/// Per-request failures inside a running generator never surface here;
/// they are counted into the generator's statistics and logged at debug.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A configuration field failed validation.
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Human-readable reason, suitable for an HTTP 400 body.
        message: String,
    },

    /// A generator could not initialize one load axis.
    #[error("{axis} generator failed to start: {message}")]
    StartFailed {
        /// Load axis name (e.g. `"grpc"`).
        axis: &'static str,
        /// Underlying failure description.
        message: String,
    },

    /// The registry has no agent under the given id.
    #[error("agent `{id}` not found")]
    AgentNotFound {
        /// Identifier the caller supplied.
        id: String,
    },

    /// A controller-to-agent RPC failed at the transport or status level.
    #[error("agent `{id}` unreachable: {message}")]
    AgentUnreachable {
        /// Registry id of the agent.
        id: String,
        /// Transport error or unexpected HTTP status.
        message: String,
    },

    /// The registry file could not be written. The in-memory mutation
    /// still stands; callers log this at warning and carry on.
    #[error("failed to persist registry: {message}")]
    Persist {
        /// Underlying I/O or serialization failure.
        message: String,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LoadError {
    /// Creates a `ConfigInvalid` variant.
    #[must_use]
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Creates a `StartFailed` variant.
    #[must_use]
    pub fn start_failed(axis: &'static str, message: impl Into<String>) -> Self {
        Self::StartFailed {
            axis,
            message: message.into(),
        }
    }

    /// Creates an `AgentNotFound` variant.
    #[must_use]
    pub fn agent_not_found(id: impl Into<String>) -> Self {
        Self::AgentNotFound { id: id.into() }
    }

    /// Creates an `AgentUnreachable` variant.
    #[must_use]
    pub fn agent_unreachable(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AgentUnreachable {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates a `Persist` variant.
    #[must_use]
    pub fn persist(message: impl Into<String>) -> Self {
        Self::Persist {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenient result alias for core operations.
pub type LoadResult<T> = Result<T, LoadError>;
