use std::time::Duration;

/// Errors produced by the LLM gateway's HTTP boundary.
///
/// These never reach a connection handler directly — the gateway wrapper
/// converts them to fixed user-facing fallback strings and logs the kind.
#[derive(Clone, Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    /// True when the upstream service could not be reached at all, as
    /// opposed to answering with an error.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network_error",
            Self::Timeout(_) => "timeout",
            Self::Api { .. } => "api_error",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Errors produced by the translation gateway's external-process boundary.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("failed to launch {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("translation command timed out after {0:?}")]
    Timeout(Duration),
    #[error("translation command exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("translation command produced non-UTF-8 output")]
    InvalidOutput,
}

impl TranslateError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn_failed",
            Self::Timeout(_) => "timeout",
            Self::Failed { .. } => "command_failed",
            Self::InvalidOutput => "invalid_output",
        }
    }
}

/// Configuration loading failures. Fatal at process start, never later.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("API_KEY environment variable is required")]
    MissingApiKey,
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}
