//! Error types for truthgate core.

use std::io;

/// Error type for truthgate core operations.
#[derive(Debug, thiserror::Error)]
pub enum TruthGateError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// A TOML configuration file could not be parsed.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// A YAML document (CI workflow) could not be parsed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// A JSON document could not be parsed or rendered.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// A glob pattern was malformed.
    #[error("glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
    /// A subprocess exceeded its time budget and was killed.
    #[error("`{command}` timed out after {seconds}s")]
    Timeout {
        /// The command line that was killed.
        command: String,
        /// The budget that was exceeded, in seconds.
        seconds: u64,
    },
    /// The configuration is structurally valid but semantically wrong.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// A catch-all error with a message.
    #[error("{0}")]
    Other(String),
}

impl TruthGateError {
    /// Whether the error represents a subprocess timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Convenience result type for truthgate core.
pub type Result<T> = std::result::Result<T, TruthGateError>;
