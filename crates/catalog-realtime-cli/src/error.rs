//! Error types for CLI operations

use catalog_realtime::{ConfigError, RealtimeError};
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Session could not be started
    #[error("Session error: {0}")]
    Session(#[from] RealtimeError),

    /// JSON output error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// User-facing hints for resolving the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Config(ConfigError::FileNotFound(_)) => vec![
                "Check the path passed to --config",
                "Omit --config to use defaults and CATALOG_REALTIME_* variables",
            ],
            Self::Config(ConfigError::UnsupportedFormat) => {
                vec!["Use a .toml, .yaml, .yml or .json configuration file"]
            }
            Self::Config(_) | Self::Session(RealtimeError::Config(_)) => vec![
                "The endpoint must be a ws:// or wss:// URL",
                "reconnect.max_attempts and reconnect.base_delay_ms must be positive",
            ],
            _ => vec![],
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
