//! Error types for the notification client.

use std::path::PathBuf;

use catalog_realtime_transport::TransportError;
use thiserror::Error;

/// Result alias for session operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Errors surfaced by the session API.
///
/// Connection failures are not errors at this level: they drive the session
/// state machine and show up in its status instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RealtimeError {
    /// The session actor has shut down.
    #[error("Realtime session is closed")]
    SessionClosed,

    /// The transport could not be built from the configuration.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why an inbound MESSAGE body could not become a [`NotificationEvent`](crate::NotificationEvent).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The body is not a notification object.
    #[error("Invalid notification JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload does not have the shape its kind requires.
    #[error("Payload does not match {kind}: {source}")]
    PayloadShape {
        /// Wire name of the notification kind
        kind: &'static str,
        /// Underlying deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// The timestamp is not ISO-8601.
    #[error("Invalid timestamp: {0}")]
    Timestamp(String),
}

/// Configuration error types
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// A value is out of range or malformed
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
