//! Transport error types.

use std::time::Duration;
use thiserror::Error;

use crate::config::LimitsConfig;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur during transport operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An established connection was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The broker answered the CONNECT frame with an ERROR frame.
    #[error("Handshake rejected by broker: {0}")]
    HandshakeRejected(String),

    /// Failed to send a frame.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The peer sent something the STOMP state machine did not expect.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// A frame could not be parsed.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Connection establishment timed out.
    #[error(
        "Connection timed out after {timeout:?} for operation: {operation}. \
         If this is expected, increase `connect_timeout_ms`"
    )]
    ConnectionTimeout {
        /// The operation that timed out
        operation: String,
        /// The timeout duration that was exceeded
        timeout: Duration,
    },

    /// Inbound frame size exceeds the configured maximum limit.
    #[error("Frame size ({size} bytes) exceeds maximum allowed ({max} bytes)")]
    FrameTooLarge {
        /// The actual size of the frame in bytes
        size: usize,
        /// The maximum allowed size in bytes
        max: usize,
    },

    /// The transport was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The operation needs an open connection but it was already closed.
    #[error("Connection already closed")]
    AlreadyClosed,

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),
}

impl TransportError {
    /// Returns `true` for failures that happened before the broker accepted the session.
    pub fn is_establishment_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::HandshakeRejected(_)
                | Self::ConnectionTimeout { .. }
                | Self::ConfigurationError(_)
        )
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigurationError(format!("invalid endpoint URL: {err}"))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::AlreadyClosed,
            WsError::Io(io) => Self::Io(io.to_string()),
            other => Self::ConnectionLost(other.to_string()),
        }
    }
}

/// Validates that an inbound frame does not exceed the configured limit.
///
/// `Ok(())` when the size is within limits or no limit is set, otherwise
/// `Err(TransportError::FrameTooLarge)`.
pub fn validate_frame_size(size: usize, limits: &LimitsConfig) -> TransportResult<()> {
    if let Some(max_size) = limits.max_frame_size
        && size > max_size
    {
        return Err(TransportError::FrameTooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}
