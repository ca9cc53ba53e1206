//! Connection status and its read-only presentation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the realtime session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Not connected and not trying.
    #[default]
    Disconnected,
    /// A handshake is in flight.
    Connecting,
    /// Subscribed and receiving.
    Connected,
    /// The last attempt failed or the connection dropped.
    Error,
}

impl ConnectionStatus {
    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }

    /// How status indicators render this status.
    pub const fn presentation(self) -> StatusPresentation {
        StatusPresentation::for_status(self)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What session observers see: status plus reconnect progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionSnapshot {
    /// Current status.
    pub status: ConnectionStatus,
    /// Reconnects scheduled since the last successful connection.
    pub attempt_count: u32,
    /// `true` once the reconnect budget ran out in this activation cycle.
    pub exhausted: bool,
}

/// Indicator dot colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorColor {
    /// Connected.
    Green,
    /// Connecting.
    Yellow,
    /// Error.
    Red,
    /// Disconnected.
    Gray,
}

/// Label, colour and tooltip for a status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusPresentation {
    /// Short label next to the dot.
    pub label: &'static str,
    /// Dot colour.
    pub color: IndicatorColor,
    /// Whether the dot pulses.
    pub pulsing: bool,
    /// Tooltip text.
    pub title: &'static str,
}

impl StatusPresentation {
    /// Presentation for `status`.
    pub const fn for_status(status: ConnectionStatus) -> Self {
        match status {
            ConnectionStatus::Connected => Self {
                label: "Online",
                color: IndicatorColor::Green,
                pulsing: false,
                title: "Realtime notifications active",
            },
            ConnectionStatus::Connecting => Self {
                label: "Connecting...",
                color: IndicatorColor::Yellow,
                pulsing: true,
                title: "Connecting to the notification server...",
            },
            ConnectionStatus::Error => Self {
                label: "Offline",
                color: IndicatorColor::Red,
                pulsing: false,
                title: "Connection error. Trying to reconnect...",
            },
            ConnectionStatus::Disconnected => Self {
                label: "Disconnected",
                color: IndicatorColor::Gray,
                pulsing: false,
                title: "Realtime notifications disabled",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presentation() {
        let connected = ConnectionStatus::Connected.presentation();
        assert_eq!(connected.label, "Online");
        assert_eq!(connected.color, IndicatorColor::Green);

        let connecting = ConnectionStatus::Connecting.presentation();
        assert_eq!(connecting.label, "Connecting...");
        assert!(connecting.pulsing);

        assert_eq!(ConnectionStatus::Error.presentation().color, IndicatorColor::Red);
        assert_eq!(
            ConnectionStatus::Disconnected.presentation().label,
            "Disconnected"
        );
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::Connecting).unwrap(),
            "\"connecting\""
        );
        let snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
        assert_eq!(ConnectionStatus::Error.to_string(), "error");
    }
}
