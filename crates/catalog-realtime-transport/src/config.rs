//! Transport configuration types.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{TransportError, TransportResult};

/// STOMP protocol versions offered in the CONNECT frame.
pub const ACCEPT_VERSIONS: &str = "1.1,1.2";

/// Heart-beat settings advertised in the CONNECT frame, in milliseconds.
///
/// `0` disables the direction. The effective interval is negotiated with the
/// broker's CONNECTED answer, see [`HeartbeatConfig::negotiate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Smallest interval at which this client can send heart-beats.
    pub outgoing_ms: u64,
    /// Interval at which this client would like to receive heart-beats.
    pub incoming_ms: u64,
}

impl HeartbeatConfig {
    /// Heart-beats disabled in both directions.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            outgoing_ms: 0,
            incoming_ms: 0,
        }
    }

    /// Renders the `heart-beat` header value.
    pub fn header_value(&self) -> String {
        format!("{},{}", self.outgoing_ms, self.incoming_ms)
    }

    /// Computes the outgoing heart-beat interval from the broker's `heart-beat` header.
    ///
    /// Returns `None` when either side disabled client-to-server heart-beats
    /// or the header is missing or malformed.
    pub fn negotiate(&self, server_header: Option<&str>) -> Option<Duration> {
        let (_server_send, server_wants) = parse_heartbeat(server_header?)?;
        if self.outgoing_ms == 0 || server_wants == 0 {
            return None;
        }
        Some(Duration::from_millis(self.outgoing_ms.max(server_wants)))
    }

    /// Computes the interval at which the broker promised to send heart-beats.
    ///
    /// Returns `None` when either side disabled server-to-client heart-beats
    /// or the header is missing or malformed.
    pub fn negotiate_incoming(&self, server_header: Option<&str>) -> Option<Duration> {
        let (server_sends, _server_wants) = parse_heartbeat(server_header?)?;
        if self.incoming_ms == 0 || server_sends == 0 {
            return None;
        }
        Some(Duration::from_millis(self.incoming_ms.max(server_sends)))
    }
}

fn parse_heartbeat(value: &str) -> Option<(u64, u64)> {
    let (send, receive) = value.split_once(',')?;
    Some((send.trim().parse().ok()?, receive.trim().parse().ok()?))
}

/// Configuration for inbound size limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum inbound WebSocket text message size in bytes.
    /// `None` = unlimited
    pub max_frame_size: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: Some(1024 * 1024), // 1MB
        }
    }
}

impl LimitsConfig {
    /// Create a configuration with no limits.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            max_frame_size: None,
        }
    }
}

/// Configuration for a broker transport instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Broker endpoint, a `ws://` or `wss://` URL.
    pub endpoint: String,

    /// Maximum time for the WebSocket upgrade plus the STOMP CONNECT/CONNECTED exchange.
    pub connect_timeout: Duration,

    /// Virtual host sent in the `host` header. Defaults to the endpoint's host.
    pub host: Option<String>,

    /// Heart-beat settings.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Size limits for inbound frames.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Extra headers for the CONNECT frame (credentials, tokens).
    #[serde(default)]
    pub connect_headers: BTreeMap<String, String>,

    /// Capacity of the inbound event channel handed to the session.
    pub event_buffer: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8080/ws".to_string(),
            connect_timeout: Duration::from_secs(10),
            host: None,
            heartbeat: HeartbeatConfig::disabled(),
            limits: LimitsConfig::default(),
            connect_headers: BTreeMap::new(),
            event_buffer: 256,
        }
    }
}

impl TransportConfig {
    /// Create a configuration for the given endpoint with default settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the heart-beat settings.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Override the `host` header.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Add a header to the CONNECT frame.
    pub fn with_connect_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.connect_headers.insert(name.into(), value.into());
        self
    }

    /// Set inbound size limits.
    #[must_use]
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Parses and checks the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConfigurationError`] when the endpoint is not a
    /// `ws`/`wss` URL or the event buffer is empty.
    pub fn endpoint_url(&self) -> TransportResult<Url> {
        let url = Url::parse(&self.endpoint)?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(TransportError::ConfigurationError(format!(
                    "unsupported endpoint scheme '{other}', expected ws or wss"
                )));
            }
        }
        if url.host_str().is_none() {
            return Err(TransportError::ConfigurationError(
                "endpoint URL has no host".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(TransportError::ConfigurationError(
                "event_buffer must be at least 1".to_string(),
            ));
        }
        Ok(url)
    }

    /// Value for the CONNECT `host` header.
    pub fn virtual_host(&self) -> TransportResult<String> {
        if let Some(host) = &self.host {
            return Ok(host.clone());
        }
        let url = self.endpoint_url()?;
        Ok(url.host_str().unwrap_or("localhost").to_string())
    }
}
