//! Client configuration.
//!
//! Values come from a TOML, YAML or JSON file layered with environment
//! variables, or from [`RealtimeConfig::builder`] for programmatic use.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use catalog_realtime_transport::{HeartbeatConfig, TransportConfig};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::reconnect::ReconnectPolicy;

/// Prefix of environment variables read on top of the configuration file.
pub const ENV_PREFIX: &str = "CATALOG_REALTIME";

/// Default broker endpoint.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080/ws";

/// Top-level configuration of a realtime session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Broker endpoint, `ws://` or `wss://`.
    pub endpoint: String,
    /// Bound on WebSocket upgrade plus STOMP handshake.
    pub connect_timeout_ms: u64,
    /// Heart-beat interval offered to the broker; `0` disables heart-beats.
    pub heartbeat_ms: u64,
    /// Override for the STOMP `host` header.
    pub host: Option<String>,
    /// Extra CONNECT headers, typically credentials.
    pub connect_headers: BTreeMap<String, String>,
    /// Capacity of every per-topic and global broadcast channel.
    pub channel_capacity: usize,
    /// Backoff settings.
    pub reconnect: ReconnectConfig,
    /// Connection notices.
    pub notices: NoticeConfig,
}

/// Backoff settings, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay unit; attempt `k` waits `k × base_delay_ms`.
    pub base_delay_ms: u64,
    /// Attempts per activation cycle.
    pub max_attempts: u32,
}

/// Connection notice settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeConfig {
    /// Show the "enabled" and "could not connect" notices.
    pub enabled: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout_ms: 10_000,
            heartbeat_ms: 0,
            host: None,
            connect_headers: BTreeMap::new(),
            channel_capacity: 64,
            reconnect: ReconnectConfig::default(),
            notices: NoticeConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 3000,
            max_attempts: 5,
        }
    }
}

impl Default for NoticeConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ReconnectConfig {
    /// The backoff policy described by these settings.
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.base_delay_ms),
            self.max_attempts,
        )
    }
}

impl RealtimeConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The file format is auto-detected from the file extension. Environment
    /// variables prefixed with `CATALOG_REALTIME_` override file settings, with
    /// `__` separating nested keys (`CATALOG_REALTIME_RECONNECT__MAX_ATTEMPTS`).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix.
    ///
    /// # Errors
    ///
    /// See [`RealtimeConfig::from_file`].
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(environment(env_prefix))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from defaults and environment variables only.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable cannot be parsed or the result fails
    /// validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(environment(ENV_PREFIX))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration builder
    pub fn builder() -> RealtimeConfigBuilder {
        RealtimeConfigBuilder::new()
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a non-WebSocket endpoint, a zero
    /// delay or attempt budget, or a zero channel capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::Invalid(format!("endpoint '{}': {e}", self.endpoint)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::Invalid(format!(
                "endpoint '{}' must use ws:// or wss://",
                self.endpoint
            )));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reconnect.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "reconnect.base_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Transport settings derived from this configuration.
    pub fn transport_config(&self) -> TransportConfig {
        let mut transport = TransportConfig::new(&self.endpoint)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_heartbeat(HeartbeatConfig {
                outgoing_ms: self.heartbeat_ms,
                incoming_ms: self.heartbeat_ms,
            });
        if let Some(host) = &self.host {
            transport = transport.with_host(host);
        }
        for (name, value) in &self.connect_headers {
            transport = transport.with_connect_header(name, value);
        }
        transport
    }

    /// Backoff policy.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.reconnect.policy()
    }
}

fn environment(prefix: &str) -> config::Environment {
    config::Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Configuration builder
#[derive(Debug, Default)]
pub struct RealtimeConfigBuilder {
    config: RealtimeConfig,
}

impl RealtimeConfigBuilder {
    /// Create a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the broker endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the heart-beat interval.
    #[must_use]
    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.config.heartbeat_ms = interval.as_millis() as u64;
        self
    }

    /// Override the STOMP `host` header.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    /// Add a CONNECT header.
    pub fn connect_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .connect_headers
            .insert(name.into(), value.into());
        self
    }

    /// Set the backoff policy.
    #[must_use]
    pub fn reconnect(mut self, base_delay: Duration, max_attempts: u32) -> Self {
        self.config.reconnect = ReconnectConfig {
            base_delay_ms: base_delay.as_millis() as u64,
            max_attempts,
        };
        self
    }

    /// Enable or disable connection notices.
    #[must_use]
    pub fn notices(mut self, enabled: bool) -> Self {
        self.config.notices.enabled = enabled;
        self
    }

    /// Set broadcast channel capacity.
    #[must_use]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> RealtimeConfig {
        self.config
    }
}
