//! Client configuration.
//!
//! Loaded from TOML, then optionally overridden from the environment:
//!
//! ```toml
//! host = "broker.local"
//! port = 1883
//! topic_prefix = "sensors/"
//! discovery_enabled = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::topics::TopicScheme;

/// Environment variable overriding [`ClientConfig::host`].
pub const ENV_MQTT_HOST: &str = "SENSORLINK_MQTT_HOST";
/// Environment variable overriding [`ClientConfig::port`].
pub const ENV_MQTT_PORT: &str = "SENSORLINK_MQTT_PORT";
/// Environment variable overriding [`ClientConfig::client_id`].
pub const ENV_MQTT_CLIENT_ID: &str = "SENSORLINK_MQTT_CLIENT_ID";
/// Environment variable overriding [`ClientConfig::topic_prefix`].
pub const ENV_TOPIC_PREFIX: &str = "SENSORLINK_TOPIC_PREFIX";
/// Environment variable overriding [`ClientConfig::discovery_enabled`].
pub const ENV_DISCOVERY: &str = "SENSORLINK_DISCOVERY";

/// Sensor client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// MQTT broker host
    #[serde(default = "default_host")]
    pub host: String,

    /// MQTT broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u64,

    /// Client ID (auto-generated if not provided)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Username for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Prefix of every sensor topic
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Subscribe to every sensor's metadata on connect
    #[serde(default)]
    pub discovery_enabled: bool,

    /// Capacity of the sensor event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Capacity of the transport's outgoing request queue
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,

    /// Delay before polling the broker again after a connection error
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    60
}

fn default_topic_prefix() -> String {
    "sensors/".to_string()
}

fn default_event_capacity() -> usize {
    1024
}

fn default_request_capacity() -> usize {
    64
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            keep_alive: default_keep_alive(),
            client_id: None,
            username: None,
            password: None,
            topic_prefix: default_topic_prefix(),
            discovery_enabled: false,
            event_capacity: default_event_capacity(),
            request_capacity: default_request_capacity(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given broker.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    pub fn with_discovery(mut self, enabled: bool) -> Self {
        self.discovery_enabled = enabled;
        self
    }

    pub fn with_keep_alive(mut self, secs: u64) -> Self {
        self.keep_alive = secs;
        self
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> ClientResult<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| ClientError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> ClientResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ClientResult<()> {
        if let Some(host) = lookup(ENV_MQTT_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(ENV_MQTT_PORT) {
            self.port = port.parse().map_err(|_| {
                ClientError::Configuration(format!("{ENV_MQTT_PORT} is not a valid port: {port}"))
            })?;
        }
        if let Some(id) = lookup(ENV_MQTT_CLIENT_ID) {
            self.client_id = Some(id);
        }
        if let Some(prefix) = lookup(ENV_TOPIC_PREFIX) {
            self.topic_prefix = prefix;
        }
        if let Some(flag) = lookup(ENV_DISCOVERY) {
            self.discovery_enabled = parse_flag(&flag).ok_or_else(|| {
                ClientError::Configuration(format!("{ENV_DISCOVERY} is not a boolean: {flag}"))
            })?;
        }
        self.validate()
    }

    /// Check values the transport cannot work with.
    pub fn validate(&self) -> ClientResult<()> {
        if self.host.is_empty() {
            return Err(ClientError::Configuration("host must not be empty".into()));
        }
        if self.keep_alive == 0 {
            return Err(ClientError::Configuration(
                "keep_alive must be at least 1 second".into(),
            ));
        }
        if self.event_capacity == 0 || self.request_capacity == 0 {
            return Err(ClientError::Configuration(
                "channel capacities must be non-zero".into(),
            ));
        }
        if self.topic_prefix.contains(|c: char| c == '#' || c == '+') {
            return Err(ClientError::Configuration(format!(
                "topic_prefix must not contain wildcards: {}",
                self.topic_prefix
            )));
        }
        Ok(())
    }

    pub fn topics(&self) -> TopicScheme {
        TopicScheme::new(&self.topic_prefix)
    }

    pub fn keep_alive_duration(&self) -> Duration {
        Duration::from_secs(self.keep_alive)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Broker address as `host:port`.
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
