//! # Configuration Management
//!
//! Centralized configuration for the relay.
//!
//! This module provides structured configuration for the session, the UDP
//! transport, the payload encoder, the NEC signal timings and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Security Considerations
//! - The `plain` encoder sends commands unencrypted and is meant for development
//! - An empty shared secret is rejected when the `aes` encoder is selected

use crate::core::nec::NecTiming;
use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default UDP listen address
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:1234";

/// Largest datagram read from the socket
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Main relay configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RelayConfig {
    /// Session liveness and delivery settings
    #[serde(default)]
    pub session: SessionConfig,

    /// UDP transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Payload encoder settings
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// NEC reference durations
    #[serde(default)]
    pub signal: NecTiming,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    ///
    /// Recognised variables: `IR_LISTEN_IP` (alias `UDP_LISTEN_IP`),
    /// `IR_LISTEN_PORT` (alias `IR_LISTEN_UDP_PORT`), `IR_SHARED_SECRET`,
    /// `IR_ENCODER` (`aes` or `plain`) and `IR_HEARTBEAT_INTERVAL_MS`.
    /// The first name of each pair wins when both are set. Any value that
    /// does not parse is a `ConfigError`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some((name, ip)) = env_var(&["IR_LISTEN_IP", "UDP_LISTEN_IP"]) {
            let ip = ip
                .parse::<IpAddr>()
                .map_err(|e| ProtocolError::ConfigError(format!("Invalid {name}: {e}")))?;
            config.transport.bind_address = SocketAddr::new(ip, config.transport.port()?).to_string();
        }

        if let Some((name, port)) = env_var(&["IR_LISTEN_PORT", "IR_LISTEN_UDP_PORT"]) {
            let port = port
                .parse::<u16>()
                .map_err(|e| ProtocolError::ConfigError(format!("Invalid {name}: {e}")))?;
            let mut addr = config.transport.socket_addr()?;
            addr.set_port(port);
            config.transport.bind_address = addr.to_string();
        }

        if let Some((_, secret)) = env_var(&["IR_SHARED_SECRET"]) {
            config.encoder.shared_secret = secret;
        }

        if let Some((name, kind)) = env_var(&["IR_ENCODER"]) {
            config.encoder.kind = match kind.to_ascii_lowercase().as_str() {
                "aes" => EncoderKind::Aes,
                "plain" => EncoderKind::Plain,
                other => {
                    return Err(ProtocolError::ConfigError(format!(
                        "Invalid {name}: '{other}' (expected 'aes' or 'plain')"
                    )))
                }
            };
        }

        if let Some((name, heartbeat)) = env_var(&["IR_HEARTBEAT_INTERVAL_MS"]) {
            let millis = heartbeat
                .parse::<u64>()
                .map_err(|e| ProtocolError::ConfigError(format!("Invalid {name}: {e}")))?;
            config.session.heartbeat_interval = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.session.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.encoder.validate());
        errors.extend(self.signal.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// First of `names` that is set, with its value
fn env_var(names: &[&'static str]) -> Option<(&'static str, String)> {
    names
        .iter()
        .find_map(|&name| std::env::var(name).ok().map(|value| (name, value)))
}

/// Session liveness and delivery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Expected interval between heartbeats from the remote device
    #[serde(with = "duration_serde")]
    pub heartbeat_interval: Duration,

    /// Missed heartbeats tolerated before the remote is reported offline
    pub heartbeat_tolerance: u32,

    /// Wait for an acknowledgment after each transmission
    #[serde(with = "duration_serde")]
    pub ack_timeout: Duration,

    /// Maximum transmissions of a single command
    pub max_attempts: u32,

    /// Depth of each pending command's notification queue
    pub notify_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: timeout::HEARTBEAT_INTERVAL,
            heartbeat_tolerance: timeout::HEARTBEAT_TOLERANCE,
            ack_timeout: timeout::ACK_TIMEOUT,
            max_attempts: timeout::MAX_SEND_ATTEMPTS,
            notify_capacity: timeout::NOTIFY_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Window after which a silent remote is reported offline
    pub fn online_window(&self) -> Duration {
        timeout::online_window(self.heartbeat_interval, self.heartbeat_tolerance)
    }

    /// Validate session configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.heartbeat_interval.as_millis() < 100 {
            errors.push("Heartbeat interval too short (minimum: 100ms)".to_string());
        } else if self.heartbeat_interval.as_secs() > 3600 {
            errors.push("Heartbeat interval too long (maximum: 1 hour)".to_string());
        }

        if self.heartbeat_tolerance == 0 {
            errors.push("Heartbeat tolerance must be at least 1".to_string());
        }

        if self.ack_timeout.as_millis() < 10 {
            errors.push("Ack timeout too short (minimum: 10ms)".to_string());
        } else if self.ack_timeout.as_secs() > 60 {
            errors.push("Ack timeout too long (maximum: 60s)".to_string());
        }

        if self.max_attempts == 0 {
            errors.push("Max attempts must be greater than 0".to_string());
        } else if self.max_attempts > 1000 {
            errors.push(format!(
                "Max attempts too large: {} (maximum: 1000)",
                self.max_attempts
            ));
        }

        if self.notify_capacity == 0 {
            errors.push("Notify capacity must be greater than 0".to_string());
        }

        errors
    }
}

/// UDP transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Listen address (e.g., "0.0.0.0:1234")
    pub bind_address: String,

    /// Receive buffer size; longer datagrams are truncated by the OS
    pub max_datagram_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from(DEFAULT_BIND_ADDRESS),
            max_datagram_size: MAX_DATAGRAM_SIZE,
        }
    }
}

impl TransportConfig {
    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_address.parse::<SocketAddr>().map_err(|e| {
            ProtocolError::ConfigError(format!(
                "Invalid bind address '{}': {e}",
                self.bind_address
            ))
        })
    }

    fn port(&self) -> Result<u16> {
        Ok(self.socket_addr()?.port())
    }

    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.bind_address.is_empty() {
            errors.push("Bind address cannot be empty".to_string());
        } else if self.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid bind address format: '{}' (expected format: '0.0.0.0:1234')",
                self.bind_address
            ));
        }

        if self.max_datagram_size < 64 {
            errors.push("Max datagram size too small (minimum: 64 bytes)".to_string());
        } else if self.max_datagram_size > 65_507 {
            errors.push(format!(
                "Max datagram size too large: {} bytes (UDP maximum: 65507)",
                self.max_datagram_size
            ));
        }

        errors
    }
}

/// Which payload encoder the relay uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    /// AES-256 with a passphrase-derived key
    #[default]
    Aes,
    /// Bare JSON, no encryption
    Plain,
}

/// Encoder configuration
#[derive(Clone, Deserialize, Serialize, Default)]
pub struct EncoderConfig {
    /// Encoder selection
    #[serde(default)]
    pub kind: EncoderKind,

    /// Passphrase shared with the remote device
    #[serde(default)]
    pub shared_secret: String,
}

impl std::fmt::Debug for EncoderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderConfig")
            .field("kind", &self.kind)
            .field("shared_secret", &"<redacted>")
            .finish()
    }
}

impl EncoderConfig {
    /// Validate encoder configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.kind {
            EncoderKind::Aes if self.shared_secret.is_empty() => {
                errors.push("Shared secret cannot be empty with the aes encoder".to_string());
            }
            EncoderKind::Plain => {
                errors.push(
                    "WARNING: Encryption is disabled - not recommended for production".to_string(),
                );
            }
            EncoderKind::Aes => {}
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("ir-relay"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
