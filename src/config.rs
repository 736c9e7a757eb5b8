//! # Configuration Management
//!
//! Wire-protocol constants and the runtime configuration of the relay.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - `GAME_RELAY_*` environment overrides via `apply_env()`
//!
//! The protocol constants are fixed by the game clients and must not change:
//! an 8-byte little-endian header, packets capped at 1024 bytes, and the
//! `APLG` discovery datagram on UDP port 8888.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Size of the `type` + `totalSize` header in bytes
pub const HEADER_SIZE: usize = 8;

/// Largest `totalSize` a peer may declare, header included
pub const MAX_PACKET_SIZE: usize = 1024;

/// Size of the identity field at the start of move/attack/damage bodies
pub const IDENTITY_SIZE: usize = 4;

/// TCP port the game clients expect by default
pub const DEFAULT_GAME_PORT: u16 = 8080;

/// UDP port the discovery announcement is broadcast to
pub const DISCOVERY_PORT: u16 = 8888;

/// Magic tag opening every discovery announcement
pub const DISCOVERY_MAGIC: [u8; 4] = *b"APLG";

/// Fixed width of the server name field in the announcement
pub const SERVER_NAME_FIELD: usize = 32;

/// Total announcement size: magic(4) + port(2) + name(32)
pub const ANNOUNCEMENT_SIZE: usize = 4 + 2 + SERVER_NAME_FIELD;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| RelayError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| RelayError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| RelayError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by the environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `GAME_RELAY_*` environment variables.
    /// Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("GAME_RELAY_ADDRESS") {
            self.server.address = addr;
        }

        if let Some(val) = lookup("GAME_RELAY_OUTBOUND_QUEUE").and_then(|v| v.parse().ok()) {
            self.server.outbound_queue_capacity = val;
        }

        if let Some(val) = lookup("GAME_RELAY_DISCOVERY_ENABLED").and_then(|v| v.parse().ok()) {
            self.discovery.enabled = val;
        }

        if let Some(val) = lookup("GAME_RELAY_DISCOVERY_PORT").and_then(|v| v.parse().ok()) {
            self.discovery.port = val;
        }

        if let Some(name) = lookup("GAME_RELAY_SERVER_NAME") {
            self.discovery.server_name = name;
        }

        if let Some(level) = lookup("GAME_RELAY_LOG_LEVEL").and_then(|v| v.parse().ok()) {
            self.logging.log_level = level;
        }
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.discovery.validate());
        errors.extend(self.logging.validate());

        if self.discovery.enabled {
            if let Ok(addr) = self.server.address.parse::<SocketAddr>() {
                if addr.port() == 0 {
                    errors.push(
                        "Discovery cannot advertise an OS-assigned port (server port is 0)"
                            .to_string(),
                    );
                }
            }
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RelayError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener and per-session settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8080")
    pub address: String,

    /// Packets buffered per session before further relays to it are dropped
    pub outbound_queue_capacity: usize,

    /// How long shutdown waits for aborted sessions to tear down
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{DEFAULT_GAME_PORT}"),
            outbound_queue_capacity: 64,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:8080')",
                self.address
            ));
        }

        if self.outbound_queue_capacity == 0 {
            errors.push("Outbound queue capacity must be greater than 0".to_string());
        } else if self.outbound_queue_capacity > 65_536 {
            errors.push(format!(
                "Outbound queue capacity too large: {} (max: 65536)",
                self.outbound_queue_capacity
            ));
        }

        if self.shutdown_timeout.as_millis() < 10 {
            errors.push("Shutdown timeout too short (minimum: 10ms)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }

    /// Port the listener is configured on, if the address parses
    pub fn port(&self) -> Option<u16> {
        self.address.parse::<SocketAddr>().ok().map(|a| a.port())
    }
}

/// LAN discovery announcer settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,

    /// Destination UDP port of the announcement
    pub port: u16,

    /// Delay between two announcement rounds
    #[serde(with = "duration_serde")]
    pub interval: Duration,

    /// Name shown to players browsing for servers
    pub server_name: String,

    /// Broadcast addresses the announcement is sent to. When empty, the
    /// directed broadcast address of every non-loopback IPv4 interface is
    /// used, falling back to `255.255.255.255`.
    pub broadcast_addresses: Vec<IpAddr>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: DISCOVERY_PORT,
            interval: Duration::from_secs(2),
            server_name: String::from("APL Game Server"),
            broadcast_addresses: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    /// Validate discovery configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.enabled {
            return errors;
        }

        if self.port == 0 {
            errors.push("Discovery port cannot be 0".to_string());
        }

        if self.interval.as_millis() < 100 {
            errors.push("Discovery interval too short (minimum: 100ms)".to_string());
        } else if self.interval.as_secs() > 3600 {
            errors.push("Discovery interval too long (maximum: 1 hour)".to_string());
        }

        if self.server_name.is_empty() {
            errors.push("Server name cannot be empty".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name attached to the startup log line
    pub app_name: String,

    /// Level used when `RUST_LOG` is not set
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("game-relay"),
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
