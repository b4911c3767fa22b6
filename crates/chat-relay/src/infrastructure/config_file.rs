//! TOML configuration file for the relay.
//!
//! The file is optional; every field falls back to the same default as
//! [`RelayConfig::default`], so a partial file (or none at all) is fine.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1"
//! port = 9000
//! channel_path = "/chat"
//! max_message_bytes = 65536
//!
//! [validation]
//! reject_unknown_fields = true
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! CLI flags are applied on top of the parsed file in `main.rs`.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use chat_core::{UnknownFields, ValidationPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{DEFAULT_CHANNEL_PATH, DEFAULT_MAX_MESSAGE_BYTES};
use crate::domain::{InvalidConfig, RelayConfig};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `server.bind` is not an IP address.
    #[error("invalid bind address {0:?}")]
    BindAddress(String),

    /// A value parsed but is not usable.
    #[error(transparent)]
    Invalid(#[from] InvalidConfig),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level layout of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub validation: ValidationSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Listener and transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// WebSocket path of the chat channel.
    #[serde(default = "default_channel_path")]
    pub channel_path: String,
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

/// Frame validation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationSection {
    /// Reject frames carrying keys outside the message schema.
    #[serde(default)]
    pub reject_unknown_fields: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_channel_path() -> String {
    DEFAULT_CHANNEL_PATH.to_string()
}
fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            channel_path: default_channel_path(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Conversion ────────────────────────────────────────────────────────────────

impl FileConfig {
    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or mistyped values.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialisation fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Turns the file schema into a validated [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BindAddress`] if `server.bind` is not an IP, or
    /// [`ConfigError::Invalid`] if a value breaks a [`RelayConfig`] invariant.
    pub fn into_relay_config(self) -> Result<RelayConfig, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind
            .parse()
            .map_err(|_| ConfigError::BindAddress(self.server.bind.clone()))?;

        let unknown_fields = if self.validation.reject_unknown_fields {
            UnknownFields::Reject
        } else {
            UnknownFields::Ignore
        };

        let config = RelayConfig {
            bind_addr: SocketAddr::new(ip, self.server.port),
            channel_path: self.server.channel_path,
            max_message_bytes: self.server.max_message_bytes,
            policy: ValidationPolicy { unknown_fields },
            log_level: self.logging.level,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Reads and parses the configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, or
/// [`ConfigError::Parse`] if its content is not valid.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    FileConfig::from_toml(&text)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
