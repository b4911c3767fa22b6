//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.
//! It is assembled in `main.rs` from defaults, an optional TOML file, and CLI
//! flags; the domain never reads files or environment variables itself.

use std::net::SocketAddr;

use chat_core::ValidationPolicy;
use thiserror::Error;

/// Default WebSocket path of the single chat channel.
pub const DEFAULT_CHANNEL_PATH: &str = "/chat";

/// Default cap on one inbound WebSocket message (64 KiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// A configuration value that cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("channel path must start with '/', got {0:?}")]
    ChannelPath(String),

    #[error("max message size must be greater than zero")]
    ZeroMaxMessageBytes,
}

/// All runtime configuration for the relay.
///
/// # Example
///
/// ```rust
/// use chat_relay::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8080);
/// assert_eq!(cfg.channel_path, "/chat");
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address and port the WebSocket server binds to.
    pub bind_addr: SocketAddr,

    /// HTTP path that must be requested for the upgrade to be accepted.
    ///
    /// One path is one channel; any other path is answered with 404.
    pub channel_path: String,

    /// Largest inbound text frame relayed, in bytes.  Larger frames are
    /// dropped like any other invalid frame; the sender stays connected.
    pub max_message_bytes: usize,

    /// How strictly inbound frames are validated.
    pub policy: ValidationPolicy,

    /// Fallback `tracing` filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl RelayConfig {
    /// Checks invariants that the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`] describing the first offending field.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if !self.channel_path.starts_with('/') {
            return Err(InvalidConfig::ChannelPath(self.channel_path.clone()));
        }
        if self.max_message_bytes == 0 {
            return Err(InvalidConfig::ZeroMaxMessageBytes);
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    /// | Field             | Default          |
    /// |-------------------|------------------|
    /// | bind_addr         | `0.0.0.0:8080`   |
    /// | channel_path      | `/chat`          |
    /// | max_message_bytes | 64 KiB           |
    /// | policy            | ignore unknown fields |
    /// | log_level         | `info`           |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            channel_path: DEFAULT_CHANNEL_PATH.to_string(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            policy: ValidationPolicy::default(),
            log_level: "info".to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
