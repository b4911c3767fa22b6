//! Infrastructure layer for chat-relay.
//!
//! # Responsibilities
//!
//! - Running the relay hub task that owns channel membership
//! - Binding the TCP listener and performing the WebSocket upgrade
//! - Spawning per-session reader/writer tasks
//! - Loading the optional TOML configuration file
//! - Handling the graceful shutdown signal
//!
//! # What does NOT belong here?
//!
//! - Validation and fan-out rules (application layer)
//! - CLI parsing (done in `main.rs`)

pub mod config_file;
pub mod relay_loop;
pub mod ws_server;

pub use config_file::{load_config, ConfigError, FileConfig};
pub use relay_loop::{RelayEvent, RelayHub, RelayStats};
pub use ws_server::{run_server, RelayServer};
