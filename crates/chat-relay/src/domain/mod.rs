//! Domain layer for chat-relay.
//!
//! Pure types with no dependencies on I/O, networking, or async runtimes.

pub mod config;
pub mod connection;

pub use config::{InvalidConfig, RelayConfig};
pub use connection::{CloseReason, ConnectionState};
