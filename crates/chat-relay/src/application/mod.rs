//! Application layer for chat-relay.
//!
//! Knows *what* happens to a frame (validate, then fan out to everyone but the
//! sender) and *who* is in the channel, but not how bytes reach a socket.
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or spawning tasks (infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod mock;
pub mod registry;
pub mod relay;
pub mod sink;

pub use registry::ConnectionRegistry;
pub use relay::{BroadcastReport, FrameOutcome, RelayEngine};
pub use sink::{FrameSink, SinkError};
