//! chat-relay library crate.
//!
//! A real-time chat relay: browsers open a WebSocket on one fixed path, send
//! JSON chat messages, and the relay forwards every valid message to every
//! *other* connected browser.
//!
//! # Architecture
//!
//! ```text
//! Browser A ─┐                          ┌─> Browser B
//!            │  text frames             │
//! Browser B ─┼─> [chat-relay] ──────────┼─> Browser C
//!            │                          │
//! Browser C ─┘                          └─> Browser A
//!
//! [chat-relay]
//!   ├── domain/           RelayConfig, ConnectionState
//!   ├── application/      ConnectionRegistry, RelayEngine, FrameSink
//!   └── infrastructure/
//!         ├── relay_loop/ The single task that owns membership
//!         ├── ws_server/  WebSocket accept loop (tokio-tungstenite)
//!         └── config_file/ Optional TOML configuration
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `chat-core` only; it is fully
//!   synchronous, so registry and relay behaviour are tested without sockets.
//! - `infrastructure` adds `tokio`, `tungstenite`, and file I/O.

/// Domain layer: configuration and the per-connection state machine.
pub mod domain;

/// Application layer: membership and message fan-out.
pub mod application;

/// Infrastructure layer: relay task, WebSocket server, config file.
pub mod infrastructure;
