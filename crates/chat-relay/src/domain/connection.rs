//! Per-connection lifecycle.
//!
//! ```text
//! CONNECTING ──upgrade ok──> OPEN ──close / error / shutdown──> CLOSED
//!      │                                                          ▲
//!      └──────────────── upgrade failed ──────────────────────────┘
//! ```
//!
//! Only `Open` connections are registry members.  `Closed` is terminal.

use std::fmt;

/// Where one connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// TCP accepted, WebSocket upgrade not yet complete.
    Connecting,
    /// Upgraded and admitted to the registry.
    Open,
    /// Removed from the registry; no further frames are relayed.
    Closed,
}

/// Why a connection reached [`ConnectionState::Closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a Close frame or the stream ended.
    PeerClosed,
    /// The transport reported an error.
    TransportError(String),
    /// The relay is shutting down.
    Shutdown,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Open) | (Connecting, Closed) | (Open, Closed)
        )
    }

    /// Whether a connection in this state receives broadcasts.
    pub fn is_member(self) -> bool {
        self == ConnectionState::Open
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => f.write_str("closed by peer"),
            CloseReason::TransportError(e) => write!(f, "transport error: {e}"),
            CloseReason::Shutdown => f.write_str("relay shutdown"),
        }
    }
}
