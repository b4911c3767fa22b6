//! The outbound half of a connection, as seen by the relay.
//!
//! # Testability
//!
//! The `FrameSink` trait lets unit tests substitute a recording or failing
//! sink (see [`crate::application::mock`]) for a real WebSocket writer.

use std::sync::Arc;

use thiserror::Error;

/// Why a frame could not be handed to a peer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The peer's writer has gone away (socket closed or closing).
    #[error("peer connection is closed")]
    Closed,

    /// Any other transport-level refusal.
    #[error("peer unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget delivery of one serialised frame to one peer.
///
/// Implementations must not block and must not wait for the peer to
/// acknowledge.  Each call fails independently of calls on other sinks.
pub trait FrameSink {
    /// Queues `frame` for the peer.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the peer can no longer accept frames.
    fn send_frame(&self, frame: Arc<str>) -> Result<(), SinkError>;
}
