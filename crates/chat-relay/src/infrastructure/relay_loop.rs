//! The relay task: one logical thread that owns channel membership.
//!
//! Every session task talks to the hub through a single bounded `mpsc`
//! queue of [`RelayEvent`]s.  The hub handles events strictly one at a time,
//! so admission, removal, and broadcast never interleave and the registry
//! needs no lock.
//!
//! ```text
//! session 1 ─┐
//! session 2 ─┼─ RelayEvent ─> [RelayHub] ─ Arc<str> ─> per-session outbound queues
//! session 3 ─┘                 registry
//!                              engine
//! ```
//!
//! Each session pushes its own frames in the order it reads them, and the
//! queue is FIFO, so frames from one connection are broadcast in arrival order.

use std::ops::ControlFlow;
use std::sync::Arc;

use chat_core::ConnectionId;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::application::{ConnectionRegistry, FrameOutcome, FrameSink, RelayEngine, SinkError};
use crate::domain::CloseReason;

/// Outbound queue of one WebSocket session.
///
/// Unbounded: the relay never waits on a slow peer.  Buffering for a stalled
/// peer is the transport's problem, not the relay's.
pub type OutboundTx = mpsc::UnboundedSender<Arc<str>>;

impl FrameSink for mpsc::UnboundedSender<Arc<str>> {
    fn send_frame(&self, frame: Arc<str>) -> Result<(), SinkError> {
        // The only failure is a dropped receiver: the session's writer ended.
        self.send(frame).map_err(|_| SinkError::Closed)
    }
}

/// Lifecycle and traffic events delivered to the hub.
#[derive(Debug)]
pub enum RelayEvent<S = OutboundTx> {
    /// A connection finished its upgrade and is now `OPEN`.
    Admitted { id: ConnectionId, sink: S },
    /// A text frame arrived on a connection.
    Frame { id: ConnectionId, text: String },
    /// A connection closed or failed.  May arrive for an id that was never
    /// admitted or was already removed.
    Closed { id: ConnectionId, reason: CloseReason },
    /// Process shutdown: remove everyone and stop.
    Shutdown,
}

/// Counters kept by the hub for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub admitted: u64,
    pub removed: u64,
    pub relayed: u64,
    pub rejected: u64,
    pub peer_send_failures: u64,
}

/// Owner of the registry and driver of the relay engine.
pub struct RelayHub<S = OutboundTx> {
    registry: ConnectionRegistry<S>,
    engine: RelayEngine,
    stats: RelayStats,
    member_count: watch::Sender<usize>,
}

impl<S: FrameSink> RelayHub<S> {
    /// Creates a hub with an empty channel.
    ///
    /// The returned receiver always holds the current member count.
    pub fn new(engine: RelayEngine) -> (Self, watch::Receiver<usize>) {
        let (member_count, rx) = watch::channel(0);
        let hub = Self {
            registry: ConnectionRegistry::new(),
            engine,
            stats: RelayStats::default(),
            member_count,
        };
        (hub, rx)
    }

    /// Applies one event.  Returns `Break` once the hub should stop.
    pub fn handle(&mut self, event: RelayEvent<S>) -> ControlFlow<()> {
        match event {
            RelayEvent::Admitted { id, sink } => {
                self.registry.admit(id, sink);
                self.stats.admitted += 1;
                self.publish_count();
                info!(connection = %id, members = self.registry.len(), "connection admitted");
            }

            RelayEvent::Frame { id, text } => {
                if !self.registry.contains(id) {
                    debug!(connection = %id, "frame from non-member ignored");
                    return ControlFlow::Continue(());
                }
                match self.engine.on_inbound_frame(&self.registry, id, &text) {
                    FrameOutcome::Relayed(report) => {
                        self.stats.relayed += 1;
                        self.stats.peer_send_failures += report.failed as u64;
                    }
                    FrameOutcome::Rejected(_) => self.stats.rejected += 1,
                }
            }

            RelayEvent::Closed { id, reason } => {
                if self.registry.remove(id) {
                    self.stats.removed += 1;
                    self.publish_count();
                    info!(
                        connection = %id,
                        members = self.registry.len(),
                        "connection removed: {reason}"
                    );
                } else {
                    debug!(connection = %id, "close for non-member ignored: {reason}");
                }
            }

            RelayEvent::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Processes events until `Shutdown` arrives or every sender is dropped,
    /// then removes all remaining members.
    pub async fn run(mut self, mut events: mpsc::Receiver<RelayEvent<S>>) -> RelayStats {
        while let Some(event) = events.recv().await {
            if self.handle(event).is_break() {
                break;
            }
        }
        self.shutdown();
        self.stats
    }

    /// Removes every member; dropping the sinks ends each session's writer.
    pub fn shutdown(&mut self) {
        let removed = self.registry.clear();
        self.stats.removed += removed as u64;
        self.publish_count();
        info!(
            removed,
            relayed = self.stats.relayed,
            rejected = self.stats.rejected,
            peer_send_failures = self.stats.peer_send_failures,
            "relay stopped"
        );
    }

    pub fn registry(&self) -> &ConnectionRegistry<S> {
        &self.registry
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    fn publish_count(&self) {
        self.member_count.send_replace(self.registry.len());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
