//! Relay engine: validate one inbound frame, then fan it out.
//!
//! ```text
//! raw text ─> length cap ─> decode_frame ─┬─ Ok(msg) ─> encode once ─> every member except source
//!                                         └─ Err(e)  ─> log, drop; source stays open
//! ```
//!
//! The engine keeps no state between frames.  Its output depends only on the
//! frame and on registry membership at the moment it is called.

use std::sync::Arc;

use chat_core::{decode_frame, encode_frame, ChannelMessage, ConnectionId, FrameError, ValidationPolicy};
use tracing::{debug, warn};

use super::registry::ConnectionRegistry;
use crate::domain::config::DEFAULT_MAX_MESSAGE_BYTES;
use super::sink::FrameSink;

/// Result of fanning one message out to the channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers the frame was handed to.
    pub delivered: usize,
    /// Peers whose sink refused the frame.
    pub failed: usize,
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was valid and was broadcast.
    Relayed(BroadcastReport),
    /// The frame was dropped; nobody received anything.
    Rejected(FrameError),
}

/// Validates inbound frames and broadcasts accepted messages.
#[derive(Debug, Clone, Copy)]
pub struct RelayEngine {
    policy: ValidationPolicy,
    max_message_bytes: usize,
}

impl RelayEngine {
    /// `max_message_bytes` caps the raw frame length; longer frames are
    /// rejected like any other invalid frame.
    pub fn new(policy: ValidationPolicy, max_message_bytes: usize) -> Self {
        Self {
            policy,
            max_message_bytes,
        }
    }

    fn check_length(&self, raw: &str) -> Result<(), FrameError> {
        if raw.len() > self.max_message_bytes {
            return Err(FrameError::TooLarge {
                len: raw.len(),
                max: self.max_message_bytes,
            });
        }
        Ok(())
    }

    /// Handles one frame received from `source`.
    ///
    /// Rejections are logged and reported in the outcome; they are never
    /// turned into an error that would close `source`.
    pub fn on_inbound_frame<S: FrameSink>(
        &self,
        registry: &ConnectionRegistry<S>,
        source: ConnectionId,
        raw: &str,
    ) -> FrameOutcome {
        let decoded = self
            .check_length(raw)
            .and_then(|()| decode_frame(raw, self.policy));
        let message = match decoded {
            Ok(m) => m,
            Err(e) => {
                warn!(
                    connection = %source,
                    malformed = e.is_malformed(),
                    len = raw.len(),
                    "dropping frame: {e}"
                );
                return FrameOutcome::Rejected(e);
            }
        };

        match self.broadcast(registry, &message, source) {
            Ok(report) => {
                debug!(
                    connection = %source,
                    id = message.id(),
                    delivered = report.delivered,
                    failed = report.failed,
                    "relayed message"
                );
                FrameOutcome::Relayed(report)
            }
            Err(e) => {
                warn!(connection = %source, "dropping frame: {e}");
                FrameOutcome::Rejected(e)
            }
        }
    }

    /// Sends `message` to every member except `source`.
    ///
    /// The message is serialised exactly once and every peer gets the same
    /// shared payload.  A failed send is counted and skipped; it neither stops
    /// the loop nor removes the failing peer (its own close event does that).
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Encode`] if the message cannot be serialised, in
    /// which case nothing is sent.
    pub fn broadcast<S: FrameSink>(
        &self,
        registry: &ConnectionRegistry<S>,
        message: &ChannelMessage,
        source: ConnectionId,
    ) -> Result<BroadcastReport, FrameError> {
        let frame: Arc<str> = Arc::from(encode_frame(message)?);
        let mut report = BroadcastReport::default();

        for (peer, sink) in registry.members() {
            if peer == source {
                continue;
            }
            match sink.send_frame(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    debug!(peer = %peer, "send failed: {e}");
                }
            }
        }

        Ok(report)
    }
}

impl Default for RelayEngine {
    fn default() -> Self {
        Self::new(ValidationPolicy::default(), DEFAULT_MAX_MESSAGE_BYTES)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::mock::RecordingSink;

    const HI: &str = r#"{"id":"1","sent_at":"t1","text":"hi","chatter":"alice"}"#;
    const YO: &str = r#"{"id":"2","sent_at":"t2","text":"yo","chatter":"alice"}"#;

    struct Channel {
        registry: ConnectionRegistry<RecordingSink>,
        a: (ConnectionId, RecordingSink),
        b: (ConnectionId, RecordingSink),
        c: (ConnectionId, RecordingSink),
    }

    /// Three peers A, B, C admitted in that order.
    fn channel_abc() -> Channel {
        let mut registry = ConnectionRegistry::new();
        let a = (ConnectionId::from_raw(1), RecordingSink::new());
        let b = (ConnectionId::from_raw(2), RecordingSink::new());
        let c = (ConnectionId::from_raw(3), RecordingSink::new());
        for (id, sink) in [&a, &b, &c] {
            registry.admit(*id, sink.clone());
        }
        Channel { registry, a, b, c }
    }

    #[test]
    fn test_valid_message_reaches_every_peer_but_sender() {
        // Arrange
        let ch = channel_abc();
        let engine = RelayEngine::default();

        // Act
        let outcome = engine.on_inbound_frame(&ch.registry, ch.a.0, HI);

        // Assert
        assert_eq!(
            outcome,
            FrameOutcome::Relayed(BroadcastReport {
                delivered: 2,
                failed: 0
            })
        );
        assert_eq!(ch.b.1.received(), vec![HI]);
        assert_eq!(ch.c.1.received(), vec![HI]);
        assert_eq!(ch.a.1.count(), 0, "sender must not receive an echo");
    }

    #[test]
    fn test_after_peer_leaves_only_remaining_peer_receives() {
        // Arrange
        let mut ch = channel_abc();
        let engine = RelayEngine::default();
        engine.on_inbound_frame(&ch.registry, ch.a.0, HI);

        // Act: B disconnects, then A sends again
        ch.registry.remove(ch.b.0);
        let outcome = engine.on_inbound_frame(&ch.registry, ch.a.0, YO);

        // Assert
        assert_eq!(
            outcome,
            FrameOutcome::Relayed(BroadcastReport {
                delivered: 1,
                failed: 0
            })
        );
        assert_eq!(ch.b.1.received(), vec![HI]);
        assert_eq!(ch.c.1.received(), vec![HI, YO]);
        assert_eq!(ch.a.1.count(), 0);
    }

    #[test]
    fn test_not_json_is_dropped_and_sender_stays_usable() {
        let ch = channel_abc();
        let engine = RelayEngine::default();

        let outcome = engine.on_inbound_frame(&ch.registry, ch.a.0, "not json");

        assert!(matches!(outcome, FrameOutcome::Rejected(ref e) if e.is_malformed()));
        for sink in [&ch.a.1, &ch.b.1, &ch.c.1] {
            assert_eq!(sink.count(), 0);
        }
        assert!(ch.registry.contains(ch.a.0));

        // The same sender can still relay a valid message afterwards.
        engine.on_inbound_frame(&ch.registry, ch.a.0, HI);
        assert_eq!(ch.b.1.received(), vec![HI]);
        assert_eq!(ch.c.1.received(), vec![HI]);
    }

    #[test]
    fn test_schema_violation_broadcasts_nothing() {
        let ch = channel_abc();
        let engine = RelayEngine::default();

        let outcome = engine.on_inbound_frame(
            &ch.registry,
            ch.a.0,
            r#"{"id":"1","sent_at":"t1","text":"","chatter":"alice"}"#,
        );

        assert_eq!(outcome, FrameOutcome::Rejected(FrameError::EmptyField("text")));
        assert_eq!(ch.b.1.count() + ch.c.1.count(), 0);
    }

    #[test]
    fn test_strict_engine_rejects_unknown_fields() {
        let ch = channel_abc();
        let engine = RelayEngine::new(ValidationPolicy::strict(), DEFAULT_MAX_MESSAGE_BYTES);

        let outcome = engine.on_inbound_frame(
            &ch.registry,
            ch.a.0,
            r#"{"id":"1","sent_at":"t1","text":"hi","chatter":"alice","x":1}"#,
        );

        assert_eq!(
            outcome,
            FrameOutcome::Rejected(FrameError::UnknownField("x".to_string()))
        );
        assert_eq!(ch.b.1.count(), 0);
    }

    #[test]
    fn test_oversized_frame_is_dropped_and_sender_stays_member() {
        // Arrange: a cap just below the size of HI
        let ch = channel_abc();
        let engine = RelayEngine::new(ValidationPolicy::default(), HI.len() - 1);

        // Act
        let outcome = engine.on_inbound_frame(&ch.registry, ch.a.0, HI);

        // Assert
        assert_eq!(
            outcome,
            FrameOutcome::Rejected(FrameError::TooLarge {
                len: HI.len(),
                max: HI.len() - 1
            })
        );
        assert_eq!(ch.b.1.count() + ch.c.1.count(), 0);
        assert!(ch.registry.contains(ch.a.0));
    }

    #[test]
    fn test_frame_at_exact_cap_is_relayed() {
        let ch = channel_abc();
        let engine = RelayEngine::new(ValidationPolicy::default(), HI.len());

        engine.on_inbound_frame(&ch.registry, ch.a.0, HI);

        assert_eq!(ch.b.1.received(), vec![HI]);
    }

    #[test]
    fn test_failing_peer_does_not_block_others() {
        // Arrange: B's socket is dead
        let ch = channel_abc();
        ch.b.1.set_failing(true);
        let engine = RelayEngine::default();

        // Act
        let outcome = engine.on_inbound_frame(&ch.registry, ch.a.0, HI);

        // Assert: C still got it, and B remains a member until its own close
        assert_eq!(
            outcome,
            FrameOutcome::Relayed(BroadcastReport {
                delivered: 1,
                failed: 1
            })
        );
        assert_eq!(ch.c.1.received(), vec![HI]);
        assert!(ch.registry.contains(ch.b.0));
    }

    #[test]
    fn test_failing_first_peer_does_not_block_later_peers() {
        let mut registry = ConnectionRegistry::new();
        let source = ConnectionId::from_raw(10);
        let dead = RecordingSink::failing();
        let alive = RecordingSink::new();
        registry.admit(ConnectionId::from_raw(1), dead);
        registry.admit(ConnectionId::from_raw(2), alive.clone());
        registry.admit(source, RecordingSink::new());

        RelayEngine::default().on_inbound_frame(&registry, source, HI);

        assert_eq!(alive.received(), vec![HI]);
    }

    #[test]
    fn test_per_source_order_is_preserved() {
        let ch = channel_abc();
        let engine = RelayEngine::default();

        let frames: Vec<String> = (0..20)
            .map(|n| format!(r#"{{"id":"{n}","sent_at":"t{n}","text":"m{n}","chatter":"alice"}}"#))
            .collect();
        for f in &frames {
            engine.on_inbound_frame(&ch.registry, ch.a.0, f);
        }

        assert_eq!(ch.b.1.received(), frames);
        assert_eq!(ch.c.1.received(), frames);
    }

    #[test]
    fn test_lone_sender_broadcast_is_empty() {
        let mut registry = ConnectionRegistry::new();
        let a = ConnectionId::from_raw(1);
        registry.admit(a, RecordingSink::new());

        let outcome = RelayEngine::default().on_inbound_frame(&registry, a, HI);

        assert_eq!(outcome, FrameOutcome::Relayed(BroadcastReport::default()));
    }

    #[test]
    fn test_forwarded_frame_is_canonical_serialisation() {
        // Extra whitespace and reordered keys are normalised before fan-out.
        let ch = channel_abc();
        let raw = r#"{ "chatter":"alice", "text":"hi", "sent_at":"t1", "id":"1" }"#;

        RelayEngine::default().on_inbound_frame(&ch.registry, ch.a.0, raw);

        assert_eq!(ch.b.1.received(), vec![HI]);
    }

    #[test]
    fn test_broadcast_shares_one_payload_across_peers() {
        // Arrange: capture the Arc handed to each peer
        struct PtrSink(std::sync::Mutex<Option<Arc<str>>>);
        impl FrameSink for PtrSink {
            fn send_frame(&self, frame: Arc<str>) -> Result<(), crate::application::SinkError> {
                *self.0.lock().unwrap() = Some(frame);
                Ok(())
            }
        }
        let mut registry = ConnectionRegistry::new();
        registry.admit(ConnectionId::from_raw(1), PtrSink(Default::default()));
        registry.admit(ConnectionId::from_raw(2), PtrSink(Default::default()));
        let msg = ChannelMessage::new("1", "t1", "hi", "alice").unwrap();

        // Act
        RelayEngine::default()
            .broadcast(&registry, &msg, ConnectionId::from_raw(99))
            .unwrap();

        // Assert: both peers hold the very same allocation
        let frames: Vec<Arc<str>> = registry
            .members()
            .map(|(_, s)| s.0.lock().unwrap().clone().unwrap())
            .collect();
        assert!(Arc::ptr_eq(&frames[0], &frames[1]));
    }
}
