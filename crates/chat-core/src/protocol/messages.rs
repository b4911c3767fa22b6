//! The channel message: the unit of data relayed between chat participants.
//!
//! # Wire representation
//!
//! Every message travels as a single UTF-8 WebSocket text frame holding a JSON
//! object with exactly four string fields:
//!
//! ```json
//! {"id":"8f1c…","sent_at":"2024-05-01T12:00:00Z","text":"hi","chatter":"alice"}
//! ```
//!
//! The relay treats `id` and `sent_at` as opaque: it never checks `id` for
//! uniqueness and never compares `sent_at` against its own clock.
//!
//! # Immutability
//!
//! The fields are private.  Once a [`ChannelMessage`] has been validated it can
//! only be read, never changed, so what the relay forwards is exactly what it
//! accepted.

use serde::Serialize;

use crate::protocol::codec::FrameError;

/// Wire name of the client-generated message identifier.
pub const FIELD_ID: &str = "id";
/// Wire name of the client-supplied timestamp.
pub const FIELD_SENT_AT: &str = "sent_at";
/// Wire name of the message body.
pub const FIELD_TEXT: &str = "text";
/// Wire name of the sender's display label.
pub const FIELD_CHATTER: &str = "chatter";

/// All schema fields in wire order.
pub const FIELDS: [&str; 4] = [FIELD_ID, FIELD_SENT_AT, FIELD_TEXT, FIELD_CHATTER];

/// One chat message as accepted by the relay.
///
/// Field declaration order is the serialisation order.
///
/// # Examples
///
/// ```rust
/// use chat_core::ChannelMessage;
///
/// let msg = ChannelMessage::new("1", "t1", "hi", "alice").unwrap();
/// assert_eq!(msg.text(), "hi");
/// assert!(ChannelMessage::new("1", "t1", "", "alice").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelMessage {
    id: String,
    sent_at: String,
    text: String,
    chatter: String,
}

impl ChannelMessage {
    /// Builds a message, enforcing that `text` and `chatter` are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::EmptyField`] naming the first empty field.
    pub fn new(
        id: impl Into<String>,
        sent_at: impl Into<String>,
        text: impl Into<String>,
        chatter: impl Into<String>,
    ) -> Result<Self, FrameError> {
        let text = text.into();
        if text.is_empty() {
            return Err(FrameError::EmptyField(FIELD_TEXT));
        }
        let chatter = chatter.into();
        if chatter.is_empty() {
            return Err(FrameError::EmptyField(FIELD_CHATTER));
        }
        Ok(Self {
            id: id.into(),
            sent_at: sent_at.into(),
            text,
            chatter,
        })
    }

    /// Client-generated identifier (not checked for uniqueness).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Client-supplied timestamp, opaque to the relay.
    pub fn sent_at(&self) -> &str {
        &self.sent_at
    }

    /// Message body; never empty.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Sender's self-declared display label; never empty, never verified.
    pub fn chatter(&self) -> &str {
        &self.chatter
    }
}
