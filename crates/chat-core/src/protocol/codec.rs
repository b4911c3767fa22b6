//! JSON codec for chat frames.
//!
//! Inbound:  raw text frame → [`decode_frame`] → validated [`ChannelMessage`]
//! Outbound: [`ChannelMessage`] → [`encode_frame`] → text frame payload
//!
//! Decoding happens in two stages so the error tells the two failure classes
//! apart:
//!
//! 1. **Malformed frame**: the text is not JSON at all
//!    ([`FrameError::Malformed`]).
//! 2. **Schema violation**: the text is JSON but not a channel message: not an
//!    object, a required field missing or not a string, an empty `text` or
//!    `chatter`, or (under [`UnknownFields::Reject`]) an unexpected key.
//!
//! [`FrameError::TooLarge`] is never produced here; the relay checks frame
//! length against its configured cap before decoding.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol::messages::{
    ChannelMessage, FIELDS, FIELD_CHATTER, FIELD_ID, FIELD_SENT_AT, FIELD_TEXT,
};

/// Reasons a frame is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The frame is not parseable JSON.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The frame is JSON but its top-level value is not an object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// A required field is absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A required field is present but is not a string.
    #[error("field `{field}` must be a string, got {found}")]
    WrongType {
        field: &'static str,
        found: &'static str,
    },

    /// `text` or `chatter` is the empty string.
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    /// The object carries a key outside the schema and the policy rejects it.
    #[error("unknown field `{0}`")]
    UnknownField(String),

    /// The frame is longer than the relay accepts.
    #[error("frame of {len} bytes exceeds the {max}-byte limit")]
    TooLarge { len: usize, max: usize },

    /// The message could not be serialised for the wire.
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

impl FrameError {
    /// `true` for frames that were not JSON at all, `false` for frames that
    /// parsed but failed the schema.
    pub fn is_malformed(&self) -> bool {
        matches!(self, FrameError::Malformed(_))
    }
}

/// What to do with keys that are not part of the message schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownFields {
    /// Drop extra keys silently; they are never forwarded.
    #[default]
    Ignore,
    /// Reject the whole frame.
    Reject,
}

/// Knobs for [`decode_frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub unknown_fields: UnknownFields,
}

impl ValidationPolicy {
    /// Policy that rejects any key outside the schema.
    pub fn strict() -> Self {
        Self {
            unknown_fields: UnknownFields::Reject,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parses and validates one inbound text frame.
///
/// # Errors
///
/// Returns [`FrameError::Malformed`] when `raw` is not JSON, and one of the
/// schema variants when it is JSON but not a valid channel message.
///
/// # Examples
///
/// ```rust
/// use chat_core::{decode_frame, ValidationPolicy};
///
/// let raw = r#"{"id":"1","sent_at":"t1","text":"hi","chatter":"alice"}"#;
/// let msg = decode_frame(raw, ValidationPolicy::default()).unwrap();
/// assert_eq!(msg.chatter(), "alice");
///
/// let err = decode_frame("not json", ValidationPolicy::default()).unwrap_err();
/// assert!(err.is_malformed());
/// ```
pub fn decode_frame(raw: &str, policy: ValidationPolicy) -> Result<ChannelMessage, FrameError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| FrameError::Malformed(e.to_string()))?;

    let mut object = match value {
        Value::Object(object) => object,
        other => return Err(FrameError::NotAnObject(json_kind(&other))),
    };

    if policy.unknown_fields == UnknownFields::Reject {
        if let Some(extra) = object.keys().find(|key| !FIELDS.contains(&key.as_str())) {
            return Err(FrameError::UnknownField(extra.clone()));
        }
    }

    let id = take_string(&mut object, FIELD_ID)?;
    let sent_at = take_string(&mut object, FIELD_SENT_AT)?;
    let text = take_string(&mut object, FIELD_TEXT)?;
    let chatter = take_string(&mut object, FIELD_CHATTER)?;

    if !object.is_empty() {
        tracing::trace!(extra = object.len(), "ignoring unknown fields in frame");
    }

    ChannelMessage::new(id, sent_at, text, chatter)
}

/// Serialises a message into the text payload sent to peers.
///
/// # Errors
///
/// Returns [`FrameError::Encode`] if serialisation fails.
pub fn encode_frame(msg: &ChannelMessage) -> Result<String, FrameError> {
    serde_json::to_string(msg).map_err(|e| FrameError::Encode(e.to_string()))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn take_string(object: &mut Map<String, Value>, field: &'static str) -> Result<String, FrameError> {
    match object.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(FrameError::WrongType {
            field,
            found: json_kind(&other),
        }),
        None => Err(FrameError::MissingField(field)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"id":"1","sent_at":"t1","text":"hi","chatter":"alice"}"#;

    #[test]
    fn test_decode_valid_frame() {
        // Arrange / Act
        let msg = decode_frame(VALID, ValidationPolicy::default()).expect("valid frame");

        // Assert
        assert_eq!(msg, ChannelMessage::new("1", "t1", "hi", "alice").unwrap());
    }

    #[test]
    fn test_decode_non_json_is_malformed() {
        let err = decode_frame("not json", ValidationPolicy::default()).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_decode_array_is_schema_violation() {
        let err = decode_frame("[1,2,3]", ValidationPolicy::default()).unwrap_err();
        assert_eq!(err, FrameError::NotAnObject("array"));
        assert!(!err.is_malformed());
    }

    #[test]
    fn test_decode_json_string_is_not_an_object() {
        let err = decode_frame(r#""hello""#, ValidationPolicy::default()).unwrap_err();
        assert_eq!(err, FrameError::NotAnObject("string"));
    }

    #[test]
    fn test_decode_missing_chatter() {
        let raw = r#"{"id":"1","sent_at":"t1","text":"hi"}"#;
        let err = decode_frame(raw, ValidationPolicy::default()).unwrap_err();
        assert_eq!(err, FrameError::MissingField("chatter"));
    }

    #[test]
    fn test_decode_numeric_id_is_wrong_type() {
        let raw = r#"{"id":1,"sent_at":"t1","text":"hi","chatter":"alice"}"#;
        let err = decode_frame(raw, ValidationPolicy::default()).unwrap_err();
        assert_eq!(
            err,
            FrameError::WrongType {
                field: "id",
                found: "number"
            }
        );
    }

    #[test]
    fn test_decode_null_sent_at_is_wrong_type() {
        let raw = r#"{"id":"1","sent_at":null,"text":"hi","chatter":"alice"}"#;
        let err = decode_frame(raw, ValidationPolicy::default()).unwrap_err();
        assert_eq!(
            err,
            FrameError::WrongType {
                field: "sent_at",
                found: "null"
            }
        );
    }

    #[test]
    fn test_decode_empty_text_is_rejected() {
        let raw = r#"{"id":"1","sent_at":"t1","text":"","chatter":"alice"}"#;
        let err = decode_frame(raw, ValidationPolicy::default()).unwrap_err();
        assert_eq!(err, FrameError::EmptyField("text"));
    }

    #[test]
    fn test_decode_unknown_field_ignored_by_default() {
        let raw = r#"{"id":"1","sent_at":"t1","text":"hi","chatter":"alice","room":"x"}"#;
        let msg = decode_frame(raw, ValidationPolicy::default()).expect("extra keys tolerated");
        // The extra key is not carried into the forwarded frame.
        assert_eq!(encode_frame(&msg).unwrap(), VALID);
    }

    #[test]
    fn test_decode_unknown_field_rejected_when_strict() {
        let raw = r#"{"id":"1","sent_at":"t1","text":"hi","chatter":"alice","room":"x"}"#;
        let err = decode_frame(raw, ValidationPolicy::strict()).unwrap_err();
        assert_eq!(err, FrameError::UnknownField("room".to_string()));
    }

    #[test]
    fn test_strict_policy_accepts_exact_schema() {
        assert!(decode_frame(VALID, ValidationPolicy::strict()).is_ok());
    }

    #[test]
    fn test_encode_produces_canonical_field_order() {
        // Key order in the input does not matter; output order is fixed.
        let raw = r#"{"chatter":"alice","text":"hi","sent_at":"t1","id":"1"}"#;
        let msg = decode_frame(raw, ValidationPolicy::default()).unwrap();
        assert_eq!(encode_frame(&msg).unwrap(), VALID);
    }

    #[test]
    fn test_encode_escapes_unicode_and_quotes_losslessly() {
        let msg = ChannelMessage::new("1", "t1", "say \"héllo\" 👋", "zoë").unwrap();
        let encoded = encode_frame(&msg).unwrap();
        let decoded = decode_frame(&encoded, ValidationPolicy::strict()).unwrap();
        assert_eq!(decoded, msg);
    }
}
