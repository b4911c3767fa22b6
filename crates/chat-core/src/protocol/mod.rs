//! Protocol module containing the message type, the JSON frame codec, and
//! connection identities.

pub mod codec;
pub mod connection_id;
pub mod messages;

pub use codec::{decode_frame, encode_frame, FrameError, UnknownFields, ValidationPolicy};
pub use connection_id::{ConnectionId, ConnectionIdAllocator};
pub use messages::ChannelMessage;
