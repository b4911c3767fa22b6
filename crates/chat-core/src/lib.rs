//! # chat-core
//!
//! Shared library for the chat relay containing the channel message model,
//! the JSON frame codec, and connection identities.
//!
//! It has zero dependencies on sockets, async runtimes, or UI frameworks.
//!
//! # Overview
//!
//! - **`protocol::messages`** – [`ChannelMessage`], the unit of data relayed
//!   between chat participants.
//! - **`protocol::codec`** – Turns a raw text frame into a validated
//!   [`ChannelMessage`] (or a [`FrameError`] explaining why it was rejected),
//!   and serialises a message back to the wire.
//! - **`protocol::connection_id`** – [`ConnectionId`], the runtime identity of
//!   one open connection, plus the allocator that hands them out.

pub mod protocol;

pub use protocol::codec::{decode_frame, encode_frame, FrameError, UnknownFields, ValidationPolicy};
pub use protocol::connection_id::{ConnectionId, ConnectionIdAllocator};
pub use protocol::messages::ChannelMessage;
