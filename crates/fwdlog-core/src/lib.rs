//! fwdlog-core: event types, frame codec, and configuration.
//!
//! This crate holds everything the client and receiver share and nothing
//! that touches a socket.
//!
//! # Wire format
//!
//! ```text
//! [ tag: str, timestamp: uint, payload: map<str, any> ]   (MessagePack)
//! [ tag, timestamp, payload ][ tag, timestamp, payload ]…  (one stream)
//! ```
//!
//! Frames are concatenated with no envelope; the decoder relies on
//! MessagePack's own length prefixes and holds partial frames until the rest
//! of their bytes arrive.

pub mod codec;
pub mod config;
pub mod types;

pub use codec::{decode, decode_stream, encode, encode_into, FrameDecoder, FrameError};
pub use types::{record, unix_now, EventRecord, FieldValue, Record};
