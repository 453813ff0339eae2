//! MBIM control message framing.
//!
//! Every control message starts with a fixed 12-byte header:
//! - A 4-byte little-endian message type
//! - A 4-byte little-endian total length (header included)
//! - A 4-byte little-endian transaction id
//!
//! A done reply carries the request's type with the high bit set.
//! This crate only knows the frame envelope; command payloads are opaque.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{
    encode_close_request, encode_open_request, CommandDone, MessageHeader, CLOSE_REQUEST_LEN,
    COMMAND_DONE_FIXED, HEADER_SIZE, OPEN_REQUEST_LEN,
};
pub use error::{FrameError, Result};
pub use message::{
    reply_tag, MessageKind, MESSAGE_CLOSE, MESSAGE_CLOSE_DONE, MESSAGE_COMMAND,
    MESSAGE_COMMAND_DONE, MESSAGE_FUNCTION_ERROR, MESSAGE_OPEN, MESSAGE_OPEN_DONE, REPLY_FLAG,
};
