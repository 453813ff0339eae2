use bytes::{Buf, BufMut};

use crate::error::{FrameError, Result};
use crate::message::{MESSAGE_CLOSE, MESSAGE_OPEN};

/// Frame header: message type (4) + total length (4) + transaction id (4).
pub const HEADER_SIZE: usize = 12;

/// Fixed part of a command-done body: command id (4) + status (4) + buffer length (4).
pub const COMMAND_DONE_FIXED: usize = 12;

/// Wire size of an open request (header + max_control_transfer).
pub const OPEN_REQUEST_LEN: usize = HEADER_SIZE + 4;

/// Wire size of a close request (header only).
pub const CLOSE_REQUEST_LEN: usize = HEADER_SIZE;

/// The fixed header present in every control message.
///
/// All fields are little-endian on the wire. `total_length` counts the
/// header itself and bounds the whole frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: u32,
    pub total_length: u32,
    pub transaction_id: u32,
}

impl MessageHeader {
    /// Decode a header from the front of `buf`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(FrameError::Truncated {
                len: buf.len(),
                need: HEADER_SIZE,
            });
        }

        let mut src = buf;
        Ok(Self {
            message_type: src.get_u32_le(),
            total_length: src.get_u32_le(),
            transaction_id: src.get_u32_le(),
        })
    }

    /// Encode this header into the front of `buf`.
    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < HEADER_SIZE {
            return Err(FrameError::BufferTooSmall {
                need: HEADER_SIZE,
                have: buf.len(),
            });
        }

        let mut dst = buf;
        dst.put_u32_le(self.message_type);
        dst.put_u32_le(self.total_length);
        dst.put_u32_le(self.transaction_id);
        Ok(())
    }
}

/// View over a command-done frame body (the bytes after the header).
///
/// The result payload borrows from the receive buffer; nothing is copied.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandDone<'a> {
    pub command_id: u32,
    pub command_status: u32,
    pub payload: &'a [u8],
}

impl<'a> CommandDone<'a> {
    /// Decode the body of a command-done frame.
    ///
    /// `body` must be the frame contents starting right after the header.
    /// The declared buffer length is checked against the bytes actually
    /// present; a shortfall is a [`FrameError::PayloadOverrun`].
    pub fn decode(body: &'a [u8]) -> Result<Self> {
        if body.len() < COMMAND_DONE_FIXED {
            return Err(FrameError::Truncated {
                len: body.len(),
                need: COMMAND_DONE_FIXED,
            });
        }

        let mut src = body;
        let command_id = src.get_u32_le();
        let command_status = src.get_u32_le();
        let buffer_length = src.get_u32_le() as usize;

        let available = body.len() - COMMAND_DONE_FIXED;
        if buffer_length > available {
            return Err(FrameError::PayloadOverrun {
                declared: buffer_length,
                available,
            });
        }

        Ok(Self {
            command_id,
            command_status,
            payload: &body[COMMAND_DONE_FIXED..COMMAND_DONE_FIXED + buffer_length],
        })
    }
}

/// Encode an open request into `buf`, returning the frame length.
///
/// The body is a single field advertising the host's maximum transfer size.
pub fn encode_open_request(
    buf: &mut [u8],
    transaction_id: u32,
    max_control_transfer: u32,
) -> Result<usize> {
    if buf.len() < OPEN_REQUEST_LEN {
        return Err(FrameError::BufferTooSmall {
            need: OPEN_REQUEST_LEN,
            have: buf.len(),
        });
    }

    MessageHeader {
        message_type: MESSAGE_OPEN,
        total_length: OPEN_REQUEST_LEN as u32,
        transaction_id,
    }
    .encode(buf)?;

    let mut dst = &mut buf[HEADER_SIZE..];
    dst.put_u32_le(max_control_transfer);
    Ok(OPEN_REQUEST_LEN)
}

/// Encode a close request into `buf`, returning the frame length.
pub fn encode_close_request(buf: &mut [u8], transaction_id: u32) -> Result<usize> {
    MessageHeader {
        message_type: MESSAGE_CLOSE,
        total_length: CLOSE_REQUEST_LEN as u32,
        transaction_id,
    }
    .encode(buf)?;
    Ok(CLOSE_REQUEST_LEN)
}
