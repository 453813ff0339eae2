//! MBIM control message type tags.
//!
//! The numeric values come from the MBIM protocol definition. Host-to-device
//! requests use the low range; the device answers with the request tag plus
//! [`REPLY_FLAG`].

/// High bit marking a device-to-host done reply.
pub const REPLY_FLAG: u32 = 0x8000_0000;

/// Host request: open a control session.
pub const MESSAGE_OPEN: u32 = 0x0000_0001;

/// Host request: close the control session.
pub const MESSAGE_CLOSE: u32 = 0x0000_0002;

/// Host request: execute a command.
pub const MESSAGE_COMMAND: u32 = 0x0000_0003;

/// Device reply to [`MESSAGE_OPEN`].
pub const MESSAGE_OPEN_DONE: u32 = MESSAGE_OPEN | REPLY_FLAG;

/// Device reply to [`MESSAGE_CLOSE`].
pub const MESSAGE_CLOSE_DONE: u32 = MESSAGE_CLOSE | REPLY_FLAG;

/// Device reply to [`MESSAGE_COMMAND`].
pub const MESSAGE_COMMAND_DONE: u32 = MESSAGE_COMMAND | REPLY_FLAG;

/// Unsolicited device error notification.
pub const MESSAGE_FUNCTION_ERROR: u32 = 0x8000_0004;

/// The reply tag a device is expected to answer a request with.
pub fn reply_tag(request_tag: u32) -> u32 {
    request_tag | REPLY_FLAG
}

/// The message kinds the session layer dispatches on.
///
/// Anything the state machine does not recognize lands in `Other` and is
/// ignored rather than treated as a protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    OpenDone,
    CloseDone,
    CommandDone,
    FunctionError,
    Other(u32),
}

impl MessageKind {
    /// Classify a raw message-type tag.
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            MESSAGE_OPEN_DONE => MessageKind::OpenDone,
            MESSAGE_CLOSE_DONE => MessageKind::CloseDone,
            MESSAGE_COMMAND_DONE => MessageKind::CommandDone,
            MESSAGE_FUNCTION_ERROR => MessageKind::FunctionError,
            other => MessageKind::Other(other),
        }
    }

    /// Human-readable tag name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::OpenDone => "OPEN_DONE",
            MessageKind::CloseDone => "CLOSE_DONE",
            MessageKind::CommandDone => "COMMAND_DONE",
            MessageKind::FunctionError => "FUNCTION_ERROR",
            MessageKind::Other(_) => "UNRECOGNIZED",
        }
    }
}
