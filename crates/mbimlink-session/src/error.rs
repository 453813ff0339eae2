/// Errors on the framed transport path.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The outbound frame declares a length above the negotiated capacity.
    /// The frame is refused before any I/O happens.
    #[error("frame too large ({size} bytes, capacity {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The outbound frame's declared length disagrees with the bytes handed in.
    #[error("frame length mismatch ({declared} declared, {actual} present)")]
    LengthMismatch { declared: usize, actual: usize },

    /// The device accepted zero bytes for a non-empty frame.
    #[error("device write failed (zero bytes accepted)")]
    WriteFailed,

    /// An inbound read produced fewer bytes than a frame header.
    #[error("malformed frame ({len} bytes, need {need})")]
    MalformedFrame { len: usize, need: usize },

    /// The device closed the stream (end of file on read).
    #[error("device disconnected")]
    Disconnected,

    /// An I/O error on the write path.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while constructing or starting a session.
///
/// Once the state machine is running, failures are absorbed into the
/// session's result code instead.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport failure before the state machine took over.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame encoding failure (e.g. capacity below the minimum frame size).
    #[error("frame error: {0}")]
    Frame(#[from] mbimlink_frame::FrameError),

    /// The shared buffer could not be allocated at the negotiated capacity.
    #[error("buffer allocation failed: {0}")]
    Allocation(#[from] std::collections::TryReserveError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
