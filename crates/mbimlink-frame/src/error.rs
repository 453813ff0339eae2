/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The buffer is shorter than the structure being decoded.
    #[error("frame truncated ({len} bytes, need {need})")]
    Truncated { len: usize, need: usize },

    /// The destination buffer cannot hold the encoded frame.
    #[error("encode buffer too small (need {need} bytes, have {have})")]
    BufferTooSmall { need: usize, have: usize },

    /// A declared payload length points past the end of the frame.
    #[error("payload overruns frame ({declared} bytes declared, {available} available)")]
    PayloadOverrun { declared: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
