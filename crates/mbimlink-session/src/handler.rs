/// The command capability a session runs on behalf of its caller.
///
/// The session borrows the handler for its whole lifetime and calls it at
/// two transition points: once to build the command frame after the open
/// phase completes, and once to consume the command's result payload. The
/// frame contents are opaque to the session beyond the fixed header.
pub trait CommandHandler {
    /// Write the next outbound command frame (header included) into `buf`,
    /// returning its length. `buf` is the session's shared buffer, sized to
    /// the negotiated capacity.
    fn request(&mut self, buf: &mut [u8]) -> Result<usize, HandlerError>;

    /// Consume the command's result payload. The return value becomes the
    /// session's result code; negative means failure.
    fn response(&mut self, payload: &[u8]) -> i32;
}

/// Failure building a command frame.
#[derive(Debug, thiserror::Error)]
#[error("command handler failed: {0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
