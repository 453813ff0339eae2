use std::path::PathBuf;

/// Errors that can occur on the control device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Failed to open the device path.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on an already-open descriptor.
    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
