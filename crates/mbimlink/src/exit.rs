use std::fmt;
use std::io;

use mbimlink_device::DeviceError;
use mbimlink_session::{SessionError, TransportError, RESULT_ABORTED, RESULT_TIMEOUT};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DEVICE_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => DEVICE_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn device_error(context: &str, err: DeviceError) -> CliError {
    let code = match &err {
        DeviceError::Open { source, .. } | DeviceError::Io(source) => match source.kind() {
            io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
            io::ErrorKind::NotFound => DEVICE_ERROR,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
            _ => INTERNAL,
        },
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(TransportError::Io(source)) => io_error(context, source),
        SessionError::Transport(TransportError::WriteFailed)
        | SessionError::Transport(TransportError::Disconnected) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        SessionError::Transport(_) | SessionError::Frame(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SessionError::Allocation(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

/// Map a finished session's result code to a process exit code.
pub fn result_exit_code(result: i32) -> i32 {
    if result == 0 {
        SUCCESS
    } else if result == RESULT_TIMEOUT {
        TIMEOUT
    } else if result == RESULT_ABORTED {
        INTERRUPTED
    } else {
        FAILURE
    }
}
