//! Control device handle for cdc-wdm character devices.
//!
//! Opening the device negotiates the maximum single-transfer size via
//! `IOCTL_WDM_MAX_COMMAND`; devices that do not support the query get a
//! fixed 512-byte default. The descriptor is switched to non-blocking mode
//! so reads driven by readiness events can never stall the loop.

pub mod error;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

pub use error::{DeviceError, Result};

/// Capacity used when the device does not answer the capability query.
pub const DEFAULT_CAPACITY: usize = 512;

/// `IOCTL_WDM_MAX_COMMAND` from `linux/usb/cdc-wdm.h`: `_IOR('H', 0xA0, __u16)`.
const IOCTL_WDM_MAX_COMMAND: libc::c_ulong = 0x8002_48A0;

/// An open control device.
///
/// Owns exactly one descriptor for its lifetime. The negotiated capacity is
/// fixed at open time and never changes.
pub struct Device {
    file: Option<File>,
    fd: RawFd,
    path: PathBuf,
    capacity: usize,
}

impl Device {
    /// Open the device path read-write and negotiate the transfer capacity.
    ///
    /// The capability query is best-effort: an unsupported ioctl (or a zero
    /// answer) silently falls back to [`DEFAULT_CAPACITY`] rather than
    /// failing the open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| DeviceError::Open {
                path: path.clone(),
                source: e,
            })?;
        let fd = file.as_raw_fd();

        set_nonblocking(fd).map_err(|e| DeviceError::Open {
            path: path.clone(),
            source: e,
        })?;

        let capacity = match query_max_transfer(fd) {
            Some(max) => max,
            None => {
                debug!(?path, fallback = DEFAULT_CAPACITY, "max-command query unsupported");
                DEFAULT_CAPACITY
            }
        };

        info!(?path, capacity, "opened control device");

        Ok(Self {
            file: Some(file),
            fd,
            path,
            capacity,
        })
    }

    /// The negotiated maximum single-transfer size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The path this device was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the descriptor.
    ///
    /// Idempotent; subsequent I/O reports `NotConnected`.
    pub fn close(&mut self) {
        if let Some(file) = self.file.take() {
            debug!(path = ?self.path, "closing control device");
            drop(file);
        }
    }

    /// Whether [`close`](Self::close) has already run.
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    fn file(&self) -> io::Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "device closed"))
    }
}

impl Read for Device {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = self.file()?;
        file.read(buf)
    }
}

impl Write for Device {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.file()?;
        file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut file = self.file()?;
        file.flush()
    }
}

impl AsRawFd for Device {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("closed", &self.file.is_none())
            .finish()
    }
}

fn query_max_transfer(fd: RawFd) -> Option<usize> {
    let mut max: u16 = 0;
    // SAFETY: `max` is a valid writable pointer for the u16 the ioctl fills
    // in, and `fd` is an open descriptor owned by this process.
    let rc = unsafe { libc::ioctl(fd, IOCTL_WDM_MAX_COMMAND as _, &mut max) };
    if rc == 0 && max > 0 {
        Some(max as usize)
    } else {
        None
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl F_GETFL/F_SETFL on a descriptor owned by this process.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mbimlink-device-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(tag);
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn open_missing_path_fails() {
        let result = Device::open("/nonexistent/mbimlink-test-device");
        assert!(matches!(result, Err(DeviceError::Open { .. })));
    }

    #[test]
    fn capacity_falls_back_without_ioctl_support() {
        // A regular file rejects the wdm ioctl, which must not fail the open.
        let path = scratch_file("fallback");
        let device = Device::open(&path).unwrap();

        assert_eq!(device.capacity(), DEFAULT_CAPACITY);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn read_write_roundtrip() {
        let path = scratch_file("roundtrip");
        {
            let mut device = Device::open(&path).unwrap();
            device.write_all(b"frame-bytes").unwrap();
        }

        let mut device = Device::open(&path).unwrap();
        let mut buf = [0u8; 16];
        let n = device.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"frame-bytes");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn close_is_idempotent() {
        let path = scratch_file("close");
        let mut device = Device::open(&path).unwrap();

        device.close();
        assert!(device.is_closed());
        device.close();
        assert!(device.is_closed());

        let mut buf = [0u8; 4];
        let err = device.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        let _ = std::fs::remove_file(&path);
    }
}
