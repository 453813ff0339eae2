use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::clock::Clock;
use crate::session::Session;

/// How long the loop sleeps at most before rechecking the stop signal.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Cooperative stop request for a running loop.
///
/// Clone freely; setting it from a signal handler is fine, it is only an
/// atomic flag the loop checks between dispatches.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drive one session to completion on the calling thread.
///
/// Waits for device readability with the timeout derived from the
/// watchdog's remaining time and dispatches into the session until it
/// reaches its terminal state. Returns the session's final result code.
pub fn run<T, C>(session: &mut Session<'_, T, C>, stop: &StopSignal) -> i32
where
    T: Read + Write + AsRawFd,
    C: Clock,
{
    while !session.is_terminated() {
        if stop.is_stopped() {
            session.abort();
            break;
        }

        let timeout = session
            .poll_timeout()
            .map_or(STOP_POLL_INTERVAL, |remaining| {
                remaining.min(STOP_POLL_INTERVAL)
            });

        match wait_readable(session.wire().as_raw_fd(), timeout) {
            Ok(Readiness::Readable) => session.on_readable(),
            Ok(Readiness::TimedOut) => {}
            Ok(Readiness::Gone) => {
                warn!("device descriptor no longer usable");
                session.abort();
                break;
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => {
                warn!(%err, "poll failed");
                session.abort();
                break;
            }
        }

        session.on_deadline();
    }

    session.result_code()
}

enum Readiness {
    Readable,
    TimedOut,
    Gone,
}

fn wait_readable(fd: std::os::fd::RawFd, timeout: Duration) -> io::Result<Readiness> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;

    // SAFETY: `pollfd` is a single valid struct for the duration of the call.
    let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    if rc == 0 {
        return Ok(Readiness::TimedOut);
    }
    // Readable takes priority over hangup so pending frames are drained;
    // end of file then surfaces as a zero-length read on the next dispatch.
    if pollfd.revents & libc::POLLIN != 0 {
        return Ok(Readiness::Readable);
    }
    if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        return Ok(Readiness::Gone);
    }
    Ok(Readiness::TimedOut)
}
