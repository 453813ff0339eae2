use std::io::{Read, Write};
use std::time::Duration;

use mbimlink_frame::{
    encode_close_request, encode_open_request, CommandDone, MessageHeader, MessageKind,
    HEADER_SIZE,
};
use tracing::{debug, error, trace, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{Result, TransportError};
use crate::handler::CommandHandler;
use crate::transport::Transport;
use crate::watchdog::{Watchdog, REPLY_DEADLINE};

/// Result code when the peer reports a function error or a command cannot
/// be built or delivered.
pub const RESULT_FAILURE: i32 = -1;

/// Result code when the reply deadline expires.
pub const RESULT_TIMEOUT: i32 = -libc::ETIMEDOUT;

/// Result code when the session is aborted from outside.
pub const RESULT_ABORTED: i32 = -libc::EINTR;

/// Protocol phases of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitingOpen,
    AwaitingCommandDone,
    AwaitingCloseDone,
    Terminated,
}

/// Session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for any outstanding reply.
    pub reply_deadline: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reply_deadline: REPLY_DEADLINE,
        }
    }
}

/// One open/command/close lifecycle against one device.
///
/// The session owns the device stream and the shared send/receive buffer;
/// the command handler is borrowed for the session's whole lifetime. All
/// state transitions run from loop-dispatched calls ([`on_readable`],
/// [`on_deadline`]), each of which runs to completion before the next, so
/// the buffer needs no locking.
///
/// Teardown is idempotent: both the receive path and the deadline path can
/// reach it, and the terminal-state guard makes the second arrival a no-op.
///
/// [`on_readable`]: Session::on_readable
/// [`on_deadline`]: Session::on_deadline
pub struct Session<'h, T, C = MonotonicClock> {
    transport: Transport<T>,
    watchdog: Watchdog<C>,
    handler: &'h mut dyn CommandHandler,
    config: SessionConfig,
    buf: Vec<u8>,
    state: State,
    expected: Option<u32>,
    result_code: i32,
    close_requested: bool,
    next_transaction: u32,
}

impl<'h, T: Read + Write> Session<'h, T> {
    /// Create a session over `wire` with the capacity negotiated at device
    /// open time. Allocates the shared buffer at exactly that size.
    pub fn new(
        wire: T,
        capacity: usize,
        handler: &'h mut dyn CommandHandler,
        config: SessionConfig,
    ) -> Result<Self> {
        Self::with_clock(wire, capacity, handler, config, MonotonicClock)
    }
}

impl<'h, T: Read + Write, C: Clock> Session<'h, T, C> {
    /// Create a session with an explicit time source.
    pub fn with_clock(
        wire: T,
        capacity: usize,
        handler: &'h mut dyn CommandHandler,
        config: SessionConfig,
        clock: C,
    ) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)?;
        buf.resize(capacity, 0);

        Ok(Self {
            transport: Transport::new(wire, capacity),
            watchdog: Watchdog::new(clock),
            handler,
            config,
            buf,
            state: State::AwaitingOpen,
            expected: None,
            result_code: 0,
            close_requested: true,
            next_transaction: 0,
        })
    }

    /// Send the open request and start waiting for the device.
    ///
    /// Failures here happen before the state machine has anything to clean
    /// up, so they surface as errors instead of a result code.
    pub fn start(&mut self) -> Result<()> {
        let transaction_id = self.next_transaction_id();
        let capacity = self.transport.capacity() as u32;
        let len = encode_open_request(&mut self.buf, transaction_id, capacity)?;
        self.send_and_expect(len)?;
        self.state = State::AwaitingOpen;
        debug!(capacity, "open request sent");
        Ok(())
    }

    /// Handle a readability event: read one frame and dispatch it.
    ///
    /// Transient read conditions and malformed frames are absorbed with no
    /// state change; the watchdog keeps running for them.
    pub fn on_readable(&mut self) {
        if self.state == State::Terminated {
            return;
        }

        let n = match self.transport.recv(&mut self.buf) {
            Ok(Some(n)) => n,
            Ok(None) => return,
            Err(TransportError::Disconnected) => {
                error!("device closed the stream");
                if self.result_code >= 0 {
                    self.result_code = RESULT_FAILURE;
                }
                self.close_requested = false;
                self.terminate();
                return;
            }
            Err(err) => {
                warn!(%err, "discarding unusable frame");
                return;
            }
        };

        self.dispatch(n);
    }

    /// Handle a deadline check. A no-op unless the watchdog actually
    /// expired, so spurious wakeups are harmless.
    pub fn on_deadline(&mut self) {
        if self.state == State::Terminated || !self.watchdog.expired() {
            return;
        }

        error!(state = ?self.state, "reply deadline expired");
        if self.result_code >= 0 {
            self.result_code = RESULT_TIMEOUT;
        }
        // The peer is presumed unresponsive; no close attempt.
        self.close_requested = false;
        self.terminate();
    }

    /// Abort the session from outside (stop signal). No close attempt.
    pub fn abort(&mut self) {
        if self.state == State::Terminated {
            return;
        }

        warn!(state = ?self.state, "session aborted");
        if self.result_code == 0 {
            self.result_code = RESULT_ABORTED;
        }
        self.close_requested = false;
        self.terminate();
    }

    /// Current protocol phase.
    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == State::Terminated
    }

    /// The session's final (or running) result code. Zero is success.
    pub fn result_code(&self) -> i32 {
        self.result_code
    }

    /// The reply tag currently awaited, if any.
    pub fn expected_reply_tag(&self) -> Option<u32> {
        self.expected
    }

    /// Time until the watchdog fires; `None` when unarmed.
    pub fn poll_timeout(&self) -> Option<Duration> {
        self.watchdog.remaining()
    }

    /// Borrow the underlying stream.
    pub fn wire(&self) -> &T {
        self.transport.get_ref()
    }

    /// Mutably borrow the underlying stream.
    pub fn wire_mut(&mut self) -> &mut T {
        self.transport.get_mut()
    }

    fn next_transaction_id(&mut self) -> u32 {
        self.next_transaction = self.next_transaction.wrapping_add(1);
        self.next_transaction
    }

    fn send_and_expect(&mut self, len: usize) -> std::result::Result<(), TransportError> {
        let expected = self.transport.send(&self.buf[..len])?;
        self.expected = Some(expected);
        self.watchdog.arm(self.config.reply_deadline);
        Ok(())
    }

    fn dispatch(&mut self, n: usize) {
        let header = match MessageHeader::decode(&self.buf[..n]) {
            Ok(header) => header,
            Err(err) => {
                warn!(%err, "discarding undecodable frame");
                return;
            }
        };

        let kind = MessageKind::from_tag(header.message_type);

        // The whole frame must parse before any timeout bookkeeping: a
        // type-matching command-done with a truncated or overrunning body
        // is discarded here with the watchdog still armed.
        if kind == MessageKind::CommandDone {
            if let Err(err) = CommandDone::decode(&self.buf[HEADER_SIZE..n]) {
                warn!(%err, "discarding malformed command-done frame");
                return;
            }
        }

        // Tag match is by message type only; the transaction id is opaque
        // to this layer.
        if self.expected == Some(header.message_type) {
            self.watchdog.cancel();
            self.expected = None;
        }

        trace!(
            kind = kind.name(),
            transaction_id = header.transaction_id,
            state = ?self.state,
            "dispatching frame"
        );

        match (self.state, kind) {
            (State::AwaitingOpen, MessageKind::OpenDone) => self.on_open_done(),
            (State::AwaitingCommandDone, MessageKind::CommandDone) => self.on_command_done(n),
            (State::AwaitingCloseDone, MessageKind::CloseDone) => self.terminate(),
            (_, MessageKind::FunctionError) => self.on_function_error(),
            (_, MessageKind::Other(tag)) => {
                debug!("ignoring unrecognized message type {tag:#010x}");
            }
            (state, kind) => {
                warn!(?state, kind = kind.name(), "ignoring out-of-sequence message");
            }
        }
    }

    fn on_open_done(&mut self) {
        let len = match self.handler.request(&mut self.buf) {
            Ok(len) => len,
            Err(err) => {
                warn!(%err, "command construction failed, closing session");
                self.result_code = RESULT_FAILURE;
                self.send_close();
                return;
            }
        };

        if len > self.buf.len() {
            warn!(
                len,
                capacity = self.buf.len(),
                "command frame exceeds capacity, closing session"
            );
            self.result_code = RESULT_FAILURE;
            self.send_close();
            return;
        }

        match self.send_and_expect(len) {
            Ok(()) => self.state = State::AwaitingCommandDone,
            Err(err) => self.fail_send(err),
        }
    }

    fn on_command_done(&mut self, n: usize) {
        let done = match CommandDone::decode(&self.buf[HEADER_SIZE..n]) {
            Ok(done) => done,
            // Body validity was established before the watchdog bookkeeping.
            Err(_) => return,
        };

        trace!(
            "command {:#010x} completed (status {}, {} payload bytes)",
            done.command_id,
            done.command_status,
            done.payload.len()
        );

        if done.command_status != 0 && done.payload.is_empty() {
            self.result_code = (done.command_status as i32).wrapping_neg();
        } else {
            self.result_code = self.handler.response(done.payload);
        }

        self.send_close();
    }

    fn on_function_error(&mut self) {
        error!("device reported a function error");
        self.result_code = RESULT_FAILURE;
        if self.state == State::AwaitingCloseDone {
            // A close is already in flight; don't send another.
            return;
        }
        self.send_close();
    }

    /// Attempt the graceful close step, unless the device is already
    /// unusable, in which case terminate on the spot.
    fn send_close(&mut self) {
        if !self.close_requested {
            self.terminate();
            return;
        }

        let transaction_id = self.next_transaction_id();
        let len = match encode_close_request(&mut self.buf, transaction_id) {
            Ok(len) => len,
            Err(err) => {
                error!(%err, "cannot encode close request, terminating");
                self.close_requested = false;
                self.terminate();
                return;
            }
        };

        match self.send_and_expect(len) {
            Ok(()) => self.state = State::AwaitingCloseDone,
            Err(err) => {
                error!(%err, "close send failed, terminating");
                self.close_requested = false;
                self.terminate();
            }
        }
    }

    fn fail_send(&mut self, err: TransportError) {
        if self.result_code >= 0 {
            self.result_code = RESULT_FAILURE;
        }
        match err {
            TransportError::FrameTooLarge { .. }
            | TransportError::LengthMismatch { .. }
            | TransportError::MalformedFrame { .. } => {
                // Nothing hit the wire; the device is still usable.
                error!(%err, "dropping command, closing session");
                self.send_close();
            }
            TransportError::WriteFailed | TransportError::Disconnected | TransportError::Io(_) => {
                error!(%err, "device write failed, terminating");
                self.close_requested = false;
                self.terminate();
            }
        }
    }

    fn terminate(&mut self) {
        if self.state == State::Terminated {
            return;
        }
        self.state = State::Terminated;
        self.watchdog.cancel();
        self.expected = None;
        debug!(result = self.result_code, "session terminated");
    }
}
