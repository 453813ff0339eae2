//! MBIM control session layer.
//!
//! One [`Session`] drives one open/command/close lifecycle against one
//! device: it sends the open request, hands the command phase to a borrowed
//! [`CommandHandler`], enforces the reply deadline with a [`Watchdog`], and
//! tears down exactly once whichever path gets there first.
//!
//! The state machine is synchronous and capability-injected (any
//! `Read + Write` stream, any [`Clock`]), so it can be driven directly in
//! tests; [`reactor::run`] is the production loop that waits on the real
//! descriptor.

pub mod clock;
pub mod error;
pub mod handler;
pub mod reactor;
pub mod session;
pub mod transport;
pub mod watchdog;

pub use clock::{Clock, MonotonicClock};
pub use error::{Result, SessionError, TransportError};
pub use handler::{CommandHandler, HandlerError};
pub use reactor::{run, StopSignal};
pub use session::{
    Session, SessionConfig, State, RESULT_ABORTED, RESULT_FAILURE, RESULT_TIMEOUT,
};
pub use transport::Transport;
pub use watchdog::{Watchdog, REPLY_DEADLINE};
