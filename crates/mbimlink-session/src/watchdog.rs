use std::time::{Duration, Instant};

use crate::clock::Clock;

/// Deadline for a device reply to any outstanding request.
pub const REPLY_DEADLINE: Duration = Duration::from_secs(15);

/// One-shot, restartable reply deadline.
///
/// Arming while already armed replaces the previous deadline; cancelling an
/// unarmed watchdog is a no-op. Expiry is observed by polling: the owner
/// asks [`expired`](Watchdog::expired) when the loop wakes up.
#[derive(Debug)]
pub struct Watchdog<C> {
    clock: C,
    deadline: Option<Instant>,
}

impl<C: Clock> Watchdog<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            deadline: None,
        }
    }

    /// (Re)start the deadline `timeout` from now.
    pub fn arm(&mut self, timeout: Duration) {
        self.deadline = Some(self.clock.now() + timeout);
    }

    /// Disarm. No-op when not armed.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Whether an armed deadline has passed.
    pub fn expired(&self) -> bool {
        matches!(self.deadline, Some(deadline) if self.clock.now() >= deadline)
    }

    /// Time left until expiry; `None` when unarmed, zero when overdue.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(self.clock.now()))
    }
}
