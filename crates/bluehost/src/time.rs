//! Time sources and deadline timers for the transaction engines
//!
//! Engines never block. Each one owns a set of [`Timer`] deadlines and the
//! event loop that drives it calls `process_timeouts()` once the earliest
//! deadline reported by `next_deadline()` has passed.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Source of the current time
pub trait TimeSource {
    /// Get the current instant
    fn now(&self) -> Instant;
}

/// [`TimeSource`] backed by the monotonic system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    pub fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// [`TimeSource`] that only moves when told to
///
/// Useful for driving engines deterministically from tests or simulations.
#[derive(Debug)]
pub struct ManualTimeSource {
    now: Cell<Instant>,
}

impl ManualTimeSource {
    /// Create a source frozen at the current system instant
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// A single cancelable deadline
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    /// Arm (or re-arm) the timer to expire `after` from `now`
    pub fn arm(&mut self, now: Instant, after: Duration) {
        self.deadline = Some(now + after);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the timer is armed and its deadline has been reached
    pub fn has_expired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if deadline <= now)
    }
}

/// Earliest of two optional deadlines
pub(crate) fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
