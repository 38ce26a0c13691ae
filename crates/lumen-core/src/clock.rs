//! Monotonic time source
//!
//! Universes read the time through a [`Clock`] so tests can drive liveness
//! and LTP ordering deterministically with a [`MockClock`].

use std::cell::Cell;
use std::time::{Duration, Instant};

/// A monotonic clock
pub trait Clock {
    /// The current monotonic time
    fn now(&self) -> Instant;
}

/// The process monotonic clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct MockClock {
    base: Instant,
    offset: Cell<Duration>,
}

impl MockClock {
    /// Create a clock frozen at the current instant
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }
}
