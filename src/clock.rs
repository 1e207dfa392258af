//! Monotonic time sources
//!
//! Event timestamps and durations are measured against a monotonic clock so they
//! stay correct across wall-clock adjustments.

use crate::types::MonotonicMs;
use std::cell::Cell;
use std::rc::Rc;
use tokio::time::Instant;

/// Source of monotonic milliseconds
pub trait Clock {
    fn now_ms(&self) -> MonotonicMs;
}

/// Milliseconds elapsed since the clock was created.
///
/// Backed by `tokio::time::Instant`, so it follows a paused test runtime.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> MonotonicMs {
        self.origin.elapsed().as_millis() as MonotonicMs
    }
}

/// Host-driven clock for replay and deterministic tests.
///
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<MonotonicMs>>,
}

impl ManualClock {
    pub fn new(start: MonotonicMs) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Move the clock to `now`; earlier values are ignored
    pub fn set(&self, now: MonotonicMs) {
        if now > self.now.get() {
            self.now.set(now);
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> MonotonicMs {
        self.now.get()
    }
}
