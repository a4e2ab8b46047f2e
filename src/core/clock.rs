//! Time Source
//!
//! Time-dependent units (policy expiry, sequence buffer expiry) read the
//! clock through this trait so tests can drive time by hand.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock {
    /// Elapsed time since the clock's epoch.
    fn now(&self) -> Duration;
}

/// Shared handle to a clock.
pub type ClockRef = Rc<dyn Clock>;

/// Wall clock backed by [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// Start a clock at the current instant.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Convenience constructor for a shared handle.
    pub fn shared() -> ClockRef {
        Rc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    /// Clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }

    /// Shared handle reading this clock.
    pub fn handle(&self) -> ClockRef {
        Rc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualClock").field("now", &self.now.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let handle = clock.handle();
        assert_eq!(handle.now(), Duration::ZERO);

        clock.advance(Duration::from_millis(250));
        assert_eq!(handle.now(), Duration::from_millis(250));

        clock.set(Duration::from_secs(2));
        assert_eq!(handle.now(), Duration::from_secs(2));
    }

    #[test]
    fn test_system_clock_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
