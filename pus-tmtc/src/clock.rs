//! Time source abstraction for the sender and listener timing logic.
use std::time::{Duration, Instant};

/// Monotonic time source which can also suspend the calling thread.
///
/// All timeouts of the listener and the sender/receiver family are measured against this
/// trait, which allows running the timing logic against a simulated clock in tests.
pub trait Clock: Send + Sync {
    /// Elapsed time since an arbitrary but fixed reference point.
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);

    fn elapsed_since(&self, start: Duration) -> Duration {
        self.now().saturating_sub(start)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    reference: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            reference: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.reference.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
