// Time sources for the timing session

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of monotonic time for a [`crate::session::Session`].
///
/// The session never calls `Instant::now()` directly; it asks its clock. The
/// binary uses [`MonotonicClock`], tests drive a [`ManualClock`] forward by
/// hand so lap durations and countdown thresholds are exact.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

/// The wall clock used by the binary.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same offset, so a
/// test can keep one handle while the session owns the other.
#[derive(Clone, Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move the clock forward by `seconds`.
    pub fn advance_secs(&self, seconds: f64) {
        let mut offset = self.offset.lock().expect("clock offset lock poisoned");
        *offset += Duration::from_secs_f64(seconds);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        ManualClock::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().expect("clock offset lock poisoned")
    }
}
