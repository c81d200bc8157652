//! The simulation clock.

use crate::time::SimTime;

/// Monotonic simulated clock.
///
/// Only the [`EventQueue`](crate::queue::EventQueue) moves it forward, as
/// it pops events. It never observes wall-clock time.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    now: SimTime,
}

impl Clock {
    pub fn new() -> Self {
        Clock { now: SimTime::ZERO }
    }

    /// Current simulated time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Move the clock to `to`.
    ///
    /// # Panics
    /// Panics if `to` is earlier than the current time. The queue rejects
    /// such events at schedule time, so reaching this is a kernel bug.
    pub(crate) fn advance_to(&mut self, to: SimTime) {
        assert!(
            to >= self.now,
            "clock went backward: now={}, to={}",
            self.now,
            to
        );
        self.now = to;
    }
}
