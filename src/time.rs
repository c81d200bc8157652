/// Simulated time.
///
/// `SimTime` is an integer count of nanoseconds since the start of the
/// run, so ordering is total and two runs with the same schedule compare
/// identically. Seconds as `f64` only appear at the API edges.

use std::time::Duration;

use crate::error::{SimError, SimResult};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point in simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

impl SimTime {
    /// The start of every run.
    pub const ZERO: SimTime = SimTime(0);

    /// Build a time from raw nanoseconds.
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    /// Build a time from whole milliseconds, saturating at the end of the
    /// representable range.
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        SimTime(millis.saturating_mul(1_000_000))
    }

    /// Build a time from real seconds.
    ///
    /// Fails with [`SimError::InvalidTime`] for negative, NaN or infinite
    /// input, and for values past the representable range.
    pub fn from_secs_f64(secs: f64) -> SimResult<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(SimError::InvalidTime(secs));
        }
        let nanos = (secs * NANOS_PER_SEC as f64).round();
        if nanos > u64::MAX as f64 {
            return Err(SimError::InvalidTime(secs));
        }
        Ok(SimTime(nanos as u64))
    }

    /// Raw nanoseconds.
    #[inline]
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    /// Time in seconds.
    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    /// The instant `delay` after `self`, or `None` on overflow.
    pub fn checked_add(self, delay: Duration) -> Option<SimTime> {
        let delta = u64::try_from(delay.as_nanos()).ok()?;
        self.0.checked_add(delta).map(SimTime)
    }

    /// Elapsed time from `earlier` to `self`, or `None` if `earlier` is later.
    pub fn duration_since(self, earlier: SimTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0).map(Duration::from_nanos)
    }

    #[inline]
    pub fn is_before(self, other: SimTime) -> bool {
        self.0 < other.0
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "+{:.9}s", self.as_secs_f64())
    }
}
