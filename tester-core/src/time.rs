//! Monotonic time abstraction shared by the tracker, sequencer and history.

use core::ops::Add;
use core::time::Duration;

/// Monotonic instant supplied by the runtime (embassy ticks, a virtual clock, ...).
pub trait MonotonicInstant: Copy + Ord + Add<Duration, Output = Self> {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Microsecond instant used by host tooling and tests.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MicrosInstant(u64);

impl MicrosInstant {
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000))
    }

    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0
    }
}

impl Add<Duration> for MicrosInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl MonotonicInstant for MicrosInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_since_saturates_for_earlier_instants() {
        let early = MicrosInstant::from_millis(10);
        let late = early + Duration::from_millis(40);
        assert_eq!(late.saturating_duration_since(early), Duration::from_millis(40));
        assert_eq!(early.saturating_duration_since(late), Duration::ZERO);
    }
}
