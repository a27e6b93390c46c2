#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Embassy-backed instant used by the control loop.

use core::ops::Add;
use core::time::Duration;

use embassy_time::Instant;
use tester_core::time::MonotonicInstant;

/// Wrapper around [`embassy_time::Instant`] that satisfies the core clock trait.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    pub const fn from_micros(micros: u64) -> Self {
        Self(Instant::from_micros(micros))
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(Instant::from_micros(self.0.as_micros().saturating_add(micros)))
    }
}

impl MonotonicInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.as_micros().saturating_sub(earlier.0.as_micros()))
    }
}
