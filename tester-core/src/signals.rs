//! Per-reading signal interpretation used for status columns and logs.

use core::fmt;

/// Readings below this are reported as [`SignalStatus::Off`].
pub const OFF_CEILING_VOLTS: f32 = 0.5;
/// Readings below this are leakage rather than a driven signal.
pub const LOW_CEILING_VOLTS: f32 = 3.0;
/// Driven readings below this are weak.
pub const WEAK_CEILING_VOLTS: f32 = 10.0;
/// Readings at or above this are over-voltage.
pub const FAULT_FLOOR_VOLTS: f32 = 16.0;

/// Coarse classification of one voltage reading.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignalStatus {
    Off,
    Low,
    Weak,
    Ok,
    High,
}

impl SignalStatus {
    #[must_use]
    pub fn classify(volts: f32) -> Self {
        if volts < OFF_CEILING_VOLTS {
            SignalStatus::Off
        } else if volts < LOW_CEILING_VOLTS {
            SignalStatus::Low
        } else if volts < WEAK_CEILING_VOLTS {
            SignalStatus::Weak
        } else if volts < FAULT_FLOOR_VOLTS {
            SignalStatus::Ok
        } else {
            SignalStatus::High
        }
    }

    /// `true` when the circuit is being driven.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, SignalStatus::Weak | SignalStatus::Ok | SignalStatus::High)
    }

    /// `true` for over-voltage readings.
    #[must_use]
    pub const fn is_fault(self) -> bool {
        matches!(self, SignalStatus::High)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SignalStatus::Off => "OFF",
            SignalStatus::Low => "LOW",
            SignalStatus::Weak => "WEAK",
            SignalStatus::Ok => "OK",
            SignalStatus::High => "HIGH!",
        }
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Comparison of a vehicle-side reading against the trailer-side expectation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PassThroughStatus {
    Ok,
    VoltageDrop,
    SignalLoss,
}

impl PassThroughStatus {
    /// Classifies the difference between the two sides: under 0.5 V is
    /// clean, under 2.0 V is a tolerable drop, anything larger is a loss.
    #[must_use]
    pub fn compare(vehicle_volts: f32, trailer_volts: f32) -> Self {
        let delta = (vehicle_volts - trailer_volts).abs();
        if delta < 0.5 {
            PassThroughStatus::Ok
        } else if delta < 2.0 {
            PassThroughStatus::VoltageDrop
        } else {
            PassThroughStatus::SignalLoss
        }
    }

    /// `true` unless the signal is lost.
    #[must_use]
    pub const fn is_passing(self) -> bool {
        !matches!(self, PassThroughStatus::SignalLoss)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            PassThroughStatus::Ok => "OK",
            PassThroughStatus::VoltageDrop => "VOLTAGE DROP",
            PassThroughStatus::SignalLoss => "SIGNAL LOSS",
        }
    }
}

impl fmt::Display for PassThroughStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
