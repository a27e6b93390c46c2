//! Relay test sequences shared by firmware and host targets.
//!
//! A sequence is an ordered list of [`TestStep`]s plus a settle gap that the
//! sequencer waits after releasing each step. Four presets are compiled in;
//! see [`presets`] for the literal timings.

use core::fmt;
use core::str::FromStr;
use core::time::Duration;

use crate::channels::Channel;

pub mod presets;

pub use presets::{
    FULL_TEST, HAZARD_TEST, QUICK_TEST, TURN_SIGNAL_TEST, full_test, hazard_test, quick_test,
    turn_signal_test,
};

/// One relay activation (or rest) inside a sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TestStep {
    /// Channel to energize, or `None` for an all-off rest step.
    pub channel: Option<Channel>,
    pub hold: Duration,
}

impl TestStep {
    /// Energizes `channel` for `hold`.
    #[must_use]
    pub const fn drive(channel: Channel, hold: Duration) -> Self {
        Self {
            channel: Some(channel),
            hold,
        }
    }

    /// Keeps every relay released for `hold`.
    #[must_use]
    pub const fn rest(hold: Duration) -> Self {
        Self {
            channel: None,
            hold,
        }
    }
}

/// Names of the compiled-in sequences.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequencePreset {
    Full,
    Quick,
    TurnSignal,
    Hazard,
}

impl SequencePreset {
    pub const ALL: [SequencePreset; 4] = [
        SequencePreset::Full,
        SequencePreset::Quick,
        SequencePreset::TurnSignal,
        SequencePreset::Hazard,
    ];

    /// Name accepted by [`FromStr`].
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            SequencePreset::Full => "full",
            SequencePreset::Quick => "quick",
            SequencePreset::TurnSignal => "turn",
            SequencePreset::Hazard => "hazard",
        }
    }

    /// Returns the sequence this preset names.
    #[must_use]
    pub const fn sequence(self) -> TestSequence {
        match self {
            SequencePreset::Full => FULL_TEST,
            SequencePreset::Quick => QUICK_TEST,
            SequencePreset::TurnSignal => TURN_SIGNAL_TEST,
            SequencePreset::Hazard => HAZARD_TEST,
        }
    }
}

impl fmt::Display for SequencePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Lookup of a preset name that matches nothing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UnknownPreset;

impl fmt::Display for UnknownPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown sequence (expected full, quick, turn or hazard)")
    }
}

impl FromStr for SequencePreset {
    type Err = UnknownPreset;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        SequencePreset::ALL
            .into_iter()
            .find(|preset| preset.key().eq_ignore_ascii_case(name))
            .ok_or(UnknownPreset)
    }
}

/// Immutable sequence definition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TestSequence {
    pub preset: SequencePreset,
    pub steps: &'static [TestStep],
    /// Gap after each step during which every relay stays released.
    pub settle: Duration,
}

impl TestSequence {
    pub const fn new(
        preset: SequencePreset,
        steps: &'static [TestStep],
        settle: Duration,
    ) -> Self {
        Self {
            preset,
            steps,
            settle,
        }
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Sum of every hold and settle gap.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.steps
            .iter()
            .map(|step| step.hold + self.settle)
            .sum()
    }
}
