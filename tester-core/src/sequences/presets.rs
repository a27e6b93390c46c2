//! Compiled-in relay sequences.
//!
//! Full and quick walk every circuit in the same order (running lights first,
//! then turn signals, brake, reverse and aux). The turn-signal and hazard
//! patterns alternate with explicit rest steps and need no settle gap.

use core::time::Duration;

use super::{SequencePreset, TestSequence, TestStep};
use crate::channels::Channel;

/// Pause with every relay released between steps of the full and quick tests.
pub const STEP_SETTLE: Duration = Duration::from_millis(300);

const TAIL_HOLD: Duration = Duration::from_millis(2_000);
const TURN_HOLD: Duration = Duration::from_millis(1_500);
const BRAKE_HOLD: Duration = Duration::from_millis(2_000);
const REVERSE_HOLD: Duration = Duration::from_millis(1_500);
const AUX_HOLD: Duration = Duration::from_millis(1_000);

/// Hold used by every quick-test step.
pub const QUICK_HOLD: Duration = Duration::from_millis(500);
/// On and off time of one blink in the turn-signal and hazard patterns.
pub const BLINK: Duration = Duration::from_millis(500);

pub const FULL_STEPS: [TestStep; 6] = [
    TestStep::drive(Channel::Tail, TAIL_HOLD),
    TestStep::drive(Channel::Left, TURN_HOLD),
    TestStep::drive(Channel::Right, TURN_HOLD),
    TestStep::drive(Channel::Brake, BRAKE_HOLD),
    TestStep::drive(Channel::Reverse, REVERSE_HOLD),
    TestStep::drive(Channel::Aux, AUX_HOLD),
];

pub const QUICK_STEPS: [TestStep; 6] = [
    TestStep::drive(Channel::Tail, QUICK_HOLD),
    TestStep::drive(Channel::Left, QUICK_HOLD),
    TestStep::drive(Channel::Right, QUICK_HOLD),
    TestStep::drive(Channel::Brake, QUICK_HOLD),
    TestStep::drive(Channel::Reverse, QUICK_HOLD),
    TestStep::drive(Channel::Aux, QUICK_HOLD),
];

/// Three left blinks, then three right blinks. No trailing rest.
pub const TURN_SIGNAL_STEPS: [TestStep; 11] = [
    TestStep::drive(Channel::Left, BLINK),
    TestStep::rest(BLINK),
    TestStep::drive(Channel::Left, BLINK),
    TestStep::rest(BLINK),
    TestStep::drive(Channel::Left, BLINK),
    TestStep::rest(BLINK),
    TestStep::drive(Channel::Right, BLINK),
    TestStep::rest(BLINK),
    TestStep::drive(Channel::Right, BLINK),
    TestStep::rest(BLINK),
    TestStep::drive(Channel::Right, BLINK),
];

/// Left, right, rest; three times. The sides alternate so only one relay is
/// ever energized.
pub const HAZARD_STEPS: [TestStep; 9] = [
    TestStep::drive(Channel::Left, BLINK),
    TestStep::drive(Channel::Right, BLINK),
    TestStep::rest(BLINK),
    TestStep::drive(Channel::Left, BLINK),
    TestStep::drive(Channel::Right, BLINK),
    TestStep::rest(BLINK),
    TestStep::drive(Channel::Left, BLINK),
    TestStep::drive(Channel::Right, BLINK),
    TestStep::rest(BLINK),
];

pub const FULL_TEST: TestSequence =
    TestSequence::new(SequencePreset::Full, &FULL_STEPS, STEP_SETTLE);

pub const QUICK_TEST: TestSequence =
    TestSequence::new(SequencePreset::Quick, &QUICK_STEPS, STEP_SETTLE);

pub const TURN_SIGNAL_TEST: TestSequence =
    TestSequence::new(SequencePreset::TurnSignal, &TURN_SIGNAL_STEPS, Duration::ZERO);

pub const HAZARD_TEST: TestSequence =
    TestSequence::new(SequencePreset::Hazard, &HAZARD_STEPS, Duration::ZERO);

#[must_use]
pub const fn full_test() -> TestSequence {
    FULL_TEST
}

#[must_use]
pub const fn quick_test() -> TestSequence {
    QUICK_TEST
}

#[must_use]
pub const fn turn_signal_test() -> TestSequence {
    TURN_SIGNAL_TEST
}

#[must_use]
pub const fn hazard_test() -> TestSequence {
    HAZARD_TEST
}
