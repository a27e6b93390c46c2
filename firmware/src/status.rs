#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Atomics mirror the energized relays, the active mode and the latest
//! diagnosis so a debugger or RTT reader can inspect the bench without
//! touching the controller's peripherals.

use portable_atomic::{AtomicBool, AtomicU8, Ordering};
use tester_core::channels::Channel;
use tester_core::controller::OperatingMode;
use tester_core::peripherals::RelayStates;

/// Bitmask of energized relays (1 == energized).
static RELAY_MASK: AtomicU8 = AtomicU8::new(0);
/// Index into [`OperatingMode::ALL`].
static MODE_INDEX: AtomicU8 = AtomicU8::new(0);
/// Number of findings in the most recent diagnosis.
static FINDING_COUNT: AtomicU8 = AtomicU8::new(0);
/// Latched once the indicator itself has failed.
static INDICATOR_FAULTED: AtomicBool = AtomicBool::new(false);

fn bit_for(channel: Channel) -> u8 {
    1 << channel.as_index()
}

/// Records the commanded state of one relay.
pub fn record_relay(channel: Channel, energized: bool) {
    let bit = bit_for(channel);
    if energized {
        RELAY_MASK.fetch_or(bit, Ordering::Relaxed);
    } else {
        RELAY_MASK.fetch_and(!bit, Ordering::Relaxed);
    }
}

/// Clears every relay bit.
pub fn reset_relays() {
    RELAY_MASK.store(0, Ordering::Relaxed);
}

pub fn relay_states() -> RelayStates {
    RelayStates::from_bits(RELAY_MASK.load(Ordering::Relaxed))
}

pub fn record_mode(mode: OperatingMode) {
    let index = OperatingMode::ALL
        .iter()
        .position(|candidate| *candidate == mode)
        .unwrap_or(0);
    MODE_INDEX.store(u8::try_from(index).unwrap_or(0), Ordering::Relaxed);
}

pub fn mode() -> OperatingMode {
    let index = usize::from(MODE_INDEX.load(Ordering::Relaxed));
    OperatingMode::ALL.get(index).copied().unwrap_or_default()
}

pub fn record_finding_count(count: usize) {
    FINDING_COUNT.store(u8::try_from(count).unwrap_or(u8::MAX), Ordering::Relaxed);
}

pub fn finding_count() -> u8 {
    FINDING_COUNT.load(Ordering::Relaxed)
}

pub fn latch_indicator_fault() {
    INDICATOR_FAULTED.store(true, Ordering::Relaxed);
}

pub fn indicator_faulted() -> bool {
    INDICATOR_FAULTED.load(Ordering::Relaxed)
}
