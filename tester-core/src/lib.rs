#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Core logic for the 7-way trailer tester.
//
// Everything here is portable across the MCU firmware and host tooling: no
// standard library, no allocator, bounded storage only. Hardware is reached
// through the traits in `peripherals`.

pub mod buttons;
pub mod channels;
pub mod console;
pub mod controller;
pub mod diagnostics;
pub mod peripherals;
pub mod sequencer;
pub mod sequences;
pub mod signals;
pub mod time;
