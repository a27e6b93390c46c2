#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Indicator that reports through the log sinks.
//!
//! The bench has no display driver; every view is written to RTT (or stdout
//! on the host) and the mode is mirrored into [`crate::status`].

use tester_core::channels::{Channel, VoltageSnapshot};
use tester_core::controller::OperatingMode;
use tester_core::peripherals::{Indicator, PeripheralFault};

use crate::log;
use crate::status;

#[derive(Debug, Default)]
pub struct LogIndicator {
    last_channel: Option<Channel>,
}

impl LogIndicator {
    pub const fn new() -> Self {
        Self { last_channel: None }
    }

    pub fn last_channel(&self) -> Option<Channel> {
        self.last_channel
    }
}

impl Indicator for LogIndicator {
    fn show_mode(&mut self, mode: OperatingMode) -> Result<(), PeripheralFault> {
        status::record_mode(mode);
        log::log_mode(mode);
        Ok(())
    }

    fn show_voltages(&mut self, snapshot: &VoltageSnapshot) -> Result<(), PeripheralFault> {
        log::log_voltages(snapshot);
        Ok(())
    }

    fn show_message(&mut self, message: &str) -> Result<(), PeripheralFault> {
        log::log_message(message);
        Ok(())
    }

    fn show_test_channel(&mut self, channel: Option<Channel>) -> Result<(), PeripheralFault> {
        // Settle and completion both report `None`; log the release once.
        if channel.is_some() || self.last_channel.is_some() {
            log::log_test_channel(channel);
        }
        self.last_channel = channel;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), PeripheralFault> {
        self.last_channel = None;
        Ok(())
    }

    fn show_terminal_error(&mut self) {
        status::latch_indicator_fault();
        log::log_indicator_fault();
    }
}
