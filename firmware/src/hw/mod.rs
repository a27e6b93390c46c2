//! GPIO adapters that implement the `tester-core` peripheral traits.

#![cfg(target_os = "none")]

pub mod adc;

use embassy_stm32::gpio::{Input, Output};
use tester_core::buttons::Level;
use tester_core::channels::{CHANNEL_COUNT, Channel};
use tester_core::peripherals::{PeripheralFault, RelayActuator};

use crate::status;

/// Relay driver outputs, ordered by channel catalog index.
pub struct GpioRelays<'d> {
    outputs: [Output<'d>; CHANNEL_COUNT],
}

impl<'d> GpioRelays<'d> {
    /// Takes outputs in catalog order and releases every relay.
    pub fn new(mut outputs: [Output<'d>; CHANNEL_COUNT]) -> Self {
        for output in &mut outputs {
            output.set_low();
        }
        status::reset_relays();
        Self { outputs }
    }

    fn output_mut(&mut self, channel: Channel) -> &mut Output<'d> {
        let relay = usize::from(channel.profile().relay_index);
        &mut self.outputs[relay]
    }
}

impl RelayActuator for GpioRelays<'_> {
    fn set(&mut self, channel: Channel, energized: bool) -> Result<(), PeripheralFault> {
        let output = self.output_mut(channel);
        if energized {
            output.set_high();
        } else {
            output.set_low();
        }
        status::record_relay(channel, energized);
        Ok(())
    }

    fn all_off(&mut self) -> Result<(), PeripheralFault> {
        for output in &mut self.outputs {
            output.set_low();
        }
        status::reset_relays();
        Ok(())
    }
}

/// Mode and action buttons, wired active-low with pull-ups.
pub struct FrontPanel<'d> {
    mode: Input<'d>,
    action: Input<'d>,
}

impl<'d> FrontPanel<'d> {
    pub fn new(mode: Input<'d>, action: Input<'d>) -> Self {
        Self { mode, action }
    }

    pub fn mode_level(&self) -> Level {
        Level::from_pressed(self.mode.is_low())
    }

    pub fn action_level(&self) -> Level {
        Level::from_pressed(self.action.is_low())
    }
}
