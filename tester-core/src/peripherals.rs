//! Narrow interfaces to the hardware collaborators.
//!
//! The core never touches registers. Runtimes hand it a [`ChannelReader`], a
//! [`RelayActuator`] and an [`Indicator`]; the firmware backs them with GPIO
//! and ADC drivers while the simulator backs them with in-memory fakes.

use core::fmt;

use crate::channels::{CHANNEL_COUNT, Channel, VoltageSnapshot};
use crate::controller::OperatingMode;

/// Failure reported by an external peripheral.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PeripheralFault {
    /// The bus transaction was rejected or corrupted.
    Bus,
    /// The device did not answer in time.
    Timeout,
    /// The device is not attached.
    Disconnected,
}

impl fmt::Display for PeripheralFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeripheralFault::Bus => f.write_str("bus error"),
            PeripheralFault::Timeout => f.write_str("device timed out"),
            PeripheralFault::Disconnected => f.write_str("device disconnected"),
        }
    }
}

/// Source of per-channel voltages.
pub trait ChannelReader {
    /// Measures the circuit voltage for `channel`.
    fn read_voltage(&mut self, channel: Channel) -> Result<f32, PeripheralFault>;

    /// Captures every channel into one snapshot, stopping at the first failure.
    fn snapshot(&mut self) -> Result<VoltageSnapshot, PeripheralFault> {
        let mut snapshot = VoltageSnapshot::new();
        for channel in Channel::all() {
            snapshot.set(channel, self.read_voltage(channel)?);
        }
        Ok(snapshot)
    }
}

/// Relay outputs that simulate trailer loads.
pub trait RelayActuator {
    /// Energizes or releases the relay wired to `channel`.
    fn set(&mut self, channel: Channel, energized: bool) -> Result<(), PeripheralFault>;

    /// Releases every relay.
    fn all_off(&mut self) -> Result<(), PeripheralFault>;
}

/// Operator-facing output surface.
pub trait Indicator {
    fn show_mode(&mut self, mode: OperatingMode) -> Result<(), PeripheralFault>;

    fn show_voltages(&mut self, snapshot: &VoltageSnapshot) -> Result<(), PeripheralFault>;

    fn show_message(&mut self, message: &str) -> Result<(), PeripheralFault>;

    /// Highlights the channel a sequence is currently driving (`None` while resting).
    fn show_test_channel(&mut self, _channel: Option<Channel>) -> Result<(), PeripheralFault> {
        Ok(())
    }

    /// Blanks the voltage view.
    fn clear(&mut self) -> Result<(), PeripheralFault>;

    /// Last-resort error view. Must not fail.
    fn show_terminal_error(&mut self);
}

/// Bitmask of energized relays, one bit per catalog index.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RelayStates(u8);

impl RelayStates {
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MASK)
    }

    const MASK: u8 = (1 << CHANNEL_COUNT) - 1;

    const fn bit_for(channel: Channel) -> u8 {
        1 << channel.profile().relay_index
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn set(&mut self, channel: Channel, energized: bool) {
        if energized {
            self.0 |= Self::bit_for(channel);
        } else {
            self.0 &= !Self::bit_for(channel);
        }
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    #[must_use]
    pub const fn is_energized(self, channel: Channel) -> bool {
        self.0 & Self::bit_for(channel) != 0
    }

    #[must_use]
    pub const fn energized_count(self) -> u32 {
        self.0.count_ones()
    }

    #[must_use]
    pub const fn all_off(self) -> bool {
        self.0 == 0
    }

    /// Iterates energized channels in catalog order.
    pub fn active_channels(self) -> impl Iterator<Item = Channel> {
        Channel::all().filter(move |channel| self.is_energized(*channel))
    }
}

impl fmt::Display for RelayStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all_off() {
            return f.write_str("none");
        }
        for (position, channel) in self.active_channels().enumerate() {
            if position > 0 {
                f.write_str(",")?;
            }
            f.write_str(channel.key())?;
        }
        Ok(())
    }
}
