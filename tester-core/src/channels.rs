//! Trailer circuit catalog and voltage snapshots.
//!
//! Every 7-way circuit the tester can observe or drive is described by a
//! compile-time [`ChannelProfile`]. The catalog follows the RV 7-way wiring
//! standard; pin 1 (white) is ground and is not a measured channel.

use core::fmt;
use core::str::FromStr;

/// Number of measured trailer circuits.
pub const CHANNEL_COUNT: usize = 6;

/// Voltage above which a circuit is treated as switched on.
pub const ACTIVE_FLOOR_VOLTS: f32 = 3.0;

/// Divider ratio of the analog front end: (10 kΩ + 2.7 kΩ) / 2.7 kΩ.
pub const DIVIDER_RATIO: f32 = 4.7;

/// Reference voltage of the ADC supply rail.
pub const ADC_REFERENCE_VOLTS: f32 = 3.3;

/// Full-scale input of the ADC at gain 1 (±4.096 V).
pub const ADC_FULL_SCALE_VOLTS: f32 = 4.096;

/// Scaled readings below this value are reported as zero.
pub const NOISE_FLOOR_VOLTS: f32 = 0.3;

/// Logical trailer circuits.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Channel {
    Brake,
    Tail,
    Left,
    Right,
    Aux,
    Reverse,
}

impl Channel {
    /// Deterministic index for lookups into [`CHANNELS`] and snapshots.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            Channel::Brake => 0,
            Channel::Tail => 1,
            Channel::Left => 2,
            Channel::Right => 3,
            Channel::Aux => 4,
            Channel::Reverse => 5,
        }
    }

    /// Looks up a channel by catalog index.
    pub const fn from_index(index: usize) -> Result<Self, InvalidChannel> {
        match index {
            0 => Ok(Channel::Brake),
            1 => Ok(Channel::Tail),
            2 => Ok(Channel::Left),
            3 => Ok(Channel::Right),
            4 => Ok(Channel::Aux),
            5 => Ok(Channel::Reverse),
            _ => Err(InvalidChannel::Index(index)),
        }
    }

    /// Lower-case key used in logs and console commands.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Channel::Brake => "brake",
            Channel::Tail => "tail",
            Channel::Left => "left",
            Channel::Right => "right",
            Channel::Aux => "aux",
            Channel::Reverse => "reverse",
        }
    }

    /// Static wiring profile for this channel.
    #[must_use]
    pub const fn profile(self) -> ChannelProfile {
        CHANNELS[self.as_index()]
    }

    /// Iterates channels in catalog order.
    pub fn all() -> impl Iterator<Item = Channel> {
        CHANNELS.iter().map(|profile| profile.channel)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl TryFrom<u8> for Channel {
    type Error = InvalidChannel;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Channel::from_index(usize::from(index))
    }
}

impl FromStr for Channel {
    type Err = InvalidChannel;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Channel::all()
            .find(|channel| channel.key().eq_ignore_ascii_case(name))
            .ok_or(InvalidChannel::Name)
    }
}

/// Rejected channel lookup.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InvalidChannel {
    /// Index outside the catalog.
    Index(usize),
    /// Name that matches no channel key.
    Name,
}

impl fmt::Display for InvalidChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidChannel::Index(index) => {
                write!(f, "no channel at index {index} (expected 0-{})", CHANNEL_COUNT - 1)
            }
            InvalidChannel::Name => f.write_str("unknown channel name"),
        }
    }
}

/// ADC board and input feeding a channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AdcSource {
    pub board: u8,
    pub input: u8,
}

/// Metadata describing how a circuit is wired through the tester.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChannelProfile {
    pub channel: Channel,
    pub name: &'static str,
    pub wire_color: &'static str,
    pub connector_pin: u8,
    pub relay_index: u8,
    pub adc: AdcSource,
}

impl ChannelProfile {
    pub const fn new(
        channel: Channel,
        name: &'static str,
        wire_color: &'static str,
        connector_pin: u8,
        relay_index: u8,
        adc: AdcSource,
    ) -> Self {
        Self {
            channel,
            name,
            wire_color,
            connector_pin,
            relay_index,
            adc,
        }
    }
}

/// Compile-time catalog of every measured circuit.
pub const CHANNELS: [ChannelProfile; CHANNEL_COUNT] = [
    ChannelProfile::new(
        Channel::Brake,
        "Brake",
        "Blue",
        2,
        0,
        AdcSource { board: 0, input: 0 },
    ),
    ChannelProfile::new(
        Channel::Tail,
        "Tail/Running",
        "Green",
        3,
        1,
        AdcSource { board: 0, input: 1 },
    ),
    ChannelProfile::new(
        Channel::Left,
        "Left Turn",
        "Red",
        4,
        2,
        AdcSource { board: 0, input: 2 },
    ),
    ChannelProfile::new(
        Channel::Right,
        "Right Turn",
        "Brown",
        5,
        3,
        AdcSource { board: 0, input: 3 },
    ),
    ChannelProfile::new(
        Channel::Aux,
        "Aux Power",
        "Black",
        6,
        4,
        AdcSource { board: 1, input: 0 },
    ),
    ChannelProfile::new(
        Channel::Reverse,
        "Reverse",
        "Yellow",
        7,
        5,
        AdcSource { board: 1, input: 1 },
    ),
];

/// Converts a voltage measured at the ADC pin back to the circuit voltage.
#[must_use]
pub fn scale_divider_reading(adc_volts: f32) -> f32 {
    let input = adc_volts * DIVIDER_RATIO;
    if input < NOISE_FLOOR_VOLTS { 0.0 } else { input }
}

/// Converts a signed 16-bit conversion result at gain 1 to the circuit voltage.
#[must_use]
pub fn scale_raw_counts(raw: i16) -> f32 {
    let adc_volts = f32::from(raw) * ADC_FULL_SCALE_VOLTS / 32_768.0;
    scale_divider_reading(adc_volts)
}

/// Voltages of every channel captured at one sampling instant.
///
/// Channels that were never recorded read 0 V, which keeps them below the
/// active floor.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct VoltageSnapshot {
    volts: [f32; CHANNEL_COUNT],
}

impl VoltageSnapshot {
    /// Snapshot with every channel at 0 V.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            volts: [0.0; CHANNEL_COUNT],
        }
    }

    /// Builder-style setter used by readers and tests.
    #[must_use]
    pub const fn with(mut self, channel: Channel, volts: f32) -> Self {
        self.volts[channel.as_index()] = volts;
        self
    }

    /// Records a reading for one channel.
    pub fn set(&mut self, channel: Channel, volts: f32) {
        self.volts[channel.as_index()] = volts;
    }

    /// Voltage recorded for `channel`.
    #[must_use]
    pub const fn get(&self, channel: Channel) -> f32 {
        self.volts[channel.as_index()]
    }

    /// Returns `true` when `channel` sits above the active floor.
    #[must_use]
    pub fn is_active(&self, channel: Channel) -> bool {
        self.get(channel) > ACTIVE_FLOOR_VOLTS
    }

    /// Iterates `(channel, volts)` pairs in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, f32)> + '_ {
        Channel::all().map(|channel| (channel, self.get(channel)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_lookup_returns_expected_metadata() {
        let left = Channel::Left.profile();
        assert_eq!(left.name, "Left Turn");
        assert_eq!(left.wire_color, "Red");
        assert_eq!(left.connector_pin, 4);
        assert_eq!(left.relay_index, 2);
        assert_eq!(left.adc, AdcSource { board: 0, input: 2 });

        let reverse = Channel::Reverse.profile();
        assert_eq!(reverse.adc, AdcSource { board: 1, input: 1 });
        assert_eq!(reverse.connector_pin, 7);
    }

    #[test]
    fn catalog_order_matches_indices() {
        for (index, profile) in CHANNELS.iter().enumerate() {
            assert_eq!(profile.channel.as_index(), index);
            assert_eq!(usize::from(profile.relay_index), index);
        }
    }

    #[test]
    fn invalid_index_is_rejected_instead_of_defaulting() {
        assert_eq!(Channel::try_from(5), Ok(Channel::Reverse));
        assert_eq!(Channel::try_from(6), Err(InvalidChannel::Index(6)));
        assert_eq!(Channel::from_index(42), Err(InvalidChannel::Index(42)));
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("BRAKE".parse::<Channel>(), Ok(Channel::Brake));
        assert_eq!("aux".parse::<Channel>(), Ok(Channel::Aux));
        assert_eq!("ground".parse::<Channel>(), Err(InvalidChannel::Name));
    }

    #[test]
    fn divider_scaling_applies_ratio_and_noise_floor() {
        let scaled = scale_divider_reading(12.0 / DIVIDER_RATIO);
        assert!((scaled - 12.0).abs() < 1e-4);
        assert_eq!(scale_divider_reading(0.05), 0.0);
        assert_eq!(scale_raw_counts(0), 0.0);

        let half_scale = scale_raw_counts(16_384);
        assert!((half_scale - 2.048 * DIVIDER_RATIO).abs() < 1e-3);
    }

    #[test]
    fn snapshot_defaults_missing_channels_to_zero() {
        let snapshot = VoltageSnapshot::new().with(Channel::Brake, 12.4);
        assert_eq!(snapshot.get(Channel::Brake), 12.4);
        assert_eq!(snapshot.get(Channel::Tail), 0.0);
        assert!(snapshot.is_active(Channel::Brake));
        assert!(!snapshot.is_active(Channel::Tail));
        assert_eq!(snapshot.iter().count(), CHANNEL_COUNT);
    }
}
