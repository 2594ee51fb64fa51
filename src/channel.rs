//! Channel identities for the eight RF slots of a Booster chassis.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BoosterError, Result};

/// One of the eight RF channels of a Booster chassis.
///
/// The wire protocol identifies channels by name, not index; the serialized
/// form of each variant is exactly the name the device expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
}

impl Channel {
    /// All channels, in slot order.
    pub const ALL: [Channel; 8] = [
        Channel::Zero,
        Channel::One,
        Channel::Two,
        Channel::Three,
        Channel::Four,
        Channel::Five,
        Channel::Six,
        Channel::Seven,
    ];

    /// Look up a channel by its slot index.
    ///
    /// Out-of-range indices are rejected here, before any message is built or
    /// sent to the device.
    pub fn from_index(index: usize) -> Result<Channel> {
        Channel::ALL
            .get(index)
            .copied()
            .ok_or(BoosterError::InvalidChannel(index))
    }

    /// The slot index of this channel.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The wire name of this channel.
    pub fn name(self) -> &'static str {
        match self {
            Channel::Zero => "Zero",
            Channel::One => "One",
            Channel::Two => "Two",
            Channel::Three => "Three",
            Channel::Four => "Four",
            Channel::Five => "Five",
            Channel::Six => "Six",
            Channel::Seven => "Seven",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Persisted operating state of an RF channel.
///
/// Written through the settings interface at `channel/<n>/state`. `Powered`
/// energizes the bias supplies without enabling RF; tuning runs in this
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ChannelState {
    Off,
    Powered,
    Enabled,
}

impl ChannelState {
    /// The wire name of this state.
    pub fn name(self) -> &'static str {
        match self {
            ChannelState::Off => "Off",
            ChannelState::Powered => "Powered",
            ChannelState::Enabled => "Enabled",
        }
    }
}
