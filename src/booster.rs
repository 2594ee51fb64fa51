//! High-level control handle for one Booster device.

use std::sync::Arc;
use std::time::Duration;

use log::info;
use serde_json::json;

use crate::channel::{Channel, ChannelState};
use crate::command::CommandChannel;
use crate::error::Result;
use crate::protocol::{Action, BiasReading};
use crate::settings::{MqttSettingsClient, SettingsClient};
use crate::transport::Transport;
use crate::tuner::{BiasTuner, TunerLimits};

/// A connected Booster device.
///
/// Bundles the correlated command channel and the settings interface for one
/// device prefix and exposes the channel operations as methods. All channel
/// arguments are slot indices, validated before any traffic is generated.
pub struct Booster {
    prefix: String,
    commands: CommandChannel,
    settings: Box<dyn SettingsClient>,
}

impl Booster {
    /// Connect the command and settings interfaces for a device.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        prefix: &str,
        command_timeout: Duration,
    ) -> Result<Self> {
        let commands = CommandChannel::connect(transport.clone(), prefix)
            .await?
            .with_timeout(command_timeout);
        let settings = MqttSettingsClient::connect(transport, prefix)
            .await?
            .with_timeout(command_timeout);

        info!("connected to booster '{prefix}'");
        Ok(Self {
            prefix: prefix.to_string(),
            commands,
            settings: Box::new(settings),
        })
    }

    /// Build a device handle from already-constructed parts.
    pub fn from_parts(
        prefix: &str,
        commands: CommandChannel,
        settings: Box<dyn SettingsClient>,
    ) -> Self {
        Self {
            prefix: prefix.to_string(),
            commands,
            settings,
        }
    }

    /// The MQTT prefix of this device.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Sample the bias operating point of a channel.
    pub async fn read_bias_current(&self, channel: usize) -> Result<BiasReading> {
        let channel = Channel::from_index(channel)?;
        let response = self
            .commands
            .perform_action(Action::ReadBiasCurrent, channel)
            .await?;
        response.bias_reading()
    }

    /// Persist the current configuration of a channel to device flash.
    pub async fn save_channel(&self, channel: usize) -> Result<()> {
        let channel = Channel::from_index(channel)?;
        self.commands.perform_action(Action::Save, channel).await?;
        info!("channel {channel} configuration saved");
        Ok(())
    }

    /// Write the operating state of a channel.
    pub async fn set_channel_state(&self, channel: usize, state: ChannelState) -> Result<()> {
        let channel = Channel::from_index(channel)?;
        self.settings
            .command(
                &format!("channel/{}/state", channel.index()),
                json!(state.name()),
                false,
            )
            .await?;
        info!("channel {channel} state set to {}", state.name());
        Ok(())
    }

    /// Tune the bias of a channel to a target drain current with the default
    /// search limits. Returns the final (Vgs, Ids) operating point.
    pub async fn tune_bias(&self, channel: usize, target_current: f64) -> Result<BiasReading> {
        self.tune_bias_with_limits(channel, target_current, TunerLimits::default())
            .await
    }

    /// Tune the bias of a channel with explicit search limits.
    pub async fn tune_bias_with_limits(
        &self,
        channel: usize,
        target_current: f64,
        limits: TunerLimits,
    ) -> Result<BiasReading> {
        let channel = Channel::from_index(channel)?;
        BiasTuner::new(&self.commands, self.settings.as_ref(), channel)
            .with_limits(limits)
            .tune(target_current)
            .await
    }
}
