//! Two-phase bias-voltage search.
//!
//! Tuning finds the gate voltage at which a channel's RF amplifier draws a
//! target drain current. The search runs in two phases:
//!
//! 1. **Coarse up**: from the datasheet pinch-off reference (-2.1 V), step
//!    +20 mV per iteration until the measured current first exceeds the
//!    target. This locates the crossing quickly and cheaply detects gross
//!    device anomalies on the way up.
//! 2. **Fine down**: from the coarse crossing, step -1 mV per iteration
//!    until the current falls back to or below the target. The phase is
//!    confined to a 30 mV window below the crossing, bounding worst-case
//!    tuning time and amplifier stress exposure.
//!
//! Three interlocks abort the search immediately: the voltage leaving its
//! phase-defined window, the current exceeding the hard 0.2 A ceiling, and a
//! coarse-phase current drop of more than 20 mA between consecutive samples
//! (foldback, a malfunction signature; sweeping further could damage the
//! device).

use std::time::Duration;

use log::info;
use serde_json::json;

use crate::channel::{Channel, ChannelState};
use crate::command::CommandChannel;
use crate::error::{BoosterError, Result};
use crate::protocol::{Action, BiasReading};
use crate::settings::SettingsClient;

/// Numeric limits and settle delays of the bias search.
///
/// The defaults are the device-characteristic values; tests override the
/// settle delays to run against a simulated device without real sleeps.
#[derive(Debug, Clone)]
pub struct TunerLimits {
    /// Sweep start, the pinch-off gate voltage from the transistor datasheet.
    pub start_voltage: f64,
    /// Coarse-phase step size in volts.
    pub coarse_step: f64,
    /// Fine-phase step size in volts.
    pub fine_step: f64,
    /// Absolute upper gate-voltage bound of the coarse sweep.
    pub vgs_max: f64,
    /// Hard drain-current ceiling in amperes.
    pub ids_max: f64,
    /// Coarse-phase current drop treated as foldback, in amperes.
    pub foldback_delta: f64,
    /// Width of the fine-phase voltage window below the coarse crossing.
    pub fine_window: f64,
    /// Settle time after powering the channel.
    pub power_settle: Duration,
    /// Settle time after each bias-voltage write, covering current settling
    /// and the ADC sample.
    pub measure_settle: Duration,
}

impl Default for TunerLimits {
    fn default() -> Self {
        Self {
            start_voltage: -2.1,
            coarse_step: 0.02,
            fine_step: 0.001,
            vgs_max: -0.3,
            ids_max: 0.2,
            foldback_delta: 0.02,
            fine_window: 0.03,
            power_settle: Duration::from_millis(400),
            measure_settle: Duration::from_millis(100),
        }
    }
}

/// Bias search over one channel of one device.
///
/// The tuner serializes all its command traffic through the borrowed
/// [`CommandChannel`]; its search state lives only for the duration of one
/// [`BiasTuner::tune`] call.
pub struct BiasTuner<'a> {
    commands: &'a CommandChannel,
    settings: &'a dyn SettingsClient,
    channel: Channel,
    limits: TunerLimits,
}

impl<'a> BiasTuner<'a> {
    pub fn new(
        commands: &'a CommandChannel,
        settings: &'a dyn SettingsClient,
        channel: Channel,
    ) -> Self {
        Self {
            commands,
            settings,
            channel,
            limits: TunerLimits::default(),
        }
    }

    /// Replace the search limits.
    pub fn with_limits(mut self, limits: TunerLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Find the bias point producing `target_current` amperes of drain
    /// current and return the final reading.
    pub async fn tune(&self, target_current: f64) -> Result<BiasReading> {
        let limits = &self.limits;

        // Power up the channel and wait for the supplies to come up. No
        // current is sampled in this state.
        self.settings
            .command(
                &format!("channel/{}/state", self.channel.index()),
                json!(ChannelState::Powered.name()),
                false,
            )
            .await?;
        tokio::time::sleep(limits.power_settle).await;

        // Coarse phase: scan upwards to just above the target.
        let mut voltage = limits.start_voltage;
        let mut last_ids = 0.0;
        let vgs_max = loop {
            if voltage > limits.vgs_max {
                return Err(BoosterError::SafetyBoundsExceeded {
                    voltage,
                    lower: limits.start_voltage,
                    upper: limits.vgs_max,
                });
            }
            let reading = self.measure(voltage).await?;
            if reading.ids > limits.ids_max {
                return Err(BoosterError::OverCurrent { ids: reading.ids });
            }
            if reading.ids < last_ids - limits.foldback_delta {
                return Err(BoosterError::Foldback {
                    ids: reading.ids,
                    previous: last_ids,
                });
            }
            last_ids = reading.ids;
            if reading.ids > target_current {
                break voltage;
            }
            voltage += limits.coarse_step;
        };

        // Fine phase: scan downwards to just below the target, confined to a
        // narrow window under the coarse crossing.
        let vgs_min = vgs_max - limits.fine_window;
        loop {
            voltage -= limits.fine_step;
            if !(vgs_min..=vgs_max).contains(&voltage) {
                return Err(BoosterError::SafetyBoundsExceeded {
                    voltage,
                    lower: vgs_min,
                    upper: vgs_max,
                });
            }
            let reading = self.measure(voltage).await?;
            if reading.ids > limits.ids_max {
                return Err(BoosterError::OverCurrent { ids: reading.ids });
            }
            if reading.ids <= target_current {
                return Ok(reading);
            }
        }
    }

    /// Apply a bias voltage, wait for the current to settle and the ADC to
    /// sample it, then read back the operating point.
    async fn measure(&self, voltage: f64) -> Result<BiasReading> {
        self.settings
            .command(
                &format!("channel/{}/bias_voltage", self.channel.index()),
                json!(voltage),
                false,
            )
            .await?;
        tokio::time::sleep(self.limits.measure_settle).await;

        let response = self
            .commands
            .perform_action(Action::ReadBiasCurrent, self.channel)
            .await?;
        let reading = response.bias_reading()?;

        info!(
            "Vgs = {:.3} V, Ids = {:.2} mA",
            reading.vgs,
            reading.ids * 1000.0
        );
        Ok(reading)
    }
}
