//! Application configuration.
//!
//! Settings are loaded with Figment from (in order of precedence):
//!
//! 1. Environment variables prefixed with `BOOSTERCTL_` (key path separated
//!    by double underscores, e.g. `BOOSTERCTL_BROKER__HOST=10.0.0.2`)
//! 2. A TOML configuration file (default: `boosterctl.toml`)
//! 3. Built-in defaults
//!
//! ```toml
//! [broker]
//! host = "10.0.0.2"
//! port = 1883
//!
//! [device]
//! prefix = "dt/sinara/booster/ab12-cd34"
//! command_timeout_ms = 5000
//!
//! [tuner]
//! power_settle_ms = 400
//! measure_settle_ms = 100
//! ```

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tuner::TunerLimits;

/// Top-level application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Broker connection settings.
    #[serde(default)]
    pub broker: BrokerSettings,
    /// Device selection and command timing.
    #[serde(default)]
    pub device: DeviceSettings,
    /// Bias-tuner timing overrides.
    #[serde(default)]
    pub tuner: TunerSettings,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    /// Broker hostname or address.
    #[serde(default = "default_broker_host")]
    pub host: String,
    /// Broker port.
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// MQTT client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

/// Device selection and command timing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Device prefix. When unset, the device is discovered.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Topic filter used for discovery.
    #[serde(default = "default_discovery_filter")]
    pub discovery_filter: String,
    /// Listen window for discovery announcements, in milliseconds.
    #[serde(default = "default_discovery_window_ms")]
    pub discovery_window_ms: u64,
    /// Timeout for correlated command responses, in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

/// Bias-tuner timing settings.
///
/// Only the settle delays are configurable; the voltage and current safety
/// limits are device characteristics and stay in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerSettings {
    /// Settle time after powering a channel, in milliseconds.
    #[serde(default = "default_power_settle_ms")]
    pub power_settle_ms: u64,
    /// Settle time after each bias-voltage write, in milliseconds.
    #[serde(default = "default_measure_settle_ms")]
    pub measure_settle_ms: u64,
}

impl Settings {
    /// Load settings from the default file location and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from("boosterctl.toml")
    }

    /// Load settings from a specific TOML file and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("BOOSTERCTL_").split("__"))
            .extract()?;
        Ok(settings)
    }

    /// Command-response timeout as a [`Duration`].
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.device.command_timeout_ms)
    }

    /// Discovery listen window as a [`Duration`].
    pub fn discovery_window(&self) -> Duration {
        Duration::from_millis(self.device.discovery_window_ms)
    }

    /// Tuner limits with the configured settle delays applied.
    pub fn tuner_limits(&self) -> TunerLimits {
        TunerLimits {
            power_settle: Duration::from_millis(self.tuner.power_settle_ms),
            measure_settle: Duration::from_millis(self.tuner.measure_settle_ms),
            ..TunerLimits::default()
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            client_id: default_client_id(),
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            prefix: None,
            discovery_filter: default_discovery_filter(),
            discovery_window_ms: default_discovery_window_ms(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl Default for TunerSettings {
    fn default() -> Self {
        Self {
            power_settle_ms: default_power_settle_ms(),
            measure_settle_ms: default_measure_settle_ms(),
        }
    }
}

fn default_broker_host() -> String {
    "10.0.0.2".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "boosterctl".to_string()
}

fn default_discovery_filter() -> String {
    "dt/sinara/booster/+".to_string()
}

fn default_discovery_window_ms() -> u64 {
    500
}

fn default_command_timeout_ms() -> u64 {
    5000
}

fn default_power_settle_ms() -> u64 {
    400
}

fn default_measure_settle_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.broker.host, "10.0.0.2");
        assert_eq!(settings.broker.port, 1883);
        assert_eq!(settings.device.discovery_filter, "dt/sinara/booster/+");
        assert_eq!(settings.command_timeout(), Duration::from_secs(5));

        let limits = settings.tuner_limits();
        assert_eq!(limits.power_settle, Duration::from_millis(400));
        assert_eq!(limits.measure_settle, Duration::from_millis(100));
    }

    #[test]
    fn test_toml_overrides() {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::string(
                r#"
                [broker]
                host = "192.168.1.7"

                [device]
                prefix = "dt/sinara/booster/lab1"
                command_timeout_ms = 1500
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(settings.broker.host, "192.168.1.7");
        assert_eq!(settings.broker.port, 1883);
        assert_eq!(settings.device.prefix.as_deref(), Some("dt/sinara/booster/lab1"));
        assert_eq!(settings.command_timeout(), Duration::from_millis(1500));
    }
}
