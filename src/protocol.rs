//! Wire types for the Booster MQTT control interface.
//!
//! Requests are published to `<prefix>/control` and answered on
//! `<prefix>/control/response`:
//!
//! ```text
//! -> {"channel": "Zero", "action": "ReadBiasCurrent"}
//! <- {"code": 200, "msg": "{\"vgs\": -2.0, \"ids\": 0.05}"}
//! ```
//!
//! A response code of 200 signals success; any other code is a reported
//! failure carrying the whole response body.

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::error::Result;

/// Response code signalling a successfully executed action.
pub const CODE_OK: u32 = 200;

/// An action that can be performed on a channel over the control topic.
///
/// This is a closed set; the serialized form of each variant is the exact
/// tag the device dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Sample the gate voltage and drain current of the channel.
    ReadBiasCurrent,
    /// Persist the channel configuration to device flash.
    Save,
}

/// Outbound control request payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ControlMessage {
    pub channel: Channel,
    pub action: Action,
}

/// Inbound control response payload.
///
/// `msg` is opaque at this level; for [`Action::ReadBiasCurrent`] it contains
/// a nested JSON object decoded by [`ControlResponse::bias_reading`].
#[derive(Debug, Clone, Deserialize)]
pub struct ControlResponse {
    pub code: u32,
    #[serde(default)]
    pub msg: String,
}

/// A sampled bias operating point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BiasReading {
    /// Gate-source voltage in volts.
    pub vgs: f64,
    /// Drain current in amperes.
    pub ids: f64,
}

impl ControlResponse {
    /// Whether the device reported success.
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    /// Decode the nested payload of a `ReadBiasCurrent` response.
    ///
    /// The firmware encodes nested objects with single quotes to avoid
    /// escape sequences in the outer JSON string; those are normalized
    /// before parsing. Plain double-quoted JSON passes through unchanged.
    pub fn bias_reading(&self) -> Result<BiasReading> {
        let normalized = self.msg.replace('\'', "\"");
        Ok(serde_json::from_str(&normalized)?)
    }
}

/// Topic to which control requests for a device are published.
pub fn control_topic(prefix: &str) -> String {
    format!("{prefix}/control")
}

/// Topic on which a device answers control requests.
pub fn response_topic(prefix: &str) -> String {
    format!("{prefix}/control/response")
}

/// Topic for a persisted-settings write.
pub fn settings_topic(prefix: &str, path: &str) -> String {
    format!("{prefix}/settings/{path}")
}

/// Topic on which settings writes are acknowledged.
pub fn settings_response_topic(prefix: &str) -> String {
    format!("{prefix}/settings/response")
}

/// Topic on which a device streams telemetry for one channel.
pub fn telemetry_topic(prefix: &str, channel: Channel) -> String {
    format!("{prefix}/telemetry/ch{}", channel.index())
}
