//! Persisted-settings writes through the device's settings interface.
//!
//! Channel power state and bias voltage are configuration, not actions: they
//! are written through the settings-synchronization service rather than the
//! control topic. This module holds the narrow contract consumed from that
//! service, `command(path, value, retain)` awaiting an acknowledgement,
//! behind the [`SettingsClient`] trait, plus the MQTT-backed implementation.
//!
//! The settings protocol's internals (schema, persistence, republish) belong
//! to the device and are not modeled here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::sync::{mpsc, Mutex};

use crate::command::DEFAULT_COMMAND_TIMEOUT;
use crate::error::{BoosterError, Result};
use crate::protocol::{self, ControlResponse};
use crate::transport::{InboundMessage, Transport};

/// Write access to a device's persisted settings.
#[async_trait]
pub trait SettingsClient: Send + Sync {
    /// Write `value` to the setting at `path` and await the device's
    /// acknowledgement.
    async fn command(&self, path: &str, value: serde_json::Value, retain: bool) -> Result<()>;
}

/// [`SettingsClient`] over the device's MQTT settings topics.
///
/// A write publishes the JSON value to `<prefix>/settings/<path>` with the
/// acknowledgement topic declared, then awaits the ack. Acknowledgements
/// share the `{"code": ..., "msg": ...}` shape of control responses.
pub struct MqttSettingsClient {
    transport: Arc<dyn Transport>,
    prefix: String,
    ack_topic: String,
    timeout: Duration,
    pending: Mutex<mpsc::Receiver<InboundMessage>>,
}

impl MqttSettingsClient {
    /// Subscribe to the acknowledgement topic and build the client.
    pub async fn connect(transport: Arc<dyn Transport>, prefix: &str) -> Result<Self> {
        let ack_topic = protocol::settings_response_topic(prefix);
        let receiver = transport.subscribe(&ack_topic).await?;

        Ok(Self {
            transport,
            prefix: prefix.to_string(),
            ack_topic,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            pending: Mutex::new(receiver),
        })
    }

    /// Replace the acknowledgement timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SettingsClient for MqttSettingsClient {
    async fn command(&self, path: &str, value: serde_json::Value, retain: bool) -> Result<()> {
        let mut receiver = self
            .pending
            .try_lock()
            .map_err(|_| BoosterError::ChannelBusy)?;
        while receiver.try_recv().is_ok() {}

        let topic = protocol::settings_topic(&self.prefix, path);
        let payload = serde_json::to_vec(&value)?;
        debug!(
            "settings write {path} = {value}{}",
            if retain { " (retained)" } else { "" }
        );

        self.transport
            .publish(&topic, &payload, retain, Some(&self.ack_topic))
            .await?;

        let delivery = tokio::time::timeout(self.timeout, receiver.recv())
            .await
            .map_err(|_| BoosterError::ResponseTimeout(self.timeout))?
            .ok_or(BoosterError::TransportClosed)?;

        if delivery.topic != self.ack_topic {
            return Err(BoosterError::UnexpectedTopic {
                topic: delivery.topic,
                expected: self.ack_topic.clone(),
            });
        }

        let ack: ControlResponse = serde_json::from_slice(&delivery.payload)?;
        if !ack.is_ok() {
            return Err(BoosterError::ActionFailed {
                code: ack.code,
                body: String::from_utf8_lossy(&delivery.payload).into_owned(),
            });
        }

        Ok(())
    }
}
