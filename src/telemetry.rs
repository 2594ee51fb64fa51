//! Passive telemetry stream for one RF channel.
//!
//! Devices periodically publish a JSON telemetry packet per channel on
//! `<prefix>/telemetry/ch<n>`. The reader keeps the most recent packet and
//! hands it out on request; deliveries on other topics are skipped, since
//! the transport may fan multiple subscriptions into one delivery path.

use log::warn;
use tokio::sync::{mpsc, Mutex};

use crate::channel::Channel;
use crate::error::{BoosterError, Result};
use crate::protocol;
use crate::transport::{InboundMessage, Transport};

/// Reader over one channel's telemetry topic.
pub struct TelemetryReader {
    topic: String,
    receiver: Mutex<mpsc::Receiver<InboundMessage>>,
    latest: std::sync::Mutex<Option<serde_json::Value>>,
}

impl TelemetryReader {
    /// Subscribe to the telemetry topic of one channel.
    pub async fn subscribe(
        transport: &dyn Transport,
        prefix: &str,
        channel: Channel,
    ) -> Result<Self> {
        let topic = protocol::telemetry_topic(prefix, channel);
        let receiver = transport.subscribe(&topic).await?;

        Ok(Self {
            topic,
            receiver: Mutex::new(receiver),
            latest: std::sync::Mutex::new(None),
        })
    }

    /// Return the latest telemetry packet, waiting for one if none has
    /// arrived yet. The returned packet is consumed.
    pub async fn take_latest(&self) -> Result<serde_json::Value> {
        let mut receiver = self.receiver.lock().await;

        // Fold any queued deliveries into the cached packet.
        while let Ok(message) = receiver.try_recv() {
            self.store(message);
        }
        if let Some(packet) = self.take_cached() {
            return Ok(packet);
        }

        // Nothing cached: wait for the next delivery that decodes.
        loop {
            let message = receiver.recv().await.ok_or(BoosterError::TransportClosed)?;
            self.store(message);
            if let Some(packet) = self.take_cached() {
                return Ok(packet);
            }
        }
    }

    /// Discard any cached packet and return the next one to arrive.
    pub async fn take_next(&self) -> Result<serde_json::Value> {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = None;
        }
        {
            let mut receiver = self.receiver.lock().await;
            while receiver.try_recv().is_ok() {}
        }
        self.take_latest().await
    }

    fn store(&self, message: InboundMessage) {
        if message.topic != self.topic {
            return;
        }
        match serde_json::from_slice(&message.payload) {
            Ok(packet) => {
                if let Ok(mut latest) = self.latest.lock() {
                    *latest = Some(packet);
                }
            }
            Err(e) => warn!("discarding malformed telemetry on '{}': {e}", self.topic),
        }
    }

    fn take_cached(&self) -> Option<serde_json::Value> {
        self.latest.lock().ok().and_then(|mut latest| latest.take())
    }
}
