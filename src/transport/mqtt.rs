//! MQTT 5 transport over `rumqttc`.
//!
//! MQTT 5 is required: correlated requests declare where the device should
//! answer via the `response_topic` publish property. All traffic is QoS 0,
//! matching the at-most-once contract of the control protocol.
//!
//! Reconnect handling is out of scope for this tool; the event loop logs
//! connection errors and keeps polling, and in-flight requests fail through
//! their own timeouts.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use rumqttc::v5::mqttbytes::v5::{Packet, PublishProperties};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, MqttOptions};
use tokio::sync::mpsc;

use super::{filter_matches, InboundMessage, Transport, DELIVERY_QUEUE_CAPACITY};
use crate::error::{BoosterError, Result};

type SubscriberList = Arc<Mutex<Vec<(String, mpsc::Sender<InboundMessage>)>>>;

/// [`Transport`] implementation backed by an MQTT 5 broker connection.
pub struct MqttTransport {
    client: AsyncClient,
    subscribers: SubscriberList,
}

impl MqttTransport {
    /// Connect to a broker and spawn the delivery task.
    pub fn connect(host: &str, port: u16, client_id: &str) -> Self {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(5));

        let (client, mut event_loop) = AsyncClient::new(options, 16);
        let subscribers: SubscriberList = Arc::new(Mutex::new(Vec::new()));

        let task_subscribers = subscribers.clone();
        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = InboundMessage {
                            topic: String::from_utf8_lossy(&publish.topic).into_owned(),
                            payload: publish.payload.to_vec(),
                        };
                        debug!("received {} bytes on '{}'", message.payload.len(), message.topic);
                        route(&task_subscribers, message);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT event loop error: {e}");
                        tokio::time::sleep(Duration::from_millis(250)).await;
                    }
                }
            }
        });

        Self {
            client,
            subscribers,
        }
    }
}

fn route(subscribers: &SubscriberList, message: InboundMessage) {
    let mut subscribers = match subscribers.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    subscribers.retain(|(filter, tx)| {
        if !filter_matches(filter, &message.topic) {
            return !tx.is_closed();
        }
        match tx.try_send(message.clone()) {
            Ok(()) => true,
            // At-most-once: a full consumer queue drops the delivery.
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    });
}

#[async_trait]
impl Transport for MqttTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        response_topic: Option<&str>,
    ) -> Result<()> {
        let mut properties = PublishProperties::default();
        properties.response_topic = response_topic.map(str::to_string);

        debug!("publishing {} bytes to '{topic}'", payload.len());
        self.client
            .publish_with_properties(topic, QoS::AtMostOnce, retain, payload.to_vec(), properties)
            .await
            .map_err(|e| BoosterError::Transport(e.to_string()))
    }

    async fn subscribe(&self, filter: &str) -> Result<mpsc::Receiver<InboundMessage>> {
        self.client
            .subscribe(filter, QoS::AtMostOnce)
            .await
            .map_err(|e| BoosterError::Transport(e.to_string()))?;

        let (tx, rx) = mpsc::channel(DELIVERY_QUEUE_CAPACITY);
        match self.subscribers.lock() {
            Ok(mut guard) => guard.push((filter.to_string(), tx)),
            Err(poisoned) => poisoned.into_inner().push((filter.to_string(), tx)),
        }
        debug!("subscribed to '{filter}'");
        Ok(rx)
    }
}
