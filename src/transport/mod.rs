//! Pub/sub transport abstraction.
//!
//! This module contains the [`Transport`] trait, the narrow contract the rest
//! of the crate holds against the messaging link: fire-and-forget publish
//! with an optional response-topic declaration, and subscriptions that hand
//! inbound deliveries to the consumer over a bounded channel.
//!
//! The delivery handoff is an explicit `tokio::sync::mpsc` channel so that
//! correctness never depends on the transport's delivery path running
//! cooperatively with the issuing task.

pub mod mock;

#[cfg(feature = "transport_mqtt")]
pub mod mqtt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

pub use mock::MockTransport;
#[cfg(feature = "transport_mqtt")]
pub use mqtt::MqttTransport;

/// Capacity of the per-subscription delivery channel.
///
/// The protocol keeps at most one request in flight, so this only needs to
/// absorb bursts of unconsumed telemetry or discovery announcements.
pub const DELIVERY_QUEUE_CAPACITY: usize = 32;

/// A message delivered by the transport to a subscriber.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Topic the message was delivered on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// A fire-and-forget pub/sub messaging link.
///
/// Delivery is at-most-once and unordered across topics. Implementations
/// must deliver inbound messages from their own task; subscribers receive
/// them through the bounded channel returned by [`Transport::subscribe`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish a payload to a topic, optionally declaring the topic on which
    /// a response is expected.
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        response_topic: Option<&str>,
    ) -> Result<()>;

    /// Subscribe to a topic filter and return the delivery channel for it.
    async fn subscribe(&self, filter: &str) -> Result<mpsc::Receiver<InboundMessage>>;
}

/// Whether an MQTT topic filter matches a concrete topic.
///
/// Supports the `+` single-level and `#` multi-level wildcards.
pub(crate) fn filter_matches(filter: &str, topic: &str) -> bool {
    let mut filter_parts = filter.split('/');
    let mut topic_parts = topic.split('/');

    loop {
        match (filter_parts.next(), topic_parts.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matching() {
        assert!(filter_matches("a/b/c", "a/b/c"));
        assert!(!filter_matches("a/b/c", "a/b"));
        assert!(!filter_matches("a/b", "a/b/c"));
        assert!(filter_matches("dt/sinara/booster/+/alive", "dt/sinara/booster/ab12/alive"));
        assert!(!filter_matches("dt/sinara/booster/+/alive", "dt/sinara/booster/ab12/control"));
        assert!(filter_matches("booster/#", "booster/ab12/control/response"));
    }
}
