//! Correlated request/response over the fire-and-forget control topic.
//!
//! The device protocol supports exactly one outstanding request: a command is
//! published to `<prefix>/control` with a declared response topic, and the
//! next delivery on `<prefix>/control/response` is its answer. This module
//! turns that into a checked call:
//!
//! - the pending slot is a try-acquired lock; a second request while one is
//!   in flight fails with [`BoosterError::ChannelBusy`] instead of corrupting
//!   the slot;
//! - stale deliveries left behind by an abandoned call are drained before a
//!   new request is published;
//! - every await carries a timeout, since an unanswered request during
//!   hardware control must fail rather than block forever;
//! - a delivery on any topic other than the registered response topic means
//!   the single-in-flight assumption was broken and fails the call.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::{mpsc, Mutex};

use crate::channel::Channel;
use crate::error::{BoosterError, Result};
use crate::protocol::{self, Action, ControlMessage, ControlResponse};
use crate::transport::{InboundMessage, Transport};

/// Default time allowed for the device to answer a control request.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// A correlated request/response channel to one device.
pub struct CommandChannel {
    transport: Arc<dyn Transport>,
    command_topic: String,
    response_topic: String,
    timeout: Duration,
    /// Exclusive handle on the response subscription; holding it is what
    /// makes a request "the one in flight".
    pending: Mutex<mpsc::Receiver<InboundMessage>>,
}

impl CommandChannel {
    /// Subscribe to the device's response topic and build the channel.
    ///
    /// The subscription is established here, before any request can be
    /// issued, so a response can never race the subscribe.
    pub async fn connect(transport: Arc<dyn Transport>, prefix: &str) -> Result<Self> {
        let response_topic = protocol::response_topic(prefix);
        let receiver = transport.subscribe(&response_topic).await?;

        Ok(Self {
            transport,
            command_topic: protocol::control_topic(prefix),
            response_topic,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            pending: Mutex::new(receiver),
        })
    }

    /// Replace the response timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Perform one action on one channel and return the decoded response.
    ///
    /// At most one request may be outstanding; concurrent calls fail fast
    /// with [`BoosterError::ChannelBusy`].
    pub async fn perform_action(&self, action: Action, channel: Channel) -> Result<ControlResponse> {
        let mut receiver = self
            .pending
            .try_lock()
            .map_err(|_| BoosterError::ChannelBusy)?;

        // Drop anything a previously abandoned request left in the queue.
        while receiver.try_recv().is_ok() {}

        let request = serde_json::to_vec(&ControlMessage { channel, action })?;
        debug!("requesting {action:?} on channel {channel}");
        self.transport
            .publish(&self.command_topic, &request, false, Some(&self.response_topic))
            .await?;

        let delivery = tokio::time::timeout(self.timeout, receiver.recv())
            .await
            .map_err(|_| BoosterError::ResponseTimeout(self.timeout))?
            .ok_or(BoosterError::TransportClosed)?;

        if delivery.topic != self.response_topic {
            return Err(BoosterError::UnexpectedTopic {
                topic: delivery.topic,
                expected: self.response_topic.clone(),
            });
        }

        let response: ControlResponse = serde_json::from_slice(&delivery.payload)?;
        if !response.is_ok() {
            return Err(BoosterError::ActionFailed {
                code: response.code,
                body: String::from_utf8_lossy(&delivery.payload).into_owned(),
            });
        }

        Ok(response)
    }
}
