//! In-memory mock transport for tests.
//!
//! `MockTransport` records every published message and lets tests script the
//! device side of the link with a responder closure. It does not implement
//! broker-side topic filtering: every inbound message is handed to every
//! live subscription, mirroring a shared on-message callback, so consumers
//! must validate delivery topics themselves. That is deliberate: it lets
//! tests exercise the unexpected-topic protocol check.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{InboundMessage, Transport, DELIVERY_QUEUE_CAPACITY};
use crate::error::Result;

/// A message recorded by [`MockTransport::publish`].
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
    pub response_topic: Option<String>,
}

/// Scripted device side of the link: maps a published request to an inbound
/// delivery, or to `None` for no reply.
pub type Responder = Box<dyn FnMut(&PublishedMessage) -> Option<InboundMessage> + Send>;

#[derive(Default)]
struct Inner {
    published: Vec<PublishedMessage>,
    subscribers: Vec<mpsc::Sender<InboundMessage>>,
    responder: Option<Responder>,
}

/// Scriptable in-memory [`Transport`] implementation.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the responder invoked on every publish.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&PublishedMessage) -> Option<InboundMessage> + Send + 'static,
    {
        self.lock().responder = Some(Box::new(responder));
    }

    /// Deliver a message to every live subscription.
    pub fn inject(&self, topic: &str, payload: &[u8]) {
        let message = InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        };
        self.route(message);
    }

    /// All messages published so far.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    /// Messages published to one topic.
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.lock()
            .published
            .iter()
            .filter(|message| message.topic == topic)
            .cloned()
            .collect()
    }

    fn route(&self, message: InboundMessage) {
        let mut inner = self.lock();
        // Dropped receivers unsubscribe; a full queue drops the delivery,
        // which is within the at-most-once contract.
        inner
            .subscribers
            .retain(|tx| match tx.try_send(message.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        response_topic: Option<&str>,
    ) -> Result<()> {
        let message = PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain,
            response_topic: response_topic.map(str::to_string),
        };

        let reply = {
            let mut inner = self.lock();
            inner.published.push(message.clone());
            // Take the responder out so it can borrow the lock-free view.
            let mut responder = inner.responder.take();
            drop(inner);
            let reply = responder.as_mut().and_then(|respond| respond(&message));
            self.lock().responder = responder;
            reply
        };

        if let Some(reply) = reply {
            self.route(reply);
        }
        Ok(())
    }

    async fn subscribe(&self, _filter: &str) -> Result<mpsc::Receiver<InboundMessage>> {
        let (tx, rx) = mpsc::channel(DELIVERY_QUEUE_CAPACITY);
        self.lock().subscribers.push(tx);
        Ok(rx)
    }
}
