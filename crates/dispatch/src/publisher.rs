//! Synchronous lifecycle event publishing.

use std::time::Duration;

use messaging::{Ack, Message, PublishError, Publisher};

use crate::error::DispatchError;
use crate::messages::LifecycleEvent;

/// Publishes dispatch records and waits for each acknowledgment.
///
/// Every publish is bounded by `timeout`; an acknowledgment that does not
/// arrive in time is reported as [`PublishError::Timeout`]. Errors are
/// passed back unclassified.
#[derive(Debug, Clone)]
pub struct EventPublisher<P: Publisher> {
    publisher: P,
    timeout: Duration,
}

impl<P: Publisher> EventPublisher<P> {
    /// Creates a publisher over the given broker connection.
    pub fn new(publisher: P, timeout: Duration) -> Self {
        Self { publisher, timeout }
    }

    /// Publishes a lifecycle event under `key`.
    #[tracing::instrument(skip(self, event), fields(event_type = event.event_type()))]
    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        event: &LifecycleEvent,
    ) -> Result<Ack, DispatchError> {
        let wrap = |source: PublishError| DispatchError::Publish {
            topic: topic.to_string(),
            event_type: event.event_type().to_string(),
            source,
        };

        let payload = serde_json::to_value(event).map_err(|e| wrap(e.into()))?;
        let message = Message::new(topic, key, event.event_type(), payload);

        self.send(message).await.map_err(wrap)
    }

    /// Publishes an already-built record, e.g. a dead-letter copy.
    pub async fn forward(&self, message: Message) -> Result<Ack, PublishError> {
        self.send(message).await
    }

    async fn send(&self, message: Message) -> Result<Ack, PublishError> {
        let topic = message.topic.clone();
        let result = match tokio::time::timeout(self.timeout, self.publisher.publish(message)).await
        {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout {
                topic: topic.clone(),
            }),
        };

        match &result {
            Ok(ack) => {
                tracing::debug!(%topic, partition = ack.partition, offset = ack.offset, "publish acknowledged");
            }
            Err(error) => {
                metrics::counter!("dispatch_publish_failures_total").increment(1);
                tracing::warn!(%topic, %error, "publish failed");
            }
        }

        result
    }
}
