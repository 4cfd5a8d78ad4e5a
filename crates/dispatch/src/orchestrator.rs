//! Dispatch orchestrator driving the availability check and lifecycle publishes.

use std::time::Duration;

use chrono::Utc;
use common::ProcessorId;
use messaging::Publisher;

use crate::error::DispatchError;
use crate::messages::{LifecycleEvent, OrderCreated};
use crate::publisher::EventPublisher;
use crate::services::{StockError, StockService, is_available};
use crate::topics::Topics;

/// Externally supplied settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub topics: Topics,
    /// Upper bound on a single availability check.
    pub availability_timeout: Duration,
    /// Upper bound on waiting for a single publish acknowledgment.
    pub publish_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            topics: Topics::default(),
            availability_timeout: Duration::from_secs(5),
            publish_timeout: Duration::from_secs(5),
        }
    }
}

/// Terminal business outcome of a successful `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// All three lifecycle events were acknowledged.
    Dispatched,
    /// The item is not available; nothing was published.
    ItemUnavailable,
}

/// Drives the dispatch of a single order.
///
/// The orchestrator checks availability, then publishes `DispatchPreparing`,
/// `OrderDispatched` and `DispatchCompleted` strictly in that order, each
/// only after the previous one was acknowledged. It never retries and
/// never retracts: on failure the error is returned and whatever was
/// already published stays published.
pub struct DispatchOrchestrator<S, P>
where
    S: StockService,
    P: Publisher,
{
    stock: S,
    publisher: EventPublisher<P>,
    processor_id: ProcessorId,
    settings: DispatchSettings,
}

impl<S, P> DispatchOrchestrator<S, P>
where
    S: StockService,
    P: Publisher,
{
    /// Creates a new orchestrator.
    ///
    /// `processor_id` identifies this process on every `OrderDispatched`.
    pub fn new(stock: S, publisher: P, processor_id: ProcessorId, settings: DispatchSettings) -> Self {
        let publisher = EventPublisher::new(publisher, settings.publish_timeout);
        Self {
            stock,
            publisher,
            processor_id,
            settings,
        }
    }

    /// Returns the topic names in use.
    pub fn topics(&self) -> &Topics {
        &self.settings.topics
    }

    /// Returns the publisher shared with the redelivery controller.
    pub fn publisher(&self) -> &EventPublisher<P> {
        &self.publisher
    }

    /// Processes one `OrderCreated` record received under `key`.
    ///
    /// Lifecycle events are published under the same key. Calling this
    /// again for the same order after a partial failure starts the whole
    /// sequence over, so consumers may see duplicate events.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.order_id, item = %order.item))]
    pub async fn process(
        &self,
        key: &str,
        order: &OrderCreated,
    ) -> Result<DispatchOutcome, DispatchError> {
        let body = self.check_availability(&order.item).await?;

        if !is_available(&body) {
            metrics::counter!("dispatch_items_unavailable_total").increment(1);
            tracing::info!("item is unavailable, order not dispatched");
            return Ok(DispatchOutcome::ItemUnavailable);
        }

        let topics = &self.settings.topics;
        let sequence = [
            (&topics.tracking, LifecycleEvent::preparing(order)),
            (
                &topics.dispatched,
                LifecycleEvent::dispatched(order, self.processor_id),
            ),
            (
                &topics.tracking,
                LifecycleEvent::completed(order, Utc::now().date_naive()),
            ),
        ];

        for (topic, event) in &sequence {
            self.publisher.publish(topic, key, event).await?;
        }

        metrics::counter!("dispatch_orders_dispatched_total").increment(1);
        tracing::info!(processed_by_id = %self.processor_id, "order dispatched");

        Ok(DispatchOutcome::Dispatched)
    }

    async fn check_availability(&self, item: &str) -> Result<String, DispatchError> {
        let timeout = self.settings.availability_timeout;
        match tokio::time::timeout(timeout, self.stock.check_availability(item)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StockError::Timeout(timeout).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use common::OrderId;
    use messaging::{InMemoryBroker, PublishError};

    use super::*;
    use crate::classifier::FailureClass;
    use crate::services::InMemoryStockService;

    const KEY: &str = "order-key";

    fn setup() -> (
        DispatchOrchestrator<InMemoryStockService, InMemoryBroker>,
        InMemoryStockService,
        InMemoryBroker,
    ) {
        let stock = InMemoryStockService::new();
        let broker = InMemoryBroker::new(1);
        let orchestrator = DispatchOrchestrator::new(
            stock.clone(),
            broker.clone(),
            ProcessorId::generate(),
            DispatchSettings::default(),
        );
        (orchestrator, stock, broker)
    }

    async fn published_types(broker: &InMemoryBroker) -> (Vec<String>, Vec<String>) {
        let tracking = broker
            .messages(crate::topics::DISPATCH_TRACKING)
            .await
            .into_iter()
            .map(|m| m.message_type)
            .collect();
        let dispatched = broker
            .messages(crate::topics::ORDER_DISPATCHED)
            .await
            .into_iter()
            .map(|m| m.message_type)
            .collect();
        (tracking, dispatched)
    }

    #[tokio::test]
    async fn test_available_item_publishes_full_sequence() {
        let (orchestrator, stock, broker) = setup();
        let order = OrderCreated::new(OrderId::new(), "my-item");

        let outcome = orchestrator.process(KEY, &order).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Dispatched);
        assert_eq!(stock.checked_items(), vec!["my-item".to_string()]);

        let (tracking, dispatched) = published_types(&broker).await;
        assert_eq!(tracking, vec!["DispatchPreparing", "DispatchCompleted"]);
        assert_eq!(dispatched, vec!["OrderDispatched"]);

        let dispatched = broker.messages(crate::topics::ORDER_DISPATCHED).await;
        assert_eq!(dispatched[0].key, KEY);
        let processed_by: ProcessorId =
            serde_json::from_value(dispatched[0].payload["processedById"].clone()).unwrap();
        assert_eq!(processed_by, orchestrator.processor_id);
        assert_eq!(dispatched[0].payload["note"], "Dispatched: my-item");

        let completed = &broker.messages(crate::topics::DISPATCH_TRACKING).await[1];
        assert_eq!(
            completed.payload["dispatchedDate"],
            Utc::now().date_naive().to_string()
        );
        assert!(
            broker
                .messages(crate::topics::DISPATCH_TRACKING)
                .await
                .iter()
                .all(|m| m.key == KEY)
        );
    }

    #[tokio::test]
    async fn test_unavailable_item_publishes_nothing() {
        let (orchestrator, stock, broker) = setup();

        for body in ["false", "TRUE", "maybe", ""] {
            stock.push_response(Ok(body.to_string()));
            let order = OrderCreated::new(OrderId::new(), "my-item");
            let outcome = orchestrator.process(KEY, &order).await.unwrap();
            assert_eq!(outcome, DispatchOutcome::ItemUnavailable, "{body:?}");
        }

        assert_eq!(broker.message_count(crate::topics::DISPATCH_TRACKING).await, 0);
        assert_eq!(broker.message_count(crate::topics::ORDER_DISPATCHED).await, 0);
    }

    #[tokio::test]
    async fn test_server_error_is_transient_and_publishes_nothing() {
        let (orchestrator, stock, broker) = setup();
        stock.push_response(Err(StockError::Status {
            status: 503,
            body: "Service unavailable".into(),
        }));

        let err = orchestrator
            .process(KEY, &OrderCreated::new(OrderId::new(), "my-item"))
            .await
            .unwrap_err();

        assert_eq!(err.classify(), FailureClass::Transient);
        assert_eq!(broker.message_count(crate::topics::DISPATCH_TRACKING).await, 0);
    }

    #[tokio::test]
    async fn test_client_error_is_permanent_and_publishes_nothing() {
        let (orchestrator, stock, broker) = setup();
        stock.push_response(Err(StockError::Status {
            status: 400,
            body: "Bad Request".into(),
        }));

        let err = orchestrator
            .process(KEY, &OrderCreated::new(OrderId::new(), "my-item"))
            .await
            .unwrap_err();

        assert_eq!(err.classify(), FailureClass::Permanent);
        assert_eq!(broker.message_count(crate::topics::DISPATCH_TRACKING).await, 0);
        assert_eq!(broker.message_count(crate::topics::ORDER_DISPATCHED).await, 0);
    }

    #[tokio::test]
    async fn test_first_publish_failure_stops_sequence() {
        let (orchestrator, _, broker) = setup();
        broker
            .fail_next_publishes(
                crate::topics::DISPATCH_TRACKING,
                1,
                PublishError::Unavailable("broker down".into()),
            )
            .await;

        let err = orchestrator
            .process(KEY, &OrderCreated::new(OrderId::new(), "my-item"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Publish { ref event_type, .. } if event_type == "DispatchPreparing"));
        let (tracking, dispatched) = published_types(&broker).await;
        assert!(tracking.is_empty());
        assert!(dispatched.is_empty());
    }

    #[tokio::test]
    async fn test_second_publish_failure_keeps_first_event() {
        let (orchestrator, _, broker) = setup();
        broker
            .fail_next_publishes(
                crate::topics::ORDER_DISPATCHED,
                1,
                PublishError::Unavailable("broker down".into()),
            )
            .await;

        let result = orchestrator
            .process(KEY, &OrderCreated::new(OrderId::new(), "my-item"))
            .await;

        assert!(result.is_err());
        let (tracking, dispatched) = published_types(&broker).await;
        assert_eq!(tracking, vec!["DispatchPreparing"]);
        assert!(dispatched.is_empty());
    }

    #[tokio::test]
    async fn test_reprocessing_after_partial_failure_duplicates_events() {
        let (orchestrator, _, broker) = setup();
        let order = OrderCreated::new(OrderId::new(), "my-item");
        broker
            .fail_next_publishes(
                crate::topics::ORDER_DISPATCHED,
                1,
                PublishError::Unavailable("broker down".into()),
            )
            .await;

        assert!(orchestrator.process(KEY, &order).await.is_err());
        assert!(orchestrator.process(KEY, &order).await.is_ok());

        let (tracking, dispatched) = published_types(&broker).await;
        assert_eq!(
            tracking,
            vec!["DispatchPreparing", "DispatchPreparing", "DispatchCompleted"]
        );
        assert_eq!(dispatched, vec!["OrderDispatched"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_availability_check_times_out_as_transient() {
        let stock = InMemoryStockService::new();
        stock.set_delay(Duration::from_secs(60));
        let broker = InMemoryBroker::new(1);
        let orchestrator = DispatchOrchestrator::new(
            stock,
            broker.clone(),
            ProcessorId::generate(),
            DispatchSettings {
                availability_timeout: Duration::from_millis(500),
                ..DispatchSettings::default()
            },
        );

        let err = orchestrator
            .process(KEY, &OrderCreated::new(OrderId::new(), "my-item"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::Availability(StockError::Timeout(Duration::from_millis(500)))
        );
        assert!(err.classify().is_transient());
        assert_eq!(broker.message_count(crate::topics::DISPATCH_TRACKING).await, 0);
    }

    #[tokio::test]
    async fn test_processor_id_is_shared_across_orders() {
        let (orchestrator, _, broker) = setup();

        for _ in 0..3 {
            orchestrator
                .process(KEY, &OrderCreated::new(OrderId::new(), "my-item"))
                .await
                .unwrap();
        }

        let ids: Vec<_> = broker
            .messages(crate::topics::ORDER_DISPATCHED)
            .await
            .into_iter()
            .map(|m| m.payload["processedById"].clone())
            .collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| *id == ids[0]));
    }
}
