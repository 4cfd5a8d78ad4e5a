//! Partition workers feeding inbound records to the redelivery controller.
//!
//! Each partition gets exactly one worker, which handles its records one
//! at a time and in order. A scheduled retry is parked on a timer task
//! and re-enters the same worker's queue when the delay elapses, so the
//! worker itself never sleeps on backoff and keeps draining its partition.

use std::sync::Arc;

use futures_util::future::join_all;
use messaging::{Message, Publisher};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::redelivery::{Delivery, RedeliveryController};
use crate::services::StockService;

/// Starts partition workers for a redelivery controller.
pub struct DispatchConsumer;

impl DispatchConsumer {
    /// Spawns one worker per partition receiver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S, P>(
        controller: Arc<RedeliveryController<S, P>>,
        partitions: Vec<mpsc::UnboundedReceiver<Message>>,
    ) -> ConsumerHandle
    where
        S: StockService + 'static,
        P: Publisher + 'static,
    {
        let shutdown = CancellationToken::new();

        let workers: Vec<JoinHandle<()>> = partitions
            .into_iter()
            .enumerate()
            .map(|(partition, inbound)| {
                tokio::spawn(run_worker(
                    partition,
                    Arc::clone(&controller),
                    inbound,
                    shutdown.clone(),
                ))
            })
            .collect();

        tracing::info!(partitions = workers.len(), "dispatch consumer started");

        ConsumerHandle { shutdown, workers }
    }
}

/// Handle to running partition workers.
///
/// Dropping the handle without calling [`ConsumerHandle::shutdown`] also
/// stops the workers once their current record is done, but nothing
/// waits for them.
pub struct ConsumerHandle {
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl ConsumerHandle {
    /// Returns the number of partition workers.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stops all workers and waits for them to finish.
    ///
    /// A worker in the middle of a record completes it, including the
    /// whole publish sequence, before exiting. Pending redeliveries are
    /// dropped; the broker redelivers those records after a restart.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        let workers = std::mem::take(&mut self.workers);
        for result in join_all(workers).await {
            if let Err(err) = result {
                tracing::error!(error = %err, "partition worker panicked");
            }
        }
        tracing::info!("dispatch consumer stopped");
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        if !self.shutdown.is_cancelled() {
            tracing::warn!(
                workers = self.workers.len(),
                "consumer handle dropped without shutdown, cancelling workers"
            );
            self.shutdown.cancel();
        }
    }
}

#[tracing::instrument(skip(controller, inbound, shutdown))]
async fn run_worker<S, P>(
    partition: usize,
    controller: Arc<RedeliveryController<S, P>>,
    mut inbound: mpsc::UnboundedReceiver<Message>,
    shutdown: CancellationToken,
) where
    S: StockService + 'static,
    P: Publisher + 'static,
{
    let (retry_tx, mut retry_rx) = mpsc::unbounded_channel::<Delivery>();
    let mut timers = JoinSet::new();
    let mut inbound_open = true;

    loop {
        if !inbound_open && timers.is_empty() && retry_rx.is_empty() {
            break;
        }

        let delivery = tokio::select! {
            biased;

            () = shutdown.cancelled() => break,
            Some(delivery) = retry_rx.recv() => delivery,
            received = inbound.recv(), if inbound_open => match received {
                Some(message) => Delivery::new(message),
                None => {
                    inbound_open = false;
                    continue;
                }
            },
            Some(_) = timers.join_next(), if !timers.is_empty() => continue,
        };

        let disposition = controller.handle(&delivery).await;
        if let Some((redelivery, delay)) = disposition.redelivery(delivery) {
            let retry_tx = retry_tx.clone();
            timers.spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = retry_tx.send(redelivery);
            });
        }
    }

    if !timers.is_empty() {
        tracing::debug!(pending = timers.len(), "dropping scheduled redeliveries");
    }
    timers.abort_all();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::{OrderId, ProcessorId};
    use messaging::{InMemoryBroker, PublishError};

    use super::*;
    use crate::messages::OrderCreated;
    use crate::orchestrator::{DispatchOrchestrator, DispatchSettings};
    use crate::retry::RetryPolicy;
    use crate::services::{InMemoryStockService, StockError};
    use crate::topics;

    fn controller(
        stock: &InMemoryStockService,
        broker: &InMemoryBroker,
        policy: RetryPolicy,
    ) -> Arc<RedeliveryController<InMemoryStockService, InMemoryBroker>> {
        let orchestrator = DispatchOrchestrator::new(
            stock.clone(),
            broker.clone(),
            ProcessorId::generate(),
            DispatchSettings::default(),
        );
        Arc::new(RedeliveryController::new(orchestrator, policy))
    }

    fn order_message(key: &str) -> Message {
        Message::new(
            topics::ORDER_CREATED,
            key,
            OrderCreated::MESSAGE_TYPE,
            serde_json::to_value(OrderCreated::new(OrderId::new(), "my-item")).unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_partition_is_processed_in_order() {
        let stock = InMemoryStockService::new();
        let broker = InMemoryBroker::new(1);
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = DispatchConsumer::start(
            controller(&stock, &broker, RetryPolicy::default()),
            vec![rx],
        );
        assert_eq!(handle.worker_count(), 1);
        tx.send(order_message("a")).unwrap();
        tx.send(order_message("b")).unwrap();
        drop(tx);

        tokio::time::sleep(Duration::from_secs(1)).await;

        let keys: Vec<_> = broker
            .messages(topics::DISPATCH_TRACKING)
            .await
            .into_iter()
            .map(|m| (m.key, m.message_type))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a".to_string(), "DispatchPreparing".to_string()),
                ("a".to_string(), "DispatchCompleted".to_string()),
                ("b".to_string(), "DispatchPreparing".to_string()),
                ("b".to_string(), "DispatchCompleted".to_string()),
            ]
        );

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_is_redelivered_after_delay() {
        let stock = InMemoryStockService::new();
        stock.push_response(Err(StockError::Connection("refused".into())));
        let broker = InMemoryBroker::new(1);
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = DispatchConsumer::start(
            controller(
                &stock,
                &broker,
                RetryPolicy::fixed(3, Duration::from_secs(30)),
            ),
            vec![rx],
        );
        tx.send(order_message("k")).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(stock.call_count(), 1);
        assert_eq!(broker.message_count(topics::DISPATCH_TRACKING).await, 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(stock.call_count(), 2);
        assert_eq!(broker.message_count(topics::DISPATCH_TRACKING).await, 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_retry_does_not_block_partition() {
        let stock = InMemoryStockService::new();
        stock.push_response(Err(StockError::Connection("refused".into())));
        let broker = InMemoryBroker::new(1);
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = DispatchConsumer::start(
            controller(
                &stock,
                &broker,
                RetryPolicy::fixed(3, Duration::from_secs(60)),
            ),
            vec![rx],
        );
        tx.send(order_message("first")).unwrap();
        tx.send(order_message("second")).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(stock.call_count(), 2);
        assert_eq!(broker.messages_for_key(topics::DISPATCH_TRACKING, "second").await.len(), 2);
        assert!(broker.messages_for_key(topics::DISPATCH_TRACKING, "first").await.is_empty());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_dead_letter_is_retried_without_reprocessing() {
        let stock = InMemoryStockService::new();
        stock.push_response(Err(StockError::Status {
            status: 400,
            body: "Bad Request".into(),
        }));
        let broker = InMemoryBroker::new(1);
        broker
            .fail_next_publishes(
                topics::ORDER_CREATED_DLT,
                1,
                PublishError::Unavailable("down".into()),
            )
            .await;
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = DispatchConsumer::start(
            controller(
                &stock,
                &broker,
                RetryPolicy::fixed(3, Duration::from_secs(5)),
            ),
            vec![rx],
        );
        tx.send(order_message("k")).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(broker.message_count(topics::ORDER_CREATED_DLT).await, 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(broker.message_count(topics::ORDER_CREATED_DLT).await, 1);
        assert_eq!(stock.call_count(), 1);
        assert_eq!(broker.message_count(topics::DISPATCH_TRACKING).await, 0);
        assert_eq!(broker.message_count(topics::ORDER_DISPATCHED).await, 0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_pending_retries() {
        let stock = InMemoryStockService::new();
        stock.set_default_response(Err(StockError::Connection("refused".into())));
        let broker = InMemoryBroker::new(1);
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = DispatchConsumer::start(
            controller(
                &stock,
                &broker,
                RetryPolicy::fixed(5, Duration::from_secs(60)),
            ),
            vec![rx],
        );
        tx.send(order_message("k")).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(stock.call_count(), 1);
        assert_eq!(broker.message_count(topics::ORDER_CREATED_DLT).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_in_flight_record_finish() {
        let stock = InMemoryStockService::new();
        stock.set_delay(Duration::from_secs(2));
        let broker = InMemoryBroker::new(1);
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = DispatchConsumer::start(
            controller(&stock, &broker, RetryPolicy::default()),
            vec![rx],
        );
        tx.send(order_message("k")).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(stock.call_count(), 1);

        handle.shutdown().await;

        assert_eq!(broker.message_count(topics::DISPATCH_TRACKING).await, 2);
        assert_eq!(broker.message_count(topics::ORDER_DISPATCHED).await, 1);
    }
}
