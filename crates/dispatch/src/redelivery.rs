//! Consumer-side redelivery and dead-lettering.

use std::time::Duration;

use messaging::{Message, Publisher};

use crate::error::DispatchError;
use crate::messages::OrderCreated;
use crate::orchestrator::{DispatchOrchestrator, DispatchOutcome};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::services::StockService;
use crate::state::DeliveryState;

/// Header carrying the reason a record was dead-lettered.
pub const DEAD_LETTER_REASON_HEADER: &str = "x-dead-letter-reason";

/// Header carrying the attempt on which a record was dead-lettered.
pub const ATTEMPTS_HEADER: &str = "x-attempts";

/// One delivery of an inbound record.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message: Message,
    /// 1-based delivery attempt.
    pub attempt: u32,
    /// Set once the record has been given up on but its dead-letter copy
    /// was not acknowledged yet.
    pub dead_letter_reason: Option<String>,
}

impl Delivery {
    /// First delivery of a record taken from the broker.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            attempt: 1,
            dead_letter_reason: None,
        }
    }

    /// The same record, redelivered as `attempt`.
    pub fn redelivered(self, attempt: u32) -> Self {
        Self { attempt, ..self }
    }

    /// The same record, redelivered only to retry its dead-letter copy.
    pub fn pending_dead_letter(self, reason: impl Into<String>) -> Self {
        Self {
            dead_letter_reason: Some(reason.into()),
            ..self
        }
    }
}

/// Final state of one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Processed; the record is consumed.
    Acknowledged,
    /// Redeliver as `next_attempt` once `delay` has elapsed.
    RetryScheduled { next_attempt: u32, delay: Duration },
    /// Copied to the dead-letter topic; the record is consumed.
    DeadLettered { reason: String },
    /// The dead-letter copy failed; retry only that publish after `delay`.
    DeadLetterPending { reason: String, delay: Duration },
}

impl Disposition {
    /// Returns the delivery state this disposition ends in.
    pub fn state(&self) -> DeliveryState {
        match self {
            Disposition::Acknowledged => DeliveryState::Acknowledged,
            Disposition::RetryScheduled { .. } => DeliveryState::RetryScheduled,
            Disposition::DeadLettered { .. } => DeliveryState::DeadLettered,
            Disposition::DeadLetterPending { .. } => DeliveryState::DeadLetterPending,
        }
    }

    /// Returns the follow-up delivery and its delay, if the record is not
    /// consumed yet.
    pub fn redelivery(&self, delivery: Delivery) -> Option<(Delivery, Duration)> {
        match self {
            Disposition::RetryScheduled {
                next_attempt,
                delay,
            } => Some((delivery.redelivered(*next_attempt), *delay)),
            Disposition::DeadLetterPending { reason, delay } => {
                Some((delivery.pending_dead_letter(reason.as_str()), *delay))
            }
            Disposition::Acknowledged | Disposition::DeadLettered { .. } => None,
        }
    }
}

/// Decides what happens to each inbound record after processing.
///
/// Successful records are acknowledged. Transient failures are scheduled
/// for redelivery until the retry policy's attempt budget is spent;
/// permanent failures and exhausted retries are copied verbatim to the
/// dead-letter topic. A record whose dead-letter copy failed is never
/// processed again; only the copy is retried. The controller keeps no
/// state between records.
pub struct RedeliveryController<S, P>
where
    S: StockService,
    P: Publisher,
{
    orchestrator: DispatchOrchestrator<S, P>,
    policy: RetryPolicy,
}

impl<S, P> RedeliveryController<S, P>
where
    S: StockService,
    P: Publisher,
{
    /// Creates a new controller.
    pub fn new(orchestrator: DispatchOrchestrator<S, P>, policy: RetryPolicy) -> Self {
        Self {
            orchestrator,
            policy,
        }
    }

    /// Handles one delivery and returns its disposition.
    #[tracing::instrument(
        skip(self, delivery),
        fields(
            message_id = %delivery.message.message_id,
            key = %delivery.message.key,
            attempt = delivery.attempt
        )
    )]
    pub async fn handle(&self, delivery: &Delivery) -> Disposition {
        let (last, disposition) = self.dispose(delivery).await;
        let state = advance(last, disposition.state());
        tracing::debug!(%state, "delivery settled");
        disposition
    }

    /// Returns the disposition together with the state it was reached from.
    async fn dispose(&self, delivery: &Delivery) -> (DeliveryState, Disposition) {
        let received = DeliveryState::Received;

        if let Some(reason) = &delivery.dead_letter_reason {
            tracing::info!(%reason, "retrying dead-letter publish");
            return (received, self.dead_letter(delivery, reason.clone()).await);
        }

        let order = match decode(&delivery.message) {
            Ok(order) => order,
            Err(err) => {
                tracing::error!(error = %err, "undecodable record");
                return (received, self.dead_letter(delivery, err.to_string()).await);
            }
        };

        let processing = advance(received, DeliveryState::Processing);

        let err = match self
            .orchestrator
            .process(&delivery.message.key, &order)
            .await
        {
            Ok(outcome) => {
                metrics::counter!("dispatch_messages_acknowledged_total").increment(1);
                if outcome == DispatchOutcome::ItemUnavailable {
                    tracing::debug!("acknowledged without dispatch");
                }
                return (processing, Disposition::Acknowledged);
            }
            Err(err) => err,
        };

        let class = err.classify();
        let disposition = match self.policy.decide(delivery.attempt, class) {
            RetryDecision::Retry { attempt, delay } => {
                metrics::counter!("dispatch_retries_scheduled_total").increment(1);
                tracing::warn!(
                    error = %err,
                    %class,
                    next_attempt = attempt,
                    ?delay,
                    "retryable failure, redelivery scheduled"
                );
                Disposition::RetryScheduled {
                    next_attempt: attempt,
                    delay,
                }
            }
            RetryDecision::GiveUp { reason } => {
                tracing::error!(error = %err, %class, %reason, "giving up on record");
                self.dead_letter(delivery, format!("{reason}: {err}"))
                    .await
            }
        };
        (processing, disposition)
    }

    /// Copies the record unchanged to the dead-letter topic.
    ///
    /// If that publish fails the record must not be consumed, so only the
    /// copy is scheduled again.
    async fn dead_letter(&self, delivery: &Delivery, reason: String) -> Disposition {
        let topic = &self.orchestrator.topics().dead_letter;
        let record = delivery
            .message
            .forwarded_to(topic)
            .with_header(DEAD_LETTER_REASON_HEADER, reason.clone())
            .with_header(ATTEMPTS_HEADER, delivery.attempt.to_string());

        match self.orchestrator.publisher().forward(record).await {
            Ok(_) => {
                metrics::counter!("dispatch_dead_lettered_total").increment(1);
                tracing::warn!(%topic, %reason, "record dead-lettered");
                Disposition::DeadLettered { reason }
            }
            Err(error) => {
                let delay = self.policy.delay_for_attempt(delivery.attempt);
                metrics::counter!("dispatch_dead_letter_failures_total").increment(1);
                tracing::error!(%topic, %error, ?delay, "dead-letter publish failed, copy rescheduled");
                Disposition::DeadLetterPending { reason, delay }
            }
        }
    }
}

fn decode(message: &Message) -> Result<OrderCreated, DispatchError> {
    let order: OrderCreated = serde_json::from_value(message.payload.clone())
        .map_err(|e| DispatchError::InvalidMessage(e.to_string()))?;

    if order.item.is_empty() {
        return Err(DispatchError::InvalidMessage("item must not be empty".to_string()));
    }

    Ok(order)
}

fn advance(current: DeliveryState, next: DeliveryState) -> DeliveryState {
    debug_assert!(
        current.can_transition_to(next),
        "illegal delivery transition {current} -> {next}"
    );
    tracing::trace!(from = %current, to = %next, "delivery state");
    next
}
