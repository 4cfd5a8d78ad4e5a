//! Per-message delivery state machine.

use serde::{Deserialize, Serialize};

/// The state of one inbound delivery.
///
/// State transitions:
/// ```text
/// Received ──┬──► Processing ──┬──► Acknowledged
///             │                ├──► RetryScheduled
///             │                ├──► DeadLettered
///             │                └──► DeadLetterPending
///             ├──► DeadLettered
///             └──► DeadLetterPending
/// ```
/// A scheduled retry comes back as a fresh `Received` delivery with a
/// higher attempt number. A pending dead letter comes back as a
/// `Received` delivery that skips processing and only retries the
/// dead-letter publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DeliveryState {
    /// The record has been taken off its partition queue.
    #[default]
    Received,

    /// The orchestrator is running for this record.
    Processing,

    /// Processing succeeded; the record is consumed (terminal state).
    Acknowledged,

    /// A transient failure; redelivery is scheduled (terminal for this attempt).
    RetryScheduled,

    /// The record was copied to the dead-letter topic and consumed (terminal state).
    DeadLettered,

    /// The dead-letter publish failed; only that publish is retried (terminal for this attempt).
    DeadLetterPending,
}

impl DeliveryState {
    /// Returns true if processing can start from this state.
    pub fn can_process(&self) -> bool {
        matches!(self, DeliveryState::Received)
    }

    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: DeliveryState) -> bool {
        matches!(
            (self, next),
            (DeliveryState::Received, DeliveryState::Processing)
                | (DeliveryState::Received, DeliveryState::DeadLettered)
                | (DeliveryState::Received, DeliveryState::DeadLetterPending)
                | (DeliveryState::Processing, DeliveryState::Acknowledged)
                | (DeliveryState::Processing, DeliveryState::RetryScheduled)
                | (DeliveryState::Processing, DeliveryState::DeadLettered)
                | (DeliveryState::Processing, DeliveryState::DeadLetterPending)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryState::Acknowledged
                | DeliveryState::RetryScheduled
                | DeliveryState::DeadLettered
                | DeliveryState::DeadLetterPending
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Received => "Received",
            DeliveryState::Processing => "Processing",
            DeliveryState::Acknowledged => "Acknowledged",
            DeliveryState::RetryScheduled => "RetryScheduled",
            DeliveryState::DeadLettered => "DeadLettered",
            DeliveryState::DeadLetterPending => "DeadLetterPending",
        }
    }
}

impl std::fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
