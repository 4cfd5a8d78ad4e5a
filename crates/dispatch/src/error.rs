//! Dispatch error types.

use messaging::PublishError;
use thiserror::Error;

use crate::classifier::{self, FailureClass};
use crate::services::StockError;

/// Errors that can occur while dispatching an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The availability check failed.
    #[error("Availability check failed: {0}")]
    Availability(#[from] StockError),

    /// A lifecycle event could not be published.
    #[error("Publishing {event_type} to {topic} failed: {source}")]
    Publish {
        topic: String,
        event_type: String,
        #[source]
        source: PublishError,
    },

    /// The inbound record is not a usable `OrderCreated`.
    #[error("Invalid inbound message: {0}")]
    InvalidMessage(String),
}

impl DispatchError {
    /// Returns whether redelivering the same input may succeed.
    pub fn classify(&self) -> FailureClass {
        classifier::classify(self)
    }
}

/// Convenience type alias for dispatch results.
pub type Result<T> = std::result::Result<T, DispatchError>;
