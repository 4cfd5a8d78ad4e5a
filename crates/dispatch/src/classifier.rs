//! Transient/permanent classification of dispatch failures.
//!
//! Only failures that can plausibly clear up on their own are transient:
//! the stock service or broker being unreachable, slow, or answering with
//! a server error. Everything else, including error kinds this module
//! does not recognise, is permanent so that it is dead-lettered instead
//! of retried forever.

use messaging::PublishError;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::services::StockError;

/// Retry classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureClass {
    /// May succeed if the same input is redelivered unchanged.
    Transient,
    /// Will not succeed on redelivery; route to the dead-letter topic.
    Permanent,
}

impl FailureClass {
    /// Returns true for transient failures.
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureClass::Transient)
    }

    /// Returns the class name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Transient => "transient",
            FailureClass::Permanent => "permanent",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a dispatch failure.
pub fn classify(error: &DispatchError) -> FailureClass {
    match error {
        DispatchError::Availability(stock) => classify_stock(stock),
        DispatchError::Publish { source, .. } => classify_publish(source),
        DispatchError::InvalidMessage(_) => FailureClass::Permanent,
    }
}

fn classify_stock(error: &StockError) -> FailureClass {
    match error {
        StockError::Connection(_) | StockError::Timeout(_) => FailureClass::Transient,
        StockError::Status { status, .. } if (500..=599).contains(status) => {
            FailureClass::Transient
        }
        // 4xx, unexpected 1xx-3xx, unreadable responses
        StockError::Status { .. } | StockError::Client(_) => FailureClass::Permanent,
    }
}

fn classify_publish(error: &PublishError) -> FailureClass {
    match error {
        PublishError::Unavailable(_) | PublishError::Timeout { .. } => FailureClass::Transient,
        PublishError::Rejected { .. } | PublishError::Serialization(_) => FailureClass::Permanent,
    }
}
