use thiserror::Error;

/// Errors returned by a broker when publishing a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The broker could not be reached or dropped the connection.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// No acknowledgment arrived within the allowed time.
    #[error("Timed out waiting for acknowledgment on topic {topic}")]
    Timeout { topic: String },

    /// The broker refused the record.
    #[error("Record rejected by topic {topic}: {reason}")]
    Rejected { topic: String, reason: String },

    /// The record payload could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(err.to_string())
    }
}

/// Result type for publish operations.
pub type Result<T> = std::result::Result<T, PublishError>;
