use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a published record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A keyed record travelling through the broker.
///
/// The key decides the partition, so every record sharing a key is
/// delivered in publish order to the same consumer shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this record.
    pub message_id: MessageId,
    /// Destination topic.
    pub topic: String,
    /// Partitioning key.
    pub key: String,
    /// Name of the record type carried in `payload` (e.g. "OrderCreated").
    pub message_type: String,
    /// The record body as JSON.
    pub payload: serde_json::Value,
    /// When the record was produced.
    pub timestamp: DateTime<Utc>,
    /// Free-form transport headers.
    pub headers: HashMap<String, String>,
}

impl Message {
    /// Creates a record with a fresh ID and the current timestamp.
    pub fn new(
        topic: impl Into<String>,
        key: impl Into<String>,
        message_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            message_id: MessageId::new(),
            topic: topic.into(),
            key: key.into(),
            message_type: message_type.into(),
            payload,
            timestamp: Utc::now(),
            headers: HashMap::new(),
        }
    }

    /// Copies this record onto another topic.
    ///
    /// Key, type, payload and existing headers are carried over unchanged;
    /// the copy gets its own ID and timestamp.
    pub fn forwarded_to(&self, topic: impl Into<String>) -> Self {
        Self {
            message_id: MessageId::new(),
            topic: topic.into(),
            key: self.key.clone(),
            message_type: self.message_type.clone(),
            payload: self.payload.clone(),
            timestamp: Utc::now(),
            headers: self.headers.clone(),
        }
    }

    /// Adds a header, replacing any previous value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns a header value, if set.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Broker acknowledgment for a durably appended record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Topic the record was appended to.
    pub topic: String,
    /// Partition chosen from the record key.
    pub partition: u32,
    /// Position of the record within its partition.
    pub offset: u64,
}
