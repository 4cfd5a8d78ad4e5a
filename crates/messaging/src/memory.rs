use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};

use crate::{Ack, Message, PublishError, Publisher, Result};

#[derive(Debug, Default)]
struct BrokerState {
    /// Retained records per topic, oldest first.
    records: HashMap<String, VecDeque<(Ack, Message)>>,
    /// Next offset per (topic, partition).
    offsets: HashMap<(String, u32), u64>,
    /// Live subscriptions per topic, one sender per partition.
    subscribers: HashMap<String, Vec<Vec<mpsc::UnboundedSender<Message>>>>,
    /// Errors to return instead of acknowledging, per topic.
    injected_failures: HashMap<String, VecDeque<PublishError>>,
}

/// In-process partitioned broker.
///
/// Records are routed to a partition by hashing their key, appended to a
/// per-topic log, and fanned out to every subscription of that topic on
/// the matching partition queue. Used by tests, benches and the demo
/// binary in place of a networked broker.
///
/// With a retention cap each topic keeps only its newest `retention`
/// records; offsets keep increasing across evictions.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    partitions: u32,
    retention: Option<usize>,
    state: Arc<RwLock<BrokerState>>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(1)
    }
}

impl InMemoryBroker {
    /// Creates a broker where every topic has `partitions` partitions and
    /// every record is retained.
    pub fn new(partitions: u32) -> Self {
        Self {
            partitions: partitions.max(1),
            retention: None,
            state: Arc::new(RwLock::new(BrokerState::default())),
        }
    }

    /// Creates a broker that keeps at most `retention` records per topic.
    pub fn with_retention(partitions: u32, retention: usize) -> Self {
        Self {
            retention: Some(retention.max(1)),
            ..Self::new(partitions)
        }
    }

    /// Returns the partition a key is routed to.
    pub fn partition_for(&self, key: &str) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % u64::from(self.partitions)) as u32
    }

    /// Subscribes to a topic, returning one receiver per partition.
    ///
    /// Only records published after the call are delivered.
    pub async fn subscribe(&self, topic: &str) -> Vec<mpsc::UnboundedReceiver<Message>> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..self.partitions).map(|_| mpsc::unbounded_channel()).unzip();

        self.state
            .write()
            .await
            .subscribers
            .entry(topic.to_string())
            .or_default()
            .push(senders);

        receivers
    }

    /// Makes the next `count` publishes to `topic` fail with `error`.
    pub async fn fail_next_publishes(&self, topic: &str, count: usize, error: PublishError) {
        let mut state = self.state.write().await;
        let queue = state.injected_failures.entry(topic.to_string()).or_default();
        queue.extend(std::iter::repeat_n(error, count));
    }

    /// Returns the retained records on a topic, in publish order.
    pub async fn messages(&self, topic: &str) -> Vec<Message> {
        self.state
            .read()
            .await
            .records
            .get(topic)
            .map(|records| records.iter().map(|(_, m)| m.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the acknowledged records on a topic carrying the given key.
    pub async fn messages_for_key(&self, topic: &str, key: &str) -> Vec<Message> {
        self.messages(topic)
            .await
            .into_iter()
            .filter(|m| m.key == key)
            .collect()
    }

    /// Returns the number of retained records on a topic.
    pub async fn message_count(&self, topic: &str) -> usize {
        self.state
            .read()
            .await
            .records
            .get(topic)
            .map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl Publisher for InMemoryBroker {
    async fn publish(&self, message: Message) -> Result<Ack> {
        if message.topic.is_empty() {
            return Err(PublishError::Rejected {
                topic: message.topic,
                reason: "empty topic name".to_string(),
            });
        }

        let partition = self.partition_for(&message.key);
        let mut state = self.state.write().await;

        if let Some(error) = state
            .injected_failures
            .get_mut(&message.topic)
            .and_then(VecDeque::pop_front)
        {
            tracing::debug!(topic = %message.topic, %error, "injected publish failure");
            return Err(error);
        }

        let offset_slot = state
            .offsets
            .entry((message.topic.clone(), partition))
            .or_insert(0);
        let offset = *offset_slot;
        *offset_slot += 1;

        let ack = Ack {
            topic: message.topic.clone(),
            partition,
            offset,
        };

        if let Some(subscriptions) = state.subscribers.get_mut(&message.topic) {
            // Drop subscriptions whose receivers have gone away.
            subscriptions.retain(|senders| {
                senders[partition as usize].send(message.clone()).is_ok()
            });
        }

        let log = state.records.entry(message.topic.clone()).or_default();
        log.push_back((ack.clone(), message));
        if let Some(retention) = self.retention {
            while log.len() > retention {
                log.pop_front();
            }
        }

        metrics::counter!("broker_messages_published_total").increment(1);

        Ok(ack)
    }
}
