//! Order dispatch orchestration.
//!
//! This crate consumes `OrderCreated` records, checks item availability
//! with the stock service and, when the item is available, publishes the
//! dispatch lifecycle in a fixed order:
//! 1. `DispatchPreparing` on the tracking topic
//! 2. `OrderDispatched` on the dispatched topic
//! 3. `DispatchCompleted` on the tracking topic
//!
//! Each publish waits for the broker acknowledgment before the next one
//! starts. Failures are classified as transient or permanent; transient
//! failures are redelivered with backoff and everything that cannot be
//! processed ends up on the dead-letter topic.

pub mod classifier;
pub mod consumer;
pub mod error;
pub mod messages;
pub mod orchestrator;
pub mod publisher;
pub mod redelivery;
pub mod retry;
pub mod services;
pub mod state;
pub mod topics;

pub use classifier::FailureClass;
pub use consumer::{ConsumerHandle, DispatchConsumer};
pub use error::{DispatchError, Result};
pub use messages::{
    DispatchCompleted, DispatchPreparing, LifecycleEvent, OrderCreated, OrderDispatched,
};
pub use orchestrator::{DispatchOrchestrator, DispatchOutcome, DispatchSettings};
pub use publisher::EventPublisher;
pub use redelivery::{Delivery, Disposition, RedeliveryController};
pub use retry::{RetryDecision, RetryPolicy};
pub use services::{HttpStockClient, InMemoryStockService, StockError, StockService};
pub use state::DeliveryState;
pub use topics::Topics;
