//! Message transport boundary for the order dispatch service.
//!
//! The dispatch core only needs two primitives from a broker: publish a
//! keyed record and wait for its acknowledgment, and receive records one
//! partition at a time. This crate defines those primitives and ships an
//! in-process broker that honours them.

pub mod error;
pub mod memory;
pub mod message;
pub mod publisher;

pub use error::{PublishError, Result};
pub use memory::InMemoryBroker;
pub use message::{Ack, Message, MessageId};
pub use publisher::Publisher;
