//! Shared identifier types for the order dispatch workspace.

pub mod types;

pub use types::{OrderId, ProcessorId};
