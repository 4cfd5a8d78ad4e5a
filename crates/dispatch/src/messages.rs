//! Inbound and lifecycle records.
//!
//! Field names are camelCase on the wire (`orderId`, `processedById`,
//! `dispatchedDate`) so other services can consume them unchanged.

use chrono::NaiveDate;
use common::{OrderId, ProcessorId};
use serde::{Deserialize, Serialize};

/// An order placed upstream, consumed from the inbound topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub item: String,
}

impl OrderCreated {
    /// Record type name used on the wire.
    pub const MESSAGE_TYPE: &'static str = "OrderCreated";

    pub fn new(order_id: OrderId, item: impl Into<String>) -> Self {
        Self {
            order_id,
            item: item.into(),
        }
    }
}

/// First lifecycle event: the order is about to be dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPreparing {
    pub order_id: OrderId,
}

/// Second lifecycle event: the order left the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDispatched {
    pub order_id: OrderId,
    /// The dispatch process that handled the order.
    pub processed_by_id: ProcessorId,
    pub note: String,
}

/// Third lifecycle event: dispatch is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchCompleted {
    pub order_id: OrderId,
    /// Calendar date of dispatch, serialized as `YYYY-MM-DD`.
    pub dispatched_date: NaiveDate,
}

/// One of the three ordered dispatch lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LifecycleEvent {
    Preparing(DispatchPreparing),
    Dispatched(OrderDispatched),
    Completed(DispatchCompleted),
}

impl LifecycleEvent {
    /// Builds the `DispatchPreparing` event for an order.
    pub fn preparing(order: &OrderCreated) -> Self {
        LifecycleEvent::Preparing(DispatchPreparing {
            order_id: order.order_id,
        })
    }

    /// Builds the `OrderDispatched` event for an order.
    pub fn dispatched(order: &OrderCreated, processed_by_id: ProcessorId) -> Self {
        LifecycleEvent::Dispatched(OrderDispatched {
            order_id: order.order_id,
            processed_by_id,
            note: format!("Dispatched: {}", order.item),
        })
    }

    /// Builds the `DispatchCompleted` event for an order.
    pub fn completed(order: &OrderCreated, dispatched_date: NaiveDate) -> Self {
        LifecycleEvent::Completed(DispatchCompleted {
            order_id: order.order_id,
            dispatched_date,
        })
    }

    /// Returns the record type name used on the wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::Preparing(_) => "DispatchPreparing",
            LifecycleEvent::Dispatched(_) => "OrderDispatched",
            LifecycleEvent::Completed(_) => "DispatchCompleted",
        }
    }

    /// Returns the order this event belongs to.
    pub fn order_id(&self) -> OrderId {
        match self {
            LifecycleEvent::Preparing(e) => e.order_id,
            LifecycleEvent::Dispatched(e) => e.order_id,
            LifecycleEvent::Completed(e) => e.order_id,
        }
    }
}
