//! Topic names used by the dispatch flow.

/// Inbound topic carrying `OrderCreated` records.
pub const ORDER_CREATED: &str = "order.created";

/// Topic for `DispatchPreparing` and `DispatchCompleted`.
pub const DISPATCH_TRACKING: &str = "dispatch.tracking";

/// Topic for `OrderDispatched`.
pub const ORDER_DISPATCHED: &str = "order.dispatched";

/// Dead-letter topic for inbound records that could not be processed.
pub const ORDER_CREATED_DLT: &str = "order.created.DLT";

/// Topic names injected into the orchestrator and redelivery controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub order_created: String,
    pub tracking: String,
    pub dispatched: String,
    pub dead_letter: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            order_created: ORDER_CREATED.to_string(),
            tracking: DISPATCH_TRACKING.to_string(),
            dispatched: ORDER_DISPATCHED.to_string(),
            dead_letter: ORDER_CREATED_DLT.to_string(),
        }
    }
}
