//! Inbound order intake.
//!
//! Stands in for the upstream producer: accepted orders are published as
//! `OrderCreated` records on the inbound topic, where the dispatch
//! consumer picks them up like any other record.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::{OrderId, ProcessorId};
use dispatch::{OrderCreated, Topics};
use messaging::{Message, PublishError, Publisher};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<P: Publisher> {
    pub publisher: P,
    pub topics: Topics,
    pub processor_id: ProcessorId,
}

#[derive(Deserialize)]
pub struct SubmitOrderRequest {
    pub order_id: Option<String>,
    pub item: String,
    pub key: Option<String>,
}

#[derive(Serialize)]
pub struct OrderAcceptedResponse {
    pub order_id: String,
    pub key: String,
    pub partition: u32,
    pub offset: u64,
}

/// POST /orders: publish an `OrderCreated` record for dispatch.
#[tracing::instrument(skip(state, req))]
pub async fn submit<P: Publisher + 'static>(
    State(state): State<Arc<AppState<P>>>,
    Json(req): Json<SubmitOrderRequest>,
) -> Result<(StatusCode, Json<OrderAcceptedResponse>), ApiError> {
    if req.item.trim().is_empty() {
        return Err(ApiError::BadRequest("item must not be empty".to_string()));
    }

    let order_id = match req.order_id.as_deref() {
        Some(id) => uuid::Uuid::parse_str(id)
            .map(OrderId::from_uuid)
            .map_err(|e| ApiError::BadRequest(format!("Invalid order_id: {e}")))?,
        None => OrderId::new(),
    };
    let key = req.key.unwrap_or_else(|| order_id.to_string());
    if key.is_empty() {
        return Err(ApiError::BadRequest("key must not be empty".to_string()));
    }

    let order = OrderCreated::new(order_id, req.item);
    let payload = serde_json::to_value(&order).map_err(PublishError::from)?;
    let message = Message::new(
        state.topics.order_created.as_str(),
        key.as_str(),
        OrderCreated::MESSAGE_TYPE,
        payload,
    );

    let ack = state.publisher.publish(message).await?;
    metrics::counter!("api_orders_submitted_total").increment(1);
    tracing::info!(%order_id, %key, partition = ack.partition, offset = ack.offset, "order submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(OrderAcceptedResponse {
            order_id: order_id.to_string(),
            key,
            partition: ack.partition,
            offset: ack.offset,
        }),
    ))
}
