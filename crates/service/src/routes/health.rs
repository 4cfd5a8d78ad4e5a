//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use messaging::Publisher;
use serde::Serialize;

use super::orders::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub processor_id: String,
}

/// GET /health: reports liveness and the identity stamped on dispatched orders.
pub async fn check<P: Publisher + 'static>(
    State(state): State<Arc<AppState<P>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        processor_id: state.processor_id.to_string(),
    })
}
