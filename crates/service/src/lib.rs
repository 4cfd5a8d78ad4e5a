//! Order dispatch service.
//!
//! Wires the dispatch core to an in-process broker and exposes an HTTP
//! surface for health, Prometheus metrics and order intake, with
//! structured logging (tracing) throughout.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::ProcessorId;
use dispatch::Topics;
use messaging::Publisher;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<P: Publisher + 'static>(
    state: Arc<AppState<P>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<P>))
        .route("/orders", post(routes::orders::submit::<P>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the shared application state for a publisher.
pub fn create_state<P: Publisher>(
    publisher: P,
    topics: Topics,
    processor_id: ProcessorId,
) -> Arc<AppState<P>> {
    Arc::new(AppState {
        publisher,
        topics,
        processor_id,
    })
}
