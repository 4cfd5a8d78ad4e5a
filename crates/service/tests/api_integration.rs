//! Integration tests for the service HTTP surface.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::ProcessorId;
use dispatch::Topics;
use messaging::{InMemoryBroker, PublishError};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, InMemoryBroker, ProcessorId) {
    let broker = InMemoryBroker::new(3);
    let processor_id = ProcessorId::generate();
    let state = service::create_state(broker.clone(), Topics::default(), processor_id);
    let app = service::create_app(state, get_metrics_handle());
    (app, broker, processor_id)
}

fn post_order(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, processor_id) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["processor_id"], processor_id.to_string());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_submit_order_publishes_order_created() {
    let (app, broker, _) = setup();

    let response = app
        .oneshot(post_order(serde_json::json!({ "item": "my-item" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    let order_id = json["order_id"].as_str().unwrap().to_string();
    assert_eq!(json["key"], order_id);

    let published = broker.messages("order.created").await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].key, order_id);
    assert_eq!(published[0].message_type, "OrderCreated");
    assert_eq!(published[0].payload["orderId"], order_id);
    assert_eq!(published[0].payload["item"], "my-item");
}

#[tokio::test]
async fn test_submit_order_with_explicit_id_and_key() {
    let (app, broker, _) = setup();
    let order_id = uuid::Uuid::new_v4().to_string();

    let response = app
        .oneshot(post_order(serde_json::json!({
            "order_id": order_id,
            "item": "my-item",
            "key": "customer-42"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["order_id"], order_id);
    assert_eq!(json["key"], "customer-42");
    assert_eq!(json["partition"], broker.partition_for("customer-42"));

    let published = broker.messages_for_key("order.created", "customer-42").await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].payload["orderId"], order_id);
}

#[tokio::test]
async fn test_submit_order_with_empty_item() {
    let (app, broker, _) = setup();

    let response = app
        .oneshot(post_order(serde_json::json!({ "item": "  " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].as_str().is_some());
    assert_eq!(broker.message_count("order.created").await, 0);
}

#[tokio::test]
async fn test_submit_order_with_invalid_order_id() {
    let (app, _, _) = setup();

    let response = app
        .oneshot(post_order(serde_json::json!({
            "order_id": "not-a-uuid",
            "item": "my-item"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_order_when_broker_unavailable() {
    let (app, broker, _) = setup();
    broker
        .fail_next_publishes(
            "order.created",
            1,
            PublishError::Unavailable("connection reset".to_string()),
        )
        .await;

    let response = app
        .oneshot(post_order(serde_json::json!({ "item": "my-item" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(broker.message_count("order.created").await, 0);
}

#[tokio::test]
async fn test_submit_order_when_record_rejected() {
    let (app, broker, _) = setup();
    broker
        .fail_next_publishes(
            "order.created",
            1,
            PublishError::Rejected {
                topic: "order.created".to_string(),
                reason: "record too large".to_string(),
            },
        )
        .await;

    let response = app
        .oneshot(post_order(serde_json::json!({ "item": "my-item" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
