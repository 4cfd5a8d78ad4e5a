//! Dispatch service entry point.

use std::sync::Arc;

use common::ProcessorId;
use dispatch::{DispatchConsumer, DispatchOrchestrator, HttpStockClient, RedeliveryController};
use messaging::InMemoryBroker;
use service::config::Config;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Broker, availability client and process identity
    let broker = InMemoryBroker::with_retention(config.partitions, config.broker_retention);
    let stock = HttpStockClient::new(config.stock_endpoint.as_str(), config.availability_timeout)
        .expect("failed to build stock service client");
    let processor_id = ProcessorId::generate();
    tracing::info!(
        %processor_id,
        stock_endpoint = %config.stock_endpoint,
        partitions = config.partitions,
        retention = config.broker_retention,
        "dispatch service configured"
    );

    // 4. Start partition workers on the inbound topic
    let orchestrator = DispatchOrchestrator::new(
        stock,
        broker.clone(),
        processor_id,
        config.dispatch_settings(),
    );
    let controller = Arc::new(RedeliveryController::new(orchestrator, config.retry_policy()));
    let partitions = broker.subscribe(&config.topics.order_created).await;
    let consumer = DispatchConsumer::start(controller, partitions);

    // 5. Build the application
    let state = service::create_state(broker, config.topics.clone(), processor_id);
    let app = service::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting dispatch service");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Let in-flight records finish before exiting
    consumer.shutdown().await;
    tracing::info!("service shut down gracefully");
}
