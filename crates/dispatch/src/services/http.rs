//! HTTP adapter for the stock service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::services::stock::{StockError, StockService};

/// Stock service client speaking `GET {endpoint}?item={item}`.
///
/// A 200 response yields its body as-is; any other status becomes
/// [`StockError::Status`]. Each request is bounded by the configured
/// timeout.
#[derive(Debug, Clone)]
pub struct HttpStockClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpStockClient {
    /// Creates a client for the given endpoint URL.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, StockError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StockError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> StockError {
        if err.is_timeout() {
            StockError::Timeout(self.timeout)
        } else if err.is_connect() || err.is_request() || err.is_body() {
            StockError::Connection(err.to_string())
        } else {
            StockError::Client(err.to_string())
        }
    }
}

#[async_trait]
impl StockService for HttpStockClient {
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn check_availability(&self, item: &str) -> Result<String, StockError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("item", item)])
            .send()
            .await
            .map_err(|e| {
                let err = self.map_transport_error(e);
                tracing::error!(error = %err, "stock service request failed");
                err
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if status != StatusCode::OK {
            if status.is_server_error() {
                tracing::error!(status = status.as_u16(), "stock service server error");
            } else {
                tracing::warn!(status = status.as_u16(), "stock service rejected request");
            }
            return Err(StockError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}
