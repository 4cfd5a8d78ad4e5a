//! Stock availability trait and in-memory implementation.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by a stock availability lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    /// The stock service could not be reached.
    #[error("Stock service unreachable: {0}")]
    Connection(String),

    /// No response arrived within the allowed time.
    #[error("Stock service timed out after {0:?}")]
    Timeout(Duration),

    /// The stock service answered with a non-200 status.
    #[error("Stock service responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request could not be built or the response could not be used.
    #[error("Stock client error: {0}")]
    Client(String),
}

/// Availability lookup used by the orchestrator.
///
/// Returns the raw response body. Only the exact body `true` means the
/// item is available, see [`is_available`].
#[async_trait]
pub trait StockService: Send + Sync {
    /// Looks up whether `item` can be dispatched.
    async fn check_availability(&self, item: &str) -> Result<String, StockError>;
}

/// Interprets an availability response body.
///
/// Anything other than the literal `true` is unavailable, including
/// `TRUE`, `"true"` with surrounding whitespace and malformed bodies.
pub fn is_available(body: &str) -> bool {
    body == "true"
}

#[derive(Debug)]
struct InMemoryStockState {
    scripted: VecDeque<Result<String, StockError>>,
    default_response: Result<String, StockError>,
    delay: Option<Duration>,
    calls: Vec<String>,
}

impl Default for InMemoryStockState {
    fn default() -> Self {
        Self {
            scripted: VecDeque::new(),
            default_response: Ok("true".to_string()),
            delay: None,
            calls: Vec::new(),
        }
    }
}

/// In-memory stock service for testing.
///
/// Answers scripted responses in order, then falls back to a default
/// response (`"true"` unless configured otherwise).
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockService {
    state: Arc<RwLock<InMemoryStockState>>,
}

impl InMemoryStockService {
    /// Creates a service that reports every item as available.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the response returned once all scripted responses are used up.
    pub fn set_default_response(&self, response: Result<String, StockError>) {
        self.state.write().unwrap().default_response = response;
    }

    /// Queues a response for the next unanswered call.
    pub fn push_response(&self, response: Result<String, StockError>) {
        self.state.write().unwrap().scripted.push_back(response);
    }

    /// Makes every call wait before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.state.write().unwrap().delay = Some(delay);
    }

    /// Returns the number of availability checks made so far.
    pub fn call_count(&self) -> usize {
        self.state.read().unwrap().calls.len()
    }

    /// Returns the items checked so far, in call order.
    pub fn checked_items(&self) -> Vec<String> {
        self.state.read().unwrap().calls.clone()
    }
}

#[async_trait]
impl StockService for InMemoryStockService {
    async fn check_availability(&self, item: &str) -> Result<String, StockError> {
        let (response, delay) = {
            let mut state = self.state.write().unwrap();
            state.calls.push(item.to_string());
            let response = match state.scripted.pop_front() {
                Some(response) => response,
                None => state.default_response.clone(),
            };
            (response, state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        response
    }
}
