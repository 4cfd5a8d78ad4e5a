//! Stock service port and its adapters.

pub mod http;
pub mod stock;

pub use http::HttpStockClient;
pub use stock::{InMemoryStockService, StockError, StockService, is_available};
