//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use dispatch::{DispatchSettings, RetryPolicy, Topics};

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `STOCK_SERVICE_ENDPOINT`: availability endpoint
///   (default: `"http://localhost:9001/api/stock"`)
/// - `ORDER_CREATED_TOPIC`, `DISPATCH_TRACKING_TOPIC`,
///   `ORDER_DISPATCHED_TOPIC`, `DEAD_LETTER_TOPIC`: topic overrides
/// - `MAX_ATTEMPTS` (default: `3`), `BACKOFF_INITIAL_MS` (`100`),
///   `BACKOFF_MULTIPLIER` (`2.0`), `BACKOFF_MAX_MS` (`10000`)
/// - `AVAILABILITY_TIMEOUT_MS`, `PUBLISH_TIMEOUT_MS` (default: `5000`)
/// - `PARTITIONS`: inbound partition count (default: `3`)
/// - `BROKER_RETENTION`: records kept per topic by the in-process broker
///   (default: `10000`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub stock_endpoint: String,
    pub topics: Topics,
    pub max_attempts: u32,
    pub backoff_initial: Duration,
    pub backoff_multiplier: f64,
    pub backoff_max: Duration,
    pub availability_timeout: Duration,
    pub publish_timeout: Duration,
    pub partitions: u32,
    pub broker_retention: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());
        let millis = |name: &str, default: Duration| {
            parsed(name).map(Duration::from_millis).unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(lookup("PORT"), defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            stock_endpoint: lookup("STOCK_SERVICE_ENDPOINT").unwrap_or(defaults.stock_endpoint),
            topics: Topics {
                order_created: lookup("ORDER_CREATED_TOPIC")
                    .unwrap_or(defaults.topics.order_created),
                tracking: lookup("DISPATCH_TRACKING_TOPIC").unwrap_or(defaults.topics.tracking),
                dispatched: lookup("ORDER_DISPATCHED_TOPIC").unwrap_or(defaults.topics.dispatched),
                dead_letter: lookup("DEAD_LETTER_TOPIC").unwrap_or(defaults.topics.dead_letter),
            },
            max_attempts: parse_or(lookup("MAX_ATTEMPTS"), defaults.max_attempts).max(1),
            backoff_initial: millis("BACKOFF_INITIAL_MS", defaults.backoff_initial),
            backoff_multiplier: parse_or(lookup("BACKOFF_MULTIPLIER"), defaults.backoff_multiplier),
            backoff_max: millis("BACKOFF_MAX_MS", defaults.backoff_max),
            availability_timeout: millis("AVAILABILITY_TIMEOUT_MS", defaults.availability_timeout),
            publish_timeout: millis("PUBLISH_TIMEOUT_MS", defaults.publish_timeout),
            partitions: parse_or(lookup("PARTITIONS"), defaults.partitions).max(1),
            broker_retention: parse_or(lookup("BROKER_RETENTION"), defaults.broker_retention)
                .max(1),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the orchestrator settings derived from this configuration.
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            topics: self.topics.clone(),
            availability_timeout: self.availability_timeout,
            publish_timeout: self.publish_timeout,
        }
    }

    /// Returns the redelivery policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: self.backoff_initial,
            multiplier: self.backoff_multiplier,
            max_delay: self.backoff_max,
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        let settings = DispatchSettings::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            stock_endpoint: "http://localhost:9001/api/stock".to_string(),
            topics: settings.topics,
            max_attempts: policy.max_attempts,
            backoff_initial: policy.initial_delay,
            backoff_multiplier: policy.multiplier,
            backoff_max: policy.max_delay,
            availability_timeout: settings.availability_timeout,
            publish_timeout: settings.publish_timeout,
            partitions: 3,
            broker_retention: 10_000,
        }
    }
}
