use std::time::Duration;

use crate::domain::order::OrderSettings;
use crate::utils::RetryConfig;

/// Runtime configuration, read from environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | REDIS_URL | unset | Catalog cache backend; unset keeps the cache in process |
/// | PAYMENT_GATEWAY_URL | unset | Payment provider base URL; unset uses the simulated provider |
/// | PAYMENT_DESCRIPTION | Takeout order | Charge description |
/// | PAYMENT_TIMEOUT_MS | 5000 | Per-request provider timeout |
/// | PAYMENT_RETRY_ATTEMPTS | 3 | Charge attempts, including the first |
/// | METRICS_PORT | 9090 | Port for /metrics and /health |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub redis_url: Option<String>,
    pub payment_gateway_url: Option<String>,
    pub payment_description: String,
    pub payment_timeout: Duration,
    pub payment_retry_attempts: u32,
    pub metrics_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            payment_gateway_url: None,
            payment_description: "Takeout order".to_string(),
            payment_timeout: Duration::from_millis(5000),
            payment_retry_attempts: 3,
            metrics_port: 9090,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Self {
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!(error = %e, "No .env file loaded");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            redis_url: non_empty("REDIS_URL"),
            payment_gateway_url: non_empty("PAYMENT_GATEWAY_URL"),
            payment_description: non_empty("PAYMENT_DESCRIPTION")
                .unwrap_or(defaults.payment_description),
            payment_timeout: non_empty("PAYMENT_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.payment_timeout),
            payment_retry_attempts: non_empty("PAYMENT_RETRY_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .filter(|attempts: &u32| *attempts > 0)
                .unwrap_or(defaults.payment_retry_attempts),
            metrics_port: non_empty("METRICS_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.metrics_port),
        }
    }

    pub fn order_settings(&self) -> OrderSettings {
        OrderSettings {
            payment_description: self.payment_description.clone(),
            charge_retry: RetryConfig::conservative().with_max_attempts(self.payment_retry_attempts),
        }
    }
}
