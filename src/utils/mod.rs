pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use retry::{retry_on_transient, IsTransient, RetryConfig, RetryResult};

use chrono::{Local, NaiveDateTime};

/// Wall-clock "now" in the restaurant's local time.
///
/// Order timestamps and report day boundaries are local calendar times.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
