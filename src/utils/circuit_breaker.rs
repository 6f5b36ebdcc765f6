use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Wraps calls to an external provider. Consecutive failures open the
// breaker; while open, calls are refused without touching the provider.
// Once the cool-down has passed, trial calls run half-open and either close
// the breaker again or send it straight back to open.
//
//   Closed --(failure_threshold failures)--> Open
//   Open   --(cool_down elapsed)-----------> HalfOpen
//   HalfOpen --(success_threshold ok)------> Closed
//   HalfOpen --(any failure)---------------> Open
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding (0=Closed, 1=Open, 2=HalfOpen)
    pub fn code(&self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker
    pub failure_threshold: u32,
    /// How long the breaker stays open before a trial call is let through
    pub cool_down: Duration,
    /// Half-open successes required to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker '{0}' is open")]
    CircuitOpen(&'static str),

    #[error(transparent)]
    OperationFailed(E),
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    trial_successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                trial_successes: 0,
                opened_at: None,
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run `operation` unless the breaker is open
    pub async fn call<Fut, T, E>(&self, operation: Fut) -> Result<T, CircuitBreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit().await?;

        let outcome = operation.await;
        let mut inner = self.inner.lock().await;
        match &outcome {
            Ok(_) => self.on_success(&mut inner),
            Err(_) => self.on_failure(&mut inner),
        }
        drop(inner);

        outcome.map_err(CircuitBreakerError::OperationFailed)
    }

    pub async fn get_state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    async fn admit<E>(&self) -> Result<(), CircuitBreakerError<E>> {
        let mut inner = self.inner.lock().await;
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let cooled_down = inner
            .opened_at
            .map_or(true, |opened| opened.elapsed() >= self.config.cool_down);
        if !cooled_down {
            return Err(CircuitBreakerError::CircuitOpen(self.name));
        }

        inner.trial_successes = 0;
        self.transition(&mut inner, CircuitState::HalfOpen);
        Ok(())
    }

    fn on_success(&self, inner: &mut Inner) {
        inner.consecutive_failures = 0;
        if inner.state == CircuitState::HalfOpen {
            inner.trial_successes += 1;
            if inner.trial_successes >= self.config.success_threshold {
                inner.opened_at = None;
                self.transition(inner, CircuitState::Closed);
            }
        }
    }

    fn on_failure(&self, inner: &mut Inner) {
        inner.consecutive_failures += 1;
        let trips = match inner.state {
            CircuitState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            // A call admitted just before another one tripped the breaker
            CircuitState::Open => false,
        };
        if trips {
            inner.opened_at = Some(Instant::now());
            self.transition(inner, CircuitState::Open);
        }
    }

    fn transition(&self, inner: &mut Inner, next: CircuitState) {
        let previous = inner.state;
        inner.state = next;
        match next {
            CircuitState::Open => tracing::warn!(
                breaker = self.name,
                from = ?previous,
                consecutive_failures = inner.consecutive_failures,
                "🔴 Circuit breaker opened"
            ),
            CircuitState::HalfOpen => tracing::info!(
                breaker = self.name,
                "🟡 Circuit breaker half-open, allowing trial calls"
            ),
            CircuitState::Closed => tracing::info!(
                breaker = self.name,
                "🟢 Circuit breaker closed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, cool_down_ms: u64, success_threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold,
                cool_down: Duration::from_millis(cool_down_ms),
                success_threshold,
            },
        )
    }

    async fn fail(cb: &CircuitBreaker) {
        let _ = cb.call(async { Err::<(), _>("provider down") }).await;
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures_and_fails_fast() {
        let cb = breaker(3, 60_000, 1);
        for _ in 0..3 {
            fail(&cb).await;
        }
        assert_eq!(cb.get_state().await, CircuitState::Open);

        let mut ran = false;
        let result = cb
            .call(async {
                ran = true;
                Ok::<_, &str>(())
            })
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen("test"))));
        assert!(!ran);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let cb = breaker(2, 60_000, 1);
        fail(&cb).await;
        cb.call(async { Ok::<_, &str>(()) }).await.unwrap();
        fail(&cb).await;
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_closes_after_trial_successes() {
        let cb = breaker(1, 50, 2);
        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        cb.call(async { Ok::<_, &str>(()) }).await.unwrap();
        assert_eq!(cb.get_state().await, CircuitState::HalfOpen);
        cb.call(async { Ok::<_, &str>(()) }).await.unwrap();
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(1, 50, 2);
        fail(&cb).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        fail(&cb).await;
        assert_eq!(cb.get_state().await, CircuitState::Open);
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(CircuitState::Closed.code(), 0);
        assert_eq!(CircuitState::Open.code(), 1);
        assert_eq!(CircuitState::HalfOpen.code(), 2);
    }
}
