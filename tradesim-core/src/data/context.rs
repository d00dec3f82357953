//! Caller-owned load context shared by network providers.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use super::circuit_breaker::CircuitBreaker;

/// Enforces a minimum spacing between consecutive provider requests.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// No spacing at all.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request may be issued, then claim the slot.
    ///
    /// Concurrent callers queue on the lock, so slots are handed out in
    /// order and never closer than `min_interval` apart.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                tracing::debug!(
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "rate limiter delaying request"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Rate limiter and circuit breaker for one loading session.
///
/// The caller creates the context, shares it by reference across loads, and
/// drops it when done. Nothing here is process-global.
#[derive(Debug)]
pub struct LoadContext {
    pub rate_limiter: RateLimiter,
    pub circuit_breaker: CircuitBreaker,
}

impl LoadContext {
    pub fn new(rate_limiter: RateLimiter, circuit_breaker: CircuitBreaker) -> Self {
        Self {
            rate_limiter,
            circuit_breaker,
        }
    }

    /// Context suited to a public HTTP API: 500ms spacing, default breaker.
    pub fn for_network() -> Self {
        Self::new(
            RateLimiter::new(Duration::from_millis(500)),
            CircuitBreaker::default_provider(),
        )
    }
}

impl Default for LoadContext {
    fn default() -> Self {
        Self::new(RateLimiter::unlimited(), CircuitBreaker::default_provider())
    }
}
