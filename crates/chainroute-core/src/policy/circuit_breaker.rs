//! Three-state circuit breaker: Closed → Open → Half-Open.
//!
//! State transitions:
//! - `Closed` → `Open`:      consecutive failures reach `failure_threshold`
//! - `Open` → `Half-Open`:   `recovery_timeout` has elapsed (checked lazily in `can_request`)
//! - `Half-Open` → `Closed`: `success_threshold` probes succeed
//! - `Half-Open` → `Open`:   a probe fails
//!
//! What counts as a failure is decided by the caller.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// All requests rejected until `recovery_timeout` elapses.
    Open,
    /// Probe requests allowed to test upstream health.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for the circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening.
    pub failure_threshold: u32,
    /// How long to stay open before allowing probes.
    pub recovery_timeout: Duration,
    /// Number of successful half-open probes before closing.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

/// Point-in-time view of a breaker, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    /// Milliseconds since the breaker last tripped, if it is open or half-open.
    pub opened_ms_ago: Option<u64>,
}

struct CircuitInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

/// Thread-safe circuit breaker. All transitions happen under one mutex.
#[derive(Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<CircuitInner>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker in `Closed` state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CircuitInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if a request may go through.
    ///
    /// An open breaker whose recovery timeout has elapsed moves to half-open
    /// here. Half-open admits every concurrent caller, not a single probe:
    /// `success_threshold` successes close the breaker and any failure
    /// reopens it.
    pub fn can_request(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                    tracing::info!("Circuit breaker → half-open");
                }
                elapsed
            }
        }
    }

    /// Current state without triggering the open → half-open transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Consecutive failures recorded since the last success or reset.
    pub fn consecutive_failures(&self) -> u32 {
        self.lock().failure_count
    }

    /// Record a successful request.
    pub fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.opened_at = None;
                    tracing::info!("Circuit breaker → closed");
                }
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            // A request admitted before the trip finished late; ignore it.
            CircuitState::Open => {}
        }
    }

    /// Record a failed request.
    pub fn on_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(failures = inner.failure_count, "Circuit breaker → open");
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.failure_count += 1;
                inner.opened_at = Some(Instant::now());
                inner.success_count = 0;
                tracing::warn!("Circuit breaker probe failed → open");
            }
            CircuitState::Open => {
                inner.failure_count += 1;
            }
        }
    }

    /// Force the breaker back to `Closed` with counters cleared.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.opened_at = None;
        tracing::info!("Circuit breaker reset → closed");
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            state: inner.state,
            consecutive_failures: inner.failure_count,
            failure_threshold: self.config.failure_threshold,
            opened_ms_ago: inner.opened_at.map(|t| t.elapsed().as_millis() as u64),
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cb(threshold: u32, recovery: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            recovery_timeout: recovery,
            success_threshold: 1,
        })
    }

    #[test]
    fn starts_closed() {
        let c = cb(5, Duration::from_secs(60));
        assert_eq!(c.state(), CircuitState::Closed);
        assert!(c.can_request());
    }

    #[test]
    fn opens_after_threshold_failures() {
        let c = cb(3, Duration::from_secs(60));
        c.on_failure();
        assert_eq!(c.state(), CircuitState::Closed);
        c.on_failure();
        assert_eq!(c.state(), CircuitState::Closed);
        c.on_failure();
        assert_eq!(c.state(), CircuitState::Open);
        assert!(!c.can_request());
    }

    #[test]
    fn success_resets_failure_count() {
        let c = cb(3, Duration::from_secs(60));
        c.on_failure();
        c.on_failure();
        c.on_success();
        c.on_failure();
        c.on_failure();
        assert_eq!(c.state(), CircuitState::Closed);
        assert_eq!(c.consecutive_failures(), 2);
    }

    #[test]
    fn recovers_through_half_open() {
        let c = cb(3, Duration::from_millis(30));
        for _ in 0..3 {
            c.on_failure();
        }
        assert!(!c.can_request());

        std::thread::sleep(Duration::from_millis(40));
        assert!(c.can_request());
        assert_eq!(c.state(), CircuitState::HalfOpen);

        c.on_success();
        assert_eq!(c.state(), CircuitState::Closed);
        assert_eq!(c.consecutive_failures(), 0);
    }

    #[test]
    fn half_open_on_failure_reopens() {
        let c = cb(1, Duration::from_millis(10));
        c.on_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert!(c.can_request());

        c.on_failure();
        assert_eq!(c.state(), CircuitState::Open);
        assert!(!c.can_request(), "openedAt must be reset on reopen");
    }

    #[test]
    fn half_open_admits_concurrent_probes() {
        let c = cb(1, Duration::ZERO);
        c.on_failure();
        assert!(c.can_request());
        assert!(c.can_request());
    }

    #[test]
    fn reset_closes_and_clears() {
        let c = cb(1, Duration::from_secs(60));
        c.on_failure();
        assert_eq!(c.state(), CircuitState::Open);
        c.reset();
        let snap = c.snapshot();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.consecutive_failures, 0);
        assert!(snap.opened_ms_ago.is_none());
    }
}
