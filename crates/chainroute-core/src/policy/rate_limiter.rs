//! Token bucket rate limiter.
//!
//! Tokens accrue continuously at `refill_rate` tokens/second up to `capacity`.
//! Refill is computed lazily from the elapsed time on each call; there is no
//! background timer. Each request consumes one token.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Token bucket configuration.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum tokens in the bucket (burst size).
    pub capacity: f64,
    /// Token refill rate (tokens per second).
    pub refill_rate: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 10.0,
            refill_rate: 10.0,
        }
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Thread-safe token bucket. Starts full.
pub struct TokenBucket {
    config: RateLimiterConfig,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: config.capacity,
                last_refill: Instant::now(),
            }),
            config,
        }
    }

    /// Take one token.
    ///
    /// Returns `Duration::ZERO` if a token was available and consumed.
    /// Otherwise returns how long until one token will be available; in that
    /// case nothing is consumed and the caller decides whether to wait.
    /// An empty bucket with a zero refill rate returns `Duration::MAX`.
    pub fn consume(&self) -> Duration {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Duration::ZERO;
        }
        if self.config.refill_rate <= 0.0 {
            return Duration::MAX;
        }
        let deficit = 1.0 - state.tokens;
        let wait_ms = (deficit * 1000.0 / self.config.refill_rate).ceil();
        Duration::from_millis(wait_ms as u64)
    }

    /// Returns currently available tokens.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        state.tokens
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let new_tokens = elapsed * self.config.refill_rate;
        state.tokens = (state.tokens + new_tokens).min(self.config.capacity);
        state.last_refill = now;
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("capacity", &self.config.capacity)
            .field("refill_rate", &self.config.refill_rate)
            .field("available", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(capacity: f64, refill_rate: f64) -> TokenBucket {
        TokenBucket::new(RateLimiterConfig {
            capacity,
            refill_rate,
        })
    }

    #[test]
    fn burst_then_wait_then_refill() {
        let b = bucket(5.0, 5.0);
        for i in 0..5 {
            assert_eq!(b.consume(), Duration::ZERO, "consume #{i} should be free");
        }
        let wait = b.consume();
        assert!(wait > Duration::ZERO, "6th consume should wait");
        assert!(wait <= Duration::from_millis(200), "unexpected wait: {wait:?}");

        std::thread::sleep(wait);
        assert_eq!(b.consume(), Duration::ZERO);
    }

    #[test]
    fn waiting_does_not_consume() {
        let b = bucket(1.0, 0.0001);
        assert_eq!(b.consume(), Duration::ZERO);
        let before = b.available();
        assert!(b.consume() > Duration::ZERO);
        assert!(b.available() >= before);
    }

    #[test]
    fn refill_is_capped_at_capacity() {
        let b = bucket(2.0, 1000.0);
        std::thread::sleep(Duration::from_millis(20));
        assert!(b.available() <= 2.0);
    }

    #[test]
    fn zero_refill_rate_never_frees_tokens() {
        let b = bucket(1.0, 0.0);
        assert_eq!(b.consume(), Duration::ZERO);
        assert_eq!(b.consume(), Duration::MAX);
    }
}
