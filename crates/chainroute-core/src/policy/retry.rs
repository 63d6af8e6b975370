//! Exponential backoff retry policy with full jitter, plus `Retry-After` parsing.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first try).
    pub max_retries: u32,
    /// Backoff base; retry `n` (0-based) is capped at `base_delay * 2^n`.
    pub base_delay: Duration,
    /// Maximum backoff delay (caps exponential growth).
    pub max_delay: Duration,
    /// Draw the delay uniformly from `[0, cap]`. When `false` the cap itself is used.
    pub full_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            full_jitter: true,
        }
    }
}

/// Stateless retry policy — computes the next delay given the retry index.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Upper bound of the delay before retry `attempt` (0-based):
    /// `min(base * 2^attempt, max)`.
    pub fn backoff_cap(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.config
            .base_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }

    /// Delay before retry `attempt` (0-based): `random(0, cap)` with full jitter.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let cap = self.backoff_cap(attempt);
        if !self.config.full_jitter || cap.is_zero() {
            return cap;
        }
        let cap_ms = cap.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(0..=cap_ms))
    }

    /// Returns `true` if another try is allowed after `retries_done` retries.
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.config.max_retries
    }
}

/// Parse a `Retry-After` header value: either delta-seconds or an HTTP-date.
///
/// Dates in the past yield `Duration::ZERO`. Unparseable values yield `None`.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy(max_retries: u32, base_ms: u64, max_ms: u64, jitter: bool) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            full_jitter: jitter,
        })
    }

    #[test]
    fn cap_doubles_per_attempt() {
        let p = policy(3, 100, 30_000, false);
        assert_eq!(p.next_delay(0).as_millis(), 100);
        assert_eq!(p.next_delay(1).as_millis(), 200);
        assert_eq!(p.next_delay(2).as_millis(), 400);
    }

    #[test]
    fn delay_capped_at_max() {
        let p = policy(10, 100, 500, false);
        assert_eq!(p.next_delay(5), Duration::from_millis(500));
        assert_eq!(p.backoff_cap(40), Duration::from_millis(500));
    }

    #[test]
    fn jittered_delay_within_cap() {
        let p = policy(5, 100, 1_000, true);
        for attempt in 0..5 {
            let cap = p.backoff_cap(attempt);
            for _ in 0..50 {
                assert!(p.next_delay(attempt) <= cap);
            }
        }
    }

    #[test]
    fn should_retry_boundary() {
        let p = policy(2, 1, 1, false);
        assert!(p.should_retry(0));
        assert!(p.should_retry(1));
        assert!(!p.should_retry(2));
    }

    #[test]
    fn retry_after_seconds() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("3", now), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(" 0 ", now), Some(Duration::ZERO));
    }

    #[test]
    fn retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        let d = parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now);
        assert_eq!(d, Some(Duration::from_secs(60)));

        let past = parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now);
        assert_eq!(past, Some(Duration::ZERO));
    }

    #[test]
    fn retry_after_garbage() {
        assert_eq!(parse_retry_after("soon", Utc::now()), None);
    }
}
