//! Policy engine — composable guards for upstream reliability.
//!
//! The policy stack (applied in order by [`RateLimitedClient`](crate::client::RateLimitedClient)):
//! ```text
//! Request → [CircuitBreaker] → [TokenBucket] → [RequestQueue] → [RetryPolicy] → [Transport]
//! ```

pub mod circuit_breaker;
pub mod queue;
pub mod rate_limiter;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
pub use queue::{QueuePermit, RequestQueue, DEFAULT_MAX_CONCURRENCY};
pub use rate_limiter::{RateLimiterConfig, TokenBucket};
pub use retry::{parse_retry_after, RetryConfig, RetryPolicy};
