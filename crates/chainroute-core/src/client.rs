//! Rate-limited, circuit-guarded HTTP client with retry and backoff.
//!
//! One logical request goes through:
//! 1. the group's circuit breaker (fail fast with `CircuitOpen`, no I/O)
//! 2. the group's token bucket (wait until a token is free)
//! 3. the shared [`RequestQueue`] (unless `bypass_queue`)
//! 4. up to `max_retries + 1` sequential attempts, each under its own timeout

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{is_retryable_status, TransportError};
use crate::metrics::{ClientMetrics, ClientMetricsSnapshot};
use crate::policy::{parse_retry_after, RequestQueue, RetryConfig, RetryPolicy, DEFAULT_MAX_CONCURRENCY};
use crate::registry::PolicyRegistry;
use crate::request::{HttpRequest, HttpResponse};
use crate::transport::HttpTransport;

/// Configuration for [`RateLimitedClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub retry: RetryConfig,
    /// Timeout for a single attempt; a timed-out attempt may be retried.
    pub request_timeout: Duration,
    /// Global cap on in-flight upstream calls.
    pub max_concurrency: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(10),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Rate-limit / circuit domain, e.g. `"quotes"` or a provider name.
    pub group: String,
    /// Overrides `RetryConfig::max_retries` for this call.
    pub max_retries: Option<u32>,
    /// Skip the shared queue (privileged calls).
    pub bypass_queue: bool,
}

impl RequestOptions {
    pub fn group(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            max_retries: None,
            bypass_queue: false,
        }
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    pub fn bypass_queue(mut self) -> Self {
        self.bypass_queue = true;
        self
    }
}

pub struct RateLimitedClient {
    transport: Arc<dyn HttpTransport>,
    registry: Arc<PolicyRegistry>,
    queue: RequestQueue,
    retry: RetryPolicy,
    request_timeout: Duration,
    metrics: ClientMetrics,
}

impl RateLimitedClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        registry: Arc<PolicyRegistry>,
        config: ClientConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            queue: RequestQueue::new(config.max_concurrency),
            retry: RetryPolicy::new(config.retry),
            request_timeout: config.request_timeout,
            metrics: ClientMetrics::new(),
        }
    }

    /// Share an existing queue so several clients respect one global cap.
    pub fn with_queue(mut self, queue: RequestQueue) -> Self {
        self.queue = queue;
        self
    }

    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn metrics(&self) -> ClientMetricsSnapshot {
        self.metrics
            .snapshot(self.queue.in_flight(), self.queue.waiting())
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Execute one logical request under the group's policies.
    pub async fn request(
        &self,
        req: HttpRequest,
        opts: &RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        self.metrics.record_request();
        let policy = self.registry.group(&opts.group);

        if !policy.circuit.can_request() {
            self.metrics.record_failure();
            tracing::debug!(group = %opts.group, url = %req.url, "circuit open — failing fast");
            return Err(TransportError::CircuitOpen {
                group: opts.group.clone(),
            });
        }

        loop {
            let wait = policy.bucket.consume();
            if wait.is_zero() {
                break;
            }
            self.metrics.record_rate_limit_hit();
            if wait == Duration::MAX {
                self.metrics.record_failure();
                tracing::warn!(group = %opts.group, url = %req.url, "bucket empty and never refills");
                return Err(TransportError::RateLimitExceeded {
                    group: opts.group.clone(),
                });
            }
            tracing::debug!(group = %opts.group, wait_ms = wait.as_millis() as u64, "rate limited — waiting for token");
            tokio::time::sleep(wait).await;
        }

        let _permit = if opts.bypass_queue {
            None
        } else {
            Some(self.queue.admit().await?)
        };

        let max_retries = opts.max_retries.unwrap_or(self.retry.config.max_retries);
        let mut retries = 0u32;
        loop {
            let (err, retryable, retry_after) = match self.attempt(&req).await {
                Ok(resp) if resp.is_success() => {
                    policy.circuit.on_success();
                    self.metrics.record_success();
                    return Ok(resp);
                }
                Ok(resp) => self.classify_status(resp, &opts.group),
                Err(e) => {
                    let retryable = e.is_retryable();
                    (e, retryable, None)
                }
            };

            if !retryable || retries >= max_retries {
                policy.circuit.on_failure();
                self.metrics.record_failure();
                if retryable {
                    tracing::error!(
                        attempts = retries + 1,
                        error = %err,
                        group = %opts.group,
                        url = %req.url,
                        "max retries exceeded"
                    );
                } else {
                    tracing::warn!(error = %err, group = %opts.group, url = %req.url, "non-retryable failure");
                }
                return Err(err);
            }

            let delay = retry_after.unwrap_or_else(|| self.retry.next_delay(retries));
            retries += 1;
            self.metrics.record_retry();
            tracing::warn!(
                attempt = retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                group = %opts.group,
                url = %req.url,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// GET/POST and decode a JSON body.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        req: HttpRequest,
        opts: &RequestOptions,
    ) -> Result<T, TransportError> {
        self.request(req, opts).await?.json()
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: impl Into<String>,
        opts: &RequestOptions,
    ) -> Result<T, TransportError> {
        self.request_json(HttpRequest::get(url), opts).await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: impl Into<String>,
        body: &B,
        opts: &RequestOptions,
    ) -> Result<T, TransportError> {
        self.request_json(HttpRequest::post(url).json(body)?, opts).await
    }

    async fn attempt(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError> {
        match tokio::time::timeout(self.request_timeout, self.transport.execute(req.clone())).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }

    /// Map a non-2xx response to an error, whether it may be retried, and
    /// the server-requested delay if any.
    fn classify_status(
        &self,
        resp: HttpResponse,
        group: &str,
    ) -> (TransportError, bool, Option<Duration>) {
        let status = resp.status;
        if status == 429 {
            self.metrics.record_rate_limit_hit();
            let retry_after = resp
                .header("retry-after")
                .and_then(|v| parse_retry_after(v, Utc::now()));
            let err = TransportError::RateLimitExceeded {
                group: group.to_string(),
            };
            return (err, true, retry_after);
        }
        let err = TransportError::Http {
            status,
            body: resp.body,
        };
        (err, is_retryable_status(status), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{CircuitBreakerConfig, CircuitState, RateLimiterConfig};
    use crate::registry::RegistryConfig;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed script of outcomes, then repeats the last one.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
            Self::slow(script, Duration::ZERO)
        }

        fn slow(script: Vec<Result<HttpResponse, TransportError>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn execute(&self, _req: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().map(|r| match r {
                    Ok(resp) => Ok(resp.clone()),
                    Err(e) => Err(TransportError::Network(e.to_string())),
                })
            };
            next.unwrap_or_else(|| Err(TransportError::Other("empty script".into())))
        }
    }

    fn fast_config() -> ClientConfig {
        ClientConfig {
            retry: RetryConfig {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                full_jitter: true,
            },
            request_timeout: Duration::from_millis(200),
            max_concurrency: 10,
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> RateLimitedClient {
        RateLimitedClient::new(transport, Arc::new(PolicyRegistry::default()), fast_config())
    }

    fn ok() -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse::new(200, r#"{"ok":true}"#))
    }

    fn status(code: u16) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse::new(code, "upstream says no"))
    }

    #[tokio::test]
    async fn not_found_fails_after_one_attempt() {
        let t = ScriptedTransport::new(vec![status(404)]);
        let c = client(t.clone());
        let err = c
            .request(HttpRequest::get("https://x/quote"), &RequestOptions::group("quotes"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "HTTP_404");
        assert_eq!(t.calls(), 1);
        let m = c.metrics();
        assert_eq!(m.retried_requests, 0);
        assert_eq!(m.failed_requests, 1);
    }

    #[tokio::test]
    async fn two_503_then_ok_retries_twice() {
        let t = ScriptedTransport::new(vec![status(503), status(503), ok()]);
        let c = client(t.clone());
        let resp = c
            .request(HttpRequest::get("https://x/quote"), &RequestOptions::group("quotes"))
            .await
            .unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(t.calls(), 3);
        let m = c.metrics();
        assert_eq!(m.retried_requests, 2);
        assert_eq!(m.successful_requests, 1);
        assert_eq!(m.total_requests, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        let t = ScriptedTransport::new(vec![status(502)]);
        let c = client(t.clone());
        let err = c
            .request(
                HttpRequest::get("https://x/quote"),
                &RequestOptions::group("quotes").max_retries(2),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "HTTP_502");
        assert_eq!(t.calls(), 3);
    }

    #[tokio::test]
    async fn exhausted_429_is_rate_limit_exceeded() {
        let t = ScriptedTransport::new(vec![Ok(
            HttpResponse::new(429, "slow down").with_header("Retry-After", "0"),
        )]);
        let c = client(t.clone());
        let err = c
            .request(
                HttpRequest::get("https://x/fees"),
                &RequestOptions::group("fees").max_retries(1),
            )
            .await
            .unwrap_err();

        assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
        assert_eq!(t.calls(), 2);
        assert!(c.metrics().rate_limit_hits >= 2);
    }

    #[tokio::test]
    async fn network_errors_are_retried() {
        let t = ScriptedTransport::new(vec![
            Err(TransportError::Network("connection reset".into())),
            ok(),
        ]);
        let c = client(t.clone());
        let resp = c
            .request(HttpRequest::get("https://x"), &RequestOptions::group("quotes"))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(c.metrics().retried_requests, 1);
    }

    #[tokio::test]
    async fn slow_attempt_times_out_and_is_retried() {
        let t = ScriptedTransport::slow(vec![ok()], Duration::from_millis(500));
        let c = client(t.clone());
        let err = c
            .request(
                HttpRequest::get("https://x"),
                &RequestOptions::group("quotes").max_retries(1),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
        assert_eq!(t.calls(), 2);
    }

    #[tokio::test]
    async fn open_circuit_fails_fast_without_io() {
        let t = ScriptedTransport::new(vec![status(404)]);
        let mut config = RegistryConfig::default();
        config.circuit_breaker = CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 1,
        };
        let registry = Arc::new(PolicyRegistry::new(config));
        let c = RateLimitedClient::new(t.clone(), registry.clone(), fast_config());
        let opts = RequestOptions::group("hop");

        let _ = c.request(HttpRequest::get("https://x"), &opts).await;
        assert_eq!(registry.group("hop").circuit.state(), CircuitState::Open);

        let err = c.request(HttpRequest::get("https://x"), &opts).await.unwrap_err();
        assert_eq!(err.code(), "CIRCUIT_OPEN");
        assert_eq!(t.calls(), 1);
    }

    #[tokio::test]
    async fn empty_bucket_delays_request() {
        let t = ScriptedTransport::new(vec![ok()]);
        let mut config = RegistryConfig::default();
        config.rate_limiter = RateLimiterConfig {
            capacity: 1.0,
            refill_rate: 20.0,
        };
        let c = RateLimitedClient::new(t.clone(), Arc::new(PolicyRegistry::new(config)), fast_config());
        let opts = RequestOptions::group("quotes");

        let start = std::time::Instant::now();
        c.request(HttpRequest::get("https://x"), &opts).await.unwrap();
        c.request(HttpRequest::get("https://x"), &opts).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(c.metrics().rate_limit_hits, 1);
    }

    #[tokio::test]
    async fn exhausted_bucket_without_refill_fails_fast() {
        let t = ScriptedTransport::new(vec![ok()]);
        let mut config = RegistryConfig::default();
        config.rate_limiter = RateLimiterConfig {
            capacity: 1.0,
            refill_rate: 0.0,
        };
        let c = RateLimitedClient::new(t.clone(), Arc::new(PolicyRegistry::new(config)), fast_config());
        let opts = RequestOptions::group("quotes");

        c.request(HttpRequest::get("https://x"), &opts).await.unwrap();
        let err = tokio::time::timeout(
            Duration::from_secs(1),
            c.request(HttpRequest::get("https://x"), &opts),
        )
        .await
        .expect("request must not wait forever")
        .unwrap_err();

        assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
        assert_eq!(t.calls(), 1);
        assert_eq!(c.metrics().failed_requests, 1);
    }

    #[tokio::test]
    async fn retry_after_seconds_overrides_backoff() {
        let t = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(429, "slow down").with_header("Retry-After", "1")),
            ok(),
        ]);
        let c = client(t.clone());

        let start = std::time::Instant::now();
        let resp = c
            .request(HttpRequest::get("https://x/fees"), &RequestOptions::group("fees"))
            .await
            .unwrap();

        // fast_config caps jittered backoff at 5ms
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(resp.status, 200);
        assert_eq!(t.calls(), 2);
        assert_eq!(c.metrics().retried_requests, 1);
    }

    #[tokio::test]
    async fn retry_after_http_date_overrides_backoff() {
        let at = Utc::now() + chrono::Duration::seconds(2);
        let header = at.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let t = ScriptedTransport::new(vec![
            Ok(HttpResponse::new(429, "slow down").with_header("Retry-After", header.as_str())),
            ok(),
        ]);
        let c = client(t.clone());

        let start = std::time::Instant::now();
        c.request(HttpRequest::get("https://x/fees"), &RequestOptions::group("fees"))
            .await
            .unwrap();

        // The date has whole-second precision, so at least one second remains.
        assert!(start.elapsed() >= Duration::from_millis(900));
        assert_eq!(t.calls(), 2);
    }

    #[tokio::test]
    async fn bypass_queue_skips_admission() {
        let t = ScriptedTransport::new(vec![ok()]);
        let c = RateLimitedClient::new(
            t,
            Arc::new(PolicyRegistry::default()),
            ClientConfig {
                max_concurrency: 1,
                ..fast_config()
            },
        );
        let _held = c.queue().admit().await.unwrap();
        let resp = c
            .request(HttpRequest::get("https://x"), &RequestOptions::group("admin").bypass_queue())
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn request_json_decodes_body() {
        #[derive(serde::Deserialize)]
        struct Body {
            ok: bool,
        }
        let c = client(ScriptedTransport::new(vec![ok()]));
        let body: Body = c
            .request_json(HttpRequest::get("https://x"), &RequestOptions::group("quotes"))
            .await
            .unwrap();
        assert!(body.ok);
    }
}
