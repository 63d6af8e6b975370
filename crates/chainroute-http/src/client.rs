//! HTTP transport backed by `reqwest`.
//!
//! The transport only moves bytes: any status code is returned as a response
//! and only connection-level failures become errors. Retry, rate limiting and
//! circuit breaking live in [`chainroute_core::RateLimitedClient`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use chainroute_core::error::TransportError;
use chainroute_core::request::{HttpMethod, HttpRequest, HttpResponse};
use chainroute_core::transport::HttpTransport;

/// Configuration for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub connect_timeout: Duration,
    /// Hard ceiling per exchange; the client applies its own, usually shorter, attempt timeout.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("chainroute/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub struct ReqwestTransport {
    http: reqwest::Client,
    request_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            request_timeout: config.request_timeout,
        })
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Result<Self, TransportError> {
        Self::new(HttpTransportConfig::default())
    }

    fn map_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match req.method {
            HttpMethod::Get => self.http.get(&req.url),
            HttpMethod::Post => self.http.post(&req.url),
        };
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        for (key, value) in &req.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        tracing::trace!(method = %req.method, url = %req.url, "sending request");
        let resp = builder.send().await.map_err(|e| self.map_error(e))?;

        let status = resp.status().as_u16();
        let headers: HashMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp.text().await.map_err(|e| self.map_error(e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn name(&self) -> &str {
        "reqwest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        let t = ReqwestTransport::with_defaults().unwrap();
        assert_eq!(t.name(), "reqwest");
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let t = ReqwestTransport::new(HttpTransportConfig {
            connect_timeout: Duration::from_millis(500),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();
        let err = t
            .execute(HttpRequest::get("http://127.0.0.1:1/fee_stats"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, TransportError::Network(_) | TransportError::Timeout { .. }),
            "unexpected error: {err:?}"
        );
        assert!(err.is_retryable());
    }
}
