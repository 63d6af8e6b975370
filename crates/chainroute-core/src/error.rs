//! Error types for the client and adapter layers.

use thiserror::Error;

/// Errors surfaced by [`RateLimitedClient`](crate::client::RateLimitedClient)
/// and by [`HttpTransport`](crate::transport::HttpTransport) implementations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, reset, TLS error, etc.
    #[error("network error: {0}")]
    Network(String),

    /// A single attempt exceeded its timeout.
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Upstream answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The group's circuit breaker is open; no I/O was attempted.
    #[error("circuit breaker open for group: {group}")]
    CircuitOpen { group: String },

    /// Every retry was answered with 429.
    #[error("rate limit exceeded for group: {group}")]
    RateLimitExceeded { group: String },

    /// Response body could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Stable error code, e.g. `CIRCUIT_OPEN` or `HTTP_404`.
    pub fn code(&self) -> String {
        match self {
            Self::Network(_) => "NETWORK_ERROR".into(),
            Self::Timeout { .. } => "TIMEOUT".into(),
            Self::Http { status, .. } => format!("HTTP_{status}"),
            Self::CircuitOpen { .. } => "CIRCUIT_OPEN".into(),
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED".into(),
            Self::Deserialization(_) => "DESERIALIZATION_ERROR".into(),
            Self::Other(_) => "INTERNAL_ERROR".into(),
        }
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout { .. } => true,
            Self::Http { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// HTTP statuses the client retries: 429 and the transient 5xx family.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Errors produced by a provider adapter.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Upstream could not be reached and no cached or static answer exists.
    #[error("provider {provider} unavailable: {source}")]
    Unavailable {
        provider: String,
        #[source]
        source: TransportError,
    },

    /// The provider does not serve this chain pair or token.
    #[error("provider {provider} does not support {reason}")]
    UnsupportedRoute { provider: String, reason: String },

    /// The request could not be translated into the provider's wire format.
    #[error("invalid request for {provider}: {reason}")]
    InvalidRequest { provider: String, reason: String },

    /// The provider answered with a payload that failed validation.
    #[error("invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    /// The adapter did not answer within the aggregator's deadline.
    #[error("provider {provider} timed out after {ms}ms")]
    Timeout { provider: String, ms: u64 },
}

impl ProviderError {
    pub fn unavailable(provider: impl Into<String>, source: TransportError) -> Self {
        Self::Unavailable {
            provider: provider.into(),
            source,
        }
    }

    pub fn unsupported(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedRoute {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_request(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a client failure. Undecodable bodies are the provider's fault,
    /// everything else means it could not be reached.
    pub fn from_transport(provider: impl Into<String>, err: TransportError) -> Self {
        match err {
            TransportError::Deserialization(e) => Self::invalid_response(provider, e.to_string()),
            other => Self::unavailable(provider, other),
        }
    }

    /// Name of the provider that failed.
    pub fn provider(&self) -> &str {
        match self {
            Self::Unavailable { provider, .. }
            | Self::UnsupportedRoute { provider, .. }
            | Self::InvalidRequest { provider, .. }
            | Self::InvalidResponse { provider, .. }
            | Self::Timeout { provider, .. } => provider,
        }
    }

    /// Stable error code. Transport failures and timeouts both report
    /// `PROVIDER_UNAVAILABLE`; the underlying cause is kept in `source`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } | Self::Timeout { .. } => "PROVIDER_UNAVAILABLE",
            Self::UnsupportedRoute { .. } => "UNSUPPORTED_ROUTE",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_code_includes_status() {
        let e = TransportError::Http {
            status: 404,
            body: "not found".into(),
        };
        assert_eq!(e.code(), "HTTP_404");
        assert!(!e.is_retryable());
    }

    #[test]
    fn retryable_statuses() {
        for s in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(s), "{s} should be retryable");
        }
        for s in [400, 401, 403, 404, 501] {
            assert!(!is_retryable_status(s), "{s} should not be retryable");
        }
    }

    #[test]
    fn circuit_open_is_not_retryable() {
        let e = TransportError::CircuitOpen {
            group: "quotes".into(),
        };
        assert_eq!(e.code(), "CIRCUIT_OPEN");
        assert!(!e.is_retryable());
    }

    #[test]
    fn provider_unavailable_code() {
        let e = ProviderError::unavailable("hop", TransportError::Timeout { ms: 10 });
        assert_eq!(e.code(), "PROVIDER_UNAVAILABLE");
        assert_eq!(e.provider(), "hop");
    }

    #[test]
    fn undecodable_body_is_invalid_response() {
        let bad = serde_json::from_str::<u32>("nope").unwrap_err();
        let e = ProviderError::from_transport("stellar", TransportError::from(bad));
        assert_eq!(e.code(), "INVALID_RESPONSE");
        let e = ProviderError::from_transport("stellar", TransportError::Network("reset".into()));
        assert_eq!(e.code(), "PROVIDER_UNAVAILABLE");
    }
}
