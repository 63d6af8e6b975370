//! chainroute-core — foundation traits and types for ChainRoute.
//!
//! # Overview
//!
//! ChainRoute queries several independent bridge and fee providers, guards
//! each one against failure, and normalizes their answers into one model.
//! The core crate defines:
//!
//! - [`HttpTransport`] — the injectable async transport every client uses
//! - [`RateLimitedClient`] — circuit breaker, token bucket, queue and retry around one call
//! - [`PolicyRegistry`] — per-group breakers and buckets, created lazily
//! - [`policy`] module — token bucket, circuit breaker, retry, request queue
//! - [`QuoteCache`] and the [`fallback`] ladder — live → cache → static
//! - [`NormalizedRoute`] / [`FeeEstimate`] — the provider-agnostic model
//! - [`BridgeAdapter`] / [`FeeOracle`] — what each provider implements

pub mod adapter;
pub mod cache;
pub mod client;
pub mod error;
pub mod fallback;
pub mod metrics;
pub mod policy;
pub mod registry;
pub mod request;
pub mod transport;
pub mod types;
pub mod units;

pub use adapter::{BridgeAdapter, FeeOracle};
pub use cache::{CachedQuote, QuoteCache, DEFAULT_QUOTE_TTL};
pub use client::{ClientConfig, RateLimitedClient, RequestOptions};
pub use error::{ProviderError, TransportError};
pub use metrics::ClientMetricsSnapshot;
pub use registry::{CircuitStatus, PolicyRegistry, RegistryConfig};
pub use request::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::HttpTransport;
pub use types::{
    FeeEstimate, FeeNetwork, FeeTiers, NormalizedRoute, QuoteSource, RouteRequest,
    UnsupportedNetwork,
};
