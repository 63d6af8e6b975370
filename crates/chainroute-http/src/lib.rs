//! chainroute-http — `reqwest` implementation of [`chainroute_core::HttpTransport`].
//!
//! # Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainroute_core::{ClientConfig, PolicyRegistry, RateLimitedClient};
//! use chainroute_http::ReqwestTransport;
//!
//! let transport = Arc::new(ReqwestTransport::with_defaults().unwrap());
//! let registry = Arc::new(PolicyRegistry::default());
//! let client = RateLimitedClient::new(transport, registry, ClientConfig::default());
//! ```

pub mod client;

pub use client::{HttpTransportConfig, ReqwestTransport};
