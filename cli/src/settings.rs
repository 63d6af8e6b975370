//! JSON settings file, mapped onto the component configs.
//!
//! Every field is optional; durations are integer milliseconds.
//!
//! ```json
//! {
//!   "log": { "level": "info", "json": false },
//!   "client": { "max_retries": 2, "request_timeout_ms": 5000 },
//!   "rate_limit": { "capacity": 10, "refill_per_second": 10 },
//!   "circuit_breaker": { "failure_threshold": 5, "recovery_timeout_ms": 30000 },
//!   "groups": { "hop": { "capacity": 2, "refill_per_second": 1 } },
//!   "aggregator": { "adapter_timeout_ms": 15000 },
//!   "fees": { "cache_ttl_ms": 300000 },
//!   "providers": { "hop": { "fallback_enabled": true } }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use chainroute_aggregator::{AggregatorConfig, FeeServiceConfig, RankingWeights};
use chainroute_core::policy::{CircuitBreakerConfig, RateLimiterConfig, RetryConfig};
use chainroute_core::{ClientConfig, RegistryConfig};
use chainroute_http::HttpTransportConfig;
use chainroute_providers::ProvidersConfig;

use crate::logging::LogConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: LogConfig,
    pub client: ClientSettings,
    pub rate_limit: RateLimitSettings,
    pub circuit_breaker: BreakerSettings,
    /// Per-group overrides of the bucket and breaker defaults.
    pub groups: HashMap<String, GroupSettings>,
    pub aggregator: AggregatorSettings,
    pub fees: FeeSettings,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub full_jitter: bool,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_concurrency: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            max_retries: client.retry.max_retries,
            base_delay_ms: client.retry.base_delay.as_millis() as u64,
            max_delay_ms: client.retry.max_delay.as_millis() as u64,
            full_jitter: client.retry.full_jitter,
            request_timeout_ms: client.request_timeout.as_millis() as u64,
            connect_timeout_ms: 5_000,
            max_concurrency: client.max_concurrency,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub capacity: f64,
    pub refill_per_second: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let d = RateLimiterConfig::default();
        Self {
            capacity: d.capacity,
            refill_per_second: d.refill_rate,
        }
    }
}

impl From<&RateLimitSettings> for RateLimiterConfig {
    fn from(s: &RateLimitSettings) -> Self {
        Self {
            capacity: s.capacity,
            refill_rate: s.refill_per_second,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let d = CircuitBreakerConfig::default();
        Self {
            failure_threshold: d.failure_threshold,
            recovery_timeout_ms: d.recovery_timeout.as_millis() as u64,
        }
    }
}

impl From<&BreakerSettings> for CircuitBreakerConfig {
    fn from(s: &BreakerSettings) -> Self {
        Self {
            failure_threshold: s.failure_threshold,
            recovery_timeout: Duration::from_millis(s.recovery_timeout_ms),
            ..Default::default()
        }
    }
}

/// Overrides for one group; unset fields keep the global value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSettings {
    pub capacity: Option<f64>,
    pub refill_per_second: Option<f64>,
    pub failure_threshold: Option<u32>,
    pub recovery_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSettings {
    /// `null` disables the per-adapter deadline.
    pub adapter_timeout_ms: Option<u64>,
    pub weights: RankingWeights,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        let d = AggregatorConfig::default();
        Self {
            adapter_timeout_ms: d.adapter_timeout.map(|t| t.as_millis() as u64),
            weights: d.weights,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSettings {
    pub cache_ttl_ms: u64,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            cache_ttl_ms: FeeServiceConfig::default().cache_ttl.as_millis() as u64,
        }
    }
}

impl Settings {
    /// Defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing settings file {}", path.display()))
    }

    pub fn client_config(&self) -> ClientConfig {
        let c = &self.client;
        ClientConfig {
            retry: RetryConfig {
                max_retries: c.max_retries,
                base_delay: Duration::from_millis(c.base_delay_ms),
                max_delay: Duration::from_millis(c.max_delay_ms),
                full_jitter: c.full_jitter,
            },
            request_timeout: Duration::from_millis(c.request_timeout_ms),
            max_concurrency: c.max_concurrency,
        }
    }

    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            connect_timeout: Duration::from_millis(self.client.connect_timeout_ms),
            ..Default::default()
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        let rate_limiter = RateLimiterConfig::from(&self.rate_limit);
        let circuit_breaker = CircuitBreakerConfig::from(&self.circuit_breaker);
        let mut config = RegistryConfig {
            rate_limiter: rate_limiter.clone(),
            circuit_breaker: circuit_breaker.clone(),
            ..Default::default()
        };
        for (group, o) in &self.groups {
            if o.capacity.is_some() || o.refill_per_second.is_some() {
                config.rate_limiter_overrides.insert(
                    group.clone(),
                    RateLimiterConfig {
                        capacity: o.capacity.unwrap_or(rate_limiter.capacity),
                        refill_rate: o.refill_per_second.unwrap_or(rate_limiter.refill_rate),
                    },
                );
            }
            if o.failure_threshold.is_some() || o.recovery_timeout_ms.is_some() {
                config.circuit_breaker_overrides.insert(
                    group.clone(),
                    CircuitBreakerConfig {
                        failure_threshold: o
                            .failure_threshold
                            .unwrap_or(circuit_breaker.failure_threshold),
                        recovery_timeout: o
                            .recovery_timeout_ms
                            .map(Duration::from_millis)
                            .unwrap_or(circuit_breaker.recovery_timeout),
                        ..circuit_breaker.clone()
                    },
                );
            }
        }
        config
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            adapter_timeout: self.aggregator.adapter_timeout_ms.map(Duration::from_millis),
            weights: self.aggregator.weights,
        }
    }

    pub fn fee_config(&self) -> FeeServiceConfig {
        FeeServiceConfig {
            cache_ttl: Duration::from_millis(self.fees.cache_ttl_ms),
        }
    }
}
