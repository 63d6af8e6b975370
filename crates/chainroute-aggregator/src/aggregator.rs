//! Concurrent fan-out of one route request to every enabled adapter.
//!
//! Join semantics are all-settled: each adapter's result is collected on its
//! own, a failure, timeout or panic only drops that adapter from the answer,
//! and the call itself always returns.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;

use chainroute_core::{
    BridgeAdapter, NormalizedRoute, ProviderError, RouteRequest, TransportError,
};

use crate::ranker::{RankingWeights, RouteRanker};

/// Configuration for [`BridgeAggregator`].
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Deadline for each adapter call; `None` waits as long as the adapter does.
    pub adapter_timeout: Option<Duration>,
    /// Weights used by [`BridgeAggregator::get_routes`].
    pub weights: RankingWeights,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            adapter_timeout: Some(Duration::from_secs(30)),
            weights: RankingWeights::default(),
        }
    }
}

/// One adapter that did not contribute a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub code: String,
    pub message: String,
}

impl ProviderFailure {
    fn from_error(provider: &str, err: &ProviderError) -> Self {
        Self {
            provider: provider.to_string(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRoutes {
    /// Best first.
    pub routes: Vec<NormalizedRoute>,
    pub timestamp: DateTime<Utc>,
    pub providers_queried: usize,
    pub providers_responded: usize,
    pub failures: Vec<ProviderFailure>,
}

impl AggregatedRoutes {
    pub fn best_route(&self) -> Option<&NormalizedRoute> {
        self.routes.first()
    }
}

pub struct BridgeAggregator {
    adapters: Vec<Arc<dyn BridgeAdapter>>,
    ranker: RouteRanker,
    config: AggregatorConfig,
}

impl BridgeAggregator {
    pub fn new(adapters: Vec<Arc<dyn BridgeAdapter>>, config: AggregatorConfig) -> Self {
        Self {
            adapters,
            ranker: RouteRanker::new(),
            config,
        }
    }

    pub fn adapters(&self) -> &[Arc<dyn BridgeAdapter>] {
        &self.adapters
    }

    /// Names of the adapters a request would be sent to.
    pub fn enabled_providers(&self) -> Vec<&str> {
        self.adapters
            .iter()
            .filter(|a| a.is_enabled())
            .map(|a| a.name())
            .collect()
    }

    /// Query every enabled adapter and rank with the configured weights.
    pub async fn get_routes(&self, req: &RouteRequest) -> AggregatedRoutes {
        self.get_routes_weighted(req, &self.config.weights).await
    }

    pub async fn get_routes_weighted(
        &self,
        req: &RouteRequest,
        weights: &RankingWeights,
    ) -> AggregatedRoutes {
        let enabled: Vec<&Arc<dyn BridgeAdapter>> =
            self.adapters.iter().filter(|a| a.is_enabled()).collect();
        let providers_queried = enabled.len();

        let calls = enabled.into_iter().map(|adapter| async move {
            let result = self.call(adapter.as_ref(), req).await;
            (adapter.name(), result)
        });
        let settled = join_all(calls).await;

        let mut routes = Vec::with_capacity(settled.len());
        let mut failures = Vec::new();
        for (provider, result) in settled {
            match result {
                Ok(route) => routes.push(route),
                Err(e) => {
                    tracing::warn!(
                        provider,
                        code = e.code(),
                        error = %e,
                        source_chain = %req.source_chain,
                        target_chain = %req.target_chain,
                        "adapter failed — excluded from results"
                    );
                    failures.push(ProviderFailure::from_error(provider, &e));
                }
            }
        }

        let providers_responded = routes.len();
        tracing::info!(
            providers_queried,
            providers_responded,
            source_chain = %req.source_chain,
            target_chain = %req.target_chain,
            "routes aggregated"
        );

        AggregatedRoutes {
            routes: self.ranker.rank(routes, weights),
            timestamp: Utc::now(),
            providers_queried,
            providers_responded,
            failures,
        }
    }

    async fn call(
        &self,
        adapter: &dyn BridgeAdapter,
        req: &RouteRequest,
    ) -> Result<NormalizedRoute, ProviderError> {
        let guarded = AssertUnwindSafe(adapter.get_route(req))
            .catch_unwind()
            .map(|settled| {
                settled.unwrap_or_else(|_| {
                    Err(ProviderError::unavailable(
                        adapter.name(),
                        TransportError::Other("adapter panicked".into()),
                    ))
                })
            });
        match self.config.adapter_timeout {
            None => guarded.await,
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout {
                    provider: adapter.name().to_string(),
                    ms: limit.as_millis() as u64,
                }),
            },
        }
    }
}
