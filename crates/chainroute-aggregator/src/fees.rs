//! Per-network fee estimates through the live → cache → static ladder.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use chainroute_core::fallback;
use chainroute_core::{
    FeeEstimate, FeeNetwork, FeeOracle, QuoteCache, QuoteSource, UnsupportedNetwork,
    DEFAULT_QUOTE_TTL,
};

/// Configuration for [`FeeEstimationService`].
#[derive(Debug, Clone)]
pub struct FeeServiceConfig {
    /// How long a successful estimate stays usable when the upstream fails.
    pub cache_ttl: Duration,
}

impl Default for FeeServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_QUOTE_TTL,
        }
    }
}

pub struct FeeEstimationService {
    oracles: HashMap<FeeNetwork, Arc<dyn FeeOracle>>,
    cache: QuoteCache<FeeNetwork, FeeEstimate>,
}

impl FeeEstimationService {
    /// Later oracles for the same network replace earlier ones.
    pub fn new(oracles: Vec<Arc<dyn FeeOracle>>, config: FeeServiceConfig) -> Self {
        let oracles = oracles.into_iter().map(|o| (o.network(), o)).collect();
        Self {
            oracles,
            cache: QuoteCache::new(config.cache_ttl),
        }
    }

    /// Networks with a registered oracle, in declaration order.
    pub fn networks(&self) -> Vec<FeeNetwork> {
        FeeNetwork::ALL
            .into_iter()
            .filter(|n| self.oracles.contains_key(n))
            .collect()
    }

    pub fn cache(&self) -> &QuoteCache<FeeNetwork, FeeEstimate> {
        &self.cache
    }

    /// Best available estimate for `network`. Never fails: with no oracle, or
    /// when every tier is exhausted, the estimate comes back `available=false`.
    pub async fn get_fee_estimate(&self, network: FeeNetwork) -> FeeEstimate {
        let Some(oracle) = self.oracles.get(&network) else {
            tracing::debug!(%network, "no fee oracle registered");
            return FeeEstimate::unavailable(network, "no fee oracle registered");
        };

        let resolved = fallback::resolve(
            network.as_str(),
            &self.cache,
            network,
            oracle.fetch_live(),
            || Some(oracle.static_fallback()),
        )
        .await;

        match resolved {
            Ok((estimate, source)) => {
                if source == QuoteSource::Live {
                    tracing::debug!(%network, "live fee estimate");
                }
                estimate
            }
            Err(e) => {
                tracing::error!(%network, code = e.code(), error = %e, "fee estimate unavailable");
                FeeEstimate::unavailable(network, &e.to_string())
            }
        }
    }

    /// Parse a network name first; unknown names are rejected before any I/O.
    pub async fn get_fee_estimate_by_name(&self, name: &str) -> Result<FeeEstimate, UnsupportedNetwork> {
        let network: FeeNetwork = name.parse()?;
        Ok(self.get_fee_estimate(network).await)
    }

    /// Estimates for every known network, queried concurrently.
    pub async fn get_all_fee_estimates(&self) -> Vec<FeeEstimate> {
        join_all(FeeNetwork::ALL.into_iter().map(|n| self.get_fee_estimate(n))).await
    }
}
