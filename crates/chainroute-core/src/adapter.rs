//! Adapter traits implemented by each upstream provider.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{FeeEstimate, FeeNetwork, NormalizedRoute, RouteRequest};

/// A source of bridge quotes.
///
/// Implementations translate the provider's wire format into a
/// [`NormalizedRoute`]; no provider-specific shape leaves the adapter.
#[async_trait]
pub trait BridgeAdapter: Send + Sync + 'static {
    /// Provider name, also used for tie-breaking when ranking.
    fn name(&self) -> &str;

    /// Disabled adapters are skipped by the aggregator.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn get_route(&self, req: &RouteRequest) -> Result<NormalizedRoute, ProviderError>;
}

/// A source of per-network fee estimates.
#[async_trait]
pub trait FeeOracle: Send + Sync + 'static {
    fn network(&self) -> FeeNetwork;

    /// Query the upstream. Guarded by the oracle's own client group.
    async fn fetch_live(&self) -> Result<FeeEstimate, ProviderError>;

    /// Conservative static estimate used when live and cached data are both unavailable.
    fn static_fallback(&self) -> FeeEstimate;
}
