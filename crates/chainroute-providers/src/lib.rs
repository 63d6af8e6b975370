//! chainroute-providers — adapters for each upstream bridge and fee provider.
//!
//! Every adapter owns a TTL quote cache and a static fallback table, and
//! sends its traffic through a shared [`RateLimitedClient`] under its own
//! group, so one misbehaving provider trips only its own breaker.
//!
//! | Adapter | Route source | Fee oracle for |
//! |---|---|---|
//! | [`StellarFeeOracle`] | — | `stellar` |
//! | [`LayerZeroAdapter`] | yes | `layerzero` |
//! | [`HopAdapter`] | yes | `hop` |
//!
//! # Quick start
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainroute_core::{ClientConfig, PolicyRegistry, RateLimitedClient};
//! use chainroute_http::ReqwestTransport;
//! use chainroute_providers::{HopAdapter, HopConfig};
//!
//! let transport = Arc::new(ReqwestTransport::with_defaults().unwrap());
//! let client = Arc::new(RateLimitedClient::new(
//!     transport,
//!     Arc::new(PolicyRegistry::default()),
//!     ClientConfig::default(),
//! ));
//! let hop = HopAdapter::new(client, HopConfig::default());
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chainroute_core::{BridgeAdapter, FeeOracle, RateLimitedClient};

pub mod chains;
pub mod hop;
pub mod layerzero;
pub mod stellar;

pub use hop::{HopAdapter, HopConfig};
pub use layerzero::{LayerZeroAdapter, LayerZeroConfig};
pub use stellar::{StellarConfig, StellarFeeOracle};

/// Configuration for every built-in provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub stellar: StellarConfig,
    pub layerzero: LayerZeroConfig,
    pub hop: HopConfig,
}

/// The built-in adapters, split by role.
pub struct ProviderSet {
    pub bridges: Vec<Arc<dyn BridgeAdapter>>,
    pub oracles: Vec<Arc<dyn FeeOracle>>,
}

/// Build every enabled adapter on top of one shared client.
pub fn build_all(client: Arc<RateLimitedClient>, config: ProvidersConfig) -> ProviderSet {
    let mut bridges: Vec<Arc<dyn BridgeAdapter>> = Vec::new();
    let mut oracles: Vec<Arc<dyn FeeOracle>> = Vec::new();

    if config.stellar.enabled {
        oracles.push(Arc::new(StellarFeeOracle::new(client.clone(), config.stellar)));
    }
    if config.layerzero.enabled {
        let lz = Arc::new(LayerZeroAdapter::new(client.clone(), config.layerzero));
        bridges.push(lz.clone());
        oracles.push(lz);
    }
    if config.hop.enabled {
        let hop = Arc::new(HopAdapter::new(client, config.hop));
        bridges.push(hop.clone());
        oracles.push(hop);
    }

    tracing::debug!(
        bridges = bridges.len(),
        oracles = oracles.len(),
        "providers built"
    );
    ProviderSet { bridges, oracles }
}
