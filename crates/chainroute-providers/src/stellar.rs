//! Stellar Horizon fee oracle.
//!
//! `GET {horizon}/fee_stats` returns fee percentiles as stroop strings
//! (1 XLM = 10^7 stroops). The 10th/50th/90th percentiles of `fee_charged`
//! become the slow/standard/fast tiers.
//! <https://developers.stellar.org/docs/data/horizon/api-reference/aggregations/fee-stats>

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use chainroute_core::adapter::FeeOracle;
use chainroute_core::error::ProviderError;
use chainroute_core::units::{from_base_units, STELLAR_DECIMALS};
use chainroute_core::{FeeEstimate, FeeNetwork, FeeTiers, RateLimitedClient, RequestOptions};

pub const PROVIDER: &str = "stellar";

/// Conservative stroop fees used when Horizon is unreachable.
pub const FALLBACK_STROOPS: FeeTiers<u64> = FeeTiers {
    slow: 100,
    standard: 100,
    fast: 200,
};

/// Ledgers close roughly every 5 s; slower tiers may wait a few ledgers.
pub const ESTIMATED_TIME_MS: FeeTiers<u64> = FeeTiers {
    slow: 15_000,
    standard: 10_000,
    fast: 5_000,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StellarConfig {
    pub enabled: bool,
    pub horizon_url: String,
    pub group: String,
}

impl Default for StellarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            horizon_url: "https://horizon.stellar.org".into(),
            group: "fees:stellar".into(),
        }
    }
}

/// `fee_stats` response. Only the fields we read are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct HorizonFeeStats {
    pub last_ledger: String,
    pub last_ledger_base_fee: String,
    pub ledger_capacity_usage: String,
    pub fee_charged: FeeDistribution,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeDistribution {
    pub min: String,
    pub max: String,
    pub mode: String,
    pub p10: String,
    pub p50: String,
    pub p90: String,
}

impl HorizonFeeStats {
    /// Validate and convert to the normalized estimate.
    pub fn into_estimate(self) -> Result<FeeEstimate, ProviderError> {
        let xlm = |field: &str, raw: &str| {
            from_base_units(raw, STELLAR_DECIMALS)
                .map_err(|e| ProviderError::invalid_response(PROVIDER, format!("{field}: {e}")))
        };
        let fees = FeeTiers::new(
            xlm("fee_charged.p10", &self.fee_charged.p10)?,
            xlm("fee_charged.p50", &self.fee_charged.p50)?,
            xlm("fee_charged.p90", &self.fee_charged.p90)?,
        );
        if fees.slow > fees.standard || fees.standard > fees.fast {
            return Err(ProviderError::invalid_response(
                PROVIDER,
                "fee percentiles are not monotonic",
            ));
        }

        let mut additional_data = Map::new();
        additional_data.insert("lastLedger".into(), Value::String(self.last_ledger));
        additional_data.insert(
            "baseFee".into(),
            Value::String(xlm("last_ledger_base_fee", &self.last_ledger_base_fee)?.to_string()),
        );
        additional_data.insert(
            "ledgerCapacityUsage".into(),
            Value::String(self.ledger_capacity_usage),
        );
        additional_data.insert("modeStroops".into(), Value::String(self.fee_charged.mode));
        additional_data.insert("minStroops".into(), Value::String(self.fee_charged.min));
        additional_data.insert("maxStroops".into(), Value::String(self.fee_charged.max));

        Ok(FeeEstimate {
            network: FeeNetwork::Stellar,
            available: true,
            fees,
            currency: "XLM".into(),
            estimated_time_ms: ESTIMATED_TIME_MS,
            last_updated: Utc::now(),
            additional_data,
        })
    }
}

pub struct StellarFeeOracle {
    client: Arc<RateLimitedClient>,
    config: StellarConfig,
}

impl StellarFeeOracle {
    pub fn new(client: Arc<RateLimitedClient>, config: StellarConfig) -> Self {
        Self { client, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

#[async_trait]
impl FeeOracle for StellarFeeOracle {
    fn network(&self) -> FeeNetwork {
        FeeNetwork::Stellar
    }

    async fn fetch_live(&self) -> Result<FeeEstimate, ProviderError> {
        let url = format!("{}/fee_stats", self.config.horizon_url.trim_end_matches('/'));
        let stats: HorizonFeeStats = self
            .client
            .get_json(url, &RequestOptions::group(&self.config.group))
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;
        stats.into_estimate()
    }

    fn static_fallback(&self) -> FeeEstimate {
        let fees = FALLBACK_STROOPS.map(|stroops| Decimal::new(stroops as i64, STELLAR_DECIMALS));
        let mut additional_data = Map::new();
        additional_data.insert("source".into(), Value::String("fallback".into()));
        FeeEstimate {
            network: FeeNetwork::Stellar,
            available: true,
            fees,
            currency: "XLM".into(),
            estimated_time_ms: ESTIMATED_TIME_MS,
            last_updated: Utc::now(),
            additional_data,
        }
    }
}
