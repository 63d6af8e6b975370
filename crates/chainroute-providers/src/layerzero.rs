//! LayerZero messaging fee estimator.
//!
//! Fees are paid in the source chain's native gas token and grow with the
//! size of the cross-chain message. The estimator endpoint mirrors the
//! endpoint contract's `estimateFees(dstChainId, app, payload, payInZro, params)`:
//!
//! ```text
//! POST {base}/v1/estimate-fees
//! {"srcChainId":101,"dstChainId":110,"payloadSize":128,"payInZro":false}
//! → {"nativeFee":"656000000000000","zroFee":"0"}
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use chainroute_core::error::ProviderError;
use chainroute_core::fallback;
use chainroute_core::units::{from_base_units, parse_amount, percentage_of, EVM_NATIVE_DECIMALS};
use chainroute_core::{
    BridgeAdapter, FeeEstimate, FeeNetwork, FeeOracle, FeeTiers, HttpRequest, NormalizedRoute, QuoteCache,
    QuoteSource, RateLimitedClient, RequestOptions, RouteRequest,
};

use crate::chains;

pub const PROVIDER: &str = "layerzero";

/// LayerZero v1 endpoint ids.
const CHAIN_IDS: &[(&str, u16)] = &[
    ("ethereum", 101),
    ("bsc", 102),
    ("avalanche", 106),
    ("polygon", 109),
    ("arbitrum", 110),
    ("optimism", 111),
    ("base", 184),
];

/// A 20-byte EVM address; used when the request carries no recipient.
const DEFAULT_RECIPIENT_LEN: usize = 20;

pub fn chain_id(chain: &str) -> Option<u16> {
    let chain = chains::canonical(chain);
    CHAIN_IDS
        .iter()
        .find(|(name, _)| *name == chain)
        .map(|(_, id)| *id)
}

/// Size of the ABI-encoded `(bytes recipient, uint256 amount)` message:
/// offset word, amount word, length word, then the recipient padded to 32 bytes.
pub fn payload_size(recipient_len: usize) -> u32 {
    let padded = recipient_len.div_ceil(32) * 32;
    (32 * 3 + padded) as u32
}

fn recipient_len(recipient: Option<&str>) -> usize {
    match recipient {
        Some(addr) => {
            let hex = addr.trim().trim_start_matches("0x");
            hex.len().div_ceil(2)
        }
        None => DEFAULT_RECIPIENT_LEN,
    }
}

/// Seconds until the source transaction is final enough for the oracle.
fn confirmation_seconds(source: &str) -> u64 {
    match source {
        "ethereum" => 180,
        "polygon" => 300,
        _ => 60,
    }
}

/// Static fee table in native units: base fee and fee per payload byte.
fn fallback_fee_table(source: &str) -> Option<(Decimal, Decimal)> {
    let entry = match source {
        "ethereum" => (Decimal::new(4, 4), Decimal::new(2, 6)),
        "arbitrum" | "optimism" | "base" => (Decimal::new(5, 5), Decimal::new(2, 7)),
        "polygon" => (Decimal::new(5, 1), Decimal::new(2, 3)),
        "bsc" => (Decimal::new(2, 3), Decimal::new(1, 5)),
        "avalanche" => (Decimal::new(2, 2), Decimal::new(1, 4)),
        _ => return None,
    };
    Some(entry)
}

/// Static native fee for a message of `payload` bytes sent from `source`.
pub fn fallback_native_fee(source: &str, payload: u32) -> Option<Decimal> {
    let (base, per_byte) = fallback_fee_table(&chains::canonical(source))?;
    Some(base + per_byte * Decimal::from(payload))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerZeroConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub group: String,
    pub reliability: f64,
    pub fallback_enabled: bool,
    pub cache_ttl_ms: u64,
    /// Price of one unit of each chain's native token in the bridged asset,
    /// used to express the gas fee as a percentage of the transfer.
    /// Missing chains count as 1.
    pub native_asset_rates: HashMap<String, Decimal>,
    /// Route quoted when acting as the `layerzero` fee oracle.
    pub reference_source: String,
    pub reference_target: String,
}

impl Default for LayerZeroConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:8545/layerzero".into(),
            api_key: None,
            group: PROVIDER.into(),
            reliability: 0.9,
            fallback_enabled: true,
            cache_ttl_ms: 300_000,
            native_asset_rates: HashMap::new(),
            reference_source: "ethereum".into(),
            reference_target: "arbitrum".into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EstimateFeesRequest {
    src_chain_id: u16,
    dst_chain_id: u16,
    payload_size: u32,
    pay_in_zro: bool,
}

/// `estimate-fees` response; both fees are wei strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LzFeeResponse {
    pub native_fee: String,
    #[serde(default)]
    pub zro_fee: Option<String>,
}

/// A validated message path.
#[derive(Debug, Clone)]
struct MessagePath {
    source: String,
    target: String,
    src_chain_id: u16,
    dst_chain_id: u16,
    payload_size: u32,
}

pub struct LayerZeroAdapter {
    client: Arc<RateLimitedClient>,
    config: LayerZeroConfig,
    cache: QuoteCache<String, NormalizedRoute>,
}

impl LayerZeroAdapter {
    pub fn new(client: Arc<RateLimitedClient>, config: LayerZeroConfig) -> Self {
        let cache = QuoteCache::new(Duration::from_millis(config.cache_ttl_ms));
        Self {
            client,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &LayerZeroConfig {
        &self.config
    }

    fn path(&self, source: &str, target: &str, recipient: Option<&str>) -> Result<MessagePath, ProviderError> {
        let source = chains::canonical(source);
        let target = chains::canonical(target);
        if source == target {
            return Err(ProviderError::invalid_request(
                PROVIDER,
                "source and target chain are the same",
            ));
        }
        let src_chain_id = chain_id(&source)
            .ok_or_else(|| ProviderError::unsupported(PROVIDER, format!("chain {source}")))?;
        let dst_chain_id = chain_id(&target)
            .ok_or_else(|| ProviderError::unsupported(PROVIDER, format!("chain {target}")))?;
        Ok(MessagePath {
            source,
            target,
            src_chain_id,
            dst_chain_id,
            payload_size: payload_size(recipient_len(recipient)),
        })
    }

    /// Live native fee for a path, in whole native units.
    async fn estimate(&self, path: &MessagePath) -> Result<(Decimal, LzFeeResponse), ProviderError> {
        let url = format!("{}/v1/estimate-fees", self.config.base_url.trim_end_matches('/'));
        let body = EstimateFeesRequest {
            src_chain_id: path.src_chain_id,
            dst_chain_id: path.dst_chain_id,
            payload_size: path.payload_size,
            pay_in_zro: false,
        };
        let mut req = HttpRequest::post(url)
            .json(&body)
            .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;
        if let Some(key) = &self.config.api_key {
            req = req.header("x-api-key", key.as_str());
        }
        let resp: LzFeeResponse = self
            .client
            .request_json(req, &RequestOptions::group(&self.config.group))
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;
        let native = from_base_units(&resp.native_fee, EVM_NATIVE_DECIMALS)
            .map_err(|e| ProviderError::invalid_response(PROVIDER, format!("nativeFee: {e}")))?;
        Ok((native, resp))
    }

    fn native_rate(&self, chain: &str) -> Decimal {
        self.config
            .native_asset_rates
            .get(chain)
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    fn build_route(
        &self,
        path: &MessagePath,
        amount: Decimal,
        native_fee: Decimal,
        reliability: f64,
        mut metadata: Map<String, Value>,
    ) -> NormalizedRoute {
        let fee_in_asset = native_fee
            .checked_mul(self.native_rate(&path.source))
            .unwrap_or(Decimal::MAX);
        metadata.insert(
            "feeCurrency".into(),
            json!(chains::native_currency(&path.source).unwrap_or("NATIVE")),
        );
        metadata.insert("srcChainId".into(), json!(path.src_chain_id));
        metadata.insert("dstChainId".into(), json!(path.dst_chain_id));
        metadata.insert("payloadSize".into(), json!(path.payload_size));
        NormalizedRoute {
            id: format!("{PROVIDER}-{}", uuid::Uuid::new_v4()),
            provider: PROVIDER.into(),
            source_chain: path.source.clone(),
            target_chain: path.target.clone(),
            input_amount: amount,
            output_amount: amount,
            fee: native_fee,
            fee_percentage: percentage_of(fee_in_asset, amount),
            estimated_time_seconds: confirmation_seconds(&path.source),
            min_amount_out: amount,
            max_amount_out: amount,
            reliability,
            metadata,
        }
    }

    async fn live_route(&self, path: &MessagePath, amount: Decimal) -> Result<NormalizedRoute, ProviderError> {
        let (native_fee, resp) = self.estimate(path).await?;
        let mut metadata = Map::new();
        metadata.insert("nativeFeeWei".into(), json!(resp.native_fee));
        metadata.insert("zroFee".into(), json!(resp.zro_fee.unwrap_or_else(|| "0".into())));
        metadata.insert("source".into(), json!(QuoteSource::Live.to_string()));
        Ok(self.build_route(path, amount, native_fee, self.config.reliability, metadata))
    }

    fn fallback_route(&self, path: &MessagePath, amount: Decimal) -> Option<NormalizedRoute> {
        if !self.config.fallback_enabled {
            return None;
        }
        let native_fee = fallback_native_fee(&path.source, path.payload_size)?;
        let mut metadata = Map::new();
        metadata.insert("source".into(), json!(QuoteSource::Fallback.to_string()));
        Some(self.build_route(path, amount, native_fee, self.config.reliability / 2.0, metadata))
    }

    fn fee_estimate(&self, path: &MessagePath, native_fee: Decimal, mut additional_data: Map<String, Value>) -> FeeEstimate {
        let wait_ms = confirmation_seconds(&path.source) * 1000;
        additional_data.insert("srcChainId".into(), json!(path.src_chain_id));
        additional_data.insert("dstChainId".into(), json!(path.dst_chain_id));
        additional_data.insert("payloadSize".into(), json!(path.payload_size));
        FeeEstimate {
            network: FeeNetwork::LayerZero,
            available: true,
            fees: FeeTiers::new(native_fee, native_fee, native_fee),
            currency: chains::native_currency(&path.source).unwrap_or("NATIVE").into(),
            estimated_time_ms: FeeTiers::new(wait_ms, wait_ms, wait_ms),
            last_updated: Utc::now(),
            additional_data,
        }
    }

    fn reference_path(&self) -> Result<MessagePath, ProviderError> {
        self.path(&self.config.reference_source, &self.config.reference_target, None)
    }
}

#[async_trait]
impl BridgeAdapter for LayerZeroAdapter {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn get_route(&self, req: &RouteRequest) -> Result<NormalizedRoute, ProviderError> {
        let amount = parse_amount(&req.asset_amount)
            .map_err(|e| ProviderError::invalid_request(PROVIDER, e.to_string()))?;
        if amount.is_zero() {
            return Err(ProviderError::invalid_request(PROVIDER, "amount must be positive"));
        }
        let path = self.path(&req.source_chain, &req.target_chain, req.recipient_address.as_deref())?;

        let (mut route, source) = fallback::resolve(
            PROVIDER,
            &self.cache,
            req.cache_key(),
            self.live_route(&path, amount),
            || self.fallback_route(&path, amount),
        )
        .await?;
        if source == QuoteSource::Cache {
            route.reissue_cached(format!("{PROVIDER}-{}", uuid::Uuid::new_v4()));
        }
        Ok(route)
    }
}

#[async_trait]
impl FeeOracle for LayerZeroAdapter {
    fn network(&self) -> FeeNetwork {
        FeeNetwork::LayerZero
    }

    async fn fetch_live(&self) -> Result<FeeEstimate, ProviderError> {
        let path = self.reference_path()?;
        let (native_fee, resp) = self.estimate(&path).await?;
        let mut data = Map::new();
        data.insert("nativeFeeWei".into(), json!(resp.native_fee));
        Ok(self.fee_estimate(&path, native_fee, data))
    }

    fn static_fallback(&self) -> FeeEstimate {
        let fallback = self.reference_path().ok().and_then(|path| {
            let fee = fallback_native_fee(&path.source, path.payload_size)?;
            let mut data = Map::new();
            data.insert("source".into(), json!(QuoteSource::Fallback.to_string()));
            Some(self.fee_estimate(&path, fee, data))
        });
        fallback.unwrap_or_else(|| {
            FeeEstimate::unavailable(FeeNetwork::LayerZero, "reference route has no static fee")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn evm_recipient_payload_is_four_words() {
        assert_eq!(payload_size(20), 128);
        assert_eq!(payload_size(32), 128);
        assert_eq!(payload_size(33), 160);
        assert_eq!(payload_size(recipient_len(Some("0x000000000000000000000000000000000000dEaD"))), 128);
    }

    #[test]
    fn chain_ids_accept_aliases() {
        assert_eq!(chain_id("eth"), Some(101));
        assert_eq!(chain_id("Arbitrum-One"), Some(110));
        assert_eq!(chain_id("solana"), None);
    }

    #[test]
    fn fallback_scales_with_payload() {
        assert_eq!(fallback_native_fee("ethereum", 128), Some(dec!(0.000656)));
        assert_eq!(fallback_native_fee("polygon", 128), Some(dec!(0.756)));
        assert!(fallback_native_fee("ethereum", 160) > fallback_native_fee("ethereum", 128));
        assert_eq!(fallback_native_fee("gnosis", 128), None);
    }

    #[test]
    fn fee_response_accepts_missing_zro() {
        let r: LzFeeResponse = serde_json::from_str(r#"{"nativeFee":"1000"}"#).unwrap();
        assert_eq!(r.native_fee, "1000");
        assert!(r.zro_fee.is_none());
    }
}
