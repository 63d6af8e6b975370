//! Hop liquidity-bridge quotes.
//!
//! `GET {base}/v1/quote?amount=&token=&fromChain=&toChain=&slippage=`
//! returns every amount in the token's smallest unit: 6 decimals for
//! USDC/USDT, 18 for everything else.
//! <https://docs.hop.exchange/v/developer-docs/api/api>

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
use chainroute_core::units::{
    apply_bps, from_base_units, parse_amount, percentage_of, to_base_units, EVM_NATIVE_DECIMALS,
    STABLE_DECIMALS,
};
use chainroute_core::{
    BridgeAdapter, FeeEstimate, FeeNetwork, FeeOracle, FeeTiers, HttpRequest, NormalizedRoute,
    QuoteCache, QuoteSource, RateLimitedClient, RequestOptions, RouteRequest,
};

use crate::chains;

pub const PROVIDER: &str = "hop";

/// Chains Hop bridges between, by canonical slug.
pub const SUPPORTED_CHAINS: &[&str] = &[
    "ethereum", "polygon", "arbitrum", "optimism", "gnosis", "base", "nova",
];

pub fn token_decimals(symbol: &str) -> u32 {
    match symbol.to_ascii_uppercase().as_str() {
        "USDC" | "USDC.E" | "USDT" => STABLE_DECIMALS,
        _ => EVM_NATIVE_DECIMALS,
    }
}

/// Transfers out of L1 wait for the L1→L2 message; L2 exits are bonded.
fn transfer_seconds(source: &str) -> u64 {
    if source == "ethereum" {
        900
    } else {
        120
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HopConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub group: String,
    pub reliability: f64,
    pub fallback_enabled: bool,
    pub cache_ttl_ms: u64,
    pub default_token: String,
    /// Percent, used when the request carries none.
    pub default_slippage: f64,
    /// Token contract address (lower-case) → Hop token symbol.
    pub token_symbols: HashMap<String, String>,
    pub fallback_lp_fee_bps: u32,
    pub fallback_bonder_fee_bps: u32,
    /// Transfer quoted when acting as the `hop` fee oracle.
    pub reference_amount: String,
    pub reference_source: String,
    pub reference_target: String,
}

impl Default for HopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.hop.exchange".into(),
            api_key: None,
            group: PROVIDER.into(),
            reliability: 0.95,
            fallback_enabled: true,
            cache_ttl_ms: 300_000,
            default_token: "USDC".into(),
            default_slippage: 0.5,
            token_symbols: HashMap::new(),
            fallback_lp_fee_bps: 4,
            fallback_bonder_fee_bps: 18,
            reference_amount: "100".into(),
            reference_source: "polygon".into(),
            reference_target: "arbitrum".into(),
        }
    }
}

/// `/v1/quote` response, amounts in smallest units.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HopQuote {
    pub amount_in: String,
    pub amount_out_min: String,
    pub bonder_fee: String,
    #[serde(alias = "estimatedReceived")]
    pub estimated_recieved: String,
    #[serde(default)]
    pub lp_fees: Option<String>,
    #[serde(default)]
    pub destination_tx_fee: Option<String>,
}

/// Quote converted to token units.
#[derive(Debug, Clone, PartialEq)]
pub struct HopFees {
    pub amount_in: Decimal,
    pub lp_fees: Decimal,
    pub bonder_fee: Decimal,
    pub destination_tx_fee: Decimal,
    pub amount_out_min: Decimal,
    pub estimated_received: Decimal,
}

impl HopFees {
    pub fn total(&self) -> Decimal {
        self.lp_fees + self.bonder_fee + self.destination_tx_fee
    }
}

impl HopQuote {
    /// Scale to token units and check the amounts are consistent.
    pub fn into_fees(self, decimals: u32) -> Result<HopFees, ProviderError> {
        let units = |field: &str, raw: Option<&str>| match raw {
            None => Ok(Decimal::ZERO),
            Some(raw) => from_base_units(raw, decimals)
                .map_err(|e| ProviderError::invalid_response(PROVIDER, format!("{field}: {e}"))),
        };
        let fees = HopFees {
            amount_in: units("amountIn", Some(&self.amount_in))?,
            lp_fees: units("lpFees", self.lp_fees.as_deref())?,
            bonder_fee: units("bonderFee", Some(&self.bonder_fee))?,
            destination_tx_fee: units("destinationTxFee", self.destination_tx_fee.as_deref())?,
            amount_out_min: units("amountOutMin", Some(&self.amount_out_min))?,
            estimated_received: units("estimatedRecieved", Some(&self.estimated_recieved))?,
        };
        if fees.estimated_received > fees.amount_in {
            return Err(ProviderError::invalid_response(
                PROVIDER,
                "estimated output exceeds input",
            ));
        }
        if fees.amount_out_min > fees.estimated_received {
            return Err(ProviderError::invalid_response(
                PROVIDER,
                "minimum output exceeds estimated output",
            ));
        }
        Ok(fees)
    }
}

/// A validated transfer.
#[derive(Debug, Clone)]
struct Transfer {
    source: String,
    target: String,
    token: String,
    decimals: u32,
    amount: Decimal,
    /// `amount` in the token's smallest unit, never zero.
    base_units: u128,
    slippage: f64,
}

pub struct HopAdapter {
    client: Arc<RateLimitedClient>,
    config: HopConfig,
    cache: QuoteCache<String, NormalizedRoute>,
}

impl HopAdapter {
    pub fn new(client: Arc<RateLimitedClient>, config: HopConfig) -> Self {
        let cache = QuoteCache::new(Duration::from_millis(config.cache_ttl_ms));
        Self {
            client,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &HopConfig {
        &self.config
    }

    /// Resolve a token address or symbol to a Hop symbol.
    fn token_symbol(&self, token: Option<&str>) -> Result<String, ProviderError> {
        match token.map(str::trim) {
            None | Some("") => Ok(self.config.default_token.to_ascii_uppercase()),
            Some(addr) if addr.starts_with("0x") => self
                .config
                .token_symbols
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(addr))
                .map(|(_, symbol)| symbol.to_ascii_uppercase())
                .ok_or_else(|| ProviderError::unsupported(PROVIDER, format!("token {addr}"))),
            Some(symbol) => Ok(symbol.to_ascii_uppercase()),
        }
    }

    fn transfer(
        &self,
        source: &str,
        target: &str,
        amount: &str,
        token: Option<&str>,
        slippage: Option<f64>,
    ) -> Result<Transfer, ProviderError> {
        let source = chains::canonical(source);
        let target = chains::canonical(target);
        for chain in [&source, &target] {
            if !SUPPORTED_CHAINS.contains(&chain.as_str()) {
                return Err(ProviderError::unsupported(PROVIDER, format!("chain {chain}")));
            }
        }
        if source == target {
            return Err(ProviderError::invalid_request(
                PROVIDER,
                "source and target chain are the same",
            ));
        }
        let amount = parse_amount(amount)
            .map_err(|e| ProviderError::invalid_request(PROVIDER, e.to_string()))?;
        if amount.is_zero() {
            return Err(ProviderError::invalid_request(PROVIDER, "amount must be positive"));
        }
        let slippage = slippage.unwrap_or(self.config.default_slippage);
        if !(0.0..100.0).contains(&slippage) {
            return Err(ProviderError::invalid_request(
                PROVIDER,
                format!("slippage {slippage} out of range"),
            ));
        }
        let token = self.token_symbol(token)?;
        let decimals = token_decimals(&token);
        let base_units = to_base_units(amount, decimals)
            .map_err(|e| ProviderError::invalid_request(PROVIDER, e.to_string()))?;
        if base_units == 0 {
            return Err(ProviderError::invalid_request(
                PROVIDER,
                format!("amount {amount} is below the smallest {token} unit"),
            ));
        }
        Ok(Transfer {
            source,
            target,
            token,
            decimals,
            amount,
            base_units,
            slippage,
        })
    }

    async fn quote(&self, t: &Transfer) -> Result<HopFees, ProviderError> {
        let url = format!("{}/v1/quote", self.config.base_url.trim_end_matches('/'));
        let mut req = HttpRequest::get(url)
            .query("amount", t.base_units)
            .query("token", &t.token)
            .query("fromChain", &t.source)
            .query("toChain", &t.target)
            .query("slippage", t.slippage);
        if let Some(key) = &self.config.api_key {
            req = req.header("x-api-key", key.as_str());
        }
        let quote: HopQuote = self
            .client
            .request_json(req, &RequestOptions::group(&self.config.group))
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER, e))?;
        quote.into_fees(t.decimals)
    }

    /// Static quote from the basis-point table.
    fn fallback_fees(&self, t: &Transfer) -> HopFees {
        let lp_fees = apply_bps(t.amount, self.config.fallback_lp_fee_bps, t.decimals);
        let bonder_fee = apply_bps(t.amount, self.config.fallback_bonder_fee_bps, t.decimals);
        let estimated_received = (t.amount - lp_fees - bonder_fee).max(Decimal::ZERO);
        let keep = Decimal::ONE
            - Decimal::try_from(t.slippage / 100.0).unwrap_or(Decimal::ZERO);
        let amount_out_min = (estimated_received * keep)
            .round_dp_with_strategy(t.decimals, rust_decimal::RoundingStrategy::ToZero);
        HopFees {
            amount_in: t.amount,
            lp_fees,
            bonder_fee,
            destination_tx_fee: Decimal::ZERO,
            amount_out_min,
            estimated_received,
        }
    }

    fn build_route(&self, t: &Transfer, fees: &HopFees, source: QuoteSource) -> NormalizedRoute {
        let reliability = match source {
            QuoteSource::Fallback => self.config.reliability / 2.0,
            _ => self.config.reliability,
        };
        let mut metadata = Map::new();
        metadata.insert("source".into(), json!(source.to_string()));
        metadata.insert("feeCurrency".into(), json!(t.token));
        metadata.insert("token".into(), json!(t.token));
        metadata.insert("lpFees".into(), json!(fees.lp_fees.to_string()));
        metadata.insert("bonderFee".into(), json!(fees.bonder_fee.to_string()));
        metadata.insert(
            "destinationTxFee".into(),
            json!(fees.destination_tx_fee.to_string()),
        );
        metadata.insert("slippage".into(), json!(t.slippage));
        let fee = fees.total();
        NormalizedRoute {
            id: format!("{PROVIDER}-{}", uuid::Uuid::new_v4()),
            provider: PROVIDER.into(),
            source_chain: t.source.clone(),
            target_chain: t.target.clone(),
            input_amount: t.amount,
            output_amount: fees.estimated_received,
            fee,
            fee_percentage: percentage_of(fee, t.amount),
            estimated_time_seconds: transfer_seconds(&t.source),
            min_amount_out: fees.amount_out_min,
            max_amount_out: fees.estimated_received,
            reliability,
            metadata,
        }
    }

    async fn live_route(&self, t: &Transfer) -> Result<NormalizedRoute, ProviderError> {
        let fees = self.quote(t).await?;
        Ok(self.build_route(t, &fees, QuoteSource::Live))
    }

    fn fallback_route(&self, t: &Transfer) -> Option<NormalizedRoute> {
        if !self.config.fallback_enabled {
            return None;
        }
        Some(self.build_route(t, &self.fallback_fees(t), QuoteSource::Fallback))
    }

    fn reference_transfer(&self) -> Result<Transfer, ProviderError> {
        self.transfer(
            &self.config.reference_source,
            &self.config.reference_target,
            &self.config.reference_amount,
            None,
            None,
        )
    }

    fn fee_estimate(&self, t: &Transfer, fees: &HopFees, mut additional_data: Map<String, Value>) -> FeeEstimate {
        let total = fees.total();
        let wait_ms = transfer_seconds(&t.source) * 1000;
        additional_data.insert("referenceAmount".into(), json!(t.amount.to_string()));
        additional_data.insert("route".into(), json!(format!("{}->{}", t.source, t.target)));
        additional_data.insert("lpFees".into(), json!(fees.lp_fees.to_string()));
        additional_data.insert("bonderFee".into(), json!(fees.bonder_fee.to_string()));
        additional_data.insert(
            "destinationTxFee".into(),
            json!(fees.destination_tx_fee.to_string()),
        );
        FeeEstimate {
            network: FeeNetwork::Hop,
            available: true,
            fees: FeeTiers::new(total, total, total),
            currency: t.token.clone(),
            estimated_time_ms: FeeTiers::new(wait_ms, wait_ms, wait_ms),
            last_updated: Utc::now(),
            additional_data,
        }
    }
}

#[async_trait]
impl BridgeAdapter for HopAdapter {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn get_route(&self, req: &RouteRequest) -> Result<NormalizedRoute, ProviderError> {
        let t = self.transfer(
            &req.source_chain,
            &req.target_chain,
            &req.asset_amount,
            req.token_address.as_deref(),
            req.slippage_tolerance,
        )?;
        let (mut route, source) = fallback::resolve(
            PROVIDER,
            &self.cache,
            req.cache_key(),
            self.live_route(&t),
            || self.fallback_route(&t),
        )
        .await?;
        if source == QuoteSource::Cache {
            route.reissue_cached(format!("{PROVIDER}-{}", uuid::Uuid::new_v4()));
        }
        Ok(route)
    }
}

#[async_trait]
impl FeeOracle for HopAdapter {
    fn network(&self) -> FeeNetwork {
        FeeNetwork::Hop
    }

    async fn fetch_live(&self) -> Result<FeeEstimate, ProviderError> {
        let t = self.reference_transfer()?;
        let fees = self.quote(&t).await?;
        Ok(self.fee_estimate(&t, &fees, Map::new()))
    }

    fn static_fallback(&self) -> FeeEstimate {
        match self.reference_transfer() {
            Ok(t) => {
                let mut data = Map::new();
                data.insert("source".into(), json!(QuoteSource::Fallback.to_string()));
                self.fee_estimate(&t, &self.fallback_fees(&t), data)
            }
            Err(e) => FeeEstimate::unavailable(FeeNetwork::Hop, &e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(json: Value) -> HopQuote {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn stable_tokens_use_six_decimals() {
        assert_eq!(token_decimals("usdc"), 6);
        assert_eq!(token_decimals("USDT"), 6);
        assert_eq!(token_decimals("ETH"), 18);
        assert_eq!(token_decimals("DAI"), 18);
    }

    #[test]
    fn quote_scales_to_token_units() {
        let fees = quote(json!({
            "amountIn": "100000000",
            "slippage": 0.5,
            "amountOutMin": "99200000",
            "destinationAmountOutMin": "99200000",
            "bonderFee": "250000",
            "estimatedRecieved": "99700000",
            "deadline": 1700000000,
            "destinationDeadline": 1700000000
        }))
        .into_fees(6)
        .unwrap();
        assert_eq!(fees.amount_in, dec!(100));
        assert_eq!(fees.bonder_fee, dec!(0.25));
        assert_eq!(fees.lp_fees, Decimal::ZERO);
        assert_eq!(fees.estimated_received, dec!(99.7));
        assert_eq!(fees.total(), dec!(0.25));
    }

    #[test]
    fn accepts_corrected_spelling() {
        let fees = quote(json!({
            "amountIn": "1000000000000000000",
            "amountOutMin": "990000000000000000",
            "bonderFee": "1000000000000000",
            "lpFees": "400000000000000",
            "destinationTxFee": "100000000000000",
            "estimatedReceived": "998500000000000000"
        }))
        .into_fees(18)
        .unwrap();
        assert_eq!(fees.total(), dec!(0.0015));
    }

    #[test]
    fn rejects_output_above_input() {
        let err = quote(json!({
            "amountIn": "100",
            "amountOutMin": "100",
            "bonderFee": "0",
            "estimatedRecieved": "101"
        }))
        .into_fees(6)
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_RESPONSE");
    }
}
