//! Normalized, provider-agnostic data model.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A request for cross-chain routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub source_chain: String,
    pub target_chain: String,
    /// Human-readable decimal amount, e.g. `"250.5"`.
    pub asset_amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    /// Slippage tolerance in percent, e.g. `0.5`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage_tolerance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_address: Option<String>,
}

impl RouteRequest {
    pub fn new(
        source_chain: impl Into<String>,
        target_chain: impl Into<String>,
        asset_amount: impl Into<String>,
    ) -> Self {
        Self {
            source_chain: source_chain.into(),
            target_chain: target_chain.into(),
            asset_amount: asset_amount.into(),
            token_address: None,
            slippage_tolerance: None,
            recipient_address: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token_address = Some(token.into());
        self
    }

    pub fn with_slippage(mut self, percent: f64) -> Self {
        self.slippage_tolerance = Some(percent);
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient_address = Some(recipient.into());
        self
    }

    /// Key used to cache quotes for identical requests.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.source_chain.to_ascii_lowercase(),
            self.target_chain.to_ascii_lowercase(),
            self.asset_amount,
            self.token_address.as_deref().unwrap_or("-").to_ascii_lowercase(),
            self.slippage_tolerance.map(|s| s.to_string()).unwrap_or_default(),
        )
    }
}

/// Which rung of the fallback ladder produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSource {
    Live,
    Cache,
    Fallback,
}

impl QuoteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cache => "cache",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-agnostic route used for ranking. Amounts are in human units of
/// the bridged asset; `fee` is in the unit named by `metadata.feeCurrency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRoute {
    pub id: String,
    pub provider: String,
    pub source_chain: String,
    pub target_chain: String,
    pub input_amount: Decimal,
    pub output_amount: Decimal,
    pub fee: Decimal,
    /// Fee as a percentage of `input_amount`, comparable across providers.
    pub fee_percentage: f64,
    pub estimated_time_seconds: u64,
    pub min_amount_out: Decimal,
    pub max_amount_out: Decimal,
    /// In `[0, 1]`.
    pub reliability: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl NormalizedRoute {
    /// Mark the route as served from a degraded source.
    pub fn mark_source(&mut self, source: QuoteSource) {
        self.metadata
            .insert("source".into(), Value::String(source.to_string()));
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }

    /// Re-serve a cached route under a fresh `id`. The id it was first issued
    /// under goes to `metadata.cachedRouteId`. A route that came from a static
    /// table keeps its `fallback` marker; anything else is marked `cache`.
    pub fn reissue_cached(&mut self, id: String) {
        let original = std::mem::replace(&mut self.id, id);
        self.metadata
            .insert("cachedRouteId".into(), Value::String(original));
        if self.source() != Some(QuoteSource::Fallback.as_str()) {
            self.mark_source(QuoteSource::Cache);
        }
    }
}

/// Networks the fee service can estimate for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeNetwork {
    Stellar,
    LayerZero,
    Hop,
}

impl FeeNetwork {
    pub const ALL: [FeeNetwork; 3] = [Self::Stellar, Self::LayerZero, Self::Hop];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stellar => "stellar",
            Self::LayerZero => "layerzero",
            Self::Hop => "hop",
        }
    }
}

impl std::fmt::Display for FeeNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported network: {0}")]
pub struct UnsupportedNetwork(pub String);

impl FromStr for FeeNetwork {
    type Err = UnsupportedNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stellar" | "xlm" => Ok(Self::Stellar),
            "layerzero" | "lz" => Ok(Self::LayerZero),
            "hop" => Ok(Self::Hop),
            other => Err(UnsupportedNetwork(other.to_string())),
        }
    }
}

/// A value per speed tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTiers<T> {
    pub slow: T,
    pub standard: T,
    pub fast: T,
}

impl<T> FeeTiers<T> {
    pub fn new(slow: T, standard: T, fast: T) -> Self {
        Self {
            slow,
            standard,
            fast,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> FeeTiers<U> {
        FeeTiers {
            slow: f(self.slow),
            standard: f(self.standard),
            fast: f(self.fast),
        }
    }
}

/// Normalized fee estimate for one network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
    pub network: FeeNetwork,
    pub available: bool,
    pub fees: FeeTiers<Decimal>,
    pub currency: String,
    pub estimated_time_ms: FeeTiers<u64>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub additional_data: Map<String, Value>,
}

impl FeeEstimate {
    /// An estimate with no usable fees, for networks nobody can answer for.
    pub fn unavailable(network: FeeNetwork, reason: &str) -> Self {
        let mut additional_data = Map::new();
        additional_data.insert("reason".into(), Value::String(reason.to_string()));
        Self {
            network,
            available: false,
            fees: FeeTiers::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            currency: String::new(),
            estimated_time_ms: FeeTiers::new(0, 0, 0),
            last_updated: Utc::now(),
            additional_data,
        }
    }
}
