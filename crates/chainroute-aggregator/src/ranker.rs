//! Multi-criteria route ranking.
//!
//! Each dimension is min–max normalized over the candidate set so that the
//! cheapest and fastest route score 1.0 and the most expensive and slowest
//! score 0.0. Reliability is already in `[0, 1]` and is used as-is. The
//! weighted sum orders the routes; equal scores fall back to provider name.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use chainroute_core::NormalizedRoute;

/// Relative importance of each dimension. Need not sum to 1.
///
/// Deserialization goes through [`RankingWeights::new`], so a settings file
/// cannot smuggle in negative, NaN or all-zero weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WeightsFields")]
pub struct RankingWeights {
    pub cost: f64,
    pub latency: f64,
    pub reliability: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            cost: 0.5,
            latency: 0.3,
            reliability: 0.2,
        }
    }
}

impl RankingWeights {
    pub fn new(cost: f64, latency: f64, reliability: f64) -> Result<Self, InvalidWeights> {
        let weights = Self {
            cost,
            latency,
            reliability,
        };
        for w in [cost, latency, reliability] {
            if !w.is_finite() || w < 0.0 {
                return Err(InvalidWeights(format!("weight {w} must be a non-negative number")));
            }
        }
        if cost + latency + reliability == 0.0 {
            return Err(InvalidWeights("at least one weight must be positive".into()));
        }
        Ok(weights)
    }
}

/// Unvalidated wire form; missing fields take the defaults.
#[derive(Deserialize)]
#[serde(default)]
struct WeightsFields {
    cost: f64,
    latency: f64,
    reliability: f64,
}

impl Default for WeightsFields {
    fn default() -> Self {
        let d = RankingWeights::default();
        Self {
            cost: d.cost,
            latency: d.latency,
            reliability: d.reliability,
        }
    }
}

impl TryFrom<WeightsFields> for RankingWeights {
    type Error = InvalidWeights;

    fn try_from(f: WeightsFields) -> Result<Self, Self::Error> {
        Self::new(f.cost, f.latency, f.reliability)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ranking weights: {0}")]
pub struct InvalidWeights(pub String);

/// Parses `"cost,latency,reliability"`, e.g. `"1,0,0"`.
impl FromStr for RankingWeights {
    type Err = InvalidWeights;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<f64>()
                    .map_err(|_| InvalidWeights(format!("'{}' is not a number", p.trim())))
            })
            .collect::<Result<Vec<_>, _>>()?;
        match parts.as_slice() {
            [cost, latency, reliability] => Self::new(*cost, *latency, *reliability),
            _ => Err(InvalidWeights(format!(
                "expected 3 comma-separated values, got {}",
                parts.len()
            ))),
        }
    }
}

/// Per-dimension scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub cost: f64,
    pub latency: f64,
    pub reliability: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredRoute {
    pub route: NormalizedRoute,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Copy)]
struct Range {
    min: f64,
    max: f64,
}

impl Range {
    fn of(values: impl Iterator<Item = f64>) -> Self {
        values.fold(
            Range {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |r, v| Range {
                min: r.min.min(v),
                max: r.max.max(v),
            },
        )
    }

    /// Lower is better: `min` → 1.0, `max` → 0.0.
    fn score_lower_better(&self, v: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 || !span.is_finite() {
            return 1.0;
        }
        ((self.max - v) / span).clamp(0.0, 1.0)
    }
}

/// Stateless ranker over the current candidate set.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteRanker;

impl RouteRanker {
    pub fn new() -> Self {
        Self
    }

    /// Routes ordered best first.
    pub fn rank(&self, routes: Vec<NormalizedRoute>, weights: &RankingWeights) -> Vec<NormalizedRoute> {
        self.rank_scored(routes, weights)
            .into_iter()
            .map(|s| s.route)
            .collect()
    }

    /// Routes ordered best first, with their scores.
    pub fn rank_scored(&self, routes: Vec<NormalizedRoute>, weights: &RankingWeights) -> Vec<ScoredRoute> {
        let cost = Range::of(routes.iter().map(|r| r.fee_percentage));
        let latency = Range::of(routes.iter().map(|r| r.estimated_time_seconds as f64));

        let mut scored: Vec<ScoredRoute> = routes
            .into_iter()
            .map(|route| {
                let breakdown = ScoreBreakdown {
                    cost: cost.score_lower_better(route.fee_percentage),
                    latency: latency.score_lower_better(route.estimated_time_seconds as f64),
                    reliability: route.reliability.clamp(0.0, 1.0),
                };
                let score = weights.cost * breakdown.cost
                    + weights.latency * breakdown.latency
                    + weights.reliability * breakdown.reliability;
                ScoredRoute {
                    route,
                    score,
                    breakdown,
                }
            })
            .collect();

        scored.sort_by(compare);
        scored
    }
}

fn compare(a: &ScoredRoute, b: &ScoredRoute) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.route.provider.cmp(&b.route.provider))
        .then_with(|| a.route.id.cmp(&b.route.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::Map;

    fn route(provider: &str, fee_pct: f64, secs: u64, reliability: f64) -> NormalizedRoute {
        NormalizedRoute {
            id: format!("{provider}-1"),
            provider: provider.into(),
            source_chain: "ethereum".into(),
            target_chain: "polygon".into(),
            input_amount: Decimal::ONE_HUNDRED,
            output_amount: Decimal::ONE_HUNDRED,
            fee: Decimal::ONE,
            fee_percentage: fee_pct,
            estimated_time_seconds: secs,
            min_amount_out: Decimal::ONE_HUNDRED,
            max_amount_out: Decimal::ONE_HUNDRED,
            reliability,
            metadata: Map::new(),
        }
    }

    fn providers(routes: &[NormalizedRoute]) -> Vec<&str> {
        routes.iter().map(|r| r.provider.as_str()).collect()
    }

    #[test]
    fn cost_weight_prefers_cheaper() {
        let routes = vec![route("b", 2.0, 30, 0.95), route("a", 1.0, 60, 0.9)];
        let ranked = RouteRanker.rank(routes, &RankingWeights::new(1.0, 0.0, 0.0).unwrap());
        assert_eq!(providers(&ranked), ["a", "b"]);
    }

    #[test]
    fn latency_weight_prefers_faster() {
        let routes = vec![route("a", 1.0, 60, 0.9), route("b", 2.0, 30, 0.95)];
        let ranked = RouteRanker.rank(routes, &RankingWeights::new(0.0, 1.0, 0.0).unwrap());
        assert_eq!(providers(&ranked), ["b", "a"]);
    }

    #[test]
    fn flat_dimension_scores_one() {
        let routes = vec![route("a", 1.0, 60, 0.5), route("b", 1.0, 60, 0.5)];
        let scored = RouteRanker.rank_scored(routes, &RankingWeights::default());
        for s in &scored {
            assert_eq!(s.breakdown.cost, 1.0);
            assert_eq!(s.breakdown.latency, 1.0);
        }
    }

    #[test]
    fn ties_break_by_provider_name() {
        let routes = vec![
            route("stargate", 1.0, 60, 0.9),
            route("across", 1.0, 60, 0.9),
            route("hop", 1.0, 60, 0.9),
        ];
        let ranked = RouteRanker.rank(routes, &RankingWeights::default());
        assert_eq!(providers(&ranked), ["across", "hop", "stargate"]);
    }

    #[test]
    fn breakdown_spans_unit_interval() {
        let routes = vec![
            route("a", 0.1, 600, 0.9),
            route("b", 0.3, 60, 0.8),
            route("c", 0.2, 300, 0.7),
        ];
        let scored = RouteRanker.rank_scored(routes, &RankingWeights::new(1.0, 1.0, 0.0).unwrap());
        let c = scored.iter().find(|s| s.route.provider == "c").unwrap();
        assert!((c.breakdown.cost - 0.5).abs() < 1e-9);
        assert!((c.breakdown.latency - 300.0 / 540.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(RouteRanker.rank(Vec::new(), &RankingWeights::default()).is_empty());
    }

    #[test]
    fn weights_parse_from_csv() {
        let w: RankingWeights = "1, 0.5, 0".parse().unwrap();
        assert_eq!(w, RankingWeights::new(1.0, 0.5, 0.0).unwrap());
        assert!("1,2".parse::<RankingWeights>().is_err());
        assert!("1,-1,0".parse::<RankingWeights>().is_err());
        assert!("a,b,c".parse::<RankingWeights>().is_err());
        assert!("0,0,0".parse::<RankingWeights>().is_err());
    }

    #[test]
    fn all_zero_weights_rejected() {
        let err = RankingWeights::new(0.0, 0.0, 0.0).unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn deserialization_validates_weights() {
        let w: RankingWeights = serde_json::from_str(r#"{"cost": 1}"#).unwrap();
        assert_eq!(w, RankingWeights::new(1.0, 0.3, 0.2).unwrap());
        assert!(serde_json::from_str::<RankingWeights>(r#"{"cost": -1}"#).is_err());
        assert!(
            serde_json::from_str::<RankingWeights>(r#"{"cost": 0, "latency": 0, "reliability": 0}"#)
                .is_err()
        );
    }
}
