//! chainroute-aggregator — fan-out, ranking, fee estimation and benchmarks.
//!
//! - [`BridgeAggregator`] — queries every enabled [`BridgeAdapter`](chainroute_core::BridgeAdapter)
//!   concurrently and keeps whatever succeeds
//! - [`RouteRanker`] — weighted min–max scoring of normalized routes
//! - [`FeeEstimationService`] — per-network estimates that never fail
//! - [`BenchmarkService`] — retention-bounded history of realized transfers
//!
//! # Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainroute_aggregator::{AggregatorConfig, BridgeAggregator};
//! use chainroute_core::{BridgeAdapter, RouteRequest};
//!
//! # async fn run(adapters: Vec<Arc<dyn BridgeAdapter>>) {
//! let aggregator = BridgeAggregator::new(adapters, AggregatorConfig::default());
//! let result = aggregator
//!     .get_routes(&RouteRequest::new("ethereum", "arbitrum", "250"))
//!     .await;
//! if let Some(best) = result.best_route() {
//!     println!("{} → {}", best.provider, best.output_amount);
//! }
//! # }
//! ```

pub mod aggregator;
pub mod benchmark;
pub mod fees;
pub mod ranker;

pub use aggregator::{AggregatedRoutes, AggregatorConfig, BridgeAggregator, ProviderFailure};
pub use benchmark::{
    BenchmarkConfig, BenchmarkKey, BenchmarkRecord, BenchmarkService, BenchmarkStore,
    BenchmarkSummary, DEFAULT_RETENTION,
};
pub use fees::{FeeEstimationService, FeeServiceConfig};
pub use ranker::{InvalidWeights, RankingWeights, RouteRanker, ScoreBreakdown, ScoredRoute};
