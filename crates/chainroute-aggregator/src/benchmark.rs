//! Bounded history of realized bridge fees and slippage.
//!
//! Records are grouped by (bridge, source chain, destination chain, token).
//! Each group keeps at most `retention` records; an insert beyond that drops
//! the oldest by timestamp under the same lock as the insert.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use chainroute_core::NormalizedRoute;

pub const DEFAULT_RETENTION: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkKey {
    pub bridge_name: String,
    pub source_chain: String,
    pub destination_chain: String,
    pub token: String,
}

impl BenchmarkKey {
    pub fn new(
        bridge_name: impl Into<String>,
        source_chain: impl Into<String>,
        destination_chain: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            bridge_name: bridge_name.into().to_ascii_lowercase(),
            source_chain: source_chain.into().to_ascii_lowercase(),
            destination_chain: destination_chain.into().to_ascii_lowercase(),
            token: token.into().to_ascii_uppercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRecord {
    pub bridge_name: String,
    pub source_chain: String,
    pub destination_chain: String,
    pub token: String,
    pub avg_fee: Decimal,
    /// Positive when the transfer delivered less than quoted.
    pub avg_slippage_percent: f64,
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkRecord {
    pub fn key(&self) -> BenchmarkKey {
        BenchmarkKey::new(
            &self.bridge_name,
            &self.source_chain,
            &self.destination_chain,
            &self.token,
        )
    }
}

/// Retention-bounded record store.
#[derive(Debug)]
pub struct BenchmarkStore {
    retention: usize,
    records: Mutex<HashMap<BenchmarkKey, Vec<BenchmarkRecord>>>,
}

impl Default for BenchmarkStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl BenchmarkStore {
    pub fn new(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Insert in timestamp order and prune the group. Returns how many
    /// records were dropped.
    pub fn insert(&self, record: BenchmarkRecord) -> usize {
        let key = record.key();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let group = records.entry(key).or_default();

        let at = group.partition_point(|r| r.timestamp <= record.timestamp);
        group.insert(at, record);

        let excess = group.len().saturating_sub(self.retention);
        if excess > 0 {
            group.drain(..excess);
            tracing::debug!(pruned = excess, retained = group.len(), "benchmark history pruned");
        }
        excess
    }

    /// Oldest first.
    pub fn history(&self, key: &BenchmarkKey) -> Vec<BenchmarkRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.get(key).cloned().unwrap_or_default()
    }

    pub fn latest(&self, key: &BenchmarkKey) -> Option<BenchmarkRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.get(key).and_then(|g| g.last().cloned())
    }

    pub fn keys(&self) -> Vec<BenchmarkKey> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<_> = records.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self, key: &BenchmarkKey) -> usize {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.get(key).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.values().map(Vec::len).sum()
    }
}

/// Aggregate over a group's retained history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkSummary {
    #[serde(flatten)]
    pub key: BenchmarkKey,
    pub samples: usize,
    pub mean_fee: Decimal,
    pub mean_slippage_percent: f64,
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub retention: usize,
    /// Buffered append events per subscriber before lagging ones skip ahead.
    pub channel_capacity: usize,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            channel_capacity: 256,
        }
    }
}

/// Records realized routes and publishes each append.
pub struct BenchmarkService {
    store: BenchmarkStore,
    events: broadcast::Sender<BenchmarkRecord>,
}

impl Default for BenchmarkService {
    fn default() -> Self {
        Self::new(BenchmarkConfig::default())
    }
}

impl BenchmarkService {
    pub fn new(config: BenchmarkConfig) -> Self {
        let (events, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            store: BenchmarkStore::new(config.retention),
            events,
        }
    }

    pub fn store(&self) -> &BenchmarkStore {
        &self.store
    }

    /// Receive every record appended after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<BenchmarkRecord> {
        self.events.subscribe()
    }

    pub fn record(&self, record: BenchmarkRecord) {
        self.store.insert(record.clone());
        // No subscribers is fine.
        let _ = self.events.send(record);
    }

    /// Record a completed transfer. Slippage is measured against the route's
    /// quoted output.
    pub fn record_realized(
        &self,
        route: &NormalizedRoute,
        token: &str,
        realized_output: Decimal,
    ) -> BenchmarkRecord {
        let slippage = if route.output_amount.is_zero() {
            0.0
        } else {
            ((route.output_amount - realized_output) / route.output_amount * Decimal::ONE_HUNDRED)
                .to_f64()
                .unwrap_or(0.0)
        };
        let record = BenchmarkRecord {
            bridge_name: route.provider.clone(),
            source_chain: route.source_chain.clone(),
            destination_chain: route.target_chain.clone(),
            token: token.to_string(),
            avg_fee: route.fee,
            avg_slippage_percent: slippage,
            timestamp: Utc::now(),
        };
        tracing::debug!(
            bridge = %record.bridge_name,
            source_chain = %record.source_chain,
            destination_chain = %record.destination_chain,
            slippage_percent = slippage,
            "benchmark recorded"
        );
        self.record(record.clone());
        record
    }

    pub fn history(&self, key: &BenchmarkKey) -> Vec<BenchmarkRecord> {
        self.store.history(key)
    }

    pub fn summary(&self, key: &BenchmarkKey) -> Option<BenchmarkSummary> {
        let history = self.store.history(key);
        let first = history.first()?.timestamp;
        let last = history.last()?.timestamp;
        let samples = history.len();
        let fee_sum: Decimal = history.iter().map(|r| r.avg_fee).sum();
        let slippage_sum: f64 = history.iter().map(|r| r.avg_slippage_percent).sum();
        Some(BenchmarkSummary {
            key: key.clone(),
            samples,
            mean_fee: fee_sum / Decimal::from(samples),
            mean_slippage_percent: slippage_sum / samples as f64,
            first,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(minutes * 60, 0).unwrap()
    }

    fn record(minutes: i64, fee: Decimal) -> BenchmarkRecord {
        BenchmarkRecord {
            bridge_name: "hop".into(),
            source_chain: "polygon".into(),
            destination_chain: "arbitrum".into(),
            token: "USDC".into(),
            avg_fee: fee,
            avg_slippage_percent: 0.1,
            timestamp: at(minutes),
        }
    }

    fn key() -> BenchmarkKey {
        BenchmarkKey::new("hop", "polygon", "arbitrum", "usdc")
    }

    #[test]
    fn keeps_latest_hundred() {
        let store = BenchmarkStore::default();
        let mut pruned = 0;
        for i in 0..105 {
            pruned += store.insert(record(i, dec!(1)));
        }
        assert_eq!(pruned, 5);
        let history = store.history(&key());
        assert_eq!(history.len(), 100);
        assert_eq!(history[0].timestamp, record(5, dec!(1)).timestamp);
        assert_eq!(history[99].timestamp, record(104, dec!(1)).timestamp);
    }

    #[test]
    fn out_of_order_insert_prunes_by_timestamp() {
        let store = BenchmarkStore::new(3);
        for i in [10, 30, 20] {
            store.insert(record(i, dec!(1)));
        }
        // Older than everything retained: dropped immediately.
        assert_eq!(store.insert(record(5, dec!(1))), 1);
        let minutes: Vec<i64> = store
            .history(&key())
            .iter()
            .map(|r| r.timestamp.timestamp() / 60)
            .collect();
        assert_eq!(minutes, [10, 20, 30]);
    }

    #[test]
    fn groups_are_independent() {
        let store = BenchmarkStore::new(2);
        store.insert(record(1, dec!(1)));
        let mut other = record(2, dec!(1));
        other.bridge_name = "layerzero".into();
        store.insert(other);
        assert_eq!(store.len(&key()), 1);
        assert_eq!(store.total(), 2);
        assert_eq!(store.keys().len(), 2);
    }

    #[test]
    fn summary_averages_history() {
        let svc = BenchmarkService::default();
        svc.record(record(1, dec!(1)));
        svc.record(record(2, dec!(3)));
        let s = svc.summary(&key()).unwrap();
        assert_eq!(s.samples, 2);
        assert_eq!(s.mean_fee, dec!(2));
        assert!((s.mean_slippage_percent - 0.1).abs() < 1e-9);
        assert!(svc.summary(&BenchmarkKey::new("x", "y", "z", "t")).is_none());
    }
}
