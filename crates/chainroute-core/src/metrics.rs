//! Client counters. Observability only; nothing reads them to make decisions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct ClientMetrics {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    retried_requests: AtomicU64,
    rate_limit_hits: AtomicU64,
}

/// Serializable copy of [`ClientMetrics`] plus queue gauges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub retried_requests: u64,
    pub rate_limit_hits: u64,
    pub queue_in_flight: usize,
    pub queue_waiting: usize,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retried_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rate_limit_hit(&self) {
        self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, queue_in_flight: usize, queue_waiting: usize) -> ClientMetricsSnapshot {
        ClientMetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            retried_requests: self.retried_requests.load(Ordering::Relaxed),
            rate_limit_hits: self.rate_limit_hits.load(Ordering::Relaxed),
            queue_in_flight,
            queue_waiting,
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.total_requests,
            &self.successful_requests,
            &self.failed_requests,
            &self.retried_requests,
            &self.rate_limit_hits,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_and_reset() {
        let m = ClientMetrics::new();
        m.record_request();
        m.record_retry();
        m.record_retry();
        m.record_success();
        let snap = m.snapshot(1, 0);
        assert_eq!(snap.total_requests, 1);
        assert_eq!(snap.retried_requests, 2);
        assert_eq!(snap.queue_in_flight, 1);

        m.reset();
        assert_eq!(m.snapshot(0, 0), ClientMetricsSnapshot::default());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let json = serde_json::to_value(ClientMetrics::new().snapshot(0, 0)).unwrap();
        assert!(json.get("rateLimitHits").is_some());
    }
}
