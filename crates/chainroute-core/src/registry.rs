//! Per-group policy registry: exactly one token bucket and one circuit breaker
//! per request group, created lazily on first use and kept until reset.
//!
//! A registry is constructed explicitly and shared via `Arc`, so tests can
//! build isolated registries instead of sharing process-wide state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::policy::{
    CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, RateLimiterConfig, TokenBucket,
};

/// Registry configuration: defaults plus per-group overrides.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    pub rate_limiter: RateLimiterConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limiter_overrides: HashMap<String, RateLimiterConfig>,
    pub circuit_breaker_overrides: HashMap<String, CircuitBreakerConfig>,
}

/// The guards owned by a single group.
#[derive(Debug)]
pub struct GroupPolicy {
    pub bucket: TokenBucket,
    pub circuit: CircuitBreaker,
}

/// Circuit status of one group, for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitStatus {
    pub group: String,
    #[serde(flatten)]
    pub circuit: CircuitSnapshot,
    pub available_tokens: f64,
}

#[derive(Debug, Default)]
pub struct PolicyRegistry {
    config: RegistryConfig,
    groups: Mutex<HashMap<String, Arc<GroupPolicy>>>,
}

impl PolicyRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            groups: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<GroupPolicy>>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the group's guards, creating them on first use.
    pub fn group(&self, name: &str) -> Arc<GroupPolicy> {
        let mut groups = self.lock();
        if let Some(policy) = groups.get(name) {
            return policy.clone();
        }
        let bucket_cfg = self
            .config
            .rate_limiter_overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.config.rate_limiter.clone());
        let breaker_cfg = self
            .config
            .circuit_breaker_overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.config.circuit_breaker.clone());
        tracing::debug!(group = name, "creating policy group");
        let policy = Arc::new(GroupPolicy {
            bucket: TokenBucket::new(bucket_cfg),
            circuit: CircuitBreaker::new(breaker_cfg),
        });
        groups.insert(name.to_string(), policy.clone());
        policy
    }

    /// Status of one group's breaker, or `None` if the group was never used.
    pub fn circuit_status(&self, name: &str) -> Option<CircuitStatus> {
        let policy = self.lock().get(name).cloned()?;
        Some(status_of(name, &policy))
    }

    /// Status of every known group, sorted by group name.
    pub fn circuit_statuses(&self) -> Vec<CircuitStatus> {
        let groups: Vec<(String, Arc<GroupPolicy>)> = self
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut out: Vec<CircuitStatus> = groups
            .iter()
            .map(|(name, policy)| status_of(name, policy))
            .collect();
        out.sort_by(|a, b| a.group.cmp(&b.group));
        out
    }

    /// Close one group's breaker. Returns `false` if the group is unknown.
    pub fn reset_circuit(&self, name: &str) -> bool {
        match self.lock().get(name) {
            Some(policy) => {
                policy.circuit.reset();
                tracing::info!(group = name, "circuit reset by operator");
                true
            }
            None => false,
        }
    }

    /// Close every breaker.
    pub fn reset_all(&self) {
        for policy in self.lock().values() {
            policy.circuit.reset();
        }
    }

    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

fn status_of(name: &str, policy: &GroupPolicy) -> CircuitStatus {
    CircuitStatus {
        group: name.to_string(),
        circuit: policy.circuit.snapshot(),
        available_tokens: policy.bucket.available(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CircuitState;
    use std::time::Duration;

    #[test]
    fn same_group_returns_same_guards() {
        let reg = PolicyRegistry::default();
        let a = reg.group("quotes");
        let b = reg.group("quotes");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &reg.group("fees")));
    }

    #[test]
    fn overrides_apply_per_group() {
        let mut config = RegistryConfig::default();
        config.circuit_breaker_overrides.insert(
            "hop".into(),
            CircuitBreakerConfig {
                failure_threshold: 1,
                recovery_timeout: Duration::from_secs(60),
                success_threshold: 1,
            },
        );
        let reg = PolicyRegistry::new(config);
        reg.group("hop").circuit.on_failure();
        reg.group("stellar").circuit.on_failure();

        assert_eq!(reg.group("hop").circuit.state(), CircuitState::Open);
        assert_eq!(reg.group("stellar").circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn status_and_reset() {
        let reg = PolicyRegistry::default();
        assert!(reg.circuit_status("quotes").is_none());
        assert!(!reg.reset_circuit("quotes"));

        let g = reg.group("quotes");
        for _ in 0..5 {
            g.circuit.on_failure();
        }
        let status = reg.circuit_status("quotes").unwrap();
        assert_eq!(status.circuit.state, CircuitState::Open);

        assert!(reg.reset_circuit("quotes"));
        assert_eq!(g.circuit.state(), CircuitState::Closed);
    }

    #[test]
    fn statuses_sorted_by_group() {
        let reg = PolicyRegistry::default();
        reg.group("quotes");
        reg.group("fees");
        let names: Vec<_> = reg.circuit_statuses().into_iter().map(|s| s.group).collect();
        assert_eq!(names, vec!["fees", "quotes"]);
    }
}
