//! The live → cache → static fallback ladder.

use std::future::Future;
use std::hash::Hash;

use crate::cache::QuoteCache;
use crate::error::ProviderError;
use crate::types::QuoteSource;

/// Resolve a value by trying, in order:
/// 1. `live`, refreshing the cache on success
/// 2. a still-valid cache entry for `key`
/// 3. `fallback()`, which also refreshes the cache when it yields a value
///
/// Request-shape errors (`UnsupportedRoute`, `InvalidRequest`) skip the
/// ladder: a cached or static answer for a request the provider rejects
/// would be wrong, not degraded.
pub async fn resolve<K, V, Fut, F>(
    label: &str,
    cache: &QuoteCache<K, V>,
    key: K,
    live: Fut,
    fallback: F,
) -> Result<(V, QuoteSource), ProviderError>
where
    K: Eq + Hash,
    V: Clone,
    Fut: Future<Output = Result<V, ProviderError>>,
    F: FnOnce() -> Option<V>,
{
    let err = match live.await {
        Ok(value) => {
            cache.insert(key, value.clone());
            return Ok((value, QuoteSource::Live));
        }
        Err(e) => e,
    };

    if matches!(
        err,
        ProviderError::UnsupportedRoute { .. } | ProviderError::InvalidRequest { .. }
    ) {
        return Err(err);
    }

    if let Some(value) = cache.get(&key) {
        tracing::warn!(provider = label, error = %err, "live call failed — serving cached value");
        return Ok((value, QuoteSource::Cache));
    }

    match fallback() {
        Some(value) => {
            tracing::warn!(provider = label, error = %err, "live call failed, no valid cache — serving static fallback");
            cache.insert(key, value.clone());
            Ok((value, QuoteSource::Fallback))
        }
        None => Err(err),
    }
}
