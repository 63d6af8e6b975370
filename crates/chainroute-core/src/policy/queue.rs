//! Global admission control: bounds in-flight upstream calls across all groups.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::TransportError;

/// Default maximum number of concurrent upstream calls.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Bounded FIFO admission queue backed by a Tokio semaphore.
///
/// Every admitted call holds a [`QueuePermit`]; the number of live permits
/// never exceeds `max_concurrency`.
#[derive(Clone)]
pub struct RequestQueue {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    waiting: Arc<AtomicUsize>,
}

/// Proof of admission. Dropping it frees the slot.
#[derive(Debug)]
pub struct QueuePermit {
    _permit: OwnedSemaphorePermit,
}

impl RequestQueue {
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free slot.
    pub async fn admit(&self) -> Result<QueuePermit, TransportError> {
        self.waiting.fetch_add(1, Ordering::Relaxed);
        let permit = self.semaphore.clone().acquire_owned().await;
        self.waiting.fetch_sub(1, Ordering::Relaxed);
        let permit = permit.map_err(|_| TransportError::Other("request queue closed".into()))?;
        Ok(QueuePermit { _permit: permit })
    }

    /// Calls currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max_concurrency - self.semaphore.available_permits()
    }

    /// Calls waiting for a slot.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("max_concurrency", &self.max_concurrency)
            .field("in_flight", &self.in_flight())
            .field("waiting", &self.waiting())
            .finish()
    }
}
