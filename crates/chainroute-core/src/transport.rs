//! The `HttpTransport` trait — the seam between the policy engine and the network.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{HttpRequest, HttpResponse};

/// Executes a single HTTP exchange.
///
/// Implementations report only transport-level failures as `Err`
/// (`Network`, `Timeout`); any status code the server answers with is
/// returned as `Ok(HttpResponse)` so the client can classify it.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn HttpTransport>`.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn execute(&self, req: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Identifier used in logs.
    fn name(&self) -> &str {
        "http"
    }
}
