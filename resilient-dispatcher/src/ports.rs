//! Collaborator traits C3's fallback behaviors call out to.

use async_trait::async_trait;
use payment_core_types::QueuedMessage;

use crate::error::Result;

/// Where a `QueueForRetry` fallback parks a deferred call. queue-worker
/// owns the consuming side; this crate only ever produces.
#[async_trait]
pub trait RetryQueue: Send + Sync {
    async fn enqueue(&self, message: QueuedMessage) -> Result<()>;
}

/// Where a `CachedValue` fallback reads its last known-good response from.
#[async_trait]
pub trait FallbackCache: Send + Sync {
    async fn get(&self, service: &str, tenant: &str, key: &str) -> Option<serde_json::Value>;
    async fn put(&self, service: &str, tenant: &str, key: &str, value: serde_json::Value);
}
