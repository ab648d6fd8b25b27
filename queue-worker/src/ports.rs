//! Collaborators C8 needs that no other crate owns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payment_core_types::QueuedMessage;

use crate::error::Result;

/// Durable storage for queued messages. `resilient_dispatcher::RetryQueue`
/// only ever produces (a `QueueForRetry` fallback enqueues and walks away);
/// this is the consuming side the fallback's own doc comment calls out.
/// The in-memory reference implementation used by this crate's tests lives
/// next to the tests that need it, not in a shared module, matching every
/// other crate's `Repository`/`Store` port in this workspace.
#[async_trait]
pub trait QueuedMessageStore: Send + Sync {
    async fn enqueue(&self, message: QueuedMessage) -> Result<()>;

    async fn update(&self, message: QueuedMessage) -> Result<()>;

    /// `status ∈ {PENDING, RETRY}`, `next_retry_at ≤ now`, ordered by
    /// `priority DESC, created_at` is not tracked on the record itself
    /// (`QueuedMessage` has no `created_at`; `message_id` — a UUIDv4 — has
    /// no natural order either, so ties break on `message_id` for a
    /// deterministic, if arbitrary, order) (spec §4.8).
    async fn pick_batch(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<QueuedMessage>>;

    /// Records stuck in `PROCESSING` since before `cutoff`, for the
    /// stuck-reclaim sweep.
    async fn stuck_processing(&self, cutoff: DateTime<Utc>) -> Result<Vec<QueuedMessage>>;
}

/// Performs the actual outbound call a queued message was parked for,
/// using its preserved service key/URL/method/payload. The worker wraps
/// this in a `resilient_dispatcher::Dispatcher::call` so a requeued
/// message inherits full circuit-breaker/retry/bulkhead coverage rather
/// than bypassing C3 on replay.
#[async_trait]
pub trait OutboundInvoker: Send + Sync {
    async fn invoke(&self, message: &QueuedMessage) -> payment_core_types::Result<serde_json::Value>;
}
