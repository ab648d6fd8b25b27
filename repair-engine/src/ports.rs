//! Collaborators C7 needs that no other crate owns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payment_core_types::{CorrectiveAction, RepairRecord};

use crate::error::Result;

/// Durable storage for repair records. The in-memory reference
/// implementation used by this crate's own tests lives next to the tests
/// that need it, the way `resilient-dispatcher`'s `InMemoryCache`/
/// `InMemoryQueue` do, rather than in a shared `testing` module — C7's
/// repository shape (query-by-status/priority) is specific to this crate.
#[async_trait]
pub trait RepairRepository: Send + Sync {
    async fn create(&self, repair: RepairRecord) -> Result<()>;

    async fn get(&self, transaction_reference: &str, tenant_id: &str) -> Result<Option<RepairRecord>>;

    async fn update(&self, repair: RepairRecord) -> Result<()>;

    /// `status = PENDING`, `retry_count < max_retries`, `next_retry_at <= now`,
    /// ordered by `priority DESC, created_at ASC` (spec §4.7).
    async fn pick_next_batch(
        &self,
        tenant_id: Option<&str>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RepairRecord>>;

    /// Non-terminal records whose `timeout_at <= now` (spec §4.7 `Sweep`).
    async fn due_for_timeout(&self, now: DateTime<Utc>) -> Result<Vec<RepairRecord>>;
}

/// Whether a corrective action, once actually executed against the ledger
/// or clearing system, moved the underlying legs into a resolved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    Failed,
}

/// Executes a corrective action against the real legs of a transaction.
/// `RepairRecord` carries leg ids and statuses but not account/amount data
/// (that lives in the original `PaymentInstruction`, owned by whatever
/// replays it) — the executor is the seam a transport/storage layer wires
/// up to look that instruction back up and perform the idempotent replay
/// (spec §4.6 "a crashed orchestrator can restart from the persisted
/// repair record").
#[async_trait]
pub trait CorrectiveActionExecutor: Send + Sync {
    async fn execute(&self, repair: &RepairRecord, action: CorrectiveAction) -> Result<ActionOutcome>;
}
