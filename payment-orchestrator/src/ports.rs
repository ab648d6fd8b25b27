//! Collaborators C6 needs that no other crate owns: where a repair gets
//! filed, and where a dispatched-but-unacknowledged transaction waits for
//! its clearing ack.

use async_trait::async_trait;
use payment_core_types::RepairRecord;

use crate::error::Result;

/// Where C6 files a repair record on any partial-failure transition. The
/// repair engine (C7) is the only thing that ever retries a leg past this
/// point (spec §4.7 invariant); C6 never loops on its own.
#[async_trait]
pub trait RepairSink: Send + Sync {
    async fn create(&self, repair: RepairRecord) -> Result<()>;
}

/// Tracks transactions sitting in `COMPLETED_PENDING_ACK`, so a later
/// clearing-system ack (or ack-timeout sweep) can find them by
/// `transaction_reference`.
#[async_trait]
pub trait PendingAckStore: Send + Sync {
    async fn record(&self, transaction_reference: &str, tenant_id: &str);
    async fn resolve(&self, transaction_reference: &str) -> bool;
}
