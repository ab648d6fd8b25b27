//! `Create`/`PickNextBatch`/`Apply`/`Sweep` (spec §4.7), grounded on
//! `AtomicController`'s query/sweep shape: a struct holding a repository
//! handle, one method per public contract operation, `info!`/`warn!` around
//! every state transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use payment_core_types::{CorrectiveAction, RepairRecord, RepairStatus};
use tracing::{info, warn};

use crate::backoff::next_retry_at;
use crate::config::RepairEngineConfig;
use crate::error::Result;
use crate::ports::{ActionOutcome, CorrectiveActionExecutor, RepairRepository};

pub struct RepairEngine {
    repo: Arc<dyn RepairRepository>,
    executor: Arc<dyn CorrectiveActionExecutor>,
    config: RepairEngineConfig,
}

impl RepairEngine {
    pub fn new(
        repo: Arc<dyn RepairRepository>,
        executor: Arc<dyn CorrectiveActionExecutor>,
        config: RepairEngineConfig,
    ) -> Self {
        Self { repo, executor, config }
    }

    /// Called by C6 on any partial-failure transition.
    pub async fn create(&self, repair: RepairRecord) -> Result<()> {
        info!(
            reference = %repair.transaction_reference,
            ?repair.repair_type,
            priority = repair.priority,
            "repair created"
        );
        self.repo.create(repair).await
    }

    pub async fn pick_next_batch(
        &self,
        tenant_id: Option<&str>,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RepairRecord>> {
        let limit = limit.unwrap_or(self.config.default_batch_limit);
        self.repo.pick_next_batch(tenant_id, limit, now).await
    }

    /// Executes `action` against the real legs, then moves the repair to
    /// its next lifecycle state: `RESOLVED` on success; a rescheduled
    /// retry on a retryable failure; `ESCALATE` with `priority` clamped to
    /// 10 once `retry_count` reaches `max_retries` (spec §4.7).
    pub async fn apply(&self, mut repair: RepairRecord, action: CorrectiveAction, now: DateTime<Utc>) -> Result<RepairRecord> {
        repair.corrective_action = Some(action);

        if matches!(action, CorrectiveAction::NoAction) {
            self.repo.update(repair.clone()).await?;
            return Ok(repair);
        }
        if matches!(action, CorrectiveAction::Escalate) {
            repair.priority = 10;
            repair.repair_status = RepairStatus::Pending;
            self.repo.update(repair.clone()).await?;
            warn!(reference = %repair.transaction_reference, "repair escalated");
            return Ok(repair);
        }
        if matches!(action, CorrectiveAction::CancelTransaction) {
            return self.apply_terminal_outcome(repair, action, now).await;
        }

        repair.repair_status = RepairStatus::InProgress;
        match self.executor.execute(&repair, action).await {
            Ok(ActionOutcome::Succeeded) => {
                repair.repair_status = RepairStatus::Resolved;
                repair.resolved_at = Some(now);
                repair.resolved_by = Some("repair-engine".to_string());
                info!(reference = %repair.transaction_reference, ?action, "repair resolved");
            }
            Ok(ActionOutcome::Failed) | Err(_) => {
                repair.retry_count += 1;
                if repair.retry_count >= repair.max_retries {
                    repair.corrective_action = Some(CorrectiveAction::Escalate);
                    repair.priority = 10;
                    repair.repair_status = RepairStatus::Pending;
                    repair.next_retry_at = None;
                    warn!(
                        reference = %repair.transaction_reference,
                        retry_count = repair.retry_count,
                        "retries exhausted, escalating"
                    );
                } else {
                    repair.next_retry_at = Some(next_retry_at(&self.config, now, repair.retry_count));
                    repair.repair_status = RepairStatus::Pending;
                    warn!(
                        reference = %repair.transaction_reference,
                        retry_count = repair.retry_count,
                        next_retry_at = ?repair.next_retry_at,
                        "corrective action failed, rescheduled"
                    );
                }
            }
        }
        self.repo.update(repair.clone()).await?;
        Ok(repair)
    }

    async fn apply_terminal_outcome(
        &self,
        mut repair: RepairRecord,
        action: CorrectiveAction,
        now: DateTime<Utc>,
    ) -> Result<RepairRecord> {
        repair.repair_status = RepairStatus::InProgress;
        let outcome = self.executor.execute(&repair, action).await;
        match outcome {
            Ok(ActionOutcome::Succeeded) => {
                repair.repair_status = RepairStatus::Cancelled;
                repair.resolved_at = Some(now);
                repair.resolved_by = Some("repair-engine".to_string());
            }
            _ => {
                repair.repair_status = RepairStatus::Failed;
            }
        }
        self.repo.update(repair.clone()).await?;
        Ok(repair)
    }

    /// Finds repairs whose `timeout_at` has passed and retires them:
    /// high-priority ones (≥8, an escalation-priority band already) are
    /// handed to an operator via `ESCALATE`; the rest are marked `FAILED`.
    /// `timeout_at` is cleared either way so a swept record is never
    /// re-picked by a later sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<Vec<RepairRecord>> {
        let due = self.repo.due_for_timeout(now).await?;
        let mut swept = Vec::with_capacity(due.len());
        for mut repair in due {
            repair.timeout_at = None;
            if repair.priority >= 8 {
                repair.corrective_action = Some(CorrectiveAction::Escalate);
                repair.priority = 10;
                repair.repair_status = RepairStatus::Pending;
                warn!(reference = %repair.transaction_reference, "timeout swept to escalation");
            } else {
                repair.repair_status = RepairStatus::Failed;
                warn!(reference = %repair.transaction_reference, "timeout swept to failed");
            }
            self.repo.update(repair.clone()).await?;
            swept.push(repair);
        }
        Ok(swept)
    }
}
