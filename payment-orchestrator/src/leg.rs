//! Compensating-leg execution, generalized from the teacher's
//! `AtomicOperationHandler` commit/rollback machine. Rollback dispatch is a
//! typed enum matched exhaustively, replacing the teacher's
//! `execute_checkpoint_rollback` hook-by-name string match. The forward
//! debit/credit legs themselves run through `resilient_dispatcher::Dispatcher`
//! directly (so they inherit retry/circuit-breaker semantics) — this executor
//! only owns the compensating path, which is never retried by C3.

use std::sync::Arc;

use payment_core_types::{CoreBankingAdapter, Money};
use tracing::{error, info, warn};

use crate::error::Result;

/// A compensating action to undo a previously committed leg.
#[derive(Debug, Clone)]
pub enum RollbackAction {
    /// Credit `account` back with `amount` under `leg_id` — the
    /// compensating reversal of an earlier debit.
    CompensatingCredit {
        leg_id: String,
        account: String,
        amount: Money,
    },
    /// Nothing to undo.
    NoAction,
}

/// Named seam for compensating actions, so a reversal is never just an
/// inline call buried in the state machine.
pub struct LegExecutor {
    core_banking: Arc<dyn CoreBankingAdapter>,
}

impl LegExecutor {
    pub fn new(core_banking: Arc<dyn CoreBankingAdapter>) -> Self {
        Self { core_banking }
    }

    /// Execute a compensating action. Failure here is the orchestrator's
    /// signal to escalate (`DEBIT_CREDIT_MISMATCH`), never to retry itself
    /// (spec §4.7 invariant: only the repair engine retries past hand-off).
    pub async fn rollback(&self, action: RollbackAction) -> Result<()> {
        match action {
            RollbackAction::CompensatingCredit { leg_id, account, amount } => {
                warn!(leg_id, account, "issuing compensating credit");
                match self.core_banking.process_credit(&leg_id, &account, amount).await {
                    Ok(_) => {
                        info!(leg_id, "compensating credit succeeded");
                        Ok(())
                    }
                    Err(err) => {
                        error!(leg_id, %err, "compensating credit failed");
                        Err(err.into())
                    }
                }
            }
            RollbackAction::NoAction => Ok(()),
        }
    }
}
