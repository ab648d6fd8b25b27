use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payment_core_types::{CorrectiveAction, LegStatus, RepairRecord, RepairStatus, RepairType};
use proptest::prelude::*;
use repair_engine::ports::{ActionOutcome, CorrectiveActionExecutor, RepairRepository};
use repair_engine::{RepairEngine, RepairEngineConfig};

struct InMemoryRepairRepository {
    records: Mutex<HashMap<(String, String), RepairRecord>>,
}

impl InMemoryRepairRepository {
    fn new() -> Self {
        Self { records: Mutex::new(HashMap::new()) }
    }

    fn key(repair: &RepairRecord) -> (String, String) {
        (repair.transaction_reference.clone(), repair.tenant_id.clone())
    }
}

#[async_trait]
impl RepairRepository for InMemoryRepairRepository {
    async fn create(&self, repair: RepairRecord) -> repair_engine::Result<()> {
        self.records.lock().unwrap().insert(Self::key(&repair), repair);
        Ok(())
    }

    async fn get(&self, transaction_reference: &str, tenant_id: &str) -> repair_engine::Result<Option<RepairRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(transaction_reference.to_string(), tenant_id.to_string()))
            .cloned())
    }

    async fn update(&self, repair: RepairRecord) -> repair_engine::Result<()> {
        self.records.lock().unwrap().insert(Self::key(&repair), repair);
        Ok(())
    }

    async fn pick_next_batch(
        &self,
        tenant_id: Option<&str>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> repair_engine::Result<Vec<RepairRecord>> {
        let mut candidates: Vec<RepairRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| matches!(r.repair_status, RepairStatus::Pending))
            .filter(|r| r.retry_count < r.max_retries)
            .filter(|r| r.next_retry_at.map_or(true, |t| t <= now))
            .filter(|r| tenant_id.map_or(true, |t| r.tenant_id == t))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn due_for_timeout(&self, now: DateTime<Utc>) -> repair_engine::Result<Vec<RepairRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| !r.repair_status.is_terminal())
            .filter(|r| r.timeout_at.map_or(false, |t| t <= now))
            .cloned()
            .collect())
    }
}

struct NullExecutor;

#[async_trait]
impl CorrectiveActionExecutor for NullExecutor {
    async fn execute(&self, _repair: &RepairRecord, _action: CorrectiveAction) -> repair_engine::Result<ActionOutcome> {
        Ok(ActionOutcome::Succeeded)
    }
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
}

fn terminal_status(resolved: bool) -> RepairStatus {
    if resolved { RepairStatus::Resolved } else { RepairStatus::Cancelled }
}

fn repair_with_status(reference: &str, status: RepairStatus, priority: u8, retry_count: u32, max_retries: u32) -> RepairRecord {
    RepairRecord {
        transaction_reference: reference.to_string(),
        tenant_id: "tenant-a".to_string(),
        repair_type: RepairType::DebitTimeout,
        repair_status: status,
        debit_status: LegStatus::Succeeded,
        credit_status: LegStatus::NotStarted,
        debit_leg_id: Some("debit-1".to_string()),
        credit_leg_id: None,
        retry_count,
        max_retries,
        next_retry_at: None,
        timeout_at: None,
        priority,
        corrective_action: Some(CorrectiveAction::RetryCredit),
        resolution_notes: None,
        created_at: now(),
        resolved_at: None,
        resolved_by: None,
    }
}

fn status_strategy() -> impl Strategy<Value = RepairStatus> {
    prop_oneof![
        Just(RepairStatus::Pending),
        Just(RepairStatus::Assigned),
        Just(RepairStatus::InProgress),
        Just(RepairStatus::Resolved),
        Just(RepairStatus::Failed),
        Just(RepairStatus::Cancelled),
    ]
}

proptest! {
    /// However a batch of repair records is seeded — any mix of statuses,
    /// retry counts and priorities — `PickNextBatch` never surfaces one
    /// whose status is terminal (RESOLVED or CANCELLED).
    #[test]
    fn prop_terminal_records_never_picked(
        statuses in prop::collection::vec(status_strategy(), 1..20),
        priority in 1u8..=10,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let repo = Arc::new(InMemoryRepairRepository::new());
            let engine = RepairEngine::new(repo.clone(), Arc::new(NullExecutor), RepairEngineConfig::default());

            for (i, status) in statuses.iter().enumerate() {
                let reference = format!("tx-{i}");
                engine
                    .create(repair_with_status(&reference, *status, priority, 0, 3))
                    .await
                    .unwrap();
            }

            let batch = engine.pick_next_batch(None, None, now()).await.unwrap();
            for picked in &batch {
                prop_assert!(!picked.repair_status.is_terminal());
            }
            Ok(())
        })?;
    }

    /// A record whose `retry_count` has already reached `max_retries` is
    /// never picked, even while still nominally PENDING — it's waiting on
    /// an operator via escalation, not on another automatic attempt.
    #[test]
    fn prop_exhausted_retries_never_picked(max_retries in 1u32..5, resolved in any::<bool>()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let repo = Arc::new(InMemoryRepairRepository::new());
            let engine = RepairEngine::new(repo.clone(), Arc::new(NullExecutor), RepairEngineConfig::default());

            engine
                .create(repair_with_status("tx-exhausted", terminal_status(resolved), 5, max_retries, max_retries))
                .await
                .unwrap();
            engine
                .create(repair_with_status("tx-exhausted-pending", RepairStatus::Pending, 5, max_retries, max_retries))
                .await
                .unwrap();

            let batch = engine.pick_next_batch(None, None, now()).await.unwrap();
            prop_assert!(batch.iter().all(|r| r.transaction_reference != "tx-exhausted"));
            prop_assert!(batch.iter().all(|r| r.transaction_reference != "tx-exhausted-pending"));
            Ok(())
        })?;
    }
}
