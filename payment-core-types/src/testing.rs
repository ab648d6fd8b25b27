//! In-memory reference collaborators. Built the way the teacher builds
//! its fixtures: small, inline, no external mocking crate. These are the
//! "in-memory reference implementation sufficient to exercise every
//! invariant in tests" that SPEC_FULL.md promises in place of a chosen
//! persistence technology.

use crate::error::{CoreError, Result};
use crate::model::*;
use crate::ports::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A settable clock for deterministic tests.
#[derive(Clone)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// Advance the clock by a duration, for testing timeouts/backoff.
    pub async fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.now.write().await;
        *guard += delta;
    }

    pub async fn set(&self, now: DateTime<Utc>) {
        *self.now.write().await = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        // try_read: tests never hold the write lock across an await that
        // also needs `now()`, so this never contends.
        *self.now.try_read().expect("FixedClock lock poisoned or contended")
    }
}

/// A monotonic, in-process id generator. UUIDs are still random (v4);
/// sequences are deterministic per series name.
#[derive(Default)]
pub struct CountingIdGenerator {
    sequences: counters::Counters,
}

mod counters {
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct Counters(Mutex<HashMap<String, u64>>);

    impl Counters {
        pub fn next(&self, series: &str) -> u64 {
            let mut guard = self.0.lock().expect("counters lock poisoned");
            let entry = guard.entry(series.to_string()).or_insert(0);
            *entry += 1;
            *entry
        }
    }
}

impl IdGenerator for CountingIdGenerator {
    fn new_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }

    fn next_sequence(&self, series: &str) -> u64 {
        self.sequences.next(series)
    }
}

struct Account {
    balance: rust_decimal::Decimal,
    currency: Currency,
    bank_code: String,
    closed: bool,
}

/// An in-memory core-banking double: balances in a map, idempotent via a
/// leg-id cache, with a scripted-failure hook for fault injection.
#[derive(Clone)]
pub struct InMemoryCoreBanking {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    applied_legs: Arc<RwLock<HashMap<String, LegReceipt>>>,
    scripted_failures: Arc<RwLock<HashMap<String, CoreError>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCoreBanking {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            applied_legs: Arc::new(RwLock::new(HashMap::new())),
            scripted_failures: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    pub async fn open_account(&self, account: &str, bank_code: &str, balance: Money) {
        self.accounts.write().await.insert(
            account.to_string(),
            Account {
                balance: balance.amount(),
                currency: balance.currency(),
                bank_code: bank_code.to_string(),
                closed: false,
            },
        );
    }

    pub async fn close_account(&self, account: &str) {
        if let Some(acc) = self.accounts.write().await.get_mut(account) {
            acc.closed = true;
        }
    }

    /// The next call to process this `leg_id` fails with `err`, once.
    pub async fn script_failure(&self, leg_id: &str, err: CoreError) {
        self.scripted_failures
            .write()
            .await
            .insert(leg_id.to_string(), err);
    }

    pub async fn balance_of(&self, account: &str) -> rust_decimal::Decimal {
        self.accounts
            .read()
            .await
            .get(account)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    async fn take_scripted_failure(&self, leg_id: &str) -> Option<CoreError> {
        self.scripted_failures.write().await.remove(leg_id)
    }

    async fn apply_delta(&self, leg_id: &str, account: &str, delta: rust_decimal::Decimal) -> Result<LegReceipt> {
        if let Some(existing) = self.applied_legs.read().await.get(leg_id) {
            return Ok(existing.clone());
        }
        if let Some(err) = self.take_scripted_failure(leg_id).await {
            return Err(err);
        }

        let mut accounts = self.accounts.write().await;
        let acc = accounts
            .get_mut(account)
            .ok_or_else(|| CoreError::Other(format!("unknown account {}", account)))?;
        if acc.closed {
            return Err(CoreError::AccountClosed {
                account: account.to_string(),
            });
        }
        if delta.is_sign_negative() && acc.balance + delta < rust_decimal::Decimal::ZERO {
            return Err(CoreError::InsufficientFunds {
                account: account.to_string(),
            });
        }
        acc.balance += delta;
        drop(accounts);

        let receipt = LegReceipt {
            leg_id: leg_id.to_string(),
            outcome: LegOutcome::Succeeded {
                external_reference: None,
            },
            completed_at: self.clock.now(),
        };
        self.applied_legs
            .write()
            .await
            .insert(leg_id.to_string(), receipt.clone());
        Ok(receipt)
    }
}

#[async_trait]
impl CoreBankingAdapter for InMemoryCoreBanking {
    async fn get_account_info(&self, account: &str) -> Result<AccountInfo> {
        let accounts = self.accounts.read().await;
        let acc = accounts
            .get(account)
            .ok_or_else(|| CoreError::Other(format!("unknown account {}", account)))?;
        Ok(AccountInfo {
            account: account.to_string(),
            bank_code: acc.bank_code.clone(),
            currency: acc.currency,
            closed: acc.closed,
        })
    }

    async fn validate_account(&self, account: &str) -> Result<bool> {
        Ok(self.accounts.read().await.contains_key(account))
    }

    async fn get_balance(&self, account: &str) -> Result<Money> {
        let accounts = self.accounts.read().await;
        let acc = accounts
            .get(account)
            .ok_or_else(|| CoreError::Other(format!("unknown account {}", account)))?;
        Money::new(acc.balance, acc.currency)
    }

    async fn has_sufficient_funds(&self, account: &str, amount: Money) -> Result<bool> {
        let accounts = self.accounts.read().await;
        let acc = accounts
            .get(account)
            .ok_or_else(|| CoreError::Other(format!("unknown account {}", account)))?;
        Ok(acc.balance >= amount.amount())
    }

    async fn process_debit(&self, leg_id: &str, account: &str, amount: Money) -> Result<LegReceipt> {
        self.apply_delta(leg_id, account, -amount.amount()).await
    }

    async fn process_credit(&self, leg_id: &str, account: &str, amount: Money) -> Result<LegReceipt> {
        self.apply_delta(leg_id, account, amount.amount()).await
    }

    async fn process_transfer(
        &self,
        leg_id: &str,
        from_account: &str,
        to_account: &str,
        amount: Money,
    ) -> Result<LegReceipt> {
        self.apply_delta(&format!("{}-FROM", leg_id), from_account, -amount.amount())
            .await?;
        self.apply_delta(&format!("{}-TO", leg_id), to_account, amount.amount())
            .await
    }

    async fn hold_funds(&self, _account: &str, _amount: Money) -> Result<String> {
        Ok(Uuid::new_v4().to_string())
    }

    async fn release_funds(&self, _hold_id: &str) -> Result<()> {
        Ok(())
    }

    async fn get_transaction_status(&self, leg_id: &str) -> Result<LegReceipt> {
        self.applied_legs
            .read()
            .await
            .get(leg_id)
            .cloned()
            .ok_or_else(|| CoreError::Other(format!("no such leg {}", leg_id)))
    }
}

/// A scripted clearing-system adapter: `Accepted` unless a per-endpoint
/// override was set.
#[derive(Default, Clone)]
pub struct InMemoryClearingAdapter {
    overrides: Arc<RwLock<HashMap<String, DispatchAck>>>,
    dispatched: Arc<RwLock<Vec<(String, serde_json::Value)>>>,
}

impl InMemoryClearingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_response(&self, endpoint_name: &str, ack: DispatchAck) {
        self.overrides
            .write()
            .await
            .insert(endpoint_name.to_string(), ack);
    }

    pub async fn dispatched_count(&self) -> usize {
        self.dispatched.read().await.len()
    }
}

#[async_trait]
impl ClearingSystemAdapter for InMemoryClearingAdapter {
    async fn dispatch(
        &self,
        endpoint: &Endpoint,
        payload: serde_json::Value,
        _headers: HashMap<String, String>,
    ) -> Result<DispatchAck> {
        self.dispatched
            .write()
            .await
            .push((endpoint.name.clone(), payload));
        Ok(self
            .overrides
            .read()
            .await
            .get(&endpoint.name)
            .cloned()
            .unwrap_or(DispatchAck::Accepted))
    }
}

/// A scripted fraud adapter, default approves everything at a low score.
#[derive(Clone)]
pub struct InMemoryFraudAdapter {
    next_response: Arc<RwLock<Option<FraudAdapterResponse>>>,
    fail_next: Arc<RwLock<bool>>,
}

impl Default for InMemoryFraudAdapter {
    fn default() -> Self {
        Self {
            next_response: Arc::new(RwLock::new(None)),
            fail_next: Arc::new(RwLock::new(false)),
        }
    }
}

impl InMemoryFraudAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_next_response(&self, response: FraudAdapterResponse) {
        *self.next_response.write().await = Some(response);
    }

    pub async fn fail_next_call(&self) {
        *self.fail_next.write().await = true;
    }
}

#[async_trait]
impl FraudAdapter for InMemoryFraudAdapter {
    async fn assess(&self, _request: serde_json::Value) -> Result<FraudAdapterResponse> {
        if std::mem::take(&mut *self.fail_next.write().await) {
            return Err(CoreError::NetworkError {
                service: "fraud".to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        if let Some(resp) = self.next_response.write().await.take() {
            return Ok(resp);
        }
        Ok(FraudAdapterResponse {
            risk_score: 0.01,
            risk_level: RiskLevel::Low,
            factors: vec![],
            raw_response: serde_json::json!({}),
        })
    }
}

/// An in-memory config repository: flat vectors, filtered by subset match.
#[derive(Default, Clone)]
pub struct InMemoryConfigRepository {
    layers: Arc<RwLock<Vec<ConfigLayer>>>,
    mappings: Arc<RwLock<Vec<PayloadMapping>>>,
    tenant_mappings: Arc<RwLock<Vec<TenantClearingMapping>>>,
    clearing_systems: Arc<RwLock<Vec<ClearingSystem>>>,
}

impl InMemoryConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_layer(&self, layer: ConfigLayer) {
        self.layers.write().await.push(layer);
    }

    pub async fn add_mapping(&self, mapping: PayloadMapping) {
        self.mappings.write().await.push(mapping);
    }

    pub async fn add_tenant_mapping(&self, mapping: TenantClearingMapping) {
        self.tenant_mappings.write().await.push(mapping);
    }

    pub async fn add_clearing_system(&self, system: ClearingSystem) {
        self.clearing_systems.write().await.push(system);
    }
}

fn matches_opt(ctx_value: Option<&str>, layer_value: &Option<String>) -> bool {
    match layer_value {
        None => true,
        Some(v) => ctx_value == Some(v.as_str()),
    }
}

#[async_trait]
impl ConfigRepository for InMemoryConfigRepository {
    async fn active_layers(&self, ctx: &CallContext) -> Result<Vec<ConfigLayer>> {
        let layers = self.layers.read().await;
        let matching: Vec<ConfigLayer> = layers
            .iter()
            .filter(|l| matches_opt(Some(ctx.tenant_id.as_str()), &l.tenant_id))
            .filter(|l| matches_opt(ctx.payment_type.as_deref(), &l.payment_type))
            .filter(|l| matches_opt(ctx.local_instrument.as_deref(), &l.local_instrument))
            .filter(|l| matches_opt(ctx.clearing_system_code.as_deref(), &l.clearing_system_code))
            .filter(|l| matches_opt(Some(ctx.service_type.as_str()), &l.service_type))
            .filter(|l| matches_opt(Some(ctx.endpoint.as_str()), &l.endpoint))
            .filter(|l| l.effective_from.map(|f| f <= ctx.now).unwrap_or(true))
            .filter(|l| l.effective_until.map(|u| ctx.now <= u).unwrap_or(true))
            .cloned()
            .collect();
        Ok(matching)
    }

    async fn active_mapping(&self, tenant_id: &str, name: &str) -> Result<Option<PayloadMapping>> {
        let mappings = self.mappings.read().await;
        Ok(mappings
            .iter()
            .find(|m| m.tenant_id == tenant_id && m.name == name)
            .cloned())
    }

    async fn tenant_clearing_mappings(
        &self,
        tenant_id: &str,
        payment_type: &str,
        local_instrument: Option<&str>,
    ) -> Result<Vec<TenantClearingMapping>> {
        let mappings = self.tenant_mappings.read().await;
        Ok(mappings
            .iter()
            .filter(|m| m.active && m.tenant_id == tenant_id && m.payment_type == payment_type)
            .filter(|m| match (&m.local_instrument, local_instrument) {
                (None, _) => true,
                (Some(a), Some(b)) => a == b,
                (Some(_), None) => false,
            })
            .cloned()
            .collect())
    }

    async fn clearing_system(&self, code: &str) -> Result<Option<ClearingSystem>> {
        Ok(self
            .clearing_systems
            .read()
            .await
            .iter()
            .find(|c| c.code == code)
            .cloned())
    }
}

fn _assert_send_sync<T: Send + Sync>() {}

fn _assert_doubles_send_sync() {
    _assert_send_sync::<InMemoryCoreBanking>();
    _assert_send_sync::<InMemoryClearingAdapter>();
    _assert_send_sync::<InMemoryFraudAdapter>();
    _assert_send_sync::<InMemoryConfigRepository>();
}

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// A process-unique counter, used where tests need distinct but
/// non-deterministic ids without a full `IdGenerator`.
pub fn next_test_seq() -> u64 {
    NEXT_SEQ.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd() -> Currency {
        Currency::parse("USD").unwrap()
    }

    #[tokio::test]
    async fn debit_then_credit_moves_balance() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let bank = InMemoryCoreBanking::new(clock);
        bank.open_account("A", "BANK1", Money::new(dec!(100.00), usd()).unwrap())
            .await;
        bank.open_account("B", "BANK1", Money::new(dec!(0.00), usd()).unwrap())
            .await;

        bank.process_debit("leg-1", "A", Money::new(dec!(40.00), usd()).unwrap())
            .await
            .unwrap();
        bank.process_credit("leg-2", "B", Money::new(dec!(40.00), usd()).unwrap())
            .await
            .unwrap();

        assert_eq!(bank.balance_of("A").await, dec!(60.00));
        assert_eq!(bank.balance_of("B").await, dec!(40.00));
    }

    #[tokio::test]
    async fn repeated_leg_id_is_idempotent() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let bank = InMemoryCoreBanking::new(clock);
        bank.open_account("A", "BANK1", Money::new(dec!(100.00), usd()).unwrap())
            .await;

        bank.process_debit("leg-1", "A", Money::new(dec!(40.00), usd()).unwrap())
            .await
            .unwrap();
        bank.process_debit("leg-1", "A", Money::new(dec!(40.00), usd()).unwrap())
            .await
            .unwrap();

        assert_eq!(bank.balance_of("A").await, dec!(60.00));
    }

    #[tokio::test]
    async fn debit_below_zero_is_rejected() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let bank = InMemoryCoreBanking::new(clock);
        bank.open_account("A", "BANK1", Money::new(dec!(10.00), usd()).unwrap())
            .await;

        let err = bank
            .process_debit("leg-1", "A", Money::new(dec!(40.00), usd()).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn closed_account_rejects_debit() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let bank = InMemoryCoreBanking::new(clock);
        bank.open_account("A", "BANK1", Money::new(dec!(10.00), usd()).unwrap())
            .await;
        bank.close_account("A").await;

        let err = bank
            .process_debit("leg-1", "A", Money::new(dec!(1.00), usd()).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AccountClosed { .. }));
    }

    #[tokio::test]
    async fn scripted_failure_fires_once() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let bank = InMemoryCoreBanking::new(clock);
        bank.open_account("A", "BANK1", Money::new(dec!(10.00), usd()).unwrap())
            .await;
        bank.script_failure(
            "leg-1",
            CoreError::NetworkError {
                service: "core-banking".to_string(),
                reason: "simulated".to_string(),
            },
        )
        .await;

        assert!(bank
            .process_debit("leg-1", "A", Money::new(dec!(1.00), usd()).unwrap())
            .await
            .is_err());
        // second attempt with the same leg id is not scripted anymore, and
        // since the first attempt never committed, it now succeeds.
        bank.process_debit("leg-1", "A", Money::new(dec!(1.00), usd()).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn config_repository_filters_by_context() {
        let repo = InMemoryConfigRepository::new();
        repo.add_layer(ConfigLayer {
            id: Uuid::new_v4(),
            level: ConfigLevel::Tenant,
            tenant_id: Some("tenant-a".to_string()),
            payment_type: None,
            local_instrument: None,
            clearing_system_code: None,
            service_type: Some("core-banking".to_string()),
            endpoint: Some("debit".to_string()),
            priority: 0,
            created_at: Utc::now(),
            effective_from: None,
            effective_until: None,
            resiliency: None,
            auth: None,
            mapping_name: None,
            fraud_toggle: None,
        })
        .await;

        let ctx = CallContext {
            tenant_id: "tenant-a".to_string(),
            payment_type: Some("WIRE_DOMESTIC".to_string()),
            local_instrument: None,
            clearing_system_code: None,
            service_type: "core-banking".to_string(),
            endpoint: "debit".to_string(),
            direction: MappingDirection::Request,
            now: Utc::now(),
            correlation_id: "corr-1".to_string(),
        };
        let layers = repo.active_layers(&ctx).await.unwrap();
        assert_eq!(layers.len(), 1);

        let other_tenant_ctx = CallContext {
            tenant_id: "tenant-b".to_string(),
            ..ctx
        };
        let layers = repo.active_layers(&other_tenant_ctx).await.unwrap();
        assert!(layers.is_empty());
    }

    #[test]
    fn counting_id_generator_sequences_are_monotonic_per_series() {
        let gen = CountingIdGenerator::default();
        assert_eq!(gen.next_sequence("a"), 1);
        assert_eq!(gen.next_sequence("a"), 2);
        assert_eq!(gen.next_sequence("b"), 1);
    }
}
