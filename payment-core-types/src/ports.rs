//! Traits for the collaborators the core requires but does not implement
//! (spec §6): core-banking, clearing-system dispatch, fraud scoring, the
//! config repository, plus the clock/id-gen the redesign flag in spec §9
//! demands be explicit parameters rather than global singletons.

use crate::error::Result;
use crate::model::{CallContext, ClearingSystem, ConfigLayer, Endpoint, Money, PayloadMapping, TenantClearingMapping};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Injected wall clock, so library code never calls `Utc::now()` directly.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Injected id generation, so mapping/leg ids are reproducible in tests.
pub trait IdGenerator: Send + Sync {
    /// A fresh UUID v4.
    fn new_uuid(&self) -> Uuid;
    /// The next value in a named monotonic sequence, starting at 1.
    fn next_sequence(&self, series: &str) -> u64;
}

/// Account snapshot as reported by core-banking.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub account: String,
    pub bank_code: String,
    pub currency: crate::model::Currency,
    pub closed: bool,
}

/// Outcome of a single core-banking leg call (debit/credit/transfer).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LegOutcome {
    /// The leg completed (or a repeated call found the prior completion —
    /// core-banking adapters must treat a repeated `leg_id` as a lookup).
    Succeeded { external_reference: Option<String> },
    /// Terminal rejection, not retryable (e.g. account closed).
    Rejected { reason_code: String },
}

/// Receipt returned by a core-banking leg call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LegReceipt {
    pub leg_id: String,
    pub outcome: LegOutcome,
    pub completed_at: DateTime<Utc>,
}

/// Required capabilities of the core-banking system (spec §6).
/// Implementing a ledger is explicitly out of scope; this crate only
/// depends on this trait's shape.
#[async_trait]
pub trait CoreBankingAdapter: Send + Sync {
    /// Fetch account metadata (bank code, currency, closed flag).
    async fn get_account_info(&self, account: &str) -> Result<AccountInfo>;
    /// Cheap existence/validity check.
    async fn validate_account(&self, account: &str) -> Result<bool>;
    /// Current available balance.
    async fn get_balance(&self, account: &str) -> Result<Money>;
    /// Whether `account` can cover `amount` right now.
    async fn has_sufficient_funds(&self, account: &str, amount: Money) -> Result<bool>;
    /// Debit `account` by `amount`. `leg_id` makes repeats idempotent.
    async fn process_debit(&self, leg_id: &str, account: &str, amount: Money) -> Result<LegReceipt>;
    /// Credit `account` by `amount`. `leg_id` makes repeats idempotent.
    async fn process_credit(&self, leg_id: &str, account: &str, amount: Money) -> Result<LegReceipt>;
    /// Move funds directly between two accounts in one call.
    async fn process_transfer(
        &self,
        leg_id: &str,
        from_account: &str,
        to_account: &str,
        amount: Money,
    ) -> Result<LegReceipt>;
    /// Place a hold, returning a hold id.
    async fn hold_funds(&self, account: &str, amount: Money) -> Result<String>;
    /// Release a previously placed hold.
    async fn release_funds(&self, hold_id: &str) -> Result<()>;
    /// Look up the current status of a previously submitted leg.
    async fn get_transaction_status(&self, leg_id: &str) -> Result<LegReceipt>;
}

/// Logical status a clearing-system adapter reports for a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DispatchAck {
    Accepted,
    Rejected { code: String },
    AckPending,
}

/// Required capability of a clearing-system adapter (spec §6).
#[async_trait]
pub trait ClearingSystemAdapter: Send + Sync {
    /// Send `payload` to `endpoint` with the given headers.
    async fn dispatch(
        &self,
        endpoint: &Endpoint,
        payload: serde_json::Value,
        headers: HashMap<String, String>,
    ) -> Result<DispatchAck>;
}

/// Raw fraud-API response, prior to C4's threshold interpretation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FraudAdapterResponse {
    pub risk_score: f64,
    pub risk_level: crate::model::RiskLevel,
    pub factors: Vec<String>,
    pub raw_response: serde_json::Value,
}

/// Required capability of the fraud capability (spec §6). Scoring logic
/// itself is out of scope; the core only calls this and acts on the
/// verdict.
#[async_trait]
pub trait FraudAdapter: Send + Sync {
    /// Assess `request` (already transformed by C2) and return a raw score.
    async fn assess(&self, request: serde_json::Value) -> Result<FraudAdapterResponse>;
}

/// Storage collaborator for every config-shaped entity the resolver and
/// routing decider need (spec §6's persistence contracts, minus the
/// technology choice, which is explicitly out of scope).
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// All active config layers whose key set could apply to `ctx`,
    /// across every level, not yet ranked or merged.
    async fn active_layers(&self, ctx: &CallContext) -> Result<Vec<ConfigLayer>>;
    /// The named payload mapping for a tenant, if active.
    async fn active_mapping(&self, tenant_id: &str, name: &str) -> Result<Option<PayloadMapping>>;
    /// Active tenant-clearing mappings matching `(tenant, payment_type,
    /// local_instrument)`, not yet ranked by best-match.
    async fn tenant_clearing_mappings(
        &self,
        tenant_id: &str,
        payment_type: &str,
        local_instrument: Option<&str>,
    ) -> Result<Vec<TenantClearingMapping>>;
    /// Fetch a clearing system (and its endpoints) by code.
    async fn clearing_system(&self, code: &str) -> Result<Option<ClearingSystem>>;
}
