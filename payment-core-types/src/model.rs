//! Tagged records for the entities of the data model (spec §3).
//!
//! Every entity here is a plain struct/enum — no dynamic reflection, no
//! annotation-driven beans. Free-form integration payloads (the opaque
//! original wire body, a mapping's free-form `additionalConfig`) stay as
//! `serde_json::Value`; everything the spec names explicitly is typed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A fixed-point monetary amount with its currency, scale enforced at
/// construction. Never a float, per spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

/// ISO-4217 alphabetic currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(pub [u8; 3]);

impl Currency {
    /// Parse a 3-letter ISO-4217 code, uppercasing ASCII letters.
    pub fn parse(code: &str) -> Result<Self, crate::error::CoreError> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(crate::error::CoreError::InvalidCurrency(code.to_string()));
        }
        let mut arr = [0u8; 3];
        for (i, b) in bytes.iter().enumerate() {
            arr[i] = b.to_ascii_uppercase();
        }
        Ok(Currency(arr))
    }

    /// The 3-letter code as a `String`.
    pub fn code(&self) -> String {
        String::from_utf8_lossy(&self.0).to_string()
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Money {
    /// Construct a money value, rejecting more than 2 fractional digits
    /// (spec §8 boundary tests pin minor-unit scale-2 currencies).
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, crate::error::CoreError> {
        if amount.scale() > 2 {
            return Err(crate::error::CoreError::TypeCoercionError(format!(
                "amount {} has scale {} > 2",
                amount,
                amount.scale()
            )));
        }
        if amount.is_sign_negative() {
            return Err(crate::error::CoreError::TypeCoercionError(format!(
                "amount {} must not be negative",
                amount
            )));
        }
        Ok(Self {
            amount: amount.round_dp(2),
            currency,
        })
    }

    /// The decimal amount, always at scale 2.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// The currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        debug_assert_eq!(self.currency, rhs.currency, "adding mismatched currencies");
        Money {
            amount: self.amount + rhs.amount,
            currency: self.currency,
        }
    }
}

/// Where a payment instruction originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentSource {
    /// Submitted directly by a bank client.
    BankClient,
    /// Received from an external clearing system (incoming).
    ClearingSystem,
}

/// An immutable payment instruction, identity `transaction_reference`
/// unique per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInstruction {
    /// Unique reference within the tenant (the UETR in ISO 20022 terms).
    pub transaction_reference: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// Debtor account identifier.
    pub from_account: String,
    /// Creditor account identifier.
    pub to_account: String,
    /// Amount and currency.
    pub amount: Money,
    /// e.g. WIRE_DOMESTIC, SEPA_CREDIT, RTP.
    pub payment_type: String,
    /// Local instrument code refining `payment_type`.
    pub local_instrument: Option<String>,
    /// Who absorbs clearing fees.
    pub charge_bearer: Option<String>,
    /// Requested value date.
    pub value_date: DateTime<Utc>,
    /// Free-form remittance information.
    pub remittance_info: Option<String>,
    /// Correlation id for tracing across systems.
    pub correlation_id: String,
    /// Origin of the instruction.
    pub source: PaymentSource,
    /// Opaque original wire payload, tagged by message type.
    pub original_payload: OpaquePayload,
}

impl PaymentInstruction {
    /// Deterministic leg id for a given phase, per spec §4.6 idempotency
    /// rule: `<transaction_reference>-DEBIT|CREDIT|ROLLBACK|DISPATCH`.
    pub fn leg_id(&self, phase: LegPhase) -> String {
        format!("{}-{}", self.transaction_reference, phase.as_str())
    }
}

/// The four leg phases an orchestrator can execute for one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegPhase {
    /// Debit of the source account.
    Debit,
    /// Credit of the destination account.
    Credit,
    /// Compensating reversal of a prior debit.
    Rollback,
    /// Outbound dispatch to a clearing system.
    Dispatch,
}

impl LegPhase {
    /// The token used in a leg id, matching spec §4.6 verbatim.
    pub fn as_str(&self) -> &'static str {
        match self {
            LegPhase::Debit => "DEBIT",
            LegPhase::Credit => "CREDIT",
            LegPhase::Rollback => "ROLLBACK",
            LegPhase::Dispatch => "DISPATCH",
        }
    }
}

/// An opaque, schema-tagged wire payload. The core never parses the body
/// beyond reading the fields a payload mapping names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpaquePayload {
    /// ISO 20022 message type tag, e.g. `pacs.008`.
    pub message_type: String,
    /// The body, as a JSON tree (field map source/target for C2).
    pub body: serde_json::Value,
}

/// Clearing system processing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// Request/response pair completes inline.
    Synchronous,
    /// Request is accepted, result arrives later (ack/webhook).
    Asynchronous,
    /// Processed in scheduled batch windows.
    Batch,
}

/// An external clearing network (FEDWIRE, CHAPS, SEPA, ACH, RTP, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearingSystem {
    /// Globally unique code, e.g. "FEDWIRE".
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// ISO country code.
    pub country: String,
    /// Settlement currency.
    pub currency: Currency,
    /// Processing mode.
    pub processing_mode: ProcessingMode,
    /// Default timeout for calls to this system.
    pub default_timeout: std::time::Duration,
    /// ISO 20022 message types this system publishes/accepts.
    pub supported_message_types: Vec<String>,
    /// Payment types this system can settle.
    pub supported_payment_types: Vec<String>,
    /// Local instruments this system recognizes.
    pub supported_local_instruments: Vec<String>,
    /// Default authentication descriptor for this system's endpoints.
    pub authentication: AuthDescriptor,
    /// Ordered list of endpoints this system owns.
    pub endpoints: Vec<Endpoint>,
}

/// How a single endpoint is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointType {
    /// Inline request/response.
    Sync,
    /// Fire-and-forget with later correlation.
    Async,
    /// Result fetched by repeated polling.
    Polling,
    /// Result delivered via inbound webhook.
    Webhook,
}

/// HTTP-shaped method, kept generic since the transport itself is out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// A concrete `(URL, method, auth, message-type)` binding on a clearing system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    /// Owning clearing system code.
    pub clearing_system_code: String,
    /// Endpoint name, unique within the clearing system.
    pub name: String,
    /// How the endpoint is invoked.
    pub endpoint_type: EndpointType,
    /// ISO 20022 message type this endpoint handles.
    pub message_type: String,
    /// Target URL.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Per-call timeout.
    pub timeout: std::time::Duration,
    /// Retry attempts for this endpoint.
    pub retry_attempts: u32,
    /// Authentication descriptor.
    pub authentication: AuthDescriptor,
    /// Static headers always sent.
    pub static_headers: HashMap<String, String>,
    /// Lower wins ties against other endpoints of the same message type.
    pub priority: i32,
    /// Whether this endpoint is currently usable.
    pub active: bool,
}

/// Authentication scheme for an endpoint or clearing system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthDescriptor {
    /// No authentication.
    None,
    /// Static API key.
    ApiKey {
        /// Header name the key is sent under.
        header_name: String,
    },
    /// Bearer JWT.
    Jwt {
        /// Expected issuer.
        issuer: String,
    },
    /// JSON Web Signature over the payload.
    Jws {
        /// Key id used to verify the signature.
        key_id: String,
    },
    /// OAuth2 client-credentials.
    OAuth2 {
        /// Token endpoint URL.
        token_url: String,
        /// Scopes requested.
        scopes: Vec<String>,
    },
    /// Mutual TLS.
    MTls {
        /// Client certificate identifier/fingerprint.
        client_cert_id: String,
    },
}

/// Best-match lookup key: which clearing system a tenant's payments of a
/// given type (and optionally local instrument) route through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantClearingMapping {
    /// Unique id.
    pub id: Uuid,
    /// Tenant id.
    pub tenant_id: String,
    /// Payment type this mapping applies to.
    pub payment_type: String,
    /// Local instrument, `None` matches any.
    pub local_instrument: Option<String>,
    /// Target clearing system code.
    pub clearing_system_code: String,
    /// Tie-break priority, lower wins.
    pub priority: i32,
    /// Whether this mapping is currently active.
    pub active: bool,
}

/// The five precedence levels a config layer can be scoped to, most
/// specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfigLevel {
    /// Least specific: applies to every call against a clearing system.
    ClearingSystem = 0,
    /// Applies to every call for a tenant.
    Tenant = 1,
    /// Applies to every call of a payment type.
    PaymentType = 2,
    /// Most specific: one downstream call key.
    DownstreamCall = 3,
}

impl ConfigLevel {
    /// Rank used for sort ordering: higher rank wins (overrides).
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

/// Resiliency knobs a config layer can contribute (spec §3, §4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResiliencyOverride {
    pub failure_rate_threshold: Option<f64>,
    pub slow_call_rate_threshold: Option<f64>,
    pub slow_call_duration_millis: Option<u64>,
    pub sliding_window_size: Option<u32>,
    pub minimum_calls: Option<u32>,
    pub wait_duration_in_open_millis: Option<u64>,
    pub permitted_calls_in_half_open: Option<u32>,
    pub success_threshold: Option<u32>,
    pub max_attempts: Option<u32>,
    pub retry_wait_millis: Option<u64>,
    pub retry_backoff_multiplier: Option<f64>,
    pub retry_max_wait_millis: Option<u64>,
    pub max_concurrent_calls: Option<u32>,
    pub bulkhead_max_wait_millis: Option<u64>,
    pub timeout_millis: Option<u64>,
    pub fallback: Option<FallbackBehavior>,
}

/// What C3 does once a call is judged a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackBehavior {
    /// Return a synthetic pending response and enqueue for later replay.
    QueueForRetry,
    /// Return the last known-good cached value, if any.
    CachedValue,
    /// Propagate the error to the caller.
    Propagate,
}

/// Fraud-toggle resolution result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudToggle {
    pub enabled: bool,
    pub reason: String,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_until: Option<DateTime<Utc>>,
}

/// A single overlay contributed at one `ConfigLevel` for one kind of
/// setting. The resolver merges narrower-over-broader field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLayer {
    pub id: Uuid,
    pub level: ConfigLevel,
    pub tenant_id: Option<String>,
    pub payment_type: Option<String>,
    pub local_instrument: Option<String>,
    pub clearing_system_code: Option<String>,
    pub service_type: Option<String>,
    pub endpoint: Option<String>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_until: Option<DateTime<Utc>>,
    pub resiliency: Option<ResiliencyOverride>,
    pub auth: Option<AuthDescriptor>,
    pub mapping_name: Option<String>,
    pub fraud_toggle: Option<FraudToggle>,
}

/// Direction a payload mapping applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingDirection {
    Request,
    Response,
    Bidirectional,
    /// Request leg of the fraud-API call (spec §4.4 step 2).
    FraudApiRequest,
    /// Response leg of the fraud-API call (spec §4.4 step 4).
    FraudApiResponse,
}

/// Declared target type for a derived value or auto-generated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Number,
    Boolean,
}

/// One `src -> tgt` copy rule, with an optional named transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapRule {
    pub source_field: String,
    pub target_field: String,
    pub transformation: Option<TransformationPrimitive>,
}

/// A literal/token value assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueAssignmentRule {
    pub target_field: String,
    /// Raw literal, may contain `{{uuid()}}` / `{{now()}}` / `{{seq(p,n)}}`.
    pub value_template: String,
    pub priority: i32,
}

/// An expression-tree assignment, coerced to `result_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedValueRule {
    pub target_field: String,
    pub expression: String,
    pub result_type: FieldType,
    pub priority: i32,
}

/// Strategy for an auto-generated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoGenerationKind {
    Uuid,
    Timestamp,
    Sequential,
}

/// An auto-generation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoGenerationRule {
    pub target_field: String,
    pub kind: AutoGenerationKind,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// Zero-padded width for `Sequential`.
    pub length: Option<usize>,
    pub priority: i32,
}

/// `<predicate> -> assign <field> <value>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub predicate: String,
    pub target_field: String,
    pub value_template: String,
    pub priority: i32,
}

/// A named transformation primitive applied during a field-map copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransformationPrimitive {
    Uppercase,
    Trim,
    Mask { visible_suffix: usize },
    DateFormat { format: String },
    NumberFormat { decimals: u32 },
    Encrypt,
    Decrypt,
}

/// The kind of mapping (drives which rule set is authoritative for a given
/// mapping instance, though a mapping may carry several rule sets at once).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingType {
    FieldMapping,
    ValueAssignment,
    DerivedValue,
    AutoGeneration,
    Conditional,
    Transformation,
}

/// Identity `(tenant_id, name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadMapping {
    pub tenant_id: String,
    pub name: String,
    pub direction: MappingDirection,
    pub mapping_type: MappingType,
    pub field_map: Vec<FieldMapRule>,
    pub value_assignments: Vec<ValueAssignmentRule>,
    pub derived_values: Vec<DerivedValueRule>,
    pub auto_generations: Vec<AutoGenerationRule>,
    pub conditionals: Vec<ConditionalRule>,
    pub defaults: HashMap<String, serde_json::Value>,
    pub priority: i32,
}

/// Circuit-breaker state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Status of a queued/deferred outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueuedMessageStatus {
    Pending,
    Processing,
    Processed,
    Failed,
    Retry,
    Expired,
    Cancelled,
}

/// A deferred outbound call, created when a C3 fallback fires or a retry
/// is scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub message_id: Uuid,
    pub type_tag: String,
    pub tenant_id: String,
    pub service_name: String,
    pub url: String,
    pub method: HttpMethod,
    pub payload: serde_json::Value,
    pub headers: HashMap<String, String>,
    pub status: QueuedMessageStatus,
    pub priority: i32,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error_detail: Option<String>,
    pub correlation_id: String,
    pub parent_message_id: Option<Uuid>,
}

/// The kind of partial-failure a repair record addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairType {
    DebitFailed,
    CreditFailed,
    DebitTimeout,
    CreditTimeout,
    DebitCreditMismatch,
    PartialSuccess,
    SystemError,
    ManualReview,
}

/// Repair record lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairStatus {
    Pending,
    Assigned,
    InProgress,
    Resolved,
    Failed,
    Cancelled,
}

impl RepairStatus {
    /// Terminal statuses are never picked by `PickNextBatch` (spec §8 invariant 6).
    pub fn is_terminal(&self) -> bool {
        matches!(self, RepairStatus::Resolved | RepairStatus::Cancelled)
    }
}

/// The status of one leg of an orchestrated payment, as tracked by a repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegStatus {
    NotStarted,
    Succeeded,
    Failed,
    TimedOut,
    Reversed,
}

/// Corrective action the repair engine can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectiveAction {
    RetryDebit,
    RetryCredit,
    RetryBoth,
    ReverseDebit,
    ReverseCredit,
    ReverseBoth,
    ManualCredit,
    ManualDebit,
    ManualBoth,
    CancelTransaction,
    Escalate,
    NoAction,
}

/// Identity `(transaction_reference, tenant_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairRecord {
    pub transaction_reference: String,
    pub tenant_id: String,
    pub repair_type: RepairType,
    pub repair_status: RepairStatus,
    pub debit_status: LegStatus,
    pub credit_status: LegStatus,
    pub debit_leg_id: Option<String>,
    pub credit_leg_id: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub timeout_at: Option<DateTime<Utc>>,
    /// 1 (lowest) to 10 (highest, clamped there once retries are exhausted).
    pub priority: u8,
    pub corrective_action: Option<CorrectiveAction>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

/// Where a fraud assessment's inputs came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentSource {
    BankClient,
    ClearingSystem,
    Both,
}

/// Coarse-grained risk band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// The verdict the fraud gate (C4) returns to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FraudDecision {
    Approve,
    Reject,
    ManualReview,
    Hold,
    Escalate,
}

/// Persisted outcome of one fraud evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub assessment_id: Uuid,
    pub transaction_reference: String,
    pub tenant_id: String,
    pub source: AssessmentSource,
    /// In `[0, 1]`.
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub decision: FraudDecision,
    pub external_request: Option<serde_json::Value>,
    pub external_response: Option<serde_json::Value>,
    pub processing_time_millis: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Which of the three routes an instruction takes (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteType {
    SameBank,
    OtherBank,
    IncomingClearing,
}

/// The decision C5 hands to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub route_type: RouteType,
    pub clearing_system_code: Option<String>,
    pub endpoint_name: Option<String>,
    pub processing_mode: Option<ProcessingMode>,
    pub message_format: Option<String>,
}

/// A call context threaded explicitly through every component boundary,
/// never carried in thread-locals or global state (spec §9 redesign flag).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallContext {
    pub tenant_id: String,
    pub payment_type: Option<String>,
    pub local_instrument: Option<String>,
    pub clearing_system_code: Option<String>,
    pub service_type: String,
    pub endpoint: String,
    pub direction: MappingDirection,
    pub now: DateTime<Utc>,
    pub correlation_id: String,
}

/// The orchestrator's final, caller-visible outcome for one `SubmitPayment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PaymentOutcome {
    Completed,
    CompletedPendingAck,
    Rejected { code: String },
    Pending { repair_transaction_reference: String },
    Failed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn money_rejects_more_than_two_decimals() {
        let usd = Currency::parse("usd").unwrap();
        assert!(Money::new(dec!(10.001), usd).is_err());
    }

    #[test]
    fn money_rejects_negative_amounts() {
        let usd = Currency::parse("USD").unwrap();
        assert!(Money::new(dec!(-1.00), usd).is_err());
    }

    #[test]
    fn money_rounds_and_normalizes_currency_case() {
        let usd = Currency::parse("usd").unwrap();
        let m = Money::new(dec!(10.5), usd).unwrap();
        assert_eq!(m.amount(), dec!(10.50));
        assert_eq!(m.currency().code(), "USD");
    }

    #[test]
    fn currency_parse_rejects_non_alphabetic_and_wrong_length() {
        assert!(Currency::parse("U1D").is_err());
        assert!(Currency::parse("US").is_err());
        assert!(Currency::parse("USDD").is_err());
    }

    #[test]
    fn leg_id_matches_the_documented_format() {
        let instr = sample_instruction();
        assert_eq!(instr.leg_id(LegPhase::Debit), "TXN-1-DEBIT");
        assert_eq!(instr.leg_id(LegPhase::Credit), "TXN-1-CREDIT");
        assert_eq!(instr.leg_id(LegPhase::Rollback), "TXN-1-ROLLBACK");
        assert_eq!(instr.leg_id(LegPhase::Dispatch), "TXN-1-DISPATCH");
    }

    #[test]
    fn repair_status_terminal_set_is_exactly_resolved_and_cancelled() {
        assert!(RepairStatus::Resolved.is_terminal());
        assert!(RepairStatus::Cancelled.is_terminal());
        assert!(!RepairStatus::Pending.is_terminal());
        assert!(!RepairStatus::Assigned.is_terminal());
        assert!(!RepairStatus::InProgress.is_terminal());
        assert!(!RepairStatus::Failed.is_terminal());
    }

    #[test]
    fn config_level_rank_orders_most_specific_highest() {
        assert!(ConfigLevel::DownstreamCall.rank() > ConfigLevel::PaymentType.rank());
        assert!(ConfigLevel::PaymentType.rank() > ConfigLevel::Tenant.rank());
        assert!(ConfigLevel::Tenant.rank() > ConfigLevel::ClearingSystem.rank());
    }

    fn sample_instruction() -> PaymentInstruction {
        PaymentInstruction {
            transaction_reference: "TXN-1".to_string(),
            tenant_id: "tenant-a".to_string(),
            from_account: "ACC-1".to_string(),
            to_account: "ACC-2".to_string(),
            amount: Money::new(dec!(100.00), Currency::parse("USD").unwrap()).unwrap(),
            payment_type: "WIRE_DOMESTIC".to_string(),
            local_instrument: None,
            charge_bearer: None,
            value_date: Utc::now(),
            remittance_info: None,
            correlation_id: "corr-1".to_string(),
            source: PaymentSource::BankClient,
            original_payload: OpaquePayload {
                message_type: "pacs.008".to_string(),
                body: serde_json::json!({}),
            },
        }
    }
}
