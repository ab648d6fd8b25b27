//! Cross-cutting error taxonomy shared by every core crate.
//!
//! Component-local crates define their own `thiserror::Error` enums and
//! wrap these variants with `#[from]` where a failure crosses a crate
//! boundary, the way `settlement::Error::Ledger(#[from] ledger_core::Error)`
//! wraps `ledger-core`'s error in the teacher workspace.

use thiserror::Error;
use uuid::Uuid;

/// Result type shared across `payment-core-types`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that more than one component needs to recognize by variant,
/// not just by message (so the orchestrator can pattern-match on them).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A downstream call did not complete before its deadline.
    #[error("timeout after {millis}ms calling {service}")]
    Timeout {
        /// Service key the call targeted.
        service: String,
        /// Configured timeout that elapsed.
        millis: u64,
    },

    /// The circuit breaker for `(service, tenant)` is open.
    #[error("circuit open for {service} tenant {tenant}")]
    CircuitOpen {
        /// Service key.
        service: String,
        /// Tenant id.
        tenant: String,
    },

    /// The bulkhead for `(service, tenant)` has no free slot.
    #[error("bulkhead full for {service} tenant {tenant}: {in_flight}/{capacity}")]
    BulkheadFull {
        /// Service key.
        service: String,
        /// Tenant id.
        tenant: String,
        /// Calls currently in flight.
        in_flight: u32,
        /// Configured capacity.
        capacity: u32,
    },

    /// Generic transient downstream failure, retryable per policy.
    #[error("network error calling {service}: {reason}")]
    NetworkError {
        /// Service key.
        service: String,
        /// Underlying reason.
        reason: String,
    },

    /// Downstream rejected the request outright; not retryable.
    #[error("rejected by {service}: {reason_code}")]
    Rejected {
        /// Service key.
        service: String,
        /// Bank/clearing-supplied reason code.
        reason_code: String,
    },

    /// Core-banking reports the source account cannot cover the amount.
    #[error("insufficient funds in account {account}")]
    InsufficientFunds {
        /// Account identifier.
        account: String,
    },

    /// Core-banking reports the account is closed/frozen.
    #[error("account closed: {account}")]
    AccountClosed {
        /// Account identifier.
        account: String,
    },

    /// No active configuration was found for a mandatory kind at any level.
    #[error("no config found for {kind} in tenant {tenant}")]
    NoConfigFound {
        /// Config kind (resiliency, auth, mapping, fraud-toggle, routing...).
        kind: String,
        /// Tenant id.
        tenant: String,
    },

    /// Two active configs tie on level, key and priority.
    #[error("ambiguous config: {id_a} and {id_b} tie at the same level and priority")]
    AmbiguousConfig {
        /// First candidate id.
        id_a: Uuid,
        /// Second candidate id.
        id_b: Uuid,
    },

    /// No clearing-system mapping and the payment is not same-bank.
    #[error("no route found for tenant {tenant} payment type {payment_type}")]
    NoRouteFound {
        /// Tenant id.
        tenant: String,
        /// Payment type.
        payment_type: String,
    },

    /// The clearing system has no endpoint publishing the needed message type.
    #[error("unsupported message type {message_type} on clearing system {clearing_system}")]
    UnsupportedMessageType {
        /// Clearing system code.
        clearing_system: String,
        /// ISO 20022 message type tag.
        message_type: String,
    },

    /// A required field was absent from a source/target payload.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// The declared currency code is not a recognized ISO-4217 code.
    #[error("invalid currency: {0}")]
    InvalidCurrency(String),

    /// A mapping expression failed to evaluate.
    #[error("expression evaluation error: {0}")]
    ExpressionEvalError(String),

    /// A value could not be coerced to its declared type.
    #[error("type coercion error: {0}")]
    TypeCoercionError(String),

    /// The fraud gate rejected the payment.
    #[error("fraud rejected: {reason}")]
    FraudRejected {
        /// Reason supplied by the fraud adapter / thresholds.
        reason: String,
    },

    /// The fraud gate could not reach a decision and required manual review.
    #[error("fraud manual review required: {reason}")]
    FraudManualReview {
        /// Reason supplied by the fraud adapter / thresholds.
        reason: String,
    },

    /// The fraud adapter was unreachable; fails closed to manual review.
    #[error("fraud adapter unavailable: {0}")]
    FraudUnavailable(String),

    /// A leg completed but its downstream counterpart did not, and needs a repair record.
    #[error("needs repair: {0}")]
    NeedsRepair(String),

    /// The whole payment was compensated/reversed.
    #[error("reversed: {0}")]
    Reversed(String),

    /// Wraps any error in a free-form message, for edges not worth a variant.
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// True if this error is the kind C3's retry layer should act on,
    /// i.e. it is in the "downstream transient" taxonomy of spec §7.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::Timeout { .. }
                | CoreError::CircuitOpen { .. }
                | CoreError::BulkheadFull { .. }
                | CoreError::NetworkError { .. }
        )
    }
}
