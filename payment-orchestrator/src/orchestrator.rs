//! The payment state machine (spec §4.6). Generalizes the teacher's
//! `ClearingOrchestrator::execute_clearing` numbered-step pipeline to three
//! routes (same-bank, other-bank, incoming-clearing), and its
//! `AtomicOperationHandler` commit/rollback lifecycle to a single
//! compensating leg per transaction rather than a window of many.

use std::collections::HashMap;
use std::sync::Arc;

use config_resolver::ConfigResolver;
use dashmap::DashMap;
use fraud_gate::FraudGate;
use payment_core_types::{
    CallContext, ClearingSystemAdapter, CoreBankingAdapter, CorrectiveAction, FraudDecision,
    LegOutcome, LegPhase, LegStatus, MappingDirection, PaymentInstruction, PaymentOutcome,
    RepairRecord, RepairStatus, RepairType, RouteType,
};
use resilient_dispatcher::{DispatchOutcome, Dispatcher};
use routing_decider::RoutingDecider;
use tracing::{info, warn};

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::leg::{LegExecutor, RollbackAction};
use crate::ports::{PendingAckStore, RepairSink};

pub struct PaymentOrchestrator {
    resolver: Arc<ConfigResolver>,
    dispatcher: Arc<Dispatcher>,
    routing: Arc<RoutingDecider>,
    fraud: Arc<FraudGate>,
    core_banking: Arc<dyn CoreBankingAdapter>,
    clearing: Arc<dyn ClearingSystemAdapter>,
    legs: LegExecutor,
    repairs: Arc<dyn RepairSink>,
    pending_acks: Arc<dyn PendingAckStore>,
    config: OrchestratorConfig,
    /// Per-transaction-reference claim guard (spec §6): a leg for a given
    /// transaction is never executed concurrently with another leg of the
    /// same transaction, even across retried `submit` calls.
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl PaymentOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: Arc<ConfigResolver>,
        dispatcher: Arc<Dispatcher>,
        routing: Arc<RoutingDecider>,
        fraud: Arc<FraudGate>,
        core_banking: Arc<dyn CoreBankingAdapter>,
        clearing: Arc<dyn ClearingSystemAdapter>,
        repairs: Arc<dyn RepairSink>,
        pending_acks: Arc<dyn PendingAckStore>,
        config: OrchestratorConfig,
    ) -> Self {
        PaymentOrchestrator {
            resolver,
            dispatcher,
            routing,
            fraud,
            core_banking: core_banking.clone(),
            clearing,
            legs: LegExecutor::new(core_banking),
            repairs,
            pending_acks,
            config,
            locks: DashMap::new(),
        }
    }

    fn scoped_ctx(&self, ctx: &CallContext, service_type: &str, endpoint: &str) -> CallContext {
        CallContext {
            service_type: service_type.to_string(),
            endpoint: endpoint.to_string(),
            direction: MappingDirection::Request,
            ..ctx.clone()
        }
    }

    /// Submit a payment instruction for processing. One call per
    /// `transaction_reference`; re-submitting the same reference after a
    /// partial failure is safe because every leg id is deterministic
    /// (`PaymentInstruction::leg_id`) and downstream adapters treat a
    /// repeated leg id as a lookup, not a re-execution.
    pub async fn submit(
        &self,
        ctx: &CallContext,
        instruction: &PaymentInstruction,
    ) -> Result<PaymentOutcome> {
        let lock = self
            .locks
            .entry(instruction.transaction_reference.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        info!(
            reference = %instruction.transaction_reference,
            tenant = %instruction.tenant_id,
            "CREATED"
        );

        let assessment = self.fraud.evaluate(ctx, instruction).await?;
        info!(
            reference = %instruction.transaction_reference,
            ?assessment.decision,
            "FRAUD_CHECK"
        );
        match assessment.decision {
            FraudDecision::Approve => {}
            FraudDecision::Reject => {
                return Ok(PaymentOutcome::Rejected {
                    code: "FRAUD_REJECTED".to_string(),
                });
            }
            FraudDecision::ManualReview | FraudDecision::Hold | FraudDecision::Escalate => {
                self.repairs
                    .create(self.manual_review_repair(ctx, instruction))
                    .await?;
                return Ok(PaymentOutcome::Pending {
                    repair_transaction_reference: instruction.transaction_reference.clone(),
                });
            }
        }

        let route = self
            .routing
            .decide(ctx, instruction, &self.config.outbound_message_type)
            .await?;
        info!(
            reference = %instruction.transaction_reference,
            ?route.route_type,
            "ROUTED"
        );

        match route.route_type {
            RouteType::SameBank => self.process_same_bank(ctx, instruction).await,
            RouteType::OtherBank => self.process_other_bank(ctx, instruction, &route).await,
            RouteType::IncomingClearing => self.process_incoming_clearing(ctx, instruction).await,
        }
    }

    /// A clearing ack (or manual operator resolution) arrives for a
    /// transaction parked in `COMPLETED_PENDING_ACK`.
    pub async fn receive_ack(&self, transaction_reference: &str) -> bool {
        let resolved = self.pending_acks.resolve(transaction_reference).await;
        if resolved {
            info!(reference = transaction_reference, "ack received, COMPLETED");
        }
        resolved
    }

    async fn process_same_bank(
        &self,
        ctx: &CallContext,
        instruction: &PaymentInstruction,
    ) -> Result<PaymentOutcome> {
        let debit_leg_id = instruction.leg_id(LegPhase::Debit);
        let debit = self
            .run_banking_leg(ctx, &debit_leg_id, &instruction.from_account, instruction, false)
            .await?;

        match debit {
            LegResult::Succeeded(_) => {}
            LegResult::Rejected(reason) => {
                return Ok(PaymentOutcome::Rejected { code: reason });
            }
            LegResult::Ambiguous => {
                self.repairs
                    .create(self.repair(
                        ctx,
                        instruction,
                        RepairType::DebitFailed,
                        LegStatus::Failed,
                        LegStatus::NotStarted,
                        Some(debit_leg_id),
                        None,
                        6,
                        None,
                    ))
                    .await?;
                return Ok(PaymentOutcome::Pending {
                    repair_transaction_reference: instruction.transaction_reference.clone(),
                });
            }
        }

        let credit_leg_id = instruction.leg_id(LegPhase::Credit);
        let credit = self
            .run_banking_leg(ctx, &credit_leg_id, &instruction.to_account, instruction, true)
            .await?;

        match credit {
            LegResult::Succeeded(_) => {
                info!(reference = %instruction.transaction_reference, "COMPLETED");
                Ok(PaymentOutcome::Completed)
            }
            LegResult::Rejected(_) | LegResult::Ambiguous => {
                self.compensate_same_bank(ctx, instruction, &debit_leg_id, &credit_leg_id)
                    .await
            }
        }
    }

    async fn compensate_same_bank(
        &self,
        ctx: &CallContext,
        instruction: &PaymentInstruction,
        debit_leg_id: &str,
        credit_leg_id: &str,
    ) -> Result<PaymentOutcome> {
        let rollback_leg_id = instruction.leg_id(LegPhase::Rollback);
        warn!(
            reference = %instruction.transaction_reference,
            "credit leg failed after debit succeeded, compensating"
        );
        let rollback = self.legs.rollback(RollbackAction::CompensatingCredit {
            leg_id: rollback_leg_id,
            account: instruction.from_account.clone(),
            amount: instruction.amount,
        });
        match rollback.await {
            Ok(()) => {
                self.repairs
                    .create(self.repair(
                        ctx,
                        instruction,
                        RepairType::CreditFailed,
                        LegStatus::Succeeded,
                        LegStatus::Reversed,
                        Some(debit_leg_id.to_string()),
                        Some(credit_leg_id.to_string()),
                        5,
                        Some(CorrectiveAction::ReverseDebit),
                    ))
                    .await?;
                Ok(PaymentOutcome::Failed {
                    reason: "credit leg failed, debit reversed".to_string(),
                })
            }
            Err(err) => {
                self.repairs
                    .create(self.repair(
                        ctx,
                        instruction,
                        RepairType::DebitCreditMismatch,
                        LegStatus::Succeeded,
                        LegStatus::Failed,
                        Some(debit_leg_id.to_string()),
                        Some(credit_leg_id.to_string()),
                        9,
                        Some(CorrectiveAction::ManualBoth),
                    ))
                    .await?;
                warn!(reference = %instruction.transaction_reference, %err, "compensating credit failed, escalating");
                Ok(PaymentOutcome::Pending {
                    repair_transaction_reference: instruction.transaction_reference.clone(),
                })
            }
        }
    }

    async fn process_other_bank(
        &self,
        ctx: &CallContext,
        instruction: &PaymentInstruction,
        route: &payment_core_types::Route,
    ) -> Result<PaymentOutcome> {
        let debit_leg_id = instruction.leg_id(LegPhase::Debit);
        let debit = self
            .run_banking_leg(ctx, &debit_leg_id, &instruction.from_account, instruction, false)
            .await?;

        match debit {
            LegResult::Succeeded(_) => {}
            LegResult::Rejected(reason) => return Ok(PaymentOutcome::Rejected { code: reason }),
            LegResult::Ambiguous => {
                self.repairs
                    .create(self.repair(
                        ctx,
                        instruction,
                        RepairType::DebitFailed,
                        LegStatus::Failed,
                        LegStatus::NotStarted,
                        Some(debit_leg_id),
                        None,
                        6,
                        None,
                    ))
                    .await?;
                return Ok(PaymentOutcome::Pending {
                    repair_transaction_reference: instruction.transaction_reference.clone(),
                });
            }
        }

        let dispatch_leg_id = instruction.leg_id(LegPhase::Dispatch);
        let clearing_system_code = route
            .clearing_system_code
            .clone()
            .ok_or_else(|| payment_core_types::CoreError::Other("other-bank route missing clearing system".to_string()))?;
        let endpoint_name = route
            .endpoint_name
            .clone()
            .ok_or_else(|| payment_core_types::CoreError::Other("other-bank route missing endpoint".to_string()))?;
        let clearing_system = self.resolver.clearing_system(&clearing_system_code).await?;
        let endpoint = clearing_system
            .endpoints
            .iter()
            .find(|e| e.name == endpoint_name)
            .cloned()
            .ok_or_else(|| payment_core_types::CoreError::Other(format!("endpoint {endpoint_name} vanished after routing")))?;

        let scoped = self.scoped_ctx(ctx, "clearing", &endpoint_name);
        let resiliency = self.resolver.resolve_resiliency(&scoped).await?;
        let clearing = self.clearing.clone();
        let payload = serde_json::to_value(instruction).map_err(|e| {
            payment_core_types::CoreError::Other(format!("instruction serialization: {e}"))
        })?;
        let endpoint_for_call = endpoint.clone();
        let outcome = self
            .dispatcher
            .call(
                "clearing",
                &instruction.tenant_id,
                &resiliency,
                None,
                None,
                move || {
                    let clearing = clearing.clone();
                    let endpoint = endpoint_for_call.clone();
                    let payload = payload.clone();
                    async move {
                        clearing
                            .dispatch(&endpoint, payload, HashMap::new())
                            .await
                            .map_err(resilient_dispatcher::Error::Core)
                    }
                },
            )
            .await;

        match outcome {
            Ok(DispatchOutcome::Completed(ack)) | Ok(DispatchOutcome::CachedFallback(ack)) => match ack {
                payment_core_types::DispatchAck::Accepted | payment_core_types::DispatchAck::AckPending => {
                    self.pending_acks
                        .record(&instruction.transaction_reference, &instruction.tenant_id)
                        .await;
                    self.repairs
                        .create(self.ack_timeout_watchdog(ctx, instruction, &debit_leg_id, &dispatch_leg_id))
                        .await?;
                    info!(reference = %instruction.transaction_reference, "COMPLETED_PENDING_ACK");
                    Ok(PaymentOutcome::CompletedPendingAck)
                }
                payment_core_types::DispatchAck::Rejected { code } => {
                    warn!(reference = %instruction.transaction_reference, %code, "clearing system rejected dispatch, compensating debit");
                    self.compensate_other_bank_debit(ctx, instruction, &debit_leg_id, &dispatch_leg_id)
                        .await
                }
            },
            Ok(DispatchOutcome::QueuedForRetry) => {
                self.pending_acks
                    .record(&instruction.transaction_reference, &instruction.tenant_id)
                    .await;
                info!(reference = %instruction.transaction_reference, "dispatch queued for retry, COMPLETED_PENDING_ACK");
                Ok(PaymentOutcome::CompletedPendingAck)
            }
            Err(_) => {
                warn!(reference = %instruction.transaction_reference, "dispatch failed terminally, compensating debit");
                self.compensate_other_bank_debit(ctx, instruction, &debit_leg_id, &dispatch_leg_id)
                    .await
            }
        }
    }

    async fn compensate_other_bank_debit(
        &self,
        ctx: &CallContext,
        instruction: &PaymentInstruction,
        debit_leg_id: &str,
        dispatch_leg_id: &str,
    ) -> Result<PaymentOutcome> {
        let rollback_leg_id = instruction.leg_id(LegPhase::Rollback);
        match self
            .legs
            .rollback(RollbackAction::CompensatingCredit {
                leg_id: rollback_leg_id,
                account: instruction.from_account.clone(),
                amount: instruction.amount,
            })
            .await
        {
            Ok(()) => {
                self.repairs
                    .create(self.repair(
                        ctx,
                        instruction,
                        RepairType::DebitTimeout,
                        LegStatus::Succeeded,
                        LegStatus::Reversed,
                        Some(debit_leg_id.to_string()),
                        Some(dispatch_leg_id.to_string()),
                        5,
                        Some(CorrectiveAction::ReverseDebit),
                    ))
                    .await?;
                Ok(PaymentOutcome::Failed {
                    reason: "clearing dispatch failed, debit reversed".to_string(),
                })
            }
            Err(err) => {
                self.repairs
                    .create(self.repair(
                        ctx,
                        instruction,
                        RepairType::DebitCreditMismatch,
                        LegStatus::Succeeded,
                        LegStatus::Failed,
                        Some(debit_leg_id.to_string()),
                        Some(dispatch_leg_id.to_string()),
                        9,
                        Some(CorrectiveAction::ManualBoth),
                    ))
                    .await?;
                warn!(reference = %instruction.transaction_reference, %err, "compensating debit failed, escalating");
                Ok(PaymentOutcome::Pending {
                    repair_transaction_reference: instruction.transaction_reference.clone(),
                })
            }
        }
    }

    async fn process_incoming_clearing(
        &self,
        ctx: &CallContext,
        instruction: &PaymentInstruction,
    ) -> Result<PaymentOutcome> {
        let credit_leg_id = instruction.leg_id(LegPhase::Credit);
        let credit = self
            .run_banking_leg(ctx, &credit_leg_id, &instruction.to_account, instruction, true)
            .await?;

        match credit {
            LegResult::Succeeded(_) => {
                info!(reference = %instruction.transaction_reference, "COMPLETED (incoming)");
                Ok(PaymentOutcome::Completed)
            }
            LegResult::Rejected(reason) => {
                self.repairs
                    .create(self.repair(
                        ctx,
                        instruction,
                        RepairType::CreditFailed,
                        LegStatus::NotStarted,
                        LegStatus::Failed,
                        None,
                        Some(credit_leg_id),
                        6,
                        Some(CorrectiveAction::RetryCredit),
                    ))
                    .await?;
                Ok(PaymentOutcome::Rejected { code: reason })
            }
            LegResult::Ambiguous => {
                self.repairs
                    .create(self.repair(
                        ctx,
                        instruction,
                        RepairType::CreditFailed,
                        LegStatus::NotStarted,
                        LegStatus::Failed,
                        None,
                        Some(credit_leg_id),
                        6,
                        Some(CorrectiveAction::RetryCredit),
                    ))
                    .await?;
                Ok(PaymentOutcome::Pending {
                    repair_transaction_reference: instruction.transaction_reference.clone(),
                })
            }
        }
    }

    /// Execute a debit or credit leg through C3, classifying the result so
    /// callers never have to look at `DispatchOutcome` directly. A C3
    /// fallback (cached value or queued-for-retry) is never treated as a
    /// clean failure — it is ambiguous whether the leg actually committed,
    /// so it always becomes a repair rather than an immediate terminal
    /// outcome (spec §8 invariant 2 would otherwise be at risk of a
    /// silently stuck debit).
    async fn run_banking_leg(
        &self,
        ctx: &CallContext,
        leg_id: &str,
        account: &str,
        instruction: &PaymentInstruction,
        credit: bool,
    ) -> Result<LegResult> {
        let endpoint_name = if credit { "credit" } else { "debit" };
        let scoped = self.scoped_ctx(ctx, "core-banking", endpoint_name);
        let resiliency = self.resolver.resolve_resiliency(&scoped).await?;
        let core = self.core_banking.clone();
        let leg_id_owned = leg_id.to_string();
        let account_owned = account.to_string();
        let amount = instruction.amount;
        let outcome = self
            .dispatcher
            .call(
                "core-banking",
                &instruction.tenant_id,
                &resiliency,
                None,
                None,
                move || {
                    let core = core.clone();
                    let leg_id = leg_id_owned.clone();
                    let account = account_owned.clone();
                    async move {
                        let result = if credit {
                            core.process_credit(&leg_id, &account, amount).await
                        } else {
                            core.process_debit(&leg_id, &account, amount).await
                        };
                        result.map_err(resilient_dispatcher::Error::Core)
                    }
                },
            )
            .await;

        Ok(match outcome {
            Ok(DispatchOutcome::Completed(receipt)) | Ok(DispatchOutcome::CachedFallback(receipt)) => {
                match receipt.outcome {
                    LegOutcome::Succeeded { .. } => LegResult::Succeeded(receipt.leg_id),
                    LegOutcome::Rejected { reason_code } => LegResult::Rejected(reason_code),
                }
            }
            Ok(DispatchOutcome::QueuedForRetry) => LegResult::Ambiguous,
            Err(_) => LegResult::Ambiguous,
        })
    }

    fn manual_review_repair(&self, ctx: &CallContext, instruction: &PaymentInstruction) -> RepairRecord {
        RepairRecord {
            transaction_reference: instruction.transaction_reference.clone(),
            tenant_id: instruction.tenant_id.clone(),
            repair_type: RepairType::ManualReview,
            repair_status: RepairStatus::Pending,
            debit_status: LegStatus::NotStarted,
            credit_status: LegStatus::NotStarted,
            debit_leg_id: None,
            credit_leg_id: None,
            retry_count: 0,
            max_retries: 0,
            next_retry_at: None,
            timeout_at: None,
            priority: 7,
            corrective_action: None,
            resolution_notes: None,
            created_at: ctx.now,
            resolved_at: None,
            resolved_by: None,
        }
    }

    /// Filed the moment an other-bank dispatch is accepted, so it is
    /// already queryable by the repair engine's `Sweep()` once
    /// `timeout_at` elapses without an ack. `receive_ack` does not cancel
    /// it directly — resolving a repair record once an ack lands is the
    /// repair engine's job, not this crate's (it owns every write past
    /// hand-off).
    fn ack_timeout_watchdog(
        &self,
        ctx: &CallContext,
        instruction: &PaymentInstruction,
        debit_leg_id: &str,
        dispatch_leg_id: &str,
    ) -> RepairRecord {
        RepairRecord {
            transaction_reference: instruction.transaction_reference.clone(),
            tenant_id: instruction.tenant_id.clone(),
            repair_type: RepairType::CreditTimeout,
            repair_status: RepairStatus::Pending,
            debit_status: LegStatus::Succeeded,
            credit_status: LegStatus::NotStarted,
            debit_leg_id: Some(debit_leg_id.to_string()),
            credit_leg_id: Some(dispatch_leg_id.to_string()),
            retry_count: 0,
            max_retries: 3,
            next_retry_at: None,
            timeout_at: Some(ctx.now + chrono::Duration::from_std(self.config.ack_window).unwrap_or_default()),
            priority: 5,
            corrective_action: None,
            resolution_notes: None,
            created_at: ctx.now,
            resolved_at: None,
            resolved_by: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn repair(
        &self,
        ctx: &CallContext,
        instruction: &PaymentInstruction,
        repair_type: RepairType,
        debit_status: LegStatus,
        credit_status: LegStatus,
        debit_leg_id: Option<String>,
        credit_leg_id: Option<String>,
        priority: u8,
        corrective_action: Option<CorrectiveAction>,
    ) -> RepairRecord {
        RepairRecord {
            transaction_reference: instruction.transaction_reference.clone(),
            tenant_id: instruction.tenant_id.clone(),
            repair_type,
            repair_status: RepairStatus::Pending,
            debit_status,
            credit_status,
            debit_leg_id,
            credit_leg_id,
            retry_count: 0,
            max_retries: 5,
            next_retry_at: Some(ctx.now),
            timeout_at: None,
            priority,
            corrective_action,
            resolution_notes: None,
            created_at: ctx.now,
            resolved_at: None,
            resolved_by: None,
        }
    }
}

/// What a banking leg attempt resolved to, collapsing `DispatchOutcome`
/// and `LegOutcome` into the three things the state machine cares about.
enum LegResult {
    Succeeded(String),
    Rejected(String),
    Ambiguous,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use fraud_gate::{FraudGate, FraudThresholds, MappingNames};
    use payment_core_types::testing::{
        CountingIdGenerator, FixedClock, InMemoryClearingAdapter, InMemoryConfigRepository,
        InMemoryCoreBanking, InMemoryFraudAdapter,
    };
    use payment_core_types::{
        ConfigLevel, Currency, FraudAdapterResponse, FraudAssessment, FraudToggle, HttpMethod,
        Money, OpaquePayload, PaymentSource, RiskLevel,
    };
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn usd() -> Currency {
        Currency::parse("USD").unwrap()
    }

    fn ctx(now: chrono::DateTime<Utc>) -> CallContext {
        CallContext {
            tenant_id: "tenant-a".to_string(),
            payment_type: Some("WIRE_DOMESTIC".to_string()),
            local_instrument: None,
            clearing_system_code: None,
            service_type: "orchestrator".to_string(),
            endpoint: "submit".to_string(),
            direction: MappingDirection::Request,
            now,
            correlation_id: "corr-1".to_string(),
        }
    }

    fn instruction(
        reference: &str,
        from: &str,
        to: &str,
        amount: rust_decimal::Decimal,
        now: chrono::DateTime<Utc>,
    ) -> PaymentInstruction {
        PaymentInstruction {
            transaction_reference: reference.to_string(),
            tenant_id: "tenant-a".to_string(),
            from_account: from.to_string(),
            to_account: to.to_string(),
            amount: Money::new(amount, usd()).unwrap(),
            payment_type: "WIRE_DOMESTIC".to_string(),
            local_instrument: None,
            charge_bearer: None,
            value_date: now,
            remittance_info: None,
            correlation_id: "corr-1".to_string(),
            source: PaymentSource::BankClient,
            original_payload: OpaquePayload {
                message_type: "pain.001".to_string(),
                body: serde_json::json!({}),
            },
        }
    }

    fn identity_mapping(name: &str, direction: MappingDirection) -> payment_core_types::PayloadMapping {
        payment_core_types::PayloadMapping {
            tenant_id: "tenant-a".to_string(),
            name: name.to_string(),
            direction,
            mapping_type: payment_core_types::MappingType::FieldMapping,
            field_map: vec![payment_core_types::FieldMapRule {
                source_field: "transaction_reference".to_string(),
                target_field: "reference".to_string(),
                transformation: None,
            }],
            value_assignments: vec![],
            derived_values: vec![],
            auto_generations: vec![],
            conditionals: vec![],
            defaults: std::collections::HashMap::new(),
            priority: 0,
        }
    }

    fn endpoint(name: &str, message_type: &str) -> payment_core_types::Endpoint {
        payment_core_types::Endpoint {
            clearing_system_code: "FEDWIRE".to_string(),
            name: name.to_string(),
            endpoint_type: payment_core_types::EndpointType::Async,
            message_type: message_type.to_string(),
            url: "https://fedwire.test/dispatch".to_string(),
            method: HttpMethod::Post,
            timeout: std::time::Duration::from_secs(5),
            retry_attempts: 1,
            authentication: payment_core_types::AuthDescriptor::None,
            static_headers: std::collections::HashMap::new(),
            priority: 0,
            active: true,
        }
    }

    fn fedwire() -> payment_core_types::ClearingSystem {
        payment_core_types::ClearingSystem {
            code: "FEDWIRE".to_string(),
            name: "Fedwire".to_string(),
            country: "US".to_string(),
            currency: usd(),
            processing_mode: payment_core_types::ProcessingMode::Asynchronous,
            default_timeout: std::time::Duration::from_secs(5),
            supported_message_types: vec!["pacs.008".to_string()],
            supported_payment_types: vec!["WIRE_INTERNATIONAL".to_string()],
            supported_local_instruments: vec![],
            authentication: payment_core_types::AuthDescriptor::None,
            endpoints: vec![endpoint("fedwire-out", "pacs.008")],
        }
    }

    #[derive(Default)]
    struct NullFraudStore;

    #[async_trait]
    impl fraud_gate::FraudAssessmentStore for NullFraudStore {
        async fn save(&self, _assessment: &FraudAssessment) -> fraud_gate::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingRepairSink {
        repairs: Mutex<Vec<RepairRecord>>,
    }

    #[async_trait]
    impl RepairSink for RecordingRepairSink {
        async fn create(&self, repair: RepairRecord) -> Result<()> {
            self.repairs.lock().unwrap().push(repair);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPendingAckStore {
        pending: Mutex<std::collections::HashSet<String>>,
    }

    #[async_trait]
    impl PendingAckStore for RecordingPendingAckStore {
        async fn record(&self, transaction_reference: &str, _tenant_id: &str) {
            self.pending
                .lock()
                .unwrap()
                .insert(transaction_reference.to_string());
        }

        async fn resolve(&self, transaction_reference: &str) -> bool {
            self.pending.lock().unwrap().remove(transaction_reference)
        }
    }

    struct Harness {
        orchestrator: PaymentOrchestrator,
        core_banking: Arc<InMemoryCoreBanking>,
        clearing: Arc<InMemoryClearingAdapter>,
        fraud_adapter: Arc<InMemoryFraudAdapter>,
        repairs: Arc<RecordingRepairSink>,
        pending_acks: Arc<RecordingPendingAckStore>,
    }

    async fn harness(now: chrono::DateTime<Utc>, with_clearing: bool) -> Harness {
        let clock = Arc::new(FixedClock::new(now));
        let repo = InMemoryConfigRepository::new();
        repo.add_layer(payment_core_types::ConfigLayer {
            id: Uuid::new_v4(),
            level: ConfigLevel::Tenant,
            tenant_id: Some("tenant-a".to_string()),
            payment_type: None,
            local_instrument: None,
            clearing_system_code: None,
            service_type: None,
            endpoint: None,
            priority: 0,
            created_at: now,
            effective_from: None,
            effective_until: None,
            resiliency: None,
            auth: None,
            mapping_name: None,
            fraud_toggle: Some(FraudToggle {
                enabled: true,
                reason: "test".to_string(),
                effective_from: None,
                effective_until: None,
            }),
        })
        .await;
        repo.add_mapping(identity_mapping(
            "fraud-api-request",
            MappingDirection::FraudApiRequest,
        ))
        .await;
        repo.add_mapping(identity_mapping(
            "fraud-api-response",
            MappingDirection::FraudApiResponse,
        ))
        .await;
        if with_clearing {
            repo.add_tenant_mapping(payment_core_types::TenantClearingMapping {
                id: Uuid::new_v4(),
                tenant_id: "tenant-a".to_string(),
                payment_type: "WIRE_DOMESTIC".to_string(),
                local_instrument: None,
                clearing_system_code: "FEDWIRE".to_string(),
                priority: 0,
                active: true,
            })
            .await;
            repo.add_clearing_system(fedwire()).await;
        }

        let resolver = Arc::new(ConfigResolver::new(Arc::new(repo)));
        let dispatcher = Arc::new(Dispatcher::new(None, None));
        let core_banking = Arc::new(InMemoryCoreBanking::new(clock.clone()));
        let clearing = Arc::new(InMemoryClearingAdapter::new());
        let fraud_adapter = Arc::new(InMemoryFraudAdapter::new());
        let fraud = Arc::new(FraudGate::new(
            resolver.clone(),
            dispatcher.clone(),
            fraud_adapter.clone(),
            Arc::new(NullFraudStore::default()),
            Arc::new(CountingIdGenerator::default()),
            MappingNames::default(),
            FraudThresholds::default(),
        ));
        let routing = Arc::new(RoutingDecider::new(resolver.clone(), core_banking.clone()));
        let repairs = Arc::new(RecordingRepairSink::default());
        let pending_acks = Arc::new(RecordingPendingAckStore::default());

        let orchestrator = PaymentOrchestrator::new(
            resolver,
            dispatcher,
            routing,
            fraud,
            core_banking.clone(),
            clearing.clone(),
            repairs.clone(),
            pending_acks.clone(),
            OrchestratorConfig::default(),
        );

        Harness {
            orchestrator,
            core_banking,
            clearing,
            fraud_adapter,
            repairs,
            pending_acks,
        }
    }

    #[tokio::test]
    async fn same_bank_happy_path_completes() {
        let now = Utc::now();
        let h = harness(now, false).await;
        h.core_banking
            .open_account("A", "BANK1", Money::new(dec!(100.00), usd()).unwrap())
            .await;
        h.core_banking
            .open_account("B", "BANK1", Money::new(dec!(0.00), usd()).unwrap())
            .await;

        let instr = instruction("TXN-1", "A", "B", dec!(40.00), now);
        let outcome = h.orchestrator.submit(&ctx(now), &instr).await.unwrap();

        assert!(matches!(outcome, PaymentOutcome::Completed));
        assert_eq!(h.core_banking.balance_of("A").await, dec!(60.00));
        assert_eq!(h.core_banking.balance_of("B").await, dec!(40.00));
        assert!(h.repairs.repairs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_bank_credit_failure_compensates_debit_and_files_repair() {
        let now = Utc::now();
        let h = harness(now, false).await;
        h.core_banking
            .open_account("A", "BANK1", Money::new(dec!(100.00), usd()).unwrap())
            .await;
        h.core_banking
            .open_account("B", "BANK1", Money::new(dec!(0.00), usd()).unwrap())
            .await;

        let instr = instruction("TXN-2", "A", "B", dec!(40.00), now);
        h.core_banking
            .script_failure(
                &instr.leg_id(LegPhase::Credit),
                payment_core_types::CoreError::NetworkError {
                    service: "core-banking".to_string(),
                    reason: "simulated".to_string(),
                },
            )
            .await;

        let outcome = h.orchestrator.submit(&ctx(now), &instr).await.unwrap();

        assert!(matches!(outcome, PaymentOutcome::Failed { .. }));
        assert_eq!(h.core_banking.balance_of("A").await, dec!(100.00));
        assert_eq!(h.core_banking.balance_of("B").await, dec!(0.00));
        let repairs = h.repairs.repairs.lock().unwrap();
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].repair_type, RepairType::CreditFailed);
        assert_eq!(repairs[0].corrective_action, Some(CorrectiveAction::ReverseDebit));
    }

    #[tokio::test]
    async fn fraud_rejection_never_touches_the_ledger() {
        let now = Utc::now();
        let h = harness(now, false).await;
        h.core_banking
            .open_account("A", "BANK1", Money::new(dec!(100.00), usd()).unwrap())
            .await;
        h.core_banking
            .open_account("B", "BANK1", Money::new(dec!(0.00), usd()).unwrap())
            .await;
        h.fraud_adapter
            .set_next_response(FraudAdapterResponse {
                risk_score: 0.9,
                risk_level: RiskLevel::High,
                factors: vec!["velocity".to_string()],
                raw_response: serde_json::json!({}),
            })
            .await;

        let instr = instruction("TXN-3", "A", "B", dec!(40.00), now);
        let outcome = h.orchestrator.submit(&ctx(now), &instr).await.unwrap();

        assert!(matches!(outcome, PaymentOutcome::Rejected { code } if code == "FRAUD_REJECTED"));
        assert_eq!(h.core_banking.balance_of("A").await, dec!(100.00));
        assert!(h.repairs.repairs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fraud_manual_review_parks_the_transaction_without_completing() {
        let now = Utc::now();
        let h = harness(now, false).await;
        h.core_banking
            .open_account("A", "BANK1", Money::new(dec!(100.00), usd()).unwrap())
            .await;
        h.core_banking
            .open_account("B", "BANK1", Money::new(dec!(0.00), usd()).unwrap())
            .await;
        h.fraud_adapter
            .set_next_response(FraudAdapterResponse {
                risk_score: 0.5,
                risk_level: RiskLevel::Medium,
                factors: vec![],
                raw_response: serde_json::json!({}),
            })
            .await;

        let instr = instruction("TXN-4", "A", "B", dec!(40.00), now);
        let outcome = h.orchestrator.submit(&ctx(now), &instr).await.unwrap();

        assert!(matches!(outcome, PaymentOutcome::Pending { .. }));
        assert_eq!(h.core_banking.balance_of("A").await, dec!(100.00));
        let repairs = h.repairs.repairs.lock().unwrap();
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].repair_type, RepairType::ManualReview);
    }

    #[tokio::test]
    async fn other_bank_dispatch_accepted_parks_pending_ack_then_resolves() {
        let now = Utc::now();
        let h = harness(now, true).await;
        h.core_banking
            .open_account("A", "BANK1", Money::new(dec!(100.00), usd()).unwrap())
            .await;
        h.core_banking
            .open_account("B", "BANK2", Money::new(dec!(0.00), usd()).unwrap())
            .await;

        let instr = instruction("TXN-5", "A", "B", dec!(40.00), now);
        let outcome = h.orchestrator.submit(&ctx(now), &instr).await.unwrap();

        assert!(matches!(outcome, PaymentOutcome::CompletedPendingAck));
        assert_eq!(h.core_banking.balance_of("A").await, dec!(60.00));
        assert_eq!(h.clearing.dispatched_count().await, 1);
        let repairs = h.repairs.repairs.lock().unwrap();
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].repair_type, RepairType::CreditTimeout);
        drop(repairs);

        assert!(h.orchestrator.receive_ack("TXN-5").await);
        assert!(!h.pending_acks.pending.lock().unwrap().contains("TXN-5"));
    }

    #[tokio::test]
    async fn other_bank_dispatch_failure_compensates_the_debit() {
        let now = Utc::now();
        let h = harness(now, true).await;
        h.core_banking
            .open_account("A", "BANK1", Money::new(dec!(100.00), usd()).unwrap())
            .await;
        h.core_banking
            .open_account("B", "BANK2", Money::new(dec!(0.00), usd()).unwrap())
            .await;

        let instr = instruction("TXN-6", "A", "B", dec!(40.00), now);
        h.clearing
            .set_response("fedwire-out", payment_core_types::DispatchAck::Rejected {
                code: "FORMAT_ERROR".to_string(),
            })
            .await;

        let outcome = h.orchestrator.submit(&ctx(now), &instr).await.unwrap();

        // clearing system rejected the dispatch outright, a terminal
        // business failure, not an ack-pending state, so the debit gets
        // compensated immediately rather than parked.
        assert!(matches!(outcome, PaymentOutcome::Failed { .. }));
        assert_eq!(h.core_banking.balance_of("A").await, dec!(100.00));
        let repairs = h.repairs.repairs.lock().unwrap();
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].repair_type, RepairType::DebitTimeout);
        assert_eq!(repairs[0].corrective_action, Some(CorrectiveAction::ReverseDebit));
    }
}
