//! Fraud evaluation (spec §4.4): resolve whether fraud screening is on for
//! this call, transform the instruction into the fraud API's shape, call
//! it through the resilient dispatcher, transform the response back, and
//! apply decision thresholds. A call that never comes back cleanly still
//! produces a decision — `MANUAL_REVIEW`, never a silent `APPROVE`.

use std::sync::Arc;
use std::time::Instant;

use config_resolver::ConfigResolver;
use payload_mapper::apply_mapping;
use payment_core_types::{
    AssessmentSource, CallContext, FraudAdapter, FraudAssessment, FraudDecision, IdGenerator,
    MappingDirection, PaymentInstruction, PaymentSource, RiskLevel,
};
use resilient_dispatcher::{DispatchOutcome, Dispatcher};
use tracing::{info, warn};

use crate::error::Result;
use crate::ports::FraudAssessmentStore;
use crate::thresholds::FraudThresholds;

/// Named mappings this gate asks C2 to apply. Left to the caller to wire
/// up against whatever mapping rows a tenant has configured.
#[derive(Debug, Clone)]
pub struct MappingNames {
    pub request: String,
    pub response: String,
}

impl Default for MappingNames {
    fn default() -> Self {
        MappingNames {
            request: "fraud-api-request".to_string(),
            response: "fraud-api-response".to_string(),
        }
    }
}

pub struct FraudGate {
    resolver: Arc<ConfigResolver>,
    dispatcher: Arc<Dispatcher>,
    adapter: Arc<dyn FraudAdapter>,
    store: Arc<dyn FraudAssessmentStore>,
    ids: Arc<dyn IdGenerator>,
    mappings: MappingNames,
    thresholds: FraudThresholds,
}

impl FraudGate {
    pub fn new(
        resolver: Arc<ConfigResolver>,
        dispatcher: Arc<Dispatcher>,
        adapter: Arc<dyn FraudAdapter>,
        store: Arc<dyn FraudAssessmentStore>,
        ids: Arc<dyn IdGenerator>,
        mappings: MappingNames,
        thresholds: FraudThresholds,
    ) -> Self {
        FraudGate {
            resolver,
            dispatcher,
            adapter,
            store,
            ids,
            mappings,
            thresholds,
        }
    }

    pub async fn evaluate(
        &self,
        ctx: &CallContext,
        instruction: &PaymentInstruction,
    ) -> Result<FraudAssessment> {
        let toggle = self.resolver.resolve_fraud_toggle(ctx).await?;
        if !toggle.enabled {
            info!(
                tenant = %ctx.tenant_id,
                reference = %instruction.transaction_reference,
                reason = %toggle.reason,
                "fraud screening disabled, approving"
            );
            let assessment = self.approved_without_screening(ctx, instruction);
            self.store.save(&assessment).await?;
            return Ok(assessment);
        }

        let started = Instant::now();
        let source = assessment_source(&instruction.source);

        let request_ctx = self.scoped_ctx(ctx, MappingDirection::FraudApiRequest);
        let request_mapping = self
            .resolver
            .resolve_mapping(&request_ctx, Some(self.mappings.request.as_str()))
            .await?;
        let source_payload = serde_json::to_value(instruction).map_err(|e| {
            payment_core_types::CoreError::Other(format!("instruction serialization: {e}"))
        })?;
        let request_body = apply_mapping(
            &request_mapping,
            &source_payload,
            ctx.now,
            self.ids.as_ref(),
        )?;

        let resiliency = self.resolver.resolve_resiliency(&request_ctx).await?;
        let adapter = self.adapter.clone();
        let call_result = self
            .dispatcher
            .call(
                "fraud",
                &ctx.tenant_id,
                &resiliency,
                None,
                None,
                move || {
                    let adapter = adapter.clone();
                    let request_body = request_body.clone();
                    async move {
                        adapter
                            .assess(request_body)
                            .await
                            .map_err(resilient_dispatcher::Error::Core)
                    }
                },
            )
            .await;

        let assessment = match call_result {
            Ok(DispatchOutcome::Completed(raw)) => {
                let response_ctx = self.scoped_ctx(ctx, MappingDirection::FraudApiResponse);
                let response_mapping = self
                    .resolver
                    .resolve_mapping(&response_ctx, Some(self.mappings.response.as_str()))
                    .await?;
                let raw_payload = serde_json::to_value(&raw).map_err(|e| {
                    payment_core_types::CoreError::Other(format!("fraud response serialization: {e}"))
                })?;
                let transformed = apply_mapping(
                    &response_mapping,
                    &raw_payload,
                    ctx.now,
                    self.ids.as_ref(),
                )?;
                // A tenant's response mapping may normalize the adapter's risk
                // score under a different field name; fall back to the raw
                // score when the mapping leaves `risk_score` unset.
                let risk_score = payload_mapper::path::get(&transformed, "risk_score")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(raw.risk_score);
                let decision = self.thresholds.decide(risk_score);
                info!(
                    tenant = %ctx.tenant_id,
                    reference = %instruction.transaction_reference,
                    risk_score,
                    ?decision,
                    "fraud evaluation complete"
                );
                FraudAssessment {
                    assessment_id: self.ids.new_uuid(),
                    transaction_reference: instruction.transaction_reference.clone(),
                    tenant_id: ctx.tenant_id.clone(),
                    source,
                    risk_score,
                    risk_level: raw.risk_level,
                    decision,
                    external_request: Some(source_payload),
                    external_response: Some(raw.raw_response.clone()),
                    processing_time_millis: started.elapsed().as_millis() as u64,
                    created_at: ctx.now,
                    expires_at: None,
                }
            }
            Ok(DispatchOutcome::CachedFallback(_))
            | Ok(DispatchOutcome::QueuedForRetry)
            | Err(_) => {
                warn!(
                    tenant = %ctx.tenant_id,
                    reference = %instruction.transaction_reference,
                    "fraud capability unavailable, falling to manual review"
                );
                FraudAssessment {
                    assessment_id: self.ids.new_uuid(),
                    transaction_reference: instruction.transaction_reference.clone(),
                    tenant_id: ctx.tenant_id.clone(),
                    source,
                    risk_score: 0.0,
                    risk_level: RiskLevel::Medium,
                    decision: FraudDecision::ManualReview,
                    external_request: Some(source_payload),
                    external_response: None,
                    processing_time_millis: started.elapsed().as_millis() as u64,
                    created_at: ctx.now,
                    expires_at: None,
                }
            }
        };

        self.store.save(&assessment).await?;
        Ok(assessment)
    }

    fn approved_without_screening(
        &self,
        ctx: &CallContext,
        instruction: &PaymentInstruction,
    ) -> FraudAssessment {
        FraudAssessment {
            assessment_id: self.ids.new_uuid(),
            transaction_reference: instruction.transaction_reference.clone(),
            tenant_id: instruction.tenant_id.clone(),
            source: assessment_source(&instruction.source),
            risk_score: 0.0,
            risk_level: RiskLevel::Low,
            decision: FraudDecision::Approve,
            external_request: None,
            external_response: None,
            processing_time_millis: 0,
            created_at: ctx.now,
            expires_at: None,
        }
    }

    fn scoped_ctx(&self, ctx: &CallContext, direction: MappingDirection) -> CallContext {
        CallContext {
            service_type: "fraud".to_string(),
            endpoint: "fraud-api".to_string(),
            direction,
            ..ctx.clone()
        }
    }
}

fn assessment_source(source: &PaymentSource) -> AssessmentSource {
    match source {
        PaymentSource::ClearingSystem => AssessmentSource::ClearingSystem,
        PaymentSource::BankClient => AssessmentSource::BankClient,
    }
}
