//! Route classification (spec §4.5): same-bank vs. other-bank vs.
//! incoming-clearing, then (for other-bank) the best-match tenant
//! clearing mapping and the endpoint within it that can carry the
//! message this call actually needs to send.

use std::sync::Arc;

use config_resolver::ConfigResolver;
use payment_core_types::{
    CallContext, ClearingSystem, CoreBankingAdapter, CoreError, Endpoint, EndpointType,
    PaymentInstruction, PaymentSource, ProcessingMode, Route, RouteType,
};
use tracing::info;

use crate::error::Result;

pub struct RoutingDecider {
    resolver: Arc<ConfigResolver>,
    core_banking: Arc<dyn CoreBankingAdapter>,
}

impl RoutingDecider {
    pub fn new(resolver: Arc<ConfigResolver>, core_banking: Arc<dyn CoreBankingAdapter>) -> Self {
        RoutingDecider {
            resolver,
            core_banking,
        }
    }

    /// `required_message_type` is the ISO 20022 tag the orchestrator is
    /// about to send (e.g. `pacs.008` for an outbound credit transfer) —
    /// irrelevant for same-bank and incoming-clearing routes, since
    /// neither selects an endpoint.
    pub async fn decide(
        &self,
        ctx: &CallContext,
        instruction: &PaymentInstruction,
        required_message_type: &str,
    ) -> Result<Route> {
        if matches!(instruction.source, PaymentSource::ClearingSystem) {
            info!(
                reference = %instruction.transaction_reference,
                "incoming clearing instruction, no routing decision needed"
            );
            return Ok(Route {
                route_type: RouteType::IncomingClearing,
                clearing_system_code: ctx.clearing_system_code.clone(),
                endpoint_name: None,
                processing_mode: None,
                message_format: None,
            });
        }

        let from = self.core_banking.get_account_info(&instruction.from_account).await?;
        let to = self.core_banking.get_account_info(&instruction.to_account).await?;
        if from.bank_code == to.bank_code {
            info!(
                reference = %instruction.transaction_reference,
                bank_code = %from.bank_code,
                "same-bank route"
            );
            return Ok(Route {
                route_type: RouteType::SameBank,
                clearing_system_code: None,
                endpoint_name: None,
                processing_mode: None,
                message_format: None,
            });
        }

        let mapping = self
            .resolver
            .tenant_clearing_mapping(
                &instruction.tenant_id,
                &instruction.payment_type,
                instruction.local_instrument.as_deref(),
            )
            .await?;
        let clearing_system = self.resolver.clearing_system(&mapping.clearing_system_code).await?;
        let endpoint = select_endpoint(&clearing_system, required_message_type)?;

        info!(
            reference = %instruction.transaction_reference,
            clearing_system = %clearing_system.code,
            endpoint = %endpoint.name,
            "other-bank route"
        );
        Ok(Route {
            route_type: RouteType::OtherBank,
            clearing_system_code: Some(clearing_system.code.clone()),
            endpoint_name: Some(endpoint.name.clone()),
            processing_mode: Some(clearing_system.processing_mode),
            message_format: Some(endpoint.message_type.clone()),
        })
    }
}

/// Pick the active endpoint whose `message_type` matches and whose
/// `endpoint_type` is compatible with the system's processing mode,
/// breaking ties by ascending `priority`.
fn select_endpoint<'a>(
    clearing_system: &'a ClearingSystem,
    required_message_type: &str,
) -> Result<&'a Endpoint> {
    clearing_system
        .endpoints
        .iter()
        .filter(|e| e.active)
        .filter(|e| e.message_type == required_message_type)
        .filter(|e| compatible(clearing_system.processing_mode, e.endpoint_type))
        .min_by_key(|e| e.priority)
        .ok_or_else(|| {
            CoreError::UnsupportedMessageType {
                clearing_system: clearing_system.code.clone(),
                message_type: required_message_type.to_string(),
            }
            .into()
        })
}

fn compatible(mode: ProcessingMode, endpoint_type: EndpointType) -> bool {
    match mode {
        ProcessingMode::Synchronous => matches!(endpoint_type, EndpointType::Sync),
        ProcessingMode::Asynchronous => {
            matches!(endpoint_type, EndpointType::Async | EndpointType::Webhook)
        }
        ProcessingMode::Batch => matches!(endpoint_type, EndpointType::Polling | EndpointType::Async),
    }
}
