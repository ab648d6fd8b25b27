//! The merge algorithm: rank candidate layers by level then priority then
//! recency, and fold narrower-over-broader into a single resolved value.

use payment_core_types::{
    AuthDescriptor, CallContext, CoreError, ConfigLayer, ConfigLevel, FraudToggle,
    ResiliencyOverride,
};
use uuid::Uuid;

use crate::error::Result;

/// A fully resolved resiliency policy: every knob has a concrete value,
/// either supplied by a config layer or by [`DEFAULT_RESILIENCY`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedResiliency {
    pub failure_rate_threshold: f64,
    pub slow_call_rate_threshold: f64,
    pub slow_call_duration_millis: u64,
    pub sliding_window_size: u32,
    pub minimum_calls: u32,
    pub wait_duration_in_open_millis: u64,
    pub permitted_calls_in_half_open: u32,
    pub success_threshold: u32,
    pub max_attempts: u32,
    pub retry_wait_millis: u64,
    pub retry_backoff_multiplier: f64,
    pub retry_max_wait_millis: u64,
    pub max_concurrent_calls: u32,
    pub bulkhead_max_wait_millis: u64,
    pub timeout_millis: u64,
    pub fallback: payment_core_types::FallbackBehavior,
}

/// Conservative defaults applied to any knob no active layer sets.
pub const DEFAULT_RESILIENCY: ResolvedResiliency = ResolvedResiliency {
    failure_rate_threshold: 50.0,
    slow_call_rate_threshold: 100.0,
    slow_call_duration_millis: 2_000,
    sliding_window_size: 20,
    minimum_calls: 10,
    wait_duration_in_open_millis: 30_000,
    permitted_calls_in_half_open: 5,
    success_threshold: 3,
    max_attempts: 3,
    retry_wait_millis: 200,
    retry_backoff_multiplier: 2.0,
    retry_max_wait_millis: 5_000,
    max_concurrent_calls: 20,
    bulkhead_max_wait_millis: 0,
    timeout_millis: 5_000,
    fallback: payment_core_types::FallbackBehavior::Propagate,
};

const LEVELS_BROAD_TO_NARROW: [ConfigLevel; 4] = [
    ConfigLevel::ClearingSystem,
    ConfigLevel::Tenant,
    ConfigLevel::PaymentType,
    ConfigLevel::DownstreamCall,
];

/// Pick the single winning layer among candidates that all share one
/// level: lowest `priority` wins; a tie breaks on most recent
/// `created_at`; a further tie is genuinely ambiguous.
fn pick_winner<'a>(candidates: &[&'a ConfigLayer]) -> Result<Option<&'a ConfigLayer>> {
    if candidates.is_empty() {
        return Ok(None);
    }
    let min_priority = candidates.iter().map(|l| l.priority).min().unwrap();
    let at_min: Vec<&'a ConfigLayer> = candidates
        .iter()
        .copied()
        .filter(|l| l.priority == min_priority)
        .collect();
    if at_min.len() == 1 {
        return Ok(Some(at_min[0]));
    }
    let max_created = at_min.iter().map(|l| l.created_at).max().unwrap();
    let at_max: Vec<&'a ConfigLayer> = at_min
        .iter()
        .copied()
        .filter(|l| l.created_at == max_created)
        .collect();
    if at_max.len() == 1 {
        return Ok(Some(at_max[0]));
    }
    Err(CoreError::AmbiguousConfig {
        id_a: at_max[0].id,
        id_b: at_max[1].id,
    }
    .into())
}

fn layers_at<'a>(layers: &[&'a ConfigLayer], level: ConfigLevel) -> Vec<&'a ConfigLayer> {
    layers.iter().filter(|l| l.level == level).copied().collect()
}

/// Merge every active resiliency override, broadest level first so a
/// narrower layer's explicitly-set fields win, field by field.
pub fn resolve_resiliency(layers: &[ConfigLayer]) -> Result<ResolvedResiliency> {
    let candidates: Vec<&ConfigLayer> = layers.iter().filter(|l| l.resiliency.is_some()).collect();
    let mut merged = ResiliencyOverride::default();
    for level in LEVELS_BROAD_TO_NARROW {
        let at_level = layers_at(&candidates, level);
        if let Some(winner) = pick_winner(&at_level)? {
            let o = winner.resiliency.as_ref().expect("filtered above");
            merged.failure_rate_threshold = o.failure_rate_threshold.or(merged.failure_rate_threshold);
            merged.slow_call_rate_threshold = o.slow_call_rate_threshold.or(merged.slow_call_rate_threshold);
            merged.slow_call_duration_millis = o.slow_call_duration_millis.or(merged.slow_call_duration_millis);
            merged.sliding_window_size = o.sliding_window_size.or(merged.sliding_window_size);
            merged.minimum_calls = o.minimum_calls.or(merged.minimum_calls);
            merged.wait_duration_in_open_millis =
                o.wait_duration_in_open_millis.or(merged.wait_duration_in_open_millis);
            merged.permitted_calls_in_half_open =
                o.permitted_calls_in_half_open.or(merged.permitted_calls_in_half_open);
            merged.success_threshold = o.success_threshold.or(merged.success_threshold);
            merged.max_attempts = o.max_attempts.or(merged.max_attempts);
            merged.retry_wait_millis = o.retry_wait_millis.or(merged.retry_wait_millis);
            merged.retry_backoff_multiplier =
                o.retry_backoff_multiplier.or(merged.retry_backoff_multiplier);
            merged.retry_max_wait_millis = o.retry_max_wait_millis.or(merged.retry_max_wait_millis);
            merged.max_concurrent_calls = o.max_concurrent_calls.or(merged.max_concurrent_calls);
            merged.bulkhead_max_wait_millis =
                o.bulkhead_max_wait_millis.or(merged.bulkhead_max_wait_millis);
            merged.timeout_millis = o.timeout_millis.or(merged.timeout_millis);
            merged.fallback = o.fallback.or(merged.fallback);
        }
    }
    Ok(ResolvedResiliency {
        failure_rate_threshold: merged.failure_rate_threshold.unwrap_or(DEFAULT_RESILIENCY.failure_rate_threshold),
        slow_call_rate_threshold: merged
            .slow_call_rate_threshold
            .unwrap_or(DEFAULT_RESILIENCY.slow_call_rate_threshold),
        slow_call_duration_millis: merged
            .slow_call_duration_millis
            .unwrap_or(DEFAULT_RESILIENCY.slow_call_duration_millis),
        sliding_window_size: merged.sliding_window_size.unwrap_or(DEFAULT_RESILIENCY.sliding_window_size),
        minimum_calls: merged.minimum_calls.unwrap_or(DEFAULT_RESILIENCY.minimum_calls),
        wait_duration_in_open_millis: merged
            .wait_duration_in_open_millis
            .unwrap_or(DEFAULT_RESILIENCY.wait_duration_in_open_millis),
        permitted_calls_in_half_open: merged
            .permitted_calls_in_half_open
            .unwrap_or(DEFAULT_RESILIENCY.permitted_calls_in_half_open),
        success_threshold: merged.success_threshold.unwrap_or(DEFAULT_RESILIENCY.success_threshold),
        max_attempts: merged.max_attempts.unwrap_or(DEFAULT_RESILIENCY.max_attempts),
        retry_wait_millis: merged.retry_wait_millis.unwrap_or(DEFAULT_RESILIENCY.retry_wait_millis),
        retry_backoff_multiplier: merged
            .retry_backoff_multiplier
            .unwrap_or(DEFAULT_RESILIENCY.retry_backoff_multiplier),
        retry_max_wait_millis: merged
            .retry_max_wait_millis
            .unwrap_or(DEFAULT_RESILIENCY.retry_max_wait_millis),
        max_concurrent_calls: merged.max_concurrent_calls.unwrap_or(DEFAULT_RESILIENCY.max_concurrent_calls),
        bulkhead_max_wait_millis: merged
            .bulkhead_max_wait_millis
            .unwrap_or(DEFAULT_RESILIENCY.bulkhead_max_wait_millis),
        timeout_millis: merged.timeout_millis.unwrap_or(DEFAULT_RESILIENCY.timeout_millis),
        fallback: merged.fallback.unwrap_or(DEFAULT_RESILIENCY.fallback),
    })
}

/// Atomic values (auth, fraud toggle, mapping name) are not field-merged:
/// the narrowest level that sets one wins outright.
fn resolve_atomic<'a, T, F>(layers: &'a [ConfigLayer], extract: F) -> Result<Option<(&'a ConfigLayer, T)>>
where
    F: Fn(&'a ConfigLayer) -> Option<T>,
{
    let candidates: Vec<&'a ConfigLayer> = layers.iter().filter(|l| extract(*l).is_some()).collect();
    for level in LEVELS_BROAD_TO_NARROW.iter().rev() {
        let at_level = layers_at(&candidates, *level);
        if let Some(winner) = pick_winner(&at_level)? {
            return Ok(Some((winner, extract(winner).expect("filtered above"))));
        }
    }
    Ok(None)
}

/// Resolve the effective auth descriptor, if any active layer sets one.
pub fn resolve_auth(layers: &[ConfigLayer]) -> Result<Option<AuthDescriptor>> {
    resolve_atomic(layers, |l| l.auth.clone()).map(|r| r.map(|(_, v)| v))
}

/// Resolve the effective fraud toggle, if any active layer sets one.
pub fn resolve_fraud_toggle(layers: &[ConfigLayer]) -> Result<Option<FraudToggle>> {
    resolve_atomic(layers, |l| l.fraud_toggle.clone()).map(|r| r.map(|(_, v)| v))
}

/// Resolve the effective mapping name, if any active layer sets one.
pub fn resolve_mapping_name(layers: &[ConfigLayer]) -> Result<Option<String>> {
    resolve_atomic(layers, |l| l.mapping_name.clone()).map(|r| r.map(|(_, v)| v))
}

/// True if `ctx.now` falls within the layer's effective window, if set.
pub fn is_effective(layer: &ConfigLayer, ctx: &CallContext) -> bool {
    layer.effective_from.map(|f| f <= ctx.now).unwrap_or(true)
        && layer.effective_until.map(|u| ctx.now <= u).unwrap_or(true)
}

/// Tie-break ids reported in an `AmbiguousConfig` error, exposed so
/// callers can log both candidates.
pub fn ambiguous_ids(err: &CoreError) -> Option<(Uuid, Uuid)> {
    match err {
        CoreError::AmbiguousConfig { id_a, id_b } => Some((*id_a, *id_b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base_layer(level: ConfigLevel, priority: i32) -> ConfigLayer {
        ConfigLayer {
            id: Uuid::new_v4(),
            level,
            tenant_id: None,
            payment_type: None,
            local_instrument: None,
            clearing_system_code: None,
            service_type: None,
            endpoint: None,
            priority,
            created_at: Utc::now(),
            effective_from: None,
            effective_until: None,
            resiliency: None,
            auth: None,
            mapping_name: None,
            fraud_toggle: None,
        }
    }

    #[test]
    fn narrower_level_overrides_broader_field_by_field() {
        let mut clearing = base_layer(ConfigLevel::ClearingSystem, 0);
        clearing.resiliency = Some(ResiliencyOverride {
            failure_rate_threshold: Some(40.0),
            max_attempts: Some(2),
            ..Default::default()
        });
        let mut tenant = base_layer(ConfigLevel::Tenant, 0);
        tenant.resiliency = Some(ResiliencyOverride {
            failure_rate_threshold: Some(60.0),
            ..Default::default()
        });

        let resolved = resolve_resiliency(&[clearing, tenant]).unwrap();
        assert_eq!(resolved.failure_rate_threshold, 60.0);
        // tenant didn't set max_attempts, so the broader layer's value survives.
        assert_eq!(resolved.max_attempts, 2);
    }

    #[test]
    fn missing_knobs_fall_back_to_defaults() {
        let resolved = resolve_resiliency(&[]).unwrap();
        assert_eq!(resolved, DEFAULT_RESILIENCY);
    }

    #[test]
    fn equal_priority_breaks_tie_on_created_at() {
        let mut older = base_layer(ConfigLevel::Tenant, 0);
        older.created_at = Utc::now() - chrono::Duration::seconds(10);
        older.resiliency = Some(ResiliencyOverride {
            max_attempts: Some(1),
            ..Default::default()
        });
        let mut newer = base_layer(ConfigLevel::Tenant, 0);
        newer.resiliency = Some(ResiliencyOverride {
            max_attempts: Some(9),
            ..Default::default()
        });

        let resolved = resolve_resiliency(&[older, newer]).unwrap();
        assert_eq!(resolved.max_attempts, 9);
    }

    #[test]
    fn true_tie_is_ambiguous() {
        let now = Utc::now();
        let mut a = base_layer(ConfigLevel::Tenant, 0);
        a.created_at = now;
        a.resiliency = Some(ResiliencyOverride {
            max_attempts: Some(1),
            ..Default::default()
        });
        let mut b = base_layer(ConfigLevel::Tenant, 0);
        b.created_at = now;
        b.resiliency = Some(ResiliencyOverride {
            max_attempts: Some(9),
            ..Default::default()
        });

        let err = resolve_resiliency(&[a, b]).unwrap_err();
        assert!(matches!(err, crate::error::Error::Core(CoreError::AmbiguousConfig { .. })));
    }

    #[test]
    fn atomic_value_is_not_merged_narrowest_wins_outright() {
        let mut clearing = base_layer(ConfigLevel::ClearingSystem, 0);
        clearing.auth = Some(AuthDescriptor::ApiKey {
            header_name: "X-Api-Key".to_string(),
        });
        let mut downstream = base_layer(ConfigLevel::DownstreamCall, 0);
        downstream.auth = Some(AuthDescriptor::Jwt {
            issuer: "issuer-a".to_string(),
        });

        let resolved = resolve_auth(&[clearing, downstream]).unwrap().unwrap();
        assert_eq!(resolved, AuthDescriptor::Jwt { issuer: "issuer-a".to_string() });
    }
}
