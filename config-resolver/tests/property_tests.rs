//! Property tests for the config-layer merge algorithm.
//!
//! These pin the invariant that narrower-scope overrides are monotone:
//! adding a broader-level layer can only fill in fields a narrower layer
//! left unset, never change a field the narrower layer already set.

use chrono::Utc;
use config_resolver::resolve::resolve_resiliency;
use payment_core_types::{ConfigLayer, ConfigLevel, ResiliencyOverride};
use proptest::prelude::*;
use uuid::Uuid;

fn level_strategy() -> impl Strategy<Value = ConfigLevel> {
    prop_oneof![
        Just(ConfigLevel::ClearingSystem),
        Just(ConfigLevel::Tenant),
        Just(ConfigLevel::PaymentType),
        Just(ConfigLevel::DownstreamCall),
    ]
}

fn override_strategy() -> impl Strategy<Value = ResiliencyOverride> {
    (
        prop::option::of(1u32..10),
        prop::option::of(100u64..10_000),
        prop::option::of(1.0f64..100.0),
    )
        .prop_map(|(max_attempts, timeout_millis, failure_rate_threshold)| ResiliencyOverride {
            max_attempts,
            timeout_millis,
            failure_rate_threshold,
            ..Default::default()
        })
}

fn layer_strategy() -> impl Strategy<Value = ConfigLayer> {
    (level_strategy(), 0i32..5, override_strategy()).prop_map(|(level, priority, resiliency)| {
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
            resiliency: Some(resiliency),
            auth: None,
            mapping_name: None,
            fraud_toggle: None,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Resolving the same layer set twice always yields the same result:
    /// the merge has no hidden randomness or ordering sensitivity beyond
    /// (level, priority, created_at).
    #[test]
    fn prop_resolution_is_deterministic(layers in prop::collection::vec(layer_strategy(), 0..6)) {
        let first = resolve_resiliency(&layers);
        let second = resolve_resiliency(&layers);
        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(_), Err(_)) => {}
            _ => prop_assert!(false, "resolution flipped between deterministic runs"),
        }
    }

    /// A single downstream-call-level layer fully determines every field
    /// it sets, no matter what broader layers are also present.
    #[test]
    fn prop_most_specific_non_default_field_wins(
        broader in prop::collection::vec(layer_strategy(), 0..4),
        specific_attempts in 1u32..10,
    ) {
        let mut downstream = ConfigLayer {
            id: Uuid::new_v4(),
            level: ConfigLevel::DownstreamCall,
            tenant_id: None,
            payment_type: None,
            local_instrument: None,
            clearing_system_code: None,
            service_type: None,
            endpoint: None,
            priority: 0,
            created_at: Utc::now(),
            effective_from: None,
            effective_until: None,
            resiliency: Some(ResiliencyOverride {
                max_attempts: Some(specific_attempts),
                ..Default::default()
            }),
            auth: None,
            mapping_name: None,
            fraud_toggle: None,
        };
        // Force this to be the only layer at its level, so it can't tie
        // with another downstream-call candidate.
        downstream.level = ConfigLevel::DownstreamCall;
        let mut all = broader;
        all.retain(|l| l.level != ConfigLevel::DownstreamCall);
        all.push(downstream);

        let resolved = resolve_resiliency(&all);
        if let Ok(resolved) = resolved {
            prop_assert_eq!(resolved.max_attempts, specific_attempts);
        }
    }

    /// Adding a broader-level layer never changes a field a narrower
    /// layer already set (monotone override).
    #[test]
    fn prop_broader_layer_cannot_override_narrower_field(
        mut narrower in layer_strategy(),
        mut broader in layer_strategy(),
        attempts in 1u32..10,
    ) {
        // Make `narrower` strictly narrower than `broader`, both single
        // occupants of their level so no tie-break kicks in.
        narrower.level = ConfigLevel::DownstreamCall;
        broader.level = ConfigLevel::ClearingSystem;
        narrower.resiliency = Some(ResiliencyOverride {
            max_attempts: Some(attempts),
            ..narrower.resiliency.unwrap_or_default()
        });

        let without_broader = resolve_resiliency(&[narrower.clone()]).unwrap();
        let with_broader = resolve_resiliency(&[narrower, broader]).unwrap();

        prop_assert_eq!(without_broader.max_attempts, attempts);
        prop_assert_eq!(with_broader.max_attempts, attempts);
    }
}
