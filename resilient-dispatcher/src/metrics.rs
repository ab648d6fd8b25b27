//! Prometheus metrics for the resiliency layer, following the same
//! register-and-hold-handles shape as the teacher's `ledger-core::metrics`.

use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge_vec, Histogram,
    IntCounterVec, IntGaugeVec, Registry,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    pub calls_total: IntCounterVec,
    pub call_failures_total: IntCounterVec,
    pub circuit_trips_total: IntCounterVec,
    pub bulkhead_rejections_total: IntCounterVec,
    pub retries_total: IntCounterVec,
    pub fallbacks_total: IntCounterVec,
    pub circuit_state: IntGaugeVec,
    pub call_duration_seconds: Histogram,
    pub registry: Arc<Registry>,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let calls_total = register_int_counter_vec!(
            "dispatcher_calls_total",
            "Total downstream calls attempted",
            &["service", "tenant"]
        )?;
        registry.register(Box::new(calls_total.clone()))?;

        let call_failures_total = register_int_counter_vec!(
            "dispatcher_call_failures_total",
            "Total downstream calls that ended in failure",
            &["service", "tenant"]
        )?;
        registry.register(Box::new(call_failures_total.clone()))?;

        let circuit_trips_total = register_int_counter_vec!(
            "dispatcher_circuit_trips_total",
            "Total circuit-open transitions",
            &["service", "tenant"]
        )?;
        registry.register(Box::new(circuit_trips_total.clone()))?;

        let bulkhead_rejections_total = register_int_counter_vec!(
            "dispatcher_bulkhead_rejections_total",
            "Total calls rejected for lack of a bulkhead slot",
            &["service", "tenant"]
        )?;
        registry.register(Box::new(bulkhead_rejections_total.clone()))?;

        let retries_total = register_int_counter_vec!(
            "dispatcher_retries_total",
            "Total retry attempts issued",
            &["service", "tenant"]
        )?;
        registry.register(Box::new(retries_total.clone()))?;

        let fallbacks_total = register_int_counter_vec!(
            "dispatcher_fallbacks_total",
            "Total fallback behaviors invoked, by kind",
            &["service", "tenant", "kind"]
        )?;
        registry.register(Box::new(fallbacks_total.clone()))?;

        let circuit_state = register_int_gauge_vec!(
            "dispatcher_circuit_state",
            "Current circuit state (0=closed, 1=half_open, 2=open)",
            &["service", "tenant"]
        )?;
        registry.register(Box::new(circuit_state.clone()))?;

        let call_duration_seconds = register_histogram!(
            "dispatcher_call_duration_seconds",
            "Downstream call latency",
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
        )?;
        registry.register(Box::new(call_duration_seconds.clone()))?;

        Ok(Self {
            calls_total,
            call_failures_total,
            circuit_trips_total,
            bulkhead_rejections_total,
            retries_total,
            fallbacks_total,
            circuit_state,
            call_duration_seconds,
            registry,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to register dispatcher metrics")
    }
}
