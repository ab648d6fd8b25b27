//! A sliding-window circuit breaker keyed by `(service_name, tenant)`.
//!
//! Grounded on the teacher's counter-based `CircuitBreaker`
//! (services/risk-engine/src/circuit.rs): the CLOSED -> OPEN -> HALF_OPEN
//! -> CLOSED state machine and the `should_attempt_reset` timeout check
//! carry over unchanged. What's new is the window: instead of a running
//! failure counter, each breaker keeps the last `sliding_window_size` call
//! outcomes and trips on failure-rate or slow-call-rate, matching the
//! richer knobs `ResolvedResiliency` exposes.

use std::collections::VecDeque;
use std::sync::Arc;

use config_resolver::ResolvedResiliency;
use dashmap::DashMap;
use payment_core_types::{CircuitState, CoreError};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::Result;

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Success { slow: bool },
    Failure,
}

struct Window {
    state: CircuitState,
    calls: VecDeque<Outcome>,
    opened_at: Option<chrono::DateTime<chrono::Utc>>,
    half_open_in_flight: u32,
    half_open_successes: u32,
}

impl Window {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            calls: VecDeque::new(),
            opened_at: None,
            half_open_in_flight: 0,
            half_open_successes: 0,
        }
    }

    fn push(&mut self, outcome: Outcome, cap: usize) {
        self.calls.push_back(outcome);
        while self.calls.len() > cap {
            self.calls.pop_front();
        }
    }

    fn failure_rate(&self) -> f64 {
        if self.calls.is_empty() {
            return 0.0;
        }
        let failures = self
            .calls
            .iter()
            .filter(|o| matches!(o, Outcome::Failure))
            .count();
        100.0 * failures as f64 / self.calls.len() as f64
    }

    fn slow_rate(&self) -> f64 {
        if self.calls.is_empty() {
            return 0.0;
        }
        let slow = self
            .calls
            .iter()
            .filter(|o| matches!(o, Outcome::Success { slow: true }))
            .count();
        100.0 * slow as f64 / self.calls.len() as f64
    }
}

/// Per-`(service, tenant)` sliding-window circuit breakers.
pub struct CircuitBreaker {
    windows: DashMap<String, Arc<RwLock<Window>>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    fn key(service: &str, tenant: &str) -> String {
        format!("{}|{}", service, tenant)
    }

    fn entry(&self, service: &str, tenant: &str) -> Arc<RwLock<Window>> {
        self.windows
            .entry(Self::key(service, tenant))
            .or_insert_with(|| Arc::new(RwLock::new(Window::new())))
            .clone()
    }

    /// Returns `Ok(())` if a call may proceed, transitioning OPEN -> HALF_OPEN
    /// when the wait duration has elapsed. Returns `CircuitOpen` otherwise.
    pub async fn admit(
        &self,
        service: &str,
        tenant: &str,
        cfg: &ResolvedResiliency,
    ) -> Result<()> {
        let window = self.entry(service, tenant);
        let mut guard = window.write().await;

        if guard.state == CircuitState::Open {
            let elapsed_millis = guard
                .opened_at
                .map(|at| (chrono::Utc::now() - at).num_milliseconds().max(0) as u64)
                .unwrap_or(u64::MAX);
            if elapsed_millis >= cfg.wait_duration_in_open_millis {
                info!(service, tenant, "circuit transitioning to half-open");
                guard.state = CircuitState::HalfOpen;
                guard.half_open_in_flight = 0;
                guard.half_open_successes = 0;
                guard.calls.clear();
            } else {
                return Err(CoreError::CircuitOpen {
                    service: service.to_string(),
                    tenant: tenant.to_string(),
                }
                .into());
            }
        }

        if guard.state == CircuitState::HalfOpen {
            if guard.half_open_in_flight >= cfg.permitted_calls_in_half_open {
                return Err(CoreError::CircuitOpen {
                    service: service.to_string(),
                    tenant: tenant.to_string(),
                }
                .into());
            }
            guard.half_open_in_flight += 1;
        }

        Ok(())
    }

    pub async fn record_success(
        &self,
        service: &str,
        tenant: &str,
        duration_millis: u64,
        cfg: &ResolvedResiliency,
    ) {
        let window = self.entry(service, tenant);
        let mut guard = window.write().await;
        let slow = duration_millis >= cfg.slow_call_duration_millis;

        match guard.state {
            CircuitState::HalfOpen => {
                guard.half_open_successes += 1;
                if guard.half_open_successes >= cfg.success_threshold {
                    info!(service, tenant, "circuit recovered, transitioning to closed");
                    guard.state = CircuitState::Closed;
                    guard.calls.clear();
                    guard.opened_at = None;
                }
            }
            CircuitState::Closed => {
                let cap = cfg.sliding_window_size as usize;
                guard.push(Outcome::Success { slow }, cap);
                maybe_trip(&mut guard, service, tenant, cfg);
            }
            CircuitState::Open => {}
        }
    }

    pub async fn record_failure(&self, service: &str, tenant: &str, cfg: &ResolvedResiliency) {
        let window = self.entry(service, tenant);
        let mut guard = window.write().await;

        match guard.state {
            CircuitState::HalfOpen => {
                warn!(service, tenant, "failure in half-open, tripping back to open");
                trip(&mut guard);
            }
            CircuitState::Closed => {
                let cap = cfg.sliding_window_size as usize;
                guard.push(Outcome::Failure, cap);
                maybe_trip(&mut guard, service, tenant, cfg);
            }
            CircuitState::Open => {}
        }
    }

    pub async fn state(&self, service: &str, tenant: &str) -> CircuitState {
        self.entry(service, tenant).read().await.state
    }
}

fn maybe_trip(window: &mut Window, service: &str, tenant: &str, cfg: &ResolvedResiliency) {
    if window.calls.len() < cfg.minimum_calls as usize {
        return;
    }
    if window.failure_rate() >= cfg.failure_rate_threshold
        || window.slow_rate() >= cfg.slow_call_rate_threshold
    {
        warn!(
            service,
            tenant,
            failure_rate = window.failure_rate(),
            slow_rate = window.slow_rate(),
            "circuit tripped, transitioning to open"
        );
        trip(window);
    }
}

fn trip(window: &mut Window) {
    window.state = CircuitState::Open;
    window.opened_at = Some(chrono::Utc::now());
    window.half_open_in_flight = 0;
    window.half_open_successes = 0;
}
