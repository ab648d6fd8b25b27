//! Ties circuit breaker, bulkhead, timeout, retry and fallback together
//! into the single call path every downstream adapter invocation goes
//! through.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use config_resolver::ResolvedResiliency;
use payment_core_types::{CircuitState, CoreError, FallbackBehavior, QueuedMessage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::circuit::CircuitBreaker;
use crate::bulkhead::Bulkhead;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::ports::{FallbackCache, RetryQueue};
use crate::retry::with_retry_instrumented;

/// What `Dispatcher::call` returned: a fresh value, a value served from the
/// last-known-good cache (`CachedValue` fallback), or confirmation the call
/// was parked for later replay (`QueueForRetry` fallback).
#[derive(Debug, Clone)]
pub enum DispatchOutcome<T> {
    Completed(T),
    CachedFallback(T),
    QueuedForRetry,
}

impl<T> DispatchOutcome<T> {
    /// Unwraps a fresh or cached value; `None` for `QueuedForRetry`, which
    /// has none to give (the caller already has the orchestrator-side
    /// semantics for "this leg is pending").
    pub fn value(self) -> Option<T> {
        match self {
            DispatchOutcome::Completed(v) | DispatchOutcome::CachedFallback(v) => Some(v),
            DispatchOutcome::QueuedForRetry => None,
        }
    }
}

pub struct Dispatcher {
    circuit: CircuitBreaker,
    bulkhead: Bulkhead,
    queue: Option<Arc<dyn RetryQueue>>,
    cache: Option<Arc<dyn FallbackCache>>,
    pub metrics: Metrics,
}

impl Dispatcher {
    pub fn new(queue: Option<Arc<dyn RetryQueue>>, cache: Option<Arc<dyn FallbackCache>>) -> Self {
        Self {
            circuit: CircuitBreaker::new(),
            bulkhead: Bulkhead::new(),
            queue,
            cache,
            metrics: Metrics::default(),
        }
    }

    pub async fn circuit_state(&self, service: &str, tenant: &str) -> payment_core_types::CircuitState {
        self.circuit.state(service, tenant).await
    }

    /// Run `op` under circuit breaker, bulkhead, timeout and retry
    /// protection, then apply `cfg.fallback` if it still fails.
    ///
    /// `cache_key` identifies the last-known-good value for `CachedValue`;
    /// `queued_message` is a pre-built record for `QueueForRetry` (only
    /// used if that fallback fires).
    pub async fn call<F, Fut, T>(
        &self,
        service: &str,
        tenant: &str,
        cfg: &ResolvedResiliency,
        cache_key: Option<&str>,
        queued_message: Option<QueuedMessage>,
        mut op: F,
    ) -> Result<DispatchOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Clone + Serialize + DeserializeOwned,
    {
        self.metrics
            .calls_total
            .with_label_values(&[service, tenant])
            .inc();

        let permit = match self.bulkhead.acquire(service, tenant, cfg).await {
            Ok(p) => p,
            Err(err) => {
                self.metrics
                    .bulkhead_rejections_total
                    .with_label_values(&[service, tenant])
                    .inc();
                return self
                    .fall_back(service, tenant, cfg, cache_key, queued_message, err)
                    .await;
            }
        };

        let state_before = self.circuit.state(service, tenant).await;
        if let Err(err) = self.circuit.admit(service, tenant, cfg).await {
            drop(permit);
            self.metrics
                .circuit_state
                .with_label_values(&[service, tenant])
                .set(circuit_state_code(self.circuit.state(service, tenant).await));
            return self
                .fall_back(service, tenant, cfg, cache_key, queued_message, err)
                .await;
        }

        let deadline = Duration::from_millis(cfg.timeout_millis);
        let result = with_retry_instrumented(
            cfg,
            service,
            || {
                async {
                    let start = Instant::now();
                    let outcome = tokio::time::timeout(deadline, op()).await;
                    let elapsed_millis = start.elapsed().as_millis() as u64;
                    match outcome {
                        Ok(Ok(value)) => {
                            self.circuit
                                .record_success(service, tenant, elapsed_millis, cfg)
                                .await;
                            self.metrics
                                .call_duration_seconds
                                .observe(start.elapsed().as_secs_f64());
                            Ok(value)
                        }
                        Ok(Err(err)) => {
                            self.circuit.record_failure(service, tenant, cfg).await;
                            self.metrics
                                .call_failures_total
                                .with_label_values(&[service, tenant])
                                .inc();
                            Err(err)
                        }
                        Err(_elapsed) => {
                            self.circuit.record_failure(service, tenant, cfg).await;
                            self.metrics
                                .call_failures_total
                                .with_label_values(&[service, tenant])
                                .inc();
                            Err(Error::Core(CoreError::Timeout {
                                service: service.to_string(),
                                millis: cfg.timeout_millis,
                            }))
                        }
                    }
                }
            },
            |_attempt| {
                self.metrics
                    .retries_total
                    .with_label_values(&[service, tenant])
                    .inc();
            },
        )
        .await;
        drop(permit);

        let state_after = self.circuit.state(service, tenant).await;
        self.metrics
            .circuit_state
            .with_label_values(&[service, tenant])
            .set(circuit_state_code(state_after));
        if state_before != CircuitState::Open && state_after == CircuitState::Open {
            self.metrics
                .circuit_trips_total
                .with_label_values(&[service, tenant])
                .inc();
        }

        match result {
            Ok(value) => {
                if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                    if let Ok(json) = serde_json::to_value(value.clone()) {
                        cache.put(service, tenant, key, json).await;
                    }
                }
                Ok(DispatchOutcome::Completed(value))
            }
            Err(err) => {
                self.fall_back(service, tenant, cfg, cache_key, queued_message, err)
                    .await
            }
        }
    }

    async fn fall_back<T>(
        &self,
        service: &str,
        tenant: &str,
        cfg: &ResolvedResiliency,
        cache_key: Option<&str>,
        queued_message: Option<QueuedMessage>,
        err: Error,
    ) -> Result<DispatchOutcome<T>>
    where
        T: DeserializeOwned,
    {
        match cfg.fallback {
            FallbackBehavior::Propagate => Err(err),
            FallbackBehavior::CachedValue => {
                if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                    if let Some(json) = cache.get(service, tenant, key).await {
                        if let Ok(value) = serde_json::from_value(json) {
                            self.metrics
                                .fallbacks_total
                                .with_label_values(&[service, tenant, "cached_value"])
                                .inc();
                            info!(service, tenant, "serving cached fallback value");
                            return Ok(DispatchOutcome::CachedFallback(value));
                        }
                    }
                }
                warn!(service, tenant, "no cached fallback available, propagating");
                Err(err)
            }
            FallbackBehavior::QueueForRetry => {
                if let (Some(queue), Some(message)) = (&self.queue, queued_message) {
                    queue.enqueue(message).await?;
                    self.metrics
                        .fallbacks_total
                        .with_label_values(&[service, tenant, "queue_for_retry"])
                        .inc();
                    info!(service, tenant, "queued for retry");
                    return Ok(DispatchOutcome::QueuedForRetry);
                }
                warn!(service, tenant, "no retry queue available, propagating");
                Err(err)
            }
        }
    }
}

fn circuit_state_code(state: CircuitState) -> i64 {
    match state {
        CircuitState::Closed => 0,
        CircuitState::HalfOpen => 1,
        CircuitState::Open => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::sync::RwLock;
    use std::collections::HashMap;
    use async_trait::async_trait;

    fn cfg() -> ResolvedResiliency {
        ResolvedResiliency {
            failure_rate_threshold: 50.0,
            slow_call_rate_threshold: 100.0,
            slow_call_duration_millis: 2_000,
            sliding_window_size: 20,
            minimum_calls: 10,
            wait_duration_in_open_millis: 30_000,
            permitted_calls_in_half_open: 5,
            success_threshold: 3,
            max_attempts: 2,
            retry_wait_millis: 1,
            retry_backoff_multiplier: 2.0,
            retry_max_wait_millis: 5,
            max_concurrent_calls: 10,
            bulkhead_max_wait_millis: 0,
            timeout_millis: 1_000,
            fallback: FallbackBehavior::Propagate,
        }
    }

    #[derive(Default)]
    struct InMemoryCache {
        values: RwLock<HashMap<String, serde_json::Value>>,
    }

    #[async_trait]
    impl FallbackCache for InMemoryCache {
        async fn get(&self, service: &str, tenant: &str, key: &str) -> Option<serde_json::Value> {
            self.values
                .read()
                .await
                .get(&format!("{}|{}|{}", service, tenant, key))
                .cloned()
        }

        async fn put(&self, service: &str, tenant: &str, key: &str, value: serde_json::Value) {
            self.values
                .write()
                .await
                .insert(format!("{}|{}|{}", service, tenant, key), value);
        }
    }

    #[derive(Default)]
    struct InMemoryQueue {
        enqueued: Mutex<Vec<QueuedMessage>>,
    }

    #[async_trait]
    impl RetryQueue for InMemoryQueue {
        async fn enqueue(&self, message: QueuedMessage) -> Result<()> {
            self.enqueued.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn sample_queued_message() -> QueuedMessage {
        QueuedMessage {
            message_id: uuid::Uuid::new_v4(),
            type_tag: "DISPATCH".to_string(),
            tenant_id: "t1".to_string(),
            service_name: "svc".to_string(),
            url: "https://example.test".to_string(),
            method: payment_core_types::HttpMethod::Post,
            payload: serde_json::json!({}),
            headers: HashMap::new(),
            status: payment_core_types::QueuedMessageStatus::Pending,
            priority: 0,
            retry_count: 0,
            max_retries: 3,
            next_retry_at: None,
            expires_at: None,
            processing_started_at: None,
            processing_completed_at: None,
            result: None,
            error_detail: None,
            correlation_id: "corr-1".to_string(),
            parent_message_id: None,
        }
    }

    #[tokio::test]
    async fn successful_call_returns_completed_and_populates_cache() {
        let cache = Arc::new(InMemoryCache::default());
        let dispatcher = Dispatcher::new(None, Some(cache.clone()));
        let outcome = dispatcher
            .call("svc", "t1", &cfg(), Some("key-1"), None, || async { Ok(42u32) })
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Completed(42)));
        assert_eq!(cache.get("svc", "t1", "key-1").await, Some(serde_json::json!(42)));
    }

    #[tokio::test]
    async fn terminal_failure_propagates_by_default() {
        let dispatcher = Dispatcher::new(None, None);
        let result: Result<DispatchOutcome<u32>> = dispatcher
            .call("svc", "t1", &cfg(), None, None, || async {
                Err(Error::Core(CoreError::Rejected {
                    service: "svc".to_string(),
                    reason_code: "R1".to_string(),
                }))
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn cached_value_fallback_serves_last_known_good_value() {
        let cache = Arc::new(InMemoryCache::default());
        cache.put("svc", "t1", "key-1", serde_json::json!(7)).await;
        let dispatcher = Dispatcher::new(None, Some(cache));

        let mut cfg = cfg();
        cfg.fallback = FallbackBehavior::CachedValue;
        cfg.max_attempts = 1;

        let outcome: DispatchOutcome<u32> = dispatcher
            .call("svc", "t1", &cfg, Some("key-1"), None, || async {
                Err(Error::Core(CoreError::Rejected {
                    service: "svc".to_string(),
                    reason_code: "R1".to_string(),
                }))
            })
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::CachedFallback(7)));
    }

    #[tokio::test]
    async fn queue_for_retry_fallback_enqueues_and_reports_queued() {
        let queue = Arc::new(InMemoryQueue::default());
        let dispatcher = Dispatcher::new(Some(queue.clone()), None);

        let mut cfg = cfg();
        cfg.fallback = FallbackBehavior::QueueForRetry;
        cfg.max_attempts = 1;

        let outcome: DispatchOutcome<u32> = dispatcher
            .call(
                "svc",
                "t1",
                &cfg,
                None,
                Some(sample_queued_message()),
                || async {
                    Err(Error::Core(CoreError::NetworkError {
                        service: "svc".to_string(),
                        reason: "boom".to_string(),
                    }))
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::QueuedForRetry));
        assert_eq!(queue.enqueued.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures_before_giving_up() {
        let attempts = Arc::new(AtomicU32::new(0));
        let dispatcher = Dispatcher::new(None, None);
        let c = cfg();
        let attempts_clone = attempts.clone();
        let result: Result<DispatchOutcome<u32>> = dispatcher
            .call("svc", "t1", &c, None, None, move || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(Error::Core(CoreError::NetworkError {
                        service: "svc".to_string(),
                        reason: "boom".to_string(),
                    }))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
