//! Background drain loop for fallback/retry queues (spec §4.8), grounded
//! on `adapters::dlq::DeadLetterQueue::start_processor`'s tick-loop
//! shape, generalized from its hardcoded 10-second interval and bare
//! re-queue into a configurable tick that routes every replay back
//! through C3 instead of bypassing it.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use config_resolver::ConfigResolver;
use payment_core_types::{CallContext, MappingDirection, QueuedMessage, QueuedMessageStatus};
use resilient_dispatcher::{DispatchOutcome, Dispatcher};
use tracing::{info, warn};

use crate::config::QueueWorkerConfig;
use crate::error::Result;
use crate::ports::{OutboundInvoker, QueuedMessageStore};

pub struct QueueWorker {
    store: Arc<dyn QueuedMessageStore>,
    invoker: Arc<dyn OutboundInvoker>,
    dispatcher: Arc<Dispatcher>,
    resolver: Arc<ConfigResolver>,
    config: QueueWorkerConfig,
}

impl QueueWorker {
    pub fn new(
        store: Arc<dyn QueuedMessageStore>,
        invoker: Arc<dyn OutboundInvoker>,
        dispatcher: Arc<Dispatcher>,
        resolver: Arc<ConfigResolver>,
        config: QueueWorkerConfig,
    ) -> Self {
        Self { store, invoker, dispatcher, resolver, config }
    }

    /// Ticks forever on `config.tick_interval`. Meant to be spawned onto
    /// its own task.
    pub async fn run_forever(&self) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        loop {
            interval.tick().await;
            if let Err(err) = self.tick(Utc::now()).await {
                warn!(%err, "queue worker tick failed");
            }
        }
    }

    /// One drain pass: reclaim anything stuck in `PROCESSING`, then pull
    /// and process a fresh batch.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<()> {
        self.reclaim_stuck(now).await?;
        let batch = self.store.pick_batch(self.config.batch_limit, now).await?;
        for message in batch {
            self.process_one(message, now).await?;
        }
        Ok(())
    }

    async fn reclaim_stuck(&self, now: DateTime<Utc>) -> Result<()> {
        let cutoff = now - chrono::Duration::from_std(self.config.stuck_cutoff).unwrap();
        let stuck = self.store.stuck_processing(cutoff).await?;
        for mut message in stuck {
            warn!(message_id = %message.message_id, "reclaiming stuck PROCESSING message to RETRY");
            message.status = QueuedMessageStatus::Retry;
            message.processing_started_at = None;
            self.store.update(message).await?;
        }
        Ok(())
    }

    async fn process_one(&self, mut message: QueuedMessage, now: DateTime<Utc>) -> Result<()> {
        if message.expires_at.is_some_and(|at| at <= now) {
            message.status = QueuedMessageStatus::Expired;
            message.processing_completed_at = Some(now);
            self.store.update(message).await?;
            return Ok(());
        }

        message.status = QueuedMessageStatus::Processing;
        message.processing_started_at = Some(now);
        self.store.update(message.clone()).await?;

        let scoped = CallContext {
            tenant_id: message.tenant_id.clone(),
            payment_type: None,
            local_instrument: None,
            clearing_system_code: None,
            service_type: message.service_name.clone(),
            endpoint: message.url.clone(),
            direction: MappingDirection::Request,
            now,
            correlation_id: message.correlation_id.clone(),
        };
        let resiliency = self.resolver.resolve_resiliency(&scoped).await?;

        let invoker = self.invoker.clone();
        let to_invoke = message.clone();
        let started = Instant::now();
        let outcome = self
            .dispatcher
            .call(
                &message.service_name,
                &message.tenant_id,
                &resiliency,
                None,
                None,
                move || {
                    let invoker = invoker.clone();
                    let to_invoke = to_invoke.clone();
                    async move { invoker.invoke(&to_invoke).await.map_err(resilient_dispatcher::Error::Core) }
                },
            )
            .await;
        let elapsed_millis = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(DispatchOutcome::Completed(value)) | Ok(DispatchOutcome::CachedFallback(value)) => {
                message.status = QueuedMessageStatus::Processed;
                message.processing_completed_at = Some(now);
                // `QueuedMessage` has no dedicated `processing_time_ms`
                // field; it travels inside `result` alongside the value
                // rather than growing a core type only this crate needs.
                message.result = Some(serde_json::json!({
                    "value": value,
                    "processing_time_ms": elapsed_millis,
                }));
                info!(message_id = %message.message_id, elapsed_millis, "queued message processed");
            }
            Ok(DispatchOutcome::QueuedForRetry) | Err(_) => {
                let detail = match outcome {
                    Err(err) => err.to_string(),
                    _ => "dispatch fallback re-queued the call".to_string(),
                };
                self.fail_or_retry(&mut message, now, detail);
            }
        }
        self.store.update(message).await?;
        Ok(())
    }

    /// Shared tail of a failed attempt: bump `retry_count`, then either
    /// reschedule or, past `max_retries` (or an elapsed `expires_at`),
    /// retire the message as `EXPIRED` (spec §4.8 — this loop never marks
    /// a message `FAILED`; that status is reserved for other writers).
    fn fail_or_retry(&self, message: &mut QueuedMessage, now: DateTime<Utc>, error_detail: String) {
        message.retry_count += 1;
        message.error_detail = Some(error_detail);
        if message.retry_count > message.max_retries || message.expires_at.is_some_and(|at| at <= now) {
            message.status = QueuedMessageStatus::Expired;
            message.processing_completed_at = Some(now);
            warn!(message_id = %message.message_id, retries = message.retry_count, "queued message expired");
        } else {
            message.status = QueuedMessageStatus::Retry;
            message.next_retry_at = Some(now + chrono::Duration::seconds(backoff_seconds(message.retry_count)));
            message.processing_started_at = None;
        }
    }
}

fn backoff_seconds(retry_count: u32) -> i64 {
    2i64.saturating_pow(retry_count.min(6))
}
