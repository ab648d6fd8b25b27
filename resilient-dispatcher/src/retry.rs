//! Exponential backoff with a cap and full jitter, applied around a
//! transient-failure taxonomy ([`CoreError::is_transient`]).

use std::time::Duration;

use config_resolver::ResolvedResiliency;
use payment_core_types::CoreError;
use rand::Rng;
use tracing::warn;

use crate::error::{Error, Result};

/// Compute the wait before retry attempt `attempt` (1-based), capped at
/// `retry_max_wait_millis` and jittered uniformly in `[0, wait]`.
pub fn backoff_duration(cfg: &ResolvedResiliency, attempt: u32) -> Duration {
    let exp = cfg
        .retry_backoff_multiplier
        .powi(attempt.saturating_sub(1) as i32);
    let raw = (cfg.retry_wait_millis as f64 * exp).min(cfg.retry_max_wait_millis as f64);
    let jittered = if raw <= 0.0 {
        0.0
    } else {
        rand::thread_rng().gen_range(0.0..=raw)
    };
    Duration::from_millis(jittered as u64)
}

/// Retry `op` up to `cfg.max_attempts` times, sleeping with jittered
/// exponential backoff between attempts, but only for errors that
/// [`CoreError::is_transient`] recognizes. A non-transient failure (or the
/// final attempt) is returned immediately. `on_retry` is called once per
/// scheduled retry, before the backoff sleep, so callers can record metrics.
pub async fn with_retry<F, Fut, T>(cfg: &ResolvedResiliency, service: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    with_retry_instrumented(cfg, service, op, |_attempt| {}).await
}

/// Same as [`with_retry`], but invokes `on_retry(attempt)` for every retry
/// that gets scheduled (not for the initial attempt, and not when the
/// failure is non-transient or attempts are exhausted).
pub async fn with_retry_instrumented<F, Fut, T, R>(
    cfg: &ResolvedResiliency,
    service: &str,
    mut op: F,
    on_retry: R,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    R: Fn(u32),
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                let transient = as_core_error(&err).map(CoreError::is_transient).unwrap_or(false);
                if !transient || attempt >= cfg.max_attempts {
                    return Err(err);
                }
                let wait = backoff_duration(cfg, attempt);
                warn!(service, attempt, wait_ms = wait.as_millis() as u64, "retrying after transient failure");
                on_retry(attempt);
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

fn as_core_error(err: &Error) -> Option<&CoreError> {
    match err {
        Error::Core(c) => Some(c),
        Error::Config(_) => None,
    }
}
