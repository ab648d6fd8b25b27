use std::time::Duration;

/// Tunables for backoff scheduling and the cron-driven sweep, following
/// `settlement::config::WindowConfig`'s one-struct-with-`Default` shape.
#[derive(Debug, Clone)]
pub struct RepairEngineConfig {
    /// `baseDelay` in `next_retry_at = now + baseDelay * multiplier^retry_count`.
    pub base_delay: Duration,
    /// Cap applied to the computed delay before jitter.
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Jitter applied as a fraction of the capped delay, e.g. `0.10` for ±10%.
    pub jitter_fraction: f64,
    /// Default batch size for `PickNextBatch` when the caller doesn't override it.
    pub default_batch_limit: usize,
    /// Cron expression `Sweep()` runs on, grounded on the teacher's
    /// `WindowScheduler`'s per-minute grace-period job.
    pub sweep_schedule: String,
}

impl Default for RepairEngineConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(3_600),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.10,
            default_batch_limit: 50,
            sweep_schedule: "0 * * * * *".to_string(),
        }
    }
}
