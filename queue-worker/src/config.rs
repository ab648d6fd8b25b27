use std::time::Duration;

/// Tunables for the drain loop, following the teacher's
/// `DeadLetterQueue`'s hardcoded 10-second retry tick, generalized into a
/// struct the way every other component's `*Config` is.
#[derive(Debug, Clone)]
pub struct QueueWorkerConfig {
    /// How often `tick` is invoked by `run_forever`.
    pub tick_interval: Duration,
    /// Max messages pulled per tick.
    pub batch_limit: usize,
    /// A `PROCESSING` record whose `processing_started_at` is older than
    /// this is considered abandoned and reclaimed to `RETRY`.
    pub stuck_cutoff: Duration,
}

impl Default for QueueWorkerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(10),
            batch_limit: 50,
            stuck_cutoff: Duration::from_secs(300),
        }
    }
}
