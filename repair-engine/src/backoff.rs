//! `next_retry_at = now + baseDelay * multiplier^retry_count`, capped,
//! jittered ±`jitter_fraction` (spec §4.7). Mirrors
//! `resilient_dispatcher::backoff_duration`'s shape one level up, in
//! calendar time rather than a single attempt's wait.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;

use crate::config::RepairEngineConfig;

pub fn next_retry_at(cfg: &RepairEngineConfig, now: DateTime<Utc>, retry_count: u32) -> DateTime<Utc> {
    let exp = cfg.backoff_multiplier.powi(retry_count as i32);
    let raw_millis = (cfg.base_delay.as_millis() as f64 * exp).min(cfg.max_delay.as_millis() as f64);
    let jitter = rand::thread_rng().gen_range(-cfg.jitter_fraction..=cfg.jitter_fraction);
    let jittered_millis = (raw_millis * (1.0 + jitter)).max(0.0);
    now + ChronoDuration::milliseconds(jittered_millis as i64)
}
