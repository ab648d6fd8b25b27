//! Cron-driven `Sweep()` wrapper, grounded on
//! `services/clearing-engine/src/window/scheduler.rs`'s `WindowScheduler`:
//! a `JobScheduler` holding a single async job registered against a cron
//! string, `start`/`stop` lifecycle methods.

use std::sync::Arc;

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::RepairEngineConfig;
use crate::engine::RepairEngine;
use crate::error::{Error, Result};

pub struct SweepScheduler {
    scheduler: JobScheduler,
}

impl SweepScheduler {
    pub async fn new(engine: Arc<RepairEngine>, config: &RepairEngineConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await.map_err(schedule_error)?;
        let job_engine = engine.clone();
        let job = Job::new_async(config.sweep_schedule.as_str(), move |_uuid, _lock| {
            let engine = job_engine.clone();
            Box::pin(async move {
                match engine.sweep(Utc::now()).await {
                    Ok(swept) if !swept.is_empty() => {
                        info!(count = swept.len(), "repair sweep retired timed-out records");
                    }
                    Ok(_) => {}
                    Err(err) => error!(%err, "repair sweep failed"),
                }
            })
        })
        .map_err(schedule_error)?;
        scheduler.add(job).await.map_err(schedule_error)?;
        Ok(Self { scheduler })
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler.start().await.map_err(schedule_error)
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.scheduler.shutdown().await.map_err(schedule_error)
    }
}

fn schedule_error(err: impl std::fmt::Display) -> Error {
    Error::Core(payment_core_types::CoreError::Other(format!(
        "repair sweep scheduler: {err}"
    )))
}
