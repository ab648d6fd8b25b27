//! A `(service, tenant)`-scoped semaphore bulkhead: caps the number of
//! concurrent in-flight calls, with a bounded wait for a free slot.

use std::sync::Arc;
use std::time::Duration;

use config_resolver::ResolvedResiliency;
use dashmap::DashMap;
use payment_core_types::CoreError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::Result;

pub struct Bulkhead {
    semaphores: DashMap<String, Arc<Semaphore>>,
}

impl Default for Bulkhead {
    fn default() -> Self {
        Self::new()
    }
}

impl Bulkhead {
    pub fn new() -> Self {
        Self {
            semaphores: DashMap::new(),
        }
    }

    fn key(service: &str, tenant: &str) -> String {
        format!("{}|{}", service, tenant)
    }

    fn semaphore_for(&self, service: &str, tenant: &str, capacity: u32) -> Arc<Semaphore> {
        self.semaphores
            .entry(Self::key(service, tenant))
            .or_insert_with(|| Arc::new(Semaphore::new(capacity.max(1) as usize)))
            .clone()
    }

    /// Acquire a slot, waiting up to `cfg.bulkhead_max_wait_millis` (0 means
    /// don't wait at all). Returns `BulkheadFull` on timeout.
    pub async fn acquire(
        &self,
        service: &str,
        tenant: &str,
        cfg: &ResolvedResiliency,
    ) -> Result<OwnedSemaphorePermit> {
        let sem = self.semaphore_for(service, tenant, cfg.max_concurrent_calls);
        let capacity = cfg.max_concurrent_calls;
        let in_flight = || capacity as u32 - sem.available_permits() as u32;

        let acquired = if cfg.bulkhead_max_wait_millis == 0 {
            Arc::clone(&sem).try_acquire_owned().ok()
        } else {
            tokio::time::timeout(
                Duration::from_millis(cfg.bulkhead_max_wait_millis),
                Arc::clone(&sem).acquire_owned(),
            )
            .await
            .ok()
            .and_then(|r| r.ok())
        };

        acquired.ok_or_else(|| {
            CoreError::BulkheadFull {
                service: service.to_string(),
                tenant: tenant.to_string(),
                in_flight: in_flight(),
                capacity,
            }
            .into()
        })
    }
}
