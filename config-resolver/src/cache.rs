//! In-process, TTL'd cache of resolved configuration, so a hot
//! `(tenant, payment_type, service, endpoint)` key doesn't re-walk every
//! active layer on every call.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Cache entry TTLs, mirroring how long a resolved value is trusted
/// before the next call re-resolves it from the repository.
pub mod ttl {
    use std::time::Duration;

    pub const RESILIENCY: Duration = Duration::from_secs(30);
    pub const AUTH: Duration = Duration::from_secs(60);
    pub const FRAUD_TOGGLE: Duration = Duration::from_secs(15);
    pub const MAPPING: Duration = Duration::from_secs(60);
    pub const TENANT_CLEARING: Duration = Duration::from_secs(30);
}

#[derive(Default, Debug, Clone, Copy)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub invalidations: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64) / (total as f64) * 100.0
        }
    }
}

struct Entry<T> {
    value: T,
    expires_at: Instant,
}

/// A single-type TTL cache keyed by an arbitrary `String` cache key.
/// One instance is kept per resolved-value kind (resiliency, auth, ...)
/// rather than one shared heterogeneous cache, so each kind can carry
/// its own TTL and its own hit-rate.
pub struct ResolvedValueCache<T: Clone + Send + Sync + 'static> {
    entries: DashMap<String, Entry<T>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    invalidations: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> ResolvedValueCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, key: String, value: T) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invalidate(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn invalidate_tenant(&self, tenant_id: &str) {
        let prefix = format!("{}:", tenant_id);
        let doomed: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| k.starts_with(&prefix))
            .collect();
        for key in doomed {
            self.invalidate(&key);
        }
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Generational guard so a config mutation (e.g. an admin pushing a new
/// layer) can be reflected by bumping a tenant's generation rather than
/// enumerating every cache key. Not yet wired to a write path (none
/// exists in this crate) but kept so `ConfigResolver` can invalidate
/// cheaply once one does.
pub struct Generation {
    value: RwLock<u64>,
}

impl Default for Generation {
    fn default() -> Self {
        Self { value: RwLock::new(0) }
    }
}

impl Generation {
    pub async fn current(&self) -> u64 {
        *self.value.read().await
    }

    pub async fn bump(&self) -> u64 {
        let mut guard = self.value.write().await;
        *guard += 1;
        *guard
    }
}
