//! The public facade: wires a [`ConfigRepository`] to the merge algorithm
//! and to a per-kind TTL cache, and gives every other crate one place to
//! ask "what applies to this call right now".

use std::sync::Arc;

use payment_core_types::{
    CallContext, ClearingSystem, CoreError, FraudToggle, PayloadMapping, TenantClearingMapping,
};

use crate::cache::{ttl, CacheMetrics, ResolvedValueCache};
use crate::error::Result;
use crate::resolve::{self, ResolvedResiliency};

fn cache_key(ctx: &CallContext) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        ctx.tenant_id,
        ctx.payment_type.as_deref().unwrap_or("*"),
        ctx.local_instrument.as_deref().unwrap_or("*"),
        ctx.service_type,
        ctx.endpoint,
    )
}

/// Resolves layered configuration for one call context, caching results
/// per kind so repeated calls against the same tenant/service/endpoint
/// don't re-walk the repository.
pub struct ConfigResolver {
    repo: Arc<dyn payment_core_types::ConfigRepository>,
    resiliency_cache: ResolvedValueCache<ResolvedResiliency>,
    auth_cache: ResolvedValueCache<Option<payment_core_types::AuthDescriptor>>,
    fraud_toggle_cache: ResolvedValueCache<Option<FraudToggle>>,
    mapping_name_cache: ResolvedValueCache<Option<String>>,
}

impl ConfigResolver {
    pub fn new(repo: Arc<dyn payment_core_types::ConfigRepository>) -> Self {
        Self {
            repo,
            resiliency_cache: ResolvedValueCache::new(ttl::RESILIENCY),
            auth_cache: ResolvedValueCache::new(ttl::AUTH),
            fraud_toggle_cache: ResolvedValueCache::new(ttl::FRAUD_TOGGLE),
            mapping_name_cache: ResolvedValueCache::new(ttl::MAPPING),
        }
    }

    async fn active_layers(&self, ctx: &CallContext) -> Result<Vec<payment_core_types::ConfigLayer>> {
        let layers = self.repo.active_layers(ctx).await?;
        Ok(layers
            .into_iter()
            .filter(|l| resolve::is_effective(l, ctx))
            .collect())
    }

    /// Resolve the effective resiliency policy for this call, falling
    /// back to built-in defaults when no layer sets a given knob.
    pub async fn resolve_resiliency(&self, ctx: &CallContext) -> Result<ResolvedResiliency> {
        let key = cache_key(ctx);
        if let Some(cached) = self.resiliency_cache.get(&key) {
            return Ok(cached);
        }
        let layers = self.active_layers(ctx).await?;
        let resolved = resolve::resolve_resiliency(&layers)?;
        self.resiliency_cache.set(key, resolved);
        Ok(resolved)
    }

    /// Resolve the effective auth descriptor, erroring if none is configured.
    pub async fn resolve_auth(&self, ctx: &CallContext) -> Result<payment_core_types::AuthDescriptor> {
        let key = cache_key(ctx);
        if let Some(cached) = self.auth_cache.get(&key) {
            return cached.ok_or_else(|| no_config("auth", ctx).into());
        }
        let layers = self.active_layers(ctx).await?;
        let resolved = resolve::resolve_auth(&layers)?;
        self.auth_cache.set(key, resolved.clone());
        resolved.ok_or_else(|| no_config("auth", ctx).into())
    }

    /// Resolve whether fraud screening is enabled for this call. Absence
    /// of any layer is treated as "disabled" rather than an error — an
    /// unconfigured tenant should not be unable to process payments.
    pub async fn resolve_fraud_toggle(&self, ctx: &CallContext) -> Result<FraudToggle> {
        let key = cache_key(ctx);
        if let Some(cached) = self.fraud_toggle_cache.get(&key) {
            return Ok(cached.unwrap_or_else(default_fraud_toggle));
        }
        let layers = self.active_layers(ctx).await?;
        let resolved = resolve::resolve_fraud_toggle(&layers)?;
        self.fraud_toggle_cache.set(key, resolved.clone());
        Ok(resolved.unwrap_or_else(default_fraud_toggle))
    }

    /// Resolve the named payload mapping active for `mapping_name` at
    /// this call's tenant, or the implicitly-named mapping if a layer
    /// points at one via `mapping_name`.
    pub async fn resolve_mapping(
        &self,
        ctx: &CallContext,
        explicit_name: Option<&str>,
    ) -> Result<PayloadMapping> {
        let name = match explicit_name {
            Some(n) => n.to_string(),
            None => {
                let key = cache_key(ctx);
                let cached = if let Some(cached) = self.mapping_name_cache.get(&key) {
                    cached
                } else {
                    let layers = self.active_layers(ctx).await?;
                    let resolved = resolve::resolve_mapping_name(&layers)?;
                    self.mapping_name_cache.set(key, resolved.clone());
                    resolved
                };
                cached.ok_or_else(|| no_config("mapping", ctx))?
            }
        };
        self.repo
            .active_mapping(&ctx.tenant_id, &name)
            .await?
            .ok_or_else(|| no_config(&format!("mapping:{}", name), ctx).into())
    }

    /// Best-match tenant clearing mapping: the active row with the
    /// lowest `priority`, preferring one naming the exact
    /// `local_instrument` over one with `None` (matches any).
    pub async fn tenant_clearing_mapping(
        &self,
        tenant_id: &str,
        payment_type: &str,
        local_instrument: Option<&str>,
    ) -> Result<TenantClearingMapping> {
        let mut candidates = self
            .repo
            .tenant_clearing_mappings(tenant_id, payment_type, local_instrument)
            .await?;
        candidates.sort_by(|a, b| {
            let specificity = |m: &TenantClearingMapping| m.local_instrument.is_none() as u8;
            specificity(a)
                .cmp(&specificity(b))
                .then(a.priority.cmp(&b.priority))
        });
        candidates.into_iter().next().ok_or_else(|| {
            CoreError::NoRouteFound {
                tenant: tenant_id.to_string(),
                payment_type: payment_type.to_string(),
            }
            .into()
        })
    }

    /// Fetch a clearing system by code.
    pub async fn clearing_system(&self, code: &str) -> Result<ClearingSystem> {
        self.repo
            .clearing_system(code)
            .await?
            .ok_or_else(|| CoreError::Other(format!("unknown clearing system {}", code)).into())
    }

    pub fn invalidate_tenant(&self, tenant_id: &str) {
        self.resiliency_cache.invalidate_tenant(tenant_id);
        self.auth_cache.invalidate_tenant(tenant_id);
        self.fraud_toggle_cache.invalidate_tenant(tenant_id);
        self.mapping_name_cache.invalidate_tenant(tenant_id);
    }

    pub fn cache_metrics(&self) -> ResolverCacheMetrics {
        ResolverCacheMetrics {
            resiliency: self.resiliency_cache.metrics(),
            auth: self.auth_cache.metrics(),
            fraud_toggle: self.fraud_toggle_cache.metrics(),
            mapping_name: self.mapping_name_cache.metrics(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverCacheMetrics {
    pub resiliency: CacheMetrics,
    pub auth: CacheMetrics,
    pub fraud_toggle: CacheMetrics,
    pub mapping_name: CacheMetrics,
}

fn no_config(kind: &str, ctx: &CallContext) -> CoreError {
    CoreError::NoConfigFound {
        kind: kind.to_string(),
        tenant: ctx.tenant_id.clone(),
    }
}

fn default_fraud_toggle() -> FraudToggle {
    FraudToggle {
        enabled: false,
        reason: "no active fraud-toggle layer, defaulting to disabled".to_string(),
        effective_from: None,
        effective_until: None,
    }
}
