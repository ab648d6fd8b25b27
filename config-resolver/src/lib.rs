//! Multi-level configuration resolution (spec C1): merges active config
//! layers across clearing-system, tenant, payment-type and
//! downstream-call scopes into the concrete values every other
//! component needs for one call.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod cache;
pub mod error;
pub mod resolve;
pub mod resolver;

pub use error::{Error, Result};
pub use resolve::{ResolvedResiliency, DEFAULT_RESILIENCY};
pub use resolver::{ConfigResolver, ResolverCacheMetrics};
