//! Errors for config resolution, layered over the shared core taxonomy.

use payment_core_types::CoreError;
use thiserror::Error;

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Config-resolver errors. The repository collaborator and the resolver
/// itself both only ever fail with the shared taxonomy (`NoConfigFound`,
/// `AmbiguousConfig`), so this wraps it transparently rather than
/// duplicating variants.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),
}
