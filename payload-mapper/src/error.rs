//! Errors for payload transformation.

use payment_core_types::CoreError;
use thiserror::Error;

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Payload-mapper errors.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A token inside `{{...}}` was not one of the recognized functions.
    #[error("unknown value token: {0}")]
    UnknownToken(String),

    /// The expression grammar rejected the input at a given position.
    #[error("expression syntax error at position {pos} in `{expr}`: {reason}")]
    ExpressionSyntax {
        expr: String,
        pos: usize,
        reason: String,
    },
}
