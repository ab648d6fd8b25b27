#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod bulkhead;
pub mod circuit;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod retry;

pub use bulkhead::Bulkhead;
pub use circuit::CircuitBreaker;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use ports::{FallbackCache, RetryQueue};
pub use retry::{backoff_duration, with_retry, with_retry_instrumented};
