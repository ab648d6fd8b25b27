#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod ports;
pub mod worker;

pub use config::QueueWorkerConfig;
pub use error::{Error, Result};
pub use ports::{OutboundInvoker, QueuedMessageStore};
pub use worker::QueueWorker;
