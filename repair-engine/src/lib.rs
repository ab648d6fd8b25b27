#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod backoff;
pub mod config;
pub mod engine;
pub mod error;
pub mod ports;
pub mod scheduler;

pub use config::RepairEngineConfig;
pub use engine::RepairEngine;
pub use error::{Error, Result};
pub use ports::{ActionOutcome, CorrectiveActionExecutor, RepairRepository};
pub use scheduler::SweepScheduler;
