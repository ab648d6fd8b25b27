#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod leg;
pub mod orchestrator;
pub mod ports;

pub use config::OrchestratorConfig;
pub use error::{Error, Result};
pub use leg::{LegExecutor, RollbackAction};
pub use orchestrator::PaymentOrchestrator;
pub use ports::{PendingAckStore, RepairSink};
