#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod gate;
pub mod ports;
pub mod thresholds;

pub use error::{Error, Result};
pub use gate::{FraudGate, MappingNames};
pub use ports::FraudAssessmentStore;
pub use thresholds::FraudThresholds;
