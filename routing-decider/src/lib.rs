#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod decider;
pub mod error;

pub use decider::RoutingDecider;
pub use error::{Error, Result};
