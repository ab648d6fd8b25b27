//! Shared data model, error taxonomy and collaborator traits for the
//! payment core.
//!
//! Every other crate in this workspace depends on this one and on
//! nothing else in the workspace; it carries no business logic of its
//! own, only the types and trait boundaries the other crates agree on.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod model;
pub mod ports;
pub mod testing;

pub use error::{CoreError, Result};
pub use model::*;
pub use ports::{
    AccountInfo, ClearingSystemAdapter, Clock, ConfigRepository, CoreBankingAdapter, DispatchAck,
    FraudAdapter, FraudAdapterResponse, IdGenerator, LegOutcome, LegReceipt,
};
