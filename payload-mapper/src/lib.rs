//! Generic, schema-agnostic payload transformation: dotted-path access into
//! opaque JSON bodies, value-template token rendering, a small expression
//! grammar for derived values, and the rule-application pipeline that
//! applies a `PayloadMapping` end to end.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod engine;
pub mod error;
pub mod expr;
pub mod invert;
pub mod path;
pub mod tokens;
pub mod transform;

pub use engine::apply_mapping;
pub use error::{Error, Result};
pub use expr::{eval, parse, BinOp, Expr, UnaryOp};
pub use invert::invert_field_map;
