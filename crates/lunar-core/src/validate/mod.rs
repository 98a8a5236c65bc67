//! Validation passes that bracket lowering.
//!
//! - [`validate_ast`] runs on the input tree before any IR exists and reports
//!   unsupported constructs with source locations.
//! - [`validate_ir`] runs on the finished arena and reports broken invariants
//!   with arena identifiers.

mod ast;
mod ir;

pub use ast::validate_ast;
pub use ir::validate_ir;
