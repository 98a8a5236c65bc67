//! lunar-ast: the parse tree contract of the lunar compiler.
//!
//! The compiler does not parse source text. It consumes an ESTree-shaped tree
//! produced by an external parser, either as JSON ([`Program::from_json`]) or
//! built directly with the [`build`] helpers.
//!
//! # Example
//!
//! ```
//! use lunar_ast::{build, Program};
//!
//! let program: Program = build::program(vec![build::expr_stmt(build::call(
//!     build::ident("log"),
//!     vec![build::num(1.0)],
//! ))]);
//! assert_eq!(program.body.len(), 1);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]

mod ast;
pub mod build;
mod error;
mod program;
mod span;

pub use ast::*;
pub use error::LoadError;
pub use program::Program;
pub use span::{LineIndex, Position, SourceLocation, Span};
