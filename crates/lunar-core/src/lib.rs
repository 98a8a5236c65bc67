//! lunar-core: compiles ESTree parse trees to Lua 5.4 source.
//!
//! The pipeline has four stages, each a pure function of its input:
//!
//! 1. [`validate::validate_ast`] rejects constructs outside the supported
//!    subset, with source locations.
//! 2. [`lower::lower`] desugars the tree into a flat, id-indexed IR arena.
//! 3. [`validate::validate_ir`] checks the arena's integrity invariants.
//! 4. [`emit::emit`] renders the arena as text.
//!
//! [`compile`] runs all four and stops at the first failing stage; nothing is
//! emitted for a unit that fails anywhere.
//!
//! # Example
//!
//! ```
//! use lunar_ast::build;
//! use lunar_core::{compile, CompileOptions};
//!
//! let program = build::program(vec![build::const_("x", build::num(1.0))]);
//! let output = compile(&program, &CompileOptions::default()).unwrap();
//! assert_eq!(output.code, "local x = 1\n");
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod emit;
pub mod error;
pub mod ir;
pub mod lower;
pub mod names;
pub mod protocol;
pub mod validate;

pub use config::{CompileOptions, ConfigError};
pub use error::{
    ArenaLoadError, CompileError, Diagnostic, EmissionGap, Location, LoweringError, Violation,
};
pub use ir::{Arena, NodeId};
pub use protocol::RuntimeHelper;

use lunar_ast::Program;
use tracing::{debug, debug_span, error, warn};

/// The result of compiling one unit.
#[derive(Debug)]
pub struct CompileOutput {
    /// Emitted Lua source.
    pub code: String,
    /// The validated IR the code was emitted from.
    pub arena: Arena,
    /// Runtime helpers included in `code`, in emission order.
    pub helpers: Vec<RuntimeHelper>,
}

/// Compile a parse tree.
pub fn compile(program: &Program, options: &CompileOptions) -> Result<CompileOutput, CompileError> {
    {
        let _span = debug_span!("validate_ast", statements = program.body.len()).entered();
        if let Err(diagnostics) = validate::validate_ast(program) {
            warn!(count = diagnostics.len(), "input rejected");
            return Err(CompileError::InputRejected { diagnostics });
        }
    }

    let lowered = {
        let _span = debug_span!("lower").entered();
        let lowered = lower::lower(program, options).map_err(|e| {
            warn!(node_type = %e.node_type, reason = %e.reason, "lowering failed");
            e
        })?;
        debug!(nodes = lowered.arena.len(), helpers = lowered.helpers.len(), "lowered");
        lowered
    };

    {
        let _span = debug_span!("validate_ir", nodes = lowered.arena.len()).entered();
        if let Err(violations) = validate::validate_ir(&lowered.arena) {
            error!(count = violations.len(), "IR integrity violated");
            return Err(CompileError::IrIntegrity { violations });
        }
    }

    let code = {
        let _span = debug_span!("emit").entered();
        let code = emit::emit(&lowered.arena, options).map_err(|e| {
            error!(node = %e.node, kind = e.kind, "no emission rule");
            e
        })?;
        debug!(bytes = code.len(), "emitted");
        code
    };

    Ok(CompileOutput {
        code,
        arena: lowered.arena,
        helpers: lowered.helpers,
    })
}

/// Compile an ESTree JSON document.
pub fn compile_json(json: &str, options: &CompileOptions) -> Result<CompileOutput, CompileError> {
    let program = Program::from_json(json).map_err(|e| {
        warn!(error = %e, "failed to load parse tree");
        e
    })?;
    compile(&program, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunar_ast::build;

    #[test]
    fn test_compile_reports_rejected_input() {
        let program = build::program(vec![build::with_(build::ident("o"), vec![])]);
        let err = compile(&program, &CompileOptions::default()).unwrap_err();
        assert_eq!(err.code(), error::codes::INPUT_REJECTED);
        assert_eq!(err.diagnostics().len(), 1);
        assert_eq!(err.diagnostics()[0].node_type, "WithStatement");
        assert!(!err.is_internal());
    }

    #[test]
    fn test_compile_json_rejects_malformed_json() {
        let err = compile_json("{ not json", &CompileOptions::default()).unwrap_err();
        assert_eq!(err.code(), error::codes::LOAD_FAILED);
    }

    #[test]
    fn test_header_comes_first() {
        let program = build::program(vec![build::const_("x", build::num(1.0))]);
        let options = CompileOptions::default().with_header("generated");
        let output = compile(&program, &options).unwrap();
        assert_eq!(output.code, "-- generated\nlocal x = 1\n");
        assert!(output.helpers.is_empty());
    }
}
