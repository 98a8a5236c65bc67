//! Shared helpers for integration tests.

#![allow(dead_code)]

use lunar_ast::Program;
use lunar_core::{compile, CompileOptions, CompileOutput};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Route stage logs to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Compile with default options, panicking with the error on failure.
pub fn compile_ok(program: &Program) -> CompileOutput {
    init_tracing();
    match compile(program, &CompileOptions::default()) {
        Ok(output) => output,
        Err(e) => panic!("compilation failed ({}): {e}", e.code()),
    }
}
