//! Error taxonomy of the compilation pipeline.
//!
//! User-facing failures (`InputRejected`, `Lowering`) carry source locations.
//! Internal defects (`IrIntegrity`, `EmissionGap`) carry arena identifiers and
//! are never the input author's fault.

use crate::ir::NodeId;
use lunar_ast::{Node, SourceLocation, Span};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stable error codes (SCREAMING_SNAKE_CASE).
pub mod codes {
    pub const LOAD_FAILED: &str = "LOAD_FAILED";
    pub const INPUT_REJECTED: &str = "INPUT_REJECTED";
    pub const LOWERING_FAILED: &str = "LOWERING_FAILED";
    pub const IR_INTEGRITY: &str = "IR_INTEGRITY";
    pub const EMISSION_GAP: &str = "EMISSION_GAP";
}

/// Where in the source a diagnostic points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Location {
    pub fn of(node: &Node) -> Self {
        Self {
            loc: node.loc.clone(),
            span: node.span,
        }
    }

    pub fn is_known(&self) -> bool {
        self.loc.is_some() || self.span.is_some()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.loc, self.span) {
            (Some(loc), _) => write!(f, "{loc}"),
            (None, Some(span)) => write!(f, "bytes {}..{}", span.start, span.end),
            (None, None) => write!(f, "unknown location"),
        }
    }
}

/// One unsupported construct found by the AST validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub node_type: String,
    pub location: Location,
    pub reason: String,
}

impl Diagnostic {
    pub fn new(node: &Node, reason: impl Into<String>) -> Self {
        Self {
            node_type: node.type_name.clone(),
            location: Location::of(node),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_known() {
            write!(f, "{} at {}: {}", self.node_type, self.location, self.reason)
        } else {
            write!(f, "{}: {}", self.node_type, self.reason)
        }
    }
}

/// The lowerer met a construct it has no desugaring rule for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot lower {node_type} at {location}: {reason}")]
pub struct LoweringError {
    pub node_type: String,
    pub location: Location,
    pub reason: String,
}

impl LoweringError {
    pub fn new(node: &Node, reason: impl Into<String>) -> Self {
        Self {
            node_type: node.type_name.clone(),
            location: Location::of(node),
            reason: reason.into(),
        }
    }
}

/// An arena invariant violation found by the IR validator.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "camelCase")]
pub enum Violation {
    #[error("{node} ({kind}).{field} references missing node {target}")]
    DanglingReference {
        node: NodeId,
        kind: &'static str,
        field: &'static str,
        target: NodeId,
    },

    #[error("moduleBody references missing node {target}")]
    DanglingModuleBody { target: NodeId },

    #[error("cycle through {}", join_ids(.path))]
    Cycle { path: Vec<NodeId> },

    #[error("{node} ({kind}).{field} expects {expected}, found {found}")]
    FieldShape {
        node: NodeId,
        kind: &'static str,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("moduleBody entry {target} is a {found}, not a statement")]
    ModuleBodyShape { target: NodeId, found: &'static str },
}

/// The emitter reached a node it cannot render in its position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no emission rule for {kind} node {node} in {context}")]
pub struct EmissionGap {
    pub node: NodeId,
    pub kind: &'static str,
    pub context: &'static str,
}

/// Failure to load an arena from its JSON form.
#[derive(Error, Debug)]
pub enum ArenaLoadError {
    #[error("invalid arena JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Parses, but is not what `Arena::to_canonical_json` would produce.
    #[error("non-canonical arena JSON at {path}: {reason}")]
    NonCanonical { path: String, reason: String },
}

impl ArenaLoadError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        codes::LOAD_FAILED
    }
}

/// Any failure of the compilation pipeline.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("failed to load parse tree: {0}")]
    Load(#[from] lunar_ast::LoadError),

    #[error("input rejected: {}", join_all(.diagnostics))]
    InputRejected { diagnostics: Vec<Diagnostic> },

    #[error(transparent)]
    Lowering(#[from] LoweringError),

    #[error("internal error: IR integrity violated: {}", join_all(.violations))]
    IrIntegrity { violations: Vec<Violation> },

    #[error("internal error: {0}")]
    EmissionGap(#[from] EmissionGap),
}

impl CompileError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Load(_) => codes::LOAD_FAILED,
            Self::InputRejected { .. } => codes::INPUT_REJECTED,
            Self::Lowering(_) => codes::LOWERING_FAILED,
            Self::IrIntegrity { .. } => codes::IR_INTEGRITY,
            Self::EmissionGap(_) => codes::EMISSION_GAP,
        }
    }

    /// True for compiler defects, false for problems with the input.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::IrIntegrity { .. } | Self::EmissionGap(_))
    }

    /// Diagnostics of an `InputRejected` error, empty otherwise.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::InputRejected { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

fn join_all<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_ids(path: &[NodeId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunar_ast::{build, Position};

    #[test]
    fn test_diagnostic_display_with_location() {
        let node = build::ident("arguments").with_loc(SourceLocation::new(
            Position::new(2, 4),
            Position::new(2, 13),
        ));
        let diagnostic = Diagnostic::new(&node, "the arguments object is not supported");
        assert_eq!(
            diagnostic.to_string(),
            "Identifier at 2:5: the arguments object is not supported"
        );
    }

    #[test]
    fn test_codes_are_screaming_snake_case() {
        let errors = [
            CompileError::InputRejected {
                diagnostics: vec![],
            },
            CompileError::IrIntegrity { violations: vec![] },
        ];
        for err in &errors {
            let code = err.code();
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c == '_'), "{code}");
        }
        assert!(!errors[0].is_internal());
        assert!(errors[1].is_internal());
    }

    #[test]
    fn test_violation_serializes_with_tag() {
        let violation = Violation::DanglingModuleBody {
            target: NodeId::new(9),
        };
        let json = serde_json::to_value(&violation).unwrap();
        assert_eq!(json["violation"], "danglingModuleBody");
        assert_eq!(json["target"], 9);
    }
}
