//! The compilation-unit root.

use crate::ast::{Node, NodeKind, SourceType};
use crate::span::{LineIndex, SourceLocation, Span};
use crate::LoadError;
use serde_json::Value;

/// A parsed compilation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Node>,
    pub source_type: SourceType,
    pub loc: Option<SourceLocation>,
    pub span: Option<Span>,
}

impl Program {
    pub fn new(body: Vec<Node>) -> Self {
        Self {
            body,
            source_type: SourceType::Script,
            loc: None,
            span: None,
        }
    }

    /// Load an ESTree `Program` from JSON text.
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Load an ESTree `Program`, deriving `loc` for nodes that only carry byte
    /// offsets from the original source text.
    pub fn from_json_with_source(json: &str, source: &str) -> Result<Self, LoadError> {
        let mut value: Value = serde_json::from_str(json)?;
        attach_locations(&mut value, &LineIndex::new(source));
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, LoadError> {
        let node = Node::from_value(value)?;
        match node.kind {
            NodeKind::Program { body, source_type } => Ok(Self {
                body,
                source_type,
                loc: node.loc,
                span: node.span,
            }),
            _ => Err(LoadError::NotAProgram(node.type_name)),
        }
    }
}

/// Fill in missing `loc` objects from `start`/`end` offsets.
fn attach_locations(value: &mut Value, index: &LineIndex) {
    match value {
        Value::Object(map) => {
            let offsets = (
                map.get("start").and_then(Value::as_u64),
                map.get("end").and_then(Value::as_u64),
            );
            if map.contains_key("type") && !map.contains_key("loc") {
                if let (Some(start), Some(end)) = offsets {
                    let span = Span::new(
                        u32::try_from(start).unwrap_or(u32::MAX),
                        u32::try_from(end).unwrap_or(u32::MAX),
                    );
                    if let Ok(loc) = serde_json::to_value(index.location(span)) {
                        map.insert("loc".to_string(), loc);
                    }
                }
            }
            for child in map.values_mut() {
                attach_locations(child, index);
            }
        }
        Value::Array(items) => {
            for item in items {
                attach_locations(item, index);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "let a = 1;\nfoo(a);";
    const TREE: &str = r#"{
        "type": "Program", "sourceType": "script", "start": 0, "end": 18,
        "body": [
            {"type": "VariableDeclaration", "kind": "let", "start": 0, "end": 10,
             "declarations": [{"type": "VariableDeclarator", "start": 4, "end": 9,
                "id": {"type": "Identifier", "name": "a", "start": 4, "end": 5},
                "init": {"type": "Literal", "value": 1, "raw": "1", "start": 8, "end": 9}}]},
            {"type": "ExpressionStatement", "start": 11, "end": 18,
             "expression": {"type": "CallExpression", "optional": false, "start": 11, "end": 17,
                "callee": {"type": "Identifier", "name": "foo", "start": 11, "end": 14},
                "arguments": [{"type": "Identifier", "name": "a", "start": 15, "end": 16}]}}
        ]
    }"#;

    #[test]
    fn test_load_program() {
        let program = Program::from_json(TREE).unwrap();
        assert_eq!(program.body.len(), 2);
        assert_eq!(program.span, Some(Span::new(0, 18)));
        assert!(program.body[1].loc.is_none());
    }

    #[test]
    fn test_locations_derived_from_source() {
        let program = Program::from_json_with_source(TREE, SOURCE).unwrap();
        let call = &program.body[1];
        let loc = call.loc.as_ref().unwrap();
        assert_eq!(loc.start.line, 2);
        assert_eq!(loc.start.column, 0);
    }

    #[test]
    fn test_non_program_root_rejected() {
        let err = Program::from_json(r#"{"type":"Identifier","name":"x"}"#).unwrap_err();
        assert!(matches!(err, LoadError::NotAProgram(name) if name == "Identifier"));
    }
}
