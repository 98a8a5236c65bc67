use crate::error::Violation;
use crate::ir::{Arena, Category, Node, NodeId};
use rustc_hash::FxHashMap;

/// Check referential integrity, acyclicity and per-field shapes of a finished
/// arena.
pub fn validate_ir(arena: &Arena) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();

    for &target in arena.module_body() {
        match arena.get(target) {
            None => violations.push(Violation::DanglingModuleBody { target }),
            Some(node) if node.category() != Category::Statement => {
                violations.push(Violation::ModuleBodyShape {
                    target,
                    found: node.kind_name(),
                });
            }
            Some(_) => {}
        }
    }

    for (id, node) in arena.iter() {
        check_node(arena, id, node, &mut violations);
    }

    find_cycles(arena, &mut violations);

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn check_node(arena: &Arena, id: NodeId, node: &Node, violations: &mut Vec<Violation>) {
    for reference in node.references() {
        match arena.get(reference.target) {
            None => violations.push(Violation::DanglingReference {
                node: id,
                kind: node.kind_name(),
                field: reference.field,
                target: reference.target,
            }),
            Some(target) if !reference.expect.accepts(target) => {
                violations.push(Violation::FieldShape {
                    node: id,
                    kind: node.kind_name(),
                    field: reference.field,
                    expected: reference.expect.describe(),
                    found: target.kind_name(),
                });
            }
            Some(_) => {}
        }
    }

    if let Node::Literal {
        literal_kind,
        value,
        ..
    } = node
    {
        if value.kind() != *literal_kind {
            violations.push(Violation::FieldShape {
                node: id,
                kind: node.kind_name(),
                field: "value",
                expected: kind_label(*literal_kind),
                found: kind_label(value.kind()),
            });
        }
    }
}

fn kind_label(kind: crate::ir::LiteralKind) -> &'static str {
    use crate::ir::LiteralKind;
    match kind {
        LiteralKind::String => "a string value",
        LiteralKind::Number => "a number value",
        LiteralKind::Boolean => "a boolean value",
        LiteralKind::Null => "a null value",
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Active,
    Done,
}

/// Iterative depth-first search over reference edges. Each back edge is
/// reported once, with the path from the re-entered node to itself.
fn find_cycles(arena: &Arena, violations: &mut Vec<Violation>) {
    let mut marks: FxHashMap<NodeId, Mark> = FxHashMap::default();

    for (root, _) in arena.iter() {
        if marks.contains_key(&root) {
            continue;
        }

        let mut stack: Vec<(NodeId, Vec<NodeId>, usize)> = vec![(root, successors(arena, root), 0)];
        marks.insert(root, Mark::Active);

        while let Some((_, edges, next)) = stack.last_mut() {
            let Some(&target) = edges.get(*next) else {
                if let Some((done, _, _)) = stack.pop() {
                    marks.insert(done, Mark::Done);
                }
                continue;
            };
            *next += 1;

            match marks.get(&target) {
                Some(Mark::Done) => {}
                Some(Mark::Active) => {
                    let start = stack.iter().position(|(id, _, _)| *id == target).unwrap_or(0);
                    let mut path: Vec<NodeId> =
                        stack[start..].iter().map(|(id, _, _)| *id).collect();
                    path.push(target);
                    violations.push(Violation::Cycle { path });
                }
                None => {
                    marks.insert(target, Mark::Active);
                    stack.push((target, successors(arena, target), 0));
                }
            }
        }
    }
}

/// Existing reference targets; dangling ones are reported separately.
fn successors(arena: &Arena, id: NodeId) -> Vec<NodeId> {
    arena.get(id).map_or_else(Vec::new, |node| {
        node.references()
            .into_iter()
            .map(|r| r.target)
            .filter(|target| arena.contains(*target))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{LiteralKind, LiteralValue};

    fn arena_from(json: serde_json::Value) -> Arena {
        Arena::from_json(&json.to_string()).unwrap()
    }

    #[test]
    fn test_accepts_well_formed_arena() {
        let mut arena = Arena::new();
        let callee = arena.ident("print");
        let arg = arena.string("hi");
        let call = arena.call(callee, vec![arg]);
        let stmt = arena.expr_stmt(call);
        arena.push_module_statement(stmt);
        assert_eq!(validate_ir(&arena), Ok(()));
    }

    #[test]
    fn test_reports_dangling_reference() {
        let arena = arena_from(serde_json::json!({
            "nodes": {
                "0": {"kind": "ExpressionStatement", "expression": 7}
            },
            "moduleBody": [0, 4]
        }));
        let violations = validate_ir(&arena).unwrap_err();
        assert!(violations.contains(&Violation::DanglingModuleBody {
            target: NodeId::new(4)
        }));
        assert!(violations.contains(&Violation::DanglingReference {
            node: NodeId::new(0),
            kind: "ExpressionStatement",
            field: "expression",
            target: NodeId::new(7),
        }));
    }

    #[test]
    fn test_reports_cycle() {
        let arena = arena_from(serde_json::json!({
            "nodes": {
                "0": {"kind": "BlockStatement", "statements": [1]},
                "1": {"kind": "IfStatement", "test": 2, "consequent": 0, "alternate": null},
                "2": {"kind": "Literal", "literalKind": "boolean", "value": true, "raw": "true"}
            },
            "moduleBody": [0]
        }));
        let violations = validate_ir(&arena).unwrap_err();
        let cycles: Vec<_> = violations
            .iter()
            .filter_map(|v| match v {
                Violation::Cycle { path } => Some(path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(cycles, vec![vec![NodeId::new(0), NodeId::new(1), NodeId::new(0)]]);
    }

    #[test]
    fn test_reports_field_shape_mismatch() {
        let mut arena = Arena::new();
        let not_a_block = arena.ident("x");
        let test = arena.boolean(true);
        let stmt = arena.alloc(Node::WhileStatement {
            test,
            body: not_a_block,
            continue_label: None,
        });
        arena.push_module_statement(stmt);
        let expr = arena.ident("y");
        arena.push_module_statement(expr);

        let violations = validate_ir(&arena).unwrap_err();
        assert_eq!(
            violations,
            vec![
                Violation::ModuleBodyShape {
                    target: expr,
                    found: "Identifier"
                },
                Violation::FieldShape {
                    node: stmt,
                    kind: "WhileStatement",
                    field: "body",
                    expected: "a BlockStatement",
                    found: "Identifier",
                },
            ]
        );
    }

    #[test]
    fn test_assignment_only_as_statement() {
        let mut arena = Arena::new();
        let left = arena.ident("a");
        let right = arena.number(1.0);
        let assignment = arena.alloc(Node::AssignmentExpression { left, right });
        let callee = arena.ident("f");
        let call = arena.call(callee, vec![assignment]);
        let stmt = arena.expr_stmt(call);
        arena.push_module_statement(stmt);

        let violations = validate_ir(&arena).unwrap_err();
        assert!(matches!(
            violations.as_slice(),
            [Violation::FieldShape { field: "arguments", found: "AssignmentExpression", .. }]
        ));
    }

    #[test]
    fn test_literal_value_must_match_kind() {
        let mut arena = Arena::new();
        let literal = arena.alloc(Node::Literal {
            literal_kind: LiteralKind::Number,
            value: LiteralValue::String("1".to_string()),
            raw: "1".to_string(),
        });
        let stmt = arena.ret(vec![literal]);
        arena.push_module_statement(stmt);
        let violations = validate_ir(&arena).unwrap_err();
        assert!(matches!(violations[0], Violation::FieldShape { field: "value", .. }));
    }
}
