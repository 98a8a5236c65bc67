//! Destructuring patterns.
//!
//! A pattern binds against a value that has already been lowered. Nested
//! patterns and anything read more than once go through a named local, so
//! every source expression is evaluated exactly once.

use super::{LowerResult, Lowerer};
use crate::error::LoweringError;
use crate::ir::{BinaryOperator, DeclarationKind, Declarator, Node as Ir, NodeId};
use crate::names;
use crate::protocol::RuntimeHelper;
use lunar_ast::{Node, NodeKind};

/// How a pattern introduces its names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Binding {
    /// Declare fresh locals.
    Local,
    /// Assign to existing bindings or members.
    Assign,
}

impl Lowerer<'_> {
    /// Bind `pattern` to `value`, appending the statements to `out`.
    pub(super) fn bind_pattern(
        &mut self,
        pattern: &Node,
        value: NodeId,
        binding: Binding,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        match &pattern.kind {
            NodeKind::Identifier { name } => {
                let target = Self::binding_name(name);
                match binding {
                    Binding::Local => {
                        self.scopes.declare(name);
                        out.push(self.arena.local(&target, Some(value)));
                    }
                    Binding::Assign => out.push(self.arena.assign_name(&target, value)),
                }
                Ok(())
            }
            NodeKind::MemberExpression { .. } if binding == Binding::Assign => {
                let place = self.place(pattern, out)?;
                let target = self.place_expr(&place)?;
                out.push(self.arena.assign(target, value));
                Ok(())
            }
            NodeKind::AssignmentPattern { left, right } => {
                self.bind_default(left, right, value, binding, out)
            }
            NodeKind::ObjectPattern { properties } => {
                self.bind_object(properties, value, binding, out)
            }
            NodeKind::ArrayPattern { elements } => self.bind_array(elements, value, binding, out),
            _ => Err(LoweringError::new(pattern, "unsupported binding pattern")),
        }
    }

    /// `pattern = default` when the value is nil. The check is an explicit
    /// nil comparison, so `false` and `0` are kept.
    fn bind_default(
        &mut self,
        left: &Node,
        default: &Node,
        value: NodeId,
        binding: Binding,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let checked = match left.as_identifier() {
            Some(name) => {
                self.bind_pattern(left, value, binding, out)?;
                Self::binding_name(name)
            }
            None => self.ensure_name(value, out),
        };

        let current = self.arena.ident(checked.as_str());
        let nil = self.arena.null();
        let test = self.arena.binary(BinaryOperator::Eq, current, nil);
        let default = self.lower_expr(default)?;
        let fill = self.arena.assign_name(&checked, default);
        out.push(self.arena.if_(test, vec![fill], None));

        if left.as_identifier().is_none() {
            let value = self.arena.ident(checked);
            self.bind_pattern(left, value, binding, out)?;
        }
        Ok(())
    }

    fn bind_object(
        &mut self,
        properties: &[Node],
        value: NodeId,
        binding: Binding,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        if binding == Binding::Local {
            if let Some(pairs) = simple_object_pattern(properties) {
                let source = self.ensure_name(value, out);
                let mut entries = Vec::with_capacity(pairs.len());
                for (key, local) in pairs {
                    self.scopes.declare(local);
                    let key = self.arena.ident(names::sanitize_field(key));
                    let value = self.arena.ident(Self::binding_name(local));
                    entries.push(self.arena.alloc(Ir::Property {
                        key,
                        value,
                        computed: false,
                        shorthand: false,
                    }));
                }
                let pattern = self.arena.alloc(Ir::ObjectPattern { properties: entries });
                let init = self.arena.ident(source);
                out.push(self.arena.alloc(Ir::VariableDeclaration {
                    declaration_kind: DeclarationKind::Const,
                    declarations: vec![Declarator {
                        pattern,
                        init: Some(init),
                    }],
                }));
                return Ok(());
            }
        }

        let source = self.ensure_name(value, out);
        let mut seen = Vec::new();
        for property in properties {
            match &property.kind {
                NodeKind::Property {
                    key,
                    value: target,
                    computed,
                    ..
                } => {
                    let object = self.arena.ident(source.as_str());
                    let read = if *computed {
                        let key = self.lower_expr(key)?;
                        self.arena.index(object, key)
                    } else {
                        let name = static_key(key)
                            .ok_or_else(|| LoweringError::new(key, "unsupported pattern key"))?;
                        let field = names::sanitize_field(&name).into_owned();
                        seen.push(field.clone());
                        self.arena.member(object, &field)
                    };
                    self.bind_pattern(target, read, binding, out)?;
                }
                NodeKind::RestElement { argument } => {
                    self.require(RuntimeHelper::ObjectRest);
                    let object = self.arena.ident(source.as_str());
                    let excluded = seen
                        .iter()
                        .map(|field| (field.as_str(), self.arena.boolean(true)))
                        .collect::<Vec<_>>();
                    let excluded = self.arena.object(excluded);
                    let rest = self
                        .arena
                        .call_named(RuntimeHelper::ObjectRest.name(), vec![object, excluded]);
                    self.bind_pattern(argument, rest, binding, out)?;
                }
                _ => return Err(LoweringError::new(property, "unsupported object pattern entry")),
            }
        }
        Ok(())
    }

    fn bind_array(
        &mut self,
        elements: &[Option<Node>],
        value: NodeId,
        binding: Binding,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let simple = elements
            .iter()
            .all(|element| element.as_ref().map_or(true, |e| e.as_identifier().is_some()));
        if binding == Binding::Local && simple {
            let mut names = Vec::with_capacity(elements.len());
            for element in elements {
                names.push(match element.as_ref().and_then(Node::as_identifier) {
                    Some(name) => {
                        self.scopes.declare(name);
                        Some(self.arena.ident(Self::binding_name(name)))
                    }
                    None => None,
                });
            }
            let pattern = self.arena.alloc(Ir::ArrayPattern { elements: names });
            out.push(self.arena.alloc(Ir::VariableDeclaration {
                declaration_kind: DeclarationKind::Const,
                declarations: vec![Declarator {
                    pattern,
                    init: Some(value),
                }],
            }));
            return Ok(());
        }

        let source = self.ensure_name(value, out);
        for (i, element) in elements.iter().enumerate() {
            let Some(element) = element else { continue };
            let position = (i + 1) as f64;
            let object = self.arena.ident(source.as_str());
            match &element.kind {
                NodeKind::RestElement { argument } => {
                    let unpack = self.arena.path("table", "unpack");
                    let from = self.arena.number(position);
                    let tail = self.arena.call(unpack, vec![object, from]);
                    let rest = self.arena.array(vec![tail]);
                    self.bind_pattern(argument, rest, binding, out)?;
                }
                _ => {
                    let key = self.arena.number(position);
                    let read = self.arena.index(object, key);
                    self.bind_pattern(element, read, binding, out)?;
                }
            }
        }
        Ok(())
    }

    /// A name holding `value`: the identifier itself, or a fresh local.
    pub(super) fn ensure_name(&mut self, value: NodeId, out: &mut Vec<NodeId>) -> String {
        if let Some(name) = self.arena.identifier_name(value) {
            return name.to_string();
        }
        let temp = self.temp();
        out.push(self.arena.local(&temp, Some(value)));
        temp
    }
}

/// `{a, b: c}` with only plain keys and plain targets, as `(key, local)` pairs.
fn simple_object_pattern(properties: &[Node]) -> Option<Vec<(&str, &str)>> {
    properties
        .iter()
        .map(|property| match &property.kind {
            NodeKind::Property {
                key,
                value,
                computed: false,
                ..
            } => Some((key.as_identifier()?, value.as_identifier()?)),
            _ => None,
        })
        .collect()
}

/// The name of a non-computed key: an identifier, a string or a number.
pub(super) fn static_key(key: &Node) -> Option<String> {
    match &key.kind {
        NodeKind::Identifier { name } => Some(name.clone()),
        NodeKind::Literal { value, .. } => match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        },
        _ => None,
    }
}
