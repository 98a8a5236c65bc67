//! Classes.
//!
//! A class lowers to one `ClassDeclaration` (or `ClassExpression`) whose
//! members are `MethodDefinition`s with explicit receivers. Instance fields
//! move into the constructor; static fields stay on the class node and are
//! evaluated with `this` bound to the class table.

use super::expr::ERROR_CLASSES;
use super::function::{FunctionInput, Receiver};
use super::{ClassContext, LowerResult, Lowerer, Parent, ThisBinding};
use crate::error::LoweringError;
use crate::ir::{LogicalOperator, MethodKind, Node as Ir, NodeId};
use crate::names;
use lunar_ast::{MethodKind as JsMethodKind, Node, NodeKind};

/// A lowered class, before it is placed as a declaration or an expression.
struct ClassParts {
    id: NodeId,
    super_class: Option<NodeId>,
    body: Vec<NodeId>,
    static_fields: Vec<NodeId>,
}

impl Lowerer<'_> {
    pub(super) fn lower_class_decl(
        &mut self,
        node: &Node,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let NodeKind::ClassDeclaration {
            id: Some(id),
            super_class,
            body,
        } = &node.kind
        else {
            return Err(LoweringError::new(node, "class declaration without a name"));
        };
        let name = id
            .as_identifier()
            .ok_or_else(|| LoweringError::new(id, "class name is not an identifier"))?;
        self.scopes.declare(name);
        let assign = self.block_predeclared;
        self.lower_class_named(Self::binding_name(name), super_class.as_deref(), body, assign, out)
    }

    /// Lower a class bound to `target`. With `assign` the binding already
    /// exists and the class is assigned to it.
    pub(super) fn lower_class_named(
        &mut self,
        target: String,
        super_class: Option<&Node>,
        body: &Node,
        assign: bool,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let parts = self.lower_class_parts(target.clone(), super_class, body, out)?;
        if assign {
            let class = self.class_expression(parts);
            out.push(self.arena.assign_name(&target, class));
        } else {
            out.push(self.arena.alloc(Ir::ClassDeclaration {
                id: parts.id,
                super_class: parts.super_class,
                body: parts.body,
                static_fields: parts.static_fields,
            }));
        }
        Ok(())
    }

    /// A class in expression position.
    pub(super) fn lower_class_expr(&mut self, node: &Node) -> LowerResult<NodeId> {
        let NodeKind::ClassExpression { id, super_class, body } = &node.kind else {
            return Err(LoweringError::new(node, "expected a class expression"));
        };
        let name = id.as_deref().and_then(Node::as_identifier);
        let target = match name {
            Some(name) => Self::binding_name(name),
            None => self.temp(),
        };

        self.scopes.push();
        if let Some(name) = name {
            self.scopes.declare(name);
        }
        let mut prelude = Vec::new();
        let parts = self.lower_class_parts(target, super_class.as_deref(), body, &mut prelude);
        self.scopes.pop();

        let class = self.class_expression(parts?);
        if prelude.is_empty() {
            return Ok(class);
        }
        prelude.push(self.arena.ret(vec![class]));
        Ok(self.arena.iife(prelude))
    }

    fn class_expression(&mut self, parts: ClassParts) -> NodeId {
        self.arena.alloc(Ir::ClassExpression {
            id: parts.id,
            super_class: parts.super_class,
            body: parts.body,
            static_fields: parts.static_fields,
        })
    }

    fn lower_class_parts(
        &mut self,
        target: String,
        super_class: Option<&Node>,
        body: &Node,
        prelude: &mut Vec<NodeId>,
    ) -> LowerResult<ClassParts> {
        let NodeKind::ClassBody { body: members } = &body.kind else {
            return Err(LoweringError::new(body, "expected a class body"));
        };
        let id = self.arena.ident(target.as_str());
        let (parent, super_id) = self.resolve_parent(super_class, prelude)?;

        self.classes.push(ClassContext {
            name: target,
            parent,
        });
        let result = self.lower_members(members);
        self.classes.pop();
        let (body, static_fields) = result?;

        Ok(ClassParts {
            id,
            super_class: super_id,
            body,
            static_fields,
        })
    }

    /// What `super` refers to, and the superclass reference for the class
    /// node. Builtin error parents have no table to inherit from.
    fn resolve_parent(
        &mut self,
        super_class: Option<&Node>,
        prelude: &mut Vec<NodeId>,
    ) -> LowerResult<(Option<Parent>, Option<NodeId>)> {
        let Some(super_class) = super_class else {
            return Ok((None, None));
        };
        match super_class.as_identifier() {
            Some(name) if ERROR_CLASSES.contains(&name) && !self.scopes.is_declared(name) => {
                Ok((Some(Parent::Error(name.to_string())), None))
            }
            Some(name) => {
                let name = Self::binding_name(name);
                let id = self.arena.ident(name.as_str());
                Ok((Some(Parent::Class(name)), Some(id)))
            }
            None => {
                let value = self.lower_expr(super_class)?;
                let temp = self.temp();
                prelude.push(self.arena.local(&temp, Some(value)));
                let id = self.arena.ident(temp.as_str());
                Ok((Some(Parent::Class(temp)), Some(id)))
            }
        }
    }

    fn lower_members(&mut self, members: &[Node]) -> LowerResult<(Vec<NodeId>, Vec<NodeId>)> {
        let fields: Vec<&Node> = members
            .iter()
            .filter(|m| matches!(m.kind, NodeKind::PropertyDefinition { is_static: false, .. }))
            .collect();
        let has_constructor = members.iter().any(|m| {
            matches!(
                m.kind,
                NodeKind::MethodDefinition {
                    kind: JsMethodKind::Constructor,
                    ..
                }
            )
        });

        let mut body = Vec::new();
        if !has_constructor {
            if let Some(constructor) = self.implicit_constructor(&fields)? {
                body.push(constructor);
            }
        }

        let mut static_fields = Vec::new();
        for member in members {
            match &member.kind {
                NodeKind::MethodDefinition {
                    key,
                    value,
                    kind,
                    computed,
                    is_static,
                } => {
                    let (key, computed) = self.lower_member_key(key, *computed)?;
                    let input = FunctionInput::of(value)?;
                    let (kind, fields) = match kind {
                        JsMethodKind::Constructor => (MethodKind::Constructor, fields.as_slice()),
                        JsMethodKind::Method if *is_static => (MethodKind::StaticMethod, &[][..]),
                        JsMethodKind::Method => (MethodKind::Method, &[][..]),
                        JsMethodKind::Get => (MethodKind::Get, &[][..]),
                        JsMethodKind::Set => (MethodKind::Set, &[][..]),
                    };
                    let parts = self.lower_function_parts(
                        &input,
                        ThisBinding::SelfParam,
                        Receiver::SelfParam,
                        fields,
                    )?;
                    let value = self.function_node(parts);
                    body.push(self.arena.alloc(Ir::MethodDefinition {
                        kind,
                        key,
                        computed,
                        value,
                    }));
                }
                NodeKind::PropertyDefinition {
                    key,
                    value,
                    computed,
                    is_static: true,
                } => {
                    let (key, computed) = self.lower_member_key(key, *computed)?;
                    let class = self.class_name();
                    self.push_frame(ThisBinding::Name(class));
                    let value = match value {
                        Some(value) => self.lower_member_value(value),
                        None => Ok(self.arena.null()),
                    };
                    self.pop_frame();
                    static_fields.push(self.arena.alloc(Ir::Property {
                        key,
                        value: value?,
                        computed,
                        shorthand: false,
                    }));
                }
                NodeKind::PropertyDefinition { .. } => {}
                _ => return Err(LoweringError::new(member, "unsupported class member")),
            }
        }
        Ok((body, static_fields))
    }

    /// The constructor of a class that declares none. Base classes always get
    /// one, since construction calls it; subclasses without fields inherit
    /// their parent's.
    fn implicit_constructor(&mut self, fields: &[&Node]) -> LowerResult<Option<NodeId>> {
        let parent = self.classes.last().and_then(|class| class.parent.clone());
        match parent {
            None => self
                .constructor_from(vec![], |lowerer, out| {
                    out.extend(lowerer.lower_fields(fields)?);
                    Ok(())
                })
                .map(Some),
            Some(Parent::Class(_)) if fields.is_empty() => Ok(None),
            Some(Parent::Class(parent)) => self
                .constructor_from(vec![Param::Rest], |lowerer, out| {
                    let table = lowerer.arena.ident(parent.as_str());
                    let constructor = lowerer.arena.member(table, names::CONSTRUCTOR);
                    let receiver = lowerer.arena.alloc(Ir::ThisExpression);
                    let rest = lowerer.arena.alloc(Ir::VarArgs);
                    let call = lowerer.arena.call(constructor, vec![receiver, rest]);
                    out.push(lowerer.arena.expr_stmt(call));
                    out.extend(lowerer.lower_fields(fields)?);
                    Ok(())
                })
                .map(Some),
            Some(Parent::Error(builtin)) => self
                .constructor_from(vec![Param::Named("message")], |lowerer, out| {
                    let message = lowerer.arena.ident("message");
                    let empty = lowerer.arena.string("");
                    let message = lowerer.arena.logical(LogicalOperator::Or, message, empty);
                    let receiver = lowerer.arena.alloc(Ir::ThisExpression);
                    let field = lowerer.arena.member(receiver, "message");
                    out.push(lowerer.arena.assign(field, message));
                    let receiver = lowerer.arena.alloc(Ir::ThisExpression);
                    let field = lowerer.arena.member(receiver, "name");
                    let name = lowerer.arena.string(builtin.as_str());
                    out.push(lowerer.arena.assign(field, name));
                    out.extend(lowerer.lower_fields(fields)?);
                    Ok(())
                })
                .map(Some),
        }
    }

    /// A synthesized `constructor(self, ...)` whose body `build` appends,
    /// lowered in a method frame.
    fn constructor_from(
        &mut self,
        extra: Vec<Param>,
        build: impl FnOnce(&mut Self, &mut Vec<NodeId>) -> LowerResult<()>,
    ) -> LowerResult<NodeId> {
        let key = self.arena.ident(names::CONSTRUCTOR);
        let mut params = vec![self.arena.ident(names::SELF)];
        for param in extra {
            params.push(match param {
                Param::Named(name) => self.arena.ident(name),
                Param::Rest => {
                    let argument = self.arena.ident(names::PLACEHOLDER);
                    self.arena.alloc(Ir::RestElement { argument })
                }
            });
        }

        self.push_frame(ThisBinding::SelfParam);
        self.scopes.push();
        let mut statements = Vec::new();
        let result = build(self, &mut statements);
        self.scopes.pop();
        self.pop_frame();
        result?;

        let body = self.arena.block(statements);
        let value = self.arena.alloc(Ir::FunctionExpression {
            id: None,
            params,
            body,
            is_async: false,
            is_generator: false,
        });
        Ok(self.arena.alloc(Ir::MethodDefinition {
            kind: MethodKind::Constructor,
            key,
            computed: false,
            value,
        }))
    }

    /// A method or field name: names as identifiers, computed keys as
    /// expressions.
    fn lower_member_key(&mut self, key: &Node, computed: bool) -> LowerResult<(NodeId, bool)> {
        if computed {
            return Ok((self.lower_expr(key)?, true));
        }
        let name = super::pattern::static_key(key)
            .ok_or_else(|| LoweringError::new(key, "unsupported member name"))?;
        Ok((self.arena.ident(names::sanitize_field(&name)), false))
    }

    fn class_name(&self) -> String {
        self.classes
            .last()
            .map(|class| class.name.clone())
            .unwrap_or_default()
    }
}

/// Extra parameters of a synthesized constructor.
enum Param {
    Named(&'static str),
    Rest,
}
