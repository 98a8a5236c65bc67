//! Functions, arrows and parameter lists.
//!
//! Generators and async functions keep their parameter prologue in the outer
//! function and move the body into a closure handed to the runtime:
//!
//! ```text
//! local function gen(a)
//!   return __lunar_generator(function() ... end)
//! end
//! ```

use super::pattern::Binding;
use super::{LowerResult, Lowerer, ThisBinding};
use crate::error::LoweringError;
use crate::ir::{BinaryOperator, Node as Ir, NodeId};
use crate::names;
use crate::protocol::RuntimeHelper;
use lunar_ast::{Node, NodeKind};

/// The leading parameter a function gets for calls through a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Receiver {
    None,
    /// Methods: `self`, which is also what `this` lowers to.
    SelfParam,
    /// Arrows stored on objects: the receiver is accepted and ignored.
    Placeholder,
}

/// The parts of a source function the lowering needs.
pub(super) struct FunctionInput<'n> {
    pub params: &'n [Node],
    pub body: &'n Node,
    pub is_async: bool,
    pub is_generator: bool,
}

impl<'n> FunctionInput<'n> {
    pub(super) fn of(node: &'n Node) -> LowerResult<Self> {
        match &node.kind {
            NodeKind::FunctionDeclaration {
                params,
                body,
                generator,
                is_async,
                ..
            }
            | NodeKind::FunctionExpression {
                params,
                body,
                generator,
                is_async,
                ..
            } => Ok(Self {
                params,
                body,
                is_async: *is_async,
                is_generator: *generator,
            }),
            NodeKind::ArrowFunctionExpression {
                params, body, is_async, ..
            } => Ok(Self {
                params,
                body,
                is_async: *is_async,
                is_generator: false,
            }),
            _ => Err(LoweringError::new(node, "expected a function")),
        }
    }
}

/// A lowered signature and body block.
pub(super) struct FunctionParts {
    pub params: Vec<NodeId>,
    pub body: NodeId,
    pub is_async: bool,
    pub is_generator: bool,
}

impl Lowerer<'_> {
    /// Lower a function's parameters and body in a fresh frame and scope.
    ///
    /// `fields` are class field initializers run on construction: they are
    /// placed after the first top-level `super(...)` call, or at the start of
    /// the body when there is none.
    pub(super) fn lower_function_parts(
        &mut self,
        input: &FunctionInput<'_>,
        this: ThisBinding,
        receiver: Receiver,
        fields: &[&Node],
    ) -> LowerResult<FunctionParts> {
        self.push_frame(this);
        self.scopes.push();
        let labels = std::mem::take(&mut self.pending_labels);
        let result = self.lower_function_inner(input, receiver, fields);
        self.pending_labels = labels;
        self.scopes.pop();
        self.pop_frame();
        result
    }

    fn lower_function_inner(
        &mut self,
        input: &FunctionInput<'_>,
        receiver: Receiver,
        fields: &[&Node],
    ) -> LowerResult<FunctionParts> {
        let mut params = Vec::with_capacity(input.params.len() + 1);
        match receiver {
            Receiver::None => {}
            Receiver::SelfParam => params.push(self.arena.ident(names::SELF)),
            Receiver::Placeholder => params.push(self.arena.ident(names::PLACEHOLDER)),
        }

        let mut prologue = Vec::new();
        let mut param_names = Vec::new();
        for param in input.params {
            params.push(self.lower_param(param, &mut param_names, &mut prologue)?);
        }

        let mut statements = match &input.body.kind {
            NodeKind::BlockStatement { body } => {
                let inject = if fields.is_empty() {
                    None
                } else {
                    let at = body.iter().position(is_super_call).map_or(0, |i| i + 1);
                    Some((at, self.lower_fields(fields)?))
                };
                self.lower_function_body(body, &param_names, inject)?
            }
            _ => {
                let value = self.lower_expr(input.body)?;
                vec![self.arena.ret(vec![value])]
            }
        };

        if input.is_generator || input.is_async {
            let helper = if input.is_generator {
                RuntimeHelper::Generator
            } else {
                self.uses_async = true;
                RuntimeHelper::Async
            };
            self.require(helper);
            let body = self.arena.function_expr(vec![], statements);
            let wrapped = self.arena.call_named(helper.name(), vec![body]);
            statements = vec![self.arena.ret(vec![wrapped])];
        }

        prologue.extend(statements);
        Ok(FunctionParts {
            params,
            body: self.arena.block(prologue),
            is_async: input.is_async,
            is_generator: input.is_generator,
        })
    }

    fn lower_param(
        &mut self,
        param: &Node,
        param_names: &mut Vec<String>,
        prologue: &mut Vec<NodeId>,
    ) -> LowerResult<NodeId> {
        match &param.kind {
            NodeKind::Identifier { name } => {
                self.scopes.declare(name);
                param_names.push(name.clone());
                Ok(self.arena.ident(Self::binding_name(name)))
            }
            NodeKind::AssignmentPattern { left, right } if left.as_identifier().is_some() => {
                let name = left.as_identifier().unwrap_or_default();
                self.scopes.declare(name);
                param_names.push(name.to_string());
                let target = Self::binding_name(name);
                let current = self.arena.ident(target.as_str());
                let nil = self.arena.null();
                let test = self.arena.binary(BinaryOperator::Eq, current, nil);
                let default = self.lower_expr(right)?;
                let fill = self.arena.assign_name(&target, default);
                prologue.push(self.arena.if_(test, vec![fill], None));
                Ok(self.arena.ident(target))
            }
            NodeKind::RestElement { argument } => {
                let collected = match argument.as_identifier() {
                    Some(name) => {
                        self.scopes.declare(name);
                        param_names.push(name.to_string());
                        Self::binding_name(name)
                    }
                    None => self.temp(),
                };
                let varargs = self.arena.alloc(Ir::VarArgs);
                let list = self.arena.array(vec![varargs]);
                prologue.push(self.arena.local(&collected, Some(list)));
                if argument.as_identifier().is_none() {
                    let source = self.arena.ident(collected.as_str());
                    self.bind_pattern(argument, source, Binding::Local, prologue)?;
                }
                let name = self.arena.ident(collected);
                Ok(self.arena.alloc(Ir::RestElement { argument: name }))
            }
            _ => {
                let temp = self.temp();
                let source = self.arena.ident(temp.as_str());
                self.bind_pattern(param, source, Binding::Local, prologue)?;
                Ok(self.arena.ident(temp))
            }
        }
    }

    /// `self.name = value` for each instance field with an initializer.
    pub(super) fn lower_fields(&mut self, fields: &[&Node]) -> LowerResult<Vec<NodeId>> {
        let mut out = Vec::new();
        for field in fields {
            let NodeKind::PropertyDefinition {
                key,
                value: Some(value),
                computed,
                ..
            } = &field.kind
            else {
                continue;
            };
            let object = self.arena.alloc(Ir::ThisExpression);
            let target = if *computed {
                let key = self.lower_expr(key)?;
                self.arena.index(object, key)
            } else {
                let name = super::pattern::static_key(key)
                    .ok_or_else(|| LoweringError::new(key, "unsupported field name"))?;
                self.arena.member(object, &names::sanitize_field(&name))
            };
            let value = self.lower_member_value(value)?;
            out.push(self.arena.assign(target, value));
        }
        Ok(out)
    }

    // =========================================================================
    // Functions by position
    // =========================================================================

    pub(super) fn lower_function_decl(
        &mut self,
        node: &Node,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let NodeKind::FunctionDeclaration { id: Some(id), .. } = &node.kind else {
            return Err(LoweringError::new(node, "function declaration without a name"));
        };
        let name = id
            .as_identifier()
            .ok_or_else(|| LoweringError::new(id, "function name is not an identifier"))?;
        let target = Self::binding_name(name);
        self.scopes.declare(name);

        let input = FunctionInput::of(node)?;
        if self.block_predeclared {
            let parts = self.lower_function_parts(&input, ThisBinding::Nil, Receiver::None, &[])?;
            let function = self.function_node(parts);
            out.push(self.arena.assign_name(&target, function));
        } else {
            let id = self.arena.ident(target);
            let parts = self.lower_function_parts(&input, ThisBinding::Nil, Receiver::None, &[])?;
            out.push(self.arena.alloc(Ir::FunctionDeclaration {
                id,
                params: parts.params,
                body: parts.body,
                is_async: parts.is_async,
                is_generator: parts.is_generator,
            }));
        }
        Ok(())
    }

    /// A function expression. One that refers to its own name is bound
    /// inside a wrapper so the name resolves to the function itself.
    pub(super) fn lower_function_expr(
        &mut self,
        node: &Node,
        receiver: Receiver,
    ) -> LowerResult<NodeId> {
        let NodeKind::FunctionExpression { id, body, .. } = &node.kind else {
            return Err(LoweringError::new(node, "expected a function expression"));
        };
        let this = if receiver == Receiver::SelfParam {
            ThisBinding::SelfParam
        } else {
            ThisBinding::Nil
        };
        let input = FunctionInput::of(node)?;

        let own_name = id
            .as_deref()
            .and_then(Node::as_identifier)
            .filter(|name| mentions_name(body, name));
        let Some(name) = own_name else {
            let parts = self.lower_function_parts(&input, this, receiver, &[])?;
            return Ok(self.function_node(parts));
        };

        self.scopes.push();
        self.scopes.declare(name);
        let parts = self.lower_function_parts(&input, this, receiver, &[]);
        self.scopes.pop();
        let function = self.function_node(parts?);

        let target = Self::binding_name(name);
        let declare = self.arena.local(&target, None);
        let bind = self.arena.assign_name(&target, function);
        let value = self.arena.ident(target);
        let done = self.arena.ret(vec![value]);
        Ok(self.arena.iife(vec![declare, bind, done]))
    }

    pub(super) fn lower_arrow(&mut self, node: &Node, receiver: Receiver) -> LowerResult<NodeId> {
        let input = FunctionInput::of(node)?;
        let parts = self.lower_function_parts(&input, ThisBinding::Lexical, receiver, &[])?;
        Ok(self.arena.alloc(Ir::ArrowFunctionExpression {
            params: parts.params,
            body: parts.body,
            is_async: parts.is_async,
            is_generator: false,
        }))
    }

    pub(super) fn function_node(&mut self, parts: FunctionParts) -> NodeId {
        self.arena.alloc(Ir::FunctionExpression {
            id: None,
            params: parts.params,
            body: parts.body,
            is_async: parts.is_async,
            is_generator: parts.is_generator,
        })
    }
}

/// `super(...);` as a statement.
fn is_super_call(stmt: &Node) -> bool {
    match &stmt.kind {
        NodeKind::ExpressionStatement { expression, .. } => matches!(
            &expression.kind,
            NodeKind::CallExpression { callee, .. } if matches!(callee.kind, NodeKind::Super {})
        ),
        _ => false,
    }
}

/// True if an identifier called `name` appears anywhere below `node`.
fn mentions_name(node: &Node, name: &str) -> bool {
    if node.is_identifier(name) {
        return true;
    }
    let mut found = false;
    node.kind.for_each_child(&mut |child| {
        found = found || mentions_name(child, name);
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunar_ast::{build, MethodKind};

    #[test]
    fn test_super_call_detection() {
        let call = build::expr_stmt(build::call(build::super_(), vec![build::ident("x")]));
        assert!(is_super_call(&call));
        let method = build::expr_stmt(build::call(
            build::member(build::super_(), "init"),
            vec![],
        ));
        assert!(!is_super_call(&method));
    }

    #[test]
    fn test_mentions_name_looks_into_nested_code() {
        let body = build::block(vec![build::ret(Some(build::call(
            build::ident("fact"),
            vec![build::ident("n")],
        )))]);
        assert!(mentions_name(&body, "fact"));
        assert!(!mentions_name(&body, "other"));
        let class = build::class_expr(
            None,
            None,
            vec![build::method(
                MethodKind::Method,
                "run",
                vec![],
                vec![build::expr_stmt(build::ident("fact"))],
            )],
        );
        assert!(mentions_name(&class, "fact"));
    }
}
