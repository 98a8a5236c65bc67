use super::pattern::Binding;
use super::{LowerResult, Lowerer, Parent};
use crate::error::LoweringError;
use crate::ir::{BinaryOperator, Node as Ir, NodeId, UnaryOperator};
use lunar_ast::{
    AssignmentOperator, LogicalOperator, Node, NodeKind, UnaryOperator as JsUnary, UpdateOperator,
    VariableKind,
};

impl Lowerer<'_> {
    // =========================================================================
    // Statements
    // =========================================================================

    pub(super) fn lower_stmt(&mut self, node: &Node, out: &mut Vec<NodeId>) -> LowerResult<()> {
        match &node.kind {
            // Directive prologues ("use strict") have no runtime effect.
            NodeKind::ExpressionStatement {
                directive: Some(_), ..
            }
            | NodeKind::EmptyStatement {}
            | NodeKind::DebuggerStatement {} => Ok(()),
            NodeKind::ExpressionStatement { expression, .. } => {
                self.lower_expr_stmt(expression, out)
            }
            NodeKind::BlockStatement { body } => {
                let statements = self.lower_block(body)?;
                if !statements.is_empty() {
                    out.push(self.arena.block(statements));
                }
                Ok(())
            }
            NodeKind::VariableDeclaration { declarations, kind } => {
                let binding = self.binding_for(*kind, true);
                self.lower_var_decl(*kind, declarations, binding, out)
            }
            NodeKind::FunctionDeclaration { .. } => self.lower_function_decl(node, out),
            NodeKind::ClassDeclaration { .. } => self.lower_class_decl(node, out),
            NodeKind::ReturnStatement { argument } => {
                let value = argument.as_deref().map(|value| self.lower_expr(value)).transpose()?;
                out.push(self.return_stmt(value));
                Ok(())
            }
            NodeKind::ThrowStatement { argument } => {
                let argument = self.lower_expr(argument)?;
                out.push(self.arena.alloc(Ir::ThrowStatement { argument }));
                Ok(())
            }
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => self.lower_if(test, consequent, alternate.as_deref(), out),
            NodeKind::WhileStatement { test, body } => self.lower_while(test, body, out),
            NodeKind::DoWhileStatement { body, test } => self.lower_do_while(body, test, out),
            NodeKind::ForStatement {
                init,
                test,
                update,
                body,
            } => self.lower_for(init.as_deref(), test.as_deref(), update.as_deref(), body, out),
            NodeKind::ForInStatement { left, right, body }
            | NodeKind::ForOfStatement {
                left, right, body, ..
            } => self.lower_for_each(node, left, right, body, out),
            NodeKind::LabeledStatement { label, body } => self.lower_labeled(label, body, out),
            NodeKind::BreakStatement { .. } | NodeKind::ContinueStatement { .. } => {
                self.lower_jump(node, out)
            }
            NodeKind::SwitchStatement {
                discriminant,
                cases,
            } => self.lower_switch(discriminant, cases, out),
            NodeKind::TryStatement {
                block,
                handler,
                finalizer,
            } => self.lower_try(block, handler.as_deref(), finalizer.as_deref(), out),
            _ => Err(LoweringError::new(node, "no lowering rule for this statement")),
        }
    }

    fn lower_if(
        &mut self,
        test: &Node,
        consequent: &Node,
        alternate: Option<&Node>,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let test = self.lower_expr(test)?;
        let statements = self.lower_nested(consequent)?;
        let consequent = self.arena.block(statements);

        let alternate = match alternate {
            None => None,
            // `else if` stays a chain.
            Some(alternate @ Node {
                kind: NodeKind::IfStatement { .. },
                ..
            }) => {
                let mut lowered = Vec::new();
                self.lower_stmt(alternate, &mut lowered)?;
                match lowered.as_slice() {
                    [single] => Some(*single),
                    _ => Some(self.arena.block(lowered)),
                }
            }
            Some(alternate) => {
                let statements = self.lower_nested(alternate)?;
                (!statements.is_empty()).then(|| self.arena.block(statements))
            }
        };

        out.push(self.arena.alloc(Ir::IfStatement {
            test,
            consequent,
            alternate,
        }));
        Ok(())
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    pub(super) fn lower_var_decl(
        &mut self,
        kind: VariableKind,
        declarations: &[Node],
        binding: Binding,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        for declarator in declarations {
            let NodeKind::VariableDeclarator { id, init } = &declarator.kind else {
                return Err(LoweringError::new(declarator, "expected a variable declarator"));
            };
            match (id.as_identifier(), init.as_deref()) {
                (Some(name), init) => self.lower_declarator(kind, name, init, binding, out)?,
                (None, Some(init)) => {
                    let value = self.lower_expr(init)?;
                    self.bind_pattern(id, value, binding, out)?;
                }
                (None, None) => {
                    return Err(LoweringError::new(
                        declarator,
                        "destructuring declaration without an initializer",
                    ));
                }
            }
        }
        Ok(())
    }

    fn lower_declarator(
        &mut self,
        kind: VariableKind,
        name: &str,
        init: Option<&Node>,
        binding: Binding,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let target = Self::binding_name(name);
        if binding == Binding::Local {
            self.scopes.declare(name);
        }

        let Some(init) = init else {
            match (binding, kind) {
                (Binding::Local, _) => out.push(self.arena.local(&target, None)),
                // A redeclared `var` keeps its value.
                (Binding::Assign, VariableKind::Var) => {}
                (Binding::Assign, _) => {
                    let nil = self.arena.null();
                    out.push(self.arena.assign_name(&target, nil));
                }
            }
            return Ok(());
        };

        match (&init.kind, binding) {
            (
                NodeKind::FunctionExpression { id: None, .. }
                | NodeKind::ArrowFunctionExpression { .. },
                Binding::Local,
            ) => {
                let function = self.lower_expr(init)?;
                out.push(self.declare_function(&target, function));
            }
            (NodeKind::ClassExpression { super_class, body, .. }, _) => {
                self.lower_class_named(
                    target,
                    super_class.as_deref(),
                    body,
                    binding == Binding::Assign,
                    out,
                )?;
            }
            // The initializer may refer to the binding itself.
            _ if binding == Binding::Local && mentions_function(init) => {
                out.push(self.arena.local(&target, None));
                let value = self.lower_expr(init)?;
                out.push(self.arena.assign_name(&target, value));
            }
            (_, Binding::Local) => {
                let value = self.lower_expr(init)?;
                out.push(self.arena.local(&target, Some(value)));
            }
            (_, Binding::Assign) => {
                let value = self.lower_expr(init)?;
                out.push(self.arena.assign_name(&target, value));
            }
        }
        Ok(())
    }

    /// Turn a lowered function expression into `local function name`.
    fn declare_function(&mut self, name: &str, function: NodeId) -> NodeId {
        let parts = match self.arena.get(function) {
            Some(
                Ir::FunctionExpression {
                    params,
                    body,
                    is_async,
                    is_generator,
                    id: None,
                }
                | Ir::ArrowFunctionExpression {
                    params,
                    body,
                    is_async,
                    is_generator,
                },
            ) => Some((params.clone(), *body, *is_async, *is_generator)),
            _ => None,
        };
        match parts {
            Some((params, body, is_async, is_generator)) => {
                let id = self.arena.ident(name);
                self.arena.alloc(Ir::FunctionDeclaration {
                    id,
                    params,
                    body,
                    is_async,
                    is_generator,
                })
            }
            // Named self-references lower to a wrapper call instead.
            None => self.arena.local(name, Some(function)),
        }
    }

    // =========================================================================
    // Expression statements
    // =========================================================================

    /// An expression evaluated for its effects. Constructs that need
    /// statements in expression position are written out directly here.
    pub(super) fn lower_expr_stmt(
        &mut self,
        node: &Node,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        match &node.kind {
            NodeKind::AssignmentExpression {
                operator,
                left,
                right,
            } => {
                self.lower_assignment(*operator, left, right, out)?;
                Ok(())
            }
            NodeKind::UpdateExpression {
                operator, argument, ..
            } => {
                self.lower_update(*operator, argument, out)?;
                Ok(())
            }
            NodeKind::CallExpression { callee, arguments, .. }
                if matches!(callee.kind, NodeKind::Super {})
                    && self.error_parent(node)?.is_some() =>
            {
                self.lower_error_super(node, arguments, out)
            }
            NodeKind::LogicalExpression {
                operator,
                left,
                right,
            } => {
                let value = self.lower_expr(left)?;
                let test = match operator {
                    LogicalOperator::And => value,
                    LogicalOperator::Or => self.arena.unary(UnaryOperator::Not, value),
                    LogicalOperator::Nullish => {
                        let nil = self.arena.null();
                        self.arena.binary(BinaryOperator::Eq, value, nil)
                    }
                };
                let mut body = Vec::new();
                self.lower_expr_stmt(right, &mut body)?;
                out.push(self.arena.if_(test, body, None));
                Ok(())
            }
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                let test = self.lower_expr(test)?;
                let mut then = Vec::new();
                self.lower_expr_stmt(consequent, &mut then)?;
                let mut otherwise = Vec::new();
                self.lower_expr_stmt(alternate, &mut otherwise)?;
                let otherwise = (!otherwise.is_empty()).then_some(otherwise);
                out.push(self.arena.if_(test, then, otherwise));
                Ok(())
            }
            NodeKind::SequenceExpression { expressions } => {
                for expression in expressions {
                    self.lower_expr_stmt(expression, out)?;
                }
                Ok(())
            }
            NodeKind::UnaryExpression {
                operator: JsUnary::Delete,
                argument,
                ..
            } => {
                let place = self.place(argument, out)?;
                let target = self.place_expr(&place)?;
                let nil = self.arena.null();
                out.push(self.arena.assign(target, nil));
                Ok(())
            }
            NodeKind::UnaryExpression {
                operator: JsUnary::Void,
                argument,
                ..
            } => self.lower_expr_stmt(argument, out),
            _ if super::expr::is_pure(node) => Ok(()),
            _ => {
                let value = self.lower_expr(node)?;
                out.push(self.value_stmt(value));
                Ok(())
            }
        }
    }

    /// A statement evaluating `value`. Calls stand alone; anything else is
    /// bound to the placeholder local.
    pub(super) fn value_stmt(&mut self, value: NodeId) -> NodeId {
        match self.arena.get(value) {
            Some(
                Ir::CallExpression { .. } | Ir::AwaitExpression { .. } | Ir::YieldExpression { .. },
            ) => {
                self.arena.expr_stmt(value)
            }
            _ => self.arena.local(crate::names::PLACEHOLDER, Some(value)),
        }
    }

    /// Lower `left op= right` as statements. Returns the place that was
    /// written, so expression positions can read it back.
    pub(super) fn lower_assignment<'n>(
        &mut self,
        operator: AssignmentOperator,
        left: &'n Node,
        right: &Node,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<Option<super::expr::Place<'n>>> {
        if matches!(left.kind, NodeKind::ObjectPattern { .. } | NodeKind::ArrayPattern { .. }) {
            if operator != AssignmentOperator::Assign {
                return Err(LoweringError::new(left, "compound assignment to a pattern"));
            }
            let value = self.lower_expr(right)?;
            self.bind_pattern(left, value, Binding::Assign, out)?;
            return Ok(None);
        }

        let place = self.place(left, out)?;
        match operator {
            AssignmentOperator::Assign => {
                let value = if matches!(left.kind, NodeKind::MemberExpression { .. }) {
                    self.lower_member_value(right)?
                } else {
                    self.lower_expr(right)?
                };
                let target = self.place_expr(&place)?;
                out.push(self.arena.assign(target, value));
            }
            AssignmentOperator::AndAssign
            | AssignmentOperator::OrAssign
            | AssignmentOperator::NullishAssign => {
                let current = self.place_expr(&place)?;
                let test = match operator {
                    AssignmentOperator::AndAssign => current,
                    AssignmentOperator::OrAssign => self.arena.unary(UnaryOperator::Not, current),
                    _ => {
                        let nil = self.arena.null();
                        self.arena.binary(BinaryOperator::Eq, current, nil)
                    }
                };
                let value = self.lower_expr(right)?;
                let target = self.place_expr(&place)?;
                let store = self.arena.assign(target, value);
                out.push(self.arena.if_(test, vec![store], None));
            }
            compound => {
                let operator = compound
                    .binary()
                    .ok_or_else(|| LoweringError::new(left, "unknown compound assignment"))?;
                let current = self.place_expr(&place)?;
                let left_kind = self.analysis.kind_of(left);
                let right_kind = self.analysis.kind_of(right);
                let value = self.lower_expr(right)?;
                let value = self.combine(operator, (current, left_kind), (value, right_kind));
                let target = self.place_expr(&place)?;
                out.push(self.arena.assign(target, value));
            }
        }
        Ok(Some(place))
    }

    /// `x++` / `x--` as `x = x + 1`.
    pub(super) fn lower_update<'n>(
        &mut self,
        operator: UpdateOperator,
        argument: &'n Node,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<super::expr::Place<'n>> {
        let place = self.place(argument, out)?;
        let current = self.place_expr(&place)?;
        let one = self.arena.number(1.0);
        let operator = match operator {
            UpdateOperator::Increment => BinaryOperator::Add,
            UpdateOperator::Decrement => BinaryOperator::Sub,
        };
        let value = self.arena.binary(operator, current, one);
        let target = self.place_expr(&place)?;
        out.push(self.arena.assign(target, value));
        Ok(place)
    }

    /// The builtin error parent of the class around `node`, if any.
    fn error_parent(&self, node: &Node) -> LowerResult<Option<String>> {
        Ok(match &self.class_context(node)?.parent {
            Some(Parent::Error(name)) => Some(name.clone()),
            _ => None,
        })
    }

    /// `super(message)` in a class extending a builtin error.
    fn lower_error_super(
        &mut self,
        node: &Node,
        arguments: &[Node],
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let name = self.error_parent(node)?.unwrap_or_else(|| "Error".to_string());
        let message = match arguments.first() {
            Some(message) => self.lower_expr(message)?,
            None => self.arena.string(""),
        };
        let receiver = self.arena.alloc(Ir::ThisExpression);
        let field = self.arena.member(receiver, "message");
        out.push(self.arena.assign(field, message));
        let receiver = self.arena.alloc(Ir::ThisExpression);
        let field = self.arena.member(receiver, "name");
        let name = self.arena.string(name);
        out.push(self.arena.assign(field, name));
        Ok(())
    }
}

/// True if `node` contains a function or class anywhere below it.
fn mentions_function(node: &Node) -> bool {
    if node.is_function()
        || matches!(
            node.kind,
            NodeKind::ClassExpression { .. } | NodeKind::ClassDeclaration { .. }
        )
    {
        return true;
    }
    let mut found = false;
    node.kind.for_each_child(&mut |child| {
        found = found || mentions_function(child);
    });
    found
}
