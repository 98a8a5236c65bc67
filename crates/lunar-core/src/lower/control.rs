//! Loops, labels, `switch`, `try`, and the jumps between them.
//!
//! Jumps resolve against a stack of [`Target`]s in the current function
//! frame. A plain `break` stays `break` when it leaves the innermost target
//! loop; every other `break` and every `continue` becomes a `goto` to a label
//! allocated lazily on the target. A jump that would leave a protected region
//! (the closure of a `try`) cannot be a `goto`, so it returns a signal string
//! from the closure instead, and the `try` re-issues it after its finalizer.

use super::{is_terminal, LowerResult, Lowerer};
use crate::error::LoweringError;
use crate::ir::{Iteration, Node as Ir, NodeId, SwitchCase};
use crate::names;
use crate::protocol::RuntimeHelper;
use lunar_ast::{Node, NodeKind, VariableKind};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TargetKind {
    Loop,
    Switch,
    /// A labeled statement that is not a loop.
    Block,
}

/// Something a `break` or `continue` can leave.
#[derive(Debug)]
pub(super) struct Target {
    id: u32,
    kind: TargetKind,
    labels: Vec<String>,
    /// Protected regions open when the target was entered.
    try_depth: usize,
    break_label: Option<String>,
    continue_label: Option<String>,
}

/// A way out of a protected region, re-issued by its completion block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Exit {
    Return,
    Break(u32),
    Continue(u32),
}

#[derive(Debug, Default)]
pub(super) struct TryFrame {
    exits: BTreeSet<Exit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Jump {
    Break,
    Continue,
}

/// Labels and continue label of a finished target.
struct Finished {
    break_label: Option<String>,
    continue_label: Option<String>,
}

impl Lowerer<'_> {
    // =========================================================================
    // Targets
    // =========================================================================

    fn enter_target(&mut self, kind: TargetKind, labels: Vec<String>) {
        let id = self.next_jump_id();
        let try_depth = self.frame.tries.len();
        self.frame.targets.push(Target {
            id,
            kind,
            labels,
            try_depth,
            break_label: None,
            continue_label: None,
        });
    }

    fn exit_target(&mut self) -> Finished {
        match self.frame.targets.pop() {
            Some(target) => Finished {
                break_label: target.break_label,
                continue_label: target.continue_label,
            },
            None => Finished {
                break_label: None,
                continue_label: None,
            },
        }
    }

    /// Place the break label of a finished target after its statements.
    fn close_target(
        &mut self,
        statements: Vec<NodeId>,
        break_label: Option<String>,
        out: &mut Vec<NodeId>,
    ) {
        match break_label {
            Some(label) => {
                let body = match statements.as_slice() {
                    [single] => *single,
                    _ => self.arena.block(statements),
                };
                out.push(self.arena.alloc(Ir::LabeledStatement { label, body }));
            }
            None => out.extend(statements),
        }
    }

    fn find_target(&self, node: &Node, jump: Jump, label: Option<&str>) -> LowerResult<usize> {
        let targets = &self.frame.targets;
        let found = match label {
            Some(label) => targets
                .iter()
                .rposition(|t| t.labels.iter().any(|l| l == label)),
            None => targets.iter().rposition(|t| match jump {
                Jump::Break => matches!(t.kind, TargetKind::Loop | TargetKind::Switch),
                Jump::Continue => t.kind == TargetKind::Loop,
            }),
        };
        match found {
            Some(index) if jump == Jump::Continue && targets[index].kind != TargetKind::Loop => {
                Err(LoweringError::new(node, "`continue` target is not a loop"))
            }
            Some(index) => Ok(index),
            None => Err(LoweringError::new(
                node,
                "jump target not found in the enclosing function",
            )),
        }
    }

    // =========================================================================
    // Jumps
    // =========================================================================

    pub(super) fn lower_jump(&mut self, node: &Node, out: &mut Vec<NodeId>) -> LowerResult<()> {
        let (jump, label) = match &node.kind {
            NodeKind::BreakStatement { label } => (Jump::Break, label),
            NodeKind::ContinueStatement { label } => (Jump::Continue, label),
            _ => return Err(LoweringError::new(node, "not a jump")),
        };
        let label = label.as_deref().and_then(Node::as_identifier);
        let index = self.find_target(node, jump, label)?;
        let id = self.frame.targets[index].id;
        let exit = match jump {
            Jump::Break => Exit::Break(id),
            Jump::Continue => Exit::Continue(id),
        };
        out.push(self.exit_stmt(exit, None));
        Ok(())
    }

    /// `return value` in the current context.
    pub(super) fn return_stmt(&mut self, value: Option<NodeId>) -> NodeId {
        self.exit_stmt(Exit::Return, value)
    }

    /// The statement that performs `exit` from the current position: a
    /// signal return inside a protected region, otherwise the plain jump.
    fn exit_stmt(&mut self, exit: Exit, value: Option<NodeId>) -> NodeId {
        let index = match exit {
            Exit::Return => None,
            Exit::Break(id) | Exit::Continue(id) => {
                self.frame.targets.iter().position(|t| t.id == id)
            }
        };
        let depth = index.map_or(0, |i| self.frame.targets[i].try_depth);

        if self.frame.tries.len() > depth {
            if let Some(region) = self.frame.tries.last_mut() {
                region.exits.insert(exit);
            }
            let signal = match exit {
                Exit::Return => names::RETURN_SIGNAL.to_string(),
                Exit::Break(id) => names::break_signal(id),
                Exit::Continue(id) => names::continue_signal(id),
            };
            let mut arguments = vec![self.arena.string(signal)];
            arguments.extend(value);
            return self.arena.ret(arguments);
        }

        match (exit, index) {
            (Exit::Break(_), Some(i)) => {
                let innermost_loop = self.frame.targets[i].kind == TargetKind::Loop
                    && !self.frame.targets[i + 1..].iter().any(|t| t.kind == TargetKind::Loop);
                let label = if innermost_loop {
                    None
                } else {
                    let target = &mut self.frame.targets[i];
                    Some(
                        target
                            .break_label
                            .get_or_insert_with(|| names::break_label(target.id))
                            .clone(),
                    )
                };
                self.arena.alloc(Ir::BreakStatement { label })
            }
            (Exit::Continue(_), Some(i)) => {
                let target = &mut self.frame.targets[i];
                let label = target
                    .continue_label
                    .get_or_insert_with(|| names::continue_label(target.id))
                    .clone();
                self.arena.alloc(Ir::ContinueStatement { label })
            }
            _ => self.arena.ret(value.into_iter().collect()),
        }
    }

    // =========================================================================
    // Labels
    // =========================================================================

    pub(super) fn lower_labeled(
        &mut self,
        label: &Node,
        body: &Node,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let name = label
            .as_identifier()
            .ok_or_else(|| LoweringError::new(label, "label is not an identifier"))?
            .to_string();
        if is_loop(body) || matches!(body.kind, NodeKind::LabeledStatement { .. }) {
            self.pending_labels.push(name);
            return self.lower_stmt(body, out);
        }

        let mut labels = std::mem::take(&mut self.pending_labels);
        labels.push(name);
        self.enter_target(TargetKind::Block, labels);
        let statements = self.lower_nested(body);
        let finished = self.exit_target();
        let statements = statements?;
        if finished.break_label.is_some() {
            self.close_target(statements, finished.break_label, out);
        } else if !statements.is_empty() {
            out.push(self.arena.block(statements));
        }
        Ok(())
    }

    // =========================================================================
    // Loops
    // =========================================================================

    /// Run `lower_body` with a loop target entered. Returns the body and the
    /// finished target.
    fn loop_body(&mut self, body: &Node, prologue: Vec<NodeId>) -> LowerResult<(NodeId, Finished)> {
        let labels = std::mem::take(&mut self.pending_labels);
        self.enter_target(TargetKind::Loop, labels);
        let statements = self.lower_nested(body);
        let finished = self.exit_target();
        let mut all = prologue;
        all.extend(statements?);
        Ok((self.arena.block(all), finished))
    }

    pub(super) fn lower_while(
        &mut self,
        test: &Node,
        body: &Node,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let test = self.lower_expr(test)?;
        let (body, finished) = self.loop_body(body, Vec::new())?;
        let stmt = self.arena.alloc(Ir::WhileStatement {
            test,
            body,
            continue_label: finished.continue_label,
        });
        self.close_target(vec![stmt], finished.break_label, out);
        Ok(())
    }

    pub(super) fn lower_do_while(
        &mut self,
        body: &Node,
        test: &Node,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let (body, finished) = self.loop_body(body, Vec::new())?;
        let test = self.lower_expr(test)?;
        let stmt = self.arena.alloc(Ir::DoWhileStatement {
            body,
            test,
            continue_label: finished.continue_label,
        });
        self.close_target(vec![stmt], finished.break_label, out);
        Ok(())
    }

    pub(super) fn lower_for(
        &mut self,
        init: Option<&Node>,
        test: Option<&Node>,
        update: Option<&Node>,
        body: &Node,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        self.scopes.push();
        let result = self.lower_for_scoped(init, test, update, body);
        self.scopes.pop();
        let (statements, break_label) = result?;
        self.close_target(statements, break_label, out);
        Ok(())
    }

    fn lower_for_scoped(
        &mut self,
        init: Option<&Node>,
        test: Option<&Node>,
        update: Option<&Node>,
        body: &Node,
    ) -> LowerResult<(Vec<NodeId>, Option<String>)> {
        let mut init_stmts = Vec::new();
        match init {
            Some(Node {
                kind: NodeKind::VariableDeclaration { declarations, kind },
                ..
            }) => {
                let binding = self.binding_for(*kind, false);
                self.lower_var_decl(*kind, declarations, binding, &mut init_stmts)?;
            }
            Some(expression) => self.lower_expr_stmt(expression, &mut init_stmts)?,
            None => {}
        }
        let test = test.map(|test| self.lower_expr(test)).transpose()?;
        let labels = std::mem::take(&mut self.pending_labels);
        self.enter_target(TargetKind::Loop, labels);
        let body = self.lower_nested(body);
        let finished = self.exit_target();
        let body = body?;
        let body = self.arena.block(body);

        let update = match update {
            Some(update) => {
                let mut stmts = Vec::new();
                self.lower_expr_stmt(update, &mut stmts)?;
                match stmts.as_slice() {
                    [] => None,
                    [single] => Some(*single),
                    _ => Some(self.arena.block(stmts)),
                }
            }
            None => None,
        };

        let (init, mut prelude) = match init_stmts.as_slice() {
            [single] => (Some(*single), Vec::new()),
            _ => (None, init_stmts),
        };
        let stmt = self.arena.alloc(Ir::ForStatement {
            init,
            test,
            update,
            body,
            continue_label: finished.continue_label,
        });
        let statements = if prelude.is_empty() {
            vec![stmt]
        } else {
            prelude.push(stmt);
            vec![self.arena.block(prelude)]
        };
        Ok((statements, finished.break_label))
    }

    /// `for (left of right)` and `for (left in right)`.
    pub(super) fn lower_for_each(
        &mut self,
        node: &Node,
        left: &Node,
        right: &Node,
        body: &Node,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let right = self.lower_expr(right)?;
        self.scopes.push();
        let result = self.lower_for_each_scoped(node, left, right, body);
        self.scopes.pop();
        let (stmt, break_label) = result?;
        self.close_target(vec![stmt], break_label, out);
        Ok(())
    }

    fn lower_for_each_scoped(
        &mut self,
        node: &Node,
        left: &Node,
        right: NodeId,
        body: &Node,
    ) -> LowerResult<(NodeId, Option<String>)> {
        let mut prologue = Vec::new();
        let variable = match &left.kind {
            NodeKind::VariableDeclaration { declarations, kind } => {
                let [declarator] = declarations.as_slice() else {
                    return Err(LoweringError::new(
                        left,
                        "loop declaration must bind exactly one pattern",
                    ));
                };
                let NodeKind::VariableDeclarator { id, .. } = &declarator.kind else {
                    return Err(LoweringError::new(declarator, "malformed loop declaration"));
                };
                match id.as_identifier() {
                    Some(name) => {
                        self.scopes.declare(name);
                        Self::binding_name(name)
                    }
                    None => {
                        let temp = self.temp();
                        let value = self.arena.ident(temp.as_str());
                        let binding = self.binding_for(*kind, false);
                        self.bind_pattern(id, value, binding, &mut prologue)?;
                        temp
                    }
                }
            }
            // `for (x of xs)` assigns an existing binding or member.
            _ => {
                let temp = self.temp();
                let value = self.arena.ident(temp.as_str());
                self.bind_pattern(left, value, super::pattern::Binding::Assign, &mut prologue)?;
                temp
            }
        };

        let (body, finished) = self.loop_body(body, prologue)?;
        let left = self.arena.ident(variable);
        let stmt = match &node.kind {
            NodeKind::ForInStatement { .. } => self.arena.alloc(Ir::ForInStatement {
                left,
                right,
                body,
                continue_label: finished.continue_label,
            }),
            _ => {
                let iteration = if self.analysis.has_generators {
                    self.require(RuntimeHelper::Iterate);
                    Iteration::Protocol
                } else {
                    Iteration::Positional
                };
                self.arena.alloc(Ir::ForOfStatement {
                    left,
                    right,
                    body,
                    iteration,
                    continue_label: finished.continue_label,
                })
            }
        };
        Ok((stmt, finished.break_label))
    }

    // =========================================================================
    // Switch
    // =========================================================================

    /// Lower `switch` to a chained conditional over a local holding the
    /// discriminant.
    ///
    /// Each case body is its own consequent followed by the consequents of
    /// the cases it falls into, up to the first unconditional exit; a
    /// trailing `break` that leaves the switch is dropped. Runs of empty cases
    /// merge into the tests of the next non-empty case.
    pub(super) fn lower_switch(
        &mut self,
        discriminant: &Node,
        cases: &[Node],
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        let discriminant = self.lower_expr(discriminant)?;
        let mut arms = Vec::with_capacity(cases.len());
        for case in cases {
            let NodeKind::SwitchCase { test, consequent } = &case.kind else {
                return Err(LoweringError::new(case, "expected a switch case"));
            };
            arms.push((test.as_deref(), consequent.as_slice()));
        }

        let labels = std::mem::take(&mut self.pending_labels);
        self.enter_target(TargetKind::Switch, labels);
        self.scopes.push();
        let result = self.lower_switch_cases(&arms);
        self.scopes.pop();
        let finished = self.exit_target();
        let cases = result?;

        let stmt = self.arena.alloc(Ir::SwitchStatement { discriminant, cases });
        self.close_target(vec![stmt], finished.break_label, out);
        Ok(())
    }

    fn lower_switch_cases(
        &mut self,
        arms: &[(Option<&Node>, &[Node])],
    ) -> LowerResult<Vec<SwitchCase>> {
        let mut cases = Vec::new();
        let mut pending_tests: Vec<&Node> = Vec::new();
        let mut pending_default = false;

        for (i, (test, consequent)) in arms.iter().enumerate() {
            match test {
                Some(test) => pending_tests.push(test),
                None => pending_default = true,
            }
            if consequent.is_empty() && i + 1 < arms.len() {
                continue;
            }

            let body = fall_through_body(&arms[i..]);
            let tests = std::mem::take(&mut pending_tests);
            let is_default = std::mem::take(&mut pending_default);

            if !tests.is_empty() {
                let tests = tests
                    .into_iter()
                    .map(|test| self.lower_expr(test))
                    .collect::<LowerResult<Vec<_>>>()?;
                let consequent = self.lower_block_body(&body, None)?;
                cases.push(SwitchCase { tests, consequent });
            }
            if is_default {
                let consequent = self.lower_block_body(&body, None)?;
                cases.push(SwitchCase {
                    tests: Vec::new(),
                    consequent,
                });
            }
        }
        Ok(cases)
    }

    // =========================================================================
    // Try
    // =========================================================================

    /// Lower `try` to the protected-call template.
    ///
    /// The block and the handler run as closures; exits from inside them are
    /// recorded on a [`TryFrame`] and turned into signal returns. After the
    /// finalizer has run in the enclosing context, the completion block
    /// re-issues each recorded exit from there.
    pub(super) fn lower_try(
        &mut self,
        block: &Node,
        handler: Option<&Node>,
        finalizer: Option<&Node>,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        self.frame.tries.push(TryFrame::default());
        let protected = self.lower_protected(block, handler);
        let region = self.frame.tries.pop().unwrap_or_default();
        let (block, handler) = protected?;

        let finalizer = match finalizer {
            Some(finalizer) => {
                let statements = self.lower_nested(finalizer)?;
                (!statements.is_empty()).then(|| self.arena.block(statements))
            }
            None => None,
        };

        let mut reissue = Vec::with_capacity(region.exits.len());
        for exit in region.exits {
            let signal = match exit {
                Exit::Return => names::RETURN_SIGNAL.to_string(),
                Exit::Break(id) => names::break_signal(id),
                Exit::Continue(id) => names::continue_signal(id),
            };
            let flow = self.arena.ident(names::TRY_FLOW);
            let signal = self.arena.string(signal);
            let test = self.arena.binary(crate::ir::BinaryOperator::Eq, flow, signal);
            let value = match exit {
                Exit::Return => Some(self.arena.ident(names::TRY_VALUE)),
                Exit::Break(_) | Exit::Continue(_) => None,
            };
            let again = self.exit_stmt(exit, value);
            reissue.push(self.arena.if_(test, vec![again], None));
        }
        let completion = (!reissue.is_empty()).then(|| self.arena.block(reissue));

        out.push(self.arena.alloc(Ir::TryStatement {
            block,
            handler,
            finalizer,
            completion,
        }));
        Ok(())
    }

    fn lower_protected(
        &mut self,
        block: &Node,
        handler: Option<&Node>,
    ) -> LowerResult<(NodeId, Option<NodeId>)> {
        let statements = self.lower_nested(block)?;
        let block = self.arena.block(statements);

        let Some(handler) = handler else {
            return Ok((block, None));
        };
        let NodeKind::CatchClause { param, body } = &handler.kind else {
            return Err(LoweringError::new(handler, "expected a catch clause"));
        };

        self.scopes.push();
        let result = self.lower_catch(param.as_deref(), body);
        self.scopes.pop();
        let (param, body) = result?;
        let handler = self.arena.alloc(Ir::CatchClause { param, body });
        Ok((block, Some(handler)))
    }

    fn lower_catch(
        &mut self,
        param: Option<&Node>,
        body: &Node,
    ) -> LowerResult<(Option<NodeId>, NodeId)> {
        let mut prologue = Vec::new();
        let param = match param {
            None => None,
            Some(param) => match param.as_identifier() {
                Some(name) => {
                    self.scopes.declare(name);
                    Some(self.arena.ident(Self::binding_name(name)))
                }
                None => {
                    let temp = self.temp();
                    let value = self.arena.ident(temp.as_str());
                    self.bind_pattern(param, value, super::pattern::Binding::Local, &mut prologue)?;
                    Some(self.arena.ident(temp))
                }
            },
        };
        prologue.extend(self.lower_nested(body)?);
        Ok((param, self.arena.block(prologue)))
    }

    /// Binding mode of a declaration of `kind`. Only declarations directly in
    /// a block (`in_block`) use that block's pre-declaration.
    pub(super) fn binding_for(
        &self,
        kind: VariableKind,
        in_block: bool,
    ) -> super::pattern::Binding {
        use super::pattern::Binding;
        match kind {
            VariableKind::Var => Binding::Assign,
            VariableKind::Let | VariableKind::Const if in_block && self.block_predeclared => {
                Binding::Assign
            }
            VariableKind::Let | VariableKind::Const => Binding::Local,
        }
    }
}

fn is_loop(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::WhileStatement { .. }
            | NodeKind::DoWhileStatement { .. }
            | NodeKind::ForStatement { .. }
            | NodeKind::ForInStatement { .. }
            | NodeKind::ForOfStatement { .. }
    )
}

/// Statements a case runs: its consequent and those it falls into, up to the
/// first unconditional exit. A final unlabeled `break` is left out.
fn fall_through_body<'a>(arms: &[(Option<&'a Node>, &'a [Node])]) -> Vec<&'a Node> {
    let mut body = Vec::new();
    for (_, consequent) in arms {
        for stmt in *consequent {
            if matches!(stmt.kind, NodeKind::BreakStatement { label: None }) {
                return body;
            }
            body.push(stmt);
            if is_terminal(stmt) {
                return body;
            }
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunar_ast::build;

    #[test]
    fn test_fall_through_stops_at_break() {
        let first = vec![build::expr_stmt(build::call(build::ident("a"), vec![]))];
        let second = vec![
            build::expr_stmt(build::call(build::ident("b"), vec![])),
            build::break_(None),
            build::expr_stmt(build::call(build::ident("dead"), vec![])),
        ];
        let third = vec![build::expr_stmt(build::call(build::ident("c"), vec![]))];
        let arms: Vec<(Option<&Node>, &[Node])> =
            vec![(None, &first), (None, &second), (None, &third)];

        assert_eq!(fall_through_body(&arms).len(), 2);
        assert_eq!(fall_through_body(&arms[1..]).len(), 1);
        assert_eq!(fall_through_body(&arms[2..]).len(), 1);
    }

    #[test]
    fn test_fall_through_keeps_return() {
        let first = vec![build::ret(Some(build::num(1.0))), build::break_(None)];
        let second = vec![build::expr_stmt(build::call(build::ident("b"), vec![]))];
        let arms: Vec<(Option<&Node>, &[Node])> = vec![(None, &first), (None, &second)];
        let body = fall_through_body(&arms);
        assert_eq!(body.len(), 1);
        assert!(matches!(body[0].kind, NodeKind::ReturnStatement { .. }));
    }
}
