//! Lowering: parse tree in, IR arena out.
//!
//! The lowerer walks the validated tree once, allocating IR nodes in source
//! order so that node ids are a pure function of the input. All semantic
//! desugaring happens here; the emitter only renders what it is given.
//!
//! Context threaded through the walk:
//!
//! - [`Scopes`]: source names declared per block, for builtin shadowing.
//! - [`Frame`]s: one per function, with its `this` binding, its jump
//!   targets and its protected regions.
//! - [`ClassContext`]s: the class being lowered and its captured parent
//!   reference, for `super`.

mod builtins;
mod class;
mod control;
mod expr;
mod function;
mod infer;
mod pattern;
mod runtime;
mod scope;
mod stmt;

use crate::config::CompileOptions;
use crate::error::LoweringError;
use crate::ir::{Arena, NodeId};
use crate::names;
use crate::protocol::RuntimeHelper;
use control::{Target, TryFrame};
use infer::Analysis;
use lunar_ast::{Node, NodeKind, Program, VariableKind};
use scope::Scopes;
use std::collections::BTreeSet;

pub(crate) type LowerResult<T> = Result<T, LoweringError>;

/// A lowered compilation unit.
#[derive(Debug)]
pub struct Lowered {
    pub arena: Arena,
    /// Runtime helpers prepended to the unit, in emission order.
    pub helpers: Vec<RuntimeHelper>,
}

/// Lower a validated program into a fresh arena.
pub fn lower(program: &Program, options: &CompileOptions) -> Result<Lowered, LoweringError> {
    let analysis = infer::analyze(program, options.infer_local_types);
    let mut lowerer = Lowerer::new(options, analysis);
    let body = lowerer.lower_program(program)?;
    Ok(lowerer.finish(body))
}

/// What `this` means inside a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ThisBinding {
    /// Plain functions and the top level: `this` is `nil`.
    Nil,
    /// Methods: `this` is the `self` parameter.
    SelfParam,
    /// Arrows: whatever the enclosing function has.
    Lexical,
    /// Static field initializers: the class table.
    Name(String),
}

#[derive(Debug)]
pub(super) struct Frame {
    this: ThisBinding,
    targets: Vec<Target>,
    tries: Vec<TryFrame>,
}

impl Frame {
    fn new(this: ThisBinding) -> Self {
        Self {
            this,
            targets: Vec::new(),
            tries: Vec::new(),
        }
    }
}

/// Where `super` resolves to inside a class body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Parent {
    /// A class table, by its target name.
    Class(String),
    /// One of the builtin error constructors, which has no table. Holds the
    /// constructor name.
    Error(String),
}

#[derive(Debug)]
pub(super) struct ClassContext {
    name: String,
    parent: Option<Parent>,
}

pub(super) struct Lowerer<'o> {
    arena: Arena,
    options: &'o CompileOptions,
    analysis: Analysis,
    scopes: Scopes,
    frame: Frame,
    outer_frames: Vec<Frame>,
    classes: Vec<ClassContext>,
    helpers: BTreeSet<RuntimeHelper>,
    temps: u32,
    jump_ids: u32,
    /// Labels waiting for the loop they are attached to.
    pending_labels: Vec<String>,
    /// Whether the block being lowered pre-declared its names, turning its
    /// declarations into assignments.
    block_predeclared: bool,
    uses_async: bool,
}

impl<'o> Lowerer<'o> {
    fn new(options: &'o CompileOptions, analysis: Analysis) -> Self {
        Self {
            arena: Arena::new(),
            options,
            analysis,
            scopes: Scopes::default(),
            frame: Frame::new(ThisBinding::Nil),
            outer_frames: Vec::new(),
            classes: Vec::new(),
            helpers: BTreeSet::new(),
            temps: 0,
            jump_ids: 0,
            pending_labels: Vec::new(),
            block_predeclared: false,
            uses_async: false,
        }
    }

    fn lower_program(&mut self, program: &Program) -> LowerResult<Vec<NodeId>> {
        self.scopes.push();
        let body = self.lower_function_body(&program.body, &[], None);
        self.scopes.pop();
        body
    }

    fn finish(mut self, mut body: Vec<NodeId>) -> Lowered {
        if self.uses_async && self.options.drain_tasks {
            self.require(RuntimeHelper::Drain);
            let drain = self.arena.call_named(RuntimeHelper::Drain.name(), vec![]);
            body.push(self.arena.expr_stmt(drain));
        }

        let helpers = runtime::with_dependencies(&self.helpers);
        let mut module = runtime::synthesize(&mut self.arena, &helpers);
        module.extend(body);
        self.arena.set_module_body(module);

        Lowered {
            arena: self.arena,
            helpers,
        }
    }

    // =========================================================================
    // Context
    // =========================================================================

    pub(super) fn require(&mut self, helper: RuntimeHelper) {
        self.helpers.insert(helper);
    }

    /// A fresh compiler temporary.
    pub(super) fn temp(&mut self) -> String {
        self.temps += 1;
        names::temp(self.temps)
    }

    pub(super) fn next_jump_id(&mut self) -> u32 {
        self.jump_ids += 1;
        self.jump_ids
    }

    pub(super) fn push_frame(&mut self, this: ThisBinding) {
        let outer = std::mem::replace(&mut self.frame, Frame::new(this));
        self.outer_frames.push(outer);
    }

    pub(super) fn pop_frame(&mut self) {
        if let Some(outer) = self.outer_frames.pop() {
            self.frame = outer;
        }
    }

    /// Resolve `this` through arrow functions to the nearest binding frame.
    pub(super) fn this_binding(&self) -> ThisBinding {
        std::iter::once(&self.frame)
            .chain(self.outer_frames.iter().rev())
            .map(|frame| &frame.this)
            .find(|this| **this != ThisBinding::Lexical)
            .cloned()
            .unwrap_or(ThisBinding::Nil)
    }

    pub(super) fn class_context(&self, node: &Node) -> LowerResult<&ClassContext> {
        self.classes
            .last()
            .ok_or_else(|| LoweringError::new(node, "`super` outside of a class body"))
    }

    /// Target name of a source binding.
    pub(super) fn binding_name(name: &str) -> String {
        names::sanitize(name).into_owned()
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Lower a function body: `var` names are pre-declared at the top,
    /// except those shadowing a parameter.
    pub(super) fn lower_function_body(
        &mut self,
        statements: &[Node],
        params: &[String],
        inject: Option<(usize, Vec<NodeId>)>,
    ) -> LowerResult<Vec<NodeId>> {
        let mut vars = Vec::new();
        for stmt in statements {
            collect_vars(stmt, &mut vars);
        }
        vars.retain(|name| !params.contains(name));

        let mut out = Vec::new();
        if !vars.is_empty() {
            let mut declared = Vec::with_capacity(vars.len());
            for name in &vars {
                self.scopes.declare(name);
                push_unique(&mut declared, Self::binding_name(name));
            }
            out.push(self.arena.predeclare(&declared));
        }

        let statements: Vec<&Node> = statements.iter().collect();
        out.extend(self.lower_block_body(&statements, inject)?);
        Ok(out)
    }

    /// Lower statements in a fresh scope.
    pub(super) fn lower_block(&mut self, statements: &[Node]) -> LowerResult<Vec<NodeId>> {
        let statements: Vec<&Node> = statements.iter().collect();
        self.lower_scoped(&statements)
    }

    pub(super) fn lower_scoped(&mut self, statements: &[&Node]) -> LowerResult<Vec<NodeId>> {
        self.scopes.push();
        let result = self.lower_block_body(statements, None);
        self.scopes.pop();
        result
    }

    /// A statement in a nested position (`if` branch, loop body). Blocks are
    /// unwrapped; anything else becomes a one-statement block.
    pub(super) fn lower_nested(&mut self, stmt: &Node) -> LowerResult<Vec<NodeId>> {
        match &stmt.kind {
            NodeKind::BlockStatement { body } => self.lower_block(body),
            _ => self.lower_scoped(&[stmt]),
        }
    }

    /// Lower the statements of one block in the current scope.
    ///
    /// Function declarations are hoisted to the top. With more than one of
    /// them, or functions alongside other declarations, every name declared
    /// directly in the block is pre-declared on one `local` line so that the
    /// functions can refer to each other and to later bindings. `inject` splices
    /// already-lowered statements in before the statement at that index.
    pub(super) fn lower_block_body(
        &mut self,
        statements: &[&Node],
        inject: Option<(usize, Vec<NodeId>)>,
    ) -> LowerResult<Vec<NodeId>> {
        let functions: Vec<&Node> = statements
            .iter()
            .copied()
            .filter(|stmt| matches!(stmt.kind, NodeKind::FunctionDeclaration { .. }))
            .collect();
        let mut function_names = Vec::new();
        for function in &functions {
            if let NodeKind::FunctionDeclaration { id: Some(id), .. } = &function.kind {
                infer::bound_names(id, &mut function_names);
            }
        }
        let mut lexical = Vec::new();
        for stmt in statements {
            match &stmt.kind {
                NodeKind::VariableDeclaration { declarations, kind }
                    if *kind != VariableKind::Var =>
                {
                    for declarator in declarations {
                        if let NodeKind::VariableDeclarator { id, .. } = &declarator.kind {
                            infer::bound_names(id, &mut lexical);
                        }
                    }
                }
                NodeKind::ClassDeclaration { id: Some(id), .. } => {
                    infer::bound_names(id, &mut lexical);
                }
                _ => {}
            }
        }
        for name in function_names.iter().chain(&lexical) {
            self.scopes.declare(name);
        }

        let predeclare = functions.len() > 1 || (!functions.is_empty() && !lexical.is_empty());
        let mut out = Vec::new();
        if predeclare {
            let mut declared = Vec::new();
            for name in function_names.iter().chain(&lexical) {
                push_unique(&mut declared, Self::binding_name(name));
            }
            out.push(self.arena.predeclare(&declared));
        }

        let outer = std::mem::replace(&mut self.block_predeclared, predeclare);
        let result = self.lower_block_statements(statements, &functions, inject, &mut out);
        self.block_predeclared = outer;
        result?;
        Ok(out)
    }

    fn lower_block_statements(
        &mut self,
        statements: &[&Node],
        functions: &[&Node],
        mut inject: Option<(usize, Vec<NodeId>)>,
        out: &mut Vec<NodeId>,
    ) -> LowerResult<()> {
        for function in functions {
            self.lower_function_decl(function, out)?;
        }
        for (i, stmt) in statements.iter().enumerate() {
            if inject.as_ref().is_some_and(|(at, _)| *at == i) {
                if let Some((_, injected)) = inject.take() {
                    out.extend(injected);
                }
            }
            if matches!(stmt.kind, NodeKind::FunctionDeclaration { .. }) {
                continue;
            }
            self.lower_stmt(stmt, out)?;
            // Nothing after an unconditional exit is reachable, and the
            // target requires `return` to end its block.
            if is_terminal(stmt) {
                return Ok(());
            }
        }
        if let Some((_, injected)) = inject {
            out.extend(injected);
        }
        Ok(())
    }
}

/// True for statements after which the rest of the block is unreachable.
pub(super) fn is_terminal(stmt: &Node) -> bool {
    matches!(
        stmt.kind,
        NodeKind::ReturnStatement { .. }
            | NodeKind::ThrowStatement { .. }
            | NodeKind::BreakStatement { .. }
            | NodeKind::ContinueStatement { .. }
    )
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.contains(&name) {
        names.push(name);
    }
}

/// `var` names declared in a statement, without descending into expressions,
/// nested functions or classes.
fn collect_vars(stmt: &Node, out: &mut Vec<String>) {
    match &stmt.kind {
        NodeKind::VariableDeclaration {
            declarations,
            kind: VariableKind::Var,
        } => {
            for declarator in declarations {
                if let NodeKind::VariableDeclarator { id, .. } = &declarator.kind {
                    let mut names = Vec::new();
                    infer::bound_names(id, &mut names);
                    for name in names {
                        push_unique(out, name);
                    }
                }
            }
        }
        NodeKind::BlockStatement { body } => {
            for stmt in body {
                collect_vars(stmt, out);
            }
        }
        NodeKind::IfStatement {
            consequent,
            alternate,
            ..
        } => {
            collect_vars(consequent, out);
            if let Some(alternate) = alternate {
                collect_vars(alternate, out);
            }
        }
        NodeKind::ForStatement { init, body, .. } => {
            if let Some(init) = init {
                collect_vars(init, out);
            }
            collect_vars(body, out);
        }
        NodeKind::ForInStatement { left, body, .. }
        | NodeKind::ForOfStatement { left, body, .. } => {
            collect_vars(left, out);
            collect_vars(body, out);
        }
        NodeKind::WhileStatement { body, .. }
        | NodeKind::DoWhileStatement { body, .. }
        | NodeKind::LabeledStatement { body, .. }
        | NodeKind::CatchClause { body, .. } => collect_vars(body, out),
        NodeKind::SwitchStatement { cases, .. } => {
            for case in cases {
                if let NodeKind::SwitchCase { consequent, .. } = &case.kind {
                    for stmt in consequent {
                        collect_vars(stmt, out);
                    }
                }
            }
        }
        NodeKind::TryStatement {
            block,
            handler,
            finalizer,
        } => {
            collect_vars(block, out);
            if let Some(handler) = handler {
                collect_vars(handler, out);
            }
            if let Some(finalizer) = finalizer {
                collect_vars(finalizer, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests;
