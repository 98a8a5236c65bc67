use super::{EmitResult, Emitter};
use crate::ir::{Declarator, Iteration, Node, NodeId, SwitchCase};
use crate::names;
use crate::protocol::RuntimeHelper;

/// Minimum precedence of a `==` operand inside the switch test chain.
const SWITCH_OPERAND_PREC: u8 = 4;

impl<'a> Emitter<'a> {
    // =========================================================================
    // Statement Emission
    // =========================================================================

    pub(super) fn emit_stmt(&mut self, id: NodeId) -> EmitResult {
        match self.node(id)? {
            Node::VariableDeclaration { declarations, .. } => self.emit_var_decl(id, declarations),
            Node::FunctionDeclaration {
                id: name,
                params,
                body,
                ..
            } => {
                self.emit("local function ");
                let name = self.identifier(*name, "function name")?;
                self.emit(name);
                self.emit_function_tail(params, *body)
            }
            Node::ClassDeclaration {
                id: name,
                super_class,
                body,
                static_fields,
            } => self.emit_class(*name, *super_class, body, static_fields),
            Node::BlockStatement { statements } => {
                self.emit("do");
                self.emit_statements(statements)?;
                self.emit("end");
                Ok(())
            }
            Node::ExpressionStatement { expression } => self.emit_expr_stmt(*expression),
            Node::IfStatement {
                test,
                consequent,
                alternate,
            } => self.emit_if(*test, *consequent, *alternate),
            Node::WhileStatement {
                test,
                body,
                continue_label,
            } => {
                self.emit("while ");
                self.emit_expr(*test)?;
                self.emit(" do");
                self.emit_loop_body(*body, continue_label.as_deref())?;
                self.emit("end");
                Ok(())
            }
            Node::DoWhileStatement {
                body,
                test,
                continue_label,
            } => {
                self.emit("repeat");
                self.emit_wrapped_body(*body, continue_label.as_deref(), None)?;
                self.emit("until ");
                self.emit_negated(*test)
            }
            Node::ForStatement {
                init,
                test,
                update,
                body,
                continue_label,
            } => self.emit_for(*init, *test, *update, *body, continue_label.as_deref()),
            Node::ForOfStatement {
                left,
                right,
                body,
                iteration,
                continue_label,
            } => {
                let name = self.identifier(*left, "loop binding")?;
                match iteration {
                    Iteration::Positional => {
                        self.emit("for ");
                        self.emit(names::PLACEHOLDER);
                        self.emit(", ");
                        self.emit(name);
                        self.emit(" in ipairs(");
                    }
                    Iteration::Protocol => {
                        self.emit("for ");
                        self.emit(name);
                        self.emit(" in ");
                        self.emit(RuntimeHelper::Iterate.name());
                        self.emit("(");
                    }
                }
                self.emit_expr(*right)?;
                self.emit(") do");
                self.emit_loop_body(*body, continue_label.as_deref())?;
                self.emit("end");
                Ok(())
            }
            Node::ForInStatement {
                left,
                right,
                body,
                continue_label,
            } => {
                let name = self.identifier(*left, "loop binding")?;
                self.emit("for ");
                self.emit(name);
                self.emit(" in pairs(");
                self.emit_expr(*right)?;
                self.emit(") do");
                self.emit_loop_body(*body, continue_label.as_deref())?;
                self.emit("end");
                Ok(())
            }
            Node::SwitchStatement {
                discriminant,
                cases,
            } => self.emit_switch(*discriminant, cases),
            Node::TryStatement {
                block,
                handler,
                finalizer,
                completion,
            } => self.emit_try(*block, *handler, *finalizer, *completion),
            Node::ThrowStatement { argument } => {
                self.emit("error(");
                self.emit_expr(*argument)?;
                self.emit(", 0)");
                Ok(())
            }
            Node::ReturnStatement { arguments } => {
                self.emit("return");
                if !arguments.is_empty() {
                    self.emit(" ");
                    self.emit_list(arguments)?;
                }
                Ok(())
            }
            Node::BreakStatement { label } => {
                match label {
                    Some(label) => {
                        self.emit("goto ");
                        self.emit(label);
                    }
                    None => self.emit("break"),
                }
                Ok(())
            }
            Node::ContinueStatement { label } => {
                self.emit("goto ");
                self.emit(label);
                Ok(())
            }
            Node::LabeledStatement { label, body } => {
                self.emit_stmt(*body)?;
                self.emit_newline();
                self.emit("::");
                self.emit(label);
                self.emit("::");
                Ok(())
            }
            _ => Err(self.gap(id, "statement position")),
        }
    }

    /// Emit statements one per line, indented, and leave the cursor on a fresh
    /// line at the outer level.
    pub(super) fn emit_statements(&mut self, statements: &[NodeId]) -> EmitResult {
        self.indent();
        for &stmt in statements {
            self.emit_newline();
            self.emit_stmt(stmt)?;
        }
        self.dedent();
        self.emit_newline();
        Ok(())
    }

    pub(super) fn emit_body(&mut self, block: NodeId) -> EmitResult {
        let statements = self.block_statements(block)?;
        self.emit_statements(statements)
    }

    /// `(params) body end`
    pub(super) fn emit_function_tail(&mut self, params: &[NodeId], body: NodeId) -> EmitResult {
        self.emit("(");
        for (i, &param) in params.iter().enumerate() {
            if i > 0 {
                self.emit(", ");
            }
            match self.node(param)? {
                Node::Identifier { name } => self.emit(name),
                Node::RestElement { .. } => self.emit("..."),
                _ => return Err(self.gap(param, "parameter")),
            }
        }
        self.emit(")");
        self.emit_body(body)?;
        self.emit("end");
        Ok(())
    }

    fn emit_var_decl(&mut self, id: NodeId, declarations: &[Declarator]) -> EmitResult {
        if declarations.is_empty() {
            return Err(self.gap(id, "empty declaration"));
        }
        if declarations.iter().all(|d| d.init.is_none()) {
            self.emit("local ");
            for (i, declarator) in declarations.iter().enumerate() {
                if i > 0 {
                    self.emit(", ");
                }
                let name = self.identifier(declarator.pattern, "uninitialized binding")?;
                self.emit(name);
            }
            return Ok(());
        }
        for (i, declarator) in declarations.iter().enumerate() {
            if i > 0 {
                self.emit_newline();
            }
            self.emit_declarator(declarator)?;
        }
        Ok(())
    }

    fn emit_declarator(&mut self, declarator: &Declarator) -> EmitResult {
        self.emit("local ");
        match (self.node(declarator.pattern)?, declarator.init) {
            (Node::Identifier { name }, init) => {
                self.emit(name);
                if let Some(init) = init {
                    self.emit(" = ");
                    self.emit_expr(init)?;
                }
                Ok(())
            }
            (Node::ArrayPattern { elements }, Some(init)) => {
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.emit(", ");
                    }
                    match element {
                        Some(element) => {
                            let name = self.identifier(*element, "array pattern element")?;
                            self.emit(name);
                        }
                        None => self.emit(names::PLACEHOLDER),
                    }
                }
                self.emit(" = table.unpack(");
                self.emit_expr(init)?;
                self.emit(")");
                Ok(())
            }
            (Node::ObjectPattern { properties }, Some(init)) => {
                self.identifier(init, "object pattern initializer")?;
                let mut keys = Vec::with_capacity(properties.len());
                for (i, &property) in properties.iter().enumerate() {
                    let Node::Property {
                        key,
                        value,
                        computed: false,
                        ..
                    } = self.node(property)?
                    else {
                        return Err(self.gap(property, "object pattern property"));
                    };
                    if i > 0 {
                        self.emit(", ");
                    }
                    let binding = self.identifier(*value, "object pattern binding")?;
                    self.emit(binding);
                    keys.push(*key);
                }
                self.emit(" = ");
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        self.emit(", ");
                    }
                    self.emit_expr(init)?;
                    let name = self.identifier(key, "object pattern key")?;
                    self.emit_field(name);
                }
                Ok(())
            }
            _ => Err(self.gap(declarator.pattern, "declaration pattern")),
        }
    }

    fn emit_expr_stmt(&mut self, expression: NodeId) -> EmitResult {
        match self.node(expression)? {
            Node::AssignmentExpression { left, right } => {
                match self.node(*left)? {
                    Node::Identifier { .. } | Node::MemberExpression { .. } => {}
                    _ => return Err(self.gap(*left, "assignment target")),
                }
                let start = self.output.len();
                self.emit_expr(*left)?;
                self.separate_from_previous(start);
                self.emit(" = ");
                self.emit_expr(*right)
            }
            Node::CallExpression { .. }
            | Node::AwaitExpression { .. }
            | Node::YieldExpression { .. } => {
                let start = self.output.len();
                self.emit_expr(expression)?;
                self.separate_from_previous(start);
                Ok(())
            }
            _ => Err(self.gap(expression, "expression statement")),
        }
    }

    /// A statement starting with `(` would continue the previous line as a
    /// call, so it gets a leading `;`.
    fn separate_from_previous(&mut self, start: usize) {
        if self.output[start..].starts_with('(') {
            self.output.insert(start, ';');
        }
    }

    fn emit_if(
        &mut self,
        test: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    ) -> EmitResult {
        self.emit("if ");
        self.emit_expr(test)?;
        self.emit(" then");
        self.emit_body(consequent)?;

        let mut alternate = alternate;
        while let Some(alt) = alternate {
            match self.node(alt)? {
                Node::IfStatement {
                    test,
                    consequent,
                    alternate: next,
                } => {
                    self.emit("elseif ");
                    self.emit_expr(*test)?;
                    self.emit(" then");
                    self.emit_body(*consequent)?;
                    alternate = *next;
                }
                Node::BlockStatement { statements } => {
                    self.emit("else");
                    self.emit_statements(statements)?;
                    alternate = None;
                }
                _ => {
                    self.emit("else");
                    self.emit_statements(&[alt])?;
                    alternate = None;
                }
            }
        }
        self.emit("end");
        Ok(())
    }

    /// Loop body. With a continue label the body is wrapped in its own block
    /// so the label sits outside every body local.
    fn emit_loop_body(&mut self, body: NodeId, continue_label: Option<&str>) -> EmitResult {
        match continue_label {
            None => self.emit_body(body),
            Some(_) => self.emit_wrapped_body(body, continue_label, None),
        }
    }

    /// `do body end`, then the continue label, then `tail`.
    fn emit_wrapped_body(
        &mut self,
        body: NodeId,
        continue_label: Option<&str>,
        tail: Option<NodeId>,
    ) -> EmitResult {
        self.indent();
        self.emit_newline();
        self.emit("do");
        self.emit_body(body)?;
        self.emit("end");
        if let Some(label) = continue_label {
            self.emit_newline();
            self.emit("::");
            self.emit(label);
            self.emit("::");
        }
        if let Some(tail) = tail {
            self.emit_newline();
            self.emit_stmt(tail)?;
        }
        self.dedent();
        self.emit_newline();
        Ok(())
    }

    /// `not <test>`, as the condition of `repeat ... until`.
    fn emit_negated(&mut self, test: NodeId) -> EmitResult {
        self.emit("not ");
        self.emit_expr_with_prec(test, super::expr::UNARY_PREC)
    }

    fn emit_for(
        &mut self,
        init: Option<NodeId>,
        test: Option<NodeId>,
        update: Option<NodeId>,
        body: NodeId,
        continue_label: Option<&str>,
    ) -> EmitResult {
        if let Some(init) = init {
            self.emit("do");
            self.indent();
            self.emit_newline();
            self.emit_stmt(init)?;
            self.emit_newline();
        }
        self.emit("while ");
        match test {
            Some(test) => self.emit_expr(test)?,
            None => self.emit("true"),
        }
        self.emit(" do");
        self.emit_wrapped_body(body, continue_label, update)?;
        self.emit("end");
        if init.is_some() {
            self.dedent();
            self.emit_newline();
            self.emit("end");
        }
        Ok(())
    }

    fn emit_switch(&mut self, discriminant: NodeId, cases: &[SwitchCase]) -> EmitResult {
        self.emit("do");
        self.indent();
        self.emit_newline();
        self.emit("local ");
        self.emit(names::SWITCH_VALUE);
        self.emit(" = ");
        self.emit_expr(discriminant)?;

        let default = cases.iter().find(|case| case.tests.is_empty());
        let tested: Vec<&SwitchCase> = cases.iter().filter(|case| !case.tests.is_empty()).collect();

        if tested.is_empty() {
            if let Some(default) = default {
                for &stmt in &default.consequent {
                    self.emit_newline();
                    self.emit_stmt(stmt)?;
                }
            }
        } else {
            self.emit_newline();
            for (i, case) in tested.iter().enumerate() {
                self.emit(if i == 0 { "if " } else { "elseif " });
                for (j, &test) in case.tests.iter().enumerate() {
                    if j > 0 {
                        self.emit(" or ");
                    }
                    self.emit(names::SWITCH_VALUE);
                    self.emit(" == ");
                    self.emit_expr_with_prec(test, SWITCH_OPERAND_PREC)?;
                }
                self.emit(" then");
                self.emit_statements(&case.consequent)?;
            }
            if let Some(default) = default {
                self.emit("else");
                self.emit_statements(&default.consequent)?;
            }
            self.emit("end");
        }

        self.dedent();
        self.emit_newline();
        self.emit("end");
        Ok(())
    }

    fn emit_try(
        &mut self,
        block: NodeId,
        handler: Option<NodeId>,
        finalizer: Option<NodeId>,
        completion: Option<NodeId>,
    ) -> EmitResult {
        let locals = format!("{}, {}, {}", names::TRY_OK, names::TRY_FLOW, names::TRY_VALUE);

        self.emit("do");
        self.indent();
        self.emit_newline();
        self.emit("local ");
        self.emit(&locals);
        self.emit(" = pcall(function()");
        self.emit_body(block)?;
        self.emit("end)");

        if let Some(handler) = handler {
            let Node::CatchClause { param, body } = self.node(handler)? else {
                return Err(self.gap(handler, "catch handler"));
            };
            self.emit_newline();
            self.emit("if not ");
            self.emit(names::TRY_OK);
            self.emit(" then");
            self.indent();
            self.emit_newline();
            self.emit(&locals);
            self.emit(" = pcall(function(");
            if let Some(param) = param {
                let name = self.identifier(*param, "catch parameter")?;
                self.emit(name);
            }
            self.emit(")");
            self.emit_body(*body)?;
            self.emit("end, ");
            self.emit(names::TRY_FLOW);
            self.emit(")");
            self.dedent();
            self.emit_newline();
            self.emit("end");
        }

        if let Some(finalizer) = finalizer {
            if !self.block_statements(finalizer)?.is_empty() {
                self.emit_newline();
                self.emit("do");
                self.emit_body(finalizer)?;
                self.emit("end");
            }
        }

        self.emit_newline();
        self.emit(&format!(
            "if not {} then error({}, 0) end",
            names::TRY_OK,
            names::TRY_FLOW
        ));

        if let Some(completion) = completion {
            for &stmt in self.block_statements(completion)? {
                self.emit_newline();
                self.emit_stmt(stmt)?;
            }
        }

        self.dedent();
        self.emit_newline();
        self.emit("end");
        Ok(())
    }
}
