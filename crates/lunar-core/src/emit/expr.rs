use super::{escape_string, format_number, EmitResult, Emitter};
use crate::ir::{BinaryOperator, LiteralValue, LogicalOperator, Node, NodeId, UnaryOperator};
use crate::names;
use crate::protocol::RuntimeHelper;

pub(super) const UNARY_PREC: u8 = 11;
const CONCAT_PREC: u8 = 8;
const ATOM_PREC: u8 = u8::MAX;

impl<'a> Emitter<'a> {
    // =========================================================================
    // Expression Emission
    // =========================================================================

    pub(super) fn emit_expr(&mut self, id: NodeId) -> EmitResult {
        self.emit_expr_with_prec(id, 0)
    }

    pub(super) fn emit_expr_with_prec(&mut self, id: NodeId, min_prec: u8) -> EmitResult {
        let node = self.node(id)?;
        if precedence(node) < min_prec {
            self.emit("(");
            self.emit_expr_node(id, node)?;
            self.emit(")");
            Ok(())
        } else {
            self.emit_expr_node(id, node)
        }
    }

    /// Emit an expression that is followed by `.`, `[`, `:` or `(`. Only
    /// names, indexing and calls can stand there unparenthesized.
    fn emit_prefix(&mut self, id: NodeId) -> EmitResult {
        let node = self.node(id)?;
        match node {
            Node::Identifier { .. }
            | Node::ThisExpression
            | Node::MemberExpression { .. }
            | Node::CallExpression { .. } => self.emit_expr_node(id, node),
            _ => {
                self.emit("(");
                self.emit_expr_node(id, node)?;
                self.emit(")");
                Ok(())
            }
        }
    }

    pub(super) fn emit_list(&mut self, ids: &[NodeId]) -> EmitResult {
        for (i, &id) in ids.iter().enumerate() {
            if i > 0 {
                self.emit(", ");
            }
            self.emit_expr(id)?;
        }
        Ok(())
    }

    /// `.name`, or `["name"]` when `name` is not a valid field name.
    pub(super) fn emit_field(&mut self, name: &str) {
        if names::is_field_name(name) {
            self.emit(".");
            self.emit(name);
        } else {
            self.emit("[\"");
            self.emit(&escape_string(name));
            self.emit("\"]");
        }
    }

    fn emit_expr_node(&mut self, id: NodeId, node: &'a Node) -> EmitResult {
        match node {
            Node::Literal { value, .. } => {
                match value {
                    LiteralValue::Null => self.emit("nil"),
                    LiteralValue::Boolean(b) => self.emit(if *b { "true" } else { "false" }),
                    LiteralValue::Number(n) => self.emit(&format_number(*n)),
                    LiteralValue::String(s) => {
                        self.emit("\"");
                        self.emit(&escape_string(s));
                        self.emit("\"");
                    }
                }
                Ok(())
            }
            Node::Identifier { name } => {
                self.emit(name);
                Ok(())
            }
            Node::VarArgs => {
                self.emit("...");
                Ok(())
            }
            Node::ThisExpression => {
                self.emit(names::SELF);
                Ok(())
            }
            Node::Super => Err(self.gap(id, "unresolved super")),
            Node::TemplateLiteral {
                quasis,
                expressions,
            } => self.emit_template(quasis, expressions),
            Node::BinaryExpression {
                operator,
                left,
                right,
            } => {
                let (prec, op) = binary_op_info(*operator);
                let (left_prec, right_prec) = if is_right_associative(*operator) {
                    (prec + 1, prec)
                } else {
                    (prec, prec + 1)
                };
                self.emit_expr_with_prec(*left, left_prec)?;
                self.emit(" ");
                self.emit(op);
                self.emit(" ");
                self.emit_expr_with_prec(*right, right_prec)
            }
            Node::LogicalExpression {
                operator,
                left,
                right,
            } => {
                let (prec, op) = logical_op_info(*operator);
                self.emit_expr_with_prec(*left, prec)?;
                self.emit(" ");
                self.emit(op);
                self.emit(" ");
                self.emit_expr_with_prec(*right, prec + 1)
            }
            Node::UnaryExpression { operator, argument } => {
                self.emit(unary_op_str(*operator));
                let start = self.output.len();
                self.emit_expr_with_prec(*argument, UNARY_PREC)?;
                // `--` would start a comment.
                if *operator == UnaryOperator::Neg && self.output[start..].starts_with('-') {
                    self.output.insert(start, ' ');
                }
                Ok(())
            }
            Node::ArrayExpression { elements } => {
                self.emit("{");
                self.emit_list(elements)?;
                self.emit("}");
                Ok(())
            }
            Node::ObjectExpression { properties } => {
                self.emit("{");
                for (i, &property) in properties.iter().enumerate() {
                    if i > 0 {
                        self.emit(", ");
                    }
                    self.emit_property(property)?;
                }
                self.emit("}");
                Ok(())
            }
            Node::MemberExpression {
                object,
                property,
                computed,
            } => {
                self.emit_prefix(*object)?;
                if *computed {
                    self.emit("[");
                    self.emit_expr(*property)?;
                    self.emit("]");
                } else {
                    let name = self.identifier(*property, "member name")?;
                    self.emit_field(name);
                }
                Ok(())
            }
            Node::CallExpression {
                callee,
                arguments,
                method,
            } => {
                if *method {
                    let Node::MemberExpression {
                        object,
                        property,
                        computed: false,
                    } = self.node(*callee)?
                    else {
                        return Err(self.gap(*callee, "method call receiver"));
                    };
                    let name = self.identifier(*property, "method name")?;
                    if !names::is_field_name(name) {
                        return Err(self.gap(*property, "method name"));
                    }
                    self.emit_prefix(*object)?;
                    self.emit(":");
                    self.emit(name);
                } else {
                    self.emit_prefix(*callee)?;
                }
                self.emit("(");
                self.emit_list(arguments)?;
                self.emit(")");
                Ok(())
            }
            Node::FunctionExpression { params, body, .. }
            | Node::ArrowFunctionExpression { params, body, .. } => {
                self.emit("function");
                self.emit_function_tail(params, *body)
            }
            Node::ClassExpression {
                id: name,
                super_class,
                body,
                static_fields,
            } => {
                let class_name = self.identifier(*name, "class name")?;
                self.emit("(function()");
                self.indent();
                self.emit_newline();
                self.emit_class(*name, *super_class, body, static_fields)?;
                self.emit_newline();
                self.emit("return ");
                self.emit(class_name);
                self.dedent();
                self.emit_newline();
                self.emit("end)()");
                Ok(())
            }
            Node::SpreadElement { argument } => {
                self.emit("table.unpack(");
                self.emit_expr(*argument)?;
                self.emit(")");
                Ok(())
            }
            Node::AwaitExpression { argument } => {
                self.emit(RuntimeHelper::Suspend.name());
                self.emit("(");
                self.emit_expr(*argument)?;
                self.emit(")");
                Ok(())
            }
            Node::YieldExpression { argument, delegate } => {
                let helper = if *delegate {
                    RuntimeHelper::Delegate
                } else {
                    RuntimeHelper::Suspend
                };
                self.emit(helper.name());
                self.emit("(");
                if let Some(argument) = argument {
                    self.emit_expr(*argument)?;
                }
                self.emit(")");
                Ok(())
            }
            _ => Err(self.gap(id, "expression position")),
        }
    }

    fn emit_property(&mut self, id: NodeId) -> EmitResult {
        let Node::Property {
            key,
            value,
            computed,
            ..
        } = self.node(id)?
        else {
            return Err(self.gap(id, "object property"));
        };
        match (self.node(*key)?, computed) {
            (Node::Identifier { name }, false) if names::is_field_name(name) => self.emit(name),
            (Node::Identifier { name }, false) => {
                self.emit("[\"");
                self.emit(&escape_string(name));
                self.emit("\"]");
            }
            _ => {
                self.emit("[");
                self.emit_expr(*key)?;
                self.emit("]");
            }
        }
        self.emit(" = ");
        self.emit_expr(*value)
    }

    /// Segments joined with `..`; interpolated values go through `tostring`.
    fn emit_template(&mut self, quasis: &[String], expressions: &[NodeId]) -> EmitResult {
        let mut first = true;
        for (i, quasi) in quasis.iter().enumerate() {
            if !quasi.is_empty() {
                if !first {
                    self.emit(" .. ");
                }
                self.emit("\"");
                self.emit(&escape_string(quasi));
                self.emit("\"");
                first = false;
            }
            if let Some(&expression) = expressions.get(i) {
                if !first {
                    self.emit(" .. ");
                }
                self.emit("tostring(");
                self.emit_expr(expression)?;
                self.emit(")");
                first = false;
            }
        }
        if first {
            self.emit("\"\"");
        }
        Ok(())
    }
}

fn precedence(node: &Node) -> u8 {
    match node {
        Node::BinaryExpression { operator, .. } => binary_op_info(*operator).0,
        Node::LogicalExpression { operator, .. } => logical_op_info(*operator).0,
        Node::UnaryExpression { .. } => UNARY_PREC,
        Node::Literal {
            value: LiteralValue::Number(n),
            ..
        } if n.is_sign_negative() || n.is_infinite() => UNARY_PREC,
        Node::TemplateLiteral {
            quasis,
            expressions,
        } => {
            let segments = quasis.iter().filter(|q| !q.is_empty()).count() + expressions.len();
            if segments > 1 {
                CONCAT_PREC
            } else {
                ATOM_PREC
            }
        }
        _ => ATOM_PREC,
    }
}

fn binary_op_info(op: BinaryOperator) -> (u8, &'static str) {
    match op {
        BinaryOperator::Eq => (3, "=="),
        BinaryOperator::NotEq => (3, "~="),
        BinaryOperator::Lt => (3, "<"),
        BinaryOperator::LtEq => (3, "<="),
        BinaryOperator::Gt => (3, ">"),
        BinaryOperator::GtEq => (3, ">="),
        BinaryOperator::BitOr => (4, "|"),
        BinaryOperator::BitXor => (5, "~"),
        BinaryOperator::BitAnd => (6, "&"),
        BinaryOperator::Shl => (7, "<<"),
        BinaryOperator::Shr => (7, ">>"),
        BinaryOperator::Concat => (CONCAT_PREC, ".."),
        BinaryOperator::Add => (9, "+"),
        BinaryOperator::Sub => (9, "-"),
        BinaryOperator::Mul => (10, "*"),
        BinaryOperator::Div => (10, "/"),
        BinaryOperator::Pow => (12, "^"),
    }
}

fn is_right_associative(op: BinaryOperator) -> bool {
    matches!(op, BinaryOperator::Concat | BinaryOperator::Pow)
}

fn logical_op_info(op: LogicalOperator) -> (u8, &'static str) {
    match op {
        LogicalOperator::Or => (1, "or"),
        LogicalOperator::And => (2, "and"),
    }
}

fn unary_op_str(op: UnaryOperator) -> &'static str {
    match op {
        UnaryOperator::Not => "not ",
        UnaryOperator::Neg => "-",
        UnaryOperator::Len => "#",
        UnaryOperator::BitNot => "~",
    }
}
