//! Shorthand constructors for common node shapes.

use super::{
    Arena, BinaryOperator, DeclarationKind, Declarator, LiteralKind, LiteralValue,
    LogicalOperator, Node, NodeId, UnaryOperator,
};
use crate::emit::format_number;

impl Arena {
    pub fn ident(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(Node::Identifier { name: name.into() })
    }

    pub fn string(&mut self, value: impl Into<String>) -> NodeId {
        let value = value.into();
        self.alloc(Node::Literal {
            literal_kind: LiteralKind::String,
            raw: format!("{value:?}"),
            value: LiteralValue::String(value),
        })
    }

    pub fn number(&mut self, value: f64) -> NodeId {
        self.alloc(Node::Literal {
            literal_kind: LiteralKind::Number,
            raw: format_number(value),
            value: LiteralValue::Number(value),
        })
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.alloc(Node::Literal {
            literal_kind: LiteralKind::Boolean,
            raw: value.to_string(),
            value: LiteralValue::Boolean(value),
        })
    }

    pub fn null(&mut self) -> NodeId {
        self.alloc(Node::Literal {
            literal_kind: LiteralKind::Null,
            raw: "null".to_string(),
            value: LiteralValue::Null,
        })
    }

    /// `object.name`
    pub fn member(&mut self, object: NodeId, name: &str) -> NodeId {
        let property = self.ident(name);
        self.alloc(Node::MemberExpression {
            object,
            property,
            computed: false,
        })
    }

    /// `object[key]`
    pub fn index(&mut self, object: NodeId, key: NodeId) -> NodeId {
        self.alloc(Node::MemberExpression {
            object,
            property: key,
            computed: true,
        })
    }

    /// `global.name`, e.g. `table.insert`.
    pub fn path(&mut self, global: &str, name: &str) -> NodeId {
        let object = self.ident(global);
        self.member(object, name)
    }

    pub fn call(&mut self, callee: NodeId, arguments: Vec<NodeId>) -> NodeId {
        self.alloc(Node::CallExpression {
            callee,
            arguments,
            method: false,
        })
    }

    /// Call a global function by name.
    pub fn call_named(&mut self, name: &str, arguments: Vec<NodeId>) -> NodeId {
        let callee = self.ident(name);
        self.call(callee, arguments)
    }

    /// `object:name(arguments)`
    pub fn method_call(&mut self, object: NodeId, name: &str, arguments: Vec<NodeId>) -> NodeId {
        let callee = self.member(object, name);
        self.alloc(Node::CallExpression {
            callee,
            arguments,
            method: true,
        })
    }

    pub fn binary(&mut self, operator: BinaryOperator, left: NodeId, right: NodeId) -> NodeId {
        self.alloc(Node::BinaryExpression {
            operator,
            left,
            right,
        })
    }

    pub fn logical(&mut self, operator: LogicalOperator, left: NodeId, right: NodeId) -> NodeId {
        self.alloc(Node::LogicalExpression {
            operator,
            left,
            right,
        })
    }

    pub fn unary(&mut self, operator: UnaryOperator, argument: NodeId) -> NodeId {
        self.alloc(Node::UnaryExpression { operator, argument })
    }

    pub fn array(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.alloc(Node::ArrayExpression { elements })
    }

    /// An object literal with `name = value` entries.
    pub fn object(&mut self, entries: Vec<(&str, NodeId)>) -> NodeId {
        let properties = entries
            .into_iter()
            .map(|(name, value)| {
                let key = self.ident(name);
                self.alloc(Node::Property {
                    key,
                    value,
                    computed: false,
                    shorthand: false,
                })
            })
            .collect();
        self.alloc(Node::ObjectExpression { properties })
    }

    /// `local name = init`
    pub fn local(&mut self, name: &str, init: Option<NodeId>) -> NodeId {
        let pattern = self.ident(name);
        self.alloc(Node::VariableDeclaration {
            declaration_kind: DeclarationKind::Let,
            declarations: vec![Declarator { pattern, init }],
        })
    }

    /// `local a, b`
    pub fn predeclare(&mut self, names: &[String]) -> NodeId {
        let declarations = names
            .iter()
            .map(|name| Declarator {
                pattern: self.ident(name.as_str()),
                init: None,
            })
            .collect();
        self.alloc(Node::VariableDeclaration {
            declaration_kind: DeclarationKind::Let,
            declarations,
        })
    }

    pub fn expr_stmt(&mut self, expression: NodeId) -> NodeId {
        self.alloc(Node::ExpressionStatement { expression })
    }

    /// `left = right` as a statement.
    pub fn assign(&mut self, left: NodeId, right: NodeId) -> NodeId {
        let expression = self.alloc(Node::AssignmentExpression { left, right });
        self.expr_stmt(expression)
    }

    /// `name = right` as a statement.
    pub fn assign_name(&mut self, name: &str, right: NodeId) -> NodeId {
        let left = self.ident(name);
        self.assign(left, right)
    }

    pub fn block(&mut self, statements: Vec<NodeId>) -> NodeId {
        self.alloc(Node::BlockStatement { statements })
    }

    pub fn if_(
        &mut self,
        test: NodeId,
        consequent: Vec<NodeId>,
        alternate: Option<Vec<NodeId>>,
    ) -> NodeId {
        let consequent = self.block(consequent);
        let alternate = alternate.map(|statements| self.block(statements));
        self.alloc(Node::IfStatement {
            test,
            consequent,
            alternate,
        })
    }

    pub fn ret(&mut self, arguments: Vec<NodeId>) -> NodeId {
        self.alloc(Node::ReturnStatement { arguments })
    }

    pub fn function_expr(&mut self, params: Vec<NodeId>, statements: Vec<NodeId>) -> NodeId {
        let body = self.block(statements);
        self.alloc(Node::FunctionExpression {
            id: None,
            params,
            body,
            is_async: false,
            is_generator: false,
        })
    }

    /// `local function name(params) statements end`
    pub fn function_decl(
        &mut self,
        name: &str,
        params: &[&str],
        statements: Vec<NodeId>,
    ) -> NodeId {
        let id = self.ident(name);
        let params = params.iter().map(|p| self.ident(*p)).collect();
        let body = self.block(statements);
        self.alloc(Node::FunctionDeclaration {
            id,
            params,
            body,
            is_async: false,
            is_generator: false,
        })
    }

    /// `(function() statements end)()`
    pub fn iife(&mut self, statements: Vec<NodeId>) -> NodeId {
        let function = self.function_expr(vec![], statements);
        self.call(function, vec![])
    }

    /// Parameter names as identifier nodes.
    pub fn params(&mut self, names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|name| self.ident(*name)).collect()
    }

    #[must_use]
    pub fn literal_kind(&self, id: NodeId) -> Option<LiteralKind> {
        match self.get(id) {
            Some(Node::Literal { literal_kind, .. }) => Some(*literal_kind),
            _ => None,
        }
    }

    #[must_use]
    pub fn identifier_name(&self, id: NodeId) -> Option<&str> {
        match self.get(id) {
            Some(Node::Identifier { name }) => Some(name),
            _ => None,
        }
    }
}
