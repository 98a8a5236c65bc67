//! Programmatic parse tree construction.
//!
//! Tests and tree fuzzers build inputs with these helpers instead of going
//! through a parser. Every helper produces a node without location data.

use crate::ast::{
    AssignmentOperator, BinaryOperator, LogicalOperator, MethodKind, Node, NodeKind,
    PropertyKind, RegexLiteral, TemplateValue, UnaryOperator, UpdateOperator, VariableKind,
};
use crate::Program;
use serde_json::Value;

fn node(kind: NodeKind) -> Node {
    Node::new(kind)
}

fn boxed(kind: NodeKind) -> Box<Node> {
    Box::new(Node::new(kind))
}

fn block_box(body: Vec<Node>) -> Box<Node> {
    boxed(NodeKind::BlockStatement { body })
}

pub fn program(body: Vec<Node>) -> Program {
    Program::new(body)
}

pub fn unsupported(type_name: &str) -> Node {
    Node {
        type_name: type_name.to_string(),
        ..Node::new(NodeKind::Unsupported)
    }
}

// =============================================================================
// Literals & identifiers
// =============================================================================

pub fn ident(name: &str) -> Node {
    node(NodeKind::Identifier {
        name: name.to_string(),
    })
}

pub fn private_ident(name: &str) -> Node {
    node(NodeKind::PrivateIdentifier {
        name: name.to_string(),
    })
}

fn literal(value: Value, raw: String) -> Node {
    node(NodeKind::Literal {
        value,
        raw: Some(raw),
        regex: None,
        bigint: None,
    })
}

pub fn num(n: f64) -> Node {
    literal(Value::from(n), format!("{n}"))
}

pub fn string(s: &str) -> Node {
    literal(Value::from(s), format!("{s:?}"))
}

pub fn boolean(b: bool) -> Node {
    literal(Value::from(b), b.to_string())
}

pub fn null() -> Node {
    literal(Value::Null, "null".to_string())
}

pub fn regex(pattern: &str, flags: &str) -> Node {
    node(NodeKind::Literal {
        value: Value::Null,
        raw: Some(format!("/{pattern}/{flags}")),
        regex: Some(RegexLiteral {
            pattern: pattern.to_string(),
            flags: flags.to_string(),
        }),
        bigint: None,
    })
}

pub fn bigint(digits: &str) -> Node {
    node(NodeKind::Literal {
        value: Value::Null,
        raw: Some(format!("{digits}n")),
        regex: None,
        bigint: Some(digits.to_string()),
    })
}

pub fn this() -> Node {
    node(NodeKind::ThisExpression {})
}

pub fn super_() -> Node {
    node(NodeKind::Super {})
}

pub fn template(quasis: &[&str], expressions: Vec<Node>) -> Node {
    let last = quasis.len().saturating_sub(1);
    let quasis = quasis
        .iter()
        .enumerate()
        .map(|(i, text)| {
            node(NodeKind::TemplateElement {
                value: TemplateValue {
                    raw: (*text).to_string(),
                    cooked: Some((*text).to_string()),
                },
                tail: i == last,
            })
        })
        .collect();
    node(NodeKind::TemplateLiteral {
        quasis,
        expressions,
    })
}

pub fn tagged_template(tag: Node, quasi: Node) -> Node {
    node(NodeKind::TaggedTemplateExpression {
        tag: Box::new(tag),
        quasi: Box::new(quasi),
    })
}

// =============================================================================
// Expressions
// =============================================================================

pub fn array(elements: Vec<Node>) -> Node {
    node(NodeKind::ArrayExpression {
        elements: elements.into_iter().map(Some).collect(),
    })
}

pub fn array_with_holes(elements: Vec<Option<Node>>) -> Node {
    node(NodeKind::ArrayExpression { elements })
}

pub fn object(properties: Vec<Node>) -> Node {
    node(NodeKind::ObjectExpression { properties })
}

/// `key: value`
pub fn prop(key: &str, value: Node) -> Node {
    node(NodeKind::Property {
        key: Box::new(ident(key)),
        value: Box::new(value),
        kind: PropertyKind::Init,
        method: false,
        shorthand: false,
        computed: false,
    })
}

/// `[key]: value`
pub fn computed_prop(key: Node, value: Node) -> Node {
    node(NodeKind::Property {
        key: Box::new(key),
        value: Box::new(value),
        kind: PropertyKind::Init,
        method: false,
        shorthand: false,
        computed: true,
    })
}

/// `{ name }` in either an object literal or an object pattern.
pub fn shorthand(name: &str) -> Node {
    node(NodeKind::Property {
        key: Box::new(ident(name)),
        value: Box::new(ident(name)),
        kind: PropertyKind::Init,
        method: false,
        shorthand: true,
        computed: false,
    })
}

/// `get key() {}` / `set key(v) {}` inside an object literal.
pub fn accessor_prop(kind: PropertyKind, key: &str, params: Vec<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::Property {
        key: Box::new(ident(key)),
        value: Box::new(function_expr(params, body)),
        kind,
        method: false,
        shorthand: false,
        computed: false,
    })
}

/// `name(params) { body }` inside an object literal.
pub fn method_prop(key: &str, params: Vec<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::Property {
        key: Box::new(ident(key)),
        value: Box::new(function_expr(params, body)),
        kind: PropertyKind::Init,
        method: true,
        shorthand: false,
        computed: false,
    })
}

pub fn spread(argument: Node) -> Node {
    node(NodeKind::SpreadElement {
        argument: Box::new(argument),
    })
}

pub fn member(object: Node, property: &str) -> Node {
    node(NodeKind::MemberExpression {
        object: Box::new(object),
        property: Box::new(ident(property)),
        computed: false,
        optional: false,
    })
}

pub fn optional_member(object: Node, property: &str) -> Node {
    node(NodeKind::MemberExpression {
        object: Box::new(object),
        property: Box::new(ident(property)),
        computed: false,
        optional: true,
    })
}

pub fn index(object: Node, key: Node) -> Node {
    node(NodeKind::MemberExpression {
        object: Box::new(object),
        property: Box::new(key),
        computed: true,
        optional: false,
    })
}

pub fn chain(expression: Node) -> Node {
    node(NodeKind::ChainExpression {
        expression: Box::new(expression),
    })
}

pub fn call(callee: Node, arguments: Vec<Node>) -> Node {
    node(NodeKind::CallExpression {
        callee: Box::new(callee),
        arguments,
        optional: false,
    })
}

pub fn optional_call(callee: Node, arguments: Vec<Node>) -> Node {
    node(NodeKind::CallExpression {
        callee: Box::new(callee),
        arguments,
        optional: true,
    })
}

/// `callee.method(args)`
pub fn method_call(object: Node, method: &str, arguments: Vec<Node>) -> Node {
    call(member(object, method), arguments)
}

pub fn new_(callee: Node, arguments: Vec<Node>) -> Node {
    node(NodeKind::NewExpression {
        callee: Box::new(callee),
        arguments,
    })
}

pub fn binary(operator: BinaryOperator, left: Node, right: Node) -> Node {
    node(NodeKind::BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn logical(operator: LogicalOperator, left: Node, right: Node) -> Node {
    node(NodeKind::LogicalExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn unary(operator: UnaryOperator, argument: Node) -> Node {
    node(NodeKind::UnaryExpression {
        operator,
        prefix: true,
        argument: Box::new(argument),
    })
}

pub fn update(operator: UpdateOperator, prefix: bool, argument: Node) -> Node {
    node(NodeKind::UpdateExpression {
        operator,
        prefix,
        argument: Box::new(argument),
    })
}

pub fn assign(operator: AssignmentOperator, left: Node, right: Node) -> Node {
    node(NodeKind::AssignmentExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn conditional(test: Node, consequent: Node, alternate: Node) -> Node {
    node(NodeKind::ConditionalExpression {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    })
}

pub fn sequence(expressions: Vec<Node>) -> Node {
    node(NodeKind::SequenceExpression { expressions })
}

pub fn yield_(argument: Option<Node>, delegate: bool) -> Node {
    node(NodeKind::YieldExpression {
        argument: argument.map(Box::new),
        delegate,
    })
}

pub fn await_(argument: Node) -> Node {
    node(NodeKind::AwaitExpression {
        argument: Box::new(argument),
    })
}

pub fn meta_property(meta: &str, property: &str) -> Node {
    node(NodeKind::MetaProperty {
        meta: Box::new(ident(meta)),
        property: Box::new(ident(property)),
    })
}

pub fn import_expr(source: Node) -> Node {
    node(NodeKind::ImportExpression {
        source: Box::new(source),
    })
}

// =============================================================================
// Functions & classes
// =============================================================================

pub fn function_decl(name: &str, params: Vec<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::FunctionDeclaration {
        id: Some(Box::new(ident(name))),
        params,
        body: block_box(body),
        generator: false,
        is_async: false,
    })
}

pub fn generator_decl(name: &str, params: Vec<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::FunctionDeclaration {
        id: Some(Box::new(ident(name))),
        params,
        body: block_box(body),
        generator: true,
        is_async: false,
    })
}

pub fn async_decl(name: &str, params: Vec<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::FunctionDeclaration {
        id: Some(Box::new(ident(name))),
        params,
        body: block_box(body),
        generator: false,
        is_async: true,
    })
}

pub fn function_expr(params: Vec<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::FunctionExpression {
        id: None,
        params,
        body: block_box(body),
        generator: false,
        is_async: false,
    })
}

pub fn async_function_expr(params: Vec<Node>, body: Vec<Node>, generator: bool) -> Node {
    node(NodeKind::FunctionExpression {
        id: None,
        params,
        body: block_box(body),
        generator,
        is_async: true,
    })
}

/// Arrow function with a block body.
pub fn arrow(params: Vec<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::ArrowFunctionExpression {
        params,
        body: block_box(body),
        expression: false,
        is_async: false,
    })
}

/// Arrow function with an expression body.
pub fn arrow_expr(params: Vec<Node>, body: Node) -> Node {
    node(NodeKind::ArrowFunctionExpression {
        params,
        body: Box::new(body),
        expression: true,
        is_async: false,
    })
}

pub fn async_arrow(params: Vec<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::ArrowFunctionExpression {
        params,
        body: block_box(body),
        expression: false,
        is_async: true,
    })
}

fn class_body(members: Vec<Node>) -> Box<Node> {
    boxed(NodeKind::ClassBody { body: members })
}

pub fn class_decl(name: &str, super_class: Option<Node>, members: Vec<Node>) -> Node {
    node(NodeKind::ClassDeclaration {
        id: Some(Box::new(ident(name))),
        super_class: super_class.map(Box::new),
        body: class_body(members),
    })
}

pub fn class_expr(name: Option<&str>, super_class: Option<Node>, members: Vec<Node>) -> Node {
    node(NodeKind::ClassExpression {
        id: name.map(|n| Box::new(ident(n))),
        super_class: super_class.map(Box::new),
        body: class_body(members),
    })
}

pub fn method(kind: MethodKind, name: &str, params: Vec<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::MethodDefinition {
        key: Box::new(ident(name)),
        value: Box::new(function_expr(params, body)),
        kind,
        computed: false,
        is_static: false,
    })
}

pub fn static_method(name: &str, params: Vec<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::MethodDefinition {
        key: Box::new(ident(name)),
        value: Box::new(function_expr(params, body)),
        kind: MethodKind::Method,
        computed: false,
        is_static: true,
    })
}

/// A method whose function value is supplied directly (generator or async
/// methods).
pub fn method_with(kind: MethodKind, name: &str, value: Node, is_static: bool) -> Node {
    node(NodeKind::MethodDefinition {
        key: Box::new(ident(name)),
        value: Box::new(value),
        kind,
        computed: false,
        is_static,
    })
}

pub fn field(name: &str, value: Option<Node>, is_static: bool) -> Node {
    node(NodeKind::PropertyDefinition {
        key: Box::new(ident(name)),
        value: value.map(Box::new),
        computed: false,
        is_static,
    })
}

pub fn static_block(body: Vec<Node>) -> Node {
    node(NodeKind::StaticBlock { body })
}

// =============================================================================
// Patterns
// =============================================================================

pub fn object_pattern(properties: Vec<Node>) -> Node {
    node(NodeKind::ObjectPattern { properties })
}

/// `key: value` inside an object pattern.
pub fn pattern_prop(key: &str, value: Node) -> Node {
    prop(key, value)
}

pub fn array_pattern(elements: Vec<Option<Node>>) -> Node {
    node(NodeKind::ArrayPattern { elements })
}

pub fn rest(argument: Node) -> Node {
    node(NodeKind::RestElement {
        argument: Box::new(argument),
    })
}

/// `left = right` in a binding position.
pub fn default(left: Node, right: Node) -> Node {
    node(NodeKind::AssignmentPattern {
        left: Box::new(left),
        right: Box::new(right),
    })
}

// =============================================================================
// Statements
// =============================================================================

pub fn expr_stmt(expression: Node) -> Node {
    node(NodeKind::ExpressionStatement {
        expression: Box::new(expression),
        directive: None,
    })
}

pub fn block(body: Vec<Node>) -> Node {
    node(NodeKind::BlockStatement { body })
}

pub fn empty() -> Node {
    node(NodeKind::EmptyStatement {})
}

pub fn var_decl(kind: VariableKind, pattern: Node, init: Option<Node>) -> Node {
    declarations(kind, vec![(pattern, init)])
}

pub fn declarations(kind: VariableKind, pairs: Vec<(Node, Option<Node>)>) -> Node {
    let declarations = pairs
        .into_iter()
        .map(|(id, init)| {
            node(NodeKind::VariableDeclarator {
                id: Box::new(id),
                init: init.map(Box::new),
            })
        })
        .collect();
    node(NodeKind::VariableDeclaration { declarations, kind })
}

pub fn const_(name: &str, init: Node) -> Node {
    var_decl(VariableKind::Const, ident(name), Some(init))
}

pub fn let_(name: &str, init: Option<Node>) -> Node {
    var_decl(VariableKind::Let, ident(name), init)
}

pub fn var(name: &str, init: Option<Node>) -> Node {
    var_decl(VariableKind::Var, ident(name), init)
}

pub fn ret(argument: Option<Node>) -> Node {
    node(NodeKind::ReturnStatement {
        argument: argument.map(Box::new),
    })
}

pub fn throw(argument: Node) -> Node {
    node(NodeKind::ThrowStatement {
        argument: Box::new(argument),
    })
}

pub fn if_(test: Node, consequent: Vec<Node>, alternate: Option<Vec<Node>>) -> Node {
    node(NodeKind::IfStatement {
        test: Box::new(test),
        consequent: block_box(consequent),
        alternate: alternate.map(block_box),
    })
}

/// `if` whose `else` branch is another statement (for `else if` chains).
pub fn if_else(test: Node, consequent: Vec<Node>, alternate: Node) -> Node {
    node(NodeKind::IfStatement {
        test: Box::new(test),
        consequent: block_box(consequent),
        alternate: Some(Box::new(alternate)),
    })
}

pub fn while_(test: Node, body: Vec<Node>) -> Node {
    node(NodeKind::WhileStatement {
        test: Box::new(test),
        body: block_box(body),
    })
}

pub fn do_while(body: Vec<Node>, test: Node) -> Node {
    node(NodeKind::DoWhileStatement {
        body: block_box(body),
        test: Box::new(test),
    })
}

pub fn for_(init: Option<Node>, test: Option<Node>, update: Option<Node>, body: Vec<Node>) -> Node {
    node(NodeKind::ForStatement {
        init: init.map(Box::new),
        test: test.map(Box::new),
        update: update.map(Box::new),
        body: block_box(body),
    })
}

/// `for (<kind> <pattern> of right)`
pub fn for_of(kind: VariableKind, pattern: Node, right: Node, body: Vec<Node>) -> Node {
    node(NodeKind::ForOfStatement {
        left: Box::new(var_decl(kind, pattern, None)),
        right: Box::new(right),
        body: block_box(body),
        is_await: false,
    })
}

pub fn for_await(kind: VariableKind, pattern: Node, right: Node, body: Vec<Node>) -> Node {
    node(NodeKind::ForOfStatement {
        left: Box::new(var_decl(kind, pattern, None)),
        right: Box::new(right),
        body: block_box(body),
        is_await: true,
    })
}

pub fn for_in(kind: VariableKind, name: &str, right: Node, body: Vec<Node>) -> Node {
    node(NodeKind::ForInStatement {
        left: Box::new(var_decl(kind, ident(name), None)),
        right: Box::new(right),
        body: block_box(body),
    })
}

pub fn break_(label: Option<&str>) -> Node {
    node(NodeKind::BreakStatement {
        label: label.map(|l| Box::new(ident(l))),
    })
}

pub fn continue_(label: Option<&str>) -> Node {
    node(NodeKind::ContinueStatement {
        label: label.map(|l| Box::new(ident(l))),
    })
}

pub fn labeled(label: &str, body: Node) -> Node {
    node(NodeKind::LabeledStatement {
        label: Box::new(ident(label)),
        body: Box::new(body),
    })
}

pub fn switch(discriminant: Node, cases: Vec<Node>) -> Node {
    node(NodeKind::SwitchStatement {
        discriminant: Box::new(discriminant),
        cases,
    })
}

/// `case test:` or, with `None`, `default:`.
pub fn case(test: Option<Node>, consequent: Vec<Node>) -> Node {
    node(NodeKind::SwitchCase {
        test: test.map(Box::new),
        consequent,
    })
}

pub fn try_(
    block: Vec<Node>,
    handler: Option<(Option<Node>, Vec<Node>)>,
    finalizer: Option<Vec<Node>>,
) -> Node {
    let handler = handler.map(|(param, body)| {
        boxed(NodeKind::CatchClause {
            param: param.map(Box::new),
            body: block_box(body),
        })
    });
    node(NodeKind::TryStatement {
        block: block_box(block),
        handler,
        finalizer: finalizer.map(block_box),
    })
}

pub fn with_(object: Node, body: Vec<Node>) -> Node {
    node(NodeKind::WithStatement {
        object: Box::new(object),
        body: block_box(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_follow_kind() {
        assert_eq!(ident("x").type_name, "Identifier");
        assert_eq!(
            for_of(VariableKind::Const, ident("x"), ident("xs"), vec![]).type_name,
            "ForOfStatement"
        );
        assert_eq!(unsupported("ExportNamedDeclaration").type_name, "ExportNamedDeclaration");
    }

    #[test]
    fn test_template_marks_tail() {
        let node = template(&["a", "b"], vec![ident("x")]);
        match node.kind {
            NodeKind::TemplateLiteral { quasis, expressions } => {
                assert_eq!(expressions.len(), 1);
                assert!(matches!(quasis[1].kind, NodeKind::TemplateElement { tail: true, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_string_literal_roundtrip() {
        assert_eq!(string("hi").as_string_literal(), Some("hi"));
        assert_eq!(num(1.0).as_string_literal(), None);
    }
}
