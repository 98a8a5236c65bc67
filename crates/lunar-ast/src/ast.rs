//! Parse tree node types.
//!
//! The shape follows ESTree, the de-facto interchange format of JavaScript
//! parsers (acorn, espree, esprima, babel with the estree plugin). Every node is
//! a [`Node`]: a [`NodeKind`] payload plus the original `type` string and
//! whatever location data the producer attached.
//!
//! Node types this model does not know load as [`NodeKind::Unsupported`] with
//! the original type name preserved, so that validation can reject them with a
//! precise diagnostic instead of failing at load time.

use crate::span::{SourceLocation, Span};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// A parse tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// The ESTree `type` string, kept verbatim for diagnostics.
    pub type_name: String,
    pub loc: Option<SourceLocation>,
    pub span: Option<Span>,
}

impl Node {
    /// Create a node without location data.
    pub fn new(kind: NodeKind) -> Self {
        let type_name = kind.type_name().to_string();
        Self {
            kind,
            type_name,
            loc: None,
            span: None,
        }
    }

    #[must_use]
    pub fn with_loc(mut self, loc: SourceLocation) -> Self {
        self.loc = Some(loc);
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Decode a node from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, crate::LoadError> {
        let object = value.as_object().ok_or(crate::LoadError::NotAnObject)?;
        let type_name = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(crate::LoadError::MissingType)?
            .to_string();
        let loc = object
            .get("loc")
            .and_then(|loc| SourceLocation::deserialize(loc).ok());
        let span = span_of(object);

        let kind = serde_json::from_value::<NodeKind>(value).map_err(|source| {
            crate::LoadError::Shape {
                type_name: type_name.clone(),
                source,
            }
        })?;

        Ok(Self {
            kind,
            type_name,
            loc,
            span,
        })
    }

    /// The identifier name, if this node is an `Identifier`.
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Identifier { name } => Some(name),
            _ => None,
        }
    }

    pub fn is_identifier(&self, expected: &str) -> bool {
        self.as_identifier() == Some(expected)
    }

    /// For `a.b` (non-computed, non-optional) returns `("a", "b")`.
    pub fn static_member(&self) -> Option<(&str, &str)> {
        match &self.kind {
            NodeKind::MemberExpression {
                object,
                property,
                computed: false,
                ..
            } => Some((object.as_identifier()?, property.as_identifier()?)),
            _ => None,
        }
    }

    /// The string value of a string literal.
    pub fn as_string_literal(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Literal { value, regex: None, bigint: None, .. } => value.as_str(),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::FunctionDeclaration { .. }
                | NodeKind::FunctionExpression { .. }
                | NodeKind::ArrowFunctionExpression { .. }
        )
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        self.kind.for_each_child(&mut |child| out.push(child));
        out
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Node::from_value(value).map_err(serde::de::Error::custom)
    }
}

fn span_of(object: &Map<String, Value>) -> Option<Span> {
    let offset = |v: &Value| v.as_u64().and_then(|n| u32::try_from(n).ok());
    if let (Some(start), Some(end)) = (
        object.get("start").and_then(offset),
        object.get("end").and_then(offset),
    ) {
        return Some(Span::new(start, end));
    }
    let range = object.get("range")?.as_array()?;
    match range.as_slice() {
        [start, end] => Some(Span::new(offset(start)?, offset(end)?)),
        _ => None,
    }
}

// =============================================================================
// Operators
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum BinaryOperator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "===")]
    StrictEq,
    #[serde(rename = "!==")]
    StrictNotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<<")]
    Shl,
    #[serde(rename = ">>")]
    Shr,
    #[serde(rename = ">>>")]
    UShr,
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Mod,
    #[serde(rename = "**")]
    Pow,
    #[serde(rename = "|")]
    BitOr,
    #[serde(rename = "^")]
    BitXor,
    #[serde(rename = "&")]
    BitAnd,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "instanceof")]
    Instanceof,
}

impl BinaryOperator {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::StrictEq => "===",
            Self::StrictNotEq => "!==",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::UShr => ">>>",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::In => "in",
            Self::Instanceof => "instanceof",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum LogicalOperator {
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
    #[serde(rename = "??")]
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum UnaryOperator {
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "!")]
    Not,
    #[serde(rename = "~")]
    BitNot,
    #[serde(rename = "typeof")]
    Typeof,
    #[serde(rename = "void")]
    Void,
    #[serde(rename = "delete")]
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum UpdateOperator {
    #[serde(rename = "++")]
    Increment,
    #[serde(rename = "--")]
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AssignmentOperator {
    #[serde(rename = "=")]
    Assign,
    #[serde(rename = "+=")]
    AddAssign,
    #[serde(rename = "-=")]
    SubAssign,
    #[serde(rename = "*=")]
    MulAssign,
    #[serde(rename = "/=")]
    DivAssign,
    #[serde(rename = "%=")]
    ModAssign,
    #[serde(rename = "**=")]
    PowAssign,
    #[serde(rename = "<<=")]
    ShlAssign,
    #[serde(rename = ">>=")]
    ShrAssign,
    #[serde(rename = ">>>=")]
    UShrAssign,
    #[serde(rename = "|=")]
    BitOrAssign,
    #[serde(rename = "^=")]
    BitXorAssign,
    #[serde(rename = "&=")]
    BitAndAssign,
    #[serde(rename = "&&=")]
    AndAssign,
    #[serde(rename = "||=")]
    OrAssign,
    #[serde(rename = "??=")]
    NullishAssign,
}

impl AssignmentOperator {
    /// The binary operator a compound assignment applies, if it is arithmetic
    /// or bitwise.
    #[must_use]
    pub fn binary(&self) -> Option<BinaryOperator> {
        Some(match self {
            Self::AddAssign => BinaryOperator::Add,
            Self::SubAssign => BinaryOperator::Sub,
            Self::MulAssign => BinaryOperator::Mul,
            Self::DivAssign => BinaryOperator::Div,
            Self::ModAssign => BinaryOperator::Mod,
            Self::PowAssign => BinaryOperator::Pow,
            Self::ShlAssign => BinaryOperator::Shl,
            Self::ShrAssign => BinaryOperator::Shr,
            Self::UShrAssign => BinaryOperator::UShr,
            Self::BitOrAssign => BinaryOperator::BitOr,
            Self::BitXorAssign => BinaryOperator::BitXor,
            Self::BitAndAssign => BinaryOperator::BitAnd,
            Self::Assign | Self::AndAssign | Self::OrAssign | Self::NullishAssign => return None,
        })
    }
}

// =============================================================================
// Declarations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Script,
    Module,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    #[default]
    Init,
    Get,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Constructor,
    Method,
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegexLiteral {
    pub pattern: String,
    pub flags: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateValue {
    pub raw: String,
    #[serde(default)]
    pub cooked: Option<String>,
}

// =============================================================================
// Node kinds
// =============================================================================

/// Node payloads, keyed by the ESTree `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    // === Program & statements ===
    Program {
        body: Vec<Node>,
        #[serde(rename = "sourceType", default)]
        source_type: SourceType,
    },
    ExpressionStatement {
        expression: Box<Node>,
        #[serde(default)]
        directive: Option<String>,
    },
    BlockStatement {
        body: Vec<Node>,
    },
    EmptyStatement {},
    DebuggerStatement {},
    WithStatement {
        object: Box<Node>,
        body: Box<Node>,
    },
    ReturnStatement {
        #[serde(default)]
        argument: Option<Box<Node>>,
    },
    LabeledStatement {
        label: Box<Node>,
        body: Box<Node>,
    },
    BreakStatement {
        #[serde(default)]
        label: Option<Box<Node>>,
    },
    ContinueStatement {
        #[serde(default)]
        label: Option<Box<Node>>,
    },
    IfStatement {
        test: Box<Node>,
        consequent: Box<Node>,
        #[serde(default)]
        alternate: Option<Box<Node>>,
    },
    SwitchStatement {
        discriminant: Box<Node>,
        cases: Vec<Node>,
    },
    SwitchCase {
        #[serde(default)]
        test: Option<Box<Node>>,
        consequent: Vec<Node>,
    },
    ThrowStatement {
        argument: Box<Node>,
    },
    TryStatement {
        block: Box<Node>,
        #[serde(default)]
        handler: Option<Box<Node>>,
        #[serde(default)]
        finalizer: Option<Box<Node>>,
    },
    CatchClause {
        #[serde(default)]
        param: Option<Box<Node>>,
        body: Box<Node>,
    },
    WhileStatement {
        test: Box<Node>,
        body: Box<Node>,
    },
    DoWhileStatement {
        body: Box<Node>,
        test: Box<Node>,
    },
    ForStatement {
        #[serde(default)]
        init: Option<Box<Node>>,
        #[serde(default)]
        test: Option<Box<Node>>,
        #[serde(default)]
        update: Option<Box<Node>>,
        body: Box<Node>,
    },
    ForInStatement {
        left: Box<Node>,
        right: Box<Node>,
        body: Box<Node>,
    },
    ForOfStatement {
        left: Box<Node>,
        right: Box<Node>,
        body: Box<Node>,
        #[serde(rename = "await", default)]
        is_await: bool,
    },

    // === Declarations ===
    FunctionDeclaration {
        #[serde(default)]
        id: Option<Box<Node>>,
        params: Vec<Node>,
        body: Box<Node>,
        #[serde(default)]
        generator: bool,
        #[serde(rename = "async", default)]
        is_async: bool,
    },
    VariableDeclaration {
        declarations: Vec<Node>,
        kind: VariableKind,
    },
    VariableDeclarator {
        id: Box<Node>,
        #[serde(default)]
        init: Option<Box<Node>>,
    },
    ClassDeclaration {
        #[serde(default)]
        id: Option<Box<Node>>,
        #[serde(rename = "superClass", default)]
        super_class: Option<Box<Node>>,
        body: Box<Node>,
    },
    ClassBody {
        body: Vec<Node>,
    },
    MethodDefinition {
        key: Box<Node>,
        value: Box<Node>,
        kind: MethodKind,
        #[serde(default)]
        computed: bool,
        #[serde(rename = "static", default)]
        is_static: bool,
    },
    PropertyDefinition {
        key: Box<Node>,
        #[serde(default)]
        value: Option<Box<Node>>,
        #[serde(default)]
        computed: bool,
        #[serde(rename = "static", default)]
        is_static: bool,
    },
    StaticBlock {
        body: Vec<Node>,
    },

    // === Expressions ===
    Identifier {
        name: String,
    },
    PrivateIdentifier {
        name: String,
    },
    Literal {
        #[serde(default)]
        value: Value,
        #[serde(default)]
        raw: Option<String>,
        #[serde(default)]
        regex: Option<RegexLiteral>,
        #[serde(default)]
        bigint: Option<String>,
    },
    ThisExpression {},
    Super {},
    ArrayExpression {
        elements: Vec<Option<Node>>,
    },
    ObjectExpression {
        properties: Vec<Node>,
    },
    Property {
        key: Box<Node>,
        value: Box<Node>,
        #[serde(default)]
        kind: PropertyKind,
        #[serde(default)]
        method: bool,
        #[serde(default)]
        shorthand: bool,
        #[serde(default)]
        computed: bool,
    },
    FunctionExpression {
        #[serde(default)]
        id: Option<Box<Node>>,
        params: Vec<Node>,
        body: Box<Node>,
        #[serde(default)]
        generator: bool,
        #[serde(rename = "async", default)]
        is_async: bool,
    },
    ArrowFunctionExpression {
        params: Vec<Node>,
        body: Box<Node>,
        #[serde(default)]
        expression: bool,
        #[serde(rename = "async", default)]
        is_async: bool,
    },
    UnaryExpression {
        operator: UnaryOperator,
        #[serde(default = "default_true")]
        prefix: bool,
        argument: Box<Node>,
    },
    UpdateExpression {
        operator: UpdateOperator,
        prefix: bool,
        argument: Box<Node>,
    },
    BinaryExpression {
        operator: BinaryOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    LogicalExpression {
        operator: LogicalOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    AssignmentExpression {
        operator: AssignmentOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    MemberExpression {
        object: Box<Node>,
        property: Box<Node>,
        #[serde(default)]
        computed: bool,
        #[serde(default)]
        optional: bool,
    },
    ChainExpression {
        expression: Box<Node>,
    },
    ConditionalExpression {
        test: Box<Node>,
        consequent: Box<Node>,
        alternate: Box<Node>,
    },
    CallExpression {
        callee: Box<Node>,
        arguments: Vec<Node>,
        #[serde(default)]
        optional: bool,
    },
    NewExpression {
        callee: Box<Node>,
        #[serde(default)]
        arguments: Vec<Node>,
    },
    SequenceExpression {
        expressions: Vec<Node>,
    },
    YieldExpression {
        #[serde(default)]
        argument: Option<Box<Node>>,
        #[serde(default)]
        delegate: bool,
    },
    AwaitExpression {
        argument: Box<Node>,
    },
    TemplateLiteral {
        quasis: Vec<Node>,
        expressions: Vec<Node>,
    },
    TaggedTemplateExpression {
        tag: Box<Node>,
        quasi: Box<Node>,
    },
    TemplateElement {
        value: TemplateValue,
        #[serde(default)]
        tail: bool,
    },
    ClassExpression {
        #[serde(default)]
        id: Option<Box<Node>>,
        #[serde(rename = "superClass", default)]
        super_class: Option<Box<Node>>,
        body: Box<Node>,
    },
    MetaProperty {
        meta: Box<Node>,
        property: Box<Node>,
    },
    ImportExpression {
        source: Box<Node>,
    },
    SpreadElement {
        argument: Box<Node>,
    },

    // === Patterns ===
    ObjectPattern {
        properties: Vec<Node>,
    },
    ArrayPattern {
        elements: Vec<Option<Node>>,
    },
    RestElement {
        argument: Box<Node>,
    },
    AssignmentPattern {
        left: Box<Node>,
        right: Box<Node>,
    },

    /// Any node type not modelled above (module declarations, JSX, TypeScript
    /// annotations, future syntax). The original name lives in
    /// [`Node::type_name`].
    #[serde(other)]
    Unsupported,
}

fn default_true() -> bool {
    true
}

impl NodeKind {
    /// The ESTree type name of this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Program { .. } => "Program",
            Self::ExpressionStatement { .. } => "ExpressionStatement",
            Self::BlockStatement { .. } => "BlockStatement",
            Self::EmptyStatement {} => "EmptyStatement",
            Self::DebuggerStatement {} => "DebuggerStatement",
            Self::WithStatement { .. } => "WithStatement",
            Self::ReturnStatement { .. } => "ReturnStatement",
            Self::LabeledStatement { .. } => "LabeledStatement",
            Self::BreakStatement { .. } => "BreakStatement",
            Self::ContinueStatement { .. } => "ContinueStatement",
            Self::IfStatement { .. } => "IfStatement",
            Self::SwitchStatement { .. } => "SwitchStatement",
            Self::SwitchCase { .. } => "SwitchCase",
            Self::ThrowStatement { .. } => "ThrowStatement",
            Self::TryStatement { .. } => "TryStatement",
            Self::CatchClause { .. } => "CatchClause",
            Self::WhileStatement { .. } => "WhileStatement",
            Self::DoWhileStatement { .. } => "DoWhileStatement",
            Self::ForStatement { .. } => "ForStatement",
            Self::ForInStatement { .. } => "ForInStatement",
            Self::ForOfStatement { .. } => "ForOfStatement",
            Self::FunctionDeclaration { .. } => "FunctionDeclaration",
            Self::VariableDeclaration { .. } => "VariableDeclaration",
            Self::VariableDeclarator { .. } => "VariableDeclarator",
            Self::ClassDeclaration { .. } => "ClassDeclaration",
            Self::ClassBody { .. } => "ClassBody",
            Self::MethodDefinition { .. } => "MethodDefinition",
            Self::PropertyDefinition { .. } => "PropertyDefinition",
            Self::StaticBlock { .. } => "StaticBlock",
            Self::Identifier { .. } => "Identifier",
            Self::PrivateIdentifier { .. } => "PrivateIdentifier",
            Self::Literal { .. } => "Literal",
            Self::ThisExpression {} => "ThisExpression",
            Self::Super {} => "Super",
            Self::ArrayExpression { .. } => "ArrayExpression",
            Self::ObjectExpression { .. } => "ObjectExpression",
            Self::Property { .. } => "Property",
            Self::FunctionExpression { .. } => "FunctionExpression",
            Self::ArrowFunctionExpression { .. } => "ArrowFunctionExpression",
            Self::UnaryExpression { .. } => "UnaryExpression",
            Self::UpdateExpression { .. } => "UpdateExpression",
            Self::BinaryExpression { .. } => "BinaryExpression",
            Self::LogicalExpression { .. } => "LogicalExpression",
            Self::AssignmentExpression { .. } => "AssignmentExpression",
            Self::MemberExpression { .. } => "MemberExpression",
            Self::ChainExpression { .. } => "ChainExpression",
            Self::ConditionalExpression { .. } => "ConditionalExpression",
            Self::CallExpression { .. } => "CallExpression",
            Self::NewExpression { .. } => "NewExpression",
            Self::SequenceExpression { .. } => "SequenceExpression",
            Self::YieldExpression { .. } => "YieldExpression",
            Self::AwaitExpression { .. } => "AwaitExpression",
            Self::TemplateLiteral { .. } => "TemplateLiteral",
            Self::TaggedTemplateExpression { .. } => "TaggedTemplateExpression",
            Self::TemplateElement { .. } => "TemplateElement",
            Self::ClassExpression { .. } => "ClassExpression",
            Self::MetaProperty { .. } => "MetaProperty",
            Self::ImportExpression { .. } => "ImportExpression",
            Self::SpreadElement { .. } => "SpreadElement",
            Self::ObjectPattern { .. } => "ObjectPattern",
            Self::ArrayPattern { .. } => "ArrayPattern",
            Self::RestElement { .. } => "RestElement",
            Self::AssignmentPattern { .. } => "AssignmentPattern",
            Self::Unsupported => "Unsupported",
        }
    }

    /// Visit direct children in source order.
    pub fn for_each_child<'a>(&'a self, f: &mut dyn FnMut(&'a Node)) {
        fn each<'a>(nodes: &'a [Node], f: &mut dyn FnMut(&'a Node)) {
            nodes.iter().for_each(|n| f(n));
        }
        fn opt<'a>(node: &'a Option<Box<Node>>, f: &mut dyn FnMut(&'a Node)) {
            if let Some(node) = node {
                f(node);
            }
        }

        match self {
            Self::Program { body, .. }
            | Self::BlockStatement { body }
            | Self::ClassBody { body }
            | Self::StaticBlock { body } => each(body, f),
            Self::ExpressionStatement { expression, .. } | Self::ChainExpression { expression } => {
                f(expression);
            }
            Self::WithStatement { object, body } => {
                f(object);
                f(body);
            }
            Self::ReturnStatement { argument } | Self::YieldExpression { argument, .. } => {
                opt(argument, f);
            }
            Self::LabeledStatement { label, body } => {
                f(label);
                f(body);
            }
            Self::BreakStatement { label } | Self::ContinueStatement { label } => opt(label, f),
            Self::IfStatement {
                test,
                consequent,
                alternate,
            } => {
                f(test);
                f(consequent);
                opt(alternate, f);
            }
            Self::SwitchStatement {
                discriminant,
                cases,
            } => {
                f(discriminant);
                each(cases, f);
            }
            Self::SwitchCase { test, consequent } => {
                opt(test, f);
                each(consequent, f);
            }
            Self::ThrowStatement { argument }
            | Self::AwaitExpression { argument }
            | Self::SpreadElement { argument }
            | Self::RestElement { argument }
            | Self::UnaryExpression { argument, .. }
            | Self::UpdateExpression { argument, .. } => f(argument),
            Self::TryStatement {
                block,
                handler,
                finalizer,
            } => {
                f(block);
                opt(handler, f);
                opt(finalizer, f);
            }
            Self::CatchClause { param, body } => {
                opt(param, f);
                f(body);
            }
            Self::WhileStatement { test, body } => {
                f(test);
                f(body);
            }
            Self::DoWhileStatement { body, test } => {
                f(body);
                f(test);
            }
            Self::ForStatement {
                init,
                test,
                update,
                body,
            } => {
                opt(init, f);
                opt(test, f);
                opt(update, f);
                f(body);
            }
            Self::ForInStatement { left, right, body }
            | Self::ForOfStatement {
                left, right, body, ..
            } => {
                f(left);
                f(right);
                f(body);
            }
            Self::FunctionDeclaration { id, params, body, .. }
            | Self::FunctionExpression { id, params, body, .. } => {
                opt(id, f);
                each(params, f);
                f(body);
            }
            Self::ArrowFunctionExpression { params, body, .. } => {
                each(params, f);
                f(body);
            }
            Self::VariableDeclaration { declarations, .. } => each(declarations, f),
            Self::VariableDeclarator { id, init } => {
                f(id);
                opt(init, f);
            }
            Self::ClassDeclaration {
                id,
                super_class,
                body,
            }
            | Self::ClassExpression {
                id,
                super_class,
                body,
            } => {
                opt(id, f);
                opt(super_class, f);
                f(body);
            }
            Self::MethodDefinition { key, value, .. } | Self::Property { key, value, .. } => {
                f(key);
                f(value);
            }
            Self::PropertyDefinition { key, value, .. } => {
                f(key);
                opt(value, f);
            }
            Self::ArrayExpression { elements } | Self::ArrayPattern { elements } => {
                elements.iter().flatten().for_each(|n| f(n));
            }
            Self::ObjectExpression { properties } | Self::ObjectPattern { properties } => {
                each(properties, f);
            }
            Self::BinaryExpression { left, right, .. }
            | Self::LogicalExpression { left, right, .. }
            | Self::AssignmentExpression { left, right, .. }
            | Self::AssignmentPattern { left, right } => {
                f(left);
                f(right);
            }
            Self::MemberExpression {
                object, property, ..
            } => {
                f(object);
                f(property);
            }
            Self::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                f(test);
                f(consequent);
                f(alternate);
            }
            Self::CallExpression {
                callee, arguments, ..
            }
            | Self::NewExpression { callee, arguments } => {
                f(callee);
                each(arguments, f);
            }
            Self::SequenceExpression { expressions } => each(expressions, f),
            Self::TemplateLiteral {
                quasis,
                expressions,
            } => {
                each(quasis, f);
                each(expressions, f);
            }
            Self::TaggedTemplateExpression { tag, quasi } => {
                f(tag);
                f(quasi);
            }
            Self::MetaProperty { meta, property } => {
                f(meta);
                f(property);
            }
            Self::ImportExpression { source } => f(source),
            Self::EmptyStatement {}
            | Self::DebuggerStatement {}
            | Self::Identifier { .. }
            | Self::PrivateIdentifier { .. }
            | Self::Literal { .. }
            | Self::ThisExpression {}
            | Self::Super {}
            | Self::TemplateElement { .. }
            | Self::Unsupported => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(json: &str) -> Node {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_identifier_with_locations() {
        let node = load(
            r#"{"type":"Identifier","name":"x","start":4,"end":5,
                "loc":{"start":{"line":1,"column":4},"end":{"line":1,"column":5}}}"#,
        );
        assert_eq!(node.as_identifier(), Some("x"));
        assert_eq!(node.span, Some(Span::new(4, 5)));
        assert_eq!(node.loc.unwrap().start.column, 4);
    }

    #[test]
    fn test_range_offsets() {
        let node = load(r#"{"type":"ThisExpression","range":[10,14]}"#);
        assert_eq!(node.span, Some(Span::new(10, 14)));
        assert_eq!(node.type_name, "ThisExpression");
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let node = load(
            r#"{"type":"ImportDeclaration","specifiers":[],"source":{"type":"Literal","value":"x"}}"#,
        );
        assert_eq!(node.kind, NodeKind::Unsupported);
        assert_eq!(node.type_name, "ImportDeclaration");
    }

    #[test]
    fn test_operators_and_flags() {
        let node = load(
            r#"{"type":"BinaryExpression","operator":"===",
                "left":{"type":"Identifier","name":"a"},
                "right":{"type":"Literal","value":1,"raw":"1"}}"#,
        );
        match node.kind {
            NodeKind::BinaryExpression { operator, right, .. } => {
                assert_eq!(operator, BinaryOperator::StrictEq);
                assert!(matches!(right.kind, NodeKind::Literal { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }

        let node = load(
            r#"{"type":"FunctionExpression","id":null,"params":[],"async":true,"generator":false,
                "body":{"type":"BlockStatement","body":[]}}"#,
        );
        assert!(matches!(node.kind, NodeKind::FunctionExpression { is_async: true, .. }));
    }

    #[test]
    fn test_malformed_node_reports_type() {
        let err = Node::from_value(serde_json::json!({"type": "IfStatement"})).unwrap_err();
        assert!(err.to_string().contains("IfStatement"));
    }

    #[test]
    fn test_children_in_source_order() {
        let node = load(
            r#"{"type":"IfStatement",
                "test":{"type":"Identifier","name":"a"},
                "consequent":{"type":"EmptyStatement"},
                "alternate":{"type":"DebuggerStatement"}}"#,
        );
        let names: Vec<&str> = node.children().iter().map(|c| c.type_name.as_str()).collect();
        assert_eq!(names, ["Identifier", "EmptyStatement", "DebuggerStatement"]);
    }

    #[test]
    fn test_static_member() {
        let node = load(
            r#"{"type":"MemberExpression","computed":false,
                "object":{"type":"Identifier","name":"Math"},
                "property":{"type":"Identifier","name":"floor"}}"#,
        );
        assert_eq!(node.static_member(), Some(("Math", "floor")));
    }
}
