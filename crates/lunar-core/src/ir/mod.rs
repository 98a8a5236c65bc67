//! Flat, id-indexed intermediate representation.
//!
//! An [`Arena`] maps [`NodeId`]s to [`Node`]s and lists the top-level
//! statements in `moduleBody`. Nodes refer to each other only through ids,
//! which are assigned by a monotonic counter during lowering. Two lowerings of
//! the same tree therefore produce identical arenas, and the canonical JSON
//! form can be stored as a golden fixture and diffed byte for byte.
//!
//! Every node kind has exactly one shape: `Option` fields serialize as `null`
//! instead of being omitted, so all nodes of a kind carry the same key set.

mod build;

use crate::error::ArenaLoadError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a node in an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[cfg(test)]
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Node payload enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralKind {
    String,
    Number,
    Boolean,
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

impl LiteralValue {
    #[must_use]
    pub fn kind(&self) -> LiteralKind {
        match self {
            Self::Null => LiteralKind::Null,
            Self::Boolean(_) => LiteralKind::Boolean,
            Self::Number(_) => LiteralKind::Number,
            Self::String(_) => LiteralKind::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnaryOperator {
    Not,
    Neg,
    Len,
    BitNot,
}

/// Source declaration keyword, kept for provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Const,
    Let,
    Var,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MethodKind {
    Constructor,
    Method,
    Get,
    Set,
    StaticMethod,
}

/// How a `for-of` loop walks its iterable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Iteration {
    /// Sequential positional elements of a sequence.
    Positional,
    /// Through the iteration adapter, which also accepts generator objects.
    Protocol,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declarator {
    pub pattern: NodeId,
    pub init: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// Values routed to this body. Empty for the default case.
    pub tests: Vec<NodeId>,
    pub consequent: Vec<NodeId>,
}

// =============================================================================
// Nodes
// =============================================================================

/// An IR node. The `kind` tag is the variant name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Node {
    // === Expressions ===
    Literal {
        #[serde(rename = "literalKind")]
        literal_kind: LiteralKind,
        value: LiteralValue,
        raw: String,
    },
    Identifier {
        name: String,
    },
    /// The variadic argument list of the enclosing function.
    VarArgs,
    ThisExpression,
    Super,
    TemplateLiteral {
        quasis: Vec<String>,
        expressions: Vec<NodeId>,
    },
    BinaryExpression {
        operator: BinaryOperator,
        left: NodeId,
        right: NodeId,
    },
    LogicalExpression {
        operator: LogicalOperator,
        left: NodeId,
        right: NodeId,
    },
    UnaryExpression {
        operator: UnaryOperator,
        argument: NodeId,
    },
    /// Only valid as the expression of an `ExpressionStatement`.
    AssignmentExpression {
        left: NodeId,
        right: NodeId,
    },
    ArrayExpression {
        elements: Vec<NodeId>,
    },
    ObjectExpression {
        properties: Vec<NodeId>,
    },
    Property {
        key: NodeId,
        value: NodeId,
        computed: bool,
        shorthand: bool,
    },
    MemberExpression {
        object: NodeId,
        property: NodeId,
        computed: bool,
    },
    CallExpression {
        callee: NodeId,
        arguments: Vec<NodeId>,
        /// Pass the callee's object as the receiver (`obj:name(...)`).
        method: bool,
    },
    FunctionExpression {
        id: Option<NodeId>,
        params: Vec<NodeId>,
        body: NodeId,
        #[serde(rename = "isAsync")]
        is_async: bool,
        #[serde(rename = "isGenerator")]
        is_generator: bool,
    },
    ArrowFunctionExpression {
        params: Vec<NodeId>,
        body: NodeId,
        #[serde(rename = "isAsync")]
        is_async: bool,
        #[serde(rename = "isGenerator")]
        is_generator: bool,
    },
    ClassExpression {
        id: NodeId,
        #[serde(rename = "superClass")]
        super_class: Option<NodeId>,
        body: Vec<NodeId>,
        #[serde(rename = "staticFields")]
        static_fields: Vec<NodeId>,
    },
    SpreadElement {
        argument: NodeId,
    },
    AwaitExpression {
        argument: NodeId,
    },
    YieldExpression {
        argument: Option<NodeId>,
        delegate: bool,
    },

    // === Patterns ===
    ArrayPattern {
        elements: Vec<Option<NodeId>>,
    },
    ObjectPattern {
        properties: Vec<NodeId>,
    },
    RestElement {
        argument: NodeId,
    },

    // === Class members ===
    MethodDefinition {
        #[serde(rename = "methodKind")]
        kind: MethodKind,
        key: NodeId,
        computed: bool,
        value: NodeId,
    },

    // === Statements ===
    VariableDeclaration {
        #[serde(rename = "declarationKind")]
        declaration_kind: DeclarationKind,
        declarations: Vec<Declarator>,
    },
    FunctionDeclaration {
        id: NodeId,
        params: Vec<NodeId>,
        body: NodeId,
        #[serde(rename = "isAsync")]
        is_async: bool,
        #[serde(rename = "isGenerator")]
        is_generator: bool,
    },
    ClassDeclaration {
        id: NodeId,
        #[serde(rename = "superClass")]
        super_class: Option<NodeId>,
        body: Vec<NodeId>,
        #[serde(rename = "staticFields")]
        static_fields: Vec<NodeId>,
    },
    BlockStatement {
        statements: Vec<NodeId>,
    },
    ExpressionStatement {
        expression: NodeId,
    },
    IfStatement {
        test: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    },
    WhileStatement {
        test: NodeId,
        body: NodeId,
        #[serde(rename = "continueLabel")]
        continue_label: Option<String>,
    },
    DoWhileStatement {
        body: NodeId,
        test: NodeId,
        #[serde(rename = "continueLabel")]
        continue_label: Option<String>,
    },
    ForStatement {
        init: Option<NodeId>,
        test: Option<NodeId>,
        update: Option<NodeId>,
        body: NodeId,
        #[serde(rename = "continueLabel")]
        continue_label: Option<String>,
    },
    ForOfStatement {
        left: NodeId,
        right: NodeId,
        body: NodeId,
        iteration: Iteration,
        #[serde(rename = "continueLabel")]
        continue_label: Option<String>,
    },
    ForInStatement {
        left: NodeId,
        right: NodeId,
        body: NodeId,
        #[serde(rename = "continueLabel")]
        continue_label: Option<String>,
    },
    SwitchStatement {
        discriminant: NodeId,
        cases: Vec<SwitchCase>,
    },
    TryStatement {
        block: NodeId,
        handler: Option<NodeId>,
        finalizer: Option<NodeId>,
        /// Re-issues exits signalled from inside the protected region.
        completion: Option<NodeId>,
    },
    CatchClause {
        param: Option<NodeId>,
        body: NodeId,
    },
    ThrowStatement {
        argument: NodeId,
    },
    ReturnStatement {
        arguments: Vec<NodeId>,
    },
    BreakStatement {
        label: Option<String>,
    },
    ContinueStatement {
        label: String,
    },
    LabeledStatement {
        label: String,
        body: NodeId,
    },
}

/// Coarse classification used by the validator and the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Expression,
    /// `AssignmentExpression`: an expression that may only stand as a statement.
    Assignment,
    Pattern,
    Statement,
    Property,
    MethodDefinition,
    CatchClause,
}

/// What a reference field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Expression,
    /// An expression or an assignment (`ExpressionStatement.expression`).
    StatementExpression,
    /// Identifier or member expression.
    AssignTarget,
    Identifier,
    Pattern,
    /// An expression or a pattern (`Property.value`).
    Value,
    Statement,
    Block,
    Function,
    Property,
    MethodDefinition,
    CatchClause,
}

impl Expect {
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Expression => "an expression",
            Self::StatementExpression => "an expression or assignment",
            Self::AssignTarget => "an assignment target",
            Self::Identifier => "an Identifier",
            Self::Pattern => "a binding pattern",
            Self::Value => "an expression or pattern",
            Self::Statement => "a statement",
            Self::Block => "a BlockStatement",
            Self::Function => "a function expression",
            Self::Property => "a Property",
            Self::MethodDefinition => "a MethodDefinition",
            Self::CatchClause => "a CatchClause",
        }
    }

    #[must_use]
    pub fn accepts(&self, node: &Node) -> bool {
        let category = node.category();
        match self {
            Self::Expression => category == Category::Expression,
            Self::StatementExpression => {
                matches!(category, Category::Expression | Category::Assignment)
            }
            Self::AssignTarget => matches!(
                node,
                Node::Identifier { .. } | Node::MemberExpression { .. }
            ),
            Self::Identifier => matches!(node, Node::Identifier { .. }),
            Self::Pattern => {
                category == Category::Pattern || matches!(node, Node::Identifier { .. })
            }
            Self::Value => matches!(category, Category::Expression | Category::Pattern),
            Self::Statement => category == Category::Statement,
            Self::Block => matches!(node, Node::BlockStatement { .. }),
            Self::Function => matches!(
                node,
                Node::FunctionExpression { .. } | Node::ArrowFunctionExpression { .. }
            ),
            Self::Property => category == Category::Property,
            Self::MethodDefinition => category == Category::MethodDefinition,
            Self::CatchClause => category == Category::CatchClause,
        }
    }
}

/// One id-valued field of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub target: NodeId,
    pub expect: Expect,
}

impl Node {
    /// The `kind` tag.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Literal { .. } => "Literal",
            Self::Identifier { .. } => "Identifier",
            Self::VarArgs => "VarArgs",
            Self::ThisExpression => "ThisExpression",
            Self::Super => "Super",
            Self::TemplateLiteral { .. } => "TemplateLiteral",
            Self::BinaryExpression { .. } => "BinaryExpression",
            Self::LogicalExpression { .. } => "LogicalExpression",
            Self::UnaryExpression { .. } => "UnaryExpression",
            Self::AssignmentExpression { .. } => "AssignmentExpression",
            Self::ArrayExpression { .. } => "ArrayExpression",
            Self::ObjectExpression { .. } => "ObjectExpression",
            Self::Property { .. } => "Property",
            Self::MemberExpression { .. } => "MemberExpression",
            Self::CallExpression { .. } => "CallExpression",
            Self::FunctionExpression { .. } => "FunctionExpression",
            Self::ArrowFunctionExpression { .. } => "ArrowFunctionExpression",
            Self::ClassExpression { .. } => "ClassExpression",
            Self::SpreadElement { .. } => "SpreadElement",
            Self::AwaitExpression { .. } => "AwaitExpression",
            Self::YieldExpression { .. } => "YieldExpression",
            Self::ArrayPattern { .. } => "ArrayPattern",
            Self::ObjectPattern { .. } => "ObjectPattern",
            Self::RestElement { .. } => "RestElement",
            Self::MethodDefinition { .. } => "MethodDefinition",
            Self::VariableDeclaration { .. } => "VariableDeclaration",
            Self::FunctionDeclaration { .. } => "FunctionDeclaration",
            Self::ClassDeclaration { .. } => "ClassDeclaration",
            Self::BlockStatement { .. } => "BlockStatement",
            Self::ExpressionStatement { .. } => "ExpressionStatement",
            Self::IfStatement { .. } => "IfStatement",
            Self::WhileStatement { .. } => "WhileStatement",
            Self::DoWhileStatement { .. } => "DoWhileStatement",
            Self::ForStatement { .. } => "ForStatement",
            Self::ForOfStatement { .. } => "ForOfStatement",
            Self::ForInStatement { .. } => "ForInStatement",
            Self::SwitchStatement { .. } => "SwitchStatement",
            Self::TryStatement { .. } => "TryStatement",
            Self::CatchClause { .. } => "CatchClause",
            Self::ThrowStatement { .. } => "ThrowStatement",
            Self::ReturnStatement { .. } => "ReturnStatement",
            Self::BreakStatement { .. } => "BreakStatement",
            Self::ContinueStatement { .. } => "ContinueStatement",
            Self::LabeledStatement { .. } => "LabeledStatement",
        }
    }

    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::Literal { .. }
            | Self::Identifier { .. }
            | Self::VarArgs
            | Self::ThisExpression
            | Self::Super
            | Self::TemplateLiteral { .. }
            | Self::BinaryExpression { .. }
            | Self::LogicalExpression { .. }
            | Self::UnaryExpression { .. }
            | Self::ArrayExpression { .. }
            | Self::ObjectExpression { .. }
            | Self::MemberExpression { .. }
            | Self::CallExpression { .. }
            | Self::FunctionExpression { .. }
            | Self::ArrowFunctionExpression { .. }
            | Self::ClassExpression { .. }
            | Self::SpreadElement { .. }
            | Self::AwaitExpression { .. }
            | Self::YieldExpression { .. } => Category::Expression,
            Self::AssignmentExpression { .. } => Category::Assignment,
            Self::ArrayPattern { .. } | Self::ObjectPattern { .. } | Self::RestElement { .. } => {
                Category::Pattern
            }
            Self::Property { .. } => Category::Property,
            Self::MethodDefinition { .. } => Category::MethodDefinition,
            Self::CatchClause { .. } => Category::CatchClause,
            Self::VariableDeclaration { .. }
            | Self::FunctionDeclaration { .. }
            | Self::ClassDeclaration { .. }
            | Self::BlockStatement { .. }
            | Self::ExpressionStatement { .. }
            | Self::IfStatement { .. }
            | Self::WhileStatement { .. }
            | Self::DoWhileStatement { .. }
            | Self::ForStatement { .. }
            | Self::ForOfStatement { .. }
            | Self::ForInStatement { .. }
            | Self::SwitchStatement { .. }
            | Self::TryStatement { .. }
            | Self::ThrowStatement { .. }
            | Self::ReturnStatement { .. }
            | Self::BreakStatement { .. }
            | Self::ContinueStatement { .. }
            | Self::LabeledStatement { .. } => Category::Statement,
        }
    }

    /// Every id-valued field, in field order.
    #[must_use]
    pub fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        let mut one = |field: &'static str, target: NodeId, expect: Expect| {
            refs.push(Reference {
                field,
                target,
                expect,
            });
        };

        match self {
            Self::Literal { .. }
            | Self::Identifier { .. }
            | Self::VarArgs
            | Self::ThisExpression
            | Self::Super
            | Self::BreakStatement { .. }
            | Self::ContinueStatement { .. } => {}
            Self::TemplateLiteral { expressions, .. } => {
                for id in expressions {
                    one("expressions", *id, Expect::Expression);
                }
            }
            Self::BinaryExpression { left, right, .. }
            | Self::LogicalExpression { left, right, .. } => {
                one("left", *left, Expect::Expression);
                one("right", *right, Expect::Expression);
            }
            Self::UnaryExpression { argument, .. }
            | Self::SpreadElement { argument }
            | Self::AwaitExpression { argument }
            | Self::ThrowStatement { argument } => one("argument", *argument, Expect::Expression),
            Self::AssignmentExpression { left, right } => {
                one("left", *left, Expect::AssignTarget);
                one("right", *right, Expect::Expression);
            }
            Self::ArrayExpression { elements } => {
                for id in elements {
                    one("elements", *id, Expect::Expression);
                }
            }
            Self::ObjectExpression { properties } | Self::ObjectPattern { properties } => {
                for id in properties {
                    one("properties", *id, Expect::Property);
                }
            }
            Self::Property { key, value, .. } => {
                one("key", *key, Expect::Expression);
                one("value", *value, Expect::Value);
            }
            Self::MemberExpression {
                object,
                property,
                computed,
            } => {
                one("object", *object, Expect::Expression);
                let expect = if *computed {
                    Expect::Expression
                } else {
                    Expect::Identifier
                };
                one("property", *property, expect);
            }
            Self::CallExpression {
                callee, arguments, ..
            } => {
                one("callee", *callee, Expect::Expression);
                for id in arguments {
                    one("arguments", *id, Expect::Expression);
                }
            }
            Self::FunctionExpression {
                id, params, body, ..
            } => {
                if let Some(id) = id {
                    one("id", *id, Expect::Identifier);
                }
                for param in params {
                    one("params", *param, Expect::Pattern);
                }
                one("body", *body, Expect::Block);
            }
            Self::FunctionDeclaration {
                id, params, body, ..
            } => {
                one("id", *id, Expect::Identifier);
                for param in params {
                    one("params", *param, Expect::Pattern);
                }
                one("body", *body, Expect::Block);
            }
            Self::ArrowFunctionExpression { params, body, .. } => {
                for param in params {
                    one("params", *param, Expect::Pattern);
                }
                one("body", *body, Expect::Block);
            }
            Self::ClassExpression {
                id,
                super_class,
                body,
                static_fields,
            }
            | Self::ClassDeclaration {
                id,
                super_class,
                body,
                static_fields,
            } => {
                one("id", *id, Expect::Identifier);
                if let Some(parent) = super_class {
                    one("superClass", *parent, Expect::Identifier);
                }
                for member in body {
                    one("body", *member, Expect::MethodDefinition);
                }
                for field in static_fields {
                    one("staticFields", *field, Expect::Property);
                }
            }
            Self::YieldExpression { argument, .. } => {
                if let Some(argument) = argument {
                    one("argument", *argument, Expect::Expression);
                }
            }
            Self::ArrayPattern { elements } => {
                for id in elements.iter().flatten() {
                    one("elements", *id, Expect::Pattern);
                }
            }
            Self::RestElement { argument } => one("argument", *argument, Expect::Identifier),
            Self::MethodDefinition { key, value, .. } => {
                one("key", *key, Expect::Expression);
                one("value", *value, Expect::Function);
            }
            Self::VariableDeclaration { declarations, .. } => {
                for declarator in declarations {
                    one("declarations.pattern", declarator.pattern, Expect::Pattern);
                    if let Some(init) = declarator.init {
                        one("declarations.init", init, Expect::Expression);
                    }
                }
            }
            Self::BlockStatement { statements } => {
                for id in statements {
                    one("statements", *id, Expect::Statement);
                }
            }
            Self::ExpressionStatement { expression } => {
                one("expression", *expression, Expect::StatementExpression);
            }
            Self::IfStatement {
                test,
                consequent,
                alternate,
            } => {
                one("test", *test, Expect::Expression);
                one("consequent", *consequent, Expect::Block);
                if let Some(alternate) = alternate {
                    one("alternate", *alternate, Expect::Statement);
                }
            }
            Self::WhileStatement { test, body, .. } | Self::DoWhileStatement { test, body, .. } => {
                one("test", *test, Expect::Expression);
                one("body", *body, Expect::Block);
            }
            Self::ForStatement {
                init,
                test,
                update,
                body,
                ..
            } => {
                if let Some(init) = init {
                    one("init", *init, Expect::Statement);
                }
                if let Some(test) = test {
                    one("test", *test, Expect::Expression);
                }
                if let Some(update) = update {
                    one("update", *update, Expect::Statement);
                }
                one("body", *body, Expect::Block);
            }
            Self::ForOfStatement {
                left, right, body, ..
            }
            | Self::ForInStatement {
                left, right, body, ..
            } => {
                one("left", *left, Expect::Identifier);
                one("right", *right, Expect::Expression);
                one("body", *body, Expect::Block);
            }
            Self::SwitchStatement {
                discriminant,
                cases,
            } => {
                one("discriminant", *discriminant, Expect::Expression);
                for case in cases {
                    for test in &case.tests {
                        one("cases.tests", *test, Expect::Expression);
                    }
                    for stmt in &case.consequent {
                        one("cases.consequent", *stmt, Expect::Statement);
                    }
                }
            }
            Self::TryStatement {
                block,
                handler,
                finalizer,
                completion,
            } => {
                one("block", *block, Expect::Block);
                if let Some(handler) = handler {
                    one("handler", *handler, Expect::CatchClause);
                }
                if let Some(finalizer) = finalizer {
                    one("finalizer", *finalizer, Expect::Block);
                }
                if let Some(completion) = completion {
                    one("completion", *completion, Expect::Block);
                }
            }
            Self::CatchClause { param, body } => {
                if let Some(param) = param {
                    one("param", *param, Expect::Identifier);
                }
                one("body", *body, Expect::Block);
            }
            Self::ReturnStatement { arguments } => {
                for id in arguments {
                    one("arguments", *id, Expect::Expression);
                }
            }
            Self::LabeledStatement { body, .. } => one("body", *body, Expect::Statement),
        }
        refs
    }
}

// =============================================================================
// Arena
// =============================================================================

/// The node table of one compilation unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    nodes: BTreeMap<NodeId, Node>,
    #[serde(rename = "moduleBody")]
    module_body: Vec<NodeId>,
    #[serde(skip)]
    next_id: u32,
}

impl Arena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node under the next free id.
    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    #[must_use]
    pub fn module_body(&self) -> &[NodeId] {
        &self.module_body
    }

    pub fn push_module_statement(&mut self, id: NodeId) {
        self.module_body.push(id);
    }

    pub fn set_module_body(&mut self, body: Vec<NodeId>) {
        self.module_body = body;
    }

    /// Canonical JSON: nodes ordered by id, fields in declaration order.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load an arena from canonical JSON. Unknown keys and omitted optional
    /// fields are rejected, so only documents that [`Self::to_canonical_json`]
    /// could have produced are accepted.
    pub fn from_json(json: &str) -> Result<Self, ArenaLoadError> {
        let document: serde_json::Value = serde_json::from_str(json)?;
        let mut arena = Self::deserialize(&document)?;
        let canonical = serde_json::to_value(&arena)?;
        let mut path = String::from("$");
        check_shape(&canonical, &document, &mut path)?;

        arena.next_id = arena
            .nodes
            .keys()
            .next_back()
            .map_or(0, |id| id.0.saturating_add(1));
        Ok(arena)
    }
}

/// Compare the key sets of `expected` and `found` at every object level.
/// Scalar values are not compared: they already round-tripped through the
/// typed model, and numbers may differ only in representation (`1` vs `1.0`).
fn check_shape(
    expected: &serde_json::Value,
    found: &serde_json::Value,
    path: &mut String,
) -> Result<(), ArenaLoadError> {
    use serde_json::Value;
    use std::fmt::Write as _;

    let non_canonical = |path: &str, reason: String| ArenaLoadError::NonCanonical {
        path: path.to_string(),
        reason,
    };

    match (expected, found) {
        (Value::Object(expected), Value::Object(found)) => {
            if let Some(key) = found.keys().find(|key| !expected.contains_key(*key)) {
                return Err(non_canonical(path, format!("unknown field `{key}`")));
            }
            if let Some(key) = expected.keys().find(|key| !found.contains_key(*key)) {
                return Err(non_canonical(path, format!("missing field `{key}`")));
            }
            for (key, value) in expected {
                let len = path.len();
                path.push('.');
                path.push_str(key);
                check_shape(value, &found[key], path)?;
                path.truncate(len);
            }
        }
        (Value::Array(expected), Value::Array(found)) => {
            for (index, (expected, found)) in expected.iter().zip(found).enumerate() {
                let len = path.len();
                let _ = write!(path, "[{index}]");
                check_shape(expected, found, path)?;
                path.truncate(len);
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut arena = Arena::new();
        let a = arena.ident("a");
        let b = arena.ident("b");
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_canonical_json_shape() {
        let mut arena = Arena::new();
        let callee = arena.ident("log");
        let arg = arena.number(1.0);
        let call = arena.call(callee, vec![arg]);
        let stmt = arena.expr_stmt(call);
        arena.push_module_statement(stmt);

        let json: serde_json::Value =
            serde_json::from_str(&arena.to_canonical_json().unwrap()).unwrap();
        assert_eq!(json["moduleBody"], serde_json::json!([3]));
        assert_eq!(json["nodes"]["2"]["kind"], "CallExpression");
        assert_eq!(json["nodes"]["2"]["method"], false);
        assert_eq!(json["nodes"]["1"]["literalKind"], "number");
    }

    #[test]
    fn test_optional_fields_serialize_as_null() {
        let mut arena = Arena::new();
        let value = arena.ret(vec![]);
        let json = serde_json::to_value(arena.get(value).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "ReturnStatement", "arguments": []}));

        let test = arena.boolean(true);
        let then = arena.block(vec![]);
        let branch = arena.alloc(Node::IfStatement {
            test,
            consequent: then,
            alternate: None,
        });
        let json = serde_json::to_value(arena.get(branch).unwrap()).unwrap();
        assert!(json.as_object().unwrap().contains_key("alternate"));
        assert!(json["alternate"].is_null());
    }

    #[test]
    fn test_json_roundtrip_restores_counter() {
        let mut arena = Arena::new();
        let a = arena.string("hi");
        arena.push_module_statement(a);
        let text = arena.to_canonical_json().unwrap();

        let mut restored = Arena::from_json(&text).unwrap();
        assert_eq!(restored, arena);
        assert_eq!(restored.ident("next").index(), 1);
    }

    #[test]
    fn test_class_roundtrips_through_canonical_json() {
        let mut arena = Arena::new();
        let name = arena.ident("Point");
        let key = arena.ident("norm");
        let value = arena.function_expr(vec![], vec![]);
        let method = arena.alloc(Node::MethodDefinition {
            kind: MethodKind::Get,
            key,
            computed: false,
            value,
        });
        let class = arena.alloc(Node::ClassDeclaration {
            id: name,
            super_class: None,
            body: vec![method],
            static_fields: vec![],
        });
        arena.push_module_statement(class);

        let text = arena.to_canonical_json().unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        let node = &json["nodes"][method.index().to_string()];
        assert_eq!(node["kind"], "MethodDefinition");
        assert_eq!(node["methodKind"], "get");

        let restored = Arena::from_json(&text).unwrap();
        assert_eq!(restored, arena);
        assert_eq!(restored.to_canonical_json().unwrap(), text);
    }

    #[test]
    fn test_from_json_rejects_unknown_field() {
        let text = serde_json::json!({
            "nodes": {"0": {"kind": "Identifier", "name": "x", "extra": 1}},
            "moduleBody": []
        })
        .to_string();
        let err = Arena::from_json(&text).unwrap_err();
        assert!(
            matches!(&err, ArenaLoadError::NonCanonical { path, reason }
                if path == "$.nodes.0" && reason.contains("extra")),
            "{err}"
        );
        assert_eq!(err.code(), "LOAD_FAILED");
    }

    #[test]
    fn test_from_json_rejects_omitted_optional_field() {
        let text = serde_json::json!({
            "nodes": {
                "0": {"kind": "Literal", "literalKind": "boolean", "value": true, "raw": "true"},
                "1": {"kind": "BlockStatement", "statements": []},
                "2": {"kind": "IfStatement", "test": 0, "consequent": 1}
            },
            "moduleBody": [2]
        })
        .to_string();
        let err = Arena::from_json(&text).unwrap_err();
        assert!(
            matches!(&err, ArenaLoadError::NonCanonical { path, reason }
                if path == "$.nodes.2" && reason.contains("alternate")),
            "{err}"
        );
    }

    #[test]
    fn test_from_json_accepts_integral_numbers() {
        let text = r#"{"nodes": {"0": {"kind": "Literal", "literalKind": "number",
            "value": 2, "raw": "2"}}, "moduleBody": [0]}"#;
        let arena = Arena::from_json(text).unwrap();
        assert_eq!(arena.literal_kind(NodeId::new(0)), Some(LiteralKind::Number));
    }

    #[test]
    fn test_references_carry_expectations() {
        let mut arena = Arena::new();
        let object = arena.ident("obj");
        let member = arena.member(object, "field");
        let refs = arena.get(member).unwrap().references();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].expect, Expect::Expression);
        assert_eq!(refs[1].expect, Expect::Identifier);
    }
}
