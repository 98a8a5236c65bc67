//! Pre-pass over the whole tree: literal provenance of bindings, whether the
//! unit defines generators, and which member names the unit defines methods
//! for.
//!
//! Provenance is name-keyed and flow-insensitive. Every declaration or
//! assignment of a name contributes the static kind of its value; a name seen
//! with two different kinds, or with a value of unknown kind, is `Unknown`.
//! The pass iterates to a fixed point so that `let b = a + 1` benefits from
//! `let a = 1` regardless of order.

use lunar_ast::{
    AssignmentOperator, BinaryOperator, Node, NodeKind, Program, UnaryOperator,
};
use rustc_hash::{FxHashMap, FxHashSet};

const MAX_ROUNDS: usize = 8;

/// Static kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Kind {
    /// No evidence yet.
    Bottom,
    Number,
    String,
    Unknown,
}

impl Kind {
    fn join(self, other: Kind) -> Kind {
        match (self, other) {
            (Kind::Bottom, k) | (k, Kind::Bottom) => k,
            (a, b) if a == b => a,
            _ => Kind::Unknown,
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct Analysis {
    hints: FxHashMap<String, Kind>,
    pub has_generators: bool,
    /// Names of methods defined anywhere in the unit. Builtin rewrites of
    /// `x.push(v)` and friends are skipped for these.
    pub method_names: FxHashSet<String>,
}

impl Analysis {
    /// Provenance of a binding; names never observed are `Unknown`.
    pub fn hint(&self, name: &str) -> Kind {
        match self.hints.get(name) {
            Some(Kind::Bottom) | None => Kind::Unknown,
            Some(kind) => *kind,
        }
    }

    /// Static kind of an expression under the collected hints.
    pub fn kind_of(&self, node: &Node) -> Kind {
        match kind_of(node, &|name: &str| self.hint(name)) {
            Kind::Bottom => Kind::Unknown,
            kind => kind,
        }
    }
}

pub(super) fn analyze(program: &Program, infer_local_types: bool) -> Analysis {
    let mut analysis = Analysis {
        has_generators: program.body.iter().any(contains_generator),
        ..Analysis::default()
    };
    for stmt in &program.body {
        collect_method_names(stmt, &mut analysis.method_names);
    }
    if !infer_local_types {
        return analysis;
    }

    for _ in 0..MAX_ROUNDS {
        let mut round = Round {
            previous: &analysis.hints,
            next: FxHashMap::default(),
        };
        for stmt in &program.body {
            round.visit(stmt);
        }
        let next = round.next;
        if next == analysis.hints {
            break;
        }
        analysis.hints = next;
    }
    analysis
}

fn contains_generator(node: &Node) -> bool {
    let here = matches!(
        node.kind,
        NodeKind::FunctionDeclaration { generator: true, .. }
            | NodeKind::FunctionExpression { generator: true, .. }
    );
    here || node.children().into_iter().any(contains_generator)
}

fn collect_method_names(node: &Node, out: &mut FxHashSet<String>) {
    let defined = match &node.kind {
        NodeKind::MethodDefinition {
            key,
            computed: false,
            ..
        } => key.as_identifier(),
        NodeKind::Property {
            key,
            value,
            computed: false,
            ..
        } if value.is_function() => key.as_identifier(),
        NodeKind::AssignmentExpression { left, right, .. } if right.is_function() => {
            match &left.kind {
                NodeKind::MemberExpression {
                    property,
                    computed: false,
                    ..
                } => property.as_identifier(),
                _ => None,
            }
        }
        _ => None,
    };
    if let Some(name) = defined {
        out.insert(name.to_string());
    }
    node.kind.for_each_child(&mut |child| collect_method_names(child, out));
}

struct Round<'a> {
    previous: &'a FxHashMap<String, Kind>,
    next: FxHashMap<String, Kind>,
}

impl Round<'_> {
    fn observe(&mut self, name: &str, kind: Kind) {
        let entry = self.next.entry(name.to_string()).or_insert(Kind::Bottom);
        *entry = entry.join(kind);
    }

    fn kind(&self, node: &Node) -> Kind {
        kind_of(node, &|name: &str| {
            self.previous.get(name).copied().unwrap_or(Kind::Bottom)
        })
    }

    fn unknown_bindings(&mut self, pattern: &Node) {
        let mut names = Vec::new();
        bound_names(pattern, &mut names);
        for name in names {
            self.observe(&name, Kind::Unknown);
        }
    }

    /// `for-in` keys are strings; `for-of` elements could be anything.
    fn loop_binding(&mut self, id: &Node, keys: bool) {
        match id.as_identifier() {
            Some(name) if keys => self.observe(name, Kind::String),
            _ => self.unknown_bindings(id),
        }
    }

    fn visit(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::VariableDeclarator { id, init } => match (id.as_identifier(), init) {
                (Some(name), Some(init)) => {
                    let kind = self.kind(init);
                    self.observe(name, kind);
                }
                (Some(_), None) => {}
                (None, _) => self.unknown_bindings(id),
            },
            NodeKind::AssignmentExpression {
                operator,
                left,
                right,
            } => {
                if let Some(name) = left.as_identifier() {
                    let right_kind = self.kind(right);
                    let kind = match operator {
                        AssignmentOperator::Assign => right_kind,
                        AssignmentOperator::AddAssign => {
                            let current = self.previous.get(name).copied().unwrap_or(Kind::Bottom);
                            add_kind(current, right_kind)
                        }
                        AssignmentOperator::AndAssign
                        | AssignmentOperator::OrAssign
                        | AssignmentOperator::NullishAssign => Kind::Unknown,
                        _ => Kind::Number,
                    };
                    self.observe(name, kind);
                } else if !matches!(left.kind, NodeKind::MemberExpression { .. }) {
                    self.unknown_bindings(left);
                }
            }
            NodeKind::UpdateExpression { argument, .. } => {
                if let Some(name) = argument.as_identifier() {
                    self.observe(name, Kind::Number);
                }
            }
            NodeKind::FunctionDeclaration { id, params, .. }
            | NodeKind::FunctionExpression { id, params, .. } => {
                if let Some(id) = id {
                    self.unknown_bindings(id);
                }
                for param in params {
                    self.unknown_bindings(param);
                }
            }
            NodeKind::ArrowFunctionExpression { params, .. } => {
                for param in params {
                    self.unknown_bindings(param);
                }
            }
            NodeKind::ClassDeclaration { id: Some(id), .. }
            | NodeKind::ClassExpression { id: Some(id), .. } => self.unknown_bindings(id),
            NodeKind::CatchClause { param: Some(param), .. } => self.unknown_bindings(param),
            NodeKind::ForOfStatement { left, .. } | NodeKind::ForInStatement { left, .. } => {
                let keys = matches!(node.kind, NodeKind::ForInStatement { .. });
                if let NodeKind::VariableDeclaration { declarations, .. } = &left.kind {
                    for declarator in declarations {
                        if let NodeKind::VariableDeclarator { id, .. } = &declarator.kind {
                            self.loop_binding(id, keys);
                        }
                    }
                } else {
                    self.loop_binding(left, keys);
                }
                // The declaration in `left` has no initializer; skip it.
                if let NodeKind::ForOfStatement { right, body, .. }
                | NodeKind::ForInStatement { right, body, .. } = &node.kind
                {
                    self.visit(right);
                    self.visit(body);
                }
                return;
            }
            _ => {}
        }
        node.kind.for_each_child(&mut |child| self.visit(child));
    }
}

fn add_kind(left: Kind, right: Kind) -> Kind {
    match (left, right) {
        (Kind::String, _) | (_, Kind::String) => Kind::String,
        (Kind::Number, Kind::Number) => Kind::Number,
        (Kind::Bottom, _) | (_, Kind::Bottom) => Kind::Bottom,
        _ => Kind::Unknown,
    }
}

/// Methods whose result is a string whatever the receiver.
const STRING_METHODS: &[&str] = &[
    "toUpperCase",
    "toLowerCase",
    "join",
    "toString",
    "toFixed",
    "trim",
];

/// Purely syntactic kind, with identifiers resolved through `lookup`.
pub(super) fn kind_of(node: &Node, lookup: &dyn Fn(&str) -> Kind) -> Kind {
    match &node.kind {
        NodeKind::Literal { value, .. } => {
            if value.is_number() {
                Kind::Number
            } else if value.is_string() {
                Kind::String
            } else {
                Kind::Unknown
            }
        }
        NodeKind::TemplateLiteral { .. } => Kind::String,
        NodeKind::Identifier { name } => match name.as_str() {
            "NaN" | "Infinity" => Kind::Number,
            "undefined" => Kind::Unknown,
            _ => lookup(name),
        },
        NodeKind::BinaryExpression {
            operator,
            left,
            right,
        } => match operator {
            BinaryOperator::Add => add_kind(kind_of(left, lookup), kind_of(right, lookup)),
            BinaryOperator::Sub
            | BinaryOperator::Mul
            | BinaryOperator::Div
            | BinaryOperator::Mod
            | BinaryOperator::Pow
            | BinaryOperator::BitOr
            | BinaryOperator::BitXor
            | BinaryOperator::BitAnd
            | BinaryOperator::Shl
            | BinaryOperator::Shr
            | BinaryOperator::UShr => Kind::Number,
            _ => Kind::Unknown,
        },
        NodeKind::UnaryExpression { operator, .. } => match operator {
            UnaryOperator::Minus | UnaryOperator::Plus | UnaryOperator::BitNot => Kind::Number,
            UnaryOperator::Typeof => Kind::String,
            _ => Kind::Unknown,
        },
        NodeKind::UpdateExpression { .. } => Kind::Number,
        NodeKind::MemberExpression { .. }
            if node
                .static_member()
                .is_some_and(|(object, _)| object == "Math") =>
        {
            Kind::Number
        }
        NodeKind::MemberExpression {
            property,
            computed: false,
            ..
        } if property.is_identifier("length") => Kind::Number,
        NodeKind::CallExpression { callee, .. } => {
            if let Some(name) = callee.as_identifier() {
                return match name {
                    "String" => Kind::String,
                    "Number" | "parseInt" | "parseFloat" => Kind::Number,
                    _ => Kind::Unknown,
                };
            }
            match &callee.kind {
                NodeKind::MemberExpression {
                    object,
                    property,
                    computed: false,
                    ..
                } => {
                    if object.is_identifier("Math") {
                        Kind::Number
                    } else if property
                        .as_identifier()
                        .is_some_and(|name| STRING_METHODS.contains(&name))
                    {
                        Kind::String
                    } else {
                        Kind::Unknown
                    }
                }
                _ => Kind::Unknown,
            }
        }
        NodeKind::ConditionalExpression {
            consequent,
            alternate,
            ..
        } => kind_of(consequent, lookup).join(kind_of(alternate, lookup)),
        NodeKind::AssignmentExpression {
            operator: AssignmentOperator::Assign,
            right,
            ..
        } => kind_of(right, lookup),
        NodeKind::SequenceExpression { expressions } => expressions
            .last()
            .map_or(Kind::Unknown, |last| kind_of(last, lookup)),
        _ => Kind::Unknown,
    }
}

/// Names bound by a binding pattern, in source order.
pub(super) fn bound_names(pattern: &Node, out: &mut Vec<String>) {
    match &pattern.kind {
        NodeKind::Identifier { name } => out.push(name.clone()),
        NodeKind::ObjectPattern { properties } => {
            for property in properties {
                match &property.kind {
                    NodeKind::Property { value, .. } => bound_names(value, out),
                    NodeKind::RestElement { argument } => bound_names(argument, out),
                    _ => {}
                }
            }
        }
        NodeKind::ArrayPattern { elements } => {
            for element in elements.iter().flatten() {
                bound_names(element, out);
            }
        }
        NodeKind::RestElement { argument } => bound_names(argument, out),
        NodeKind::AssignmentPattern { left, .. } => bound_names(left, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunar_ast::{build, AssignmentOperator, UpdateOperator, VariableKind};

    fn analysis(body: Vec<Node>) -> Analysis {
        analyze(&build::program(body), true)
    }

    #[test]
    fn test_literal_provenance() {
        let a = analysis(vec![
            build::const_("count", build::num(1.0)),
            build::const_("label", build::string("x")),
            build::let_("mixed", Some(build::num(1.0))),
            build::expr_stmt(build::assign(
                AssignmentOperator::Assign,
                build::ident("mixed"),
                build::string("s"),
            )),
        ]);
        assert_eq!(a.hint("count"), Kind::Number);
        assert_eq!(a.hint("label"), Kind::String);
        assert_eq!(a.hint("mixed"), Kind::Unknown);
        assert_eq!(a.hint("never"), Kind::Unknown);
    }

    #[test]
    fn test_fixed_point_through_self_reference() {
        let a = analysis(vec![
            build::let_("i", Some(build::num(0.0))),
            build::expr_stmt(build::assign(
                AssignmentOperator::Assign,
                build::ident("i"),
                build::binary(BinaryOperator::Add, build::ident("i"), build::num(1.0)),
            )),
            build::expr_stmt(build::update(UpdateOperator::Increment, false, build::ident("i"))),
            build::const_(
                "total",
                build::binary(BinaryOperator::Add, build::ident("later"), build::num(2.0)),
            ),
            build::const_("later", build::num(5.0)),
        ]);
        assert_eq!(a.hint("i"), Kind::Number);
        assert_eq!(a.hint("total"), Kind::Number);
    }

    #[test]
    fn test_params_are_unknown() {
        let a = analysis(vec![
            build::function_decl("f", vec![build::ident("n")], vec![]),
            build::var("n", Some(build::num(1.0))),
        ]);
        assert_eq!(a.hint("n"), Kind::Unknown);
    }

    #[test]
    fn test_for_in_keys_are_strings() {
        let a = analysis(vec![
            build::for_in(VariableKind::Const, "key", build::ident("table"), vec![]),
            build::for_of(VariableKind::Const, build::ident("item"), build::ident("list"), vec![]),
        ]);
        assert_eq!(a.hint("key"), Kind::String);
        assert_eq!(a.hint("item"), Kind::Unknown);
    }

    #[test]
    fn test_disabled_inference_keeps_syntax_only() {
        let program = build::program(vec![build::const_("n", build::num(1.0))]);
        let a = analyze(&program, false);
        assert_eq!(a.hint("n"), Kind::Unknown);
        assert_eq!(a.kind_of(&build::template(&["x"], vec![])), Kind::String);
    }

    #[test]
    fn test_collects_method_names() {
        let program = build::program(vec![build::class_decl(
            "Stack",
            None,
            vec![build::method(lunar_ast::MethodKind::Method, "push", vec![], vec![])],
        )]);
        let a = analyze(&program, false);
        assert!(a.method_names.contains("push"));
        assert!(!a.method_names.contains("join"));
    }

    #[test]
    fn test_detects_generators() {
        let program = build::program(vec![build::const_(
            "make",
            build::arrow(vec![], vec![build::generator_decl("g", vec![], vec![])]),
        )]);
        assert!(analyze(&program, true).has_generators);

        let program = build::program(vec![build::for_of(
            VariableKind::Const,
            build::ident("x"),
            build::ident("xs"),
            vec![],
        )]);
        assert!(!analyze(&program, true).has_generators);
    }
}
