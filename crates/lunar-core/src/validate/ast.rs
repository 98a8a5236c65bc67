use crate::error::Diagnostic;
use lunar_ast::{MethodKind, Node, NodeKind, Program, PropertyKind};

/// Globals whose semantics have no counterpart in the target runtime.
const UNSUPPORTED_GLOBALS: &[(&str, &str)] = &[
    ("Proxy", "proxy objects are not supported"),
    ("Reflect", "the Reflect API is not supported"),
    ("WeakMap", "weak-reference containers are not supported"),
    ("WeakSet", "weak-reference containers are not supported"),
    ("WeakRef", "weak references are not supported"),
    ("FinalizationRegistry", "finalizers are not supported"),
    ("arguments", "the arguments object is not supported; use rest parameters"),
];

/// Reflective `Object.*` functions.
const REFLECTIVE_OBJECT_METHODS: &[&str] = &[
    "defineProperty",
    "defineProperties",
    "getOwnPropertyDescriptor",
    "getOwnPropertyDescriptors",
    "getOwnPropertyNames",
    "getPrototypeOf",
    "setPrototypeOf",
];

/// Walk `program` and collect a diagnostic for every construct the lowerer
/// cannot handle. The tree is not modified.
pub fn validate_ast(program: &Program) -> Result<(), Vec<Diagnostic>> {
    let mut walker = Walker::default();
    for stmt in &program.body {
        walker.visit(stmt);
    }
    if walker.diagnostics.is_empty() {
        Ok(())
    } else {
        Err(walker.diagnostics)
    }
}

#[derive(Default)]
struct Walker {
    diagnostics: Vec<Diagnostic>,
    /// One entry per enclosing function: whether it is async.
    functions: Vec<bool>,
}

impl Walker {
    fn report(&mut self, node: &Node, reason: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(node, reason));
    }

    fn in_async(&self) -> bool {
        self.functions.last().copied().unwrap_or(false)
    }

    fn visit_all(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.visit(node);
        }
    }

    fn visit_children(&mut self, node: &Node) {
        node.kind.for_each_child(&mut |child| self.visit(child));
    }

    fn visit_function(&mut self, node: &Node, is_async: bool) {
        self.functions.push(is_async);
        self.visit_children(node);
        self.functions.pop();
    }

    /// Keys of non-computed members are names, not references.
    fn visit_key(&mut self, key: &Node, computed: bool) {
        if computed {
            self.visit(key);
        } else if let NodeKind::PrivateIdentifier { .. } = key.kind {
            self.report(key, "private names are not supported");
        }
    }

    fn visit(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Unsupported => {
                let reason = if node.type_name.starts_with("Import")
                    || node.type_name.starts_with("Export")
                {
                    "module declarations are not supported".to_string()
                } else {
                    format!("unrecognized node type `{}`", node.type_name)
                };
                self.report(node, reason);
            }
            NodeKind::WithStatement { .. } => {
                self.report(node, "`with` statements are not supported");
            }
            NodeKind::ImportExpression { .. } => {
                self.report(node, "dynamic import() is not supported");
            }
            NodeKind::MetaProperty { .. } => {
                self.report(node, "meta properties are not supported");
            }
            NodeKind::TaggedTemplateExpression { .. } => {
                self.report(node, "tagged templates are not supported");
            }
            NodeKind::PrivateIdentifier { .. } => {
                self.report(node, "private names are not supported");
            }
            NodeKind::StaticBlock { .. } => {
                self.report(node, "class static blocks are not supported");
            }
            NodeKind::Literal { regex, bigint, .. } => {
                if regex.is_some() {
                    self.report(node, "regular expression literals are not supported");
                } else if bigint.is_some() {
                    self.report(node, "BigInt literals are not supported");
                }
            }
            NodeKind::Identifier { name } => {
                if let Some((_, reason)) = UNSUPPORTED_GLOBALS.iter().find(|(n, _)| n == name) {
                    self.report(node, *reason);
                }
            }
            NodeKind::FunctionDeclaration {
                generator,
                is_async,
                ..
            }
            | NodeKind::FunctionExpression {
                generator,
                is_async,
                ..
            } => {
                if *generator && *is_async {
                    self.report(node, "async generators are not supported");
                }
                self.visit_function(node, *is_async);
            }
            NodeKind::ArrowFunctionExpression { is_async, .. } => {
                self.visit_function(node, *is_async);
            }
            NodeKind::AwaitExpression { argument } => {
                if !self.in_async() {
                    self.report(node, "`await` is only supported inside async functions");
                }
                self.visit(argument);
            }
            NodeKind::ForOfStatement { is_await: true, .. } => {
                self.report(node, "`for await` loops are not supported");
                self.visit_children(node);
            }
            NodeKind::CallExpression {
                callee, arguments, ..
            } => {
                self.check_callee(node, callee);
                self.visit(callee);
                self.visit_all(arguments);
            }
            NodeKind::NewExpression { callee, arguments } => {
                self.check_callee(node, callee);
                if callee.is_identifier("Promise") {
                    self.report(
                        node,
                        "`new Promise` is not supported; use async functions",
                    );
                }
                self.visit(callee);
                self.visit_all(arguments);
            }
            NodeKind::MemberExpression {
                object,
                property,
                computed,
                ..
            } => {
                if let Some(("Object", name)) = node.static_member() {
                    if REFLECTIVE_OBJECT_METHODS.contains(&name) {
                        self.report(node, format!("reflective `Object.{name}` is not supported"));
                    }
                }
                self.visit(object);
                self.visit_key(property, *computed);
            }
            NodeKind::Property {
                key,
                value,
                kind,
                computed,
                ..
            } => {
                if *kind != PropertyKind::Init {
                    self.report(node, "object literal accessors are not supported");
                }
                self.visit_key(key, *computed);
                self.visit(value);
            }
            NodeKind::MethodDefinition {
                key,
                value,
                kind,
                computed,
                is_static,
            } => {
                if *is_static && matches!(kind, MethodKind::Get | MethodKind::Set) {
                    self.report(node, "static accessors are not supported");
                }
                self.visit_key(key, *computed);
                self.visit(value);
            }
            NodeKind::PropertyDefinition {
                key,
                value,
                computed,
                ..
            } => {
                self.visit_key(key, *computed);
                if let Some(value) = value {
                    // Field initializers run as part of the constructor.
                    self.functions.push(false);
                    self.visit(value);
                    self.functions.pop();
                }
            }
            NodeKind::LabeledStatement { body, .. } => {
                if matches!(body.kind, NodeKind::FunctionDeclaration { .. }) {
                    self.report(node, "labeled function declarations are not supported");
                }
                self.visit(body);
            }
            NodeKind::BreakStatement { .. } | NodeKind::ContinueStatement { .. } => {}
            _ => self.visit_children(node),
        }
    }

    fn check_callee(&mut self, call: &Node, callee: &Node) {
        if callee.is_identifier("eval") {
            self.report(call, "`eval` is not supported");
        } else if callee.is_identifier("Function") {
            self.report(call, "the Function constructor is not supported");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunar_ast::{build, Position, SourceLocation, VariableKind};

    fn rejected(body: Vec<Node>) -> Vec<Diagnostic> {
        validate_ast(&build::program(body)).expect_err("input should be rejected")
    }

    fn accepted(body: Vec<Node>) {
        if let Err(diagnostics) = validate_ast(&build::program(body)) {
            panic!("unexpected diagnostics: {diagnostics:?}");
        }
    }

    #[test]
    fn test_accepts_plain_program() {
        accepted(vec![
            build::const_("greeting", build::string("hi")),
            build::expr_stmt(build::call(
                build::member(build::ident("console"), "log"),
                vec![build::ident("greeting")],
            )),
        ]);
    }

    #[test]
    fn test_rejects_with_location() {
        let stmt = build::with_(build::ident("scope"), vec![]).with_loc(SourceLocation::new(
            Position::new(3, 0),
            Position::new(3, 12),
        ));
        let diagnostics = rejected(vec![stmt]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].node_type, "WithStatement");
        assert_eq!(
            diagnostics[0].to_string(),
            "WithStatement at 3:1: `with` statements are not supported"
        );
    }

    #[test]
    fn test_rejects_reflection_and_weak_containers() {
        let diagnostics = rejected(vec![
            build::expr_stmt(build::call(build::ident("eval"), vec![build::string("1")])),
            build::expr_stmt(build::new_(build::ident("WeakMap"), vec![])),
            build::expr_stmt(build::call(
                build::member(build::ident("Object"), "defineProperty"),
                vec![],
            )),
            build::expr_stmt(build::new_(build::ident("Proxy"), vec![])),
        ]);
        let types: Vec<&str> = diagnostics.iter().map(|d| d.node_type.as_str()).collect();
        assert_eq!(types, ["CallExpression", "Identifier", "MemberExpression", "Identifier"]);
    }

    #[test]
    fn test_property_names_are_not_references() {
        accepted(vec![build::expr_stmt(build::member(build::ident("obj"), "arguments"))]);
        accepted(vec![build::const_(
            "o",
            build::object(vec![build::prop("Proxy", build::num(1.0))]),
        )]);
        rejected(vec![build::expr_stmt(build::ident("arguments"))]);
    }

    #[test]
    fn test_await_requires_async_function() {
        let diagnostics = rejected(vec![build::expr_stmt(build::await_(build::ident("job")))]);
        assert_eq!(diagnostics[0].node_type, "AwaitExpression");

        accepted(vec![build::async_decl(
            "run",
            vec![],
            vec![build::expr_stmt(build::await_(build::ident("job")))],
        )]);

        // A nested non-async function resets the context.
        rejected(vec![build::async_decl(
            "run",
            vec![],
            vec![build::expr_stmt(build::call(
                build::function_expr(
                    vec![],
                    vec![build::expr_stmt(build::await_(build::ident("x")))],
                ),
                vec![],
            ))],
        )]);
    }

    #[test]
    fn test_rejects_syntax_features() {
        let cases = vec![
            (build::expr_stmt(build::regex("a+", "g")), "Literal"),
            (build::expr_stmt(build::bigint("10")), "Literal"),
            (build::expr_stmt(build::meta_property("new", "target")), "MetaProperty"),
            (
                build::expr_stmt(build::tagged_template(
                    build::ident("tag"),
                    build::template(&["x"], vec![]),
                )),
                "TaggedTemplateExpression",
            ),
            (
                build::expr_stmt(build::async_function_expr(vec![], vec![], true)),
                "FunctionExpression",
            ),
            (
                build::async_decl(
                    "f",
                    vec![],
                    vec![build::for_await(
                        VariableKind::Const,
                        build::ident("x"),
                        build::ident("xs"),
                        vec![],
                    )],
                ),
                "ForOfStatement",
            ),
            (build::unsupported("ExportNamedDeclaration"), "ExportNamedDeclaration"),
            (build::expr_stmt(build::import_expr(build::string("./m"))), "ImportExpression"),
            (
                build::labeled("outer", build::function_decl("f", vec![], vec![])),
                "LabeledStatement",
            ),
            (
                build::expr_stmt(build::new_(build::ident("Promise"), vec![])),
                "NewExpression",
            ),
        ];
        for (stmt, expected) in cases {
            let diagnostics = rejected(vec![stmt]);
            assert!(
                diagnostics.iter().any(|d| d.node_type == expected),
                "expected a {expected} diagnostic, got {diagnostics:?}"
            );
        }
    }

    #[test]
    fn test_rejects_class_features() {
        let diagnostics = rejected(vec![
            build::class_decl("A", None, vec![build::static_block(vec![])]),
            build::class_decl(
                "B",
                None,
                vec![build::method_with(
                    MethodKind::Get,
                    "size",
                    build::function_expr(vec![], vec![]),
                    true,
                )],
            ),
            build::expr_stmt(build::member(build::this(), "x")),
            build::const_(
                "o",
                build::object(vec![build::accessor_prop(PropertyKind::Get, "v", vec![], vec![])]),
            ),
        ]);
        let types: Vec<&str> = diagnostics.iter().map(|d| d.node_type.as_str()).collect();
        assert_eq!(types, ["StaticBlock", "MethodDefinition", "Property"]);

        let private = build::class_decl(
            "C",
            None,
            vec![Node::new(NodeKind::PropertyDefinition {
                key: Box::new(build::private_ident("secret")),
                value: None,
                computed: false,
                is_static: false,
            })],
        );
        assert_eq!(rejected(vec![private])[0].node_type, "PrivateIdentifier");
    }

    #[test]
    fn test_instance_accessors_are_accepted() {
        accepted(vec![build::class_decl(
            "Box",
            None,
            vec![
                build::method(
                    MethodKind::Get,
                    "size",
                    vec![],
                    vec![build::ret(Some(build::num(1.0)))],
                ),
                build::method(MethodKind::Set, "size", vec![build::ident("v")], vec![]),
            ],
        )]);
    }
}
