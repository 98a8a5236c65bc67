//! End-to-end tests: parse tree in, Lua text out.

mod common;

use common::compile_ok;
use lunar_ast::build::*;
use lunar_ast::{BinaryOperator, MethodKind, Program, VariableKind};
use lunar_core::{compile, compile_json, CompileError, CompileOptions, RuntimeHelper};

const DESTRUCTURE: &str = r#"{
    "type": "Program", "sourceType": "script", "start": 0, "end": 24,
    "body": [
        {"type": "VariableDeclaration", "kind": "const", "start": 0, "end": 24,
         "declarations": [{"type": "VariableDeclarator", "start": 6, "end": 23,
            "id": {"type": "ObjectPattern", "start": 6, "end": 16, "properties": [
                {"type": "Property", "kind": "init", "method": false, "shorthand": true, "computed": false,
                 "start": 7, "end": 8,
                 "key": {"type": "Identifier", "name": "x", "start": 7, "end": 8},
                 "value": {"type": "Identifier", "name": "x", "start": 7, "end": 8}},
                {"type": "Property", "kind": "init", "method": false, "shorthand": true, "computed": false,
                 "start": 10, "end": 11,
                 "key": {"type": "Identifier", "name": "y", "start": 10, "end": 11},
                 "value": {"type": "Identifier", "name": "y", "start": 10, "end": 11}}
            ]},
            "init": {"type": "Identifier", "name": "obj", "start": 19, "end": 22}}]}
    ]
}"#;

#[test]
fn test_shorthand_destructuring_reads_each_field() {
    common::init_tracing();
    let output = compile_json(DESTRUCTURE, &CompileOptions::default()).unwrap();
    assert_eq!(output.code, "local x, y = obj.x, obj.y\n");
}

#[test]
fn test_for_of_over_array_literal() {
    let program = program(vec![for_of(
        VariableKind::Const,
        ident("x"),
        array(vec![num(1.0), num(2.0), num(3.0)]),
        vec![expr_stmt(call(ident("log"), vec![ident("x")]))],
    )]);
    let output = compile_ok(&program);
    assert_eq!(output.code, "for _, x in ipairs({1, 2, 3}) do\n  log(x)\nend\n");
    assert!(output.helpers.is_empty());
}

#[test]
fn test_operator_disambiguation() {
    let program = program(vec![
        const_("greeting", binary(BinaryOperator::Add, string("Hello, "), ident("name"))),
        const_("sum", binary(BinaryOperator::Add, num(5.0), num(3.0))),
        const_("total", binary(BinaryOperator::Add, ident("a"), ident("b"))),
    ]);
    let code = compile_ok(&program).code;
    assert!(code.contains("local greeting = \"Hello, \" .. "), "{code}");
    assert!(code.contains("local sum = 5 + 3"), "{code}");
    assert!(code.contains("local total = a + b"), "{code}");
}

#[test]
fn test_finally_runs_on_early_return() {
    let program = program(vec![function_decl(
        "f",
        vec![],
        vec![try_(
            vec![ret(Some(num(1.0)))],
            None,
            Some(vec![expr_stmt(call(ident("sideEffect"), vec![]))]),
        )],
    )]);
    let code = compile_ok(&program).code;
    let protected = code.find("pcall(function()").unwrap();
    let finalizer = code.find("sideEffect()").unwrap();
    let rethrow = code.find("if not __ok then error(__flow, 0) end").unwrap();
    let returned = code.find("return __value").unwrap();
    assert!(protected < finalizer && finalizer < rethrow && rethrow < returned, "{code}");
}

#[test]
fn test_shared_case_body_is_not_duplicated() {
    let program = program(vec![switch(
        ident("day"),
        vec![
            case(Some(string("sat")), vec![]),
            case(
                Some(string("sun")),
                vec![expr_stmt(call(ident("rest"), vec![])), break_(None)],
            ),
            case(None, vec![expr_stmt(call(ident("work"), vec![]))]),
        ],
    )]);
    let code = compile_ok(&program).code;
    assert!(code.contains("if __switch == \"sat\" or __switch == \"sun\" then"), "{code}");
    assert_eq!(code.matches("rest()").count(), 1, "{code}");
}

#[test]
fn test_generator_object_protocol() {
    let program = program(vec![generator_decl(
        "pair",
        vec![],
        vec![
            expr_stmt(yield_(Some(num(1.0)), false)),
            expr_stmt(yield_(Some(num(2.0)), false)),
        ],
    )]);
    let output = compile_ok(&program);
    assert_eq!(output.helpers, vec![RuntimeHelper::Suspend, RuntimeHelper::Generator]);
    let code = output.code;
    assert!(code.contains("state = \"suspended\""), "{code}");
    assert!(code.contains("gen.next = function(self, value)"), "{code}");
    assert!(code.contains("gen.return_ = function(self, value)"), "{code}");
    assert!(code.contains("gen.throw = function(self, value)"), "{code}");
    assert!(
        code.contains("local function pair()\n  return __lunar_generator(function()"),
        "{code}"
    );
}

#[test]
fn test_lowered_arena_has_no_dangling_references() {
    let program = program(vec![
        class_decl(
            "Stack",
            None,
            vec![
                field("items", Some(array(vec![])), false),
                method(
                    MethodKind::Method,
                    "push",
                    vec![ident("v")],
                    vec![expr_stmt(method_call(member(this(), "items"), "push", vec![ident("v")]))],
                ),
            ],
        ),
        const_("s", new_(ident("Stack"), vec![])),
        for_in(
            VariableKind::Const,
            "k",
            ident("s"),
            vec![if_(ident("k"), vec![break_(None)], None)],
        ),
        async_decl("main", vec![], vec![expr_stmt(await_(call(ident("job"), vec![])))]),
    ]);
    let output = compile_ok(&program);
    for (id, node) in output.arena.iter() {
        for reference in node.references() {
            assert!(
                output.arena.contains(reference.target),
                "{id}.{} -> {}",
                reference.field,
                reference.target
            );
        }
    }
    for &id in output.arena.module_body() {
        assert!(output.arena.contains(id));
    }
}

#[test]
fn test_unsupported_input_is_rejected_before_lowering() {
    common::init_tracing();
    let program = Program::new(vec![expr_stmt(call(ident("eval"), vec![string("1")]))]);
    let err = compile(&program, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::InputRejected { .. }));
    assert_eq!(err.code(), "INPUT_REJECTED");
}

#[test]
fn test_options_file_drives_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lunar.json");
    std::fs::write(&path, r#"{"indent": "\t", "header": "built by lunar"}"#).unwrap();
    let options = CompileOptions::from_path(&path).unwrap();

    let program = program(vec![while_(
        ident("running"),
        vec![expr_stmt(call(ident("tick"), vec![]))],
    )]);
    let output = compile(&program, &options).unwrap();
    assert_eq!(output.code, "-- built by lunar\nwhile running do\n\ttick()\nend\n");
}
