//! Run emitted code through a real Lua interpreter.
//!
//! Ignored by default since they need `lua` (5.4) on the PATH:
//!
//! ```text
//! cargo test -p lunar-core --test parity -- --ignored
//! ```

mod common;

use common::compile_ok;
use lunar_ast::build::*;
use lunar_ast::{
    AssignmentOperator, BinaryOperator, MethodKind, Program, UnaryOperator, VariableKind,
};
use std::path::PathBuf;
use std::process::Command;

fn lua() -> PathBuf {
    which::which("lua5.4")
        .or_else(|_| which::which("lua"))
        .expect("no Lua interpreter on PATH")
}

/// Compile `program`, run it, and return its stdout.
fn run(program: &Program) -> String {
    let code = compile_ok(program).code;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.lua");
    std::fs::write(&path, &code).unwrap();

    let output = Command::new(lua()).arg(&path).output().unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "lua failed: {stderr}\n--- code ---\n{code}");
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn log(value: lunar_ast::Node) -> lunar_ast::Node {
    expr_stmt(method_call(ident("console"), "log", vec![value]))
}

#[test]
#[ignore]
fn test_for_of_visits_in_order() {
    let program = program(vec![for_of(
        VariableKind::Const,
        ident("x"),
        array(vec![num(1.0), num(2.0), num(3.0)]),
        vec![log(ident("x"))],
    )]);
    assert_eq!(run(&program), "1\n2\n3\n");
}

#[test]
#[ignore]
fn test_generator_steps() {
    let program = program(vec![
        generator_decl(
            "pair",
            vec![],
            vec![
                expr_stmt(yield_(Some(num(1.0)), false)),
                expr_stmt(yield_(Some(num(2.0)), false)),
            ],
        ),
        const_("g", call(ident("pair"), vec![])),
        const_("a", method_call(ident("g"), "next", vec![])),
        const_("b", method_call(ident("g"), "next", vec![])),
        const_("c", method_call(ident("g"), "next", vec![])),
        log(member(ident("a"), "value")),
        log(member(ident("a"), "done")),
        log(member(ident("b"), "value")),
        log(member(ident("b"), "done")),
        log(member(ident("c"), "value")),
        log(member(ident("c"), "done")),
    ]);
    assert_eq!(run(&program), "1\nfalse\n2\nfalse\nnil\ntrue\n");
}

#[test]
#[ignore]
fn test_finally_before_return() {
    let program = program(vec![
        function_decl(
            "f",
            vec![],
            vec![try_(vec![ret(Some(num(1.0)))], None, Some(vec![log(string("cleanup"))]))],
        ),
        log(call(ident("f"), vec![])),
    ]);
    assert_eq!(run(&program), "cleanup\n1\n");
}

#[test]
#[ignore]
fn test_classes_and_super() {
    let program = program(vec![
        class_decl(
            "Animal",
            None,
            vec![
                method(
                    MethodKind::Constructor,
                    "constructor",
                    vec![ident("name")],
                    vec![expr_stmt(assign(
                        AssignmentOperator::Assign,
                        member(this(), "name"),
                        ident("name"),
                    ))],
                ),
                method(
                    MethodKind::Method,
                    "speak",
                    vec![],
                    vec![ret(Some(member(this(), "name")))],
                ),
            ],
        ),
        class_decl(
            "Dog",
            Some(ident("Animal")),
            vec![method(
                MethodKind::Method,
                "speak",
                vec![],
                vec![ret(Some(binary(
                    BinaryOperator::Add,
                    call(member(super_(), "speak"), vec![]),
                    string(" barks"),
                )))],
            )],
        ),
        log(method_call(new_(ident("Dog"), vec![string("Rex")]), "speak", vec![])),
    ]);
    assert_eq!(run(&program), "Rex barks\n");
}

#[test]
#[ignore]
fn test_async_tasks_settle() {
    let program = program(vec![
        async_decl(
            "main",
            vec![],
            vec![
                const_(
                    "values",
                    await_(method_call(
                        ident("Promise"),
                        "all",
                        vec![array(vec![
                            method_call(ident("Promise"), "resolve", vec![num(1.0)]),
                            num(2.0),
                        ])],
                    )),
                ),
                log(binary(
                    BinaryOperator::Add,
                    index(ident("values"), num(0.0)),
                    index(ident("values"), num(1.0)),
                )),
            ],
        ),
        expr_stmt(call(ident("main"), vec![])),
    ]);
    assert_eq!(run(&program), "3\n");
}

#[test]
#[ignore]
fn test_switch_default_between_cases() {
    let pick = |value: f64| {
        vec![switch(
            num(value),
            vec![
                case(Some(num(1.0)), vec![log(string("one"))]),
                case(None, vec![log(string("default"))]),
                case(Some(num(2.0)), vec![log(string("two")), break_(None)]),
            ],
        )]
    };
    let mut body = pick(1.0);
    body.extend(pick(2.0));
    body.extend(pick(3.0));
    assert_eq!(
        run(&program(body)),
        "one\ndefault\ntwo\ntwo\ndefault\ntwo\n"
    );
}

#[test]
#[ignore]
fn test_accessors_are_inherited() {
    let program = program(vec![
        class_decl(
            "Temperature",
            None,
            vec![
                method(
                    MethodKind::Constructor,
                    "constructor",
                    vec![],
                    vec![expr_stmt(assign(
                        AssignmentOperator::Assign,
                        member(this(), "celsius"),
                        num(0.0),
                    ))],
                ),
                method(
                    MethodKind::Get,
                    "fahrenheit",
                    vec![],
                    vec![ret(Some(binary(
                        BinaryOperator::Add,
                        binary(BinaryOperator::Mul, member(this(), "celsius"), num(2.0)),
                        num(32.0),
                    )))],
                ),
                method(
                    MethodKind::Set,
                    "fahrenheit",
                    vec![ident("f")],
                    vec![expr_stmt(assign(
                        AssignmentOperator::Assign,
                        member(this(), "celsius"),
                        binary(
                            BinaryOperator::Div,
                            binary(BinaryOperator::Sub, ident("f"), num(32.0)),
                            num(2.0),
                        ),
                    ))],
                ),
            ],
        ),
        class_decl("Oven", Some(ident("Temperature")), vec![]),
        const_("oven", new_(ident("Oven"), vec![])),
        expr_stmt(assign(
            AssignmentOperator::Assign,
            member(ident("oven"), "fahrenheit"),
            num(232.0),
        )),
        log(member(ident("oven"), "celsius")),
        log(member(ident("oven"), "fahrenheit")),
    ]);
    assert_eq!(run(&program), "100.0\n232.0\n");
}

#[test]
#[ignore]
fn test_builtins_take_spread_and_extra_arguments() {
    let program = program(vec![
        const_("xs", array(vec![num(4.0), num(9.0)])),
        const_("n", method_call(ident("xs"), "push", vec![num(1.0), num(7.0)])),
        log(ident("n")),
        log(method_call(ident("Math"), "max", vec![spread(ident("xs"))])),
        log(method_call(ident("xs"), "join", vec![string(",")])),
    ]);
    assert_eq!(run(&program), "4\n9\n4,9,1,7\n");
}

#[test]
#[ignore]
fn test_bitwise_operators_use_32_bit_integers() {
    let program = program(vec![
        log(binary(
            BinaryOperator::BitOr,
            binary(BinaryOperator::Div, num(7.0), num(2.0)),
            num(0.0),
        )),
        log(binary(BinaryOperator::UShr, num(-1.0), num(28.0))),
        log(binary(BinaryOperator::Shr, num(-16.0), num(2.0))),
        log(binary(BinaryOperator::Shl, num(1.0), num(31.0))),
        log(unary(UnaryOperator::BitNot, num(5.0))),
        log(binary(BinaryOperator::BitAnd, num(4_294_967_295.0), num(255.0))),
    ]);
    assert_eq!(run(&program), "3\n15\n-4\n-2147483648\n-6\n255\n");
}

#[test]
#[ignore]
fn test_index_with_parameter_key() {
    let program = program(vec![
        function_decl(
            "at",
            vec![ident("list"), ident("i")],
            vec![ret(Some(index(ident("list"), ident("i"))))],
        ),
        const_("xs", array(vec![string("a"), string("b"), string("c")])),
        log(call(ident("at"), vec![ident("xs"), num(0.0)])),
        log(call(ident("at"), vec![ident("xs"), num(2.0)])),
        const_("point", object(vec![prop("x", num(5.0))])),
        log(call(ident("at"), vec![ident("point"), string("x")])),
    ]);
    assert_eq!(run(&program), "a\nc\n5\n");
}
