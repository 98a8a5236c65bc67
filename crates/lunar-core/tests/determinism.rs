//! Same tree and options in, same bytes out.

mod common;

use lunar_ast::build::*;
use lunar_ast::{BinaryOperator, MethodKind, Program, VariableKind};
use lunar_core::{compile, Arena, CompileOptions};

fn sample() -> Program {
    program(vec![
        class_decl(
            "Point",
            None,
            vec![
                method(
                    MethodKind::Constructor,
                    "constructor",
                    vec![ident("x"), ident("y")],
                    vec![
                        expr_stmt(assign_field("x")),
                        expr_stmt(assign_field("y")),
                    ],
                ),
                method(
                    MethodKind::Method,
                    "norm",
                    vec![],
                    vec![ret(Some(method_call(
                        ident("Math"),
                        "sqrt",
                        vec![binary(
                            BinaryOperator::Add,
                            binary(BinaryOperator::Mul, member(this(), "x"), member(this(), "x")),
                            binary(BinaryOperator::Mul, member(this(), "y"), member(this(), "y")),
                        )],
                    )))],
                ),
            ],
        ),
        generator_decl(
            "range",
            vec![ident("n")],
            vec![for_(
                Some(let_("i", Some(num(0.0)))),
                Some(binary(BinaryOperator::Lt, ident("i"), ident("n"))),
                Some(update(lunar_ast::UpdateOperator::Increment, false, ident("i"))),
                vec![expr_stmt(yield_(Some(ident("i")), false))],
            )],
        ),
        for_of(
            VariableKind::Const,
            ident("i"),
            call(ident("range"), vec![num(3.0)]),
            vec![expr_stmt(method_call(
                ident("console"),
                "log",
                vec![template(&["item ", ""], vec![ident("i")])],
            ))],
        ),
        try_(
            vec![throw(new_(ident("Error"), vec![string("boom")]))],
            Some((
                Some(ident("e")),
                vec![expr_stmt(call(ident("print"), vec![member(ident("e"), "message")]))],
            )),
            Some(vec![expr_stmt(call(ident("done"), vec![]))]),
        ),
    ])
}

fn assign_field(name: &str) -> lunar_ast::Node {
    assign(lunar_ast::AssignmentOperator::Assign, member(this(), name), ident(name))
}

#[test]
fn test_repeated_compilation_is_byte_identical() {
    common::init_tracing();
    let options = CompileOptions::default();
    let first = compile(&sample(), &options).unwrap();
    let second = compile(&sample(), &options).unwrap();
    assert_eq!(first.code, second.code);
    assert_eq!(
        first.arena.to_canonical_json().unwrap(),
        second.arena.to_canonical_json().unwrap()
    );
}

#[test]
fn test_canonical_json_round_trips() {
    common::init_tracing();
    let output = compile(&sample(), &CompileOptions::default()).unwrap();
    let json = output.arena.to_canonical_json().unwrap();
    let restored = Arena::from_json(&json).unwrap();
    assert_eq!(restored, output.arena);
    assert_eq!(restored.to_canonical_json().unwrap(), json);
}

#[test]
fn test_options_change_only_what_they_control() {
    common::init_tracing();
    let tabs = CompileOptions::default().with_indent("\t");
    let spaces = compile(&sample(), &CompileOptions::default()).unwrap();
    let tabbed = compile(&sample(), &tabs).unwrap();
    assert_eq!(
        spaces.arena.to_canonical_json().unwrap(),
        tabbed.arena.to_canonical_json().unwrap()
    );
    assert_eq!(spaces.code.replace("  ", "\t"), tabbed.code);
}
