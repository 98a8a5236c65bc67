use super::*;
use crate::emit::emit;
use crate::validate::validate_ir;
use lunar_ast::build::*;
use lunar_ast::{
    AssignmentOperator, BinaryOperator as Js, LogicalOperator as JsLogical, MethodKind as JsMethod,
    UnaryOperator as JsUnary, UpdateOperator,
};

fn compile(body: Vec<Node>) -> String {
    compile_with(body, &CompileOptions::default())
}

fn compile_with(body: Vec<Node>, options: &CompileOptions) -> String {
    let lowered = lower(&program(body), options).unwrap();
    validate_ir(&lowered.arena).unwrap();
    emit(&lowered.arena, options).unwrap()
}

fn lower_error(body: Vec<Node>) -> LoweringError {
    lower(&program(body), &CompileOptions::default()).unwrap_err()
}

// =========================================================================
// Operators
// =========================================================================

#[test]
fn test_plus_on_numbers_adds() {
    let code = compile(vec![
        const_("a", num(1.0)),
        const_("b", num(2.0)),
        const_("c", binary(Js::Add, ident("a"), ident("b"))),
    ]);
    assert!(code.contains("local c = a + b"), "{code}");
}

#[test]
fn test_plus_with_a_string_concatenates() {
    let code = compile(vec![
        const_("name", string("lua")),
        const_("greeting", binary(Js::Add, string("hi "), ident("name"))),
        const_("label", binary(Js::Add, ident("name"), ident("unknown"))),
    ]);
    assert!(code.contains("local greeting = \"hi \" .. name"), "{code}");
    assert!(code.contains("local label = name .. tostring(unknown)"), "{code}");
}

#[test]
fn test_plus_without_hints_adds() {
    let options = CompileOptions::default().with_infer_local_types(false);
    let code = compile_with(
        vec![
            const_("name", string("lua")),
            const_("label", binary(Js::Add, ident("name"), num(1.0))),
        ],
        &options,
    );
    assert!(code.contains("local label = name + 1"), "{code}");
}

#[test]
fn test_strict_equality_and_modulo() {
    let code = compile(vec![
        const_("same", binary(Js::StrictEq, ident("a"), ident("b"))),
        const_("odd", binary(Js::Mod, ident("n"), num(2.0))),
        const_("neither", logical(JsLogical::And, unary(JsUnary::Not, ident("a")), ident("b"))),
    ]);
    assert!(code.contains("local same = a == b"), "{code}");
    assert!(code.contains("local odd = math.fmod(n, 2)"), "{code}");
    assert!(code.contains("local neither = not a and b"), "{code}");
}

#[test]
fn test_typeof_requires_helper() {
    let lowered = lower(
        &program(vec![const_("t", unary(JsUnary::Typeof, ident("x")))]),
        &CompileOptions::default(),
    )
    .unwrap();
    assert_eq!(lowered.helpers, vec![RuntimeHelper::Typeof]);
}

#[test]
fn test_compound_assignment_and_update() {
    let code = compile(vec![
        let_("n", Some(num(0.0))),
        expr_stmt(assign(AssignmentOperator::AddAssign, ident("n"), num(2.0))),
        expr_stmt(update(UpdateOperator::Increment, false, ident("n"))),
    ]);
    assert!(code.contains("n = n + 2"), "{code}");
    assert!(code.contains("n = n + 1"), "{code}");
}

// =========================================================================
// Declarations and destructuring
// =========================================================================

#[test]
fn test_shorthand_object_destructuring() {
    let code = compile(vec![
        const_("point", object(vec![prop("x", num(1.0)), prop("y", num(2.0))])),
        var_decl(
            VariableKind::Const,
            object_pattern(vec![shorthand("x"), shorthand("y")]),
            Some(ident("point")),
        ),
    ]);
    assert!(code.contains("local point = {x = 1, y = 2}"), "{code}");
    assert!(code.contains("local x, y = point.x, point.y"), "{code}");
}

#[test]
fn test_array_destructuring_with_default() {
    let code = compile(vec![var_decl(
        VariableKind::Let,
        array_pattern(vec![Some(ident("first")), Some(default(ident("second"), num(5.0)))]),
        Some(ident("pair")),
    )]);
    assert!(code.contains("second == nil"), "{code}");
    assert!(code.contains("second = 5"), "{code}");
}

#[test]
fn test_keyword_names_are_renamed() {
    let code = compile(vec![
        const_("end", num(1.0)),
        expr_stmt(call(ident("print"), vec![ident("end")])),
    ]);
    assert!(!code.contains("local end ="), "{code}");
}

// =========================================================================
// Control flow
// =========================================================================

#[test]
fn test_switch_fall_through() {
    let code = compile(vec![switch(
        ident("x"),
        vec![
            case(Some(num(1.0)), vec![]),
            case(Some(num(2.0)), vec![expr_stmt(call(ident("a"), vec![])), break_(None)]),
            case(Some(num(3.0)), vec![expr_stmt(call(ident("b"), vec![]))]),
            case(None, vec![expr_stmt(call(ident("c"), vec![]))]),
        ],
    )]);
    assert!(code.contains("local __switch = x"), "{code}");
    assert!(code.contains("if __switch == 1 or __switch == 2 then"), "{code}");
    assert!(code.contains("elseif __switch == 3 then"), "{code}");
    // Case 3 falls into the default.
    let three = code.find("elseif __switch == 3").unwrap();
    let default = code.find("else\n").unwrap();
    assert!(code[three..default].contains("b()"), "{code}");
    assert!(code[three..default].contains("c()"), "{code}");
}

#[test]
fn test_switch_default_between_cases() {
    let code = compile(vec![switch(
        ident("x"),
        vec![
            case(Some(num(1.0)), vec![expr_stmt(call(ident("a"), vec![]))]),
            case(None, vec![expr_stmt(call(ident("d"), vec![]))]),
            case(Some(num(2.0)), vec![expr_stmt(call(ident("b"), vec![])), break_(None)]),
        ],
    )]);
    let one = code.find("if __switch == 1 then").unwrap();
    let two = code.find("elseif __switch == 2 then").unwrap();
    let default = code.find("else\n").unwrap();
    assert!(one < two && two < default, "{code}");
    // Case 1 falls through the default into case 2.
    let first = &code[one..two];
    assert!(first.contains("a()") && first.contains("d()") && first.contains("b()"), "{code}");
    assert!(!code[two..default].contains("d()"), "{code}");
    assert!(code[default..].contains("d()") && code[default..].contains("b()"), "{code}");
}

#[test]
fn test_finally_runs_before_early_return() {
    let code = compile(vec![function_decl(
        "f",
        vec![],
        vec![try_(
            vec![ret(Some(num(1.0)))],
            None,
            Some(vec![expr_stmt(call(ident("cleanup"), vec![]))]),
        )],
    )]);
    assert!(code.contains("local __ok, __flow, __value = pcall(function()"), "{code}");
    assert!(code.contains("return \"return\", 1"), "{code}");
    let cleanup = code.find("cleanup()").unwrap();
    let reissue = code.find("if __flow == \"return\" then").unwrap();
    assert!(cleanup < reissue, "{code}");
    assert!(code.contains("return __value"), "{code}");
}

#[test]
fn test_catch_binds_error() {
    let code = compile(vec![try_(
        vec![throw(string("boom"))],
        Some((Some(ident("e")), vec![expr_stmt(call(ident("print"), vec![ident("e")]))])),
        None,
    )]);
    assert!(code.contains("error(\"boom\", 0)"), "{code}");
    assert!(code.contains("pcall(function(e)"), "{code}");
}

#[test]
fn test_continue_becomes_goto() {
    let code = compile(vec![for_of(
        VariableKind::Const,
        ident("x"),
        ident("xs"),
        vec![
            if_(ident("x"), vec![continue_(None)], None),
            expr_stmt(call(ident("print"), vec![ident("x")])),
        ],
    )]);
    assert!(code.contains("for _, x in ipairs(xs) do"), "{code}");
    assert!(code.contains("goto "), "{code}");
}

#[test]
fn test_labeled_break_leaves_outer_loop() {
    let inner = while_(boolean(true), vec![break_(Some("outer"))]);
    let code = compile(vec![labeled("outer", while_(boolean(true), vec![inner]))]);
    assert!(code.contains("goto "), "{code}");
    assert!(code.contains("::"), "{code}");
}

#[test]
fn test_break_to_unknown_label_fails() {
    let err = lower_error(vec![while_(boolean(true), vec![break_(Some("nowhere"))])]);
    assert_eq!(err.node_type, "BreakStatement");
}

// =========================================================================
// Classes
// =========================================================================

#[test]
fn test_class_with_inheritance() {
    let code = compile(vec![
        class_decl(
            "Animal",
            None,
            vec![
                method(
                    JsMethod::Constructor,
                    "constructor",
                    vec![ident("name")],
                    vec![expr_stmt(assign(
                        AssignmentOperator::Assign,
                        member(this(), "name"),
                        ident("name"),
                    ))],
                ),
                method(JsMethod::Method, "speak", vec![], vec![ret(Some(member(this(), "name")))]),
            ],
        ),
        class_decl(
            "Dog",
            Some(ident("Animal")),
            vec![method(
                JsMethod::Method,
                "speak",
                vec![],
                vec![ret(Some(call(member(super_(), "speak"), vec![])))],
            )],
        ),
        const_("d", new_(ident("Dog"), vec![string("rex")])),
    ]);
    assert!(code.contains("local Animal = {}"), "{code}");
    assert!(code.contains("local Dog = setmetatable({}, { __index = Animal })"), "{code}");
    assert!(code.contains("function Animal.constructor(self, name)"), "{code}");
    assert!(code.contains("self.name = name"), "{code}");
    assert!(code.contains("Animal.speak(self)"), "{code}");
    assert!(code.contains("local d = Dog.new(\"rex\")"), "{code}");
}

#[test]
fn test_derived_class_inherits_accessors() {
    let code = compile(vec![
        class_decl(
            "Shape",
            None,
            vec![method(JsMethod::Get, "label", vec![], vec![ret(Some(string("shape")))])],
        ),
        class_decl("Square", Some(ident("Shape")), vec![]),
    ]);
    assert!(code.contains("Shape.__get = {}"), "{code}");
    assert!(code.contains("function Shape.__get.label(self)"), "{code}");
    assert!(
        code.contains("Square.__get = setmetatable({}, { __index = Shape.__get })"),
        "{code}"
    );
    assert!(code.contains("function Square.__index(t, k)"), "{code}");
    assert!(code.contains("function Square.__newindex(t, k, v)"), "{code}");
}

#[test]
fn test_error_subclass_gets_message_and_name() {
    let code = compile(vec![class_decl("NotFound", Some(ident("Error")), vec![])]);
    assert!(code.contains("self.message = message or \"\""), "{code}");
    assert!(code.contains("self.name = \"Error\""), "{code}");
}

#[test]
fn test_instance_fields_run_after_super() {
    let code = compile(vec![
        class_decl("Base", None, vec![]),
        class_decl(
            "Counter",
            Some(ident("Base")),
            vec![
                field("count", Some(num(0.0)), false),
                method(
                    JsMethod::Constructor,
                    "constructor",
                    vec![],
                    vec![
                        expr_stmt(call(super_(), vec![])),
                        expr_stmt(call(ident("log"), vec![member(this(), "count")])),
                    ],
                ),
            ],
        ),
    ]);
    let parent = code.find("Base.constructor(self)").unwrap();
    let field = code.find("self.count = 0").unwrap();
    let log = code.find("log(self.count)").unwrap();
    assert!(parent < field && field < log, "{code}");
}

// =========================================================================
// Functions, generators and async
// =========================================================================

#[test]
fn test_rest_and_default_params() {
    let code = compile(vec![function_decl(
        "f",
        vec![default(ident("a"), num(1.0)), rest(ident("more"))],
        vec![ret(Some(ident("more")))],
    )]);
    assert!(code.contains("local function f(a, ...)"), "{code}");
    assert!(code.contains("local more = {...}"), "{code}");
    assert!(code.contains("if a == nil then"), "{code}");
}

#[test]
fn test_generator_uses_protocol_iteration() {
    let code = compile(vec![
        generator_decl(
            "count",
            vec![],
            vec![
                expr_stmt(yield_(Some(num(1.0)), false)),
                expr_stmt(yield_(Some(num(2.0)), false)),
            ],
        ),
        for_of(
            VariableKind::Const,
            ident("n"),
            call(ident("count"), vec![]),
            vec![expr_stmt(call(ident("print"), vec![ident("n")]))],
        ),
    ]);
    assert!(code.contains("local function __lunar_generator(body)"), "{code}");
    assert!(code.contains("return __lunar_generator(function()"), "{code}");
    assert!(code.contains("for n in __lunar_iter(count()) do"), "{code}");
    assert!(code.contains("__lunar_suspend(1)"), "{code}");
}

#[test]
fn test_async_function_drains_tasks() {
    let body = vec![async_decl(
        "main",
        vec![],
        vec![expr_stmt(await_(call(ident("work"), vec![])))],
    ), expr_stmt(call(ident("main"), vec![]))];

    let code = compile(body.clone());
    assert!(code.contains("local __lunar_tasks = {}"), "{code}");
    assert!(code.contains("return __lunar_async(function()"), "{code}");
    assert!(code.trim_end().ends_with("__lunar_drain()"), "{code}");

    let code = compile_with(body, &CompileOptions::default().with_drain_tasks(false));
    assert!(!code.contains("__lunar_drain()"), "{code}");
}

// =========================================================================
// Builtins
// =========================================================================

#[test]
fn test_console_and_math() {
    let code = compile(vec![
        expr_stmt(method_call(ident("console"), "log", vec![string("hi")])),
        const_("r", method_call(ident("Math"), "floor", vec![ident("x")])),
    ]);
    assert!(code.contains("print(\"hi\")"), "{code}");
    assert!(code.contains("local r = math.floor(x)"), "{code}");
}

#[test]
fn test_shadowed_global_is_left_alone() {
    let code = compile(vec![
        const_("console", object(vec![prop("log", arrow(vec![], vec![]))])),
        expr_stmt(method_call(ident("console"), "log", vec![string("hi")])),
    ]);
    assert!(!code.contains("print(\"hi\")"), "{code}");
}

#[test]
fn test_array_methods_map_to_table_library() {
    let code = compile(vec![
        const_("xs", array(vec![num(1.0)])),
        expr_stmt(method_call(ident("xs"), "push", vec![num(2.0)])),
        const_("s", method_call(ident("xs"), "join", vec![string("-")])),
        const_("n", member(ident("xs"), "length")),
    ]);
    assert!(code.contains("table.insert(xs, 2)"), "{code}");
    assert!(code.contains("local s = table.concat(xs, \"-\")"), "{code}");
    assert!(code.contains("local n = #xs"), "{code}");
}

#[test]
fn test_own_method_names_disable_mapping() {
    let code = compile(vec![
        const_("stack", object(vec![method_prop("push", vec![ident("v")], vec![])])),
        expr_stmt(method_call(ident("stack"), "push", vec![num(1.0)])),
    ]);
    assert!(code.contains("stack:push(1)"), "{code}");
}

#[test]
fn test_push_with_several_items_returns_length() {
    let body = vec![
        const_("xs", array(vec![])),
        const_("n", method_call(ident("xs"), "push", vec![num(1.0), num(2.0)])),
        expr_stmt(method_call(ident("xs"), "push", vec![spread(ident("ys"))])),
    ];
    let lowered = lower(&program(body), &CompileOptions::default()).unwrap();
    assert_eq!(lowered.helpers, vec![RuntimeHelper::Push]);
    let code = emit(&lowered.arena, &CompileOptions::default()).unwrap();
    assert!(code.contains("local function __lunar_push(list, ...)"), "{code}");
    assert!(code.contains("return #list"), "{code}");
    assert!(code.contains("local n = __lunar_push(xs, 1, 2)"), "{code}");
    assert!(code.contains("__lunar_push(xs, table.unpack(ys))"), "{code}");
}

#[test]
fn test_spread_into_variadic_builtins() {
    let code = compile(vec![
        const_("top", method_call(ident("Math"), "max", vec![spread(ident("xs"))])),
        expr_stmt(method_call(ident("console"), "log", vec![string("all:"), spread(ident("xs"))])),
    ]);
    assert!(code.contains("local top = math.max(table.unpack(xs))"), "{code}");
    assert!(code.contains("print(\"all:\", table.unpack(xs))"), "{code}");
}

#[test]
fn test_unmapped_builtins_fail() {
    let err = lower_error(vec![const_("t", method_call(ident("Math"), "trunc", vec![ident("x")]))]);
    assert_eq!(err.node_type, "MemberExpression");
    assert!(err.reason.contains("Math.trunc"), "{}", err.reason);

    let err = lower_error(vec![const_("e", member(ident("Math"), "LOG2E"))]);
    assert!(err.reason.contains("Math.LOG2E"), "{}", err.reason);

    let err = lower_error(vec![expr_stmt(method_call(
        ident("JSON"),
        "stringify",
        vec![ident("value")],
    ))]);
    assert!(err.reason.contains("JSON.stringify"), "{}", err.reason);

    let err = lower_error(vec![const_(
        "s",
        method_call(ident("xs"), "join", vec![string(","), string("extra")]),
    )]);
    assert!(err.reason.contains(".join"), "{}", err.reason);
}

#[test]
fn test_unmapped_method_on_own_object_is_a_method_call() {
    let code = compile(vec![expr_stmt(method_call(ident("queue"), "drain", vec![num(1.0)]))]);
    assert!(code.contains("queue:drain(1)"), "{code}");
}

// =========================================================================
// Integer and index semantics
// =========================================================================

#[test]
fn test_bitwise_operators_wrap_to_32_bits() {
    let body = vec![
        const_("a", binary(Js::BitOr, binary(Js::Div, num(7.0), num(2.0)), num(0.0))),
        const_("b", binary(Js::UShr, ident("x"), num(28.0))),
        const_("c", unary(JsUnary::BitNot, ident("x"))),
    ];
    let lowered = lower(&program(body), &CompileOptions::default()).unwrap();
    assert_eq!(lowered.helpers, vec![RuntimeHelper::Uint32, RuntimeHelper::Int32]);
    let code = emit(&lowered.arena, &CompileOptions::default()).unwrap();
    assert!(
        code.contains("local a = __lunar_int32(__lunar_uint32(7 / 2) | __lunar_uint32(0))"),
        "{code}"
    );
    assert!(
        code.contains("local b = __lunar_uint32(x) >> (__lunar_uint32(28) & 31)"),
        "{code}"
    );
    assert!(code.contains("local c = __lunar_int32(~__lunar_uint32(x))"), "{code}");
    assert!(code.contains("n = math.fmod(n, 4294967296)"), "{code}");
}

#[test]
fn test_index_key_of_unknown_type_shifts_at_run_time() {
    let body = vec![
        function_decl(
            "at",
            vec![ident("list"), ident("i")],
            vec![
                expr_stmt(assign(
                    AssignmentOperator::Assign,
                    index(ident("list"), ident("i")),
                    num(0.0),
                )),
                ret(Some(index(ident("list"), ident("i")))),
            ],
        ),
        for_in(
            VariableKind::Const,
            "k",
            ident("o"),
            vec![expr_stmt(call(ident("print"), vec![index(ident("o"), ident("k"))]))],
        ),
    ];
    let lowered = lower(&program(body), &CompileOptions::default()).unwrap();
    assert_eq!(lowered.helpers, vec![RuntimeHelper::Index]);
    let code = emit(&lowered.arena, &CompileOptions::default()).unwrap();
    assert!(code.contains("if type(key) == \"number\" then"), "{code}");
    assert!(code.contains("list[__lunar_index(i)] = 0"), "{code}");
    assert!(code.contains("return list[__lunar_index(i)]"), "{code}");
    assert!(code.contains("print(o[k])"), "{code}");
}

// =========================================================================
// Determinism
// =========================================================================

#[test]
fn test_node_ids_are_stable() {
    let body = || {
        vec![
            const_("a", num(1.0)),
            function_decl(
                "f",
                vec![ident("x")],
                vec![ret(Some(binary(Js::Mul, ident("x"), ident("a"))))],
            ),
        ]
    };
    let first = lower(&program(body()), &CompileOptions::default()).unwrap();
    let second = lower(&program(body()), &CompileOptions::default()).unwrap();
    assert_eq!(
        first.arena.to_canonical_json().unwrap(),
        second.arena.to_canonical_json().unwrap()
    );
}
