//! End-to-end pipeline tests: check → emit → verify → run.
//!
//! Programs are built as ASTs directly (the surface parser is an external
//! collaborator); each test drives the full pipeline and observes the
//! entry function's result value or the surfaced error.

use std::sync::Arc;

use ardc_ast::build as b;
use ardc_ast::{BinaryOp, ExprKind, Pattern, TemplateChunk};
use ardc_drv::Pipeline;
use ardc_sem::MapResolver;
use ardc_util::Symbol;
use ardc_vm::{FfiRegistry, RuntimeError, Value};

fn run(program: ardc_ast::Program) -> Value {
    let resolver = MapResolver::new();
    let pipeline = Pipeline::new(&resolver);
    pipeline
        .check_and_run(&program, "main.ard")
        .expect("program should check and run")
}

fn run_err(program: ardc_ast::Program) -> RuntimeError {
    let resolver = MapResolver::new();
    let pipeline = Pipeline::new(&resolver);
    let outcome = pipeline.check(&program, "main.ard");
    assert!(outcome.is_ok(), "{}", outcome.render_diagnostics());
    let compiled = pipeline.compile(&outcome.module).unwrap();
    pipeline.run(&compiled).expect_err("program should fail at runtime")
}

// ----------------------------------------------------------------------
// End-to-end scenarios
// ----------------------------------------------------------------------

#[test]
fn scenario_range_loop_sums_inclusively() {
    // mut sum = 0; for i in 1..5 { sum = sum + i } sum
    let program = b::program(vec![
        b::mut_("sum", b::int(0)),
        b::for_range(
            "i",
            b::int(1),
            b::int(5),
            b::block(vec![b::reassign(
                b::ident("sum"),
                b::binary(BinaryOp::Add, b::ident("sum"), b::ident("i")),
            )]),
        ),
        b::expr_stmt(b::ident("sum")),
    ]);
    assert_eq!(run(program), Value::Int(15));
}

#[test]
fn scenario_maybe_some_expect() {
    // use ard/maybe; maybe::some(42).expect("nope")
    let program = b::program_with_imports(
        vec![b::import("ard/maybe")],
        vec![b::expr_stmt(b::method(
            b::static_call("maybe", "some", vec![b::int(42)]),
            "expect",
            vec![b::str_("nope")],
        ))],
    );
    assert_eq!(run(program), Value::Int(42));
}

#[test]
fn scenario_maybe_none_expect_panics_with_message() {
    // use ard/maybe; maybe::none().expect("was none")
    let program = b::program_with_imports(
        vec![b::import("ard/maybe")],
        vec![b::expr_stmt(b::method(
            b::static_call("maybe", "none", vec![]),
            "expect",
            vec![b::str_("was none")],
        ))],
    );
    let err = run_err(program);
    assert!(err.to_string().contains("was none"), "got: {err}");
}

#[test]
fn scenario_enum_match_with_default() {
    // enum Dir { Up, Down, Left, Right }
    // let d = Dir::Right
    // match d { Dir::Up => "N", Dir::Down => "S", _ => "lat" }
    let dir = |v: &str| Pattern::Variant {
        enum_name: Symbol::intern("Dir"),
        variant: Symbol::intern(v),
    };
    let program = b::program(vec![
        b::enum_("Dir", vec!["Up", "Down", "Left", "Right"]),
        b::let_("d", b::static_access("Dir", "Right")),
        b::expr_stmt(b::match_(
            b::ident("d"),
            vec![
                b::arm(dir("Up"), b::str_("N")),
                b::arm(dir("Down"), b::str_("S")),
                b::arm(Pattern::Wildcard, b::str_("lat")),
            ],
        )),
    ]);
    assert_eq!(run(program), Value::str("lat"));
}

#[test]
fn scenario_union_match_binds_member() {
    // type P = Int|Str
    // fn show(p: P) Str { match p { Int(n) => n.to_str(), Str(s) => s } }
    // show(20)
    let type_binding = |ty: &str, name: &str| Pattern::TypeBinding {
        type_name: Symbol::intern(ty),
        binding: Symbol::intern(name),
    };
    let program = b::program(vec![
        b::union_("P", vec![b::ty_int(), b::ty_str()]),
        b::fn_(
            "show",
            vec![b::param("p", b::ty_named("P"))],
            Some(b::ty_str()),
            b::block(vec![b::expr_stmt(b::match_(
                b::ident("p"),
                vec![
                    b::arm(
                        type_binding("Int", "n"),
                        b::method(b::ident("n"), "to_str", vec![]),
                    ),
                    b::arm(type_binding("Str", "s"), b::ident("s")),
                ],
            ))]),
        ),
        b::expr_stmt(b::call("show", vec![b::int(20)])),
    ]);
    assert_eq!(run(program), Value::str("20"));
}

#[test]
fn scenario_generic_specialization_on_floats() {
    // fn add(a: $T, b: $T) $T { a + b } ; add(1.5, 2.5)
    let program = b::program(vec![
        b::generic_fn(
            "add",
            vec!["T"],
            vec![b::param("a", b::ty_var("T")), b::param("b", b::ty_var("T"))],
            Some(b::ty_var("T")),
            b::block(vec![b::expr_stmt(b::binary(
                BinaryOp::Add,
                b::ident("a"),
                b::ident("b"),
            ))]),
        ),
        b::expr_stmt(b::call("add", vec![b::float(1.5), b::float(2.5)])),
    ]);
    assert_eq!(run(program), Value::Float(4.0));
}

#[test]
fn scenario_try_propagates_err_without_continuing() {
    // fn parse() Int!Str { Result::err("bad") }
    // fn f() Int!Str { let n = try parse() ; Result::ok(n * 2) }
    // f()
    let program = b::program(vec![
        b::fn_(
            "parse",
            vec![],
            Some(b::ty_result(b::ty_int(), b::ty_str())),
            b::block(vec![b::expr_stmt(b::static_call(
                "Result",
                "err",
                vec![b::str_("bad")],
            ))]),
        ),
        b::fn_(
            "f",
            vec![],
            Some(b::ty_result(b::ty_int(), b::ty_str())),
            b::block(vec![
                b::let_("n", b::try_(b::call("parse", vec![]))),
                b::expr_stmt(b::static_call(
                    "Result",
                    "ok",
                    vec![b::binary(BinaryOp::Mul, b::ident("n"), b::int(2))],
                )),
            ]),
        ),
        b::expr_stmt(b::call("f", vec![])),
    ]);
    match run(program) {
        Value::Result { is_ok, value, .. } => {
            assert!(!is_ok);
            assert_eq!(*value, Value::str("bad"));
        }
        other => panic!("expected an err result, got {other:?}"),
    }
}

#[test]
fn scenario_try_catch_observes_failure_then_propagates() {
    // mut log = [""]
    // fn parse() Int!Str { Result::err("bad") }
    // fn f(mut log: [Str]) Int!Str {
    //     let n = try parse() catch e { log.push(e) }
    //     Result::ok(n * 2)
    // }
    // let r = f(log)
    // match r { ok(v) => log.push("ok"), err(e) => log.push("err") }
    // log
    //
    // the catch block runs with the payload bound, then the err still
    // propagates out of f; the shared list records both observations
    let program = b::program(vec![
        b::mut_("log", b::list(vec![b::str_("")])),
        b::fn_(
            "parse",
            vec![],
            Some(b::ty_result(b::ty_int(), b::ty_str())),
            b::block(vec![b::expr_stmt(b::static_call(
                "Result",
                "err",
                vec![b::str_("bad")],
            ))]),
        ),
        b::fn_(
            "f",
            vec![b::mut_param("log", b::ty_list(b::ty_str()))],
            Some(b::ty_result(b::ty_int(), b::ty_str())),
            b::block(vec![
                b::let_(
                    "n",
                    b::try_catch(
                        b::call("parse", vec![]),
                        "e",
                        b::block(vec![b::expr_stmt(b::method(
                            b::ident("log"),
                            "push",
                            vec![b::ident("e")],
                        ))]),
                    ),
                ),
                b::expr_stmt(b::static_call(
                    "Result",
                    "ok",
                    vec![b::binary(BinaryOp::Mul, b::ident("n"), b::int(2))],
                )),
            ]),
        ),
        b::let_("r", b::call("f", vec![b::ident("log")])),
        b::expr_stmt(b::match_(
            b::ident("r"),
            vec![
                b::arm(
                    Pattern::TypeBinding {
                        type_name: Symbol::intern("ok"),
                        binding: Symbol::intern("v"),
                    },
                    b::method(b::ident("log"), "push", vec![b::str_("ok")]),
                ),
                b::arm(
                    Pattern::TypeBinding {
                        type_name: Symbol::intern("err"),
                        binding: Symbol::intern("e"),
                    },
                    b::method(b::ident("log"), "push", vec![b::str_("err")]),
                ),
            ],
        )),
        b::expr_stmt(b::ident("log")),
    ]);
    assert_eq!(
        run(program),
        Value::list(
            0,
            vec![Value::str(""), Value::str("bad"), Value::str("err")]
        )
    );
}

#[test]
fn scenario_try_catch_on_maybe_propagates_none() {
    // fn find() Int? { Maybe::none() }
    // fn g(mut log: [Str]) Int? {
    //     let n = try find() catch e { log.push("miss") }
    //     Maybe::some(n)
    // }
    // mut log = [""] ; let r = g(log)
    // match r { x => log.push("some"), _ => log.push("none") }
    // log
    let program = b::program(vec![
        b::mut_("log", b::list(vec![b::str_("")])),
        b::fn_(
            "find",
            vec![],
            Some(b::ty_maybe(b::ty_int())),
            b::block(vec![b::expr_stmt(b::static_call("Maybe", "none", vec![]))]),
        ),
        b::fn_(
            "g",
            vec![b::mut_param("log", b::ty_list(b::ty_str()))],
            Some(b::ty_maybe(b::ty_int())),
            b::block(vec![
                b::let_(
                    "n",
                    b::try_catch(
                        b::call("find", vec![]),
                        "e",
                        b::block(vec![b::expr_stmt(b::method(
                            b::ident("log"),
                            "push",
                            vec![b::str_("miss")],
                        ))]),
                    ),
                ),
                b::expr_stmt(b::static_call("Maybe", "some", vec![b::ident("n")])),
            ]),
        ),
        b::let_("r", b::call("g", vec![b::ident("log")])),
        b::expr_stmt(b::match_(
            b::ident("r"),
            vec![
                b::arm(
                    Pattern::Binding(Symbol::intern("x")),
                    b::method(b::ident("log"), "push", vec![b::str_("some")]),
                ),
                b::arm(
                    Pattern::Wildcard,
                    b::method(b::ident("log"), "push", vec![b::str_("none")]),
                ),
            ],
        )),
        b::expr_stmt(b::ident("log")),
    ]);
    assert_eq!(
        run(program),
        Value::list(
            0,
            vec![Value::str(""), Value::str("miss"), Value::str("none")]
        )
    );
}

#[test]
fn scenario_map_iteration_sums_values() {
    // mut m = ["key":3, "foobar":6]; mut sum = 0
    // for k, v in m { sum = sum + v } sum
    let program = b::program(vec![
        b::mut_(
            "m",
            b::map(vec![
                (b::str_("key"), b::int(3)),
                (b::str_("foobar"), b::int(6)),
            ]),
        ),
        b::mut_("sum", b::int(0)),
        b::for_in_kv(
            "k",
            "v",
            b::ident("m"),
            b::block(vec![b::reassign(
                b::ident("sum"),
                b::binary(BinaryOp::Add, b::ident("sum"), b::ident("v")),
            )]),
        ),
        b::expr_stmt(b::ident("sum")),
    ]);
    assert_eq!(run(program), Value::Int(9));
}

// ----------------------------------------------------------------------
// Further pipeline behavior
// ----------------------------------------------------------------------

#[test]
fn test_main_function_becomes_the_entry_result() {
    let program = b::program(vec![b::fn_(
        "main",
        vec![],
        Some(b::ty_int()),
        b::block(vec![b::expr_stmt(b::int(5))]),
    )]);
    assert_eq!(run(program), Value::Int(5));
}

#[test]
fn test_enum_explicit_discriminants_drive_matching() {
    // enum Status { Idle, Busy = 5, Done } ; Done continues from 5
    let status = |v: &str| Pattern::Variant {
        enum_name: Symbol::intern("Status"),
        variant: Symbol::intern(v),
    };
    let program = b::program(vec![
        b::enum_with_values(
            "Status",
            vec![("Idle", None), ("Busy", Some(5)), ("Done", None)],
        ),
        b::let_("s", b::static_access("Status", "Done")),
        b::expr_stmt(b::match_(
            b::ident("s"),
            vec![
                b::arm(status("Idle"), b::int(0)),
                b::arm(status("Busy"), b::int(5)),
                b::arm(status("Done"), b::int(6)),
            ],
        )),
    ]);
    assert_eq!(run(program), Value::Int(6));
}

#[test]
fn test_bool_match() {
    let program = b::program(vec![b::expr_stmt(b::match_(
        b::bool_(true),
        vec![
            b::arm(Pattern::Bool(true), b::int(1)),
            b::arm(Pattern::Bool(false), b::int(2)),
        ],
    ))]);
    assert_eq!(run(program), Value::Int(1));
}

#[test]
fn test_int_match_first_arm_wins() {
    // match 5 { 1..9 => "range", 5 => "exact", _ => "other" }
    let program = b::program(vec![b::expr_stmt(b::match_(
        b::int(5),
        vec![
            b::arm(Pattern::IntRange { start: 1, end: 9 }, b::str_("range")),
            b::arm(Pattern::Int(5), b::str_("exact")),
            b::arm(Pattern::Wildcard, b::str_("other")),
        ],
    ))]);
    assert_eq!(run(program), Value::str("range"));
}

#[test]
fn test_conditional_match() {
    let program = b::program(vec![
        b::let_("n", b::int(7)),
        b::expr_stmt(b::cond_match(vec![
            b::arm(
                Pattern::Guard(b::binary(BinaryOp::Lt, b::ident("n"), b::int(5))),
                b::str_("small"),
            ),
            b::arm(
                Pattern::Guard(b::binary(BinaryOp::Lt, b::ident("n"), b::int(10))),
                b::str_("medium"),
            ),
            b::arm(Pattern::Wildcard, b::str_("large")),
        ])),
    ]);
    assert_eq!(run(program), Value::str("medium"));
}

#[test]
fn test_result_match() {
    let program = b::program(vec![
        b::fn_(
            "half",
            vec![b::param("n", b::ty_int())],
            Some(b::ty_result(b::ty_int(), b::ty_str())),
            b::block(vec![b::expr_stmt(b::static_call(
                "Result",
                "ok",
                vec![b::binary(BinaryOp::Div, b::ident("n"), b::int(2))],
            ))]),
        ),
        b::expr_stmt(b::match_(
            b::call("half", vec![b::int(10)]),
            vec![
                b::arm(
                    Pattern::TypeBinding {
                        type_name: Symbol::intern("ok"),
                        binding: Symbol::intern("v"),
                    },
                    b::ident("v"),
                ),
                b::arm(
                    Pattern::TypeBinding {
                        type_name: Symbol::intern("err"),
                        binding: Symbol::intern("e"),
                    },
                    b::int(-1),
                ),
            ],
        )),
    ]);
    assert_eq!(run(program), Value::Int(5));
}

#[test]
fn test_while_loop_with_break() {
    let program = b::program(vec![
        b::mut_("i", b::int(0)),
        b::while_(
            b::bool_(true),
            b::block(vec![
                b::reassign(
                    b::ident("i"),
                    b::binary(BinaryOp::Add, b::ident("i"), b::int(10)),
                ),
                b::stmt(ardc_ast::StmtKind::Break),
            ]),
        ),
        b::expr_stmt(b::ident("i")),
    ]);
    assert_eq!(run(program), Value::Int(10));
}

#[test]
fn test_list_iteration_and_methods() {
    // mut xs = [1, 2]; xs.push(3); mut sum = 0
    // for x in xs { sum = sum + x } sum
    let program = b::program(vec![
        b::mut_("xs", b::list(vec![b::int(1), b::int(2)])),
        b::expr_stmt(b::method(b::ident("xs"), "push", vec![b::int(3)])),
        b::mut_("sum", b::int(0)),
        b::for_in(
            "x",
            b::ident("xs"),
            b::block(vec![b::reassign(
                b::ident("sum"),
                b::binary(BinaryOp::Add, b::ident("sum"), b::ident("x")),
            )]),
        ),
        b::expr_stmt(b::ident("sum")),
    ]);
    assert_eq!(run(program), Value::Int(6));
}

#[test]
fn test_map_iterates_in_insertion_order() {
    // order is observable: "b" was inserted before "a"
    let program = b::program(vec![
        b::mut_(
            "m",
            b::map(vec![(b::str_("b"), b::int(1)), (b::str_("a"), b::int(2))]),
        ),
        b::mut_("acc", b::str_("")),
        b::for_in_kv(
            "k",
            "v",
            b::ident("m"),
            b::block(vec![b::reassign(
                b::ident("acc"),
                b::binary(BinaryOp::Add, b::ident("acc"), b::ident("k")),
            )]),
        ),
        b::expr_stmt(b::ident("acc")),
    ]);
    assert_eq!(run(program), Value::str("ba"));
}

#[test]
fn test_struct_fields_and_methods() {
    // struct Point { x: Int, y: Int }
    // impl Point { fn sum() Int { @.x + @.y } }
    // let p = Point { x: 3, y: 4 } ; p.sum()
    let self_prop = |name: &str| {
        b::expr(ExprKind::Property {
            subject: Box::new(b::expr(ExprKind::SelfRef)),
            name: Symbol::intern(name),
        })
    };
    let program = b::program(vec![
        b::struct_("Point", vec![("x", b::ty_int()), ("y", b::ty_int())]),
        b::impl_(
            "Point",
            vec![b::fn_decl(
                "sum",
                vec![],
                Some(b::ty_int()),
                b::block(vec![b::expr_stmt(b::binary(
                    BinaryOp::Add,
                    self_prop("x"),
                    self_prop("y"),
                ))]),
            )],
        ),
        b::let_("p", b::struct_lit("Point", vec![("x", b::int(3)), ("y", b::int(4))])),
        b::expr_stmt(b::method(b::ident("p"), "sum", vec![])),
    ]);
    assert_eq!(run(program), Value::Int(7));
}

#[test]
fn test_struct_field_reassignment_requires_mut_root() {
    let program = b::program(vec![
        b::struct_("Point", vec![("x", b::ty_int()), ("y", b::ty_int())]),
        b::mut_("p", b::struct_lit("Point", vec![("x", b::int(1)), ("y", b::int(2))])),
        b::reassign(b::property(b::ident("p"), "x"), b::int(9)),
        b::expr_stmt(b::property(b::ident("p"), "x")),
    ]);
    assert_eq!(run(program), Value::Int(9));
}

#[test]
fn test_closures_capture_enclosing_locals() {
    // fn make_adder(n: Int) (Int) Int { |x: Int| Int { x + n } }
    // let add10 = make_adder(10) ; add10(5)
    let program = b::program(vec![
        b::fn_(
            "make_adder",
            vec![b::param("n", b::ty_int())],
            Some(ardc_ast::TypeExpr::Fn(
                vec![b::ty_int()],
                Box::new(b::ty_int()),
            )),
            b::block(vec![b::expr_stmt(b::lambda(
                vec![b::param("x", b::ty_int())],
                Some(b::ty_int()),
                b::block(vec![b::expr_stmt(b::binary(
                    BinaryOp::Add,
                    b::ident("x"),
                    b::ident("n"),
                ))]),
            ))]),
        ),
        b::let_("add10", b::call("make_adder", vec![b::int(10)])),
        b::expr_stmt(b::expr(ExprKind::Call {
            callee: Box::new(b::ident("add10")),
            type_args: vec![],
            args: vec![b::int(5)],
        })),
    ]);
    assert_eq!(run(program), Value::Int(15));
}

#[test]
fn test_template_strings_interpolate() {
    let program = b::program(vec![
        b::let_("n", b::int(3)),
        b::expr_stmt(b::expr(ExprKind::Template(vec![
            TemplateChunk::Lit("n = ".to_string()),
            TemplateChunk::Expr(b::ident("n")),
        ]))),
    ]);
    assert_eq!(run(program), Value::str("n = 3"));
}

#[test]
fn test_str_methods() {
    let program = b::program(vec![b::expr_stmt(b::method(
        b::method(b::str_("a,b,c"), "split", vec![b::str_(",")]),
        "size",
        vec![],
    ))]);
    assert_eq!(run(program), Value::Int(3));
}

#[test]
fn test_module_function_call() {
    let mut resolver = MapResolver::new();
    resolver.insert(
        "lib/mathx",
        b::program(vec![b::fn_(
            "double",
            vec![b::param("n", b::ty_int())],
            Some(b::ty_int()),
            b::block(vec![b::expr_stmt(b::binary(
                BinaryOp::Mul,
                b::ident("n"),
                b::int(2),
            ))]),
        )]),
    );
    let pipeline = Pipeline::new(&resolver);
    let program = b::program_with_imports(
        vec![b::import("lib/mathx")],
        vec![b::expr_stmt(b::static_call("mathx", "double", vec![b::int(21)]))],
    );
    let result = pipeline.check_and_run(&program, "main.ard").unwrap();
    assert_eq!(result, Value::Int(42));
}

#[test]
fn test_fiber_spawn_and_join() {
    // let h = fiber (|| Int { 21 }) ; h.join() + 21
    let program = b::program(vec![
        b::let_(
            "h",
            b::spawn(b::lambda(
                vec![],
                Some(b::ty_int()),
                b::block(vec![b::expr_stmt(b::int(21))]),
            )),
        ),
        b::expr_stmt(b::binary(
            BinaryOp::Add,
            b::await_(b::ident("h")),
            b::int(21),
        )),
    ]);
    assert_eq!(run(program), Value::Int(42));
}

#[test]
fn test_fiber_panic_propagates_to_joiner() {
    let program = b::program(vec![
        b::let_(
            "h",
            b::spawn(b::lambda(
                vec![],
                Some(b::ty_int()),
                b::block(vec![b::expr_stmt(b::panic_(b::str_("worker died")))]),
            )),
        ),
        b::expr_stmt(b::await_(b::ident("h"))),
    ]);
    let err = run_err(program);
    assert!(err.to_string().contains("worker died"));
}

#[test]
fn test_extern_function_through_ffi() {
    let ffi = Arc::new(FfiRegistry::new());
    ffi.register("test.double", |args, _ret| match &args[0] {
        Value::Int(n) => Ok(Value::Int(n * 2)),
        other => Err(RuntimeError::BadCast(format!(
            "test.double wants an int, got {}",
            other.kind_name()
        ))),
    });
    let resolver = MapResolver::new();
    let pipeline = Pipeline::with_ffi(&resolver, ffi);
    let program = b::program(vec![
        b::stmt(ardc_ast::StmtKind::ExternFn {
            sig: ardc_ast::FnSig {
                name: Symbol::intern("double_it"),
                params: vec![b::param("n", b::ty_int())],
                ret: Some(b::ty_int()),
                span: ardc_util::Span::DUMMY,
            },
            binding: "test.double".to_string(),
        }),
        b::expr_stmt(b::call("double_it", vec![b::int(21)])),
    ]);
    let result = pipeline.check_and_run(&program, "main.ard").unwrap();
    assert_eq!(result, Value::Int(42));
}

#[test]
fn test_ffi_panic_becomes_err_for_result_returns() {
    let ffi = Arc::new(FfiRegistry::new());
    ffi.register("test.risky", |_args, _ret| -> Result<Value, RuntimeError> {
        panic!("socket closed")
    });
    let resolver = MapResolver::new();
    let pipeline = Pipeline::with_ffi(&resolver, ffi);
    let program = b::program(vec![
        b::stmt(ardc_ast::StmtKind::ExternFn {
            sig: ardc_ast::FnSig {
                name: Symbol::intern("risky"),
                params: vec![],
                ret: Some(b::ty_result(b::ty_int(), b::ty_str())),
                span: ardc_util::Span::DUMMY,
            },
            binding: "test.risky".to_string(),
        }),
        b::expr_stmt(b::call("risky", vec![])),
    ]);
    match pipeline.check_and_run(&program, "main.ard").unwrap() {
        Value::Result { is_ok: false, value, .. } => {
            let message = value.display();
            assert!(message.contains("panic in FFI function 'test.risky'"));
            assert!(message.contains("socket closed"));
        }
        other => panic!("expected an err result, got {other:?}"),
    }
}

#[test]
fn test_runtime_panic_unwinds_all_frames() {
    let program = b::program(vec![
        b::fn_(
            "inner",
            vec![],
            Some(b::ty_int()),
            b::block(vec![b::expr_stmt(b::panic_(b::str_("deep failure")))]),
        ),
        b::fn_(
            "outer",
            vec![],
            Some(b::ty_int()),
            b::block(vec![b::expr_stmt(b::call("inner", vec![]))]),
        ),
        b::expr_stmt(b::call("outer", vec![])),
    ]);
    let err = run_err(program);
    assert_eq!(err, RuntimeError::Panic("deep failure".to_string()));
}

// ----------------------------------------------------------------------
// Quantified properties and round-trip laws
// ----------------------------------------------------------------------

#[test]
fn prop_idempotent_typing_and_deterministic_emission() {
    let build = || {
        b::program(vec![
            b::mut_("sum", b::int(0)),
            b::for_range(
                "i",
                b::int(1),
                b::int(5),
                b::block(vec![b::reassign(
                    b::ident("sum"),
                    b::binary(BinaryOp::Add, b::ident("sum"), b::ident("i")),
                )]),
            ),
            b::expr_stmt(b::ident("sum")),
        ])
    };
    let resolver = MapResolver::new();
    let pipeline = Pipeline::new(&resolver);

    let first = pipeline.check(&build(), "main.ard");
    let second = pipeline.check(&build(), "main.ard");
    assert!(first.is_ok() && second.is_ok());
    assert_eq!(
        format!("{:?}", first.module.body),
        format!("{:?}", second.module.body)
    );

    let image_a = pipeline.compile(&first.module).unwrap();
    let image_b = pipeline.compile(&second.module).unwrap();
    assert_eq!(
        format!("{:?}", image_a.functions.raw()),
        format!("{:?}", image_b.functions.raw())
    );
}

#[test]
fn prop_primitive_literals_round_trip() {
    // let x: T = v ; x  returns v for every primitive literal
    assert_eq!(
        run(b::program(vec![
            b::let_typed("x", b::ty_int(), b::int(5)),
            b::expr_stmt(b::ident("x")),
        ])),
        Value::Int(5)
    );
    assert_eq!(
        run(b::program(vec![
            b::let_typed("x", b::ty_float(), b::float(2.5)),
            b::expr_stmt(b::ident("x")),
        ])),
        Value::Float(2.5)
    );
    assert_eq!(
        run(b::program(vec![
            b::let_typed("x", b::ty_str(), b::str_("v")),
            b::expr_stmt(b::ident("x")),
        ])),
        Value::str("v")
    );
    assert_eq!(
        run(b::program(vec![
            b::let_typed("x", b::ty_bool(), b::bool_(true)),
            b::expr_stmt(b::ident("x")),
        ])),
        Value::Bool(true)
    );
}

#[test]
fn prop_maybe_match_agrees_with_or() {
    // match m { x => x, _ => default }  ==  m.or(default)
    let match_version = |m: ardc_ast::Expr| {
        b::program(vec![
            b::let_typed("m", b::ty_maybe(b::ty_int()), m),
            b::expr_stmt(b::match_(
                b::ident("m"),
                vec![
                    b::arm(Pattern::Binding(Symbol::intern("x")), b::ident("x")),
                    b::arm(Pattern::Wildcard, b::int(9)),
                ],
            )),
        ])
    };
    let or_version = |m: ardc_ast::Expr| {
        b::program(vec![
            b::let_typed("m", b::ty_maybe(b::ty_int()), m),
            b::expr_stmt(b::method(b::ident("m"), "or", vec![b::int(9)])),
        ])
    };

    let some = || b::static_call("Maybe", "some", vec![b::int(3)]);
    let none = || b::static_call("Maybe", "none", vec![]);

    assert_eq!(run(match_version(some())), run(or_version(some())));
    assert_eq!(run(match_version(none())), run(or_version(none())));
    assert_eq!(run(match_version(none())), Value::Int(9));
}

#[test]
fn prop_statement_expressions_leave_the_stack_balanced() {
    // a long statement list of discarded expressions still returns the
    // trailing value; the verifier enforces depth bookkeeping underneath
    let mut statements: Vec<ardc_ast::Stmt> = (0..40)
        .map(|i| b::expr_stmt(b::binary(BinaryOp::Add, b::int(i), b::int(1))))
        .collect();
    statements.push(b::expr_stmt(b::int(77)));
    assert_eq!(run(b::program(statements)), Value::Int(77));
}
