//! ardc-sem - Semantic Analyzer
//!
//! Consumes the AST of a single module plus a module resolver, and
//! produces either a checked module (typed IR + symbol information) or a
//! list of diagnostics with source locations, and usually both, since the
//! checker recovers and keeps going after every independent problem.
//!
//! Responsibilities, in checking order:
//!
//! 1. imports (standard-library table + recursive user-module checking)
//! 2. hoisted type declarations (structs, enums, unions, traits)
//! 3. function signatures, before any body, so recursion checks
//! 4. declaration and expression checking (infer / check-against modes)
//! 5. generic specialization (check-time monomorphization, cached)
//! 6. pattern-match classification and exhaustiveness
//! 7. mutability of reassignments and mutating method calls
//! 8. `try` validity against the enclosing function's return type
//! 9. trait conformance
//!
//! The checker never panics on well-formed ASTs; malformed ASTs are
//! programmer errors in the embedding parser.

mod check;
mod generics;
mod infer;
mod matches;
pub mod module;
pub mod scope;
pub mod tir;

pub use check::CheckContext;
pub use module::{
    BuiltinModule, MapResolver, Module, ModuleRef, ModuleResolver, Resolved, ResolveError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use ardc_ast::build as b;
    use ardc_ast::{BinaryOp, Pattern};
    use ardc_types::{Type, TypeRegistry};
    use ardc_util::{DiagnosticCode, Handler};
    use std::rc::Rc;

    fn check_ok(program: ardc_ast::Program) -> Rc<Module> {
        let resolver = MapResolver::new();
        let registry = TypeRegistry::new();
        let handler = Handler::new();
        let cx = CheckContext::new(&resolver, &registry, &handler);
        let module = cx.check_root(&program, "main.ard");
        let rendered: Vec<String> = handler
            .diagnostics()
            .iter()
            .map(|d| d.render(&cx.sources.borrow()))
            .collect();
        assert!(!handler.has_errors(), "unexpected diagnostics: {rendered:?}");
        module
    }

    fn check_err(program: ardc_ast::Program) -> Vec<ardc_util::Diagnostic> {
        let resolver = MapResolver::new();
        let registry = TypeRegistry::new();
        let handler = Handler::new();
        let cx = CheckContext::new(&resolver, &registry, &handler);
        cx.check_root(&program, "main.ard");
        assert!(handler.has_errors(), "expected diagnostics");
        handler.diagnostics()
    }

    fn has_code(diags: &[ardc_util::Diagnostic], code: DiagnosticCode) -> bool {
        diags.iter().any(|d| d.code == Some(code))
    }

    #[test]
    fn test_let_and_arithmetic() {
        let module = check_ok(b::program(vec![
            b::let_("x", b::int(1)),
            b::expr_stmt(b::binary(BinaryOp::Add, b::ident("x"), b::int(2))),
        ]));
        assert_eq!(module.body.len(), 2);
        match &module.body[1] {
            tir::Stmt::Expr(e) => assert_eq!(e.ty, Type::Int),
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_undefined_symbol() {
        let diags = check_err(b::program(vec![b::expr_stmt(b::ident("nope"))]));
        assert!(has_code(&diags, DiagnosticCode::UNDEFINED_SYMBOL));
    }

    #[test]
    fn test_type_mismatch_in_annotation() {
        let diags = check_err(b::program(vec![b::let_typed(
            "x",
            b::ty_int(),
            b::str_("hello"),
        )]));
        assert!(has_code(&diags, DiagnosticCode::TYPE_MISMATCH));
    }

    #[test]
    fn test_reassign_immutable_rejected() {
        let diags = check_err(b::program(vec![
            b::let_("x", b::int(1)),
            b::reassign(b::ident("x"), b::int(2)),
        ]));
        assert!(has_code(&diags, DiagnosticCode::INCOMPATIBLE_MUTATION));
    }

    #[test]
    fn test_reassign_mutable_ok() {
        check_ok(b::program(vec![
            b::mut_("x", b::int(1)),
            b::reassign(b::ident("x"), b::int(2)),
        ]));
    }

    #[test]
    fn test_duplicate_name() {
        let diags = check_err(b::program(vec![
            b::let_("x", b::int(1)),
            b::let_("x", b::int(2)),
        ]));
        assert!(has_code(&diags, DiagnosticCode::DUPLICATE_NAME));
    }

    #[test]
    fn test_int_literal_widens_to_float() {
        check_ok(b::program(vec![b::let_typed("x", b::ty_float(), b::int(3))]));
    }

    #[test]
    fn test_empty_list_refined_by_annotation() {
        let module = check_ok(b::program(vec![b::let_typed(
            "xs",
            b::ty_list(b::ty_int()),
            b::list(vec![]),
        )]));
        match &module.body[0] {
            tir::Stmt::VariableDef(def) => {
                assert_eq!(def.value.ty, Type::List(Box::new(Type::Int)));
            }
            other => panic!("expected variable def, got {other:?}"),
        }
    }

    #[test]
    fn test_bool_match_requires_both_cases() {
        let diags = check_err(b::program(vec![b::expr_stmt(b::match_(
            b::bool_(true),
            vec![b::arm(Pattern::Bool(true), b::int(1))],
        ))]));
        assert!(has_code(&diags, DiagnosticCode::NON_EXHAUSTIVE_MATCH));
    }

    #[test]
    fn test_bool_match_rejects_wildcard() {
        let diags = check_err(b::program(vec![b::expr_stmt(b::match_(
            b::bool_(true),
            vec![
                b::arm(Pattern::Bool(true), b::int(1)),
                b::arm(Pattern::Wildcard, b::int(2)),
            ],
        ))]));
        assert!(has_code(&diags, DiagnosticCode::UNSUPPORTED_PATTERN));
    }

    #[test]
    fn test_enum_match_missing_variant() {
        let dir = |v: &str| Pattern::Variant {
            enum_name: ardc_util::Symbol::intern("Dir"),
            variant: ardc_util::Symbol::intern(v),
        };
        let diags = check_err(b::program(vec![
            b::enum_("Dir", vec!["Up", "Down", "Left", "Right"]),
            b::let_("d", b::static_access("Dir", "Up")),
            b::expr_stmt(b::match_(
                b::ident("d"),
                vec![
                    b::arm(dir("Up"), b::str_("N")),
                    b::arm(dir("Down"), b::str_("S")),
                ],
            )),
        ]));
        assert!(has_code(&diags, DiagnosticCode::NON_EXHAUSTIVE_MATCH));
    }

    #[test]
    fn test_enum_match_with_wildcard() {
        let dir = |v: &str| Pattern::Variant {
            enum_name: ardc_util::Symbol::intern("Dir"),
            variant: ardc_util::Symbol::intern(v),
        };
        check_ok(b::program(vec![
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
        ]));
    }

    #[test]
    fn test_enum_explicit_discriminants_mix() {
        // enum Status { Idle, Busy = 5, Done }: implicit values continue
        // from the last explicit one
        let module = check_ok(b::program(vec![b::enum_with_values(
            "Status",
            vec![("Idle", None), ("Busy", Some(5)), ("Done", None)],
        )]));
        let ty = module
            .body
            .iter()
            .find_map(|stmt| match stmt {
                tir::Stmt::EnumDef(def) => Some(def.ty.clone()),
                _ => None,
            })
            .expect("enum definition missing");
        assert_eq!(ty.discriminant(ardc_util::Symbol::intern("Idle")), Some(0));
        assert_eq!(ty.discriminant(ardc_util::Symbol::intern("Busy")), Some(5));
        assert_eq!(ty.discriminant(ardc_util::Symbol::intern("Done")), Some(6));
        assert_eq!(ty.variant_for(6), Some(ardc_util::Symbol::intern("Done")));
    }

    #[test]
    fn test_int_match_invalid_range() {
        let diags = check_err(b::program(vec![b::expr_stmt(b::match_(
            b::int(3),
            vec![
                b::arm(Pattern::IntRange { start: 9, end: 2 }, b::int(0)),
                b::arm(Pattern::Wildcard, b::int(1)),
            ],
        ))]));
        assert!(has_code(&diags, DiagnosticCode::RANGE_INVALID));
    }

    #[test]
    fn test_try_outside_function_is_error() {
        let diags = check_err(b::program(vec![b::expr_stmt(b::try_(b::static_call(
            "Result",
            "ok",
            vec![b::int(1)],
        )))]));
        assert!(has_code(&diags, DiagnosticCode::BAD_TRY_CONTEXT));
    }

    #[test]
    fn test_try_in_result_function() {
        // fn parse() Int!Str { Result::err("bad") }
        // fn f() Int!Str { let n = try parse() ; Result::ok(n * 2) }
        check_ok(b::program(vec![
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
        ]));
    }

    #[test]
    fn test_try_catch_binds_error_payload() {
        // the catch binding carries the result's error type inside the block
        let module = check_ok(b::program(vec![
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
                    b::let_(
                        "n",
                        b::try_catch(
                            b::call("parse", vec![]),
                            "e",
                            b::block(vec![b::expr_stmt(b::method(
                                b::ident("e"),
                                "size",
                                vec![],
                            ))]),
                        ),
                    ),
                    b::expr_stmt(b::static_call("Result", "ok", vec![b::ident("n")])),
                ]),
            ),
        ]));
        let f = module
            .body
            .iter()
            .find_map(|stmt| match stmt {
                tir::Stmt::FunctionDef(def) if def.name.as_str() == "f" => Some(def),
                _ => None,
            })
            .expect("function f missing");
        let try_op = f.body.stmts.iter().find_map(|stmt| match stmt {
            tir::Stmt::VariableDef(def) => match &def.value.kind {
                tir::ExprKind::TryOp { catch, .. } => catch.as_ref(),
                _ => None,
            },
            _ => None,
        });
        let catch = try_op.expect("try should carry its catch clause");
        assert_eq!(catch.binding, Some(ardc_util::Symbol::intern("e")));
        assert_eq!(catch.body.len(), 1);
    }

    #[test]
    fn test_generic_specialization_appends_copy() {
        // fn add(a: $T, b: $T) $T { a + b } ; add(1.5, 2.5)
        let module = check_ok(b::program(vec![
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
        ]));
        let spec = module.body.iter().find_map(|stmt| match stmt {
            tir::Stmt::FunctionDef(def) if def.name.as_str() == "add$Float" => Some(def),
            _ => None,
        });
        let spec = spec.expect("specialized copy missing");
        assert_eq!(spec.ty.ret, Type::Float);
        match module.body.iter().find(|s| matches!(s, tir::Stmt::Expr(_))) {
            Some(tir::Stmt::Expr(e)) => assert_eq!(e.ty, Type::Float),
            other => panic!("expected call statement, got {other:?}"),
        }
    }

    #[test]
    fn test_conflicting_generic_unification() {
        let diags = check_err(b::program(vec![
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
            b::expr_stmt(b::call("add", vec![b::str_("a"), b::bool_(true)])),
        ]));
        assert!(has_code(&diags, DiagnosticCode::TYPE_MISMATCH));
    }

    #[test]
    fn test_import_unknown_module() {
        let diags = check_err(b::program_with_imports(
            vec![b::import("lib/missing")],
            vec![],
        ));
        assert!(has_code(&diags, DiagnosticCode::UNRESOLVED_IMPORT));
    }

    #[test]
    fn test_import_cycle_detected() {
        let mut resolver = MapResolver::new();
        resolver.insert(
            "lib/a",
            b::program_with_imports(vec![b::import("lib/b")], vec![]),
        );
        resolver.insert(
            "lib/b",
            b::program_with_imports(vec![b::import("lib/a")], vec![]),
        );
        let registry = TypeRegistry::new();
        let handler = Handler::new();
        let cx = CheckContext::new(&resolver, &registry, &handler);
        cx.check_root(
            &b::program_with_imports(vec![b::import("lib/a")], vec![]),
            "main.ard",
        );
        let diags = handler.diagnostics();
        assert!(diags.iter().any(|d| d.message.contains("cyclic import")));
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
        let registry = TypeRegistry::new();
        let handler = Handler::new();
        let cx = CheckContext::new(&resolver, &registry, &handler);
        let module = cx.check_root(
            &b::program_with_imports(
                vec![b::import("lib/mathx")],
                vec![b::expr_stmt(b::static_call("mathx", "double", vec![b::int(21)]))],
            ),
            "main.ard",
        );
        assert!(!handler.has_errors(), "{:?}", handler.diagnostics());
        let modules = module.transitive_user_modules();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].path, "lib/mathx");
    }

    #[test]
    fn test_maybe_prelude_without_import() {
        check_ok(b::program(vec![b::expr_stmt(b::method(
            b::static_call("Maybe", "some", vec![b::int(42)]),
            "expect",
            vec![b::str_("nope")],
        ))]));
    }

    #[test]
    fn test_mutating_method_requires_mutable_subject() {
        let diags = check_err(b::program(vec![
            b::let_("xs", b::list(vec![b::int(1)])),
            b::expr_stmt(b::method(b::ident("xs"), "push", vec![b::int(2)])),
        ]));
        assert!(has_code(&diags, DiagnosticCode::INCOMPATIBLE_MUTATION));
    }

    #[test]
    fn test_idempotent_checking() {
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
        let first = check_ok(build());
        let second = check_ok(build());
        assert_eq!(first.body.len(), second.body.len());
        assert_eq!(format!("{:?}", first.body), format!("{:?}", second.body));
    }
}
