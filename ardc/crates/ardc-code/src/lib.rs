//! ardc-code - Bytecode Emission and Verification
//!
//! Turns a checked module graph into a program image: an ordered constant
//! pool, a type table, and a function table of fixed-width instruction
//! streams with declared local counts and stack bounds. The verifier
//! walks each emitted function once and rejects anything structurally
//! unsound before the VM runs it.
//!
//! Emission is deterministic: the same checked module produces an
//! identical image on every run.

mod emit;
pub mod instr;
mod program;
pub mod verify;

pub use emit::emit_program;
pub use instr::{Instruction, Op, NO_TARGET};
pub use program::{ConstId, Constant, FuncId, Function, Program, TypeEntry, TypeTable};
pub use verify::{verify_program, VerifyError};

#[cfg(test)]
mod tests {
    use super::*;
    use ardc_ast::build as b;
    use ardc_ast::BinaryOp;
    use ardc_sem::{CheckContext, MapResolver};
    use ardc_types::TypeRegistry;
    use ardc_util::Handler;

    fn compile(program: ardc_ast::Program) -> (Program, TypeRegistry) {
        let resolver = MapResolver::new();
        let registry = TypeRegistry::new();
        let handler = Handler::new();
        let module = {
            let cx = CheckContext::new(&resolver, &registry, &handler);
            cx.check_root(&program, "main.ard")
        };
        assert!(!handler.has_errors(), "{:?}", handler.diagnostics());
        let image = emit_program(&module, &registry);
        (image, registry)
    }

    fn sum_program() -> ardc_ast::Program {
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
    }

    #[test]
    fn test_emitter_is_deterministic() {
        let (first, _) = compile(sum_program());
        let (second, _) = compile(sum_program());
        assert_eq!(
            format!("{:?}", first.functions.raw()),
            format!("{:?}", second.functions.raw())
        );
        assert_eq!(first.constants.raw(), second.constants.raw());
    }

    #[test]
    fn test_emitted_program_verifies() {
        let (image, _) = compile(sum_program());
        verify_program(&image).expect("emitted image must verify");
    }

    #[test]
    fn test_entry_ends_with_return() {
        let (image, _) = compile(sum_program());
        let entry = &image.functions[image.entry];
        assert_eq!(entry.code.last().map(|i| i.op), Some(Op::Return));
    }

    #[test]
    fn test_function_call_emits_call_op() {
        let (image, _) = compile(b::program(vec![
            b::fn_(
                "double",
                vec![b::param("n", b::ty_int())],
                Some(b::ty_int()),
                b::block(vec![b::expr_stmt(b::binary(
                    BinaryOp::Mul,
                    b::ident("n"),
                    b::int(2),
                ))]),
            ),
            b::expr_stmt(b::call("double", vec![b::int(21)])),
        ]));
        verify_program(&image).unwrap();
        let entry = &image.functions[image.entry];
        assert!(entry.code.iter().any(|i| i.op == Op::Call));
    }

    #[test]
    fn test_match_lowers_to_compares_and_jumps() {
        let (image, _) = compile(b::program(vec![b::expr_stmt(b::match_(
            b::int(3),
            vec![
                b::arm(ardc_ast::Pattern::Int(1), b::str_("one")),
                b::arm(ardc_ast::Pattern::IntRange { start: 2, end: 9 }, b::str_("few")),
                b::arm(ardc_ast::Pattern::Wildcard, b::str_("many")),
            ],
        ))]));
        verify_program(&image).unwrap();
        let entry = &image.functions[image.entry];
        assert!(entry.code.iter().any(|i| i.op == Op::Eq));
        assert!(entry.code.iter().any(|i| i.op == Op::JumpIfFalse));
        // no reserved direct-match opcode in the stream
        assert!(!entry.code.iter().any(|i| i.op == Op::MatchInt));
    }

    #[test]
    fn test_closure_captures_recorded() {
        // let n = 10 inside a function whose value is |x| x + n;
        // the lambda must record n as a capture
        let (image, _) = compile(b::program(vec![
            b::fn_(
                "make",
                vec![],
                Some(ardc_ast::TypeExpr::Fn(
                    vec![b::ty_int()],
                    Box::new(b::ty_int()),
                )),
                b::block(vec![
                    b::let_("n", b::int(10)),
                    b::expr_stmt(b::lambda(
                        vec![b::param("x", b::ty_int())],
                        Some(b::ty_int()),
                        b::block(vec![b::expr_stmt(b::binary(
                            BinaryOp::Add,
                            b::ident("x"),
                            b::ident("n"),
                        ))]),
                    )),
                ]),
            ),
            b::expr_stmt(b::expr(ardc_ast::ExprKind::Call {
                callee: Box::new(b::call("make", vec![])),
                type_args: vec![],
                args: vec![b::int(5)],
            })),
        ]));
        verify_program(&image).unwrap();
        let closure = image
            .functions
            .iter()
            .find(|f| f.name.as_str() == "<lambda>")
            .expect("closure function emitted");
        assert_eq!(closure.captures.len(), 1);
        assert!(image
            .functions
            .iter()
            .any(|f| f.code.iter().any(|i| i.op == Op::MakeClosure)));
    }

    #[test]
    fn test_try_catch_emits_patched_catch_target() {
        let (image, _) = compile(b::program(vec![
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
                        b::try_catch(b::call("parse", vec![]), "e", b::block(vec![])),
                    ),
                    b::expr_stmt(b::static_call("Result", "ok", vec![b::ident("n")])),
                ]),
            ),
            b::expr_stmt(b::call("f", vec![])),
        ]));
        verify_program(&image).unwrap();
        let f = image
            .functions
            .iter()
            .find(|function| function.name.as_str() == "f")
            .expect("function f emitted");
        let try_instr = f
            .code
            .iter()
            .find(|i| i.op == Op::TryResult)
            .expect("TryResult emitted");
        assert_ne!(try_instr.a, NO_TARGET);
        assert!((try_instr.a as usize) < f.code.len());
        // the catch path rebuilds the failure and returns on its own
        assert!(f.code.iter().filter(|i| i.op == Op::Return).count() >= 2);
    }

    #[test]
    fn test_try_emits_no_try_in_plain_function() {
        // try discipline: an Int-returning program has no TryResult ops
        let (image, _) = compile(sum_program());
        for function in image.functions.iter() {
            assert!(!function
                .code
                .iter()
                .any(|i| matches!(i.op, Op::TryResult | Op::TryMaybe)));
        }
    }

    #[test]
    fn test_extern_fn_emits_call_extern_wrapper() {
        let (image, _) = compile(b::program(vec![ardc_ast::build::stmt(
            ardc_ast::StmtKind::ExternFn {
                sig: ardc_ast::FnSig {
                    name: ardc_util::Symbol::intern("now_ms"),
                    params: vec![],
                    ret: Some(b::ty_int()),
                    span: ardc_util::Span::DUMMY,
                },
                binding: "clock.now_ms".to_string(),
            },
        )]));
        verify_program(&image).unwrap();
        let wrapper = image
            .functions
            .iter()
            .find(|f| f.name.as_str() == "now_ms")
            .expect("extern wrapper emitted");
        assert_eq!(wrapper.code.len(), 2);
        assert_eq!(wrapper.code[0].op, Op::CallExtern);
        assert_eq!(wrapper.code[1].op, Op::Return);
    }

    #[quickcheck_macros::quickcheck]
    fn prop_arithmetic_programs_verify(a: i32, b_val: i32) -> bool {
        let program = b::program(vec![
            b::mut_("s", b::int(a as i64)),
            b::reassign(
                b::ident("s"),
                b::binary(BinaryOp::Add, b::ident("s"), b::int(b_val as i64)),
            ),
            b::expr_stmt(b::ident("s")),
        ]);
        let (image, _) = compile(program);
        verify_program(&image).is_ok()
    }
}
