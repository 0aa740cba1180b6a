//! ardc-drv - Pipeline Driver
//!
//! Orchestrates the phases over a parsed program:
//!
//! ```text
//! AST ──▶ [check] ──▶ Module ──▶ [emit] ──▶ Program ──▶ [verify] ──▶ [run]
//! ```
//!
//! This is the embedding API a CLI front end would call: `check` collects
//! diagnostics, `compile` produces a verified program image, `run`
//! executes it on a fresh VM. Diagnostics render one per line as
//! `<file> <row>:<col> <message>`; errors block success, warnings do not.

use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use ardc_code::{emit_program, verify_program, Program};
use ardc_sem::{CheckContext, Module, ModuleResolver};
use ardc_types::TypeRegistry;
use ardc_util::{Diagnostic, Handler, Level, SourceMap};
use ardc_vm::{FfiRegistry, RuntimeError, Value, Vm};

/// The product of checking one program: the checked module graph root,
/// everything the checker reported, and the file names it registered.
pub struct CheckOutcome {
    pub module: Rc<Module>,
    pub diagnostics: Vec<Diagnostic>,
    pub sources: SourceMap,
}

impl CheckOutcome {
    /// Whether the module is clean enough to compile.
    pub fn is_ok(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.level == Level::Error)
    }

    /// Diagnostics rendered in the reporting format, one per line.
    pub fn render_diagnostics(&self) -> String {
        render_diagnostics(&self.diagnostics, &self.sources)
    }
}

/// One compilation pipeline over a module resolver.
pub struct Pipeline<'a> {
    resolver: &'a dyn ModuleResolver,
    registry: Arc<TypeRegistry>,
    ffi: Arc<FfiRegistry>,
}

impl<'a> Pipeline<'a> {
    pub fn new(resolver: &'a dyn ModuleResolver) -> Self {
        Self::with_ffi(resolver, Arc::new(FfiRegistry::new()))
    }

    /// A pipeline whose programs call into a pre-populated FFI registry.
    pub fn with_ffi(resolver: &'a dyn ModuleResolver, ffi: Arc<FfiRegistry>) -> Self {
        Self {
            resolver,
            registry: Arc::new(TypeRegistry::new()),
            ffi,
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn ffi(&self) -> &Arc<FfiRegistry> {
        &self.ffi
    }

    /// Phase 1: semantic analysis. Never fails; inspect the outcome.
    pub fn check(&self, program: &ardc_ast::Program, path: &str) -> CheckOutcome {
        let handler = Handler::new();
        let cx = CheckContext::new(self.resolver, &self.registry, &handler);
        let module = cx.check_root(program, path);
        CheckOutcome {
            module,
            diagnostics: handler.diagnostics(),
            sources: cx.sources.into_inner(),
        }
    }

    /// Phases 2 and 3: emission and verification. Verification failure on
    /// an emitter-produced image is a compiler bug surfaced as an error.
    pub fn compile(&self, module: &Rc<Module>) -> Result<Arc<Program>> {
        let program = emit_program(module, &self.registry);
        verify_program(&program).map_err(|e| anyhow!("verification failed: {e}"))?;
        Ok(Arc::new(program))
    }

    /// Phase 4: execute the entry function on a fresh VM.
    pub fn run(&self, program: &Arc<Program>) -> Result<Value, RuntimeError> {
        Vm::new(
            Arc::clone(program),
            Arc::clone(&self.registry),
            Arc::clone(&self.ffi),
        )
        .run()
    }

    /// The whole pipeline; checking errors and runtime errors both become
    /// driver errors with rendered messages.
    pub fn check_and_run(&self, program: &ardc_ast::Program, path: &str) -> Result<Value> {
        let outcome = self.check(program, path);
        if !outcome.is_ok() {
            return Err(anyhow!("{}", outcome.render_diagnostics()));
        }
        let compiled = self.compile(&outcome.module)?;
        self.run(&compiled).map_err(|e| anyhow!("{e}"))
    }
}

/// `<file> <row>:<col> <message>`, one diagnostic per line.
pub fn render_diagnostics(diagnostics: &[Diagnostic], sources: &SourceMap) -> String {
    diagnostics
        .iter()
        .map(|d| d.render(sources))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ardc_ast::build as b;
    use ardc_sem::MapResolver;

    #[test]
    fn test_clean_program_runs() {
        let resolver = MapResolver::new();
        let pipeline = Pipeline::new(&resolver);
        let program = b::program(vec![b::expr_stmt(b::int(7))]);
        let result = pipeline.check_and_run(&program, "main.ard").unwrap();
        assert_eq!(result, Value::Int(7));
    }

    #[test]
    fn test_check_reports_rendered_diagnostics() {
        let resolver = MapResolver::new();
        let pipeline = Pipeline::new(&resolver);
        let program = b::program(vec![b::expr_stmt(b::ident("missing"))]);
        let outcome = pipeline.check(&program, "main.ard");
        assert!(!outcome.is_ok());
        let rendered = outcome.render_diagnostics();
        assert!(rendered.starts_with("main.ard "));
        assert!(rendered.contains("missing"));
    }

    #[test]
    fn test_check_and_run_fails_on_diagnostics() {
        let resolver = MapResolver::new();
        let pipeline = Pipeline::new(&resolver);
        let program = b::program(vec![b::expr_stmt(b::ident("missing"))]);
        assert!(pipeline.check_and_run(&program, "main.ard").is_err());
    }
}
