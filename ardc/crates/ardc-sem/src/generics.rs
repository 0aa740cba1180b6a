//! Generic specialization.
//!
//! Specialization happens at check time (monomorphization by type
//! substitution). A call to a generic function binds its type variables,
//! by position from explicit type arguments or by unifying parameter
//! types against argument types, then produces a fresh, concrete copy of
//! the function that is type-checked like any other and appended to the
//! module. Copies are cached by `(function, ordered type-argument ids)`.

use std::rc::Rc;
use std::sync::Arc;

use ardc_ast as ast;
use ardc_types::{FnType, Parameter, Type, TypeId};
use ardc_util::{DiagnosticCode as Code, FxHashMap, Span, Symbol};

use crate::check::Checker;
use crate::scope::FunctionInfo;
use crate::tir::{self, ExprKind};

/// Cache of monomorphized copies produced while checking one module.
#[derive(Default)]
pub(crate) struct SpecializationTable {
    cache: FxHashMap<(Symbol, Vec<TypeId>), SpecEntry>,
    defs: Vec<Rc<tir::FunctionDef>>,
}

#[derive(Clone)]
struct SpecEntry {
    name: Symbol,
    ty: Arc<FnType>,
}

impl SpecializationTable {
    pub(crate) fn take_defs(&mut self) -> Vec<Rc<tir::FunctionDef>> {
        std::mem::take(&mut self.defs)
    }
}

impl Checker<'_, '_> {
    pub(crate) fn check_generic_call(
        &mut self,
        info: &Rc<FunctionInfo>,
        type_args: &[ast::TypeExpr],
        args: &[ast::Expr],
        span: Span,
    ) -> tir::Expr {
        if args.len() != info.ty.params.len() {
            self.error(
                span,
                Code::WRONG_ARITY,
                format!(
                    "expected {} argument(s), found {}",
                    info.ty.params.len(),
                    args.len()
                ),
            );
            return self.error_expr(span);
        }

        let bindings = if type_args.is_empty() {
            self.unify_from_args(info, args, span)
        } else {
            self.bind_explicit(info, type_args, span)
        };
        let Some(bindings) = bindings else {
            return self.error_expr(span);
        };

        let ordered_ids: Vec<TypeId> = info
            .type_params
            .iter()
            .map(|param| self.cx.registry.register(&bindings[param]))
            .collect();

        let entry = self.specialize(info, &bindings, ordered_ids, span);

        let checked: Vec<tir::Expr> = args
            .iter()
            .zip(entry.ty.params.iter())
            .map(|(arg, param)| self.check_expr(arg, &param.ty))
            .collect();

        self.mk(
            ExprKind::FunctionCall {
                name: entry.name,
                args: checked,
            },
            entry.ty.ret.clone(),
            span,
        )
    }

    /// Bind type variables positionally from explicit type arguments.
    fn bind_explicit(
        &mut self,
        info: &Rc<FunctionInfo>,
        type_args: &[ast::TypeExpr],
        span: Span,
    ) -> Option<FxHashMap<Symbol, Type>> {
        if type_args.len() != info.type_params.len() {
            self.error(
                span,
                Code::WRONG_ARITY,
                format!(
                    "expected {} type argument(s), found {}",
                    info.type_params.len(),
                    type_args.len()
                ),
            );
            return None;
        }
        let mut bindings = FxHashMap::default();
        for (param, arg) in info.type_params.iter().zip(type_args) {
            let ty = self.resolve_type(arg, span);
            bindings.insert(*param, ty);
        }
        Some(bindings)
    }

    /// Unify parameter types against argument types, walking in parallel.
    /// Repeated occurrences of a variable must land on the same concrete
    /// type; an integer literal may still widen into a float binding.
    fn unify_from_args(
        &mut self,
        info: &Rc<FunctionInfo>,
        args: &[ast::Expr],
        span: Span,
    ) -> Option<FxHashMap<Symbol, Type>> {
        let inferred: Vec<tir::Expr> = args.iter().map(|arg| self.infer_expr(arg)).collect();
        let mut bindings = FxHashMap::default();
        for (param, arg) in info.ty.params.iter().zip(&inferred) {
            if param.ty.unify(&arg.ty, &mut bindings) {
                continue;
            }
            let widens = Self::is_int_literal(arg)
                && param.ty.substitute(&bindings) == Type::Float;
            if !widens {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!(
                        "cannot unify argument of type {} with parameter type {}",
                        arg.ty, param.ty
                    ),
                );
                return None;
            }
        }
        for param in &info.type_params {
            if !bindings.contains_key(param) {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!("cannot infer type argument ${param}"),
                );
                return None;
            }
        }
        Some(bindings)
    }

    /// Produce (or fetch) the monomorphized copy for a binding set.
    fn specialize(
        &mut self,
        info: &Rc<FunctionInfo>,
        bindings: &FxHashMap<Symbol, Type>,
        ordered_ids: Vec<TypeId>,
        span: Span,
    ) -> SpecEntry {
        let key = (info.name, ordered_ids);
        if let Some(entry) = self.specializations.borrow().cache.get(&key) {
            return entry.clone();
        }

        let params: Vec<Parameter> = info
            .ty
            .params
            .iter()
            .map(|p| Parameter {
                name: p.name,
                ty: p.ty.substitute(bindings),
                mutable: p.mutable,
            })
            .collect();
        let ret = info.ty.ret.substitute(bindings);
        let ty = Arc::new(FnType::new(params, ret));

        let mangled = {
            let mut name = info.name.as_str().to_string();
            for param in &info.type_params {
                name.push('$');
                name.push_str(&bindings[param].describe());
            }
            Symbol::intern(&name)
        };

        let entry = SpecEntry {
            name: mangled,
            ty: Arc::clone(&ty),
        };
        // inserted before the body is checked so recursive calls with the
        // same type arguments resolve to this copy
        self.specializations
            .borrow_mut()
            .cache
            .insert(key, entry.clone());

        if let Some(decl) = &info.decl {
            let mut sub = self.sub_checker();
            sub.type_bindings = bindings.clone();
            let body = sub.check_function_body(&ty, &decl.body, None, decl.span);
            let def = Rc::new(tir::FunctionDef {
                name: mangled,
                ty,
                body,
                captures: vec![],
                span: decl.span,
            });
            self.specializations.borrow_mut().defs.push(def);
        } else {
            self.error(
                span,
                Code::TYPE_MISMATCH,
                format!("generic function '{}' has no body available here", info.name),
            );
        }
        entry
    }
}
