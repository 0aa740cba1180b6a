//! Expression checking.
//!
//! Two modes: `infer_expr` produces a type from the expression alone;
//! `check_expr` verifies an expression against an expected type, refining
//! the constructs whose types are underdetermined on their own (empty
//! lists and maps, `Maybe::none`, `Result` constructors, integer literals
//! in float slots).

use std::rc::Rc;
use std::sync::Arc;

use ardc_ast as ast;
use ardc_types::{
    BoolMethodKind, FloatMethodKind, FnType, IntMethodKind, ListMethodKind, MapMethodKind,
    MaybeMethodKind, MethodSig, ResultMethodKind, StrMethodKind, Type,
};
use ardc_util::{DiagnosticCode as Code, Span, Symbol};
use indexmap::IndexMap;

use crate::check::{split_trailing_expr, Checker};
use crate::module::{BuiltinModule, ModuleRef};
use crate::scope::{Binding, RibKind};
use crate::tir::{self, ExprKind, TryMode};

impl Checker<'_, '_> {
    pub(crate) fn infer_expr(&mut self, expr: &ast::Expr) -> tir::Expr {
        let span = expr.span;
        match &expr.kind {
            ast::ExprKind::Int(v) => self.mk(ExprKind::Int(*v), Type::Int, span),
            ast::ExprKind::Float(v) => self.mk(ExprKind::Float(*v), Type::Float, span),
            ast::ExprKind::Str(v) => self.mk(ExprKind::Str(v.clone()), Type::Str, span),
            ast::ExprKind::Bool(v) => self.mk(ExprKind::Bool(*v), Type::Bool, span),
            ast::ExprKind::Void => self.mk(ExprKind::Void, Type::Void, span),
            ast::ExprKind::Ident(name) => self.check_ident(*name, span),
            ast::ExprKind::SelfRef => match self.scopes.receiver() {
                Some(receiver) => self.mk(ExprKind::SelfRef, receiver.ty, span),
                None => {
                    self.error(span, Code::UNDEFINED_SYMBOL, "'@' is only valid in methods");
                    self.error_expr(span)
                }
            },
            ast::ExprKind::Template(chunks) => self.check_template(chunks, span),
            ast::ExprKind::Unary { op, operand } => self.check_unary(*op, operand, span),
            ast::ExprKind::Binary { op, lhs, rhs } => self.check_binary(*op, lhs, rhs, span),
            ast::ExprKind::ListLit(items) => {
                if items.is_empty() {
                    // element type only recoverable from an expected type
                    return self.mk(
                        ExprKind::ListLit(vec![]),
                        Type::List(Box::new(Type::Dynamic)),
                        span,
                    );
                }
                let first = self.infer_expr(&items[0]);
                let elem = first.ty.clone();
                let mut checked = vec![first];
                for item in &items[1..] {
                    checked.push(self.check_expr(item, &elem));
                }
                self.mk(ExprKind::ListLit(checked), Type::List(Box::new(elem)), span)
            }
            ast::ExprKind::MapLit(entries) => {
                if entries.is_empty() {
                    return self.mk(
                        ExprKind::MapLit(vec![]),
                        Type::Map {
                            key: Box::new(Type::Dynamic),
                            value: Box::new(Type::Dynamic),
                        },
                        span,
                    );
                }
                let key0 = self.infer_expr(&entries[0].0);
                let value0 = self.infer_expr(&entries[0].1);
                let (key_ty, value_ty) = (key0.ty.clone(), value0.ty.clone());
                if !key_ty.is_hashable() && key_ty != Type::Dynamic {
                    self.error(
                        span,
                        Code::TYPE_MISMATCH,
                        format!("map keys must be hashable; {key_ty} is not"),
                    );
                }
                let mut checked = vec![(key0, value0)];
                for (k, v) in &entries[1..] {
                    checked.push((self.check_expr(k, &key_ty), self.check_expr(v, &value_ty)));
                }
                self.mk(
                    ExprKind::MapLit(checked),
                    Type::Map {
                        key: Box::new(key_ty),
                        value: Box::new(value_ty),
                    },
                    span,
                )
            }
            ast::ExprKind::StructLit { name, fields } => self.check_struct_lit(*name, fields, span),
            ast::ExprKind::Property { subject, name } => {
                let subject = self.infer_expr(subject);
                match self.property_type(&subject, *name, span) {
                    Some(ty) => self.mk(
                        ExprKind::InstanceProperty {
                            subject: Box::new(subject),
                            name: *name,
                        },
                        ty,
                        span,
                    ),
                    None => self.error_expr(span),
                }
            }
            ast::ExprKind::MethodCall {
                subject,
                name,
                args,
            } => self.check_method_call(subject, *name, args, span),
            ast::ExprKind::StaticAccess {
                target,
                member,
                args,
            } => self.check_static_access(*target, *member, args.as_deref(), span, None),
            ast::ExprKind::Call {
                callee,
                type_args,
                args,
            } => self.check_call(callee, type_args, args, span),
            ast::ExprKind::Lambda { params, ret, body } => {
                self.check_lambda(params, ret, body, span, None)
            }
            ast::ExprKind::Block(block) => self.check_block_expr(block, span, None),
            ast::ExprKind::Match { subject, arms } => {
                self.check_match(subject.as_deref(), arms, span, None)
            }
            ast::ExprKind::Try { expr, catch } => self.check_try(expr, catch.as_ref(), span),
            ast::ExprKind::Panic(message) => {
                let message = self.check_expr(message, &Type::Str);
                // diverges; Dynamic lets a panic arm unify with anything
                self.mk(ExprKind::Panic(Box::new(message)), Type::Dynamic, span)
            }
            ast::ExprKind::Spawn(callee) => self.check_spawn(callee, span),
            ast::ExprKind::Await(fiber) => {
                let fiber = self.infer_expr(fiber);
                match fiber.ty.clone() {
                    Type::Fiber(inner) => self.mk(
                        ExprKind::FiberEval {
                            fiber: Box::new(fiber),
                        },
                        *inner,
                        span,
                    ),
                    other => {
                        self.error(
                            span,
                            Code::TYPE_MISMATCH,
                            format!("expected a fiber, found {other}"),
                        );
                        self.error_expr(span)
                    }
                }
            }
        }
    }

    pub(crate) fn check_expr(&mut self, expr: &ast::Expr, expected: &Type) -> tir::Expr {
        let span = expr.span;
        match &expr.kind {
            ast::ExprKind::Int(v) if *expected == Type::Float => {
                self.mk(ExprKind::Float(*v as f64), Type::Float, span)
            }
            ast::ExprKind::ListLit(items) => {
                if let Type::List(elem) = expected {
                    let checked = items.iter().map(|item| self.check_expr(item, elem)).collect();
                    return self.mk(ExprKind::ListLit(checked), expected.clone(), span);
                }
                let found = self.infer_expr(expr);
                self.expect_assignable(found, expected, span)
            }
            ast::ExprKind::MapLit(entries) => {
                if let Type::Map { key, value } = expected {
                    let checked = entries
                        .iter()
                        .map(|(k, v)| (self.check_expr(k, key), self.check_expr(v, value)))
                        .collect();
                    return self.mk(ExprKind::MapLit(checked), expected.clone(), span);
                }
                let found = self.infer_expr(expr);
                self.expect_assignable(found, expected, span)
            }
            ast::ExprKind::StaticAccess {
                target,
                member,
                args,
            } => {
                let found =
                    self.check_static_access(*target, *member, args.as_deref(), span, Some(expected));
                self.expect_assignable(found, expected, span)
            }
            ast::ExprKind::Match { subject, arms } => {
                self.check_match(subject.as_deref(), arms, span, Some(expected))
            }
            ast::ExprKind::Block(block) => self.check_block_expr(block, span, Some(expected)),
            ast::ExprKind::Lambda { params, ret, body } => {
                let found = self.check_lambda(params, ret, body, span, Some(expected));
                self.expect_assignable(found, expected, span)
            }
            _ => {
                let found = self.infer_expr(expr);
                self.expect_assignable(found, expected, span)
            }
        }
    }

    // ------------------------------------------------------------------
    // Identifiers and calls
    // ------------------------------------------------------------------

    fn check_ident(&mut self, name: Symbol, span: Span) -> tir::Expr {
        let Some(resolution) = self.scopes.resolve(name) else {
            self.error(
                span,
                Code::UNDEFINED_SYMBOL,
                format!("undefined symbol '{name}'"),
            );
            return self.error_expr(span);
        };
        match resolution.binding {
            Binding::Variable { ty, .. } => {
                self.scopes.record_capture(name, ty.clone(), resolution.rib);
                self.mk(ExprKind::Variable(name), ty, span)
            }
            Binding::Function(info) => {
                if info.is_generic() {
                    self.error(
                        span,
                        Code::TYPE_MISMATCH,
                        format!("generic function '{name}' cannot be used as a value"),
                    );
                    return self.error_expr(span);
                }
                self.mk(ExprKind::FunctionRef(name), Type::Fn(Arc::clone(&info.ty)), span)
            }
            Binding::ExternFunction(info) => {
                self.mk(ExprKind::FunctionRef(name), Type::Fn(Arc::clone(&info.ty)), span)
            }
            _ => {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!("'{name}' is not a value"),
                );
                self.error_expr(span)
            }
        }
    }

    fn check_call(
        &mut self,
        callee: &ast::Expr,
        type_args: &[ast::TypeExpr],
        args: &[ast::Expr],
        span: Span,
    ) -> tir::Expr {
        if let ast::ExprKind::Ident(name) = &callee.kind {
            match self.scopes.resolve(*name).map(|r| r.binding) {
                Some(Binding::Function(info)) => {
                    if info.is_generic() {
                        return self.check_generic_call(&info, type_args, args, span);
                    }
                    if !type_args.is_empty() {
                        self.error(
                            span,
                            Code::WRONG_ARITY,
                            format!("function '{name}' takes no type arguments"),
                        );
                    }
                    let checked = self.check_args(&info.ty, args, span);
                    return self.mk(
                        ExprKind::FunctionCall {
                            name: *name,
                            args: checked,
                        },
                        info.ty.ret.clone(),
                        span,
                    );
                }
                Some(Binding::ExternFunction(info)) => {
                    let checked = self.check_args(&info.ty, args, span);
                    return self.mk(
                        ExprKind::FunctionCall {
                            name: *name,
                            args: checked,
                        },
                        info.ty.ret.clone(),
                        span,
                    );
                }
                _ => {}
            }
        }
        // anything else must evaluate to a function value
        let callee = self.infer_expr(callee);
        match callee.ty.clone() {
            Type::Fn(f) => {
                let checked = self.check_args(&f, args, span);
                self.mk(
                    ExprKind::ClosureCall {
                        callee: Box::new(callee),
                        args: checked,
                    },
                    f.ret.clone(),
                    span,
                )
            }
            Type::Dynamic => self.error_expr(span),
            other => {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!("cannot call a value of type {other}"),
                );
                self.error_expr(span)
            }
        }
    }

    /// Check arguments against a signature's parameters.
    pub(crate) fn check_args(
        &mut self,
        sig: &FnType,
        args: &[ast::Expr],
        span: Span,
    ) -> Vec<tir::Expr> {
        if args.len() != sig.params.len() {
            self.error(
                span,
                Code::WRONG_ARITY,
                format!(
                    "expected {} argument(s), found {}",
                    sig.params.len(),
                    args.len()
                ),
            );
        }
        args.iter()
            .zip(sig.params.iter())
            .map(|(arg, param)| self.check_expr(arg, &param.ty))
            .collect()
    }

    fn check_method_call(
        &mut self,
        subject: &ast::Expr,
        name: Symbol,
        args: &[ast::Expr],
        span: Span,
    ) -> tir::Expr {
        let subject = self.infer_expr(subject);
        let subject_ty = subject.ty.clone();
        let method = name.as_str();
        match &subject_ty {
            Type::Str => match StrMethodKind::from_name(method) {
                Some(kind) => {
                    let sig = kind.signature();
                    let args = self.check_method_args(&sig, &subject, args, span);
                    self.mk(
                        ExprKind::StrMethod {
                            subject: Box::new(subject),
                            kind,
                            args,
                        },
                        sig.ret,
                        span,
                    )
                }
                None => self.no_method(&subject_ty, name, span),
            },
            Type::Int => match IntMethodKind::from_name(method) {
                Some(kind) => {
                    let sig = kind.signature();
                    self.check_method_args(&sig, &subject, args, span);
                    self.mk(
                        ExprKind::IntMethod {
                            subject: Box::new(subject),
                            kind,
                        },
                        sig.ret,
                        span,
                    )
                }
                None => self.no_method(&subject_ty, name, span),
            },
            Type::Float => match FloatMethodKind::from_name(method) {
                Some(kind) => {
                    let sig = kind.signature();
                    self.check_method_args(&sig, &subject, args, span);
                    self.mk(
                        ExprKind::FloatMethod {
                            subject: Box::new(subject),
                            kind,
                        },
                        sig.ret,
                        span,
                    )
                }
                None => self.no_method(&subject_ty, name, span),
            },
            Type::Bool => match BoolMethodKind::from_name(method) {
                Some(kind) => {
                    let sig = kind.signature();
                    self.check_method_args(&sig, &subject, args, span);
                    self.mk(
                        ExprKind::BoolMethod {
                            subject: Box::new(subject),
                            kind,
                        },
                        sig.ret,
                        span,
                    )
                }
                None => self.no_method(&subject_ty, name, span),
            },
            Type::List(elem) => match ListMethodKind::from_name(method) {
                Some(kind) => {
                    let sig = kind.signature(elem);
                    let args = self.check_method_args(&sig, &subject, args, span);
                    self.mk(
                        ExprKind::ListMethod {
                            subject: Box::new(subject),
                            kind,
                            args,
                        },
                        sig.ret,
                        span,
                    )
                }
                None => self.no_method(&subject_ty, name, span),
            },
            Type::Map { key, value } => match MapMethodKind::from_name(method) {
                Some(kind) => {
                    let sig = kind.signature(key, value);
                    let args = self.check_method_args(&sig, &subject, args, span);
                    self.mk(
                        ExprKind::MapMethod {
                            subject: Box::new(subject),
                            kind,
                            args,
                        },
                        sig.ret,
                        span,
                    )
                }
                None => self.no_method(&subject_ty, name, span),
            },
            Type::Maybe(inner) => match MaybeMethodKind::from_name(method) {
                Some(kind) => {
                    let sig = kind.signature(inner);
                    let args = self.check_method_args(&sig, &subject, args, span);
                    self.mk(
                        ExprKind::MaybeMethod {
                            subject: Box::new(subject),
                            kind,
                            args,
                        },
                        sig.ret,
                        span,
                    )
                }
                None => self.no_method(&subject_ty, name, span),
            },
            Type::Result { ok, err } => match ResultMethodKind::from_name(method) {
                Some(kind) => {
                    let sig = kind.signature(ok, err);
                    let args = self.check_method_args(&sig, &subject, args, span);
                    self.mk(
                        ExprKind::ResultMethod {
                            subject: Box::new(subject),
                            kind,
                            args,
                        },
                        sig.ret,
                        span,
                    )
                }
                None => self.no_method(&subject_ty, name, span),
            },
            Type::Fiber(inner) => {
                if method == "join" {
                    if !args.is_empty() {
                        self.error(span, Code::WRONG_ARITY, "join takes no arguments");
                    }
                    let inner = (**inner).clone();
                    self.mk(
                        ExprKind::FiberEval {
                            fiber: Box::new(subject),
                        },
                        inner,
                        span,
                    )
                } else {
                    self.no_method(&subject_ty, name, span)
                }
            }
            Type::Struct(s) => {
                let info = match self.lookup_struct(s.name) {
                    Some(info) => info,
                    None => return self.no_method(&subject_ty, name, span),
                };
                let method_info = info.borrow().methods.get(&name).cloned();
                match method_info {
                    Some(method_info) => {
                        if method_info.mutates && !self.is_mutable_place(&subject) {
                            self.error(
                                span,
                                Code::INCOMPATIBLE_MUTATION,
                                format!("method '{name}' mutates; the subject must be mutable"),
                            );
                        }
                        let args_checked = self.check_args(&method_info.ty, args, span);
                        self.mk(
                            ExprKind::InstanceMethod {
                                subject: Box::new(subject),
                                method: name,
                                args: args_checked,
                                mutates: method_info.mutates,
                            },
                            method_info.ty.ret.clone(),
                            span,
                        )
                    }
                    None => self.no_method(&subject_ty, name, span),
                }
            }
            Type::Enum(e) => {
                let method_info = self.enum_methods.borrow().get(&e.name).and_then(|t| t.get(&name).cloned());
                match method_info {
                    Some(method_info) => {
                        let args_checked = self.check_args(&method_info.ty, args, span);
                        self.mk(
                            ExprKind::InstanceMethod {
                                subject: Box::new(subject),
                                method: name,
                                args: args_checked,
                                mutates: method_info.mutates,
                            },
                            method_info.ty.ret.clone(),
                            span,
                        )
                    }
                    None => self.no_method(&subject_ty, name, span),
                }
            }
            Type::Dynamic => {
                let args = args.iter().map(|a| self.infer_expr(a)).collect();
                self.mk(
                    ExprKind::InstanceMethod {
                        subject: Box::new(subject),
                        method: name,
                        args,
                        mutates: false,
                    },
                    Type::Dynamic,
                    span,
                )
            }
            other => {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!("type {other} has no methods"),
                );
                self.error_expr(span)
            }
        }
    }

    fn check_method_args(
        &mut self,
        sig: &MethodSig,
        subject: &tir::Expr,
        args: &[ast::Expr],
        span: Span,
    ) -> Vec<tir::Expr> {
        if sig.mutates && !self.is_mutable_place(subject) {
            self.error(
                span,
                Code::INCOMPATIBLE_MUTATION,
                "this method mutates; the subject must be mutable",
            );
        }
        if args.len() != sig.params.len() {
            self.error(
                span,
                Code::WRONG_ARITY,
                format!("expected {} argument(s), found {}", sig.params.len(), args.len()),
            );
        }
        args.iter()
            .zip(sig.params.iter())
            .map(|(arg, ty)| self.check_expr(arg, ty))
            .collect()
    }

    fn no_method(&mut self, ty: &Type, name: Symbol, span: Span) -> tir::Expr {
        self.error(
            span,
            Code::UNDEFINED_SYMBOL,
            format!("no method '{name}' on type {ty}"),
        );
        self.error_expr(span)
    }

    // ------------------------------------------------------------------
    // Static access: enums, statics, prelude constructors, module calls
    // ------------------------------------------------------------------

    pub(crate) fn check_static_access(
        &mut self,
        target: Symbol,
        member: Symbol,
        args: Option<&[ast::Expr]>,
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        match self.scopes.resolve(target).map(|r| r.binding) {
            Some(Binding::Enum(ty)) => {
                if args.is_some() {
                    self.error(span, Code::WRONG_ARITY, "enum variants take no arguments");
                }
                match ty.discriminant(member) {
                    Some(discriminant) => self.mk(
                        ExprKind::EnumVariant {
                            ty: Arc::clone(&ty),
                            variant: member,
                            discriminant,
                        },
                        Type::Enum(ty),
                        span,
                    ),
                    None => {
                        self.error(
                            span,
                            Code::UNDEFINED_SYMBOL,
                            format!("enum '{}' has no variant '{member}'", ty.name),
                        );
                        self.error_expr(span)
                    }
                }
            }
            Some(Binding::Struct(info)) => {
                let static_info = info.borrow().statics.get(&member).cloned();
                match static_info {
                    Some(static_info) => {
                        let args = args.unwrap_or(&[]);
                        let checked = self.check_args(&static_info.ty, args, span);
                        self.mk(
                            ExprKind::FunctionCall {
                                name: static_info.name,
                                args: checked,
                            },
                            static_info.ty.ret.clone(),
                            span,
                        )
                    }
                    None => {
                        self.error(
                            span,
                            Code::UNDEFINED_SYMBOL,
                            format!("'{target}' has no static '{member}'"),
                        );
                        self.error_expr(span)
                    }
                }
            }
            Some(Binding::Module(module_ref)) => match &*module_ref {
                ModuleRef::Builtin(BuiltinModule::Maybe) => {
                    self.check_maybe_ctor(member, args, span, expected)
                }
                ModuleRef::Builtin(BuiltinModule::Result) => {
                    self.check_result_ctor(member, args, span, expected)
                }
                ModuleRef::User(module) => {
                    let export = module.exports.get(&member).cloned();
                    match export {
                        Some(Binding::Function(info)) => {
                            if info.is_generic() {
                                self.error(
                                    span,
                                    Code::TYPE_MISMATCH,
                                    format!(
                                        "generic function '{member}' cannot be called across modules"
                                    ),
                                );
                                return self.error_expr(span);
                            }
                            let checked = self.check_args(&info.ty, args.unwrap_or(&[]), span);
                            self.mk(
                                ExprKind::ModuleFunctionCall {
                                    module_path: module.path.clone(),
                                    function: member,
                                    args: checked,
                                },
                                info.ty.ret.clone(),
                                span,
                            )
                        }
                        Some(Binding::ExternFunction(info)) => {
                            let checked = self.check_args(&info.ty, args.unwrap_or(&[]), span);
                            self.mk(
                                ExprKind::ModuleFunctionCall {
                                    module_path: module.path.clone(),
                                    function: member,
                                    args: checked,
                                },
                                info.ty.ret.clone(),
                                span,
                            )
                        }
                        _ => {
                            self.error(
                                span,
                                Code::UNDEFINED_SYMBOL,
                                format!("module '{}' exports no function '{member}'", module.path),
                            );
                            self.error_expr(span)
                        }
                    }
                }
            },
            _ => match target.as_str() {
                // prelude constructors are always resolvable
                "Maybe" => self.check_maybe_ctor(member, args, span, expected),
                "Result" => self.check_result_ctor(member, args, span, expected),
                _ => {
                    self.error(
                        span,
                        Code::UNDEFINED_SYMBOL,
                        format!("undefined symbol '{target}'"),
                    );
                    self.error_expr(span)
                }
            },
        }
    }

    fn check_maybe_ctor(
        &mut self,
        member: Symbol,
        args: Option<&[ast::Expr]>,
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        let args = args.unwrap_or(&[]);
        match member.as_str() {
            "some" => {
                if args.len() != 1 {
                    self.error(span, Code::WRONG_ARITY, "some takes exactly one argument");
                    return self.error_expr(span);
                }
                let value = match expected {
                    Some(Type::Maybe(inner)) => self.check_expr(&args[0], inner),
                    _ => self.infer_expr(&args[0]),
                };
                let ty = Type::Maybe(Box::new(value.ty.clone()));
                self.mk(
                    ExprKind::MakeMaybe {
                        value: Some(Box::new(value)),
                    },
                    ty,
                    span,
                )
            }
            "none" => {
                if !args.is_empty() {
                    self.error(span, Code::WRONG_ARITY, "none takes no arguments");
                }
                let ty = match expected {
                    Some(ty @ Type::Maybe(_)) => ty.clone(),
                    _ => Type::Maybe(Box::new(Type::Dynamic)),
                };
                self.mk(ExprKind::MakeMaybe { value: None }, ty, span)
            }
            _ => {
                self.error(
                    span,
                    Code::UNDEFINED_SYMBOL,
                    format!("Maybe has no constructor '{member}'"),
                );
                self.error_expr(span)
            }
        }
    }

    fn check_result_ctor(
        &mut self,
        member: Symbol,
        args: Option<&[ast::Expr]>,
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        let args = args.unwrap_or(&[]);
        let is_ok = match member.as_str() {
            "ok" => true,
            "err" => false,
            _ => {
                self.error(
                    span,
                    Code::UNDEFINED_SYMBOL,
                    format!("Result has no constructor '{member}'"),
                );
                return self.error_expr(span);
            }
        };
        if args.len() != 1 {
            self.error(
                span,
                Code::WRONG_ARITY,
                format!("{member} takes exactly one argument"),
            );
            return self.error_expr(span);
        }
        // specialize against the expected result type where available;
        // the missing side stays Dynamic otherwise
        let (value, ty) = match expected {
            Some(ty @ Type::Result { ok, err }) => {
                let value = self.check_expr(&args[0], if is_ok { ok } else { err });
                (value, ty.clone())
            }
            _ => {
                let value = self.infer_expr(&args[0]);
                let ty = if is_ok {
                    Type::Result {
                        ok: Box::new(value.ty.clone()),
                        err: Box::new(Type::Dynamic),
                    }
                } else {
                    Type::Result {
                        ok: Box::new(Type::Dynamic),
                        err: Box::new(value.ty.clone()),
                    }
                };
                (value, ty)
            }
        };
        self.mk(
            ExprKind::MakeResult {
                is_ok,
                value: Box::new(value),
            },
            ty,
            span,
        )
    }

    // ------------------------------------------------------------------
    // Operators, literals, blocks
    // ------------------------------------------------------------------

    fn check_template(&mut self, chunks: &[ast::TemplateChunk], span: Span) -> tir::Expr {
        let mut parts = Vec::new();
        for chunk in chunks {
            match chunk {
                ast::TemplateChunk::Lit(text) => {
                    parts.push(self.mk(ExprKind::Str(text.clone()), Type::Str, span));
                }
                ast::TemplateChunk::Expr(e) => {
                    let checked = self.infer_expr(e);
                    let part = match &checked.ty {
                        Type::Str => checked,
                        Type::Int => self.wrap_to_str(checked, span),
                        Type::Float => self.wrap_to_str(checked, span),
                        Type::Bool => self.wrap_to_str(checked, span),
                        other => {
                            self.error(
                                e.span,
                                Code::TYPE_MISMATCH,
                                format!("cannot interpolate a value of type {other}"),
                            );
                            self.error_expr(span)
                        }
                    };
                    parts.push(part);
                }
            }
        }
        self.mk(ExprKind::TemplateStr(parts), Type::Str, span)
    }

    /// Insert the `to_str` conversion that makes a chunk string-typed.
    fn wrap_to_str(&mut self, expr: tir::Expr, span: Span) -> tir::Expr {
        let kind = match expr.ty {
            Type::Int => ExprKind::IntMethod {
                subject: Box::new(expr),
                kind: IntMethodKind::ToStr,
            },
            Type::Float => ExprKind::FloatMethod {
                subject: Box::new(expr),
                kind: FloatMethodKind::ToStr,
            },
            Type::Bool => ExprKind::BoolMethod {
                subject: Box::new(expr),
                kind: BoolMethodKind::ToStr,
            },
            _ => unreachable!("only primitive chunks are wrapped"),
        };
        self.mk(kind, Type::Str, span)
    }

    fn check_unary(&mut self, op: ast::UnaryOp, operand: &ast::Expr, span: Span) -> tir::Expr {
        let operand = self.infer_expr(operand);
        let ty = match op {
            ast::UnaryOp::Neg => {
                if !operand.ty.is_numeric() {
                    self.error(
                        span,
                        Code::TYPE_MISMATCH,
                        format!("cannot negate a value of type {}", operand.ty),
                    );
                }
                operand.ty.clone()
            }
            ast::UnaryOp::Not => {
                if operand.ty != Type::Bool {
                    self.error(
                        span,
                        Code::TYPE_MISMATCH,
                        format!("'not' requires a Bool, found {}", operand.ty),
                    );
                }
                Type::Bool
            }
        };
        self.mk(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
            span,
        )
    }

    fn check_binary(
        &mut self,
        op: ast::BinaryOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
        span: Span,
    ) -> tir::Expr {
        let mut lhs = self.infer_expr(lhs);
        let mut rhs = self.infer_expr(rhs);

        // integer literals widen against a float operand
        if lhs.ty == Type::Float && Self::is_int_literal(&rhs) {
            rhs = Self::widen_literal(rhs);
        } else if rhs.ty == Type::Float && Self::is_int_literal(&lhs) {
            lhs = Self::widen_literal(lhs);
        }

        let ty = if op.is_arithmetic() {
            if op == ast::BinaryOp::Add && lhs.ty == Type::Str && rhs.ty == Type::Str {
                Type::Str
            } else if lhs.ty.is_numeric() && lhs.ty == rhs.ty {
                lhs.ty.clone()
            } else {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!("cannot apply arithmetic to {} and {}", lhs.ty, rhs.ty),
                );
                Type::Dynamic
            }
        } else if op.is_comparison() {
            let equality = matches!(op, ast::BinaryOp::Eq | ast::BinaryOp::Ne);
            let comparable = if equality {
                lhs.ty == rhs.ty || lhs.ty == Type::Dynamic || rhs.ty == Type::Dynamic
            } else {
                lhs.ty.is_numeric() && lhs.ty == rhs.ty
            };
            if !comparable {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!("cannot compare {} with {}", lhs.ty, rhs.ty),
                );
            }
            Type::Bool
        } else {
            if lhs.ty != Type::Bool || rhs.ty != Type::Bool {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!("logical operators require Bool operands, found {} and {}", lhs.ty, rhs.ty),
                );
            }
            Type::Bool
        };

        self.mk(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            span,
        )
    }

    fn check_struct_lit(
        &mut self,
        name: Symbol,
        fields: &[(Symbol, ast::Expr)],
        span: Span,
    ) -> tir::Expr {
        let Some(info) = self.lookup_struct(name) else {
            self.error(
                span,
                Code::UNDEFINED_SYMBOL,
                format!("unknown struct '{name}'"),
            );
            return self.error_expr(span);
        };
        let ty = Arc::clone(&info.borrow().ty);

        let mut checked: Vec<(Symbol, tir::Expr)> = Vec::new();
        for (field, value) in fields {
            match ty.field(*field).cloned() {
                Some(field_ty) => {
                    if checked.iter().any(|(n, _)| n == field) {
                        self.error(
                            span,
                            Code::DUPLICATE_NAME,
                            format!("field '{field}' given twice"),
                        );
                        continue;
                    }
                    let value = self.check_expr(value, &field_ty);
                    checked.push((*field, value));
                }
                None => self.error(
                    span,
                    Code::UNDEFINED_SYMBOL,
                    format!("struct '{name}' has no field '{field}'"),
                ),
            }
        }
        for (field, _) in &ty.fields {
            if !checked.iter().any(|(n, _)| n == field) {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!("missing field '{field}' in '{name}' literal"),
                );
            }
        }
        // construction order follows the stable field sort
        checked.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        self.mk(
            ExprKind::StructInstance {
                ty: Arc::clone(&ty),
                fields: checked,
            },
            Type::Struct(ty),
            span,
        )
    }

    fn check_lambda(
        &mut self,
        params: &[ast::Param],
        ret: &Option<ast::TypeExpr>,
        body: &ast::Block,
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        let params: Vec<ardc_types::Parameter> = params
            .iter()
            .map(|p| ardc_types::Parameter {
                name: p.name,
                ty: self.resolve_type(&p.ty, span),
                mutable: p.mutable,
            })
            .collect();
        let known_ret = ret
            .as_ref()
            .map(|t| self.resolve_type(t, span))
            .or_else(|| match expected {
                Some(Type::Fn(f)) => Some(f.ret.clone()),
                _ => None,
            });

        match known_ret {
            Some(ret) => {
                let ty = Arc::new(FnType::new(params, ret));
                self.check_closure(Symbol::intern("<lambda>"), &ty, body, span)
            }
            None => {
                // infer the return type from the trailing expression
                self.scopes.enter(RibKind::Lambda {
                    ret: Type::Dynamic,
                    captures: IndexMap::new(),
                });
                for param in &params {
                    self.scopes.insert(
                        param.name,
                        Binding::Variable {
                            ty: param.ty.clone(),
                            mutable: param.mutable,
                        },
                    );
                }
                let (init, last) = split_trailing_expr(&body.statements);
                let mut stmts = Vec::new();
                for stmt in init {
                    if let Some(checked) = self.check_stmt(stmt) {
                        stmts.push(checked);
                    }
                }
                let value = last.map(|e| Box::new(self.infer_expr(e)));
                let ret = value.as_ref().map(|v| v.ty.clone()).unwrap_or(Type::Void);
                let captures = self.scopes.exit();
                let ty = Arc::new(FnType::new(params, ret));
                let def = Rc::new(tir::FunctionDef {
                    name: Symbol::intern("<lambda>"),
                    ty: Arc::clone(&ty),
                    body: tir::Block { stmts, value },
                    captures,
                    span,
                });
                self.mk(ExprKind::Closure { def }, Type::Fn(ty), span)
            }
        }
    }

    fn check_block_expr(
        &mut self,
        block: &ast::Block,
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        self.scopes.enter(RibKind::Block);
        let (init, last) = split_trailing_expr(&block.statements);
        let mut stmts = Vec::new();
        for stmt in init {
            if let Some(checked) = self.check_stmt(stmt) {
                stmts.push(checked);
            }
        }
        let value = match (last, expected) {
            (Some(e), Some(t)) => Some(Box::new(self.check_expr(e, t))),
            (Some(e), None) => Some(Box::new(self.infer_expr(e))),
            (None, Some(t)) if *t != Type::Void => {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!("block must end with an expression of type {t}"),
                );
                None
            }
            (None, _) => None,
        };
        self.scopes.exit();
        let ty = value.as_ref().map(|v| v.ty.clone()).unwrap_or(Type::Void);
        self.mk(ExprKind::Block(tir::Block { stmts, value }), ty, span)
    }

    // ------------------------------------------------------------------
    // try / fibers
    // ------------------------------------------------------------------

    fn check_try(
        &mut self,
        inner: &ast::Expr,
        catch: Option<&ast::CatchClause>,
        span: Span,
    ) -> tir::Expr {
        let inner = self.infer_expr(inner);
        if !self.scopes.in_function() {
            self.error(
                span,
                Code::BAD_TRY_CONTEXT,
                "'try' is only valid inside a function body",
            );
            return self.error_expr(span);
        }
        let Some(ret) = self.scopes.enclosing_return_type() else {
            self.error(
                span,
                Code::BAD_TRY_CONTEXT,
                "'try' is only valid inside a function body",
            );
            return self.error_expr(span);
        };

        let (mode, value_ty, payload_ty) = match (&inner.ty, &ret) {
            (Type::Result { ok, err }, Type::Result { err: fn_err, .. }) => {
                if **err != **fn_err && **err != Type::Dynamic && **fn_err != Type::Dynamic {
                    self.error(
                        span,
                        Code::BAD_TRY_CONTEXT,
                        format!(
                            "'try' error type {err} does not match the function's error type {fn_err}"
                        ),
                    );
                }
                (TryMode::Result, (**ok).clone(), (**err).clone())
            }
            (Type::Maybe(inner_ty), Type::Maybe(_)) => {
                (TryMode::Maybe, (**inner_ty).clone(), Type::Void)
            }
            (found, ret) => {
                self.error(
                    span,
                    Code::BAD_TRY_CONTEXT,
                    format!(
                        "'try' on a value of type {found} requires a compatible {} return type, found {ret}",
                        if matches!(found, Type::Maybe(_)) { "Maybe" } else { "Result" },
                    ),
                );
                return self.error_expr(span);
            }
        };

        let catch = catch.map(|clause| {
            self.scopes.enter(RibKind::Block);
            if let Some(binding) = clause.binding {
                self.scopes.insert(
                    binding,
                    Binding::Variable {
                        ty: payload_ty.clone(),
                        mutable: false,
                    },
                );
            }
            let body = self.check_stmts(&clause.body);
            self.scopes.exit();
            tir::TryCatch {
                binding: clause.binding,
                body,
            }
        });

        self.mk(
            ExprKind::TryOp {
                expr: Box::new(inner),
                catch,
                mode,
            },
            value_ty,
            span,
        )
    }

    fn check_spawn(&mut self, callee: &ast::Expr, span: Span) -> tir::Expr {
        let callee = self.infer_expr(callee);
        match callee.ty.clone() {
            Type::Fn(f) => {
                if !f.params.is_empty() {
                    self.error(
                        span,
                        Code::WRONG_ARITY,
                        "a fiber body takes no parameters",
                    );
                }
                let ty = Type::Fiber(Box::new(f.ret.clone()));
                self.mk(
                    ExprKind::FiberExecution {
                        callee: Box::new(callee),
                    },
                    ty,
                    span,
                )
            }
            other => {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!("fibers run functions; found a value of type {other}"),
                );
                self.error_expr(span)
            }
        }
    }

    // ------------------------------------------------------------------
    // Small helpers
    // ------------------------------------------------------------------

    pub(crate) fn mk(&self, kind: ExprKind, ty: Type, span: Span) -> tir::Expr {
        tir::Expr {
            kind,
            ty,
            span: span.with_file(self.file),
        }
    }

    /// Recovery expression: dynamic-typed void, compatible anywhere.
    pub(crate) fn error_expr(&self, span: Span) -> tir::Expr {
        self.mk(ExprKind::Void, Type::Dynamic, span)
    }

    pub(crate) fn is_int_literal(expr: &tir::Expr) -> bool {
        matches!(expr.kind, ExprKind::Int(_))
    }

    fn widen_literal(expr: tir::Expr) -> tir::Expr {
        match expr.kind {
            ExprKind::Int(v) => tir::Expr {
                kind: ExprKind::Float(v as f64),
                ty: Type::Float,
                span: expr.span,
            },
            _ => expr,
        }
    }

    /// Verify an inferred expression fits the expected slot, widening
    /// integer literals into float slots.
    pub(crate) fn expect_assignable(
        &mut self,
        expr: tir::Expr,
        expected: &Type,
        span: Span,
    ) -> tir::Expr {
        if *expected == Type::Float && Self::is_int_literal(&expr) {
            return Self::widen_literal(expr);
        }
        if !expr.ty.assignable_to(expected, Self::is_int_literal(&expr)) {
            self.error(
                span,
                Code::TYPE_MISMATCH,
                format!("expected {expected}, found {}", expr.ty),
            );
        }
        expr
    }
}
