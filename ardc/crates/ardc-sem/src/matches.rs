//! Pattern-match checking.
//!
//! The match form is classified from the subject's type; each form has
//! its own exhaustiveness rule:
//!
//! - Bool: exactly the two literal cases, no wildcard
//! - Enum: each variant at most once; missing variants need `_`
//! - Int: literals and closed ranges in source order; `_` optional
//! - Maybe: one binding case and a `_` none case
//! - Result: exactly one `ok(name)` and one `err(name)` case
//! - Union: one case per member name, plus optional `_`
//! - Conditional (no subject): ordered boolean guards plus `_`
//!
//! All arms must unify to a single result type; the first arm (or the
//! caller's expected type) fixes it and the rest are checked against it.

use std::sync::Arc;

use ardc_ast as ast;
use ardc_types::{EnumType, Type, UnionType};
use ardc_util::{DiagnosticCode as Code, FxHashSet, Span, Symbol};

use crate::check::Checker;
use crate::scope::{Binding, RibKind};
use crate::tir::{self, ExprKind, IntPattern};

impl Checker<'_, '_> {
    pub(crate) fn check_match(
        &mut self,
        subject: Option<&ast::Expr>,
        arms: &[ast::MatchArm],
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        let Some(subject) = subject else {
            return self.check_conditional_match(arms, span, expected);
        };
        let subject = self.infer_expr(subject);
        match subject.ty.clone() {
            Type::Bool => self.check_bool_match(subject, arms, span, expected),
            Type::Int => self.check_int_match(subject, arms, span, expected),
            Type::Enum(e) => self.check_enum_match(subject, e, arms, span, expected),
            Type::Union(u) => self.check_union_match(subject, u, arms, span, expected),
            Type::Maybe(inner) => self.check_option_match(subject, *inner, arms, span, expected),
            Type::Result { ok, err } => {
                self.check_result_match(subject, *ok, *err, arms, span, expected)
            }
            other => {
                self.error(
                    span,
                    Code::UNSUPPORTED_PATTERN,
                    format!("cannot match on a value of type {other}"),
                );
                self.error_expr(span)
            }
        }
    }

    /// Check one arm body, unifying its type with the running result type.
    fn check_arm_body(
        &mut self,
        body: &ast::Expr,
        result_ty: &mut Option<Type>,
    ) -> tir::Expr {
        match result_ty {
            Some(ty) => self.check_expr(body, &ty.clone()),
            None => {
                let checked = self.infer_expr(body);
                *result_ty = Some(checked.ty.clone());
                checked
            }
        }
    }

    fn result_type(&self, result_ty: Option<Type>) -> Type {
        result_ty.unwrap_or(Type::Void)
    }

    fn check_bool_match(
        &mut self,
        subject: tir::Expr,
        arms: &[ast::MatchArm],
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        let mut result_ty = expected.cloned();
        let mut true_arm = None;
        let mut false_arm = None;
        for arm in arms {
            match &arm.pattern {
                ast::Pattern::Bool(value) => {
                    let slot = if *value { &mut true_arm } else { &mut false_arm };
                    if slot.is_some() {
                        self.error(
                            arm.span,
                            Code::DUPLICATE_CASE,
                            format!("duplicate '{value}' case"),
                        );
                        continue;
                    }
                    *slot = Some(self.check_arm_body(&arm.body, &mut result_ty));
                }
                ast::Pattern::Wildcard => self.error(
                    arm.span,
                    Code::UNSUPPORTED_PATTERN,
                    "bool matches spell out both cases; '_' is not allowed",
                ),
                _ => self.error(
                    arm.span,
                    Code::UNSUPPORTED_PATTERN,
                    "expected a 'true' or 'false' case",
                ),
            }
        }
        if true_arm.is_none() || false_arm.is_none() {
            self.error(
                span,
                Code::NON_EXHAUSTIVE_MATCH,
                "bool match must cover both 'true' and 'false'",
            );
            return self.error_expr(span);
        }
        let ty = self.result_type(result_ty);
        self.mk(
            ExprKind::BoolMatch {
                subject: Box::new(subject),
                true_arm: Box::new(true_arm.unwrap()),
                false_arm: Box::new(false_arm.unwrap()),
            },
            ty,
            span,
        )
    }

    fn check_int_match(
        &mut self,
        subject: tir::Expr,
        arms: &[ast::MatchArm],
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        let mut result_ty = expected.cloned();
        let mut checked: Vec<(IntPattern, tir::Expr)> = Vec::new();
        let mut default = None;
        let mut seen_lits = FxHashSet::default();
        for arm in arms {
            let pattern = match &arm.pattern {
                ast::Pattern::Int(value) => {
                    if !seen_lits.insert(*value) {
                        self.error(
                            arm.span,
                            Code::DUPLICATE_CASE,
                            format!("duplicate case {value}"),
                        );
                        continue;
                    }
                    IntPattern::Lit(*value)
                }
                ast::Pattern::IntRange { start, end } => {
                    if start > end {
                        self.error(
                            arm.span,
                            Code::RANGE_INVALID,
                            format!("range {start}..{end} is empty"),
                        );
                        continue;
                    }
                    IntPattern::Range(*start, *end)
                }
                // enum variants lower to their discriminants
                ast::Pattern::Variant { enum_name, variant } => {
                    match self.scopes.resolve(*enum_name).map(|r| r.binding) {
                        Some(Binding::Enum(e)) => match e.discriminant(*variant) {
                            Some(value) => IntPattern::Lit(value),
                            None => {
                                self.error(
                                    arm.span,
                                    Code::UNDEFINED_SYMBOL,
                                    format!("enum '{enum_name}' has no variant '{variant}'"),
                                );
                                continue;
                            }
                        },
                        _ => {
                            self.error(
                                arm.span,
                                Code::UNDEFINED_SYMBOL,
                                format!("unknown enum '{enum_name}'"),
                            );
                            continue;
                        }
                    }
                }
                ast::Pattern::Wildcard => {
                    if default.is_some() {
                        self.error(arm.span, Code::DUPLICATE_CASE, "duplicate '_' case");
                        continue;
                    }
                    default = Some(Box::new(self.check_arm_body(&arm.body, &mut result_ty)));
                    continue;
                }
                _ => {
                    self.error(
                        arm.span,
                        Code::UNSUPPORTED_PATTERN,
                        "int matches take literal, range, or '_' cases",
                    );
                    continue;
                }
            };
            let body = self.check_arm_body(&arm.body, &mut result_ty);
            checked.push((pattern, body));
        }
        let ty = self.result_type(result_ty);
        self.mk(
            ExprKind::IntMatch {
                subject: Box::new(subject),
                arms: checked,
                default,
            },
            ty,
            span,
        )
    }

    fn check_enum_match(
        &mut self,
        subject: tir::Expr,
        enum_ty: Arc<EnumType>,
        arms: &[ast::MatchArm],
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        let mut result_ty = expected.cloned();
        let mut checked: Vec<(i64, tir::Expr)> = Vec::new();
        let mut covered: FxHashSet<Symbol> = FxHashSet::default();
        let mut default = None;
        for arm in arms {
            match &arm.pattern {
                ast::Pattern::Variant { enum_name, variant } => {
                    if *enum_name != enum_ty.name {
                        self.error(
                            arm.span,
                            Code::UNSUPPORTED_PATTERN,
                            format!(
                                "case belongs to '{enum_name}', but the subject is a '{}'",
                                enum_ty.name
                            ),
                        );
                        continue;
                    }
                    let Some(discriminant) = enum_ty.discriminant(*variant) else {
                        self.error(
                            arm.span,
                            Code::UNDEFINED_SYMBOL,
                            format!("enum '{}' has no variant '{variant}'", enum_ty.name),
                        );
                        continue;
                    };
                    if !covered.insert(*variant) {
                        self.error(
                            arm.span,
                            Code::DUPLICATE_CASE,
                            format!("variant '{variant}' matched twice"),
                        );
                        continue;
                    }
                    let body = self.check_arm_body(&arm.body, &mut result_ty);
                    checked.push((discriminant, body));
                }
                ast::Pattern::Wildcard => {
                    if default.is_some() {
                        self.error(arm.span, Code::DUPLICATE_CASE, "duplicate '_' case");
                        continue;
                    }
                    default = Some(Box::new(self.check_arm_body(&arm.body, &mut result_ty)));
                }
                _ => self.error(
                    arm.span,
                    Code::UNSUPPORTED_PATTERN,
                    "enum matches take variant or '_' cases",
                ),
            }
        }
        if default.is_none() {
            let missing: Vec<&str> = enum_ty
                .variants
                .iter()
                .filter(|v| !covered.contains(v))
                .map(|v| v.as_str())
                .collect();
            if !missing.is_empty() {
                self.error(
                    span,
                    Code::NON_EXHAUSTIVE_MATCH,
                    format!(
                        "match does not cover variant(s) {}; add them or a '_' case",
                        missing.join(", ")
                    ),
                );
            }
        }
        let ty = self.result_type(result_ty);
        self.mk(
            ExprKind::EnumMatch {
                subject: Box::new(subject),
                enum_ty,
                arms: checked,
                default,
            },
            ty,
            span,
        )
    }

    fn check_union_match(
        &mut self,
        subject: tir::Expr,
        union_ty: Arc<UnionType>,
        arms: &[ast::MatchArm],
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        let mut result_ty = expected.cloned();
        let mut checked: Vec<tir::UnionArm> = Vec::new();
        let mut covered: FxHashSet<String> = FxHashSet::default();
        let mut default = None;
        for arm in arms {
            match &arm.pattern {
                ast::Pattern::TypeBinding { type_name, binding } => {
                    let Some(member) = union_ty.member_named(type_name.as_str()).cloned() else {
                        self.error(
                            arm.span,
                            Code::UNSUPPORTED_PATTERN,
                            format!(
                                "'{type_name}' is not a member of union '{}'",
                                union_ty.name
                            ),
                        );
                        continue;
                    };
                    if !covered.insert(type_name.as_str().to_string()) {
                        self.error(
                            arm.span,
                            Code::DUPLICATE_CASE,
                            format!("member '{type_name}' matched twice"),
                        );
                        continue;
                    }
                    self.scopes.enter(RibKind::Block);
                    self.scopes.insert(
                        *binding,
                        Binding::Variable {
                            ty: member.clone(),
                            mutable: false,
                        },
                    );
                    let body = self.check_arm_body(&arm.body, &mut result_ty);
                    self.scopes.exit();
                    checked.push(tir::UnionArm {
                        member,
                        binding: *binding,
                        body,
                    });
                }
                ast::Pattern::Wildcard => {
                    if default.is_some() {
                        self.error(arm.span, Code::DUPLICATE_CASE, "duplicate '_' case");
                        continue;
                    }
                    default = Some(Box::new(self.check_arm_body(&arm.body, &mut result_ty)));
                }
                _ => self.error(
                    arm.span,
                    Code::UNSUPPORTED_PATTERN,
                    "union matches take 'Member(name)' or '_' cases",
                ),
            }
        }
        if default.is_none() {
            let missing: Vec<String> = union_ty
                .members
                .iter()
                .map(|m| m.name())
                .filter(|name| !covered.contains(name))
                .collect();
            if !missing.is_empty() {
                self.error(
                    span,
                    Code::NON_EXHAUSTIVE_MATCH,
                    format!(
                        "match does not cover member(s) {}; add them or a '_' case",
                        missing.join(", ")
                    ),
                );
            }
        }
        let ty = self.result_type(result_ty);
        self.mk(
            ExprKind::UnionMatch {
                subject: Box::new(subject),
                arms: checked,
                default,
            },
            ty,
            span,
        )
    }

    fn check_option_match(
        &mut self,
        subject: tir::Expr,
        inner: Type,
        arms: &[ast::MatchArm],
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        let mut result_ty = expected.cloned();
        let mut some_arm = None;
        let mut binding_name = None;
        let mut none_arm = None;
        for arm in arms {
            match &arm.pattern {
                ast::Pattern::Binding(name) => {
                    if some_arm.is_some() {
                        self.error(arm.span, Code::DUPLICATE_CASE, "duplicate binding case");
                        continue;
                    }
                    self.scopes.enter(RibKind::Block);
                    self.scopes.insert(
                        *name,
                        Binding::Variable {
                            ty: inner.clone(),
                            mutable: false,
                        },
                    );
                    some_arm = Some(self.check_arm_body(&arm.body, &mut result_ty));
                    self.scopes.exit();
                    binding_name = Some(*name);
                }
                ast::Pattern::Wildcard => {
                    if none_arm.is_some() {
                        self.error(arm.span, Code::DUPLICATE_CASE, "duplicate '_' case");
                        continue;
                    }
                    none_arm = Some(self.check_arm_body(&arm.body, &mut result_ty));
                }
                _ => self.error(
                    arm.span,
                    Code::UNSUPPORTED_PATTERN,
                    "maybe matches take a binding case and a '_' case",
                ),
            }
        }
        let (Some(some_arm), Some(none_arm), Some(binding)) = (some_arm, none_arm, binding_name)
        else {
            self.error(
                span,
                Code::NON_EXHAUSTIVE_MATCH,
                "maybe match needs a binding case and a '_' case",
            );
            return self.error_expr(span);
        };
        let ty = self.result_type(result_ty);
        self.mk(
            ExprKind::OptionMatch {
                subject: Box::new(subject),
                binding,
                some_arm: Box::new(some_arm),
                none_arm: Box::new(none_arm),
            },
            ty,
            span,
        )
    }

    fn check_result_match(
        &mut self,
        subject: tir::Expr,
        ok: Type,
        err: Type,
        arms: &[ast::MatchArm],
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        let mut result_ty = expected.cloned();
        let mut ok_arm = None;
        let mut err_arm = None;
        for arm in arms {
            match &arm.pattern {
                ast::Pattern::TypeBinding { type_name, binding } => {
                    let (slot, payload_ty) = match type_name.as_str() {
                        "ok" => (&mut ok_arm, ok.clone()),
                        "err" => (&mut err_arm, err.clone()),
                        _ => {
                            self.error(
                                arm.span,
                                Code::UNSUPPORTED_PATTERN,
                                "result matches take 'ok(name)' and 'err(name)' cases",
                            );
                            continue;
                        }
                    };
                    if slot.is_some() {
                        self.error(
                            arm.span,
                            Code::DUPLICATE_CASE,
                            format!("duplicate '{type_name}' case"),
                        );
                        continue;
                    }
                    self.scopes.enter(RibKind::Block);
                    self.scopes.insert(
                        *binding,
                        Binding::Variable {
                            ty: payload_ty,
                            mutable: false,
                        },
                    );
                    let body = self.check_arm_body(&arm.body, &mut result_ty);
                    self.scopes.exit();
                    *slot = Some((*binding, body));
                }
                _ => self.error(
                    arm.span,
                    Code::UNSUPPORTED_PATTERN,
                    "result matches take 'ok(name)' and 'err(name)' cases",
                ),
            }
        }
        let (Some((ok_binding, ok_body)), Some((err_binding, err_body))) = (ok_arm, err_arm) else {
            self.error(
                span,
                Code::NON_EXHAUSTIVE_MATCH,
                "result match needs exactly one 'ok(name)' and one 'err(name)' case",
            );
            return self.error_expr(span);
        };
        let ty = self.result_type(result_ty);
        self.mk(
            ExprKind::ResultMatch {
                subject: Box::new(subject),
                ok_binding,
                ok_arm: Box::new(ok_body),
                err_binding,
                err_arm: Box::new(err_body),
            },
            ty,
            span,
        )
    }

    fn check_conditional_match(
        &mut self,
        arms: &[ast::MatchArm],
        span: Span,
        expected: Option<&Type>,
    ) -> tir::Expr {
        let mut result_ty = expected.cloned();
        let mut guards: Vec<(tir::Expr, tir::Expr)> = Vec::new();
        let mut default = None;
        for arm in arms {
            match &arm.pattern {
                ast::Pattern::Guard(cond) => {
                    if default.is_some() {
                        self.error(
                            arm.span,
                            Code::UNSUPPORTED_PATTERN,
                            "guard cases cannot follow the '_' default",
                        );
                    }
                    let cond = self.check_expr(cond, &Type::Bool);
                    let body = self.check_arm_body(&arm.body, &mut result_ty);
                    guards.push((cond, body));
                }
                ast::Pattern::Wildcard => {
                    if default.is_some() {
                        self.error(arm.span, Code::DUPLICATE_CASE, "duplicate '_' case");
                        continue;
                    }
                    default = Some(Box::new(self.check_arm_body(&arm.body, &mut result_ty)));
                }
                _ => self.error(
                    arm.span,
                    Code::UNSUPPORTED_PATTERN,
                    "conditional matches take boolean guards and a '_' case",
                ),
            }
        }
        let Some(default) = default else {
            self.error(
                span,
                Code::NON_EXHAUSTIVE_MATCH,
                "conditional match needs a '_' default case",
            );
            return self.error_expr(span);
        };
        let ty = self.result_type(result_ty);
        self.mk(
            ExprKind::ConditionalMatch {
                arms: guards,
                default,
            },
            ty,
            span,
        )
    }
}
