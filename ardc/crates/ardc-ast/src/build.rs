//! Terse AST constructors.
//!
//! Embedders and tests build programs directly (the surface parser lives
//! outside this workspace). These helpers keep that construction readable;
//! all nodes get dummy spans.

use ardc_util::{Span, Symbol};

use crate::*;

pub fn program(statements: Vec<Stmt>) -> Program {
    Program {
        imports: vec![],
        statements,
    }
}

pub fn program_with_imports(imports: Vec<Import>, statements: Vec<Stmt>) -> Program {
    Program {
        imports,
        statements,
    }
}

pub fn import(path: &str) -> Import {
    Import {
        path: path.to_string(),
        alias: None,
        span: Span::DUMMY,
    }
}

pub fn import_as(path: &str, alias: &str) -> Import {
    Import {
        path: path.to_string(),
        alias: Some(Symbol::intern(alias)),
        span: Span::DUMMY,
    }
}

// Statements

pub fn stmt(kind: StmtKind) -> Stmt {
    Stmt {
        kind,
        span: Span::DUMMY,
    }
}

pub fn let_(name: &str, value: Expr) -> Stmt {
    stmt(StmtKind::Let {
        name: Symbol::intern(name),
        mutable: false,
        ty: None,
        value,
    })
}

pub fn let_typed(name: &str, ty: TypeExpr, value: Expr) -> Stmt {
    stmt(StmtKind::Let {
        name: Symbol::intern(name),
        mutable: false,
        ty: Some(ty),
        value,
    })
}

pub fn mut_(name: &str, value: Expr) -> Stmt {
    stmt(StmtKind::Let {
        name: Symbol::intern(name),
        mutable: true,
        ty: None,
        value,
    })
}

pub fn reassign(target: Expr, value: Expr) -> Stmt {
    stmt(StmtKind::Reassign { target, value })
}

pub fn expr_stmt(e: Expr) -> Stmt {
    stmt(StmtKind::Expr(e))
}

pub fn block(statements: Vec<Stmt>) -> Block {
    Block {
        statements,
        span: Span::DUMMY,
    }
}

pub fn if_(cond: Expr, then: Block, else_block: Option<Block>) -> Stmt {
    stmt(StmtKind::If(IfStmt {
        cond,
        then,
        else_ifs: vec![],
        else_block,
    }))
}

pub fn while_(cond: Expr, body: Block) -> Stmt {
    stmt(StmtKind::While { cond, body })
}

pub fn for_range(var: &str, start: Expr, end: Expr, body: Block) -> Stmt {
    stmt(StmtKind::ForRange {
        var: Symbol::intern(var),
        start,
        end,
        body,
    })
}

pub fn for_in(var: &str, subject: Expr, body: Block) -> Stmt {
    stmt(StmtKind::ForIn {
        first: Symbol::intern(var),
        second: None,
        subject,
        body,
    })
}

pub fn for_in_kv(key: &str, value: &str, subject: Expr, body: Block) -> Stmt {
    stmt(StmtKind::ForIn {
        first: Symbol::intern(key),
        second: Some(Symbol::intern(value)),
        subject,
        body,
    })
}

pub fn fn_decl(name: &str, params: Vec<Param>, ret: Option<TypeExpr>, body: Block) -> FnDecl {
    FnDecl {
        name: Symbol::intern(name),
        type_params: vec![],
        params,
        ret,
        body,
        mutates: false,
        is_static: false,
        span: Span::DUMMY,
    }
}

pub fn fn_(name: &str, params: Vec<Param>, ret: Option<TypeExpr>, body: Block) -> Stmt {
    stmt(StmtKind::Fn(fn_decl(name, params, ret, body)))
}

pub fn generic_fn(
    name: &str,
    type_params: Vec<&str>,
    params: Vec<Param>,
    ret: Option<TypeExpr>,
    body: Block,
) -> Stmt {
    let mut decl = fn_decl(name, params, ret, body);
    decl.type_params = type_params.into_iter().map(Symbol::intern).collect();
    stmt(StmtKind::Fn(decl))
}

pub fn impl_(target: &str, methods: Vec<FnDecl>) -> Stmt {
    stmt(StmtKind::Impl(ImplBlock {
        target: Symbol::intern(target),
        methods,
        span: Span::DUMMY,
    }))
}

pub fn param(name: &str, ty: TypeExpr) -> Param {
    Param {
        name: Symbol::intern(name),
        ty,
        mutable: false,
    }
}

pub fn mut_param(name: &str, ty: TypeExpr) -> Param {
    Param {
        name: Symbol::intern(name),
        ty,
        mutable: true,
    }
}

pub fn struct_(name: &str, fields: Vec<(&str, TypeExpr)>) -> Stmt {
    stmt(StmtKind::Struct(StructDecl {
        name: Symbol::intern(name),
        fields: fields
            .into_iter()
            .map(|(n, t)| (Symbol::intern(n), t))
            .collect(),
        span: Span::DUMMY,
    }))
}

pub fn enum_(name: &str, variants: Vec<&str>) -> Stmt {
    stmt(StmtKind::Enum(EnumDecl {
        name: Symbol::intern(name),
        variants: variants.into_iter().map(|v| (Symbol::intern(v), None)).collect(),
        span: Span::DUMMY,
    }))
}

/// Enum declaration with explicit discriminants where given; the rest
/// auto-increment from the previous value.
pub fn enum_with_values(name: &str, variants: Vec<(&str, Option<i64>)>) -> Stmt {
    stmt(StmtKind::Enum(EnumDecl {
        name: Symbol::intern(name),
        variants: variants
            .into_iter()
            .map(|(v, value)| (Symbol::intern(v), value))
            .collect(),
        span: Span::DUMMY,
    }))
}

pub fn union_(name: &str, members: Vec<TypeExpr>) -> Stmt {
    stmt(StmtKind::Union(UnionDecl {
        name: Symbol::intern(name),
        members,
        span: Span::DUMMY,
    }))
}

// Expressions

pub fn expr(kind: ExprKind) -> Expr {
    Expr {
        kind,
        span: Span::DUMMY,
    }
}

pub fn int(value: i64) -> Expr {
    expr(ExprKind::Int(value))
}

pub fn float(value: f64) -> Expr {
    expr(ExprKind::Float(value))
}

pub fn str_(value: &str) -> Expr {
    expr(ExprKind::Str(value.to_string()))
}

pub fn bool_(value: bool) -> Expr {
    expr(ExprKind::Bool(value))
}

pub fn ident(name: &str) -> Expr {
    expr(ExprKind::Ident(Symbol::intern(name)))
}

pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    expr(ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    expr(ExprKind::Unary {
        op,
        operand: Box::new(operand),
    })
}

pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    expr(ExprKind::Call {
        callee: Box::new(ident(name)),
        type_args: vec![],
        args,
    })
}

pub fn method(subject: Expr, name: &str, args: Vec<Expr>) -> Expr {
    expr(ExprKind::MethodCall {
        subject: Box::new(subject),
        name: Symbol::intern(name),
        args,
    })
}

pub fn property(subject: Expr, name: &str) -> Expr {
    expr(ExprKind::Property {
        subject: Box::new(subject),
        name: Symbol::intern(name),
    })
}

pub fn static_access(target: &str, member: &str) -> Expr {
    expr(ExprKind::StaticAccess {
        target: Symbol::intern(target),
        member: Symbol::intern(member),
        args: None,
    })
}

pub fn static_call(target: &str, member: &str, args: Vec<Expr>) -> Expr {
    expr(ExprKind::StaticAccess {
        target: Symbol::intern(target),
        member: Symbol::intern(member),
        args: Some(args),
    })
}

pub fn list(items: Vec<Expr>) -> Expr {
    expr(ExprKind::ListLit(items))
}

pub fn map(entries: Vec<(Expr, Expr)>) -> Expr {
    expr(ExprKind::MapLit(entries))
}

pub fn struct_lit(name: &str, fields: Vec<(&str, Expr)>) -> Expr {
    expr(ExprKind::StructLit {
        name: Symbol::intern(name),
        fields: fields
            .into_iter()
            .map(|(n, e)| (Symbol::intern(n), e))
            .collect(),
    })
}

pub fn lambda(params: Vec<Param>, ret: Option<TypeExpr>, body: Block) -> Expr {
    expr(ExprKind::Lambda { params, ret, body })
}

pub fn match_(subject: Expr, arms: Vec<MatchArm>) -> Expr {
    expr(ExprKind::Match {
        subject: Some(Box::new(subject)),
        arms,
    })
}

pub fn cond_match(arms: Vec<MatchArm>) -> Expr {
    expr(ExprKind::Match {
        subject: None,
        arms,
    })
}

pub fn arm(pattern: Pattern, body: Expr) -> MatchArm {
    MatchArm {
        pattern,
        body,
        span: Span::DUMMY,
    }
}

pub fn try_(e: Expr) -> Expr {
    expr(ExprKind::Try {
        expr: Box::new(e),
        catch: None,
    })
}

/// `try e catch binding { body }`; the block runs for its effects, then
/// the failure still propagates.
pub fn try_catch(e: Expr, binding: &str, body: Block) -> Expr {
    expr(ExprKind::Try {
        expr: Box::new(e),
        catch: Some(CatchClause {
            binding: Some(Symbol::intern(binding)),
            body,
        }),
    })
}

pub fn panic_(message: Expr) -> Expr {
    expr(ExprKind::Panic(Box::new(message)))
}

pub fn spawn(callee: Expr) -> Expr {
    expr(ExprKind::Spawn(Box::new(callee)))
}

pub fn await_(fiber: Expr) -> Expr {
    expr(ExprKind::Await(Box::new(fiber)))
}

// Type expressions

pub fn ty_named(name: &str) -> TypeExpr {
    TypeExpr::Named(Symbol::intern(name))
}

pub fn ty_var(name: &str) -> TypeExpr {
    TypeExpr::Var(Symbol::intern(name))
}

pub fn ty_int() -> TypeExpr {
    ty_named("Int")
}

pub fn ty_float() -> TypeExpr {
    ty_named("Float")
}

pub fn ty_str() -> TypeExpr {
    ty_named("Str")
}

pub fn ty_bool() -> TypeExpr {
    ty_named("Bool")
}

pub fn ty_maybe(inner: TypeExpr) -> TypeExpr {
    TypeExpr::Maybe(Box::new(inner))
}

pub fn ty_result(ok: TypeExpr, err: TypeExpr) -> TypeExpr {
    TypeExpr::Result(Box::new(ok), Box::new(err))
}

pub fn ty_list(of: TypeExpr) -> TypeExpr {
    TypeExpr::List(Box::new(of))
}

pub fn ty_map(key: TypeExpr, value: TypeExpr) -> TypeExpr {
    TypeExpr::Map(Box::new(key), Box::new(value))
}
