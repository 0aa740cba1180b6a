//! ardc-ast - AST Node Definitions
//!
//! The untyped syntax tree the checker consumes. The surface parser is an
//! external collaborator; this crate is the contract it must satisfy.
//! Every statement and expression carries a [`Span`] pointing into the
//! source file it was parsed from.

pub mod build;

use ardc_util::{Span, Symbol};

/// AST root: one source file.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub imports: Vec<Import>,
    pub statements: Vec<Stmt>,
}

/// A module import, optionally aliased.
///
/// Paths are workspace-relative (`lib/geometry`) or standard-library
/// (`ard/maybe`). Without an alias the module binds as the last path
/// segment.
#[derive(Debug, Clone)]
pub struct Import {
    pub path: String,
    pub alias: Option<Symbol>,
    pub span: Span,
}

impl Import {
    /// The name this import binds in the importing module.
    pub fn local_name(&self) -> Symbol {
        self.alias.unwrap_or_else(|| {
            Symbol::intern(self.path.rsplit('/').next().unwrap_or(&self.path))
        })
    }
}

/// A type as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// A named type: a primitive or a declared struct/enum/union/trait
    Named(Symbol),
    /// A generic type variable (`$T`)
    Var(Symbol),
    /// `T?`
    Maybe(Box<TypeExpr>),
    /// `Ok!Err`
    Result(Box<TypeExpr>, Box<TypeExpr>),
    /// `[T]`
    List(Box<TypeExpr>),
    /// `[K:V]`
    Map(Box<TypeExpr>, Box<TypeExpr>),
    /// `(A, B) R`
    Fn(Vec<TypeExpr>, Box<TypeExpr>),
    /// `Fiber<T>`
    Fiber(Box<TypeExpr>),
    Void,
}

/// A statement with its source location.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `let name = value` / `mut name: T = value`
    Let {
        name: Symbol,
        mutable: bool,
        ty: Option<TypeExpr>,
        value: Expr,
    },
    /// `target = value` where target is an identifier or property chain
    Reassign { target: Expr, value: Expr },
    Fn(FnDecl),
    /// `extern fn name(params) Ret = "binding"`
    ExternFn { sig: FnSig, binding: String },
    Struct(StructDecl),
    Enum(EnumDecl),
    Union(UnionDecl),
    Trait(TraitDecl),
    /// `impl Name { fn ... }`
    Impl(ImplBlock),
    /// `impl TraitName for Name { fn ... }`
    TraitImpl(TraitImplBlock),
    If(IfStmt),
    While {
        cond: Expr,
        body: Block,
    },
    /// `for i in start..end { ... }`
    ForRange {
        var: Symbol,
        start: Expr,
        end: Expr,
        body: Block,
    },
    /// `for x in subject` / `for k, v in subject`
    ForIn {
        first: Symbol,
        second: Option<Symbol>,
        subject: Expr,
        body: Block,
    },
    Break,
    Expr(Expr),
}

/// `if` / `else if` / `else` chain.
#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then: Block,
    pub else_ifs: Vec<(Expr, Block)>,
    pub else_block: Option<Block>,
}

/// A braced statement list. As an expression its value is the value of the
/// final expression statement, or void.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

/// A function declaration.
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: Symbol,
    /// Generic type variables (`$T`) appearing in the signature
    pub type_params: Vec<Symbol>,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Block,
    /// Inside an impl block: the method mutates its receiver (`mut fn`)
    pub mutates: bool,
    /// Inside an impl block: an associated function with no receiver
    pub is_static: bool,
    pub span: Span,
}

/// A function signature without a body (trait methods, extern fns).
#[derive(Debug, Clone)]
pub struct FnSig {
    pub name: Symbol,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Symbol,
    pub ty: TypeExpr,
    pub mutable: bool,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: Symbol,
    pub fields: Vec<(Symbol, TypeExpr)>,
    pub span: Span,
}

/// Enum declaration; variants may carry explicit discriminant values.
#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: Symbol,
    pub variants: Vec<(Symbol, Option<i64>)>,
    pub span: Span,
}

/// `type Name = A|B|C`
#[derive(Debug, Clone)]
pub struct UnionDecl {
    pub name: Symbol,
    pub members: Vec<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TraitDecl {
    pub name: Symbol,
    pub methods: Vec<FnSig>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ImplBlock {
    pub target: Symbol,
    pub methods: Vec<FnDecl>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TraitImplBlock {
    pub trait_name: Symbol,
    pub target: Symbol,
    pub methods: Vec<FnDecl>,
    pub span: Span,
}

/// An expression with its source location.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Void,
    Ident(Symbol),
    /// The implicit method receiver (`@`)
    SelfRef,
    /// Interpolated string: literal and expression chunks in order
    Template(Vec<TemplateChunk>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    ListLit(Vec<Expr>),
    MapLit(Vec<(Expr, Expr)>),
    StructLit {
        name: Symbol,
        fields: Vec<(Symbol, Expr)>,
    },
    /// `subject.name`
    Property {
        subject: Box<Expr>,
        name: Symbol,
    },
    /// `subject.name(args)`
    MethodCall {
        subject: Box<Expr>,
        name: Symbol,
        args: Vec<Expr>,
    },
    /// `Target::member` or `target::member(args)`; covers enum variants,
    /// struct statics, prelude constructors, and module function calls
    StaticAccess {
        target: Symbol,
        member: Symbol,
        args: Option<Vec<Expr>>,
    },
    /// `callee(args)` with optional explicit type arguments
    Call {
        callee: Box<Expr>,
        type_args: Vec<TypeExpr>,
        args: Vec<Expr>,
    },
    /// Anonymous function
    Lambda {
        params: Vec<Param>,
        ret: Option<TypeExpr>,
        body: Block,
    },
    Block(Block),
    /// `match subject { arms }`; subject absent for conditional matches
    Match {
        subject: Option<Box<Expr>>,
        arms: Vec<MatchArm>,
    },
    /// `try expr` with optional `catch name { ... }`
    Try {
        expr: Box<Expr>,
        catch: Option<CatchClause>,
    },
    /// `panic(message)`
    Panic(Box<Expr>),
    /// `fiber expr`: start `expr` (a callable) on its own fiber
    Spawn(Box<Expr>),
    /// `expr.join()` surface form: block for a fiber's result
    Await(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum TemplateChunk {
    Lit(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// One arm of a `match` expression.
#[derive(Debug, Clone)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Expr,
    pub span: Span,
}

/// A match-arm pattern. The checker classifies the whole match form from
/// the subject type and validates each pattern against it.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// `_`
    Wildcard,
    Int(i64),
    /// `start..end`, both ends included
    IntRange { start: i64, end: i64 },
    Bool(bool),
    /// `Enum::Variant`
    Variant { enum_name: Symbol, variant: Symbol },
    /// A bare name: binds the unwrapped value (maybe matches)
    Binding(Symbol),
    /// `TypeName(name)`: union arms and `ok(x)` / `err(x)` result arms
    TypeBinding { type_name: Symbol, binding: Symbol },
    /// A boolean guard expression (conditional matches)
    Guard(Expr),
}

/// The catch half of a `try ... catch` expression.
#[derive(Debug, Clone)]
pub struct CatchClause {
    pub binding: Option<Symbol>,
    pub body: Block,
}
