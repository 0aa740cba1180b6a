//! Typed IR.
//!
//! The checker's output form. It mirrors the AST node for node, but every
//! expression carries its resolved [`Type`], names are verified, match
//! forms are classified, and built-in method calls carry their selected
//! kind. The emitter consumes this without re-doing any analysis.

use std::rc::Rc;
use std::sync::Arc;

use ardc_types::{
    BoolMethodKind, EnumType, FloatMethodKind, FnType, IntMethodKind, ListMethodKind,
    MapMethodKind, MaybeMethodKind, ResultMethodKind, StrMethodKind, StructType, Type,
};
use ardc_util::{Span, Symbol};

/// A typed statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    VariableDef(VariableDef),
    Reassignment(Reassignment),
    If(If),
    WhileLoop(WhileLoop),
    ForIntRange(ForIntRange),
    ForInList(ForIn),
    ForInMap(ForInMap),
    ForInStr(ForIn),
    Break(Span),
    FunctionDef(Rc<FunctionDef>),
    ExternalFunctionDef(Rc<ExternalFunctionDef>),
    StructDef(StructDef),
    EnumDef(EnumDef),
    UnionDef(Arc<ardc_types::UnionType>),
    TraitDef(Arc<ardc_types::TraitType>),
    Expr(Expr),
}

impl Stmt {
    /// Declarations emit nothing into the statement stream; they only
    /// contribute functions and type-table entries.
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            Stmt::FunctionDef(_)
                | Stmt::ExternalFunctionDef(_)
                | Stmt::StructDef(_)
                | Stmt::EnumDef(_)
                | Stmt::UnionDef(_)
                | Stmt::TraitDef(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct VariableDef {
    pub name: Symbol,
    pub mutable: bool,
    pub value: Expr,
    pub span: Span,
}

/// The verified target of a reassignment; its root subject is mutable.
#[derive(Debug, Clone)]
pub enum AssignTarget {
    Variable(Symbol),
    Property { subject: Expr, name: Symbol },
}

#[derive(Debug, Clone)]
pub struct Reassignment {
    pub target: AssignTarget,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct If {
    pub cond: Expr,
    pub then: Vec<Stmt>,
    pub else_ifs: Vec<(Expr, Vec<Stmt>)>,
    pub else_block: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct WhileLoop {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

/// `for var in start..end`, both ends included.
#[derive(Debug, Clone)]
pub struct ForIntRange {
    pub var: Symbol,
    pub start: Expr,
    pub end: Expr,
    pub body: Vec<Stmt>,
}

/// List and string iteration share a shape: one binding per element.
#[derive(Debug, Clone)]
pub struct ForIn {
    pub var: Symbol,
    pub var_ty: Type,
    pub subject: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct ForInMap {
    pub key: Symbol,
    pub key_ty: Type,
    pub value: Symbol,
    pub value_ty: Type,
    pub subject: Expr,
    pub body: Vec<Stmt>,
}

/// A checked function body: statements plus the trailing value expression.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub value: Option<Box<Expr>>,
}

/// A variable captured from a lexical parent at closure creation.
#[derive(Debug, Clone)]
pub struct Capture {
    pub name: Symbol,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Symbol,
    pub ty: Arc<FnType>,
    pub body: Block,
    /// Populated for closures; empty for top-level functions
    pub captures: Vec<Capture>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ExternalFunctionDef {
    pub name: Symbol,
    /// FFI registry binding name
    pub binding: String,
    pub ty: Arc<FnType>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub ty: Arc<StructType>,
    pub methods: Vec<MethodDef>,
    pub statics: Vec<Rc<FunctionDef>>,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub ty: Arc<EnumType>,
    pub methods: Vec<MethodDef>,
}

/// An instance method; the receiver (`@`) is local slot zero at runtime.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: Symbol,
    pub mutates: bool,
    pub def: Rc<FunctionDef>,
}

/// A typed expression.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Void,
    /// A resolved variable read
    Variable(Symbol),
    /// The method receiver (`@`)
    SelfRef,
    /// Interpolated string; every part is Str-typed by construction
    TemplateStr(Vec<Expr>),
    Unary {
        op: ardc_ast::UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: ardc_ast::BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    ListLit(Vec<Expr>),
    MapLit(Vec<(Expr, Expr)>),
    /// Fields sorted by name
    StructInstance {
        ty: Arc<StructType>,
        fields: Vec<(Symbol, Expr)>,
    },
    InstanceProperty {
        subject: Box<Expr>,
        name: Symbol,
    },
    /// A method on a user struct or enum, dispatched by name at runtime
    InstanceMethod {
        subject: Box<Expr>,
        method: Symbol,
        args: Vec<Expr>,
        mutates: bool,
    },
    EnumVariant {
        ty: Arc<EnumType>,
        variant: Symbol,
        discriminant: i64,
    },
    /// Direct call to a named function in this module (or a specialization)
    FunctionCall {
        name: Symbol,
        args: Vec<Expr>,
    },
    /// Call through a function-typed value
    ClosureCall {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Call to a function of an imported user module
    ModuleFunctionCall {
        module_path: String,
        function: Symbol,
        args: Vec<Expr>,
    },
    /// Closure creation: function plus the values it captures
    Closure {
        def: Rc<FunctionDef>,
    },
    /// A named function used as a first-class value
    FunctionRef(Symbol),
    /// `Maybe::some(v)` / `Maybe::none()`
    MakeMaybe {
        value: Option<Box<Expr>>,
    },
    /// `Result::ok(v)` / `Result::err(e)`
    MakeResult {
        is_ok: bool,
        value: Box<Expr>,
    },
    // Built-in kind methods; the kind selects the native operation
    StrMethod {
        subject: Box<Expr>,
        kind: StrMethodKind,
        args: Vec<Expr>,
    },
    IntMethod {
        subject: Box<Expr>,
        kind: IntMethodKind,
    },
    FloatMethod {
        subject: Box<Expr>,
        kind: FloatMethodKind,
    },
    BoolMethod {
        subject: Box<Expr>,
        kind: BoolMethodKind,
    },
    ListMethod {
        subject: Box<Expr>,
        kind: ListMethodKind,
        args: Vec<Expr>,
    },
    MapMethod {
        subject: Box<Expr>,
        kind: MapMethodKind,
        args: Vec<Expr>,
    },
    MaybeMethod {
        subject: Box<Expr>,
        kind: MaybeMethodKind,
        args: Vec<Expr>,
    },
    ResultMethod {
        subject: Box<Expr>,
        kind: ResultMethodKind,
        args: Vec<Expr>,
    },
    // Match forms; every arm body has unified to this expression's type
    BoolMatch {
        subject: Box<Expr>,
        true_arm: Box<Expr>,
        false_arm: Box<Expr>,
    },
    IntMatch {
        subject: Box<Expr>,
        arms: Vec<(IntPattern, Expr)>,
        default: Option<Box<Expr>>,
    },
    EnumMatch {
        subject: Box<Expr>,
        enum_ty: Arc<EnumType>,
        arms: Vec<(i64, Expr)>,
        default: Option<Box<Expr>>,
    },
    UnionMatch {
        subject: Box<Expr>,
        arms: Vec<UnionArm>,
        default: Option<Box<Expr>>,
    },
    OptionMatch {
        subject: Box<Expr>,
        binding: Symbol,
        some_arm: Box<Expr>,
        none_arm: Box<Expr>,
    },
    ResultMatch {
        subject: Box<Expr>,
        ok_binding: Symbol,
        ok_arm: Box<Expr>,
        err_binding: Symbol,
        err_arm: Box<Expr>,
    },
    ConditionalMatch {
        arms: Vec<(Expr, Expr)>,
        default: Box<Expr>,
    },
    /// `try expr`, validated against the enclosing function's return type
    TryOp {
        expr: Box<Expr>,
        catch: Option<TryCatch>,
        mode: TryMode,
    },
    Panic(Box<Expr>),
    /// Statement block in expression position
    Block(Block),
    /// Start a callable on its own fiber; type is `Fiber<T>`
    FiberExecution {
        callee: Box<Expr>,
    },
    /// Block for a fiber's result; type is the carried `T`
    FiberEval {
        fiber: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntPattern {
    Lit(i64),
    /// Inclusive on both ends
    Range(i64, i64),
}

impl IntPattern {
    pub fn matches(self, value: i64) -> bool {
        match self {
            IntPattern::Lit(k) => value == k,
            IntPattern::Range(start, end) => start <= value && value <= end,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnionArm {
    pub member: Type,
    pub binding: Symbol,
    pub body: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryMode {
    Result,
    Maybe,
}

/// The optional catch half of a `try`. The block runs for its effects,
/// then the frame propagates the failure.
#[derive(Debug, Clone)]
pub struct TryCatch {
    pub binding: Option<Symbol>,
    pub body: Vec<Stmt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_pattern_lit() {
        assert!(IntPattern::Lit(3).matches(3));
        assert!(!IntPattern::Lit(3).matches(4));
    }

    #[test]
    fn test_int_pattern_range_inclusive() {
        let p = IntPattern::Range(1, 5);
        assert!(p.matches(1));
        assert!(p.matches(5));
        assert!(!p.matches(0));
        assert!(!p.matches(6));
    }

    #[test]
    fn test_declaration_statements() {
        let def = Rc::new(FunctionDef {
            name: Symbol::intern("f"),
            ty: Arc::new(FnType::new(vec![], Type::Void)),
            body: Block::default(),
            captures: vec![],
            span: Span::DUMMY,
        });
        assert!(Stmt::FunctionDef(def).is_declaration());
        assert!(!Stmt::Break(Span::DUMMY).is_declaration());
    }
}
