//! Type tree definitions.

use std::fmt;
use std::sync::Arc;

use ardc_util::{FxHashMap, Symbol};
use indexmap::IndexMap;

/// A type in the Ard type system.
///
/// Compounds box their components; declared (nominal) types are
/// `Arc`-shared so the same definition can appear in many signatures
/// without copying its member tables.
#[derive(Clone, PartialEq, Eq)]
pub enum Type {
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// Immutable string
    Str,
    /// Boolean
    Bool,
    /// No value
    Void,
    /// Statically unknown; produced only by FFI boundaries
    Dynamic,
    /// Optional value; `none` is distinct from every inner value
    Maybe(Box<Type>),
    /// Tagged sum of success and failure
    Result { ok: Box<Type>, err: Box<Type> },
    /// Ordered sequence
    List(Box<Type>),
    /// Key-value mapping with observable insertion order
    Map { key: Box<Type>, value: Box<Type> },
    /// First-class function
    Fn(Arc<FnType>),
    /// Nominal struct
    Struct(Arc<StructType>),
    /// Nominal enum
    Enum(Arc<EnumType>),
    /// Closed tagged union over the listed member types
    Union(Arc<UnionType>),
    /// Trait bound to structs via implementations
    Trait(Arc<TraitType>),
    /// Handle to a parallel execution carrying its result type
    Fiber(Box<Type>),
    /// Type variable; only inside generic definitions, replaced during
    /// specialization
    Var(Symbol),
}

/// A function parameter.
#[derive(Clone, Debug)]
pub struct Parameter {
    pub name: Symbol,
    pub ty: Type,
    pub mutable: bool,
}

/// A function type: parameter list and return type.
#[derive(Clone, Debug)]
pub struct FnType {
    pub params: Vec<Parameter>,
    pub ret: Type,
}

impl FnType {
    pub fn new(params: Vec<Parameter>, ret: Type) -> Self {
        Self { params, ret }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

// Signature equality ignores parameter names; trait conformance compares
// parameter types, mutability, and return type.
impl PartialEq for FnType {
    fn eq(&self, other: &Self) -> bool {
        self.ret == other.ret
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty == b.ty && a.mutable == b.mutable)
    }
}

impl Eq for FnType {}

/// A nominal struct type.
///
/// Fields are stored sorted by name; construction order in source does not
/// matter. Method and static tables live in the checker's symbol
/// information, not here, so forward references between structs can hand
/// out stub instances with empty field lists; equality is by name alone.
#[derive(Clone, Debug)]
pub struct StructType {
    pub name: Symbol,
    pub fields: Vec<(Symbol, Type)>,
}

impl StructType {
    pub fn field(&self, name: Symbol) -> Option<&Type> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, t)| t)
    }
}

impl PartialEq for StructType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for StructType {}

/// A nominal enum type. Variants compare as integer discriminants.
#[derive(Clone, Debug)]
pub struct EnumType {
    pub name: Symbol,
    pub variants: Vec<Symbol>,
    pub discriminants: IndexMap<Symbol, i64>,
}

impl EnumType {
    pub fn discriminant(&self, variant: Symbol) -> Option<i64> {
        self.discriminants.get(&variant).copied()
    }

    pub fn variant_for(&self, discriminant: i64) -> Option<Symbol> {
        self.discriminants
            .iter()
            .find(|(_, d)| **d == discriminant)
            .map(|(v, _)| *v)
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for EnumType {}

/// A closed tagged union; values are matched by variant type name.
#[derive(Clone, Debug)]
pub struct UnionType {
    pub name: Symbol,
    pub members: Vec<Type>,
}

impl UnionType {
    pub fn member_named(&self, name: &str) -> Option<&Type> {
        self.members.iter().find(|m| m.name() == name)
    }
}

impl PartialEq for UnionType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for UnionType {}

/// A trait: a named bundle of required method signatures.
#[derive(Clone, Debug)]
pub struct TraitType {
    pub name: Symbol,
    pub methods: Vec<(Symbol, Arc<FnType>)>,
}

impl TraitType {
    pub fn method(&self, name: Symbol) -> Option<&Arc<FnType>> {
        self.methods.iter().find(|(n, _)| *n == name).map(|(_, f)| f)
    }
}

impl PartialEq for TraitType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TraitType {}

impl Type {
    /// The canonical description string used for interning.
    ///
    /// Structural types render their full shape; nominal types render
    /// their name.
    pub fn describe(&self) -> String {
        match self {
            Type::Int => "Int".to_string(),
            Type::Float => "Float".to_string(),
            Type::Str => "Str".to_string(),
            Type::Bool => "Bool".to_string(),
            Type::Void => "Void".to_string(),
            Type::Dynamic => "Dynamic".to_string(),
            Type::Maybe(inner) => format!("{}?", inner.describe()),
            Type::Result { ok, err } => format!("{}!{}", ok.describe(), err.describe()),
            Type::List(of) => format!("[{}]", of.describe()),
            Type::Map { key, value } => format!("[{}:{}]", key.describe(), value.describe()),
            Type::Fn(f) => {
                let params: Vec<String> = f.params.iter().map(|p| p.ty.describe()).collect();
                format!("({}) {}", params.join(", "), f.ret.describe())
            }
            Type::Struct(s) => s.name.to_string(),
            Type::Enum(e) => e.name.to_string(),
            Type::Union(u) => u.name.to_string(),
            Type::Trait(t) => t.name.to_string(),
            Type::Fiber(inner) => format!("Fiber<{}>", inner.describe()),
            Type::Var(name) => format!("${name}"),
        }
    }

    /// The runtime-visible type name: what `TypeName` pushes and what union
    /// match arms compare against.
    pub fn name(&self) -> String {
        match self {
            Type::Struct(s) => s.name.to_string(),
            Type::Enum(e) => e.name.to_string(),
            Type::Union(u) => u.name.to_string(),
            Type::Trait(t) => t.name.to_string(),
            other => other.describe(),
        }
    }

    /// Whether a value of `self` fits a slot of type `slot`.
    ///
    /// `int_literal` marks the value side as an integer literal constant,
    /// which alone may widen to a float slot.
    pub fn assignable_to(&self, slot: &Type, int_literal: bool) -> bool {
        if self == slot {
            return true;
        }
        match (self, slot) {
            // FFI handles are unchecked on both sides
            (Type::Dynamic, _) | (_, Type::Dynamic) => true,
            (_, Type::Union(u)) => u.members.iter().any(|m| self.assignable_to(m, int_literal)),
            (Type::Int, Type::Float) => int_literal,
            _ => false,
        }
    }

    /// Whether any type variable occurs in this type.
    pub fn has_vars(&self) -> bool {
        match self {
            Type::Var(_) => true,
            Type::Maybe(t) | Type::List(t) | Type::Fiber(t) => t.has_vars(),
            Type::Result { ok, err } => ok.has_vars() || err.has_vars(),
            Type::Map { key, value } => key.has_vars() || value.has_vars(),
            Type::Fn(f) => f.params.iter().any(|p| p.ty.has_vars()) || f.ret.has_vars(),
            _ => false,
        }
    }

    /// Replace type variables according to `bindings`. Unbound variables
    /// are left in place for the caller to diagnose.
    pub fn substitute(&self, bindings: &FxHashMap<Symbol, Type>) -> Type {
        match self {
            Type::Var(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Type::Maybe(t) => Type::Maybe(Box::new(t.substitute(bindings))),
            Type::List(t) => Type::List(Box::new(t.substitute(bindings))),
            Type::Fiber(t) => Type::Fiber(Box::new(t.substitute(bindings))),
            Type::Result { ok, err } => Type::Result {
                ok: Box::new(ok.substitute(bindings)),
                err: Box::new(err.substitute(bindings)),
            },
            Type::Map { key, value } => Type::Map {
                key: Box::new(key.substitute(bindings)),
                value: Box::new(value.substitute(bindings)),
            },
            Type::Fn(f) => Type::Fn(Arc::new(FnType {
                params: f
                    .params
                    .iter()
                    .map(|p| Parameter {
                        name: p.name,
                        ty: p.ty.substitute(bindings),
                        mutable: p.mutable,
                    })
                    .collect(),
                ret: f.ret.substitute(bindings),
            })),
            other => other.clone(),
        }
    }

    /// Unify this (possibly variable-bearing) type against a concrete type,
    /// accumulating variable bindings. Repeated occurrences of the same
    /// variable must land on the same concrete type.
    pub fn unify(&self, concrete: &Type, bindings: &mut FxHashMap<Symbol, Type>) -> bool {
        match (self, concrete) {
            (Type::Var(name), _) => match bindings.get(name) {
                Some(bound) => bound == concrete,
                None => {
                    bindings.insert(*name, concrete.clone());
                    true
                }
            },
            (Type::Maybe(a), Type::Maybe(b)) => a.unify(b, bindings),
            (Type::List(a), Type::List(b)) => a.unify(b, bindings),
            (Type::Fiber(a), Type::Fiber(b)) => a.unify(b, bindings),
            (Type::Result { ok: a, err: ae }, Type::Result { ok: b, err: be }) => {
                a.unify(b, bindings) && ae.unify(be, bindings)
            }
            (Type::Map { key: ak, value: av }, Type::Map { key: bk, value: bv }) => {
                ak.unify(bk, bindings) && av.unify(bv, bindings)
            }
            (Type::Fn(a), Type::Fn(b)) => {
                a.params.len() == b.params.len()
                    && a.params
                        .iter()
                        .zip(&b.params)
                        .all(|(pa, pb)| pa.ty.unify(&pb.ty, bindings))
                    && a.ret.unify(&b.ret, bindings)
            }
            (a, b) => a == b,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// Whether values of this type can key a map.
    pub fn is_hashable(&self) -> bool {
        matches!(self, Type::Int | Type::Str | Type::Bool | Type::Enum(_))
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maybe(t: Type) -> Type {
        Type::Maybe(Box::new(t))
    }

    fn list(t: Type) -> Type {
        Type::List(Box::new(t))
    }

    #[test]
    fn test_primitive_equality() {
        assert_eq!(Type::Int, Type::Int);
        assert_ne!(Type::Int, Type::Float);
    }

    #[test]
    fn test_compound_structural_equality() {
        assert_eq!(list(Type::Int), list(Type::Int));
        assert_ne!(list(Type::Int), list(Type::Str));
        assert_eq!(maybe(Type::Str), maybe(Type::Str));
    }

    #[test]
    fn test_struct_nominal_equality() {
        let a = Type::Struct(Arc::new(StructType {
            name: Symbol::intern("Point"),
            fields: vec![(Symbol::intern("x"), Type::Int)],
        }));
        let stub = Type::Struct(Arc::new(StructType {
            name: Symbol::intern("Point"),
            fields: vec![],
        }));
        let other = Type::Struct(Arc::new(StructType {
            name: Symbol::intern("Size"),
            fields: vec![(Symbol::intern("x"), Type::Int)],
        }));
        assert_eq!(a, stub);
        assert_ne!(a, other);
    }

    #[test]
    fn test_describe() {
        assert_eq!(Type::Int.describe(), "Int");
        assert_eq!(maybe(Type::Int).describe(), "Int?");
        assert_eq!(
            Type::Result {
                ok: Box::new(Type::Int),
                err: Box::new(Type::Str)
            }
            .describe(),
            "Int!Str"
        );
        assert_eq!(list(Type::Str).describe(), "[Str]");
        assert_eq!(
            Type::Map {
                key: Box::new(Type::Str),
                value: Box::new(Type::Int)
            }
            .describe(),
            "[Str:Int]"
        );
        assert_eq!(Type::Fiber(Box::new(Type::Int)).describe(), "Fiber<Int>");
    }

    #[test]
    fn test_fn_type_equality_ignores_names() {
        let a = FnType::new(
            vec![Parameter {
                name: Symbol::intern("a"),
                ty: Type::Int,
                mutable: false,
            }],
            Type::Bool,
        );
        let b = FnType::new(
            vec![Parameter {
                name: Symbol::intern("b"),
                ty: Type::Int,
                mutable: false,
            }],
            Type::Bool,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_assignable_to_union() {
        let union = Type::Union(Arc::new(UnionType {
            name: Symbol::intern("P"),
            members: vec![Type::Int, Type::Str],
        }));
        assert!(Type::Int.assignable_to(&union, false));
        assert!(Type::Str.assignable_to(&union, false));
        assert!(!Type::Bool.assignable_to(&union, false));
    }

    #[test]
    fn test_int_literal_widening() {
        assert!(Type::Int.assignable_to(&Type::Float, true));
        assert!(!Type::Int.assignable_to(&Type::Float, false));
    }

    #[test]
    fn test_unify_binds_vars() {
        let t = Symbol::intern("T");
        let generic = Type::List(Box::new(Type::Var(t)));
        let concrete = list(Type::Int);
        let mut bindings = FxHashMap::default();
        assert!(generic.unify(&concrete, &mut bindings));
        assert_eq!(bindings.get(&t), Some(&Type::Int));
    }

    #[test]
    fn test_unify_conflicting_vars() {
        let t = Symbol::intern("T");
        let generic = Type::Fn(Arc::new(FnType::new(
            vec![
                Parameter {
                    name: Symbol::intern("a"),
                    ty: Type::Var(t),
                    mutable: false,
                },
                Parameter {
                    name: Symbol::intern("b"),
                    ty: Type::Var(t),
                    mutable: false,
                },
            ],
            Type::Var(t),
        )));
        let concrete = Type::Fn(Arc::new(FnType::new(
            vec![
                Parameter {
                    name: Symbol::intern("a"),
                    ty: Type::Int,
                    mutable: false,
                },
                Parameter {
                    name: Symbol::intern("b"),
                    ty: Type::Str,
                    mutable: false,
                },
            ],
            Type::Int,
        )));
        let mut bindings = FxHashMap::default();
        assert!(!generic.unify(&concrete, &mut bindings));
    }

    #[test]
    fn test_substitute() {
        let t = Symbol::intern("T");
        let mut bindings = FxHashMap::default();
        bindings.insert(t, Type::Float);
        let generic = maybe(Type::Var(t));
        assert_eq!(generic.substitute(&bindings), maybe(Type::Float));
    }

    #[test]
    fn test_enum_discriminants() {
        let mut discriminants = IndexMap::new();
        discriminants.insert(Symbol::intern("Up"), 0);
        discriminants.insert(Symbol::intern("Down"), 5);
        let e = EnumType {
            name: Symbol::intern("Dir"),
            variants: vec![Symbol::intern("Up"), Symbol::intern("Down")],
            discriminants,
        };
        assert_eq!(e.discriminant(Symbol::intern("Down")), Some(5));
        assert_eq!(e.variant_for(5), Some(Symbol::intern("Down")));
        assert_eq!(e.variant_for(3), None);
    }

    #[test]
    fn test_hashable() {
        assert!(Type::Int.is_hashable());
        assert!(Type::Str.is_hashable());
        assert!(!list(Type::Int).is_hashable());
        assert!(!Type::Float.is_hashable());
    }
}
