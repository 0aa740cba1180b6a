//! Runtime values.
//!
//! A value carries a kind, a payload, and (where it matters at runtime)
//! the id of its declared type. Heap values (strings, lists, maps,
//! struct instances, closures) are reference-counted `Arc` cells shared
//! across fibers; interior mutability sits behind `RwLock` because fibers
//! run on host threads. The language contract is that a mutable value is
//! never mutated concurrently with another access; the lock keeps a
//! contract violation from becoming memory unsafety.
//!
//! Integer arithmetic wraps on overflow (two's complement); float
//! equality is IEEE, so `NaN != NaN`.

use std::any::Any;
use std::sync::Arc;

use ardc_code::{FuncId, TypeTable};
use ardc_types::TypeId;
use indexmap::IndexMap;
use parking_lot::RwLock;

/// Type id carried by values whose static type was unknowable (FFI
/// results, inference fallbacks).
pub const UNKNOWN_TYPE: u32 = u32::MAX;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Arc<str>),
    Void,
    List(ListRef),
    Map(MapRef),
    Struct(StructRef),
    Enum { type_id: u32, discriminant: i64 },
    Maybe { type_id: u32, value: Option<Box<Value>> },
    Result { type_id: u32, is_ok: bool, value: Box<Value> },
    Closure(Arc<ClosureVal>),
    Fiber(Arc<crate::fiber::FiberHandle>),
    /// FFI-provided host handle
    Opaque(Arc<dyn Any + Send + Sync>),
}

/// Shared, interior-mutable list cell.
#[derive(Clone)]
pub struct ListRef {
    pub type_id: u32,
    pub items: Arc<RwLock<Vec<Value>>>,
}

/// Shared map cell; iteration order is insertion order, and replacing a
/// key keeps its position.
#[derive(Clone)]
pub struct MapRef {
    pub type_id: u32,
    pub entries: Arc<RwLock<IndexMap<MapKey, Value>>>,
}

/// Shared struct instance: field name → value.
#[derive(Clone)]
pub struct StructRef {
    pub type_id: u32,
    pub fields: Arc<RwLock<IndexMap<String, Value>>>,
}

/// A callable bundling a function index with captured values.
pub struct ClosureVal {
    pub function: FuncId,
    pub type_id: u32,
    pub captures: Vec<Value>,
}

/// Hashable key values; the checker restricts keys to these kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapKey {
    Int(i64),
    Str(Arc<str>),
    Bool(bool),
    Enum(u32, i64),
}

impl MapKey {
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Int(v) => Value::Int(*v),
            MapKey::Str(s) => Value::Str(Arc::clone(s)),
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Enum(type_id, discriminant) => Value::Enum {
                type_id: *type_id,
                discriminant: *discriminant,
            },
        }
    }
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn some(type_id: u32, value: Value) -> Value {
        Value::Maybe {
            type_id,
            value: Some(Box::new(value)),
        }
    }

    pub fn none(type_id: u32) -> Value {
        Value::Maybe {
            type_id,
            value: None,
        }
    }

    pub fn ok(type_id: u32, value: Value) -> Value {
        Value::Result {
            type_id,
            is_ok: true,
            value: Box::new(value),
        }
    }

    pub fn err(type_id: u32, value: Value) -> Value {
        Value::Result {
            type_id,
            is_ok: false,
            value: Box::new(value),
        }
    }

    pub fn list(type_id: u32, items: Vec<Value>) -> Value {
        Value::List(ListRef {
            type_id,
            items: Arc::new(RwLock::new(items)),
        })
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "Str",
            Value::Void => "Void",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Struct(_) => "Struct",
            Value::Enum { .. } => "Enum",
            Value::Maybe { .. } => "Maybe",
            Value::Result { .. } => "Result",
            Value::Closure(_) => "Fn",
            Value::Fiber(_) => "Fiber",
            Value::Opaque(_) => "Dynamic",
        }
    }

    /// The runtime type-name string the `TypeName` opcode pushes. Reads
    /// the owning type's stored name from the type table; primitives
    /// answer directly.
    pub fn type_name(&self, types: &TypeTable) -> String {
        let from_table = |type_id: u32| {
            types
                .get(TypeId(type_id))
                .map(|entry| entry.name.clone())
                .unwrap_or_else(|| self.kind_name().to_string())
        };
        match self {
            Value::Int(_) => "Int".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::Str(_) => "Str".to_string(),
            Value::Void => "Void".to_string(),
            Value::List(list) => from_table(list.type_id),
            Value::Map(map) => from_table(map.type_id),
            Value::Struct(instance) => from_table(instance.type_id),
            Value::Enum { type_id, .. } => from_table(*type_id),
            Value::Maybe { type_id, .. } => from_table(*type_id),
            Value::Result { type_id, .. } => from_table(*type_id),
            Value::Closure(closure) => from_table(closure.type_id),
            Value::Fiber(_) => "Fiber".to_string(),
            Value::Opaque(_) => "Dynamic".to_string(),
        }
    }

    /// Render a value for diagnostics and string conversion.
    pub fn display(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Str(s) => s.to_string(),
            Value::Void => "void".to_string(),
            Value::List(list) => {
                let items: Vec<String> = list.items.read().iter().map(|v| v.display()).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Map(map) => {
                let entries: Vec<String> = map
                    .entries
                    .read()
                    .iter()
                    .map(|(k, v)| format!("{}:{}", k.to_value().display(), v.display()))
                    .collect();
                format!("[{}]", entries.join(", "))
            }
            Value::Struct(instance) => {
                let fields: Vec<String> = instance
                    .fields
                    .read()
                    .iter()
                    .map(|(name, value)| format!("{name}: {}", value.display()))
                    .collect();
                format!("{{{}}}", fields.join(", "))
            }
            Value::Enum { discriminant, .. } => discriminant.to_string(),
            Value::Maybe { value: Some(v), .. } => format!("some({})", v.display()),
            Value::Maybe { value: None, .. } => "none".to_string(),
            Value::Result { is_ok: true, value, .. } => format!("ok({})", value.display()),
            Value::Result { is_ok: false, value, .. } => format!("err({})", value.display()),
            Value::Closure(_) => "<fn>".to_string(),
            Value::Fiber(_) => "<fiber>".to_string(),
            Value::Opaque(_) => "<dynamic>".to_string(),
        }
    }
}

// Structural for primitives and strings, by discriminant for enums,
// field-wise for structs, identity for closures.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Void, Value::Void) => true,
            (Value::List(a), Value::List(b)) => {
                Arc::ptr_eq(&a.items, &b.items) || *a.items.read() == *b.items.read()
            }
            (Value::Map(a), Value::Map(b)) => {
                Arc::ptr_eq(&a.entries, &b.entries) || {
                    let (a, b) = (a.entries.read(), b.entries.read());
                    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
                }
            }
            (Value::Struct(a), Value::Struct(b)) => {
                a.type_id == b.type_id
                    && (Arc::ptr_eq(&a.fields, &b.fields) || *a.fields.read() == *b.fields.read())
            }
            (
                Value::Enum {
                    type_id: at,
                    discriminant: ad,
                },
                Value::Enum {
                    type_id: bt,
                    discriminant: bd,
                },
            ) => at == bt && ad == bd,
            (Value::Maybe { value: a, .. }, Value::Maybe { value: b, .. }) => a == b,
            (
                Value::Result {
                    is_ok: ao, value: av, ..
                },
                Value::Result {
                    is_ok: bo, value: bv, ..
                },
            ) => ao == bo && av == bv,
            (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
