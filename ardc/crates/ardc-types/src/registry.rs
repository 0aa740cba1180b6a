//! Type interning.
//!
//! The registry assigns a stable [`TypeId`] to every type that flows
//! through the system and is the source of truth for type identity.
//! Primitives get fixed ids at construction so the common "same type?"
//! question is a single integer compare; compound types are interned by
//! their canonical description string.
//!
//! The registry is shared across fibers (the VM resolves ids from several
//! threads), so all access goes through an internal `RwLock`.

use ardc_util::{define_idx, FxHashMap, IndexVec};
use parking_lot::RwLock;

use crate::ty::Type;

define_idx!(
    /// Stable numeric identity of a registered type.
    TypeId
);

/// Cached ids of the primitive singletons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanonicalIds {
    pub int: TypeId,
    pub float: TypeId,
    pub str_: TypeId,
    pub bool_: TypeId,
    pub void: TypeId,
    pub dynamic: TypeId,
}

/// Interns types and answers id → type lookups.
pub struct TypeRegistry {
    inner: RwLock<Inner>,
    canonical: CanonicalIds,
}

struct Inner {
    by_desc: FxHashMap<String, TypeId>,
    types: IndexVec<TypeId, Type>,
}

impl TypeRegistry {
    /// Create a registry with the primitive singletons pre-registered.
    pub fn new() -> Self {
        let mut inner = Inner {
            by_desc: FxHashMap::default(),
            types: IndexVec::new(),
        };
        let canonical = CanonicalIds {
            int: inner.insert(&Type::Int),
            float: inner.insert(&Type::Float),
            str_: inner.insert(&Type::Str),
            bool_: inner.insert(&Type::Bool),
            void: inner.insert(&Type::Void),
            dynamic: inner.insert(&Type::Dynamic),
        };
        Self {
            inner: RwLock::new(inner),
            canonical,
        }
    }

    /// Intern a type. Idempotent: an equal description returns the
    /// existing id.
    pub fn register(&self, ty: &Type) -> TypeId {
        let desc = ty.describe();
        if let Some(&id) = self.inner.read().by_desc.get(&desc) {
            return id;
        }
        let mut inner = self.inner.write();
        // another thread may have interned it between the locks
        if let Some(&id) = inner.by_desc.get(&desc) {
            return id;
        }
        let id = inner.types.push(ty.clone());
        inner.by_desc.insert(desc, id);
        id
    }

    /// Look up a registered type.
    ///
    /// Infallible after registration; an unknown id is an emitter or
    /// verifier bug.
    pub fn lookup(&self, id: TypeId) -> Type {
        self.inner.read().types[id].clone()
    }

    pub fn get(&self, id: TypeId) -> Option<Type> {
        self.inner.read().types.get(id).cloned()
    }

    /// Ids of the primitive singletons, cached at construction.
    pub fn canonical_ids(&self) -> CanonicalIds {
        self.canonical
    }

    pub fn len(&self) -> usize {
        self.inner.read().types.len()
    }

    pub fn is_empty(&self) -> bool {
        false // primitives are always present
    }

    /// Snapshot of all registered types in id order.
    pub fn snapshot(&self) -> Vec<Type> {
        self.inner.read().types.raw().to_vec()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn insert(&mut self, ty: &Type) -> TypeId {
        let id = self.types.push(ty.clone());
        self.by_desc.insert(ty.describe(), id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_preregistered() {
        let registry = TypeRegistry::new();
        let ids = registry.canonical_ids();
        assert_eq!(registry.lookup(ids.int), Type::Int);
        assert_eq!(registry.lookup(ids.float), Type::Float);
        assert_eq!(registry.lookup(ids.str_), Type::Str);
        assert_eq!(registry.lookup(ids.bool_), Type::Bool);
        assert_eq!(registry.lookup(ids.void), Type::Void);
        assert_eq!(registry.lookup(ids.dynamic), Type::Dynamic);
    }

    #[test]
    fn test_register_idempotent() {
        let registry = TypeRegistry::new();
        let list_int = Type::List(Box::new(Type::Int));
        let a = registry.register(&list_int);
        let b = registry.register(&list_int);
        assert_eq!(a, b);
        assert_eq!(registry.lookup(a), list_int);
    }

    #[test]
    fn test_register_primitive_returns_canonical() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.register(&Type::Int), registry.canonical_ids().int);
    }

    #[test]
    fn test_distinct_types_distinct_ids() {
        let registry = TypeRegistry::new();
        let a = registry.register(&Type::List(Box::new(Type::Int)));
        let b = registry.register(&Type::List(Box::new(Type::Str)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_concurrent_register() {
        use std::sync::Arc;
        let registry = Arc::new(TypeRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.register(&Type::Map {
                        key: Box::new(Type::Str),
                        value: Box::new(Type::Int),
                    })
                })
            })
            .collect();
        let ids: Vec<TypeId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }
}
