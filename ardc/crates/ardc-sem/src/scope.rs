//! Scopes and symbol bindings.
//!
//! A scope is a linked environment: lookups walk the parent chain,
//! insertions are local. Function-body scopes carry the expected return
//! type and the receiver (when inside a method); lambda scopes additionally
//! collect the names they capture from lexical parents.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ardc_types::{EnumType, FnType, TraitType, Type, UnionType};
use ardc_util::{FxHashMap, Symbol};
use indexmap::IndexMap;

use crate::module::ModuleRef;
use crate::tir::Capture;

/// What a name is bound to.
#[derive(Debug, Clone)]
pub enum Binding {
    Variable { ty: Type, mutable: bool },
    Function(Rc<FunctionInfo>),
    ExternFunction(Rc<ExternInfo>),
    Struct(Rc<RefCell<StructInfo>>),
    Enum(Arc<EnumType>),
    Union(Arc<UnionType>),
    Trait(Arc<TraitType>),
    Module(Rc<ModuleRef>),
}

/// A resolvable function: its signature, plus the declaration retained for
/// generic specialization.
#[derive(Debug)]
pub struct FunctionInfo {
    pub name: Symbol,
    pub ty: Arc<FnType>,
    pub type_params: Vec<Symbol>,
    /// Present for functions declared in the module under check; used to
    /// re-check generic bodies under a concrete substitution
    pub decl: Option<ardc_ast::FnDecl>,
}

impl FunctionInfo {
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

#[derive(Debug)]
pub struct ExternInfo {
    pub name: Symbol,
    pub binding: String,
    pub ty: Arc<FnType>,
}

/// Everything the checker knows about a struct: its nominal type, its
/// method and static tables, and the traits it implements. Filled in
/// stages, so shared behind `RefCell`.
#[derive(Debug)]
pub struct StructInfo {
    pub ty: Arc<ardc_types::StructType>,
    pub methods: IndexMap<Symbol, MethodInfo>,
    pub statics: IndexMap<Symbol, Rc<FunctionInfo>>,
    pub traits: Vec<Symbol>,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub ty: Arc<FnType>,
    pub mutates: bool,
}

/// The implicit receiver available inside a method body.
#[derive(Debug, Clone)]
pub struct Receiver {
    pub ty: Type,
    pub mutable: bool,
}

/// What kind of scope a rib is.
#[derive(Debug)]
pub enum RibKind {
    Module,
    Function {
        ret: Type,
        receiver: Option<Receiver>,
    },
    /// Capture boundary: variable reads that resolve past it are recorded
    Lambda {
        ret: Type,
        captures: IndexMap<Symbol, Type>,
    },
    Block,
    Loop,
}

struct Rib {
    bindings: FxHashMap<Symbol, Binding>,
    kind: RibKind,
}

/// Stack-shaped scope chain. Checking is strictly nested, so a stack of
/// ribs is enough; the innermost rib is the insertion target.
pub struct ScopeStack {
    ribs: Vec<Rib>,
}

/// Result of a successful lookup.
pub struct Resolution {
    pub binding: Binding,
    /// Index of the rib the binding was found in
    pub rib: usize,
    /// The lookup walked out of a named function body
    pub crossed_function: bool,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            ribs: vec![Rib {
                bindings: FxHashMap::default(),
                kind: RibKind::Module,
            }],
        }
    }

    pub fn enter(&mut self, kind: RibKind) {
        self.ribs.push(Rib {
            bindings: FxHashMap::default(),
            kind,
        });
    }

    /// Exit the innermost scope. For lambda scopes, returns the captures
    /// it accumulated.
    pub fn exit(&mut self) -> Vec<Capture> {
        let rib = self.ribs.pop().expect("scope underflow");
        match rib.kind {
            RibKind::Lambda { captures, .. } => captures
                .into_iter()
                .map(|(name, ty)| Capture { name, ty })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Insert into the innermost scope. Returns false if the name is
    /// already bound there.
    pub fn insert(&mut self, name: Symbol, binding: Binding) -> bool {
        let rib = self.ribs.last_mut().expect("no scope");
        if rib.bindings.contains_key(&name) {
            return false;
        }
        rib.bindings.insert(name, binding);
        true
    }

    /// Overwrite a binding in the innermost scope (duplicate imports warn
    /// but the later alias wins).
    pub fn insert_or_replace(&mut self, name: Symbol, binding: Binding) {
        self.ribs
            .last_mut()
            .expect("no scope")
            .bindings
            .insert(name, binding);
    }

    /// Walk the parent chain for a name.
    ///
    /// Variable bindings are not visible across a named-function boundary
    /// (only lambdas close over locals); type, function, and module
    /// bindings always are.
    pub fn resolve(&self, name: Symbol) -> Option<Resolution> {
        let mut crossed_function = false;
        for (idx, rib) in self.ribs.iter().enumerate().rev() {
            if let Some(binding) = rib.bindings.get(&name) {
                if crossed_function && matches!(binding, Binding::Variable { .. }) {
                    return None;
                }
                return Some(Resolution {
                    binding: binding.clone(),
                    rib: idx,
                    crossed_function,
                });
            }
            if matches!(rib.kind, RibKind::Function { .. }) {
                crossed_function = true;
            }
        }
        None
    }

    /// Record that `name` was read from inside one or more lambdas whose
    /// ribs sit above `found_at`. Every lambda between the definition and
    /// the use captures it (transitively).
    pub fn record_capture(&mut self, name: Symbol, ty: Type, found_at: usize) {
        for rib in self.ribs[found_at + 1..].iter_mut() {
            if let RibKind::Lambda { captures, .. } = &mut rib.kind {
                captures.entry(name).or_insert_with(|| ty.clone());
            }
        }
    }

    /// The return type of the innermost function or lambda scope.
    pub fn enclosing_return_type(&self) -> Option<Type> {
        self.ribs.iter().rev().find_map(|rib| match &rib.kind {
            RibKind::Function { ret, .. } => Some(ret.clone()),
            RibKind::Lambda { ret, .. } => Some(ret.clone()),
            _ => None,
        })
    }

    /// The receiver of the innermost function scope, when inside a method.
    pub fn receiver(&self) -> Option<Receiver> {
        for rib in self.ribs.iter().rev() {
            match &rib.kind {
                RibKind::Function { receiver, .. } => return receiver.clone(),
                RibKind::Lambda { .. } => return None,
                _ => {}
            }
        }
        None
    }

    /// Whether a loop scope encloses the current position without an
    /// intervening function boundary.
    pub fn in_loop(&self) -> bool {
        for rib in self.ribs.iter().rev() {
            match rib.kind {
                RibKind::Loop => return true,
                RibKind::Function { .. } | RibKind::Lambda { .. } => return false,
                _ => {}
            }
        }
        false
    }

    /// Whether the current position is inside any function or lambda body.
    pub fn in_function(&self) -> bool {
        self.ribs
            .iter()
            .any(|rib| matches!(rib.kind, RibKind::Function { .. } | RibKind::Lambda { .. }))
    }

    /// Snapshot of the module-level bindings (rib zero).
    pub fn module_bindings(&self) -> FxHashMap<Symbol, Binding> {
        self.ribs[0].bindings.clone()
    }

    /// A fresh stack whose module rib holds the given bindings; used to
    /// re-check generic function bodies under a substitution.
    pub fn with_module(bindings: FxHashMap<Symbol, Binding>) -> Self {
        Self {
            ribs: vec![Rib {
                bindings,
                kind: RibKind::Module,
            }],
        }
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(ty: Type, mutable: bool) -> Binding {
        Binding::Variable { ty, mutable }
    }

    #[test]
    fn test_insert_and_resolve() {
        let mut scopes = ScopeStack::new();
        let x = Symbol::intern("x");
        assert!(scopes.insert(x, var(Type::Int, false)));
        let res = scopes.resolve(x).unwrap();
        assert!(matches!(res.binding, Binding::Variable { ty: Type::Int, .. }));
    }

    #[test]
    fn test_duplicate_in_same_scope_rejected() {
        let mut scopes = ScopeStack::new();
        let x = Symbol::intern("dup");
        assert!(scopes.insert(x, var(Type::Int, false)));
        assert!(!scopes.insert(x, var(Type::Str, false)));
    }

    #[test]
    fn test_shadowing_in_child_scope() {
        let mut scopes = ScopeStack::new();
        let x = Symbol::intern("shadowed");
        scopes.insert(x, var(Type::Int, false));
        scopes.enter(RibKind::Block);
        scopes.insert(x, var(Type::Str, false));
        match scopes.resolve(x).unwrap().binding {
            Binding::Variable { ty, .. } => assert_eq!(ty, Type::Str),
            other => panic!("unexpected binding {other:?}"),
        }
        scopes.exit();
        match scopes.resolve(x).unwrap().binding {
            Binding::Variable { ty, .. } => assert_eq!(ty, Type::Int),
            other => panic!("unexpected binding {other:?}"),
        }
    }

    #[test]
    fn test_variables_hidden_across_function_boundary() {
        let mut scopes = ScopeStack::new();
        let x = Symbol::intern("outer_var");
        scopes.insert(x, var(Type::Int, false));
        scopes.enter(RibKind::Function {
            ret: Type::Void,
            receiver: None,
        });
        assert!(scopes.resolve(x).is_none());
    }

    #[test]
    fn test_lambda_sees_and_captures_outer_variable() {
        let mut scopes = ScopeStack::new();
        scopes.enter(RibKind::Function {
            ret: Type::Void,
            receiver: None,
        });
        let x = Symbol::intern("captured");
        scopes.insert(x, var(Type::Int, false));
        scopes.enter(RibKind::Lambda {
            ret: Type::Void,
            captures: IndexMap::new(),
        });
        let res = scopes.resolve(x).unwrap();
        assert!(!res.crossed_function);
        scopes.record_capture(x, Type::Int, res.rib);
        let captures = scopes.exit();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].name, x);
    }

    #[test]
    fn test_in_loop_stops_at_function() {
        let mut scopes = ScopeStack::new();
        scopes.enter(RibKind::Loop);
        assert!(scopes.in_loop());
        scopes.enter(RibKind::Function {
            ret: Type::Void,
            receiver: None,
        });
        assert!(!scopes.in_loop());
    }

    #[test]
    fn test_enclosing_return_type() {
        let mut scopes = ScopeStack::new();
        assert!(scopes.enclosing_return_type().is_none());
        scopes.enter(RibKind::Function {
            ret: Type::Int,
            receiver: None,
        });
        scopes.enter(RibKind::Block);
        assert_eq!(scopes.enclosing_return_type(), Some(Type::Int));
    }
}
