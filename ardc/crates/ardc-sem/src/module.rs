//! Checked modules and the module resolution contract.
//!
//! The file resolver is an external collaborator; the checker only needs
//! the [`ModuleResolver`] lookup contract: given an import path relative
//! to the workspace root, produce the canonical path plus a parsed AST.
//! Standard-library paths (`ard/...`) never reach the resolver; they map
//! through the fixed [`BuiltinModule`] table.
//!
//! The import graph must be a DAG. The checker tracks in-progress paths
//! during recursive dependency checking and reports a cycle as an error
//! instead of recursing forever.

use std::rc::Rc;

use ardc_util::{FileId, FxHashMap, FxHashSet, Symbol};
use indexmap::IndexMap;
use thiserror::Error;

use crate::scope::Binding;
use crate::tir;

/// A fully checked module: canonical path, imports, typed body, exports.
pub struct Module {
    pub path: String,
    pub file: FileId,
    /// alias → imported module
    pub imports: IndexMap<Symbol, Rc<ModuleRef>>,
    /// Typed top-level statements in source order, specializations last
    pub body: Vec<tir::Stmt>,
    /// Symbols visible to importing modules
    pub exports: FxHashMap<Symbol, Binding>,
}

impl Module {
    /// All user modules reachable from this one (dependencies first,
    /// this module last, each path once). The emitter walks this to lay
    /// every reachable function into one program image.
    pub fn transitive_user_modules(self: &Rc<Self>) -> Vec<Rc<Module>> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        fn walk(module: &Rc<Module>, seen: &mut FxHashSet<String>, out: &mut Vec<Rc<Module>>) {
            if !seen.insert(module.path.clone()) {
                return;
            }
            for imported in module.imports.values() {
                if let ModuleRef::User(dep) = &**imported {
                    walk(dep, seen, out);
                }
            }
            out.push(Rc::clone(module));
        }
        walk(self, &mut seen, &mut out);
        out
    }
}

/// What an import alias refers to.
pub enum ModuleRef {
    Builtin(BuiltinModule),
    User(Rc<Module>),
}

impl std::fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleRef::Builtin(builtin) => write!(f, "Builtin({})", builtin.path()),
            ModuleRef::User(module) => write!(f, "User({})", module.path),
        }
    }
}

/// The fixed standard-library module table.
///
/// These modules expose the prelude constructors; their "functions"
/// are intrinsics the checker lowers directly, so they contribute no code
/// to the program image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinModule {
    Maybe,
    Result,
}

impl BuiltinModule {
    pub fn for_path(path: &str) -> Option<Self> {
        match path {
            "ard/maybe" => Some(Self::Maybe),
            "ard/result" => Some(Self::Result),
            _ => None,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Maybe => "ard/maybe",
            Self::Result => "ard/result",
        }
    }
}

/// Errors a resolver can report for a user import path.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("module '{0}' not found")]
    NotFound(String),
    #[error("module '{path}' failed to load: {reason}")]
    Failed { path: String, reason: String },
}

/// A successfully resolved user module: canonical path plus parsed AST.
#[derive(Debug)]
pub struct Resolved {
    pub canonical_path: String,
    pub ast: Rc<ardc_ast::Program>,
}

/// The lookup contract the external file resolver must satisfy.
///
/// Implementations cache by canonical path and must be safe for
/// concurrent reads.
pub trait ModuleResolver {
    fn resolve(&self, path: &str) -> Result<Resolved, ResolveError>;
}

/// In-memory resolver backed by a path → AST table.
///
/// The embedding (and every test in this workspace) registers parsed
/// programs directly; canonicalization is the identity.
#[derive(Default)]
pub struct MapResolver {
    modules: FxHashMap<String, Rc<ardc_ast::Program>>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, program: ardc_ast::Program) {
        self.modules.insert(path.into(), Rc::new(program));
    }
}

impl ModuleResolver for MapResolver {
    fn resolve(&self, path: &str) -> Result<Resolved, ResolveError> {
        self.modules
            .get(path)
            .map(|ast| Resolved {
                canonical_path: path.to_string(),
                ast: Rc::clone(ast),
            })
            .ok_or_else(|| ResolveError::NotFound(path.to_string()))
    }
}
