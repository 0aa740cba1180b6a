//! The semantic analyzer.
//!
//! Consumes one module's AST plus a resolver and produces a checked
//! [`Module`] while accumulating diagnostics on the shared handler. The
//! checker never fails fast: every independent problem gets its own
//! diagnostic and analysis continues with a recovery type.
//!
//! Checking order per module:
//!
//! 1. imports (recursively checking user dependencies, cycle-guarded)
//! 2. type declarations, hoisted: names first, then member resolution
//! 3. function signatures (so bodies may call forward and recursively)
//! 4. impl-block method bodies
//! 5. top-level statements in source order
//! 6. generic specializations, appended last

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ardc_ast as ast;
use ardc_types::{EnumType, FnType, Parameter, StructType, TraitType, Type, TypeRegistry, UnionType};
use ardc_util::{
    DiagnosticCode as Code, FileId, FxHashMap, FxHashSet, Handler, SourceMap, Span, Symbol,
};
use indexmap::IndexMap;

use crate::module::{BuiltinModule, Module, ModuleRef, ModuleResolver};
use crate::scope::{
    Binding, ExternInfo, FunctionInfo, MethodInfo, Receiver, RibKind, ScopeStack, StructInfo,
};
use crate::tir;

/// Shared state for one check run across a module graph.
pub struct CheckContext<'a> {
    pub resolver: &'a dyn ModuleResolver,
    pub registry: &'a TypeRegistry,
    pub handler: &'a Handler,
    pub sources: RefCell<SourceMap>,
    cache: RefCell<FxHashMap<String, Rc<Module>>>,
    in_progress: RefCell<FxHashSet<String>>,
}

impl<'a> CheckContext<'a> {
    pub fn new(
        resolver: &'a dyn ModuleResolver,
        registry: &'a TypeRegistry,
        handler: &'a Handler,
    ) -> Self {
        Self {
            resolver,
            registry,
            handler,
            sources: RefCell::new(SourceMap::new()),
            cache: RefCell::new(FxHashMap::default()),
            in_progress: RefCell::new(FxHashSet::default()),
        }
    }

    /// Check the root module of a program.
    ///
    /// Returns the checked module even when diagnostics were reported;
    /// callers gate on `handler.has_errors()`.
    pub fn check_root(&self, program: &ast::Program, path: &str) -> Rc<Module> {
        self.check_module(program, path)
    }

    fn check_module(&self, program: &ast::Program, path: &str) -> Rc<Module> {
        self.in_progress.borrow_mut().insert(path.to_string());
        let file = self.sources.borrow_mut().add(path);
        let mut checker = Checker::new(self, file, path.to_string());
        let module = checker.run(program);
        self.in_progress.borrow_mut().remove(path);
        let module = Rc::new(module);
        self.cache
            .borrow_mut()
            .insert(path.to_string(), Rc::clone(&module));
        module
    }

    fn import_user_module(&self, path: &str, span: Span) -> Option<Rc<Module>> {
        if self.in_progress.borrow().contains(path) {
            self.handler.error(
                span,
                Code::UNRESOLVED_IMPORT,
                format!("cyclic import of module '{path}'"),
            );
            return None;
        }
        if let Some(cached) = self.cache.borrow().get(path) {
            return Some(Rc::clone(cached));
        }
        match self.resolver.resolve(path) {
            Ok(resolved) => Some(self.check_module(&resolved.ast, &resolved.canonical_path)),
            Err(err) => {
                self.handler
                    .error(span, Code::UNRESOLVED_IMPORT, err.to_string());
                None
            }
        }
    }
}

/// Per-module checker state.
pub(crate) struct Checker<'a, 'cx> {
    pub(crate) cx: &'cx CheckContext<'a>,
    pub(crate) file: FileId,
    path: String,
    pub(crate) scopes: ScopeStack,
    pub(crate) imports: IndexMap<Symbol, Rc<ModuleRef>>,
    exports: FxHashMap<Symbol, Binding>,
    /// Specializations produced by generic calls in this module
    pub(crate) specializations: Rc<RefCell<crate::generics::SpecializationTable>>,
    /// Method tables for enums declared in this module
    pub(crate) enum_methods: Rc<RefCell<FxHashMap<Symbol, IndexMap<Symbol, MethodInfo>>>>,
    /// Checked impl-block bodies, attached to their type's def node
    pending_methods: FxHashMap<Symbol, Vec<tir::MethodDef>>,
    pending_statics: FxHashMap<Symbol, Vec<Rc<tir::FunctionDef>>>,
    /// Concrete types for the type variables in scope; non-empty only
    /// while checking a monomorphized generic body
    pub(crate) type_bindings: FxHashMap<Symbol, Type>,
}

impl<'a, 'cx> Checker<'a, 'cx> {
    fn new(cx: &'cx CheckContext<'a>, file: FileId, path: String) -> Self {
        Self {
            cx,
            file,
            path,
            scopes: ScopeStack::new(),
            imports: IndexMap::new(),
            exports: FxHashMap::default(),
            specializations: Rc::new(RefCell::new(Default::default())),
            enum_methods: Rc::new(RefCell::new(FxHashMap::default())),
            pending_methods: FxHashMap::default(),
            pending_statics: FxHashMap::default(),
            type_bindings: FxHashMap::default(),
        }
    }

    /// A sub-checker sharing this module's symbol tables, used to check
    /// generic bodies under a substitution.
    pub(crate) fn sub_checker(&self) -> Checker<'a, 'cx> {
        Checker {
            cx: self.cx,
            file: self.file,
            path: self.path.clone(),
            scopes: ScopeStack::with_module(self.scopes.module_bindings()),
            imports: self.imports.clone(),
            exports: FxHashMap::default(),
            specializations: Rc::clone(&self.specializations),
            enum_methods: Rc::clone(&self.enum_methods),
            pending_methods: FxHashMap::default(),
            pending_statics: FxHashMap::default(),
            type_bindings: FxHashMap::default(),
        }
    }

    fn run(&mut self, program: &ast::Program) -> Module {
        self.check_imports(&program.imports);
        self.hoist_types(&program.statements);
        self.register_signatures(&program.statements);
        self.check_impl_bodies(&program.statements);

        let mut body = Vec::new();
        for stmt in &program.statements {
            if let Some(checked) = self.check_top_stmt(stmt) {
                body.push(checked);
            }
        }

        // monomorphized copies land after everything they can reference
        for def in self.specializations.borrow_mut().take_defs() {
            body.push(tir::Stmt::FunctionDef(def));
        }

        Module {
            path: self.path.clone(),
            file: self.file,
            imports: std::mem::take(&mut self.imports),
            body,
            exports: std::mem::take(&mut self.exports),
        }
    }

    pub(crate) fn error(&self, span: Span, code: Code, message: impl Into<String>) {
        self.cx
            .handler
            .error(span.with_file(self.file), code, message);
    }

    pub(crate) fn warning(&self, span: Span, code: Code, message: impl Into<String>) {
        self.cx
            .handler
            .warning(span.with_file(self.file), code, message);
    }

    // ------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------

    fn check_imports(&mut self, imports: &[ast::Import]) {
        for import in imports {
            let alias = import.local_name();
            let module_ref = if let Some(builtin) = BuiltinModule::for_path(&import.path) {
                Some(ModuleRef::Builtin(builtin))
            } else if import.path.starts_with("ard/") {
                self.error(
                    import.span,
                    Code::UNRESOLVED_IMPORT,
                    format!("unknown standard library module '{}'", import.path),
                );
                None
            } else {
                self.cx
                    .import_user_module(&import.path, import.span.with_file(self.file))
                    .map(ModuleRef::User)
            };
            let Some(module_ref) = module_ref else { continue };

            if self.imports.contains_key(&alias) {
                self.warning(
                    import.span,
                    Code::DUPLICATE_IMPORT,
                    format!("import alias '{alias}' is already in use; the later import wins"),
                );
            }
            let module_ref = Rc::new(module_ref);
            self.imports.insert(alias, Rc::clone(&module_ref));
            self.scopes
                .insert_or_replace(alias, Binding::Module(module_ref));
        }
    }

    // ------------------------------------------------------------------
    // Hoisting: type declarations resolve before anything references them
    // ------------------------------------------------------------------

    fn hoist_types(&mut self, statements: &[ast::Stmt]) {
        // names first, so members may reference any declared type
        for stmt in statements {
            match &stmt.kind {
                ast::StmtKind::Struct(decl) => {
                    let info = StructInfo {
                        ty: Arc::new(StructType {
                            name: decl.name,
                            fields: vec![],
                        }),
                        methods: IndexMap::new(),
                        statics: IndexMap::new(),
                        traits: vec![],
                    };
                    self.declare(decl.name, Binding::Struct(Rc::new(RefCell::new(info))), stmt.span);
                }
                ast::StmtKind::Enum(decl) => {
                    let ty = self.build_enum(decl, stmt.span);
                    self.declare(decl.name, Binding::Enum(ty), stmt.span);
                }
                ast::StmtKind::Union(decl) => {
                    let ty = Arc::new(UnionType {
                        name: decl.name,
                        members: vec![],
                    });
                    self.declare(decl.name, Binding::Union(ty), stmt.span);
                }
                ast::StmtKind::Trait(decl) => {
                    let ty = Arc::new(TraitType {
                        name: decl.name,
                        methods: vec![],
                    });
                    self.declare(decl.name, Binding::Trait(ty), stmt.span);
                }
                _ => {}
            }
        }

        // member resolution: unions, then traits, then struct fields, so
        // field types see finished union definitions
        for stmt in statements {
            if let ast::StmtKind::Union(decl) = &stmt.kind {
                let members: Vec<Type> = decl
                    .members
                    .iter()
                    .map(|m| self.resolve_type(m, stmt.span))
                    .collect();
                let ty = Arc::new(UnionType {
                    name: decl.name,
                    members,
                });
                self.scopes
                    .insert_or_replace(decl.name, Binding::Union(Arc::clone(&ty)));
                self.exports.insert(decl.name, Binding::Union(ty));
            }
        }
        for stmt in statements {
            if let ast::StmtKind::Trait(decl) = &stmt.kind {
                let methods = decl
                    .methods
                    .iter()
                    .map(|sig| (sig.name, self.resolve_fn_sig(&sig.params, &sig.ret, stmt.span)))
                    .collect();
                let ty = Arc::new(TraitType {
                    name: decl.name,
                    methods,
                });
                self.scopes
                    .insert_or_replace(decl.name, Binding::Trait(Arc::clone(&ty)));
                self.exports.insert(decl.name, Binding::Trait(ty));
            }
        }
        for stmt in statements {
            if let ast::StmtKind::Struct(decl) = &stmt.kind {
                let mut fields: Vec<(Symbol, Type)> = decl
                    .fields
                    .iter()
                    .map(|(name, ty)| (*name, self.resolve_type(ty, stmt.span)))
                    .collect();
                fields.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
                for window in fields.windows(2) {
                    if window[0].0 == window[1].0 {
                        self.error(
                            stmt.span,
                            Code::DUPLICATE_NAME,
                            format!("duplicate field '{}' in struct '{}'", window[0].0, decl.name),
                        );
                    }
                }
                if let Some(info) = self.lookup_struct(decl.name) {
                    info.borrow_mut().ty = Arc::new(StructType {
                        name: decl.name,
                        fields,
                    });
                }
            }
        }
    }

    fn build_enum(&mut self, decl: &ast::EnumDecl, span: Span) -> Arc<EnumType> {
        let mut discriminants = IndexMap::new();
        let mut variants = Vec::new();
        let mut next = 0_i64;
        for (variant, explicit) in &decl.variants {
            if discriminants.contains_key(variant) {
                self.error(
                    span,
                    Code::DUPLICATE_NAME,
                    format!("duplicate variant '{variant}' in enum '{}'", decl.name),
                );
                continue;
            }
            let value = explicit.unwrap_or(next);
            next = value + 1;
            discriminants.insert(*variant, value);
            variants.push(*variant);
        }
        Arc::new(EnumType {
            name: decl.name,
            variants,
            discriminants,
        })
    }

    fn declare(&mut self, name: Symbol, binding: Binding, span: Span) {
        if !self.scopes.insert(name, binding.clone()) {
            self.error(
                span,
                Code::DUPLICATE_NAME,
                format!("the name '{name}' is already defined in this scope"),
            );
            return;
        }
        self.exports.insert(name, binding);
    }

    // ------------------------------------------------------------------
    // Signatures
    // ------------------------------------------------------------------

    fn register_signatures(&mut self, statements: &[ast::Stmt]) {
        for stmt in statements {
            match &stmt.kind {
                ast::StmtKind::Fn(decl) => {
                    let ty = self.resolve_fn_sig(&decl.params, &decl.ret, decl.span);
                    let info = Rc::new(FunctionInfo {
                        name: decl.name,
                        ty,
                        type_params: decl.type_params.clone(),
                        decl: Some(decl.clone()),
                    });
                    self.declare(decl.name, Binding::Function(info), decl.span);
                }
                ast::StmtKind::ExternFn { sig, binding } => {
                    let ty = self.resolve_fn_sig(&sig.params, &sig.ret, sig.span);
                    let info = Rc::new(ExternInfo {
                        name: sig.name,
                        binding: binding.clone(),
                        ty,
                    });
                    self.declare(sig.name, Binding::ExternFunction(info), sig.span);
                }
                ast::StmtKind::Impl(block) => self.register_impl(block, false),
                ast::StmtKind::TraitImpl(block) => {
                    self.register_trait_impl(block);
                }
                _ => {}
            }
        }
    }

    fn register_impl(&mut self, block: &ast::ImplBlock, from_trait: bool) {
        if let Some(info) = self.lookup_struct(block.target) {
            for method in &block.methods {
                let ty = self.resolve_fn_sig(&method.params, &method.ret, method.span);
                let mut info = info.borrow_mut();
                if method.is_static {
                    let qualified =
                        Symbol::intern(&format!("{}::{}", block.target, method.name));
                    let duplicate = info
                        .statics
                        .insert(
                            method.name,
                            Rc::new(FunctionInfo {
                                name: qualified,
                                ty,
                                type_params: vec![],
                                decl: Some(method.clone()),
                            }),
                        )
                        .is_some();
                    if duplicate {
                        self.error(
                            method.span,
                            Code::DUPLICATE_NAME,
                            format!("duplicate static '{}' on '{}'", method.name, block.target),
                        );
                    }
                } else {
                    let duplicate = info
                        .methods
                        .insert(
                            method.name,
                            MethodInfo {
                                ty,
                                mutates: method.mutates,
                            },
                        )
                        .is_some();
                    if duplicate && !from_trait {
                        self.error(
                            method.span,
                            Code::DUPLICATE_NAME,
                            format!("duplicate method '{}' on '{}'", method.name, block.target),
                        );
                    }
                }
            }
        } else if let Some(Binding::Enum(_)) = self.scopes.resolve(block.target).map(|r| r.binding)
        {
            let resolved: Vec<_> = block
                .methods
                .iter()
                .map(|method| {
                    let ty = self.resolve_fn_sig(&method.params, &method.ret, method.span);
                    (method, ty)
                })
                .collect();
            let mut tables = self.enum_methods.borrow_mut();
            let table = tables.entry(block.target).or_default();
            for (method, ty) in resolved {
                if table
                    .insert(
                        method.name,
                        MethodInfo {
                            ty,
                            mutates: method.mutates,
                        },
                    )
                    .is_some()
                {
                    self.error(
                        method.span,
                        Code::DUPLICATE_NAME,
                        format!("duplicate method '{}' on '{}'", method.name, block.target),
                    );
                }
            }
        } else {
            self.error(
                block.span,
                Code::UNDEFINED_SYMBOL,
                format!("cannot implement methods for unknown type '{}'", block.target),
            );
        }
    }

    fn register_trait_impl(&mut self, block: &ast::TraitImplBlock) {
        let trait_ty = match self.scopes.resolve(block.trait_name).map(|r| r.binding) {
            Some(Binding::Trait(t)) => t,
            _ => {
                self.error(
                    block.span,
                    Code::UNDEFINED_SYMBOL,
                    format!("unknown trait '{}'", block.trait_name),
                );
                return;
            }
        };

        self.register_impl(
            &ast::ImplBlock {
                target: block.target,
                methods: block.methods.clone(),
                span: block.span,
            },
            true,
        );

        let Some(info) = self.lookup_struct(block.target) else {
            return;
        };

        // conformance: every trait method present with the exact signature,
        // nothing extra
        for (name, required) in &trait_ty.methods {
            match block.methods.iter().find(|m| m.name == *name) {
                None => self.error(
                    block.span,
                    Code::MISSING_TRAIT_METHOD,
                    format!(
                        "'{}' is missing method '{}' required by trait '{}'",
                        block.target, name, block.trait_name
                    ),
                ),
                Some(decl) => {
                    let provided = self.resolve_fn_sig(&decl.params, &decl.ret, decl.span);
                    if provided != *required {
                        self.error(
                            decl.span,
                            Code::MISSING_TRAIT_METHOD,
                            format!(
                                "method '{}' does not match the signature required by trait '{}'",
                                name, block.trait_name
                            ),
                        );
                    }
                }
            }
        }
        for method in &block.methods {
            if trait_ty.method(method.name).is_none() {
                self.error(
                    method.span,
                    Code::MISSING_TRAIT_METHOD,
                    format!(
                        "method '{}' is not declared by trait '{}'",
                        method.name, block.trait_name
                    ),
                );
            }
        }
        info.borrow_mut().traits.push(block.trait_name);
    }

    pub(crate) fn resolve_fn_sig(
        &mut self,
        params: &[ast::Param],
        ret: &Option<ast::TypeExpr>,
        span: Span,
    ) -> Arc<FnType> {
        let params = params
            .iter()
            .map(|p| Parameter {
                name: p.name,
                ty: self.resolve_type(&p.ty, span),
                mutable: p.mutable,
            })
            .collect();
        let ret = ret
            .as_ref()
            .map(|t| self.resolve_type(t, span))
            .unwrap_or(Type::Void);
        Arc::new(FnType::new(params, ret))
    }

    // ------------------------------------------------------------------
    // Impl bodies
    // ------------------------------------------------------------------

    fn check_impl_bodies(&mut self, statements: &[ast::Stmt]) {
        for stmt in statements {
            let (target, methods) = match &stmt.kind {
                ast::StmtKind::Impl(block) => (block.target, &block.methods),
                ast::StmtKind::TraitImpl(block) => (block.target, &block.methods),
                _ => continue,
            };
            let receiver_ty = match self.scopes.resolve(target).map(|r| r.binding) {
                Some(Binding::Struct(info)) => Type::Struct(Arc::clone(&info.borrow().ty)),
                Some(Binding::Enum(ty)) => Type::Enum(ty),
                _ => continue, // already diagnosed during registration
            };
            for method in methods {
                if method.is_static {
                    let ty = self.resolve_fn_sig(&method.params, &method.ret, method.span);
                    let qualified =
                        Symbol::intern(&format!("{target}::{}", method.name));
                    let body = self.check_function_body(&ty, &method.body, None, method.span);
                    let def = Rc::new(tir::FunctionDef {
                        name: qualified,
                        ty,
                        body,
                        captures: vec![],
                        span: method.span,
                    });
                    self.pending_statics.entry(target).or_default().push(def);
                } else {
                    let ty = self.resolve_fn_sig(&method.params, &method.ret, method.span);
                    let receiver = Receiver {
                        ty: receiver_ty.clone(),
                        mutable: method.mutates,
                    };
                    let body =
                        self.check_function_body(&ty, &method.body, Some(receiver), method.span);
                    let def = Rc::new(tir::FunctionDef {
                        name: Symbol::intern(&format!("{target}.{}", method.name)),
                        ty: Arc::clone(&ty),
                        body,
                        captures: vec![],
                        span: method.span,
                    });
                    self.pending_methods
                        .entry(target)
                        .or_default()
                        .push(tir::MethodDef {
                            name: method.name,
                            mutates: method.mutates,
                            def,
                        });
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn check_top_stmt(&mut self, stmt: &ast::Stmt) -> Option<tir::Stmt> {
        match &stmt.kind {
            ast::StmtKind::Fn(decl) => {
                if !decl.type_params.is_empty() {
                    // generic bodies are checked per specialization
                    return None;
                }
                let info = match self.scopes.resolve(decl.name).map(|r| r.binding) {
                    Some(Binding::Function(info)) => info,
                    _ => return None,
                };
                let body =
                    self.check_function_body(&info.ty, &decl.body, None, decl.span);
                Some(tir::Stmt::FunctionDef(Rc::new(tir::FunctionDef {
                    name: decl.name,
                    ty: Arc::clone(&info.ty),
                    body,
                    captures: vec![],
                    span: decl.span,
                })))
            }
            ast::StmtKind::ExternFn { sig, .. } => {
                match self.scopes.resolve(sig.name).map(|r| r.binding) {
                    Some(Binding::ExternFunction(info)) => Some(tir::Stmt::ExternalFunctionDef(
                        Rc::new(tir::ExternalFunctionDef {
                            name: info.name,
                            binding: info.binding.clone(),
                            ty: Arc::clone(&info.ty),
                            span: sig.span,
                        }),
                    )),
                    _ => None,
                }
            }
            ast::StmtKind::Struct(decl) => {
                let info = self.lookup_struct(decl.name)?;
                let ty = Arc::clone(&info.borrow().ty);
                Some(tir::Stmt::StructDef(tir::StructDef {
                    ty,
                    methods: self.pending_methods.remove(&decl.name).unwrap_or_default(),
                    statics: self.pending_statics.remove(&decl.name).unwrap_or_default(),
                }))
            }
            ast::StmtKind::Enum(decl) => {
                match self.scopes.resolve(decl.name).map(|r| r.binding) {
                    Some(Binding::Enum(ty)) => Some(tir::Stmt::EnumDef(tir::EnumDef {
                        ty,
                        methods: self.pending_methods.remove(&decl.name).unwrap_or_default(),
                    })),
                    _ => None,
                }
            }
            ast::StmtKind::Union(decl) => match self.scopes.resolve(decl.name).map(|r| r.binding) {
                Some(Binding::Union(ty)) => Some(tir::Stmt::UnionDef(ty)),
                _ => None,
            },
            ast::StmtKind::Trait(decl) => match self.scopes.resolve(decl.name).map(|r| r.binding) {
                Some(Binding::Trait(ty)) => Some(tir::Stmt::TraitDef(ty)),
                _ => None,
            },
            ast::StmtKind::Impl(_) | ast::StmtKind::TraitImpl(_) => None,
            _ => self.check_stmt(stmt),
        }
    }

    /// Check a statement inside a body (or the module's top level).
    pub(crate) fn check_stmt(&mut self, stmt: &ast::Stmt) -> Option<tir::Stmt> {
        match &stmt.kind {
            ast::StmtKind::Let {
                name,
                mutable,
                ty,
                value,
            } => {
                let annotation = ty.as_ref().map(|t| self.resolve_type(t, stmt.span));
                let value = match &annotation {
                    Some(expected) => self.check_expr(value, expected),
                    None => self.infer_expr(value),
                };
                let binding_ty = annotation.unwrap_or_else(|| value.ty.clone());
                if !self.scopes.insert(
                    *name,
                    Binding::Variable {
                        ty: binding_ty,
                        mutable: *mutable,
                    },
                ) {
                    self.error(
                        stmt.span,
                        Code::DUPLICATE_NAME,
                        format!("the name '{name}' is already defined in this scope"),
                    );
                }
                Some(tir::Stmt::VariableDef(tir::VariableDef {
                    name: *name,
                    mutable: *mutable,
                    value,
                    span: stmt.span,
                }))
            }
            ast::StmtKind::Reassign { target, value } => self.check_reassign(target, value, stmt.span),
            ast::StmtKind::If(if_stmt) => {
                let cond = self.check_expr(&if_stmt.cond, &Type::Bool);
                let then = self.check_block_stmts(&if_stmt.then, RibKind::Block);
                let else_ifs = if_stmt
                    .else_ifs
                    .iter()
                    .map(|(cond, block)| {
                        (
                            self.check_expr(cond, &Type::Bool),
                            self.check_block_stmts(block, RibKind::Block),
                        )
                    })
                    .collect();
                let else_block = if_stmt
                    .else_block
                    .as_ref()
                    .map(|block| self.check_block_stmts(block, RibKind::Block));
                Some(tir::Stmt::If(tir::If {
                    cond,
                    then,
                    else_ifs,
                    else_block,
                }))
            }
            ast::StmtKind::While { cond, body } => {
                let cond = self.check_expr(cond, &Type::Bool);
                let body = self.check_block_stmts(body, RibKind::Loop);
                Some(tir::Stmt::WhileLoop(tir::WhileLoop { cond, body }))
            }
            ast::StmtKind::ForRange {
                var,
                start,
                end,
                body,
            } => {
                let start = self.check_expr(start, &Type::Int);
                let end = self.check_expr(end, &Type::Int);
                self.scopes.enter(RibKind::Loop);
                self.scopes.insert(
                    *var,
                    Binding::Variable {
                        ty: Type::Int,
                        mutable: false,
                    },
                );
                let body = self.check_stmts(body);
                self.scopes.exit();
                Some(tir::Stmt::ForIntRange(tir::ForIntRange {
                    var: *var,
                    start,
                    end,
                    body,
                }))
            }
            ast::StmtKind::ForIn {
                first,
                second,
                subject,
                body,
            } => self.check_for_in(*first, *second, subject, body, stmt.span),
            ast::StmtKind::Break => {
                if !self.scopes.in_loop() {
                    self.error(
                        stmt.span,
                        Code::BREAK_OUTSIDE_LOOP,
                        "'break' outside of a loop",
                    );
                }
                Some(tir::Stmt::Break(stmt.span))
            }
            ast::StmtKind::Fn(decl) => self.check_nested_fn(decl, stmt.span),
            ast::StmtKind::Expr(expr) => Some(tir::Stmt::Expr(self.infer_expr(expr))),
            // type and extern declarations are module-level only
            _ => {
                if self.scopes.in_function() {
                    self.error(
                        stmt.span,
                        Code::MISPLACED_DECLARATION,
                        "declarations are only allowed at the top level of a module",
                    );
                    None
                } else {
                    None
                }
            }
        }
    }

    fn check_reassign(
        &mut self,
        target: &ast::Expr,
        value: &ast::Expr,
        span: Span,
    ) -> Option<tir::Stmt> {
        match &target.kind {
            ast::ExprKind::Ident(name) => {
                let Some(resolution) = self.scopes.resolve(*name) else {
                    self.error(
                        target.span,
                        Code::UNDEFINED_SYMBOL,
                        format!("undefined symbol '{name}'"),
                    );
                    return None;
                };
                match resolution.binding {
                    Binding::Variable { ty, mutable } => {
                        if !mutable {
                            self.error(
                                span,
                                Code::INCOMPATIBLE_MUTATION,
                                format!("cannot reassign immutable variable '{name}'"),
                            );
                        }
                        self.scopes.record_capture(*name, ty.clone(), resolution.rib);
                        let value = self.check_expr(value, &ty);
                        Some(tir::Stmt::Reassignment(tir::Reassignment {
                            target: tir::AssignTarget::Variable(*name),
                            value,
                            span,
                        }))
                    }
                    _ => {
                        self.error(
                            span,
                            Code::INCOMPATIBLE_MUTATION,
                            format!("'{name}' is not a reassignable variable"),
                        );
                        None
                    }
                }
            }
            ast::ExprKind::Property { subject, name } => {
                let subject = self.infer_expr(subject);
                if !self.is_mutable_place(&subject) {
                    self.error(
                        span,
                        Code::INCOMPATIBLE_MUTATION,
                        "cannot assign through an immutable subject",
                    );
                }
                let field_ty = self.property_type(&subject, *name, target.span)?;
                let value = self.check_expr(value, &field_ty);
                Some(tir::Stmt::Reassignment(tir::Reassignment {
                    target: tir::AssignTarget::Property {
                        subject,
                        name: *name,
                    },
                    value,
                    span,
                }))
            }
            _ => {
                self.error(
                    span,
                    Code::INCOMPATIBLE_MUTATION,
                    "invalid reassignment target",
                );
                None
            }
        }
    }

    fn check_for_in(
        &mut self,
        first: Symbol,
        second: Option<Symbol>,
        subject: &ast::Expr,
        body: &ast::Block,
        span: Span,
    ) -> Option<tir::Stmt> {
        let subject = self.infer_expr(subject);
        match subject.ty.clone() {
            Type::List(elem) => {
                if second.is_some() {
                    self.error(span, Code::TYPE_MISMATCH, "list iteration binds one name");
                }
                let body = self.check_loop_body(&[(first, (*elem).clone())], body);
                Some(tir::Stmt::ForInList(tir::ForIn {
                    var: first,
                    var_ty: *elem,
                    subject,
                    body,
                }))
            }
            Type::Map { key, value } => {
                let Some(second) = second else {
                    self.error(
                        span,
                        Code::TYPE_MISMATCH,
                        "map iteration binds a key and a value name",
                    );
                    return None;
                };
                let body = self.check_loop_body(
                    &[(first, (*key).clone()), (second, (*value).clone())],
                    body,
                );
                Some(tir::Stmt::ForInMap(tir::ForInMap {
                    key: first,
                    key_ty: *key,
                    value: second,
                    value_ty: *value,
                    subject,
                    body,
                }))
            }
            Type::Str => {
                if second.is_some() {
                    self.error(span, Code::TYPE_MISMATCH, "string iteration binds one name");
                }
                let body = self.check_loop_body(&[(first, Type::Str)], body);
                Some(tir::Stmt::ForInStr(tir::ForIn {
                    var: first,
                    var_ty: Type::Str,
                    subject,
                    body,
                }))
            }
            other => {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!("cannot iterate over a value of type {other}"),
                );
                None
            }
        }
    }

    fn check_loop_body(
        &mut self,
        bindings: &[(Symbol, Type)],
        body: &ast::Block,
    ) -> Vec<tir::Stmt> {
        self.scopes.enter(RibKind::Loop);
        for (name, ty) in bindings {
            self.scopes.insert(
                *name,
                Binding::Variable {
                    ty: ty.clone(),
                    mutable: false,
                },
            );
        }
        let body = self.check_stmts(body);
        self.scopes.exit();
        body
    }

    /// A named function nested in a body closes over its environment like
    /// a lambda; the name binds an immutable function-typed variable.
    fn check_nested_fn(&mut self, decl: &ast::FnDecl, span: Span) -> Option<tir::Stmt> {
        if !decl.type_params.is_empty() {
            self.error(
                span,
                Code::MISPLACED_DECLARATION,
                "generic functions are only allowed at the top level of a module",
            );
            return None;
        }
        let ty = self.resolve_fn_sig(&decl.params, &decl.ret, decl.span);
        let closure = self.check_closure(decl.name, &ty, &decl.body, decl.span);
        if !self.scopes.insert(
            decl.name,
            Binding::Variable {
                ty: Type::Fn(Arc::clone(&ty)),
                mutable: false,
            },
        ) {
            self.error(
                span,
                Code::DUPLICATE_NAME,
                format!("the name '{}' is already defined in this scope", decl.name),
            );
        }
        Some(tir::Stmt::VariableDef(tir::VariableDef {
            name: decl.name,
            mutable: false,
            value: closure,
            span,
        }))
    }

    /// Check a lambda or nested function into a closure expression.
    pub(crate) fn check_closure(
        &mut self,
        name: Symbol,
        ty: &Arc<FnType>,
        body: &ast::Block,
        span: Span,
    ) -> tir::Expr {
        self.scopes.enter(RibKind::Lambda {
            ret: ty.ret.clone(),
            captures: IndexMap::new(),
        });
        for param in &ty.params {
            self.scopes.insert(
                param.name,
                Binding::Variable {
                    ty: param.ty.clone(),
                    mutable: param.mutable,
                },
            );
        }
        let block = self.check_body_block(body, &ty.ret, span);
        let captures = self.scopes.exit();
        let def = Rc::new(tir::FunctionDef {
            name,
            ty: Arc::clone(ty),
            body: block,
            captures,
            span,
        });
        tir::Expr {
            kind: tir::ExprKind::Closure { def },
            ty: Type::Fn(Arc::clone(ty)),
            span,
        }
    }

    /// Check a function body against its signature.
    pub(crate) fn check_function_body(
        &mut self,
        ty: &Arc<FnType>,
        body: &ast::Block,
        receiver: Option<Receiver>,
        span: Span,
    ) -> tir::Block {
        self.scopes.enter(RibKind::Function {
            ret: ty.ret.clone(),
            receiver,
        });
        for param in &ty.params {
            self.scopes.insert(
                param.name,
                Binding::Variable {
                    ty: param.ty.clone(),
                    mutable: param.mutable,
                },
            );
        }
        let block = self.check_body_block(body, &ty.ret, span);
        self.scopes.exit();
        block
    }

    /// Shared body logic: all but a trailing expression are statements;
    /// the trailing expression is the body's value, checked against the
    /// return type.
    pub(crate) fn check_body_block(&mut self, body: &ast::Block, ret: &Type, span: Span) -> tir::Block {
        let (init, last) = split_trailing_expr(&body.statements);
        let mut stmts = Vec::new();
        for stmt in init {
            if let Some(checked) = self.check_stmt(stmt) {
                stmts.push(checked);
            }
        }
        let value = match last {
            Some(expr) if *ret != Type::Void => Some(Box::new(self.check_expr(expr, ret))),
            Some(expr) => {
                // void functions discard the trailing value
                stmts.push(tir::Stmt::Expr(self.infer_expr(expr)));
                None
            }
            None => {
                if *ret != Type::Void {
                    self.error(
                        span,
                        Code::TYPE_MISMATCH,
                        format!("function body must end with an expression of type {ret}"),
                    );
                }
                None
            }
        };
        tir::Block { stmts, value }
    }

    pub(crate) fn check_stmts(&mut self, block: &ast::Block) -> Vec<tir::Stmt> {
        block
            .statements
            .iter()
            .filter_map(|stmt| self.check_stmt(stmt))
            .collect()
    }

    fn check_block_stmts(&mut self, block: &ast::Block, kind: RibKind) -> Vec<tir::Stmt> {
        self.scopes.enter(kind);
        let stmts = self.check_stmts(block);
        self.scopes.exit();
        stmts
    }

    // ------------------------------------------------------------------
    // Type resolution and lookup helpers
    // ------------------------------------------------------------------

    pub(crate) fn resolve_type(&mut self, te: &ast::TypeExpr, span: Span) -> Type {
        match te {
            ast::TypeExpr::Named(name) => match name.as_str() {
                "Int" => Type::Int,
                "Float" => Type::Float,
                "Str" => Type::Str,
                "Bool" => Type::Bool,
                "Void" => Type::Void,
                "Dynamic" => Type::Dynamic,
                _ => match self.scopes.resolve(*name).map(|r| r.binding) {
                    Some(Binding::Struct(info)) => Type::Struct(Arc::clone(&info.borrow().ty)),
                    Some(Binding::Enum(ty)) => Type::Enum(ty),
                    Some(Binding::Union(ty)) => Type::Union(ty),
                    Some(Binding::Trait(ty)) => Type::Trait(ty),
                    Some(_) => {
                        self.error(
                            span,
                            Code::TYPE_MISMATCH,
                            format!("'{name}' is not a type"),
                        );
                        Type::Dynamic
                    }
                    None => {
                        self.error(
                            span,
                            Code::UNDEFINED_SYMBOL,
                            format!("unknown type '{name}'"),
                        );
                        Type::Dynamic
                    }
                },
            },
            ast::TypeExpr::Var(name) => self
                .type_bindings
                .get(name)
                .cloned()
                .unwrap_or(Type::Var(*name)),
            ast::TypeExpr::Maybe(inner) => Type::Maybe(Box::new(self.resolve_type(inner, span))),
            ast::TypeExpr::Result(ok, err) => Type::Result {
                ok: Box::new(self.resolve_type(ok, span)),
                err: Box::new(self.resolve_type(err, span)),
            },
            ast::TypeExpr::List(of) => Type::List(Box::new(self.resolve_type(of, span))),
            ast::TypeExpr::Map(key, value) => {
                let key = self.resolve_type(key, span);
                if !key.is_hashable() && !key.has_vars() && key != Type::Dynamic {
                    self.error(
                        span,
                        Code::TYPE_MISMATCH,
                        format!("map keys must be hashable; {key} is not"),
                    );
                }
                Type::Map {
                    key: Box::new(key),
                    value: Box::new(self.resolve_type(value, span)),
                }
            }
            ast::TypeExpr::Fn(params, ret) => {
                let params = params
                    .iter()
                    .map(|p| Parameter {
                        name: Symbol::intern("_"),
                        ty: self.resolve_type(p, span),
                        mutable: false,
                    })
                    .collect();
                Type::Fn(Arc::new(FnType::new(params, self.resolve_type(ret, span))))
            }
            ast::TypeExpr::Fiber(inner) => Type::Fiber(Box::new(self.resolve_type(inner, span))),
            ast::TypeExpr::Void => Type::Void,
        }
    }

    pub(crate) fn lookup_struct(&self, name: Symbol) -> Option<Rc<RefCell<StructInfo>>> {
        match self.scopes.resolve(name).map(|r| r.binding) {
            Some(Binding::Struct(info)) => Some(info),
            _ => self.imports.values().find_map(|m| match &**m {
                ModuleRef::User(module) => match module.exports.get(&name) {
                    Some(Binding::Struct(info)) => Some(Rc::clone(info)),
                    _ => None,
                },
                ModuleRef::Builtin(_) => None,
            }),
        }
    }

    /// Whether an expression denotes a place whose root subject is mutable.
    pub(crate) fn is_mutable_place(&self, expr: &tir::Expr) -> bool {
        match &expr.kind {
            tir::ExprKind::Variable(name) => matches!(
                self.scopes.resolve(*name).map(|r| r.binding),
                Some(Binding::Variable { mutable: true, .. })
            ),
            tir::ExprKind::SelfRef => self
                .scopes
                .receiver()
                .map(|r| r.mutable)
                .unwrap_or(false),
            tir::ExprKind::InstanceProperty { subject, .. } => self.is_mutable_place(subject),
            _ => false,
        }
    }

    pub(crate) fn property_type(
        &mut self,
        subject: &tir::Expr,
        name: Symbol,
        span: Span,
    ) -> Option<Type> {
        match &subject.ty {
            Type::Struct(s) => {
                let info = self.lookup_struct(s.name)?;
                let field = info.borrow().ty.field(name).cloned();
                match field {
                    Some(ty) => Some(ty),
                    None => {
                        self.error(
                            span,
                            Code::UNDEFINED_SYMBOL,
                            format!("struct '{}' has no field '{name}'", s.name),
                        );
                        None
                    }
                }
            }
            Type::Dynamic => Some(Type::Dynamic),
            other => {
                self.error(
                    span,
                    Code::TYPE_MISMATCH,
                    format!("type {other} has no properties"),
                );
                None
            }
        }
    }
}

/// Split a statement list into leading statements plus a trailing
/// expression statement, if any.
pub(crate) fn split_trailing_expr(statements: &[ast::Stmt]) -> (&[ast::Stmt], Option<&ast::Expr>) {
    match statements.split_last() {
        Some((
            ast::Stmt {
                kind: ast::StmtKind::Expr(expr),
                ..
            },
            init,
        )) => (init, Some(expr)),
        _ => (statements, None),
    }
}
