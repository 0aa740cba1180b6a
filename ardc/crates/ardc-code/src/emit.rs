//! Bytecode emission.
//!
//! Consumes a checked module graph and produces a program image. Emission
//! is two-pass: every reachable function (dependencies first) is assigned
//! its index, then bodies are emitted, so forward references and recursion
//! resolve without fixups. Closure functions are appended as they are
//! encountered.
//!
//! Invariants the emitter maintains (the verifier re-checks them):
//! - every expression pushes exactly one value
//! - every statement leaves the operand stack where it found it
//! - `max_stack` bounds the tracked depth at every point
//! - every function body ends in `Return`

use std::rc::Rc;

use ardc_sem::tir;
use ardc_sem::Module;
use ardc_types::{ListMethodKind, MapMethodKind, MaybeMethodKind, ResultMethodKind, Type, TypeRegistry};
use ardc_util::{FxHashMap, IndexVec, Symbol};

use crate::instr::{Instruction, Op, NO_TARGET};
use crate::program::{ConstId, Constant, FuncId, Function, Program, TypeEntry, TypeTable};

/// Emit a checked module graph into a program image.
pub fn emit_program(root: &Rc<Module>, registry: &TypeRegistry) -> Program {
    Emitter::new(registry).run(root)
}

struct Emitter<'a> {
    registry: &'a TypeRegistry,
    constants: IndexVec<ConstId, Constant>,
    const_cache: FxHashMap<ConstKey, ConstId>,
    functions: IndexVec<FuncId, Function>,
    /// module path → function name → index
    module_fns: FxHashMap<String, FxHashMap<Symbol, FuncId>>,
    module_functions: FxHashMap<(String, String), FuncId>,
    /// struct/enum type id → (field names, method table)
    type_meta: FxHashMap<u32, (Vec<String>, FxHashMap<String, FuncId>)>,
}

#[derive(PartialEq, Eq, Hash)]
enum ConstKey {
    Str(String),
}

impl<'a> Emitter<'a> {
    fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            constants: IndexVec::new(),
            const_cache: FxHashMap::default(),
            functions: IndexVec::new(),
            module_fns: FxHashMap::default(),
            module_functions: FxHashMap::default(),
            type_meta: FxHashMap::default(),
        }
    }

    fn run(mut self, root: &Rc<Module>) -> Program {
        let modules = root.transitive_user_modules();

        // pass 1: assign indices to every declared function
        for module in &modules {
            self.reserve_module(module);
        }
        // pass 2: emit bodies into their slots
        for module in &modules {
            self.emit_module(module);
        }
        let entry = self.emit_entry(root);

        let types = self.build_type_table();
        Program {
            constants: self.constants,
            types,
            functions: self.functions,
            entry,
            module_functions: self.module_functions,
        }
    }

    fn reserve_module(&mut self, module: &Rc<Module>) {
        let mut fns: FxHashMap<Symbol, FuncId> = FxHashMap::default();
        for stmt in &module.body {
            match stmt {
                tir::Stmt::FunctionDef(def) => {
                    let id = self.reserve(def.name);
                    fns.insert(def.name, id);
                    self.module_functions
                        .insert((module.path.clone(), def.name.to_string()), id);
                }
                tir::Stmt::ExternalFunctionDef(def) => {
                    let id = self.reserve(def.name);
                    fns.insert(def.name, id);
                    self.module_functions
                        .insert((module.path.clone(), def.name.to_string()), id);
                }
                tir::Stmt::StructDef(def) => {
                    let tid = self.tid(&Type::Struct(def.ty.clone()));
                    let fields = def.ty.fields.iter().map(|(n, _)| n.to_string()).collect();
                    let mut methods = FxHashMap::default();
                    for method in &def.methods {
                        let id = self.reserve(method.def.name);
                        methods.insert(method.name.to_string(), id);
                    }
                    for static_fn in &def.statics {
                        let id = self.reserve(static_fn.name);
                        fns.insert(static_fn.name, id);
                    }
                    self.type_meta.insert(tid, (fields, methods));
                }
                tir::Stmt::EnumDef(def) => {
                    let tid = self.tid(&Type::Enum(def.ty.clone()));
                    let mut methods = FxHashMap::default();
                    for method in &def.methods {
                        let id = self.reserve(method.def.name);
                        methods.insert(method.name.to_string(), id);
                    }
                    self.type_meta.insert(tid, (vec![], methods));
                }
                _ => {}
            }
        }
        self.module_fns.insert(module.path.clone(), fns);
    }

    fn reserve(&mut self, name: Symbol) -> FuncId {
        self.functions.push(Function {
            name,
            arity: 0,
            locals: 0,
            max_stack: 0,
            captures: vec![],
            code: vec![],
        })
    }

    fn emit_module(&mut self, module: &Rc<Module>) {
        for stmt in &module.body {
            match stmt {
                tir::Stmt::FunctionDef(def) => {
                    let id = self.module_fns[&module.path][&def.name];
                    let function = self.build_function(def, &module.path, false);
                    self.functions[id] = function;
                }
                tir::Stmt::ExternalFunctionDef(def) => {
                    let id = self.module_fns[&module.path][&def.name];
                    let function = self.build_extern_wrapper(def);
                    self.functions[id] = function;
                }
                tir::Stmt::StructDef(def) => {
                    let tid = self.tid(&Type::Struct(def.ty.clone()));
                    for method in &def.methods {
                        let id = self.type_meta[&tid].1[method.name.as_str()];
                        let function = self.build_function(&method.def, &module.path, true);
                        self.functions[id] = function;
                    }
                    for static_fn in &def.statics {
                        let id = self.module_fns[&module.path][&static_fn.name];
                        let function = self.build_function(static_fn, &module.path, false);
                        self.functions[id] = function;
                    }
                }
                tir::Stmt::EnumDef(def) => {
                    let tid = self.tid(&Type::Enum(def.ty.clone()));
                    for method in &def.methods {
                        let id = self.type_meta[&tid].1[method.name.as_str()];
                        let function = self.build_function(&method.def, &module.path, true);
                        self.functions[id] = function;
                    }
                }
                _ => {}
            }
        }
    }

    /// The entry function: the root module's non-declaration statements.
    /// When the module defines a zero-parameter `main`, the entry calls it
    /// and returns its result; otherwise the trailing expression's value
    /// is the program's result.
    fn emit_entry(&mut self, root: &Rc<Module>) -> FuncId {
        let main = Symbol::intern("main");
        let main_id = root.body.iter().find_map(|stmt| match stmt {
            tir::Stmt::FunctionDef(def) if def.name == main && def.ty.params.is_empty() => {
                Some(self.module_fns[&root.path][&main])
            }
            _ => None,
        });

        let mut fe = FuncEmitter::new(root.path.clone(), self.tid(&Type::Dynamic));
        let statements: Vec<&tir::Stmt> = root
            .body
            .iter()
            .filter(|s| !s.is_declaration())
            .collect();

        match main_id {
            Some(main_id) => {
                for &stmt in &statements {
                    fe.stmt(self, stmt);
                }
                fe.push(Instruction::new(Op::Call).a(main_id.0).b(0));
                fe.push(Instruction::new(Op::Return));
            }
            None => {
                let (init, last) = match statements.split_last() {
                    Some((tir::Stmt::Expr(e), init)) => (init, Some(e)),
                    _ => (&statements[..], None),
                };
                for &stmt in init {
                    fe.stmt(self, stmt);
                }
                match last {
                    Some(e) => fe.expr(self, e),
                    None => {
                        fe.push(Instruction::new(Op::ConstVoid));
                    }
                }
                fe.push(Instruction::new(Op::Return));
            }
        }

        let function = fe.finish(Symbol::intern("<entry>"), 0, vec![]);
        self.functions.push(function)
    }

    fn build_function(
        &mut self,
        def: &tir::FunctionDef,
        module_path: &str,
        is_method: bool,
    ) -> Function {
        let mut fe = FuncEmitter::new(module_path.to_string(), self.tid(&def.ty.ret));
        if is_method {
            fe.local(Symbol::intern("@"));
        }
        for param in &def.ty.params {
            fe.local(param.name);
        }
        let mut captures = Vec::new();
        for capture in &def.captures {
            captures.push(fe.local(capture.name));
        }
        let arity = def.ty.params.len() as u32 + if is_method { 1 } else { 0 };

        fe.block_value(self, &def.body);
        fe.push(Instruction::new(Op::Return));
        fe.finish(def.name, arity, captures)
    }

    /// An extern function's body is a single `CallExtern`.
    fn build_extern_wrapper(&mut self, def: &tir::ExternalFunctionDef) -> Function {
        let ret_tid = self.tid(&def.ty.ret);
        let mut fe = FuncEmitter::new(String::new(), ret_tid);
        for param in &def.ty.params {
            fe.local(param.name);
        }
        let argc = def.ty.params.len() as u32;
        for slot in 0..argc {
            fe.push(Instruction::new(Op::LoadLocal).a(slot));
        }
        let binding = self.str_const(&def.binding);
        fe.push(
            Instruction::new(Op::CallExtern)
                .a(binding.0)
                .c(ret_tid)
                .imm(argc as i64),
        );
        fe.push(Instruction::new(Op::Return));
        fe.finish(def.name, argc, vec![])
    }

    fn emit_closure(&mut self, def: &Rc<tir::FunctionDef>, module_path: &str) -> FuncId {
        let function = self.build_function(def, module_path, false);
        self.functions.push(function)
    }

    fn tid(&self, ty: &Type) -> u32 {
        self.registry.register(ty).0
    }

    fn str_const(&mut self, value: &str) -> ConstId {
        let key = ConstKey::Str(value.to_string());
        if let Some(&id) = self.const_cache.get(&key) {
            return id;
        }
        let id = self.constants.push(Constant::Str(value.to_string()));
        self.const_cache.insert(key, id);
        id
    }

    fn lookup_fn(&self, module_path: &str, name: Symbol) -> FuncId {
        self.module_fns[module_path]
            .get(&name)
            .copied()
            .unwrap_or_else(|| panic!("emitter: unknown function '{name}' in '{module_path}'"))
    }

    fn build_type_table(&self) -> TypeTable {
        let entries = self
            .registry
            .snapshot()
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                let (fields, methods) = self
                    .type_meta
                    .get(&(i as u32))
                    .cloned()
                    .unwrap_or_default();
                TypeEntry {
                    name: ty.name(),
                    describe: ty.describe(),
                    fields,
                    methods,
                }
            })
            .collect();
        TypeTable::new(entries)
    }
}

/// Per-function emission state: code buffer, local allocation, tracked
/// operand-stack depth, and the enclosing loop's break-patch list.
struct FuncEmitter {
    code: Vec<Instruction>,
    scopes: Vec<FxHashMap<Symbol, u32>>,
    next_local: u32,
    stack: u32,
    max_stack: u32,
    loops: Vec<Vec<usize>>,
    module_path: String,
    ret_type_id: u32,
}

impl FuncEmitter {
    fn new(module_path: String, ret_type_id: u32) -> Self {
        Self {
            code: Vec::new(),
            scopes: vec![FxHashMap::default()],
            next_local: 0,
            stack: 0,
            max_stack: 0,
            loops: Vec::new(),
            module_path,
            ret_type_id,
        }
    }

    fn finish(self, name: Symbol, arity: u32, captures: Vec<u32>) -> Function {
        Function {
            name,
            arity,
            locals: self.next_local,
            max_stack: self.max_stack,
            captures,
            code: self.code,
        }
    }

    // -------------------------------------------------------------- core

    /// Append an instruction, applying its fall-through stack effect.
    fn push(&mut self, instr: Instruction) -> usize {
        let (pops, pushes) = instr.stack_effect();
        debug_assert!(self.stack >= pops, "operand stack underflow at emission");
        self.stack = self.stack - pops + pushes;
        self.max_stack = self.max_stack.max(self.stack);
        self.code.push(instr);
        self.code.len() - 1
    }

    /// Reset the tracked depth at a label reached only by jumps.
    fn set_stack(&mut self, depth: u32) {
        self.stack = depth;
        self.max_stack = self.max_stack.max(depth);
    }

    fn here(&self) -> u32 {
        self.code.len() as u32
    }

    fn patch(&mut self, at: usize, target: u32) {
        self.code[at].a = target;
    }

    fn enter_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    /// Allocate a stable slot for a named variable in the current scope.
    fn local(&mut self, name: Symbol) -> u32 {
        let slot = self.next_local;
        self.next_local += 1;
        self.scopes.last_mut().unwrap().insert(name, slot);
        slot
    }

    /// Allocate an unnamed temporary for desugaring.
    fn temp(&mut self) -> u32 {
        let slot = self.next_local;
        self.next_local += 1;
        slot
    }

    fn slot_of(&self, name: Symbol) -> u32 {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name).copied())
            .unwrap_or_else(|| panic!("emitter: unbound local '{name}'"))
    }

    // -------------------------------------------------------- statements

    fn stmts(&mut self, em: &mut Emitter, stmts: &[tir::Stmt]) {
        for stmt in stmts {
            self.stmt(em, stmt);
        }
    }

    fn scoped_stmts(&mut self, em: &mut Emitter, stmts: &[tir::Stmt]) {
        self.enter_scope();
        self.stmts(em, stmts);
        self.exit_scope();
    }

    fn stmt(&mut self, em: &mut Emitter, stmt: &tir::Stmt) {
        match stmt {
            tir::Stmt::VariableDef(def) => {
                self.expr(em, &def.value);
                let slot = self.local(def.name);
                self.push(Instruction::new(Op::StoreLocal).a(slot));
            }
            tir::Stmt::Reassignment(assign) => match &assign.target {
                tir::AssignTarget::Variable(name) => {
                    self.expr(em, &assign.value);
                    let slot = self.slot_of(*name);
                    self.push(Instruction::new(Op::StoreLocal).a(slot));
                }
                tir::AssignTarget::Property { subject, name } => {
                    self.expr(em, subject);
                    self.expr(em, &assign.value);
                    let name_const = em.str_const(name.as_str());
                    self.push(Instruction::new(Op::SetField).a(name_const.0));
                }
            },
            tir::Stmt::If(if_stmt) => self.emit_if(em, if_stmt),
            tir::Stmt::WhileLoop(while_loop) => {
                let head = self.here();
                self.expr(em, &while_loop.cond);
                let exit_jump = self.push(Instruction::new(Op::JumpIfFalse));
                self.loops.push(Vec::new());
                self.scoped_stmts(em, &while_loop.body);
                self.push(Instruction::new(Op::Jump).a(head));
                let exit = self.here();
                self.patch(exit_jump, exit);
                for jump in self.loops.pop().unwrap() {
                    self.patch(jump, exit);
                }
            }
            tir::Stmt::ForIntRange(range) => self.emit_for_range(em, range),
            tir::Stmt::ForInList(for_in) => {
                self.expr(em, &for_in.subject);
                let list_slot = self.temp();
                self.push(Instruction::new(Op::StoreLocal).a(list_slot));
                self.emit_list_iteration(em, list_slot, for_in.var, &for_in.body);
            }
            tir::Stmt::ForInStr(for_in) => {
                // iterate the string's characters as a snapshot list
                self.expr(em, &for_in.subject);
                self.push(
                    Instruction::new(Op::StrMethod)
                        .a(ardc_types::StrMethodKind::Chars.as_u32())
                        .b(0),
                );
                let list_slot = self.temp();
                self.push(Instruction::new(Op::StoreLocal).a(list_slot));
                self.emit_list_iteration(em, list_slot, for_in.var, &for_in.body);
            }
            tir::Stmt::ForInMap(for_in) => self.emit_for_in_map(em, for_in),
            tir::Stmt::Break(_) => {
                let jump = self.push(Instruction::new(Op::Jump));
                self.loops
                    .last_mut()
                    .expect("emitter: break outside loop")
                    .push(jump);
            }
            tir::Stmt::Expr(expr) => {
                self.expr(em, expr);
                self.push(Instruction::new(Op::Pop));
            }
            // declarations were emitted in their own pass
            tir::Stmt::FunctionDef(_)
            | tir::Stmt::ExternalFunctionDef(_)
            | tir::Stmt::StructDef(_)
            | tir::Stmt::EnumDef(_)
            | tir::Stmt::UnionDef(_)
            | tir::Stmt::TraitDef(_) => {}
        }
    }

    fn emit_if(&mut self, em: &mut Emitter, if_stmt: &tir::If) {
        let mut end_jumps = Vec::new();

        self.expr(em, &if_stmt.cond);
        let mut next_jump = self.push(Instruction::new(Op::JumpIfFalse));
        self.scoped_stmts(em, &if_stmt.then);
        end_jumps.push(self.push(Instruction::new(Op::Jump)));

        for (cond, body) in &if_stmt.else_ifs {
            let here = self.here();
            self.patch(next_jump, here);
            self.expr(em, cond);
            next_jump = self.push(Instruction::new(Op::JumpIfFalse));
            self.scoped_stmts(em, body);
            end_jumps.push(self.push(Instruction::new(Op::Jump)));
        }

        let here = self.here();
        self.patch(next_jump, here);
        if let Some(body) = &if_stmt.else_block {
            self.scoped_stmts(em, body);
        }
        let end = self.here();
        for jump in end_jumps {
            self.patch(jump, end);
        }
    }

    /// `for i in a..b` runs with both ends included.
    fn emit_for_range(&mut self, em: &mut Emitter, range: &tir::ForIntRange) {
        self.enter_scope();
        self.expr(em, &range.start);
        let var = self.local(range.var);
        self.push(Instruction::new(Op::StoreLocal).a(var));
        self.expr(em, &range.end);
        let end_slot = self.temp();
        self.push(Instruction::new(Op::StoreLocal).a(end_slot));

        let head = self.here();
        self.push(Instruction::new(Op::LoadLocal).a(var));
        self.push(Instruction::new(Op::LoadLocal).a(end_slot));
        self.push(Instruction::new(Op::Lte));
        let exit_jump = self.push(Instruction::new(Op::JumpIfFalse));

        self.loops.push(Vec::new());
        self.scoped_stmts(em, &range.body);

        self.push(Instruction::new(Op::LoadLocal).a(var));
        self.push(Instruction::new(Op::ConstInt).imm(1));
        self.push(Instruction::new(Op::Add));
        self.push(Instruction::new(Op::StoreLocal).a(var));
        self.push(Instruction::new(Op::Jump).a(head));

        let exit = self.here();
        self.patch(exit_jump, exit);
        for jump in self.loops.pop().unwrap() {
            self.patch(jump, exit);
        }
        self.exit_scope();
    }

    /// Index-counter iteration over the list stored in `list_slot`.
    fn emit_list_iteration(
        &mut self,
        em: &mut Emitter,
        list_slot: u32,
        var: Symbol,
        body: &[tir::Stmt],
    ) {
        self.enter_scope();
        let idx = self.temp();
        self.push(Instruction::new(Op::ConstInt).imm(0));
        self.push(Instruction::new(Op::StoreLocal).a(idx));

        let head = self.here();
        self.push(Instruction::new(Op::LoadLocal).a(idx));
        self.push(Instruction::new(Op::LoadLocal).a(list_slot));
        self.push(Instruction::new(Op::ListLen));
        self.push(Instruction::new(Op::Lt));
        let exit_jump = self.push(Instruction::new(Op::JumpIfFalse));

        let var_slot = self.local(var);
        self.push(Instruction::new(Op::LoadLocal).a(list_slot));
        self.push(Instruction::new(Op::LoadLocal).a(idx));
        self.push(Instruction::new(Op::ListGet));
        self.push(Instruction::new(Op::StoreLocal).a(var_slot));

        self.loops.push(Vec::new());
        self.stmts(em, body);

        self.push(Instruction::new(Op::LoadLocal).a(idx));
        self.push(Instruction::new(Op::ConstInt).imm(1));
        self.push(Instruction::new(Op::Add));
        self.push(Instruction::new(Op::StoreLocal).a(idx));
        self.push(Instruction::new(Op::Jump).a(head));

        let exit = self.here();
        self.patch(exit_jump, exit);
        for jump in self.loops.pop().unwrap() {
            self.patch(jump, exit);
        }
        self.exit_scope();
    }

    /// Map iteration walks a snapshot of the key list, then reads each
    /// value by key.
    fn emit_for_in_map(&mut self, em: &mut Emitter, for_in: &tir::ForInMap) {
        self.enter_scope();
        self.expr(em, &for_in.subject);
        let map_slot = self.temp();
        self.push(Instruction::new(Op::StoreLocal).a(map_slot));
        self.push(Instruction::new(Op::LoadLocal).a(map_slot));
        self.push(Instruction::new(Op::MapKeys));
        let keys_slot = self.temp();
        self.push(Instruction::new(Op::StoreLocal).a(keys_slot));

        let idx = self.temp();
        self.push(Instruction::new(Op::ConstInt).imm(0));
        self.push(Instruction::new(Op::StoreLocal).a(idx));

        let head = self.here();
        self.push(Instruction::new(Op::LoadLocal).a(idx));
        self.push(Instruction::new(Op::LoadLocal).a(keys_slot));
        self.push(Instruction::new(Op::ListLen));
        self.push(Instruction::new(Op::Lt));
        let exit_jump = self.push(Instruction::new(Op::JumpIfFalse));

        let key_slot = self.local(for_in.key);
        self.push(Instruction::new(Op::LoadLocal).a(keys_slot));
        self.push(Instruction::new(Op::LoadLocal).a(idx));
        self.push(Instruction::new(Op::ListGet));
        self.push(Instruction::new(Op::StoreLocal).a(key_slot));

        let value_slot = self.local(for_in.value);
        self.push(Instruction::new(Op::LoadLocal).a(map_slot));
        self.push(Instruction::new(Op::LoadLocal).a(key_slot));
        self.push(Instruction::new(Op::MapGetValue));
        self.push(Instruction::new(Op::StoreLocal).a(value_slot));

        self.loops.push(Vec::new());
        self.stmts(em, &for_in.body);

        self.push(Instruction::new(Op::LoadLocal).a(idx));
        self.push(Instruction::new(Op::ConstInt).imm(1));
        self.push(Instruction::new(Op::Add));
        self.push(Instruction::new(Op::StoreLocal).a(idx));
        self.push(Instruction::new(Op::Jump).a(head));

        let exit = self.here();
        self.patch(exit_jump, exit);
        for jump in self.loops.pop().unwrap() {
            self.patch(jump, exit);
        }
        self.exit_scope();
    }

    // -------------------------------------------------------- expressions

    /// Emit a block in expression position: statements discard their
    /// values, the trailing expression (or void) is the block's value.
    fn block_value(&mut self, em: &mut Emitter, block: &tir::Block) {
        self.enter_scope();
        self.stmts(em, &block.stmts);
        match &block.value {
            Some(value) => self.expr(em, value),
            None => {
                self.push(Instruction::new(Op::ConstVoid));
            }
        }
        self.exit_scope();
    }

    fn expr(&mut self, em: &mut Emitter, expr: &tir::Expr) {
        match &expr.kind {
            tir::ExprKind::Int(v) => {
                self.push(Instruction::new(Op::ConstInt).imm(*v));
            }
            tir::ExprKind::Float(v) => {
                self.push(Instruction::new(Op::ConstFloat).imm(v.to_bits() as i64));
            }
            tir::ExprKind::Str(v) => {
                let id = em.str_const(v);
                self.push(Instruction::new(Op::ConstStr).a(id.0));
            }
            tir::ExprKind::Bool(v) => {
                self.push(Instruction::new(Op::ConstBool).a(*v as u32));
            }
            tir::ExprKind::Void => {
                self.push(Instruction::new(Op::ConstVoid));
            }
            tir::ExprKind::Variable(name) => {
                let slot = self.slot_of(*name);
                self.push(Instruction::new(Op::LoadLocal).a(slot));
            }
            tir::ExprKind::SelfRef => {
                self.push(Instruction::new(Op::LoadLocal).a(0));
            }
            tir::ExprKind::TemplateStr(parts) => {
                if parts.is_empty() {
                    let id = em.str_const("");
                    self.push(Instruction::new(Op::ConstStr).a(id.0));
                    return;
                }
                self.expr(em, &parts[0]);
                for part in &parts[1..] {
                    self.expr(em, part);
                    self.push(Instruction::new(Op::Add));
                }
            }
            tir::ExprKind::Unary { op, operand } => {
                self.expr(em, operand);
                let op = match op {
                    ardc_ast::UnaryOp::Neg => Op::Neg,
                    ardc_ast::UnaryOp::Not => Op::Not,
                };
                self.push(Instruction::new(op));
            }
            tir::ExprKind::Binary { op, lhs, rhs } => {
                self.expr(em, lhs);
                self.expr(em, rhs);
                let op = match op {
                    ardc_ast::BinaryOp::Add => Op::Add,
                    ardc_ast::BinaryOp::Sub => Op::Sub,
                    ardc_ast::BinaryOp::Mul => Op::Mul,
                    ardc_ast::BinaryOp::Div => Op::Div,
                    ardc_ast::BinaryOp::Mod => Op::Mod,
                    ardc_ast::BinaryOp::Eq => Op::Eq,
                    ardc_ast::BinaryOp::Ne => Op::Neq,
                    ardc_ast::BinaryOp::Lt => Op::Lt,
                    ardc_ast::BinaryOp::Le => Op::Lte,
                    ardc_ast::BinaryOp::Gt => Op::Gt,
                    ardc_ast::BinaryOp::Ge => Op::Gte,
                    ardc_ast::BinaryOp::And => Op::And,
                    ardc_ast::BinaryOp::Or => Op::Or,
                };
                self.push(Instruction::new(op));
            }
            tir::ExprKind::ListLit(items) => {
                for item in items {
                    self.expr(em, item);
                }
                let tid = em.tid(&expr.ty);
                self.push(
                    Instruction::new(Op::MakeList)
                        .a(tid)
                        .b(items.len() as u32),
                );
            }
            tir::ExprKind::MapLit(entries) => {
                for (key, value) in entries {
                    self.expr(em, key);
                    self.expr(em, value);
                }
                let tid = em.tid(&expr.ty);
                self.push(
                    Instruction::new(Op::MakeMap)
                        .a(tid)
                        .b(entries.len() as u32),
                );
            }
            tir::ExprKind::StructInstance { ty, fields } => {
                for (_, value) in fields {
                    self.expr(em, value);
                }
                let tid = em.tid(&Type::Struct(ty.clone()));
                self.push(
                    Instruction::new(Op::MakeStruct)
                        .a(tid)
                        .b(fields.len() as u32),
                );
            }
            tir::ExprKind::InstanceProperty { subject, name } => {
                self.expr(em, subject);
                let id = em.str_const(name.as_str());
                self.push(Instruction::new(Op::GetField).a(id.0));
            }
            tir::ExprKind::InstanceMethod {
                subject,
                method,
                args,
                ..
            } => {
                self.expr(em, subject);
                for arg in args {
                    self.expr(em, arg);
                }
                let id = em.str_const(method.as_str());
                self.push(
                    Instruction::new(Op::CallMethod)
                        .a(id.0)
                        .b(args.len() as u32),
                );
            }
            tir::ExprKind::EnumVariant {
                ty, discriminant, ..
            } => {
                self.push(Instruction::new(Op::ConstInt).imm(*discriminant));
                let tid = em.tid(&Type::Enum(ty.clone()));
                self.push(Instruction::new(Op::MakeEnum).a(tid));
            }
            tir::ExprKind::FunctionCall { name, args } => {
                for arg in args {
                    self.expr(em, arg);
                }
                let id = em.lookup_fn(&self.module_path, *name);
                self.push(Instruction::new(Op::Call).a(id.0).b(args.len() as u32));
            }
            tir::ExprKind::ClosureCall { callee, args } => {
                self.expr(em, callee);
                for arg in args {
                    self.expr(em, arg);
                }
                self.push(Instruction::new(Op::CallClosure).b(args.len() as u32));
            }
            tir::ExprKind::ModuleFunctionCall {
                module_path,
                function,
                args,
            } => {
                for arg in args {
                    self.expr(em, arg);
                }
                let module_const = em.str_const(module_path);
                let fn_const = em.str_const(function.as_str());
                let ret_tid = em.tid(&expr.ty);
                self.push(
                    Instruction::new(Op::CallModule)
                        .a(module_const.0)
                        .b(fn_const.0)
                        .c(ret_tid)
                        .imm(args.len() as i64),
                );
            }
            tir::ExprKind::Closure { def } => {
                let module_path = self.module_path.clone();
                let fn_id = em.emit_closure(def, &module_path);
                for capture in &def.captures {
                    let slot = self.slot_of(capture.name);
                    self.push(Instruction::new(Op::LoadLocal).a(slot));
                }
                let tid = em.tid(&expr.ty);
                self.push(
                    Instruction::new(Op::MakeClosure)
                        .a(fn_id.0)
                        .b(def.captures.len() as u32)
                        .c(tid),
                );
            }
            tir::ExprKind::FunctionRef(name) => {
                let id = em.lookup_fn(&self.module_path, *name);
                let tid = em.tid(&expr.ty);
                self.push(Instruction::new(Op::MakeClosure).a(id.0).b(0).c(tid));
            }
            tir::ExprKind::MakeMaybe { value } => {
                let tid = em.tid(&expr.ty);
                match value {
                    Some(value) => {
                        self.expr(em, value);
                        self.push(
                            Instruction::new(Op::MaybeMethod)
                                .a(MaybeMethodKind::Some.as_u32())
                                .b(0)
                                .imm(tid as i64),
                        );
                    }
                    None => {
                        self.push(Instruction::new(Op::MakeNone).a(tid));
                    }
                }
            }
            tir::ExprKind::MakeResult { is_ok, value } => {
                let tid = em.tid(&expr.ty);
                self.expr(em, value);
                let kind = if *is_ok {
                    ResultMethodKind::MakeOk
                } else {
                    ResultMethodKind::MakeErr
                };
                self.push(
                    Instruction::new(Op::ResultMethod)
                        .a(kind.as_u32())
                        .b(0)
                        .imm(tid as i64),
                );
            }
            tir::ExprKind::StrMethod {
                subject,
                kind,
                args,
            } => {
                self.expr(em, subject);
                for arg in args {
                    self.expr(em, arg);
                }
                let ret_tid = em.tid(&expr.ty);
                self.push(
                    Instruction::new(Op::StrMethod)
                        .a(kind.as_u32())
                        .b(args.len() as u32)
                        .imm(ret_tid as i64),
                );
            }
            tir::ExprKind::IntMethod { subject, kind } => {
                self.expr(em, subject);
                self.push(Instruction::new(Op::IntMethod).a(kind.as_u32()));
            }
            tir::ExprKind::FloatMethod { subject, kind } => {
                self.expr(em, subject);
                self.push(Instruction::new(Op::FloatMethod).a(kind.as_u32()));
            }
            tir::ExprKind::BoolMethod { subject, kind } => {
                self.expr(em, subject);
                self.push(Instruction::new(Op::BoolMethod).a(kind.as_u32()));
            }
            tir::ExprKind::ListMethod {
                subject,
                kind,
                args,
            } => self.emit_list_method(em, expr, subject, *kind, args),
            tir::ExprKind::MapMethod {
                subject,
                kind,
                args,
            } => self.emit_map_method(em, expr, subject, *kind, args),
            tir::ExprKind::MaybeMethod {
                subject,
                kind,
                args,
            } => {
                self.expr(em, subject);
                for arg in args {
                    self.expr(em, arg);
                }
                let ret_tid = em.tid(&expr.ty);
                self.push(
                    Instruction::new(Op::MaybeMethod)
                        .a(kind.as_u32())
                        .b(args.len() as u32)
                        .imm(ret_tid as i64),
                );
            }
            tir::ExprKind::ResultMethod {
                subject,
                kind,
                args,
            } => {
                self.expr(em, subject);
                for arg in args {
                    self.expr(em, arg);
                }
                let ret_tid = em.tid(&expr.ty);
                self.push(
                    Instruction::new(Op::ResultMethod)
                        .a(kind.as_u32())
                        .b(args.len() as u32)
                        .imm(ret_tid as i64),
                );
            }
            tir::ExprKind::BoolMatch {
                subject,
                true_arm,
                false_arm,
            } => {
                let base = self.stack;
                self.expr(em, subject);
                let false_jump = self.push(Instruction::new(Op::JumpIfFalse));
                self.expr(em, true_arm);
                let end_jump = self.push(Instruction::new(Op::Jump));
                let here = self.here();
                self.patch(false_jump, here);
                self.set_stack(base);
                self.expr(em, false_arm);
                let end = self.here();
                self.patch(end_jump, end);
                self.set_stack(base + 1);
            }
            tir::ExprKind::IntMatch {
                subject,
                arms,
                default,
            } => self.emit_int_match(em, subject, arms, default.as_deref()),
            tir::ExprKind::EnumMatch {
                subject,
                arms,
                default,
                ..
            } => {
                let int_arms: Vec<(tir::IntPattern, tir::Expr)> = arms
                    .iter()
                    .map(|(disc, body)| (tir::IntPattern::Lit(*disc), body.clone()))
                    .collect();
                self.emit_int_match(em, subject, &int_arms, default.as_deref());
            }
            tir::ExprKind::UnionMatch {
                subject,
                arms,
                default,
            } => self.emit_union_match(em, subject, arms, default.as_deref()),
            tir::ExprKind::OptionMatch {
                subject,
                binding,
                some_arm,
                none_arm,
            } => self.emit_option_match(em, subject, *binding, some_arm, none_arm),
            tir::ExprKind::ResultMatch {
                subject,
                ok_binding,
                ok_arm,
                err_binding,
                err_arm,
            } => self.emit_result_match(em, subject, *ok_binding, ok_arm, *err_binding, err_arm),
            tir::ExprKind::ConditionalMatch { arms, default } => {
                let base = self.stack;
                let mut end_jumps = Vec::new();
                for (guard, body) in arms {
                    self.expr(em, guard);
                    let next_jump = self.push(Instruction::new(Op::JumpIfFalse));
                    self.expr(em, body);
                    end_jumps.push(self.push(Instruction::new(Op::Jump)));
                    let here = self.here();
                    self.patch(next_jump, here);
                    self.set_stack(base);
                }
                self.expr(em, default);
                let end = self.here();
                for jump in end_jumps {
                    self.patch(jump, end);
                }
                self.set_stack(base + 1);
            }
            tir::ExprKind::TryOp { expr: inner, catch, mode } => {
                let ok_tid = em.tid(&expr.ty);
                self.emit_try(em, inner, catch.as_ref(), *mode, ok_tid);
            }
            tir::ExprKind::Panic(message) => {
                self.expr(em, message);
                self.push(Instruction::new(Op::Panic));
                // the panic "value" keeps linear accounting consistent;
                // the instruction never falls through
                self.set_stack(self.stack + 1);
            }
            tir::ExprKind::Block(block) => self.block_value(em, block),
            tir::ExprKind::FiberExecution { callee } => {
                self.expr(em, callee);
                let tid = em.tid(&expr.ty);
                self.push(Instruction::new(Op::AsyncStart).c(tid));
            }
            tir::ExprKind::FiberEval { fiber } => {
                self.expr(em, fiber);
                let tid = em.tid(&expr.ty);
                self.push(Instruction::new(Op::AsyncEval).c(tid));
            }
        }
    }

    /// List methods with a one-to-one container opcode use it; the rest
    /// dispatch through `ListMethod`. Void-returning mutations push the
    /// void explicitly to keep every expression one value.
    fn emit_list_method(
        &mut self,
        em: &mut Emitter,
        expr: &tir::Expr,
        subject: &tir::Expr,
        kind: ListMethodKind,
        args: &[tir::Expr],
    ) {
        self.expr(em, subject);
        for arg in args {
            self.expr(em, arg);
        }
        match kind {
            ListMethodKind::Size => {
                self.push(Instruction::new(Op::ListLen));
            }
            ListMethodKind::Push => {
                self.push(Instruction::new(Op::ListPush));
                self.push(Instruction::new(Op::ConstVoid));
            }
            ListMethodKind::Prepend => {
                self.push(Instruction::new(Op::ListPrepend));
                self.push(Instruction::new(Op::ConstVoid));
            }
            ListMethodKind::Set => {
                self.push(Instruction::new(Op::ListSet));
                self.push(Instruction::new(Op::ConstVoid));
            }
            _ => {
                let ret_tid = em.tid(&expr.ty);
                self.push(
                    Instruction::new(Op::ListMethod)
                        .a(kind.as_u32())
                        .b(args.len() as u32)
                        .imm(ret_tid as i64),
                );
            }
        }
    }

    fn emit_map_method(
        &mut self,
        em: &mut Emitter,
        expr: &tir::Expr,
        subject: &tir::Expr,
        kind: MapMethodKind,
        args: &[tir::Expr],
    ) {
        self.expr(em, subject);
        for arg in args {
            self.expr(em, arg);
        }
        match kind {
            MapMethodKind::Size => {
                self.push(Instruction::new(Op::MapSize));
            }
            MapMethodKind::Has => {
                self.push(Instruction::new(Op::MapHas));
            }
            MapMethodKind::Get => {
                self.push(Instruction::new(Op::MapGet));
            }
            MapMethodKind::Keys => {
                let ret_tid = em.tid(&expr.ty);
                self.push(Instruction::new(Op::MapKeys).a(ret_tid));
            }
            MapMethodKind::Set => {
                self.push(Instruction::new(Op::MapSet));
                self.push(Instruction::new(Op::ConstVoid));
            }
            MapMethodKind::Drop => {
                self.push(Instruction::new(Op::MapDrop));
                self.push(Instruction::new(Op::ConstVoid));
            }
            _ => {
                let ret_tid = em.tid(&expr.ty);
                self.push(
                    Instruction::new(Op::MapMethod)
                        .a(kind.as_u32())
                        .b(args.len() as u32)
                        .imm(ret_tid as i64),
                );
            }
        }
    }

    /// Each branch tests the discriminator and jumps forward; the default
    /// (or a panic guard) falls through last.
    fn emit_int_match(
        &mut self,
        em: &mut Emitter,
        subject: &tir::Expr,
        arms: &[(tir::IntPattern, tir::Expr)],
        default: Option<&tir::Expr>,
    ) {
        let base = self.stack;
        self.expr(em, subject);
        let mut end_jumps = Vec::new();

        for (pattern, body) in arms {
            let mut next_jumps = Vec::new();
            match pattern {
                tir::IntPattern::Lit(value) => {
                    self.push(Instruction::new(Op::Dup));
                    self.push(Instruction::new(Op::ConstInt).imm(*value));
                    self.push(Instruction::new(Op::Eq));
                    next_jumps.push(self.push(Instruction::new(Op::JumpIfFalse)));
                }
                tir::IntPattern::Range(start, end) => {
                    self.push(Instruction::new(Op::Dup));
                    self.push(Instruction::new(Op::ConstInt).imm(*start));
                    self.push(Instruction::new(Op::Gte));
                    next_jumps.push(self.push(Instruction::new(Op::JumpIfFalse)));
                    self.push(Instruction::new(Op::Dup));
                    self.push(Instruction::new(Op::ConstInt).imm(*end));
                    self.push(Instruction::new(Op::Lte));
                    next_jumps.push(self.push(Instruction::new(Op::JumpIfFalse)));
                }
            }
            self.push(Instruction::new(Op::Pop));
            self.expr(em, body);
            end_jumps.push(self.push(Instruction::new(Op::Jump)));
            let here = self.here();
            for jump in next_jumps {
                self.patch(jump, here);
            }
            self.set_stack(base + 1);
        }

        self.push(Instruction::new(Op::Pop));
        match default {
            Some(default) => self.expr(em, default),
            None => {
                let id = em.str_const("value did not match any case");
                self.push(Instruction::new(Op::ConstStr).a(id.0));
                self.push(Instruction::new(Op::Panic));
                self.set_stack(base + 1);
            }
        }
        let end = self.here();
        for jump in end_jumps {
            self.patch(jump, end);
        }
        self.set_stack(base + 1);
    }

    /// Union arms test the runtime type name of the subject.
    fn emit_union_match(
        &mut self,
        em: &mut Emitter,
        subject: &tir::Expr,
        arms: &[tir::UnionArm],
        default: Option<&tir::Expr>,
    ) {
        let base = self.stack;
        self.expr(em, subject);
        let mut end_jumps = Vec::new();

        for arm in arms {
            self.push(Instruction::new(Op::Dup));
            self.push(Instruction::new(Op::TypeName));
            let name_const = em.str_const(&arm.member.name());
            self.push(Instruction::new(Op::ConstStr).a(name_const.0));
            self.push(Instruction::new(Op::Eq));
            let next_jump = self.push(Instruction::new(Op::JumpIfFalse));

            self.enter_scope();
            let slot = self.local(arm.binding);
            self.push(Instruction::new(Op::StoreLocal).a(slot));
            self.expr(em, &arm.body);
            self.exit_scope();
            end_jumps.push(self.push(Instruction::new(Op::Jump)));

            let here = self.here();
            self.patch(next_jump, here);
            self.set_stack(base + 1);
        }

        self.push(Instruction::new(Op::Pop));
        match default {
            Some(default) => self.expr(em, default),
            None => {
                let id = em.str_const("union value did not match any case");
                self.push(Instruction::new(Op::ConstStr).a(id.0));
                self.push(Instruction::new(Op::Panic));
                self.set_stack(base + 1);
            }
        }
        let end = self.here();
        for jump in end_jumps {
            self.patch(jump, end);
        }
        self.set_stack(base + 1);
    }

    fn emit_option_match(
        &mut self,
        em: &mut Emitter,
        subject: &tir::Expr,
        binding: Symbol,
        some_arm: &tir::Expr,
        none_arm: &tir::Expr,
    ) {
        let base = self.stack;
        self.expr(em, subject);
        self.push(Instruction::new(Op::Dup));
        self.push(
            Instruction::new(Op::MaybeMethod)
                .a(MaybeMethodKind::IsSome.as_u32())
                .b(0),
        );
        let none_jump = self.push(Instruction::new(Op::JumpIfFalse));

        let inner_tid = em.tid(&self.some_inner_type(subject));
        self.push(Instruction::new(Op::MaybeUnwrap).a(inner_tid));
        self.enter_scope();
        let slot = self.local(binding);
        self.push(Instruction::new(Op::StoreLocal).a(slot));
        self.expr(em, some_arm);
        self.exit_scope();
        let end_jump = self.push(Instruction::new(Op::Jump));

        let here = self.here();
        self.patch(none_jump, here);
        self.set_stack(base + 1);
        self.push(Instruction::new(Op::Pop));
        self.expr(em, none_arm);

        let end = self.here();
        self.patch(end_jump, end);
        self.set_stack(base + 1);
    }

    fn emit_result_match(
        &mut self,
        em: &mut Emitter,
        subject: &tir::Expr,
        ok_binding: Symbol,
        ok_arm: &tir::Expr,
        err_binding: Symbol,
        err_arm: &tir::Expr,
    ) {
        let base = self.stack;
        let ok_ty = match &subject.ty {
            Type::Result { ok, .. } => (**ok).clone(),
            _ => Type::Dynamic,
        };
        self.expr(em, subject);
        self.push(Instruction::new(Op::Dup));
        self.push(
            Instruction::new(Op::ResultMethod)
                .a(ResultMethodKind::IsOk.as_u32())
                .b(0),
        );
        let err_jump = self.push(Instruction::new(Op::JumpIfFalse));

        let ok_tid = em.tid(&ok_ty);
        self.push(Instruction::new(Op::ResultUnwrap).a(ok_tid));
        self.enter_scope();
        let slot = self.local(ok_binding);
        self.push(Instruction::new(Op::StoreLocal).a(slot));
        self.expr(em, ok_arm);
        self.exit_scope();
        let end_jump = self.push(Instruction::new(Op::Jump));

        let here = self.here();
        self.patch(err_jump, here);
        self.set_stack(base + 1);
        self.push(
            Instruction::new(Op::ResultMethod)
                .a(ResultMethodKind::UnwrapErr.as_u32())
                .b(0),
        );
        self.enter_scope();
        let slot = self.local(err_binding);
        self.push(Instruction::new(Op::StoreLocal).a(slot));
        self.expr(em, err_arm);
        self.exit_scope();

        let end = self.here();
        self.patch(end_jump, end);
        self.set_stack(base + 1);
    }

    /// `try` leaves the ok/some payload on the stack, or propagates: with
    /// a catch block, control jumps there with the failure payload bound;
    /// the block runs for its effects and the frame returns the failure.
    fn emit_try(
        &mut self,
        em: &mut Emitter,
        inner: &tir::Expr,
        catch: Option<&tir::TryCatch>,
        mode: tir::TryMode,
        ok_tid: u32,
    ) {
        let (op, err_tid) = match (&inner.ty, mode) {
            (Type::Result { err, .. }, tir::TryMode::Result) => (Op::TryResult, em.tid(&**err)),
            _ => (Op::TryMaybe, em.tid(&Type::Void)),
        };
        let base = self.stack;
        self.expr(em, inner);
        match catch {
            None => {
                self.push(
                    Instruction::new(op)
                        .a(NO_TARGET)
                        .c(err_tid)
                        .imm(ok_tid as i64),
                );
            }
            Some(catch) => {
                self.enter_scope();
                let catch_local = match catch.binding {
                    Some(name) => self.local(name),
                    None => self.temp(),
                };
                let try_at = self.push(
                    Instruction::new(op)
                        .b(catch_local)
                        .c(err_tid)
                        .imm(ok_tid as i64),
                );
                let ok_jump = self.push(Instruction::new(Op::Jump));

                let catch_label = self.here();
                self.code[try_at].a = catch_label;
                // the failure payload was consumed into the catch local
                self.set_stack(base);
                self.stmts(em, &catch.body);
                match mode {
                    tir::TryMode::Result => {
                        self.push(Instruction::new(Op::LoadLocal).a(catch_local));
                        self.push(
                            Instruction::new(Op::ResultMethod)
                                .a(ResultMethodKind::MakeErr.as_u32())
                                .b(0)
                                .imm(self.ret_type_id as i64),
                        );
                    }
                    tir::TryMode::Maybe => {
                        self.push(Instruction::new(Op::MakeNone).a(self.ret_type_id));
                    }
                }
                // operands of the abandoned enclosing expression sit under
                // the failure value; drop them so Return sees exactly one
                for _ in 0..base {
                    self.push(Instruction::new(Op::Swap));
                    self.push(Instruction::new(Op::Pop));
                }
                self.push(Instruction::new(Op::Return));
                self.exit_scope();

                let after = self.here();
                self.patch(ok_jump, after);
                self.set_stack(base + 1);
            }
        }
    }

    fn some_inner_type(&self, subject: &tir::Expr) -> Type {
        match &subject.ty {
            Type::Maybe(inner) => (**inner).clone(),
            _ => Type::Dynamic,
        }
    }
}
