//! The virtual machine.
//!
//! Stack-based, frame-per-call. A frame carries the function under
//! execution, its instruction pointer, a local-slot array, and an operand
//! stack bounded by the function's declared `max_stack`. The VM executes
//! verified programs; structural faults that the verifier rules out are
//! internal errors here, not checked paths.
//!
//! Within a fiber execution is strictly sequential; only explicit joins
//! suspend. Runtime errors unwind every frame and surface to the caller
//! of [`Vm::run`].

use std::sync::Arc;

use ardc_code::{Constant, FuncId, Function, Op, Program, NO_TARGET};
use ardc_types::{TypeId, TypeRegistry};

use crate::error::RuntimeError;
use crate::ffi::FfiRegistry;
use crate::fiber;
use crate::methods;
use crate::value::{ClosureVal, ListRef, MapRef, StructRef, Value};

/// Per-call execution state.
struct Frame {
    ip: usize,
    locals: Vec<Value>,
    stack: Vec<Value>,
}

/// A VM executing one fiber of a verified program.
pub struct Vm {
    program: Arc<Program>,
    registry: Arc<TypeRegistry>,
    ffi: Arc<FfiRegistry>,
}

impl Vm {
    pub fn new(program: Arc<Program>, registry: Arc<TypeRegistry>, ffi: Arc<FfiRegistry>) -> Self {
        Self {
            program,
            registry,
            ffi,
        }
    }

    /// A fresh, isolated VM over the same program for a new fiber.
    pub fn isolated(&self) -> Vm {
        Vm {
            program: Arc::clone(&self.program),
            registry: Arc::clone(&self.registry),
            ffi: Arc::clone(&self.ffi),
        }
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Run the program's entry function to completion.
    pub fn run(&self) -> Result<Value, RuntimeError> {
        self.call_function(self.program.entry, vec![])
    }

    pub fn call_function(&self, id: FuncId, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let function = &self.program.functions[id];
        let locals = self.init_locals(function, args, &[]);
        self.execute(function, locals)
    }

    pub fn call_closure(
        &self,
        closure: &ClosureVal,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let function = &self.program.functions[closure.function];
        let locals = self.init_locals(function, args, &closure.captures);
        self.execute(function, locals)
    }

    /// Parameters occupy the first `arity` slots; capture slots are
    /// populated from the closure; the rest start void.
    fn init_locals(&self, function: &Function, args: Vec<Value>, captures: &[Value]) -> Vec<Value> {
        let mut locals = vec![Value::Void; function.locals as usize];
        for (slot, value) in args.into_iter().enumerate() {
            if slot < locals.len() {
                locals[slot] = value;
            }
        }
        for (slot, value) in function.captures.iter().zip(captures) {
            locals[*slot as usize] = value.clone();
        }
        locals
    }

    fn execute(&self, function: &Function, locals: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut frame = Frame {
            ip: 0,
            locals,
            stack: Vec::with_capacity(function.max_stack as usize),
        };

        loop {
            let Some(instr) = function.code.get(frame.ip) else {
                return Err(internal("instruction pointer ran off the end"));
            };
            frame.ip += 1;

            match instr.op {
                Op::ConstInt => frame.stack.push(Value::Int(instr.imm)),
                Op::ConstFloat => frame
                    .stack
                    .push(Value::Float(f64::from_bits(instr.imm as u64))),
                Op::ConstStr => frame.stack.push(self.load_constant(instr.a)?),
                Op::ConstBool => frame.stack.push(Value::Bool(instr.a != 0)),
                Op::ConstVoid => frame.stack.push(Value::Void),
                Op::Const => frame.stack.push(self.load_constant(instr.a)?),

                Op::LoadLocal => {
                    let value = frame.locals[instr.a as usize].clone();
                    frame.stack.push(value);
                }
                Op::StoreLocal => {
                    let value = pop(&mut frame.stack)?;
                    frame.locals[instr.a as usize] = value;
                }

                Op::Pop => {
                    pop(&mut frame.stack)?;
                }
                Op::Dup => {
                    let top = peek(&frame.stack)?.clone();
                    frame.stack.push(top);
                }
                Op::Swap => {
                    let a = pop(&mut frame.stack)?;
                    let b = pop(&mut frame.stack)?;
                    frame.stack.push(a);
                    frame.stack.push(b);
                }

                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => {
                    let rhs = pop(&mut frame.stack)?;
                    let lhs = pop(&mut frame.stack)?;
                    frame.stack.push(arithmetic(instr.op, lhs, rhs)?);
                }
                Op::Neg => {
                    let value = pop(&mut frame.stack)?;
                    frame.stack.push(match value {
                        Value::Int(v) => Value::Int(v.wrapping_neg()),
                        Value::Float(v) => Value::Float(-v),
                        other => return Err(RuntimeError::bad_operand("negation", other.kind_name())),
                    });
                }
                Op::Not => {
                    let value = as_bool(pop(&mut frame.stack)?)?;
                    frame.stack.push(Value::Bool(!value));
                }

                Op::Eq | Op::Neq => {
                    let rhs = pop(&mut frame.stack)?;
                    let lhs = pop(&mut frame.stack)?;
                    let equal = values_equal(&lhs, &rhs);
                    frame
                        .stack
                        .push(Value::Bool(if instr.op == Op::Eq { equal } else { !equal }));
                }
                Op::Lt | Op::Lte | Op::Gt | Op::Gte => {
                    let rhs = pop(&mut frame.stack)?;
                    let lhs = pop(&mut frame.stack)?;
                    frame.stack.push(Value::Bool(compare(instr.op, lhs, rhs)?));
                }
                Op::And | Op::Or => {
                    let rhs = as_bool(pop(&mut frame.stack)?)?;
                    let lhs = as_bool(pop(&mut frame.stack)?)?;
                    frame.stack.push(Value::Bool(if instr.op == Op::And {
                        lhs && rhs
                    } else {
                        lhs || rhs
                    }));
                }

                Op::Jump => frame.ip = instr.a as usize,
                Op::JumpIfFalse => {
                    if !as_bool(pop(&mut frame.stack)?)? {
                        frame.ip = instr.a as usize;
                    }
                }
                Op::JumpIfTrue => {
                    if as_bool(pop(&mut frame.stack)?)? {
                        frame.ip = instr.a as usize;
                    }
                }
                Op::Return => return pop(&mut frame.stack),

                Op::Call => {
                    let args = pop_n(&mut frame.stack, instr.b as usize)?;
                    let result = self.call_function(FuncId(instr.a), args)?;
                    frame.stack.push(result);
                }
                Op::CallClosure => {
                    let args = pop_n(&mut frame.stack, instr.b as usize)?;
                    let callee = pop(&mut frame.stack)?;
                    let Value::Closure(closure) = callee else {
                        return Err(RuntimeError::bad_operand("call", callee.kind_name()));
                    };
                    let result = self.call_closure(&closure, args)?;
                    frame.stack.push(result);
                }
                Op::CallExtern => {
                    let args = pop_n(&mut frame.stack, instr.imm as usize)?;
                    let name = self.load_str(instr.a)?;
                    let return_type = self.registry.lookup(TypeId(instr.c));
                    let result = self.ffi.call(&name, &args, &return_type, instr.c)?;
                    frame.stack.push(result);
                }
                Op::CallModule => {
                    let args = pop_n(&mut frame.stack, instr.imm as usize)?;
                    let module = self.load_str(instr.a)?;
                    let name = self.load_str(instr.b)?;
                    let Some(id) = self.program.module_function(&module, &name) else {
                        return Err(internal(&format!(
                            "unknown module function {module}::{name}"
                        )));
                    };
                    let result = self.call_function(id, args)?;
                    frame.stack.push(result);
                }
                Op::CallMethod => {
                    let args = pop_n(&mut frame.stack, instr.b as usize)?;
                    let receiver = pop(&mut frame.stack)?;
                    let name = self.load_str(instr.a)?;
                    let result = self.call_method(receiver, &name, args)?;
                    frame.stack.push(result);
                }

                Op::MakeList => {
                    let items = pop_n(&mut frame.stack, instr.b as usize)?;
                    frame.stack.push(Value::list(instr.a, items));
                }
                Op::MakeMap => {
                    let flat = pop_n(&mut frame.stack, instr.b as usize * 2)?;
                    let mut entries = indexmap::IndexMap::new();
                    for pair in flat.chunks(2) {
                        let key = methods::value_to_key(&pair[0])?;
                        entries.insert(key, pair[1].clone());
                    }
                    frame.stack.push(Value::Map(MapRef {
                        type_id: instr.a,
                        entries: Arc::new(parking_lot::RwLock::new(entries)),
                    }));
                }
                Op::MakeStruct => {
                    let values = pop_n(&mut frame.stack, instr.b as usize)?;
                    let Some(entry) = self.program.types.get(TypeId(instr.a)) else {
                        return Err(internal("struct type missing from type table"));
                    };
                    let fields = entry
                        .fields
                        .iter()
                        .cloned()
                        .zip(values)
                        .collect::<indexmap::IndexMap<String, Value>>();
                    frame.stack.push(Value::Struct(StructRef {
                        type_id: instr.a,
                        fields: Arc::new(parking_lot::RwLock::new(fields)),
                    }));
                }
                Op::MakeEnum => {
                    let discriminant = match pop(&mut frame.stack)? {
                        Value::Int(v) => v,
                        other => {
                            return Err(RuntimeError::bad_operand("enum tag", other.kind_name()))
                        }
                    };
                    frame.stack.push(Value::Enum {
                        type_id: instr.a,
                        discriminant,
                    });
                }
                Op::MakeClosure => {
                    let captures = pop_n(&mut frame.stack, instr.b as usize)?;
                    frame.stack.push(Value::Closure(Arc::new(ClosureVal {
                        function: FuncId(instr.a),
                        type_id: instr.c,
                        captures,
                    })));
                }
                Op::MakeNone => frame.stack.push(Value::none(instr.a)),

                Op::ListLen => {
                    let list = as_list(pop(&mut frame.stack)?)?;
                    frame.stack.push(Value::Int(list.items.read().len() as i64));
                }
                Op::ListGet => {
                    let index = as_int(pop(&mut frame.stack)?)?;
                    let list = as_list(pop(&mut frame.stack)?)?;
                    let items = list.items.read();
                    let value = usize::try_from(index)
                        .ok()
                        .and_then(|i| items.get(i))
                        .cloned()
                        .ok_or(RuntimeError::IndexOutOfRange(index))?;
                    frame.stack.push(value);
                }
                Op::ListSet => {
                    let value = pop(&mut frame.stack)?;
                    let index = as_int(pop(&mut frame.stack)?)?;
                    let list = as_list(pop(&mut frame.stack)?)?;
                    let mut items = list.items.write();
                    let slot = usize::try_from(index)
                        .ok()
                        .and_then(|i| items.get_mut(i))
                        .ok_or(RuntimeError::IndexOutOfRange(index))?;
                    *slot = value;
                }
                Op::ListPush => {
                    let value = pop(&mut frame.stack)?;
                    let list = as_list(pop(&mut frame.stack)?)?;
                    list.items.write().push(value);
                }
                Op::ListPrepend => {
                    let value = pop(&mut frame.stack)?;
                    let list = as_list(pop(&mut frame.stack)?)?;
                    list.items.write().insert(0, value);
                }

                Op::MapKeys => {
                    let map = as_map(pop(&mut frame.stack)?)?;
                    let keys: Vec<Value> =
                        map.entries.read().keys().map(|k| k.to_value()).collect();
                    frame.stack.push(Value::list(instr.a, keys));
                }
                Op::MapSize => {
                    let map = as_map(pop(&mut frame.stack)?)?;
                    frame.stack.push(Value::Int(map.entries.read().len() as i64));
                }
                Op::MapGet => {
                    let key = pop(&mut frame.stack)?;
                    let map = as_map(pop(&mut frame.stack)?)?;
                    let key = methods::value_to_key(&key)?;
                    let result = match map.entries.read().get(&key) {
                        Some(value) => Value::some(crate::value::UNKNOWN_TYPE, value.clone()),
                        None => Value::none(crate::value::UNKNOWN_TYPE),
                    };
                    frame.stack.push(result);
                }
                Op::MapGetValue => {
                    let key = pop(&mut frame.stack)?;
                    let map = as_map(pop(&mut frame.stack)?)?;
                    let map_key = methods::value_to_key(&key)?;
                    let value = map
                        .entries
                        .read()
                        .get(&map_key)
                        .cloned()
                        .ok_or_else(|| RuntimeError::KeyNotFound(key.display()))?;
                    frame.stack.push(value);
                }
                Op::MapSet => {
                    let value = pop(&mut frame.stack)?;
                    let key = pop(&mut frame.stack)?;
                    let map = as_map(pop(&mut frame.stack)?)?;
                    map.entries
                        .write()
                        .insert(methods::value_to_key(&key)?, value);
                }
                Op::MapDrop => {
                    let key = pop(&mut frame.stack)?;
                    let map = as_map(pop(&mut frame.stack)?)?;
                    map.entries.write().shift_remove(&methods::value_to_key(&key)?);
                }
                Op::MapHas => {
                    let key = pop(&mut frame.stack)?;
                    let map = as_map(pop(&mut frame.stack)?)?;
                    let has = map.entries.read().contains_key(&methods::value_to_key(&key)?);
                    frame.stack.push(Value::Bool(has));
                }

                Op::StrMethod => {
                    let args = pop_n(&mut frame.stack, instr.b as usize)?;
                    let receiver = pop(&mut frame.stack)?;
                    let Value::Str(s) = receiver else {
                        return Err(RuntimeError::bad_operand("str method", receiver.kind_name()));
                    };
                    let kind = ardc_types::StrMethodKind::from_u32(instr.a)
                        .ok_or_else(|| internal("bad str method kind"))?;
                    let result = methods::str_method(kind, &s, &args, instr.imm as u32)?;
                    frame.stack.push(result);
                }
                Op::IntMethod => {
                    let receiver = as_int(pop(&mut frame.stack)?)?;
                    let kind = ardc_types::IntMethodKind::from_u32(instr.a)
                        .ok_or_else(|| internal("bad int method kind"))?;
                    frame.stack.push(methods::int_method(kind, receiver));
                }
                Op::FloatMethod => {
                    let receiver = match pop(&mut frame.stack)? {
                        Value::Float(v) => v,
                        other => {
                            return Err(RuntimeError::bad_operand("float method", other.kind_name()))
                        }
                    };
                    let kind = ardc_types::FloatMethodKind::from_u32(instr.a)
                        .ok_or_else(|| internal("bad float method kind"))?;
                    frame.stack.push(methods::float_method(kind, receiver));
                }
                Op::BoolMethod => {
                    let receiver = as_bool(pop(&mut frame.stack)?)?;
                    let kind = ardc_types::BoolMethodKind::from_u32(instr.a)
                        .ok_or_else(|| internal("bad bool method kind"))?;
                    frame.stack.push(methods::bool_method(kind, receiver));
                }
                Op::ListMethod => {
                    let args = pop_n(&mut frame.stack, instr.b as usize)?;
                    let list = as_list(pop(&mut frame.stack)?)?;
                    let kind = ardc_types::ListMethodKind::from_u32(instr.a)
                        .ok_or_else(|| internal("bad list method kind"))?;
                    let result = methods::list_method(kind, &list, &args, instr.imm as u32)?;
                    frame.stack.push(result);
                }
                Op::MapMethod => {
                    let args = pop_n(&mut frame.stack, instr.b as usize)?;
                    let map = as_map(pop(&mut frame.stack)?)?;
                    let kind = ardc_types::MapMethodKind::from_u32(instr.a)
                        .ok_or_else(|| internal("bad map method kind"))?;
                    let result = methods::map_method(kind, &map, &args, instr.imm as u32)?;
                    frame.stack.push(result);
                }
                Op::MaybeMethod => {
                    let args = pop_n(&mut frame.stack, instr.b as usize)?;
                    let receiver = pop(&mut frame.stack)?;
                    let kind = ardc_types::MaybeMethodKind::from_u32(instr.a)
                        .ok_or_else(|| internal("bad maybe method kind"))?;
                    let result = methods::maybe_method(kind, receiver, &args, instr.imm as u32)?;
                    frame.stack.push(result);
                }
                Op::ResultMethod => {
                    let args = pop_n(&mut frame.stack, instr.b as usize)?;
                    let receiver = pop(&mut frame.stack)?;
                    let kind = ardc_types::ResultMethodKind::from_u32(instr.a)
                        .ok_or_else(|| internal("bad result method kind"))?;
                    let result = methods::result_method(kind, receiver, &args, instr.imm as u32)?;
                    frame.stack.push(result);
                }

                Op::GetField => {
                    let receiver = pop(&mut frame.stack)?;
                    let Value::Struct(instance) = receiver else {
                        return Err(RuntimeError::bad_operand("field access", receiver.kind_name()));
                    };
                    let name = self.load_str(instr.a)?;
                    let value = instance
                        .fields
                        .read()
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| internal(&format!("missing field '{name}'")))?;
                    frame.stack.push(value);
                }
                Op::SetField => {
                    let value = pop(&mut frame.stack)?;
                    let receiver = pop(&mut frame.stack)?;
                    let Value::Struct(instance) = receiver else {
                        return Err(RuntimeError::bad_operand("field assign", receiver.kind_name()));
                    };
                    let name = self.load_str(instr.a)?;
                    instance.fields.write().insert(name, value);
                }
                Op::TypeName => {
                    let value = pop(&mut frame.stack)?;
                    frame
                        .stack
                        .push(Value::str(value.type_name(&self.program.types)));
                }

                Op::MatchBool
                | Op::MatchInt
                | Op::MatchEnum
                | Op::MatchUnion
                | Op::MatchMaybe
                | Op::MatchResult => {
                    return Err(internal("reserved match opcode executed"));
                }

                Op::MaybeUnwrap => {
                    let receiver = pop(&mut frame.stack)?;
                    match receiver {
                        Value::Maybe {
                            value: Some(inner), ..
                        } => frame.stack.push(*inner),
                        Value::Maybe { value: None, .. } => {
                            return Err(RuntimeError::BadCast("unwrapped a none".into()))
                        }
                        other => {
                            return Err(RuntimeError::bad_operand("maybe unwrap", other.kind_name()))
                        }
                    }
                }
                Op::ResultUnwrap => {
                    let receiver = pop(&mut frame.stack)?;
                    match receiver {
                        Value::Result {
                            is_ok: true, value, ..
                        } => frame.stack.push(*value),
                        Value::Result { is_ok: false, .. } => {
                            return Err(RuntimeError::BadCast("unwrapped an err".into()))
                        }
                        other => {
                            return Err(RuntimeError::bad_operand("result unwrap", other.kind_name()))
                        }
                    }
                }

                Op::TryResult => {
                    let receiver = pop(&mut frame.stack)?;
                    let Value::Result { is_ok, value, .. } = receiver.clone() else {
                        return Err(RuntimeError::bad_operand("try", receiver.kind_name()));
                    };
                    if is_ok {
                        frame.stack.push(*value);
                    } else if instr.a != NO_TARGET {
                        frame.locals[instr.b as usize] = *value;
                        frame.ip = instr.a as usize;
                    } else {
                        // propagate: the frame returns the err immediately
                        return Ok(receiver);
                    }
                }
                Op::TryMaybe => {
                    let receiver = pop(&mut frame.stack)?;
                    let Value::Maybe { value, .. } = receiver.clone() else {
                        return Err(RuntimeError::bad_operand("try", receiver.kind_name()));
                    };
                    match value {
                        Some(inner) => frame.stack.push(*inner),
                        None if instr.a != NO_TARGET => {
                            frame.locals[instr.b as usize] = Value::Void;
                            frame.ip = instr.a as usize;
                        }
                        None => return Ok(receiver),
                    }
                }
                Op::Panic => {
                    let message = pop(&mut frame.stack)?;
                    return Err(RuntimeError::Panic(message.display()));
                }

                Op::AsyncStart => {
                    let callee = pop(&mut frame.stack)?;
                    let Value::Closure(closure) = callee else {
                        return Err(RuntimeError::bad_operand("fiber start", callee.kind_name()));
                    };
                    frame.stack.push(Value::Fiber(fiber::spawn(self, closure)));
                }
                Op::AsyncEval => {
                    let fiber = pop(&mut frame.stack)?;
                    let Value::Fiber(handle) = fiber else {
                        return Err(RuntimeError::bad_operand("join", fiber.kind_name()));
                    };
                    frame.stack.push(handle.join()?);
                }
            }
        }
    }

    /// Method dispatch by the runtime kind of the receiver: built-in
    /// kinds route to native handlers, struct and enum receivers consult
    /// their type's method table.
    fn call_method(
        &self,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let type_id = match &receiver {
            Value::Struct(instance) => Some(instance.type_id),
            Value::Enum { type_id, .. } => Some(*type_id),
            _ => None,
        };
        match type_id {
            Some(type_id) => {
                let method = self
                    .program
                    .types
                    .get(TypeId(type_id))
                    .and_then(|entry| entry.methods.get(name))
                    .copied();
                match method {
                    Some(id) => {
                        let mut call_args = Vec::with_capacity(args.len() + 1);
                        call_args.push(receiver);
                        call_args.extend(args);
                        self.call_function(id, call_args)
                    }
                    None => Err(RuntimeError::NoSuchMethod {
                        method: name.to_string(),
                        receiver: receiver.type_name(&self.program.types),
                    }),
                }
            }
            None => methods::dispatch_by_name(name, receiver, &args),
        }
    }

    fn load_constant(&self, id: u32) -> Result<Value, RuntimeError> {
        match self.program.constant(id) {
            Some(Constant::Int(v)) => Ok(Value::Int(*v)),
            Some(Constant::Float(v)) => Ok(Value::Float(*v)),
            Some(Constant::Str(s)) => Ok(Value::str(s)),
            Some(Constant::Bool(b)) => Ok(Value::Bool(*b)),
            Some(Constant::Void) => Ok(Value::Void),
            None => Err(internal("constant index out of range")),
        }
    }

    fn load_str(&self, id: u32) -> Result<String, RuntimeError> {
        self.program
            .str_constant(id)
            .map(str::to_string)
            .ok_or_else(|| internal("string constant index out of range"))
    }
}

fn internal(message: &str) -> RuntimeError {
    RuntimeError::Panic(format!("internal error: {message}"))
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, RuntimeError> {
    stack
        .pop()
        .ok_or_else(|| internal("operand stack underflow"))
}

fn peek(stack: &[Value]) -> Result<&Value, RuntimeError> {
    stack
        .last()
        .ok_or_else(|| internal("operand stack underflow"))
}

/// Pop `count` values, restoring push order.
fn pop_n(stack: &mut Vec<Value>, count: usize) -> Result<Vec<Value>, RuntimeError> {
    if stack.len() < count {
        return Err(internal("operand stack underflow"));
    }
    Ok(stack.split_off(stack.len() - count))
}

fn as_bool(value: Value) -> Result<bool, RuntimeError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(RuntimeError::bad_operand("condition", other.kind_name())),
    }
}

fn as_int(value: Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(v) => Ok(v),
        other => Err(RuntimeError::bad_operand("int operand", other.kind_name())),
    }
}

fn as_list(value: Value) -> Result<ListRef, RuntimeError> {
    match value {
        Value::List(list) => Ok(list),
        other => Err(RuntimeError::bad_operand("list operand", other.kind_name())),
    }
}

fn as_map(value: Value) -> Result<MapRef, RuntimeError> {
    match value {
        Value::Map(map) => Ok(map),
        other => Err(RuntimeError::bad_operand("map operand", other.kind_name())),
    }
}

/// Integer arithmetic wraps on overflow; integer division and modulo by
/// zero are runtime panics; `Add` concatenates strings.
fn arithmetic(op: Op, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match (op, lhs, rhs) {
        (Op::Add, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(b))),
        (Op::Sub, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(b))),
        (Op::Mul, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(b))),
        (Op::Div, Value::Int(_), Value::Int(0)) => Err(RuntimeError::DivisionByZero),
        (Op::Div, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_div(b))),
        (Op::Mod, Value::Int(_), Value::Int(0)) => Err(RuntimeError::DivisionByZero),
        (Op::Mod, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_rem(b))),
        (Op::Add, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Op::Sub, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
        (Op::Mul, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
        (Op::Div, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
        (Op::Mod, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a % b)),
        (Op::Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
        (_, lhs, rhs) => Err(RuntimeError::BadCast(format!(
            "arithmetic on {} and {}",
            lhs.kind_name(),
            rhs.kind_name()
        ))),
    }
}

fn compare(op: Op, lhs: Value, rhs: Value) -> Result<bool, RuntimeError> {
    let ordering = match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => {
            return Err(RuntimeError::BadCast(format!(
                "comparison of {} and {}",
                lhs.kind_name(),
                rhs.kind_name()
            )))
        }
    };
    // NaN comparisons are false on every operator
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        Op::Lt => ordering.is_lt(),
        Op::Lte => ordering.is_le(),
        Op::Gt => ordering.is_gt(),
        Op::Gte => ordering.is_ge(),
        _ => unreachable!("compare called with a non-comparison opcode"),
    })
}

/// Equality as the `Eq` opcode sees it. Match chains compare enum values
/// against their integer discriminants directly.
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Enum { discriminant, .. }, Value::Int(v))
        | (Value::Int(v), Value::Enum { discriminant, .. }) => discriminant == v,
        _ => lhs == rhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ardc_code::{Instruction, TypeEntry, TypeTable};
    use ardc_util::{IndexVec, Symbol};

    fn run_entry(code: Vec<Instruction>, locals: u32, max_stack: u32) -> Result<Value, RuntimeError> {
        let mut functions = IndexVec::new();
        let entry = functions.push(Function {
            name: Symbol::intern("<entry>"),
            arity: 0,
            locals,
            max_stack,
            captures: vec![],
            code,
        });
        let mut constants = IndexVec::new();
        constants.push(Constant::Str("boom".to_string()));
        let program = Program {
            constants,
            types: TypeTable::new(vec![TypeEntry::default()]),
            functions,
            entry,
            module_functions: Default::default(),
        };
        let vm = Vm::new(
            Arc::new(program),
            Arc::new(TypeRegistry::new()),
            Arc::new(FfiRegistry::new()),
        );
        vm.run()
    }

    #[test]
    fn test_arithmetic_wraps() {
        let result = run_entry(
            vec![
                Instruction::new(Op::ConstInt).imm(i64::MAX),
                Instruction::new(Op::ConstInt).imm(1),
                Instruction::new(Op::Add),
                Instruction::new(Op::Return),
            ],
            0,
            2,
        )
        .unwrap();
        assert_eq!(result, Value::Int(i64::MIN));
    }

    #[test]
    fn test_division_by_zero_panics() {
        let err = run_entry(
            vec![
                Instruction::new(Op::ConstInt).imm(1),
                Instruction::new(Op::ConstInt).imm(0),
                Instruction::new(Op::Div),
                Instruction::new(Op::Return),
            ],
            0,
            2,
        )
        .unwrap_err();
        assert_eq!(err, RuntimeError::DivisionByZero);
    }

    #[test]
    fn test_locals_roundtrip() {
        let result = run_entry(
            vec![
                Instruction::new(Op::ConstInt).imm(11),
                Instruction::new(Op::StoreLocal).a(0),
                Instruction::new(Op::LoadLocal).a(0),
                Instruction::new(Op::Return),
            ],
            1,
            1,
        )
        .unwrap();
        assert_eq!(result, Value::Int(11));
    }

    #[test]
    fn test_jump_if_false() {
        let result = run_entry(
            vec![
                Instruction::new(Op::ConstBool).a(0),
                Instruction::new(Op::JumpIfFalse).a(4),
                Instruction::new(Op::ConstInt).imm(1),
                Instruction::new(Op::Return),
                Instruction::new(Op::ConstInt).imm(2),
                Instruction::new(Op::Return),
            ],
            0,
            1,
        )
        .unwrap();
        assert_eq!(result, Value::Int(2));
    }

    #[test]
    fn test_panic_surfaces_message() {
        let err = run_entry(
            vec![
                Instruction::new(Op::ConstStr).a(0),
                Instruction::new(Op::Panic),
            ],
            0,
            1,
        )
        .unwrap_err();
        assert_eq!(err, RuntimeError::Panic("boom".to_string()));
    }

    #[test]
    fn test_try_result_propagates_err() {
        // push err("boom"); try with no catch must return the err itself
        let result = run_entry(
            vec![
                Instruction::new(Op::ConstStr).a(0),
                Instruction::new(Op::ResultMethod)
                    .a(ardc_types::ResultMethodKind::MakeErr.as_u32())
                    .b(0),
                Instruction::new(Op::TryResult).a(NO_TARGET),
                // unreachable on the err path
                Instruction::new(Op::Return),
            ],
            0,
            1,
        )
        .unwrap();
        match result {
            Value::Result { is_ok, value, .. } => {
                assert!(!is_ok);
                assert_eq!(*value, Value::str("boom"));
            }
            other => panic!("expected an err result, got {other:?}"),
        }
    }

    #[test]
    fn test_enum_eq_int_bridges_discriminant() {
        assert!(values_equal(
            &Value::Enum {
                type_id: 1,
                discriminant: 3
            },
            &Value::Int(3)
        ));
        assert!(!values_equal(
            &Value::Enum {
                type_id: 1,
                discriminant: 3
            },
            &Value::Int(4)
        ));
    }
}
