//! Instruction encoding.
//!
//! Instructions are fixed-width records: an opcode plus up to four operand
//! slots (`a`, `b`, `c`, `imm`). Operand meaning is attached to the
//! opcode; unused slots are zero. `u32::MAX` in a jump-target slot means
//! "absent" (a `try` without a catch block).

use static_assertions::const_assert_eq;

/// Sentinel for an absent jump target.
pub const NO_TARGET: u32 = u32::MAX;

/// The opcode set.
///
/// The `Match*` opcodes are reserved: matches are emitted as families of
/// compares and jumps, and a later pass may collapse dense integer or
/// enum matches into jump tables using them.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    // Constants
    /// Push the integer in `imm`
    ConstInt,
    /// Push the float whose bits are in `imm`
    ConstFloat,
    /// Push the string constant `a`
    ConstStr,
    /// Push the boolean in `a` (0 or 1)
    ConstBool,
    /// Push void
    ConstVoid,
    /// Push constant-pool entry `a`
    Const,

    // Locals
    /// Push local slot `a`
    LoadLocal,
    /// Pop into local slot `a`
    StoreLocal,

    // Stack
    Pop,
    Dup,
    Swap,

    // Arithmetic (polymorphic over int/float; Add also concatenates str)
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Not,

    // Comparison / logic
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,

    // Control flow; `a` is the target instruction index
    Jump,
    JumpIfFalse,
    JumpIfTrue,
    Return,

    // Calls
    /// Call function `a` with `b` arguments
    Call,
    /// Pop `b` arguments then a closure; call it
    CallClosure,
    /// Call FFI binding named by string constant `a`, `imm` arguments,
    /// declared return type `c`
    CallExtern,
    /// Call function `b` (name constant) of module `a` (path constant),
    /// `imm` arguments, return type `c`
    CallModule,
    /// Dispatch method named by constant `a` on the receiver under `b`
    /// arguments
    CallMethod,

    // Constructors
    /// Pop `b` elements into a list of type `a`
    MakeList,
    /// Pop `b` key-value pairs into a map of type `a`
    MakeMap,
    /// Pop `b` field values (sorted field order) into a struct of type `a`
    MakeStruct,
    /// Pop a discriminant into an enum value of type `a`
    MakeEnum,
    /// Pop `b` captured values into a closure over function `a`, type `c`
    MakeClosure,
    /// Push the `none` of maybe type `a`
    MakeNone,

    // Containers (loop desugaring and direct method mappings)
    ListLen,
    /// Pop index, list; push element; panics out of range
    ListGet,
    ListSet,
    ListPush,
    ListPrepend,
    /// Pop a map; push a snapshot list of its keys in insertion order
    MapKeys,
    MapSize,
    /// Pop key, map; push `some(value)` or `none`
    MapGet,
    /// Pop key, map; push the value; panics when absent
    MapGetValue,
    MapSet,
    MapDrop,
    MapHas,

    // Built-in kind methods: `a` = kind, `b` = argc, `imm` = result type
    StrMethod,
    IntMethod,
    FloatMethod,
    BoolMethod,
    ListMethod,
    MapMethod,
    MaybeMethod,
    ResultMethod,

    // Access
    /// Pop a struct; push the field named by constant `a`
    GetField,
    /// Pop value, struct; set the field named by constant `a`
    SetField,
    /// Pop a value; push its runtime type-name string
    TypeName,

    // Reserved direct-match opcodes
    MatchBool,
    MatchInt,
    MatchEnum,
    MatchUnion,
    MatchMaybe,
    MatchResult,

    // Error flow
    /// Pop a maybe; push the payload; panics on none
    MaybeUnwrap,
    /// Pop a result; push the ok payload; panics on err
    ResultUnwrap,
    /// Inspect a result on top of stack: unwrap ok and continue, or
    /// propagate err (jump to catch `a` with payload in local `b`, or
    /// return the err when `a` is NO_TARGET); `imm` = ok type, `c` = err
    /// type
    TryResult,
    /// The maybe analogue of `TryResult`
    TryMaybe,
    /// Pop a message string and abort the fiber
    Panic,

    // Async
    /// Pop a zero-parameter closure; start it on a new fiber of type `c`
    AsyncStart,
    /// Pop a fiber handle; block until it completes; push its result
    AsyncEval,
}

/// A fixed-width instruction record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    pub op: Op,
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub imm: i64,
}

const_assert_eq!(std::mem::size_of::<Instruction>(), 24);

impl Instruction {
    pub fn new(op: Op) -> Self {
        Self {
            op,
            a: 0,
            b: 0,
            c: 0,
            imm: 0,
        }
    }

    pub fn a(mut self, a: u32) -> Self {
        self.a = a;
        self
    }

    pub fn b(mut self, b: u32) -> Self {
        self.b = b;
        self
    }

    pub fn c(mut self, c: u32) -> Self {
        self.c = c;
        self
    }

    pub fn imm(mut self, imm: i64) -> Self {
        self.imm = imm;
        self
    }

    /// `(pops, pushes)` on the fall-through path. Shared by the emitter's
    /// depth tracking and the verifier's simulation.
    pub fn stack_effect(&self) -> (u32, u32) {
        match self.op {
            Op::ConstInt
            | Op::ConstFloat
            | Op::ConstStr
            | Op::ConstBool
            | Op::ConstVoid
            | Op::Const
            | Op::LoadLocal
            | Op::MakeNone => (0, 1),
            Op::StoreLocal | Op::Pop => (1, 0),
            Op::Dup => (1, 2),
            Op::Swap => (2, 2),
            Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Mod
            | Op::Eq
            | Op::Neq
            | Op::Lt
            | Op::Lte
            | Op::Gt
            | Op::Gte
            | Op::And
            | Op::Or => (2, 1),
            Op::Neg | Op::Not => (1, 1),
            Op::Jump => (0, 0),
            Op::JumpIfFalse | Op::JumpIfTrue => (1, 0),
            Op::Return => (1, 0),
            Op::Call => (self.b, 1),
            Op::CallClosure => (self.b + 1, 1),
            Op::CallExtern | Op::CallModule => (self.imm as u32, 1),
            Op::CallMethod => (self.b + 1, 1),
            Op::MakeList | Op::MakeStruct => (self.b, 1),
            Op::MakeMap => (self.b * 2, 1),
            Op::MakeEnum => (1, 1),
            Op::MakeClosure => (self.b, 1),
            Op::ListLen | Op::MapKeys | Op::MapSize => (1, 1),
            Op::ListGet | Op::MapGet | Op::MapGetValue | Op::MapHas => (2, 1),
            Op::ListSet | Op::MapSet => (3, 0),
            Op::ListPush | Op::ListPrepend | Op::MapDrop => (2, 0),
            Op::StrMethod
            | Op::ListMethod
            | Op::MapMethod
            | Op::MaybeMethod
            | Op::ResultMethod => (self.b + 1, 1),
            Op::IntMethod | Op::FloatMethod | Op::BoolMethod => (1, 1),
            Op::GetField | Op::TypeName => (1, 1),
            Op::SetField => (2, 0),
            Op::MatchBool
            | Op::MatchInt
            | Op::MatchEnum
            | Op::MatchUnion
            | Op::MatchMaybe
            | Op::MatchResult => (1, 1),
            Op::MaybeUnwrap | Op::ResultUnwrap => (1, 1),
            // ok path: the result is replaced by its payload
            Op::TryResult | Op::TryMaybe => (1, 1),
            Op::Panic => (1, 0),
            Op::AsyncStart | Op::AsyncEval => (1, 1),
        }
    }

    /// Whether execution never falls through to the next instruction.
    pub fn is_terminal(&self) -> bool {
        matches!(self.op, Op::Jump | Op::Return | Op::Panic)
    }
}
