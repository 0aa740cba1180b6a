//! ardc-vm - The Ard Virtual Machine
//!
//! Executes verified program images. Stack-based, frame-per-call, with
//! cooperative fibers on host threads; method dispatch on built-in kinds
//! and user structs; `Maybe`/`Result` unwrapping; `try` propagation; and
//! calls into the process-wide FFI registry.
//!
//! The VM trusts the verifier: operand indices, jump targets, and stack
//! discipline were checked before execution, so violations here are
//! internal errors rather than recoverable conditions. What remains
//! checked at runtime is genuinely dynamic: division by zero, absent
//! map keys, `expect` on empty values, and the shapes of FFI-provided
//! values.

mod error;
mod ffi;
mod fiber;
mod methods;
mod value;
mod vm;

pub use error::RuntimeError;
pub use ffi::{FfiRegistry, HostFn};
pub use fiber::FiberHandle;
pub use value::{ClosureVal, ListRef, MapKey, MapRef, StructRef, Value, UNKNOWN_TYPE};
pub use vm::Vm;
