//! Runtime errors.
//!
//! A runtime error unwinds every frame of the fiber it occurred on and
//! surfaces to the caller of `run`. Joining a failed fiber re-raises the
//! error on the joining fiber.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// Explicit `panic(message)`
    #[error("{0}")]
    Panic(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("map key not found: {0}")]
    KeyNotFound(String),
    /// `expect` on a `none` or an `err`; carries the caller's message
    #[error("{0}")]
    ExpectFailed(String),
    #[error("invalid cast: {0}")]
    BadCast(String),
    #[error("list index {0} out of range")]
    IndexOutOfRange(i64),
    #[error("no method '{method}' on {receiver}")]
    NoSuchMethod { method: String, receiver: String },
    #[error("unknown FFI binding '{0}'")]
    UnknownBinding(String),
    #[error("panic in FFI function '{name}': {message}")]
    FfiPanic { name: String, message: String },
}

impl RuntimeError {
    /// Type confusion that verified programs cannot produce; reachable
    /// only through FFI values of unexpected shape.
    pub fn bad_operand(op: &str, found: &str) -> Self {
        RuntimeError::BadCast(format!("{op} applied to {found}"))
    }
}
