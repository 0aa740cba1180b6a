//! The foreign-function registry.
//!
//! A process-wide table mapping binding-name strings to host functions.
//! The write surface is only the registration path; lookups are
//! concurrent reads from every fiber, so the table sits behind a
//! reader/writer lock.
//!
//! Host panics are recovered at the call boundary: when the declared
//! return type is a `Result`, the panic becomes
//! `Result::err("panic in FFI function '<name>': <msg>")`; otherwise it
//! propagates as a runtime error and aborts execution.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use ardc_types::Type;
use ardc_util::FxHashMap;
use parking_lot::RwLock;

use crate::error::RuntimeError;
use crate::value::Value;

/// A host function: `(args, declared return type) -> value`.
pub type HostFn = Arc<dyn Fn(&[Value], &Type) -> Result<Value, RuntimeError> + Send + Sync>;

/// Registry of FFI bindings, shared by every fiber of a program.
#[derive(Default)]
pub struct FfiRegistry {
    bindings: RwLock<FxHashMap<String, HostFn>>,
}

impl FfiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host function under a binding name. Re-registration
    /// replaces the previous binding.
    pub fn register<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value], &Type) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        self.bindings.write().insert(name.into(), Arc::new(f));
    }

    pub fn lookup(&self, name: &str) -> Option<HostFn> {
        self.bindings.read().get(name).cloned()
    }

    /// Invoke a binding, recovering host panics at the boundary.
    pub fn call(
        &self,
        name: &str,
        args: &[Value],
        return_type: &Type,
        return_type_id: u32,
    ) -> Result<Value, RuntimeError> {
        let Some(host_fn) = self.lookup(name) else {
            return Err(RuntimeError::UnknownBinding(name.to_string()));
        };
        match catch_unwind(AssertUnwindSafe(|| host_fn(args, return_type))) {
            Ok(result) => result,
            Err(payload) => {
                let error = RuntimeError::FfiPanic {
                    name: name.to_string(),
                    message: panic_message(payload),
                };
                if matches!(return_type, Type::Result { .. }) {
                    Ok(Value::err(return_type_id, Value::str(error.to_string())))
                } else {
                    Err(error)
                }
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    }
}
