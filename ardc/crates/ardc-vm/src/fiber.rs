//! Fibers.
//!
//! A fiber is a VM execution of a nominated closure on its own host
//! thread, with a fresh frame stack and no shared VM state. The handle
//! carries a completion signal; joining blocks until the fiber finishes
//! and re-raises its error on the joiner. There is no cancellation: a
//! fiber runs to completion or panic.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;

use crate::error::RuntimeError;
use crate::value::{ClosureVal, Value};
use crate::vm::Vm;

/// Handle to a running or finished fiber.
pub struct FiberHandle {
    state: Mutex<FiberState>,
}

enum FiberState {
    Running(Receiver<Result<Value, RuntimeError>>),
    Done(Result<Value, RuntimeError>),
}

impl FiberHandle {
    /// Block until the fiber completes. Joining again returns the cached
    /// result; a panicked fiber propagates its error to every joiner.
    pub fn join(&self) -> Result<Value, RuntimeError> {
        let mut state = self.state.lock();
        if let FiberState::Running(receiver) = &*state {
            let result = receiver.recv().unwrap_or_else(|_| {
                Err(RuntimeError::Panic("fiber terminated abnormally".into()))
            });
            *state = FiberState::Done(result);
        }
        match &*state {
            FiberState::Done(result) => result.clone(),
            FiberState::Running(_) => unreachable!("fiber state settled above"),
        }
    }
}

/// Start a closure on a new, isolated VM state scheduled on a host
/// thread. Captured values were snapshot at closure creation; heap values
/// travel as shared references.
pub fn spawn(vm: &Vm, closure: Arc<ClosureVal>) -> Arc<FiberHandle> {
    let (sender, receiver) = bounded(1);
    let child = vm.isolated();
    thread::spawn(move || {
        let result = child.call_closure(&closure, vec![]);
        // the receiver may be gone when nobody joins; that is fine
        let _ = sender.send(result);
    });
    Arc::new(FiberHandle {
        state: Mutex::new(FiberState::Running(receiver)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn done_handle(result: Result<Value, RuntimeError>) -> FiberHandle {
        FiberHandle {
            state: Mutex::new(FiberState::Done(result)),
        }
    }

    #[test]
    fn test_join_returns_cached_result() {
        let handle = done_handle(Ok(Value::Int(7)));
        assert_eq!(handle.join().unwrap(), Value::Int(7));
        assert_eq!(handle.join().unwrap(), Value::Int(7));
    }

    #[test]
    fn test_join_propagates_panic() {
        let handle = done_handle(Err(RuntimeError::Panic("worker failed".into())));
        let err = handle.join().unwrap_err();
        assert_eq!(err, RuntimeError::Panic("worker failed".into()));
    }

    #[test]
    fn test_join_blocks_for_running_fiber() {
        let (sender, receiver) = bounded(1);
        let handle = FiberHandle {
            state: Mutex::new(FiberState::Running(receiver)),
        };
        let worker = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            sender.send(Ok(Value::Int(42))).unwrap();
        });
        assert_eq!(handle.join().unwrap(), Value::Int(42));
        worker.join().unwrap();
    }

    #[test]
    fn test_dropped_sender_is_abnormal_termination() {
        let (sender, receiver) = bounded::<Result<Value, RuntimeError>>(1);
        drop(sender);
        let handle = FiberHandle {
            state: Mutex::new(FiberState::Running(receiver)),
        };
        assert!(matches!(handle.join(), Err(RuntimeError::Panic(_))));
    }
}
