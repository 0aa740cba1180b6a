//! Pre-execution verification.
//!
//! One pass over each function before anything runs: every operand index
//! must be in range, every jump target must land inside the instruction
//! stream, the simulated operand-stack depth must stay within the
//! declared `max_stack` and never underflow, and every `Return` must see
//! exactly one value. Functions verify independently, so the pass runs in
//! parallel across the function table.

use rayon::prelude::*;
use thiserror::Error;

use ardc_types::TypeId;

use crate::instr::{Instruction, Op, NO_TARGET};
use crate::program::{Function, Program};

/// A structural defect found before execution. Any single error aborts
/// the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("function '{function}' at {offset}: {what} index {index} out of range")]
    BadIndex {
        function: String,
        offset: usize,
        what: &'static str,
        index: u32,
    },
    #[error("function '{function}' at {offset}: operand stack underflow")]
    StackUnderflow { function: String, offset: usize },
    #[error("function '{function}' at {offset}: stack depth {depth} exceeds declared max {max}")]
    StackOverflow {
        function: String,
        offset: usize,
        depth: u32,
        max: u32,
    },
    #[error("function '{function}' at {offset}: Return with {depth} values on the stack")]
    UnbalancedReturn {
        function: String,
        offset: usize,
        depth: u32,
    },
    #[error("function '{function}': inconsistent stack depth at jump target {offset}")]
    InconsistentDepth { function: String, offset: usize },
    #[error("function '{function}' does not end in Return or Panic")]
    UnterminatedFunction { function: String },
}

/// Verify every function of a program. Runs before the VM ever executes
/// an instruction; failure aborts execution.
pub fn verify_program(program: &Program) -> Result<(), VerifyError> {
    program
        .functions
        .raw()
        .par_iter()
        .try_for_each(|function| verify_function(program, function))
}

fn verify_function(program: &Program, function: &Function) -> Result<(), VerifyError> {
    let name = function.name.as_str().to_string();
    let code = &function.code;

    if code.is_empty()
        || !matches!(
            code.last().map(|i| i.op),
            Some(Op::Return) | Some(Op::Panic) | Some(Op::Jump)
        )
    {
        return Err(VerifyError::UnterminatedFunction { function: name });
    }

    for slot in &function.captures {
        if *slot >= function.locals {
            return Err(VerifyError::BadIndex {
                function: name,
                offset: 0,
                what: "capture local",
                index: *slot,
            });
        }
    }

    for (offset, instr) in code.iter().enumerate() {
        check_operands(program, function, &name, offset, instr)?;
    }

    simulate_stack(function, &name)
}

fn check_operands(
    program: &Program,
    function: &Function,
    name: &str,
    offset: usize,
    instr: &Instruction,
) -> Result<(), VerifyError> {
    let bad = |what: &'static str, index: u32| VerifyError::BadIndex {
        function: name.to_string(),
        offset,
        what,
        index,
    };

    let check_const = |index: u32| {
        if program.constant(index).is_none() {
            Err(bad("constant", index))
        } else {
            Ok(())
        }
    };
    let check_fn = |index: u32| {
        if program.function(index).is_none() {
            Err(bad("function", index))
        } else {
            Ok(())
        }
    };
    let check_type = |index: u32| {
        if program.types.get(TypeId(index)).is_none() {
            Err(bad("type", index))
        } else {
            Ok(())
        }
    };
    let check_local = |index: u32| {
        if index >= function.locals {
            Err(bad("local", index))
        } else {
            Ok(())
        }
    };
    let check_jump = |target: u32| {
        if target as usize >= function.code.len() {
            Err(bad("jump target", target))
        } else {
            Ok(())
        }
    };

    match instr.op {
        Op::Const | Op::ConstStr => check_const(instr.a),
        Op::LoadLocal | Op::StoreLocal => check_local(instr.a),
        Op::Jump | Op::JumpIfFalse | Op::JumpIfTrue => check_jump(instr.a),
        Op::Call => check_fn(instr.a),
        Op::CallExtern => {
            check_const(instr.a)?;
            check_type(instr.c)
        }
        Op::CallModule => {
            check_const(instr.a)?;
            check_const(instr.b)?;
            check_type(instr.c)
        }
        Op::CallMethod | Op::GetField | Op::SetField => check_const(instr.a),
        Op::MakeList | Op::MakeMap | Op::MakeStruct | Op::MakeEnum | Op::MakeNone => {
            check_type(instr.a)
        }
        Op::MakeClosure => {
            check_fn(instr.a)?;
            check_type(instr.c)
        }
        Op::MaybeUnwrap | Op::ResultUnwrap => check_type(instr.a),
        Op::TryResult | Op::TryMaybe => {
            if instr.a != NO_TARGET {
                check_jump(instr.a)?;
                check_local(instr.b)?;
            }
            check_type(instr.c)
        }
        Op::AsyncStart | Op::AsyncEval => check_type(instr.c),
        _ => Ok(()),
    }
}

/// Worklist simulation of stack depths. Depths must agree wherever
/// control paths meet.
fn simulate_stack(function: &Function, name: &str) -> Result<(), VerifyError> {
    let code = &function.code;
    let mut depths: Vec<Option<u32>> = vec![None; code.len()];
    let mut worklist = vec![(0usize, 0u32)];

    while let Some((offset, depth)) = worklist.pop() {
        match depths[offset] {
            Some(known) if known == depth => continue,
            Some(_) => {
                return Err(VerifyError::InconsistentDepth {
                    function: name.to_string(),
                    offset,
                })
            }
            None => depths[offset] = Some(depth),
        }

        let instr = &code[offset];
        let (pops, pushes) = instr.stack_effect();
        if depth < pops {
            return Err(VerifyError::StackUnderflow {
                function: name.to_string(),
                offset,
            });
        }
        let after = depth - pops + pushes;
        if after > function.max_stack {
            return Err(VerifyError::StackOverflow {
                function: name.to_string(),
                offset,
                depth: after,
                max: function.max_stack,
            });
        }

        match instr.op {
            Op::Return => {
                if depth != 1 {
                    return Err(VerifyError::UnbalancedReturn {
                        function: name.to_string(),
                        offset,
                        depth,
                    });
                }
            }
            Op::Panic => {}
            Op::Jump => worklist.push((instr.a as usize, after)),
            Op::JumpIfFalse | Op::JumpIfTrue => {
                worklist.push((instr.a as usize, after));
                worklist.push((offset + 1, after));
            }
            Op::TryResult | Op::TryMaybe => {
                // catch path consumes the failure into a local
                if instr.a != NO_TARGET {
                    worklist.push((instr.a as usize, depth - 1));
                }
                worklist.push((offset + 1, after));
            }
            _ => worklist.push((offset + 1, after)),
        }
    }

    Ok(())
}
