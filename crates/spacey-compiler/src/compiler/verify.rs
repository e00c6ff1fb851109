// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Static stack depth analysis.
//!
//! Simulates each opcode's declared stack effect along every control path of
//! a chunk and checks that paths meeting at an instruction agree on the
//! depth there. A well-formed chunk reaches its `Ret` with exactly one value
//! on the stack.

use thiserror::Error;

use crate::compiler::bytecode::{Address, Bytecode, Instruction, OpCode, Operand};

/// How an instruction moves the stack and the program counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEffect {
    /// Continues to the next instruction
    Next(i32),
    /// May jump; the depth change differs per outcome
    Branch {
        /// Effect when falling through
        fallthrough: i32,
        /// Effect when the jump is taken
        taken: i32,
    },
    /// Always jumps, stack unchanged
    Goto,
    /// Returns from the chunk, popping the result
    Return,
    /// Throws, popping `pops` values first
    Throw {
        /// Values consumed before throwing
        pops: i32,
    },
}

/// Declared stack effect of an instruction.
pub fn stack_effect(instruction: &Instruction) -> StackEffect {
    use OpCode::*;
    use StackEffect::Next;

    match instruction.opcode {
        Bool | Int | Double | Str | RegExp | Null | Undefined | This | Ident | TypeOfIdent
        | DeleteIdent | NewObject | Func | Tree => Next(1),

        Add | Sub | Mul | Div | Mod | Eq | StrictEq | Ne | StrictNe | Lt | Le | Gt | Ge
        | BitAnd | BitOr | BitXor | Shl | Shr | Ushr | In | InstanceOf | Index | Delete => {
            Next(-1)
        }

        Not | Minus | ToNumber | BitNot | Void | TypeOf | Member => Next(0),

        IdentRef => Next(2),
        PropRef | RefValue => Next(1),
        MemberRef => Next(0),
        Assign => Next(-2),
        PreInc | PostInc | TypeOfRef => Next(-1),

        ObjProp | Pop | VarSet | PushScope => Next(-1),
        PopScope | PopExcept => Next(0),
        EndFinally => Next(-2),

        NewArray => Next(1 - count(&instruction.arg1)),
        New => Next(-count(&instruction.arg1)),
        Call => Next(-(count(&instruction.arg1) + 1) + count(&instruction.arg2)),
        CallMember => Next(-(count(&instruction.arg1) + 2) + count(&instruction.arg2)),

        Jmp => StackEffect::Goto,
        JmpZ => StackEffect::Branch {
            fallthrough: -1,
            taken: -1,
        },
        CndZ | CndNz => StackEffect::Branch {
            fallthrough: -1,
            taken: 0,
        },
        Case => StackEffect::Branch {
            fallthrough: -1,
            taken: -2,
        },
        ForIn => StackEffect::Branch {
            fallthrough: -1,
            taken: -4,
        },
        // Without a catch binding the handler is entered with the pending
        // completion state and the completion value on the stack
        PushExcept => match instruction.arg2 {
            Operand::None => StackEffect::Branch {
                fallthrough: 2,
                taken: 3,
            },
            _ => StackEffect::Branch {
                fallthrough: 0,
                taken: 0,
            },
        },

        Ret => StackEffect::Return,
        Throw => StackEffect::Throw { pops: 1 },
        ThrowRef | ThrowType => StackEffect::Throw { pops: 0 },
    }
}

fn count(operand: &Operand) -> i32 {
    match *operand {
        Operand::Int(value) => value,
        Operand::Uint(value) => i32::try_from(value).unwrap_or(i32::MAX),
        _ => 0,
    }
}

/// Result of a successful analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackReport {
    /// Deepest stack reached on any path
    pub max_depth: u32,
    /// Depth just before `Ret`, if a `Ret` is reachable
    pub return_depth: Option<u32>,
    /// Number of reachable instructions
    pub reachable: usize,
}

/// Inconsistencies found by the analysis.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    /// Control ran past the end of the stream
    #[error("control leaves the stream at offset {offset}")]
    OutOfRange {
        /// Offending offset
        offset: u32,
    },

    /// An instruction pops more than the stack holds
    #[error("stack underflow at offset {offset}")]
    Underflow {
        /// Offending offset
        offset: u32,
    },

    /// Two paths reach an instruction with different depths
    #[error("paths reach offset {offset} with depths {first} and {second}")]
    Inconsistent {
        /// Offending offset
        offset: u32,
        /// Depth seen first
        first: u32,
        /// Depth seen later
        second: u32,
    },

    /// A jump still names a symbolic label
    #[error("unresolved label at offset {offset}")]
    UnresolvedLabel {
        /// Offending offset
        offset: u32,
    },
}

/// Walks every path from `entry` and reports stack depths.
pub fn analyze(code: &Bytecode, entry: u32) -> Result<StackReport, VerifyError> {
    let instructions = code.instructions();
    let mut depths: Vec<Option<u32>> = vec![None; instructions.len()];
    let mut pending = vec![(entry, 0u32)];
    let mut report = StackReport {
        max_depth: 0,
        return_depth: None,
        reachable: 0,
    };

    while let Some((start, start_depth)) = pending.pop() {
        let mut offset = start;
        let mut depth = start_depth;

        loop {
            let Some(instruction) = instructions.get(offset as usize) else {
                return Err(VerifyError::OutOfRange { offset });
            };

            match depths[offset as usize] {
                Some(seen) if seen == depth => break,
                Some(seen) => {
                    return Err(VerifyError::Inconsistent {
                        offset,
                        first: seen,
                        second: depth,
                    });
                }
                None => {
                    depths[offset as usize] = Some(depth);
                    report.reachable += 1;
                }
            }

            match stack_effect(instruction) {
                StackEffect::Next(delta) => {
                    depth = adjust(depth, delta, offset)?;
                    offset += 1;
                }
                StackEffect::Branch { fallthrough, taken } => {
                    let target = jump_target(instruction, offset)?;
                    pending.push((target, adjust(depth, taken, offset)?));
                    depth = adjust(depth, fallthrough, offset)?;
                    offset += 1;
                }
                StackEffect::Goto => {
                    offset = jump_target(instruction, offset)?;
                }
                StackEffect::Return => {
                    if depth == 0 {
                        return Err(VerifyError::Underflow { offset });
                    }
                    if let Some(seen) = report.return_depth.filter(|seen| *seen != depth) {
                        return Err(VerifyError::Inconsistent {
                            offset,
                            first: seen,
                            second: depth,
                        });
                    }
                    report.return_depth = Some(depth);
                    break;
                }
                StackEffect::Throw { pops } => {
                    adjust(depth, -pops, offset)?;
                    break;
                }
            }

            report.max_depth = report.max_depth.max(depth);
        }
    }

    Ok(report)
}

fn adjust(depth: u32, delta: i32, offset: u32) -> Result<u32, VerifyError> {
    depth
        .checked_add_signed(delta)
        .ok_or(VerifyError::Underflow { offset })
}

fn jump_target(instruction: &Instruction, offset: u32) -> Result<u32, VerifyError> {
    match instruction.target() {
        Some(Address::Offset(target)) => Ok(target),
        Some(Address::Label(_)) => Err(VerifyError::UnresolvedLabel { offset }),
        None => Err(VerifyError::OutOfRange { offset }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(instructions: Vec<Instruction>) -> Bytecode {
        let mut code = Bytecode::new();
        for instruction in instructions {
            code.emit(instruction).unwrap();
        }
        code
    }

    #[test]
    fn test_straight_line() {
        let code = stream(vec![
            Instruction::with_operand(OpCode::Int, Operand::Int(1)),
            Instruction::with_operand(OpCode::Int, Operand::Int(2)),
            Instruction::simple(OpCode::Add),
            Instruction::simple(OpCode::Ret),
        ]);
        let report = analyze(&code, 0).unwrap();
        assert_eq!(report.max_depth, 2);
        assert_eq!(report.return_depth, Some(1));
        assert_eq!(report.reachable, 4);
    }

    #[test]
    fn test_branches_must_agree() {
        // The fallthrough path reaches `ret` one deeper than the jump
        let code = stream(vec![
            Instruction::simple(OpCode::Null),
            Instruction::jump(OpCode::JmpZ, Address::Offset(3)),
            Instruction::with_operand(OpCode::Int, Operand::Int(1)),
            Instruction::simple(OpCode::Ret),
        ]);
        let err = analyze(&code, 0).unwrap_err();
        assert!(matches!(err, VerifyError::Inconsistent { offset: 3, .. }));
    }

    #[test]
    fn test_underflow() {
        let code = stream(vec![Instruction::simple(OpCode::Pop)]);
        assert_eq!(
            analyze(&code, 0).unwrap_err(),
            VerifyError::Underflow { offset: 0 }
        );
    }

    #[test]
    fn test_throw_ends_path() {
        let code = stream(vec![
            Instruction::simple(OpCode::Null),
            Instruction::simple(OpCode::Throw),
        ]);
        let report = analyze(&code, 0).unwrap();
        assert_eq!(report.return_depth, None);
    }

    #[test]
    fn test_call_effect() {
        let call = Instruction::with_operands(OpCode::CallMember, Operand::Uint(2), Operand::Int(0));
        assert_eq!(stack_effect(&call), StackEffect::Next(-4));
        let call = Instruction::with_operands(OpCode::Call, Operand::Uint(0), Operand::Int(1));
        assert_eq!(stack_effect(&call), StackEffect::Next(0));
    }
}
