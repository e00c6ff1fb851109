// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode compiler for JavaScript.
//!
//! Transforms AST into bytecode that can be executed by the VM.
//!
//! # Module Structure
//!
//! - `bytecode`: Opcodes, instructions and the instruction stream
//! - `constants`: String, double and identifier storage
//! - `labels`: Symbolic forward jump targets
//! - `codegen`: Code generation from AST
//!   - `codegen::context`: Enclosing statement frames and unwinding
//! - `disasm`: Listings for debugging
//! - `verify`: Static stack depth analysis

pub mod bytecode;
pub mod codegen;
pub mod constants;
pub mod disasm;
pub mod labels;
pub mod verify;

pub use bytecode::{Address, Bytecode, InstrRef, Instruction, OpCode, Operand, OperandType};
pub use codegen::Compiler;
pub use disasm::Disassembler;
pub use labels::{Label, LabelTable};
