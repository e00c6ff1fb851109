// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Code generation from AST to bytecode.
//!
//! This module contains the `Compiler` which lowers parsed JavaScript AST
//! into the instruction stream of a compilation unit. Each call to an entry
//! point appends one chunk and returns its start offset; chunks share the
//! stream, the constant pool and the label table.

mod context;
mod expressions;
mod fallback;
mod statements;


pub use context::{ContextFrame, ContextStack, UnwindStep};

use tracing::trace;

use crate::ast::{Expression, StatementRef};
use crate::compiler::bytecode::{
    Address, Bytecode, CodeCheckpoint, InstrRef, Instruction, OpCode, Operand,
};
use crate::compiler::labels::{Label, LabelTable};
use crate::config::CompilerConfig;
use crate::error::Result;

/// Compiles AST to bytecode.
#[derive(Debug)]
pub struct Compiler {
    /// The instruction stream being generated
    code: Bytecode,
    /// Labels of the chunk being generated
    labels: LabelTable,
    /// Enclosing statements of the construct being lowered
    contexts: ContextStack,
    /// Set while lowering a body whose enclosing statement has a rollback
    /// point; unsupported constructs must fail instead of degrading
    no_fallback: bool,
    /// Whether the outermost level may degrade to the interpreter
    allow_fallback: bool,
}

/// Compiler state at a point in time, for rollback.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    code: CodeCheckpoint,
    labels: usize,
}

impl Checkpoint {
    fn code_len(&self) -> usize {
        self.code.code_len()
    }
}

impl Compiler {
    /// Creates a new compiler with default settings.
    pub fn new() -> Self {
        Self {
            code: Bytecode::new(),
            labels: LabelTable::new(),
            contexts: ContextStack::new(),
            no_fallback: false,
            allow_fallback: true,
        }
    }

    /// Creates a compiler with storage reserved per `config`.
    pub fn with_config(config: &CompilerConfig) -> Result<Self> {
        Ok(Self {
            code: Bytecode::with_capacity(config.initial_code_capacity, config.max_code_len)?,
            labels: LabelTable::with_capacity(config.initial_label_capacity)?,
            contexts: ContextStack::new(),
            no_fallback: false,
            allow_fallback: config.allow_fallback,
        })
    }

    /// The generated bytecode.
    pub fn bytecode(&self) -> &Bytecode {
        &self.code
    }

    /// Consumes the compiler, returning the generated bytecode.
    pub fn into_bytecode(self) -> Bytecode {
        self.code
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Compiles an expression chunk that returns the expression's value.
    ///
    /// Returns the chunk's start offset.
    pub fn compile_subscript(&mut self, expr: &Expression) -> Result<u32> {
        let start = self.code.current_offset();
        trace!(start, "compiling expression chunk");

        self.compile_expression(expr)?;
        self.emit_op(OpCode::Ret)?;
        Ok(start)
    }

    /// Compiles a statement chunk that returns the completion value.
    ///
    /// With `implicit_block` a multi-statement list is lowered as a block;
    /// otherwise only its first statement is. Returns the chunk's start
    /// offset.
    pub fn compile_subscript_stat(
        &mut self,
        stats: &[StatementRef],
        implicit_block: bool,
    ) -> Result<u32> {
        debug_assert!(self.contexts.is_empty());
        debug_assert!(!self.no_fallback);
        debug_assert!(self.labels.is_empty());

        let start = self.code.current_offset();
        trace!(start, statements = stats.len(), "compiling statement chunk");

        let lowered = match stats {
            [] => self.emit_op(OpCode::Undefined),
            [only] => self.compile_statement(None, only),
            [first, ..] if !implicit_block => self.compile_statement(None, first),
            _ => self.compile_block(stats),
        };
        if let Err(err) = lowered {
            self.labels.reset();
            return Err(err);
        }

        self.labels.resolve(&mut self.code, start);
        self.emit_op(OpCode::Ret)?;
        Ok(start)
    }

    // ========================================================================
    // Emission helpers
    // ========================================================================

    fn emit(&mut self, instruction: Instruction) -> Result<InstrRef> {
        self.code.emit(instruction)
    }

    fn emit_op(&mut self, opcode: OpCode) -> Result<()> {
        self.emit(Instruction::simple(opcode))?;
        Ok(())
    }

    fn emit_int(&mut self, opcode: OpCode, value: i32) -> Result<()> {
        self.emit(Instruction::with_operand(opcode, Operand::Int(value)))?;
        Ok(())
    }

    fn emit_uint(&mut self, opcode: OpCode, value: u32) -> Result<()> {
        self.emit(Instruction::with_operand(opcode, Operand::Uint(value)))?;
        Ok(())
    }

    fn emit_ident(&mut self, opcode: OpCode, name: &str) -> Result<()> {
        let id = self.code.constants.intern(name)?;
        self.emit(Instruction::with_operand(opcode, Operand::Ident(id)))?;
        Ok(())
    }

    fn emit_ident_uint(&mut self, opcode: OpCode, name: &str, value: u32) -> Result<()> {
        let id = self.code.constants.intern(name)?;
        self.emit(Instruction::with_operands(
            opcode,
            Operand::Ident(id),
            Operand::Uint(value),
        ))?;
        Ok(())
    }

    fn emit_jump(&mut self, opcode: OpCode, target: Address) -> Result<InstrRef> {
        self.emit(Instruction::jump(opcode, target))
    }

    /// Points a previously emitted jump at the next instruction.
    fn patch_here(&mut self, jump: InstrRef) {
        let here = self.code.current_offset();
        self.code.patch_target(jump, Address::Offset(here));
    }

    fn alloc_label(&mut self) -> Result<Label> {
        self.labels.alloc()
    }

    /// Binds `label` to the next instruction.
    fn bind_label(&mut self, label: Label) {
        let here = self.code.current_offset();
        self.labels.bind(label, here);
    }

    // ========================================================================
    // Rollback
    // ========================================================================

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            code: self.code.checkpoint(),
            labels: self.labels.len(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.code.rollback(checkpoint.code);
        self.labels.truncate(checkpoint.labels);
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
