// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Degrading unsupported statements to the tree-walking interpreter.
//!
//! A statement that cannot be lowered becomes a single [`OpCode::Tree`]
//! instruction carrying the AST node. That is only sound where no jump can
//! cross it, so statements with bodies (loops, switch, try, with) lower their
//! bodies with fallback disabled. If the body fails, the whole statement is
//! rolled back and replaced by one `Tree` instruction.

use std::mem;

use tracing::debug;

use super::{Compiler, ContextFrame};
use crate::ast::StatementRef;
use crate::compiler::bytecode::{Instruction, OpCode, stat_operand};
use crate::error::{CompileError, Result};

impl Compiler {
    /// Emits a `Tree` instruction for `stat`, or fails with
    /// [`CompileError::NotImplemented`] where fallback is not allowed.
    pub(super) fn compile_interp_fallback(&mut self, stat: &StatementRef) -> Result<()> {
        if self.no_fallback || !self.allow_fallback {
            return Err(CompileError::NotImplemented);
        }

        debug!(kind = stat.kind_name(), "statement handed to interpreter");
        self.emit(Instruction::with_operand(OpCode::Tree, stat_operand(stat)))?;
        Ok(())
    }

    /// Lowers a statement body with fallback disabled, restoring the
    /// previous setting afterwards.
    pub(super) fn compile_restricted(
        &mut self,
        frame: Option<ContextFrame>,
        stat: &StatementRef,
    ) -> Result<()> {
        let saved = mem::replace(&mut self.no_fallback, true);
        let result = self.compile_statement(frame, stat);
        self.no_fallback = saved;
        result
    }

    /// Runs `lower` for `stat`; if it hits an unsupported construct, discards
    /// everything it emitted and degrades the whole statement instead.
    pub(super) fn speculate<F>(&mut self, stat: &StatementRef, lower: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let checkpoint = self.checkpoint();
        match lower(self) {
            Err(CompileError::NotImplemented) => {
                debug!(
                    kind = stat.kind_name(),
                    discarded = self.code.len() - checkpoint.code_len(),
                    "rolling back statement"
                );
                self.rollback(checkpoint);
                self.compile_interp_fallback(stat)
            }
            result => result,
        }
    }
}
