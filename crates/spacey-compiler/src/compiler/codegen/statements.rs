// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Statement lowering.
//!
//! Every statement leaves exactly one completion value on the stack, so a
//! sequence of statements is lowered with a `Pop` between neighbours.

use std::slice;

use super::{Compiler, ContextFrame, UnwindStep};
use crate::ast::*;
use crate::compiler::bytecode::{
    Address, ENUM_START, InstrRef, Instruction, NAME_ENSURE, OpCode, Operand, RuntimeErrorCode,
};
use crate::error::Result;

/// Stack cells a for-in loop keeps while its body runs: the reference to the
/// loop variable, the enumerated object, the enumeration state and the
/// completion value.
const FOR_IN_CELLS: u32 = 4;

/// Cells a try without catch keeps for the pending completion while its
/// body and finally body run.
const FINALLY_CELLS: u32 = 2;

impl Compiler {
    /// Lowers a statement, with `frame` pushed for its duration.
    pub(super) fn compile_statement(
        &mut self,
        frame: Option<ContextFrame>,
        stat: &StatementRef,
    ) -> Result<()> {
        let Some(frame) = frame else {
            return self.dispatch_statement(stat);
        };

        self.contexts.push(frame)?;
        let result = self.dispatch_statement(stat);
        let popped = self.contexts.pop();
        debug_assert_eq!(popped, Some(frame), "context stack out of balance");
        result
    }

    fn dispatch_statement(&mut self, stat: &StatementRef) -> Result<()> {
        match stat.as_ref() {
            Statement::VariableDeclaration(decl) => {
                self.compile_variable_list(&decl.declarations)?;
                self.emit_op(OpCode::Undefined)
            }
            Statement::Expression(expr_stmt) => self.compile_expression(&expr_stmt.expression),
            Statement::Block(block) => self.compile_block(&block.body),
            Statement::If(if_stmt) => self.compile_if(if_stmt),
            Statement::Switch(switch) => self.compile_switch(stat, switch),
            Statement::While(while_stmt) => {
                self.compile_while(stat, &while_stmt.test, &while_stmt.body, false)
            }
            Statement::DoWhile(do_while) => {
                self.compile_while(stat, &do_while.test, &do_while.body, true)
            }
            Statement::For(for_stmt) => self.compile_for(stat, for_stmt),
            Statement::ForIn(for_in) => self.compile_for_in(stat, for_in),
            Statement::Break(branch) => self.compile_break(stat, branch),
            Statement::Continue(branch) => self.compile_continue(stat, branch),
            Statement::Throw(throw) => {
                self.compile_expression(&throw.argument)?;
                self.emit_op(OpCode::Throw)
            }
            Statement::Try(try_stmt) => self.compile_try(stat, try_stmt),
            Statement::With(with) => self.compile_with(stat, with),
            Statement::Empty => self.emit_op(OpCode::Undefined),
            // No native lowering: return needs the function epilogue and
            // labels are only reachable through labeled branches
            Statement::Return(_) | Statement::Labeled(_) => self.compile_interp_fallback(stat),
        }
    }

    /// Lowers a statement list as one statement.
    pub(super) fn compile_block(&mut self, body: &[StatementRef]) -> Result<()> {
        let Some((last, init)) = body.split_last() else {
            return self.emit_op(OpCode::Undefined);
        };

        for stat in init {
            match stat.as_ref() {
                Statement::Expression(expr_stmt) => {
                    if !self.compile_expression_noret(&expr_stmt.expression)? {
                        self.emit_op(OpCode::Pop)?;
                    }
                }
                _ => {
                    self.compile_statement(None, stat)?;
                    self.emit_op(OpCode::Pop)?;
                }
            }
        }

        self.compile_statement(None, last)
    }

    fn compile_variable_list(&mut self, declarations: &[VariableDeclarator]) -> Result<()> {
        for declarator in declarations {
            if let Some(init) = &declarator.init {
                self.compile_expression(init)?;
                self.emit_ident(OpCode::VarSet, &declarator.id.name)?;
            }
        }
        Ok(())
    }

    fn compile_if(&mut self, if_stmt: &IfStatement) -> Result<()> {
        self.compile_expression(&if_stmt.test)?;
        let jump_else = self.emit_jump(OpCode::JmpZ, Address::PENDING)?;

        self.compile_statement(None, &if_stmt.consequent)?;
        let jump_end = self.emit_jump(OpCode::Jmp, Address::PENDING)?;

        self.patch_here(jump_else);
        match &if_stmt.alternate {
            Some(alternate) => self.compile_statement(None, alternate)?,
            None => self.emit_op(OpCode::Undefined)?,
        }

        self.patch_here(jump_end);
        Ok(())
    }

    // ========================================================================
    // Loops
    // ========================================================================

    fn compile_while(
        &mut self,
        stat: &StatementRef,
        test: &Expression,
        body: &StatementRef,
        do_while: bool,
    ) -> Result<()> {
        self.speculate(stat, |this| {
            let break_label = this.alloc_label()?;
            let continue_label = this.alloc_label()?;
            let frame = ContextFrame::looping(break_label, continue_label, 0);

            let loop_start = if do_while {
                this.code.current_offset()
            } else {
                // Completion value if the body never runs
                this.emit_op(OpCode::Undefined)?;
                let loop_start = this.code.current_offset();
                this.bind_label(continue_label);
                this.compile_expression(test)?;
                this.emit_jump(OpCode::JmpZ, Address::Label(break_label))?;
                this.emit_op(OpCode::Pop)?;
                loop_start
            };

            this.compile_restricted(Some(frame), body)?;

            if do_while {
                this.bind_label(continue_label);
                this.compile_expression(test)?;
                this.emit_jump(OpCode::JmpZ, Address::Label(break_label))?;
                this.emit_op(OpCode::Pop)?;
            }

            this.emit_jump(OpCode::Jmp, Address::Offset(loop_start))?;
            this.bind_label(break_label);
            Ok(())
        })
    }

    fn compile_for(&mut self, stat: &StatementRef, for_stmt: &ForStatement) -> Result<()> {
        self.speculate(stat, |this| {
            match &for_stmt.init {
                Some(ForInit::Declaration(decl)) => this.compile_variable_list(&decl.declarations)?,
                Some(ForInit::Expression(init)) => {
                    if !this.compile_expression_noret(init)? {
                        this.emit_op(OpCode::Pop)?;
                    }
                }
                None => {}
            }

            let break_label = this.alloc_label()?;
            let continue_label = this.alloc_label()?;
            let frame = ContextFrame::looping(break_label, continue_label, 0);

            this.emit_op(OpCode::Undefined)?;
            let loop_start = this.code.current_offset();
            if let Some(test) = &for_stmt.test {
                this.compile_expression(test)?;
                this.emit_jump(OpCode::JmpZ, Address::Label(break_label))?;
            }
            // Drop the previous completion value; the body pushes a new one
            this.emit_op(OpCode::Pop)?;

            this.compile_restricted(Some(frame), &for_stmt.body)?;

            this.bind_label(continue_label);
            if let Some(update) = &for_stmt.update {
                if !this.compile_expression_noret(update)? {
                    this.emit_op(OpCode::Pop)?;
                }
            }

            this.emit_jump(OpCode::Jmp, Address::Offset(loop_start))?;
            this.bind_label(break_label);
            Ok(())
        })
    }

    fn compile_for_in(&mut self, stat: &StatementRef, for_in: &ForInStatement) -> Result<()> {
        self.speculate(stat, |this| {
            if let ForInLeft::Declaration(declarator) = &for_in.left {
                this.compile_variable_list(slice::from_ref(declarator))?;
            }

            this.compile_expression(&for_in.right)?;

            match &for_in.left {
                ForInLeft::Declaration(declarator) => {
                    this.emit_ident_uint(OpCode::IdentRef, &declarator.id.name, NAME_ENSURE)?;
                }
                ForInLeft::Expression(target) => match target.as_reference() {
                    Some(reference) => this.compile_reference(reference, NAME_ENSURE)?,
                    None => {
                        return this
                            .emit_uint(OpCode::ThrowRef, RuntimeErrorCode::IllegalAssignment as u32);
                    }
                },
            }

            let break_label = this.alloc_label()?;
            let continue_label = this.alloc_label()?;
            let frame = ContextFrame::looping(break_label, continue_label, FOR_IN_CELLS);

            this.emit_int(OpCode::Int, ENUM_START)?;
            this.emit_op(OpCode::Undefined)?;

            this.bind_label(continue_label);
            this.emit_jump(OpCode::ForIn, Address::Label(break_label))?;
            this.compile_restricted(Some(frame), &for_in.body)?;
            this.emit_jump(OpCode::Jmp, Address::Label(continue_label))?;

            this.bind_label(break_label);
            Ok(())
        })
    }

    // ========================================================================
    // Jumps out of statements
    // ========================================================================

    /// Releases everything held by frames from the innermost one down to
    /// `target`.
    ///
    /// With `release_target` the target's own stack cells are popped too;
    /// `break` leaves the target while `continue` stays inside it.
    fn pop_to_stat(&mut self, target: usize, release_target: bool) -> Result<()> {
        // Collected first: emission borrows the compiler mutably
        let steps: Vec<UnwindStep> = self.contexts.unwind_steps(target).collect();
        for step in steps {
            match step {
                UnwindStep::PopScope => self.emit_op(OpCode::PopScope)?,
                UnwindStep::PopExcept => self.emit_op(OpCode::PopExcept)?,
            }
        }

        for _ in 0..self.contexts.unwind_cells(target, release_target) {
            self.emit_op(OpCode::Pop)?;
        }
        Ok(())
    }

    fn compile_break(&mut self, stat: &StatementRef, branch: &BranchStatement) -> Result<()> {
        let target = match self.contexts.find_break() {
            Some(target) if branch.label.is_none() => target,
            _ => return self.compile_interp_fallback(stat),
        };
        let (frame_index, label) = target;

        self.pop_to_stat(frame_index, true)?;
        self.emit_op(OpCode::Undefined)?;
        self.emit_jump(OpCode::Jmp, Address::Label(label))?;
        Ok(())
    }

    fn compile_continue(&mut self, stat: &StatementRef, branch: &BranchStatement) -> Result<()> {
        let target = match self.contexts.find_continue() {
            Some(target) if branch.label.is_none() => target,
            _ => return self.compile_interp_fallback(stat),
        };
        let (frame_index, label) = target;

        self.pop_to_stat(frame_index, false)?;
        self.emit_op(OpCode::Undefined)?;
        self.emit_jump(OpCode::Jmp, Address::Label(label))?;
        Ok(())
    }

    // ========================================================================
    // Switch, try and with
    // ========================================================================

    fn compile_switch(&mut self, stat: &StatementRef, switch: &SwitchStatement) -> Result<()> {
        self.speculate(stat, |this| {
            let break_label = this.alloc_label()?;
            let frame = ContextFrame::switch(break_label);

            // Completion value if no clause body runs
            this.emit_op(OpCode::Undefined)?;
            this.compile_expression(&switch.discriminant)?;

            let mut case_jumps: Vec<Option<InstrRef>> = Vec::new();
            case_jumps.try_reserve_exact(switch.cases.len())?;
            for case in &switch.cases {
                let jump = match &case.test {
                    Some(test) => {
                        this.compile_expression(test)?;
                        Some(this.emit_jump(OpCode::Case, Address::PENDING)?)
                    }
                    None => None,
                };
                case_jumps.push(jump);
            }

            // No case matched: drop the discriminant
            this.emit_op(OpCode::Pop)?;
            let default_jump = this.emit_jump(OpCode::Jmp, Address::PENDING)?;

            let mut has_default = false;
            for (case, jump) in switch.cases.iter().zip(case_jumps) {
                has_default |= case.test.is_none();
                // Empty clauses share the offset of the next clause's body
                this.patch_here(jump.unwrap_or(default_jump));
                for case_stat in &case.consequent {
                    this.emit_op(OpCode::Pop)?;
                    this.compile_restricted(Some(frame), case_stat)?;
                }
            }

            if !has_default {
                this.patch_here(default_jump);
            }
            this.bind_label(break_label);
            Ok(())
        })
    }

    fn compile_try(&mut self, stat: &StatementRef, try_stmt: &TryStatement) -> Result<()> {
        self.speculate(stat, |this| {
            let catch_name = match &try_stmt.handler {
                Some(handler) => Operand::Ident(this.code.constants.intern(&handler.param.name)?),
                None => Operand::None,
            };
            let push_except = this.emit(Instruction::with_operands(
                OpCode::PushExcept,
                Operand::Addr(Address::PENDING),
                catch_name,
            ))?;

            let try_cells = if try_stmt.handler.is_some() {
                0
            } else {
                FINALLY_CELLS
            };
            this.compile_restricted(Some(ContextFrame::exception(try_cells)), &try_stmt.block)?;
            this.emit_op(OpCode::PopExcept)?;

            if let Some(handler) = &try_stmt.handler {
                let jump_finally = this.emit_jump(OpCode::Jmp, Address::PENDING)?;

                this.patch_here(push_except);
                this.compile_restricted(Some(ContextFrame::scope()), &handler.body)?;
                this.emit_op(OpCode::PopScope)?;

                this.patch_here(jump_finally);
            } else {
                this.patch_here(push_except);
            }

            // A try with neither clause behaves as one with an empty finally
            if try_stmt.finalizer.is_some() || try_stmt.handler.is_none() {
                this.emit_op(OpCode::Pop)?;

                match &try_stmt.finalizer {
                    Some(finalizer) => {
                        let frame = try_stmt
                            .handler
                            .is_none()
                            .then(|| ContextFrame::cells(FINALLY_CELLS));
                        this.compile_restricted(frame, finalizer)?;
                    }
                    None => this.emit_op(OpCode::Undefined)?,
                }

                if try_stmt.handler.is_none() {
                    this.emit_op(OpCode::EndFinally)?;
                }
            }

            Ok(())
        })
    }

    fn compile_with(&mut self, stat: &StatementRef, with: &WithStatement) -> Result<()> {
        self.speculate(stat, |this| {
            this.compile_expression(&with.object)?;
            this.emit_op(OpCode::PushScope)?;
            this.compile_restricted(Some(ContextFrame::scope()), &with.body)?;
            this.emit_op(OpCode::PopScope)
        })
    }
}
