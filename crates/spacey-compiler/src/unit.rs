// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Source units.
//!
//! A [`SourceUnit`] owns a parsed program and the compilation unit its
//! chunks are emitted into. The compilation unit is created on the first
//! compile request; the program, the function bodies inside it and any
//! expressions evaluated against it then share one instruction stream.

use tracing::{debug, instrument};

use crate::ast::{Expression, FunctionExpression, Program, StatementRef};
use crate::compiler::{Bytecode, Compiler};
use crate::config::CompilerConfig;
use crate::error::Result;

/// A program together with its lazily created compilation unit.
#[derive(Debug)]
pub struct SourceUnit {
    program: Program,
    config: CompilerConfig,
    compiler: Option<Compiler>,
}

impl SourceUnit {
    /// Creates a unit with the default configuration.
    pub fn new(program: Program) -> Self {
        Self::with_config(program, CompilerConfig::default())
    }

    /// Creates a unit with `config`.
    pub fn with_config(program: Program, config: CompilerConfig) -> Self {
        Self {
            program,
            config,
            compiler: None,
        }
    }

    /// The parsed program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Bytecode emitted so far, if anything has been compiled.
    pub fn bytecode(&self) -> Option<&Bytecode> {
        self.compiler.as_ref().map(Compiler::bytecode)
    }

    /// Compiles the top-level program; returns the chunk's start offset.
    #[instrument(skip(self), fields(statements = self.program.body.len()))]
    pub fn compile_script(&mut self) -> Result<u32> {
        let compiler = ensure_compiler(&mut self.compiler, &self.config)?;
        let start = compiler.compile_subscript_stat(&self.program.body, true)?;
        debug!(start, "compiled script");
        Ok(start)
    }

    /// Compiles a statement list as one chunk.
    pub fn compile_statements(
        &mut self,
        stats: &[StatementRef],
        implicit_block: bool,
    ) -> Result<u32> {
        ensure_compiler(&mut self.compiler, &self.config)?.compile_subscript_stat(stats, implicit_block)
    }

    /// Compiles an expression chunk, e.g. for `eval`-style evaluation.
    pub fn compile_expression(&mut self, expr: &Expression) -> Result<u32> {
        ensure_compiler(&mut self.compiler, &self.config)?.compile_subscript(expr)
    }

    /// Compiles the body of a function expression.
    pub fn compile_function_body(&mut self, func: &FunctionExpression) -> Result<u32> {
        let start = self.compile_statements(&func.body, true)?;
        debug!(
            start,
            name = func.id.as_ref().map_or("<anonymous>", |id| id.name.as_str()),
            "compiled function body"
        );
        Ok(start)
    }
}

/// Creates the compilation unit on first use.
fn ensure_compiler<'a>(
    slot: &'a mut Option<Compiler>,
    config: &CompilerConfig,
) -> Result<&'a mut Compiler> {
    let compiler = match slot.take() {
        Some(compiler) => compiler,
        None => {
            debug!("creating compilation unit");
            Compiler::with_config(config)?
        }
    };
    Ok(slot.insert(compiler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use crate::compiler::OpCode;

    #[test]
    fn test_unit_is_lazy() {
        let unit = SourceUnit::new(program(vec![expr_stmt(int(1))]));
        assert!(unit.bytecode().is_none());
    }

    #[test]
    fn test_chunks_share_stream() {
        let mut unit = SourceUnit::new(program(vec![expr_stmt(int(1))]));
        let script = unit.compile_script().unwrap();
        let expr = unit.compile_expression(&ident("x")).unwrap();

        assert_eq!(script, 0);
        assert_eq!(expr, 2);
        let code = unit.bytecode().unwrap();
        assert_eq!(code.len(), 4);
        assert_eq!(code.instructions()[3].opcode, OpCode::Ret);
    }

    #[test]
    fn test_function_body() {
        let func = FunctionExpression {
            id: None,
            params: vec![],
            body: vec![expr_stmt(ident("a")), expr_stmt(ident("b"))],
        };
        let mut unit = SourceUnit::new(Program::default());
        let start = unit.compile_function_body(&func).unwrap();
        let ops: Vec<_> = unit.bytecode().unwrap().instructions()[start as usize..]
            .iter()
            .map(|i| i.opcode)
            .collect();
        assert_eq!(ops, vec![OpCode::Ident, OpCode::Pop, OpCode::Ident, OpCode::Ret]);
    }
}
