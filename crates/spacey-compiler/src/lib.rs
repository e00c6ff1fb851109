// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-compiler
//!
//! Lowers ES3 JavaScript syntax trees to stack-machine bytecode for the
//! Spacey engine.
//!
//! ## Overview
//!
//! - Expressions and statements are lowered into one instruction stream per
//!   compilation unit; each entry point appends a chunk ending in `ret`.
//! - Forward jumps use symbolic labels resolved once per statement chunk.
//! - `break` and `continue` unwind scopes, exception handlers and loop state
//!   of every statement they leave.
//! - Statements the compiler cannot lower are handed to the tree-walking
//!   interpreter as a single `tree` instruction. Inside loops, `switch`,
//!   `try` and `with` that would be unsound, so the enclosing statement is
//!   rolled back and handed over whole instead.
//!
//! ## Quick Start
//!
//! ```rust
//! use spacey_compiler::ast::build::*;
//! use spacey_compiler::SourceUnit;
//!
//! let program = program(vec![expr_stmt(int(1))]);
//! let mut unit = SourceUnit::new(program);
//! let start = unit.compile_script().unwrap();
//! assert_eq!(start, 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod unit;

// Re-exports for convenience
pub use compiler::{Bytecode, Compiler, Disassembler, Instruction, OpCode, Operand};
pub use config::{CompilerConfig, ConfigError};
pub use error::{CompileError, Result};
pub use unit::SourceUnit;
