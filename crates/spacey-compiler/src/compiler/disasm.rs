// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Human-readable listings of the instruction stream.

use std::fmt;

use crate::compiler::bytecode::{Address, Bytecode, Instruction, OpCode, Operand};

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Offset in the stream
    pub offset: u32,
    /// Opcode mnemonic
    pub mnemonic: &'static str,
    /// Rendered operands, space separated
    pub operands: String,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operands.is_empty() {
            write!(f, "{:04}  {}", self.offset, self.mnemonic)
        } else {
            write!(f, "{:04}  {:<14}{}", self.offset, self.mnemonic, self.operands)
        }
    }
}

/// Disassembles a range of the stream, resolving constant operands.
pub struct Disassembler<'a> {
    code: &'a Bytecode,
    start: u32,
    end: u32,
}

impl<'a> Disassembler<'a> {
    /// Disassembles the whole stream.
    pub fn new(code: &'a Bytecode) -> Self {
        Self {
            code,
            start: 0,
            end: code.current_offset(),
        }
    }

    /// Disassembles one chunk: from `start` through its `ret`.
    pub fn chunk(code: &'a Bytecode, start: u32) -> Self {
        let end = code.instructions()[start as usize..]
            .iter()
            .position(|instruction| instruction.opcode == OpCode::Ret)
            .map_or(code.current_offset(), |len| start + len as u32 + 1);
        Self { code, start, end }
    }

    /// Decoded lines of the range.
    pub fn lines(&self) -> impl Iterator<Item = Line> + '_ {
        let instructions = &self.code.instructions()[self.start as usize..self.end as usize];
        instructions
            .iter()
            .zip(self.start..)
            .map(|(instruction, offset)| self.line(offset, instruction))
    }

    fn line(&self, offset: u32, instruction: &Instruction) -> Line {
        let operands = [&instruction.arg1, &instruction.arg2]
            .into_iter()
            .filter(|operand| !matches!(operand, Operand::None))
            .map(|operand| self.operand(operand))
            .collect::<Vec<_>>()
            .join(" ");

        Line {
            offset,
            mnemonic: instruction.opcode.mnemonic(),
            operands,
        }
    }

    fn operand(&self, operand: &Operand) -> String {
        let constants = &self.code.constants;
        match operand {
            Operand::None => String::new(),
            Operand::Int(value) => value.to_string(),
            Operand::Uint(value) => value.to_string(),
            Operand::Double(id) => constants.double(*id).to_string(),
            Operand::Str(id) => format!("{:?}", constants.string(*id)),
            Operand::Ident(id) => constants.identifier(*id).to_string(),
            Operand::Addr(Address::Offset(target)) => format!("@{target}"),
            Operand::Addr(Address::Label(label)) => label.to_string(),
            Operand::Stat(stat) => format!("<{}>", stat.kind_name()),
            Operand::Func(func) => match &func.id {
                Some(id) => format!("<function {}>", id.name),
                None => "<function>".to_string(),
            },
        }
    }
}

impl fmt::Display for Disassembler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing() {
        let mut code = Bytecode::new();
        let name = code.constants.intern("x").unwrap();
        let text = code.constants.add_string("hi").unwrap();
        code.emit(Instruction::with_operand(OpCode::Str, Operand::Str(text)))
            .unwrap();
        code.emit(Instruction::with_operand(OpCode::VarSet, Operand::Ident(name)))
            .unwrap();
        code.emit(Instruction::jump(OpCode::Jmp, Address::Offset(3)))
            .unwrap();
        code.emit(Instruction::simple(OpCode::Ret)).unwrap();

        let listing = Disassembler::new(&code).to_string();
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines[0], "0000  str           \"hi\"");
        assert_eq!(lines[1], "0001  var_set       x");
        assert_eq!(lines[2], "0002  jmp           @3");
        assert_eq!(lines[3], "0003  ret");
    }

    #[test]
    fn test_chunk_stops_at_ret() {
        let mut code = Bytecode::new();
        code.emit(Instruction::simple(OpCode::Null)).unwrap();
        code.emit(Instruction::simple(OpCode::Ret)).unwrap();
        code.emit(Instruction::simple(OpCode::This)).unwrap();
        code.emit(Instruction::simple(OpCode::Ret)).unwrap();

        let first: Vec<_> = Disassembler::chunk(&code, 0).lines().collect();
        assert_eq!(first.len(), 2);
        let second: Vec<_> = Disassembler::chunk(&code, 2).lines().collect();
        assert_eq!(second[0].mnemonic, "this");
    }
}
