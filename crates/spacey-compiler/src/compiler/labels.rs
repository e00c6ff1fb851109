// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Symbolic jump targets.
//!
//! Forward jumps whose destination is not known yet reference a [`Label`].
//! Once a statement chunk is emitted, [`LabelTable::resolve`] rewrites every
//! label address in the chunk to its bound offset and empties the table, so
//! label ids never leak from one chunk into the next.

use std::fmt;

use crate::compiler::bytecode::{Address, Bytecode, Operand};
use crate::error::{Result, index_u32};

/// A symbolic jump target, valid until the next resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

impl Label {
    /// Index of the label in its table.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Labels allocated since the last resolution pass.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    offsets: Vec<Option<u32>>,
}

impl LabelTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with room for `capacity` labels.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut offsets = Vec::new();
        offsets.try_reserve_exact(capacity)?;
        Ok(Self { offsets })
    }

    /// Allocates a new unbound label.
    pub fn alloc(&mut self) -> Result<Label> {
        let label = Label(index_u32(self.offsets.len())?);
        self.offsets.try_reserve(1)?;
        self.offsets.push(None);
        Ok(label)
    }

    /// Binds `label` to an instruction offset.
    pub fn bind(&mut self, label: Label, offset: u32) {
        let slot = &mut self.offsets[label.0 as usize];
        debug_assert!(slot.is_none(), "{label} bound twice");
        *slot = Some(offset);
    }

    /// Offset `label` is bound to, if any.
    pub fn offset(&self, label: Label) -> Option<u32> {
        self.offsets.get(label.0 as usize).copied().flatten()
    }

    /// Number of labels allocated in the current pass.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether no labels are allocated.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Drops labels allocated after the table held `len` entries.
    pub fn truncate(&mut self, len: usize) {
        self.offsets.truncate(len);
    }

    /// Forgets every label without resolving.
    pub fn reset(&mut self) {
        self.offsets.clear();
    }

    /// Rewrites label addresses in `code` from `start` onward to bound
    /// offsets, then empties the table.
    ///
    /// # Panics
    ///
    /// Panics if an instruction references a label that was never bound.
    pub fn resolve(&mut self, code: &mut Bytecode, start: u32) {
        if self.offsets.is_empty() {
            return;
        }

        let mut rewritten = 0usize;
        for instruction in code.instructions_from_mut(start) {
            debug_assert!(
                !matches!(instruction.arg2, Operand::Addr(_)),
                "address in second operand of {}",
                instruction.opcode
            );
            if let Operand::Addr(Address::Label(label)) = instruction.arg1 {
                let offset = self.offsets[label.0 as usize]
                    .unwrap_or_else(|| panic!("{label} referenced but never bound"));
                instruction.arg1 = Operand::Addr(Address::Offset(offset));
                rewritten += 1;
            }
        }

        tracing::trace!(labels = self.offsets.len(), rewritten, start, "resolved labels");
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode::{Instruction, OpCode};

    #[test]
    fn test_alloc_is_sequential() {
        let mut labels = LabelTable::new();
        assert_eq!(labels.alloc().unwrap(), Label(0));
        assert_eq!(labels.alloc().unwrap(), Label(1));
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_resolve_rewrites_and_resets() {
        let mut code = Bytecode::new();
        let mut labels = LabelTable::new();
        let end = labels.alloc().unwrap();

        code.emit(Instruction::jump(OpCode::Jmp, Address::Label(end)))
            .unwrap();
        code.emit(Instruction::simple(OpCode::Undefined)).unwrap();
        labels.bind(end, code.current_offset());
        code.emit(Instruction::simple(OpCode::Ret)).unwrap();

        labels.resolve(&mut code, 0);
        assert_eq!(code.instructions()[0].target(), Some(Address::Offset(2)));
        assert!(labels.is_empty());
        // Ids restart in the next pass
        assert_eq!(labels.alloc().unwrap(), Label(0));
    }

    #[test]
    fn test_resolve_only_touches_chunk() {
        let mut code = Bytecode::new();
        let mut labels = LabelTable::new();
        code.emit(Instruction::jump(OpCode::Jmp, Address::Offset(0)))
            .unwrap();
        let label = labels.alloc().unwrap();
        labels.bind(label, 1);
        code.emit(Instruction::jump(OpCode::JmpZ, Address::Label(label)))
            .unwrap();

        labels.resolve(&mut code, 1);
        assert_eq!(code.instructions()[0].target(), Some(Address::Offset(0)));
        assert_eq!(code.instructions()[1].target(), Some(Address::Offset(1)));
    }

    #[test]
    #[should_panic(expected = "never bound")]
    fn test_unbound_label_panics() {
        let mut code = Bytecode::new();
        let mut labels = LabelTable::new();
        let label = labels.alloc().unwrap();
        code.emit(Instruction::jump(OpCode::Jmp, Address::Label(label)))
            .unwrap();
        labels.resolve(&mut code, 0);
    }

    #[test]
    fn test_truncate_forgets_later_labels() {
        let mut labels = LabelTable::new();
        let kept = labels.alloc().unwrap();
        labels.bind(kept, 3);
        labels.alloc().unwrap();
        labels.truncate(1);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels.offset(kept), Some(3));
    }
}
