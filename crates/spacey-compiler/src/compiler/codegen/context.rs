// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Statement contexts.
//!
//! Every enclosing loop, switch, try, catch, finally and with body pushes a
//! frame recording what it holds at run time: value stack cells, a scope
//! object, an exception handler. A `break` or `continue` leaving frames has
//! to release all of that before it jumps.

use crate::compiler::labels::Label;
use crate::error::Result;

/// What an enclosing statement holds while its body runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFrame {
    /// Value stack cells owned by the statement
    pub stack_cells: u32,
    /// Whether a scope object is pushed
    pub has_scope: bool,
    /// Whether an exception handler is installed
    pub has_exception_frame: bool,
    /// Target of `break`
    pub break_label: Option<Label>,
    /// Target of `continue`
    pub continue_label: Option<Label>,
}

impl ContextFrame {
    /// A loop body frame.
    pub fn looping(break_label: Label, continue_label: Label, stack_cells: u32) -> Self {
        Self {
            stack_cells,
            break_label: Some(break_label),
            continue_label: Some(continue_label),
            ..Self::default()
        }
    }

    /// A switch body frame; `break` only.
    pub fn switch(break_label: Label) -> Self {
        Self {
            break_label: Some(break_label),
            ..Self::default()
        }
    }

    /// A body running inside a pushed scope object.
    pub fn scope() -> Self {
        Self {
            has_scope: true,
            ..Self::default()
        }
    }

    /// A try body with its handler installed.
    pub fn exception(stack_cells: u32) -> Self {
        Self {
            stack_cells,
            has_exception_frame: true,
            ..Self::default()
        }
    }

    /// A body that only owns stack cells.
    pub fn cells(stack_cells: u32) -> Self {
        Self {
            stack_cells,
            ..Self::default()
        }
    }
}

/// One step of leaving a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwindStep {
    /// Pop a scope object
    PopScope,
    /// Remove an exception handler
    PopExcept,
}

/// Stack of frames, innermost last.
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    frames: Vec<ContextFrame>,
}

impl ContextStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a frame.
    pub fn push(&mut self, frame: ContextFrame) -> Result<()> {
        self.frames.try_reserve(1)?;
        self.frames.push(frame);
        Ok(())
    }

    /// Leaves the innermost frame.
    pub fn pop(&mut self) -> Option<ContextFrame> {
        self.frames.pop()
    }

    /// Number of active frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame is active.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Innermost frame accepting `break`, with its index.
    pub fn find_break(&self) -> Option<(usize, Label)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, frame)| frame.break_label.map(|label| (index, label)))
    }

    /// Innermost frame accepting `continue`, with its index.
    pub fn find_continue(&self) -> Option<(usize, Label)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, frame)| frame.continue_label.map(|label| (index, label)))
    }

    /// Scope and handler pops needed to leave every frame from the innermost
    /// down to `target` inclusive, innermost first.
    pub fn unwind_steps(&self, target: usize) -> impl Iterator<Item = UnwindStep> + '_ {
        self.frames[target..].iter().rev().flat_map(|frame| {
            let scope = frame.has_scope.then_some(UnwindStep::PopScope);
            let except = frame.has_exception_frame.then_some(UnwindStep::PopExcept);
            scope.into_iter().chain(except)
        })
    }

    /// Stack cells to pop when leaving down to `target`.
    ///
    /// The target's own cells are only counted when `release_target` is set:
    /// `break` leaves the target statement, `continue` stays inside it.
    pub fn unwind_cells(&self, target: usize, release_target: bool) -> u32 {
        let inner: u32 = self.frames[target + 1..]
            .iter()
            .map(|frame| frame.stack_cells)
            .sum();
        if release_target {
            inner + self.frames[target].stack_cells
        } else {
            inner
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::labels::LabelTable;

    fn labels(n: usize) -> Vec<Label> {
        let mut table = LabelTable::new();
        (0..n).map(|_| table.alloc().unwrap()).collect()
    }

    #[test]
    fn test_find_skips_frames_without_labels() {
        let l = labels(3);
        let mut stack = ContextStack::new();
        stack.push(ContextFrame::looping(l[0], l[1], 0)).unwrap();
        stack.push(ContextFrame::switch(l[2])).unwrap();
        stack.push(ContextFrame::scope()).unwrap();

        assert_eq!(stack.find_break(), Some((1, l[2])));
        assert_eq!(stack.find_continue(), Some((0, l[1])));
    }

    #[test]
    fn test_nothing_to_find() {
        let mut stack = ContextStack::new();
        stack.push(ContextFrame::exception(2)).unwrap();
        assert_eq!(stack.find_break(), None);
        assert_eq!(stack.find_continue(), None);
    }

    #[test]
    fn test_unwind_order_and_cells() {
        let l = labels(2);
        let mut stack = ContextStack::new();
        stack.push(ContextFrame::looping(l[0], l[1], 4)).unwrap();
        stack.push(ContextFrame::scope()).unwrap();
        stack.push(ContextFrame::exception(2)).unwrap();

        let steps: Vec<_> = stack.unwind_steps(0).collect();
        assert_eq!(steps, vec![UnwindStep::PopExcept, UnwindStep::PopScope]);
        assert_eq!(stack.unwind_cells(0, true), 6);
        assert_eq!(stack.unwind_cells(0, false), 2);
    }

    #[test]
    fn test_push_pop_balance() {
        let mut stack = ContextStack::new();
        stack.push(ContextFrame::cells(2)).unwrap();
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.pop(), Some(ContextFrame::cells(2)));
        assert!(stack.is_empty());
    }
}
