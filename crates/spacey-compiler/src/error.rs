// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the compiler.

use std::collections::TryReserveError;

use thiserror::Error;

/// Result type for compiler operations.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors produced while lowering an AST to bytecode.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileError {
    /// An allocation failed or the configured code size cap was reached.
    #[error("out of memory while emitting bytecode")]
    OutOfMemory,

    /// A construct has no bytecode lowering in the current context and
    /// interpreter fallback is not permitted there.
    #[error("construct cannot be compiled to bytecode here")]
    NotImplemented,
}

impl From<TryReserveError> for CompileError {
    fn from(_: TryReserveError) -> Self {
        CompileError::OutOfMemory
    }
}

/// Converts a collection length into a 32-bit index.
pub(crate) fn index_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| CompileError::OutOfMemory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_failure_maps_to_oom() {
        let mut v: Vec<u64> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        assert_eq!(CompileError::from(err), CompileError::OutOfMemory);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            CompileError::NotImplemented.to_string(),
            "construct cannot be compiled to bytecode here"
        );
    }
}
