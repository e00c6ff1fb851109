// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Constant storage shared by every chunk of a compilation unit.
//!
//! String literals and doubles are appended as-is. Identifiers are interned:
//! the same name always yields the same [`IdentId`] within a unit.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{Result, index_u32};

/// Index of a string constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrId(pub(crate) u32);

/// Index of a double constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DoubleId(pub(crate) u32);

/// Index of an interned identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentId(pub(crate) u32);

/// Pool sizes at a point in time, for rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantCheckpoint {
    strings: usize,
    doubles: usize,
    identifiers: usize,
}

/// The constant pool.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    strings: Vec<Box<str>>,
    doubles: Vec<f64>,
    identifiers: Vec<Rc<str>>,
    interned: FxHashMap<Rc<str>, IdentId>,
}

impl ConstantPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies a string literal into the pool.
    pub fn add_string(&mut self, value: &str) -> Result<StrId> {
        let id = StrId(index_u32(self.strings.len())?);
        let mut owned = String::new();
        owned.try_reserve_exact(value.len())?;
        owned.push_str(value);
        self.strings.try_reserve(1)?;
        self.strings.push(owned.into_boxed_str());
        Ok(id)
    }

    /// Adds a double constant.
    pub fn add_double(&mut self, value: f64) -> Result<DoubleId> {
        let id = DoubleId(index_u32(self.doubles.len())?);
        self.doubles.try_reserve(1)?;
        self.doubles.push(value);
        Ok(id)
    }

    /// Interns an identifier, returning the existing id if already present.
    pub fn intern(&mut self, name: &str) -> Result<IdentId> {
        if let Some(&id) = self.interned.get(name) {
            return Ok(id);
        }

        let id = IdentId(index_u32(self.identifiers.len())?);
        let name: Rc<str> = Rc::from(name);
        self.identifiers.try_reserve(1)?;
        self.interned.try_reserve(1)?;
        self.identifiers.push(Rc::clone(&name));
        self.interned.insert(name, id);
        Ok(id)
    }

    /// Returns a string constant.
    pub fn string(&self, id: StrId) -> &str {
        &self.strings[id.0 as usize]
    }

    /// Returns a double constant.
    pub fn double(&self, id: DoubleId) -> f64 {
        self.doubles[id.0 as usize]
    }

    /// Returns an interned identifier.
    pub fn identifier(&self, id: IdentId) -> &str {
        &self.identifiers[id.0 as usize]
    }

    /// Number of distinct identifiers.
    pub fn identifier_count(&self) -> usize {
        self.identifiers.len()
    }

    /// Records the current pool sizes.
    pub fn checkpoint(&self) -> ConstantCheckpoint {
        ConstantCheckpoint {
            strings: self.strings.len(),
            doubles: self.doubles.len(),
            identifiers: self.identifiers.len(),
        }
    }

    /// Discards everything added after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: ConstantCheckpoint) {
        self.strings.truncate(checkpoint.strings);
        self.doubles.truncate(checkpoint.doubles);
        for name in self.identifiers.drain(checkpoint.identifiers..) {
            self.interned.remove(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let mut pool = ConstantPool::new();
        let a = pool.intern("foo").unwrap();
        let b = pool.intern("bar").unwrap();
        let c = pool.intern("foo").unwrap();
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.identifier(b), "bar");
        assert_eq!(pool.identifier_count(), 2);
    }

    #[test]
    fn test_strings_are_not_deduplicated() {
        let mut pool = ConstantPool::new();
        let a = pool.add_string("x").unwrap();
        let b = pool.add_string("x").unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.string(b), "x");
    }

    #[test]
    fn test_rollback_forgets_interned_names() {
        let mut pool = ConstantPool::new();
        let kept = pool.intern("kept").unwrap();
        pool.add_double(1.5).unwrap();
        let checkpoint = pool.checkpoint();

        pool.intern("dropped").unwrap();
        pool.add_string("s").unwrap();
        pool.add_double(2.5).unwrap();
        pool.rollback(checkpoint);

        assert_eq!(pool.checkpoint(), checkpoint);
        assert_eq!(pool.intern("kept").unwrap(), kept);
        // Re-interning reuses the freed slot
        assert_eq!(pool.intern("dropped").unwrap(), IdentId(1));
        assert_eq!(pool.double(DoubleId(0)), 1.5);
    }
}
