// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Slot allocation for the code generator.
//!
//! Offsets are frame-relative and handed out in declaration order. An offset
//! is never reused within a function, even after its scope is popped, so the
//! high-water mark is the frame size.

use crate::error::ScopeError;
use crate::semantic::ScopeStack;

/// Where a name lives in the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// A single value at this offset
    Scalar(usize),
    /// `size` contiguous values starting at `base`
    Array { base: usize, size: usize },
}

/// Maps names to frame offsets, scoped like the analyzer's symbol table.
#[derive(Debug, Default)]
pub struct SlotTable {
    scopes: ScopeStack<Slot>,
    next: usize,
}

impl SlotTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fresh frame: offsets restart at 0 inside a new scope.
    pub fn enter_function(&mut self) {
        self.scopes = ScopeStack::new();
        self.scopes.push_scope();
        self.next = 0;
    }

    /// Enter a nested scope.
    pub fn push_scope(&mut self) {
        self.scopes.push_scope();
    }

    /// Leave the innermost scope.
    pub fn pop_scope(&mut self) -> Result<(), ScopeError> {
        self.scopes.pop_scope()
    }

    /// Assigns the next offset to a scalar.
    pub fn bind_scalar(&mut self, name: &str) -> Result<usize, ScopeError> {
        let offset = self.next;
        self.scopes.declare(name, Slot::Scalar(offset))?;
        self.next += 1;
        Ok(offset)
    }

    /// Reserves `size` contiguous offsets for an array and returns the base.
    pub fn bind_array(&mut self, name: &str, size: usize) -> Result<usize, ScopeError> {
        let base = self.next;
        self.scopes.declare(name, Slot::Array { base, size })?;
        self.next += size;
        Ok(base)
    }

    /// Resolves a name, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<Slot> {
        self.scopes.lookup(name).copied()
    }

    /// Number of offsets handed out in the current frame.
    pub fn frame_size(&self) -> usize {
        self.next
    }
}
