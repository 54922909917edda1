// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Lexically scoped name tables.
//!
//! [`ScopeStack`] is generic over what it stores so the analyzer
//! ([`SymbolTable`]) and the code generator's slot table share one scope
//! discipline.

use crate::ast::Type;
use crate::error::ScopeError;

/// A name bound in some scope.
#[derive(Debug, Clone)]
pub struct Binding<T> {
    /// The bound name
    pub name: String,
    /// The scope depth where this was declared
    pub depth: usize,
    /// Payload
    pub value: T,
}

/// A stack of nested scopes. Depth 0 is the global scope and is never popped.
#[derive(Debug, Clone)]
pub struct ScopeStack<T> {
    bindings: Vec<Binding<T>>,
    depth: usize,
}

impl<T> Default for ScopeStack<T> {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            depth: 0,
        }
    }
}

impl<T> ScopeStack<T> {
    /// Creates a table holding only the (empty) global scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current scope depth (0 = global).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enter a new scope.
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave the current scope, dropping everything declared in it.
    pub fn pop_scope(&mut self) -> Result<(), ScopeError> {
        if self.depth == 0 {
            return Err(ScopeError::ScopeUnderflow);
        }
        while self
            .bindings
            .last()
            .is_some_and(|binding| binding.depth == self.depth)
        {
            self.bindings.pop();
        }
        self.depth -= 1;
        Ok(())
    }

    /// Declare `name` in the current scope.
    ///
    /// Shadowing a name from an enclosing scope is allowed; redeclaring one
    /// in the current scope is not.
    pub fn declare(&mut self, name: impl Into<String>, value: T) -> Result<(), ScopeError> {
        let name = name.into();
        if self.is_declared_in_current(&name) {
            return Err(ScopeError::Redeclared(name));
        }
        self.bindings.push(Binding {
            name,
            depth: self.depth,
            value,
        });
        Ok(())
    }

    /// Whether `name` is declared in the innermost scope.
    pub fn is_declared_in_current(&self, name: &str) -> bool {
        self.bindings
            .iter()
            .rev()
            .take_while(|binding| binding.depth == self.depth)
            .any(|binding| binding.name == name)
    }

    /// Resolve `name`, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&T> {
        self.bindings
            .iter()
            .rev()
            .find(|binding| binding.name == name)
            .map(|binding| &binding.value)
    }
}

/// What a symbol names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    /// Local variable
    Var,
    /// Function parameter
    Param,
    /// Array; holds the size when it is a literal
    Array(Option<i64>),
    /// Function; holds the ordered parameter types
    Func(Vec<Type>),
}

/// Information recorded for a declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    /// Declared type (element type for arrays, return type for functions)
    pub ty: Type,
    /// What the name refers to
    pub kind: SymbolKind,
}

impl SymbolInfo {
    /// Whether this symbol can be read or assigned as a scalar.
    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, SymbolKind::Var | SymbolKind::Param)
    }
}

/// The analyzer's symbol table.
pub type SymbolTable = ScopeStack<SymbolInfo>;

#[cfg(test)]
mod tests {
    use super::*;

    fn var(ty: Type) -> SymbolInfo {
        SymbolInfo {
            ty,
            kind: SymbolKind::Var,
        }
    }

    #[test]
    fn test_scope_new() {
        let table = SymbolTable::new();
        assert_eq!(table.depth(), 0);
        assert!(table.lookup("x").is_none());
    }

    #[test]
    fn test_scope_push_pop() {
        let mut table = SymbolTable::new();
        table.push_scope();
        assert_eq!(table.depth(), 1);
        table.pop_scope().unwrap();
        assert_eq!(table.depth(), 0);
    }

    #[test]
    fn test_pop_global_underflows() {
        let mut table = SymbolTable::new();
        assert_eq!(table.pop_scope(), Err(ScopeError::ScopeUnderflow));
    }

    #[test]
    fn test_redeclare_in_same_scope() {
        let mut table = SymbolTable::new();
        table.push_scope();
        table.declare("x", var(Type::Int)).unwrap();
        assert_eq!(
            table.declare("x", var(Type::Float)),
            Err(ScopeError::Redeclared("x".into()))
        );
    }

    #[test]
    fn test_shadowing_and_restore() {
        let mut table = SymbolTable::new();
        table.push_scope();
        table.declare("x", var(Type::Int)).unwrap();
        table.push_scope();
        table.declare("x", var(Type::Float)).unwrap();
        assert_eq!(table.lookup("x").map(|s| s.ty), Some(Type::Float));
        table.pop_scope().unwrap();
        assert_eq!(table.lookup("x").map(|s| s.ty), Some(Type::Int));
    }

    #[test]
    fn test_sibling_scopes_do_not_leak() {
        let mut table = SymbolTable::new();
        table.push_scope();
        table.declare("y", var(Type::Int)).unwrap();
        table.pop_scope().unwrap();
        assert!(table.lookup("y").is_none());

        table.push_scope();
        assert!(table.declare("y", var(Type::Int)).is_ok());
    }

    #[test]
    fn test_lookup_reaches_global() {
        let mut table = SymbolTable::new();
        table
            .declare(
                "f",
                SymbolInfo {
                    ty: Type::Int,
                    kind: SymbolKind::Func(vec![Type::Int]),
                },
            )
            .unwrap();
        table.push_scope();
        table.push_scope();
        let info = table.lookup("f").unwrap();
        assert_eq!(info.kind, SymbolKind::Func(vec![Type::Int]));
        assert!(!info.is_scalar());
    }
}
