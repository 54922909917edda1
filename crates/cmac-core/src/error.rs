// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for analysis, code generation and execution.
//!
//! The three tiers never convert into one another:
//!
//! - [`Diagnostic`] is collected by the analyzer and never aborts the pass.
//! - [`CodegenError`] aborts generation; partial output is discarded.
//! - [`Fault`] aborts bytecode loading or execution.
//!
//! [`Error`] wraps all three for callers driving the whole pipeline.

use thiserror::Error;

use crate::ast::Type;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the scope table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// The name already exists in the innermost scope
    #[error("Symbol '{0}' already defined in this scope")]
    Redeclared(String),

    /// Attempted to pop the global scope
    #[error("Cannot exit global scope")]
    ScopeUnderflow,
}

/// The kind of entity a diagnostic talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// A scalar variable
    Variable,
    /// A function parameter
    Parameter,
    /// An array
    Array,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Variable => f.write_str("Variable"),
            Entity::Parameter => f.write_str("Parameter"),
            Entity::Array => f.write_str("Array"),
        }
    }
}

/// A semantic diagnostic produced by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    /// A function name was defined twice
    #[error("Function '{0}' already declared")]
    DuplicateFunction(String),

    /// A parameter has no name or a `void` type
    #[error("Invalid parameter {position} of function '{function}'")]
    InvalidParameter { function: String, position: usize },

    /// A name was declared twice in the same scope
    #[error("{entity} '{name}' already declared")]
    DuplicateSymbol { entity: Entity, name: String },

    /// A variable or array was declared with type `void`
    #[error("{entity} '{name}' declared void")]
    VoidVariable { entity: Entity, name: String },

    /// An array size expression is not an `int`
    #[error("Array size for '{name}' must be int, got {found}")]
    InvalidArraySize { name: String, found: Type },

    /// An initializer does not match the declared type
    #[error("Type mismatch in declaration: {declared} {name} = {found}")]
    DeclarationTypeMismatch {
        name: String,
        declared: Type,
        found: Type,
    },

    /// An assigned value does not match the target's declared type
    #[error("Type mismatch in assignment to '{name}': {declared} = {found}")]
    AssignmentTypeMismatch {
        name: String,
        declared: Type,
        found: Type,
    },

    /// Assignment to a name that was never declared
    #[error("Assignment to undeclared variable '{0}'")]
    UndeclaredVariable(String),

    /// Read of a name that was never declared
    #[error("Use of undeclared variable '{0}'")]
    UnknownIdentifier(String),

    /// An array or function name used where a scalar is expected
    #[error("'{0}' is not a scalar variable")]
    NotAScalar(String),

    /// A return value does not match the function's return type
    #[error("Return type mismatch: expected {expected}, got {found}")]
    ReturnTypeMismatch { expected: Type, found: Type },

    /// `return expr;` in a void function where `expr` is itself void
    #[error("Void function cannot return a value")]
    VoidReturnValue,

    /// Call to a name that is not a declared function
    #[error("Call to undeclared function '{0}'")]
    UndeclaredFunction(String),

    /// Wrong number of call arguments
    #[error(
        "Function '{name}' called with wrong number of arguments: expected {expected}, got {found}"
    )]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// A call argument does not match its parameter type
    #[error(
        "Type mismatch in argument {position} of call to '{name}': expected {expected}, got {found}"
    )]
    ArgumentTypeMismatch {
        name: String,
        /// 1-based argument position
        position: usize,
        expected: Type,
        found: Type,
    },

    /// Indexing a name that is not an array
    #[error("Access to undeclared or non-array variable '{0}'")]
    UndeclaredOrNonArray(String),

    /// An array index expression is not an `int`
    #[error("Array index for '{name}' must be int, got {found}")]
    InvalidIndexType { name: String, found: Type },

    /// Binary operands of different types
    #[error("Type mismatch in binary operation '{op}': {left} vs {right}")]
    BinOpTypeMismatch {
        op: crate::ast::BinaryOp,
        left: Type,
        right: Type,
    },

    /// Unary operand of an unsupported type
    #[error("Unary operator '{op}' not applicable to {found}")]
    UnaryOperandTypeMismatch {
        op: crate::ast::UnaryOp,
        found: Type,
    },

    /// `break` or `continue` outside any loop
    #[error("'{0}' outside of loop")]
    BreakOrContinueOutsideLoop(&'static str),
}

/// Fatal code generation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// Reference to a variable without a slot
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    /// Call to a function that is not part of the program
    #[error("Undefined function: {0}")]
    UndefinedFunction(String),

    /// An array name used where a scalar is expected, or vice versa
    #[error("'{0}' has no scalar slot")]
    NotAScalar(String),

    /// Indexing a name that is not an array
    #[error("'{0}' is not an array")]
    NotAnArray(String),

    /// Array size is not a non-negative integer literal
    #[error("Array '{0}' must have a constant non-negative integer size")]
    NonConstantArraySize(String),

    /// String literals have no representation in numeric memory
    #[error("String literals are not supported by the target machine")]
    UnsupportedString,

    /// `break` with no enclosing loop
    #[error("'break' outside of loop")]
    BreakOutsideLoop,

    /// `continue` with no enclosing loop
    #[error("'continue' outside of loop")]
    ContinueOutsideLoop,

    /// The configured entry function does not exist
    #[error("Entry function '{0}' not found")]
    MissingEntryPoint(String),

    /// Two functions share a name
    #[error("Function '{0}' defined more than once")]
    DuplicateFunction(String),

    /// Scope bookkeeping failed
    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Fatal machine faults, raised while loading or executing bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// An opcode needed more operands than the stack holds
    #[error("Stack underflow on {0}")]
    StackUnderflow(&'static str),

    /// A memory address outside `[0, memory size)`
    #[error("Memory access out of bounds at address {address}")]
    OutOfBoundsAccess { address: i64 },

    /// Memory growth past the configured ceiling
    #[error("Memory limit exceeded: {requested} slots requested, limit is {limit}")]
    MemoryLimit { requested: usize, limit: usize },

    /// A jump or call to a label that is not defined
    #[error("Undefined label: {0}")]
    UndefinedLabel(String),

    /// An instruction name the machine does not know
    #[error("Unknown instruction '{name}' on line {line}")]
    UnknownOpcode { name: String, line: usize },

    /// An operand that cannot be used by its opcode
    #[error("Invalid operand for {opcode}: {operand}")]
    InvalidOperand {
        opcode: &'static str,
        operand: String,
    },

    /// An operand that failed to parse
    #[error("Malformed operand '{text}' on line {line}")]
    MalformedOperand { text: String, line: usize },

    /// An opcode that requires an operand appeared without one
    #[error("{opcode} on line {line} requires an operand")]
    MissingOperand { opcode: &'static str, line: usize },

    /// An opcode that takes no operand was given one
    #[error("{opcode} on line {line} takes no operand")]
    UnexpectedOperand { opcode: &'static str, line: usize },

    /// A label defined more than once
    #[error("Label '{0}' defined more than once")]
    DuplicateLabel(String),

    /// The machine already ran to completion
    #[error("Machine has already halted")]
    AlreadyHalted,
}

/// Errors from running the whole pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Semantic analysis reported one or more diagnostics
    #[error("semantic analysis failed with {} error(s): {}", .0.len(), join(.0))]
    Semantic(Vec<Diagnostic>),

    /// Code generation failed
    #[error("code generation failed: {0}")]
    Codegen(#[from] CodegenError),

    /// Execution faulted
    #[error("execution fault: {0}")]
    Fault(#[from] Fault),
}

fn join(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
