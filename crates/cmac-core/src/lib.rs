// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # cmac-core
//!
//! Compiler backend and stack machine for a small C-like language.
//!
//! ## Overview
//!
//! This crate takes an already-parsed program and carries it the rest of
//! the way:
//! - Scoped semantic analysis with accumulated diagnostics
//! - Code generation to labeled stack-machine bytecode
//! - A text format for that bytecode
//! - A frame-based virtual machine that executes it
//!
//! ## Quick Start
//!
//! ```rust
//! use cmac_core::ast::{BinaryOp, Expr, Function, Program, Stmt, Type};
//! use cmac_core::{Pipeline, Value};
//!
//! let main = Function::new(
//!     "main",
//!     Type::Int,
//!     vec![],
//!     vec![
//!         Stmt::decl_init(Type::Int, "x", Expr::int(5)),
//!         Stmt::assign("x", Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::int(2))),
//!         Stmt::ret(Expr::var("x")),
//!     ],
//! );
//! let result = Pipeline::default().run(&Program::new(vec![main])).unwrap();
//! assert_eq!(result, Value::Int(7));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod semantic;
pub mod vm;

// Re-exports for convenience
pub use compiler::{Bytecode, Generator};
pub use config::{CodegenConfig, Config, MachineConfig};
pub use error::{CodegenError, Diagnostic, Error, Fault, Result};
pub use semantic::Analyzer;
pub use vm::{Machine, MachineState, Value};

use ast::Program;
use tracing::debug;

/// Runs programs through analysis, generation and execution.
///
/// Each call builds fresh component instances, so one pipeline can be shared
/// by independent jobs.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    /// Creates a pipeline with the given configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Analyzes `program`, returning every diagnostic found.
    pub fn check(&self, program: &Program) -> Vec<Diagnostic> {
        Analyzer::new().analyze(program)
    }

    /// Analyzes and then generates bytecode. Any diagnostic stops the
    /// pipeline before generation.
    pub fn compile(&self, program: &Program) -> Result<Bytecode> {
        let diagnostics = self.check(program);
        if !diagnostics.is_empty() {
            debug!(count = diagnostics.len(), "analysis rejected program");
            return Err(Error::Semantic(diagnostics));
        }
        let bytecode = Generator::new(self.config.codegen.clone()).generate(program)?;
        Ok(bytecode)
    }

    /// Compiles and executes `program`.
    pub fn run(&self, program: &Program) -> Result<Value> {
        let bytecode = self.compile(program)?;
        self.execute(&bytecode)
    }

    /// Executes already-generated bytecode on a fresh machine.
    pub fn execute(&self, bytecode: &Bytecode) -> Result<Value> {
        let value = Machine::new(self.config.machine.clone()).execute(bytecode)?;
        Ok(value)
    }
}
