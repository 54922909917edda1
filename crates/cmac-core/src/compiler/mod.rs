// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode compiler for the C-like language.
//!
//! Transforms an analyzed AST into labeled stack-machine bytecode.
//!
//! # Module Structure
//!
//! - `bytecode`: Instructions, labels and the text format
//! - `codegen`: Code generation from AST
//!   - `codegen::slots`: Frame offset allocation

pub mod bytecode;
pub mod codegen;

pub use bytecode::{Bytecode, Instruction, Item, OpCode, Operand};
pub use codegen::{Generator, generate};
