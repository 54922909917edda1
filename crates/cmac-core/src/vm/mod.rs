// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The stack machine.
//!
//! ## Structure
//!
//! - `interpreter` - Frame-based execution engine
//! - `value` - Numeric values and their floor/wrapping arithmetic
//!
//! ## Calling convention
//!
//! `CALL` saves the caller's frame and starts a new frame directly above it
//! in memory. `ENTER n` claims the top `n` operands as arguments, `ALLOC n`
//! adds zeroed local slots, and `LOADA`/`STOREA` address slots relative to
//! the frame pointer. `RETURN` pops the callee's operands, pushes its result
//! for the caller and restores the caller's frame; at the outermost frame it
//! halts the machine.

mod interpreter;
pub mod value;

pub use interpreter::{Machine, MachineState};
pub use value::Value;
