// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::compiler::bytecode::{Bytecode, Instruction, OpCode, Operand};
use crate::config::MachineConfig;
use crate::error::Fault;
use crate::vm::Value;

/// Lifecycle of a [`Machine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// Created or loaded, not yet run
    Ready,
    /// Executing
    Running,
    /// Finished, either by returning or by faulting
    Halted,
}

/// An activation record.
#[derive(Debug, Clone, Copy, Default)]
struct Frame {
    /// Where the caller resumes
    return_pc: usize,
    /// Frame pointer: memory index of slot 0
    fp: usize,
    /// Slots owned by this frame
    size: usize,
    /// Operand stack height below this frame's operands
    stack_base: usize,
}

/// The stack machine that executes bytecode.
#[derive(Debug, Clone)]
pub struct Machine {
    config: MachineConfig,
    /// Loaded instructions, labels stripped
    program: Vec<Instruction>,
    /// Label name to instruction index
    labels: FxHashMap<String, usize>,
    /// The operand stack
    stack: Vec<Value>,
    /// Flat memory, zero-initialised
    memory: Vec<Value>,
    /// Program counter
    pc: usize,
    /// Current frame
    frame: Frame,
    /// Saved caller frames
    call_stack: Vec<Frame>,
    state: MachineState,
}

impl Machine {
    /// Creates a machine with an empty program.
    pub fn new(config: MachineConfig) -> Self {
        let memory = vec![Value::default(); config.memory_size.min(config.max_memory)];
        Self {
            config,
            program: Vec::new(),
            labels: FxHashMap::default(),
            stack: Vec::with_capacity(256),
            memory,
            pc: 0,
            frame: Frame::default(),
            call_stack: Vec::with_capacity(64),
            state: MachineState::Ready,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MachineState {
        self.state
    }

    /// The operand stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// The whole memory.
    pub fn memory(&self) -> &[Value] {
        &self.memory
    }

    /// Loads a program, resolving its labels.
    pub fn load(&mut self, bytecode: &Bytecode) -> Result<(), Fault> {
        if self.state != MachineState::Ready {
            return Err(Fault::AlreadyHalted);
        }
        self.labels = bytecode.label_table()?;
        self.program = bytecode.instructions().cloned().collect();
        self.pc = 0;
        debug!(
            instructions = self.program.len(),
            labels = self.labels.len(),
            "loaded program"
        );
        Ok(())
    }

    /// Runs the loaded program to completion.
    ///
    /// The result is the top of the operand stack when the outermost
    /// `RETURN` executes or the program counter runs off the end, or `0` if
    /// the stack is empty. The machine is halted afterwards, whether or not
    /// it faulted.
    pub fn run(&mut self) -> Result<Value, Fault> {
        if self.state != MachineState::Ready {
            return Err(Fault::AlreadyHalted);
        }
        self.state = MachineState::Running;

        let program = std::mem::take(&mut self.program);
        let result = self.execute_loop(&program);
        self.program = program;
        self.state = MachineState::Halted;

        match &result {
            Ok(value) => debug!(%value, "halted"),
            Err(fault) => debug!(%fault, pc = self.pc, "faulted"),
        }
        result
    }

    /// Loads and runs `bytecode`.
    pub fn execute(&mut self, bytecode: &Bytecode) -> Result<Value, Fault> {
        self.load(bytecode)?;
        self.run()
    }

    fn execute_loop(&mut self, program: &[Instruction]) -> Result<Value, Fault> {
        loop {
            let Some(instruction) = program.get(self.pc) else {
                return Ok(self.stack.pop().unwrap_or_default());
            };
            if self.config.trace {
                trace!(
                    pc = self.pc,
                    %instruction,
                    depth = self.call_stack.len(),
                    stack = ?self.stack,
                    "step"
                );
            }
            self.pc += 1;

            match instruction.opcode {
                // Frame management
                OpCode::Enter => {
                    let n = self.count_operand(instruction)?;
                    self.frame.stack_base = self.stack.len().saturating_sub(n);
                    let size = self.frame.size.max(n);
                    self.grow_frame(size)?;
                }
                OpCode::Alloc => {
                    let n = self.count_operand(instruction)?;
                    let size = self.frame.size.saturating_add(n);
                    self.grow_frame(size)?;
                }

                // Stack and memory
                OpCode::Loadc => {
                    let value = self.constant(instruction)?;
                    self.stack.push(value);
                }
                OpCode::Loada => {
                    let address = self.address(self.offset_operand(instruction)?)?;
                    self.stack.push(self.memory[address]);
                }
                OpCode::Storea => {
                    let address = self.address(self.offset_operand(instruction)?)?;
                    let value = self.pop(OpCode::Storea)?;
                    self.memory[address] = value;
                }
                OpCode::Load => {
                    let offset = self.pop_offset(OpCode::Load)?;
                    let address = self.address(offset)?;
                    self.stack.push(self.memory[address]);
                }
                OpCode::Store => {
                    let offset = self.pop_offset(OpCode::Store)?;
                    let value = self.pop(OpCode::Store)?;
                    let address = self.address(offset)?;
                    self.memory[address] = value;
                }
                OpCode::Pop => {
                    self.pop(OpCode::Pop)?;
                }

                // Arithmetic
                OpCode::Add => self.binary_op(OpCode::Add, |a, b| a + b)?,
                OpCode::Sub => self.binary_op(OpCode::Sub, |a, b| a - b)?,
                OpCode::Mul => self.binary_op(OpCode::Mul, |a, b| a * b)?,
                OpCode::Div => self.binary_op(OpCode::Div, |a, b| a / b)?,
                OpCode::Mod => self.binary_op(OpCode::Mod, |a, b| a % b)?,
                OpCode::Neg => {
                    let value = self.pop(OpCode::Neg)?;
                    self.stack.push(-value);
                }

                // Comparison and logic
                OpCode::Eq => self.binary_op(OpCode::Eq, Value::equals)?,
                OpCode::Ge => self.binary_op(OpCode::Ge, Value::greater)?,
                OpCode::Le => self.binary_op(OpCode::Le, Value::less)?,
                OpCode::And => self.binary_op(OpCode::And, Value::and)?,
                OpCode::Or => self.binary_op(OpCode::Or, Value::or)?,
                OpCode::Not => {
                    let value = self.pop(OpCode::Not)?;
                    self.stack.push(!value);
                }

                // Control flow
                OpCode::Jump => {
                    self.pc = self.target(instruction)?;
                }
                OpCode::Jumpz => {
                    let target = self.target(instruction)?;
                    if self.pop(OpCode::Jumpz)?.is_zero() {
                        self.pc = target;
                    }
                }
                OpCode::Call => {
                    let target = self.target(instruction)?;
                    let caller = Frame {
                        return_pc: self.pc,
                        ..self.frame
                    };
                    self.call_stack.push(caller);
                    self.frame = Frame {
                        return_pc: self.pc,
                        fp: caller.fp + caller.size,
                        size: 0,
                        stack_base: self.stack.len(),
                    };
                    self.pc = target;
                }
                OpCode::Return => {
                    let result = if self.stack.len() > self.frame.stack_base {
                        self.stack.pop().unwrap_or_default()
                    } else {
                        Value::Int(0)
                    };
                    let Some(caller) = self.call_stack.pop() else {
                        return Ok(result);
                    };
                    self.stack.truncate(self.frame.stack_base);
                    self.stack.push(result);
                    self.pc = caller.return_pc;
                    self.frame = caller;
                }
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn pop(&mut self, opcode: OpCode) -> Result<Value, Fault> {
        self.stack
            .pop()
            .ok_or(Fault::StackUnderflow(opcode.name()))
    }

    fn binary_op<F>(&mut self, opcode: OpCode, op: F) -> Result<(), Fault>
    where
        F: Fn(Value, Value) -> Value,
    {
        let b = self.pop(opcode)?;
        let a = self.pop(opcode)?;
        self.stack.push(op(a, b));
        Ok(())
    }

    /// Pops a frame-relative address.
    fn pop_offset(&mut self, opcode: OpCode) -> Result<i64, Fault> {
        match self.pop(opcode)? {
            Value::Int(offset) => Ok(offset),
            value => Err(Fault::InvalidOperand {
                opcode: opcode.name(),
                operand: value.to_string(),
            }),
        }
    }

    /// Translates a frame-relative offset into a memory index.
    fn address(&self, offset: i64) -> Result<usize, Fault> {
        let address = (self.frame.fp as i64).wrapping_add(offset);
        match usize::try_from(address) {
            Ok(index) if index < self.memory.len() => Ok(index),
            _ => Err(Fault::OutOfBoundsAccess { address }),
        }
    }

    /// Extends the current frame to `size` slots, zeroing the new ones.
    ///
    /// Memory grows to cover the frame but never past `max_memory`.
    fn grow_frame(&mut self, size: usize) -> Result<(), Fault> {
        let start = self.frame.fp + self.frame.size;
        let end = self.frame.fp.saturating_add(size);
        if end > self.memory.len() {
            if end > self.config.max_memory {
                return Err(Fault::MemoryLimit {
                    requested: end,
                    limit: self.config.max_memory,
                });
            }
            self.memory.resize(end, Value::default());
        }
        if end > start {
            self.memory[start..end].fill(Value::default());
        }
        self.frame.size = self.frame.size.max(size);
        Ok(())
    }

    fn constant(&self, instruction: &Instruction) -> Result<Value, Fault> {
        match &instruction.operand {
            Some(Operand::Int(n)) => Ok(Value::Int(*n)),
            Some(Operand::Float(n)) => Ok(Value::Float(*n)),
            Some(Operand::Char(c)) => Ok(Value::Int(*c as i64)),
            Some(Operand::Label(name)) => self
                .labels
                .get(name)
                .map(|&pc| Value::Int(pc as i64))
                .ok_or_else(|| Fault::UndefinedLabel(name.clone())),
            other => Err(invalid_operand(instruction.opcode, other.as_ref())),
        }
    }

    fn count_operand(&self, instruction: &Instruction) -> Result<usize, Fault> {
        match &instruction.operand {
            Some(Operand::Int(n)) if *n >= 0 => Ok(*n as usize),
            other => Err(invalid_operand(instruction.opcode, other.as_ref())),
        }
    }

    fn offset_operand(&self, instruction: &Instruction) -> Result<i64, Fault> {
        match &instruction.operand {
            Some(Operand::Int(n)) => Ok(*n),
            other => Err(invalid_operand(instruction.opcode, other.as_ref())),
        }
    }

    fn target(&self, instruction: &Instruction) -> Result<usize, Fault> {
        match &instruction.operand {
            Some(Operand::Label(name)) => self
                .labels
                .get(name)
                .copied()
                .ok_or_else(|| Fault::UndefinedLabel(name.clone())),
            other => Err(invalid_operand(instruction.opcode, other.as_ref())),
        }
    }
}

fn invalid_operand(opcode: OpCode, operand: Option<&Operand>) -> Fault {
    Fault::InvalidOperand {
        opcode: opcode.name(),
        operand: operand.map(|operand| operand.to_string()).unwrap_or_default(),
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(MachineConfig::default())
    }
}
