// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Code generation from AST to bytecode.
//!
//! The [`Generator`] lowers an analyzed [`Program`] into labeled stack-machine
//! instructions. It keeps its own [`SlotTable`] and re-derives scoping the
//! same way the analyzer does, so it assumes analysis already succeeded.
//!
//! ## Layout
//!
//! ```text
//!     CALL main          // prologue
//!     RETURN
//! main:
//!     ENTER <params>
//!     ALLOC <locals>
//!     STOREA 0           // first argument
//!     ...
//!     STOREA <params-1>
//!     <body>
//!     RETURN             // appended unless the body ends in a return
//! ```
//!
//! ## Control flow
//!
//! ```text
//! if (c) t else e            while (c) b            for (i; c; u) b
//!
//!     <c>                    while.N:               <i>
//!     JUMPZ else.N               <c>                for.N:
//!     <t>                        JUMPZ wend.M           <c>
//!     JUMP endif.M               <b>                    JUMPZ fend.P
//! else.N:                        JUMP while.N           <b>
//!     <e>                    wend.M:                fnext.O:
//! endif.M:                                              <u>
//!                                                       JUMP for.N
//!                                                   fend.P:
//! ```
//!
//! An `else if` chain shares one `endif` label.

mod slots;


pub use slots::{Slot, SlotTable};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::ast::*;
use crate::compiler::bytecode::{Bytecode, Instruction, Item, OpCode, Operand};
use crate::config::CodegenConfig;
use crate::error::CodegenError;

/// Jump targets for `continue` and `break` in the innermost loop.
#[derive(Debug, Clone)]
struct LoopLabels {
    continue_label: String,
    break_label: String,
}

/// Lowers ASTs to bytecode.
#[derive(Debug)]
pub struct Generator {
    config: CodegenConfig,
    /// The bytecode being generated
    bytecode: Bytecode,
    /// Frame offsets for the function being lowered
    slots: SlotTable,
    /// Known functions and their parameter counts
    functions: FxHashMap<String, usize>,
    loops: Vec<LoopLabels>,
    /// Label counter, monotonic over the generator's lifetime
    next_label: usize,
}

impl Generator {
    /// Creates a generator.
    pub fn new(config: CodegenConfig) -> Self {
        Self {
            config,
            bytecode: Bytecode::new(),
            slots: SlotTable::new(),
            functions: FxHashMap::default(),
            loops: Vec::new(),
            next_label: 0,
        }
    }

    /// Lowers a whole program.
    ///
    /// On error nothing is returned; partial output is dropped.
    pub fn generate(&mut self, program: &Program) -> Result<Bytecode, CodegenError> {
        self.bytecode = Bytecode::new();
        self.loops.clear();
        self.collect_functions(program)?;

        let entry = self.config.entry.clone();
        if !self.functions.contains_key(&entry) {
            return Err(CodegenError::MissingEntryPoint(entry));
        }

        if self.config.comments {
            self.bytecode.comment(format!("entry: {}", entry));
        }
        self.emit_with(OpCode::Call, Operand::Label(entry));
        self.emit(OpCode::Return);

        for function in &program.functions {
            self.gen_function(function)?;
        }

        debug!(
            functions = program.functions.len(),
            instructions = self.bytecode.instructions().count(),
            "generated bytecode"
        );
        Ok(std::mem::take(&mut self.bytecode))
    }

    fn collect_functions(&mut self, program: &Program) -> Result<(), CodegenError> {
        self.functions.clear();
        for function in &program.functions {
            if self
                .functions
                .insert(function.name.clone(), function.params.len())
                .is_some()
            {
                return Err(CodegenError::DuplicateFunction(function.name.clone()));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Emission helpers
    // ========================================================================

    fn emit(&mut self, opcode: OpCode) {
        self.bytecode.emit(Instruction::simple(opcode));
    }

    fn emit_with(&mut self, opcode: OpCode, operand: Operand) {
        self.bytecode.emit(Instruction::with_operand(opcode, operand));
    }

    fn emit_jump(&mut self, opcode: OpCode, label: &str) {
        self.emit_with(opcode, Operand::Label(label.to_string()));
    }

    fn emit_offset(&mut self, opcode: OpCode, offset: usize) {
        self.emit_with(opcode, Operand::Int(offset as i64));
    }

    /// Returns a fresh `<prefix>.<n>` label.
    fn fresh_label(&mut self, prefix: &str) -> String {
        let label = format!("{}.{}", prefix, self.next_label);
        self.next_label += 1;
        label
    }

    fn with_scope<R>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<R, CodegenError>,
    ) -> Result<R, CodegenError> {
        self.slots.push_scope();
        let result = body(self);
        self.slots.pop_scope()?;
        result
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn gen_function(&mut self, function: &Function) -> Result<(), CodegenError> {
        if self.config.comments {
            let params: Vec<String> = function
                .params
                .iter()
                .map(|param| format!("{} {}", param.ty, param.name))
                .collect();
            self.bytecode.comment(format!(
                "{} {}({})",
                function.return_type,
                function.name,
                params.join(", ")
            ));
        }
        self.bytecode.label(function.name.clone());
        self.emit_offset(OpCode::Enter, function.params.len());

        // Patched once the body has been lowered and the frame size is known.
        let alloc_at = self
            .bytecode
            .emit(Instruction::with_operand(OpCode::Alloc, Operand::Int(0)));

        self.slots.enter_function();
        for param in &function.params {
            let offset = self.slots.bind_scalar(&param.name)?;
            self.emit_offset(OpCode::Storea, offset);
        }

        for stmt in &function.body {
            self.gen_stmt(stmt)?;
        }
        if !matches!(function.body.last(), Some(Stmt::Return(_))) {
            self.emit(OpCode::Return);
        }

        let locals = self.slots.frame_size() - function.params.len();
        self.bytecode.items[alloc_at] = Item::Instruction(Instruction::with_operand(
            OpCode::Alloc,
            Operand::Int(locals as i64),
        ));
        self.slots.pop_scope()?;

        debug!(
            function = %function.name,
            params = function.params.len(),
            locals,
            "lowered function"
        );
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match stmt {
            Stmt::VarDecl { name, .. } => {
                self.slots.bind_scalar(name)?;
            }
            Stmt::VarDeclInit { name, init, .. } => {
                let offset = self.slots.bind_scalar(name)?;
                self.gen_expr(init)?;
                self.emit_offset(OpCode::Storea, offset);
            }
            Stmt::ArrayDecl { name, size, .. } => {
                let size = size
                    .as_int_literal()
                    .and_then(|size| usize::try_from(size).ok())
                    .ok_or_else(|| CodegenError::NonConstantArraySize(name.clone()))?;
                self.slots.bind_array(name, size)?;
            }
            Stmt::Assign { name, value } => {
                let offset = self.scalar_offset(name)?;
                self.gen_expr(value)?;
                self.emit_offset(OpCode::Storea, offset);
            }
            Stmt::ArrayAssign { name, index, value } => {
                self.gen_expr(value)?;
                self.gen_element_address(name, index)?;
                self.emit(OpCode::Store);
            }
            Stmt::Return(value) => {
                if let Some(value) = value {
                    self.gen_expr(value)?;
                }
                self.emit(OpCode::Return);
            }
            Stmt::If { cond, then } => {
                let else_label = self.fresh_label("else");
                self.gen_expr(cond)?;
                self.emit_jump(OpCode::Jumpz, &else_label);
                self.gen_stmt(then)?;
                self.bytecode.label(else_label);
            }
            Stmt::IfElse {
                cond,
                then,
                otherwise,
            } => self.gen_if_else(cond, then, otherwise, None)?,
            Stmt::While { cond, body } => {
                let start = self.fresh_label("while");
                let end = self.fresh_label("wend");
                self.bytecode.label(start.clone());
                self.gen_expr(cond)?;
                self.emit_jump(OpCode::Jumpz, &end);
                self.gen_loop_body(body, &start, &end)?;
                self.emit_jump(OpCode::Jump, &start);
                self.bytecode.label(end);
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => self.with_scope(|this| {
                let start = this.fresh_label("for");
                let next = this.fresh_label("fnext");
                let end = this.fresh_label("fend");

                this.gen_stmt(init)?;
                this.bytecode.label(start.clone());
                if let Some(cond) = cond {
                    this.gen_expr(cond)?;
                    this.emit_jump(OpCode::Jumpz, &end);
                }
                this.gen_loop_body(body, &next, &end)?;
                this.bytecode.label(next);
                this.gen_stmt(update)?;
                this.emit_jump(OpCode::Jump, &start);
                this.bytecode.label(end);
                Ok(())
            })?,
            Stmt::Break => {
                let target = self
                    .loops
                    .last()
                    .map(|labels| labels.break_label.clone())
                    .ok_or(CodegenError::BreakOutsideLoop)?;
                self.emit_jump(OpCode::Jump, &target);
            }
            Stmt::Continue => {
                let target = self
                    .loops
                    .last()
                    .map(|labels| labels.continue_label.clone())
                    .ok_or(CodegenError::ContinueOutsideLoop)?;
                self.emit_jump(OpCode::Jump, &target);
            }
            Stmt::Block(stmts) => self.with_scope(|this| {
                for stmt in stmts {
                    this.gen_stmt(stmt)?;
                }
                Ok(())
            })?,
            Stmt::Expr(expr) => {
                self.gen_expr(expr)?;
                self.emit(OpCode::Pop);
            }
            Stmt::Empty => {}
        }
        Ok(())
    }

    /// Lowers one link of an if/else chain. Only the outermost link (the one
    /// called with `end == None`) places the shared end label.
    fn gen_if_else(
        &mut self,
        cond: &Expr,
        then: &Stmt,
        otherwise: &Stmt,
        end: Option<&str>,
    ) -> Result<(), CodegenError> {
        let else_label = self.fresh_label("else");
        let end_label = match end {
            Some(label) => label.to_string(),
            None => self.fresh_label("endif"),
        };

        self.gen_expr(cond)?;
        self.emit_jump(OpCode::Jumpz, &else_label);
        self.gen_stmt(then)?;
        self.emit_jump(OpCode::Jump, &end_label);
        self.bytecode.label(else_label);

        match otherwise {
            Stmt::IfElse {
                cond,
                then,
                otherwise,
            } => self.gen_if_else(cond, then, otherwise, Some(&end_label))?,
            other => self.gen_stmt(other)?,
        }

        if end.is_none() {
            self.bytecode.label(end_label);
        }
        Ok(())
    }

    fn gen_loop_body(
        &mut self,
        body: &Stmt,
        continue_label: &str,
        break_label: &str,
    ) -> Result<(), CodegenError> {
        self.loops.push(LoopLabels {
            continue_label: continue_label.to_string(),
            break_label: break_label.to_string(),
        });
        let result = self.gen_stmt(body);
        self.loops.pop();
        result
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn gen_expr(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        match expr {
            Expr::Integer(value) => self.emit_with(OpCode::Loadc, Operand::Int(*value)),
            Expr::Float(value) => self.emit_with(OpCode::Loadc, Operand::Float(*value)),
            Expr::Char(c) => self.emit_with(OpCode::Loadc, Operand::Char(*c)),
            Expr::String(_) => return Err(CodegenError::UnsupportedString),
            Expr::Variable(name) => {
                let offset = self.scalar_offset(name)?;
                self.emit_offset(OpCode::Loada, offset);
            }
            Expr::ArrayAccess { name, index } => {
                self.gen_element_address(name, index)?;
                self.emit(OpCode::Load);
            }
            Expr::Call { name, args } => {
                if !self.functions.contains_key(name) {
                    return Err(CodegenError::UndefinedFunction(name.clone()));
                }
                for arg in args.iter().rev() {
                    self.gen_expr(arg)?;
                }
                self.emit_jump(OpCode::Call, name);
            }
            Expr::Binary { op, left, right } => {
                self.gen_expr(left)?;
                self.gen_expr(right)?;
                self.gen_binary_op(*op);
            }
            Expr::Unary { op, expr } => {
                self.gen_expr(expr)?;
                match op {
                    UnaryOp::Neg => self.emit(OpCode::Neg),
                    UnaryOp::Not => self.emit(OpCode::Not),
                }
            }
        }
        Ok(())
    }

    fn gen_binary_op(&mut self, op: BinaryOp) {
        let (opcode, negate) = match op {
            BinaryOp::Add => (OpCode::Add, false),
            BinaryOp::Sub => (OpCode::Sub, false),
            BinaryOp::Mul => (OpCode::Mul, false),
            BinaryOp::Div => (OpCode::Div, false),
            BinaryOp::Mod => (OpCode::Mod, false),
            BinaryOp::Eq => (OpCode::Eq, false),
            BinaryOp::Ne => (OpCode::Eq, true),
            BinaryOp::Gt => (OpCode::Ge, false),
            BinaryOp::Lt => (OpCode::Le, false),
            BinaryOp::Le => (OpCode::Ge, true),
            BinaryOp::Ge => (OpCode::Le, true),
            BinaryOp::And => (OpCode::And, false),
            BinaryOp::Or => (OpCode::Or, false),
        };
        self.emit(opcode);
        if negate {
            self.emit(OpCode::Not);
        }
    }

    /// Pushes the frame-relative address of `name[index]`.
    fn gen_element_address(&mut self, name: &str, index: &Expr) -> Result<(), CodegenError> {
        let base = match self.slots.lookup(name) {
            Some(Slot::Array { base, .. }) => base,
            Some(Slot::Scalar(_)) => return Err(CodegenError::NotAnArray(name.to_string())),
            None => return Err(CodegenError::UndefinedVariable(name.to_string())),
        };
        self.gen_expr(index)?;
        self.emit_offset(OpCode::Loadc, base);
        self.emit(OpCode::Add);
        Ok(())
    }

    fn scalar_offset(&self, name: &str) -> Result<usize, CodegenError> {
        match self.slots.lookup(name) {
            Some(Slot::Scalar(offset)) => Ok(offset),
            Some(Slot::Array { .. }) => Err(CodegenError::NotAScalar(name.to_string())),
            None => Err(CodegenError::UndefinedVariable(name.to_string())),
        }
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(CodegenConfig::default())
    }
}

/// Lowers `program` with a default-configured [`Generator`].
pub fn generate(program: &Program) -> Result<Bytecode, CodegenError> {
    Generator::default().generate(program)
}
