// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode definitions and the textual assembly format.
//!
//! A [`Bytecode`] program is an ordered list of [`Item`]s: instructions,
//! label definitions and comments. It renders to, and parses from, one
//! instruction per line:
//!
//! ```text
//! main:
//!     ENTER 0
//!     ALLOC 1
//!     LOADC 5       // trailing comments are ignored
//!     STOREA 0
//! ```

use std::fmt;
use std::str::FromStr;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Fault;

/// A compiled program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    /// Instructions, labels and comments in program order
    pub items: Vec<Item>,
}

/// One line of a program.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// An executable instruction
    Instruction(Instruction),
    /// A label definition (`name:`)
    Label(String),
    /// A full-line comment; ignored by the machine
    Comment(String),
}

impl Bytecode {
    /// Creates an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instruction and returns its position in `items`.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.items.push(Item::Instruction(instruction));
        self.items.len() - 1
    }

    /// Appends a label definition.
    pub fn label(&mut self, name: impl Into<String>) {
        self.items.push(Item::Label(name.into()));
    }

    /// Appends a comment line.
    pub fn comment(&mut self, text: impl Into<String>) {
        self.items.push(Item::Comment(text.into()));
    }

    /// Iterates over the executable instructions, skipping labels and comments.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.items.iter().filter_map(|item| match item {
            Item::Instruction(instruction) => Some(instruction),
            _ => None,
        })
    }

    /// Label names in definition order (duplicates included).
    pub fn defined_labels(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| match item {
                Item::Label(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Label names referenced by jumps and calls, in program order.
    pub fn referenced_labels(&self) -> Vec<&str> {
        self.instructions()
            .filter(|instruction| instruction.opcode.is_control_transfer())
            .filter_map(|instruction| match &instruction.operand {
                Some(Operand::Label(name)) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Maps every label to the index of the instruction that follows it.
    ///
    /// Fails with [`Fault::DuplicateLabel`] if a label is defined twice.
    pub fn label_table(&self) -> Result<FxHashMap<String, usize>, Fault> {
        let mut table = FxHashMap::default();
        let mut next = 0usize;
        for item in &self.items {
            match item {
                Item::Instruction(_) => next += 1,
                Item::Label(name) => {
                    if table.insert(name.clone(), next).is_some() {
                        return Err(Fault::DuplicateLabel(name.clone()));
                    }
                }
                Item::Comment(_) => {}
            }
        }
        Ok(table)
    }

    /// Checks that every label is defined once and every reference resolves.
    pub fn check_labels(&self) -> Result<(), Fault> {
        let table = self.label_table()?;
        let mut seen = FxHashSet::default();
        for name in self.referenced_labels() {
            if seen.insert(name) && !table.contains_key(name) {
                return Err(Fault::UndefinedLabel(name.to_string()));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            match item {
                Item::Instruction(instruction) => writeln!(f, "    {}", instruction)?,
                Item::Label(name) => writeln!(f, "{}:", name)?,
                Item::Comment(text) => writeln!(f, "// {}", text)?,
            }
        }
        Ok(())
    }
}

impl FromStr for Bytecode {
    type Err = Fault;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut bytecode = Bytecode::new();
        for (i, raw) in source.lines().enumerate() {
            let line = i + 1;
            let text = strip_comment(raw).trim();
            if text.is_empty() {
                continue;
            }
            if let Some(name) = text.strip_suffix(':') {
                let name = name.trim();
                if !is_identifier(name) {
                    return Err(Fault::MalformedOperand {
                        text: name.to_string(),
                        line,
                    });
                }
                bytecode.label(name);
                continue;
            }
            bytecode.emit(parse_instruction(text, line)?);
        }
        Ok(bytecode)
    }
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Optional operand
    pub operand: Option<Operand>,
}

impl Instruction {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: None,
        }
    }

    /// Creates a new instruction with an operand.
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {}", self.opcode, operand),
            None => write!(f, "{}", self.opcode),
        }
    }
}

/// Instruction operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Signed integer (constants, sizes, addresses)
    Int(i64),
    /// Floating-point constant
    Float(f64),
    /// Character constant; loads as its code point
    Char(char),
    /// String constant
    Str(String),
    /// Label reference
    Label(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(value) => write!(f, "{}", value),
            // Debug keeps the decimal point so the value re-parses as a float.
            // `inf` and `NaN` get a sign so they cannot read back as labels.
            Operand::Float(value) if value.is_nan() || *value == f64::INFINITY => {
                write!(f, "+{:?}", value)
            }
            Operand::Float(value) => write!(f, "{:?}", value),
            Operand::Char(c) => write!(f, "'{}'", escape(*c, '\'')),
            Operand::Str(text) => {
                f.write_str("\"")?;
                for c in text.chars() {
                    f.write_str(&escape(c, '"'))?;
                }
                f.write_str("\"")
            }
            Operand::Label(name) => f.write_str(name),
        }
    }
}

/// Operation codes for the stack machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    // Frame and memory management
    /// Grow the current frame by `n` zeroed slots
    Alloc,
    /// Claim the top `n` operands as arguments and reserve `n` frame slots
    Enter,

    // Stack operations
    /// Push a constant
    Loadc,
    /// Push memory at an immediate frame-relative address
    Loada,
    /// Pop into memory at an immediate frame-relative address
    Storea,
    /// Pop an address, push memory at that address
    Load,
    /// Pop an address, pop a value, store the value at the address
    Store,
    /// Discard the top value
    Pop,

    // Arithmetic operations
    /// Add top two values
    Add,
    /// Subtract
    Sub,
    /// Multiply
    Mul,
    /// Floor division; zero divisor yields 0
    Div,
    /// Floor remainder; zero divisor yields 0
    Mod,
    /// Negate (unary minus)
    Neg,

    // Comparison operations
    /// Equal
    Eq,
    /// Greater than (`a > b`)
    Ge,
    /// Less than (`a < b`)
    Le,

    // Logical operations
    /// Logical AND
    And,
    /// Logical OR
    Or,
    /// Logical NOT
    Not,

    // Control flow
    /// Unconditional jump
    Jump,
    /// Jump if zero
    Jumpz,
    /// Call a function
    Call,
    /// Return from function, or halt at the outermost frame
    Return,
}

impl OpCode {
    const ALL: [OpCode; 24] = [
        OpCode::Alloc,
        OpCode::Enter,
        OpCode::Loadc,
        OpCode::Loada,
        OpCode::Storea,
        OpCode::Load,
        OpCode::Store,
        OpCode::Pop,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::Neg,
        OpCode::Eq,
        OpCode::Ge,
        OpCode::Le,
        OpCode::And,
        OpCode::Or,
        OpCode::Not,
        OpCode::Jump,
        OpCode::Jumpz,
        OpCode::Call,
        OpCode::Return,
    ];

    /// The canonical (upper-case) mnemonic.
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Alloc => "ALLOC",
            OpCode::Enter => "ENTER",
            OpCode::Loadc => "LOADC",
            OpCode::Loada => "LOADA",
            OpCode::Storea => "STOREA",
            OpCode::Load => "LOAD",
            OpCode::Store => "STORE",
            OpCode::Pop => "POP",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Neg => "NEG",
            OpCode::Eq => "EQ",
            OpCode::Ge => "GE",
            OpCode::Le => "LE",
            OpCode::And => "AND",
            OpCode::Or => "OR",
            OpCode::Not => "NOT",
            OpCode::Jump => "JUMP",
            OpCode::Jumpz => "JUMPZ",
            OpCode::Call => "CALL",
            OpCode::Return => "RETURN",
        }
    }

    /// Looks up a mnemonic, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|opcode| opcode.name().eq_ignore_ascii_case(name))
    }

    /// Whether this opcode requires an operand.
    pub fn takes_operand(self) -> bool {
        matches!(
            self,
            OpCode::Alloc
                | OpCode::Enter
                | OpCode::Loadc
                | OpCode::Loada
                | OpCode::Storea
                | OpCode::Jump
                | OpCode::Jumpz
                | OpCode::Call
        )
    }

    /// Whether the operand names a label to transfer control to.
    pub fn is_control_transfer(self) -> bool {
        matches!(self, OpCode::Jump | OpCode::Jumpz | OpCode::Call)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Parsing helpers
// ============================================================================

fn parse_instruction(text: &str, line: usize) -> Result<Instruction, Fault> {
    let (name, rest) = match text.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (text, ""),
    };
    let opcode = OpCode::from_name(name).ok_or_else(|| Fault::UnknownOpcode {
        name: name.to_string(),
        line,
    })?;

    match (opcode.takes_operand(), rest.is_empty()) {
        (true, true) => Err(Fault::MissingOperand {
            opcode: opcode.name(),
            line,
        }),
        (false, false) => Err(Fault::UnexpectedOperand {
            opcode: opcode.name(),
            line,
        }),
        (true, false) => Ok(Instruction::with_operand(opcode, parse_operand(rest, line)?)),
        (false, true) => Ok(Instruction::simple(opcode)),
    }
}

fn parse_operand(text: &str, line: usize) -> Result<Operand, Fault> {
    let malformed = || Fault::MalformedOperand {
        text: text.to_string(),
        line,
    };

    if let Some(inner) = text.strip_prefix('\'') {
        let inner = inner.strip_suffix('\'').ok_or_else(malformed)?;
        let mut chars = unescape(inner).ok_or_else(malformed)?.into_iter();
        return match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Operand::Char(c)),
            _ => Err(malformed()),
        };
    }

    if let Some(inner) = text.strip_prefix('"') {
        let inner = inner.strip_suffix('"').ok_or_else(malformed)?;
        let chars = unescape(inner).ok_or_else(malformed)?;
        return Ok(Operand::Str(chars.into_iter().collect()));
    }

    if text.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.')) {
        if let Ok(value) = text.parse::<i64>() {
            return Ok(Operand::Int(value));
        }
        return text.parse::<f64>().map(Operand::Float).map_err(|_| malformed());
    }

    if is_identifier(text) {
        return Ok(Operand::Label(text.to_string()));
    }

    Err(malformed())
}

/// Label identifiers: `[A-Za-z_][A-Za-z0-9_.]*`.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Removes a `//` comment, ignoring `//` inside quoted operands.
fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    let mut escaped = false;
    let mut prev_slash = false;
    for (i, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                prev_slash = false;
            }
            '/' if prev_slash => return &line[..i - 1],
            '/' => prev_slash = true,
            _ => prev_slash = false,
        }
    }
    line
}

fn escape(c: char, quote: char) -> String {
    match c {
        '\n' => "\\n".to_string(),
        '\t' => "\\t".to_string(),
        '\r' => "\\r".to_string(),
        '\0' => "\\0".to_string(),
        '\\' => "\\\\".to_string(),
        c if c == quote => format!("\\{}", c),
        c => c.to_string(),
    }
}

fn unescape(text: &str) -> Option<Vec<char>> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let decoded = match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            _ => return None,
        };
        out.push(decoded);
    }
    Some(out)
}
