// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Abstract Syntax Tree (AST) definitions for the C-like source language.
//!
//! The tree is produced by an external parser and consumed read-only by the
//! analyzer and the code generator. Every node kind is a variant of a closed
//! enum, so both passes match exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete program: an ordered list of function definitions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    /// The functions in declaration order
    pub functions: Vec<Function>,
}

impl Program {
    /// Creates a program from a list of functions.
    pub fn new(functions: Vec<Function>) -> Self {
        Self { functions }
    }
}

/// A function definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// The function name
    pub name: String,
    /// Declared return type
    pub return_type: Type,
    /// Parameters in declaration order
    pub params: Vec<Param>,
    /// Body statements
    pub body: Vec<Stmt>,
}

impl Function {
    /// Creates a function definition.
    pub fn new(
        name: impl Into<String>,
        return_type: Type,
        params: Vec<Param>,
        body: Vec<Stmt>,
    ) -> Self {
        Self {
            name: name.into(),
            return_type,
            params,
            body,
        }
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Declared type
    pub ty: Type,
    /// Parameter name
    pub name: String,
}

impl Param {
    /// Creates a parameter.
    pub fn new(ty: Type, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
        }
    }
}

/// A source-level type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    /// `int`
    Int,
    /// `float`
    Float,
    /// `char`
    Char,
    /// `string`
    String,
    /// `void`
    Void,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::Char => "char",
            Type::String => "string",
            Type::Void => "void",
        };
        f.write_str(name)
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `type name;`
    VarDecl { ty: Type, name: String },
    /// `type name = init;`
    VarDeclInit { ty: Type, name: String, init: Expr },
    /// `type name[size];`
    ArrayDecl { ty: Type, name: String, size: Expr },
    /// `name = value;`
    Assign { name: String, value: Expr },
    /// `name[index] = value;`
    ArrayAssign {
        name: String,
        index: Expr,
        value: Expr,
    },
    /// `return;` or `return value;`
    Return(Option<Expr>),
    /// `if (cond) then`
    If { cond: Expr, then: Box<Stmt> },
    /// `if (cond) then else otherwise`
    ///
    /// `else if` chains arrive as a nested `IfElse` in the `otherwise` slot.
    IfElse {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Box<Stmt>,
    },
    /// `while (cond) body`
    While { cond: Expr, body: Box<Stmt> },
    /// `for (init; cond; update) body`
    For {
        init: Box<Stmt>,
        /// `None` when the condition is omitted (always true)
        cond: Option<Expr>,
        update: Box<Stmt>,
        body: Box<Stmt>,
    },
    /// `break;`
    Break,
    /// `continue;`
    Continue,
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// An expression evaluated for its side effects, e.g. `f(1);`
    Expr(Expr),
    /// `;`
    Empty,
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// `name(args...)`
    Call { name: String, args: Vec<Expr> },
    /// `name[index]`
    ArrayAccess { name: String, index: Box<Expr> },
    /// `left op right`
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `op expr`
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// Integer literal
    Integer(i64),
    /// Floating-point literal
    Float(f64),
    /// Character literal
    Char(char),
    /// String literal
    String(String),
    /// Variable reference
    Variable(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        f.write_str(symbol)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Arithmetic negation `-`
    Neg,
    /// Logical not `!`
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => f.write_str("-"),
            UnaryOp::Not => f.write_str("!"),
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

impl Expr {
    /// Integer literal.
    pub fn int(value: i64) -> Self {
        Expr::Integer(value)
    }

    /// Float literal.
    pub fn float(value: f64) -> Self {
        Expr::Float(value)
    }

    /// Variable reference.
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    /// Binary operation.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Unary operation.
    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    /// Function call.
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    /// Array element read.
    pub fn index(name: impl Into<String>, index: Expr) -> Self {
        Expr::ArrayAccess {
            name: name.into(),
            index: Box::new(index),
        }
    }

    /// Returns the value of an integer literal, if this is one.
    pub fn as_int_literal(&self) -> Option<i64> {
        match self {
            Expr::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

impl Stmt {
    /// `type name;`
    pub fn decl(ty: Type, name: impl Into<String>) -> Self {
        Stmt::VarDecl {
            ty,
            name: name.into(),
        }
    }

    /// `type name = init;`
    pub fn decl_init(ty: Type, name: impl Into<String>, init: Expr) -> Self {
        Stmt::VarDeclInit {
            ty,
            name: name.into(),
            init,
        }
    }

    /// `type name[size];`
    pub fn array(ty: Type, name: impl Into<String>, size: Expr) -> Self {
        Stmt::ArrayDecl {
            ty,
            name: name.into(),
            size,
        }
    }

    /// `name = value;`
    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Stmt::Assign {
            name: name.into(),
            value,
        }
    }

    /// `name[index] = value;`
    pub fn assign_index(name: impl Into<String>, index: Expr, value: Expr) -> Self {
        Stmt::ArrayAssign {
            name: name.into(),
            index,
            value,
        }
    }

    /// `return value;`
    pub fn ret(value: Expr) -> Self {
        Stmt::Return(Some(value))
    }

    /// `if (cond) then`
    pub fn if_then(cond: Expr, then: Stmt) -> Self {
        Stmt::If {
            cond,
            then: Box::new(then),
        }
    }

    /// `if (cond) then else otherwise`
    pub fn if_else(cond: Expr, then: Stmt, otherwise: Stmt) -> Self {
        Stmt::IfElse {
            cond,
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// `while (cond) body`
    pub fn while_loop(cond: Expr, body: Stmt) -> Self {
        Stmt::While {
            cond,
            body: Box::new(body),
        }
    }

    /// `for (init; cond; update) body`
    pub fn for_loop(init: Stmt, cond: Option<Expr>, update: Stmt, body: Stmt) -> Self {
        Stmt::For {
            init: Box::new(init),
            cond,
            update: Box::new(update),
            body: Box::new(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        assert_eq!(Type::Int.to_string(), "int");
        assert_eq!(Type::String.to_string(), "string");
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(BinaryOp::Le.to_string(), "<=");
        assert_eq!(BinaryOp::Or.to_string(), "||");
        assert_eq!(UnaryOp::Not.to_string(), "!");
    }

    #[test]
    fn test_builders() {
        let stmt = Stmt::assign("x", Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::int(2)));
        match stmt {
            Stmt::Assign { name, value } => {
                assert_eq!(name, "x");
                assert!(matches!(value, Expr::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_program_json_shape() {
        let program = Program::new(vec![Function::new(
            "main",
            Type::Int,
            vec![],
            vec![Stmt::ret(Expr::int(0))],
        )]);
        let json = serde_json::to_string(&program).unwrap();
        assert!(json.contains("\"return_type\":\"int\""));
        let back: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(back, program);
    }
}
