// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Semantic analysis.
//!
//! The analyzer makes two passes over the program:
//!
//! 1. Every function signature is registered in the global scope, so calls
//!    type-check regardless of declaration order.
//! 2. Every body is walked with a fresh function scope. Expressions produce a
//!    type, or `None` when a subtree was already reported, which suppresses
//!    follow-on diagnostics.
//!
//! Diagnostics are collected; analysis always runs to completion.

pub mod symbols;

pub use symbols::{ScopeStack, SymbolInfo, SymbolKind, SymbolTable};

use tracing::{debug, error};

use crate::ast::*;
use crate::error::{Diagnostic, Entity, ScopeError};

/// Analyzes `program` and returns every diagnostic found, in source order.
///
/// An empty result means the program may be handed to the code generator.
pub fn analyze(program: &Program) -> Vec<Diagnostic> {
    Analyzer::new().analyze(program)
}

/// Scoped semantic analyzer.
#[derive(Debug, Default)]
pub struct Analyzer {
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    loop_depth: usize,
    return_type: Option<Type>,
}

impl Analyzer {
    /// Creates an analyzer with an empty global scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs both passes and returns the collected diagnostics.
    pub fn analyze(mut self, program: &Program) -> Vec<Diagnostic> {
        for function in &program.functions {
            self.declare_function(function);
        }
        debug!(
            functions = program.functions.len(),
            "registered function signatures"
        );

        for function in &program.functions {
            self.check_function(function);
        }
        debug!(
            diagnostics = self.diagnostics.len(),
            "semantic analysis finished"
        );

        self.diagnostics
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        debug!(%diagnostic, "semantic error");
        self.diagnostics.push(diagnostic);
    }

    fn with_scope<R>(&mut self, body: impl FnOnce(&mut Self) -> R) -> R {
        self.symbols.push_scope();
        let result = body(self);
        if let Err(err) = self.symbols.pop_scope() {
            error!(%err, "unbalanced analyzer scope");
        }
        result
    }

    fn declare(&mut self, name: &str, info: SymbolInfo, entity: Entity) {
        if let Err(ScopeError::Redeclared(name)) = self.symbols.declare(name, info) {
            self.report(Diagnostic::DuplicateSymbol { entity, name });
        }
    }

    // ========================================================================
    // Pass 1: signatures
    // ========================================================================

    fn declare_function(&mut self, function: &Function) {
        for (i, param) in function.params.iter().enumerate() {
            if param.name.is_empty() || param.ty == Type::Void {
                self.report(Diagnostic::InvalidParameter {
                    function: function.name.clone(),
                    position: i + 1,
                });
            }
        }

        let info = SymbolInfo {
            ty: function.return_type,
            kind: SymbolKind::Func(function.params.iter().map(|p| p.ty).collect()),
        };
        if self.symbols.declare(function.name.as_str(), info).is_err() {
            self.report(Diagnostic::DuplicateFunction(function.name.clone()));
        }
    }

    // ========================================================================
    // Pass 2: bodies
    // ========================================================================

    fn check_function(&mut self, function: &Function) {
        self.return_type = Some(function.return_type);
        self.loop_depth = 0;

        self.with_scope(|this| {
            for param in &function.params {
                if param.name.is_empty() {
                    continue;
                }
                let info = SymbolInfo {
                    ty: param.ty,
                    kind: SymbolKind::Param,
                };
                this.declare(&param.name, info, Entity::Parameter);
            }
            for stmt in &function.body {
                this.check_stmt(stmt);
            }
        });

        self.return_type = None;
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl { ty, name } => {
                self.declare_variable(*ty, name);
            }
            Stmt::VarDeclInit { ty, name, init } => {
                self.declare_variable(*ty, name);
                if let Some(found) = self.check_expr(init) {
                    if found != *ty {
                        self.report(Diagnostic::DeclarationTypeMismatch {
                            name: name.clone(),
                            declared: *ty,
                            found,
                        });
                    }
                }
            }
            Stmt::ArrayDecl { ty, name, size } => {
                if *ty == Type::Void {
                    self.report(Diagnostic::VoidVariable {
                        entity: Entity::Array,
                        name: name.clone(),
                    });
                }
                let info = SymbolInfo {
                    ty: *ty,
                    kind: SymbolKind::Array(size.as_int_literal()),
                };
                self.declare(name, info, Entity::Array);
                if let Some(found) = self.check_expr(size) {
                    if found != Type::Int {
                        self.report(Diagnostic::InvalidArraySize {
                            name: name.clone(),
                            found,
                        });
                    }
                }
            }
            Stmt::Assign { name, value } => {
                let target = match self.scalar_lookup(name) {
                    None => {
                        self.report(Diagnostic::UndeclaredVariable(name.clone()));
                        None
                    }
                    Some(None) => {
                        self.report(Diagnostic::NotAScalar(name.clone()));
                        None
                    }
                    Some(ty) => ty,
                };
                let found = self.check_expr(value);
                if let (Some(declared), Some(found)) = (target, found) {
                    if declared != found {
                        self.report(Diagnostic::AssignmentTypeMismatch {
                            name: name.clone(),
                            declared,
                            found,
                        });
                    }
                }
            }
            Stmt::ArrayAssign { name, index, value } => {
                let element = self.check_array_index(name, index);
                let found = self.check_expr(value);
                if let (Some(declared), Some(found)) = (element, found) {
                    if declared != found {
                        self.report(Diagnostic::AssignmentTypeMismatch {
                            name: name.clone(),
                            declared,
                            found,
                        });
                    }
                }
            }
            Stmt::Return(value) => self.check_return(value.as_ref()),
            Stmt::If { cond, then } => {
                self.check_expr(cond);
                self.check_stmt(then);
            }
            Stmt::IfElse {
                cond,
                then,
                otherwise,
            } => {
                self.check_expr(cond);
                self.check_stmt(then);
                self.check_stmt(otherwise);
            }
            Stmt::While { cond, body } => {
                self.check_expr(cond);
                self.check_loop_body(body);
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                self.with_scope(|this| {
                    this.check_stmt(init);
                    if let Some(cond) = cond {
                        this.check_expr(cond);
                    }
                    this.check_stmt(update);
                    this.check_loop_body(body);
                });
            }
            Stmt::Break => self.check_loop_exit("break"),
            Stmt::Continue => self.check_loop_exit("continue"),
            Stmt::Block(stmts) => {
                self.with_scope(|this| {
                    for stmt in stmts {
                        this.check_stmt(stmt);
                    }
                });
            }
            Stmt::Expr(expr) => {
                self.check_expr(expr);
            }
            Stmt::Empty => {}
        }
    }

    fn declare_variable(&mut self, ty: Type, name: &str) {
        if ty == Type::Void {
            self.report(Diagnostic::VoidVariable {
                entity: Entity::Variable,
                name: name.to_string(),
            });
        }
        let info = SymbolInfo {
            ty,
            kind: SymbolKind::Var,
        };
        self.declare(name, info, Entity::Variable);
    }

    /// `None` when undeclared, `Some(None)` when declared but not a scalar.
    fn scalar_lookup(&self, name: &str) -> Option<Option<Type>> {
        self.symbols
            .lookup(name)
            .map(|info| info.is_scalar().then_some(info.ty))
    }

    fn check_return(&mut self, value: Option<&Expr>) {
        let Some(expected) = self.return_type else {
            return;
        };
        match (expected, value) {
            (Type::Void, None) => {}
            (Type::Void, Some(expr)) => match self.check_expr(expr) {
                Some(Type::Void) => self.report(Diagnostic::VoidReturnValue),
                Some(found) => self.report(Diagnostic::ReturnTypeMismatch { expected, found }),
                None => {}
            },
            (_, None) => {
                self.report(Diagnostic::ReturnTypeMismatch {
                    expected,
                    found: Type::Void,
                });
            }
            (_, Some(expr)) => {
                if let Some(found) = self.check_expr(expr) {
                    if found != expected {
                        self.report(Diagnostic::ReturnTypeMismatch { expected, found });
                    }
                }
            }
        }
    }

    fn check_loop_body(&mut self, body: &Stmt) {
        self.loop_depth += 1;
        self.check_stmt(body);
        self.loop_depth -= 1;
    }

    fn check_loop_exit(&mut self, keyword: &'static str) {
        if self.loop_depth == 0 {
            self.report(Diagnostic::BreakOrContinueOutsideLoop(keyword));
        }
    }

    /// Checks `name[index]` and returns the element type when `name` is an array.
    fn check_array_index(&mut self, name: &str, index: &Expr) -> Option<Type> {
        let element = self
            .symbols
            .lookup(name)
            .filter(|info| matches!(info.kind, SymbolKind::Array(_)))
            .map(|info| info.ty);
        if element.is_none() {
            self.report(Diagnostic::UndeclaredOrNonArray(name.to_string()));
        }
        if let Some(found) = self.check_expr(index) {
            if found != Type::Int {
                self.report(Diagnostic::InvalidIndexType {
                    name: name.to_string(),
                    found,
                });
            }
        }
        element
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn check_expr(&mut self, expr: &Expr) -> Option<Type> {
        match expr {
            Expr::Integer(_) => Some(Type::Int),
            Expr::Float(_) => Some(Type::Float),
            Expr::Char(_) => Some(Type::Char),
            Expr::String(_) => Some(Type::String),
            Expr::Variable(name) => match self.scalar_lookup(name) {
                None => {
                    self.report(Diagnostic::UnknownIdentifier(name.clone()));
                    None
                }
                Some(None) => {
                    self.report(Diagnostic::NotAScalar(name.clone()));
                    None
                }
                Some(ty) => ty,
            },
            Expr::Call { name, args } => self.check_call(name, args),
            Expr::ArrayAccess { name, index } => self.check_array_index(name, index),
            Expr::Binary { op, left, right } => {
                let left = self.check_expr(left);
                let right = self.check_expr(right);
                match (left, right) {
                    (Some(left), Some(right)) if left == right => Some(left),
                    (Some(left), Some(right)) => {
                        self.report(Diagnostic::BinOpTypeMismatch {
                            op: *op,
                            left,
                            right,
                        });
                        None
                    }
                    _ => None,
                }
            }
            Expr::Unary { op, expr } => {
                let found = self.check_expr(expr)?;
                let allowed = match op {
                    UnaryOp::Not => found == Type::Int,
                    UnaryOp::Neg => matches!(found, Type::Int | Type::Float),
                };
                if allowed {
                    Some(found)
                } else {
                    self.report(Diagnostic::UnaryOperandTypeMismatch { op: *op, found });
                    None
                }
            }
        }
    }

    fn check_call(&mut self, name: &str, args: &[Expr]) -> Option<Type> {
        let signature = self.symbols.lookup(name).and_then(|info| match &info.kind {
            SymbolKind::Func(params) => Some((info.ty, params.clone())),
            _ => None,
        });

        let arg_types: Vec<Option<Type>> = args.iter().map(|arg| self.check_expr(arg)).collect();

        let Some((return_type, params)) = signature else {
            self.report(Diagnostic::UndeclaredFunction(name.to_string()));
            return None;
        };

        if params.len() != args.len() {
            self.report(Diagnostic::ArityMismatch {
                name: name.to_string(),
                expected: params.len(),
                found: args.len(),
            });
            return Some(return_type);
        }

        for (i, (expected, found)) in params.iter().zip(arg_types).enumerate() {
            if let Some(found) = found {
                if found != *expected {
                    self.report(Diagnostic::ArgumentTypeMismatch {
                        name: name.to_string(),
                        position: i + 1,
                        expected: *expected,
                        found,
                    });
                }
            }
        }

        Some(return_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn main_fn(return_type: Type, body: Vec<Stmt>) -> Function {
        Function::new("main", return_type, vec![], body)
    }

    fn sum_fn() -> Function {
        Function::new(
            "sum",
            Type::Int,
            vec![Param::new(Type::Int, "a"), Param::new(Type::Int, "b")],
            vec![Stmt::ret(Expr::binary(
                BinaryOp::Add,
                Expr::var("a"),
                Expr::var("b"),
            ))],
        )
    }

    fn messages(functions: Vec<Function>) -> Vec<String> {
        analyze(&Program::new(functions))
            .iter()
            .map(|d| d.to_string())
            .collect()
    }

    #[test]
    fn test_valid_assignment_and_return() {
        let program = Program::new(vec![main_fn(
            Type::Int,
            vec![
                Stmt::decl_init(Type::Int, "x", Expr::int(1)),
                Stmt::assign("x", Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::int(2))),
                Stmt::ret(Expr::var("x")),
            ],
        )]);
        assert!(analyze(&program).is_empty());
    }

    #[test]
    fn test_valid_array_declaration_and_access() {
        let program = Program::new(vec![main_fn(
            Type::Void,
            vec![
                Stmt::array(Type::Int, "arr", Expr::int(10)),
                Stmt::decl_init(Type::Int, "i", Expr::int(0)),
                Stmt::decl_init(Type::Int, "x", Expr::index("arr", Expr::var("i"))),
                Stmt::assign_index("arr", Expr::var("i"), Expr::var("x")),
            ],
        )]);
        assert!(analyze(&program).is_empty());
    }

    #[test]
    fn test_block_shadowing() {
        let program = Program::new(vec![main_fn(
            Type::Void,
            vec![
                Stmt::decl_init(Type::Int, "x", Expr::int(1)),
                Stmt::Block(vec![
                    Stmt::decl_init(Type::Int, "x", Expr::int(2)),
                    Stmt::assign("x", Expr::int(3)),
                ]),
                Stmt::assign("x", Expr::int(4)),
            ],
        )]);
        assert!(analyze(&program).is_empty());
    }

    #[test]
    fn test_forward_call_resolves() {
        let main = main_fn(
            Type::Int,
            vec![Stmt::ret(Expr::call("square", vec![Expr::int(4)]))],
        );
        let square = Function::new(
            "square",
            Type::Int,
            vec![Param::new(Type::Int, "n")],
            vec![Stmt::ret(Expr::binary(
                BinaryOp::Mul,
                Expr::var("n"),
                Expr::var("n"),
            ))],
        );
        assert!(analyze(&Program::new(vec![main, square])).is_empty());
    }

    #[test]
    fn test_undeclared_assignment() {
        let got = messages(vec![main_fn(
            Type::Void,
            vec![Stmt::assign("x", Expr::int(5))],
        )]);
        assert_eq!(got, vec!["Assignment to undeclared variable 'x'"]);
    }

    #[test]
    fn test_redeclaration() {
        let got = messages(vec![main_fn(
            Type::Void,
            vec![Stmt::decl(Type::Int, "x"), Stmt::decl(Type::Int, "x")],
        )]);
        assert_eq!(got, vec!["Variable 'x' already declared"]);
    }

    #[test]
    fn test_undeclared_function_call() {
        let got = messages(vec![main_fn(
            Type::Void,
            vec![Stmt::Expr(Expr::call("foo", vec![Expr::int(1)]))],
        )]);
        assert_eq!(got, vec!["Call to undeclared function 'foo'"]);
    }

    #[test]
    fn test_undeclared_array_access() {
        let got = messages(vec![main_fn(
            Type::Void,
            vec![
                Stmt::decl_init(Type::Int, "i", Expr::int(0)),
                Stmt::Expr(Expr::index("arr", Expr::var("i"))),
            ],
        )]);
        assert_eq!(got, vec!["Access to undeclared or non-array variable 'arr'"]);
    }

    #[test]
    fn test_undeclared_variable_in_expression() {
        let got = messages(vec![main_fn(
            Type::Void,
            vec![Stmt::decl_init(Type::Int, "x", Expr::var("y"))],
        )]);
        assert_eq!(got, vec!["Use of undeclared variable 'y'"]);
    }

    #[test]
    fn test_type_mismatches() {
        let got = messages(vec![main_fn(
            Type::Void,
            vec![
                Stmt::decl_init(Type::Int, "x", Expr::int(1)),
                Stmt::assign("x", Expr::String("hello".into())),
            ],
        )]);
        assert_eq!(got, vec!["Type mismatch in assignment to 'x': int = string"]);

        let got = messages(vec![main_fn(
            Type::Void,
            vec![Stmt::decl_init(Type::Int, "x", Expr::String("oops".into()))],
        )]);
        assert_eq!(got, vec!["Type mismatch in declaration: int x = string"]);

        let got = messages(vec![main_fn(
            Type::Void,
            vec![
                Stmt::decl_init(Type::Int, "x", Expr::int(2)),
                Stmt::decl_init(Type::String, "s", Expr::String("hi".into())),
                Stmt::decl_init(
                    Type::Int,
                    "z",
                    Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::var("s")),
                ),
            ],
        )]);
        assert_eq!(
            got,
            vec!["Type mismatch in binary operation '+': int vs string"]
        );
    }

    #[test]
    fn test_no_cascade_after_binop_mismatch() {
        // The mismatched binop degrades to unknown, so the enclosing
        // declaration does not report a second error.
        let got = analyze(&Program::new(vec![main_fn(
            Type::Void,
            vec![Stmt::decl_init(
                Type::Int,
                "z",
                Expr::binary(
                    BinaryOp::Mul,
                    Expr::binary(BinaryOp::Add, Expr::int(1), Expr::float(2.0)),
                    Expr::int(3),
                ),
            )],
        )]));
        assert_eq!(got.len(), 1);
        assert!(matches!(got[0], Diagnostic::BinOpTypeMismatch { .. }));
    }

    #[test]
    fn test_call_arity_and_argument_types() {
        let got = messages(vec![
            main_fn(
                Type::Void,
                vec![Stmt::Expr(Expr::call("sum", vec![Expr::int(1)]))],
            ),
            sum_fn(),
        ]);
        assert_eq!(
            got,
            vec!["Function 'sum' called with wrong number of arguments: expected 2, got 1"]
        );

        let got = messages(vec![
            main_fn(
                Type::Void,
                vec![Stmt::Expr(Expr::call(
                    "sum",
                    vec![Expr::int(1), Expr::String("no".into())],
                ))],
            ),
            sum_fn(),
        ]);
        assert_eq!(
            got,
            vec!["Type mismatch in argument 2 of call to 'sum': expected int, got string"]
        );
    }

    #[test]
    fn test_return_type_rules() {
        let got = messages(vec![main_fn(
            Type::Int,
            vec![Stmt::ret(Expr::String("oops".into()))],
        )]);
        assert_eq!(got, vec!["Return type mismatch: expected int, got string"]);

        let got = messages(vec![main_fn(Type::Int, vec![Stmt::Return(None)])]);
        assert_eq!(got, vec!["Return type mismatch: expected int, got void"]);

        let got = messages(vec![main_fn(Type::Void, vec![Stmt::ret(Expr::int(1))])]);
        assert_eq!(got, vec!["Return type mismatch: expected void, got int"]);

        assert!(messages(vec![main_fn(Type::Void, vec![Stmt::Return(None)])]).is_empty());

        let log = Function::new("log", Type::Void, vec![], vec![]);
        let got = messages(vec![
            main_fn(Type::Void, vec![Stmt::ret(Expr::call("log", vec![]))]),
            log,
        ]);
        assert_eq!(got, vec!["Void function cannot return a value"]);
    }

    #[test]
    fn test_break_continue_placement() {
        let got = analyze(&Program::new(vec![main_fn(
            Type::Void,
            vec![Stmt::Break, Stmt::Continue],
        )]));
        assert_eq!(
            got,
            vec![
                Diagnostic::BreakOrContinueOutsideLoop("break"),
                Diagnostic::BreakOrContinueOutsideLoop("continue"),
            ]
        );

        let inside = Program::new(vec![main_fn(
            Type::Void,
            vec![Stmt::while_loop(
                Expr::int(1),
                Stmt::Block(vec![Stmt::Continue, Stmt::Break]),
            )],
        )]);
        assert!(analyze(&inside).is_empty());
    }

    #[test]
    fn test_loop_depth_resets_per_function() {
        let looping = main_fn(
            Type::Void,
            vec![Stmt::while_loop(Expr::int(1), Stmt::Break)],
        );
        let stray = Function::new("helper", Type::Void, vec![], vec![Stmt::Break]);
        let got = analyze(&Program::new(vec![looping, stray]));
        assert_eq!(got, vec![Diagnostic::BreakOrContinueOutsideLoop("break")]);
    }

    #[test]
    fn test_for_header_scope() {
        let program = Program::new(vec![main_fn(
            Type::Void,
            vec![
                Stmt::for_loop(
                    Stmt::decl_init(Type::Int, "i", Expr::int(0)),
                    Some(Expr::binary(BinaryOp::Lt, Expr::var("i"), Expr::int(3))),
                    Stmt::assign("i", Expr::binary(BinaryOp::Add, Expr::var("i"), Expr::int(1))),
                    Stmt::Empty,
                ),
                Stmt::assign("i", Expr::int(0)),
            ],
        )]);
        assert_eq!(
            analyze(&program),
            vec![Diagnostic::UndeclaredVariable("i".into())]
        );
    }

    #[test]
    fn test_duplicate_function_and_bad_params() {
        let got = analyze(&Program::new(vec![
            Function::new("f", Type::Void, vec![Param::new(Type::Void, "x")], vec![]),
            Function::new("f", Type::Void, vec![], vec![]),
        ]));
        assert_eq!(
            got,
            vec![
                Diagnostic::InvalidParameter {
                    function: "f".into(),
                    position: 1
                },
                Diagnostic::DuplicateFunction("f".into()),
            ]
        );
    }

    #[test]
    fn test_array_rules() {
        let got = analyze(&Program::new(vec![main_fn(
            Type::Void,
            vec![
                Stmt::array(Type::Int, "arr", Expr::float(2.0)),
                Stmt::decl(Type::Int, "x"),
                Stmt::assign("x", Expr::index("arr", Expr::Char('a'))),
                Stmt::assign("arr", Expr::int(1)),
                Stmt::Expr(Expr::index("x", Expr::int(0))),
            ],
        )]));
        assert_eq!(
            got,
            vec![
                Diagnostic::InvalidArraySize {
                    name: "arr".into(),
                    found: Type::Float
                },
                Diagnostic::InvalidIndexType {
                    name: "arr".into(),
                    found: Type::Char
                },
                Diagnostic::NotAScalar("arr".into()),
                Diagnostic::UndeclaredOrNonArray("x".into()),
            ]
        );
    }

    #[test]
    fn test_unary_operand_rules() {
        let got = analyze(&Program::new(vec![main_fn(
            Type::Void,
            vec![
                Stmt::Expr(Expr::unary(UnaryOp::Not, Expr::float(1.0))),
                Stmt::Expr(Expr::unary(UnaryOp::Neg, Expr::float(1.0))),
                Stmt::Expr(Expr::unary(UnaryOp::Neg, Expr::Char('c'))),
            ],
        )]));
        assert_eq!(
            got,
            vec![
                Diagnostic::UnaryOperandTypeMismatch {
                    op: UnaryOp::Not,
                    found: Type::Float
                },
                Diagnostic::UnaryOperandTypeMismatch {
                    op: UnaryOp::Neg,
                    found: Type::Char
                },
            ]
        );
    }
}
