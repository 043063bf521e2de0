//! Static resolver pass.
//!
//! One AST walk, before evaluation, that does three things:
//! 1. Build lexical scopes (a stack of `HashMap<&str, bool>` tracking
//!    declared vs. defined names) structurally mirroring the environment
//!    chain the evaluator will build.
//! 2. Report static errors (self-read initializers, redeclaration in the
//!    same local scope, `return` outside a function) — all collected, none
//!    fatal to the walk.
//! 3. Record, for every variable occurrence that binds to a local, the
//!    number of enclosing scopes between the reference and its declaration,
//!    so the evaluator performs exact-frame lookups that later shadowing
//!    can never corrupt. Occurrences absent from the map are globals.
//!
//! The map is keyed by token id: each `Variable`/`Assign` node owns its own
//! token occurrence, so token identity is node identity and every node
//! appears at most once.

use std::collections::HashMap;

use log::{debug, info};

use crate::ast::{Expr, Stmt};
use crate::error::LoxError;
use crate::token::Token;

/// Distance map produced by the resolver and consumed read-only by the
/// evaluator: token id of a `Variable`/`Assign` occurrence → number of
/// enclosing environments to traverse (0 = innermost).
pub type Locals = HashMap<usize, usize>;

/// Are we inside a user function? Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
}

pub struct Resolver<'a> {
    scopes: Vec<HashMap<&'a str, bool>>, // false = declared, true = defined
    locals: Locals,
    diagnostics: Vec<LoxError>,
    current_function: FunctionType,
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        info!("resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            locals: Locals::new(),
            diagnostics: Vec::new(),
            current_function: FunctionType::None,
        }
    }

    /// Walk all top-level statements. Always runs to completion; returns
    /// the distance map together with every diagnostic found. The caller
    /// suppresses evaluation when the diagnostics are non-empty.
    pub fn resolve(mut self, statements: &[Stmt<'a>]) -> (Locals, Vec<LoxError>) {
        info!("resolving {} top-level statement(s)", statements.len());

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        (self.locals, self.diagnostics)
    }

    // ─────────────────────── statement resolution ───────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt<'a>) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define, so that
                // `var a = a;` binds the right-hand `a` outward.
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Function { name, params, body } => {
                // The name is visible inside its own body (recursion).
                self.declare(name);
                self.define(name);
                self.resolve_function(params, body);
            }

            Stmt::Class { name, methods } => {
                self.declare(name);
                self.define(name);

                // Method dispatch is not wired into the evaluator, but the
                // bodies still get a full static pass.
                for method in methods {
                    if let Stmt::Function { params, body, .. } = method {
                        self.resolve_function(params, body);
                    }
                }
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.diagnostics.push(LoxError::resolve(
                        keyword.line,
                        "Cannot return from top-level code",
                    ));
                }
                if let Some(expr) = value {
                    self.resolve_expr(expr);
                }
            }
        }
    }

    // ─────────────────────── expression resolution ──────────────────────

    fn resolve_expr(&mut self, expr: &Expr<'a>) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable(name) => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.lexeme) == Some(&false) {
                        self.diagnostics.push(LoxError::resolve(
                            name.line,
                            "Cannot read local variable in its own initializer",
                        ));
                    }
                }

                self.resolve_local(name);
            }

            Expr::Assign { name, value } => {
                // RHS first, then bind the target.
                self.resolve_expr(value);
                self.resolve_local(name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }
        }
    }

    // ───────────────────────── function helper ──────────────────────────

    /// One fresh scope holds both the parameters and the body statements,
    /// matching the single environment a call creates at runtime.
    fn resolve_function(&mut self, params: &[&'a Token<'a>], body: &[Stmt<'a>]) {
        let enclosing = self.current_function;
        self.current_function = FunctionType::Function;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        for stmt in body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.current_function = enclosing;
    }

    // ───────────────────────── scope management ─────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name.lexeme) {
                self.diagnostics.push(LoxError::resolve(
                    name.line,
                    "Variable already declared in this scope",
                ));
            }

            scope.insert(name.lexeme, false);
        }
    }

    fn define(&mut self, name: &Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme, true);
        }
    }

    /// Record this occurrence as a local at the innermost matching depth,
    /// or leave it out of the map entirely (= global lookup at runtime).
    fn resolve_local(&mut self, name: &Token<'a>) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name.lexeme) {
                debug!("resolved '{}' at depth {}", name.lexeme, depth);

                self.locals.insert(name.id, depth);

                return;
            }
        }

        debug!("resolved '{}' as global", name.lexeme);
    }
}
