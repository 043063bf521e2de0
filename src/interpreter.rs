//! Tree-walking evaluator.
//!
//! Executes statement sequences by structural recursion over the AST
//! against a chain of lexical environments, using the resolver's distance
//! map for exact-frame variable access. Runtime errors abort the interpret
//! call at the point of failure; `print` output goes to the caller-supplied
//! writer so embedders and tests can capture it.
//!
//! Non-local `return` is modelled as an explicit [`Completion`] threaded
//! back through statement execution rather than as an error, making the
//! one legal catch site — the function-call boundary in
//! [`crate::callable::Callable::call`] — explicit.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::{Expr, LiteralValue, Stmt};
use crate::callable::{Callable, LoxClass, LoxFunction, NativeFunction};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished: fell through normally, or hit `return`. The
/// line is the `return` keyword's, kept so an escape past every call frame
/// can be reported instead of swallowed.
pub enum Completion<'a> {
    Normal,
    Return(Value<'a>, usize),
}

/// Seconds since the Unix epoch, fractional part included.
fn clock_native<'v>(_args: &[Value<'v>]) -> std::result::Result<Value<'v>, String> {
    Ok(Value::Number(Utc::now().timestamp_millis() as f64 / 1000.0))
}

pub struct Interpreter<'a, 'w> {
    globals: Rc<RefCell<Environment<'a>>>,
    environment: Rc<RefCell<Environment<'a>>>,
    locals: Locals,
    output: &'w mut dyn Write,
}

impl<'a, 'w> Interpreter<'a, 'w> {
    /// Create an interpreter writing `print` output to `output`, with the
    /// native functions pre-defined in the global environment.
    pub fn new(output: &'w mut dyn Write) -> Self {
        info!("initializing interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::Callable(Callable::Native(NativeFunction {
                name: "clock",
                arity: 0,
                func: clock_native,
            })),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: Locals::new(),
            output,
        }
    }

    /// Execute a statement sequence against the persistent global
    /// environment. `locals` is merged into the held distance map, so a
    /// prompt session accumulates resolutions across lines. Halts on the
    /// first runtime error; statements after the failing one do not run.
    pub fn interpret(&mut self, statements: &'a [Stmt<'a>], locals: Locals) -> Result<()> {
        debug!("interpreting {} statement(s)", statements.len());

        self.locals.extend(locals);

        for stmt in statements {
            match self.execute(stmt)? {
                Completion::Normal => {}
                // The resolver rejects this statically; refuse rather than
                // swallow if an unresolved program ever gets here.
                Completion::Return(_, line) => {
                    return Err(LoxError::runtime(line, "Cannot return from top-level code."));
                }
            }
        }

        Ok(())
    }

    // ───────────────────────── statements ─────────────────────────

    fn execute(&mut self, stmt: &'a Stmt<'a>) -> Result<Completion<'a>> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Completion::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value)?;

                Ok(Completion::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                self.environment.borrow_mut().define(name.lexeme, value);

                Ok(Completion::Normal)
            }

            Stmt::Block(statements) => {
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));

                self.execute_block(statements, environment)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Completion::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Completion::Normal => {}
                        ret => return Ok(ret),
                    }
                }

                Ok(Completion::Normal)
            }

            Stmt::Function { name, params, body } => {
                debug!("defining function '{}'", name.lexeme);

                // Capture the environment active at declaration.
                let function = LoxFunction {
                    name: name.lexeme.to_string(),
                    params: params.as_slice(),
                    body: body.as_slice(),
                    closure: Rc::clone(&self.environment),
                };

                self.environment.borrow_mut().define(
                    name.lexeme,
                    Value::Callable(Callable::Function(Rc::new(function))),
                );

                Ok(Completion::Normal)
            }

            Stmt::Return { keyword, value } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Completion::Return(value, keyword.line))
            }

            Stmt::Class { name, methods: _ } => {
                debug!("defining class '{}'", name.lexeme);

                let class = LoxClass {
                    name: name.lexeme.to_string(),
                };

                self.environment.borrow_mut().define(
                    name.lexeme,
                    Value::Callable(Callable::Class(Rc::new(class))),
                );

                Ok(Completion::Normal)
            }
        }
    }

    /// Run `statements` in `environment`, restoring the previous cursor
    /// unconditionally — on normal completion, `return`, and error alike.
    pub(crate) fn execute_block(
        &mut self,
        statements: &'a [Stmt<'a>],
        environment: Rc<RefCell<Environment<'a>>>,
    ) -> Result<Completion<'a>> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result = Ok(Completion::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Completion::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;

        result
    }

    // ───────────────────────── expressions ────────────────────────

    pub fn evaluate(&mut self, expr: &'a Expr<'a>) -> Result<Value<'a>> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;

                // `or` yields a truthy left operand; `and` a falsy one.
                // Either way the result is the operand itself, not a bool.
                match operator.token_type {
                    TokenType::OR if left.is_truthy() => Ok(left),
                    TokenType::AND if !left.is_truthy() => Ok(left),
                    _ => self.evaluate(right),
                }
            }

            Expr::Variable(name) => self.look_up_variable(name),

            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(&name.id) {
                    Some(&distance) => Environment::assign_at(
                        &self.environment,
                        distance,
                        name,
                        value.clone(),
                    )?,
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut args: Vec<Value<'a>> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                match callee {
                    Value::Callable(callable) => callable.call(self, args, paren),
                    _ => Err(LoxError::runtime(
                        paren.line,
                        "Can only call functions and classes.",
                    )),
                }
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.borrow().get(name),
                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set { name, .. } => Err(LoxError::runtime(
                name.line,
                "Property assignment is not supported.",
            )),
        }
    }

    fn evaluate_unary(&mut self, operator: &'a Token<'a>, right: &'a Expr<'a>) -> Result<Value<'a>> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operand must be a number.",
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),

            _ => Err(LoxError::runtime(
                operator.line,
                format!("Invalid unary operator '{}'.", operator.lexeme),
            )),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &'a Expr<'a>,
        operator: &'a Token<'a>,
        right: &'a Expr<'a>,
    ) -> Result<Value<'a>> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
                _ => Err(self.numbers_expected(operator)),
            },

            TokenType::STAR => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
                _ => Err(self.numbers_expected(operator)),
            },

            // IEEE-754 semantics throughout; division by zero yields inf.
            TokenType::SLASH => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
                _ => Err(self.numbers_expected(operator)),
            },

            TokenType::GREATER => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),
                _ => Err(self.numbers_expected(operator)),
            },

            TokenType::GREATER_EQUAL => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),
                _ => Err(self.numbers_expected(operator)),
            },

            TokenType::LESS => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),
                _ => Err(self.numbers_expected(operator)),
            },

            TokenType::LESS_EQUAL => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),
                _ => Err(self.numbers_expected(operator)),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left.equals(&right))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!left.equals(&right))),

            _ => Err(LoxError::runtime(
                operator.line,
                format!("Invalid binary operator '{}'.", operator.lexeme),
            )),
        }
    }

    fn numbers_expected(&self, operator: &Token<'_>) -> LoxError {
        LoxError::runtime(operator.line, "Operands must be two numbers.")
    }

    /// Distance-mapped lookup: present ⇒ exact frame, absent ⇒ global.
    fn look_up_variable(&self, name: &'a Token<'a>) -> Result<Value<'a>> {
        match self.locals.get(&name.id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }
}
