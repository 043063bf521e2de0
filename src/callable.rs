//! The callable object model: the one extension point for behavior that
//! script code can invoke. Native functions wrap host logic behind a fn
//! pointer, user functions pair AST references with the environment active
//! at their declaration (the closure), and classes act as constructors that
//! allocate bare field-map instances.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::Stmt;
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::interpreter::{Completion, Interpreter};
use crate::token::Token;
use crate::value::Value;

/// Host-side body of a native function. Higher-ranked over the value
/// lifetime so one registration serves every program.
pub type NativeFn = for<'v> fn(&[Value<'v>]) -> std::result::Result<Value<'v>, String>;

/// A built-in function: fixed arity, host logic as the body.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

/// A user-declared function: parameter and body references into the AST
/// plus the environment captured at declaration.
pub struct LoxFunction<'a> {
    pub name: String,
    pub params: &'a [&'a Token<'a>],
    pub body: &'a [Stmt<'a>],
    pub closure: Rc<RefCell<Environment<'a>>>,
}

/// A class value owns its name; calling it allocates an instance. Declared
/// methods stay on the `Class` statement — dispatch is not wired.
pub struct LoxClass {
    pub name: String,
}

/// An instance: a reference to its class plus its own field map. Fields are
/// only ever populated through property assignment, which the evaluator
/// rejects, so every read of a fresh instance reports an undefined property.
pub struct LoxInstance<'a> {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value<'a>>,
}

impl<'a> LoxInstance<'a> {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// Field read; an undefined field is a runtime error naming it.
    pub fn get(&self, name: &Token<'_>) -> Result<Value<'a>> {
        match self.fields.get(name.lexeme) {
            Some(value) => Ok(value.clone()),
            None => Err(LoxError::runtime(
                name.line,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }
}

/// Polymorphic callable capability: `arity()` plus `call()`.
#[derive(Clone)]
pub enum Callable<'a> {
    Native(NativeFunction),
    Function(Rc<LoxFunction<'a>>),
    Class(Rc<LoxClass>),
}

impl<'a> Callable<'a> {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Native(native) => native.arity,
            Callable::Function(function) => function.params.len(),
            Callable::Class(_) => 0,
        }
    }

    /// Invoke with already-evaluated arguments. `paren` is the closing
    /// parenthesis of the call site, used for error locations.
    pub fn call(
        &self,
        interpreter: &mut Interpreter<'a, '_>,
        arguments: Vec<Value<'a>>,
        paren: &Token<'_>,
    ) -> Result<Value<'a>> {
        match self {
            Callable::Native(native) => {
                debug!("calling native function '{}'", native.name);

                self.check_arity(arguments.len(), paren)?;

                (native.func)(&arguments)
                    .map_err(|message| LoxError::runtime(paren.line, message))
            }

            Callable::Function(function) => {
                debug!("calling function '{}'", function.name);

                self.check_arity(arguments.len(), paren)?;

                // One fresh frame per call, chained to the closure (not the
                // caller's environment), with parameters bound positionally.
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &function.closure,
                ))));

                {
                    let mut frame = environment.borrow_mut();
                    for (param, argument) in function.params.iter().zip(arguments) {
                        frame.define(param.lexeme, argument);
                    }
                }

                // The call boundary is the only catch site for `return`.
                match interpreter.execute_block(function.body, environment)? {
                    Completion::Normal => Ok(Value::Nil),
                    Completion::Return(value, _) => Ok(value),
                }
            }

            Callable::Class(class) => {
                debug!("instantiating class '{}'", class.name);

                // A class accepts any argument count and allocates a bare
                // instance; there is no initializer to forward to.
                Ok(Value::Instance(Rc::new(RefCell::new(LoxInstance::new(
                    Rc::clone(class),
                )))))
            }
        }
    }

    fn check_arity(&self, got: usize, paren: &Token<'_>) -> Result<()> {
        let expected = self.arity();

        if got != expected {
            return Err(LoxError::runtime(
                paren.line,
                format!("Expected {} arguments but got {}.", expected, got),
            ));
        }

        Ok(())
    }

    /// Identity comparison for `==`: user functions and classes by
    /// allocation, natives by registration name.
    pub fn identity_eq(&self, other: &Callable<'a>) -> bool {
        match (self, other) {
            (Callable::Native(a), Callable::Native(b)) => a.name == b.name,
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Class(a), Callable::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<'a> fmt::Display for Callable<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(native) => write!(f, "<native fn {}>", native.name),
            Callable::Function(function) => write!(f, "<fn {}>", function.name),
            Callable::Class(class) => write!(f, "{}", class.name),
        }
    }
}

// Closure environments can contain the function value itself (recursion), so
// Debug prints the surface form rather than descending into the capture.
impl<'a> fmt::Debug for Callable<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl<'a> fmt::Debug for LoxInstance<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}
