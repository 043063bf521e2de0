use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// One scope frame: a name→value map plus an optional link to the enclosing
/// frame. The global frame has no link. Frames are shared through
/// `Rc<RefCell<_>>` because closures keep their defining frame alive after
/// the call that created it returns; the enclosing link is never reassigned
/// after construction.
#[derive(Debug)]
pub struct Environment<'a> {
    values: HashMap<String, Value<'a>>,
    enclosing: Option<Rc<RefCell<Environment<'a>>>>,
}

impl<'a> Environment<'a> {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment<'a>>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Insert or overwrite in *this* frame. Redeclaration is legal and
    /// silently shadows.
    pub fn define(&mut self, name: &str, value: Value<'a>) {
        self.values.insert(name.to_string(), value);
    }

    /// Chained lookup: this frame, then outward. Reaching the root without
    /// a match is an undefined-variable runtime error.
    pub fn get(&self, name: &Token<'_>) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(LoxError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    /// Chained assignment, same search order as [`get`](Self::get).
    pub fn assign(&mut self, name: &Token<'_>, value: Value<'a>) -> Result<()> {
        if self.values.contains_key(name.lexeme) {
            self.values.insert(name.lexeme.to_string(), value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(LoxError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    /// Walk exactly `distance` enclosing links, then read directly in that
    /// frame — no chain scan, so a shadowing declaration in an intervening
    /// scope cannot capture a statically resolved reference.
    pub fn get_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &Token<'_>,
    ) -> Result<Value<'a>> {
        let frame = Self::ancestor(env, distance);
        let frame = frame.borrow();

        match frame.values.get(name.lexeme) {
            Some(value) => Ok(value.clone()),
            None => Err(LoxError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            )),
        }
    }

    /// Exact-distance counterpart of [`assign`](Self::assign).
    pub fn assign_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &Token<'_>,
        value: Value<'a>,
    ) -> Result<()> {
        let frame = Self::ancestor(env, distance);
        let mut frame = frame.borrow_mut();

        if frame.values.contains_key(name.lexeme) {
            frame.values.insert(name.lexeme.to_string(), value);
            Ok(())
        } else {
            Err(LoxError::runtime(
                name.line,
                format!("Undefined variable '{}'.", name.lexeme),
            ))
        }
    }

    fn ancestor(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
    ) -> Rc<RefCell<Environment<'a>>> {
        let mut current = Rc::clone(env);

        for _ in 0..distance {
            let next = current.borrow().enclosing.as_ref().map(Rc::clone);

            match next {
                Some(enclosing) => current = enclosing,
                // A correct distance map never walks past the root; the
                // direct lookup in the reached frame reports the failure.
                None => break,
            }
        }

        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token<'_> {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn define_then_get() {
        let env = Environment::new();
        let env = Rc::new(RefCell::new(env));

        env.borrow_mut().define("a", Value::Number(1.0));

        let got = env.borrow().get(&ident("a")).unwrap();
        assert!(matches!(got, Value::Number(n) if n == 1.0));
    }

    #[test]
    fn redefinition_shadows_silently() {
        let mut env = Environment::new();

        env.define("a", Value::Number(1.0));
        env.define("a", Value::Bool(true));

        let env = Rc::new(RefCell::new(env));
        let got = env.borrow().get(&ident("a")).unwrap();
        assert!(matches!(got, Value::Bool(true)));
    }

    #[test]
    fn get_walks_the_chain_but_get_at_does_not() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));

        let inner = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &global,
        ))));
        inner.borrow_mut().define("a", Value::Number(2.0));

        // Chained lookup sees the shadow.
        let chained = inner.borrow().get(&ident("a")).unwrap();
        assert!(matches!(chained, Value::Number(n) if n == 2.0));

        // Distance 1 skips the shadow and reads the outer frame directly.
        let outer = Environment::get_at(&inner, 1, &ident("a")).unwrap();
        assert!(matches!(outer, Value::Number(n) if n == 1.0));
    }

    #[test]
    fn assign_at_targets_the_exact_frame() {
        let global = Rc::new(RefCell::new(Environment::new()));
        global.borrow_mut().define("a", Value::Number(1.0));

        let inner = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &global,
        ))));
        inner.borrow_mut().define("a", Value::Number(2.0));

        Environment::assign_at(&inner, 1, &ident("a"), Value::Number(9.0)).unwrap();

        let outer = global.borrow().get(&ident("a")).unwrap();
        assert!(matches!(outer, Value::Number(n) if n == 9.0));

        // The shadow is untouched.
        let shadow = Environment::get_at(&inner, 0, &ident("a")).unwrap();
        assert!(matches!(shadow, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn undefined_variable_reports_name_and_line() {
        let env = Environment::new();
        let err = env.get(&ident("missing")).unwrap_err();

        assert!(err.to_string().contains("Undefined variable 'missing'"));
    }
}
