//! Debug utility rendering the AST in parenthesized prefix form.

use crate::ast::{Expr, LiteralValue, Stmt};

pub struct AstPrinter;

impl AstPrinter {
    /// Render an expression: `1 + 2 * 3` → `(+ 1.0 (* 2.0 3.0))`.
    pub fn print(expr: &Expr<'_>) -> String {
        match expr {
            Expr::Literal(literal) => match literal {
                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }

                LiteralValue::Str(s) => s.clone(),

                LiteralValue::True => "true".to_string(),

                LiteralValue::False => "false".to_string(),

                LiteralValue::Nil => "nil".to_string(),
            },

            Expr::Grouping(inner) => format!("(group {})", Self::print(inner)),

            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, Self::print(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                Self::print(left),
                Self::print(right)
            ),

            Expr::Variable(name) => name.lexeme.to_string(),

            Expr::Assign { name, value } => {
                format!("(= {} {})", name.lexeme, Self::print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut out = format!("(call {}", Self::print(callee));
                for argument in arguments {
                    out.push(' ');
                    out.push_str(&Self::print(argument));
                }
                out.push(')');
                out
            }

            Expr::Get { object, name } => {
                format!("(. {} {})", Self::print(object), name.lexeme)
            }

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(.= {} {} {})",
                Self::print(object),
                name.lexeme,
                Self::print(value)
            ),
        }
    }

    /// Render a statement tree, one s-expression per construct.
    pub fn print_stmt(stmt: &Stmt<'_>) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("(; {})", Self::print(expr)),

            Stmt::Print(expr) => format!("(print {})", Self::print(expr)),

            Stmt::Var { name, initializer } => match initializer {
                Some(init) => format!("(var {} {})", name.lexeme, Self::print(init)),
                None => format!("(var {})", name.lexeme),
            },

            Stmt::Block(statements) => {
                let mut out = String::from("(block");
                for statement in statements {
                    out.push(' ');
                    out.push_str(&Self::print_stmt(statement));
                }
                out.push(')');
                out
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    Self::print(condition),
                    Self::print_stmt(then_branch),
                    Self::print_stmt(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    Self::print(condition),
                    Self::print_stmt(then_branch)
                ),
            },

            Stmt::While { condition, body } => format!(
                "(while {} {})",
                Self::print(condition),
                Self::print_stmt(body)
            ),

            Stmt::Function { name, params, body } => {
                let mut out = format!("(fun {} (", name.lexeme);
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    out.push_str(param.lexeme);
                }
                out.push(')');
                for statement in body {
                    out.push(' ');
                    out.push_str(&Self::print_stmt(statement));
                }
                out.push(')');
                out
            }

            Stmt::Return { value, .. } => match value {
                Some(value) => format!("(return {})", Self::print(value)),
                None => "(return)".to_string(),
            },

            Stmt::Class { name, methods } => {
                let mut out = format!("(class {}", name.lexeme);
                for method in methods {
                    out.push(' ');
                    out.push_str(&Self::print_stmt(method));
                }
                out.push(')');
                out
            }
        }
    }
}
