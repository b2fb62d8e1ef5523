use std::fmt;

use crate::{
    ast::{Arg, BinOp, Expr, VarScope},
    builtins::{self, Args, Builtin},
    environment::{Environment, Frame},
    lexer::Lexer,
    parser::Parser,
    value::Value,
};

/// Errors that can occur while evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The operand's type has no such operation
    Unsupported { op: &'static str, ty: &'static str },

    /// The operation exists for the left type but not with this right type
    IncompatibleTypes {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    /// Division or modulo by zero
    ZeroDivision,

    /// Checked integer arithmetic overflowed
    Overflow(&'static str),

    /// Index outside the bounds of a slice or text
    IndexOutOfRange { index: i64, len: usize },

    /// `$name` or `@name` is not bound
    UndefinedVariable(String),

    /// Options that refer to each other in a loop
    CyclicReference(String),

    /// Call to a function that is not a builtin
    UndefinedFunction(String),

    /// A builtin rejected an argument
    InvalidArgument { function: String, message: String },

    /// A required parameter has no argument and no default
    MissingArgument { function: String, param: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Unsupported { op, ty } => {
                write!(f, "Type error: '{}' is not supported for {}", op, ty)
            }
            EvalError::IncompatibleTypes { op, left, right } => {
                write!(f, "Type error: cannot apply '{}' to {} and {}", op, left, right)
            }
            EvalError::ZeroDivision => write!(f, "Division by zero"),
            EvalError::Overflow(op) => write!(f, "Integer overflow in '{}'", op),
            EvalError::IndexOutOfRange { index, len } => {
                write!(f, "Index {} out of range for length {}", index, len)
            }
            EvalError::UndefinedVariable(name) => write!(f, "Undefined variable: {}", name),
            EvalError::CyclicReference(name) => write!(f, "Cyclic reference: {}", name),
            EvalError::UndefinedFunction(name) => write!(f, "Undefined function: {}()", name),
            EvalError::InvalidArgument { function, message } => {
                write!(f, "Invalid argument to {}(): {}", function, message)
            }
            EvalError::MissingArgument { function, param } => {
                write!(f, "Missing argument '{}' to {}()", param, function)
            }
        }
    }
}

impl std::error::Error for EvalError {}

pub type EvalResult<T> = Result<T, EvalError>;

impl Expr {
    /// Evaluates this expression against `env`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fig_lang::{Environment, Value};
    /// use fig_lang::lexer::Lexer;
    /// use fig_lang::parser::Parser;
    ///
    /// let expr = Parser::new(Lexer::new("seq(8, 5, 1)")).unwrap().parse().unwrap();
    /// let mut env = Environment::new();
    ///
    /// assert_eq!(
    ///     expr.eval(&mut env).unwrap(),
    ///     Value::Slice(vec![Value::Int(8), Value::Int(7), Value::Int(6)])
    /// );
    /// ```
    pub fn eval(&self, env: &mut Environment) -> EvalResult<Value> {
        Evaluator::new(env).eval_expr(self)
    }
}

/// Tree-walking evaluator over a borrowed environment.
///
/// Builtin calls push a frame onto the environment for their arguments and
/// pop it again before returning, whether the call succeeded or not.
pub struct Evaluator<'env> {
    env: &'env mut Environment,
}

impl<'env> Evaluator<'env> {
    pub fn new(env: &'env mut Environment) -> Self {
        Evaluator { env }
    }

    pub fn eval_expr(&mut self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Literal { value, unit, .. } => match unit {
                Some(unit) => value.mul(&Value::Int(unit.factor)),
                None => Ok(value.clone()),
            },

            Expr::Variable { name, scope, .. } => {
                let value = match scope {
                    VarScope::Local => self.env.resolve_local(name)?,
                    VarScope::Env => self.env.resolve_env(name)?,
                };
                Ok(value.clone())
            }

            Expr::Unary { op, operand } => self.eval_expr(operand)?.unary(*op),

            Expr::Binary { op, left, right } => {
                let left = self.eval_expr(left)?;
                match op {
                    BinOp::And if !left.is_truthy() => Ok(Value::Bool(false)),
                    BinOp::Or if left.is_truthy() => Ok(Value::Bool(true)),
                    BinOp::And | BinOp::Or => Ok(Value::Bool(self.eval_expr(right)?.is_truthy())),
                    _ => {
                        let right = self.eval_expr(right)?;
                        left.binary(*op, &right)
                    }
                }
            }

            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                if self.eval_expr(condition)?.is_truthy() {
                    self.eval_expr(then)
                } else {
                    self.eval_expr(otherwise)
                }
            }

            Expr::Array(elements) => {
                let values = elements
                    .iter()
                    .map(|e| self.eval_expr(e))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::Slice(values))
            }

            Expr::Index { target, index } => {
                let target = self.eval_expr(target)?;
                let index = self.eval_expr(index)?;
                target.index(&index)
            }

            Expr::Call { name, args, .. } => {
                let builtin =
                    builtins::lookup(name).ok_or_else(|| EvalError::UndefinedFunction(name.clone()))?;
                self.call(builtin, args)
            }
        }
    }

    fn call(&mut self, builtin: &'static Builtin, args: &[Arg]) -> EvalResult<Value> {
        let frame = self.bind_arguments(builtin, args)?;

        self.env.push_frame(frame);
        let result = self
            .fill_defaults(builtin)
            .and_then(|()| (builtin.func)(&Args::new(builtin.name, self.env)));
        self.env.pop();

        result
    }

    /// Evaluates call arguments in the caller's scope and binds them to
    /// parameters: positional in order, variadic collecting the rest, then named.
    fn bind_arguments(&mut self, builtin: &Builtin, args: &[Arg]) -> EvalResult<Frame> {
        let invalid = |message: String| EvalError::InvalidArgument {
            function: builtin.name.to_string(),
            message,
        };

        let mut frame = Frame::new();
        let mut rest: Option<(&str, Vec<Value>)> = None;
        let mut position = 0;

        for arg in args {
            let value = self.eval_expr(&arg.value)?;

            match &arg.name {
                None => {
                    if let Some((_, collected)) = rest.as_mut() {
                        collected.push(value);
                        continue;
                    }
                    let param = builtin.params.get(position).ok_or_else(|| {
                        invalid(format!(
                            "expected at most {} arguments, got {}",
                            builtin.params.len(),
                            args.len()
                        ))
                    })?;
                    position += 1;
                    if param.variadic {
                        rest = Some((param.name, vec![value]));
                    } else {
                        frame.define(param.name, value);
                    }
                }
                Some(name) => {
                    let (index, param) = builtin
                        .param(name)
                        .ok_or_else(|| invalid(format!("unknown parameter '{}'", name)))?;
                    let bound_positionally = index < position
                        || rest.as_ref().is_some_and(|(rest_name, _)| rest_name == name);
                    if bound_positionally || frame.contains(name) {
                        return Err(invalid(format!("parameter '{}' is bound twice", name)));
                    }
                    frame.define(param.name, value);
                }
            }
        }

        if let Some((name, collected)) = rest {
            frame.define(name, Value::Slice(collected));
        }
        Ok(frame)
    }

    /// Binds defaults for unbound parameters. Runs with the call frame pushed,
    /// so a default can see the parameters bound before it.
    fn fill_defaults(&mut self, builtin: &Builtin) -> EvalResult<()> {
        for param in builtin.params {
            if self.env.current().contains(param.name) {
                continue;
            }

            let value = match (param.default, param.variadic) {
                (Some(source), _) => {
                    let expr = Parser::new(Lexer::new(source))
                        .and_then(|mut p| p.parse())
                        .map_err(|e| EvalError::InvalidArgument {
                            function: builtin.name.to_string(),
                            message: format!("bad default for '{}': {}", param.name, e),
                        })?;
                    self.eval_expr(&expr)?
                }
                (None, true) => Value::Slice(Vec::new()),
                (None, false) => {
                    return Err(EvalError::MissingArgument {
                        function: builtin.name.to_string(),
                        param: param.name.to_string(),
                    });
                }
            };
            self.env.define(param.name, value);
        }
        Ok(())
    }
}
