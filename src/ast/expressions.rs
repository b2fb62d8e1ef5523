use crate::ast::{BinOp, Position, Token, UnaryOp, Unit};
use crate::value::Value;

/// Where a variable reference is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarScope {
    /// `$name`: the enclosing object and call frames
    Local,
    /// `@name`: the document's base environment
    Env,
}

/// A call argument, positional or named.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
}

impl Arg {
    pub fn positional(value: Expr) -> Self {
        Arg { name: None, value }
    }

    pub fn named(name: impl Into<String>, value: Expr) -> Self {
        Arg {
            name: Some(name.into()),
            value,
        }
    }
}

/// An evaluable expression.
///
/// Expressions appear on the right-hand side of options and as macro and
/// call arguments. They are evaluated lazily, against an environment rebuilt
/// for each query.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    ///
    /// The token is kept for error reporting; `value` is the decoded literal
    /// before any unit multiplier is applied.
    ///
    /// # Examples
    /// ```text
    /// 42
    /// "text"
    /// 2024-03-01
    /// 512MB
    /// ```
    Literal {
        token: Token,
        value: Value,
        unit: Option<Unit>,
    },

    /// Variable reference
    ///
    /// # Examples
    /// ```text
    /// $port      // Local
    /// @HOME      // Env
    /// ```
    Variable {
        name: String,
        scope: VarScope,
        position: Position,
    },

    /// Prefix operation (`-x`, `!x`, `~x`)
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Infix operation
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Conditional
    ///
    /// # Example
    /// ```text
    /// $debug ? "trace" : "info"
    /// ```
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    /// Array literal
    ///
    /// # Example
    /// ```text
    /// [1, 2, $three]
    /// ```
    Array(Vec<Expr>),

    /// Single-element access (`$hosts[0]`, `$hosts[-1]`)
    Index { target: Box<Expr>, index: Box<Expr> },

    /// Builtin function call
    ///
    /// # Example
    /// ```text
    /// join(["a", "b"], sep=".")
    /// ```
    Call {
        name: String,
        args: Vec<Arg>,
        position: Position,
    },
}

impl Expr {
    /// Position of the first token of this expression, where one is known.
    pub fn position(&self) -> Option<Position> {
        match self {
            Expr::Literal { token, .. } => Some(token.position),
            Expr::Variable { position, .. } | Expr::Call { position, .. } => Some(*position),
            Expr::Unary { operand, .. } => operand.position(),
            Expr::Binary { left, .. } => left.position(),
            Expr::Ternary { condition, .. } => condition.position(),
            Expr::Array(items) => items.first().and_then(Expr::position),
            Expr::Index { target, .. } => target.position(),
        }
    }

    /// Names of the `$` variables this expression reads, in source order.
    /// Both branches of a ternary are included.
    pub fn local_refs(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_local_refs(&mut names);
        names
    }

    fn collect_local_refs<'e>(&'e self, names: &mut Vec<&'e str>) {
        match self {
            Expr::Literal { .. } => {}
            Expr::Variable { name, scope, .. } => {
                if *scope == VarScope::Local && !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Expr::Unary { operand, .. } => operand.collect_local_refs(names),
            Expr::Binary { left, right, .. } => {
                left.collect_local_refs(names);
                right.collect_local_refs(names);
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_local_refs(names);
                then.collect_local_refs(names);
                otherwise.collect_local_refs(names);
            }
            Expr::Array(items) => {
                for item in items {
                    item.collect_local_refs(names);
                }
            }
            Expr::Index { target, index } => {
                target.collect_local_refs(names);
                index.collect_local_refs(names);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.value.collect_local_refs(names);
                }
            }
        }
    }
}
