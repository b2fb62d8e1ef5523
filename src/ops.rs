//! Operations on values.
//!
//! Every [`Value`] variant answers every operator. Combinations that make no
//! sense return [`EvalError::Unsupported`] when the left operand's type has no
//! such operation, and [`EvalError::IncompatibleTypes`] when it has one but not
//! for the right operand's type.

use std::cmp::Ordering;

use crate::ast::{BinOp, UnaryOp};
use crate::evaluator::{EvalError, EvalResult};
use crate::value::Value;

impl Value {
    pub fn add(&self, rhs: &Value) -> EvalResult<Value> {
        arith(BinOp::Add, self, rhs)
    }

    pub fn sub(&self, rhs: &Value) -> EvalResult<Value> {
        arith(BinOp::Subtract, self, rhs)
    }

    pub fn mul(&self, rhs: &Value) -> EvalResult<Value> {
        arith(BinOp::Multiply, self, rhs)
    }

    pub fn div(&self, rhs: &Value) -> EvalResult<Value> {
        arith(BinOp::Divide, self, rhs)
    }

    pub fn rem(&self, rhs: &Value) -> EvalResult<Value> {
        arith(BinOp::Modulo, self, rhs)
    }

    /// Exponentiation, computed in floating point.
    ///
    /// An integer base with a non-negative integer exponent gives an integer,
    /// so results beyond 2^53 may lose precision.
    pub fn pow(&self, rhs: &Value) -> EvalResult<Value> {
        arith(BinOp::Power, self, rhs)
    }

    pub fn shl(&self, rhs: &Value) -> EvalResult<Value> {
        bitwise(BinOp::Shl, self, rhs)
    }

    pub fn shr(&self, rhs: &Value) -> EvalResult<Value> {
        bitwise(BinOp::Shr, self, rhs)
    }

    pub fn bit_and(&self, rhs: &Value) -> EvalResult<Value> {
        bitwise(BinOp::BitAnd, self, rhs)
    }

    pub fn bit_or(&self, rhs: &Value) -> EvalResult<Value> {
        bitwise(BinOp::BitOr, self, rhs)
    }

    pub fn bit_xor(&self, rhs: &Value) -> EvalResult<Value> {
        bitwise(BinOp::BitXor, self, rhs)
    }

    pub fn neg(&self) -> EvalResult<Value> {
        match self {
            Value::Int(n) => n.checked_neg().map(Value::Int).ok_or(EvalError::Overflow("-")),
            Value::Double(n) => Ok(Value::Double(-n)),
            v => Err(EvalError::Unsupported {
                op: UnaryOp::Negate.symbol(),
                ty: v.type_name(),
            }),
        }
    }

    pub fn bit_not(&self) -> EvalResult<Value> {
        match self {
            Value::Int(n) => Ok(Value::Int(!n)),
            v => Err(EvalError::Unsupported {
                op: UnaryOp::BitNot.symbol(),
                ty: v.type_name(),
            }),
        }
    }

    pub fn not(&self) -> Value {
        Value::Bool(!self.is_truthy())
    }

    pub fn and(&self, rhs: &Value) -> Value {
        Value::Bool(self.is_truthy() && rhs.is_truthy())
    }

    pub fn or(&self, rhs: &Value) -> Value {
        Value::Bool(self.is_truthy() || rhs.is_truthy())
    }

    /// Three-way comparison.
    pub fn compare(&self, rhs: &Value) -> EvalResult<Ordering> {
        const OP: &str = "compare";
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
                let (a, b) = (self.as_f64().unwrap_or(f64::NAN), rhs.as_f64().unwrap_or(f64::NAN));
                a.partial_cmp(&b).ok_or(EvalError::Unsupported {
                    op: OP,
                    ty: "NaN",
                })
            }
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
            (Value::Moment(a), Value::Moment(b)) => {
                a.compare(b).ok_or(EvalError::IncompatibleTypes {
                    op: OP,
                    left: "moment",
                    right: "moment",
                })
            }
            (Value::Slice(_) | Value::Null, _) => Err(EvalError::Unsupported {
                op: OP,
                ty: self.type_name(),
            }),
            (a, b) => Err(EvalError::IncompatibleTypes {
                op: OP,
                left: a.type_name(),
                right: b.type_name(),
            }),
        }
    }

    /// Equality. `null` is equal only to itself and may be compared with anything.
    pub fn equals(&self, rhs: &Value) -> EvalResult<bool> {
        match (self, rhs) {
            (Value::Null, _) | (_, Value::Null) => Ok(self == rhs),
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
                Ok(self.as_f64() == rhs.as_f64())
            }
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Text(a), Value::Text(b)) => Ok(a == b),
            (Value::Moment(_), Value::Moment(_)) => Ok(self.compare(rhs)? == Ordering::Equal),
            (Value::Slice(a), Value::Slice(b)) => Ok(a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|(x, y)| x.equals(y).unwrap_or(false))),
            (a, b) => Err(EvalError::IncompatibleTypes {
                op: BinOp::Equal.symbol(),
                left: a.type_name(),
                right: b.type_name(),
            }),
        }
    }

    /// Single-element access. Negative indices count from the end.
    pub fn index(&self, index: &Value) -> EvalResult<Value> {
        let i = match index {
            Value::Int(i) => *i,
            other => {
                return Err(EvalError::IncompatibleTypes {
                    op: "index",
                    left: self.type_name(),
                    right: other.type_name(),
                });
            }
        };
        match self {
            Value::Slice(items) => {
                let at = resolve_index(i, items.len())?;
                Ok(items[at].clone())
            }
            Value::Text(s) => {
                let chars: Vec<char> = s.chars().collect();
                let at = resolve_index(i, chars.len())?;
                Ok(Value::Text(chars[at].to_string()))
            }
            v => Err(EvalError::Unsupported {
                op: "index",
                ty: v.type_name(),
            }),
        }
    }

    /// Applies a binary operator. `&&` and `||` are evaluated here without
    /// short-circuiting; the evaluator short-circuits before calling this.
    pub fn binary(&self, op: BinOp, rhs: &Value) -> EvalResult<Value> {
        match op {
            BinOp::Or => Ok(self.or(rhs)),
            BinOp::And => Ok(self.and(rhs)),
            BinOp::Equal => self.equals(rhs).map(Value::Bool),
            BinOp::NotEqual => self.equals(rhs).map(|eq| Value::Bool(!eq)),
            BinOp::LessThan => self.compare(rhs).map(|o| Value::Bool(o.is_lt())),
            BinOp::LessEqual => self.compare(rhs).map(|o| Value::Bool(o.is_le())),
            BinOp::GreaterThan => self.compare(rhs).map(|o| Value::Bool(o.is_gt())),
            BinOp::GreaterEqual => self.compare(rhs).map(|o| Value::Bool(o.is_ge())),
            BinOp::BitOr => self.bit_or(rhs),
            BinOp::BitXor => self.bit_xor(rhs),
            BinOp::BitAnd => self.bit_and(rhs),
            BinOp::Shl => self.shl(rhs),
            BinOp::Shr => self.shr(rhs),
            BinOp::Add => self.add(rhs),
            BinOp::Subtract => self.sub(rhs),
            BinOp::Multiply => self.mul(rhs),
            BinOp::Divide => self.div(rhs),
            BinOp::Modulo => self.rem(rhs),
            BinOp::Power => self.pow(rhs),
        }
    }

    pub fn unary(&self, op: UnaryOp) -> EvalResult<Value> {
        match op {
            UnaryOp::Negate => self.neg(),
            UnaryOp::Not => Ok(self.not()),
            UnaryOp::BitNot => self.bit_not(),
        }
    }
}

/// Maps a possibly negative index onto `0..len`.
pub(crate) fn resolve_index(index: i64, len: usize) -> EvalResult<usize> {
    let resolved = if index < 0 {
        len as i64 + index
    } else {
        index
    };
    if resolved < 0 || resolved >= len as i64 {
        return Err(EvalError::IndexOutOfRange { index, len });
    }
    Ok(resolved as usize)
}

fn arith(op: BinOp, left: &Value, right: &Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
        (Value::Int(_) | Value::Double(_), Value::Int(_) | Value::Double(_)) => {
            let (a, b) = (left.as_f64().unwrap_or(0.0), right.as_f64().unwrap_or(0.0));
            float_arith(op, a, b)
        }
        (Value::Int(_) | Value::Double(_), b) => Err(EvalError::IncompatibleTypes {
            op: op.symbol(),
            left: left.type_name(),
            right: b.type_name(),
        }),
        (a, _) => Err(EvalError::Unsupported {
            op: op.symbol(),
            ty: a.type_name(),
        }),
    }
}

fn int_arith(op: BinOp, a: i64, b: i64) -> EvalResult<Value> {
    let overflow = EvalError::Overflow(op.symbol());
    let result = match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Subtract => a.checked_sub(b),
        BinOp::Multiply => a.checked_mul(b),
        BinOp::Divide => {
            if b == 0 {
                return Err(EvalError::ZeroDivision);
            }
            a.checked_div(b)
        }
        BinOp::Modulo => {
            if b == 0 {
                return Err(EvalError::ZeroDivision);
            }
            a.checked_rem(b)
        }
        BinOp::Power => {
            let r = (a as f64).powf(b as f64);
            if b < 0 {
                return Ok(Value::Double(r));
            }
            if !r.is_finite() || r >= i64::MAX as f64 || r < i64::MIN as f64 {
                return Err(overflow);
            }
            Some(r as i64)
        }
        _ => unreachable!("{} is not arithmetic", op),
    };
    result.map(Value::Int).ok_or(overflow)
}

fn float_arith(op: BinOp, a: f64, b: f64) -> EvalResult<Value> {
    let r = match op {
        BinOp::Add => a + b,
        BinOp::Subtract => a - b,
        BinOp::Multiply => a * b,
        BinOp::Divide => {
            if b == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            a / b
        }
        BinOp::Modulo => {
            if b == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            a % b
        }
        BinOp::Power => a.powf(b),
        _ => unreachable!("{} is not arithmetic", op),
    };
    Ok(Value::Double(r))
}

fn bitwise(op: BinOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let (a, b) = match (left, right) {
        (Value::Int(a), Value::Int(b)) => (*a, *b),
        (Value::Int(_), Value::Double(_)) => {
            return Err(EvalError::Unsupported {
                op: op.symbol(),
                ty: "double",
            });
        }
        (Value::Int(_), b) => {
            return Err(EvalError::IncompatibleTypes {
                op: op.symbol(),
                left: "int",
                right: b.type_name(),
            });
        }
        (a, _) => {
            return Err(EvalError::Unsupported {
                op: op.symbol(),
                ty: a.type_name(),
            });
        }
    };
    let value = match op {
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::Shl | BinOp::Shr => {
            if !(0..64).contains(&b) {
                return Err(EvalError::InvalidArgument {
                    function: op.symbol().to_string(),
                    message: format!("shift amount {} is outside 0..64", b),
                });
            }
            if op == BinOp::Shl { a << b } else { a >> b }
        }
        _ => unreachable!("{} is not bitwise", op),
    };
    Ok(Value::Int(value))
}
