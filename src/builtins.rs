//! The builtin function registry.
//!
//! Each builtin declares its parameters as [`Param`] descriptors. The evaluator
//! binds call arguments into a fresh frame (see [`crate::evaluator`]) and the
//! native function reads them back through [`Args`].

use std::{cmp::Ordering, fs, path::Path};

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE},
};
use rand::Rng;
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::{
    environment::Environment,
    evaluator::{EvalError, EvalResult},
    ops::resolve_index,
    value::Value,
};

/// A formal parameter. `default` is source text evaluated in the call frame.
#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub default: Option<&'static str>,
    pub variadic: bool,
}

const fn required(name: &'static str) -> Param {
    Param {
        name,
        default: None,
        variadic: false,
    }
}

const fn optional(name: &'static str, default: &'static str) -> Param {
    Param {
        name,
        default: Some(default),
        variadic: false,
    }
}

const fn variadic(name: &'static str) -> Param {
    Param {
        name,
        default: None,
        variadic: true,
    }
}

pub type NativeFn = fn(&Args<'_>) -> EvalResult<Value>;

pub struct Builtin {
    pub name: &'static str,
    pub params: &'static [Param],
    pub func: NativeFn,
}

impl Builtin {
    pub fn param(&self, name: &str) -> Option<(usize, &Param)> {
        self.params.iter().enumerate().find(|(_, p)| p.name == name)
    }
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builtin")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// Bound arguments of one call, read from the call frame.
pub struct Args<'a> {
    function: &'a str,
    env: &'a Environment,
}

impl<'a> Args<'a> {
    pub fn new(function: &'a str, env: &'a Environment) -> Self {
        Args { function, env }
    }

    pub fn get(&self, param: &str) -> EvalResult<&'a Value> {
        self.env.resolve(param)
    }

    pub fn invalid(&self, message: impl Into<String>) -> EvalError {
        EvalError::InvalidArgument {
            function: self.function.to_string(),
            message: message.into(),
        }
    }

    fn expected(&self, param: &str, expected: &str, found: &Value) -> EvalError {
        self.invalid(format!(
            "{} must be {}, got {}",
            param,
            expected,
            found.type_name()
        ))
    }

    pub fn int(&self, param: &str) -> EvalResult<i64> {
        let value = self.get(param)?;
        value.as_i64().ok_or_else(|| self.expected(param, "int", value))
    }

    pub fn number(&self, param: &str) -> EvalResult<f64> {
        let value = self.get(param)?;
        value.as_f64().ok_or_else(|| self.expected(param, "a number", value))
    }

    pub fn text(&self, param: &str) -> EvalResult<&'a str> {
        let value = self.get(param)?;
        value.as_str().ok_or_else(|| self.expected(param, "text", value))
    }

    pub fn bool(&self, param: &str) -> EvalResult<bool> {
        let value = self.get(param)?;
        value.as_bool().ok_or_else(|| self.expected(param, "bool", value))
    }

    pub fn slice(&self, param: &str) -> EvalResult<&'a [Value]> {
        let value = self.get(param)?;
        value.as_slice().ok_or_else(|| self.expected(param, "a slice", value))
    }

    /// A variadic parameter with slice arguments spliced in one level deep.
    pub fn flattened(&self, param: &str) -> EvalResult<Vec<&'a Value>> {
        let mut out = Vec::new();
        for value in self.slice(param)? {
            match value {
                Value::Slice(items) => out.extend(items.iter()),
                other => out.push(other),
            }
        }
        Ok(out)
    }

    fn missing(&self, param: &str) -> EvalError {
        EvalError::MissingArgument {
            function: self.function.to_string(),
            param: param.to_string(),
        }
    }
}

const OBJ: &[Param] = &[required("obj")];
const ARR: &[Param] = &[required("arr")];
const NUM: &[Param] = &[required("num")];
const STR: &[Param] = &[required("str")];
const PATH: &[Param] = &[required("path")];
const REST: &[Param] = &[variadic("args")];
const B64: &[Param] = &[required("str"), optional("url", "false")];

static BUILTINS: &[Builtin] = &[
    Builtin { name: "typeof", params: OBJ, func: type_of },
    Builtin { name: "len", params: OBJ, func: len },
    Builtin { name: "first", params: ARR, func: first },
    Builtin { name: "last", params: ARR, func: last },
    Builtin {
        name: "seq",
        params: &[required("first"), required("last"), optional("step", "1")],
        func: seq,
    },
    Builtin { name: "randn", params: NUM, func: randn },
    Builtin { name: "abs", params: NUM, func: abs },
    Builtin { name: "sqrt", params: NUM, func: sqrt },
    Builtin { name: "min", params: REST, func: min },
    Builtin { name: "max", params: REST, func: max },
    Builtin { name: "all", params: REST, func: all },
    Builtin { name: "any", params: REST, func: any },
    Builtin { name: "avg", params: REST, func: avg },
    Builtin { name: "upper", params: STR, func: upper },
    Builtin { name: "lower", params: STR, func: lower },
    Builtin {
        name: "split",
        params: &[required("str"), optional("sep", "\" \"")],
        func: split,
    },
    Builtin {
        name: "join",
        params: &[required("arr"), optional("sep", "\" \"")],
        func: join,
    },
    Builtin {
        name: "contains",
        params: &[required("str"), required("substr")],
        func: contains,
    },
    Builtin {
        name: "substr",
        params: &[required("str"), optional("pos", "0"), optional("len", "0")],
        func: substr,
    },
    Builtin {
        name: "trim",
        params: &[required("str"), optional("char", "\"\"")],
        func: trim,
    },
    Builtin {
        name: "replace",
        params: &[
            required("str"),
            required("src"),
            required("dst"),
            optional("count", "0"),
        ],
        func: replace,
    },
    Builtin { name: "dirname", params: PATH, func: dirname },
    Builtin { name: "dir", params: PATH, func: dirname },
    Builtin { name: "basename", params: PATH, func: basename },
    Builtin { name: "base", params: PATH, func: basename },
    Builtin { name: "isfile", params: PATH, func: is_file },
    Builtin { name: "isdir", params: PATH, func: is_dir },
    Builtin { name: "read", params: &[variadic("file")], func: read },
    Builtin { name: "b64encode", params: B64, func: b64encode },
    Builtin { name: "b64decode", params: B64, func: b64decode },
];

/// Finds a builtin by name (aliases included).
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

fn type_of(args: &Args<'_>) -> EvalResult<Value> {
    Ok(Value::from(args.get("obj")?.type_name()))
}

fn len(args: &Args<'_>) -> EvalResult<Value> {
    let n = match args.get("obj")? {
        Value::Text(s) => s.chars().count(),
        Value::Slice(items) => items.len(),
        other => return Err(args.expected("obj", "text or a slice", other)),
    };
    Ok(Value::Int(n as i64))
}

fn first(args: &Args<'_>) -> EvalResult<Value> {
    let items = args.slice("arr")?;
    items
        .first()
        .cloned()
        .ok_or(EvalError::IndexOutOfRange { index: 0, len: 0 })
}

fn last(args: &Args<'_>) -> EvalResult<Value> {
    let items = args.slice("arr")?;
    items
        .last()
        .cloned()
        .ok_or(EvalError::IndexOutOfRange { index: -1, len: 0 })
}

fn seq(args: &Args<'_>) -> EvalResult<Value> {
    let (start, end, step) = (args.int("first")?, args.int("last")?, args.int("step")?);
    if step == 0 {
        return Err(args.invalid("step must not be 0"));
    }
    let step = if end < start {
        -step.saturating_abs()
    } else {
        step.saturating_abs()
    };

    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < end) || (step < 0 && i > end) {
        out.push(Value::Int(i));
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    Ok(Value::Slice(out))
}

fn randn(args: &Args<'_>) -> EvalResult<Value> {
    let n = args.int("num")?;
    if n <= 0 {
        return Err(args.invalid(format!("num must be positive, got {}", n)));
    }
    Ok(Value::Int(rand::thread_rng().gen_range(0..n)))
}

fn abs(args: &Args<'_>) -> EvalResult<Value> {
    match args.get("num")? {
        Value::Int(n) => n.checked_abs().map(Value::Int).ok_or(EvalError::Overflow("abs")),
        Value::Double(n) => Ok(Value::Double(n.abs())),
        other => Err(args.expected("num", "a number", other)),
    }
}

fn sqrt(args: &Args<'_>) -> EvalResult<Value> {
    let n = args.number("num")?;
    if n < 0.0 {
        return Err(args.invalid(format!("cannot take the square root of {}", n)));
    }
    Ok(Value::Double(n.sqrt()))
}

fn extreme(args: &Args<'_>, keep: Ordering) -> EvalResult<Value> {
    let values = args.flattened("args")?;
    let mut iter = values.into_iter();
    let mut best = iter.next().ok_or_else(|| args.missing("args"))?;
    for value in iter {
        if value.compare(best)? == keep {
            best = value;
        }
    }
    Ok(best.clone())
}

fn min(args: &Args<'_>) -> EvalResult<Value> {
    extreme(args, Ordering::Less)
}

fn max(args: &Args<'_>) -> EvalResult<Value> {
    extreme(args, Ordering::Greater)
}

fn all(args: &Args<'_>) -> EvalResult<Value> {
    Ok(Value::Bool(args.flattened("args")?.iter().all(|v| v.is_truthy())))
}

fn any(args: &Args<'_>) -> EvalResult<Value> {
    Ok(Value::Bool(args.flattened("args")?.iter().any(|v| v.is_truthy())))
}

fn avg(args: &Args<'_>) -> EvalResult<Value> {
    let values = args.flattened("args")?;
    if values.is_empty() {
        return Err(args.missing("args"));
    }

    let mut sum = Decimal::ZERO;
    for value in &values {
        let d = match value {
            Value::Int(n) => Decimal::from_i64(*n),
            Value::Double(n) => Decimal::from_f64(*n),
            other => return Err(args.expected("args", "numbers", other)),
        };
        let d = d.ok_or_else(|| args.invalid(format!("{} cannot be averaged", value)))?;
        sum = sum.checked_add(d).ok_or(EvalError::Overflow("avg"))?;
    }

    let mean = sum / Decimal::from(values.len());
    mean.to_f64()
        .map(Value::Double)
        .ok_or_else(|| args.invalid("average is out of range"))
}

fn upper(args: &Args<'_>) -> EvalResult<Value> {
    Ok(Value::Text(args.text("str")?.to_uppercase()))
}

fn lower(args: &Args<'_>) -> EvalResult<Value> {
    Ok(Value::Text(args.text("str")?.to_lowercase()))
}

fn split(args: &Args<'_>) -> EvalResult<Value> {
    let (s, sep) = (args.text("str")?, args.text("sep")?);
    if sep.is_empty() {
        return Err(args.invalid("separator must not be empty"));
    }
    Ok(Value::Slice(s.split(sep).map(Value::from).collect()))
}

fn join(args: &Args<'_>) -> EvalResult<Value> {
    let (items, sep) = (args.slice("arr")?, args.text("sep")?);
    let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
    Ok(Value::Text(parts.join(sep)))
}

fn contains(args: &Args<'_>) -> EvalResult<Value> {
    let needle = args.get("substr")?;
    match args.get("str")? {
        Value::Slice(items) => Ok(Value::Bool(
            items.iter().any(|item| item.equals(needle).unwrap_or(false)),
        )),
        Value::Text(s) => Ok(Value::Bool(s.contains(args.text("substr")?))),
        other => Err(args.expected("str", "text or a slice", other)),
    }
}

fn substr(args: &Args<'_>) -> EvalResult<Value> {
    let chars: Vec<char> = args.text("str")?.chars().collect();
    let (pos, len) = (args.int("pos")?, args.int("len")?);
    if len < 0 {
        return Err(args.invalid(format!("len must not be negative, got {}", len)));
    }

    // Position may equal the length, which yields an empty string
    let start = if pos == chars.len() as i64 {
        chars.len()
    } else {
        resolve_index(pos, chars.len())?
    };
    let end = match len {
        0 => chars.len(),
        n => (start + n as usize).min(chars.len()),
    };
    Ok(Value::Text(chars[start..end].iter().collect()))
}

fn trim(args: &Args<'_>) -> EvalResult<Value> {
    let (s, set) = (args.text("str")?, args.text("char")?);
    let trimmed = if set.is_empty() {
        s.trim()
    } else {
        s.trim_matches(|c| set.contains(c))
    };
    Ok(Value::from(trimmed))
}

fn replace(args: &Args<'_>) -> EvalResult<Value> {
    let (s, src, dst) = (args.text("str")?, args.text("src")?, args.text("dst")?);
    let replaced = match args.int("count")? {
        0 => s.replace(src, dst),
        n if n > 0 => s.replacen(src, dst, n as usize),
        n => return Err(args.invalid(format!("count must not be negative, got {}", n))),
    };
    Ok(Value::Text(replaced))
}

fn dirname(args: &Args<'_>) -> EvalResult<Value> {
    let parent = Path::new(args.text("path")?)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ".".to_string());
    Ok(Value::Text(parent))
}

fn basename(args: &Args<'_>) -> EvalResult<Value> {
    let name = Path::new(args.text("path")?)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Value::Text(name))
}

fn is_file(args: &Args<'_>) -> EvalResult<Value> {
    Ok(Value::Bool(Path::new(args.text("path")?).is_file()))
}

fn is_dir(args: &Args<'_>) -> EvalResult<Value> {
    Ok(Value::Bool(Path::new(args.text("path")?).is_dir()))
}

fn read(args: &Args<'_>) -> EvalResult<Value> {
    let files = args.slice("file")?;
    let mut contents = Vec::with_capacity(files.len());
    for file in files {
        let path = file
            .as_str()
            .ok_or_else(|| args.expected("file", "text", file))?;
        let text = fs::read_to_string(path)
            .map_err(|e| args.invalid(format!("cannot read '{}': {}", path, e)))?;
        contents.push(Value::Text(text));
    }

    match contents.len() {
        0 => Err(args.missing("file")),
        1 => Ok(contents.remove(0)),
        _ => Ok(Value::Slice(contents)),
    }
}

fn b64encode(args: &Args<'_>) -> EvalResult<Value> {
    let s = args.text("str")?;
    let encoded = if args.bool("url")? {
        URL_SAFE.encode(s)
    } else {
        STANDARD.encode(s)
    };
    Ok(Value::Text(encoded))
}

fn b64decode(args: &Args<'_>) -> EvalResult<Value> {
    let s = args.text("str")?;
    let engine = if args.bool("url")? { &URL_SAFE } else { &STANDARD };
    let bytes = engine
        .decode(s)
        .map_err(|e| args.invalid(format!("invalid base64: {}", e)))?;
    String::from_utf8(bytes)
        .map(Value::Text)
        .map_err(|_| args.invalid("decoded bytes are not UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_aliases() {
        for name in ["dirname", "dir", "basename", "base", "b64encode", "seq"] {
            assert!(lookup(name).is_some(), "missing builtin {}", name);
        }
        assert!(lookup("printf").is_none());
    }

    #[test]
    fn test_defaults_are_declared_last() {
        for builtin in BUILTINS {
            let first_default = builtin.params.iter().position(|p| p.default.is_some());
            if let Some(at) = first_default {
                assert!(
                    builtin.params[at..].iter().all(|p| p.default.is_some()),
                    "{} has a required parameter after an optional one",
                    builtin.name
                );
            }
        }
    }
}
