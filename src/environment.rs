//! Lexical environments.
//!
//! An [`Environment`] is an owned stack of frames. Frame 0 is the base frame
//! holding the document's environment variables (`@name`). Each object level
//! and each builtin call pushes a frame above it and pops it on the way out.

use indexmap::IndexMap;

use crate::evaluator::{EvalError, EvalResult};
use crate::value::Value;

/// A single scope level: identifier → value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    bindings: IndexMap<String, Value>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }
}

impl FromIterator<(String, Value)> for Frame {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Frame {
            bindings: iter.into_iter().collect(),
        }
    }
}

/// A stack of frames, innermost last.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    frames: Vec<Frame>,
}

impl Environment {
    /// Create an environment with an empty base frame.
    pub fn new() -> Self {
        Self::with_base(Frame::new())
    }

    pub fn with_base(base: Frame) -> Self {
        Environment { frames: vec![base] }
    }

    /// Enter a new scope.
    pub fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Leave the innermost scope. The base frame is never popped.
    pub fn pop(&mut self) -> Option<Frame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Define a variable in the innermost frame.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.define(name, value);
        }
    }

    /// Look a name up from the innermost frame out, base frame included.
    pub fn resolve(&self, name: &str) -> EvalResult<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.get(name))
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    /// Look a `$name` up in the object and call frames, skipping the base frame.
    pub fn resolve_local(&self, name: &str) -> EvalResult<&Value> {
        self.frames[1..]
            .iter()
            .rev()
            .find_map(|f| f.get(name))
            .ok_or_else(|| EvalError::UndefinedVariable(format!("${}", name)))
    }

    /// Look an `@name` up in the base frame only.
    pub fn resolve_env(&self, name: &str) -> EvalResult<&Value> {
        self.base()
            .get(name)
            .ok_or_else(|| EvalError::UndefinedVariable(format!("@{}", name)))
    }

    pub fn base(&self) -> &Frame {
        &self.frames[0]
    }

    pub fn current(&self) -> &Frame {
        self.frames.last().unwrap_or(&self.frames[0])
    }

    /// Number of frames, base frame included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
