//! Evaluation of options in their lexical context.
//!
//! A [`Resolver`] holds one level per object on the path being evaluated,
//! outermost first. Options are evaluated the first time they are needed and
//! remembered for the lifetime of the resolver, so one query or one JSON
//! projection evaluates each option at most once.
//!
//! A `$name` read by an option refers to the option `name` of the same object
//! when there is one other than the reader itself, and otherwise to the
//! nearest enclosing object that declares it. Those options are evaluated
//! before the reader, so declaration order never changes a result. A failed
//! dependency fails its readers with the same error.

use indexmap::IndexMap;

use crate::{
    ast::{Node, Object},
    document::is_value_node,
    environment::{Environment, Frame},
    evaluator::{EvalError, EvalResult},
    value::Value,
};

/// One object and what has been evaluated in it so far.
struct Level<'d> {
    object: &'d Object,
    values: Frame,
    failed: IndexMap<&'d str, EvalError>,
}

impl<'d> Level<'d> {
    fn new(object: &'d Object) -> Self {
        Level {
            object,
            values: Frame::new(),
            failed: IndexMap::new(),
        }
    }

    fn declares(&self, name: &str) -> bool {
        self.object.get(name).is_some_and(is_value_node)
    }
}

pub(crate) struct Resolver<'d> {
    base: &'d Frame,
    levels: Vec<Level<'d>>,
    /// Options being evaluated, as (level, name)
    active: Vec<(usize, &'d str)>,
}

impl<'d> Resolver<'d> {
    /// `levels` runs from the outermost object inwards.
    pub(crate) fn new(base: &'d Frame, levels: impl IntoIterator<Item = &'d Object>) -> Self {
        Resolver {
            base,
            levels: levels.into_iter().map(Level::new).collect(),
            active: Vec::new(),
        }
    }

    /// Descends into a child of the innermost object.
    pub(crate) fn enter(&mut self, object: &'d Object) {
        self.levels.push(Level::new(object));
    }

    pub(crate) fn leave(&mut self) {
        if self.levels.len() > 1 {
            self.levels.pop();
        }
    }

    fn innermost(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Value of the option (or list of options) `name` of the innermost object.
    pub(crate) fn field(&mut self, name: &str) -> EvalResult<Value> {
        self.resolve(self.innermost(), name)
    }

    /// Evaluates `node`, a field of the innermost object or an item of one of
    /// its lists. The result is not remembered.
    pub(crate) fn evaluate(&mut self, node: &'d Node) -> EvalResult<Value> {
        let level = self.innermost();
        self.active.push((level, node.name()));
        let result = self.evaluate_at(level, node);
        self.active.pop();
        result
    }

    fn resolve(&mut self, level: usize, name: &str) -> EvalResult<Value> {
        let Some(slot) = self.levels.get(level) else {
            return Err(EvalError::UndefinedVariable(format!("${}", name)));
        };
        if let Some(value) = slot.values.get(name) {
            return Ok(value.clone());
        }
        if let Some(err) = slot.failed.get(name) {
            return Err(err.clone());
        }
        if self.active.iter().any(|&(l, n)| l == level && n == name) {
            return Err(EvalError::CyclicReference(format!("${}", name)));
        }
        let object = slot.object;
        let node = match object.get(name) {
            Some(node) if is_value_node(node) => node,
            _ => return Err(EvalError::UndefinedVariable(format!("${}", name))),
        };

        self.active.push((level, node.name()));
        let result = self.evaluate_at(level, node);
        self.active.pop();

        let slot = &mut self.levels[level];
        match &result {
            Ok(value) => slot.values.define(node.name(), value.clone()),
            Err(err) => {
                slot.failed.insert(node.name(), err.clone());
            }
        }
        result
    }

    fn evaluate_at(&mut self, level: usize, node: &'d Node) -> EvalResult<Value> {
        let own = node.name();
        for name in node_refs(node) {
            if let Some(owner) = self.owner(level, own, name) {
                self.resolve(owner, name)?;
            }
        }

        let mut env = Environment::with_base(self.base.clone());
        for (i, slot) in self.levels.iter().take(level + 1).enumerate() {
            let mut frame = slot.values.clone();
            if i == level {
                frame.remove(own);
            }
            env.push_frame(frame);
        }
        evaluate_node(node, &mut env)
    }

    /// The level whose option a `$name` read at `level` refers to. An option
    /// never refers to itself, so `own` is skipped at its own level.
    fn owner(&self, level: usize, own: &str, name: &str) -> Option<usize> {
        (0..=level).rev().find(|&i| {
            (i != level || name != own) && self.levels.get(i).is_some_and(|slot| slot.declares(name))
        })
    }
}

fn node_refs(node: &Node) -> Vec<&str> {
    match node {
        Node::Option(option) => option.value.local_refs(),
        Node::List(list) => {
            let mut names = Vec::new();
            for name in list.items.iter().flat_map(node_refs) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            names
        }
        Node::Object(_) => Vec::new(),
    }
}

fn evaluate_node(node: &Node, env: &mut Environment) -> EvalResult<Value> {
    match node {
        Node::Option(option) => option.value.eval(env),
        Node::List(list) => list
            .items
            .iter()
            .map(|item| evaluate_node(item, env))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Slice),
        Node::Object(_) => Err(EvalError::Unsupported {
            op: "evaluate",
            ty: "object",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn root(input: &str) -> Object {
        Parser::new(Lexer::new(input)).unwrap().parse_document().unwrap()
    }

    #[test]
    fn test_each_option_is_evaluated_once() {
        let doc = root("n = randn(1000000)\na = $n\nb = $n\n");
        let base = Frame::new();
        let mut resolver = Resolver::new(&base, [&doc]);
        let a = resolver.field("a").unwrap();
        assert_eq!(resolver.field("b").unwrap(), a);
        assert_eq!(resolver.field("n").unwrap(), a);
    }

    #[test]
    fn test_levels_resolve_inner_first() {
        let doc = root("x = 1\nsvc {\n  y = $x\n  x = 10\n}\n");
        let Some(Node::Object(svc)) = doc.get("svc") else {
            panic!("svc is not an object");
        };
        let base = Frame::new();
        let mut resolver = Resolver::new(&base, [&doc]);
        resolver.enter(svc);
        assert_eq!(resolver.field("y").unwrap(), Value::Int(10));
        resolver.leave();
        assert_eq!(resolver.field("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_cycles_are_reported() {
        let doc = root("a = $b\nb = $a\nc = $b + 1\n");
        let base = Frame::new();
        let mut resolver = Resolver::new(&base, [&doc]);
        assert_eq!(
            resolver.field("c"),
            Err(EvalError::CyclicReference("$b".to_string()))
        );
    }
}
