//! JSON projection of documents and serde decoding.
//!
//! This module turns an expanded [`Document`] into a `serde_json::Value` and,
//! through that, into any type implementing `serde::Deserialize`.
//!
//! # Features
//!
//! - **Order preserving** - objects keep declaration order
//! - **Lists** - repeated declarations become JSON arrays
//! - **Moments** - dates and times are written as ISO-8601 strings
//! - **Non-finite doubles** - `inf` and `nan` are written as `null`
//!
//! # Examples
//!
//! ```
//! use fig_lang::Document;
//! use fig_lang::output::render;
//!
//! let doc = Document::parse("port = 80\nhosts = \"a\"\nhosts = \"b\"\n").unwrap();
//! let json = doc.to_json().unwrap();
//!
//! assert_eq!(render(&json, false), r#"{"port":80,"hosts":["a","b"]}"#);
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Map;

use crate::{
    ast::{Node, Object},
    document::{Document, QueryError, QueryResult, is_value_node},
    evaluator::EvalError,
    resolver::Resolver,
    value::Value,
};

/// Convert a runtime value to JSON
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::Number((*n).into()),
        Value::Double(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Moment(m) => serde_json::Value::String(m.to_string()),
        Value::Slice(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
    }
}

/// Compact or two-space indented JSON text.
pub fn render(json: &serde_json::Value, pretty: bool) -> String {
    if pretty {
        format!("{:#}", json)
    } else {
        json.to_string()
    }
}

pub(crate) fn project(doc: &Document) -> QueryResult<serde_json::Value> {
    // One resolver for the whole walk: each option is evaluated once.
    let mut resolver = doc.resolver([doc.root()]);
    let mut path = Vec::new();
    project_object(&mut resolver, doc.root(), &mut path)
}

fn project_object<'d>(
    resolver: &mut Resolver<'d>,
    object: &'d Object,
    path: &mut Vec<String>,
) -> QueryResult<serde_json::Value> {
    let mut map = Map::new();
    for (name, node) in &object.fields {
        path.push(name.clone());
        let json = if is_value_node(node) {
            match resolver.field(name) {
                Ok(value) => Ok(to_json(&value)),
                Err(source) => Err(eval_error(path, source)),
            }
        } else {
            project_node(resolver, node, path)
        };
        path.pop();
        map.insert(name.clone(), json?);
    }
    Ok(serde_json::Value::Object(map))
}

fn project_node<'d>(
    resolver: &mut Resolver<'d>,
    node: &'d Node,
    path: &mut Vec<String>,
) -> QueryResult<serde_json::Value> {
    match node {
        Node::Object(object) => {
            resolver.enter(object);
            let json = project_object(resolver, object, path);
            resolver.leave();
            json
        }
        Node::List(list) => {
            let mut items = Vec::with_capacity(list.items.len());
            for (i, item) in list.items.iter().enumerate() {
                path.push(i.to_string());
                let json = project_node(resolver, item, path);
                path.pop();
                items.push(json?);
            }
            Ok(serde_json::Value::Array(items))
        }
        Node::Option(_) => match resolver.evaluate(node) {
            Ok(value) => Ok(to_json(&value)),
            Err(source) => Err(eval_error(path, source)),
        },
    }
}

fn eval_error(path: &[String], source: EvalError) -> QueryError {
    QueryError::Eval {
        path: path.join("."),
        source,
    }
}

#[derive(Debug)]
pub enum DecodeError {
    /// An option failed to evaluate
    Query(QueryError),
    /// The document's shape does not fit the target type
    TypeMismatch(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Query(e) => write!(f, "{}", e),
            DecodeError::TypeMismatch(msg) => write!(f, "Type mismatch: {}", msg),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Query(e) => Some(e),
            DecodeError::TypeMismatch(_) => None,
        }
    }
}

impl From<QueryError> for DecodeError {
    fn from(e: QueryError) -> Self {
        DecodeError::Query(e)
    }
}

pub(crate) fn decode<T: DeserializeOwned>(doc: &Document) -> Result<T, DecodeError> {
    let json = project(doc)?;
    serde_json::from_value(json).map_err(|e| DecodeError::TypeMismatch(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Moment;

    #[test]
    fn test_value_to_json() {
        assert_eq!(to_json(&Value::Double(f64::INFINITY)), serde_json::Value::Null);
        assert_eq!(
            to_json(&Value::Moment(Moment::parse("2024-03-01").unwrap())),
            serde_json::json!("2024-03-01")
        );
        assert_eq!(
            to_json(&Value::Slice(vec![Value::Int(1), Value::Null])),
            serde_json::json!([1, null])
        );
    }

    #[test]
    fn test_pretty_render() {
        let json = serde_json::json!({"a": 1});
        assert_eq!(render(&json, true), "{\n  \"a\": 1\n}");
    }
}
