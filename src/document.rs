//! Parsed, expanded documents and path queries over them.
//!
//! A [`Document`] keeps the expanded tree and the base frame it was built
//! with. Every query evaluates what it needs along the queried path with a
//! fresh resolver, so queries never observe each other and never mutate the
//! document.
//!
//! # Examples
//!
//! ```
//! use fig_lang::Document;
//!
//! let doc = Document::parse(r#"
//! name = "api"
//! server {
//!     port = 8000 + 80
//!     url  = join(["http://localhost", $port], ":")
//! }
//! "#).unwrap();
//!
//! assert_eq!(doc.int(&["server", "port"]).unwrap(), 8080);
//! assert_eq!(doc.text(&["name"]).unwrap(), "api");
//! assert!(doc.int(&["server", "missing"]).is_err());
//! ```

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;

use crate::{
    ast::{Expr, Node, Object},
    environment::{Environment, Frame},
    error::Error,
    evaluator::EvalError,
    fetch::{Fetcher, FsFetcher},
    lexer::Lexer,
    macros::Expander,
    output::{self, DecodeError},
    parser::Parser,
    resolver::Resolver,
    value::{Moment, Value},
};

/// Errors from path queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    EmptyPath,
    ObjectNotFound(String),
    OptionNotFound(String),
    NotAnObject(String),
    NotAnOption(String),
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
    Eval {
        path: String,
        source: EvalError,
    },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::EmptyPath => write!(f, "empty path"),
            QueryError::ObjectNotFound(path) => write!(f, "object not found: {}", path),
            QueryError::OptionNotFound(path) => write!(f, "option not found: {}", path),
            QueryError::NotAnObject(path) => write!(f, "not an object: {}", path),
            QueryError::NotAnOption(path) => write!(f, "not an option: {}", path),
            QueryError::TypeMismatch {
                path,
                expected,
                found,
            } => write!(f, "{}: expected {}, found {}", path, expected, found),
            QueryError::Eval { path, source } => write!(f, "{}: {}", path, source),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::Eval { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Configures how a document is built: base variables, fetcher, include root.
pub struct DocumentBuilder {
    vars: Frame,
    fetcher: Box<dyn Fetcher>,
    base_dir: Option<PathBuf>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        DocumentBuilder {
            vars: Frame::new(),
            fetcher: Box::new(FsFetcher),
            base_dir: None,
        }
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a base variable, visible as `@name`.
    pub fn var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.define(name, value.into());
        self
    }

    /// Copy the process environment into the base frame as text.
    pub fn process_env(mut self) -> Self {
        for (name, value) in std::env::vars() {
            self.vars.define(name, Value::Text(value));
        }
        self
    }

    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    /// Directory that relative includes resolve against.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Parse and expand `input`.
    pub fn parse(self, input: &str) -> Result<Document, Error> {
        let mut root = Parser::new(Lexer::new(input))?.parse_document()?;

        let env = Environment::with_base(self.vars.clone());
        let base_dir = self.base_dir.unwrap_or_default();
        Expander::new(&env, self.fetcher.as_ref(), base_dir).expand(&mut root)?;

        Ok(Document {
            root,
            base: self.vars,
            ancestors: Vec::new(),
        })
    }

    /// Read, parse and expand a file. Includes resolve next to it unless a
    /// base directory was set.
    pub fn from_file(mut self, path: impl AsRef<Path>) -> Result<Document, Error> {
        let path = path.as_ref();
        let input = fs::read_to_string(path)?;
        if self.base_dir.is_none() {
            self.base_dir = path.parent().map(Path::to_path_buf);
        }
        self.parse(&input)
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    root: Object,
    base: Frame,
    /// Options of the objects enclosing a sub-document's root, outermost first
    ancestors: Vec<Object>,
}

impl Document {
    pub fn parse(input: &str) -> Result<Document, Error> {
        DocumentBuilder::new().parse(input)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Document, Error> {
        DocumentBuilder::new().from_file(path)
    }

    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    pub fn root(&self) -> &Object {
        &self.root
    }

    pub fn int(&self, path: &[&str]) -> QueryResult<i64> {
        match self.value(path)? {
            Value::Int(n) => Ok(n),
            other => Err(mismatch(path, "int", &other)),
        }
    }

    /// Like [`Document::int`] but ints are promoted.
    pub fn float(&self, path: &[&str]) -> QueryResult<f64> {
        match self.value(path)? {
            Value::Double(n) => Ok(n),
            Value::Int(n) => Ok(n as f64),
            other => Err(mismatch(path, "double", &other)),
        }
    }

    pub fn bool(&self, path: &[&str]) -> QueryResult<bool> {
        match self.value(path)? {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(path, "bool", &other)),
        }
    }

    pub fn text(&self, path: &[&str]) -> QueryResult<String> {
        match self.value(path)? {
            Value::Text(s) => Ok(s),
            other => Err(mismatch(path, "text", &other)),
        }
    }

    pub fn time(&self, path: &[&str]) -> QueryResult<Moment> {
        match self.value(path)? {
            Value::Moment(m) => Ok(m),
            other => Err(mismatch(path, "moment", &other)),
        }
    }

    /// Evaluate the option at `path`. A list of options gives a slice.
    pub fn value(&self, path: &[&str]) -> QueryResult<Value> {
        let (chain, node) = self.locate(path)?;
        if !is_value_node(node) {
            return Err(QueryError::NotAnOption(path.join(".")));
        }
        self.resolver(chain).evaluate(node).map_err(|source| QueryError::Eval {
            path: path.join("."),
            source,
        })
    }

    /// The unevaluated expression of a single option.
    pub fn expr(&self, path: &[&str]) -> QueryResult<&Expr> {
        match self.locate(path)?.1 {
            Node::Option(option) => Ok(&option.value),
            _ => Err(QueryError::NotAnOption(path.join("."))),
        }
    }

    pub fn node(&self, path: &[&str]) -> QueryResult<&Node> {
        Ok(self.locate(path)?.1)
    }

    /// The object at `path` as a document of its own. Options of enclosing
    /// objects stay visible to it.
    pub fn document(&self, path: &[&str]) -> QueryResult<Document> {
        let (chain, node) = self.locate(path)?;
        let Node::Object(object) = node else {
            return Err(QueryError::NotAnObject(path.join(".")));
        };

        let mut ancestors = self.ancestors.clone();
        ancestors.extend(chain.into_iter().map(bindings_only));
        Ok(Document {
            root: object.clone(),
            base: self.base.clone(),
            ancestors,
        })
    }

    /// Evaluate every option into JSON, keeping declaration order.
    pub fn to_json(&self) -> QueryResult<serde_json::Value> {
        output::project(self)
    }

    /// Decode the document into any deserializable type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        output::decode(self)
    }

    /// Walks `path` from the root. Returns the objects passed through
    /// (root first) and the node at the end.
    fn locate(&self, path: &[&str]) -> QueryResult<(Vec<&Object>, &Node)> {
        let last = path.len().checked_sub(1).ok_or(QueryError::EmptyPath)?;
        let joined = |end: usize| path[..=end].join(".");
        let missing = |at: usize| {
            if at == last {
                QueryError::OptionNotFound(joined(at))
            } else {
                QueryError::ObjectNotFound(joined(at))
            }
        };

        let mut chain = vec![&self.root];
        let mut i = 0;
        loop {
            let current = chain[chain.len() - 1];
            let mut node = current.get(path[i]).ok_or_else(|| missing(i))?;

            // A segment after a list picks one of its items
            if let Node::List(list) = node
                && i < last
            {
                i += 1;
                node = list.select(path[i]).ok_or_else(|| missing(i))?;
            }

            if i == last {
                return Ok((chain, node));
            }
            match node {
                Node::Object(object) => chain.push(object),
                _ => return Err(QueryError::NotAnObject(joined(i))),
            }
            i += 1;
        }
    }

    /// A resolver over the ancestors of this document followed by `chain`.
    pub(crate) fn resolver<'d>(&'d self, chain: impl IntoIterator<Item = &'d Object>) -> Resolver<'d> {
        Resolver::new(&self.base, self.ancestors.iter().chain(chain))
    }
}

fn mismatch(path: &[&str], expected: &'static str, found: &Value) -> QueryError {
    QueryError::TypeMismatch {
        path: path.join("."),
        expected,
        found: found.type_name(),
    }
}

/// Options and lists of options evaluate to values; objects do not.
pub(crate) fn is_value_node(node: &Node) -> bool {
    match node {
        Node::Option(_) => true,
        Node::List(list) => list.is_options(),
        Node::Object(_) => false,
    }
}

/// A copy of `object` keeping only the fields that bind variables.
fn bindings_only(object: &Object) -> Object {
    Object {
        name: object.name.clone(),
        fields: object
            .fields
            .iter()
            .filter(|(_, node)| is_value_node(node))
            .map(|(name, node)| (name.clone(), node.clone()))
            .collect(),
        ..Default::default()
    }
}
