//! Structural macros: `.include`, `.define` and `.apply`.
//!
//! Expansion rewrites the tree in place before anything is evaluated. At each
//! object level the directives run in source order, interleaved with the
//! level's literal fields, and then every child object is expanded with the
//! fragments defined so far in scope.

use std::{
    collections::HashMap,
    fmt, mem,
    path::{Path, PathBuf},
};

use crate::{
    ast::{Directive, DirectiveKind, Expr, MacroValue, Method, Node, Object, OptionNode, Position},
    environment::Environment,
    evaluator::EvalError,
    fetch::{FetchError, Fetcher, Location},
    lexer::Lexer,
    parser::{ParseError, Parser},
    value::Value,
};

/// Includes nested deeper than this are rejected; this also stops include cycles.
pub const MAX_INCLUDE_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum MacroError {
    /// Bad arguments to a directive
    Argument {
        directive: &'static str,
        message: String,
        position: Position,
    },

    /// `.apply` of a name with no visible `.define`
    UndefinedFragment { name: String, position: Position },

    /// An include could not be fetched (or nested too deep)
    IncludeResolution { location: String, reason: String },

    /// Included content that failed to parse
    Parse { location: String, source: ParseError },

    /// A directive argument failed to evaluate
    Eval(EvalError),
}

impl fmt::Display for MacroError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroError::Argument {
                directive,
                message,
                position,
            } => write!(f, "{}: .{}(): {}", position, directive, message),
            MacroError::UndefinedFragment { name, position } => {
                write!(f, "{}: fragment '{}' is not defined", position, name)
            }
            MacroError::IncludeResolution { location, reason } => {
                write!(f, "cannot include '{}': {}", location, reason)
            }
            MacroError::Parse { location, source } => write!(f, "in '{}': {}", location, source),
            MacroError::Eval(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for MacroError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MacroError::Parse { source, .. } => Some(source),
            MacroError::Eval(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EvalError> for MacroError {
    fn from(e: EvalError) -> Self {
        MacroError::Eval(e)
    }
}

pub type MacroResult<T> = Result<T, MacroError>;

/// What `.define` binds a name to.
#[derive(Debug, Clone)]
enum Fragment {
    Object(Object),
    /// Copied as an option named after the fragment
    Value(Expr),
}

/// Fragments visible at one object level, chained to the enclosing levels.
#[derive(Default)]
struct Scope<'p> {
    fragments: HashMap<String, Fragment>,
    parent: Option<&'p Scope<'p>>,
}

impl<'p> Scope<'p> {
    fn child(parent: &'p Scope<'p>) -> Self {
        Scope {
            fragments: HashMap::new(),
            parent: Some(parent),
        }
    }

    fn lookup(&self, name: &str) -> Option<&Fragment> {
        self.fragments
            .get(name)
            .or_else(|| self.parent.and_then(|p| p.lookup(name)))
    }
}

pub struct Expander<'a> {
    env: &'a Environment,
    fetcher: &'a dyn Fetcher,
    base_dir: PathBuf,
    depth: usize,
}

impl<'a> Expander<'a> {
    /// `env` is the base environment directive arguments are evaluated in;
    /// relative include paths are joined onto `base_dir`.
    pub fn new(env: &'a Environment, fetcher: &'a dyn Fetcher, base_dir: impl Into<PathBuf>) -> Self {
        Expander {
            env,
            fetcher,
            base_dir: base_dir.into(),
            depth: 0,
        }
    }

    /// Expands every directive in `root` and its descendants.
    pub fn expand(&self, root: &mut Object) -> MacroResult<()> {
        self.expand_object(root, &Scope::default())
    }

    fn expand_object(&self, object: &mut Object, parent: &Scope<'_>) -> MacroResult<()> {
        let mut scope = Scope::child(parent);
        let directives = mem::take(&mut object.directives);

        if !directives.is_empty() {
            let mut literal = mem::take(&mut object.fields).into_iter();
            let mut placed = 0;
            for directive in &directives {
                while placed < directive.offset {
                    if let Some((_, node)) = literal.next() {
                        object.merge(node, Method::Merge);
                    }
                    placed += 1;
                }
                self.run(directive, object, &mut scope)?;
            }
            for (_, node) in literal {
                object.merge(node, Method::Merge);
            }
        }

        for node in object.fields.values_mut() {
            match node {
                Node::Object(child) => self.expand_object(child, &scope)?,
                Node::List(list) => {
                    for item in &mut list.items {
                        if let Node::Object(child) = item {
                            self.expand_object(child, &scope)?;
                        }
                    }
                }
                Node::Option(_) => {}
            }
        }
        Ok(())
    }

    fn run(&self, directive: &Directive, object: &mut Object, scope: &mut Scope<'_>) -> MacroResult<()> {
        match directive.kind {
            DirectiveKind::Define => self.define(directive, scope),
            DirectiveKind::Apply => self.apply(directive, object, scope),
            DirectiveKind::Include => self.include(directive, object),
        }
    }

    fn define(&self, directive: &Directive, scope: &mut Scope<'_>) -> MacroResult<()> {
        let [name, fragment] = bind(directive, ["name", "fragment"])?;
        let name = self.name(directive, "name", required(directive, "name", name)?)?;

        let fragment = match required(directive, "fragment", fragment)? {
            MacroValue::Block(block) => {
                let mut block = block.clone();
                self.expand_object(&mut block, scope)?;
                Fragment::Object(block)
            }
            MacroValue::Expr(expr) => Fragment::Value(expr.clone()),
            MacroValue::Ident(ident) => {
                return Err(argument(
                    directive,
                    format!("fragment must be a block or an expression, got '{}'", ident),
                ));
            }
        };
        scope.fragments.insert(name, fragment);
        Ok(())
    }

    fn apply(&self, directive: &Directive, object: &mut Object, scope: &Scope<'_>) -> MacroResult<()> {
        let [name, fields, depth, method] = bind(directive, ["name", "fields", "depth", "method"])?;
        let name = self.name(directive, "name", required(directive, "name", name)?)?;
        let method = self.method(directive, method)?;

        let fragment = scope.lookup(&name).ok_or_else(|| MacroError::UndefinedFragment {
            name: name.clone(),
            position: directive.position,
        })?;

        let mut block = match fragment {
            Fragment::Object(block) => block.clone(),
            Fragment::Value(expr) => {
                let option = OptionNode {
                    name: name.clone(),
                    value: expr.clone(),
                    comment: Default::default(),
                    position: directive.position,
                };
                object.merge(Node::Option(option), method);
                return Ok(());
            }
        };

        if let Some(fields) = fields {
            let keep = self.text_list(directive, "fields", fields)?;
            block.fields.retain(|key, _| keep.iter().any(|k| k == key));
        }
        if let Some(depth) = depth {
            match self.eval(directive, "depth", depth)? {
                Value::Int(0) => {}
                Value::Int(n) if n > 0 => truncate(&mut block, n as usize),
                other => {
                    return Err(argument(
                        directive,
                        format!("depth must be a non-negative int, got {}", other),
                    ));
                }
            }
        }

        for (_, node) in block.fields {
            object.merge(node, method);
        }
        Ok(())
    }

    fn include(&self, directive: &Directive, object: &mut Object) -> MacroResult<()> {
        let [location, name, fatal, method] =
            bind(directive, ["location", "name", "fatal", "method"])?;
        let location = match self.eval(directive, "location", required(directive, "location", location)?)? {
            Value::Text(s) => s,
            other => return Err(argument(directive, format!("location must be text, got {}", other.type_name()))),
        };
        let name = match name {
            Some(name) => self.name(directive, "name", name)?,
            None => Path::new(&location)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let fatal = match fatal {
            Some(fatal) => match self.eval(directive, "fatal", fatal)? {
                Value::Bool(b) => b,
                other => return Err(argument(directive, format!("fatal must be bool, got {}", other.type_name()))),
            },
            None => false,
        };
        let method = self.method(directive, method)?;

        if self.depth >= MAX_INCLUDE_DEPTH {
            return Err(MacroError::IncludeResolution {
                location,
                reason: format!("includes nested deeper than {} levels", MAX_INCLUDE_DEPTH),
            });
        }

        let (bytes, origin) = match self.fetch(&location) {
            Ok(fetched) => fetched,
            Err(e) if fatal => {
                return Err(MacroError::IncludeResolution {
                    location,
                    reason: e.to_string(),
                });
            }
            Err(_) => return Ok(()),
        };

        let text = String::from_utf8(bytes).map_err(|_| MacroError::IncludeResolution {
            location: location.clone(),
            reason: "content is not valid UTF-8".to_string(),
        })?;
        let mut included = Parser::new(Lexer::new(&text))
            .and_then(|mut p| p.parse_document())
            .map_err(|source| MacroError::Parse {
                location: location.clone(),
                source,
            })?;

        let nested = Expander {
            env: self.env,
            fetcher: self.fetcher,
            base_dir: origin,
            depth: self.depth + 1,
        };
        nested.expand(&mut included)?;

        if name.is_empty() {
            for (_, node) in included.fields {
                object.merge(node, method);
            }
        } else {
            included.name = name;
            object.merge(Node::Object(included), method);
        }
        Ok(())
    }

    /// Fetches a location; also returns the directory its own includes resolve against.
    fn fetch(&self, location: &str) -> Result<(Vec<u8>, PathBuf), FetchError> {
        match Location::parse(location) {
            Location::File(path) => {
                let path = if path.is_relative() {
                    self.base_dir.join(path)
                } else {
                    path
                };
                let bytes = self.fetcher.read_file(&path)?;
                let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
                Ok((bytes, dir))
            }
            Location::Http(url) => {
                let response = self.fetcher.get(&url)?;
                if response.status >= 400 {
                    return Err(FetchError::Status(response.status));
                }
                Ok((response.body, self.base_dir.clone()))
            }
            Location::Other(scheme) => Err(FetchError::Unsupported(format!("scheme '{}'", scheme))),
        }
    }

    fn eval(&self, directive: &Directive, param: &str, value: &MacroValue) -> MacroResult<Value> {
        match value {
            MacroValue::Expr(expr) => Ok(expr.eval(&mut self.env.clone())?),
            _ => Err(argument(directive, format!("{} must be an expression", param))),
        }
    }

    /// A fragment or object name: a bare identifier or a text expression.
    fn name(&self, directive: &Directive, param: &str, value: &MacroValue) -> MacroResult<String> {
        match value {
            MacroValue::Ident(ident) => Ok(ident.clone()),
            MacroValue::Expr(_) => match self.eval(directive, param, value)? {
                Value::Text(s) => Ok(s),
                other => Err(argument(directive, format!("{} must be text, got {}", param, other.type_name()))),
            },
            MacroValue::Block(_) => Err(argument(directive, format!("{} cannot be a block", param))),
        }
    }

    fn method(&self, directive: &Directive, value: Option<&MacroValue>) -> MacroResult<Method> {
        let Some(value) = value else {
            return Ok(Method::default());
        };
        let name = self.name(directive, "method", value)?;
        Method::from_name(&name)
            .ok_or_else(|| argument(directive, format!("unknown method '{}'", name)))
    }

    fn text_list(&self, directive: &Directive, param: &str, value: &MacroValue) -> MacroResult<Vec<String>> {
        let invalid = || argument(directive, format!("{} must be a slice of text", param));
        match self.eval(directive, param, value)? {
            Value::Slice(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::Text(s) => Ok(s),
                    _ => Err(invalid()),
                })
                .collect(),
            _ => Err(invalid()),
        }
    }
}

fn argument(directive: &Directive, message: String) -> MacroError {
    MacroError::Argument {
        directive: directive.kind.name(),
        message,
        position: directive.position,
    }
}

fn required<'d>(directive: &Directive, param: &str, value: Option<&'d MacroValue>) -> MacroResult<&'d MacroValue> {
    value.ok_or_else(|| argument(directive, format!("missing argument '{}'", param)))
}

/// Matches a directive's arguments to `params`, positionally or by keyword.
fn bind<'d, const N: usize>(directive: &'d Directive, params: [&str; N]) -> MacroResult<[Option<&'d MacroValue>; N]> {
    let mut bound: [Option<&'d MacroValue>; N] = [None; N];
    let mut position = 0;

    for arg in &directive.args {
        let slot = match &arg.name {
            None => {
                if position >= N {
                    return Err(argument(
                        directive,
                        format!("expected at most {} arguments", N),
                    ));
                }
                position += 1;
                position - 1
            }
            Some(name) => params
                .iter()
                .position(|p| p == name)
                .ok_or_else(|| argument(directive, format!("unknown parameter '{}'", name)))?,
        };
        if bound[slot].is_some() {
            return Err(argument(
                directive,
                format!("parameter '{}' is given twice", params[slot]),
            ));
        }
        bound[slot] = Some(&arg.value);
    }
    Ok(bound)
}

/// Keeps `depth` levels of objects; depth 1 keeps only the object's own options.
fn truncate(object: &mut Object, depth: usize) {
    if depth <= 1 {
        object.fields.retain(|_, node| match node {
            Node::Option(_) => true,
            Node::Object(_) => false,
            Node::List(list) => list.is_options(),
        });
        return;
    }
    for node in object.fields.values_mut() {
        match node {
            Node::Object(child) => truncate(child, depth - 1),
            Node::List(list) => {
                for item in &mut list.items {
                    if let Node::Object(child) = item {
                        truncate(child, depth - 1);
                    }
                }
            }
            Node::Option(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;

    fn expand(input: &str, fetcher: &MemoryFetcher) -> MacroResult<Object> {
        let mut root = Parser::new(Lexer::new(input)).unwrap().parse_document().unwrap();
        let env = Environment::new();
        Expander::new(&env, fetcher, "").expand(&mut root)?;
        Ok(root)
    }

    #[test]
    fn test_apply_copies_fragment_fields() {
        let root = expand(
            ".define(base, { a = 1\n b = 2 })\nsvc {\n .apply(base)\n b = 3\n}\n",
            &MemoryFetcher::new(),
        )
        .unwrap();
        let svc = root.get("svc").and_then(Node::as_object).unwrap();
        assert_eq!(svc.fields.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(root.directives.is_empty());
    }

    #[test]
    fn test_bind_rejects_duplicates() {
        let err = expand(".apply(base, name=base)\n", &MemoryFetcher::new()).unwrap_err();
        assert!(matches!(err, MacroError::Argument { directive: "apply", .. }));
    }

    #[test]
    fn test_include_cycle_is_caught() {
        let fetcher = MemoryFetcher::new().with_file("loop.fig", ".include(\"loop.fig\", fatal=true)\n");
        let err = expand(".include(\"loop.fig\")\n", &fetcher).unwrap_err();
        assert!(matches!(err, MacroError::IncludeResolution { .. }));
    }
}
