use std::mem;

use indexmap::IndexMap;

use crate::ast::{Expr, Position};

/// Comments attached to the node they decorate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Comment {
    /// Comment lines directly above the node
    pub leading: Vec<String>,
    /// Comment on the same line, after the node
    pub trailing: Option<String>,
}

impl Comment {
    pub fn is_empty(&self) -> bool {
        self.leading.is_empty() && self.trailing.is_none()
    }
}

/// A single named binding (`port = 8080`).
#[derive(Debug, Clone, PartialEq)]
pub struct OptionNode {
    pub name: String,
    pub value: Expr,
    pub comment: Comment,
    pub position: Position,
}

/// An ordered keyed collection of options, objects and lists.
///
/// The root of a document is an object with an empty name. A typed block
/// such as `resource binary { ... }` is stored under its kind (`resource`)
/// and carries its name (`binary`) as the label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    pub name: String,
    pub label: Option<String>,
    pub fields: IndexMap<String, Node>,
    /// Macro directives still to be expanded. Empty after expansion.
    pub directives: Vec<Directive>,
    pub comment: Comment,
    /// Comments at the end of the block that decorate no field
    pub footer: Vec<String>,
    pub position: Position,
}

/// Siblings that share a name.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub name: String,
    pub items: Vec<Node>,
}

/// A field of an object.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Option(OptionNode),
    Object(Object),
    List(List),
}

/// How an incoming node is combined with an existing field of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// Overlay recursively; objects merge field by field, anything else is
    /// replaced in place
    #[default]
    Merge,
    /// Always add as another sibling, forming a list
    Append,
    /// Replace the existing field entirely
    Replace,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Method> {
        match name {
            "merge" => Some(Method::Merge),
            "append" => Some(Method::Append),
            "replace" => Some(Method::Replace),
            _ => None,
        }
    }
}

/// Known macro directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Include,
    Define,
    Apply,
}

impl DirectiveKind {
    pub fn from_name(name: &str) -> Option<DirectiveKind> {
        match name {
            "include" => Some(DirectiveKind::Include),
            "define" => Some(DirectiveKind::Define),
            "apply" => Some(DirectiveKind::Apply),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DirectiveKind::Include => "include",
            DirectiveKind::Define => "define",
            DirectiveKind::Apply => "apply",
        }
    }
}

/// The value of a macro argument.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroValue {
    Expr(Expr),
    /// Bare identifier, used for fragment names (`.apply(base)`)
    Ident(String),
    /// Block fragment (`.define(base, { ... })`)
    Block(Object),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroArg {
    pub name: Option<String>,
    pub value: MacroValue,
}

/// A structural macro such as `.include("db.fig", fatal=true)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub args: Vec<MacroArg>,
    pub position: Position,
    /// Number of distinct fields declared before this directive
    pub offset: usize,
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Option(opt) => &opt.name,
            Node::Object(obj) => &obj.name,
            Node::List(list) => &list.name,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self {
            Node::Option(opt) => opt.name = name,
            Node::Object(obj) => obj.name = name,
            Node::List(list) => {
                for item in &mut list.items {
                    item.set_name(name.clone());
                }
                list.name = name;
            }
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Node::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_option(&self) -> Option<&OptionNode> {
        match self {
            Node::Option(opt) => Some(opt),
            _ => None,
        }
    }
}

impl List {
    pub fn new(name: impl Into<String>) -> Self {
        List {
            name: name.into(),
            items: Vec::new(),
        }
    }

    /// Adds a node, flattening nested lists.
    pub fn push(&mut self, node: Node) {
        match node {
            Node::List(list) => self.items.extend(list.items),
            node => self.items.push(node),
        }
    }

    /// Whether every item is an option.
    pub fn is_options(&self) -> bool {
        self.items.iter().all(|n| matches!(n, Node::Option(_)))
    }

    /// Finds an item by object label, falling back to a decimal index.
    pub fn select(&self, key: &str) -> Option<&Node> {
        let by_label = self.items.iter().find(|n| match n {
            Node::Object(obj) => obj.label.as_deref() == Some(key),
            _ => false,
        });
        by_label.or_else(|| key.parse::<usize>().ok().and_then(|i| self.items.get(i)))
    }
}

impl Object {
    pub fn new(name: impl Into<String>) -> Self {
        Object {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Adds a field. A name that is already present turns into a list, so
    /// repeated declarations are never lost.
    pub fn insert(&mut self, node: Node) {
        let name = node.name().to_string();
        match self.fields.get_mut(&name) {
            Some(Node::List(list)) => list.push(node),
            Some(existing) => {
                let previous = mem::replace(existing, Node::List(List::new(name)));
                if let Node::List(list) = existing {
                    list.push(previous);
                    list.push(node);
                }
            }
            None => {
                self.fields.insert(name, node);
            }
        }
    }

    /// Combines an incoming node with this object's fields.
    pub fn merge(&mut self, node: Node, method: Method) {
        match method {
            Method::Append => self.insert(node),
            Method::Replace => {
                self.fields.insert(node.name().to_string(), node);
            }
            Method::Merge => {
                let name = node.name().to_string();
                if let Some(slot) = self.fields.get_mut(&name) {
                    match (slot, node) {
                        (Node::Object(existing), Node::Object(incoming)) => {
                            existing.overlay(incoming)
                        }
                        (slot, node) => *slot = node,
                    }
                } else {
                    self.fields.insert(name, node);
                }
            }
        }
    }

    /// Merges every field of `other` into this object with [`Method::Merge`].
    pub fn overlay(&mut self, other: Object) {
        if other.label.is_some() {
            self.label = other.label;
        }
        // A directive of `other` runs after every field already here and
        // after the new fields that preceded it in `other`.
        let existing = self.fields.len();
        let mut added = Vec::with_capacity(other.fields.len() + 1);
        let mut count = 0;
        for (name, node) in other.fields {
            added.push(count);
            if !self.fields.contains_key(&name) {
                count += 1;
            }
            self.merge(node, Method::Merge);
        }
        added.push(count);
        for mut directive in other.directives {
            let before = added.get(directive.offset).copied().unwrap_or(count);
            directive.offset = existing + before;
            self.directives.push(directive);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;

    fn opt(name: &str) -> Node {
        Node::Option(OptionNode {
            name: name.to_string(),
            value: Expr::Array(vec![]),
            comment: Comment::default(),
            position: Position::default(),
        })
    }

    #[test]
    fn test_insert_coalesces_into_list() {
        let mut obj = Object::new("root");
        obj.insert(opt("x"));
        obj.insert(opt("x"));
        obj.insert(opt("x"));
        match obj.get("x") {
            Some(Node::List(list)) => assert_eq!(list.items.len(), 3),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_overlays_objects() {
        let mut left = Object::new("db");
        left.insert(opt("host"));
        let mut right = Object::new("db");
        right.insert(opt("port"));

        let mut root = Object::new("");
        root.insert(Node::Object(left));
        root.merge(Node::Object(right), Method::Merge);

        let db = root.get("db").and_then(Node::as_object).unwrap();
        assert_eq!(db.fields.keys().collect::<Vec<_>>(), vec!["host", "port"]);
    }

    #[test]
    fn test_overlay_moves_directives_past_existing_fields() {
        let mut base = Object::new("svc");
        base.insert(opt("host"));
        base.insert(opt("port"));

        let mut incoming = Object::new("svc");
        incoming.insert(opt("port"));
        incoming.insert(opt("x"));
        incoming.directives.push(Directive {
            kind: DirectiveKind::Apply,
            args: vec![],
            position: Position::default(),
            offset: 2,
        });

        base.overlay(incoming);
        assert_eq!(base.fields.keys().collect::<Vec<_>>(), vec!["host", "port", "x"]);
        assert_eq!(base.directives[0].offset, 3);
    }

    #[test]
    fn test_replace_and_append() {
        let mut root = Object::new("");
        root.insert(opt("a"));
        root.merge(opt("a"), Method::Replace);
        assert!(matches!(root.get("a"), Some(Node::Option(_))));
        root.merge(opt("a"), Method::Append);
        assert!(matches!(root.get("a"), Some(Node::List(_))));
    }
}
