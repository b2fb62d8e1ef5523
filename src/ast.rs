//! # Fig Configuration Language - Abstract Syntax Tree
//!
//! This module defines the syntax tree produced by the [parser](crate::parser)
//! and rewritten by the [macro expander](crate::macros).
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens and source positions produced by the lexer
//! - **[expressions]** - Evaluable expression nodes (literals, variables, operations, calls)
//! - **[operators]** - Binary and prefix operators with their binding powers
//! - **[nodes]** - Document structure: objects, options, lists, comments, directives
//! - **[units]** - Numeric unit suffixes (`10MB`, `30s`)
//!
//! ## Quick Start
//!
//! ```text
//! # service definition
//! name = "api"
//! port = 8080
//!
//! server primary {
//!     host = "10.0.0.1"
//!     timeout = 30s
//!     url = join(["http://", $host, ":", @PORT], "")
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Objects, Options and Lists
//!
//! - **Option** `name = expr` - a single named binding
//! - **Object** `name { ... }` or `kind name { ... }` - a nested block
//! - **List** - what repeated declarations of one name turn into
//!
//! Declaring the same name twice in one object never overwrites: both
//! declarations are kept, in order, as a list.
//!
//! ### Directives
//!
//! - `.include("file.fig")` - splice in another document
//! - `.define(name, { ... })` - record a fragment for later use
//! - `.apply(name)` - copy a recorded fragment into the current object
//!
//! ### Variables
//!
//! - `$name` - an option of the current or an enclosing object
//! - `@name` - a variable of the document environment
pub mod expressions;
pub mod nodes;
pub mod operators;
pub mod tokens;
pub mod units;

pub use expressions::{Arg, Expr, VarScope};
pub use nodes::{
    Comment, Directive, DirectiveKind, List, MacroArg, MacroValue, Method, Node, Object,
    OptionNode,
};
pub use operators::{BinOp, UnaryOp};
pub use tokens::{Position, Token, TokenKind};
pub use units::Unit;
