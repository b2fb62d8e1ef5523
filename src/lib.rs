pub mod ast;
pub mod builtins;
pub mod cli;
pub mod document;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod fetch;
pub mod lexer;
pub mod macros;
pub mod ops;
pub mod output;
pub mod parser;
mod resolver;
pub mod value;

pub use ast::{BinOp, Expr, Node, Object, Position, Token};
pub use document::{Document, DocumentBuilder, QueryError};
pub use environment::{Environment, Frame};
pub use error::Error;
pub use evaluator::{EvalError, Evaluator};
pub use fetch::{FetchError, Fetcher, FsFetcher, MemoryFetcher};
pub use lexer::Lexer;
pub use macros::{Expander, MacroError};
pub use output::DecodeError;
pub use parser::{ParseError, Parser};
pub use value::{Moment, Value};
