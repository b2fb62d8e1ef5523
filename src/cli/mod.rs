//! CLI support for fig-lang
//!
//! Provides programmatic access to the `fig` commands for embedding in other
//! tools.

mod check;

pub use check::{Action, CheckOptions, CheckResult, execute_check, parse_define};

use std::io;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Building the document failed
    Document(crate::Error),
    /// Querying the document failed
    Query(crate::QueryError),
    /// A `-D` flag without `=`
    InvalidDefine(String),
    /// IO error
    Io(io::Error),
    /// No input provided
    NoInput,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Document(e) => write!(f, "{}", e),
            CliError::Query(e) => write!(f, "Query error: {}", e),
            CliError::InvalidDefine(s) => {
                write!(f, "Invalid define '{}': expected NAME=VALUE", s)
            }
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => write!(f, "No input provided. Pass a file or pipe a document to stdin."),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Document(e) => Some(e),
            CliError::Query(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<crate::Error> for CliError {
    fn from(e: crate::Error) -> Self {
        CliError::Document(e)
    }
}

impl From<crate::QueryError> for CliError {
    fn from(e: crate::QueryError) -> Self {
        CliError::Query(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
