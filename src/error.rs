use std::{fmt, io};

use crate::{document::QueryError, macros::MacroError, parser::ParseError};

/// Any error from building or querying a document.
#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    Macro(MacroError),
    Query(QueryError),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "Parse error: {}", e),
            Error::Macro(e) => write!(f, "Macro error: {}", e),
            Error::Query(e) => write!(f, "Query error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(e) => Some(e),
            Error::Macro(e) => Some(e),
            Error::Query(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<MacroError> for Error {
    fn from(e: MacroError) -> Self {
        Error::Macro(e)
    }
}

impl From<QueryError> for Error {
    fn from(e: QueryError) -> Self {
        Error::Query(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
