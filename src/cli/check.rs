//! Load a document and run one command against it

use std::path::PathBuf;

use super::CliError;
use crate::{DocumentBuilder, Value};

/// What to do with the loaded document
#[derive(Debug, Clone, Default)]
pub enum Action {
    /// Only parse and expand
    #[default]
    Validate,
    /// Evaluate one option; segments may also be dot-separated
    Get(Vec<String>),
    /// Evaluate everything into JSON
    Dump,
}

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Document source text
    pub input: String,
    /// Directory relative includes resolve against
    pub base_dir: Option<PathBuf>,
    /// Base variables as `NAME=VALUE`
    pub defines: Vec<String>,
    /// Import the process environment for `@` variables
    pub import_env: bool,
    pub action: Action,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// The document parsed and expanded
    Valid,
    /// Value of a single option
    Value(Value),
    /// JSON projection of the whole document
    Json(serde_json::Value),
}

/// Split a `-D NAME=VALUE` flag
pub fn parse_define(define: &str) -> Result<(&str, &str), CliError> {
    match define.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => Err(CliError::InvalidDefine(define.to_string())),
    }
}

/// Execute a fig check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let mut builder = DocumentBuilder::new();
    // -D wins over the imported environment
    if options.import_env {
        builder = builder.process_env();
    }
    for define in &options.defines {
        let (name, value) = parse_define(define)?;
        builder = builder.var(name, value);
    }
    if let Some(dir) = &options.base_dir {
        builder = builder.base_dir(dir);
    }

    let doc = builder.parse(&options.input)?;

    match &options.action {
        Action::Validate => Ok(CheckResult::Valid),
        Action::Get(path) => {
            let segments: Vec<&str> = path.iter().flat_map(|p| p.split('.')).collect();
            Ok(CheckResult::Value(doc.value(&segments)?))
        }
        Action::Dump => Ok(CheckResult::Json(doc.to_json()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_with_defines() {
        let options = CheckOptions {
            input: "db { url = join([\"postgres://\", @HOST], \"\") }\n".to_string(),
            defines: vec!["HOST=db.local".to_string()],
            action: Action::Get(vec!["db.url".to_string()]),
            ..Default::default()
        };
        match execute_check(&options).unwrap() {
            CheckResult::Value(v) => assert_eq!(v, Value::from("postgres://db.local")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_define() {
        assert!(matches!(parse_define("novalue"), Err(CliError::InvalidDefine(_))));
        assert_eq!(parse_define("A=b=c").unwrap(), ("A", "b=c"));
    }
}
