// tests/macro_tests.rs

use fig_lang::ast::Node;
use fig_lang::fetch::MemoryFetcher;
use fig_lang::{Document, Error, MacroError, Value};
use pretty_assertions::assert_eq;

fn files(entries: &[(&str, &str)]) -> MemoryFetcher {
    let mut fetcher = MemoryFetcher::new();
    for (path, content) in entries {
        fetcher.add_file(path, *content);
    }
    fetcher
}

fn build(input: &str, fetcher: MemoryFetcher) -> Result<Document, Error> {
    Document::builder().fetcher(fetcher).parse(input)
}

fn doc(input: &str) -> Document {
    build(input, MemoryFetcher::new()).unwrap_or_else(|e| panic!("build failed: {}", e))
}

fn doc_with(input: &str, fetcher: MemoryFetcher) -> Document {
    build(input, fetcher).unwrap_or_else(|e| panic!("build failed: {}", e))
}

fn macro_err(input: &str, fetcher: MemoryFetcher) -> MacroError {
    match build(input, fetcher) {
        Err(Error::Macro(e)) => e,
        other => panic!("expected macro error, got {:?}", other),
    }
}

fn keys(doc: &Document, path: &[&str]) -> Vec<String> {
    let object = if path.is_empty() {
        doc.root()
    } else {
        doc.node(path).ok().and_then(Node::as_object).expect("object")
    };
    object.fields.keys().cloned().collect()
}

const DB: &str = "host = \"localhost\"\nport = 5432\n";

// ============================================================================
// .include
// ============================================================================

#[test]
fn test_include_nests_under_file_stem() {
    let doc = doc_with(".include(\"db.fig\")\n", files(&[("db.fig", DB)]));
    assert_eq!(doc.text(&["db", "host"]).unwrap(), "localhost");
    assert_eq!(doc.int(&["db", "port"]).unwrap(), 5432);
}

#[test]
fn test_include_with_explicit_name() {
    let doc = doc_with(
        ".include(\"db.fig\", name=\"database\")\n",
        files(&[("db.fig", DB)]),
    );
    assert_eq!(keys(&doc, &[]), vec!["database"]);
}

#[test]
fn test_include_with_empty_name_splices_fields() {
    let doc = doc_with(".include(\"db.fig\", name=\"\")\n", files(&[("db.fig", DB)]));
    assert_eq!(keys(&doc, &[]), vec!["host", "port"]);
}

#[test]
fn test_fields_after_include_override_it() {
    let after = doc_with(
        ".include(\"db.fig\", name=\"\")\nport = 9090\n",
        files(&[("db.fig", DB)]),
    );
    assert_eq!(after.int(&["port"]).unwrap(), 9090);

    let before = doc_with(
        "port = 9090\n.include(\"db.fig\", name=\"\")\n",
        files(&[("db.fig", DB)]),
    );
    assert_eq!(before.int(&["port"]).unwrap(), 5432);
}

#[test]
fn test_include_append_keeps_both() {
    let doc = doc_with(
        "port = 1\n.include(\"db.fig\", name=\"\", method=\"append\")\n",
        files(&[("db.fig", DB)]),
    );
    assert_eq!(
        doc.value(&["port"]).unwrap(),
        Value::Slice(vec![Value::Int(1), Value::Int(5432)])
    );
}

#[test]
fn test_missing_include_is_skipped_unless_fatal() {
    let doc = doc("a = 1\n.include(\"missing.fig\")\n");
    assert_eq!(keys(&doc, &[]), vec!["a"]);

    let err = macro_err(
        ".include(\"missing.fig\", fatal=true)\n",
        MemoryFetcher::new(),
    );
    match err {
        MacroError::IncludeResolution { location, .. } => assert_eq!(location, "missing.fig"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_parse_errors_in_includes_always_fail() {
    let err = macro_err(".include(\"bad.fig\")\n", files(&[("bad.fig", "x = = 1\n")]));
    match err {
        MacroError::Parse { location, .. } => assert_eq!(location, "bad.fig"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_nested_includes_resolve_next_to_includer() {
    let fetcher = files(&[
        ("conf/app.fig", ".include(\"db.fig\")\nname = \"app\"\n"),
        ("conf/db.fig", "port = 1\n"),
    ]);
    let doc = doc_with(".include(\"conf/app.fig\", name=\"\")\n", fetcher);
    assert_eq!(doc.text(&["name"]).unwrap(), "app");
    assert_eq!(doc.int(&["db", "port"]).unwrap(), 1);
}

#[test]
fn test_base_dir() {
    let doc = Document::builder()
        .fetcher(files(&[("etc/fig/db.fig", DB)]))
        .base_dir("etc/fig")
        .parse(".include(\"db.fig\")\n")
        .unwrap();
    assert_eq!(doc.int(&["db", "port"]).unwrap(), 5432);
}

#[test]
fn test_include_location_is_an_expression() {
    let doc = Document::builder()
        .fetcher(files(&[("db.fig", DB)]))
        .var("CONF", "db.fig")
        .parse(".include(@CONF)\n.include(join([\"d\", \"b.fig\"], \"\"), name=\"copy\")\n")
        .unwrap();
    assert_eq!(doc.int(&["db", "port"]).unwrap(), 5432);
    assert_eq!(doc.int(&["copy", "port"]).unwrap(), 5432);
}

#[test]
fn test_http_includes() {
    let mut fetcher = MemoryFetcher::new();
    fetcher.add_url("https://cfg.example/db.fig", 200, "port = 7\n");
    fetcher.add_url("https://cfg.example/gone.fig", 404, "not found");

    let doc = doc_with(
        ".include(\"https://cfg.example/db.fig\")\n.include(\"https://cfg.example/gone.fig\")\n",
        fetcher.clone(),
    );
    assert_eq!(doc.int(&["db", "port"]).unwrap(), 7);
    assert_eq!(keys(&doc, &[]), vec!["db"]);

    let err = macro_err(
        ".include(\"https://cfg.example/gone.fig\", fatal=true)\n",
        fetcher,
    );
    match err {
        MacroError::IncludeResolution { reason, .. } => assert!(reason.contains("404")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_unsupported_scheme() {
    assert!(doc(".include(\"ftp://host/x.fig\")\n").root().is_empty());
    assert!(matches!(
        macro_err(".include(\"ftp://host/x.fig\", fatal=true)\n", MemoryFetcher::new()),
        MacroError::IncludeResolution { .. }
    ));
}

#[test]
fn test_include_cycle() {
    let fetcher = files(&[
        ("a.fig", ".include(\"b.fig\")\n"),
        ("b.fig", ".include(\"a.fig\")\n"),
    ]);
    let err = macro_err(".include(\"a.fig\")\n", fetcher);
    assert!(matches!(err, MacroError::IncludeResolution { .. }));
}

#[test]
fn test_include_argument_errors() {
    let fetcher = || files(&[("db.fig", DB)]);
    let test_cases = vec![
        ".include(\"db.fig\", method=\"overwrite\")\n",
        ".include(42)\n",
        ".include(\"db.fig\", fatal=\"yes\")\n",
        ".include()\n",
        ".include(\"db.fig\", bogus=1)\n",
    ];

    for input in test_cases {
        assert!(
            matches!(macro_err(input, fetcher()), MacroError::Argument { directive: "include", .. }),
            "Failed for input: {}",
            input
        );
    }
}

// ============================================================================
// .define / .apply
// ============================================================================

const BASE: &str = ".define(base, {\n  timeout = 30s\n  retries = 3\n  tls {\n    enabled = true\n  }\n})\n";

#[test]
fn test_apply_copies_fragment() {
    let doc = doc(&format!("{}svc {{\n  .apply(base)\n}}\n", BASE));
    assert_eq!(keys(&doc, &["svc"]), vec!["timeout", "retries", "tls"]);
    assert_eq!(doc.int(&["svc", "timeout"]).unwrap(), 30);
    assert!(doc.bool(&["svc", "tls", "enabled"]).unwrap());
}

#[test]
fn test_apply_field_filter() {
    let doc = doc(&format!("{}svc {{\n  .apply(base, [\"retries\", \"tls\"])\n}}\n", BASE));
    assert_eq!(keys(&doc, &["svc"]), vec!["retries", "tls"]);
}

#[test]
fn test_apply_depth() {
    let doc = doc(&format!("{}svc {{\n  .apply(base, depth=1)\n}}\n", BASE));
    assert_eq!(keys(&doc, &["svc"]), vec!["timeout", "retries"]);
}

#[test]
fn test_apply_interleaves_with_fields() {
    let doc = doc(".define(f, { x = 1 })\na = 1\n.apply(f)\nb = 2\n");
    assert_eq!(keys(&doc, &[]), vec!["a", "x", "b"]);
}

#[test]
fn test_apply_inside_object_merged_with_applied_one() {
    let doc = doc(
        ".define(base, {\n  svc {\n    host = \"a\"\n    port = 1\n  }\n})\n.define(extra, { x = 9 })\n.apply(base)\nsvc {\n  x = 1\n  .apply(extra)\n}\n",
    );
    assert_eq!(keys(&doc, &["svc"]), vec!["host", "port", "x"]);
    assert_eq!(doc.int(&["svc", "x"]).unwrap(), 9);
    assert_eq!(doc.int(&["svc", "port"]).unwrap(), 1);
}

#[test]
fn test_literal_fields_override_applied_ones() {
    let doc = doc(".define(defaults, { level = \"info\"\n color = true })\n.apply(defaults)\nlevel = \"debug\"\n");
    assert_eq!(doc.text(&["level"]).unwrap(), "debug");
    assert!(doc.bool(&["color"]).unwrap());
}

#[test]
fn test_apply_methods() {
    let input = |method: &str| {
        format!(
            "db {{\n  host = \"a\"\n  port = 1\n}}\n.define(f, {{ db {{ port = 2 }} }})\n.apply(f, method=\"{}\")\n",
            method
        )
    };

    let merged = doc(&input("merge"));
    assert_eq!(keys(&merged, &["db"]), vec!["host", "port"]);
    assert_eq!(merged.int(&["db", "port"]).unwrap(), 2);

    let replaced = doc(&input("replace"));
    assert_eq!(keys(&replaced, &["db"]), vec!["port"]);

    let appended = doc(&input("append"));
    assert!(matches!(appended.node(&["db"]).unwrap(), Node::List(list) if list.items.len() == 2));
    assert_eq!(appended.int(&["db", "1", "port"]).unwrap(), 2);
}

#[test]
fn test_value_fragment() {
    let doc = doc(".define(port, 8000 + 80)\nsvc {\n  .apply(port)\n}\n");
    assert_eq!(doc.int(&["svc", "port"]).unwrap(), 8080);
}

#[test]
fn test_value_fragment_evaluates_where_applied() {
    let doc = doc(
        ".define(url, join([\"http://\", $host], \"\"))\na {\n  host = \"x\"\n  .apply(url)\n}\nb {\n  host = \"y\"\n  .apply(url)\n}\n",
    );
    assert_eq!(doc.text(&["a", "url"]).unwrap(), "http://x");
    assert_eq!(doc.text(&["b", "url"]).unwrap(), "http://y");
}

#[test]
fn test_fragments_are_lexically_scoped() {
    let nested = doc(".define(f, { x = 1 })\na {\n  b {\n    .apply(f)\n  }\n}\n");
    assert_eq!(nested.int(&["a", "b", "x"]).unwrap(), 1);

    let sibling = macro_err(
        "a {\n  .define(f, { x = 1 })\n}\nb {\n  .apply(f)\n}\n",
        MemoryFetcher::new(),
    );
    match sibling {
        MacroError::UndefinedFragment { name, .. } => assert_eq!(name, "f"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_apply_before_define_fails() {
    assert!(matches!(
        macro_err(".apply(f)\n.define(f, { x = 1 })\n", MemoryFetcher::new()),
        MacroError::UndefinedFragment { .. }
    ));
}

#[test]
fn test_fragment_may_apply_earlier_fragment() {
    let doc = doc(".define(a, { x = 1 })\n.define(b, {\n  .apply(a)\n  y = 2\n})\n.apply(b)\n");
    assert_eq!(keys(&doc, &[]), vec!["x", "y"]);
}

#[test]
fn test_define_apply_argument_errors() {
    let test_cases = vec![
        (".define(f)\n", "define"),
        (".define(f, g)\n", "define"),
        (".define(f, { x = 1 })\n.apply(f, depth=-1)\n", "apply"),
        (".define(f, { x = 1 })\n.apply(f, fields=\"x\")\n", "apply"),
        (".define(f, { x = 1 })\n.apply(f, method=\"mix\")\n", "apply"),
        (".apply(f, bogus=1)\n", "apply"),
    ];

    for (input, expected) in test_cases {
        match macro_err(input, MemoryFetcher::new()) {
            MacroError::Argument { directive, .. } => {
                assert_eq!(directive, expected, "Failed for input: {}", input)
            }
            other => panic!("unexpected {:?} for input: {}", other, input),
        }
    }
}

#[test]
fn test_fragments_in_included_files_stay_there() {
    let fetcher = files(&[("lib.fig", ".define(f, { x = 1 })\nlib = true\n")]);
    let err = macro_err(".include(\"lib.fig\", name=\"\")\n.apply(f)\n", fetcher);
    assert!(matches!(err, MacroError::UndefinedFragment { .. }));
}
