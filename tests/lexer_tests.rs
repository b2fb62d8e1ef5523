// tests/lexer_tests.rs

use fig_lang::ast::{Position, Token, TokenKind};
use fig_lang::lexer::Lexer;
use pretty_assertions::assert_eq;

fn tokens(input: &str) -> Vec<Token> {
    Lexer::new(input).collect()
}

fn kinds(input: &str) -> Vec<TokenKind> {
    tokens(input).into_iter().map(|t| t.kind).collect()
}

fn first(input: &str) -> Token {
    Lexer::new(input).next_token()
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        ("+", TokenKind::Plus),
        ("-", TokenKind::Minus),
        ("*", TokenKind::Star),
        ("/", TokenKind::Slash),
        ("%", TokenKind::Percent),
        ("~", TokenKind::Tilde),
        ("^", TokenKind::Caret),
        ("&", TokenKind::Ampersand),
        ("|", TokenKind::Pipe),
        ("!", TokenKind::Not),
        ("=", TokenKind::Assign),
        ("<", TokenKind::Lt),
        (">", TokenKind::Gt),
        ("(", TokenKind::LParen),
        (")", TokenKind::RParen),
        ("[", TokenKind::LBracket),
        ("]", TokenKind::RBracket),
        ("{", TokenKind::LBrace),
        ("}", TokenKind::RBrace),
        (",", TokenKind::Comma),
        (":", TokenKind::Colon),
        ("?", TokenKind::Question),
    ];

    for (input, expected) in test_cases {
        assert_eq!(kinds(input), vec![expected, TokenKind::Eof], "Failed for input: {}", input);
    }
}

#[test]
fn test_two_char_tokens() {
    let test_cases = vec![
        ("**", TokenKind::Pow),
        ("&&", TokenKind::And),
        ("||", TokenKind::Or),
        ("==", TokenKind::EqEq),
        ("!=", TokenKind::NotEq),
        ("<=", TokenKind::LtEq),
        (">=", TokenKind::GtEq),
        ("<<", TokenKind::Shl),
        (">>", TokenKind::Shr),
    ];

    for (input, expected) in test_cases {
        let token = first(input);
        assert_eq!(token.kind, expected, "Failed for input: {}", input);
        assert_eq!(token.text, input);
    }
}

#[test]
fn test_shift_is_not_heredoc() {
    use TokenKind::*;
    assert_eq!(kinds("1 << 2"), vec![Integer, Shl, Integer, Eof]);
    assert_eq!(kinds("1<<x"), vec![Integer, Shl, Identifier, Eof]);
}

// ============================================================================
// Numbers
// ============================================================================

#[test]
fn test_integer_literals() {
    let test_cases = vec!["42", "1_011", "0xdead_beef", "0XFF", "0b1010", "0o123", "0"];

    for input in test_cases {
        let token = first(input);
        assert_eq!(token.kind, TokenKind::Integer, "Failed for input: {}", input);
        assert_eq!(token.text, input);
    }
}

#[test]
fn test_float_literals() {
    for input in ["3.14", "1e3", "2.5E-3", "6.02e+23", "1_000.5", "inf", "nan"] {
        assert_eq!(first(input).kind, TokenKind::Float, "Failed for input: {}", input);
    }
}

#[test]
fn test_unit_suffixes() {
    let test_cases = vec![
        ("10MB", TokenKind::Integer),
        ("4KB", TokenKind::Integer),
        ("30s", TokenKind::Integer),
        ("5m", TokenKind::Integer),
        ("1.5h", TokenKind::Float),
        ("2w", TokenKind::Integer),
    ];

    for (input, expected) in test_cases {
        let token = first(input);
        assert_eq!(token.kind, expected, "Failed for input: {}", input);
        assert_eq!(token.text, input);
    }
}

#[test]
fn test_negative_literals_follow_context() {
    use TokenKind::*;
    assert_eq!(kinds("x = -100"), vec![Identifier, Assign, Integer, Eof]);
    assert_eq!(tokens("x = -100")[2].text, "-100");
    assert_eq!(kinds("[1, -2]"), vec![LBracket, Integer, Comma, Integer, RBracket, Eof]);
    assert_eq!(kinds("5-3"), vec![Integer, Minus, Integer, Eof]);
    assert_eq!(kinds("$a - 3"), vec![LocalVar, Minus, Integer, Eof]);
    assert_eq!(kinds("f(x) -1"), vec![Identifier, LParen, Identifier, RParen, Minus, Integer, Eof]);
}

#[test]
fn test_invalid_numbers() {
    for input in ["0123", "1__0", "1_", "0b102", "0x", "10XB", "3.0foo"] {
        assert_eq!(first(input).kind, TokenKind::Invalid, "Failed for input: {}", input);
    }
}

// ============================================================================
// Dates and times
// ============================================================================

#[test]
fn test_calendar_literals() {
    let test_cases = vec![
        ("2024-03-01", TokenKind::Date),
        ("2024-03-01T10:30:00Z", TokenKind::DateTime),
        ("2024-03-01 10:30", TokenKind::DateTime),
        ("2024-03-01T10:30:00.250+02:00", TokenKind::DateTime),
        ("10:30", TokenKind::Time),
        ("10:30:15.5-05:00", TokenKind::Time),
    ];

    for (input, expected) in test_cases {
        let token = first(input);
        assert_eq!(token.kind, expected, "Failed for input: {}", input);
        assert_eq!(token.text, input);
    }
}

#[test]
fn test_non_ascii_digits_are_not_calendar_literals() {
    use TokenKind::*;
    let test_cases = vec!["2024-01-1\u{663}", "1\u{663}:30", "2024-0\u{663}-01"];

    for input in test_cases {
        let kinds = kinds(input);
        assert!(!kinds.contains(&Date), "Failed for input: {}", input);
        assert!(!kinds.contains(&DateTime), "Failed for input: {}", input);
        assert!(!kinds.contains(&Time), "Failed for input: {}", input);
        assert!(kinds.contains(&Invalid), "Failed for input: {}", input);
        assert_eq!(kinds.last(), Some(&Eof));
    }
}

#[test]
fn test_ternary_needs_spaces_around_colon() {
    use TokenKind::*;
    assert_eq!(
        kinds("$a ? 10 : 20"),
        vec![LocalVar, Question, Integer, Colon, Integer, Eof]
    );
    assert_eq!(kinds("$a ? 10:20"), vec![LocalVar, Question, Time, Eof]);
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_double_quoted_escapes() {
    let token = first(r#""a\tb\n\"c\" \\""#);
    assert_eq!(token.kind, TokenKind::String);
    assert_eq!(token.text, "a\tb\n\"c\" \\");
}

#[test]
fn test_single_quoted_is_raw() {
    let token = first(r"'C:\temp\new'");
    assert_eq!(token.kind, TokenKind::String);
    assert_eq!(token.text, r"C:\temp\new");
}

#[test]
fn test_bad_strings() {
    assert_eq!(first("\"open").kind, TokenKind::Invalid);
    assert_eq!(first(r#""\q""#).kind, TokenKind::Invalid);
}

#[test]
fn test_heredoc() {
    let input = "motd = <<EOT\nWelcome\n  to fig\nEOT\nx = 1";
    let tokens = tokens(input);
    assert_eq!(tokens[2].kind, TokenKind::Heredoc);
    assert_eq!(tokens[2].text, "Welcome\n  to fig");
    assert_eq!(tokens[3].kind, TokenKind::Eol);
    assert_eq!(tokens[4].text, "x");
}

#[test]
fn test_unterminated_heredoc() {
    assert_eq!(tokens("x = <<EOT\nbody\n")[2].kind, TokenKind::Invalid);
}

// ============================================================================
// Words, variables and macros
// ============================================================================

#[test]
fn test_boolean_keywords() {
    let test_cases = vec![
        ("true", "true"),
        ("yes", "true"),
        ("on", "true"),
        ("false", "false"),
        ("no", "false"),
        ("off", "false"),
    ];

    for (input, expected) in test_cases {
        let token = first(input);
        assert_eq!(token.kind, TokenKind::Boolean);
        assert_eq!(token.text, expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_sigils() {
    let tokens = tokens("$port @HOME .include");
    assert_eq!((tokens[0].kind, tokens[0].text.as_str()), (TokenKind::LocalVar, "port"));
    assert_eq!((tokens[1].kind, tokens[1].text.as_str()), (TokenKind::EnvVar, "HOME"));
    assert_eq!((tokens[2].kind, tokens[2].text.as_str()), (TokenKind::Macro, "include"));
}

#[test]
fn test_bare_sigil_is_invalid() {
    assert_eq!(first("$ x").kind, TokenKind::Invalid);
    assert_eq!(first(".5").kind, TokenKind::Invalid);
}

// ============================================================================
// Comments and layout
// ============================================================================

#[test]
fn test_comments() {
    let tokens = tokens("# note\nx = 1 /* inline */");
    assert_eq!((tokens[0].kind, tokens[0].text.as_str()), (TokenKind::Comment, "note"));
    assert_eq!(tokens[1].kind, TokenKind::Eol);
    assert_eq!((tokens[5].kind, tokens[5].text.as_str()), (TokenKind::Comment, "inline"));
}

#[test]
fn test_block_comments_do_not_nest() {
    use TokenKind::*;
    let tokens = tokens("/* a /* b */ */");
    assert_eq!(tokens[0].text, "a /* b");
    assert_eq!(
        tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
        vec![Comment, Star, Slash, Eof]
    );
}

#[test]
fn test_unterminated_block_comment() {
    assert_eq!(first("/* open").kind, TokenKind::Invalid);
}

#[test]
fn test_positions_track_lines() {
    let tokens = tokens("a = 1\r\n  b = 2");
    assert_eq!(tokens[0].position, Position::new(1, 1));
    assert_eq!(tokens[3].kind, TokenKind::Eol);
    assert_eq!(tokens[4].position, Position::new(2, 3));
}

#[test]
fn test_eof_repeats() {
    let mut lexer = Lexer::new("");
    assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    assert_eq!(lexer.next_token().kind, TokenKind::Eof);
}
