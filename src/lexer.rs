use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{Position, Token, TokenKind, Unit};

static DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}[T ][0-9]{2}:[0-9]{2}(?::[0-9]{2}(?:\.[0-9]+)?)?(?:Z|[+-][0-9]{2}:[0-9]{2})?")
        .expect("datetime pattern")
});
static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("date pattern"));
static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{2}:[0-9]{2}(?::[0-9]{2}(?:\.[0-9]+)?)?(?:Z|[+-][0-9]{2}:[0-9]{2})?").expect("time pattern")
});

/// Longest calendar literal the patterns above can match.
const MOMENT_WINDOW: usize = 48;

/// Turns source text into tokens.
///
/// The whole input is buffered up front with line endings normalized to
/// `\n`. Malformed input never aborts scanning; it produces an
/// [`TokenKind::Invalid`] token whose text describes the problem.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    /// Kind of the last significant (non-comment) token
    last: Option<TokenKind>,
    finished: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
        Lexer {
            input: normalized.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            last: None,
            finished: false,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn skip_blanks(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch != '\n' && ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn is_ident_start(ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_'
    }

    fn is_ident_char(ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_'
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if Self::is_ident_char(ch) {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_line_comment(&mut self) -> String {
        self.advance(); // Consume '#'
        let mut text = String::new();
        while let Some(ch) = self.current_char() {
            if ch == '\n' {
                break;
            }
            text.push(ch);
            self.advance();
        }
        text.trim().to_string()
    }

    /// Block comments end at the first `*/`; they do not nest.
    fn read_block_comment(&mut self) -> Result<String, String> {
        self.advance_by(2); // Consume '/*'
        let mut text = String::new();
        loop {
            match self.current_char() {
                None => return Err("unterminated block comment".to_string()),
                Some('*') if self.peek_char(1) == Some('/') => {
                    self.advance_by(2);
                    return Ok(text.trim().to_string());
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, String> {
        let mut result = String::new();
        self.advance(); // Consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' if quote == '"' => {
                    self.advance(); // Consume backslash
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('r') => result.push('\r'),
                        Some('t') => result.push('\t'),
                        Some('"') => result.push('"'),
                        Some('\\') => result.push('\\'),
                        Some(ch) => return Err(format!("invalid escape sequence \\{}", ch)),
                        None => break,
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err("unterminated string".to_string())
    }

    /// Reads `<<LABEL` followed by the body lines and a closing `LABEL` line.
    fn read_heredoc(&mut self) -> Result<String, String> {
        self.advance_by(2); // Consume '<<'
        let mut label = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_' {
                label.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        self.skip_blanks();
        match self.current_char() {
            Some('\n') => self.advance(),
            None => return Err(format!("heredoc {} has no body", label)),
            Some(ch) => return Err(format!("unexpected '{}' after heredoc label {}", ch, label)),
        }

        let mut lines = Vec::new();
        loop {
            if self.current_char().is_none() {
                return Err(format!("unterminated heredoc, expected closing {}", label));
            }
            let mut line = String::new();
            while let Some(ch) = self.current_char() {
                if ch == '\n' {
                    break;
                }
                line.push(ch);
                self.advance();
            }
            if line.trim() == label {
                break;
            }
            lines.push(line);
            // Consume the newline
            self.advance();
        }

        if lines.is_empty() {
            return Err(format!("heredoc {} has an empty body", label));
        }
        Ok(lines.join("\n"))
    }

    fn window(&self) -> String {
        self.input[self.position..]
            .iter()
            .take(MOMENT_WINDOW)
            .collect()
    }

    /// Recognizes a date, datetime or time literal at the current position.
    fn read_moment(&mut self) -> Option<(TokenKind, String)> {
        let window = self.window();
        let (kind, len) = [
            (TokenKind::DateTime, &*DATETIME),
            (TokenKind::Date, &*DATE),
            (TokenKind::Time, &*TIME),
        ]
        .into_iter()
        .find_map(|(kind, re)| re.find(&window).map(|m| (kind, m.end())))?;

        let text = window.get(..len)?.to_string();
        self.advance_by(text.chars().count());
        Some((kind, text))
    }

    /// Reads the digits of a number, validating `_` separators.
    fn read_digits(&mut self, radix: u32, out: &mut String) -> Result<(), String> {
        let start = out.len();
        while let Some(ch) = self.current_char() {
            if ch.is_digit(radix) || ch == '_' {
                out.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        let digits = &out[start..];
        if digits.is_empty() {
            return Err("missing digits".to_string());
        }
        if digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
            return Err(format!("misplaced digit separator in '{}'", digits));
        }
        Ok(())
    }

    fn read_number(&mut self, negative: bool) -> Result<(TokenKind, String), String> {
        let mut number = String::new();
        if negative {
            number.push('-');
            self.advance();
        } else if let Some(moment) = self.read_moment() {
            return Ok(moment);
        }

        // Prefixed integers
        let prefix = match (self.current_char(), self.peek_char(1)) {
            (Some('0'), Some(p @ ('x' | 'X'))) => Some((16, p)),
            (Some('0'), Some(p @ ('o' | 'O'))) => Some((8, p)),
            (Some('0'), Some(p @ ('b' | 'B'))) => Some((2, p)),
            _ => None,
        };
        if let Some((radix, marker)) = prefix {
            number.push('0');
            number.push(marker);
            self.advance_by(2);
            self.read_digits(radix, &mut number)?;
            if self.current_char().is_some_and(Self::is_ident_char) {
                return Err(format!("invalid digit in '{}'", number));
            }
            return Ok((TokenKind::Integer, number));
        }

        let int_start = number.len();
        self.read_digits(10, &mut number)?;
        let int_part = &number[int_start..];
        if int_part.len() > 1 && int_part.starts_with('0') {
            return Err(format!("leading zero in '{}'", number));
        }

        let mut kind = TokenKind::Integer;
        if self.current_char() == Some('.') && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
        {
            kind = TokenKind::Float;
            number.push('.');
            self.advance();
            self.read_digits(10, &mut number)?;
        }
        if matches!(self.current_char(), Some('e' | 'E')) {
            let signed = matches!(self.peek_char(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_char(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                kind = TokenKind::Float;
                number.push('e');
                self.advance();
                if signed {
                    number.push(self.current_char().unwrap_or('+'));
                    self.advance();
                }
                self.read_digits(10, &mut number)?;
            }
        }

        // Unit suffix
        if self.current_char().is_some_and(Self::is_ident_start) {
            let suffix = self.read_identifier();
            if Unit::lookup(&suffix).is_none() {
                return Err(format!("unknown unit '{}' after {}", suffix, number));
            }
            number.push_str(&suffix);
        }

        Ok((kind, number))
    }

    fn single(&mut self, kind: TokenKind, text: &str, start: Position) -> Token {
        self.advance_by(text.chars().count());
        Token::new(kind, text, start)
    }

    /// Picks a two-character operator if the next character matches, else the
    /// single-character one.
    fn pair(
        &mut self,
        second: char,
        double: (TokenKind, &str),
        single: (TokenKind, &str),
        start: Position,
    ) -> Token {
        if self.peek_char(1) == Some(second) {
            self.single(double.0, double.1, start)
        } else {
            self.single(single.0, single.1, start)
        }
    }

    fn scan(&mut self) -> Token {
        self.skip_blanks();
        let start = self.here();
        let invalid = |message: String| Token::new(TokenKind::Invalid, message, start);

        let Some(ch) = self.current_char() else {
            return Token::new(TokenKind::Eof, "", start);
        };

        match ch {
            '\n' => self.single(TokenKind::Eol, "\n", start),
            '#' => Token::new(TokenKind::Comment, self.read_line_comment(), start),
            '/' if self.peek_char(1) == Some('*') => match self.read_block_comment() {
                Ok(text) => Token::new(TokenKind::Comment, text, start),
                Err(e) => invalid(e),
            },
            '"' | '\'' => match self.read_string(ch) {
                Ok(s) => Token::new(TokenKind::String, s, start),
                Err(e) => invalid(e),
            },
            '<' if self.peek_char(1) == Some('<')
                && self.peek_char(2).is_some_and(|c| c.is_ascii_uppercase()) =>
            {
                match self.read_heredoc() {
                    Ok(body) => Token::new(TokenKind::Heredoc, body, start),
                    Err(e) => invalid(e),
                }
            }
            '.' | '$' | '@' => {
                let kind = match ch {
                    '.' => TokenKind::Macro,
                    '$' => TokenKind::LocalVar,
                    _ => TokenKind::EnvVar,
                };
                if self.peek_char(1).is_some_and(Self::is_ident_start) {
                    self.advance();
                    Token::new(kind, self.read_identifier(), start)
                } else {
                    self.advance();
                    invalid(format!("expected a name after '{}'", ch))
                }
            }
            '-' if self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
                && !self.last.is_some_and(TokenKind::ends_operand) =>
            {
                match self.read_number(true) {
                    Ok((kind, text)) => Token::new(kind, text, start),
                    Err(e) => invalid(e),
                }
            }
            c if c.is_ascii_digit() => match self.read_number(false) {
                Ok((kind, text)) => Token::new(kind, text, start),
                Err(e) => invalid(e),
            },
            c if Self::is_ident_start(c) => {
                let ident = self.read_identifier();
                let (kind, text) = match ident.as_str() {
                    "true" | "yes" | "on" => (TokenKind::Boolean, "true".to_string()),
                    "false" | "no" | "off" => (TokenKind::Boolean, "false".to_string()),
                    "null" => (TokenKind::Null, ident),
                    "inf" | "nan" => (TokenKind::Float, ident),
                    _ => (TokenKind::Identifier, ident),
                };
                Token::new(kind, text, start)
            }
            '{' => self.single(TokenKind::LBrace, "{", start),
            '}' => self.single(TokenKind::RBrace, "}", start),
            '[' => self.single(TokenKind::LBracket, "[", start),
            ']' => self.single(TokenKind::RBracket, "]", start),
            '(' => self.single(TokenKind::LParen, "(", start),
            ')' => self.single(TokenKind::RParen, ")", start),
            ',' => self.single(TokenKind::Comma, ",", start),
            ':' => self.single(TokenKind::Colon, ":", start),
            '?' => self.single(TokenKind::Question, "?", start),
            '+' => self.single(TokenKind::Plus, "+", start),
            '-' => self.single(TokenKind::Minus, "-", start),
            '/' => self.single(TokenKind::Slash, "/", start),
            '%' => self.single(TokenKind::Percent, "%", start),
            '~' => self.single(TokenKind::Tilde, "~", start),
            '^' => self.single(TokenKind::Caret, "^", start),
            '*' => self.pair('*', (TokenKind::Pow, "**"), (TokenKind::Star, "*"), start),
            '&' => self.pair('&', (TokenKind::And, "&&"), (TokenKind::Ampersand, "&"), start),
            '|' => self.pair('|', (TokenKind::Or, "||"), (TokenKind::Pipe, "|"), start),
            '!' => self.pair('=', (TokenKind::NotEq, "!="), (TokenKind::Not, "!"), start),
            '=' => self.pair('=', (TokenKind::EqEq, "=="), (TokenKind::Assign, "="), start),
            '<' => match self.peek_char(1) {
                Some('<') => self.single(TokenKind::Shl, "<<", start),
                Some('=') => self.single(TokenKind::LtEq, "<=", start),
                _ => self.single(TokenKind::Lt, "<", start),
            },
            '>' => match self.peek_char(1) {
                Some('>') => self.single(TokenKind::Shr, ">>", start),
                Some('=') => self.single(TokenKind::GtEq, ">=", start),
                _ => self.single(TokenKind::Gt, ">", start),
            },
            other => {
                self.advance();
                invalid(format!("unexpected character '{}'", other))
            }
        }
    }

    /// Returns the next token. After the end of input every call returns `Eof`.
    pub fn next_token(&mut self) -> Token {
        let token = self.scan();
        if token.kind != TokenKind::Comment {
            self.last = Some(token.kind);
        }
        token
    }
}

impl Iterator for Lexer {
    type Item = Token;

    /// Yields tokens up to and including `Eof`.
    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.finished = true;
        }
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input).map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords() {
        let mut lexer = Lexer::new("true off null inf name");
        assert_eq!(lexer.next_token().text, "true");
        let off = lexer.next_token();
        assert_eq!((off.kind, off.text.as_str()), (TokenKind::Boolean, "false"));
        assert_eq!(lexer.next_token().kind, TokenKind::Null);
        assert_eq!(lexer.next_token().kind, TokenKind::Float);
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_minus_context() {
        use TokenKind::*;
        assert_eq!(kinds("x = -1"), vec![Identifier, Assign, Integer, Eof]);
        assert_eq!(kinds("$a -1"), vec![LocalVar, Minus, Integer, Eof]);
        assert_eq!(kinds("(1)-2"), vec![LParen, Integer, RParen, Minus, Integer, Eof]);
        assert_eq!(kinds("-$a"), vec![Minus, LocalVar, Eof]);
    }

    #[test]
    fn test_positions() {
        let tokens: Vec<Token> = Lexer::new("a = 1\n  b = 2").collect();
        assert_eq!(tokens[0].position, Position::new(1, 1));
        assert_eq!(tokens[2].position, Position::new(1, 5));
        assert_eq!(tokens[4].position, Position::new(2, 3));
    }
}
