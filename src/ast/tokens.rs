use std::fmt;

/// A location in the source text. Lines and columns start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Words
    /// Bare identifier
    ///
    /// # Examples
    /// ```text
    /// server
    /// max_connections
    /// ```
    Identifier,

    /// `# line` or `/* block */` comment; text is the trimmed body
    Comment,

    /// Macro directive name (`.include`, `.define`, `.apply`)
    Macro,

    // Literals
    /// Heredoc body
    ///
    /// # Example
    /// ```text
    /// motd = <<EOT
    /// welcome
    /// EOT
    /// ```
    Heredoc,

    /// Quoted string; text is the decoded content
    String,

    /// Integer in base 2, 8, 10 or 16, with an optional unit suffix
    ///
    /// # Examples
    /// ```text
    /// 1_011
    /// 0xdead_beef
    /// 10MB
    /// ```
    Integer,

    /// Floating point number (`1.5`, `2e10`, `inf`, `nan`)
    Float,

    /// Calendar date (`2024-03-01`)
    Date,

    /// Date and time (`2024-03-01T10:30:00Z`)
    DateTime,

    /// Time of day (`10:30`, `23:59:59.5+02:00`)
    Time,

    /// `true`/`false` and their aliases `yes`/`no`/`on`/`off`
    Boolean,

    /// `null`
    Null,

    // Delimiters
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Comma,
    /// End of line
    Eol,

    // Operators
    /// `=`
    Assign,
    /// `:`
    Colon,
    /// `?`
    Question,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `**`
    Pow,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `!`
    Not,
    /// `~`
    Tilde,
    /// `&`
    Ampersand,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    Lt,
    LtEq,
    Gt,
    GtEq,
    EqEq,
    NotEq,

    // Variables
    /// `$name`, scoped to the enclosing objects
    LocalVar,

    /// `@name`, read from the document environment
    EnvVar,

    /// End of input
    Eof,

    /// Malformed input; text describes the problem
    Invalid,
}

impl TokenKind {
    /// Whether a token of this kind can end an operand.
    ///
    /// A `-` directly before a digit is folded into the number only when the
    /// preceding token cannot end an operand.
    pub fn ends_operand(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Identifier
                | Heredoc
                | String
                | Integer
                | Float
                | Date
                | DateTime
                | Time
                | Boolean
                | Null
                | RBracket
                | RParen
                | RBrace
                | LocalVar
                | EnvVar
        )
    }

    /// Short human-readable description used in error messages.
    pub fn describe(self) -> &'static str {
        use TokenKind::*;
        match self {
            Identifier => "identifier",
            Comment => "comment",
            Macro => "macro",
            Heredoc => "heredoc",
            String => "string",
            Integer => "integer",
            Float => "float",
            Date => "date",
            DateTime => "datetime",
            Time => "time",
            Boolean => "boolean",
            Null => "null",
            LBracket => "'['",
            RBracket => "']'",
            LBrace => "'{'",
            RBrace => "'}'",
            LParen => "'('",
            RParen => "')'",
            Comma => "','",
            Eol => "end of line",
            Assign => "'='",
            Colon => "':'",
            Question => "'?'",
            Plus => "'+'",
            Minus => "'-'",
            Star => "'*'",
            Slash => "'/'",
            Percent => "'%'",
            Pow => "'**'",
            And => "'&&'",
            Or => "'||'",
            Not => "'!'",
            Tilde => "'~'",
            Ampersand => "'&'",
            Pipe => "'|'",
            Caret => "'^'",
            Shl => "'<<'",
            Shr => "'>>'",
            Lt => "'<'",
            LtEq => "'<='",
            Gt => "'>'",
            GtEq => "'>='",
            EqEq => "'=='",
            NotEq => "'!='",
            LocalVar => "local variable",
            EnvVar => "environment variable",
            Eof => "end of input",
            Invalid => "invalid token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof | TokenKind::Eol => write!(f, "{}", self.kind),
            _ if self.text.is_empty() => write!(f, "{}", self.kind),
            _ => write!(f, "{} '{}'", self.kind, self.text),
        }
    }
}
