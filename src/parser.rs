use std::fmt;
use std::mem;

use crate::{
    ast::{
        operators::POWER_BP, Arg, BinOp, Comment, Directive, DirectiveKind, Expr, MacroArg,
        MacroValue, Node, Object, OptionNode, Position, Token, TokenKind, UnaryOp, Unit, VarScope,
    },
    lexer::Lexer,
    value::{Moment, Value},
};

/// Errors raised while parsing. The first error aborts the parse.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A token that does not fit the grammar at this point
    UnexpectedToken {
        expected: String,
        found: String,
        position: Position,
    },

    /// Input ended inside a construct
    UnexpectedEof { expected: String, position: Position },

    /// Malformed input reported by the lexer
    InvalidToken { message: String, position: Position },

    /// A well-formed literal whose value is out of range or not a real date
    InvalidLiteral {
        text: String,
        reason: String,
        position: Position,
    },

    /// A `.name(...)` directive that is not `include`, `define` or `apply`
    UnknownMacro { name: String, position: Position },
}

impl ParseError {
    pub fn position(&self) -> Position {
        match self {
            ParseError::UnexpectedToken { position, .. }
            | ParseError::UnexpectedEof { position, .. }
            | ParseError::InvalidToken { position, .. }
            | ParseError::InvalidLiteral { position, .. }
            | ParseError::UnknownMacro { position, .. } => *position,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken {
                expected,
                found,
                position,
            } => write!(f, "{}: expected {}, found {}", position, expected, found),
            ParseError::UnexpectedEof { expected, position } => {
                write!(f, "{}: unexpected end of input, expected {}", position, expected)
            }
            ParseError::InvalidToken { message, position } => write!(f, "{}: {}", position, message),
            ParseError::InvalidLiteral {
                text,
                reason,
                position,
            } => write!(f, "{}: invalid literal '{}': {}", position, text, reason),
            ParseError::UnknownMacro { name, position } => {
                write!(f, "{}: unknown macro '.{}'", position, name)
            }
        }
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    lexer: Lexer,
    current_token: Token,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> ParseResult<Self> {
        let current_token = lexer.next_token();
        Self::reject_invalid(&current_token)?;
        Ok(Parser {
            lexer,
            current_token,
        })
    }

    fn reject_invalid(token: &Token) -> ParseResult<()> {
        if token.kind == TokenKind::Invalid {
            return Err(ParseError::InvalidToken {
                message: token.text.clone(),
                position: token.position,
            });
        }
        Ok(())
    }

    fn advance(&mut self) -> ParseResult<()> {
        self.current_token = self.lexer.next_token();
        Self::reject_invalid(&self.current_token)
    }

    /// Consumes the current token and returns it.
    fn bump(&mut self) -> ParseResult<Token> {
        let next = self.lexer.next_token();
        Self::reject_invalid(&next)?;
        Ok(mem::replace(&mut self.current_token, next))
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current_token.kind == kind
    }

    fn unexpected<T>(&self, expected: &str) -> ParseResult<T> {
        let position = self.current_token.position;
        if self.check(TokenKind::Eof) {
            return Err(ParseError::UnexpectedEof {
                expected: expected.to_string(),
                position,
            });
        }
        Err(ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current_token.to_string(),
            position,
        })
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if !self.check(kind) {
            return self.unexpected(kind.describe());
        }
        self.bump()
    }

    /// Skips line breaks and comments. Returns whether a line break was seen.
    fn skip_newlines(&mut self) -> ParseResult<bool> {
        let mut saw_eol = false;
        while self.check(TokenKind::Eol) || self.check(TokenKind::Comment) {
            saw_eol |= self.check(TokenKind::Eol);
            self.advance()?;
        }
        Ok(saw_eol)
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Parse a complete document into its (anonymous) root object.
    pub fn parse_document(&mut self) -> ParseResult<Object> {
        let mut root = Object::new("");
        root.position = self.current_token.position;
        self.parse_body(&mut root, TokenKind::Eof)?;
        Ok(root)
    }

    /// Parses fields and directives until `terminator`, which is left unconsumed.
    fn parse_body(&mut self, object: &mut Object, terminator: TokenKind) -> ParseResult<()> {
        let mut pending = Vec::new();
        loop {
            match self.current_token.kind {
                kind if kind == terminator => {
                    object.footer.append(&mut pending);
                    return Ok(());
                }
                TokenKind::Eol => self.advance()?,
                TokenKind::Comment => {
                    pending.push(self.bump()?.text);
                }
                TokenKind::Macro => {
                    let directive = self.parse_directive(object.fields.len())?;
                    object.directives.push(directive);
                    object.footer.append(&mut pending);
                    self.end_of_item()?;
                }
                TokenKind::Identifier => {
                    let leading = mem::take(&mut pending);
                    let node = self.parse_field(leading)?;
                    object.insert(node);
                }
                _ if terminator == TokenKind::RBrace => {
                    return self.unexpected("option, object, directive or '}'");
                }
                _ => return self.unexpected("option, object or directive"),
            }
        }
    }

    /// Parses `name = expr`, `name { ... }` or `kind name { ... }`.
    fn parse_field(&mut self, leading: Vec<String>) -> ParseResult<Node> {
        let name = self.expect(TokenKind::Identifier)?;

        match self.current_token.kind {
            TokenKind::Assign => {
                self.advance()?;
                let value = self.parse_expression()?;
                let trailing = self.trailing_comment()?;
                self.end_of_item()?;
                Ok(Node::Option(OptionNode {
                    name: name.text,
                    value,
                    comment: Comment { leading, trailing },
                    position: name.position,
                }))
            }
            TokenKind::LBrace => {
                let object = self.parse_block(name.text, None, name.position, leading)?;
                Ok(Node::Object(object))
            }
            TokenKind::Identifier => {
                let label = self.bump()?;
                if !self.check(TokenKind::LBrace) {
                    return self.unexpected("'{'");
                }
                let object =
                    self.parse_block(name.text, Some(label.text), name.position, leading)?;
                Ok(Node::Object(object))
            }
            _ => self.unexpected("'=' or '{'"),
        }
    }

    fn parse_block(
        &mut self,
        name: String,
        label: Option<String>,
        position: Position,
        leading: Vec<String>,
    ) -> ParseResult<Object> {
        self.expect(TokenKind::LBrace)?;
        let mut object = Object::new(name);
        object.label = label;
        object.position = position;
        self.parse_body(&mut object, TokenKind::RBrace)?;
        self.expect(TokenKind::RBrace)?;
        object.comment = Comment {
            leading,
            trailing: self.trailing_comment()?,
        };
        self.end_of_item()?;
        Ok(object)
    }

    fn trailing_comment(&mut self) -> ParseResult<Option<String>> {
        if self.check(TokenKind::Comment) {
            return Ok(Some(self.bump()?.text));
        }
        Ok(None)
    }

    /// A field ends at a line break, the end of input, or a closing brace.
    fn end_of_item(&mut self) -> ParseResult<()> {
        match self.current_token.kind {
            TokenKind::Eol => self.advance(),
            TokenKind::Eof | TokenKind::RBrace => Ok(()),
            _ => self.unexpected("end of line"),
        }
    }

    // ------------------------------------------------------------------
    // Directives
    // ------------------------------------------------------------------

    fn parse_directive(&mut self, offset: usize) -> ParseResult<Directive> {
        let token = self.expect(TokenKind::Macro)?;
        let kind = DirectiveKind::from_name(&token.text).ok_or(ParseError::UnknownMacro {
            name: token.text.clone(),
            position: token.position,
        })?;

        self.expect(TokenKind::LParen)?;
        self.skip_newlines()?;
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) {
            args.push(self.parse_macro_arg()?);
            self.skip_newlines()?;
            if self.check(TokenKind::Comma) {
                self.advance()?;
                self.skip_newlines()?;
            } else if !self.check(TokenKind::RParen) {
                return self.unexpected("',' or ')'");
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(Directive {
            kind,
            args,
            position: token.position,
            offset,
        })
    }

    fn parse_macro_arg(&mut self) -> ParseResult<MacroArg> {
        if self.check(TokenKind::Identifier) {
            let ident = self.bump()?;
            if self.check(TokenKind::Assign) {
                self.advance()?;
                self.skip_newlines()?;
                let value = self.parse_macro_value()?;
                return Ok(MacroArg {
                    name: Some(ident.text),
                    value,
                });
            }
            let value = self.macro_value_after_ident(ident)?;
            return Ok(MacroArg { name: None, value });
        }
        Ok(MacroArg {
            name: None,
            value: self.parse_macro_value()?,
        })
    }

    fn parse_macro_value(&mut self) -> ParseResult<MacroValue> {
        match self.current_token.kind {
            TokenKind::LBrace => {
                let position = self.current_token.position;
                let block = self.parse_fragment(position)?;
                Ok(MacroValue::Block(block))
            }
            TokenKind::Identifier => {
                let ident = self.bump()?;
                self.macro_value_after_ident(ident)
            }
            _ => Ok(MacroValue::Expr(self.parse_expression()?)),
        }
    }

    /// A bare identifier names a fragment unless it starts a call.
    fn macro_value_after_ident(&mut self, ident: Token) -> ParseResult<MacroValue> {
        if self.check(TokenKind::LParen) {
            let call = self.parse_call(ident)?;
            return Ok(MacroValue::Expr(self.continue_expression(call)?));
        }
        Ok(MacroValue::Ident(ident.text))
    }

    /// `{ ... }` inside a directive's argument list.
    fn parse_fragment(&mut self, position: Position) -> ParseResult<Object> {
        self.expect(TokenKind::LBrace)?;
        let mut object = Object::new("");
        object.position = position;
        self.parse_body(&mut object, TokenKind::RBrace)?;
        self.expect(TokenKind::RBrace)?;
        Ok(object)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Parse a single expression and require the end of input after it.
    pub fn parse(&mut self) -> ParseResult<Expr> {
        self.skip_newlines()?;
        let expr = self.parse_expression()?;
        self.skip_newlines()?;
        self.expect(TokenKind::Eof)?;
        Ok(expr)
    }

    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        let condition = self.parse_binary(1)?;
        self.parse_ternary_rest(condition)
    }

    fn parse_ternary_rest(&mut self, condition: Expr) -> ParseResult<Expr> {
        if !self.check(TokenKind::Question) {
            return Ok(condition);
        }
        self.advance()?;
        self.skip_newlines()?;
        let then = self.parse_expression()?;
        self.skip_newlines()?;
        self.expect(TokenKind::Colon)?;
        self.skip_newlines()?;
        let otherwise = self.parse_expression()?;
        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    /// Resumes parsing after a primary expression that was already consumed.
    fn continue_expression(&mut self, primary: Expr) -> ParseResult<Expr> {
        let operand = self.parse_postfix(primary)?;
        let lhs = self.parse_binary_rest(operand, 1)?;
        self.parse_ternary_rest(lhs)
    }

    /// Precedence climbing over the binding powers in [`BinOp::binding_power`].
    fn parse_binary(&mut self, min_bp: u8) -> ParseResult<Expr> {
        let lhs = self.parse_unary()?;
        self.parse_binary_rest(lhs, min_bp)
    }

    fn parse_binary_rest(&mut self, mut lhs: Expr, min_bp: u8) -> ParseResult<Expr> {
        while let Some(op) = BinOp::from_token(self.current_token.kind) {
            let bp = op.binding_power();
            if bp < min_bp {
                break;
            }
            self.advance()?;
            self.skip_newlines()?;

            let next_min = if op.is_right_assoc() { bp } else { bp + 1 };
            let rhs = self.parse_binary(next_min)?;
            lhs = Expr::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if let Some(op) = UnaryOp::from_token(self.current_token.kind) {
            self.advance()?;
            // Operand binds at power level: -2 ** 2 is -(2 ** 2)
            let operand = self.parse_binary(POWER_BP)?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> ParseResult<Expr> {
        while self.check(TokenKind::LBracket) {
            self.advance()?;
            self.skip_newlines()?;
            let index = self.parse_expression()?;
            self.skip_newlines()?;
            self.expect(TokenKind::RBracket)?;
            expr = Expr::Index {
                target: Box::new(expr),
                index: Box::new(index),
            };
        }
        Ok(expr)
    }

    /// Parse primary expressions: literals, variables, groups, arrays, calls.
    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.current_token.kind {
            TokenKind::Integer
            | TokenKind::Float
            | TokenKind::String
            | TokenKind::Heredoc
            | TokenKind::Boolean
            | TokenKind::Null
            | TokenKind::Date
            | TokenKind::DateTime
            | TokenKind::Time => {
                let token = self.bump()?;
                let (value, unit) = decode_literal(&token)?;
                Ok(Expr::Literal { token, value, unit })
            }
            TokenKind::LocalVar | TokenKind::EnvVar => {
                let token = self.bump()?;
                let scope = if token.kind == TokenKind::LocalVar {
                    VarScope::Local
                } else {
                    VarScope::Env
                };
                Ok(Expr::Variable {
                    name: token.text,
                    scope,
                    position: token.position,
                })
            }
            TokenKind::LParen => {
                self.advance()?;
                self.skip_newlines()?;
                let expr = self.parse_expression()?;
                self.skip_newlines()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_array(),
            TokenKind::Identifier => {
                let ident = self.bump()?;
                if self.check(TokenKind::LParen) {
                    return self.parse_call(ident);
                }
                Err(ParseError::UnexpectedToken {
                    expected: "expression (variables are written $name or @name)".to_string(),
                    found: ident.to_string(),
                    position: ident.position,
                })
            }
            _ => self.unexpected("expression"),
        }
    }

    /// Arrays may span lines. A trailing comma needs a line break after it.
    fn parse_array(&mut self) -> ParseResult<Expr> {
        self.expect(TokenKind::LBracket)?;
        let mut elements = vec![];
        self.skip_newlines()?;

        while !self.check(TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            self.skip_newlines()?;

            if self.check(TokenKind::Comma) {
                self.advance()?;
                let saw_eol = self.skip_newlines()?;
                if self.check(TokenKind::RBracket) && !saw_eol {
                    return self.unexpected("expression after ','");
                }
            } else if !self.check(TokenKind::RBracket) {
                return self.unexpected("',' or ']'");
            }
        }

        self.expect(TokenKind::RBracket)?;
        Ok(Expr::Array(elements))
    }

    /// `name(arg, key=value, ...)`; named arguments come last.
    fn parse_call(&mut self, name: Token) -> ParseResult<Expr> {
        self.expect(TokenKind::LParen)?;
        self.skip_newlines()?;

        let mut args: Vec<Arg> = Vec::new();
        while !self.check(TokenKind::RParen) {
            let position = self.current_token.position;
            let arg = if self.check(TokenKind::Identifier) {
                let ident = self.bump()?;
                if self.check(TokenKind::Assign) {
                    self.advance()?;
                    self.skip_newlines()?;
                    Arg::named(ident.text, self.parse_expression()?)
                } else if self.check(TokenKind::LParen) {
                    let call = self.parse_call(ident)?;
                    Arg::positional(self.continue_expression(call)?)
                } else {
                    return Err(ParseError::UnexpectedToken {
                        expected: "'=' or '(' after argument name".to_string(),
                        found: self.current_token.to_string(),
                        position: self.current_token.position,
                    });
                }
            } else {
                Arg::positional(self.parse_expression()?)
            };

            if arg.name.is_none() && args.iter().any(|a| a.name.is_some()) {
                return Err(ParseError::UnexpectedToken {
                    expected: "named argument".to_string(),
                    found: "positional argument after named arguments".to_string(),
                    position,
                });
            }
            args.push(arg);

            self.skip_newlines()?;
            if self.check(TokenKind::Comma) {
                self.advance()?;
                self.skip_newlines()?;
            } else if !self.check(TokenKind::RParen) {
                return self.unexpected("',' or ')'");
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(Expr::Call {
            name: name.text,
            args,
            position: name.position,
        })
    }
}

/// Decodes the text of a literal token into a value and optional unit.
fn decode_literal(token: &Token) -> ParseResult<(Value, Option<Unit>)> {
    let invalid = |reason: String| ParseError::InvalidLiteral {
        text: token.text.clone(),
        reason,
        position: token.position,
    };

    let value = match token.kind {
        TokenKind::Integer => {
            let (number, unit) = Unit::split(&token.text);
            let (sign, digits) = match number.strip_prefix('-') {
                Some(rest) => ("-", rest),
                None => ("", number),
            };
            let (radix, digits) = match digits.get(..2) {
                Some("0x" | "0X") => (16, &digits[2..]),
                Some("0o" | "0O") => (8, &digits[2..]),
                Some("0b" | "0B") => (2, &digits[2..]),
                _ => (10, digits),
            };
            let cleaned = format!("{}{}", sign, digits.replace('_', ""));
            let n = i64::from_str_radix(&cleaned, radix).map_err(|e| invalid(e.to_string()))?;
            return Ok((Value::Int(n), unit));
        }
        TokenKind::Float => {
            let value = match token.text.as_str() {
                "inf" => f64::INFINITY,
                "nan" => f64::NAN,
                text => {
                    let (number, unit) = Unit::split(text);
                    let n = number
                        .replace('_', "")
                        .parse::<f64>()
                        .map_err(|e| invalid(e.to_string()))?;
                    return Ok((Value::Double(n), unit));
                }
            };
            Value::Double(value)
        }
        TokenKind::String | TokenKind::Heredoc => Value::Text(token.text.clone()),
        TokenKind::Boolean => Value::Bool(token.text == "true"),
        TokenKind::Null => Value::Null,
        TokenKind::Date | TokenKind::DateTime | TokenKind::Time => {
            let moment = Moment::parse(&token.text)
                .ok_or_else(|| invalid("not a valid calendar value".to_string()))?;
            Value::Moment(moment)
        }
        kind => return Err(invalid(format!("{} is not a literal", kind))),
    };
    Ok((value, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(input: &str) -> Expr {
        Parser::new(Lexer::new(input)).unwrap().parse().unwrap()
    }

    #[test]
    fn test_power_is_right_associative() {
        match expr("2 ** 3 ** 2") {
            Expr::Binary { op: BinOp::Power, right, .. } => {
                assert!(matches!(*right, Expr::Binary { op: BinOp::Power, .. }))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unary_binds_looser_than_power() {
        match expr("-(2) ** 2") {
            Expr::Unary { op: UnaryOp::Negate, operand } => {
                assert!(matches!(*operand, Expr::Binary { op: BinOp::Power, .. }))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_token_aborts() {
        let err = Parser::new(Lexer::new("x = 0123"))
            .and_then(|mut p| p.parse_document())
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidToken { .. }));
        assert_eq!(err.position(), Position::new(1, 5));
    }
}
