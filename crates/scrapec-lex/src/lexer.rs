//! The ScrapeScript lexer.

use scrapec_util::Span;
use thiserror::Error;

use crate::cursor::Cursor;
use crate::token::{Token, TokenKind};

/// A lexical error. Aborts the run before any execution happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A character that cannot start any token.
    #[error("invalid character '{ch}' at {span}")]
    InvalidCharacter { ch: char, span: Span },

    /// A string literal whose closing quote is missing.
    #[error("unterminated string literal opened at {span}")]
    UnterminatedString { span: Span },
}

impl LexError {
    /// The source position the error points at.
    pub fn span(&self) -> Span {
        match self {
            LexError::InvalidCharacter { span, .. } => *span,
            LexError::UnterminatedString { span } => *span,
        }
    }
}

/// Lexer for ScrapeScript source text.
///
/// Produces the token stream the parser consumes. Newlines are emitted
/// as tokens (they terminate statements); spaces, tabs and `#` comments
/// are dropped.
///
/// # Example
///
/// ```
/// use scrapec_lex::{Lexer, TokenKind};
///
/// let tokens = Lexer::new("extract 'title' 'h1'").tokenize().unwrap();
/// let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
/// assert_eq!(
///     kinds,
///     vec![
///         TokenKind::Identifier,
///         TokenKind::Str,
///         TokenKind::Str,
///         TokenKind::Eof,
///     ]
/// );
/// ```
pub struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over the given source text.
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
        }
    }

    /// Consumes the whole source and returns the token stream.
    ///
    /// The returned vector always ends with a `TokenKind::Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let at_end = token.kind == TokenKind::Eof;
            tokens.push(token);
            if at_end {
                return Ok(tokens);
            }
        }
    }

    /// Scans and returns the next token.
    fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            // Inter-token whitespace, but never newlines: those are
            // statement terminators and must come out as tokens.
            while matches!(self.cursor.current_char(), ' ' | '\t' | '\r') {
                self.cursor.advance();
            }

            if self.cursor.current_char() == '#' {
                self.skip_comment();
                continue;
            }

            let span = self.position();

            if self.cursor.is_at_end() {
                return Ok(Token::new(TokenKind::Eof, "", span));
            }

            let c = self.cursor.current_char();
            return match c {
                '\n' => {
                    self.cursor.advance();
                    Ok(Token::new(TokenKind::Newline, "\n", span))
                },
                '(' => {
                    self.cursor.advance();
                    Ok(Token::new(TokenKind::LParen, "(", span))
                },
                ')' => {
                    self.cursor.advance();
                    Ok(Token::new(TokenKind::RParen, ")", span))
                },
                ',' => {
                    self.cursor.advance();
                    Ok(Token::new(TokenKind::Comma, ",", span))
                },
                '\'' | '"' => self.lex_string(span),
                '$' => self.lex_variable(span),
                c if is_ident_start(c) => Ok(self.lex_identifier(span)),
                c => Err(LexError::InvalidCharacter { ch: c, span }),
            };
        }
    }

    /// Skips a `#` comment up to (but not including) the newline, so the
    /// newline still becomes a statement terminator token.
    fn skip_comment(&mut self) {
        while !self.cursor.is_at_end() && self.cursor.current_char() != '\n' {
            self.cursor.advance();
        }
    }

    /// Lexes an identifier, `@reference`, or reserved keyword.
    fn lex_identifier(&mut self, span: Span) -> Token {
        let mut lexeme = String::new();

        let is_reference = self.cursor.current_char() == '@';
        if is_reference {
            lexeme.push('@');
            self.cursor.advance();
        }

        while is_ident_continue(self.cursor.current_char()) {
            lexeme.push(self.cursor.current_char());
            self.cursor.advance();
        }

        // `@name` is always an identifier, even if `name` collides with
        // a reserved word. That keeps `foreach ... as @select` legal.
        let kind = if is_reference {
            TokenKind::Identifier
        } else {
            TokenKind::keyword(&lexeme).unwrap_or(TokenKind::Identifier)
        };

        Token::new(kind, lexeme, span)
    }

    /// Lexes a `$variable` token, `$` included in the lexeme.
    fn lex_variable(&mut self, span: Span) -> Result<Token, LexError> {
        self.cursor.advance();

        if !is_ident_continue(self.cursor.current_char()) {
            return Err(LexError::InvalidCharacter { ch: '$', span });
        }

        let mut lexeme = String::from("$");
        while is_ident_continue(self.cursor.current_char()) {
            lexeme.push(self.cursor.current_char());
            self.cursor.advance();
        }

        Ok(Token::new(TokenKind::Variable, lexeme, span))
    }

    /// Lexes a string literal delimited by `'` or `"`.
    ///
    /// Recognised escapes: `\\`, `\n`, `\t`, and `\` followed by the
    /// opening quote. Any other `\x` passes through as the literal two
    /// characters. A missing closing quote is an error at the opening
    /// quote's position.
    fn lex_string(&mut self, span: Span) -> Result<Token, LexError> {
        let quote = self.cursor.current_char();
        self.cursor.advance();

        let mut contents = String::new();

        loop {
            if self.cursor.is_at_end() {
                return Err(LexError::UnterminatedString { span });
            }

            let c = self.cursor.current_char();

            if c == quote {
                self.cursor.advance();
                return Ok(Token::new(TokenKind::Str, contents, span));
            }

            if c == '\\' {
                self.cursor.advance();
                if self.cursor.is_at_end() {
                    return Err(LexError::UnterminatedString { span });
                }
                let escaped = self.cursor.current_char();
                self.cursor.advance();
                match escaped {
                    'n' => contents.push('\n'),
                    't' => contents.push('\t'),
                    '\\' => contents.push('\\'),
                    c if c == quote => contents.push(quote),
                    other => {
                        contents.push('\\');
                        contents.push(other);
                    },
                }
            } else {
                contents.push(c);
                self.cursor.advance();
            }
        }
    }

    fn position(&self) -> Span {
        Span::new(self.cursor.line(), self.cursor.column())
    }
}

/// Characters that may start an identifier. `@` opens an element
/// reference, which lexes as an identifier throughout.
fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '@'
}

/// Characters that may continue an identifier.
fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
