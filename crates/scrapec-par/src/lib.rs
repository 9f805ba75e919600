//! scrapec-par - Parser (syntactic analyzer) for ScrapeScript.
//!
//! Recursive descent over the token stream from `scrapec-lex`,
//! producing a typed AST:
//!
//! ```text
//! Vec<Token>
//!     │
//!     ▼
//! [Parser] ──▶ Program { statements: Vec<Stmt> }
//! ```
//!
//! GRAMMAR (EBNF):
//! ---------------
//! ```ebnf
//! program      = { NEWLINE | statement } ;
//! statement    = simple_stmt NEWLINE | block_stmt ;
//! simple_stmt  = command { STRING } [ sel_list ] ;
//! block_stmt   = if_stmt | foreach_stmt | while_stmt | select_stmt
//!              | schema_stmt ;
//! if_stmt      = "if" cond NEWLINE stmts
//!                { "else_if" cond NEWLINE stmts }
//!                [ "else" NEWLINE stmts ] "end_if" ;
//! foreach_stmt = "foreach" sel_list "as" AT_IDENT NEWLINE stmts
//!                "end_foreach" ;
//! while_stmt   = "while" cond NEWLINE stmts "end_while" ;
//! select_stmt  = "select" sel_list "as" AT_IDENT ;
//! schema_stmt  = "data_schema" NEWLINE
//!                { STRING [ "as" VARIABLE ] NEWLINE } "end_schema" ;
//! cond         = cond_term { "or" cond_term } ;
//! cond_term    = cond_factor { "and" cond_factor } ;
//! cond_factor  = "not" cond_factor | "(" cond ")"
//!              | "exists" sel_list | "is_empty" ( VARIABLE | STRING ) ;
//! sel_list     = STRING { "," STRING } ;
//! ```
//!
//! Every simple statement must be followed by a newline or end of
//! input; two statements can never share a line. There is no error
//! recovery: the first syntax error aborts the parse with a
//! [`ParseError`] naming the expected construct and the offending
//! token's position.

pub mod ast;
mod cond;
mod edge_cases;
mod stmt;

pub use ast::{Cond, CondKind, Program, Stmt, StmtKind, VariableDecl};

use scrapec_lex::{Token, TokenKind};
use scrapec_util::Span;
use thiserror::Error;

/// A syntax error raised by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The token at this position cannot continue the grammar rule.
    #[error("expected {expected}, found {found} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    /// An identifier in statement position that is not a known command.
    #[error("unknown command '{command}' at {span}")]
    UnknownCommand { command: String, span: Span },

    /// A `foreach`/`select` variable without the `@` prefix.
    #[error("element variable name must start with '@', found '{name}' at {span}")]
    InvalidElementVar { name: String, span: Span },

    /// A simple statement not followed by a newline or end of input.
    #[error("expected newline after statement, found {found} at {span}")]
    MissingTerminator { found: String, span: Span },
}

impl ParseError {
    /// The source position the error points at.
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::UnknownCommand { span, .. }
            | ParseError::InvalidElementVar { span, .. }
            | ParseError::MissingTerminator { span, .. } => *span,
        }
    }
}

/// Renders a token for error messages, quoting identifier text.
fn describe_token(token: &Token) -> String {
    match token.kind {
        TokenKind::Identifier => format!("identifier '{}'", token.lexeme),
        TokenKind::Str => format!("string '{}'", token.lexeme),
        TokenKind::Variable => format!("variable '{}'", token.lexeme),
        kind => kind.describe().to_string(),
    }
}

/// Recursive descent parser for ScrapeScript.
///
/// # Example
///
/// ```
/// use scrapec_lex::Lexer;
/// use scrapec_par::Parser;
///
/// let tokens = Lexer::new("extract 'title' 'h1'\nsave_row").tokenize().unwrap();
/// let program = Parser::new(tokens).parse().unwrap();
/// assert_eq!(program.statements.len(), 2);
/// ```
pub struct Parser {
    /// Token stream from the lexer, ending with `Eof`.
    tokens: Vec<Token>,

    /// Current position in the token stream.
    position: usize,
}

impl Parser {
    /// Creates a parser over a token stream.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        // The lexer always terminates the stream with Eof; tolerate
        // hand-built streams that forgot it.
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let span = tokens.last().map(|t| t.span).unwrap_or(Span::new(1, 1));
            tokens.push(Token::new(TokenKind::Eof, "", span));
        }

        Self {
            tokens,
            position: 0,
        }
    }

    /// Parses the whole token stream into a program.
    pub fn parse(mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();

        loop {
            self.skip_newlines();
            if self.at(TokenKind::Eof) {
                return Ok(Program { statements });
            }
            statements.push(self.parse_statement()?);
        }
    }

    /// Parses one statement, including its newline terminator.
    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let stmt = match self.current().kind {
            TokenKind::If => self.parse_if()?,
            TokenKind::Foreach => self.parse_foreach()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::Select => self.parse_select()?,
            TokenKind::DataSchema => self.parse_data_schema()?,
            TokenKind::Identifier => self.parse_command()?,
            _ => {
                return Err(self.unexpected("a statement"));
            },
        };

        self.expect_terminator()?;
        Ok(stmt)
    }

    // ======================================================================
    // TOKEN STREAM HELPERS
    // ======================================================================

    /// Returns the current token without consuming it.
    fn current(&self) -> &Token {
        // The stream always ends with Eof, which is never consumed.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    /// Returns true if the current token has the given kind.
    fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    /// Advances past the current token.
    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    /// Consumes the current token if it has the expected kind.
    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(kind) {
            let token = self.current().clone();
            self.advance();
            Ok(token)
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    /// Consumes the current token if it matches, reporting nothing otherwise.
    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skips any run of newline tokens.
    fn skip_newlines(&mut self) {
        while self.at(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Enforces the statement-terminator rule: every statement must be
    /// followed by a newline or end of input. The newline is consumed.
    fn expect_terminator(&mut self) -> Result<(), ParseError> {
        match self.current().kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            },
            TokenKind::Eof => Ok(()),
            _ => {
                let token = self.current();
                Err(ParseError::MissingTerminator {
                    found: describe_token(token),
                    span: token.span,
                })
            },
        }
    }

    /// Requires a newline after a block header (`if cond`, `foreach ...`),
    /// then skips any further blank lines.
    fn expect_header_newline(&mut self, after: &str) -> Result<(), ParseError> {
        if !self.at(TokenKind::Newline) {
            return Err(self.unexpected(&format!("newline after {after}")));
        }
        self.skip_newlines();
        Ok(())
    }

    /// Builds an unexpected-token error at the current position.
    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: describe_token(token),
            span: token.span,
        }
    }

    // ======================================================================
    // SHARED FRAGMENTS
    // ======================================================================

    /// Parses `STRING (',' STRING)*`. At least one selector is required.
    fn parse_selector_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut selectors = Vec::new();

        let first = self.expect(TokenKind::Str)?;
        selectors.push(first.lexeme);

        while self.match_kind(TokenKind::Comma) {
            let next = self.expect(TokenKind::Str)?;
            selectors.push(next.lexeme);
        }

        Ok(selectors)
    }

    /// Parses `as @name`, enforcing the `@` prefix.
    fn parse_element_var(&mut self) -> Result<String, ParseError> {
        self.expect(TokenKind::As)?;
        let var_token = self.expect(TokenKind::Identifier)?;

        if !var_token.lexeme.starts_with('@') {
            return Err(ParseError::InvalidElementVar {
                name: var_token.lexeme,
                span: var_token.span,
            });
        }

        Ok(var_token.lexeme)
    }

    /// Parses statements until one of `terminators` appears at statement
    /// position. The terminator itself is left unconsumed.
    fn parse_block(&mut self, terminators: &[TokenKind]) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();

        loop {
            self.skip_newlines();
            if terminators.contains(&self.current().kind) {
                return Ok(body);
            }
            if self.at(TokenKind::Eof) {
                let expected = terminators
                    .iter()
                    .map(|k| k.describe())
                    .collect::<Vec<_>>()
                    .join(" or ");
                return Err(self.unexpected(&expected));
            }
            body.push(self.parse_statement()?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrapec_lex::Lexer;

    fn parse(source: &str) -> Result<Program, ParseError> {
        let tokens = Lexer::new(source).tokenize().expect("lexing failed");
        Parser::new(tokens).parse()
    }

    #[test]
    fn test_empty_program() {
        let program = parse("").unwrap();
        assert!(program.statements.is_empty());
    }

    #[test]
    fn test_blank_lines_and_comments_only() {
        let program = parse("\n\n# just a comment\n\n").unwrap();
        assert!(program.statements.is_empty());
    }

    #[test]
    fn test_statement_count_matches_source() {
        let source = "goto_url 'https://example.com'\nextract 'title' 'h1'\nsave_row\n";
        let program = parse(source).unwrap();
        assert_eq!(program.statements.len(), 3);
    }

    #[test]
    fn test_statements_carry_spans() {
        let source = "save_row\n  clear_row";
        let program = parse(source).unwrap();
        assert_eq!(program.statements[0].span, Span::new(1, 1));
        assert_eq!(program.statements[1].span, Span::new(2, 3));
    }

    #[test]
    fn test_two_statements_on_one_line_rejected() {
        let err = parse("save_row clear_row").unwrap_err();
        assert!(matches!(err, ParseError::MissingTerminator { .. }));
    }

    #[test]
    fn test_unknown_command() {
        let err = parse("frobnicate 'x'").unwrap_err();
        match err {
            ParseError::UnknownCommand { command, span } => {
                assert_eq!(command, "frobnicate");
                assert_eq!(span, Span::new(1, 1));
            },
            other => panic!("expected unknown command, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_selector_cites_position() {
        // extract needs a column name and at least one selector
        let err = parse("extract 'a'").unwrap_err();
        match err {
            ParseError::UnexpectedToken { expected, span, .. } => {
                assert!(expected.contains("string"));
                assert_eq!(span.line, 1);
            },
            other => panic!("expected unexpected-token error, got {other:?}"),
        }
    }
}
