//! Condition parsing.
//!
//! Precedence, lowest to highest: `or`, `and`, `not`, atom. The binary
//! operators are left-associative; `not` is right-associative. Atoms are
//! `(cond)`, `exists sel_list`, and `is_empty ($var | "value")`.

use scrapec_lex::TokenKind;

use crate::ast::{Cond, CondKind};
use crate::{ParseError, Parser};

impl Parser {
    /// Parses a condition at `or` precedence.
    pub(crate) fn parse_condition(&mut self) -> Result<Cond, ParseError> {
        let mut node = self.parse_condition_term()?;

        while self.at(TokenKind::Or) {
            let span = self.current().span;
            self.advance();
            let right = self.parse_condition_term()?;
            node = Cond {
                kind: CondKind::Or {
                    left: Box::new(node),
                    right: Box::new(right),
                },
                span,
            };
        }

        Ok(node)
    }

    /// Parses a condition term at `and` precedence.
    fn parse_condition_term(&mut self) -> Result<Cond, ParseError> {
        let mut node = self.parse_condition_factor()?;

        while self.at(TokenKind::And) {
            let span = self.current().span;
            self.advance();
            let right = self.parse_condition_factor()?;
            node = Cond {
                kind: CondKind::And {
                    left: Box::new(node),
                    right: Box::new(right),
                },
                span,
            };
        }

        Ok(node)
    }

    /// Parses a condition factor: `not`, parenthesised group, or atom.
    fn parse_condition_factor(&mut self) -> Result<Cond, ParseError> {
        match self.current().kind {
            TokenKind::LParen => {
                self.advance();
                let node = self.parse_condition()?;
                self.expect(TokenKind::RParen)?;
                Ok(node)
            },
            TokenKind::Not => {
                let span = self.current().span;
                self.advance();
                let operand = self.parse_condition_factor()?;
                Ok(Cond {
                    kind: CondKind::Not {
                        operand: Box::new(operand),
                    },
                    span,
                })
            },
            TokenKind::Identifier if self.current().lexeme == "exists" => {
                let span = self.current().span;
                self.advance();
                let selectors = self.parse_selector_list()?;
                Ok(Cond {
                    kind: CondKind::Exists { selectors },
                    span,
                })
            },
            TokenKind::Identifier if self.current().lexeme == "is_empty" => {
                let span = self.current().span;
                self.advance();
                let value = match self.current().kind {
                    TokenKind::Variable | TokenKind::Str => {
                        let token = self.current().clone();
                        self.advance();
                        token.lexeme
                    },
                    _ => return Err(self.unexpected("$variable or string after 'is_empty'")),
                };
                Ok(Cond {
                    kind: CondKind::IsEmpty { value },
                    span,
                })
            },
            _ => Err(self.unexpected("a condition")),
        }
    }
}
