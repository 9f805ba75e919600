//! Statement parsing - commands, control flow, select, data schema.

use scrapec_lex::TokenKind;

use crate::ast::{Stmt, StmtKind, VariableDecl};
use crate::{ParseError, Parser};

impl Parser {
    /// Parses an identifier-introduced simple statement by looking the
    /// command name up in the command table.
    pub(crate) fn parse_command(&mut self) -> Result<Stmt, ParseError> {
        let token = self.current().clone();
        let span = token.span;
        self.advance();

        let kind = match token.lexeme.as_str() {
            "goto_url" => {
                let url = self.expect(TokenKind::Str)?.lexeme;
                StmtKind::GotoUrl { url }
            },
            "goto_href" => {
                let selectors = self.parse_selector_list()?;
                StmtKind::GotoHref { selectors }
            },
            "extract" => {
                let column = self.expect(TokenKind::Str)?.lexeme;
                let selectors = self.parse_selector_list()?;
                StmtKind::Extract { column, selectors }
            },
            "extract_list" => {
                let column = self.expect(TokenKind::Str)?.lexeme;
                let selectors = self.parse_selector_list()?;
                StmtKind::ExtractList { column, selectors }
            },
            "extract_attribute" => {
                let column = self.expect(TokenKind::Str)?.lexeme;
                let attribute = self.expect(TokenKind::Str)?.lexeme;
                let selectors = self.parse_selector_list()?;
                StmtKind::ExtractAttribute {
                    column,
                    attribute,
                    selectors,
                }
            },
            "extract_attribute_list" => {
                let column = self.expect(TokenKind::Str)?.lexeme;
                let attribute = self.expect(TokenKind::Str)?.lexeme;
                let selectors = self.parse_selector_list()?;
                StmtKind::ExtractAttributeList {
                    column,
                    attribute,
                    selectors,
                }
            },
            "save_row" => StmtKind::SaveRow,
            "clear_row" => StmtKind::ClearRow,
            "set_field" => {
                let column = self.expect(TokenKind::Str)?.lexeme;
                let value = self.expect(TokenKind::Str)?.lexeme;
                StmtKind::SetField { column, value }
            },
            "timestamp" => {
                let column = self.expect(TokenKind::Str)?.lexeme;
                StmtKind::Timestamp { column }
            },
            "click" => {
                let selectors = self.parse_selector_list()?;
                StmtKind::Click { selectors }
            },
            "history_back" => StmtKind::HistoryBack,
            "history_forward" => StmtKind::HistoryForward,
            "log" => {
                let message = self.expect(TokenKind::Str)?.lexeme;
                StmtKind::Log { message }
            },
            "throw" => {
                let message = self.expect(TokenKind::Str)?.lexeme;
                StmtKind::Throw { message }
            },
            "exit" => StmtKind::Exit,
            _ => {
                return Err(ParseError::UnknownCommand {
                    command: token.lexeme,
                    span,
                });
            },
        };

        Ok(Stmt { kind, span })
    }

    /// Parses `if cond NL stmts (else_if cond NL stmts)* (else NL stmts)?
    /// end_if`.
    pub(crate) fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::If)?;

        let condition = self.parse_condition()?;
        self.expect_header_newline("condition")?;

        let true_branch =
            self.parse_block(&[TokenKind::EndIf, TokenKind::Else, TokenKind::ElseIf])?;

        let mut else_if_branches = Vec::new();
        while self.match_kind(TokenKind::ElseIf) {
            let else_if_condition = self.parse_condition()?;
            self.expect_header_newline("else_if condition")?;
            let branch =
                self.parse_block(&[TokenKind::EndIf, TokenKind::Else, TokenKind::ElseIf])?;
            else_if_branches.push((else_if_condition, branch));
        }

        let false_branch = if self.match_kind(TokenKind::Else) {
            self.skip_newlines();
            self.parse_block(&[TokenKind::EndIf])?
        } else {
            Vec::new()
        };

        self.expect(TokenKind::EndIf)?;

        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                true_branch,
                else_if_branches,
                false_branch,
            },
            span,
        })
    }

    /// Parses `foreach sel_list as @name NL body end_foreach`.
    pub(crate) fn parse_foreach(&mut self) -> Result<Stmt, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::Foreach)?;

        let selectors = self.parse_selector_list()?;
        let element_var = self.parse_element_var()?;
        self.expect_header_newline("foreach declaration")?;

        let body = self.parse_block(&[TokenKind::EndForeach])?;
        self.expect(TokenKind::EndForeach)?;

        Ok(Stmt {
            kind: StmtKind::Foreach {
                selectors,
                element_var,
                body,
            },
            span,
        })
    }

    /// Parses `while cond NL body end_while`.
    pub(crate) fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::While)?;

        let condition = self.parse_condition()?;
        self.expect_header_newline("while condition")?;

        let body = self.parse_block(&[TokenKind::EndWhile])?;
        self.expect(TokenKind::EndWhile)?;

        Ok(Stmt {
            kind: StmtKind::While { condition, body },
            span,
        })
    }

    /// Parses `select sel_list as @name`.
    pub(crate) fn parse_select(&mut self) -> Result<Stmt, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::Select)?;

        let selectors = self.parse_selector_list()?;
        let element_var = self.parse_element_var()?;

        Ok(Stmt {
            kind: StmtKind::Select {
                selectors,
                element_var,
            },
            span,
        })
    }

    /// Parses a `data_schema ... end_schema` block.
    ///
    /// Each line is `"column name"` with an optional `as $variable`;
    /// without one, the variable is derived by lowercasing the column
    /// name and replacing spaces with underscores.
    pub(crate) fn parse_data_schema(&mut self) -> Result<Stmt, ParseError> {
        let span = self.current().span;
        self.expect(TokenKind::DataSchema)?;
        self.skip_newlines();

        let mut declarations = Vec::new();

        while !self.at(TokenKind::EndSchema) {
            if self.at(TokenKind::Eof) {
                return Err(self.unexpected("'end_schema'"));
            }

            let column_token = self.expect(TokenKind::Str)?;
            let decl_span = column_token.span;
            let column = column_token.lexeme;

            let variable = if self.match_kind(TokenKind::As) {
                self.expect(TokenKind::Variable)?.lexeme
            } else {
                derive_variable_name(&column)
            };

            declarations.push(VariableDecl {
                column,
                variable,
                span: decl_span,
            });

            self.expect_header_newline("variable declaration")?;
        }

        self.expect(TokenKind::EndSchema)?;

        Ok(Stmt {
            kind: StmtKind::DataSchema { declarations },
            span,
        })
    }
}

/// Derives a `$variable` from a feed column name: lowercased, spaces
/// replaced with underscores.
fn derive_variable_name(column: &str) -> String {
    let mut name = String::from("$");
    for c in column.chars() {
        if c == ' ' {
            name.push('_');
        } else {
            name.extend(c.to_lowercase());
        }
    }
    name
}
