//! scrapec-lex - Lexical analyzer for ScrapeScript.
//!
//! Transforms source text into a stream of tokens:
//!
//! ```text
//! Source (.scrape)
//!        │
//!        ▼
//!   [Cursor] ──▶ characters with line/column tracking
//!        │
//!        ▼
//!   [Lexer]  ──▶ Vec<Token>, terminated by Token::Eof
//! ```
//!
//! Unlike most languages, newlines are significant here: the parser
//! uses them as statement terminators, so the lexer emits a distinct
//! `Newline` token for every `\n` outside a string literal. Spaces and
//! tabs are skipped; `#` comments run to end of line and never
//! materialise as tokens.
//!
//! The lexer is a pure single pass over the source. The first invalid
//! character or unterminated string aborts with a [`LexError`] carrying
//! the offending position; there is no recovery.

pub mod cursor;
mod lexer;
mod token;

pub use cursor::Cursor;
pub use lexer::{LexError, Lexer};
pub use token::{Token, TokenKind};
