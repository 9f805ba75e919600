//! Runtime error types.

use scrapec_browser::BrowserError;
use scrapec_util::Span;
use thiserror::Error;

/// A fatal error during script execution.
///
/// Non-fatal failures (no selector matched, a click that went nowhere,
/// a flaky attribute read) never become errors: they are logged and the
/// run continues. What's left here always aborts the run - after the
/// browser session has been cleaned up, and without discarding the rows
/// saved so far.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A `throw` statement. The message is the script author's and is
    /// presented verbatim.
    #[error("{message}")]
    Script { message: String, span: Span },

    /// An `@name` selector that no `select` or enclosing `foreach`
    /// bound.
    #[error("unknown element reference '{name}' at {span}")]
    UnknownReference { name: String, span: Span },

    /// An `@name` chain that keeps dereferencing to more references.
    #[error("element reference chain too deep resolving '{name}' at {span}")]
    ReferenceChainTooDeep { name: String, span: Span },

    /// The browser session could not be initialised.
    #[error("browser launch failed: {0}")]
    Launch(#[source] BrowserError),

    /// A fatal driver failure at a navigation or history statement.
    #[error("browser error at {span}: {source}")]
    Browser {
        span: Span,
        #[source]
        source: BrowserError,
    },
}

impl RuntimeError {
    /// The statement position the error points at, when it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            RuntimeError::Script { span, .. }
            | RuntimeError::UnknownReference { span, .. }
            | RuntimeError::ReferenceChainTooDeep { span, .. }
            | RuntimeError::Browser { span, .. } => Some(*span),
            RuntimeError::Launch(_) => None,
        }
    }

    /// True for errors raised by the script's own `throw` statement.
    pub fn is_script_error(&self) -> bool {
        matches!(self, RuntimeError::Script { .. })
    }
}
