//! AST node definitions.
//!
//! The tree is fully owned: blocks own their statement lists, conditions
//! own their operands, and nothing points back up. Every node carries
//! the source position of its introducing token for diagnostics.

use scrapec_util::Span;

/// AST root - an ordered sequence of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Top-level statements in source order.
    pub statements: Vec<Stmt>,
}

/// A single statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// What the statement does.
    pub kind: StmtKind,

    /// Position of the statement's first token.
    pub span: Span,
}

/// Statement forms.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Navigate to a URL.
    ///
    /// Example: `goto_url 'https://example.com'`
    GotoUrl { url: String },

    /// Navigate to the `href` of the first matching element.
    ///
    /// Example: `goto_href '.next-page a'`
    GotoHref { selectors: Vec<String> },

    /// Extract the text of the first matching element into a column.
    ///
    /// Example: `extract 'title' 'h1', '.headline'`
    Extract { column: String, selectors: Vec<String> },

    /// Extract the texts of all matching elements into a column.
    ExtractList { column: String, selectors: Vec<String> },

    /// Extract an attribute of the first matching element.
    ///
    /// Example: `extract_attribute 'link' 'href' 'a.product'`
    ExtractAttribute {
        column: String,
        attribute: String,
        selectors: Vec<String>,
    },

    /// Extract an attribute from all matching elements.
    ExtractAttributeList {
        column: String,
        attribute: String,
        selectors: Vec<String>,
    },

    /// Commit the current row to the result set.
    SaveRow,

    /// Discard the current row.
    ClearRow,

    /// Set a column to a literal value.
    ///
    /// Example: `set_field 'source' 'catalogue'`
    SetField { column: String, value: String },

    /// Set a column to the current ISO-8601 timestamp.
    Timestamp { column: String },

    /// Click the first matching element. Soft-fails.
    Click { selectors: Vec<String> },

    /// Navigate back in browser history.
    HistoryBack,

    /// Navigate forward in browser history.
    HistoryForward,

    /// Emit a message to the log stream.
    Log { message: String },

    /// Abort the run with an error message.
    Throw { message: String },

    /// Stop the program cleanly.
    Exit,

    /// Conditional execution with optional `else_if` and `else` arms.
    If {
        condition: Cond,
        true_branch: Vec<Stmt>,
        else_if_branches: Vec<(Cond, Vec<Stmt>)>,
        false_branch: Vec<Stmt>,
    },

    /// Iterate over all elements matched by the first working selector.
    ///
    /// Example: `foreach '.result' as @row ... end_foreach`
    Foreach {
        selectors: Vec<String>,
        element_var: String,
        body: Vec<Stmt>,
    },

    /// Loop while a condition holds.
    While { condition: Cond, body: Vec<Stmt> },

    /// Bind an element reference without iterating.
    ///
    /// Example: `select '#sidebar', '.nav' as @menu`
    Select {
        selectors: Vec<String>,
        element_var: String,
    },

    /// Declarative data-feed schema block. Skipped at execution time;
    /// the driver reads it to wire `$variables` to feed columns.
    DataSchema { declarations: Vec<VariableDecl> },
}

/// One `"column" as $variable` line inside a `data_schema` block.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    /// Feed column name as it appears in the input file.
    pub column: String,

    /// The `$variable` the column binds to, `$` included.
    pub variable: String,

    /// Position of the declaration.
    pub span: Span,
}

/// A condition expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Cond {
    /// The condition's operator or atom.
    pub kind: CondKind,

    /// Position of the condition's first token.
    pub span: Span,
}

/// Condition forms.
#[derive(Debug, Clone, PartialEq)]
pub enum CondKind {
    /// True iff any selector matches at least one element.
    Exists { selectors: Vec<String> },

    /// True iff the (substituted) value trims to the empty string.
    IsEmpty { value: String },

    /// Short-circuit conjunction.
    And { left: Box<Cond>, right: Box<Cond> },

    /// Short-circuit disjunction.
    Or { left: Box<Cond>, right: Box<Cond> },

    /// Negation.
    Not { operand: Box<Cond> },
}

impl Program {
    /// Returns the schema declarations if the program carries a
    /// `data_schema` block, searching top-level statements only.
    pub fn data_schema(&self) -> Option<&[VariableDecl]> {
        self.statements.iter().find_map(|stmt| match &stmt.kind {
            StmtKind::DataSchema { declarations } => Some(declarations.as_slice()),
            _ => None,
        })
    }
}
