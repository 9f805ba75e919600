//! scrapec-interp - Tree-walking interpreter for ScrapeScript.
//!
//! Walks the AST from `scrapec-par` and drives a [`Browser`] capability
//! to produce a sequence of data rows:
//!
//! ```text
//! Program + Browser
//!        │
//!        ▼
//!  [Interpreter] ──▶ RunReport { rows, error }
//! ```
//!
//! EXECUTION MODEL:
//! ----------------
//! Single-threaded and cooperative. Every browser-touching operation is
//! an await point; the lexer, parser, and pure AST traversal never
//! suspend. There is exactly one logical cursor through the AST, so
//! statements execute in source order and their side effects on the
//! page are observed in that order.
//!
//! The run loop is a four-state machine:
//!
//! ```text
//! idle ──launch──▶ launched ──body──▶ executing ──exit/end/error──▶ terminating
//! ```
//!
//! `terminating` always calls `Browser::cleanup` exactly once, on every
//! exit path: normal completion, `exit`, `throw`, or a fatal driver
//! failure. A failed run still reports the rows committed before the
//! failure.
//!
//! ROW STATE:
//! ----------
//! The interpreter holds one current row and a list of committed rows.
//! Entering any loop pushes a snapshot of the current row; `save_row`
//! inside the loop commits a deep copy and then restores the snapshot,
//! so fields set before the loop persist across iterations while
//! per-iteration fields do not. Loop exit pops the snapshot again -
//! also when the loop is left through `exit` or an error.
//!
//! ELEMENT REFERENCES:
//! -------------------
//! `select` and `foreach` bind `@name` to the raw selector string that
//! matched. Later selectors dereference those bindings by name (see
//! [`Selector`]); a `foreach` variable additionally pins its loop's
//! current index. Bindings are scoped to the loop: on exit the previous
//! binding for the name is restored, or the name is removed entirely.

mod error;
mod feed;
mod selector;
mod value;

pub use error::RuntimeError;
pub use feed::FeedRow;
pub use selector::Selector;
pub use value::{Row, Value};

use chrono::{SecondsFormat, Utc};
use futures::future::LocalBoxFuture;
use rustc_hash::FxHashMap;
use scrapec_browser::{Browser, BrowserError, ElementHandle};
use scrapec_par::ast::{Cond, CondKind, Program, Stmt, StmtKind};
use scrapec_util::Span;
use tracing::{debug, info, warn};
use url::Url;

/// Hard safety cap on `while` loops. Once a loop has run this many
/// iterations it terminates as if its condition had become false, with
/// a warning.
pub const MAX_WHILE_ITERATIONS: usize = 1000;

/// The interpreter's run-loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Launched,
    Executing,
    Terminating,
}

/// How a statement or block finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Keep going with the next statement.
    Continue,

    /// An `exit` statement: unwind out of all loops and stop cleanly.
    Exit,
}

/// The outcome of a run.
///
/// Rows are always present - a failed run returns everything committed
/// before the failure.
#[derive(Debug)]
pub struct RunReport {
    /// Committed rows, in `save_row` order.
    pub rows: Vec<Row>,

    /// The fatal error that ended the run, if it did not end cleanly.
    pub error: Option<RuntimeError>,
}

impl RunReport {
    /// True when the run completed without a fatal error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Tree-walking interpreter over a [`Browser`] capability.
///
/// Owns the browser session exclusively for its lifetime. Construct,
/// optionally configure, then [`execute`](Self::execute) once.
///
/// # Example
///
/// ```
/// use scrapec_browser::FixtureBrowser;
/// use scrapec_interp::Interpreter;
/// use scrapec_lex::Lexer;
/// use scrapec_par::Parser;
///
/// # async fn demo() {
/// let tokens = Lexer::new("extract 'title' 'h1'\nsave_row").tokenize().unwrap();
/// let program = Parser::new(tokens).parse().unwrap();
///
/// let browser = FixtureBrowser::with_page("<h1>Hi</h1>");
/// let report = Interpreter::new(browser).execute(&program).await;
/// assert!(report.is_success());
/// assert_eq!(report.rows.len(), 1);
/// # }
/// ```
pub struct Interpreter<B: Browser> {
    browser: B,
    headless: bool,

    /// The row currently being built.
    current_row: Row,

    /// Committed rows, in save order.
    rows: Vec<Row>,

    /// `@name` → the raw selector string it captured.
    references: FxHashMap<String, String>,

    /// Current iteration index of every live `foreach` variable.
    foreach_indexes: FxHashMap<String, usize>,

    /// Row snapshots, one per currently-executing loop.
    row_state_stack: Vec<Row>,

    /// Active data-feed record for `$variable` substitution.
    feed_row: Option<FeedRow>,

    state: RunState,
}

impl<B: Browser> Interpreter<B> {
    /// Creates an interpreter owning the given browser session.
    pub fn new(browser: B) -> Self {
        Self {
            browser,
            headless: true,
            current_row: Row::new(),
            rows: Vec::new(),
            references: FxHashMap::default(),
            foreach_indexes: FxHashMap::default(),
            row_state_stack: Vec::new(),
            feed_row: None,
            state: RunState::Idle,
        }
    }

    /// Whether the browser should run headless (drivers may ignore it).
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Binds a data-feed record for `$variable` substitution.
    pub fn with_feed_row(mut self, feed_row: FeedRow) -> Self {
        self.feed_row = Some(feed_row);
        self
    }

    /// Runs the program to completion and returns the collected rows.
    ///
    /// Browser resources are released on every exit path before this
    /// returns.
    pub async fn execute(mut self, program: &Program) -> RunReport {
        self.state = RunState::Launched;
        debug!(state = ?self.state, "launching browser");

        if let Err(e) = self.browser.launch(self.headless).await {
            self.state = RunState::Terminating;
            if let Err(cleanup_err) = self.browser.cleanup().await {
                warn!(error = %cleanup_err, "cleanup after failed launch");
            }
            return RunReport {
                rows: self.rows,
                error: Some(RuntimeError::Launch(e)),
            };
        }

        self.state = RunState::Executing;
        debug!(state = ?self.state, statements = program.statements.len(), "run started");

        let outcome = self.run_block(&program.statements).await;

        self.state = RunState::Terminating;
        debug!(state = ?self.state, rows = self.rows.len(), "run finished");
        if let Err(e) = self.browser.cleanup().await {
            warn!(error = %e, "browser cleanup failed");
        }

        RunReport {
            rows: self.rows,
            error: outcome.err(),
        }
    }

    // ======================================================================
    // STATEMENT EXECUTION
    // ======================================================================

    /// Runs a statement list in order, stopping at `exit` or an error.
    fn run_block<'a>(
        &'a mut self,
        stmts: &'a [Stmt],
    ) -> LocalBoxFuture<'a, Result<Flow, RuntimeError>> {
        Box::pin(async move {
            for stmt in stmts {
                match self.exec_stmt(stmt).await? {
                    Flow::Continue => {},
                    Flow::Exit => return Ok(Flow::Exit),
                }
            }
            Ok(Flow::Continue)
        })
    }

    /// Executes a single statement.
    async fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        let span = stmt.span;

        match &stmt.kind {
            StmtKind::GotoUrl { url } => self.exec_goto_url(url, span).await?,
            StmtKind::GotoHref { selectors } => self.exec_goto_href(selectors, span).await?,
            StmtKind::Extract { column, selectors } => {
                self.exec_extract(column, selectors, span).await?
            },
            StmtKind::ExtractList { column, selectors } => {
                self.exec_extract_list(column, selectors, span).await?
            },
            StmtKind::ExtractAttribute {
                column,
                attribute,
                selectors,
            } => {
                self.exec_extract_attribute(column, attribute, selectors, span)
                    .await?
            },
            StmtKind::ExtractAttributeList {
                column,
                attribute,
                selectors,
            } => {
                self.exec_extract_attribute_list(column, attribute, selectors, span)
                    .await?
            },
            StmtKind::SaveRow => self.exec_save_row(),
            StmtKind::ClearRow => {
                self.current_row.clear();
                debug!("cleared current row");
            },
            StmtKind::SetField { column, value } => {
                let value = feed::substitute(value, self.feed_row.as_ref());
                debug!(column = column.as_str(), value = value.as_str(), "set field");
                self.current_row.insert(column.clone(), Value::Text(value));
            },
            StmtKind::Timestamp { column } => {
                let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
                debug!(column = column.as_str(), timestamp = now.as_str(), "set timestamp");
                self.current_row.insert(column.clone(), Value::Text(now));
            },
            StmtKind::Click { selectors } => self.exec_click(selectors, span).await?,
            StmtKind::HistoryBack => {
                self.browser
                    .go_back()
                    .await
                    .map_err(|source| RuntimeError::Browser { span, source })?;
                info!("navigated back in history");
            },
            StmtKind::HistoryForward => {
                self.browser
                    .go_forward()
                    .await
                    .map_err(|source| RuntimeError::Browser { span, source })?;
                info!("navigated forward in history");
            },
            StmtKind::Log { message } => {
                info!(target: "script", "{message}");
            },
            StmtKind::Throw { message } => {
                return Err(RuntimeError::Script {
                    message: message.clone(),
                    span,
                });
            },
            StmtKind::Exit => {
                info!("exit: stopping execution");
                return Ok(Flow::Exit);
            },
            StmtKind::If {
                condition,
                true_branch,
                else_if_branches,
                false_branch,
            } => {
                return self
                    .exec_if(condition, true_branch, else_if_branches, false_branch)
                    .await;
            },
            StmtKind::Foreach {
                selectors,
                element_var,
                body,
            } => return self.exec_foreach(selectors, element_var, body, span).await,
            StmtKind::While { condition, body } => {
                return self.exec_while(condition, body, span).await;
            },
            StmtKind::Select {
                selectors,
                element_var,
            } => self.exec_select(selectors, element_var, span).await?,
            StmtKind::DataSchema { .. } => {
                // Declarative only; the driver reads it to wire the feed.
                debug!("skipping data_schema block");
            },
        }

        Ok(Flow::Continue)
    }

    async fn exec_goto_url(&mut self, url: &str, span: Span) -> Result<(), RuntimeError> {
        let url = feed::substitute(url, self.feed_row.as_ref());
        self.browser
            .goto(&url)
            .await
            .map_err(|source| RuntimeError::Browser { span, source })?;
        info!(url = url.as_str(), "navigated");
        Ok(())
    }

    async fn exec_goto_href(
        &mut self,
        selectors: &[String],
        span: Span,
    ) -> Result<(), RuntimeError> {
        let Some((_, elements)) = self.first_working(selectors, span).await? else {
            warn!(%span, "goto_href: no selector matched, staying on page");
            return Ok(());
        };

        let href = match self.browser.attribute(elements[0], "href").await {
            Ok(Some(href)) => href,
            Ok(None) => {
                warn!(%span, "goto_href: element has no href, staying on page");
                return Ok(());
            },
            Err(e) => {
                warn!(%span, error = %e, "goto_href: reading href failed, staying on page");
                return Ok(());
            },
        };

        let target = if href.starts_with('/') {
            self.absolute_from_root(&href).await
        } else {
            href
        };

        self.browser
            .goto(&target)
            .await
            .map_err(|source| RuntimeError::Browser { span, source })?;
        info!(url = target.as_str(), "navigated via href");
        Ok(())
    }

    /// Prefixes a root-relative href with the current page's scheme and
    /// host. Falls back to the bare href when there is no parseable
    /// current URL to resolve against.
    async fn absolute_from_root(&mut self, href: &str) -> String {
        match self.browser.current_url().await {
            Ok(current) => match Url::parse(&current) {
                Ok(base) => format!("{}{}", base.origin().ascii_serialization(), href),
                Err(_) => href.to_string(),
            },
            Err(_) => href.to_string(),
        }
    }

    async fn exec_extract(
        &mut self,
        column: &str,
        selectors: &[String],
        span: Span,
    ) -> Result<(), RuntimeError> {
        let value = match self.first_working(selectors, span).await? {
            Some((which, elements)) => match self.browser.text(elements[0]).await {
                Ok(text) => {
                    debug!(
                        column,
                        selector = selectors[which].as_str(),
                        "extracted text"
                    );
                    Value::Text(text.trim().to_string())
                },
                Err(e) => {
                    warn!(column, error = %e, "text read failed, storing null");
                    Value::Null
                },
            },
            None => {
                warn!(column, %span, "no selector matched, storing null");
                Value::Null
            },
        };

        self.current_row.insert(column.to_string(), value);
        Ok(())
    }

    async fn exec_extract_list(
        &mut self,
        column: &str,
        selectors: &[String],
        span: Span,
    ) -> Result<(), RuntimeError> {
        let value = match self.first_working(selectors, span).await? {
            Some((which, elements)) => {
                let mut texts = Vec::with_capacity(elements.len());
                for element in &elements {
                    match self.browser.text(*element).await {
                        Ok(text) => texts.push(text.trim().to_string()),
                        Err(e) => warn!(column, error = %e, "text read failed, skipping element"),
                    }
                }
                debug!(
                    column,
                    selector = selectors[which].as_str(),
                    count = texts.len(),
                    "extracted list"
                );
                Value::List(texts)
            },
            None => {
                warn!(column, %span, "no selector matched, storing empty list");
                Value::List(Vec::new())
            },
        };

        self.current_row.insert(column.to_string(), value);
        Ok(())
    }

    async fn exec_extract_attribute(
        &mut self,
        column: &str,
        attribute: &str,
        selectors: &[String],
        span: Span,
    ) -> Result<(), RuntimeError> {
        let value = match self.first_working(selectors, span).await? {
            Some((_, elements)) => match self.browser.attribute(elements[0], attribute).await {
                Ok(found) => {
                    debug!(column, attribute, present = found.is_some(), "extracted attribute");
                    Value::from(found)
                },
                Err(e) => {
                    warn!(column, attribute, error = %e, "attribute read failed, storing null");
                    Value::Null
                },
            },
            None => {
                warn!(column, %span, "no selector matched, storing null");
                Value::Null
            },
        };

        self.current_row.insert(column.to_string(), value);
        Ok(())
    }

    async fn exec_extract_attribute_list(
        &mut self,
        column: &str,
        attribute: &str,
        selectors: &[String],
        span: Span,
    ) -> Result<(), RuntimeError> {
        let value = match self.first_working(selectors, span).await? {
            Some((_, elements)) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in &elements {
                    match self.browser.attribute(*element, attribute).await {
                        // Elements without the attribute are omitted.
                        Ok(Some(text)) => values.push(text.trim().to_string()),
                        Ok(None) => {},
                        Err(e) => {
                            warn!(column, attribute, error = %e, "attribute read failed, skipping")
                        },
                    }
                }
                debug!(column, attribute, count = values.len(), "extracted attribute list");
                Value::List(values)
            },
            None => {
                warn!(column, %span, "no selector matched, storing empty list");
                Value::List(Vec::new())
            },
        };

        self.current_row.insert(column.to_string(), value);
        Ok(())
    }

    fn exec_save_row(&mut self) {
        debug!(
            columns = self.current_row.len(),
            total = self.rows.len() + 1,
            "saved row"
        );
        self.rows.push(self.current_row.clone());

        // Inside a loop the row resets to the pre-loop snapshot, so
        // fields set before the loop persist across iterations.
        self.current_row = match self.row_state_stack.last() {
            Some(snapshot) => snapshot.clone(),
            None => Row::new(),
        };
    }

    async fn exec_click(&mut self, selectors: &[String], span: Span) -> Result<(), RuntimeError> {
        match self.first_working(selectors, span).await? {
            Some((which, elements)) => match self.browser.click(elements[0]).await {
                Ok(true) => {
                    debug!(selector = selectors[which].as_str(), "clicked");
                },
                Ok(false) => {
                    warn!(%span, selector = selectors[which].as_str(), "click failed, continuing");
                },
                Err(e) => {
                    warn!(%span, error = %e, "click failed, continuing");
                },
            },
            None => {
                warn!(%span, "click: no selector matched, continuing");
            },
        }
        Ok(())
    }

    async fn exec_select(
        &mut self,
        selectors: &[String],
        element_var: &str,
        span: Span,
    ) -> Result<(), RuntimeError> {
        for raw in selectors {
            let substituted = feed::substitute(raw, self.feed_row.as_ref());
            let plan = Selector::build(
                &substituted,
                &self.references,
                &self.foreach_indexes,
                span,
            )?;

            match self.resolve_element(&plan).await {
                Ok(Some(_)) => {
                    debug!(var = element_var, selector = raw.as_str(), "reference bound");
                    // The original raw string is stored, not the
                    // substituted one, so later uses re-substitute
                    // against the then-current feed row.
                    self.references
                        .insert(element_var.to_string(), raw.clone());
                    return Ok(());
                },
                Ok(None) => {},
                Err(e) => {
                    warn!(selector = raw.as_str(), error = %e, "selector failed, trying next")
                },
            }
        }

        warn!(var = element_var, %span, "select: no selector matched, reference not bound");
        Ok(())
    }

    async fn exec_if(
        &mut self,
        condition: &Cond,
        true_branch: &[Stmt],
        else_if_branches: &[(Cond, Vec<Stmt>)],
        false_branch: &[Stmt],
    ) -> Result<Flow, RuntimeError> {
        if self.eval_cond(condition).await? {
            return self.run_block(true_branch).await;
        }

        for (else_if_condition, branch) in else_if_branches {
            if self.eval_cond(else_if_condition).await? {
                return self.run_block(branch).await;
            }
        }

        self.run_block(false_branch).await
    }

    async fn exec_foreach(
        &mut self,
        selectors: &[String],
        element_var: &str,
        body: &[Stmt],
        span: Span,
    ) -> Result<Flow, RuntimeError> {
        let (working_raw, elements) = match self.first_working(selectors, span).await? {
            Some((which, elements)) => (selectors[which].clone(), elements),
            None => {
                debug!(%span, "foreach: no selector matched, zero iterations");
                (selectors[0].clone(), Vec::new())
            },
        };

        info!(
            var = element_var,
            selector = working_raw.as_str(),
            count = elements.len(),
            "foreach"
        );

        // Bind the loop variable, shadowing any outer binding, and
        // snapshot the row state. Both are undone on every exit.
        let previous_reference = self
            .references
            .insert(element_var.to_string(), working_raw);
        let previous_index = self.foreach_indexes.get(element_var).copied();
        self.row_state_stack.push(self.current_row.clone());

        let mut flow = Ok(Flow::Continue);
        for index in 0..elements.len() {
            self.foreach_indexes.insert(element_var.to_string(), index);
            match self.run_block(body).await {
                Ok(Flow::Continue) => {},
                other => {
                    flow = other;
                    break;
                },
            }
        }

        self.row_state_stack.pop();
        match previous_reference {
            Some(prev) => {
                self.references.insert(element_var.to_string(), prev);
            },
            None => {
                self.references.remove(element_var);
            },
        }
        match previous_index {
            Some(prev) => {
                self.foreach_indexes.insert(element_var.to_string(), prev);
            },
            None => {
                self.foreach_indexes.remove(element_var);
            },
        }

        flow
    }

    async fn exec_while(
        &mut self,
        condition: &Cond,
        body: &[Stmt],
        span: Span,
    ) -> Result<Flow, RuntimeError> {
        self.row_state_stack.push(self.current_row.clone());

        let mut iterations = 0usize;
        let mut flow = Ok(Flow::Continue);

        loop {
            if iterations >= MAX_WHILE_ITERATIONS {
                warn!(
                    %span,
                    limit = MAX_WHILE_ITERATIONS,
                    "while loop reached the iteration cap, stopping"
                );
                break;
            }

            match self.eval_cond(condition).await {
                Ok(true) => {},
                Ok(false) => break,
                Err(e) => {
                    flow = Err(e);
                    break;
                },
            }

            iterations += 1;
            match self.run_block(body).await {
                Ok(Flow::Continue) => {},
                other => {
                    flow = other;
                    break;
                },
            }
        }

        self.row_state_stack.pop();
        flow
    }

    // ======================================================================
    // CONDITIONS
    // ======================================================================

    /// Evaluates a condition. `and`/`or` short-circuit left to right:
    /// the right operand's selectors are never queried when the left
    /// operand already determines the result.
    fn eval_cond<'a>(
        &'a mut self,
        cond: &'a Cond,
    ) -> LocalBoxFuture<'a, Result<bool, RuntimeError>> {
        Box::pin(async move {
            match &cond.kind {
                CondKind::Exists { selectors } => {
                    let exists = self.first_working(selectors, cond.span).await?.is_some();
                    debug!(%exists, "exists condition");
                    Ok(exists)
                },
                CondKind::IsEmpty { value } => {
                    let substituted = feed::substitute(value, self.feed_row.as_ref());
                    Ok(substituted.trim().is_empty())
                },
                CondKind::And { left, right } => {
                    if !self.eval_cond(left).await? {
                        return Ok(false);
                    }
                    self.eval_cond(right).await
                },
                CondKind::Or { left, right } => {
                    if self.eval_cond(left).await? {
                        return Ok(true);
                    }
                    self.eval_cond(right).await
                },
                CondKind::Not { operand } => Ok(!self.eval_cond(operand).await?),
            }
        })
    }

    // ======================================================================
    // SELECTOR RESOLUTION
    // ======================================================================

    /// Tries each selector in order and returns the matches of the
    /// first one that yields at least one element, together with its
    /// position in the list. Later selectors are not consulted.
    ///
    /// Driver failures on an individual selector (an invalid CSS
    /// fragment, say) are logged and the next selector is tried; an
    /// unknown `@reference` is fatal.
    async fn first_working(
        &mut self,
        selectors: &[String],
        span: Span,
    ) -> Result<Option<(usize, Vec<ElementHandle>)>, RuntimeError> {
        for (which, raw) in selectors.iter().enumerate() {
            let substituted = feed::substitute(raw, self.feed_row.as_ref());
            let plan = Selector::build(
                &substituted,
                &self.references,
                &self.foreach_indexes,
                span,
            )?;

            match self.resolve_elements(&plan).await {
                Ok(elements) if !elements.is_empty() => return Ok(Some((which, elements))),
                Ok(_) => {},
                Err(e) => {
                    warn!(selector = raw.as_str(), error = %e, "selector failed, trying next")
                },
            }
        }

        Ok(None)
    }

    /// Resolves a plan to its first matching element.
    fn resolve_element<'a>(
        &'a mut self,
        plan: &'a Selector,
    ) -> LocalBoxFuture<'a, Result<Option<ElementHandle>, BrowserError>> {
        Box::pin(async move {
            let scope = match &plan.parent {
                Some(parent) => match self.resolve_element(parent).await? {
                    Some(element) => Some(element),
                    None => return Ok(None),
                },
                None => None,
            };

            match &plan.css {
                // A bare reference: the plan denotes the scope itself.
                None => Ok(scope),
                Some(css) => {
                    if let Some(index) = plan.index {
                        let all = self.browser.query_all(scope, css).await?;
                        Ok(all.into_iter().nth(index))
                    } else {
                        self.browser.query(scope, css).await
                    }
                },
            }
        })
    }

    /// Resolves a plan to all matching elements. An indexed plan still
    /// narrows to the single element at that position.
    async fn resolve_elements(
        &mut self,
        plan: &Selector,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let scope = match &plan.parent {
            Some(parent) => match self.resolve_element(parent).await? {
                Some(element) => Some(element),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        match &plan.css {
            None => Ok(scope.into_iter().collect()),
            Some(css) => {
                let all = self.browser.query_all(scope, css).await?;
                match plan.index {
                    Some(index) => Ok(all.into_iter().nth(index).into_iter().collect()),
                    None => Ok(all),
                }
            },
        }
    }
}
