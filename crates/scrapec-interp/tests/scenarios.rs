//! End-to-end interpreter scenarios over the fixture browser.
//!
//! Each test drives a stub browser whose DOM is fixed in the scenario,
//! runs a small script through the full tokenize → parse → execute
//! pipeline, and asserts on the committed rows.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use scrapec_browser::{Browser, BrowserError, ElementHandle, FixtureBrowser};
use scrapec_interp::{FeedRow, Interpreter, RunReport, RuntimeError};
use scrapec_lex::Lexer;
use scrapec_par::{Parser, Program};
use serde_json::json;

fn parse(source: &str) -> Program {
    let tokens = Lexer::new(source).tokenize().expect("lexing failed");
    Parser::new(tokens).parse().expect("parsing failed")
}

async fn run(html: &str, source: &str) -> RunReport {
    let browser = FixtureBrowser::with_page(html);
    run_with(browser, source).await
}

async fn run_with(browser: FixtureBrowser, source: &str) -> RunReport {
    Interpreter::new(browser).execute(&parse(source)).await
}

fn rows_json(report: &RunReport) -> serde_json::Value {
    serde_json::to_value(&report.rows).expect("rows serialize")
}

#[tokio::test]
async fn scenario_single_extract() {
    let report = run(
        "<h1>Hi</h1>",
        "goto_url 'about:blank'\nextract 'title' 'h1'\nsave_row",
    )
    .await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"title": "Hi"}]));
}

#[tokio::test]
async fn scenario_fallback_selector() {
    let report = run(
        "<span class=\"name\">Ada</span>",
        "extract 'n' '.missing', '.name'\nsave_row",
    )
    .await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"n": "Ada"}]));
}

#[tokio::test]
async fn scenario_foreach_with_row_snapshot() {
    let source = "\
set_field 'src' 'L'
foreach 'li' as @row
    extract 'v' '@row a'
    save_row
end_foreach
";
    let report = run("<ul><li><a>X</a></li><li><a>Y</a></li></ul>", source).await;

    assert!(report.is_success());
    // 'src' persists across iterations because save_row restores the
    // pre-loop snapshot.
    assert_eq!(
        rows_json(&report),
        json!([
            {"src": "L", "v": "X"},
            {"src": "L", "v": "Y"}
        ])
    );
}

#[tokio::test]
async fn scenario_if_else_if_else() {
    let source = "\
if exists '#a'
    set_field 'k' 'a'
else_if exists '#b'
    set_field 'k' 'b'
else
    set_field 'k' 'n'
end_if
save_row
";
    let report = run("<div id=\"b\"></div>", source).await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"k": "b"}]));
}

#[tokio::test]
async fn scenario_logical_short_circuit() {
    let source = "\
if exists '#absent' and exists '#also-absent'
    throw 'bad'
end_if
set_field 'ok' '1'
save_row
";
    let (browser, queried) = CountingBrowser::over("<i></i>");
    let report = Interpreter::new(browser).execute(&parse(source)).await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"ok": "1"}]));

    // The right operand's selector was never consulted.
    let queried = queried.borrow();
    assert!(queried.iter().any(|css| css == "#absent"));
    assert!(!queried.iter().any(|css| css == "#also-absent"));
}

#[test]
fn scenario_syntax_error_aborts_before_execution() {
    let tokens = Lexer::new("extract 'a'").tokenize().expect("lexing is fine");
    let err = Parser::new(tokens).parse().expect_err("missing selector");
    assert_eq!(err.span().line, 1);
}

// ======================================================================
// LOOPS, CLEANUP, AND CONTROL FLOW
// ======================================================================

#[tokio::test]
async fn foreach_over_zero_elements_runs_body_zero_times() {
    let source = "\
set_field 'a' '1'
foreach '.none' as @x
    throw 'body must not run'
end_foreach
save_row
";
    let report = run("<p>empty</p>", source).await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"a": "1"}]));
}

#[tokio::test]
async fn foreach_binding_is_removed_after_exit() {
    let source = "\
foreach '.none' as @x
end_foreach
extract 'v' '@x'
save_row
";
    let report = run("<p>empty</p>", source).await;

    match report.error {
        Some(RuntimeError::UnknownReference { ref name, .. }) => assert_eq!(name, "@x"),
        other => panic!("expected unknown reference, got {other:?}"),
    }
    // Rows saved before the failure are still returned; here, none.
    assert!(report.rows.is_empty());
}

#[tokio::test]
async fn rows_saved_before_a_throw_are_returned() {
    let source = "\
set_field 'a' '1'
save_row
foreach 'li' as @row
    throw 'bang'
end_foreach
";
    let report = run("<ul><li>x</li></ul>", source).await;

    match report.error {
        Some(RuntimeError::Script { ref message, .. }) => assert_eq!(message, "bang"),
        other => panic!("expected script error, got {other:?}"),
    }
    assert_eq!(rows_json(&report), json!([{"a": "1"}]));
}

#[tokio::test]
async fn exit_unwinds_nested_loops_cleanly() {
    let source = "\
foreach 'li' as @row
    extract 'v' '@row a'
    save_row
    exit
end_foreach
throw 'unreachable'
";
    let report = run("<ul><li><a>X</a></li><li><a>Y</a></li></ul>", source).await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"v": "X"}]));
}

#[tokio::test]
async fn inner_loop_shadowing_restores_outer_binding() {
    let html = "<ul><li><span class='s'>S</span></li></ul><a>A</a>";
    let source = "\
foreach 'li' as @x
    foreach 'a' as @x
        extract 'inner' '@x'
    end_foreach
    extract 'outer' '@x .s'
    save_row
end_foreach
";
    let report = run(html, source).await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"inner": "A", "outer": "S"}]));
}

#[tokio::test]
async fn while_terminates_at_the_iteration_cap() {
    // The condition never turns false: the cap has to stop the loop.
    let source = "\
while exists 'i'
    set_field 'n' 'x'
end_while
set_field 'done' '1'
save_row
";
    let report = run("<i></i>", source).await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"done": "1"}]));
}

#[tokio::test]
async fn while_drives_pagination_by_clicking() {
    let browser = FixtureBrowser::new()
        .page(
            "page/1",
            "<h1>One</h1><a class='next' href='page/2'>next</a>",
        )
        .page("page/2", "<h1>Two</h1>")
        .start_at("page/1");
    let source = "\
while exists '.next'
    click '.next'
end_while
extract 'title' 'h1'
save_row
";
    let report = run_with(browser, source).await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"title": "Two"}]));
}

// ======================================================================
// SELECT AND REFERENCES
// ======================================================================

#[tokio::test]
async fn select_binds_first_working_selector() {
    let source = "\
select '.missing', '.name' as @el
extract 'n' '@el'
save_row
";
    let report = run("<span class='name'>Ada</span>", source).await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"n": "Ada"}]));
}

#[tokio::test]
async fn select_with_no_match_leaves_reference_unbound() {
    let source = "\
select '.missing' as @el
set_field 'ok' '1'
save_row
";
    let report = run("<p></p>", source).await;

    // select soft-fails; the run continues.
    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"ok": "1"}]));
}

#[tokio::test]
async fn chained_references_resolve_through_the_table() {
    let html = "<table class='data'><tr><td>a</td></tr><tr><td>b</td></tr></table>";
    let source = "\
select 'table.data' as @table
foreach '@table tr' as @row
    extract 'cell' '@row td'
    save_row
end_foreach
";
    let report = run(html, source).await;

    assert!(report.is_success());
    assert_eq!(
        rows_json(&report),
        json!([{"cell": "a"}, {"cell": "b"}])
    );
}

// ======================================================================
// EXTRACTION EDGE CASES
// ======================================================================

#[tokio::test]
async fn extract_trims_whitespace() {
    let report = run(
        "<h1>\n   Hi there   \n</h1>",
        "extract 'title' 'h1'\nsave_row",
    )
    .await;

    assert_eq!(rows_json(&report), json!([{"title": "Hi there"}]));
}

#[tokio::test]
async fn extract_list_of_zero_matches_is_empty_list() {
    let report = run("<p></p>", "extract_list 'tags' '.tag'\nsave_row").await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"tags": []}]));
}

#[tokio::test]
async fn extract_attribute_missing_stores_null_scalar() {
    let source = "\
extract_attribute 'title' 'data-title' 'a'
extract_attribute_list 'links' 'href' 'a'
save_row
";
    let report = run("<a href='/x'>1</a><a>2</a>", source).await;

    assert!(report.is_success());
    // Scalar: attribute absent on the first match stores null.
    // List: elements without the attribute are omitted.
    assert_eq!(
        rows_json(&report),
        json!([{"title": null, "links": ["/x"]}])
    );
}

#[tokio::test]
async fn timestamp_is_rfc3339() {
    let report = run("<p></p>", "timestamp 'at'\nsave_row").await;

    assert!(report.is_success());
    let value = report.rows[0]["at"].clone();
    let text = match value {
        scrapec_interp::Value::Text(text) => text,
        other => panic!("expected text, got {other:?}"),
    };
    chrono::DateTime::parse_from_rfc3339(&text).expect("timestamp parses");
}

#[tokio::test]
async fn saved_rows_are_independent_of_later_mutation() {
    let source = "\
set_field 'a' '1'
save_row
set_field 'a' '2'
save_row
";
    let report = run("<p></p>", source).await;

    assert_eq!(rows_json(&report), json!([{"a": "1"}, {"a": "2"}]));
}

#[tokio::test]
async fn clear_row_discards_pending_fields() {
    let source = "\
set_field 'a' '1'
clear_row
set_field 'b' '2'
save_row
";
    let report = run("<p></p>", source).await;

    assert_eq!(rows_json(&report), json!([{"b": "2"}]));
}

// ======================================================================
// NAVIGATION
// ======================================================================

#[tokio::test]
async fn goto_href_resolves_root_relative_links() {
    let browser = FixtureBrowser::new()
        .page(
            "http://shop.test/list",
            "<a class='item' href='/item/1'>first</a>",
        )
        .page("http://shop.test/item/1", "<h1>Item One</h1>")
        .start_at("http://shop.test/list");
    let source = "\
goto_href '.item'
extract 'title' 'h1'
save_row
";
    let report = run_with(browser, source).await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"title": "Item One"}]));
}

#[tokio::test]
async fn goto_href_without_match_is_a_soft_failure() {
    let source = "\
goto_href '.missing'
set_field 'ok' '1'
save_row
";
    let report = run("<p></p>", source).await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"ok": "1"}]));
}

#[tokio::test]
async fn history_back_returns_to_previous_page() {
    let browser = FixtureBrowser::new()
        .page("page/1", "<h1>One</h1>")
        .page("page/2", "<h1>Two</h1>");
    let source = "\
goto_url 'page/1'
goto_url 'page/2'
history_back
extract 'title' 'h1'
save_row
";
    let report = run_with(browser, source).await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"title": "One"}]));
}

#[tokio::test]
async fn click_on_missing_element_continues() {
    let source = "\
click '.not-there'
set_field 'ok' '1'
save_row
";
    let report = run("<p></p>", source).await;

    assert!(report.is_success());
    assert_eq!(rows_json(&report), json!([{"ok": "1"}]));
}

// ======================================================================
// DATA FEED
// ======================================================================

#[tokio::test]
async fn feed_variables_substitute_into_urls_and_fields() {
    let browser = FixtureBrowser::new()
        .page("profile/ada", "<h1>Ada Lovelace</h1>");
    let source = "\
data_schema
    'login' as $login
end_schema
goto_url 'profile/$login'
extract 'name' 'h1'
set_field 'greeting' 'hello $login'
save_row
";
    let feed = FeedRow::new([("$login".to_string(), "ada".to_string())]);
    let program = parse(source);
    let report = Interpreter::new(browser)
        .with_feed_row(feed)
        .execute(&program)
        .await;

    assert!(report.is_success());
    assert_eq!(
        rows_json(&report),
        json!([{"name": "Ada Lovelace", "greeting": "hello ada"}])
    );
}

#[tokio::test]
async fn is_empty_checks_the_substituted_value() {
    let source = "\
if is_empty $price
    set_field 'k' 'empty'
else
    set_field 'k' 'priced'
end_if
save_row
";
    let feed = FeedRow::new([("$price".to_string(), "  ".to_string())]);
    let program = parse(source);
    let report = Interpreter::new(FixtureBrowser::with_page("<p></p>"))
        .with_feed_row(feed)
        .execute(&program)
        .await;

    assert_eq!(rows_json(&report), json!([{"k": "empty"}]));
}

// ======================================================================
// TEST DOUBLES
// ======================================================================

/// A fixture browser that records every CSS string it is asked to
/// query, for asserting on short-circuit behaviour.
struct CountingBrowser {
    inner: FixtureBrowser,
    queried: Rc<RefCell<Vec<String>>>,
}

impl CountingBrowser {
    fn over(html: &str) -> (Self, Rc<RefCell<Vec<String>>>) {
        let queried = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                inner: FixtureBrowser::with_page(html),
                queried: Rc::clone(&queried),
            },
            queried,
        )
    }
}

#[async_trait(?Send)]
impl Browser for CountingBrowser {
    async fn launch(&mut self, headless: bool) -> Result<(), BrowserError> {
        self.inner.launch(headless).await
    }

    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.inner.goto(url).await
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        self.inner.current_url().await
    }

    async fn query(
        &mut self,
        scope: Option<ElementHandle>,
        css: &str,
    ) -> Result<Option<ElementHandle>, BrowserError> {
        self.queried.borrow_mut().push(css.to_string());
        self.inner.query(scope, css).await
    }

    async fn query_all(
        &mut self,
        scope: Option<ElementHandle>,
        css: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        self.queried.borrow_mut().push(css.to_string());
        self.inner.query_all(scope, css).await
    }

    async fn text(&mut self, element: ElementHandle) -> Result<String, BrowserError> {
        self.inner.text(element).await
    }

    async fn attribute(
        &mut self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        self.inner.attribute(element, name).await
    }

    async fn click(&mut self, element: ElementHandle) -> Result<bool, BrowserError> {
        self.inner.click(element).await
    }

    async fn go_back(&mut self) -> Result<(), BrowserError> {
        self.inner.go_back().await
    }

    async fn go_forward(&mut self) -> Result<(), BrowserError> {
        self.inner.go_forward().await
    }

    async fn cleanup(&mut self) -> Result<(), BrowserError> {
        self.inner.cleanup().await
    }
}
