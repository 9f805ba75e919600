//! End-to-end tests for the `scrapec` binary.
//!
//! These stay off the network: the scripts either only build rows
//! locally (`set_field`/`save_row`) or fail before execution.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn scrapec() -> Command {
    Command::cargo_bin("scrapec").expect("binary builds")
}

fn script_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::with_suffix(".scrape").unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_check_accepts_valid_script() {
    let script = script_file("extract 'title' 'h1'\nsave_row\n");

    scrapec()
        .arg(script.path())
        .arg("--check")
        .assert()
        .success()
        .stdout(predicate::str::contains("syntax OK"));
}

#[test]
fn test_check_rejects_syntax_error_with_position() {
    // Missing selector list: cited at line 1.
    let script = script_file("extract 'a'");

    scrapec()
        .arg(script.path())
        .arg("--check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("syntax error").and(predicate::str::contains("1:")));
}

#[test]
fn test_two_statements_on_one_line_fail_check() {
    let script = script_file("save_row clear_row\n");

    scrapec()
        .arg(script.path())
        .arg("--check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("newline"));
}

#[test]
fn test_run_emits_rows_as_json() {
    let script = script_file("set_field 'greeting' 'hello'\nsave_row\n");

    scrapec()
        .arg(script.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"greeting\": \"hello\""));
}

#[test]
fn test_throw_exits_nonzero_but_keeps_rows() {
    let script = script_file("set_field 'a' '1'\nsave_row\nthrow 'boom'\n");

    scrapec()
        .arg(script.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"a\": \"1\""))
        .stderr(predicate::str::contains("boom"));
}

#[test]
fn test_missing_script_file() {
    scrapec()
        .arg("definitely-not-here.scrape")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("could not read script"));
}

#[test]
fn test_csv_output_file() {
    let script = script_file("set_field 'name' 'Ada'\nset_field 'city' 'London'\nsave_row\n");
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("rows.csv");

    scrapec()
        .arg(script.path())
        .arg("-o")
        .arg(&out)
        .assert()
        .success();

    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.starts_with("name,city"));
    assert!(written.contains("Ada,London"));
}

#[test]
fn test_data_feed_runs_once_per_record() {
    let script = script_file(
        "data_schema\n'name' as $name\nend_schema\nset_field 'greet' 'hi $name'\nsave_row\n",
    );

    let mut feed = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
    writeln!(feed, "name").unwrap();
    writeln!(feed, "Ada").unwrap();
    writeln!(feed, "Grace").unwrap();

    scrapec()
        .arg(script.path())
        .arg("--data")
        .arg(feed.path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("hi Ada").and(predicate::str::contains("hi Grace")),
        );
}

#[test]
fn test_data_feed_without_schema_fails() {
    let script = script_file("save_row\n");

    let mut feed = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
    writeln!(feed, "a").unwrap();
    writeln!(feed, "1").unwrap();

    scrapec()
        .arg(script.path())
        .arg("--data")
        .arg(feed.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("data_schema"));
}
