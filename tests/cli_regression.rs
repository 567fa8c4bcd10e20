// CLI regression tests: output shape and miette error reports.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};
use tempfile::TempDir;

fn script(dir: &TempDir, name: &str, text: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path
}

fn sable() -> Command {
    Command::cargo_bin("sable").unwrap()
}

#[test]
fn compile_prints_the_expanded_module() {
    let dir = tempfile::tempdir().unwrap();
    let file = script(&dir, "m.sbl", "(module m '#%builtin-kernel (define x 1))");
    sable().arg("compile").arg(&file).assert().success().stdout(contains(
        "(module m (quote #%builtin-kernel) (#%plain-module-begin (define x (quote 1))))",
    ));
}

#[test]
fn run_prints_expression_values() {
    let dir = tempfile::tempdir().unwrap();
    let file = script(&dir, "m.sbl", "(module m '#%builtin-base-lang (* 6 7) (if #f 1 'two))");
    sable()
        .arg("run")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("42").and(contains("two")));
}

#[test]
fn read_prints_each_datum() {
    let dir = tempfile::tempdir().unwrap();
    let file = script(&dir, "data.sbl", "'a (b . (c)) #true");
    sable()
        .arg("read")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("(quote a)\n(b c)\n#t"));
}

#[test]
fn expand_json_emits_tagged_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let file = script(&dir, "m.sbl", "(module m '#%builtin-kernel (define x 1))");
    sable()
        .args(["expand", "--json"])
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("\"kind\": \"define\"").and(contains("\"kind\": \"quote\"")));
}

#[test]
fn trace_lists_each_step() {
    let dir = tempfile::tempdir().unwrap();
    let file = script(&dir, "m.sbl", "(module m '#%builtin-kernel (define x 1) x)");
    sable()
        .arg("trace")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("Step 0: #%module-begin").and(contains("#%datum")));
}

#[test]
fn compile_errors_are_miette_reports() {
    let dir = tempfile::tempdir().unwrap();
    let file = script(&dir, "bad.sbl", "(module m '#%builtin-empty x)");
    sable()
        .arg("compile")
        .arg(&file)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("x: unbound identifier").and(contains("sable::compile::unbound_variable")));
}

#[test]
fn read_errors_point_into_the_source() {
    let dir = tempfile::tempdir().unwrap();
    let file = script(&dir, "bad.sbl", "(module m '#%builtin-kernel (define x 42)");
    sable()
        .arg("run")
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains("sable::read").and(contains("missing closing parenthesis")));
}

#[test]
fn config_file_sets_the_expansion_limit() {
    let dir = tempfile::tempdir().unwrap();
    let config = script(&dir, "sable.yaml", "expansion_limit: 7\n");
    let file = script(
        &dir,
        "loop.sbl",
        "(module loop '#%builtin-kernel (define-syntax m (lambda (stx) (quote (m)))) (m))",
    );
    sable()
        .arg("--config")
        .arg(&config)
        .arg("compile")
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains("macro expansion exceeded 7 steps"));
}

#[test]
fn bad_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = script(&dir, "sable.yaml", "expansion_limits: 7\n");
    let file = script(&dir, "m.sbl", "(module m '#%builtin-empty)");
    sable()
        .arg("compile")
        .arg(&file)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("sable::config"));
}

#[test]
fn missing_file_is_an_io_error() {
    sable()
        .arg("compile")
        .arg("definitely-missing.sbl")
        .assert()
        .failure()
        .stderr(contains("sable::io::io"));
}
