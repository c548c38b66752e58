//! End-to-end CLI tests: invoke the built `orinc` binary and check its
//! exit code and surfaced diagnostics, mirroring the pipeline a real user
//! invocation runs through (§6 — `orinc <path>`, no flags).

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn orinc_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_orinc"))
}

#[test]
fn no_arguments_is_a_usage_error() {
    Command::new(orinc_bin())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("usage"));
}

#[test]
fn extra_arguments_are_rejected() {
    Command::new(orinc_bin())
        .arg("a.orin")
        .arg("b.orin")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("usage"));
}

#[test]
fn missing_source_file_reports_the_path() {
    Command::new(orinc_bin())
        .arg("/no/such/file.orin")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("/no/such/file.orin"));
}

#[test]
fn lex_error_is_reported_with_a_caret() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("bad.orin");
    std::fs::write(&input, "func()>main>() { int x = @; }").expect("write fixture");

    Command::new(orinc_bin())
        .arg(&input)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn hello_record_compiles_and_runs() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("hello.orin");
    std::fs::write(
        &input,
        r#"
func()>main>() {
    printf("hello, orin\n");
    return;
}
"#,
    )
    .expect("write fixture");

    Command::new(orinc_bin()).arg(&input).assert().success();

    let exe = dir.path().join("hello");
    assert!(exe.exists(), "compiled executable should exist");
    assert!(!input.with_extension("ll").exists(), ".ll is cleaned up on success");
    assert!(!input.with_extension("o").exists(), ".o is cleaned up on success");

    Command::new(&exe).assert().success().stdout(predicate::str::contains("hello, orin"));
}
