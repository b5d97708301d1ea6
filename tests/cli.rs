use assert_cmd::Command;
use predicates::prelude::*;

fn gopher_tui() -> Command {
    Command::cargo_bin("gopher-tui").expect("binary built")
}

#[test]
fn prints_version() {
    gopher_tui()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    gopher_tui()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("usage: gopher-tui [url]"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn unknown_flags_print_usage() {
    gopher_tui()
        .arg("-x")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("usage:"));
    gopher_tui()
        .arg("/?")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("usage:"));
}

#[test]
fn two_urls_are_rejected() {
    gopher_tui()
        .args(["gopher.floodgap.com", "sdf.org"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid parameters list."));
}

#[test]
fn unsupported_scheme_is_rejected() {
    gopher_tui()
        .arg("ftp://example.com/pub")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid URL!"));
}
