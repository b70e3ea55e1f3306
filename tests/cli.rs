//! Startup-failure paths. All of these fail before the terminal is
//! touched, so they run headless; the interactive session itself needs a
//! real TTY and is exercised by hand.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn two_positional_arguments_are_rejected() {
    Command::cargo_bin("twig")
        .expect("binary built")
        .args(["one.json", "two.json"])
        .assert()
        .failure();
}

#[test]
fn missing_file_reports_the_path() {
    Command::cargo_bin("twig")
        .expect("binary built")
        .arg("/no/such/file.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not open /no/such/file.json"));
}

#[test]
fn malformed_stdin_is_a_parse_error() {
    Command::cargo_bin("twig")
        .expect("binary built")
        .write_stdin("{not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse input as JSON"));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(b"[1, 2,").expect("write fixture");
    Command::cargo_bin("twig")
        .expect("binary built")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse input as JSON"));
}

#[test]
fn help_names_the_file_argument() {
    Command::cargo_bin("twig")
        .expect("binary built")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("FILE"));
}
