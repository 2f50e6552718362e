//! Focused CLI argument parsing tests.
//!
//! None of these replace the process image: each either stops at an
//! informational flag or fails before exec.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn trip() -> Command {
    let mut cmd = Command::cargo_bin("trip").unwrap();
    cmd.env_remove("____TRIP_CONFIGURATION")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

// ============================================================================
// Informational Flags
// ============================================================================

#[test]
fn version_flag_shows_version() {
    trip()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("trip"));
}

#[test]
fn version_command_shows_build_info() {
    trip()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Build info"));
}

#[test]
fn help_flag_shows_usage() {
    trip()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SPEC[,SPEC...]"));
}

#[test]
fn list_shows_registry() {
    trip()
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("open\n"))
        .stdout(predicate::str::contains("malloc\n"));
}

#[test]
fn errors_lists_plausible_codes() {
    trip()
        .args(["--errors", "malloc"])
        .assert()
        .success()
        .stdout("ENOMEM\n");
}

#[test]
fn errors_for_unknown_function_fails() {
    trip()
        .args(["-e", "frobnicate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown function"));
}

#[test]
fn scan_rejects_non_elf() {
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("script.sh");
    std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();

    trip()
        .arg("--scan")
        .arg(&script)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not an ELF file"));
}

#[test]
fn show_config_prints_defaults() {
    let temp = TempDir::new().unwrap();
    trip()
        .current_dir(temp.path())
        .arg("--show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("default_chance = 1.0"));
}

// ============================================================================
// Usage Errors
// ============================================================================

#[test]
fn no_arguments_fails() {
    trip()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no fault rules"));
}

#[test]
fn rule_without_command_fails() {
    trip()
        .arg("open")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no command"));
}

#[test]
fn unknown_function_fails() {
    trip()
        .args(["nosuchfn", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown function \"nosuchfn\""));
}

#[test]
fn chance_above_one_fails() {
    trip()
        .args(["open:1.5", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("greater than 1"));
}

#[test]
fn implausible_error_fails() {
    trip()
        .args(["open:0.5:EDOM", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("open is not expected to return EDOM"));
}

#[test]
fn unknown_flag_exits_one() {
    trip().arg("--frobnicate").assert().code(1);
}

#[test]
fn missing_preload_object_fails() {
    let temp = TempDir::new().unwrap();
    trip()
        .env("TRIP_PRELOAD__LIBRARY", temp.path().join("absent.so"))
        .args(["open", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("interposition object not found"));
}

#[test]
fn separator_after_command_belongs_to_the_command() {
    let temp = TempDir::new().unwrap();
    // Parsing gets as far as locating the preload object, so `grep` was
    // taken as the command rather than as a rule.
    trip()
        .env("TRIP_PRELOAD__LIBRARY", temp.path().join("absent.so"))
        .args(["socket:1", "grep", "--", "hi", "/tmp/f"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("interposition object not found"))
        .stderr(predicate::str::contains("unknown function").not());
}

#[test]
fn refuses_to_nest() {
    Command::cargo_bin("trip")
        .unwrap()
        .env("____TRIP_CONFIGURATION", "")
        .args(["open", "true"])
        .assert()
        .code(1)
        .stderr("Don't trip me\n");
}
