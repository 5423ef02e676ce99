//! CLI tests

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use predicates::prelude::*;

fn imagemill() -> Command {
    cargo_bin_cmd!("imagemill")
}

#[test]
fn help_displays() {
    imagemill()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("image-transformation proxy"));
}

#[test]
fn version_displays() {
    imagemill()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("imagemill"));
}

#[test]
fn config_path_displays() {
    imagemill()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn config_show_displays_defaults() {
    imagemill()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[server]"));
}

#[test]
fn transform_rejects_unknown_operation() {
    imagemill()
        .args(["transform", "http://example.com/a.jpg", "-o", "sharpen"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown operation"));
}

#[test]
fn transform_rejects_unknown_gravity() {
    imagemill()
        .args([
            "transform",
            "http://example.com/a.jpg",
            "-o",
            "crop",
            "-w",
            "50",
            "-g",
            "middle",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown gravity"));
}

#[test]
fn completions_generate() {
    imagemill()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("imagemill"));
}
