//! End-to-end tests that run the compiled `teamsync` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SNAPSHOT: &str = r#"
mode = "three-way"

[[resource]]
path = "src/main.c"
local = "1.4"
base = "1.4"
remote = "1.5"

[[resource]]
path = "src/util/str.c"
local = "1.2*"
base = "1.2"
remote = "1.2"

[[resource]]
path = "src/old/legacy.c"
local = "1.1"
base = "1.1"
remote = "1.2"

[[resource]]
path = "README"
local = "1.1"
base = "1.1"
remote = "1.1"
"#;

const TRANSCRIPT: &str = "\
E cvs server: Updating src
M U src/main.c
E cvs server: skipping directory src/old
ok
";

fn teamsync() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("teamsync"))
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_help_lists_commands() {
    teamsync()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("parse"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_parse_prints_notifications_and_events() {
    let dir = TempDir::new().unwrap();
    let transcript = write(dir.path(), "update.log", TRANSCRIPT);

    teamsync()
        .args(["parse", &transcript])
        .assert()
        .success()
        .stdout(predicate::str::contains("directory src"))
        .stdout(predicate::str::contains("removed src/old (Infinite)"))
        .stdout(predicate::str::contains("3 notifications"));
}

#[test]
fn test_parse_json_under_root() {
    let dir = TempDir::new().unwrap();
    let transcript = write(dir.path(), "update.log", TRANSCRIPT);

    let output = teamsync()
        .args(["parse", &transcript, "--root", "ws", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let lines = parsed.as_array().unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["notification"]["kind"], "directory-exists");
    assert_eq!(lines[0]["notification"]["path"], "ws/src");
    assert_eq!(lines[2]["event"]["kind"], "removed");
}

#[test]
fn test_parse_other_program_prefix() {
    let dir = TempDir::new().unwrap();
    let transcript = write(dir.path(), "update.log", "E svn server: Updating lib\nok\n");

    teamsync()
        .args(["parse", &transcript, "--program", "svn"])
        .assert()
        .success()
        .stdout(predicate::str::contains("directory lib"));
}

#[test]
fn test_status_prints_tree_with_counts() {
    let dir = TempDir::new().unwrap();
    let snapshot = write(dir.path(), "snapshot.toml", SNAPSHOT);

    teamsync()
        .args(["status", &snapshot])
        .assert()
        .success()
        .stdout(predicate::str::contains("Out of sync"))
        .stdout(predicate::str::contains("(3)"))
        .stdout(predicate::str::contains("src/"))
        .stdout(predicate::str::contains("main.c"))
        .stdout(predicate::str::contains("README").not());
}

#[test]
fn test_status_json_with_transcript() {
    let dir = TempDir::new().unwrap();
    let snapshot = write(dir.path(), "snapshot.toml", SNAPSHOT);
    let transcript = write(dir.path(), "update.log", TRANSCRIPT);

    let output = teamsync()
        .args(["status", &snapshot, "--transcript", &transcript, "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["mode"], "three-way");
    // The skipped directory is dropped from the set
    assert_eq!(report["out_of_sync"], 2);
    let paths: Vec<&str> = report["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["src", "src/main.c", "src/util", "src/util/str.c"]);
}

#[test]
fn test_status_with_config_file() {
    let dir = TempDir::new().unwrap();
    let snapshot = write(dir.path(), "snapshot.toml", SNAPSHOT);
    let config = write(
        dir.path(),
        "teamsync.toml",
        "[collector]\nbatch_threshold = 1\n",
    );

    teamsync()
        .args(["status", &snapshot, "--config", &config])
        .assert()
        .success()
        .stdout(predicate::str::contains("(3)"));
}

#[test]
fn test_missing_snapshot_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");

    teamsync()
        .args(["status", &missing.to_string_lossy()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_invalid_snapshot_fails() {
    let dir = TempDir::new().unwrap();
    let snapshot = write(dir.path(), "snapshot.toml", "mode = \"sideways\"\n");

    teamsync()
        .args(["status", &snapshot])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}
