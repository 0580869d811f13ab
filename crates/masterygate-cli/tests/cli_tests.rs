//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn masterygate(dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("masterygate").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("MASTERYGATE_DATA_DIR")
        .env_remove("RUST_LOG");
    cmd
}

/// A workspace with the starter config and catalog.
fn initialized() -> TempDir {
    let dir = TempDir::new().unwrap();
    masterygate(&dir).arg("init").assert().success();
    dir
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    masterygate(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created masterygate.toml"))
        .stdout(predicate::str::contains("Created concepts.toml"));

    assert!(dir.path().join("masterygate.toml").exists());
    assert!(dir.path().join("concepts.toml").exists());
}

#[test]
fn init_skips_existing() {
    let dir = initialized();
    masterygate(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn validate_starter_files() {
    let dir = initialized();
    masterygate(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 level requirement(s)"))
        .stdout(predicate::str::contains("3 concept(s)"))
        .stdout(predicate::str::contains("Configuration valid."));
}

#[test]
fn validate_reports_catalog_problems() {
    let dir = initialized();
    std::fs::write(
        dir.path().join("broken.toml"),
        r#"
[[concepts]]
id = "a"
prerequisites = ["b"]

[[concepts]]
id = "b"
prerequisites = ["a"]

[[concepts]]
id = "c"
prerequisites = ["missing"]
"#,
    )
    .unwrap();

    masterygate(&dir)
        .args(["validate", "--catalog", "broken.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WARNING"))
        .stdout(predicate::str::contains("missing"))
        .stdout(predicate::str::contains("warning(s) found"));
}

#[test]
fn validate_nonexistent_config() {
    let dir = TempDir::new().unwrap();
    masterygate(&dir)
        .args(["--config", "nope.toml", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn analyze_prints_json_assessment() {
    let dir = TempDir::new().unwrap();
    let output = masterygate(&dir)
        .args([
            "analyze",
            "--format",
            "json",
            "--expect",
            "numerator,denominator",
            "--text",
            "Because the numerator counts parts and the denominator counts the whole, \
             therefore 2/4 equals 1/2. For example, two quarters make a half.",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let overall = value["overall"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&overall));
    assert!(value["scores"]["relevance"].as_f64().unwrap() > 0.0);
}

#[test]
fn submit_records_attempt() {
    let dir = initialized();
    masterygate(&dir)
        .args([
            "submit",
            "--learner",
            "alice",
            "--concept",
            "fractions",
            "--correct",
            "--time-ms",
            "12000",
            "--reasoning",
            "Because the denominator is the same, therefore I add the numerators.",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded attempt"))
        .stdout(predicate::str::contains("mastered: no"));

    assert!(dir
        .path()
        .join("masterygate-data/learners/alice/attempts.jsonl")
        .exists());
}

#[test]
fn submit_rejects_unknown_concept() {
    let dir = initialized();
    masterygate(&dir)
        .args([
            "submit", "--learner", "alice", "--concept", "calculus", "--correct", "--reasoning",
            "Because limits.",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("calculus"));
}

#[test]
fn submit_rejects_blank_reasoning_and_negative_time() {
    let dir = initialized();
    masterygate(&dir)
        .args(["submit", "--learner", "alice", "--concept", "fractions", "--reasoning", "   "])
        .assert()
        .failure();
    masterygate(&dir)
        .args([
            "submit", "--learner", "alice", "--concept", "fractions", "--reasoning", "Because.",
            "--time-ms", "-5",
        ])
        .assert()
        .failure();
    assert!(!dir
        .path()
        .join("masterygate-data/learners/alice/attempts.jsonl")
        .exists());
}

#[test]
fn submit_rejects_unknown_context() {
    let dir = initialized();
    masterygate(&dir)
        .args([
            "submit", "--learner", "alice", "--concept", "fractions", "--reasoning", "Because.",
            "--context", "homework",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown attempt context"));
}

#[test]
fn evaluate_blocks_skipping_levels() {
    let dir = initialized();
    masterygate(&dir)
        .args(["evaluate", "--learner", "alice", "--level", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BLOCK: Cannot skip levels"));

    masterygate(&dir)
        .args(["evaluate", "--learner", "alice", "--level", "3", "--fail-on-block"])
        .assert()
        .failure();
}

#[test]
fn evaluate_json_lists_requirements() {
    let dir = initialized();
    let output = masterygate(&dir)
        .args(["evaluate", "--learner", "bob", "--level", "2", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["can_progress"], false);
    assert_eq!(value["current_level"], 1);
    assert!(value["reason"].as_str().unwrap().contains("fractions"));
    assert!(!value["blockers"].as_array().unwrap().is_empty());
}

#[test]
fn due_on_fresh_learner() {
    let dir = initialized();
    masterygate(&dir)
        .args(["due", "--learner", "nobody"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing due"));
}

#[test]
fn help_output() {
    let dir = TempDir::new().unwrap();
    masterygate(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Evidence-based mastery tracking"));
}

#[test]
fn version_output() {
    let dir = TempDir::new().unwrap();
    masterygate(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("masterygate"));
}
