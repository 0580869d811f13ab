//! End-to-end workflow: replay recorded attempts, then inspect the results.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn masterygate(dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("masterygate").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("MASTERYGATE_DATA_DIR");
    cmd
}

fn attempt_line(learner: &str, minute: u32, correct: bool, context: &str) -> String {
    format!(
        r#"{{"learner_id":"{learner}","concept_id":"fractions","correct":{correct},"time_spent_ms":30000,"context":"{context}","timestamp":"2025-03-01T10:{minute:02}:00Z","reasoning_text":"Because the denominator stays the same, therefore I add the numerators. For example 1/4 + 2/4 = 3/4."}}"#
    )
}

#[test]
fn replay_then_report() {
    let dir = TempDir::new().unwrap();
    masterygate(&dir).arg("init").assert().success();

    let mut lines = Vec::new();
    for minute in 0..4 {
        lines.push(attempt_line("alice", minute, true, "assessment"));
        lines.push(attempt_line("bob", minute, minute % 2 == 0, "practice"));
    }
    lines.push(r#"{"learner_id":"bob","concept_id":"calculus","correct":true,"reasoning_text":"because"}"#.to_string());
    std::fs::write(dir.path().join("attempts.jsonl"), lines.join("\n")).unwrap();

    masterygate(&dir)
        .args(["replay", "--input", "attempts.jsonl", "--parallelism", "2"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Complete: 2 learners, 8 attempts applied, 1 rejected"));

    masterygate(&dir)
        .args(["report", "--learner", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## Learner alice"))
        .stdout(predicate::str::contains("| Fractions | 4 |"));

    let report_path = dir.path().join("out/bob.json");
    masterygate(&dir)
        .args(["report", "--learner", "bob", "--format", "json", "--output"])
        .arg(&report_path)
        .assert()
        .success();
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["learner_id"], "bob");
    assert_eq!(report["total_attempts"], 4);
    assert_eq!(report["mastered_count"], 0);
}

#[test]
fn replay_rejects_malformed_input() {
    let dir = TempDir::new().unwrap();
    masterygate(&dir).arg("init").assert().success();
    std::fs::write(dir.path().join("bad.jsonl"), "{\"learner_id\": 3}\n").unwrap();

    masterygate(&dir)
        .args(["replay", "--input", "bad.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid attempt on line 1"));
}
