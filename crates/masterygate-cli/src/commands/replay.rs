//! The `masterygate replay` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use masterygate_core::replay::{parse_submissions, replay, LearnerReplay, ReplayReporter, ReplaySummary};

use super::open_engine;

/// Console progress reporter.
struct ConsoleReporter;

impl ReplayReporter for ConsoleReporter {
    fn on_learner_complete(&self, learner: &LearnerReplay) {
        let status = if learner.fatal.is_some() { "STOPPED" } else { "OK" };
        eprintln!(
            "  Done: {} [{status}] {} applied, {} rejected, {} newly mastered",
            learner.learner_id,
            learner.outcomes.len(),
            learner.rejected.len(),
            learner.newly_mastered()
        );
    }

    fn on_attempt_rejected(&self, learner_id: &str, index: usize, error: &str) {
        eprintln!("  REJECTED: {learner_id} #{index}: {error}");
    }

    fn on_replay_complete(&self, summary: &ReplaySummary) {
        eprintln!(
            "\nComplete: {} learners, {} attempts applied, {} rejected, {} achievements ({:.1}s)",
            summary.learners,
            summary.applied,
            summary.rejected,
            summary.achievements,
            summary.duration_ms as f64 / 1000.0
        );
    }
}

pub async fn execute(config_path: Option<PathBuf>, input: PathBuf, parallelism: usize) -> Result<()> {
    anyhow::ensure!(parallelism >= 1, "parallelism must be at least 1");

    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("failed to read attempts: {}", input.display()))?;
    let submissions = parse_submissions(&content)?;
    let engine = Arc::new(open_engine(config_path.as_deref())?);

    eprintln!(
        "masterygate v{} — Replaying {} attempts",
        env!("CARGO_PKG_VERSION"),
        submissions.len()
    );
    let summary = replay(engine, submissions, parallelism, &ConsoleReporter).await?;

    if !summary.failed_learners.is_empty() {
        anyhow::bail!(
            "replay stopped for {} learner(s) on storage errors: {}",
            summary.failed_learners.len(),
            summary.failed_learners.join(", ")
        );
    }
    Ok(())
}
