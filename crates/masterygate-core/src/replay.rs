//! Bulk ingestion of recorded attempts.
//!
//! Learners are replayed in parallel, bounded by a semaphore. Each learner's
//! attempts go through the engine strictly in input order, on a blocking
//! thread, so the per-learner ordering guarantee holds for replays too.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::engine::{AttemptOutcome, AttemptSubmission, MasteryEngine};
use crate::model::LearnerId;

/// Progress callbacks for a replay.
pub trait ReplayReporter: Send + Sync {
    fn on_learner_complete(&self, learner: &LearnerReplay);
    fn on_attempt_rejected(&self, learner_id: &str, index: usize, error: &str);
    fn on_replay_complete(&self, summary: &ReplaySummary);
}

/// No-op reporter.
pub struct NoopReporter;

impl ReplayReporter for NoopReporter {
    fn on_learner_complete(&self, _: &LearnerReplay) {}
    fn on_attempt_rejected(&self, _: &str, _: usize, _: &str) {}
    fn on_replay_complete(&self, _: &ReplaySummary) {}
}

/// Result of replaying one learner.
#[derive(Debug, Clone, Default)]
pub struct LearnerReplay {
    pub learner_id: LearnerId,
    pub outcomes: Vec<AttemptOutcome>,
    /// Submissions the engine refused, by input position within the learner.
    pub rejected: Vec<(usize, String)>,
    /// A storage failure that stopped this learner's replay.
    pub fatal: Option<String>,
}

impl LearnerReplay {
    pub fn newly_mastered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.newly_mastered).count()
    }
}

/// Totals across a replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub learners: usize,
    pub applied: usize,
    pub rejected: usize,
    pub achievements: usize,
    /// Learners whose replay stopped on a storage failure.
    pub failed_learners: Vec<LearnerId>,
    pub duration_ms: u64,
}

/// Parse a JSON-lines file of [`AttemptSubmission`]s. Blank lines are skipped.
pub fn parse_submissions(content: &str) -> Result<Vec<AttemptSubmission>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid attempt on line {}", i + 1))
        })
        .collect()
}

/// Replay submissions through the engine.
pub async fn replay(
    engine: Arc<MasteryEngine>,
    submissions: Vec<AttemptSubmission>,
    parallelism: usize,
    progress: &dyn ReplayReporter,
) -> Result<ReplaySummary> {
    let start = Instant::now();
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));

    let mut by_learner: BTreeMap<LearnerId, Vec<AttemptSubmission>> = BTreeMap::new();
    for sub in submissions {
        by_learner.entry(sub.learner_id.clone()).or_default().push(sub);
    }

    let mut futures = FuturesUnordered::new();
    for (learner_id, subs) in by_learner {
        let engine = Arc::clone(&engine);
        let semaphore = Arc::clone(&semaphore);
        futures.push(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
            let handle = tokio::task::spawn_blocking(move || replay_learner(&engine, learner_id, subs));
            handle.await.context("replay task panicked")
        });
    }

    let mut summary = ReplaySummary::default();
    while let Some(result) = futures.next().await {
        let learner = result?;
        for (index, error) in &learner.rejected {
            progress.on_attempt_rejected(&learner.learner_id, *index, error);
        }
        if let Some(fatal) = &learner.fatal {
            tracing::error!(learner = %learner.learner_id, "replay stopped: {fatal}");
            summary.failed_learners.push(learner.learner_id.clone());
        }
        summary.learners += 1;
        summary.applied += learner.outcomes.len();
        summary.rejected += learner.rejected.len();
        summary.achievements += learner.newly_mastered();
        progress.on_learner_complete(&learner);
    }
    summary.failed_learners.sort();
    summary.duration_ms = duration_ms(start.elapsed());

    tracing::info!(
        learners = summary.learners,
        applied = summary.applied,
        rejected = summary.rejected,
        "replay complete"
    );
    progress.on_replay_complete(&summary);
    Ok(summary)
}

fn replay_learner(
    engine: &MasteryEngine,
    learner_id: LearnerId,
    subs: Vec<AttemptSubmission>,
) -> LearnerReplay {
    let mut result = LearnerReplay {
        learner_id,
        ..Default::default()
    };
    for (index, sub) in subs.into_iter().enumerate() {
        match engine.submit_attempt(sub) {
            Ok(outcome) => result.outcomes.push(outcome),
            Err(e) if e.is_fatal() => {
                result.fatal = Some(e.to_string());
                break;
            }
            Err(e) => {
                tracing::warn!(learner = %result.learner_id, index, "skipping attempt: {e}");
                result.rejected.push((index, e.to_string()));
            }
        }
    }
    result
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis().min(u64::MAX as u128) as u64
}
