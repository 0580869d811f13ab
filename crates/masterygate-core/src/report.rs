//! Per-learner progress reports with JSON persistence and markdown rendering.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::MasteryEngine;
use crate::error::EngineError;
use crate::model::{ConceptId, LearnerId, ProgressionDecision};
use crate::scheduler::DueReview;

/// How many of the most recent decisions a report keeps.
const RECENT_DECISIONS: usize = 5;

/// One row of the concept table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptSummary {
    pub concept_id: ConceptId,
    #[serde(default)]
    pub name: Option<String>,
    pub total_attempts: u32,
    /// All-time accuracy.
    pub accuracy: f64,
    pub mastery_score: f64,
    pub consistency: f64,
    pub reasoning: f64,
    pub retention: f64,
    pub application: f64,
    pub mastered: bool,
    pub mastered_at: Option<DateTime<Utc>>,
    pub next_review_due_at: Option<DateTime<Utc>>,
    pub difficulty_level: u8,
}

/// A complete learner report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerReport {
    pub learner_id: LearnerId,
    pub generated_at: DateTime<Utc>,
    pub current_level: u32,
    pub concepts: Vec<ConceptSummary>,
    pub mastered_count: usize,
    pub total_attempts: u32,
    pub total_time_spent_ms: u64,
    pub due_reviews: Vec<DueReview>,
    /// Most recent decisions, newest last.
    pub recent_decisions: Vec<ProgressionDecision>,
}

impl LearnerReport {
    /// Compile a report from the engine's current state.
    pub fn build(
        engine: &MasteryEngine,
        learner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        let profile = engine.profile(learner_id)?;
        let progress = engine.all_progress(learner_id)?;
        let concepts: Vec<ConceptSummary> = progress
            .iter()
            .map(|p| {
                let (scores, _) = engine.dimension_scores(p);
                ConceptSummary {
                    concept_id: p.concept_id.clone(),
                    name: engine.catalog().name(&p.concept_id),
                    total_attempts: p.total_attempts,
                    accuracy: p.lifetime_accuracy(),
                    mastery_score: p.mastery_score,
                    consistency: scores.consistency,
                    reasoning: scores.reasoning,
                    retention: scores.retention,
                    application: scores.application,
                    mastered: p.is_mastered(),
                    mastered_at: p.mastered_at,
                    next_review_due_at: p.next_review_due_at,
                    difficulty_level: p.difficulty_level,
                }
            })
            .collect();

        let mut decisions = engine.decisions(learner_id)?;
        let keep_from = decisions.len().saturating_sub(RECENT_DECISIONS);
        let recent_decisions = decisions.split_off(keep_from);

        Ok(Self {
            learner_id: learner_id.to_string(),
            generated_at: now,
            current_level: profile.current_level,
            mastered_count: concepts.iter().filter(|c| c.mastered).count(),
            total_attempts: progress.iter().map(|p| p.total_attempts).sum(),
            total_time_spent_ms: progress.iter().map(|p| p.total_time_spent_ms).sum(),
            due_reviews: engine.due_reviews_at(learner_id, now)?,
            concepts,
            recent_decisions,
        })
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse report JSON")
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("## Learner {}\n\n", self.learner_id));
        md.push_str(&format!(
            "**Level:** {} | **Mastered:** {}/{} | **Attempts:** {} | **Time:** {} min\n\n",
            self.current_level,
            self.mastered_count,
            self.concepts.len(),
            self.total_attempts,
            self.total_time_spent_ms / 60_000
        ));

        if !self.concepts.is_empty() {
            md.push_str("### Concepts\n\n");
            md.push_str("| Concept | Attempts | Accuracy | Mastery | Consistency | Reasoning | Mastered |\n");
            md.push_str("|---------|----------|----------|---------|-------------|-----------|----------|\n");
            for c in &self.concepts {
                md.push_str(&format!(
                    "| {} | {} | {:.1}% | {:.2} | {:.2} | {:.2} | {} |\n",
                    c.name.as_deref().unwrap_or(&c.concept_id),
                    c.total_attempts,
                    c.accuracy * 100.0,
                    c.mastery_score,
                    c.consistency,
                    c.reasoning,
                    if c.mastered { "yes" } else { "no" }
                ));
            }
            md.push('\n');
        }

        if !self.due_reviews.is_empty() {
            md.push_str("### Due Reviews\n\n");
            md.push_str("| Concept | Priority | Overdue |\n");
            md.push_str("|---------|----------|---------|\n");
            for r in &self.due_reviews {
                md.push_str(&format!(
                    "| {} | {:.2} | {:.1}h |\n",
                    r.concept_id,
                    r.priority,
                    r.overdue_ms as f64 / 3_600_000.0
                ));
            }
            md.push('\n');
        }

        if !self.recent_decisions.is_empty() {
            md.push_str("### Recent Decisions\n\n");
            md.push_str("| When | Target | Outcome | Reason |\n");
            md.push_str("|------|--------|---------|--------|\n");
            for d in &self.recent_decisions {
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    d.timestamp.format("%Y-%m-%d %H:%M"),
                    d.target_level,
                    d.outcome,
                    d.reason.replace('|', "/")
                ));
            }
        }

        md
    }
}
