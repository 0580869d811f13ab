//! Multi-dimensional mastery scoring.
//!
//! The scorer turns a [`ConceptProgress`] into five dimension scores and a
//! weighted overall score, and records a [`MasteryAchievement`] the first time
//! a concept clears every threshold.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MasteryConfig;
use crate::model::{ConceptProgress, DimensionScores, MasteryAchievement};
use crate::statistics::{mean, recent_accuracy, unit};

/// One of the five mastery dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Accuracy,
    Consistency,
    Reasoning,
    Retention,
    Application,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Accuracy,
        Dimension::Consistency,
        Dimension::Reasoning,
        Dimension::Retention,
        Dimension::Application,
    ];
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Accuracy => write!(f, "accuracy"),
            Dimension::Consistency => write!(f, "consistency"),
            Dimension::Reasoning => write!(f, "reasoning"),
            Dimension::Retention => write!(f, "retention"),
            Dimension::Application => write!(f, "application"),
        }
    }
}

impl DimensionScores {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Accuracy => self.accuracy,
            Dimension::Consistency => self.consistency,
            Dimension::Reasoning => self.reasoning,
            Dimension::Retention => self.retention,
            Dimension::Application => self.application,
        }
    }

    /// Whether the score comes from observed evidence. Only retention and
    /// application have a neutral default.
    pub fn is_measured(&self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::Retention => self.retention_measured,
            Dimension::Application => self.application_measured,
            _ => true,
        }
    }
}

impl MasteryConfig {
    pub fn threshold(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Accuracy => self.accuracy,
            Dimension::Consistency => self.consistency,
            Dimension::Reasoning => self.reasoning,
            Dimension::Retention => self.retention,
            Dimension::Application => self.application,
        }
    }
}

/// How to treat a dimension still sitting at its neutral default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unmeasured {
    /// No evidence is not a failure.
    Exempt,
    /// No evidence fails like any other low score.
    Enforce,
}

/// A dimension below its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Shortfall {
    pub dimension: Dimension,
    pub score: f64,
    pub threshold: f64,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.2} below {:.2}",
            self.dimension, self.score, self.threshold
        )
    }
}

/// Result of scoring one concept after an attempt.
#[derive(Debug, Clone)]
pub struct MasteryEvaluation {
    pub scores: DimensionScores,
    pub overall: f64,
    /// Set only on the attempt that first masters the concept.
    pub achievement: Option<MasteryAchievement>,
}

#[derive(Debug, Clone, Default)]
pub struct MasteryScorer {
    config: MasteryConfig,
}

impl MasteryScorer {
    pub fn new(config: MasteryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MasteryConfig {
        &self.config
    }

    /// Current dimension scores for a concept.
    pub fn dimensions(&self, progress: &ConceptProgress) -> DimensionScores {
        DimensionScores {
            accuracy: recent_accuracy(&progress.recent_outcomes, self.config.accuracy_window),
            consistency: unit(progress.consistency_score),
            reasoning: mean(progress.reasoning_score_history.iter().copied())
                .map(unit)
                .unwrap_or(0.0),
            retention: unit(progress.retention_score),
            application: unit(progress.application_score),
            retention_measured: progress.retention_measured,
            application_measured: progress.application_measured,
        }
    }

    /// Weighted overall score.
    pub fn overall(&self, scores: &DimensionScores) -> f64 {
        let w = &self.config.weights;
        unit(
            w.accuracy * scores.accuracy
                + w.consistency * scores.consistency
                + w.reasoning * scores.reasoning
                + w.retention * scores.retention
                + w.application * scores.application,
        )
    }

    /// Dimensions below their thresholds, in [`Dimension::ALL`] order.
    pub fn shortfalls(&self, scores: &DimensionScores, unmeasured: Unmeasured) -> Vec<Shortfall> {
        Dimension::ALL
            .into_iter()
            .filter(|&d| unmeasured == Unmeasured::Enforce || scores.is_measured(d))
            .filter_map(|d| {
                let score = scores.get(d);
                let threshold = self.config.threshold(d);
                (score < threshold).then_some(Shortfall {
                    dimension: d,
                    score,
                    threshold,
                })
            })
            .collect()
    }

    pub fn meets_thresholds(&self, scores: &DimensionScores) -> bool {
        self.shortfalls(scores, Unmeasured::Exempt).is_empty()
    }

    /// Re-score a concept, updating its stored mastery fields.
    ///
    /// Emits an achievement the first time `min_attempts`, the overall
    /// threshold and every dimension threshold are met together. A concept
    /// that already has `mastered_at` set never emits again.
    pub fn evaluate(&self, progress: &mut ConceptProgress, now: DateTime<Utc>) -> MasteryEvaluation {
        let scores = self.dimensions(progress);
        let overall = self.overall(&scores);
        progress.mastery_score = overall;
        progress.last_mastery_check_at = Some(now);

        let qualifies = progress.total_attempts >= self.config.min_attempts
            && overall >= self.config.overall
            && self.meets_thresholds(&scores);

        let achievement = if qualifies && !progress.is_mastered() {
            progress.mastered_at = Some(now);
            Some(MasteryAchievement {
                id: Uuid::new_v4(),
                learner_id: progress.learner_id.clone(),
                concept_id: progress.concept_id.clone(),
                timestamp: now,
                dimensions: scores,
                overall_score: overall,
                attempts_required: progress.total_attempts,
                time_to_mastery_ms: progress.total_time_spent_ms,
            })
        } else {
            None
        };

        MasteryEvaluation {
            scores,
            overall,
            achievement,
        }
    }
}
