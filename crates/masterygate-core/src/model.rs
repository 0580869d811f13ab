//! Core data model types for masterygate.
//!
//! Attempts, per-concept progress, achievements, progression decisions and
//! the static level requirements the gate checks against.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a learner.
pub type LearnerId = String;

/// Identifier of a concept in the catalog.
pub type ConceptId = String;

/// Size of the bounded recent-attempt window and the reasoning history.
pub const RECENT_WINDOW: usize = 10;

/// Where an attempt was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttemptContext {
    #[default]
    Practice,
    Assessment,
    Review,
}

impl fmt::Display for AttemptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptContext::Practice => write!(f, "practice"),
            AttemptContext::Assessment => write!(f, "assessment"),
            AttemptContext::Review => write!(f, "review"),
        }
    }
}

impl FromStr for AttemptContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "practice" => Ok(AttemptContext::Practice),
            "assessment" | "test" => Ok(AttemptContext::Assessment),
            "review" => Ok(AttemptContext::Review),
            other => Err(format!("unknown attempt context: {other}")),
        }
    }
}

/// Kind of question the justification answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    #[default]
    ShortAnswer,
    Explanation,
    Calculation,
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "multiple_choice" | "mc" => Ok(QuestionType::MultipleChoice),
            "short_answer" => Ok(QuestionType::ShortAnswer),
            "explanation" => Ok(QuestionType::Explanation),
            "calculation" => Ok(QuestionType::Calculation),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// What the question expects the justification to touch on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionMetadata {
    /// Terms or concept names a relevant justification should mention.
    #[serde(default)]
    pub expected_concepts: Vec<String>,
    #[serde(default)]
    pub question_type: QuestionType,
}

/// A submitted practice attempt. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub learner_id: LearnerId,
    pub concept_id: ConceptId,
    pub correct: bool,
    /// Tries the learner needed on this question (at least 1).
    pub attempts_used: u32,
    pub time_spent_ms: u64,
    pub reasoning_text: String,
    /// Weighted reasoning quality in [0, 1].
    pub reasoning_score: f64,
    pub context: AttemptContext,
}

/// One entry of the bounded recent-outcome window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSample {
    pub timestamp: DateTime<Utc>,
    pub correct: bool,
    pub context: AttemptContext,
}

/// Log entries that a saved progress record already accounts for but that
/// may not have reached the logs yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingLog {
    pub attempt: Attempt,
    #[serde(default)]
    pub achievement: Option<MasteryAchievement>,
}

/// Rolling statistics for one learner on one concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptProgress {
    pub learner_id: LearnerId,
    pub concept_id: ConceptId,
    pub total_attempts: u32,
    pub correct_attempts: u32,
    pub rolling_average_attempts: f64,
    pub rolling_average_time_ms: f64,
    /// Last [`RECENT_WINDOW`] reasoning scores, oldest first.
    pub reasoning_score_history: VecDeque<f64>,
    /// Last [`RECENT_WINDOW`] outcomes, oldest first.
    pub recent_outcomes: VecDeque<OutcomeSample>,
    pub assessment_attempts: u32,
    pub assessment_correct: u32,
    pub total_time_spent_ms: u64,
    pub mastery_score: f64,
    pub consistency_score: f64,
    pub retention_score: f64,
    pub application_score: f64,
    /// Whether `retention_score` comes from an observed gap rather than the default.
    #[serde(default)]
    pub retention_measured: bool,
    /// Whether `application_score` comes from assessment attempts rather than the default.
    #[serde(default)]
    pub application_measured: bool,
    /// Adaptive difficulty hint for the content collaborator, 1..=5.
    pub difficulty_level: u8,
    pub first_seen_at: DateTime<Utc>,
    pub last_attempt_at: DateTime<Utc>,
    pub last_mastery_check_at: Option<DateTime<Utc>>,
    pub next_review_due_at: Option<DateTime<Utc>>,
    pub review_interval_days: Option<u32>,
    /// Set once, when the achievement is recorded.
    pub mastered_at: Option<DateTime<Utc>>,
    /// Cleared once the attempt and any achievement are in the logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingLog>,
}

impl ConceptProgress {
    /// Fresh progress for a concept the learner has not attempted before.
    pub fn new(learner_id: &str, concept_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            concept_id: concept_id.to_string(),
            total_attempts: 0,
            correct_attempts: 0,
            rolling_average_attempts: 0.0,
            rolling_average_time_ms: 0.0,
            reasoning_score_history: VecDeque::with_capacity(RECENT_WINDOW),
            recent_outcomes: VecDeque::with_capacity(RECENT_WINDOW),
            assessment_attempts: 0,
            assessment_correct: 0,
            total_time_spent_ms: 0,
            mastery_score: 0.0,
            consistency_score: 0.0,
            retention_score: 0.5,
            application_score: 0.5,
            retention_measured: false,
            application_measured: false,
            difficulty_level: 1,
            first_seen_at: now,
            last_attempt_at: now,
            last_mastery_check_at: None,
            next_review_due_at: None,
            review_interval_days: None,
            mastered_at: None,
            pending: None,
        }
    }

    pub fn is_mastered(&self) -> bool {
        self.mastered_at.is_some()
    }

    /// All-time accuracy.
    pub fn lifetime_accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.correct_attempts as f64 / self.total_attempts as f64
        }
    }

    /// Whether the scheduled review time has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_due_at.is_some_and(|due| due <= now)
    }

    /// Milliseconds past the scheduled review time, zero if not due.
    pub fn overdue_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.next_review_due_at {
            Some(due) if due <= now => (now - due).num_milliseconds().max(0) as u64,
            _ => 0,
        }
    }
}

/// The five mastery dimensions for one concept, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct DimensionScores {
    pub accuracy: f64,
    pub consistency: f64,
    pub reasoning: f64,
    pub retention: f64,
    pub application: f64,
    #[serde(default)]
    pub retention_measured: bool,
    #[serde(default)]
    pub application_measured: bool,
}

/// Recorded the first time a concept clears every mastery threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryAchievement {
    pub id: Uuid,
    pub learner_id: LearnerId,
    pub concept_id: ConceptId,
    pub timestamp: DateTime<Utc>,
    pub dimensions: DimensionScores,
    pub overall_score: f64,
    pub attempts_required: u32,
    pub time_to_mastery_ms: u64,
}

/// Outcome of a progression evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionOutcome {
    Allow,
    Block,
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionOutcome::Allow => write!(f, "ALLOW"),
            DecisionOutcome::Block => write!(f, "BLOCK"),
        }
    }
}

/// The gate stage a decision was reached at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    Eligibility,
    MasteryEvidence,
    RetentionApplication,
    FinalEvaluation,
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateStage::Eligibility => write!(f, "eligibility"),
            GateStage::MasteryEvidence => write!(f, "mastery evidence"),
            GateStage::RetentionApplication => write!(f, "retention & application"),
            GateStage::FinalEvaluation => write!(f, "final evaluation"),
        }
    }
}

/// What the gate saw when it decided.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSnapshot {
    pub accuracy: f64,
    pub consistency: f64,
    pub reasoning: f64,
    pub retention: f64,
    pub application: f64,
    pub overall: f64,
    pub total_attempts: u32,
    pub total_time_spent_ms: u64,
    #[serde(default)]
    pub mastered_concepts: Vec<ConceptId>,
    #[serde(default)]
    pub unmastered_concepts: Vec<ConceptId>,
    #[serde(default)]
    pub overdue_concepts: Vec<ConceptId>,
    pub hours_since_major_session: Option<f64>,
    pub recent_blocks: u32,
}

/// Append-only audit record, one per progression evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionDecision {
    pub id: Uuid,
    pub learner_id: LearnerId,
    pub target_level: u32,
    pub current_level: u32,
    pub timestamp: DateTime<Utc>,
    pub outcome: DecisionOutcome,
    pub stage: GateStage,
    pub reason: String,
    pub evidence: EvidenceSnapshot,
    #[serde(default)]
    pub missing_requirements: Vec<String>,
}

/// Recent BLOCK decisions for one (learner, target level).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedAttemptCounter {
    pub learner_id: LearnerId,
    pub target_level: u32,
    /// BLOCK timestamps inside the rolling window, oldest first.
    pub blocks: VecDeque<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl BlockedAttemptCounter {
    pub fn new(learner_id: &str, target_level: u32) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            target_level,
            blocks: VecDeque::new(),
            last_attempt_at: None,
        }
    }

    /// Drop blocks that fell out of the rolling window.
    pub fn prune(&mut self, now: DateTime<Utc>, window: Duration) {
        while self.blocks.front().is_some_and(|&t| now - t >= window) {
            self.blocks.pop_front();
        }
    }

    /// Number of blocks within `window` of `now`.
    pub fn count_within(&self, now: DateTime<Utc>, window: Duration) -> u32 {
        self.blocks.iter().filter(|&&t| now - t < window).count() as u32
    }

    pub fn record(&mut self, outcome: DecisionOutcome, now: DateTime<Utc>) {
        if outcome == DecisionOutcome::Block {
            self.blocks.push_back(now);
        }
        self.last_attempt_at = Some(now);
    }

    /// Earliest time at which fewer than `max_blocks` remain in the window.
    pub fn cooldown_ends_at(&self, max_blocks: u32, window: Duration) -> Option<DateTime<Utc>> {
        let max = max_blocks as usize;
        if max == 0 || self.blocks.len() < max {
            return None;
        }
        self.blocks
            .get(self.blocks.len() - max)
            .map(|&t| t + window)
    }
}

/// Static per-level requirement, supplied by configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRequirement {
    pub level: u32,
    #[serde(default)]
    pub required_concepts: BTreeSet<ConceptId>,
    /// Minimum per-concept overall mastery score for this level.
    #[serde(default = "default_mastery_threshold")]
    pub mastery_threshold: f64,
    #[serde(default)]
    pub min_time_spent_ms: u64,
    #[serde(default)]
    pub retention_test_required: bool,
}

fn default_mastery_threshold() -> f64 {
    0.85
}

impl LevelRequirement {
    /// Strict fallback used when a level has no configured requirement.
    pub fn conservative(level: u32) -> Self {
        Self {
            level,
            required_concepts: BTreeSet::new(),
            mastery_threshold: 0.9,
            min_time_spent_ms: 2 * 60 * 60 * 1000,
            retention_test_required: true,
        }
    }
}

/// A completed level promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub level: u32,
    pub at: DateTime<Utc>,
}

/// Per-learner state the gate needs beyond concept progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub learner_id: LearnerId,
    pub current_level: u32,
    pub session_started_at: Option<DateTime<Utc>>,
    pub session_attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// End of the most recent session with enough attempts to count as major.
    pub last_major_session_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub promotions: Vec<Promotion>,
    /// An ALLOW decision whose promotion is saved but whose log entry may be missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_decision: Option<ProgressionDecision>,
}

impl LearnerProfile {
    pub fn new(learner_id: &str) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            current_level: 1,
            session_started_at: None,
            session_attempts: 0,
            last_attempt_at: None,
            last_major_session_at: None,
            promotions: Vec::new(),
            pending_decision: None,
        }
    }

    /// Track session boundaries. A gap longer than `session_gap` starts a new
    /// session; once a session reaches `major_min_attempts` it counts as major.
    pub fn record_activity(
        &mut self,
        now: DateTime<Utc>,
        session_gap: Duration,
        major_min_attempts: u32,
    ) {
        let new_session = match self.last_attempt_at {
            Some(last) => now - last > session_gap,
            None => true,
        };
        if new_session {
            self.session_started_at = Some(now);
            self.session_attempts = 0;
        }
        self.session_attempts += 1;
        self.last_attempt_at = Some(now);
        if self.session_attempts >= major_min_attempts {
            self.last_major_session_at = Some(now);
        }
    }

    pub fn promote(&mut self, level: u32, now: DateTime<Utc>) {
        self.current_level = level;
        self.promotions.push(Promotion { level, at: now });
    }
}
