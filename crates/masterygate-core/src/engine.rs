//! Central mastery engine.
//!
//! Ties the analyzer, aggregator, scorer, scheduler and gate together behind
//! three operations: submit an attempt, evaluate a progression request and
//! list due reviews. Operations for the same learner are serialized by a
//! per-learner lock; different learners never contend.
//!
//! The lock lives in this process. Run one engine per store: a second
//! process opening the same data directory is not excluded and can lose
//! updates for a learner both touch.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::ConceptCatalog;
use crate::config::{EngineConfig, RequirementTable};
use crate::error::{EngineError, EvaluationError, StorageError, ValidationError};
use crate::gate::{ChallengeAssessor, EvidenceRequest, GateVerdict, ProgressionGate, RequirementCheck};
use crate::mastery::MasteryScorer;
use crate::model::{
    Attempt, AttemptContext, BlockedAttemptCounter, ConceptId, ConceptProgress, DecisionOutcome,
    DimensionScores, GateStage, LearnerId, LearnerProfile, LevelRequirement, MasteryAchievement,
    PendingLog, ProgressionDecision, QuestionMetadata,
};
use crate::progress::{AttemptObservation, ConceptProgressAggregator};
use crate::reasoning::{HeuristicAnalyzer, ReasoningAnalyzer, ReasoningInput};
use crate::scheduler::{DueReview, SpacedRepetitionScheduler};
use crate::store::Persistence;

/// A practice attempt as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSubmission {
    pub learner_id: LearnerId,
    pub concept_id: ConceptId,
    pub correct: bool,
    #[serde(default = "default_attempts_used")]
    pub attempts_used: u32,
    /// Signed so negative input can be rejected rather than wrapped.
    #[serde(default)]
    pub time_spent_ms: i64,
    pub reasoning_text: String,
    #[serde(default)]
    pub context: AttemptContext,
    /// The learner's answer, used for relevance checks.
    #[serde(default)]
    pub answer: String,
    /// Question metadata; falls back to the catalog's key terms.
    #[serde(default)]
    pub question: Option<QuestionMetadata>,
    /// When the attempt happened. Defaults to now.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

fn default_attempts_used() -> u32 {
    1
}

impl AttemptSubmission {
    pub fn new(learner_id: &str, concept_id: &str, correct: bool, reasoning_text: &str) -> Self {
        Self {
            learner_id: learner_id.to_string(),
            concept_id: concept_id.to_string(),
            correct,
            attempts_used: 1,
            time_spent_ms: 0,
            reasoning_text: reasoning_text.to_string(),
            context: AttemptContext::Practice,
            answer: String::new(),
            question: None,
            timestamp: None,
        }
    }
}

/// Result of a submitted attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub attempt_id: Uuid,
    pub reasoning_score: f64,
    pub is_reasoning_valid: bool,
    pub reasoning_feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub concept_mastery_score: f64,
    pub is_concept_mastered: bool,
    /// True only on the attempt that first mastered the concept.
    pub newly_mastered: bool,
    pub dimensions: DimensionScores,
    pub next_review_due_at: Option<DateTime<Utc>>,
    pub difficulty_level: u8,
}

/// Result of a progression request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionOutcome {
    pub decision_id: Uuid,
    pub can_progress: bool,
    pub reason: String,
    pub stage: GateStage,
    /// Checks evaluated before the gate stopped, met or not.
    pub requirements: Vec<RequirementCheck>,
    pub recommendations: Vec<String>,
    pub blockers: Vec<String>,
    /// Level after this decision.
    pub current_level: u32,
}

pub struct MasteryEngine {
    config: EngineConfig,
    store: Arc<dyn Persistence>,
    catalog: Arc<dyn ConceptCatalog>,
    analyzer: Arc<dyn ReasoningAnalyzer>,
    aggregator: ConceptProgressAggregator,
    scorer: MasteryScorer,
    scheduler: SpacedRepetitionScheduler,
    gate: ProgressionGate,
    requirements: RequirementTable,
    locks: Mutex<HashMap<LearnerId, Arc<Mutex<()>>>>,
}

impl MasteryEngine {
    /// Engine with the heuristic analyzer and the weakest-link challenge.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn Persistence>,
        catalog: Arc<dyn ConceptCatalog>,
    ) -> Self {
        let analyzer = Arc::new(HeuristicAnalyzer::new(config.reasoning.clone()));
        Self {
            aggregator: ConceptProgressAggregator::new(config.progress.clone()),
            scorer: MasteryScorer::new(config.mastery.clone()),
            scheduler: SpacedRepetitionScheduler::new(config.scheduler.clone()),
            gate: ProgressionGate::with_defaults(config.mastery.clone(), config.gate.clone()),
            requirements: config.requirement_table(),
            config,
            store,
            catalog,
            analyzer,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the reasoning analyzer.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn ReasoningAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Replace the final challenge assessment.
    pub fn with_challenge(mut self, challenge: Box<dyn ChallengeAssessor>) -> Self {
        self.gate = ProgressionGate::new(
            self.config.mastery.clone(),
            self.config.gate.clone(),
            challenge,
        );
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Persistence> {
        &self.store
    }

    pub fn catalog(&self) -> &Arc<dyn ConceptCatalog> {
        &self.catalog
    }

    /// Run `f` holding the learner's lock.
    ///
    /// The learner's entry leaves the lock map once nobody holds or waits on it.
    fn with_learner<T>(
        &self,
        learner_id: &str,
        f: impl FnOnce() -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|e| StorageError::Poisoned(e.to_string()))?;
            Arc::clone(locks.entry(learner_id.to_string()).or_default())
        };
        let result = {
            let _guard = lock
                .lock()
                .map_err(|e| StorageError::Poisoned(e.to_string()))?;
            f()
        };
        drop(lock);
        // Clones are only made under the map lock, so a count of one here
        // means no other caller can reach this entry.
        if let Ok(mut locks) = self.locks.lock() {
            if locks.get(learner_id).is_some_and(|l| Arc::strong_count(l) == 1) {
                locks.remove(learner_id);
            }
        }
        result
    }

    fn validate(&self, sub: &AttemptSubmission) -> Result<(), ValidationError> {
        if sub.learner_id.trim().is_empty() {
            return Err(ValidationError::MissingLearner);
        }
        if sub.reasoning_text.trim().is_empty() {
            return Err(ValidationError::MissingReasoning);
        }
        if sub.time_spent_ms < 0 {
            return Err(ValidationError::NegativeTime(sub.time_spent_ms));
        }
        if sub.attempts_used == 0 {
            return Err(ValidationError::ZeroAttemptsUsed);
        }
        if !self.catalog.contains(&sub.concept_id) {
            return Err(ValidationError::UnknownConcept(sub.concept_id.clone()));
        }
        Ok(())
    }

    /// Submit an attempt at its own timestamp, or now.
    pub fn submit_attempt(&self, sub: AttemptSubmission) -> Result<AttemptOutcome, EngineError> {
        let now = sub.timestamp.unwrap_or_else(Utc::now);
        self.submit_attempt_at(sub, now)
    }

    /// Score, aggregate and persist one attempt.
    ///
    /// Rejected submissions leave no trace. On success the attempt, the
    /// updated progress, any achievement and the learner profile have all
    /// been written before this returns.
    ///
    /// The progress record is saved first and carries the attempt as pending
    /// until the logs and the profile have it. If a later write fails, the
    /// next operation that loads that progress finishes the job, so the
    /// attempt log never disagrees with the progress counters for long.
    pub fn submit_attempt_at(
        &self,
        sub: AttemptSubmission,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome, EngineError> {
        if let Err(e) = self.validate(&sub) {
            tracing::warn!(learner = %sub.learner_id, concept = %sub.concept_id, "rejected attempt: {e}");
            return Err(e.into());
        }
        let learner_id = sub.learner_id.clone();
        self.with_learner(&learner_id, || self.record_attempt(sub, now))
    }

    fn record_attempt(
        &self,
        sub: AttemptSubmission,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome, EngineError> {
        let question = sub.question.clone().unwrap_or_else(|| QuestionMetadata {
            expected_concepts: self.catalog.key_terms(&sub.concept_id),
            ..Default::default()
        });
        let assessment = self.analyzer.analyze(&ReasoningInput {
            text: &sub.reasoning_text,
            question: &question,
            answer: &sub.answer,
            correct: sub.correct,
        })?;
        if !assessment.overall.is_finite() || !(0.0..=1.0).contains(&assessment.overall) {
            return Err(EvaluationError::ScoreOutOfRange {
                dimension: "reasoning".to_string(),
                value: assessment.overall,
            }
            .into());
        }

        let mut profile = self.load_profile(&sub.learner_id)?;
        let mut progress = self
            .store
            .load_progress(&sub.learner_id, &sub.concept_id)?
            .unwrap_or_else(|| ConceptProgress::new(&sub.learner_id, &sub.concept_id, now));
        self.complete_pending(&mut progress, &mut profile)?;

        let attempt = Attempt {
            id: Uuid::new_v4(),
            timestamp: now,
            learner_id: sub.learner_id.clone(),
            concept_id: sub.concept_id.clone(),
            correct: sub.correct,
            attempts_used: sub.attempts_used,
            time_spent_ms: sub.time_spent_ms as u64,
            reasoning_text: sub.reasoning_text,
            reasoning_score: assessment.overall,
            context: sub.context,
        };

        self.aggregator
            .record(&mut progress, &AttemptObservation::from(&attempt));
        let evaluation = self.scorer.evaluate(&mut progress, now);
        let newly_mastered = evaluation.achievement.is_some();
        self.scheduler
            .schedule(&mut progress, attempt.correct, newly_mastered, now);

        profile.record_activity(
            now,
            self.config.progress.session_gap(),
            self.config.gate.major_session_min_attempts,
        );

        progress.pending = Some(PendingLog {
            attempt: attempt.clone(),
            achievement: evaluation.achievement.clone(),
        });
        self.store.save_progress(&progress)?;
        self.store.append_attempt(&attempt)?;
        if let Some(achievement) = &evaluation.achievement {
            self.store.append_achievement(achievement)?;
            tracing::info!(
                learner = %achievement.learner_id,
                concept = %achievement.concept_id,
                attempts = achievement.attempts_required,
                overall = %format!("{:.3}", achievement.overall_score),
                "concept mastered"
            );
        }
        self.store.save_profile(&profile)?;
        progress.pending = None;
        self.store.save_progress(&progress)?;

        tracing::debug!(
            learner = %attempt.learner_id,
            concept = %attempt.concept_id,
            correct = attempt.correct,
            reasoning = %format!("{:.3}", attempt.reasoning_score),
            mastery = %format!("{:.3}", evaluation.overall),
            "attempt recorded"
        );

        Ok(AttemptOutcome {
            attempt_id: attempt.id,
            reasoning_score: assessment.overall,
            is_reasoning_valid: assessment.is_valid,
            reasoning_feedback: assessment.feedback,
            suggestions: assessment
                .suggestions
                .into_iter()
                .map(|s| s.message)
                .collect(),
            concept_mastery_score: evaluation.overall,
            is_concept_mastered: progress.is_mastered(),
            newly_mastered,
            dimensions: evaluation.scores,
            next_review_due_at: progress.next_review_due_at,
            difficulty_level: progress.difficulty_level,
        })
    }

    /// Finish the log writes of an interrupted submission.
    ///
    /// Takes the pending entries off `progress`, appends whichever the logs
    /// lack and replays the attempt onto the profile's session tracking.
    /// Returns whether anything was pending. The caller saves both records.
    fn complete_pending(
        &self,
        progress: &mut ConceptProgress,
        profile: &mut LearnerProfile,
    ) -> Result<bool, StorageError> {
        let Some(pending) = progress.pending.take() else {
            return Ok(false);
        };
        let attempt = &pending.attempt;
        tracing::warn!(
            learner = %attempt.learner_id,
            concept = %attempt.concept_id,
            attempt = %attempt.id,
            "completing an interrupted submission"
        );
        if !self.store.has_attempt(&attempt.learner_id, attempt.id)? {
            self.store.append_attempt(attempt)?;
        }
        if let Some(achievement) = &pending.achievement {
            if !self.store.has_achievement(&achievement.learner_id, achievement.id)? {
                self.store.append_achievement(achievement)?;
            }
        }
        if profile.last_attempt_at.map_or(true, |t| t < attempt.timestamp) {
            profile.record_activity(
                attempt.timestamp,
                self.config.progress.session_gap(),
                self.config.gate.major_session_min_attempts,
            );
        }
        Ok(true)
    }

    /// Load a profile, first logging any promotion whose decision entry was
    /// never confirmed.
    fn load_profile(&self, learner_id: &str) -> Result<LearnerProfile, StorageError> {
        let mut profile = self
            .store
            .load_profile(learner_id)?
            .unwrap_or_else(|| LearnerProfile::new(learner_id));
        if let Some(decision) = profile.pending_decision.take() {
            tracing::warn!(
                learner = learner_id,
                decision = %decision.id,
                level = decision.target_level,
                "completing an interrupted promotion"
            );
            if !self.store.has_decision(learner_id, decision.id)? {
                self.store.append_decision(&decision)?;
            }
            self.store.save_profile(&profile)?;
        }
        Ok(profile)
    }

    pub fn evaluate_progression(
        &self,
        learner_id: &str,
        target_level: u32,
    ) -> Result<ProgressionOutcome, EngineError> {
        self.evaluate_progression_at(learner_id, target_level, Utc::now())
    }

    /// Run the gate and record exactly one decision.
    ///
    /// Evaluation failures become a BLOCK with [`crate::gate::EVALUATION_ERROR_REASON`];
    /// storage failures are returned to the caller.
    ///
    /// A BLOCK updates the cooldown counter before the decision is logged. An
    /// ALLOW saves the promoted profile first, holding the decision as pending
    /// until the log has it.
    pub fn evaluate_progression_at(
        &self,
        learner_id: &str,
        target_level: u32,
        now: DateTime<Utc>,
    ) -> Result<ProgressionOutcome, EngineError> {
        if learner_id.trim().is_empty() {
            return Err(ValidationError::MissingLearner.into());
        }
        self.with_learner(learner_id, || self.decide(learner_id, target_level, now))
    }

    fn decide(
        &self,
        learner_id: &str,
        target_level: u32,
        now: DateTime<Utc>,
    ) -> Result<ProgressionOutcome, EngineError> {
        let mut profile = self.load_profile(learner_id)?;
        let mut counter = self
            .store
            .load_block_counter(learner_id, target_level)?
            .unwrap_or_else(|| BlockedAttemptCounter::new(learner_id, target_level));
        let window = self.gate.config().cooldown_window();
        counter.prune(now, window);

        let verdict = match self
            .gate
            .eligibility(profile.current_level, target_level, &counter, now)
        {
            Some(verdict) => verdict,
            None => {
                let recent_blocks = counter.count_within(now, window);
                match self.evaluate_evidence(&mut profile, target_level, recent_blocks, now) {
                    Ok(verdict) => verdict,
                    Err(EngineError::Evaluation(e)) => {
                        tracing::error!(learner = learner_id, target_level, "gate evaluation failed: {e}");
                        GateVerdict::evaluation_error(GateStage::MasteryEvidence, &e.to_string())
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let decision = ProgressionDecision {
            id: Uuid::new_v4(),
            learner_id: learner_id.to_string(),
            target_level,
            current_level: profile.current_level,
            timestamp: now,
            outcome: verdict.outcome,
            stage: verdict.stage,
            reason: verdict.reason.clone(),
            evidence: verdict.evidence.clone(),
            missing_requirements: verdict.missing_requirements(),
        };

        let allowed = verdict.outcome == DecisionOutcome::Allow;
        if allowed {
            profile.promote(target_level, now);
            profile.pending_decision = Some(decision.clone());
            self.store.save_profile(&profile)?;
        }
        counter.record(verdict.outcome, now);
        self.store.save_block_counter(&counter)?;
        self.store.append_decision(&decision)?;
        if allowed {
            profile.pending_decision = None;
            self.store.save_profile(&profile)?;
        }

        tracing::info!(
            learner = learner_id,
            target_level,
            outcome = %verdict.outcome,
            stage = %verdict.stage,
            reason = %verdict.reason,
            "progression decision"
        );

        Ok(ProgressionOutcome {
            decision_id: decision.id,
            can_progress: verdict.is_allowed(),
            reason: verdict.reason,
            stage: verdict.stage,
            requirements: verdict.checks,
            recommendations: verdict.recommendations,
            blockers: verdict.blockers,
            current_level: profile.current_level,
        })
    }

    fn evaluate_evidence(
        &self,
        profile: &mut LearnerProfile,
        target_level: u32,
        recent_blocks: u32,
        now: DateTime<Utc>,
    ) -> Result<GateVerdict, EngineError> {
        let requirement = self.requirement_for(target_level);
        let mut required: BTreeSet<ConceptId> = requirement.required_concepts.clone();
        required.extend(self.catalog.required_concepts(target_level));

        let mut progress = self.store.list_progress(&profile.learner_id)?;
        let mut completed = Vec::new();
        for (i, p) in progress.iter_mut().enumerate() {
            if self.complete_pending(p, profile)? {
                completed.push(i);
            }
        }
        if !completed.is_empty() {
            self.store.save_profile(profile)?;
            for i in completed {
                self.store.save_progress(&progress[i])?;
            }
        }

        let verdict = self.gate.evaluate_evidence(&EvidenceRequest {
            learner_id: &profile.learner_id,
            target_level,
            requirement: &requirement,
            required_concepts: &required,
            progress: &progress,
            profile: &*profile,
            recent_blocks,
            catalog: self.catalog.as_ref(),
            now,
        })?;
        Ok(verdict)
    }

    /// Configured requirement, or the conservative fallback.
    pub fn requirement_for(&self, level: u32) -> LevelRequirement {
        match self.requirements.get(level) {
            Ok(req) => req.clone(),
            Err(e) => {
                tracing::warn!(level, "{e}; using conservative defaults");
                LevelRequirement::conservative(level)
            }
        }
    }

    pub fn due_reviews(&self, learner_id: &str) -> Result<Vec<DueReview>, EngineError> {
        self.due_reviews_at(learner_id, Utc::now())
    }

    /// Concepts due for review, highest priority first.
    pub fn due_reviews_at(
        &self,
        learner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<DueReview>, EngineError> {
        let progress = self.store.list_progress(learner_id)?;
        Ok(self.scheduler.due_reviews(&progress, now))
    }

    pub fn concept_progress(
        &self,
        learner_id: &str,
        concept_id: &str,
    ) -> Result<Option<ConceptProgress>, EngineError> {
        Ok(self.store.load_progress(learner_id, concept_id)?)
    }

    pub fn is_concept_mastered(&self, learner_id: &str, concept_id: &str) -> Result<bool, EngineError> {
        Ok(self
            .concept_progress(learner_id, concept_id)?
            .is_some_and(|p| p.is_mastered()))
    }

    pub fn all_progress(&self, learner_id: &str) -> Result<Vec<ConceptProgress>, EngineError> {
        Ok(self.store.list_progress(learner_id)?)
    }

    pub fn profile(&self, learner_id: &str) -> Result<LearnerProfile, EngineError> {
        Ok(self
            .store
            .load_profile(learner_id)?
            .unwrap_or_else(|| LearnerProfile::new(learner_id)))
    }

    pub fn decisions(&self, learner_id: &str) -> Result<Vec<ProgressionDecision>, EngineError> {
        Ok(self.store.decisions(learner_id)?)
    }

    pub fn achievements(&self, learner_id: &str) -> Result<Vec<MasteryAchievement>, EngineError> {
        Ok(self.store.achievements(learner_id)?)
    }

    /// Current dimension scores for a concept, without mutating anything.
    pub fn dimension_scores(&self, progress: &ConceptProgress) -> (DimensionScores, f64) {
        let scores = self.scorer.dimensions(progress);
        (scores, self.scorer.overall(&scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::store::MemoryStore;

    fn engine() -> MasteryEngine {
        MasteryEngine::new(
            EngineConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(StaticCatalog::open()),
        )
    }

    const REASONING: &str = "Because both sides share a factor, dividing gives 3, therefore the answer is 3.";

    #[test]
    fn validation_rejects_without_recording() {
        let engine = engine();
        let cases = [
            (AttemptSubmission::new("l1", "c1", true, "   "), "reasoning"),
            (
                AttemptSubmission {
                    time_spent_ms: -5,
                    ..AttemptSubmission::new("l1", "c1", true, REASONING)
                },
                "non-negative",
            ),
            (
                AttemptSubmission {
                    attempts_used: 0,
                    ..AttemptSubmission::new("l1", "c1", true, REASONING)
                },
                "at least 1",
            ),
            (AttemptSubmission::new("", "c1", true, REASONING), "learner"),
        ];
        for (sub, expected) in cases {
            let err = engine.submit_attempt(sub).unwrap_err();
            assert!(err.is_validation());
            assert!(err.to_string().contains(expected), "{err}");
        }
        assert!(engine.store().attempts("l1").unwrap().is_empty());
        assert!(engine.concept_progress("l1", "c1").unwrap().is_none());
    }

    #[test]
    fn short_reasoning_scores_zero_but_is_recorded() {
        let engine = engine();
        let outcome = engine
            .submit_attempt(AttemptSubmission::new("l1", "c1", true, "yes"))
            .unwrap();
        assert_eq!(outcome.reasoning_score, 0.0);
        assert!(!outcome.is_reasoning_valid);
        assert_eq!(engine.store().attempts("l1").unwrap().len(), 1);
    }

    #[test]
    fn counters_increase_once_per_attempt() {
        let engine = engine();
        for (i, correct) in [true, false, true].into_iter().enumerate() {
            engine
                .submit_attempt(AttemptSubmission::new("l1", "c1", correct, REASONING))
                .unwrap();
            let p = engine.concept_progress("l1", "c1").unwrap().unwrap();
            assert_eq!(p.total_attempts, i as u32 + 1);
        }
        let p = engine.concept_progress("l1", "c1").unwrap().unwrap();
        assert_eq!(p.correct_attempts, 2);
    }

    #[test]
    fn unknown_level_uses_conservative_requirement() {
        let engine = engine();
        let req = engine.requirement_for(7);
        assert_eq!(req, LevelRequirement::conservative(7));
    }

    #[test]
    fn lock_entries_are_released_after_use() {
        let engine = Arc::new(engine());
        std::thread::scope(|s| {
            for learner in ["l1", "l2", "l3"] {
                let engine = Arc::clone(&engine);
                s.spawn(move || {
                    for _ in 0..5 {
                        engine
                            .submit_attempt(AttemptSubmission::new(learner, "c1", true, REASONING))
                            .unwrap();
                        engine.evaluate_progression(learner, 2).unwrap();
                    }
                });
            }
        });
        let _ = engine.submit_attempt(AttemptSubmission::new("l4", "c1", true, " "));
        assert!(engine.locks.lock().unwrap().is_empty());
        assert_eq!(engine.store().attempts("l1").unwrap().len(), 5);
    }

    #[test]
    fn every_evaluation_appends_one_decision() {
        let engine = engine();
        engine.evaluate_progression("l1", 2).unwrap();
        engine.evaluate_progression("l1", 5).unwrap();
        engine.evaluate_progression("l1", 1).unwrap();
        assert_eq!(engine.decisions("l1").unwrap().len(), 3);
    }
}
