//! The progression gate.
//!
//! Four ordered stages, each able to short-circuit with a BLOCK:
//!
//! 1. **Eligibility**: one level at a time, and a cooldown after repeated blocks.
//! 2. **Mastery evidence**: every required concept mastered, recent accuracy
//!    and consistency at the global thresholds.
//! 3. **Retention & application**: rest after the last major session (or the
//!    last attempt when no session was major), applied accuracy, nothing
//!    overdue for review.
//! 4. **Final evaluation**: every dimension against freshly compiled evidence
//!    (no evidence counts as a miss), attempt and time minimums, then the
//!    challenge assessment.
//!
//! The gate itself is pure. Recording decisions, updating the cooldown counter
//! and failing closed on errors is the engine's job.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ConceptCatalog;
use crate::config::{GateConfig, MasteryConfig};
use crate::error::EvaluationError;
use crate::mastery::{Dimension, MasteryScorer, Unmeasured};
use crate::model::{
    BlockedAttemptCounter, ConceptId, ConceptProgress, DecisionOutcome, DimensionScores,
    EvidenceSnapshot, GateStage, LearnerProfile, LevelRequirement,
};
use crate::statistics::mean;

/// Reason given when a learner asks for more than the next level.
pub const SKIP_LEVEL_REASON: &str = "Cannot skip levels";

/// Reason given whenever evaluation fails internally.
pub const EVALUATION_ERROR_REASON: &str = "evaluation error — blocked for safety";

/// One requirement the gate checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementCheck {
    pub stage: GateStage,
    pub requirement: String,
    pub actual: String,
    pub met: bool,
}

impl RequirementCheck {
    /// `requirement (actual)`, used for blockers and the decision log.
    pub fn summary(&self) -> String {
        format!("{} ({})", self.requirement, self.actual)
    }
}

/// The gate's answer for one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateVerdict {
    pub outcome: DecisionOutcome,
    /// Stage that blocked, or the final stage on ALLOW.
    pub stage: GateStage,
    pub reason: String,
    pub evidence: EvidenceSnapshot,
    /// Every check evaluated before the gate stopped.
    pub checks: Vec<RequirementCheck>,
    pub recommendations: Vec<String>,
    pub blockers: Vec<String>,
}

impl GateVerdict {
    pub fn is_allowed(&self) -> bool {
        self.outcome == DecisionOutcome::Allow
    }

    pub fn missing_requirements(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.met)
            .map(RequirementCheck::summary)
            .collect()
    }

    /// Fail-closed verdict for an internal error.
    pub fn evaluation_error(stage: GateStage, detail: &str) -> Self {
        Self {
            outcome: DecisionOutcome::Block,
            stage,
            reason: EVALUATION_ERROR_REASON.to_string(),
            evidence: EvidenceSnapshot::default(),
            checks: Vec::new(),
            recommendations: vec!["Try again later; no progress was lost".to_string()],
            blockers: vec![detail.to_string()],
        }
    }
}

/// Per-concept evidence handed to the challenge assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptEvidence {
    pub concept_id: ConceptId,
    pub scores: DimensionScores,
    pub overall: f64,
}

/// Input to the final challenge assessment.
#[derive(Debug)]
pub struct ChallengeContext<'a> {
    pub learner_id: &'a str,
    pub target_level: u32,
    pub requirement: &'a LevelRequirement,
    pub concepts: &'a [ConceptEvidence],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChallengeResult {
    pub passed: bool,
    pub failures: Vec<String>,
}

/// Secondary verification run after every other check has passed.
///
/// Implementations must be deterministic for the same evidence.
pub trait ChallengeAssessor: Send + Sync {
    fn name(&self) -> &str;

    fn assess(&self, ctx: &ChallengeContext<'_>) -> Result<ChallengeResult, EvaluationError>;
}

/// Re-verifies each required concept on its own: every dimension at its
/// threshold and the concept's overall score at the level's mastery
/// threshold. A dimension with no evidence yet counts as a shortfall. One weak
/// concept fails the whole challenge.
#[derive(Debug, Clone, Default)]
pub struct WeakestLinkChallenge {
    scorer: MasteryScorer,
}

impl WeakestLinkChallenge {
    pub fn new(config: MasteryConfig) -> Self {
        Self {
            scorer: MasteryScorer::new(config),
        }
    }
}

impl ChallengeAssessor for WeakestLinkChallenge {
    fn name(&self) -> &str {
        "weakest-link"
    }

    fn assess(&self, ctx: &ChallengeContext<'_>) -> Result<ChallengeResult, EvaluationError> {
        if ctx.concepts.is_empty() {
            return Err(EvaluationError::Challenge(
                "no concept evidence to assess".to_string(),
            ));
        }
        let mut failures = Vec::new();
        for concept in ctx.concepts {
            for shortfall in self
                .scorer
                .shortfalls(&concept.scores, Unmeasured::Enforce)
            {
                failures.push(format!("'{}': {shortfall}", concept.concept_id));
            }
            if concept.overall < ctx.requirement.mastery_threshold {
                failures.push(format!(
                    "'{}': overall {:.2} below level threshold {:.2}",
                    concept.concept_id, concept.overall, ctx.requirement.mastery_threshold
                ));
            }
        }
        Ok(ChallengeResult {
            passed: failures.is_empty(),
            failures,
        })
    }
}

/// Everything stages 2 to 4 look at.
pub struct EvidenceRequest<'a> {
    pub learner_id: &'a str,
    pub target_level: u32,
    pub requirement: &'a LevelRequirement,
    pub required_concepts: &'a BTreeSet<ConceptId>,
    /// All of the learner's concept progress, not only the required ones.
    pub progress: &'a [ConceptProgress],
    pub profile: &'a LearnerProfile,
    /// Blocks inside the cooldown window, for the evidence snapshot.
    pub recent_blocks: u32,
    pub catalog: &'a dyn ConceptCatalog,
    pub now: DateTime<Utc>,
}

/// Accumulates checks while the stages run.
#[derive(Debug, Default)]
struct Trail {
    checks: Vec<RequirementCheck>,
    recommendations: Vec<String>,
    evidence: EvidenceSnapshot,
}

impl Trail {
    fn check(
        &mut self,
        stage: GateStage,
        met: bool,
        requirement: impl Into<String>,
        actual: impl Into<String>,
    ) -> bool {
        self.checks.push(RequirementCheck {
            stage,
            requirement: requirement.into(),
            actual: actual.into(),
            met,
        });
        met
    }

    fn recommend(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !self.recommendations.contains(&text) {
            self.recommendations.push(text);
        }
    }

    fn blockers(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.met)
            .map(RequirementCheck::summary)
            .collect()
    }

    fn block(self, stage: GateStage, reason: Option<String>) -> GateVerdict {
        let blockers = self.blockers();
        let reason = reason.unwrap_or_else(|| match blockers.as_slice() {
            [] => format!("Blocked at {stage}"),
            [only] => format!("Blocked at {stage}: {only}"),
            [first, rest @ ..] => {
                format!("Blocked at {stage}: {first} (+{} more)", rest.len())
            }
        });
        tracing::debug!(%stage, %reason, "gate blocked");
        GateVerdict {
            outcome: DecisionOutcome::Block,
            stage,
            reason,
            evidence: self.evidence,
            checks: self.checks,
            recommendations: self.recommendations,
            blockers,
        }
    }

    fn allow(self, reason: String) -> GateVerdict {
        GateVerdict {
            outcome: DecisionOutcome::Allow,
            stage: GateStage::FinalEvaluation,
            reason,
            evidence: self.evidence,
            checks: self.checks,
            recommendations: self.recommendations,
            blockers: Vec::new(),
        }
    }
}

pub struct ProgressionGate {
    scorer: MasteryScorer,
    config: GateConfig,
    challenge: Box<dyn ChallengeAssessor>,
}

impl ProgressionGate {
    pub fn new(
        mastery: MasteryConfig,
        config: GateConfig,
        challenge: Box<dyn ChallengeAssessor>,
    ) -> Self {
        Self {
            scorer: MasteryScorer::new(mastery),
            config,
            challenge,
        }
    }

    /// Gate with the default weakest-link challenge.
    pub fn with_defaults(mastery: MasteryConfig, config: GateConfig) -> Self {
        let challenge = Box::new(WeakestLinkChallenge::new(mastery.clone()));
        Self::new(mastery, config, challenge)
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Stage 1. Returns a BLOCK verdict, or `None` to continue.
    ///
    /// Runs before any evidence is compiled, so a cooldown never touches
    /// concept progress.
    pub fn eligibility(
        &self,
        current_level: u32,
        target_level: u32,
        counter: &BlockedAttemptCounter,
        now: DateTime<Utc>,
    ) -> Option<GateVerdict> {
        let stage = GateStage::Eligibility;
        let window = self.config.cooldown_window();
        let recent = counter.count_within(now, window);
        let mut trail = Trail::default();
        trail.evidence.recent_blocks = recent;

        let next = current_level.saturating_add(1);
        if !trail.check(
            stage,
            target_level <= next,
            format!("target level at most {next}"),
            format!("requested {target_level}"),
        ) {
            trail.recommend(format!("Work towards level {next} first"));
            return Some(trail.block(stage, Some(SKIP_LEVEL_REASON.to_string())));
        }

        if !trail.check(
            stage,
            target_level > current_level,
            format!("target level above current level {current_level}"),
            format!("requested {target_level}"),
        ) {
            return Some(trail.block(
                stage,
                Some(format!("Already at level {current_level}")),
            ));
        }

        let max = self.config.max_blocks_per_window;
        if !trail.check(
            stage,
            recent < max,
            format!(
                "fewer than {max} blocked attempts in the last {}h",
                self.config.cooldown_window_hours
            ),
            format!("{recent} blocked"),
        ) {
            if let Some(ends) = counter.cooldown_ends_at(max, window) {
                trail.recommend(format!(
                    "Keep practicing; progression checks reopen at {}",
                    ends.format("%Y-%m-%d %H:%M UTC")
                ));
            }
            return Some(trail.block(
                stage,
                Some(format!(
                    "Cooldown active: {recent} blocked attempts for level {target_level} in the last {}h",
                    self.config.cooldown_window_hours
                )),
            ));
        }

        None
    }

    /// Stages 2 to 4.
    pub fn evaluate_evidence(
        &self,
        req: &EvidenceRequest<'_>,
    ) -> Result<GateVerdict, EvaluationError> {
        validate_requirement(req.requirement)?;
        let thresholds = self.scorer.config().clone();

        let by_id: HashMap<&str, &ConceptProgress> = req
            .progress
            .iter()
            .map(|p| (p.concept_id.as_str(), p))
            .collect();

        // Concepts the evidence is compiled over. With no configured
        // requirement list, everything the learner has practiced counts.
        let considered: Vec<ConceptId> = if req.required_concepts.is_empty() {
            req.progress.iter().map(|p| p.concept_id.clone()).collect()
        } else {
            req.required_concepts.iter().cloned().collect()
        };
        let evidence_progress: Vec<&ConceptProgress> = considered
            .iter()
            .filter_map(|c| by_id.get(c.as_str()).copied())
            .collect();
        let concepts = evidence_progress
            .iter()
            .map(|p| self.concept_evidence(p))
            .collect::<Result<Vec<_>, _>>()?;
        let aggregate = self.aggregate(&concepts, &evidence_progress);
        let overall = self.scorer.overall(&aggregate);

        let (mastered, unmastered): (Vec<ConceptId>, Vec<ConceptId>) = considered
            .iter()
            .cloned()
            .partition(|c| by_id.get(c.as_str()).is_some_and(|p| p.is_mastered()));
        let overdue: Vec<ConceptId> = req
            .progress
            .iter()
            .filter(|p| p.is_due(req.now))
            .map(|p| p.concept_id.clone())
            .collect();

        let mut trail = Trail::default();
        trail.evidence = EvidenceSnapshot {
            accuracy: aggregate.accuracy,
            consistency: aggregate.consistency,
            reasoning: aggregate.reasoning,
            retention: aggregate.retention,
            application: aggregate.application,
            overall,
            total_attempts: evidence_progress.iter().map(|p| p.total_attempts).sum(),
            total_time_spent_ms: evidence_progress
                .iter()
                .map(|p| p.total_time_spent_ms)
                .sum(),
            mastered_concepts: mastered,
            unmastered_concepts: unmastered.clone(),
            overdue_concepts: overdue.clone(),
            hours_since_major_session: req
                .profile
                .last_major_session_at
                .map(|t| (req.now - t).num_minutes() as f64 / 60.0),
            recent_blocks: req.recent_blocks,
        };

        // Stage 2: mastery evidence.
        let stage = GateStage::MasteryEvidence;
        tracing::debug!(learner = req.learner_id, %stage, "evaluating");
        if !trail.check(
            stage,
            !considered.is_empty(),
            "mastery evidence recorded",
            "no practiced concepts",
        ) {
            trail.recommend("Practice the concepts for this level");
            return Ok(trail.block(stage, Some("No mastery evidence recorded".to_string())));
        }

        let mut ok = true;
        for concept in &unmastered {
            ok &= trail.check(
                stage,
                false,
                format!("'{concept}' mastered"),
                match by_id.get(concept.as_str()) {
                    Some(p) => format!("mastery {:.2}", p.mastery_score),
                    None => "not attempted".to_string(),
                },
            );
            let missing_prereqs: Vec<ConceptId> = req
                .catalog
                .prerequisites(concept)
                .into_iter()
                .filter(|p| !by_id.get(p.as_str()).is_some_and(|pp| pp.is_mastered()))
                .collect();
            if missing_prereqs.is_empty() {
                trail.recommend(format!("Keep practicing '{concept}' until it is mastered"));
            } else {
                for prereq in missing_prereqs {
                    trail.recommend(format!("Master prerequisite '{prereq}' before '{concept}'"));
                }
            }
        }
        ok &= trail.check(
            stage,
            aggregate.accuracy >= thresholds.accuracy,
            format!("recent accuracy >= {:.2}", thresholds.accuracy),
            format!("{:.2}", aggregate.accuracy),
        );
        ok &= trail.check(
            stage,
            aggregate.consistency >= thresholds.consistency,
            format!("consistency >= {:.2}", thresholds.consistency),
            format!("{:.2}", aggregate.consistency),
        );
        if !ok {
            if aggregate.accuracy < thresholds.accuracy
                || aggregate.consistency < thresholds.consistency
            {
                trail.recommend("Keep answering correctly across several sessions");
            }
            return Ok(trail.block(stage, None));
        }

        // Stage 3: retention and application.
        let stage = GateStage::RetentionApplication;
        tracing::debug!(learner = req.learner_id, %stage, "evaluating");
        // Without a recorded major session the rest counts from the last attempt.
        let rest_from = req
            .profile
            .last_major_session_at
            .or(req.profile.last_attempt_at);
        let rested_until = rest_from.map(|t| t + self.config.retention_wait());
        let mut ok = trail.check(
            stage,
            rested_until.map_or(true, |until| req.now >= until),
            format!(
                "{}h since the last learning session",
                self.config.retention_wait_hours
            ),
            match rest_from {
                Some(t) => format!("{:.1}h", (req.now - t).num_minutes() as f64 / 60.0),
                None => "no recorded activity".to_string(),
            },
        );
        if let Some(until) = rested_until.filter(|&u| req.now < u) {
            trail.recommend(format!(
                "Let it settle: progression opens at {}",
                until.format("%Y-%m-%d %H:%M UTC")
            ));
        }
        if !trail.check(
            stage,
            aggregate.application >= thresholds.application,
            format!("application >= {:.2}", thresholds.application),
            if aggregate.application_measured {
                format!("{:.2}", aggregate.application)
            } else {
                "no assessment attempts".to_string()
            },
        ) {
            ok = false;
            trail.recommend("Answer assessment questions on the required concepts");
        }
        if !trail.check(
            stage,
            overdue.is_empty(),
            "no concepts overdue for review",
            format!("{} overdue", overdue.len()),
        ) {
            ok = false;
            trail.recommend(format!("Review overdue concepts first: {}", overdue.join(", ")));
        }
        if req.requirement.retention_test_required {
            for concept in &concepts {
                let passed = concept.scores.retention_measured
                    && concept.scores.retention >= thresholds.retention;
                if !trail.check(
                    stage,
                    passed,
                    format!(
                        "'{}' retention >= {:.2} after a break",
                        concept.concept_id, thresholds.retention
                    ),
                    if concept.scores.retention_measured {
                        format!("{:.2}", concept.scores.retention)
                    } else {
                        "not yet tested".to_string()
                    },
                ) {
                    ok = false;
                    trail.recommend(format!(
                        "Return to '{}' after a day away and answer it again",
                        concept.concept_id
                    ));
                }
            }
        }
        if !ok {
            return Ok(trail.block(stage, None));
        }

        // Stage 4: strict final evaluation.
        let stage = GateStage::FinalEvaluation;
        tracing::debug!(learner = req.learner_id, %stage, "evaluating");
        let mut ok = true;
        for dimension in Dimension::ALL {
            let measured = aggregate.is_measured(dimension);
            let score = aggregate.get(dimension);
            let threshold = thresholds.threshold(dimension);
            ok &= trail.check(
                stage,
                measured && score >= threshold,
                format!("{dimension} >= {threshold:.2}"),
                if measured {
                    format!("{score:.2}")
                } else {
                    "no evidence yet".to_string()
                },
            );
        }
        let total_attempts = trail.evidence.total_attempts;
        if !trail.check(
            stage,
            total_attempts >= self.config.min_total_attempts,
            format!("at least {} attempts", self.config.min_total_attempts),
            total_attempts.to_string(),
        ) {
            ok = false;
            trail.recommend("Attempt more questions on the required concepts");
        }
        let spent = trail.evidence.total_time_spent_ms;
        let needed = req.requirement.min_time_spent_ms;
        if !trail.check(
            stage,
            spent >= needed,
            format!("at least {} minutes of practice", needed / 60_000),
            format!("{} minutes", spent / 60_000),
        ) {
            ok = false;
            trail.recommend(format!(
                "Spend more time practicing: {} of {} minutes",
                spent / 60_000,
                needed / 60_000
            ));
        }
        if !ok {
            return Ok(trail.block(stage, None));
        }

        let result = self.challenge.assess(&ChallengeContext {
            learner_id: req.learner_id,
            target_level: req.target_level,
            requirement: req.requirement,
            concepts: &concepts,
        })?;
        trail.check(
            stage,
            result.passed,
            format!("{} challenge assessment", self.challenge.name()),
            if result.passed {
                "passed".to_string()
            } else {
                result.failures.join("; ")
            },
        );
        if !result.passed {
            trail.recommend("Strengthen the weakest concept before trying again");
            return Ok(trail.block(stage, None));
        }

        Ok(trail.allow(format!(
            "All requirements met for level {}",
            req.target_level
        )))
    }

    /// Fresh dimension scores for one concept, rejecting corrupt stored values.
    fn concept_evidence(&self, p: &ConceptProgress) -> Result<ConceptEvidence, EvaluationError> {
        let stored = [
            ("mastery", p.mastery_score),
            ("consistency", p.consistency_score),
            ("retention", p.retention_score),
            ("application", p.application_score),
        ];
        let history = p.reasoning_score_history.iter().map(|&v| ("reasoning", v));
        for (name, value) in stored.into_iter().chain(history) {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(EvaluationError::ScoreOutOfRange {
                    dimension: format!("{}/{name}", p.concept_id),
                    value,
                });
            }
        }
        let scores = self.scorer.dimensions(p);
        Ok(ConceptEvidence {
            concept_id: p.concept_id.clone(),
            overall: self.scorer.overall(&scores),
            scores,
        })
    }

    /// Learner-level scores over the considered concepts.
    ///
    /// Retention averages only measured concepts. Application pools the
    /// assessment attempts of every concept.
    fn aggregate(&self, concepts: &[ConceptEvidence], progress: &[&ConceptProgress]) -> DimensionScores {
        let avg = |f: fn(&DimensionScores) -> f64| {
            mean(concepts.iter().map(|c| f(&c.scores))).unwrap_or(0.0)
        };
        let retention = mean(
            concepts
                .iter()
                .filter(|c| c.scores.retention_measured)
                .map(|c| c.scores.retention),
        );
        let (assessed, assessed_correct) = progress.iter().fold((0u32, 0u32), |(a, c), p| {
            (a + p.assessment_attempts, c + p.assessment_correct)
        });
        DimensionScores {
            accuracy: avg(|s| s.accuracy),
            consistency: avg(|s| s.consistency),
            reasoning: avg(|s| s.reasoning),
            retention: retention.unwrap_or(crate::progress::UNKNOWN_SCORE),
            application: if assessed == 0 {
                crate::progress::UNKNOWN_SCORE
            } else {
                assessed_correct as f64 / assessed as f64
            },
            retention_measured: retention.is_some(),
            application_measured: assessed > 0,
        }
    }
}

/// Reject requirements the gate cannot evaluate meaningfully.
pub fn validate_requirement(req: &LevelRequirement) -> Result<(), EvaluationError> {
    if !req.mastery_threshold.is_finite() || !(0.0..=1.0).contains(&req.mastery_threshold) {
        return Err(EvaluationError::InvalidRequirement {
            level: req.level,
            message: format!("mastery threshold {} is outside [0, 1]", req.mastery_threshold),
        });
    }
    Ok(())
}
