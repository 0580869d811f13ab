//! Persistence boundary for attempts, progress and decisions.
//!
//! Writes are synchronous and must be durable when they return. The engine
//! only acknowledges an operation after every write it issued has succeeded.
//!
//! Keyed records are saved before the log entries they account for, with the
//! entries held in a pending field until the logs have them. An operation
//! interrupted between the two is completed the next time the record loads.
//!
//! A store has one owning process. The engine serializes work per learner
//! inside that process only; two processes writing the same store can
//! interleave updates to one learner.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::error::StorageError;
use crate::model::{
    Attempt, BlockedAttemptCounter, ConceptProgress, LearnerId, LearnerProfile, MasteryAchievement,
    ProgressionDecision,
};

/// Storage backend used by [`crate::engine::MasteryEngine`].
///
/// Attempts, achievements and decisions are append-only logs. Progress,
/// profiles and cooldown counters are keyed records replaced on save.
pub trait Persistence: Send + Sync {
    fn load_progress(
        &self,
        learner_id: &str,
        concept_id: &str,
    ) -> Result<Option<ConceptProgress>, StorageError>;

    fn save_progress(&self, progress: &ConceptProgress) -> Result<(), StorageError>;

    /// All concept progress for a learner, ordered by concept id.
    fn list_progress(&self, learner_id: &str) -> Result<Vec<ConceptProgress>, StorageError>;

    fn append_attempt(&self, attempt: &Attempt) -> Result<(), StorageError>;

    /// A learner's attempts in the order they were appended.
    fn attempts(&self, learner_id: &str) -> Result<Vec<Attempt>, StorageError>;

    fn append_achievement(&self, achievement: &MasteryAchievement) -> Result<(), StorageError>;

    fn achievements(&self, learner_id: &str) -> Result<Vec<MasteryAchievement>, StorageError>;

    fn append_decision(&self, decision: &ProgressionDecision) -> Result<(), StorageError>;

    fn decisions(&self, learner_id: &str) -> Result<Vec<ProgressionDecision>, StorageError>;

    fn load_profile(&self, learner_id: &str) -> Result<Option<LearnerProfile>, StorageError>;

    fn save_profile(&self, profile: &LearnerProfile) -> Result<(), StorageError>;

    fn load_block_counter(
        &self,
        learner_id: &str,
        target_level: u32,
    ) -> Result<Option<BlockedAttemptCounter>, StorageError>;

    fn save_block_counter(&self, counter: &BlockedAttemptCounter) -> Result<(), StorageError>;

    /// Every learner with at least one stored record.
    fn learners(&self) -> Result<Vec<LearnerId>, StorageError>;

    fn has_attempt(&self, learner_id: &str, id: Uuid) -> Result<bool, StorageError> {
        Ok(self.attempts(learner_id)?.iter().any(|a| a.id == id))
    }

    fn has_achievement(&self, learner_id: &str, id: Uuid) -> Result<bool, StorageError> {
        Ok(self.achievements(learner_id)?.iter().any(|a| a.id == id))
    }

    fn has_decision(&self, learner_id: &str, id: Uuid) -> Result<bool, StorageError> {
        Ok(self.decisions(learner_id)?.iter().any(|d| d.id == id))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    progress: BTreeMap<(LearnerId, String), ConceptProgress>,
    attempts: Vec<Attempt>,
    achievements: Vec<MasteryAchievement>,
    decisions: Vec<ProgressionDecision>,
    profiles: BTreeMap<LearnerId, LearnerProfile>,
    counters: BTreeMap<(LearnerId, u32), BlockedAttemptCounter>,
}

/// In-process store. Nothing survives the process; used for tests and
/// embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Poisoned(e.to_string()))
    }
}

impl Persistence for MemoryStore {
    fn load_progress(
        &self,
        learner_id: &str,
        concept_id: &str,
    ) -> Result<Option<ConceptProgress>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .progress
            .get(&(learner_id.to_string(), concept_id.to_string()))
            .cloned())
    }

    fn save_progress(&self, progress: &ConceptProgress) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.progress.insert(
            (progress.learner_id.clone(), progress.concept_id.clone()),
            progress.clone(),
        );
        Ok(())
    }

    fn list_progress(&self, learner_id: &str) -> Result<Vec<ConceptProgress>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .progress
            .values()
            .filter(|p| p.learner_id == learner_id)
            .cloned()
            .collect())
    }

    fn append_attempt(&self, attempt: &Attempt) -> Result<(), StorageError> {
        self.lock()?.attempts.push(attempt.clone());
        Ok(())
    }

    fn attempts(&self, learner_id: &str) -> Result<Vec<Attempt>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .attempts
            .iter()
            .filter(|a| a.learner_id == learner_id)
            .cloned()
            .collect())
    }

    fn append_achievement(&self, achievement: &MasteryAchievement) -> Result<(), StorageError> {
        self.lock()?.achievements.push(achievement.clone());
        Ok(())
    }

    fn achievements(&self, learner_id: &str) -> Result<Vec<MasteryAchievement>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .achievements
            .iter()
            .filter(|a| a.learner_id == learner_id)
            .cloned()
            .collect())
    }

    fn append_decision(&self, decision: &ProgressionDecision) -> Result<(), StorageError> {
        self.lock()?.decisions.push(decision.clone());
        Ok(())
    }

    fn decisions(&self, learner_id: &str) -> Result<Vec<ProgressionDecision>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .decisions
            .iter()
            .filter(|d| d.learner_id == learner_id)
            .cloned()
            .collect())
    }

    fn load_profile(&self, learner_id: &str) -> Result<Option<LearnerProfile>, StorageError> {
        Ok(self.lock()?.profiles.get(learner_id).cloned())
    }

    fn save_profile(&self, profile: &LearnerProfile) -> Result<(), StorageError> {
        self.lock()?
            .profiles
            .insert(profile.learner_id.clone(), profile.clone());
        Ok(())
    }

    fn load_block_counter(
        &self,
        learner_id: &str,
        target_level: u32,
    ) -> Result<Option<BlockedAttemptCounter>, StorageError> {
        Ok(self
            .lock()?
            .counters
            .get(&(learner_id.to_string(), target_level))
            .cloned())
    }

    fn save_block_counter(&self, counter: &BlockedAttemptCounter) -> Result<(), StorageError> {
        self.lock()?.counters.insert(
            (counter.learner_id.clone(), counter.target_level),
            counter.clone(),
        );
        Ok(())
    }

    fn learners(&self) -> Result<Vec<LearnerId>, StorageError> {
        let state = self.lock()?;
        let mut ids: BTreeSet<LearnerId> = state.profiles.keys().cloned().collect();
        ids.extend(state.progress.keys().map(|(l, _)| l.clone()));
        ids.extend(state.attempts.iter().map(|a| a.learner_id.clone()));
        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttemptContext, DecisionOutcome};
    use chrono::Utc;
    use uuid::Uuid;

    fn attempt(learner: &str, concept: &str) -> Attempt {
        Attempt {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            learner_id: learner.into(),
            concept_id: concept.into(),
            correct: true,
            attempts_used: 1,
            time_spent_ms: 1_000,
            reasoning_text: "because of the rule".into(),
            reasoning_score: 0.7,
            context: AttemptContext::Practice,
        }
    }

    #[test]
    fn progress_round_trip_and_listing() {
        let store = MemoryStore::new();
        assert!(store.load_progress("l1", "c1").unwrap().is_none());

        let mut p = ConceptProgress::new("l1", "c2", Utc::now());
        store.save_progress(&p).unwrap();
        store
            .save_progress(&ConceptProgress::new("l1", "c1", Utc::now()))
            .unwrap();
        store
            .save_progress(&ConceptProgress::new("l2", "c1", Utc::now()))
            .unwrap();

        p.total_attempts = 4;
        store.save_progress(&p).unwrap();
        assert_eq!(store.load_progress("l1", "c2").unwrap().unwrap().total_attempts, 4);

        let listed: Vec<_> = store
            .list_progress("l1")
            .unwrap()
            .into_iter()
            .map(|p| p.concept_id)
            .collect();
        assert_eq!(listed, vec!["c1", "c2"]);
    }

    #[test]
    fn logs_are_filtered_by_learner_in_order() {
        let store = MemoryStore::new();
        let first = attempt("l1", "a");
        let second = attempt("l1", "b");
        store.append_attempt(&first).unwrap();
        store.append_attempt(&attempt("l2", "a")).unwrap();
        store.append_attempt(&second).unwrap();

        let ids: Vec<_> = store.attempts("l1").unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(store.learners().unwrap(), vec!["l1", "l2"]);
    }

    #[test]
    fn counters_keyed_by_level() {
        let store = MemoryStore::new();
        let mut c = BlockedAttemptCounter::new("l1", 3);
        c.record(DecisionOutcome::Block, Utc::now());
        store.save_block_counter(&c).unwrap();
        assert_eq!(store.load_block_counter("l1", 3).unwrap().unwrap().blocks.len(), 1);
        assert!(store.load_block_counter("l1", 4).unwrap().is_none());
    }
}
