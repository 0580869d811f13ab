//! Spaced-repetition review scheduling.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::model::{ConceptId, ConceptProgress};
use crate::statistics::unit;

/// A concept whose review time has passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueReview {
    pub concept_id: ConceptId,
    pub priority: f64,
    pub overdue_ms: u64,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SpacedRepetitionScheduler {
    config: SchedulerConfig,
}

impl SpacedRepetitionScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Index into the interval table for this outcome.
    ///
    /// A freshly mastered concept gets the mastered index. A correct answer
    /// scales with consistency, an incorrect one resets to the first interval.
    pub fn interval_index(&self, correct: bool, just_mastered: bool, consistency: f64) -> usize {
        let len = self.config.intervals_days.len();
        if len == 0 {
            return 0;
        }
        let last = len - 1;
        if just_mastered {
            self.config.mastered_index.min(last)
        } else if correct {
            ((unit(consistency) * len as f64).floor() as usize).min(last)
        } else {
            0
        }
    }

    pub fn interval_days(&self, index: usize) -> u32 {
        let intervals = &self.config.intervals_days;
        intervals
            .get(index)
            .or(intervals.last())
            .copied()
            .unwrap_or(1)
    }

    /// Set the next review time on `progress` and return it.
    pub fn schedule(
        &self,
        progress: &mut ConceptProgress,
        correct: bool,
        just_mastered: bool,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let index = self.interval_index(correct, just_mastered, progress.consistency_score);
        let days = self.interval_days(index);
        let due = now + Duration::days(i64::from(days));
        progress.review_interval_days = Some(days);
        progress.next_review_due_at = Some(due);
        due
    }

    /// Review priority: low mastery, long overdue and low consistency all
    /// push a concept up the list.
    pub fn priority(&self, progress: &ConceptProgress, now: DateTime<Utc>) -> f64 {
        let horizon_ms = Duration::days(self.config.overdue_horizon_days.max(1)).num_milliseconds();
        let overdue = (progress.overdue_ms(now) as f64 / horizon_ms as f64).min(1.0);
        self.config.priority_mastery_weight * (1.0 - unit(progress.mastery_score))
            + self.config.priority_overdue_weight * overdue
            + self.config.priority_consistency_weight * (1.0 - unit(progress.consistency_score))
    }

    /// Due concepts, highest priority first.
    pub fn due_reviews<'a, I>(&self, progress: I, now: DateTime<Utc>) -> Vec<DueReview>
    where
        I: IntoIterator<Item = &'a ConceptProgress>,
    {
        let mut due: Vec<DueReview> = progress
            .into_iter()
            .filter(|p| p.is_due(now))
            .filter_map(|p| {
                p.next_review_due_at.map(|due_at| DueReview {
                    concept_id: p.concept_id.clone(),
                    priority: self.priority(p, now),
                    overdue_ms: p.overdue_ms(now),
                    due_at,
                })
            })
            .collect();
        due.sort_by(|a, b| match b.priority.total_cmp(&a.priority) {
            Ordering::Equal => a.concept_id.cmp(&b.concept_id),
            other => other,
        });
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn progress(concept: &str, mastery: f64, consistency: f64, due: Option<DateTime<Utc>>) -> ConceptProgress {
        let mut p = ConceptProgress::new("l1", concept, t0());
        p.mastery_score = mastery;
        p.consistency_score = consistency;
        p.next_review_due_at = due;
        p
    }

    #[test]
    fn perfect_consistency_gets_longest_interval() {
        let s = SpacedRepetitionScheduler::default();
        let mut p = progress("c1", 0.9, 1.0, None);
        let due = s.schedule(&mut p, true, false, t0());
        assert_eq!(due, t0() + Duration::days(60));
        assert_eq!(p.review_interval_days, Some(60));
    }

    #[test]
    fn incorrect_resets_to_one_day() {
        let s = SpacedRepetitionScheduler::default();
        let mut p = progress("c1", 0.9, 1.0, None);
        s.schedule(&mut p, true, false, t0());
        let due = s.schedule(&mut p, false, false, t0());
        assert_eq!(due, t0() + Duration::days(1));
    }

    #[test]
    fn just_mastered_uses_thirty_days() {
        let s = SpacedRepetitionScheduler::default();
        assert_eq!(s.interval_index(true, true, 1.0), 4);
        assert_eq!(s.interval_days(4), 30);
    }

    #[test]
    fn correct_interval_scales_with_consistency() {
        let s = SpacedRepetitionScheduler::default();
        assert_eq!(s.interval_index(true, false, 0.0), 0);
        assert_eq!(s.interval_index(true, false, 0.5), 3);
        assert_eq!(s.interval_index(true, false, 0.8), 4);
        assert_eq!(s.interval_index(true, false, 0.99), 5);
    }

    #[test]
    fn empty_interval_table_falls_back_to_one_day() {
        let s = SpacedRepetitionScheduler::new(SchedulerConfig {
            intervals_days: Vec::new(),
            ..Default::default()
        });
        assert_eq!(s.interval_days(s.interval_index(true, false, 1.0)), 1);
    }

    #[test]
    fn due_reviews_sorted_by_priority() {
        let s = SpacedRepetitionScheduler::default();
        let now = t0() + Duration::days(10);
        let concepts = vec![
            progress("strong", 0.95, 0.9, Some(t0() + Duration::days(9))),
            progress("weak", 0.3, 0.2, Some(t0() + Duration::days(9))),
            progress("overdue", 0.95, 0.9, Some(t0())),
            progress("future", 0.1, 0.1, Some(t0() + Duration::days(20))),
            progress("unscheduled", 0.1, 0.1, None),
        ];
        let due = s.due_reviews(&concepts, now);
        let order: Vec<&str> = due.iter().map(|d| d.concept_id.as_str()).collect();
        assert_eq!(order, vec!["weak", "overdue", "strong"]);
        assert_eq!(due[1].overdue_ms, 10 * 24 * 3_600_000);
    }

    #[test]
    fn priority_components() {
        let s = SpacedRepetitionScheduler::default();
        let now = t0() + Duration::days(14);
        // Overdue by 14 days saturates the overdue term.
        let p = progress("c", 0.5, 0.5, Some(t0()));
        let expected = 0.4 * 0.5 + 0.3 * 1.0 + 0.3 * 0.5;
        assert!((s.priority(&p, now) - expected).abs() < 1e-9);
    }
}
