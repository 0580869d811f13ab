//! Rolling per-concept statistics.
//!
//! Consistency and retention only ever look at the bounded recent window in
//! [`ConceptProgress::recent_outcomes`], never the full attempt log.

use chrono::{DateTime, Utc};

use crate::config::ProgressConfig;
use crate::model::{Attempt, AttemptContext, ConceptProgress, OutcomeSample, RECENT_WINDOW};
use crate::statistics::{bernoulli_variance, incremental_mean, mean, recent_accuracy, unit};

/// Score reported for retention and application when there is no evidence yet.
pub const UNKNOWN_SCORE: f64 = 0.5;

/// Attempts before consistency carries any signal.
const MIN_CONSISTENCY_ATTEMPTS: u32 = 3;

/// Difficulty is reconsidered every this many attempts.
const DIFFICULTY_STEP: u32 = 5;

/// The parts of an attempt the aggregator consumes.
#[derive(Debug, Clone, Copy)]
pub struct AttemptObservation {
    pub timestamp: DateTime<Utc>,
    pub correct: bool,
    pub attempts_used: u32,
    pub time_spent_ms: u64,
    pub reasoning_score: f64,
    pub context: AttemptContext,
}

impl From<&Attempt> for AttemptObservation {
    fn from(a: &Attempt) -> Self {
        Self {
            timestamp: a.timestamp,
            correct: a.correct,
            attempts_used: a.attempts_used,
            time_spent_ms: a.time_spent_ms,
            reasoning_score: a.reasoning_score,
            context: a.context,
        }
    }
}

/// Folds attempts into [`ConceptProgress`].
#[derive(Debug, Clone, Default)]
pub struct ConceptProgressAggregator {
    config: ProgressConfig,
}

impl ConceptProgressAggregator {
    pub fn new(config: ProgressConfig) -> Self {
        Self { config }
    }

    /// Apply one attempt and recompute the window-derived scores.
    pub fn record(&self, progress: &mut ConceptProgress, obs: &AttemptObservation) {
        progress.total_attempts += 1;
        if obs.correct {
            progress.correct_attempts += 1;
        }
        let n = progress.total_attempts;
        progress.rolling_average_attempts =
            incremental_mean(progress.rolling_average_attempts, obs.attempts_used as f64, n);
        progress.rolling_average_time_ms =
            incremental_mean(progress.rolling_average_time_ms, obs.time_spent_ms as f64, n);
        progress.total_time_spent_ms = progress.total_time_spent_ms.saturating_add(obs.time_spent_ms);

        progress.reasoning_score_history.push_back(unit(obs.reasoning_score));
        while progress.reasoning_score_history.len() > RECENT_WINDOW {
            progress.reasoning_score_history.pop_front();
        }

        progress.recent_outcomes.push_back(OutcomeSample {
            timestamp: obs.timestamp,
            correct: obs.correct,
            context: obs.context,
        });
        while progress.recent_outcomes.len() > RECENT_WINDOW {
            progress.recent_outcomes.pop_front();
        }

        if obs.context == AttemptContext::Assessment {
            progress.assessment_attempts += 1;
            if obs.correct {
                progress.assessment_correct += 1;
            }
        }

        if obs.timestamp > progress.last_attempt_at || n == 1 {
            progress.last_attempt_at = obs.timestamp;
        }

        progress.consistency_score = consistency(progress);
        let (retention, measured) = self.retention(progress);
        progress.retention_score = retention;
        progress.retention_measured = measured;
        let (application, measured) = application(progress);
        progress.application_score = application;
        progress.application_measured = measured;

        if n % DIFFICULTY_STEP == 0 {
            progress.difficulty_level = next_difficulty(progress);
        }
    }

    /// Post-gap accuracy over the recent window.
    ///
    /// The window is split into sessions wherever consecutive attempts are
    /// more than the session gap apart. Sessions that follow a gap longer than
    /// the retention gap contribute their accuracy. Returns the mean of those
    /// accuracies and whether any gap qualified.
    pub fn retention(&self, progress: &ConceptProgress) -> (f64, bool) {
        let mut samples: Vec<&OutcomeSample> = progress.recent_outcomes.iter().collect();
        samples.sort_by_key(|s| s.timestamp);

        let session_gap = self.config.session_gap();
        let retention_gap = self.config.retention_gap();

        let mut post_gap_accuracies = Vec::new();
        // (correct, total) for the session being accumulated, if it follows a long gap.
        let mut current: Option<(u32, u32)> = None;

        for pair in samples.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            let gap = next.timestamp - prev.timestamp;
            if gap > session_gap {
                if let Some((c, t)) = current.take() {
                    post_gap_accuracies.push(c as f64 / t as f64);
                }
                if gap > retention_gap {
                    current = Some((0, 0));
                }
            }
            if let Some((c, t)) = current.as_mut() {
                *t += 1;
                if next.correct {
                    *c += 1;
                }
            }
        }
        if let Some((c, t)) = current {
            post_gap_accuracies.push(c as f64 / t as f64);
        }

        match mean(post_gap_accuracies) {
            Some(score) => (unit(score), true),
            None => (UNKNOWN_SCORE, false),
        }
    }
}

/// `max(0, 1 - 2·variance)` of correctness over the recent window.
pub fn consistency(progress: &ConceptProgress) -> f64 {
    if progress.total_attempts < MIN_CONSISTENCY_ATTEMPTS
        || progress.recent_outcomes.len() < MIN_CONSISTENCY_ATTEMPTS as usize
    {
        return 0.0;
    }
    let outcomes: Vec<bool> = progress.recent_outcomes.iter().map(|s| s.correct).collect();
    unit(1.0 - 2.0 * bernoulli_variance(&outcomes))
}

/// Accuracy on assessment-context attempts, and whether there were any.
pub fn application(progress: &ConceptProgress) -> (f64, bool) {
    if progress.assessment_attempts == 0 {
        (UNKNOWN_SCORE, false)
    } else {
        (
            progress.assessment_correct as f64 / progress.assessment_attempts as f64,
            true,
        )
    }
}

fn next_difficulty(progress: &ConceptProgress) -> u8 {
    let accuracy = recent_accuracy(&progress.recent_outcomes, DIFFICULTY_STEP as usize);
    let level = progress.difficulty_level;
    if accuracy >= 0.85 {
        (level + 1).min(5)
    } else if accuracy < 0.5 {
        level.saturating_sub(1).max(1)
    } else {
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn obs(at: DateTime<Utc>, correct: bool) -> AttemptObservation {
        AttemptObservation {
            timestamp: at,
            correct,
            attempts_used: 1,
            time_spent_ms: 10_000,
            reasoning_score: 0.8,
            context: AttemptContext::Practice,
        }
    }

    fn feed(outcomes: &[(i64, bool)]) -> ConceptProgress {
        let agg = ConceptProgressAggregator::default();
        let mut p = ConceptProgress::new("l1", "c1", t0());
        for &(minutes, correct) in outcomes {
            agg.record(&mut p, &obs(t0() + Duration::minutes(minutes), correct));
        }
        p
    }

    #[test]
    fn counters_and_rolling_averages() {
        let agg = ConceptProgressAggregator::default();
        let mut p = ConceptProgress::new("l1", "c1", t0());
        let times = [10_000, 8_000, 9_000];
        for (i, &ms) in times.iter().enumerate() {
            let mut o = obs(t0() + Duration::minutes(i as i64), i != 1);
            o.time_spent_ms = ms;
            o.attempts_used = i as u32 + 1;
            agg.record(&mut p, &o);
            assert_eq!(p.total_attempts, i as u32 + 1);
        }
        assert_eq!(p.correct_attempts, 2);
        assert!((p.rolling_average_time_ms - 9_000.0).abs() < 1e-9);
        assert!((p.rolling_average_attempts - 2.0).abs() < 1e-9);
        assert_eq!(p.total_time_spent_ms, 27_000);
    }

    #[test]
    fn histories_are_bounded() {
        let outcomes: Vec<(i64, bool)> = (0..25).map(|i| (i, true)).collect();
        let p = feed(&outcomes);
        assert_eq!(p.total_attempts, 25);
        assert_eq!(p.reasoning_score_history.len(), RECENT_WINDOW);
        assert_eq!(p.recent_outcomes.len(), RECENT_WINDOW);
    }

    #[test]
    fn consistency_needs_three_attempts() {
        assert_eq!(feed(&[(0, true), (1, true)]).consistency_score, 0.0);
        assert_eq!(feed(&[(0, true), (1, true), (2, true)]).consistency_score, 1.0);
    }

    #[test]
    fn consistency_uses_recent_window_only() {
        // Ten early failures fall out of the window once ten successes arrive.
        let mut outcomes: Vec<(i64, bool)> = (0..10).map(|i| (i, false)).collect();
        outcomes.extend((10..20).map(|i| (i, true)));
        let p = feed(&outcomes);
        assert_eq!(p.consistency_score, 1.0);

        // Alternating outcomes: p = 0.5, variance 0.25, score 0.5.
        let alternating: Vec<(i64, bool)> = (0..10).map(|i| (i, i % 2 == 0)).collect();
        assert!((feed(&alternating).consistency_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn retention_defaults_without_long_gap() {
        let p = feed(&[(0, true), (30, true), (90, false)]);
        assert_eq!(p.retention_score, UNKNOWN_SCORE);
        assert!(!p.retention_measured);
    }

    #[test]
    fn retention_measures_post_gap_accuracy() {
        let day = 24 * 60;
        // Session one, then a 2-day gap, then a session of 1/2 correct,
        // then another 2-day gap and a fully correct session.
        let p = feed(&[
            (0, true),
            (5, true),
            (2 * day, true),
            (2 * day + 5, false),
            (4 * day, true),
            (4 * day + 5, true),
        ]);
        assert!(p.retention_measured);
        assert!((p.retention_score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn short_gaps_split_sessions_without_measuring() {
        // A 3-hour gap ends the post-gap session but does not start a new one.
        let day = 24 * 60;
        let p = feed(&[(0, true), (2 * day, false), (2 * day + 180, true)]);
        assert!(p.retention_measured);
        assert_eq!(p.retention_score, 0.0);
    }

    #[test]
    fn retention_forgets_gaps_older_than_the_window() {
        let day = 24 * 60;
        let mut outcomes = vec![(0, true), (2 * day, false)];
        outcomes.extend((1..=8).map(|m| (2 * day + m, true)));
        let p = feed(&outcomes);
        assert_eq!(p.recent_outcomes.len(), RECENT_WINDOW);
        assert!(p.retention_measured);
        assert!((p.retention_score - 8.0 / 9.0).abs() < 1e-9);

        // One more attempt pushes the pre-gap attempt out of the window.
        outcomes.push((2 * day + 9, true));
        let p = feed(&outcomes);
        assert_eq!(p.total_attempts, 11);
        assert!(!p.retention_measured);
        assert_eq!(p.retention_score, UNKNOWN_SCORE);
    }

    #[test]
    fn application_from_assessment_attempts() {
        let agg = ConceptProgressAggregator::default();
        let mut p = ConceptProgress::new("l1", "c1", t0());
        agg.record(&mut p, &obs(t0(), true));
        assert_eq!(p.application_score, UNKNOWN_SCORE);
        assert!(!p.application_measured);

        for (i, correct) in [true, true, false, true].into_iter().enumerate() {
            let mut o = obs(t0() + Duration::minutes(i as i64 + 1), correct);
            o.context = AttemptContext::Assessment;
            agg.record(&mut p, &o);
        }
        assert!(p.application_measured);
        assert!((p.application_score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn difficulty_adapts_every_five_attempts() {
        let p = feed(&(0..5).map(|i| (i, true)).collect::<Vec<_>>());
        assert_eq!(p.difficulty_level, 2);

        let p = feed(&(0..10).map(|i| (i, true)).collect::<Vec<_>>());
        assert_eq!(p.difficulty_level, 3);

        let mut outcomes: Vec<(i64, bool)> = (0..5).map(|i| (i, true)).collect();
        outcomes.extend((5..10).map(|i| (i, false)));
        assert_eq!(feed(&outcomes).difficulty_level, 1);
    }
}
