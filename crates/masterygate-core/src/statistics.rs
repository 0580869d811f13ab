//! Small numeric helpers shared by the aggregator, scorer and gate.

use crate::model::OutcomeSample;

/// Incremental mean update: `avg += (new - avg) / n`.
///
/// `n` is the sample count *including* the new value.
pub fn incremental_mean(avg: f64, new: f64, n: u32) -> f64 {
    if n == 0 {
        return avg;
    }
    avg + (new - avg) / n as f64
}

/// Arithmetic mean, or `None` for an empty input.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Population variance of a boolean sequence treated as 0/1.
pub fn bernoulli_variance(outcomes: &[bool]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let p = outcomes.iter().filter(|&&c| c).count() as f64 / outcomes.len() as f64;
    p * (1.0 - p)
}

/// Fraction of correct outcomes among the last `n` samples.
///
/// Returns 0 for an empty window.
pub fn recent_accuracy<'a, I>(samples: I, n: usize) -> f64
where
    I: IntoIterator<Item = &'a OutcomeSample>,
    I::IntoIter: DoubleEndedIterator,
{
    let (correct, total) = samples
        .into_iter()
        .rev()
        .take(n)
        .fold((0usize, 0usize), |(c, t), s| (c + usize::from(s.correct), t + 1));
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    }
}

/// Clamp into [0, 1], mapping NaN to 0.
pub fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
