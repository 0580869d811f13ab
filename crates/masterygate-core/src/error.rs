//! Engine error types.
//!
//! Each concern gets its own enum so callers can tell a rejected submission
//! apart from a storage failure without string matching.

use thiserror::Error;

/// A malformed attempt. Rejected immediately and never recorded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The justification text is empty or whitespace only.
    #[error("reasoning text is required")]
    MissingReasoning,

    /// `time_spent_ms` was negative.
    #[error("time spent must be non-negative, got {0}ms")]
    NegativeTime(i64),

    /// `attempts_used` must be at least one.
    #[error("attempts used must be at least 1")]
    ZeroAttemptsUsed,

    /// The concept is not in the catalog.
    #[error("unknown concept: {0}")]
    UnknownConcept(String),

    /// The learner id is empty.
    #[error("learner id is required")]
    MissingLearner,
}

/// A scorer or gate failed internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// The reasoning analyzer could not produce an assessment.
    #[error("reasoning analysis failed: {0}")]
    Analyzer(String),

    /// A level requirement is unusable (e.g. threshold outside [0, 1]).
    #[error("invalid requirement for level {level}: {message}")]
    InvalidRequirement { level: u32, message: String },

    /// A computed score left the [0, 1] range or was not finite.
    #[error("score out of range for {dimension}: {value}")]
    ScoreOutOfRange { dimension: String, value: f64 },

    /// The challenge assessment could not be run.
    #[error("challenge assessment failed: {0}")]
    Challenge(String),
}

/// A durable write or read failed. Always fatal to the caller.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(String),

    /// A lock guarding in-memory state was poisoned.
    #[error("storage lock poisoned: {0}")]
    Poisoned(String),
}

impl StorageError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Configuration problems found while loading or resolving settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// No requirement is configured for the level.
    #[error("no level requirement configured for level {0}")]
    MissingLevel(u32),
}

/// Top-level error returned by [`crate::engine::MasteryEngine`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EngineError {
    /// Returns `true` if the caller can fix the input and resubmit.
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }

    /// Returns `true` if a durable write failed and the operation did not complete.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_engine_errors() {
        let e: EngineError = ValidationError::MissingReasoning.into();
        assert!(e.is_validation());
        assert!(!e.is_fatal());

        let e: EngineError = StorageError::Poisoned("progress".into()).into();
        assert!(e.is_fatal());
    }

    #[test]
    fn validation_messages() {
        assert_eq!(
            ValidationError::NegativeTime(-5).to_string(),
            "time spent must be non-negative, got -5ms"
        );
        assert_eq!(
            ValidationError::UnknownConcept("C9".into()).to_string(),
            "unknown concept: C9"
        );
    }

    #[test]
    fn config_error_messages() {
        assert_eq!(
            ConfigError::MissingLevel(4).to_string(),
            "no level requirement configured for level 4"
        );
    }
}
