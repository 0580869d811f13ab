//! Engine configuration: thresholds, weights, schedules and the level table.
//!
//! Every numeric threshold is configuration. The defaults are the values the
//! scoring and gating behavior is specified against and must not drift.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::LevelRequirement;
use crate::reasoning::Criterion;

/// Per-dimension mastery thresholds and the overall weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryConfig {
    pub accuracy: f64,
    pub consistency: f64,
    pub reasoning: f64,
    pub retention: f64,
    pub application: f64,
    /// Minimum weighted overall score (the global accuracy threshold).
    pub overall: f64,
    /// Attempts required before a concept can be mastered.
    pub min_attempts: u32,
    /// How many recent attempts the accuracy dimension looks at.
    pub accuracy_window: usize,
    pub weights: MasteryWeights,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            accuracy: 0.85,
            consistency: 0.80,
            reasoning: 0.75,
            retention: 0.70,
            application: 0.80,
            overall: 0.85,
            min_attempts: 3,
            accuracy_window: 5,
            weights: MasteryWeights::default(),
        }
    }
}

/// Weights of the five dimensions in the overall mastery score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryWeights {
    pub accuracy: f64,
    pub consistency: f64,
    pub reasoning: f64,
    pub retention: f64,
    pub application: f64,
}

impl Default for MasteryWeights {
    fn default() -> Self {
        Self {
            accuracy: 0.30,
            consistency: 0.25,
            reasoning: 0.20,
            retention: 0.15,
            application: 0.10,
        }
    }
}

impl MasteryWeights {
    pub fn sum(&self) -> f64 {
        self.accuracy + self.consistency + self.reasoning + self.retention + self.application
    }
}

/// One value per reasoning criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionValues {
    pub clarity: f64,
    pub logic: f64,
    pub evidence: f64,
    pub completeness: f64,
    pub relevance: f64,
    pub consistency: f64,
}

impl CriterionValues {
    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Clarity => self.clarity,
            Criterion::Logic => self.logic,
            Criterion::Evidence => self.evidence,
            Criterion::Completeness => self.completeness,
            Criterion::Relevance => self.relevance,
            Criterion::Consistency => self.consistency,
        }
    }

    pub fn sum(&self) -> f64 {
        Criterion::ALL.iter().map(|&c| self.get(c)).sum()
    }

    fn default_weights() -> Self {
        Self {
            clarity: 0.20,
            logic: 0.25,
            evidence: 0.20,
            completeness: 0.15,
            relevance: 0.10,
            consistency: 0.10,
        }
    }

    fn default_minimums() -> Self {
        Self {
            clarity: 0.7,
            logic: 0.8,
            evidence: 0.6,
            completeness: 0.7,
            relevance: 0.8,
            consistency: 0.6,
        }
    }
}

/// Reasoning analyzer weights and per-criterion minimums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub weights: CriterionValues,
    pub minimums: CriterionValues,
    /// Texts shorter than this (in characters, after trimming) score zero.
    pub min_chars: usize,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            weights: CriterionValues::default_weights(),
            minimums: CriterionValues::default_minimums(),
            min_chars: 5,
        }
    }
}

/// Aggregator session boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Attempts further apart than this belong to different sessions.
    pub session_gap_minutes: i64,
    /// Sessions preceded by a gap longer than this measure retention.
    pub retention_gap_hours: i64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            session_gap_minutes: 60,
            retention_gap_hours: 24,
        }
    }
}

impl ProgressConfig {
    pub fn session_gap(&self) -> Duration {
        Duration::minutes(self.session_gap_minutes)
    }

    pub fn retention_gap(&self) -> Duration {
        Duration::hours(self.retention_gap_hours)
    }
}

/// Spaced-repetition intervals and due-review priority weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub intervals_days: Vec<u32>,
    /// Interval index used right after a concept is mastered.
    pub mastered_index: usize,
    pub priority_mastery_weight: f64,
    pub priority_overdue_weight: f64,
    pub priority_consistency_weight: f64,
    /// Overdue time at which the overdue term saturates.
    pub overdue_horizon_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            intervals_days: vec![1, 3, 7, 14, 30, 60],
            mastered_index: 4,
            priority_mastery_weight: 0.4,
            priority_overdue_weight: 0.3,
            priority_consistency_weight: 0.3,
            overdue_horizon_days: 7,
        }
    }
}

/// Progression gate limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// BLOCK decisions within the window that trigger the cooldown.
    pub max_blocks_per_window: u32,
    pub cooldown_window_hours: i64,
    /// Required rest after the last major learning session, or after the
    /// last attempt when no session was major.
    pub retention_wait_hours: i64,
    /// Attempts in one session for it to count as a major session.
    pub major_session_min_attempts: u32,
    /// Total attempts across required concepts at the final stage.
    pub min_total_attempts: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_blocks_per_window: 4,
            cooldown_window_hours: 24,
            retention_wait_hours: 24,
            major_session_min_attempts: 5,
            min_total_attempts: 3,
        }
    }
}

impl GateConfig {
    pub fn cooldown_window(&self) -> Duration {
        Duration::hours(self.cooldown_window_hours)
    }

    pub fn retention_wait(&self) -> Duration {
        Duration::hours(self.retention_wait_hours)
    }
}

/// Top-level masterygate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub mastery: MasteryConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub gate: GateConfig,
    /// Per-level requirement table.
    #[serde(default)]
    pub levels: Vec<LevelRequirement>,
    /// Where the file store keeps its records.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Concept catalog TOML.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./masterygate-data")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mastery: MasteryConfig::default(),
            reasoning: ReasoningConfig::default(),
            progress: ProgressConfig::default(),
            scheduler: SchedulerConfig::default(),
            gate: GateConfig::default(),
            levels: Vec::new(),
            data_dir: default_data_dir(),
            catalog_path: None,
        }
    }
}

impl EngineConfig {
    pub fn requirement_table(&self) -> RequirementTable {
        RequirementTable::new(self.levels.iter().cloned())
    }
}

/// Static level requirements keyed by target level.
#[derive(Debug, Clone, Default)]
pub struct RequirementTable {
    levels: BTreeMap<u32, LevelRequirement>,
}

impl RequirementTable {
    pub fn new(levels: impl IntoIterator<Item = LevelRequirement>) -> Self {
        Self {
            levels: levels.into_iter().map(|r| (r.level, r)).collect(),
        }
    }

    pub fn get(&self, level: u32) -> Result<&LevelRequirement, ConfigError> {
        self.levels.get(&level).ok_or(ConfigError::MissingLevel(level))
    }

    pub fn levels(&self) -> impl Iterator<Item = &LevelRequirement> {
        self.levels.values()
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Parse a configuration string (useful for testing).
pub fn parse_config_str(content: &str, source_path: &Path) -> Result<EngineConfig> {
    toml::from_str::<EngineConfig>(content)
        .with_context(|| format!("failed to parse config: {}", source_path.display()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `masterygate.toml` in the current directory
/// 2. `~/.config/masterygate/config.toml`
///
/// `MASTERYGATE_DATA_DIR` overrides `data_dir`.
pub fn load_config() -> Result<EngineConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<EngineConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("masterygate.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let mut config = parse_config_str(&content, &path)?;
            // Relative catalog paths are relative to the config file.
            if let (Some(catalog), Some(parent)) = (&config.catalog_path, path.parent()) {
                if catalog.is_relative() && !parent.as_os_str().is_empty() {
                    config.catalog_path = Some(parent.join(catalog));
                }
            }
            config
        }
        None => EngineConfig::default(),
    };

    if let Ok(dir) = std::env::var("MASTERYGATE_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
    }

    config.data_dir = resolve_path(&config.data_dir);
    config.catalog_path = config.catalog_path.as_deref().map(resolve_path);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("masterygate"))
}

/// A warning from configuration validation.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a configuration for common issues.
pub fn validate_config(config: &EngineConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    let m = &config.mastery;
    let thresholds = [
        ("mastery.accuracy", m.accuracy),
        ("mastery.consistency", m.consistency),
        ("mastery.reasoning", m.reasoning),
        ("mastery.retention", m.retention),
        ("mastery.application", m.application),
        ("mastery.overall", m.overall),
    ];
    for (field, value) in thresholds {
        if !(0.0..=1.0).contains(&value) {
            warnings.push(ConfigWarning::new(
                field,
                format!("threshold {value} is outside [0, 1]"),
            ));
        }
    }

    if (m.weights.sum() - 1.0).abs() > 1e-6 {
        warnings.push(ConfigWarning::new(
            "mastery.weights",
            format!("weights sum to {:.3}, expected 1.0", m.weights.sum()),
        ));
    }
    if m.accuracy_window == 0 {
        warnings.push(ConfigWarning::new(
            "mastery.accuracy_window",
            "accuracy window must be at least 1",
        ));
    }

    let r = &config.reasoning;
    if (r.weights.sum() - 1.0).abs() > 1e-6 {
        warnings.push(ConfigWarning::new(
            "reasoning.weights",
            format!("weights sum to {:.3}, expected 1.0", r.weights.sum()),
        ));
    }
    for criterion in Criterion::ALL {
        let value = r.minimums.get(criterion);
        if !(0.0..=1.0).contains(&value) {
            warnings.push(ConfigWarning::new(
                format!("reasoning.minimums.{criterion}"),
                format!("minimum {value} is outside [0, 1]"),
            ));
        }
    }

    let s = &config.scheduler;
    if s.intervals_days.is_empty() {
        warnings.push(ConfigWarning::new(
            "scheduler.intervals_days",
            "at least one interval is required",
        ));
    } else if s.intervals_days.windows(2).any(|w| w[0] >= w[1]) {
        warnings.push(ConfigWarning::new(
            "scheduler.intervals_days",
            "intervals should be strictly ascending",
        ));
    }
    if s.mastered_index >= s.intervals_days.len() {
        warnings.push(ConfigWarning::new(
            "scheduler.mastered_index",
            format!(
                "index {} is out of bounds for {} intervals",
                s.mastered_index,
                s.intervals_days.len()
            ),
        ));
    }

    if config.gate.max_blocks_per_window == 0 {
        warnings.push(ConfigWarning::new(
            "gate.max_blocks_per_window",
            "a limit of 0 puts every learner in permanent cooldown",
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for level in &config.levels {
        if !seen.insert(level.level) {
            warnings.push(ConfigWarning::new(
                format!("levels.{}", level.level),
                "duplicate level requirement",
            ));
        }
        if !(0.0..=1.0).contains(&level.mastery_threshold) {
            warnings.push(ConfigWarning::new(
                format!("levels.{}.mastery_threshold", level.level),
                format!("threshold {} is outside [0, 1]", level.mastery_threshold),
            ));
        }
    }

    warnings
}
