//! Reasoning-quality analysis of free-text justifications.
//!
//! [`ReasoningAnalyzer`] is the seam: the scoring and gating code only sees a
//! [`ReasoningAssessment`]. [`HeuristicAnalyzer`] is the built-in backend and
//! scores text with keyword and pattern heuristics. It does not attempt to
//! understand the text.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{CriterionValues, ReasoningConfig};
use crate::error::EvaluationError;
use crate::model::{QuestionMetadata, QuestionType};
use crate::statistics::unit;

/// The six reasoning criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Clarity,
    Logic,
    Evidence,
    Completeness,
    Relevance,
    Consistency,
}

impl Criterion {
    pub const ALL: [Criterion; 6] = [
        Criterion::Clarity,
        Criterion::Logic,
        Criterion::Evidence,
        Criterion::Completeness,
        Criterion::Relevance,
        Criterion::Consistency,
    ];

    fn advice(self) -> &'static str {
        match self {
            Criterion::Clarity => "Write complete sentences and avoid informal language.",
            Criterion::Logic => {
                "Connect your steps explicitly with words like \"because\" and \"therefore\"."
            }
            Criterion::Evidence => "Support your claim with an example, data, or the rule you applied.",
            Criterion::Completeness => "Cover every part of the question and state your conclusion.",
            Criterion::Relevance => "Refer directly to the concepts the question is about.",
            Criterion::Consistency => {
                "Make sure your explanation actually supports the answer you gave."
            }
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Criterion::Clarity => "clarity",
            Criterion::Logic => "logic",
            Criterion::Evidence => "evidence",
            Criterion::Completeness => "completeness",
            Criterion::Relevance => "relevance",
            Criterion::Consistency => "consistency",
        };
        f.write_str(name)
    }
}

/// Reasoning flaws the heuristics look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallacyKind {
    /// The reason given restates the claim.
    CircularReasoning,
    /// "always", "never" and friends with nothing backing them up.
    UnsupportedAbsolute,
    /// "everyone knows", "obviously".
    AppealToPopularity,
    InformalLanguage,
}

impl fmt::Display for FallacyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FallacyKind::CircularReasoning => "circular reasoning",
            FallacyKind::UnsupportedAbsolute => "unsupported absolute claim",
            FallacyKind::AppealToPopularity => "appeal to popularity",
            FallacyKind::InformalLanguage => "informal language",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFallacy {
    pub kind: FallacyKind,
    /// The text that triggered the detection.
    pub excerpt: String,
}

/// An improvement hint for one criterion below its minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub criterion: Criterion,
    pub score: f64,
    pub minimum: f64,
    pub message: String,
}

/// Everything an analyzer says about one justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningAssessment {
    pub scores: CriterionValues,
    /// Weighted overall score in [0, 1].
    pub overall: f64,
    /// True only when every criterion meets its own minimum.
    pub is_valid: bool,
    pub feedback: String,
    /// Criteria below minimum, largest weighted shortfall first.
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub fallacies: Vec<DetectedFallacy>,
}

impl ReasoningAssessment {
    /// Build an assessment from raw criterion scores.
    ///
    /// Scores are clamped into [0, 1]. Any backend should go through here so
    /// weighting, validity and suggestion ranking stay identical.
    pub fn from_scores(
        scores: CriterionValues,
        config: &ReasoningConfig,
        fallacies: Vec<DetectedFallacy>,
    ) -> Self {
        let scores = CriterionValues {
            clarity: unit(scores.clarity),
            logic: unit(scores.logic),
            evidence: unit(scores.evidence),
            completeness: unit(scores.completeness),
            relevance: unit(scores.relevance),
            consistency: unit(scores.consistency),
        };

        let weight_sum = config.weights.sum();
        let weighted: f64 = Criterion::ALL
            .iter()
            .map(|&c| scores.get(c) * config.weights.get(c))
            .sum();
        let overall = if weight_sum > 0.0 {
            unit(weighted / weight_sum)
        } else {
            0.0
        };

        let is_valid = Criterion::ALL
            .iter()
            .all(|&c| scores.get(c) >= config.minimums.get(c));

        let mut suggestions: Vec<Suggestion> = Criterion::ALL
            .iter()
            .filter(|&&c| scores.get(c) < config.minimums.get(c))
            .map(|&c| Suggestion {
                criterion: c,
                score: scores.get(c),
                minimum: config.minimums.get(c),
                message: c.advice().to_string(),
            })
            .collect();
        suggestions.sort_by(|a, b| {
            let gap_a = config.weights.get(a.criterion) * (a.minimum - a.score);
            let gap_b = config.weights.get(b.criterion) * (b.minimum - b.score);
            gap_b.total_cmp(&gap_a)
        });

        let feedback = compose_feedback(&scores, overall, config, &fallacies);

        Self {
            scores,
            overall,
            is_valid,
            feedback,
            suggestions,
            fallacies,
        }
    }

    /// Assessment for text too short to analyze.
    pub fn insufficient(config: &ReasoningConfig) -> Self {
        let zero = CriterionValues {
            clarity: 0.0,
            logic: 0.0,
            evidence: 0.0,
            completeness: 0.0,
            relevance: 0.0,
            consistency: 0.0,
        };
        let mut assessment = Self::from_scores(zero, config, Vec::new());
        assessment.feedback =
            "Reasoning needs more detail: explain why your answer is correct.".to_string();
        assessment
    }
}

fn compose_feedback(
    scores: &CriterionValues,
    overall: f64,
    config: &ReasoningConfig,
    fallacies: &[DetectedFallacy],
) -> String {
    let mut parts = Vec::new();

    parts.push(if overall >= 0.8 {
        "Well-structured justification.".to_string()
    } else if overall >= 0.6 {
        "Reasonable justification with room to improve.".to_string()
    } else {
        "The justification is weak.".to_string()
    });

    let strengths: Vec<String> = Criterion::ALL
        .iter()
        .filter(|&&c| scores.get(c) >= config.minimums.get(c) + 0.1)
        .map(|c| c.to_string())
        .collect();
    if !strengths.is_empty() {
        parts.push(format!("Strong {}.", strengths.join(", ")));
    }

    let weakest = Criterion::ALL
        .iter()
        .filter(|&&c| scores.get(c) < config.minimums.get(c))
        .min_by(|&&a, &&b| {
            (scores.get(a) - config.minimums.get(a)).total_cmp(&(scores.get(b) - config.minimums.get(b)))
        });
    if let Some(c) = weakest {
        parts.push(format!("Weakest area: {c}."));
    }

    for fallacy in fallacies {
        parts.push(format!("Watch out for {}: \"{}\".", fallacy.kind, fallacy.excerpt));
    }

    parts.join(" ")
}

/// Input for one analysis.
#[derive(Debug, Clone, Copy)]
pub struct ReasoningInput<'a> {
    pub text: &'a str,
    pub question: &'a QuestionMetadata,
    /// The learner's answer, empty if not available.
    pub answer: &'a str,
    pub correct: bool,
}

/// Strategy for scoring justifications.
pub trait ReasoningAnalyzer: Send + Sync {
    /// Human-readable backend name (e.g. "heuristic").
    fn name(&self) -> &str;

    /// Score one justification.
    fn analyze(&self, input: &ReasoningInput<'_>) -> Result<ReasoningAssessment, EvaluationError>;
}

const STOPWORDS: &[&str] = &[
    "about", "also", "because", "been", "being", "does", "from", "have", "into", "just", "like",
    "more", "must", "only", "same", "some", "than", "that", "their", "them", "then", "there",
    "these", "they", "this", "those", "very", "were", "what", "when", "which", "will", "with",
    "would", "your",
];

struct Patterns {
    connectors: Regex,
    premise_conclusion: Regex,
    sequence: Regex,
    numbered_step: Regex,
    evidence: Regex,
    reason_clause: Regex,
    number: Regex,
    conclusion: Regex,
    absolute: Regex,
    popularity: Regex,
    informal: Regex,
}

impl Patterns {
    fn new() -> Self {
        Self {
            connectors: Regex::new(
                r"(?i)\b(because|therefore|since|thus|hence|consequently|as a result|which means|this means|it follows|implies|due to)\b",
            )
            .expect("valid connector regex"),
            premise_conclusion: Regex::new(
                r"(?is)\b(because|since|given that)\b.+\b(therefore|thus|hence|so|which means|it follows)\b|\bif\b.+\bthen\b",
            )
            .expect("valid premise-conclusion regex"),
            sequence: Regex::new(
                r"(?i)\b(first(ly)?|second(ly)?|third(ly)?|then|next|after that|finally|lastly|step \d+)\b",
            )
            .expect("valid sequence regex"),
            numbered_step: Regex::new(r"(?m)^\s*\d+[.)]\s").expect("valid numbered step regex"),
            evidence: Regex::new(
                r"(?i)\b(for example|for instance|such as|according to|data|shows?|showed|measured|observed|evidence|definition|rule|property|theorem|formula|law)\b|\be\.g\.",
            )
            .expect("valid evidence regex"),
            reason_clause: Regex::new(r"(?i)\b(because|since|given that|due to)\b")
                .expect("valid reason clause regex"),
            number: Regex::new(r"\d").expect("valid number regex"),
            conclusion: Regex::new(
                r"(?i)\b(therefore|thus|hence|so|in conclusion|which means|this means|the answer is)\b",
            )
            .expect("valid conclusion regex"),
            absolute: Regex::new(
                r"(?i)\b(always|never|everyone|everybody|nobody|no one|every time|impossible|definitely)\b",
            )
            .expect("valid absolute regex"),
            popularity: Regex::new(
                r"(?i)\b(everyone knows|everybody knows|most people (think|believe|say)|common knowledge|obviously)\b",
            )
            .expect("valid popularity regex"),
            informal: Regex::new(
                r"(?i)\b(gonna|wanna|gotta|kinda|sorta|lol|idk|dunno|stuff|thingy|yeah|nah|whatever)\b|[!?]{2,}",
            )
            .expect("valid informal regex"),
        }
    }
}

/// Keyword and pattern based analyzer.
pub struct HeuristicAnalyzer {
    config: ReasoningConfig,
    patterns: Patterns,
}

impl HeuristicAnalyzer {
    pub fn new(config: ReasoningConfig) -> Self {
        Self {
            config,
            patterns: Patterns::new(),
        }
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }

    fn detect_fallacies(&self, text: &str) -> Vec<DetectedFallacy> {
        let p = &self.patterns;
        let mut found = Vec::new();

        for sentence in sentences(text) {
            if is_circular(sentence) {
                found.push(DetectedFallacy {
                    kind: FallacyKind::CircularReasoning,
                    excerpt: sentence.to_string(),
                });
            }
            if let Some(m) = p.absolute.find(sentence) {
                let supported =
                    p.evidence.is_match(sentence) || p.reason_clause.is_match(sentence);
                if !supported {
                    found.push(DetectedFallacy {
                        kind: FallacyKind::UnsupportedAbsolute,
                        excerpt: m.as_str().to_string(),
                    });
                }
            }
        }

        for m in p.popularity.find_iter(text) {
            found.push(DetectedFallacy {
                kind: FallacyKind::AppealToPopularity,
                excerpt: m.as_str().to_string(),
            });
        }
        for m in p.informal.find_iter(text) {
            found.push(DetectedFallacy {
                kind: FallacyKind::InformalLanguage,
                excerpt: m.as_str().to_string(),
            });
        }

        found
    }

    fn score(&self, input: &ReasoningInput<'_>, fallacies: &[DetectedFallacy]) -> CriterionValues {
        let p = &self.patterns;
        let text = input.text.trim();
        let lower = text.to_lowercase();

        let count = |kind: FallacyKind| fallacies.iter().filter(|f| f.kind == kind).count() as f64;
        let informal = count(FallacyKind::InformalLanguage);
        let circular = count(FallacyKind::CircularReasoning);
        let absolutes = count(FallacyKind::UnsupportedAbsolute);
        let popularity = count(FallacyKind::AppealToPopularity);

        let words = text.split_whitespace().count() as f64;
        let sentence_count = sentences(text).count().max(1) as f64;
        let avg_sentence = words / sentence_count;

        // Clarity
        let structure = if (5.0..=30.0).contains(&avg_sentence) {
            0.2
        } else if avg_sentence < 5.0 {
            0.05
        } else {
            0.1
        };
        let well_formed = text.chars().next().is_some_and(char::is_uppercase)
            && text.ends_with(['.', '!', '?']);
        let clarity = 0.45 + 0.25 * (words / 20.0).min(1.0) + structure
            + if well_formed { 0.1 } else { 0.0 }
            - 0.15 * informal;

        // Logic
        let connectors = p.connectors.find_iter(text).count().min(3) as f64;
        let sequential = p.sequence.find_iter(text).count() >= 2
            || p.numbered_step.find_iter(text).count() >= 2;
        let logic = 0.3
            + 0.15 * connectors
            + if p.premise_conclusion.is_match(text) { 0.15 } else { 0.0 }
            + if sequential { 0.1 } else { 0.0 }
            - 0.2 * circular
            - 0.1 * popularity;

        // Evidence
        let markers = p.evidence.find_iter(text).count().min(3) as f64;
        let evidence = 0.3
            + 0.15 * markers
            + if p.number.is_match(text) { 0.15 } else { 0.0 }
            + if p.reason_clause.is_match(text) { 0.1 } else { 0.0 }
            - 0.15 * absolutes
            - 0.1 * popularity;

        // Completeness and relevance share concept coverage.
        let expected = &input.question.expected_concepts;
        let coverage = if expected.is_empty() {
            None
        } else {
            let covered = expected.iter().filter(|c| mentions(&lower, c)).count();
            Some(covered as f64 / expected.len() as f64)
        };
        let length_target = match input.question.question_type {
            QuestionType::MultipleChoice => 15.0,
            QuestionType::ShortAnswer => 25.0,
            QuestionType::Calculation => 20.0,
            QuestionType::Explanation => 40.0,
        };
        let length = (words / length_target).min(1.0);
        let concludes = p.conclusion.is_match(text)
            || (input.question.question_type == QuestionType::Calculation
                && p.number.is_match(text));
        let conclusion = if concludes { 1.0 } else { 0.0 };
        let completeness = match coverage {
            Some(ratio) => 0.5 * ratio + 0.3 * length + 0.2 * conclusion,
            None => 0.2 + 0.5 * length + 0.3 * conclusion,
        };

        let answer = input.answer.trim();
        let mentions_answer = !answer.is_empty() && mentions(&lower, answer);
        let relevance = match coverage {
            Some(ratio) => 0.4 + 0.6 * ratio,
            None => 0.85,
        } + if mentions_answer { 0.1 } else { 0.0 }
            - if informal > 0.0 { 0.1 } else { 0.0 };

        // Consistency cross-checks reasoning strength against correctness.
        let strength = (unit(clarity) + unit(logic) + unit(evidence)) / 3.0;
        let strong = strength >= 0.7;
        let consistency = match (input.correct, strong) {
            (true, true) => 0.8 + 0.2 * strength,
            // Right answer, weak reasoning: likely a guess.
            (true, false) => 0.6 * strength,
            // Wrong answer, sound reasoning: a slip, not a reasoning flaw.
            (false, true) => 0.55 + 0.15 * strength,
            (false, false) => 0.2 + 0.3 * strength,
        };

        CriterionValues {
            clarity,
            logic,
            evidence,
            completeness,
            relevance,
            consistency,
        }
    }
}

impl Default for HeuristicAnalyzer {
    fn default() -> Self {
        Self::new(ReasoningConfig::default())
    }
}

impl ReasoningAnalyzer for HeuristicAnalyzer {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn analyze(&self, input: &ReasoningInput<'_>) -> Result<ReasoningAssessment, EvaluationError> {
        let trimmed = input.text.trim();
        if trimmed.chars().count() < self.config.min_chars {
            return Ok(ReasoningAssessment::insufficient(&self.config));
        }

        let fallacies = self.detect_fallacies(trimmed);
        let scores = self.score(input, &fallacies);
        Ok(ReasoningAssessment::from_scores(scores, &self.config, fallacies))
    }
}

fn sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn content_words(fragment: &str) -> HashSet<String> {
    fragment
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// A sentence whose "because" clause only repeats words from the claim.
fn is_circular(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    let Some(idx) = lower.find("because") else {
        return false;
    };
    let claim = content_words(&lower[..idx]);
    let reason = content_words(&lower[idx + "because".len()..]);
    !reason.is_empty() && reason.is_subset(&claim)
}

fn mentions(haystack_lower: &str, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    haystack_lower.contains(&term) || haystack_lower.contains(&term.replace(['_', '-'], " "))
}
