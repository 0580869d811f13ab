//! The `masterygate submit` command.

use std::path::PathBuf;

use anyhow::Result;

use masterygate_core::engine::{AttemptOutcome, AttemptSubmission};
use masterygate_core::model::AttemptContext;

use super::{open_engine, yes_no};

pub struct SubmitArgs {
    pub learner: String,
    pub concept: String,
    pub correct: bool,
    pub reasoning: String,
    pub attempts_used: u32,
    pub time_ms: i64,
    pub context: String,
}

pub fn execute(config_path: Option<PathBuf>, args: SubmitArgs, format: String) -> Result<()> {
    let context: AttemptContext = args.context.parse().map_err(anyhow::Error::msg)?;
    let engine = open_engine(config_path.as_deref())?;

    let outcome = engine.submit_attempt(AttemptSubmission {
        attempts_used: args.attempts_used,
        time_spent_ms: args.time_ms,
        context,
        ..AttemptSubmission::new(&args.learner, &args.concept, args.correct, &args.reasoning)
    })?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&outcome)?),
        _ => print_outcome(&args.concept, &outcome),
    }
    Ok(())
}

fn print_outcome(concept: &str, outcome: &AttemptOutcome) {
    println!("Recorded attempt {}", outcome.attempt_id);
    println!(
        "Reasoning: {:.2} ({})",
        outcome.reasoning_score,
        if outcome.is_reasoning_valid { "valid" } else { "needs work" }
    );
    if !outcome.reasoning_feedback.is_empty() {
        println!("  {}", outcome.reasoning_feedback);
    }
    for s in &outcome.suggestions {
        println!("  - {s}");
    }
    println!(
        "Mastery of {concept}: {:.2}, mastered: {}",
        outcome.concept_mastery_score,
        yes_no(outcome.is_concept_mastered)
    );
    if outcome.newly_mastered {
        println!("New mastery achieved for {concept}!");
    }
    if let Some(due) = outcome.next_review_due_at {
        println!("Next review: {}", due.format("%Y-%m-%d %H:%M UTC"));
    }
}
