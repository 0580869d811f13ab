//! The `masterygate analyze` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use masterygate_core::config::load_config_from;
use masterygate_core::model::QuestionMetadata;
use masterygate_core::reasoning::{
    Criterion, HeuristicAnalyzer, ReasoningAnalyzer, ReasoningAssessment, ReasoningInput,
};

pub fn execute(
    config_path: Option<PathBuf>,
    text: String,
    expect: Option<String>,
    format: String,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let question = QuestionMetadata {
        expected_concepts: expect
            .as_deref()
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        ..Default::default()
    };

    let analyzer = HeuristicAnalyzer::new(config.reasoning);
    let assessment = analyzer.analyze(&ReasoningInput {
        text: &text,
        question: &question,
        answer: "",
        correct: true,
    })?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&assessment)?),
        _ => print_assessment(&assessment),
    }
    Ok(())
}

fn print_assessment(assessment: &ReasoningAssessment) {
    let mut table = Table::new();
    table.set_header(vec!["Criterion", "Score"]);
    for criterion in Criterion::ALL {
        table.add_row(vec![
            Cell::new(criterion),
            Cell::new(format!("{:.2}", assessment.scores.get(criterion))),
        ]);
    }
    println!("{table}");
    println!(
        "Overall: {:.2} ({})",
        assessment.overall,
        if assessment.is_valid { "valid" } else { "needs work" }
    );
    if !assessment.feedback.is_empty() {
        println!("{}", assessment.feedback);
    }
    for s in &assessment.suggestions {
        println!("  - {}", s.message);
    }
    for f in &assessment.fallacies {
        println!("  ! {}: \"{}\"", f.kind, f.excerpt);
    }
}
