//! The `masterygate evaluate` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use masterygate_core::engine::ProgressionOutcome;

use super::{open_engine, yes_no};

pub fn execute(
    config_path: Option<PathBuf>,
    learner: String,
    level: u32,
    fail_on_block: bool,
    format: String,
) -> Result<()> {
    let engine = open_engine(config_path.as_deref())?;
    let outcome = engine.evaluate_progression(&learner, level)?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&outcome)?),
        _ => print_outcome(&outcome),
    }

    if fail_on_block && !outcome.can_progress {
        std::process::exit(1);
    }
    Ok(())
}

fn print_outcome(outcome: &ProgressionOutcome) {
    let verdict = if outcome.can_progress { "ALLOW" } else { "BLOCK" };
    println!("{verdict}: {}", outcome.reason);
    println!("Current level: {}", outcome.current_level);

    if !outcome.requirements.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Stage", "Requirement", "Actual", "Met"]);
        for check in &outcome.requirements {
            table.add_row(vec![
                Cell::new(check.stage),
                Cell::new(&check.requirement),
                Cell::new(&check.actual),
                Cell::new(yes_no(check.met)),
            ]);
        }
        println!("{table}");
    }

    if !outcome.recommendations.is_empty() {
        println!("\nRecommendations:");
        for r in &outcome.recommendations {
            println!("  - {r}");
        }
    }
}
