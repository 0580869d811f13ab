//! The `masterygate due` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use super::open_engine;

pub fn execute(config_path: Option<PathBuf>, learner: String, format: String) -> Result<()> {
    let engine = open_engine(config_path.as_deref())?;
    let due = engine.due_reviews(&learner)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&due)?);
        return Ok(());
    }

    if due.is_empty() {
        println!("Nothing due for review.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Concept", "Priority", "Overdue", "Due Since"]);
    for review in &due {
        table.add_row(vec![
            Cell::new(&review.concept_id),
            Cell::new(format!("{:.2}", review.priority)),
            Cell::new(format!("{:.1}h", review.overdue_ms as f64 / 3_600_000.0)),
            Cell::new(review.due_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");
    Ok(())
}
