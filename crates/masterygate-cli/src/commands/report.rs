//! The `masterygate report` command.

use std::path::PathBuf;

use anyhow::Result;

use masterygate_core::report::LearnerReport;

use super::open_engine;

pub fn execute(
    config_path: Option<PathBuf>,
    learner: String,
    format: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let engine = open_engine(config_path.as_deref())?;
    let report = LearnerReport::build(&engine, &learner, chrono::Utc::now())?;

    match (format.as_str(), output) {
        ("json", Some(path)) => {
            report.save_json(&path)?;
            eprintln!("Report saved to: {}", path.display());
        }
        ("json", None) => println!("{}", serde_json::to_string_pretty(&report)?),
        (_, Some(path)) => {
            std::fs::write(&path, report.to_markdown())?;
            eprintln!("Report saved to: {}", path.display());
        }
        (_, None) => println!("{}", report.to_markdown()),
    }
    Ok(())
}
