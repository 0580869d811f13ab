//! The `masterygate validate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use masterygate_core::catalog::{parse_catalog_str, validate_catalog};
use masterygate_core::config::{load_config_from, validate_config, ConfigWarning};

pub fn execute(config_path: Option<PathBuf>, catalog: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    println!(
        "Config: {} level requirement(s), data dir {}",
        config.levels.len(),
        config.data_dir.display()
    );
    let mut total_warnings = print_warnings(&validate_config(&config));

    match catalog.or(config.catalog_path) {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read catalog: {}", path.display()))?;
            let file = parse_catalog_str(&content, &path)?;
            println!(
                "Catalog: {} concept(s), {} level(s)",
                file.concepts.len(),
                file.levels.len()
            );
            total_warnings += print_warnings(&validate_catalog(&file));
        }
        None => println!("Catalog: none configured, any concept id is accepted"),
    }

    if total_warnings == 0 {
        println!("Configuration valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}

fn print_warnings(warnings: &[ConfigWarning]) -> usize {
    for w in warnings {
        println!("  [{}] WARNING: {}", w.field, w.message);
    }
    warnings.len()
}
