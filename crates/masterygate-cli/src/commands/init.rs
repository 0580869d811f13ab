//! The `masterygate init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("masterygate.toml"), SAMPLE_CONFIG)?;
    write_if_missing(Path::new("concepts.toml"), SAMPLE_CATALOG)?;

    println!("\nNext steps:");
    println!("  1. Edit concepts.toml with your course's concepts");
    println!("  2. Run: masterygate validate");
    println!(
        "  3. Run: masterygate submit --learner alice --concept fractions --correct --reasoning \"...\""
    );

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# masterygate configuration

data_dir = "./masterygate-data"
catalog_path = "concepts.toml"

[mastery]
accuracy = 0.85
consistency = 0.80
reasoning = 0.75
retention = 0.70
application = 0.80
overall = 0.85
min_attempts = 3

[scheduler]
intervals_days = [1, 3, 7, 14, 30, 60]
mastered_index = 4

[gate]
max_blocks_per_window = 4
cooldown_window_hours = 24
retention_wait_hours = 24
major_session_min_attempts = 5
min_total_attempts = 3

[[levels]]
level = 2
required_concepts = ["fractions"]
mastery_threshold = 0.85
min_time_spent_ms = 1800000
retention_test_required = false

[[levels]]
level = 3
required_concepts = ["ratios", "percentages"]
mastery_threshold = 0.90
min_time_spent_ms = 3600000
retention_test_required = true
"#;

const SAMPLE_CATALOG: &str = r#"# Concept catalog

[[concepts]]
id = "fractions"
name = "Fractions"
level = 2
key_terms = ["numerator", "denominator"]

[[concepts]]
id = "ratios"
name = "Ratios"
level = 3
prerequisites = ["fractions"]
key_terms = ["ratio", "proportion"]

[[concepts]]
id = "percentages"
name = "Percentages"
level = 3
prerequisites = ["fractions"]
key_terms = ["percent", "hundred"]
"#;
