//! The `lexiflow check` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use lexiflow_core::content::{parse_test_json, validate_test};
use lexiflow_core::BloomLevel;

pub fn execute(test_path: PathBuf) -> Result<()> {
    let json = std::fs::read_to_string(&test_path)
        .with_context(|| format!("failed to read {}", test_path.display()))?;
    let questions = parse_test_json(&json)
        .with_context(|| format!("invalid question set: {}", test_path.display()))?;

    let counts: Vec<String> = BloomLevel::ALL
        .iter()
        .map(|level| {
            let count = questions.iter().filter(|q| q.level() == *level).count();
            format!("{level} {count}")
        })
        .collect();
    let pairs: usize = questions
        .iter()
        .filter_map(|q| q.matching())
        .map(|m| m.pairs.len())
        .sum();
    println!(
        "Test: {} questions ({}), {pairs} matching pair(s)",
        questions.len(),
        counts.join(", ")
    );

    let warnings = validate_test(&questions, &[]);
    for w in &warnings {
        let prefix = w
            .question_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Question set valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
