//! The `lexiflow init` command.

use anyhow::Result;

use lexiflow_providers::starter_config;

pub fn execute() -> Result<()> {
    if std::path::Path::new("lexiflow.toml").exists() {
        println!("lexiflow.toml already exists, skipping.");
        return Ok(());
    }

    std::fs::write("lexiflow.toml", starter_config())?;
    println!("Created lexiflow.toml");

    println!("\nNext steps:");
    println!("  1. Export GEMINI_API_KEY, or edit lexiflow.toml");
    println!("  2. Run: lexiflow study --level B1 --topic \"Travel\"");
    println!("  3. Try it without a key: lexiflow study --provider offline");

    Ok(())
}
