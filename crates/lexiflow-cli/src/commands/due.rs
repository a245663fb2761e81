//! The `lexiflow due` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use comfy_table::{Cell, Table};

use lexiflow_core::{FileStore, SrsDeck};
use lexiflow_providers::load_config_from;

pub fn execute(srs_file: Option<PathBuf>, all: bool, config_path: Option<PathBuf>) -> Result<()> {
    let srs_path = match srs_file {
        Some(path) => path,
        None => load_config_from(config_path.as_deref())?.srs_path,
    };
    let store = FileStore::new(srs_path);
    let deck = SrsDeck::load(&store)?;
    let now = Utc::now();

    let due = deck.due(now);
    let items = if all { deck.items().to_vec() } else { due.clone() };
    if items.is_empty() {
        if deck.is_empty() {
            println!("No words tracked yet. Run `lexiflow study` to start.");
        } else {
            println!("Nothing due for review.");
        }
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Term", "Interval", "Ease", "Next review", "Due"]);
    for item in &items {
        table.add_row(vec![
            Cell::new(&item.term),
            Cell::new(format!("{}d", item.interval)),
            Cell::new(format!("{:.2}", item.ease_factor)),
            Cell::new(item.next_review_date.format("%Y-%m-%d %H:%M")),
            Cell::new(if item.is_due(now) { "yes" } else { "" }),
        ]);
    }

    println!("{table}");
    println!("\n{} of {} tracked word(s) due.", due.len(), deck.len());

    Ok(())
}
