//! The `sheetgrade history` command.

use std::path::PathBuf;

use anyhow::Result;

use sheetgrade_core::traits::{SessionFilter, SessionStore};

pub fn execute(
    limit: usize,
    min_score: Option<f64>,
    strategy: Option<String>,
    contains: Option<String>,
    store: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    let (store, _config) = super::open_store(store, config.as_deref())?;

    let filter = SessionFilter {
        strategy,
        min_score,
        since: None,
        contains,
        limit: Some(limit),
    };
    let summaries = store.list(&filter)?;

    if summaries.is_empty() {
        println!("No stored evaluations match.");
        return Ok(());
    }

    use comfy_table::{Cell, Table};
    let mut table = Table::new();
    table.set_header(vec![
        "Id", "Sheet", "Strategy", "Score", "Questions", "Date", "Duration",
    ]);
    for s in &summaries {
        table.add_row(vec![
            Cell::new(s.id),
            Cell::new(&s.sheet_name),
            Cell::new(&s.strategy),
            Cell::new(format!("{:.1}%", s.overall_score)),
            Cell::new(s.total_questions),
            Cell::new(s.created_at.format("%Y-%m-%d %H:%M")),
            Cell::new(format!("{}ms", s.total_ms)),
        ]);
    }
    println!("{table}");
    println!("\n{} session(s)", summaries.len());
    Ok(())
}
