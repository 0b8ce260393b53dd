//! The `sheetgrade show` command.

use std::path::PathBuf;

use anyhow::Result;
use uuid::Uuid;

use sheetgrade_core::results::EvaluationResult;
use sheetgrade_core::traits::SessionStore;
use sheetgrade_store::export;

pub fn execute(
    id: Uuid,
    format: String,
    store: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    let (store, _config) = super::open_store(store, config.as_deref())?;
    let result = store.get(id)?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "markdown" => println!("{}", export::render_markdown(&result)),
        _ => print_table(&result),
    }
    Ok(())
}

fn print_table(result: &EvaluationResult) {
    use comfy_table::{Cell, Table};

    println!(
        "{} — {:.1}% ({}) via {}",
        result.sheet_name,
        result.overall_score,
        if result.summary.passed {
            "passed"
        } else {
            "failed"
        },
        result.strategy,
    );

    let mut table = Table::new();
    table.set_header(vec!["#", "Status", "Score", "Feedback"]);
    for v in &result.verdicts {
        table.add_row(vec![
            Cell::new(v.question_index),
            Cell::new(v.status.to_string()),
            Cell::new(format!("{:.1}/{:.1}", v.score, v.max_score)),
            Cell::new(&v.feedback),
        ]);
    }
    println!("{table}");

    for warning in &result.warnings {
        println!("Warning: {warning}");
    }
    for rec in &result.recommendations {
        println!("Recommendation: {rec}");
    }
}
