//! The `sheetgrade validate` command.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;

use sheetgrade_core::keyparser::parse_answer_key;

pub fn execute(key_manifest: PathBuf) -> Result<()> {
    let key = parse_answer_key(&key_manifest)?;

    let total_points: f64 = key.entries.iter().map(|e| e.points).sum();
    let subjects: BTreeSet<&str> = key
        .entries
        .iter()
        .filter_map(|e| e.subject.as_deref())
        .collect();

    println!("{} is valid", key_manifest.display());
    println!("  {} questions, {total_points} points total", key.len());
    if !subjects.is_empty() {
        println!(
            "  subjects: {}",
            subjects.into_iter().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(())
}
