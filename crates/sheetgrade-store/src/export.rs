//! Markdown export of a stored evaluation result, for the download/share
//! surface.

use std::path::Path;

use anyhow::{Context, Result};

use sheetgrade_core::results::{EvaluationResult, VerdictStatus};

/// Render one result as a self-contained markdown report.
pub fn render_markdown(result: &EvaluationResult) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Evaluation report — {}\n\n", result.sheet_name));
    md.push_str(&format!(
        "**Overall score:** {:.1}% ({})\n\n",
        result.overall_score,
        if result.summary.passed {
            "passed"
        } else {
            "failed"
        }
    ));
    md.push_str(&format!(
        "Strategy: {} | Questions: {} | Correct: {} | Partial: {} | Incorrect: {} | {}\n\n",
        result.strategy,
        result.summary.total_questions,
        result.summary.correct,
        result.summary.partial,
        result.summary.incorrect,
        result.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if !result.warnings.is_empty() {
        md.push_str("## Warnings\n\n");
        for warning in &result.warnings {
            md.push_str(&format!("- {warning}\n"));
        }
        md.push('\n');
    }

    md.push_str("## Question-by-question\n\n");
    md.push_str("| # | Status | Score | Feedback |\n");
    md.push_str("|---|--------|-------|----------|\n");
    for v in &result.verdicts {
        let icon = match v.status {
            VerdictStatus::Correct => "✓",
            VerdictStatus::Partial => "~",
            VerdictStatus::Incorrect => "✗",
        };
        md.push_str(&format!(
            "| {} | {} {} | {:.1}/{:.1} | {} |\n",
            v.question_index, icon, v.status, v.score, v.max_score, v.feedback
        ));
    }
    md.push('\n');

    if !result.recommendations.is_empty() {
        md.push_str("## Recommendations\n\n");
        for rec in &result.recommendations {
            md.push_str(&format!("- {rec}\n"));
        }
    }

    md
}

/// Write the markdown report to a file.
pub fn write_markdown(result: &EvaluationResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_markdown(result))
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}
