//! TOML answer-key manifest parser.
//!
//! A manifest is the structured alternative to uploading a key document:
//!
//! ```toml
//! [answer_key]
//! name = "Math Quiz - Grade 7"
//! default_points = 4.0
//!
//! [[questions]]
//! index = 1
//! expected = "42"
//! subject = "algebra"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::EvalError;
use crate::model::{AnswerKey, KeyEntry};

/// Intermediate TOML structure for parsing key manifests.
#[derive(Debug, Deserialize)]
struct TomlKeyFile {
    answer_key: TomlKeyHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlKeyHeader {
    #[serde(default)]
    #[allow(dead_code)]
    name: Option<String>,
    #[serde(default = "default_points")]
    default_points: f64,
}

fn default_points() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    index: usize,
    expected: String,
    #[serde(default)]
    points: Option<f64>,
    #[serde(default)]
    subject: Option<String>,
}

/// Parse a manifest file into an `AnswerKey`.
pub fn parse_answer_key(path: &Path) -> Result<AnswerKey> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key manifest: {}", path.display()))?;
    parse_answer_key_str(&content, path)
}

/// Parse a manifest string into an `AnswerKey` (useful for testing).
pub fn parse_answer_key_str(content: &str, source_path: &Path) -> Result<AnswerKey> {
    let parsed: TomlKeyFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    anyhow::ensure!(
        !parsed.questions.is_empty(),
        "key manifest has no questions: {}",
        source_path.display()
    );

    let mut entries: Vec<KeyEntry> = parsed
        .questions
        .into_iter()
        .map(|q| {
            let points = q.points.unwrap_or(parsed.answer_key.default_points);
            anyhow::ensure!(
                points.is_finite() && points > 0.0,
                "question {} has non-positive points",
                q.index
            );
            anyhow::ensure!(
                !q.expected.trim().is_empty(),
                "question {} has an empty expected answer",
                q.index
            );
            Ok(KeyEntry {
                index: q.index,
                expected: q.expected,
                points,
                subject: q.subject,
            })
        })
        .collect::<Result<_>>()?;

    entries.sort_by_key(|e| e.index);

    for (i, entry) in entries.iter().enumerate() {
        anyhow::ensure!(
            entry.index == i + 1,
            "question indices must be contiguous from 1; expected {}, found {}",
            i + 1,
            entry.index
        );
    }

    Ok(AnswerKey { entries })
}

/// Enforce that explicit manifest points fit inside the configured total.
pub fn check_point_budget(key: &AnswerKey, total_points: f64) -> Result<(), EvalError> {
    let sum: f64 = key.entries.iter().map(|e| e.points).sum();
    if sum > total_points + 1e-9 {
        return Err(EvalError::InvalidConfig(format!(
            "key manifest allocates {sum} points but total_points is {total_points}"
        )));
    }
    Ok(())
}
