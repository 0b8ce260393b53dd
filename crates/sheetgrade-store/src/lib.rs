//! sheetgrade-store — Evaluation session persistence.
//!
//! The store is append-only: the pipeline writes one record per completed
//! job and nothing is ever mutated in place. History and dashboard surfaces
//! read through `list`/`get`.

pub mod export;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use uuid::Uuid;

use sheetgrade_core::results::EvaluationResult;
use sheetgrade_core::traits::{SessionFilter, SessionStore, SessionSummary};

/// File-backed session store: one pretty-printed JSON file per result.
pub struct JsonSessionStore {
    dir: PathBuf,
}

impl JsonSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl SessionStore for JsonSessionStore {
    fn save(&self, result: &EvaluationResult) -> Result<Uuid> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create store directory {}", self.dir.display()))?;

        let path = self.path_for(result.id);
        anyhow::ensure!(
            !path.exists(),
            "result {} is already stored; the store is append-only",
            result.id
        );

        let json = serde_json::to_string_pretty(result).context("failed to serialize result")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write result to {}", path.display()))?;

        tracing::debug!(id = %result.id, path = %path.display(), "result stored");
        Ok(result.id)
    }

    fn list(&self, filter: &SessionFilter) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            // An empty history is a store that hasn't been written yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(summaries),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read store directory {}", self.dir.display())
                })
            }
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let result: EvaluationResult = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            let summary = SessionSummary::of(&result);
            if matches(filter, &summary) {
                summaries.push(summary);
            }
        }

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            summaries.truncate(limit);
        }
        Ok(summaries)
    }

    fn get(&self, id: Uuid) -> Result<EvaluationResult> {
        let path = self.path_for(id);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("no stored result with id {id}"))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// In-memory session store for tests.
#[derive(Default)]
pub struct MemorySessionStore {
    results: Mutex<HashMap<Uuid, EvaluationResult>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, result: &EvaluationResult) -> Result<Uuid> {
        let mut results = self.results.lock().unwrap();
        anyhow::ensure!(
            !results.contains_key(&result.id),
            "result {} is already stored; the store is append-only",
            result.id
        );
        results.insert(result.id, result.clone());
        Ok(result.id)
    }

    fn list(&self, filter: &SessionFilter) -> Result<Vec<SessionSummary>> {
        let results = self.results.lock().unwrap();
        let mut summaries: Vec<SessionSummary> = results
            .values()
            .map(SessionSummary::of)
            .filter(|s| matches(filter, s))
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            summaries.truncate(limit);
        }
        Ok(summaries)
    }

    fn get(&self, id: Uuid) -> Result<EvaluationResult> {
        self.results
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .with_context(|| format!("no stored result with id {id}"))
    }
}

fn matches(filter: &SessionFilter, summary: &SessionSummary) -> bool {
    if let Some(strategy) = &filter.strategy {
        if &summary.strategy != strategy {
            return false;
        }
    }
    if let Some(min_score) = filter.min_score {
        if summary.overall_score < min_score {
            return false;
        }
    }
    if let Some(since) = filter.since {
        if summary.created_at < since {
            return false;
        }
    }
    if let Some(contains) = &filter.contains {
        if !summary
            .sheet_name
            .to_lowercase()
            .contains(&contains.to_lowercase())
        {
            return false;
        }
    }
    true
}
