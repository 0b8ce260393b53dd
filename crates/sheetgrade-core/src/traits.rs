//! Core trait definitions for the pipeline seams.
//!
//! These traits are implemented by the `sheetgrade-ingest`,
//! `sheetgrade-strategies`, and `sheetgrade-store` crates respectively; the
//! engine only ever sees the trait objects.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EvalError;
use crate::model::{DocumentSource, PageImage};
use crate::results::{EvaluationResult, ExtractionResult};

// ---------------------------------------------------------------------------
// Document Ingestor trait
// ---------------------------------------------------------------------------

/// Normalizes an uploaded document into canonical page images.
#[async_trait]
pub trait DocumentIngestor: Send + Sync {
    /// Decode `doc` into an ordered sequence of normalized page images.
    ///
    /// Produces no side effects beyond the in-memory pages.
    async fn ingest(&self, doc: &DocumentSource) -> Result<Vec<PageImage>, EvalError>;
}

// ---------------------------------------------------------------------------
// Extraction Strategy trait
// ---------------------------------------------------------------------------

/// Shared, read-only context handed to every strategy of a job.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    /// Job being extracted.
    pub job_id: Uuid,
    /// Question count the key defines, when known up front. Strategies may
    /// use it to pad unreadable trailing questions at confidence 0 instead
    /// of shifting indices.
    pub expected_questions: Option<usize>,
    /// Opaque free-text grading instructions from the caller.
    pub ai_instructions: Option<String>,
}

impl ExtractionContext {
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            expected_questions: None,
            ai_instructions: None,
        }
    }
}

/// One independent method of reading answers off a page image.
///
/// Strategies run concurrently against the same immutable page slice; each
/// writes only its own `ExtractionResult`.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Strategy name (e.g. "pattern").
    fn name(&self) -> &str;

    /// Map the page images to per-question candidate answers.
    async fn extract(
        &self,
        pages: &[PageImage],
        ctx: &ExtractionContext,
    ) -> anyhow::Result<ExtractionResult>;
}

// ---------------------------------------------------------------------------
// Session Store trait
// ---------------------------------------------------------------------------

/// Filter for history/dashboard queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFilter {
    /// Only results from this strategy.
    #[serde(default)]
    pub strategy: Option<String>,
    /// Only results scoring at least this percentage.
    #[serde(default)]
    pub min_score: Option<f64>,
    /// Only results created at or after this instant.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    /// Case-insensitive substring match on the sheet name.
    #[serde(default)]
    pub contains: Option<String>,
    /// Cap on returned summaries (newest first).
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Lightweight listing row for one stored result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub job_id: Uuid,
    pub sheet_name: String,
    pub strategy: String,
    pub overall_score: f64,
    pub total_questions: usize,
    pub created_at: DateTime<Utc>,
    pub total_ms: u64,
}

impl SessionSummary {
    pub fn of(result: &EvaluationResult) -> Self {
        Self {
            id: result.id,
            job_id: result.job_id,
            sheet_name: result.sheet_name.clone(),
            strategy: result.strategy.clone(),
            overall_score: result.overall_score,
            total_questions: result.summary.total_questions,
            created_at: result.created_at,
            total_ms: result.timing.total_ms,
        }
    }
}

/// Durable, append-only store of past evaluation results.
///
/// The core pipeline only calls `save`; history and dashboard surfaces call
/// `list` and `get`.
pub trait SessionStore: Send + Sync {
    /// Append one result. Rejects a duplicate id; never mutates in place.
    fn save(&self, result: &EvaluationResult) -> anyhow::Result<Uuid>;

    /// List summaries matching `filter`, newest first.
    fn list(&self, filter: &SessionFilter) -> anyhow::Result<Vec<SessionSummary>>;

    /// Fetch one full result by id.
    fn get(&self, id: Uuid) -> anyhow::Result<EvaluationResult>;
}

// ---------------------------------------------------------------------------
// Answer text helpers
// ---------------------------------------------------------------------------

/// Normalize an answer for comparison: trim, lowercase, collapse runs of
/// whitespace to single spaces.
pub fn normalize_answer(s: &str) -> String {
    s.split_whitespace()
        .map(|t| t.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token-overlap similarity between two answers, in [0, 1].
///
/// Counts normalized tokens present in both answers against the larger
/// token set, so extra noise words dilute the score symmetrically.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let norm_a = normalize_answer(a);
    let norm_b = normalize_answer(b);
    let tokens_a: Vec<&str> = norm_a.split(' ').filter(|t| !t.is_empty()).collect();
    let tokens_b: Vec<&str> = norm_b.split(' ').filter(|t| !t.is_empty()).collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let mut remaining = tokens_b.clone();
    let mut shared = 0usize;
    for token in &tokens_a {
        if let Some(pos) = remaining.iter().position(|t| t == token) {
            remaining.remove(pos);
            shared += 1;
        }
    }

    shared as f64 / tokens_a.len().max(tokens_b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_answer("  Paris "), "paris");
        assert_eq!(normalize_answer("H2O\t and   salt"), "h2o and salt");
        assert_eq!(normalize_answer(""), "");
    }

    #[test]
    fn overlap_identical() {
        assert_eq!(token_overlap("42", "42"), 1.0);
        assert_eq!(token_overlap("the mitochondria", "The  Mitochondria"), 1.0);
    }

    #[test]
    fn overlap_disjoint() {
        assert_eq!(token_overlap("carbon", "oxygen"), 0.0);
    }

    #[test]
    fn overlap_partial() {
        let s = token_overlap("kinetic energy", "potential energy");
        assert!((s - 0.5).abs() < 1e-9, "expected 0.5, got {s}");
    }

    #[test]
    fn overlap_empty_is_zero() {
        assert_eq!(token_overlap("", "something"), 0.0);
        assert_eq!(token_overlap("something", "   "), 0.0);
    }

    #[test]
    fn overlap_counts_duplicates_once_each() {
        // "a a b" vs "a b b": one "a" and one "b" pair up out of 3 tokens.
        let s = token_overlap("a a b", "a b b");
        assert!((s - 2.0 / 3.0).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn summary_of_result() {
        use crate::results::*;
        let result = EvaluationResult {
            id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            sheet_name: "midterm.pdf".into(),
            strategy: "ocr".into(),
            overall_score: 72.0,
            verdicts: vec![],
            summary: SummaryStats {
                total_questions: 10,
                correct: 7,
                partial: 1,
                incorrect: 2,
                passed: true,
            },
            recommendations: vec![],
            warnings: vec![],
            timing: TimingBreakdown {
                total_ms: 1234,
                ..Default::default()
            },
            created_at: Utc::now(),
        };
        let summary = SessionSummary::of(&result);
        assert_eq!(summary.sheet_name, "midterm.pdf");
        assert_eq!(summary.total_questions, 10);
        assert_eq!(summary.total_ms, 1234);
    }
}
