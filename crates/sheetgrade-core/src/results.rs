//! Result types produced by extraction, scoring, and aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One strategy's best guess for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAnswer {
    /// One-based question number.
    pub question_index: usize,
    /// Extracted answer text; empty when the question was unreadable.
    pub answer: String,
    /// Extraction confidence in [0, 1]; 0 marks a failed read.
    pub confidence: f64,
}

impl CandidateAnswer {
    pub fn new(question_index: usize, answer: impl Into<String>, confidence: f64) -> Self {
        Self {
            question_index,
            answer: answer.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// A placeholder for a question the strategy could not read.
    pub fn unreadable(question_index: usize) -> Self {
        Self {
            question_index,
            answer: String::new(),
            confidence: 0.0,
        }
    }
}

/// Everything one strategy extracted from one document.
///
/// Produced once per strategy per job; read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Job this extraction belongs to.
    pub job_id: Uuid,
    /// Name of the strategy that produced it.
    pub strategy: String,
    /// Candidates ordered by question index.
    pub candidates: Vec<CandidateAnswer>,
    /// Wall-clock extraction time.
    pub duration_ms: u64,
}

/// The scored outcome of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Correct,
    Partial,
    Incorrect,
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictStatus::Correct => write!(f, "correct"),
            VerdictStatus::Partial => write!(f, "partial"),
            VerdictStatus::Incorrect => write!(f, "incorrect"),
        }
    }
}

/// One question's verdict, derived deterministically from a candidate
/// answer and the matching key entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionVerdict {
    /// One-based question number.
    pub question_index: usize,
    /// Correct / Partial / Incorrect.
    pub status: VerdictStatus,
    /// Points awarded.
    pub score: f64,
    /// Points available.
    pub max_score: f64,
    /// Extraction confidence the verdict was based on.
    pub confidence: f64,
    /// Human-readable explanation.
    pub feedback: String,
}

/// Counts over a verdict sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_questions: usize,
    pub correct: usize,
    pub partial: usize,
    pub incorrect: usize,
    /// Whether the overall score cleared the pass threshold.
    pub passed: bool,
}

/// Per-stage wall-clock timings for one job.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimingBreakdown {
    pub ingest_ms: u64,
    pub extraction_ms: u64,
    pub scoring_ms: u64,
    pub total_ms: u64,
}

/// Terminal artifact of a completed evaluation.
///
/// Append-only once written to the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Unique result identifier.
    pub id: Uuid,
    /// Job that produced this result.
    pub job_id: Uuid,
    /// Answer sheet file name, for history listings.
    pub sheet_name: String,
    /// Producing strategy, or "combined" for a merged record.
    pub strategy: String,
    /// Percentage score, rounded to one decimal.
    pub overall_score: f64,
    /// Per-question verdicts ordered by question index.
    pub verdicts: Vec<QuestionVerdict>,
    /// Verdict counts and pass/fail.
    pub summary: SummaryStats,
    /// Improvement suggestions derived from weak questions.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Non-fatal degradations, e.g. a strategy that failed mid-job.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Stage timings.
    pub timing: TimingBreakdown,
    /// When the result was produced.
    pub created_at: DateTime<Utc>,
}

/// Name used for the merged multi-strategy record.
pub const COMBINED_STRATEGY: &str = "combined";
