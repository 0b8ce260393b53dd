//! Core data model types for sheetgrade.
//!
//! These are the fundamental types the entire sheetgrade system uses to
//! represent uploaded documents, evaluation jobs, scoring configuration,
//! and answer keys.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EvalError;

/// Media types accepted at the upload boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Png,
    Jpeg,
    Pdf,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Png => write!(f, "png"),
            MediaType::Jpeg => write!(f, "jpeg"),
            MediaType::Pdf => write!(f, "pdf"),
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" | "image/png" => Ok(MediaType::Png),
            "jpg" | "jpeg" | "image/jpeg" | "image/jpg" => Ok(MediaType::Jpeg),
            "pdf" | "application/pdf" => Ok(MediaType::Pdf),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

impl MediaType {
    /// Guess the media type from a file name extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit('.').next()?;
        ext.parse().ok()
    }
}

/// An uploaded document: raw bytes plus the declared media type.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    /// Original file name, used for labeling results.
    pub name: String,
    /// Declared media type.
    pub media_type: MediaType,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

impl DocumentSource {
    pub fn new(name: impl Into<String>, media_type: MediaType, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type,
            bytes,
        }
    }
}

/// A single normalized page image produced by the ingestor.
///
/// Pages are grayscale and resized to a common height so every extraction
/// strategy reads the same canonical representation.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Zero-based page index within the document.
    pub index: usize,
    /// Normalized grayscale pixels.
    pub image: GrayImage,
}

impl PageImage {
    pub fn new(index: usize, image: GrayImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Lifecycle states of an evaluation job.
///
/// `Complete` and `Failed` are terminal: a finished job is never retried in
/// place; callers submit a new job instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Extracting,
    Scoring,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Extracting => write!(f, "extracting"),
            JobStatus::Scoring => write!(f, "scoring"),
            JobStatus::Complete => write!(f, "complete"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One evaluation job: a sheet/key pair moving through the pipeline.
///
/// Owned exclusively by the engine until it reaches a terminal state, after
/// which the record is immutable. The `error` field holds the terminal
/// failure reason so it stays retrievable after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationJob {
    /// Unique job identifier.
    pub id: Uuid,
    /// File name of the answer sheet.
    pub sheet_name: String,
    /// File name of the answer key document or manifest.
    pub key_name: String,
    /// Scoring configuration supplied at submission.
    pub config: ScoringConfig,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Terminal failure reason, if the job failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl EvaluationJob {
    pub fn new(sheet_name: &str, key_name: &str, config: ScoringConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            sheet_name: sheet_name.to_string(),
            key_name: key_name.to_string(),
            config,
            created_at: Utc::now(),
            status: JobStatus::Pending,
            error: None,
        }
    }
}

/// Scoring policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMethod {
    /// Exact match (case/whitespace-normalized) or nothing.
    Strict,
    /// Intermediate credit when similarity clears the partial threshold.
    Partial,
    /// Points scale with confidence-adjusted similarity.
    AiWeighted,
}

impl fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringMethod::Strict => write!(f, "strict"),
            ScoringMethod::Partial => write!(f, "partial"),
            ScoringMethod::AiWeighted => write!(f, "ai"),
        }
    }
}

impl FromStr for ScoringMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(ScoringMethod::Strict),
            "partial" => Ok(ScoringMethod::Partial),
            "ai" | "aiweighted" | "ai-weighted" => Ok(ScoringMethod::AiWeighted),
            other => Err(format!("unknown scoring method: {other}")),
        }
    }
}

/// Per-job scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Scoring policy to apply per question.
    #[serde(default = "default_method")]
    pub method: ScoringMethod,
    /// Total points available across all questions.
    #[serde(default = "default_total_points")]
    pub total_points: f64,
    /// Pass mark as a percentage of total points.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    /// Similarity floor for partial credit, in (0, 1).
    #[serde(default = "default_partial_threshold")]
    pub partial_threshold: f64,
    /// Free-text grading instructions, passed opaquely to strategies.
    #[serde(default)]
    pub ai_instructions: Option<String>,
}

fn default_method() -> ScoringMethod {
    ScoringMethod::AiWeighted
}

fn default_total_points() -> f64 {
    100.0
}

fn default_pass_threshold() -> f64 {
    60.0
}

fn default_partial_threshold() -> f64 {
    0.5
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            total_points: default_total_points(),
            pass_threshold: default_pass_threshold(),
            partial_threshold: default_partial_threshold(),
            ai_instructions: None,
        }
    }
}

impl ScoringConfig {
    /// Reject out-of-range configuration before a job is created.
    pub fn validate(&self) -> Result<(), EvalError> {
        if !(0.0..=100.0).contains(&self.pass_threshold) {
            return Err(EvalError::InvalidConfig(format!(
                "pass_threshold must be between 0 and 100, got {}",
                self.pass_threshold
            )));
        }
        if !self.total_points.is_finite() || self.total_points <= 0.0 {
            return Err(EvalError::InvalidConfig(format!(
                "total_points must be positive, got {}",
                self.total_points
            )));
        }
        if !(self.partial_threshold > 0.0 && self.partial_threshold < 1.0) {
            return Err(EvalError::InvalidConfig(format!(
                "partial_threshold must be strictly between 0 and 1, got {}",
                self.partial_threshold
            )));
        }
        Ok(())
    }
}

/// The reference answers one sheet is graded against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerKey {
    /// Entries ordered by question index.
    pub entries: Vec<KeyEntry>,
}

/// One expected answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// One-based question number.
    pub index: usize,
    /// The expected answer text.
    pub expected: String,
    /// Points this question is worth.
    pub points: f64,
    /// Optional subject-area tag used to group recommendations.
    #[serde(default)]
    pub subject: Option<String>,
}

impl AnswerKey {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a key from extracted answers, splitting `total_points` evenly.
    ///
    /// The last question absorbs the rounding remainder so the point sum is
    /// exactly `total_points`.
    pub fn from_answers(answers: &[String], total_points: f64) -> Self {
        let n = answers.len();
        let per = if n == 0 {
            0.0
        } else {
            (total_points / n as f64 * 100.0).floor() / 100.0
        };
        let entries = answers
            .iter()
            .enumerate()
            .map(|(i, expected)| {
                let points = if i + 1 == n {
                    total_points - per * (n as f64 - 1.0)
                } else {
                    per
                };
                KeyEntry {
                    index: i + 1,
                    expected: expected.clone(),
                    points,
                    subject: None,
                }
            })
            .collect();
        Self { entries }
    }
}
