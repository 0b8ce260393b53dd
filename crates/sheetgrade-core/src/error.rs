//! Pipeline error taxonomy.
//!
//! Defined in `sheetgrade-core` so the engine can classify failures — which
//! abort a job, which degrade it, which are the caller's to fix — without
//! string matching.

use thiserror::Error;

use crate::model::MediaType;

/// Errors produced by the evaluation pipeline.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The declared media type is not in the accepted set.
    #[error("unsupported format: {media_type}")]
    UnsupportedFormat { media_type: String },

    /// The uploaded file exceeds the configured size limit.
    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: usize, limit: usize },

    /// The document could not be decoded into page images.
    #[error("corrupt document: {0}")]
    CorruptDocument(String),

    /// Extraction and key cover different question ranges.
    #[error("alignment error: answer key has {expected} questions, extraction produced {actual}")]
    AlignmentError { expected: usize, actual: usize },

    /// Every configured extraction strategy failed.
    #[error("all extraction strategies failed: {reasons}")]
    AllStrategiesFailed { reasons: String },

    /// The answer key document could not be read into a usable key.
    #[error("answer key extraction failed: {0}")]
    KeyExtractionFailed(String),

    /// Rejected before job creation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The job was cancelled before reaching a terminal state.
    #[error("job cancelled before completion")]
    Cancelled,

    /// The session store rejected the result write.
    #[error("store write failed: {0}")]
    Store(#[source] anyhow::Error),
}

impl EvalError {
    /// Returns `true` when the caller can fix the problem by re-uploading
    /// or correcting inputs, rather than the job being unrecoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EvalError::UnsupportedFormat { .. }
                | EvalError::FileTooLarge { .. }
                | EvalError::CorruptDocument(_)
                | EvalError::InvalidConfig(_)
        )
    }

    pub fn unsupported(media_type: MediaType) -> Self {
        EvalError::UnsupportedFormat {
            media_type: media_type.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(EvalError::FileTooLarge {
            size: 20,
            limit: 10
        }
        .is_recoverable());
        assert!(EvalError::CorruptDocument("truncated".into()).is_recoverable());
        assert!(!EvalError::AllStrategiesFailed {
            reasons: "timeout".into()
        }
        .is_recoverable());
        assert!(!EvalError::Cancelled.is_recoverable());
    }

    #[test]
    fn display_includes_counts() {
        let err = EvalError::AlignmentError {
            expected: 3,
            actual: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains('3') && msg.contains('2'), "got: {msg}");
    }
}
