//! Strategy error types.
//!
//! These errors represent failures inside a single extraction strategy. The
//! engine isolates them per strategy: one failing strategy never aborts its
//! siblings.

use thiserror::Error;

/// Errors a strategy can raise while extracting answers.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The remote recognition service rejected the credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The remote recognition service returned an error response.
    #[error("recognition API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The pages held nothing the strategy recognized as answers.
    #[error("no answers detected across {pages} page(s)")]
    NoAnswersDetected { pages: usize },
}

impl StrategyError {
    /// Returns `true` if this error is permanent for the job — retrying the
    /// same request cannot help.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            StrategyError::AuthenticationFailed(_) | StrategyError::NoAnswersDetected { .. }
        )
    }
}
