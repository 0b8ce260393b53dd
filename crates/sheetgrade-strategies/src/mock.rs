//! Mock strategy for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use sheetgrade_core::model::PageImage;
use sheetgrade_core::results::{CandidateAnswer, ExtractionResult};
use sheetgrade_core::traits::{ExtractionContext, ExtractionStrategy};

/// A mock extraction strategy for exercising the engine without real
/// image analysis or network calls.
pub struct MockStrategy {
    name: String,
    /// Candidates to return, or `None` to fail.
    answers: Option<Vec<(String, f64)>>,
    /// Optional artificial latency, for timeout tests.
    delay: Option<Duration>,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last context received.
    last_context: Mutex<Option<ExtractionContext>>,
}

impl MockStrategy {
    /// A mock that returns the given `(answer, confidence)` pairs as
    /// questions 1..=n.
    pub fn with_answers(name: &str, answers: &[(&str, f64)]) -> Self {
        Self {
            name: name.to_string(),
            answers: Some(
                answers
                    .iter()
                    .map(|(a, c)| (a.to_string(), *c))
                    .collect(),
            ),
            delay: None,
            call_count: AtomicU32::new(0),
            last_context: Mutex::new(None),
        }
    }

    /// A mock that always fails.
    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            answers: None,
            delay: None,
            call_count: AtomicU32::new(0),
            last_context: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of calls made to this strategy.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last context passed to this strategy.
    pub fn last_context(&self) -> Option<ExtractionContext> {
        self.last_context.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionStrategy for MockStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(
        &self,
        _pages: &[PageImage],
        ctx: &ExtractionContext,
    ) -> anyhow::Result<ExtractionResult> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_context.lock().unwrap() = Some(ctx.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let Some(answers) = &self.answers else {
            anyhow::bail!("mock strategy '{}' configured to fail", self.name);
        };

        Ok(ExtractionResult {
            job_id: ctx.job_id,
            strategy: self.name.clone(),
            candidates: answers
                .iter()
                .enumerate()
                .map(|(i, (answer, confidence))| {
                    CandidateAnswer::new(i + 1, answer.clone(), *confidence)
                })
                .collect(),
            duration_ms: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use uuid::Uuid;

    fn page() -> PageImage {
        PageImage::new(0, GrayImage::from_pixel(4, 4, Luma([255])))
    }

    #[tokio::test]
    async fn returns_configured_answers() {
        let mock = MockStrategy::with_answers("mock", &[("B", 0.9), ("C", 0.7)]);
        let ctx = ExtractionContext::new(Uuid::nil());

        let result = mock.extract(&[page()], &ctx).await.unwrap();
        assert_eq!(result.candidates.len(), 2);
        assert_eq!(result.candidates[0].answer, "B");
        assert_eq!(result.candidates[1].question_index, 2);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn failing_mock_fails() {
        let mock = MockStrategy::failing("broken");
        let ctx = ExtractionContext::new(Uuid::nil());
        assert!(mock.extract(&[page()], &ctx).await.is_err());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn records_last_context() {
        let mock = MockStrategy::with_answers("mock", &[("A", 1.0)]);
        let mut ctx = ExtractionContext::new(Uuid::nil());
        ctx.ai_instructions = Some("grade generously".into());

        mock.extract(&[page()], &ctx).await.unwrap();
        let seen = mock.last_context().unwrap();
        assert_eq!(seen.ai_instructions.as_deref(), Some("grade generously"));
    }
}
