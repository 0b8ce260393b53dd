//! Pattern-recognition strategy: bubble-grid mark detection.

use std::time::Instant;

use async_trait::async_trait;
use tracing::instrument;

use sheetgrade_core::model::PageImage;
use sheetgrade_core::results::{CandidateAnswer, ExtractionResult};
use sheetgrade_core::traits::{ExtractionContext, ExtractionStrategy};

use crate::error::StrategyError;
use crate::grid::{cell_fill_ratio, detect_bands, option_letter};

/// Detection tuning for [`PatternStrategy`].
#[derive(Debug, Clone)]
pub struct PatternConfig {
    /// Option cells per question row.
    pub options: usize,
    /// Pixels darker than this count as ink.
    pub ink_threshold: u8,
    /// Fraction of a row that must be inked to join a band.
    pub min_row_ratio: f64,
    /// Minimum winning-cell fill; anything fainter is unreadable.
    pub min_fill: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            options: 4,
            ink_threshold: 128,
            min_row_ratio: 0.02,
            min_fill: 0.05,
        }
    }
}

/// Reads each question band by comparing option-cell fill ratios: the
/// darkest cell wins, and the margin over the runner-up sets confidence.
pub struct PatternStrategy {
    config: PatternConfig,
}

impl PatternStrategy {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    fn read_band(
        &self,
        page: &PageImage,
        band: &crate::grid::Band,
        question_index: usize,
    ) -> CandidateAnswer {
        let fills: Vec<f64> = (0..self.config.options)
            .map(|cell| {
                cell_fill_ratio(
                    &page.image,
                    band,
                    cell,
                    self.config.options,
                    self.config.ink_threshold,
                )
            })
            .collect();

        let (best_cell, best) = fills
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .expect("options > 0");

        if best < self.config.min_fill {
            return CandidateAnswer::unreadable(question_index);
        }

        let runner_up = fills
            .iter()
            .copied()
            .enumerate()
            .filter(|(cell, _)| *cell != best_cell)
            .map(|(_, fill)| fill)
            .fold(0.0f64, f64::max);

        // A second cell nearly as dark as the winner means a double mark;
        // confidence collapses toward zero as the margin vanishes.
        let confidence = ((best - runner_up) / best).clamp(0.0, 1.0);

        CandidateAnswer::new(question_index, option_letter(best_cell), confidence)
    }
}

impl Default for PatternStrategy {
    fn default() -> Self {
        Self::new(PatternConfig::default())
    }
}

#[async_trait]
impl ExtractionStrategy for PatternStrategy {
    fn name(&self) -> &str {
        "pattern"
    }

    #[instrument(skip(self, pages, ctx), fields(pages = pages.len()))]
    async fn extract(
        &self,
        pages: &[PageImage],
        ctx: &ExtractionContext,
    ) -> anyhow::Result<ExtractionResult> {
        let start = Instant::now();
        let mut candidates = Vec::new();

        for page in pages {
            let bands = detect_bands(
                &page.image,
                self.config.ink_threshold,
                self.config.min_row_ratio,
            );
            for band in &bands {
                let index = candidates.len() + 1;
                candidates.push(self.read_band(page, band, index));
            }
        }

        if candidates.is_empty() {
            return Err(StrategyError::NoAnswersDetected {
                pages: pages.len(),
            }
            .into());
        }

        // Pad unreadable trailing questions rather than shifting indices.
        if let Some(expected) = ctx.expected_questions {
            while candidates.len() < expected {
                candidates.push(CandidateAnswer::unreadable(candidates.len() + 1));
            }
        }

        Ok(ExtractionResult {
            job_id: ctx.job_id,
            strategy: self.name().to_string(),
            candidates,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::testutil::marked_page;
    use image::{GrayImage, Luma};
    use uuid::Uuid;

    fn ctx(expected: Option<usize>) -> ExtractionContext {
        ExtractionContext {
            job_id: Uuid::nil(),
            expected_questions: expected,
            ai_instructions: None,
        }
    }

    #[tokio::test]
    async fn reads_marked_options_in_order() {
        let page = PageImage::new(0, marked_page(400, 320, 4, &[0, 2, 3, 1]));
        let strategy = PatternStrategy::default();

        let result = strategy.extract(&[page], &ctx(None)).await.unwrap();
        let answers: Vec<&str> = result.candidates.iter().map(|c| c.answer.as_str()).collect();
        assert_eq!(answers, vec!["A", "C", "D", "B"]);
        assert!(result.candidates.iter().all(|c| c.confidence > 0.8));
        assert_eq!(result.candidates[0].question_index, 1);
    }

    #[tokio::test]
    async fn numbers_questions_across_pages() {
        let p0 = PageImage::new(0, marked_page(400, 160, 4, &[1, 1]));
        let p1 = PageImage::new(1, marked_page(400, 160, 4, &[3]));
        let strategy = PatternStrategy::default();

        let result = strategy.extract(&[p0, p1], &ctx(None)).await.unwrap();
        assert_eq!(result.candidates.len(), 3);
        assert_eq!(result.candidates[2].question_index, 3);
        assert_eq!(result.candidates[2].answer, "D");
    }

    #[tokio::test]
    async fn double_mark_collapses_confidence() {
        // Two equally dark marks in one row: band detected, answer ambiguous.
        // marked_page(400, 80, ..) puts the single question band at y = 40..80
        // with the mark for cell 0 at x = 25..75; mirror it into cell 2.
        let mut page = marked_page(400, 80, 4, &[0]);
        for y in 40..80 {
            for x in 225..275 {
                page.put_pixel(x, y, Luma([20]));
            }
        }
        let strategy = PatternStrategy::default();
        let result = strategy
            .extract(&[PageImage::new(0, page)], &ctx(None))
            .await
            .unwrap();
        assert!(
            result.candidates[0].confidence < 0.2,
            "ambiguous mark should have low confidence, got {}",
            result.candidates[0].confidence
        );
    }

    #[tokio::test]
    async fn blank_page_is_an_error() {
        let page = PageImage::new(0, GrayImage::from_pixel(200, 200, Luma([255])));
        let strategy = PatternStrategy::default();
        let err = strategy.extract(&[page], &ctx(None)).await.unwrap_err();
        assert!(err.to_string().contains("no answers detected"));
    }

    #[tokio::test]
    async fn pads_missing_trailing_questions() {
        let page = PageImage::new(0, marked_page(400, 160, 4, &[0, 1]));
        let strategy = PatternStrategy::default();

        let result = strategy.extract(&[page], &ctx(Some(4))).await.unwrap();
        assert_eq!(result.candidates.len(), 4);
        assert_eq!(result.candidates[3].confidence, 0.0);
        assert!(result.candidates[3].answer.is_empty());
    }
}
