//! Visual-structural strategy: ink-centroid reading.
//!
//! Instead of comparing per-cell fill like the pattern strategy, this one
//! locates where a question band's ink sits and maps that position to an
//! option cell. The two strategies disagree on different failure modes,
//! which is the point of running both.

use std::time::Instant;

use async_trait::async_trait;
use tracing::instrument;

use sheetgrade_core::model::PageImage;
use sheetgrade_core::results::{CandidateAnswer, ExtractionResult};
use sheetgrade_core::traits::{ExtractionContext, ExtractionStrategy};

use crate::error::StrategyError;
use crate::grid::{cell_fill_ratio, detect_bands, ink_centroid_x, option_letter};

/// Detection tuning for [`VisualStrategy`].
#[derive(Debug, Clone)]
pub struct VisualConfig {
    /// Option cells per question row.
    pub options: usize,
    /// Pixels darker than this count as ink.
    pub ink_threshold: u8,
    /// Fraction of a row that must be inked to join a band.
    pub min_row_ratio: f64,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            options: 4,
            ink_threshold: 128,
            min_row_ratio: 0.02,
        }
    }
}

/// Reads each question band from its ink centroid; confidence is how much of
/// the band's ink is concentrated inside the chosen cell.
pub struct VisualStrategy {
    config: VisualConfig,
}

impl VisualStrategy {
    pub fn new(config: VisualConfig) -> Self {
        Self { config }
    }
}

impl Default for VisualStrategy {
    fn default() -> Self {
        Self::new(VisualConfig::default())
    }
}

#[async_trait]
impl ExtractionStrategy for VisualStrategy {
    fn name(&self) -> &str {
        "visual"
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

                let Some(centroid) = ink_centroid_x(&page.image, band, self.config.ink_threshold)
                else {
                    candidates.push(CandidateAnswer::unreadable(index));
                    continue;
                };

                let cell_width = page.width() as f64 / self.config.options as f64;
                let cell = ((centroid / cell_width) as usize).min(self.config.options - 1);

                // Spread-out ink (stray marks, scribbles over several cells)
                // dilutes the chosen cell's share and with it the confidence.
                let chosen_fill = cell_fill_ratio(
                    &page.image,
                    band,
                    cell,
                    self.config.options,
                    self.config.ink_threshold,
                );
                let total_fill: f64 = (0..self.config.options)
                    .map(|c| {
                        cell_fill_ratio(
                            &page.image,
                            band,
                            c,
                            self.config.options,
                            self.config.ink_threshold,
                        )
                    })
                    .sum();
                let confidence = if total_fill > 0.0 {
                    (chosen_fill / total_fill).clamp(0.0, 1.0)
                } else {
                    0.0
                };

                candidates.push(CandidateAnswer::new(index, option_letter(cell), confidence));
            }
        }

        if candidates.is_empty() {
            return Err(StrategyError::NoAnswersDetected {
                pages: pages.len(),
            }
            .into());
        }

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
