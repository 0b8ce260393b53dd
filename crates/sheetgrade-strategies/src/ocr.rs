//! Remote OCR text-extraction strategy.
//!
//! Posts each normalized page to a recognition service and parses the
//! returned text lines ("3. B", "12) photosynthesis") into per-question
//! candidates.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::Instant;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use tracing::instrument;

use sheetgrade_core::model::PageImage;
use sheetgrade_core::results::{CandidateAnswer, ExtractionResult};
use sheetgrade_core::traits::{ExtractionContext, ExtractionStrategy};

use crate::error::StrategyError;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Remote OCR strategy.
pub struct OcrStrategy {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for OcrStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrStrategy")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl OcrStrategy {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    async fn recognize_page(
        &self,
        page: &PageImage,
        ctx: &ExtractionContext,
    ) -> anyhow::Result<OcrResponse> {
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(page.image.clone())
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| anyhow::anyhow!("failed to encode page {}: {e}", page.index))?;

        let mut request = self
            .client
            .post(format!("{}/v1/recognize", self.endpoint))
            .header("content-type", "image/png")
            .body(png.into_inner());
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        if let Some(instructions) = &ctx.ai_instructions {
            request = request.header("x-grading-instructions", instructions);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StrategyError::Timeout(DEFAULT_TIMEOUT_SECS)
            } else if e.is_connect() {
                StrategyError::NetworkError(format!(
                    "recognition service not reachable at {}",
                    self.endpoint
                ))
            } else {
                StrategyError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(StrategyError::AuthenticationFailed(
                "recognition service rejected the API key".to_string(),
            )
            .into());
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(StrategyError::ApiError {
                status,
                message: body,
            }
            .into());
        }

        let parsed: OcrResponse = response.json().await.map_err(|e| StrategyError::ApiError {
            status: 0,
            message: format!("failed to parse response: {e}"),
        })?;
        Ok(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    lines: Vec<OcrLine>,
}

#[derive(Debug, Deserialize)]
struct OcrLine {
    text: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

/// Parse one recognized line into `(question_index, answer)`.
///
/// Accepts "3. B", "12) photosynthesis", "7: H2O", "4 - mitosis", and plain
/// "5 kinetic energy". Lines without a leading question number are skipped.
pub fn parse_answer_line(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    if digits_end == 0 {
        return None;
    }
    let index: usize = trimmed[..digits_end].parse().ok()?;
    if index == 0 {
        return None;
    }

    let mut rest = trimmed[digits_end..].trim_start();
    if let Some(first) = rest.chars().next() {
        if matches!(first, '.' | ')' | ':' | '-') {
            rest = rest[first.len_utf8()..].trim_start();
        }
    }

    let answer = rest.trim();
    if answer.is_empty() {
        return None;
    }
    Some((index, answer.to_string()))
}

#[async_trait]
impl ExtractionStrategy for OcrStrategy {
    fn name(&self) -> &str {
        "ocr"
    }

    #[instrument(skip(self, pages, ctx), fields(pages = pages.len()))]
    async fn extract(
        &self,
        pages: &[PageImage],
        ctx: &ExtractionContext,
    ) -> anyhow::Result<ExtractionResult> {
        let start = Instant::now();

        // Duplicate question numbers across pages keep the higher confidence.
        let mut by_index: BTreeMap<usize, CandidateAnswer> = BTreeMap::new();
        for page in pages {
            let response = self.recognize_page(page, ctx).await?;
            for line in response.lines {
                let Some((index, answer)) = parse_answer_line(&line.text) else {
                    continue;
                };
                let candidate = CandidateAnswer::new(index, answer, line.confidence);
                match by_index.get(&index) {
                    Some(existing) if existing.confidence >= candidate.confidence => {}
                    _ => {
                        by_index.insert(index, candidate);
                    }
                }
            }
        }

        if by_index.is_empty() {
            return Err(StrategyError::NoAnswersDetected {
                pages: pages.len(),
            }
            .into());
        }

        // Fill unrecognized gaps so indices stay aligned with the key.
        let max_seen = *by_index.keys().next_back().expect("non-empty map");
        let upper = ctx.expected_questions.unwrap_or(max_seen).max(max_seen);
        let candidates = (1..=upper)
            .map(|i| {
                by_index
                    .remove(&i)
                    .unwrap_or_else(|| CandidateAnswer::unreadable(i))
            })
            .collect();

        Ok(ExtractionResult {
            job_id: ctx.job_id,
            strategy: self.name().to_string(),
            candidates,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
