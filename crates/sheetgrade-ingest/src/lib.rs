//! sheetgrade-ingest — Document ingestion and page normalization.
//!
//! Turns an uploaded answer-sheet or answer-key file (PNG, JPEG, or PDF)
//! into the ordered sequence of normalized page images the extraction
//! strategies read.

pub mod pdf;
pub mod raster;

use async_trait::async_trait;

use sheetgrade_core::error::EvalError;
use sheetgrade_core::model::{DocumentSource, MediaType, PageImage};
use sheetgrade_core::traits::DocumentIngestor;

/// Default upload cap, mirroring the settings surface (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Default normalized page height in pixels.
pub const DEFAULT_PAGE_HEIGHT: u32 = 1400;

/// Local document ingestor.
pub struct LocalIngestor {
    max_file_size: usize,
    page_height: u32,
    accepted: Vec<MediaType>,
}

impl Default for LocalIngestor {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIngestor {
    pub fn new() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            page_height: DEFAULT_PAGE_HEIGHT,
            accepted: vec![MediaType::Png, MediaType::Jpeg, MediaType::Pdf],
        }
    }

    pub fn with_max_file_size(mut self, bytes: usize) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_page_height(mut self, height: u32) -> Self {
        self.page_height = height;
        self
    }

    pub fn with_accepted(mut self, accepted: Vec<MediaType>) -> Self {
        self.accepted = accepted;
        self
    }
}

#[async_trait]
impl DocumentIngestor for LocalIngestor {
    async fn ingest(&self, doc: &DocumentSource) -> Result<Vec<PageImage>, EvalError> {
        if doc.bytes.len() > self.max_file_size {
            return Err(EvalError::FileTooLarge {
                size: doc.bytes.len(),
                limit: self.max_file_size,
            });
        }
        if !self.accepted.contains(&doc.media_type) {
            return Err(EvalError::unsupported(doc.media_type));
        }

        let decoded = match doc.media_type {
            MediaType::Png | MediaType::Jpeg => {
                vec![raster::decode(&doc.bytes, doc.media_type)?]
            }
            MediaType::Pdf => pdf::extract_page_images(&doc.bytes)?,
        };

        let pages: Vec<PageImage> = decoded
            .iter()
            .enumerate()
            .map(|(i, img)| PageImage::new(i, raster::normalize(img, self.page_height)))
            .collect();

        tracing::debug!(
            name = %doc.name,
            media = %doc.media_type,
            pages = pages.len(),
            "document ingested"
        );
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    fn png_document(width: u32, height: u32) -> DocumentSource {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([220])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        DocumentSource::new("sheet.png", MediaType::Png, buf.into_inner())
    }

    #[tokio::test]
    async fn ingests_png_into_one_normalized_page() {
        let ingestor = LocalIngestor::new().with_page_height(100);
        let pages = ingestor.ingest(&png_document(400, 200)).await.unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].index, 0);
        assert_eq!(pages[0].height(), 100);
        assert_eq!(pages[0].width(), 200);
    }

    #[tokio::test]
    async fn rejects_oversized_upload() {
        let ingestor = LocalIngestor::new().with_max_file_size(64);
        let err = ingestor.ingest(&png_document(100, 100)).await.unwrap_err();
        assert!(matches!(err, EvalError::FileTooLarge { limit: 64, .. }));
    }

    #[tokio::test]
    async fn rejects_media_type_outside_accepted_set() {
        let ingestor = LocalIngestor::new().with_accepted(vec![MediaType::Pdf]);
        let err = ingestor.ingest(&png_document(10, 10)).await.unwrap_err();
        assert!(matches!(err, EvalError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn rejects_undecodable_bytes() {
        let ingestor = LocalIngestor::new();
        let doc = DocumentSource::new("broken.png", MediaType::Png, vec![1, 2, 3, 4]);
        let err = ingestor.ingest(&doc).await.unwrap_err();
        assert!(matches!(err, EvalError::CorruptDocument(_)));
    }
}
