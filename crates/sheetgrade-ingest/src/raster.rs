//! Raster decoding and page normalization.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat};

use sheetgrade_core::error::EvalError;
use sheetgrade_core::model::MediaType;

/// Decode raster bytes, verifying the content matches the declared type.
pub fn decode(bytes: &[u8], declared: MediaType) -> Result<DynamicImage, EvalError> {
    let sniffed = image::guess_format(bytes)
        .map_err(|e| EvalError::CorruptDocument(format!("unrecognized image data: {e}")))?;

    let expected = match declared {
        MediaType::Png => ImageFormat::Png,
        MediaType::Jpeg => ImageFormat::Jpeg,
        MediaType::Pdf => {
            return Err(EvalError::CorruptDocument(
                "pdf bytes reached the raster decoder".to_string(),
            ))
        }
    };
    if sniffed != expected {
        return Err(EvalError::CorruptDocument(format!(
            "declared {declared} but content is {sniffed:?}"
        )));
    }

    image::load_from_memory(bytes)
        .map_err(|e| EvalError::CorruptDocument(format!("image decode failed: {e}")))
}

/// Normalize a decoded page: grayscale, resized to `target_height` with the
/// aspect ratio preserved.
pub fn normalize(img: &DynamicImage, target_height: u32) -> GrayImage {
    let gray = img.to_luma8();
    if gray.height() == target_height {
        return gray;
    }
    let scale = target_height as f64 / gray.height() as f64;
    let width = ((gray.width() as f64 * scale).round() as u32).max(1);
    image::imageops::resize(&gray, width, target_height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([200])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn decode_png_roundtrip() {
        let bytes = png_bytes(60, 40);
        let img = decode(&bytes, MediaType::Png).unwrap();
        assert_eq!(img.to_luma8().dimensions(), (60, 40));
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode(b"not an image at all", MediaType::Png).unwrap_err();
        assert!(matches!(err, EvalError::CorruptDocument(_)));
    }

    #[test]
    fn decode_rejects_mismatched_declaration() {
        let bytes = png_bytes(8, 8);
        let err = decode(&bytes, MediaType::Jpeg).unwrap_err();
        assert!(matches!(err, EvalError::CorruptDocument(_)));
    }

    #[test]
    fn normalize_preserves_aspect_ratio() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 100, Luma([128])));
        let normalized = normalize(&img, 50);
        assert_eq!(normalized.height(), 50);
        assert_eq!(normalized.width(), 100);
    }

    #[test]
    fn normalize_is_identity_at_target_height() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(30, 50, Luma([128])));
        let normalized = normalize(&img, 50);
        assert_eq!(normalized.dimensions(), (30, 50));
    }
}
