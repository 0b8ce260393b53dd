//! Shared page-geometry analysis for the local strategies.
//!
//! Answer sheets lay questions out as horizontal rows of option cells. Both
//! local strategies start from the same row-band segmentation and differ
//! only in how they read a band.

use image::GrayImage;

/// A horizontal band of inked rows, assumed to hold one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    /// First row of the band (inclusive).
    pub top: u32,
    /// Last row of the band (inclusive).
    pub bottom: u32,
}

impl Band {
    pub fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }
}

/// Minimum band height in pixels; thinner streaks are noise.
const MIN_BAND_HEIGHT: u32 = 3;

/// Segment a page into question bands via horizontal ink projection.
///
/// A row belongs to a band when more than `min_row_ratio` of its pixels are
/// darker than `ink_threshold`.
pub fn detect_bands(page: &GrayImage, ink_threshold: u8, min_row_ratio: f64) -> Vec<Band> {
    let (width, height) = page.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let mut bands = Vec::new();
    let mut current: Option<u32> = None;

    for y in 0..height {
        let dark = (0..width)
            .filter(|&x| page.get_pixel(x, y).0[0] < ink_threshold)
            .count();
        let inked = dark as f64 / width as f64 > min_row_ratio;

        match (inked, current) {
            (true, None) => current = Some(y),
            (false, Some(top)) => {
                if y - top >= MIN_BAND_HEIGHT {
                    bands.push(Band { top, bottom: y - 1 });
                }
                current = None;
            }
            _ => {}
        }
    }
    if let Some(top) = current {
        if height - top >= MIN_BAND_HEIGHT {
            bands.push(Band {
                top,
                bottom: height - 1,
            });
        }
    }

    bands
}

/// Fraction of pixels darker than `ink_threshold` inside one option cell.
pub fn cell_fill_ratio(
    page: &GrayImage,
    band: &Band,
    cell: usize,
    options: usize,
    ink_threshold: u8,
) -> f64 {
    let width = page.width();
    let cell_width = width as f64 / options as f64;
    let x0 = (cell as f64 * cell_width).round() as u32;
    let x1 = (((cell + 1) as f64 * cell_width).round() as u32).min(width);
    if x1 <= x0 {
        return 0.0;
    }

    let total = (x1 - x0) as u64 * band.height() as u64;
    let mut dark = 0u64;
    for y in band.top..=band.bottom {
        for x in x0..x1 {
            if page.get_pixel(x, y).0[0] < ink_threshold {
                dark += 1;
            }
        }
    }
    dark as f64 / total as f64
}

/// Mean x-coordinate of the band's ink, or `None` for a blank band.
pub fn ink_centroid_x(page: &GrayImage, band: &Band, ink_threshold: u8) -> Option<f64> {
    let mut sum = 0u64;
    let mut count = 0u64;
    for y in band.top..=band.bottom {
        for x in 0..page.width() {
            if page.get_pixel(x, y).0[0] < ink_threshold {
                sum += x as u64;
                count += 1;
            }
        }
    }
    if count == 0 {
        None
    } else {
        Some(sum as f64 / count as f64)
    }
}

/// The option letter for a zero-based cell index: 0 → "A".
pub fn option_letter(cell: usize) -> String {
    char::from(b'A' + (cell % 26) as u8).to_string()
}

#[cfg(test)]
pub(crate) mod testutil {
    use image::{GrayImage, Luma};

    /// A white page with one dark mark per question row.
    ///
    /// `marks[i]` is the zero-based option cell marked in row `i`.
    pub fn marked_page(width: u32, height: u32, options: usize, marks: &[usize]) -> GrayImage {
        let mut page = GrayImage::from_pixel(width, height, Luma([255]));
        let rows = marks.len() as u32;
        let row_height = height / (rows * 2);
        let cell_width = width as f64 / options as f64;

        for (row, &cell) in marks.iter().enumerate() {
            let top = (row as u32 * 2 + 1) * row_height;
            let x0 = (cell as f64 * cell_width + cell_width * 0.25) as u32;
            let x1 = (cell as f64 * cell_width + cell_width * 0.75) as u32;
            for y in top..top + row_height {
                for x in x0..x1 {
                    page.put_pixel(x, y, Luma([20]));
                }
            }
        }
        page
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::marked_page;
    use super::*;

    #[test]
    fn detects_one_band_per_marked_row() {
        let page = marked_page(400, 320, 4, &[0, 2, 3, 1]);
        let bands = detect_bands(&page, 128, 0.02);
        assert_eq!(bands.len(), 4);
        assert!(bands.windows(2).all(|w| w[0].bottom < w[1].top));
    }

    #[test]
    fn blank_page_has_no_bands() {
        let page = image::GrayImage::from_pixel(100, 100, image::Luma([255]));
        assert!(detect_bands(&page, 128, 0.02).is_empty());
    }

    #[test]
    fn marked_cell_has_highest_fill() {
        let page = marked_page(400, 160, 4, &[2, 0]);
        let bands = detect_bands(&page, 128, 0.02);
        assert_eq!(bands.len(), 2);

        let fills: Vec<f64> = (0..4)
            .map(|c| cell_fill_ratio(&page, &bands[0], c, 4, 128))
            .collect();
        let best = fills
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap()
            .0;
        assert_eq!(best, 2);
    }

    #[test]
    fn centroid_lands_in_the_marked_cell() {
        let page = marked_page(400, 80, 4, &[3]);
        let bands = detect_bands(&page, 128, 0.02);
        let centroid = ink_centroid_x(&page, &bands[0], 128).unwrap();
        // Cell 3 spans x = 300..400.
        assert!(centroid > 300.0 && centroid < 400.0, "centroid {centroid}");
    }

    #[test]
    fn centroid_of_blank_band_is_none() {
        let page = image::GrayImage::from_pixel(100, 20, image::Luma([255]));
        let band = Band { top: 0, bottom: 19 };
        assert!(ink_centroid_x(&page, &band, 128).is_none());
    }

    #[test]
    fn option_letters() {
        assert_eq!(option_letter(0), "A");
        assert_eq!(option_letter(3), "D");
    }
}
