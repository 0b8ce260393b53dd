//! PDF page-image extraction.
//!
//! Scanned answer sheets arrive as PDFs wrapping one raster image per page.
//! This module walks the page tree with `lopdf` and pulls the largest image
//! XObject off each page; DCTDecode streams are decoded as JPEG, plain
//! FlateDecode streams as raw gray/RGB samples.

use image::DynamicImage;
use lopdf::{Dictionary, Document, Object, Stream};

use sheetgrade_core::error::EvalError;

/// Extract one image per page, in page order.
///
/// Pages without a decodable image are skipped; a document yielding no
/// images at all is corrupt.
pub fn extract_page_images(bytes: &[u8]) -> Result<Vec<DynamicImage>, EvalError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| EvalError::CorruptDocument(format!("pdf parse failed: {e}")))?;

    let mut images = Vec::new();
    for (page_no, page_id) in doc.get_pages() {
        match largest_page_image(&doc, page_id) {
            Some(img) => images.push(img),
            None => tracing::debug!("page {page_no} has no decodable image xobject"),
        }
    }

    if images.is_empty() {
        return Err(EvalError::CorruptDocument(
            "pdf contains no decodable page images".to_string(),
        ));
    }
    Ok(images)
}

/// Follow a reference to its target object.
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn largest_page_image(doc: &Document, page_id: lopdf::ObjectId) -> Option<DynamicImage> {
    let page = doc.get_dictionary(page_id).ok()?;
    let resources = resolve(doc, page.get(b"Resources").ok()?).as_dict().ok()?;
    let xobjects = resolve(doc, resources.get(b"XObject").ok()?)
        .as_dict()
        .ok()?;

    let mut best: Option<(u64, DynamicImage)> = None;
    for (_name, obj) in xobjects.iter() {
        let Ok(stream) = resolve(doc, obj).as_stream() else {
            continue;
        };
        if !is_image(&stream.dict) {
            continue;
        }
        let Some(img) = decode_image_stream(stream) else {
            continue;
        };
        let area = img.width() as u64 * img.height() as u64;
        if best.as_ref().map(|(a, _)| area > *a).unwrap_or(true) {
            best = Some((area, img));
        }
    }
    best.map(|(_, img)| img)
}

fn is_image(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .and_then(|o| o.as_name())
        .map(|n| n == b"Image")
        .unwrap_or(false)
}

fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_image_stream(stream: &Stream) -> Option<DynamicImage> {
    let filters = filter_names(&stream.dict);

    // JPEG-compressed image data decodes directly.
    if filters.iter().any(|f| f == b"DCTDecode") {
        return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
            .ok();
    }

    // Otherwise expect raw 8-bit samples, possibly flate-compressed.
    let bits = stream
        .dict
        .get(b"BitsPerComponent")
        .and_then(|o| o.as_i64())
        .unwrap_or(8);
    if bits != 8 {
        return None;
    }

    let width = stream.dict.get(b"Width").and_then(|o| o.as_i64()).ok()? as u32;
    let height = stream.dict.get(b"Height").and_then(|o| o.as_i64()).ok()? as u32;
    let data = if filters.iter().any(|f| f == b"FlateDecode") {
        stream.decompressed_content().ok()?
    } else if filters.is_empty() {
        stream.content.clone()
    } else {
        return None;
    };

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .and_then(|o| o.as_name())
        .map(|n| n.to_vec())
        .unwrap_or_else(|_| b"DeviceGray".to_vec());

    match color_space.as_slice() {
        b"DeviceGray" => {
            if data.len() < (width * height) as usize {
                return None;
            }
            image::GrayImage::from_raw(width, height, data[..(width * height) as usize].to_vec())
                .map(DynamicImage::ImageLuma8)
        }
        b"DeviceRGB" => {
            if data.len() < (width * height * 3) as usize {
                return None;
            }
            image::RgbImage::from_raw(
                width,
                height,
                data[..(width * height * 3) as usize].to_vec(),
            )
            .map(DynamicImage::ImageRgb8)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Build a one-page PDF wrapping a raw DeviceGray image.
    fn gray_image_pdf(width: i64, height: i64, value: u8) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let img_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        };
        let img_id = doc.add_object(Stream::new(
            img_dict,
            vec![value; (width * height) as usize],
        ));

        let resources_id = doc.add_object(dictionary! {
            "XObject" => dictionary! { "Im0" => Object::Reference(img_id) },
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Resources" => Object::Reference(resources_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
        });

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn extracts_embedded_gray_image() {
        let bytes = gray_image_pdf(6, 4, 77);
        let images = extract_page_images(&bytes).unwrap();
        assert_eq!(images.len(), 1);
        let gray = images[0].to_luma8();
        assert_eq!(gray.dimensions(), (6, 4));
        assert_eq!(gray.get_pixel(0, 0).0[0], 77);
    }

    #[test]
    fn rejects_garbage_bytes() {
        let err = extract_page_images(b"%PDF-1.4 truncated nonsense").unwrap_err();
        assert!(matches!(err, EvalError::CorruptDocument(_)));
    }

    #[test]
    fn rejects_pdf_without_images() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let err = extract_page_images(&bytes).unwrap_err();
        assert!(matches!(err, EvalError::CorruptDocument(_)));
    }
}
