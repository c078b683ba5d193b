// Phase 6: 全ページの画像XObjectを列挙して表示可能なレコードにする

use tracing::{debug, info, warn};

use crate::pdf::image_xobject::{as_image_stream, decode_image, declared_dimensions};
use crate::pdf::reader::PdfReader;
use crate::pipeline::ImageRecord;
use crate::store::id::new_token;

/// Extract every image XObject from a PDF byte stream.
///
/// Fails only when the bytes are not a parseable PDF. A document without
/// images yields an empty list.
pub fn extract_images(bytes: &[u8]) -> crate::error::Result<Vec<ImageRecord>> {
    let reader = PdfReader::from_bytes(bytes)?;
    Ok(extract_images_from(&reader))
}

/// Extract images from an already opened document.
///
/// Pages are visited in document order and each page's XObject entries in
/// dictionary order. Entries that are not images, or that declare a
/// non-positive size, are skipped silently. An image whose stream cannot be
/// decoded is logged and skipped without affecting the others; the page's
/// `index` counter only advances for emitted records.
pub fn extract_images_from(reader: &PdfReader) -> Vec<ImageRecord> {
    let mut records = Vec::new();

    for page in reader.pages() {
        let mut index = 0u32;
        for entry in reader.page_xobjects(&page) {
            let Some(object) = entry.object else {
                debug!(page = page.number, name = %entry.name, "XObject reference is dangling");
                continue;
            };
            let Some(stream) = as_image_stream(object) else {
                continue;
            };
            let Some((width, height)) = declared_dimensions(reader, &stream.dict) else {
                debug!(page = page.number, name = %entry.name, "image without positive dimensions");
                continue;
            };

            match decode_image(reader, stream) {
                Ok(display) => {
                    records.push(ImageRecord {
                        id: new_token(),
                        page_number: page.number,
                        index,
                        width,
                        height,
                        format: display.format,
                        data_url: display.data_url,
                        alt_text: None,
                        alt_text_generated: false,
                    });
                    index += 1;
                }
                Err(e) => {
                    warn!(page = page.number, name = %entry.name, error = %e, "skipping unreadable image");
                }
            }
        }
    }

    info!(
        pages = reader.page_count(),
        images = records.len(),
        "image extraction finished"
    );
    records
}
