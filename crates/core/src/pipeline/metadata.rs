//! Intrinsic metadata extraction and orientation-correct decoding.

use std::io::{BufReader, Cursor};

use image::{DynamicImage, ImageFormat};

use crate::error::{Error, Result};

/// A decoded upload: pixels already rotated upright per the embedded EXIF
/// orientation tag, plus the properties we persist.
#[derive(Debug)]
pub struct Decoded {
    pub image: DynamicImage,
    pub format: &'static str,
    pub width: u32,
    pub height: u32,
    /// True when the pixels were physically rotated/flipped, meaning the
    /// stored original must be re-encoded rather than written byte-for-byte.
    pub rotated: bool,
}

/// Decode an uploaded buffer. Any failure to sniff or decode is a
/// `CorruptImage` — undecodable input is not retryable.
pub fn decode(bytes: &[u8], name: &str) -> Result<Decoded> {
    let format = image::guess_format(bytes).map_err(|e| Error::CorruptImage {
        name: name.to_string(),
        detail: e.to_string(),
    })?;
    let image =
        image::load_from_memory_with_format(bytes, format).map_err(|e| Error::CorruptImage {
            name: name.to_string(),
            detail: e.to_string(),
        })?;

    let orientation = exif_orientation(bytes);
    let rotated = orientation != 1;
    let image = apply_orientation(image, orientation);
    let (width, height) = (image.width(), image.height());

    Ok(Decoded {
        image,
        format: format_name(format),
        width,
        height,
        rotated,
    })
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Tiff => "tiff",
        _ => "unknown",
    }
}

/// Read the EXIF orientation tag (1-8). Returns 1 (normal) if missing or
/// unreadable — photos without EXIF are simply taken as-is.
fn exif_orientation(bytes: &[u8]) -> u8 {
    let read = || -> Option<u8> {
        let mut reader = BufReader::new(Cursor::new(bytes));
        let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
        let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
        field.value.get_uint(0).map(|v| v as u8)
    };
    read().unwrap_or(1)
}

/// Physically rotate/flip pixels upright. Handles all 8 EXIF values:
/// 1 normal, 2 mirror, 3 rotate 180°, 4 vertical mirror, 5 transpose,
/// 6 rotate 90° CW, 7 transverse, 8 rotate 90° CCW.
fn apply_orientation(image: DynamicImage, orientation: u8) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate90().flipv(),
        8 => image.rotate270(),
        _ => image,
    }
}
