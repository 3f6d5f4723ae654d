//! Bounded-box resolution derivation.

use fast_image_resize::{self as fir, images::Image as FirImage};
use image::RgbImage;

use crate::error::{Error, Result};

/// Fit `(width, height)` inside `(max_width, max_height)` preserving aspect
/// ratio, never upscaling past the original.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// SIMD resize of an RGB image into the bounding box. Returns a clone when
/// the source already fits (no upscaling).
pub fn resize_to_fit(
    name: &str,
    src: &RgbImage,
    max_width: u32,
    max_height: u32,
) -> Result<RgbImage> {
    let (w, h) = (src.width(), src.height());
    let (tw, th) = fit_within(w, h, max_width, max_height);
    if (tw, th) == (w, h) {
        return Ok(src.clone());
    }

    let resize_err = |detail: String| Error::CorruptImage {
        name: name.to_string(),
        detail,
    };

    let fir_src = FirImage::from_vec_u8(w, h, src.as_raw().clone(), fir::PixelType::U8x3)
        .map_err(|e| resize_err(e.to_string()))?;
    let mut fir_dst = FirImage::new(tw, th, fir::PixelType::U8x3);
    fir::Resizer::new()
        .resize(&fir_src, &mut fir_dst, None)
        .map_err(|e| resize_err(e.to_string()))?;

    RgbImage::from_raw(tw, th, fir_dst.buffer().to_vec())
        .ok_or_else(|| resize_err("resize produced a short buffer".to_string()))
}

/// Encode RGB pixels as JPEG at the given quality.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}
