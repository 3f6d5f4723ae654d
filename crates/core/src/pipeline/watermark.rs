//! Text watermark compositing.
//!
//! Draws the session's watermark text near the bottom-right corner of a
//! derived variant, with a subtle offset shadow for legibility on busy
//! backgrounds. Font size is proportional to the variant's shorter
//! dimension so the mark reads the same across sizes. Failures here are
//! never fatal to ingestion — the caller falls back to the plain variant.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use rusttype::{point, Font, Scale};
use tracing::debug;

/// Font size as a fraction of the shorter image dimension.
const SIZE_RATIO: f32 = 0.05;
const MIN_SIZE_PX: f32 = 12.0;

/// Well-known system font locations, tried when no font is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
];

/// Load the watermark font from the configured path, falling back to the
/// system candidates. `None` means watermarking degrades to a no-op.
pub fn load_font(configured: Option<&Path>) -> Option<Font<'static>> {
    let candidates: Vec<PathBuf> = configured
        .map(|p| vec![p.to_path_buf()])
        .unwrap_or_else(|| FONT_CANDIDATES.iter().map(PathBuf::from).collect());

    for path in candidates {
        if let Ok(bytes) = std::fs::read(&path) {
            if let Some(font) = Font::try_from_vec(bytes) {
                debug!(path = %path.display(), "watermark font loaded");
                return Some(font);
            }
        }
    }
    None
}

/// Composite `text` onto `img` near the bottom-right corner.
pub fn apply(img: &mut RgbImage, text: &str, opacity: f32, font: &Font) {
    if text.is_empty() {
        return;
    }
    let (w, h) = (img.width(), img.height());
    let shorter = w.min(h) as f32;
    let size = (shorter * SIZE_RATIO).max(MIN_SIZE_PX);
    let scale = Scale::uniform(size);

    let text_width = measure_width(font, text, scale);
    let margin = (size * 0.6).round() as i32;
    let x = (w as i32 - text_width - margin).max(0);
    let y = (h as i32 - size.ceil() as i32 - margin).max(0);

    let opacity = opacity.clamp(0.0, 1.0);
    let shadow_offset = ((size / 16.0).round() as i32).max(1);

    draw_text(
        img,
        text,
        font,
        scale,
        x + shadow_offset,
        y + shadow_offset,
        Rgb([0, 0, 0]),
        opacity * 0.7,
    );
    draw_text(img, text, font, scale, x, y, Rgb([255, 255, 255]), opacity);
}

fn measure_width(font: &Font, text: &str, scale: Scale) -> i32 {
    let v_metrics = font.v_metrics(scale);
    font.layout(text, scale, point(0.0, v_metrics.ascent))
        .filter_map(|g| g.pixel_bounding_box())
        .map(|bb| bb.max.x)
        .max()
        .unwrap_or(0)
}

fn draw_text(
    canvas: &mut RgbImage,
    text: &str,
    font: &Font,
    scale: Scale,
    x: i32,
    y: i32,
    color: Rgb<u8>,
    opacity: f32,
) {
    let v_metrics = font.v_metrics(scale);
    let glyphs: Vec<_> = font
        .layout(text, scale, point(0.0, v_metrics.ascent))
        .collect();

    for glyph in glyphs {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, gv| {
                let px = x + gx as i32 + bb.min.x;
                let py = y + gy as i32 + bb.min.y;
                if px < 0 || py < 0 || px >= canvas.width() as i32 || py >= canvas.height() as i32 {
                    return;
                }
                let alpha = gv * opacity;
                let pixel = canvas.get_pixel_mut(px as u32, py as u32);
                for c in 0..3 {
                    pixel[c] =
                        ((1.0 - alpha) * pixel[c] as f32 + alpha * color[c] as f32).round() as u8;
                }
            });
        }
    }
}
