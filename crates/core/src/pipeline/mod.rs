//! Photo ingestion pipeline.
//!
//! Ordered, fail-fast steps per upload: type allow-list → size cap →
//! unique naming → decode/metadata → original persistence → resolution
//! derivation → optional watermark. Every fatal error removes whatever
//! blobs the attempt already wrote, so a failed upload leaves no trace.

pub mod metadata;
pub mod resize;
pub mod watermark;

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::{Session, Variant};
use crate::error::{Error, Result};
use crate::storage::{remove_blobs, write_with_retry, BlobStore};

/// One named derived resolution: a bounding box plus JPEG quality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionPreset {
    pub name: String,
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
    /// Thumbnails opt out of watermarking.
    pub watermark: bool,
}

/// Recognized ingestion options. Deserialization falls back to the
/// defaults field by field, so a config file may override just one knob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub allowed_extensions: HashSet<String>,
    pub max_file_size: u64,
    pub presets: Vec<ResolutionPreset>,
    pub default_watermark_opacity: f32,
    pub default_review_mode: bool,
    /// Per-file processing budget; exceeding it is a terminal failure.
    pub processing_budget_ms: u64,
    pub font_path: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: ["jpg", "jpeg", "png", "webp", "tif", "tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: 50 * 1024 * 1024,
            presets: vec![
                ResolutionPreset {
                    name: "thumbnail".to_string(),
                    max_width: 400,
                    max_height: 400,
                    quality: 70,
                    watermark: false,
                },
                ResolutionPreset {
                    name: "medium".to_string(),
                    max_width: 1280,
                    max_height: 1280,
                    quality: 80,
                    watermark: true,
                },
                ResolutionPreset {
                    name: "large".to_string(),
                    max_width: 2560,
                    max_height: 2560,
                    quality: 85,
                    watermark: true,
                },
            ],
            default_watermark_opacity: 0.35,
            default_review_mode: false,
            processing_budget_ms: 30_000,
            font_path: None,
        }
    }
}

impl IngestConfig {
    pub fn processing_budget(&self) -> Duration {
        Duration::from_millis(self.processing_budget_ms)
    }
}

/// A raw upload as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

/// Everything the pipeline derived for one upload; the store turns this
/// into a photo row.
#[derive(Debug)]
pub struct ProcessedPhoto {
    pub unique_name: String,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub sha256: String,
    pub watermark_applied: bool,
    pub variants: Vec<Variant>,
    /// Non-fatal degradations (e.g. watermark skipped), reported upward.
    pub warnings: Vec<String>,
}

pub struct Pipeline<'a, S: BlobStore + ?Sized> {
    blobs: &'a S,
    config: &'a IngestConfig,
}

impl<'a, S: BlobStore + ?Sized> Pipeline<'a, S> {
    pub fn new(blobs: &'a S, config: &'a IngestConfig) -> Self {
        Self { blobs, config }
    }

    /// Run the full pipeline for one upload. On any fatal error every blob
    /// this attempt wrote is removed before the error surfaces.
    pub fn process(&self, session: &Session, upload: &Upload) -> Result<ProcessedPhoto> {
        let deadline = Instant::now() + self.config.processing_budget();
        self.validate(upload)?;

        let unique_name = unique_name();
        let decoded = metadata::decode(&upload.bytes, &upload.original_name)?;
        check_deadline(deadline, &upload.original_name)?;

        let mut written: Vec<String> = Vec::new();
        match self.materialize(session, upload, &unique_name, &decoded, deadline, &mut written) {
            Ok(processed) => Ok(processed),
            Err(e) => {
                remove_blobs(self.blobs, &written);
                Err(e)
            }
        }
    }

    /// Steps 1-2: allow-list and size cap. Runs before any storage write.
    fn validate(&self, upload: &Upload) -> Result<()> {
        let ext = extension_of(&upload.original_name).unwrap_or_default();
        if !self.config.allowed_extensions.contains(&ext) {
            return Err(Error::UnsupportedType {
                name: upload.original_name.clone(),
                extension: ext,
            });
        }
        let size = upload.bytes.len() as u64;
        if size > self.config.max_file_size {
            return Err(Error::TooLarge {
                name: upload.original_name.clone(),
                size,
                max: self.config.max_file_size,
            });
        }
        Ok(())
    }

    fn materialize(
        &self,
        session: &Session,
        upload: &Upload,
        unique_name: &str,
        decoded: &metadata::Decoded,
        deadline: Instant,
        written: &mut Vec<String>,
    ) -> Result<ProcessedPhoto> {
        let rgb = decoded.image.to_rgb8();
        let mut warnings = Vec::new();

        // Original persistence. Auto-rotated uploads are re-encoded so the
        // stored original is upright; untouched uploads keep their bytes.
        let (original_bytes, original_ext) = if decoded.rotated {
            (resize::encode_jpeg(&rgb, 95)?, "jpg".to_string())
        } else {
            (
                upload.bytes.clone(),
                extension_of(&upload.original_name).unwrap_or_else(|| "bin".to_string()),
            )
        };
        let original_path = format!(
            "sessions/{}/original/{}.{}",
            session.id, unique_name, original_ext
        );
        write_with_retry(self.blobs, &original_path, &original_bytes)?;
        written.push(original_path.clone());

        let mut variants = vec![Variant {
            name: "original".to_string(),
            path: original_path,
            width: decoded.width,
            height: decoded.height,
            size: original_bytes.len() as u64,
        }];

        // Watermark preparation. A missing font degrades every variant to
        // its plain rendition — never fatal.
        let wants_watermark = session.watermark.enabled && !session.watermark.text.is_empty();
        let font = if wants_watermark {
            let font = watermark::load_font(self.config.font_path.as_deref());
            if font.is_none() {
                warnings.push(format!(
                    "{}: watermark skipped, no usable font",
                    upload.original_name
                ));
            }
            font
        } else {
            None
        };

        // Resolution derivation, one rayon task per preset. Sizes are
        // independent; the decoded source is shared read-only.
        let results: Vec<Result<(Variant, bool)>> = self
            .config
            .presets
            .par_iter()
            .map(|preset| {
                check_deadline(deadline, &upload.original_name)?;
                let mut img =
                    resize::resize_to_fit(&upload.original_name, &rgb, preset.max_width, preset.max_height)?;

                let mut watermarked = false;
                if preset.watermark {
                    if let Some(font) = &font {
                        watermark::apply(
                            &mut img,
                            &session.watermark.text,
                            session.watermark.opacity,
                            font,
                        );
                        watermarked = true;
                    }
                }

                let encoded = resize::encode_jpeg(&img, preset.quality)?;
                let path = format!("sessions/{}/{}/{}.jpg", session.id, preset.name, unique_name);
                write_with_retry(self.blobs, &path, &encoded)?;
                Ok((
                    Variant {
                        name: preset.name.clone(),
                        path,
                        width: img.width(),
                        height: img.height(),
                        size: encoded.len() as u64,
                    },
                    watermarked,
                ))
            })
            .collect();

        let mut watermark_applied = false;
        let mut first_err = None;
        for result in results {
            match result {
                Ok((variant, watermarked)) => {
                    written.push(variant.path.clone());
                    watermark_applied |= watermarked;
                    variants.push(variant);
                }
                Err(e) if first_err.is_none() => first_err = Some(e),
                Err(_) => {}
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        debug!(
            name = %upload.original_name,
            unique = unique_name,
            variants = variants.len(),
            "upload materialized"
        );

        Ok(ProcessedPhoto {
            unique_name: unique_name.to_string(),
            format: decoded.format.to_string(),
            width: decoded.width,
            height: decoded.height,
            size: upload.bytes.len() as u64,
            sha256: sha256_hex(&upload.bytes),
            watermark_applied,
            variants,
            warnings,
        })
    }
}

fn check_deadline(deadline: Instant, name: &str) -> Result<()> {
    if Instant::now() > deadline {
        return Err(Error::ProcessingTimeout {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Millisecond timestamp plus a random suffix. Collisions under concurrent
/// uploads into the same session are negligible and not re-checked.
pub fn unique_name() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", chrono::Utc::now().timestamp_millis(), &suffix[..8])
}

fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
