use std::path::PathBuf;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use shootshare_core::domain::Requester;
use shootshare_core::pipeline::Upload;
use shootshare_core::{Gallery, IngestProgress};

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "  {bar:30.cyan/blue} {spinner:.green} {pos:>4}/{len:<4} {prefix:.dim} {msg}",
    )
    .unwrap()
    .progress_chars("━╸─")
}

pub fn run(
    gallery: &mut Gallery,
    requester: &Requester,
    session_id: i64,
    files: &[PathBuf],
    code: Option<&str>,
) -> Result<()> {
    if files.is_empty() {
        bail!("no files given");
    }

    let mut uploads = Vec::with_capacity(files.len());
    for path in files {
        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        uploads.push(Upload {
            original_name,
            bytes: std::fs::read(path)?,
        });
    }

    let mut pb: Option<ProgressBar> = None;
    let outcome = gallery.ingest(
        requester,
        session_id,
        code,
        &uploads,
        Some(&mut |progress| match progress {
            IngestProgress::BatchStart { file_count } => {
                let bar = ProgressBar::new(file_count as u64);
                bar.set_style(bar_style());
                bar.set_prefix("Ingesting");
                bar.enable_steady_tick(std::time::Duration::from_millis(80));
                pb = Some(bar);
            }
            IngestProgress::FileIngested { original_name }
            | IngestProgress::FileFailed { original_name } => {
                if let Some(ref bar) = pb {
                    bar.set_message(original_name);
                    bar.inc(1);
                }
            }
            IngestProgress::BatchComplete { .. } => {
                if let Some(bar) = pb.take() {
                    bar.finish_and_clear();
                }
            }
        }),
    )?;

    println!(
        "Ingested {} photo(s) into session {}",
        outcome.photos.len(),
        session_id
    );
    for warning in &outcome.warnings {
        println!("  warning: {warning}");
    }
    for failure in &outcome.failures {
        println!("  failed: {}: {}", failure.original_name, failure.error);
    }
    if !outcome.events.is_empty() {
        println!("{} photo(s) published", outcome.events.len());
    }
    Ok(())
}
