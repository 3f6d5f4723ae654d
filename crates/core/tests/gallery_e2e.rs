use std::path::Path;

use shootshare_core::domain::{
    PhotoStatus, Requester, SessionStatus, Visibility, WatermarkSettings,
};
use shootshare_core::error::Error;
use shootshare_core::pipeline::{IngestConfig, Upload};
use shootshare_core::{Gallery, IngestProgress};

/// Build an in-memory JPEG with a gradient seeded by (r, g, b).
fn jpeg_upload(name: &str, width: u32, height: u32, r: u8, g: u8, b: u8) -> Upload {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            r.wrapping_add((x % 200) as u8),
            g.wrapping_add((y % 200) as u8),
            b.wrapping_add(((x + y) % 200) as u8),
        ])
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Jpeg,
        )
        .unwrap();
    Upload {
        original_name: name.to_string(),
        bytes,
    }
}

fn owner() -> Requester {
    Requester::user("studio")
}

fn open_gallery(dir: &Path) -> Gallery {
    Gallery::open(dir).unwrap()
}

fn make_session(gallery: &Gallery) -> i64 {
    gallery
        .create_session(
            "studio",
            "Summer Shoot",
            Visibility::Private,
            Some("WEDDING2024".to_string()),
            None,
            None,
        )
        .unwrap()
        .id
}

// ── Gallery::open ───────────────────────────────────────────────

#[test]
fn test_open_creates_db_and_media_root() {
    let tmp = tempfile::tempdir().unwrap();
    let gallery = open_gallery(tmp.path());
    assert!(tmp.path().join("gallery.db").exists());
    assert!(gallery.media_root().exists());
}

#[test]
fn test_reopen_persists_sessions_and_photos() {
    let tmp = tempfile::tempdir().unwrap();
    let session_id;
    {
        let mut gallery = open_gallery(tmp.path());
        session_id = make_session(&gallery);
        gallery
            .ingest(
                &owner(),
                session_id,
                None,
                &[jpeg_upload("a.jpg", 640, 480, 10, 20, 30)],
                None,
            )
            .unwrap();
    }

    let gallery = open_gallery(tmp.path());
    let session = gallery.session(session_id).unwrap();
    assert_eq!(session.counters.total, 1);
    assert_eq!(gallery.photos(session_id).unwrap().len(), 1);
}

// ── Ingestion ───────────────────────────────────────────────────

#[test]
fn test_batch_with_one_corrupt_file_keeps_the_rest() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);

    let uploads = vec![
        jpeg_upload("a.jpg", 640, 480, 0, 0, 0),
        Upload {
            original_name: "broken.jpg".to_string(),
            bytes: b"\xff\xd8\xff definitely not a jpeg".to_vec(),
        },
        jpeg_upload("c.jpg", 800, 600, 40, 80, 120),
    ];
    let outcome = gallery
        .ingest(&owner(), session_id, None, &uploads, None)
        .unwrap();

    assert_eq!(outcome.photos.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].original_name, "broken.jpg");
    assert!(matches!(
        outcome.failures[0].error,
        Error::CorruptImage { .. }
    ));

    let session = gallery.session(session_id).unwrap();
    assert_eq!(session.counters.total, 2);
    assert!(session.counters.is_consistent());
}

#[test]
fn test_ingested_variants_exist_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);

    let outcome = gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[jpeg_upload("a.jpg", 1600, 1200, 5, 10, 15)],
            None,
        )
        .unwrap();
    let photo = &outcome.photos[0];

    // original + thumbnail + medium + large
    assert_eq!(photo.variants.len(), 4);
    let thumb = photo.variant("thumbnail").unwrap();
    assert!(thumb.width <= 400 && thumb.height <= 400);
    for variant in &photo.variants {
        assert!(
            gallery.media_root().join(&variant.path).exists(),
            "missing {}",
            variant.path
        );
    }
}

#[test]
fn test_oversized_upload_rejected_and_nothing_stored() {
    let tmp = tempfile::tempdir().unwrap();
    let config = IngestConfig {
        max_file_size: 1024,
        ..IngestConfig::default()
    };
    let mut gallery = Gallery::open_with_config(tmp.path(), config).unwrap();
    let session_id = make_session(&gallery);

    let outcome = gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[Upload {
                original_name: "huge.jpg".to_string(),
                bytes: vec![0u8; 4096],
            }],
            None,
        )
        .unwrap();

    assert!(outcome.photos.is_empty());
    assert!(matches!(outcome.failures[0].error, Error::TooLarge { .. }));
    assert_eq!(gallery.session(session_id).unwrap().counters.total, 0);

    let files: Vec<_> = walkdir::WalkDir::new(gallery.media_root())
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    assert!(files.is_empty());
}

#[test]
fn test_ingest_into_paused_session_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);
    gallery
        .set_session_status(&owner(), session_id, SessionStatus::Paused)
        .unwrap();

    let err = gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[jpeg_upload("a.jpg", 100, 100, 0, 0, 0)],
            None,
        )
        .unwrap_err();
    assert!(matches!(err, Error::SessionNotActive(id) if id == session_id));
}

#[test]
fn test_ingest_by_stranger_without_code_denied() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);

    let err = gallery
        .ingest(
            &Requester::user("stranger"),
            session_id,
            None,
            &[jpeg_upload("a.jpg", 100, 100, 0, 0, 0)],
            None,
        )
        .unwrap_err();
    assert!(matches!(err, Error::AccessDenied(_)));
    assert_eq!(gallery.session(session_id).unwrap().counters.total, 0);
}

#[test]
fn test_ingest_progress_callbacks() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);

    let mut ingested = 0usize;
    let mut failed = 0usize;
    let mut complete = None;
    let mut cb = |p: IngestProgress| match p {
        IngestProgress::FileIngested { .. } => ingested += 1,
        IngestProgress::FileFailed { .. } => failed += 1,
        IngestProgress::BatchComplete { succeeded, failed } => complete = Some((succeeded, failed)),
        IngestProgress::BatchStart { .. } => {}
    };
    gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[
                jpeg_upload("a.jpg", 320, 240, 1, 2, 3),
                Upload {
                    original_name: "bad.jpg".to_string(),
                    bytes: vec![1, 2, 3],
                },
            ],
            Some(&mut cb),
        )
        .unwrap();

    assert_eq!((ingested, failed), (1, 1));
    assert_eq!(complete, Some((1, 1)));
}

// ── Review workflow ─────────────────────────────────────────────

#[test]
fn test_review_mode_counter_flow() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = gallery
        .create_session(
            "studio",
            "Reviewed Shoot",
            Visibility::Private,
            None,
            Some(true),
            None,
        )
        .unwrap()
        .id;

    let outcome = gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[
                jpeg_upload("a.jpg", 320, 240, 1, 2, 3),
                jpeg_upload("b.jpg", 320, 240, 4, 5, 6),
            ],
            None,
        )
        .unwrap();
    // Review mode: nothing is published on ingest, no events either.
    assert!(outcome.events.is_empty());

    let session = gallery.session(session_id).unwrap();
    assert_eq!(session.counters.pending, 2);
    assert_eq!(session.counters.published, 0);

    let a = outcome.photos[0].id;
    let b = outcome.photos[1].id;
    let (_, event) = gallery.approve_photo(&owner(), a, None).unwrap();
    assert!(event.is_some());
    gallery
        .reject_photo(&owner(), b, Some("eyes closed"))
        .unwrap();

    let session = gallery.session(session_id).unwrap();
    assert_eq!(session.counters.pending, 0);
    assert_eq!(session.counters.published, 1);
    assert_eq!(session.counters.rejected, 1);
    assert!(session.counters.is_consistent());

    // Retrying the approval is a no-op and emits no second event.
    let (transition, event) = gallery.approve_photo(&owner(), a, None).unwrap();
    assert!(!transition.changed);
    assert!(event.is_none());
    let session = gallery.session(session_id).unwrap();
    assert_eq!(session.counters.published, 1);
}

#[test]
fn test_instant_publish_emits_events() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery); // review_mode defaults to false

    let outcome = gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[jpeg_upload("a.jpg", 320, 240, 1, 2, 3)],
            None,
        )
        .unwrap();
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].status, PhotoStatus::Published);
    assert!(!outcome.events[0].variant_paths.is_empty());
}

#[test]
fn test_archive_and_reject_emit_events() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = gallery
        .create_session(
            "studio",
            "Eventful Shoot",
            Visibility::Private,
            None,
            Some(true),
            None,
        )
        .unwrap()
        .id;
    let outcome = gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[
                jpeg_upload("a.jpg", 320, 240, 1, 2, 3),
                jpeg_upload("b.jpg", 320, 240, 4, 5, 6),
            ],
            None,
        )
        .unwrap();
    let a = outcome.photos[0].id;
    let b = outcome.photos[1].id;

    let (_, event) = gallery
        .reject_photo(&owner(), b, Some("duplicate"))
        .unwrap();
    let event = event.unwrap();
    assert_eq!(event.status, PhotoStatus::Rejected);
    assert_eq!(event.photo_id, b);

    gallery.approve_photo(&owner(), a, None).unwrap();
    let (transition, event) = gallery.archive_photo(&owner(), a).unwrap();
    assert!(transition.changed);
    let event = event.unwrap();
    assert_eq!(event.status, PhotoStatus::Archived);
    assert_eq!(event.photo_id, a);
    assert!(!event.variant_paths.is_empty());

    // Retrying the archival is a no-op and stays silent.
    let (retry, event) = gallery.archive_photo(&owner(), a).unwrap();
    assert!(!retry.changed);
    assert!(event.is_none());
}

#[test]
fn test_review_by_stranger_denied() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);
    let outcome = gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[jpeg_upload("a.jpg", 320, 240, 1, 2, 3)],
            None,
        )
        .unwrap();

    let err = gallery
        .archive_photo(&Requester::user("stranger"), outcome.photos[0].id)
        .unwrap_err();
    assert!(matches!(err, Error::AccessDenied(_)));
}

// ── Access decisions ────────────────────────────────────────────

#[test]
fn test_access_code_grants_and_logs() {
    let tmp = tempfile::tempdir().unwrap();
    let gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);
    let viewer = Requester::user("guest");

    let granted = gallery
        .check_access(&viewer, session_id, Some("WEDDING2024"), Some("10.0.0.9"))
        .unwrap();
    assert!(granted.granted);

    // Case-sensitive: the lowercase form is denied, and also logged.
    let denied = gallery
        .check_access(&viewer, session_id, Some("wedding2024"), Some("10.0.0.9"))
        .unwrap();
    assert!(!denied.granted);

    let log = gallery.access_log(session_id).unwrap();
    assert_eq!(log.len(), 2);
    let granted_count = log.iter().filter(|a| a.granted).count();
    assert_eq!(granted_count, 1);
}

#[test]
fn test_owner_access_not_logged() {
    let tmp = tempfile::tempdir().unwrap();
    let gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);

    let decision = gallery
        .check_access(&owner(), session_id, None, None)
        .unwrap();
    assert!(decision.granted);
    assert!(gallery.access_log(session_id).unwrap().is_empty());
}

#[test]
fn test_unknown_session_denied_like_bad_code() {
    let tmp = tempfile::tempdir().unwrap();
    let gallery = open_gallery(tmp.path());

    let decision = gallery
        .check_access(&Requester::Anonymous, 9999, Some("guess"), None)
        .unwrap();
    assert!(!decision.granted);
}

#[test]
fn test_view_counting_dedupes_unique_viewers() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);

    gallery.record_view(session_id, "viewer-a").unwrap();
    gallery.record_view(session_id, "viewer-a").unwrap();
    gallery.record_view(session_id, "viewer-b").unwrap();

    let session = gallery.session(session_id).unwrap();
    assert_eq!(session.view_count, 3);
    assert_eq!(session.unique_viewers, 2);
}

// ── Deletion and maintenance ────────────────────────────────────

#[test]
fn test_delete_photo_removes_blobs_and_counters() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);
    let outcome = gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[jpeg_upload("a.jpg", 640, 480, 9, 9, 9)],
            None,
        )
        .unwrap();
    let photo = &outcome.photos[0];
    let paths: Vec<_> = photo.variants.iter().map(|v| v.path.clone()).collect();

    gallery.delete_photo(&owner(), photo.id).unwrap();

    for path in &paths {
        assert!(!gallery.media_root().join(path).exists());
    }
    let session = gallery.session(session_id).unwrap();
    assert_eq!(session.counters.total, 0);
    assert!(session.counters.is_consistent());
}

#[test]
fn test_delete_session_refuses_without_cascade() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);
    gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[jpeg_upload("a.jpg", 320, 240, 1, 1, 1)],
            None,
        )
        .unwrap();

    let err = gallery
        .delete_session(&owner(), session_id, false)
        .unwrap_err();
    assert!(matches!(err, Error::SessionHasPhotos(_)));

    gallery.delete_session(&owner(), session_id, true).unwrap();
    assert!(matches!(
        gallery.session(session_id),
        Err(Error::SessionNotFound(_))
    ));
    let files: Vec<_> = walkdir::WalkDir::new(gallery.media_root())
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    assert!(files.is_empty());
}

#[test]
fn test_sweep_orphans_removes_unreferenced_files() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);
    gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[jpeg_upload("a.jpg", 320, 240, 1, 1, 1)],
            None,
        )
        .unwrap();

    let stray_dir = gallery.media_root().join("sessions/999/original");
    std::fs::create_dir_all(&stray_dir).unwrap();
    std::fs::write(stray_dir.join("stray.jpg"), b"leftover").unwrap();

    let removed = gallery.sweep_orphans().unwrap();
    assert_eq!(removed.len(), 1);
    assert!(!stray_dir.join("stray.jpg").exists());
    // Referenced media untouched.
    let photo = &gallery.photos(session_id).unwrap()[0];
    for variant in &photo.variants {
        assert!(gallery.media_root().join(&variant.path).exists());
    }
}

#[test]
fn test_reconcile_reports_clean_counters() {
    let tmp = tempfile::tempdir().unwrap();
    let mut gallery = open_gallery(tmp.path());
    let session_id = make_session(&gallery);
    gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[
                jpeg_upload("a.jpg", 320, 240, 1, 1, 1),
                jpeg_upload("b.jpg", 320, 240, 2, 2, 2),
            ],
            None,
        )
        .unwrap();

    // Healthy counters reconcile to zero corrections.
    assert_eq!(gallery.reconcile_counters().unwrap(), 0);
    let session = gallery.session(session_id).unwrap();
    assert_eq!(session.counters.total, 2);
    assert!(session.counters.is_consistent());
}

// ── Watermarking ────────────────────────────────────────────────

#[test]
fn test_watermarked_session_with_no_font_still_ingests() {
    let tmp = tempfile::tempdir().unwrap();
    let config = IngestConfig {
        font_path: Some(tmp.path().join("missing.ttf")),
        ..IngestConfig::default()
    };
    let mut gallery = Gallery::open_with_config(tmp.path(), config).unwrap();
    let session_id = gallery
        .create_session(
            "studio",
            "Marked Shoot",
            Visibility::Public,
            None,
            None,
            Some(WatermarkSettings {
                enabled: true,
                text: "© studio".to_string(),
                opacity: 0.0, // falls back to the configured default
            }),
        )
        .unwrap()
        .id;

    let outcome = gallery
        .ingest(
            &owner(),
            session_id,
            None,
            &[jpeg_upload("a.jpg", 640, 480, 3, 3, 3)],
            None,
        )
        .unwrap();

    assert_eq!(outcome.photos.len(), 1);
    assert!(!outcome.photos[0].watermark_applied);
    assert!(!outcome.warnings.is_empty());
}
